use std::sync::atomic::{AtomicUsize, Ordering};

use studio_core::{RegistryView, Tier};
use studio_engine::{AccessGate, ProgressSink, RunOutcome, SchedulerEvent};
use studio_logging::{studio_info, studio_warn};

/// Reports scheduler progress through the logger.
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn emit(&self, event: SchedulerEvent) {
        match event {
            SchedulerEvent::RunStarted {
                batch_id,
                tier,
                planned,
            } => studio_info!("[batch {}] generating {} {} outputs", batch_id, planned, tier),
            SchedulerEvent::OutputGenerated { batch_id, index } => {
                studio_info!("[batch {}] output {} ready", batch_id, index + 1)
            }
            SchedulerEvent::RunFinished { batch_id, outcome } => match outcome {
                RunOutcome::Completed { generated } => {
                    studio_info!("[batch {}] completed with {} outputs", batch_id, generated)
                }
                RunOutcome::Stopped { generated } => {
                    studio_info!("[batch {}] stopped after {} outputs", batch_id, generated)
                }
                RunOutcome::Failed { message, .. } => {
                    studio_warn!("[batch {}] failed: {}", batch_id, message)
                }
            },
        }
    }
}

/// Asks the operator for elevated access. Only the first request is logged; later ones are counted.
#[derive(Default)]
pub struct LoggingAccessGate {
    requests: AtomicUsize,
}

impl LoggingAccessGate {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl AccessGate for LoggingAccessGate {
    fn request_elevated_access(&self, tier: Tier) {
        if self.requests.fetch_add(1, Ordering::Relaxed) == 0 {
            studio_warn!(
                "The {} tier needs elevated access; grant it to the configured API key and rerun",
                tier
            );
        }
    }
}

/// One line per batch, for the terminal.
pub fn render_view(view: &RegistryView) -> String {
    let mut out = format!(
        "{:>4}  {:<28} {:<10} {:>4} {:>8} {:>4}\n",
        "id", "name", "status", "refs", "standard", "pro"
    );
    for job in &view.jobs {
        out.push_str(&format!(
            "{:>4}  {:<28} {:<10} {:>4} {:>8} {:>4}",
            job.batch_id,
            truncate(&job.name, 28),
            job.status.to_string(),
            job.resolved_references,
            job.standard_results,
            job.pro_results
        ));
        if let Some(err) = &job.last_error {
            out.push_str(&format!("  {err}"));
        }
        out.push('\n');
    }
    out
}

fn truncate(name: &str, width: usize) -> String {
    if name.chars().count() <= width {
        return name.to_string();
    }
    let mut short: String = name.chars().take(width - 1).collect();
    short.push('~');
    short
}
