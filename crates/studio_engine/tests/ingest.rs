use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use studio_core::{ColumnMap, EncodedAsset, REFERENCE_SLOTS};
use studio_engine::{
    ingest_text, sync_source, AssetResolver, FetchError, FetchOutput, FetchSettings, Fetcher,
    HttpAssetResolver, ReqwestFetcher, SourceError,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

/// Build one sheet line with `name` at column 0, `fallback` at 1, `prompt` at
/// 11 and `refs` from column 15 on.
fn sheet_line(name: &str, fallback: &str, prompt: &str, refs: &[&str]) -> String {
    let mut cells = vec![String::new(); 20];
    cells[0] = name.to_string();
    cells[1] = fallback.to_string();
    cells[11] = prompt.to_string();
    for (offset, url) in refs.iter().enumerate() {
        cells[15 + offset] = url.to_string();
    }
    cells.join(",")
}

struct CountingFetcher {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, _url: &str, _accept: &[&str]) -> Result<FetchOutput, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("no fetch expected");
    }
}

struct FixedResolver;

#[async_trait::async_trait]
impl AssetResolver for FixedResolver {
    async fn resolve(&self, url: &str) -> Option<EncodedAsset> {
        url.ends_with(".png")
            .then(|| EncodedAsset::from_parts("image/png", "iVBORw0KGgo="))
    }
}

#[tokio::test]
async fn remote_sheet_is_ingested_with_resolved_references() {
    let server = MockServer::start().await;
    let good = format!("{}/refs/a.png", server.uri());
    let missing = format!("{}/refs/missing.png", server.uri());
    Mock::given(method("GET"))
        .and(path("/refs/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG, "image/png"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/refs/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let sheet = [
        sheet_line("Name", "Fallback", "Prompt", &["Ref 1"]),
        sheet_line("Lobby", "", "warm oak", &[&good, &missing, "", "not a url"]),
        sheet_line("", "", "orphan prompt", &[&good]),
        sheet_line("Kitchen", "bright white", "", &[]),
    ]
    .join("\n");
    Mock::given(method("GET"))
        .and(path("/jobs.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sheet, "text/csv"))
        .mount(&server)
        .await;

    let fetcher = ReqwestFetcher::new(FetchSettings::default());
    let resolver = HttpAssetResolver::new(fetcher.clone());
    let rows = sync_source(
        &format!("{}/jobs.csv", server.uri()),
        &ColumnMap::default(),
        &fetcher,
        &resolver,
    )
    .await
    .expect("sync ok");

    assert_eq!(rows.len(), 2);
    let lobby = &rows[0];
    assert_eq!(lobby.name, "Lobby");
    assert_eq!(lobby.custom_prompt.as_deref(), Some("warm oak"));
    assert_eq!(lobby.references.len(), REFERENCE_SLOTS);
    let first = lobby.references[0].as_ref().expect("slot 1 present");
    assert!(first.is_resolved());
    assert_eq!(first.source_url(), good);
    let second = lobby.references[1].as_ref().expect("slot 2 present");
    assert!(!second.is_resolved());
    assert_eq!(second.source_url(), missing);
    assert!(lobby.references[2].is_none());
    assert!(lobby.references[3].is_none());
    assert!(lobby.references[4].is_none());

    let kitchen = &rows[1];
    assert_eq!(kitchen.custom_prompt.as_deref(), Some("bright white"));
    assert!(kitchen.references.iter().all(Option::is_none));
}

#[tokio::test]
async fn local_file_is_ingested() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("jobs.csv");
    let sheet = [
        sheet_line("Name", "", "", &[]),
        sheet_line("\"Suite, West\"", "", "", &["https://cdn.example.com/a.png"]),
    ]
    .join("\r\n");
    std::fs::write(&file, format!("\u{feff}{sheet}")).unwrap();

    let fetcher = CountingFetcher {
        calls: AtomicUsize::new(0),
    };
    let rows = sync_source(
        file.to_str().unwrap(),
        &ColumnMap::default(),
        &fetcher,
        &FixedResolver,
    )
    .await
    .expect("sync ok");

    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "Suite, West");
    assert!(rows[0].references[0].as_ref().unwrap().is_resolved());
}

#[tokio::test]
async fn malformed_identifier_aborts_before_fetching() {
    let fetcher = CountingFetcher {
        calls: AtomicUsize::new(0),
    };
    let err = sync_source(
        "https://docs.google.com/spreadsheets/u/0/",
        &ColumnMap::default(),
        &fetcher,
        &FixedResolver,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, SourceError::Format { .. }));
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = CountingFetcher {
        calls: AtomicUsize::new(0),
    };
    let err = sync_source(
        dir.path().join("absent.csv").to_str().unwrap(),
        &ColumnMap::default(),
        &fetcher,
        &FixedResolver,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SourceError::Io { .. }));
}

#[tokio::test]
async fn header_only_text_yields_no_jobs() {
    let rows = ingest_text("Name,Prompt\n\n", &ColumnMap::default(), &FixedResolver).await;
    assert!(rows.is_empty());
}
