use std::path::PathBuf;

use studio_logging::studio_debug;
use url::Url;

use crate::decode::{decode_text, DecodeError};
use crate::fetch::Fetcher;
use crate::FetchError;

const SHEET_TYPES: &[&str] = &["text/*", "application/csv", "application/octet-stream"];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("malformed source identifier `{identifier}`: {reason}")]
    Format { identifier: String, reason: String },
    #[error("failed to fetch source: {0}")]
    Fetch(#[from] FetchError),
    #[error("failed to read source file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl SourceError {
    fn format(identifier: &str, reason: impl Into<String>) -> Self {
        SourceError::Format {
            identifier: identifier.to_string(),
            reason: reason.into(),
        }
    }
}

/// Where the job sheet comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetSource {
    Remote(Url),
    File(PathBuf),
}

impl SheetSource {
    /// Parse an operator-supplied identifier.
    ///
    /// Google Sheets links are rewritten to their CSV export URL; other http(s)
    /// URLs are fetched as they are; anything without a scheme is a local path.
    pub fn parse(identifier: &str) -> Result<Self, SourceError> {
        let trimmed = identifier.trim();
        if trimmed.is_empty() {
            return Err(SourceError::format(identifier, "empty identifier"));
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(trimmed)
                .map_err(|err| SourceError::format(identifier, err.to_string()))?;
            if url.host_str() == Some("docs.google.com") && url.path().starts_with("/spreadsheets") {
                return sheets_export_url(identifier, &url).map(SheetSource::Remote);
            }
            return Ok(SheetSource::Remote(url));
        }
        if trimmed.contains("://") {
            return Err(SourceError::format(identifier, "unsupported scheme"));
        }
        Ok(SheetSource::File(PathBuf::from(trimmed)))
    }

    /// Load the raw sheet text.
    pub async fn load_text(&self, fetcher: &dyn Fetcher) -> Result<String, SourceError> {
        let (bytes, content_type) = match self {
            SheetSource::Remote(url) => {
                let output = fetcher.fetch(url.as_str(), SHEET_TYPES).await?;
                (output.bytes, output.metadata.content_type)
            }
            SheetSource::File(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| SourceError::Io {
                        path: path.clone(),
                        source,
                    })?;
                (bytes, None)
            }
        };
        let decoded = decode_text(&bytes, content_type.as_deref())?;
        studio_debug!(
            "Loaded {} bytes of sheet text ({}, {:?})",
            bytes.len(),
            decoded.encoding_label,
            decoded.source
        );
        Ok(decoded.text)
    }
}

fn sheets_export_url(identifier: &str, url: &Url) -> Result<Url, SourceError> {
    let mut segments = url.path_segments().into_iter().flatten();
    let document_id = match (segments.next(), segments.next(), segments.next()) {
        (Some("spreadsheets"), Some("d"), Some(id)) if !id.is_empty() => id.to_string(),
        _ => return Err(SourceError::format(identifier, "missing spreadsheet id")),
    };
    let gid = url
        .query_pairs()
        .find(|(key, _)| key == "gid")
        .map(|(_, value)| value.into_owned())
        .or_else(|| {
            url.fragment()
                .and_then(|fragment| fragment.strip_prefix("gid="))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "0".to_string());
    if !gid.chars().all(|c| c.is_ascii_digit()) {
        return Err(SourceError::format(identifier, "sheet gid must be numeric"));
    }
    let export = format!(
        "https://docs.google.com/spreadsheets/d/{document_id}/export?format=csv&gid={gid}"
    );
    Url::parse(&export).map_err(|err| SourceError::format(identifier, err.to_string()))
}
