use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use studio_core::{EncodedAsset, Tier};
use studio_logging::{studio_debug, studio_warn};

use crate::fetch::map_reqwest_error;

/// One call to the image model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub references: Vec<EncodedAsset>,
    pub instruction: Option<String>,
    pub conditioning: Option<EncodedAsset>,
    pub tier: Tier,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    #[error("{message}")]
    Failed { message: String },
    /// The enhanced tier is locked until the operator grants elevated access.
    #[error("elevated access has not been granted")]
    ElevatedAccessRequired,
}

impl GenerationError {
    pub fn failed(message: impl Into<String>) -> Self {
        GenerationError::Failed {
            message: message.into(),
        }
    }

    pub fn is_elevated_access(&self) -> bool {
        matches!(self, GenerationError::ElevatedAccessRequired)
    }
}

#[async_trait::async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<EncodedAsset, GenerationError>;
}

/// Side-effecting hook invoked when a call reports
/// [`GenerationError::ElevatedAccessRequired`].
pub trait AccessGate: Send + Sync {
    fn request_elevated_access(&self, tier: Tier);
}

/// Settings for [`HttpGenerationService`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub endpoint: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub standard_model: String,
    pub enhanced_model: String,
    pub request_timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8088/v1/images/redesign".to_string(),
            api_key_env: "STUDIO_API_KEY".to_string(),
            standard_model: "image-standard".to_string(),
            enhanced_model: "image-pro".to_string(),
            request_timeout_secs: 180,
        }
    }
}

impl GenerationSettings {
    pub fn model_for(&self, tier: Tier) -> &str {
        match tier {
            Tier::Standard => &self.standard_model,
            Tier::Enhanced => &self.enhanced_model,
        }
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    tier: Tier,
    instruction: Option<&'a str>,
    references: Vec<&'a str>,
    conditioning: Option<&'a str>,
}

#[derive(Deserialize)]
struct WireResponse {
    image: String,
}

/// JSON-over-HTTP client for an image redesign endpoint.
///
/// HTTP 403 is reported as [`GenerationError::ElevatedAccessRequired`].
pub struct HttpGenerationService {
    client: reqwest::Client,
    settings: GenerationSettings,
    api_key: Option<String>,
}

impl HttpGenerationService {
    pub fn new(settings: GenerationSettings) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .map_err(|err| GenerationError::failed(err.to_string()))?;
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        Ok(Self {
            client,
            settings,
            api_key,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn encode_body(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let wire = WireRequest {
            model: self.settings.model_for(request.tier),
            tier: request.tier,
            instruction: request.instruction.as_deref(),
            references: request.references.iter().map(EncodedAsset::as_str).collect(),
            conditioning: request.conditioning.as_ref().map(EncodedAsset::as_str),
        };
        serde_json::to_vec(&wire).map_err(|err| GenerationError::failed(err.to_string()))
    }
}

#[async_trait::async_trait]
impl GenerationService for HttpGenerationService {
    async fn generate(&self, request: &GenerationRequest) -> Result<EncodedAsset, GenerationError> {
        let body = self.encode_body(request)?;
        let mut builder = self
            .client
            .post(&self.settings.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(key) = &self.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        studio_debug!(
            "POST {} ({} references, tier {})",
            self.settings.endpoint,
            request.references.len(),
            request.tier
        );

        let response = builder
            .send()
            .await
            .map_err(|err| GenerationError::failed(map_reqwest_error(err).to_string()))?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(GenerationError::ElevatedAccessRequired);
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| GenerationError::failed(map_reqwest_error(err).to_string()))?;
        if !status.is_success() {
            let detail = String::from_utf8_lossy(&bytes);
            let detail = detail.trim();
            studio_warn!("Generation endpoint returned {}: {}", status, detail);
            return Err(GenerationError::failed(if detail.is_empty() {
                format!("generation failed with {status}")
            } else {
                format!("generation failed with {status}: {detail}")
            }));
        }

        let wire: WireResponse = serde_json::from_slice(&bytes)
            .map_err(|err| GenerationError::failed(format!("malformed response: {err}")))?;
        EncodedAsset::parse(wire.image)
            .map_err(|err| GenerationError::failed(format!("malformed image: {err}")))
    }
}
