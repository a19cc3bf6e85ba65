/// Configuration for the bucket resizer
///
/// Every value has a built-in default so the tool runs with no environment at
/// all; the environment (and an optional `.env` file) only overrides them.
/// The resulting `Config` is built once in `main` and passed by reference.
use crate::error::ConfigError;
use base64::Engine;
use std::path::PathBuf;

pub const DEFAULT_PROJECT_ID: &str = "your-project-id";
pub const DEFAULT_BUCKET: &str = "your-bucket-name";
pub const DEFAULT_CREDENTIALS_FILE: &str = "path/to/your/credentials.json";
pub const DEFAULT_TARGET_WIDTH: u32 = 1080;
/// Matches the stock JPEG encoder default
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Clone, Debug)]
pub struct Config {
    pub project_id: String,
    pub bucket: String,
    pub credentials: Credentials,
    /// `host[:port]` or URL of a GCS emulator; disables authentication
    pub emulator_host: Option<String>,
    pub resize: ResizeConfig,
    pub write_mode: WriteMode,
}

/// Where the storage client gets its identity from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    /// Path to a service account JSON key file
    ServiceAccountFile(PathBuf),
    /// Service account JSON content
    ServiceAccountJson(String),
    /// Pre-minted OAuth2 bearer token
    AccessToken(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResizeConfig {
    /// Output width in pixels, always > 0
    pub target_width: u32,
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Upscale images narrower than `target_width`
    pub allow_upscale: bool,
}

impl Default for ResizeConfig {
    fn default() -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            allow_upscale: true,
        }
    }
}

/// How the re-encoded image replaces the original
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Overwrite the key directly
    #[default]
    InPlace,
    /// Write to a temporary key, then copy over the original and delete the temporary
    Staged,
}

impl WriteMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in-place" | "inplace" | "in_place" => Some(Self::InPlace),
            "staged" => Some(Self::Staged),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bucket = var("GCS_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string());

        let credentials = if let Some(token) = var("GCS_ACCESS_TOKEN") {
            Credentials::AccessToken(token.trim().to_string())
        } else if let Some(json) = var("GCS_SERVICE_ACCOUNT_JSON") {
            Credentials::ServiceAccountJson(decode_service_account_json(&json)?)
        } else {
            Credentials::ServiceAccountFile(PathBuf::from(
                var("GCS_SERVICE_ACCOUNT_JSON_PATH")
                    .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_string()),
            ))
        };

        let resize = ResizeConfig {
            target_width: parse_or("RESIZER_TARGET_WIDTH", var("RESIZER_TARGET_WIDTH"), DEFAULT_TARGET_WIDTH)?,
            jpeg_quality: parse_or("RESIZER_JPEG_QUALITY", var("RESIZER_JPEG_QUALITY"), DEFAULT_JPEG_QUALITY)?,
            allow_upscale: parse_or("RESIZER_ALLOW_UPSCALE", var("RESIZER_ALLOW_UPSCALE"), true)?,
        };

        let write_mode = match var("RESIZER_WRITE_MODE") {
            Some(raw) => WriteMode::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "RESIZER_WRITE_MODE",
                value: raw.clone(),
                reason: "expected in-place or staged".to_string(),
            })?,
            None => WriteMode::default(),
        };

        let config = Config {
            project_id: var("GCS_PROJECT_ID").unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string()),
            bucket,
            credentials,
            emulator_host: var("STORAGE_EMULATOR_HOST"),
            resize,
            write_mode,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the pipeline relies on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bucket.trim().is_empty() {
            return Err(ConfigError::Missing("GCS_BUCKET"));
        }
        if self.resize.target_width == 0 {
            return Err(ConfigError::Invalid {
                key: "RESIZER_TARGET_WIDTH",
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }
        let q = self.resize.jpeg_quality;
        if q == 0 || q > 100 {
            return Err(ConfigError::Invalid {
                key: "RESIZER_JPEG_QUALITY",
                value: q.to_string(),
                reason: "must be 1-100".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Inline service account JSON may be passed raw or base64 encoded
fn decode_service_account_json(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed.to_string());
    }

    let invalid = |reason: String| ConfigError::Invalid {
        key: "GCS_SERVICE_ACCOUNT_JSON",
        value: "<redacted>".to_string(),
        reason,
    };
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .map_err(|e| invalid(format!("not JSON and not base64: {e}")))?;
    String::from_utf8(decoded).map_err(|e| invalid(format!("invalid UTF-8: {e}")))
}
