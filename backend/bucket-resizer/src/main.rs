//! Bucket Resizer - one pass over a GCS bucket
//!
//! Resizes every `.jpg` / `.jpeg` object to a fixed width and overwrites it in
//! place. Exits non-zero only when the run cannot start or the listing fails;
//! individual object failures are logged and skipped.
//!
//! Environment variables (all optional, `.env` is honoured):
//! - GCS_PROJECT_ID: Project identifier (informational)
//! - GCS_BUCKET: Bucket to scan
//! - GCS_SERVICE_ACCOUNT_JSON_PATH: Path to a service account JSON key
//! - GCS_SERVICE_ACCOUNT_JSON: Alternative: key content (raw or base64)
//! - GCS_ACCESS_TOKEN: Alternative: pre-minted OAuth2 token
//! - STORAGE_EMULATOR_HOST: GCS emulator endpoint, disables auth
//! - RESIZER_TARGET_WIDTH: Output width in pixels (default: 1080)
//! - RESIZER_JPEG_QUALITY: JPEG quality 1-100 (default: 75)
//! - RESIZER_ALLOW_UPSCALE: Enlarge narrower images (default: true)
//! - RESIZER_WRITE_MODE: in-place | staged (default: in-place). Staged mode
//!   reserves keys ending in `.bucket-resizer-staging`
//! - LOG_FORMAT: set to `json` for JSON log lines

use bucket_resizer::Config;
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bucket_resizer=info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting bucket resizer");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(
        bucket = %config.bucket,
        project_id = %config.project_id,
        target_width = config.resize.target_width,
        "Configuration loaded"
    );

    match bucket_resizer::run(&config).await {
        Ok(summary) => {
            if summary.failed > 0 {
                warn!(failed = summary.failed, "Some objects were skipped after errors");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Bucket resize aborted");
            ExitCode::FAILURE
        }
    }
}
