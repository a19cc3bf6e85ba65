//! Bucket Resizer
//!
//! Batch job that rewrites every JPEG in a Cloud Storage bucket at a fixed
//! width, keeping the aspect ratio and the object key.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod processor;
pub mod storage;

// Public re-exports
pub use config::{Config, Credentials, ResizeConfig, WriteMode};
pub use error::{ConfigError, ItemError, PipelineError, Result, StorageError};
pub use pipeline::{run, BucketResizePipeline, Resized, RunSummary};
pub use processor::ImageResizer;
