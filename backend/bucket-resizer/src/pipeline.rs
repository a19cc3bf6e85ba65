//! Bucket resize pipeline
//!
//! Walks a bucket listing once, in order, and for every `.jpg` / `.jpeg`
//! object:
//! 1. Download it
//! 2. Decode and resize it to the target width
//! 3. Encode it as JPEG and write it back under the same key
//!
//! A failure on one object is logged and the scan continues. Only client
//! construction and listing failures end the run.

use crate::config::{Config, WriteMode};
use crate::error::{ItemError, PipelineError, Result};
use crate::processor::{ImageResizer, JPEG_CONTENT_TYPE};
use crate::storage::{GcsClient, Listed, ObjectDescriptor, ObjectReader, ObjectStore, ObjectWriter};
use image::GenericImageView;
use tracing::{error, info};

/// Counters for one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Objects returned by the listing
    pub listed: u64,
    /// Objects skipped by the extension filter
    pub skipped: u64,
    pub resized: u64,
    pub failed: u64,
}

/// Result of processing one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resized {
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    /// Size of the uploaded JPEG in bytes
    pub size: usize,
}

pub struct BucketResizePipeline<'a> {
    store: &'a dyn ObjectStore,
    resizer: ImageResizer,
    write_mode: WriteMode,
}

impl<'a> BucketResizePipeline<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &Config) -> Self {
        Self {
            store,
            resizer: ImageResizer::new(config.resize.clone()),
            write_mode: config.write_mode,
        }
    }

    /// Scan the whole bucket once
    pub async fn run(&self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut listing = self.store.list();

        info!(
            bucket = %self.store.bucket(),
            target_width = self.resizer.config().target_width,
            write_mode = ?self.write_mode,
            "Scanning bucket"
        );

        loop {
            let descriptor = match listing.next().await {
                Listed::Object(descriptor) => descriptor,
                Listed::Done => break,
                Listed::Failed(e) => {
                    error!(bucket = %self.store.bucket(), error = %e, "Error iterating bucket");
                    return Err(PipelineError::Listing(e));
                }
            };
            summary.listed += 1;

            if !descriptor.is_jpeg() {
                summary.skipped += 1;
                continue;
            }

            match self.process_object(&descriptor).await {
                Ok(resized) => {
                    summary.resized += 1;
                    info!(
                        object = %descriptor.name,
                        original_width = resized.original_width,
                        original_height = resized.original_height,
                        width = resized.width,
                        height = resized.height,
                        size = resized.size,
                        "Successfully resized and uploaded"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(
                        object = %e.object_name(),
                        stage = e.stage(),
                        error = %e,
                        "Failed to process object"
                    );
                }
            }
        }

        info!(
            bucket = %self.store.bucket(),
            listed = summary.listed,
            resized = summary.resized,
            skipped = summary.skipped,
            failed = summary.failed,
            "Bucket scan complete"
        );
        Ok(summary)
    }

    /// Download, resize and overwrite a single object
    pub async fn process_object(
        &self,
        descriptor: &ObjectDescriptor,
    ) -> std::result::Result<Resized, ItemError> {
        let name = descriptor.name.as_str();

        let reader = ObjectReader::open(self.store, name)
            .await
            .map_err(|source| ItemError::Read {
                name: name.to_string(),
                source,
            })?;

        let img = self.resizer.decode(reader).map_err(|source| ItemError::Decode {
            name: name.to_string(),
            source,
        })?;
        let (original_width, original_height) = img.dimensions();

        let resized = self.resizer.resize(&img);
        drop(img);
        let (width, height) = resized.dimensions();

        let mut writer = ObjectWriter::create(self.store, name, JPEG_CONTENT_TYPE, self.write_mode);
        self.resizer
            .encode_jpeg(&resized, &mut writer)
            .map_err(|source| ItemError::Encode {
                name: name.to_string(),
                source,
            })?;

        let size = writer.commit().await.map_err(|source| ItemError::Write {
            name: name.to_string(),
            source,
        })?;

        Ok(Resized {
            original_width,
            original_height,
            width,
            height,
            size,
        })
    }
}

/// Connect to the configured bucket and resize everything in it
pub async fn run(config: &Config) -> Result<RunSummary> {
    config.validate()?;

    let client = GcsClient::from_config(config).map_err(PipelineError::Client)?;
    BucketResizePipeline::new(&client, config).run().await
}
