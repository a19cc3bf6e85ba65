//! Object storage access
//!
//! - [`ObjectStore`]: the backend seam (list / read / write / copy / delete)
//! - [`GcsClient`]: Google Cloud Storage over the JSON API
//! - [`ObjectReader`] / [`ObjectWriter`]: per-object streams scoped to one
//!   pipeline iteration

pub mod gcs;
pub mod stream;

pub use crate::error::StorageError;
pub use gcs::GcsClient;
pub use stream::{ObjectReader, ObjectWriter};

use async_trait::async_trait;
use bytes::Bytes;

/// An object as reported by a bucket listing
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDescriptor {
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// GCS reports sizes as decimal strings
    #[serde(default)]
    pub size: Option<String>,
}

impl ObjectDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            size: None,
        }
    }

    /// Extension of the last path segment including the leading dot, or `""`
    pub fn extension(&self) -> &str {
        let segment_start = self.name.rfind('/').map(|i| i + 1).unwrap_or(0);
        match self.name[segment_start..].rfind('.') {
            Some(dot) => &self.name[segment_start + dot..],
            None => "",
        }
    }

    /// Case-sensitive `.jpg` / `.jpeg` check
    pub fn is_jpeg(&self) -> bool {
        matches!(self.extension(), ".jpg" | ".jpeg")
    }
}

/// One step of a bucket listing
#[derive(Debug)]
pub enum Listed {
    Object(ObjectDescriptor),
    /// The listing is exhausted
    Done,
    /// The listing cannot continue
    Failed(StorageError),
}

/// Lazy, forward-only listing of a bucket
#[async_trait]
pub trait ObjectListing: Send {
    async fn next(&mut self) -> Listed;
}

/// Storage backend used by the pipeline
#[async_trait]
pub trait ObjectStore: Send + Sync {
    fn bucket(&self) -> &str;

    /// Start a listing of every object in the bucket
    fn list(&self) -> Box<dyn ObjectListing + '_>;

    async fn read(&self, name: &str) -> Result<Bytes, StorageError>;

    async fn write(&self, name: &str, data: Bytes, content_type: &str)
        -> Result<(), StorageError>;

    /// Server-side copy within the bucket
    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError>;

    async fn delete(&self, name: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension() {
        assert_eq!(ObjectDescriptor::new("a.jpg").extension(), ".jpg");
        assert_eq!(ObjectDescriptor::new("dir/b.tar.gz").extension(), ".gz");
        assert_eq!(ObjectDescriptor::new("no-ext").extension(), "");
        assert_eq!(ObjectDescriptor::new("dir.jpg/file").extension(), "");
        assert_eq!(ObjectDescriptor::new("photos/.jpeg").extension(), ".jpeg");
    }

    #[test]
    fn test_is_jpeg_is_case_sensitive() {
        assert!(ObjectDescriptor::new("a.jpg").is_jpeg());
        assert!(ObjectDescriptor::new("2024/01/c.jpeg").is_jpeg());
        assert!(!ObjectDescriptor::new("A.JPG").is_jpeg());
        assert!(!ObjectDescriptor::new("b.png").is_jpeg());
        assert!(!ObjectDescriptor::new("a.jpg.bak").is_jpeg());
        assert!(!ObjectDescriptor::new("jpg").is_jpeg());
    }

    #[test]
    fn test_descriptor_from_gcs_item() {
        let item: ObjectDescriptor = serde_json::from_str(
            r#"{"kind":"storage#object","name":"a.jpg","contentType":"image/jpeg","size":"1024"}"#,
        )
        .unwrap();
        assert_eq!(item.name, "a.jpg");
        assert_eq!(item.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(item.size.as_deref(), Some("1024"));
    }
}
