//! In-memory object store for integration tests
//!
//! Lists lexicographically like GCS, records every operation it receives and
//! can be told to fail reads, writes or the listing itself.

#![allow(dead_code)]

use bucket_resizer::storage::{Listed, ObjectDescriptor, ObjectListing, ObjectStore, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Operation received by a [`MemoryStore`], in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    List,
    Read(String),
    Write(String),
    Copy(String, String),
    Delete(String),
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, StoredObject>,
    ops: Vec<StoreOp>,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
    fail_listing_after: Option<usize>,
}

pub struct MemoryStore {
    bucket: String,
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, name: &str, data: impl Into<Bytes>, content_type: &str) {
        self.state().objects.insert(
            name.to_string(),
            StoredObject {
                data: data.into(),
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<StoredObject> {
        self.state().objects.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.state().objects.keys().cloned().collect()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.state().ops.clone()
    }

    /// Operations that touched `name` (list excluded)
    pub fn ops_for(&self, name: &str) -> Vec<StoreOp> {
        self.ops()
            .into_iter()
            .filter(|op| match op {
                StoreOp::List => false,
                StoreOp::Read(n) | StoreOp::Write(n) | StoreOp::Delete(n) => n == name,
                StoreOp::Copy(from, to) => from == name || to == name,
            })
            .collect()
    }

    pub fn clear_ops(&self) {
        self.state().ops.clear();
    }

    pub fn fail_reads_for(&self, name: &str) {
        self.state().failing_reads.insert(name.to_string());
    }

    pub fn fail_writes_for(&self, name: &str) {
        self.state().failing_writes.insert(name.to_string());
    }

    /// Make the listing fail after yielding `count` objects
    pub fn fail_listing_after(&self, count: usize) {
        self.state().fail_listing_after = Some(count);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list(&self) -> Box<dyn ObjectListing + '_> {
        let mut state = self.state();
        state.ops.push(StoreOp::List);
        let pending = state
            .objects
            .iter()
            .map(|(name, object)| ObjectDescriptor {
                name: name.clone(),
                content_type: Some(object.content_type.clone()),
                size: Some(object.data.len().to_string()),
            })
            .collect();

        Box::new(MemoryListing {
            pending,
            remaining_before_failure: state.fail_listing_after,
        })
    }

    async fn read(&self, name: &str) -> Result<Bytes, StorageError> {
        let mut state = self.state();
        state.ops.push(StoreOp::Read(name.to_string()));

        if state.failing_reads.contains(name) {
            return Err(unavailable(format!("read {name}")));
        }
        state
            .objects
            .get(name)
            .map(|object| object.data.clone())
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
            })
    }

    async fn write(
        &self,
        name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        state.ops.push(StoreOp::Write(name.to_string()));

        if state.failing_writes.contains(name) {
            return Err(unavailable(format!("write {name}")));
        }
        state.objects.insert(
            name.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        state.ops.push(StoreOp::Copy(from.to_string(), to.to_string()));

        if state.failing_writes.contains(to) {
            return Err(unavailable(format!("copy to {to}")));
        }
        let object = state
            .objects
            .get(from)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                name: from.to_string(),
            })?;
        state.objects.insert(to.to_string(), object);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let mut state = self.state();
        state.ops.push(StoreOp::Delete(name.to_string()));

        state
            .objects
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound {
                name: name.to_string(),
            })
    }
}

fn unavailable(operation: String) -> StorageError {
    StorageError::Http {
        status: 503,
        body: format!("{operation} disabled for this test"),
    }
}

/// Snapshot listing taken when [`MemoryStore::list`] is called
struct MemoryListing {
    pending: VecDeque<ObjectDescriptor>,
    remaining_before_failure: Option<usize>,
}

#[async_trait]
impl ObjectListing for MemoryListing {
    async fn next(&mut self) -> Listed {
        if let Some(remaining) = self.remaining_before_failure.as_mut() {
            if *remaining == 0 {
                return Listed::Failed(unavailable("listing".to_string()));
            }
            *remaining -= 1;
        }

        match self.pending.pop_front() {
            Some(descriptor) => Listed::Object(descriptor),
            None => Listed::Done,
        }
    }
}
