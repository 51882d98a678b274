//! In-memory video store
//!
//! Process-local `VideoStore`. A batch is applied under one write lock, so
//! readers see either all of it or none of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::domain::ports::{Change, VideoStore};
use crate::domain::video::{Video, VideoId};
use crate::error::{Error, Result};

/// HashMap-backed video persistence.
#[derive(Debug, Default)]
pub struct InMemoryVideoStore {
    videos: RwLock<HashMap<VideoId, Video>>,
    unavailable: AtomicBool,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every `persist` fails.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.videos.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.read().is_empty()
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn get(&self, id: &VideoId) -> Result<Option<Video>> {
        Ok(self.videos.read().get(id).cloned())
    }

    async fn persist(&self, changes: &[Change]) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Persistence("video store unavailable".to_string()));
        }

        let mut videos = self.videos.write();
        for change in changes {
            match change {
                Change::Upsert(video) => {
                    videos.insert(video.id(), video.clone());
                }
                Change::Delete(id) => {
                    videos.remove(id);
                }
            }
        }
        debug!(changes = changes.len(), total = videos.len(), "Persisted batch");
        Ok(())
    }
}
