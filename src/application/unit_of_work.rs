//! Unit of Work
//!
//! Groups the writes of one request (or one consumed message) into a single
//! durable persist, then publishes the events buffered on every tracked
//! aggregate.
//!
//! # Delivery guarantee
//!
//! 1. All staged changes are persisted in one `VideoStore::persist` call.
//! 2. Only after that succeeds are events drained, in raise order, and
//!    handed to the dispatcher.
//! 3. If persisting fails nothing is published and the tracked aggregates
//!    keep their buffers, so the caller can retry `commit` or drop the unit.
//!
//! A dispatcher failure after a successful persist is returned from
//! `commit` but the write is not rolled back, and the events not yet
//! dispatched are dropped. Delivery is at most once after commit.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::dispatch::EventDispatcher;
use crate::domain::ports::{Change, VideoStore};
use crate::domain::video::{Video, VideoId};
use crate::error::Result;

/// Tracks video changes for one commit cycle.
pub struct UnitOfWork {
    store: Arc<dyn VideoStore>,
    dispatcher: Arc<EventDispatcher>,
    tracked: Vec<Video>,
    deleted: Vec<VideoId>,
}

impl UnitOfWork {
    pub fn new(store: Arc<dyn VideoStore>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            tracked: Vec::new(),
            deleted: Vec::new(),
        }
    }

    /// Load a video from the store.
    pub async fn get(&self, id: &VideoId) -> Result<Option<Video>> {
        self.store.get(id).await
    }

    /// Stage a new video.
    pub fn insert(&mut self, video: Video) {
        self.track(video);
    }

    /// Stage changes to an existing video.
    pub fn update(&mut self, video: Video) {
        self.track(video);
    }

    /// Stage a deletion.
    pub fn delete(&mut self, id: VideoId) {
        self.tracked.retain(|v| v.id() != id);
        if !self.deleted.contains(&id) {
            self.deleted.push(id);
        }
    }

    /// Aggregates staged for the next commit.
    pub fn tracked(&self) -> &[Video] {
        &self.tracked
    }

    pub fn has_changes(&self) -> bool {
        !self.tracked.is_empty() || !self.deleted.is_empty()
    }

    /// Persist staged changes, then publish buffered events.
    #[instrument(skip(self), fields(tracked = self.tracked.len(), deleted = self.deleted.len()))]
    pub async fn commit(&mut self) -> Result<()> {
        if !self.has_changes() {
            return Ok(());
        }

        let changes: Vec<Change> = self
            .tracked
            .iter()
            .map(|video| {
                let mut snapshot = video.clone();
                snapshot.take_events();
                Change::Upsert(snapshot)
            })
            .chain(self.deleted.iter().copied().map(Change::Delete))
            .collect();

        self.store.persist(&changes).await?;
        debug!(changes = changes.len(), "Changes persisted");

        self.deleted.clear();
        let tracked = std::mem::take(&mut self.tracked);

        for mut video in tracked {
            for event in video.take_events() {
                self.dispatcher.publish(&event).await?;
            }
        }

        Ok(())
    }

    fn track(&mut self, video: Video) {
        let id = video.id();
        self.deleted.retain(|d| *d != id);
        match self.tracked.iter_mut().find(|v| v.id() == id) {
            Some(existing) => {
                // Keep events raised on the earlier copy. A later copy cloned
                // from it already carries them; those are not buffered twice.
                let mut merged = existing.take_events();
                let mut video = video;
                for event in video.take_events() {
                    if !merged.contains(&event) {
                        merged.push(event);
                    }
                }
                for event in merged {
                    video.raise_event(event);
                }
                *existing = video;
            }
            None => self.tracked.push(video),
        }
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("tracked", &self.tracked.len())
            .field("deleted", &self.deleted.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventCollector, InMemoryVideoStore};
    use crate::dispatch::HandlerRegistry;
    use crate::domain::events::EventType;
    use crate::domain::video::{MediaType, Rating, VideoMetadata};
    use crate::error::Error;
    use assert_matches::assert_matches;

    fn video() -> Video {
        Video::create(VideoMetadata {
            title: "Video".into(),
            description: "desc".into(),
            year_launched: 2022,
            duration: 42.0,
            rating: Rating::Age12,
            opened: true,
        })
        .unwrap()
    }

    fn setup() -> (Arc<InMemoryVideoStore>, Arc<InMemoryEventCollector>, UnitOfWork) {
        let store = Arc::new(InMemoryVideoStore::new());
        let collector = Arc::new(InMemoryEventCollector::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            HandlerRegistry::new().register(EventType::VideoUploaded, collector.clone()),
        ));
        let uow = UnitOfWork::new(store.clone(), dispatcher);
        (store, collector, uow)
    }

    #[tokio::test]
    async fn test_commit_without_events_publishes_nothing() {
        let (store, collector, mut uow) = setup();
        let video = video();
        let id = video.id();

        uow.insert(video);
        uow.commit().await.unwrap();

        assert!(store.get(&id).await.unwrap().is_some());
        assert!(collector.is_empty());
    }

    #[tokio::test]
    async fn test_commit_publishes_in_raise_order_and_clears() {
        let (store, collector, mut uow) = setup();
        let mut video = video();
        video.attach_media(MediaType::Video, "a.mp4".into(), "videos/a.mp4".into());
        video.attach_media(MediaType::Video, "b.mp4".into(), "videos/b.mp4".into());
        let id = video.id();

        uow.insert(video);
        uow.commit().await.unwrap();

        let paths: Vec<_> = collector
            .events()
            .into_iter()
            .map(|e| match e {
                crate::domain::DomainEvent::VideoUploaded(e) => e.file_path,
            })
            .collect();
        assert_eq!(paths, vec!["videos/a.mp4", "videos/b.mp4"]);
        assert!(uow.tracked().is_empty());

        // Stored copy carries no events
        let stored = store.get(&id).await.unwrap().unwrap();
        assert!(stored.pending_events().is_empty());

        // A second commit has nothing left to publish
        uow.commit().await.unwrap();
        assert_eq!(collector.len(), 2);
    }

    #[tokio::test]
    async fn test_persist_failure_publishes_nothing_and_keeps_buffers() {
        let (store, collector, mut uow) = setup();
        let mut video = video();
        video.attach_media(MediaType::Video, "a.mp4".into(), "videos/a.mp4".into());
        let id = video.id();
        uow.insert(video);

        store.set_unavailable(true);
        assert_matches!(uow.commit().await, Err(Error::Persistence(_)));
        assert!(collector.is_empty());
        assert_eq!(uow.tracked()[0].pending_events().len(), 1);

        store.set_unavailable(false);
        uow.commit().await.unwrap();
        assert_eq!(collector.len(), 1);
        assert!(store.get(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_same_video_keeps_earlier_events() {
        let (_store, collector, mut uow) = setup();
        let mut first = video();
        first.attach_media(MediaType::Video, "a.mp4".into(), "videos/a.mp4".into());
        let mut second = first.clone();
        second.take_events();
        second.publish();

        uow.insert(first);
        uow.update(second);
        assert_eq!(uow.tracked().len(), 1);
        assert!(uow.tracked()[0].is_published());

        uow.commit().await.unwrap();
        assert_eq!(collector.len(), 1);
    }

    #[tokio::test]
    async fn test_update_with_clone_publishes_each_event_once() {
        let (_store, collector, mut uow) = setup();
        let mut video = video();
        video.attach_media(MediaType::Video, "a.mp4".into(), "videos/a.mp4".into());

        uow.insert(video.clone());
        video.publish();
        video.attach_media(MediaType::Trailer, "t.mp4".into(), "videos/t.mp4".into());
        video.attach_media(MediaType::Video, "b.mp4".into(), "videos/b.mp4".into());
        uow.update(video);

        assert_eq!(uow.tracked()[0].pending_events().len(), 2);
        uow.commit().await.unwrap();

        let paths: Vec<_> = collector
            .events()
            .into_iter()
            .map(|e| match e {
                crate::domain::DomainEvent::VideoUploaded(e) => e.file_path,
            })
            .collect();
        assert_eq!(paths, vec!["videos/a.mp4", "videos/b.mp4"]);
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _collector, mut uow) = setup();
        let video = video();
        let id = video.id();
        uow.insert(video);
        uow.commit().await.unwrap();

        uow.delete(id);
        uow.commit().await.unwrap();

        assert!(store.get(&id).await.unwrap().is_none());
    }
}
