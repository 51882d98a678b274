//! UploadVideoMedia use case
//!
//! Stores an uploaded file and attaches it to a video. Attaching the primary
//! video file raises `VideoUploaded`, which the commit hands to the encoder
//! dispatch handler.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, instrument};

use super::unit_of_work::UnitOfWork;
use crate::dispatch::EventDispatcher;
use crate::domain::ports::{StorageService, VideoStore};
use crate::domain::video::{MediaType, VideoId};
use crate::error::{Error, Result};

/// Input of [`UploadVideoMedia`].
#[derive(Debug, Clone)]
pub struct UploadVideoMediaInput {
    pub video_id: VideoId,
    pub media_type: MediaType,
    pub file_name: String,
    pub content: Bytes,
    pub content_type: String,
}

/// Uploads a media file and attaches it to its video.
pub struct UploadVideoMedia {
    store: Arc<dyn VideoStore>,
    storage: Arc<dyn StorageService>,
    dispatcher: Arc<EventDispatcher>,
}

impl UploadVideoMedia {
    pub fn new(
        store: Arc<dyn VideoStore>,
        storage: Arc<dyn StorageService>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            store,
            storage,
            dispatcher,
        }
    }

    /// Returns the stored path of the uploaded file.
    #[instrument(skip(self, input), fields(video_id = %input.video_id, media_type = %input.media_type))]
    pub async fn execute(&self, input: UploadVideoMediaInput) -> Result<String> {
        let file_name = input.file_name.trim();
        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
            return Err(Error::Validation(format!(
                "Invalid media file name: '{}'",
                input.file_name
            )));
        }

        let mut uow = UnitOfWork::new(Arc::clone(&self.store), Arc::clone(&self.dispatcher));
        let mut video = uow
            .get(&input.video_id)
            .await?
            .ok_or_else(|| Error::video_not_found(input.video_id))?;

        let name = format!("videos/{}/{}", input.video_id, file_name);
        let path = self
            .storage
            .upload(&name, input.content, &input.content_type)
            .await?;

        video.attach_media(input.media_type, file_name.to_string(), path.clone());
        uow.update(video);
        uow.commit().await?;

        info!(path = %path, "Media uploaded");
        Ok(path)
    }
}

impl std::fmt::Debug for UploadVideoMedia {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadVideoMedia").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryEventCollector, InMemoryStorage, InMemoryVideoStore};
    use crate::application::{CreateVideo, CreateVideoInput};
    use crate::dispatch::HandlerRegistry;
    use crate::domain::events::{DomainEvent, EventType};
    use crate::domain::video::{MediaStatus, Rating, VideoMetadata};
    use assert_matches::assert_matches;

    struct Fixture {
        store: Arc<InMemoryVideoStore>,
        storage: Arc<InMemoryStorage>,
        collector: Arc<InMemoryEventCollector>,
        use_case: UploadVideoMedia,
        video_id: VideoId,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryVideoStore::new());
        let storage = Arc::new(InMemoryStorage::new());
        let collector = Arc::new(InMemoryEventCollector::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            HandlerRegistry::new().register(EventType::VideoUploaded, collector.clone()),
        ));

        let video_id = CreateVideo::new(store.clone(), dispatcher.clone())
            .execute(CreateVideoInput {
                metadata: VideoMetadata {
                    title: "Video".into(),
                    description: "".into(),
                    year_launched: 2010,
                    duration: 60.0,
                    rating: Rating::Age16,
                    opened: false,
                },
                categories: vec![],
                genres: vec![],
                cast_members: vec![],
            })
            .await
            .unwrap();

        let use_case = UploadVideoMedia::new(store.clone(), storage.clone(), dispatcher);
        Fixture {
            store,
            storage,
            collector,
            use_case,
            video_id,
        }
    }

    fn input(video_id: VideoId, media_type: MediaType) -> UploadVideoMediaInput {
        UploadVideoMediaInput {
            video_id,
            media_type,
            file_name: "x.mp4".into(),
            content: Bytes::from_static(b"\x00\x00\x00\x18ftypmp42"),
            content_type: "video/mp4".into(),
        }
    }

    #[tokio::test]
    async fn test_upload_primary_media_raises_event() {
        let f = fixture().await;

        let path = f.use_case.execute(input(f.video_id, MediaType::Video)).await.unwrap();

        assert_eq!(path, format!("videos/{}/x.mp4", f.video_id));
        assert!(f.storage.contains(&path));

        let video = f.store.get(&f.video_id).await.unwrap().unwrap();
        let media = video.video_media().unwrap();
        assert_eq!(media.status(), MediaStatus::Pending);
        assert_eq!(media.raw_location(), path);

        let events = f.collector.events();
        assert_eq!(events.len(), 1);
        assert_matches!(&events[0], DomainEvent::VideoUploaded(e) => {
            assert_eq!(e.resource_id, f.video_id);
            assert_eq!(e.file_path, path);
        });
    }

    #[tokio::test]
    async fn test_upload_trailer_raises_nothing() {
        let f = fixture().await;

        f.use_case.execute(input(f.video_id, MediaType::Trailer)).await.unwrap();

        let video = f.store.get(&f.video_id).await.unwrap().unwrap();
        assert!(video.trailer_media().is_some());
        assert!(f.collector.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_video() {
        let f = fixture().await;

        let result = f.use_case.execute(input(VideoId::new(), MediaType::Video)).await;

        assert_matches!(result, Err(Error::NotFound { .. }));
        assert!(f.storage.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_file_names() {
        let f = fixture().await;

        for name in ["", "../x.mp4", "a/b.mp4"] {
            let result = f
                .use_case
                .execute(UploadVideoMediaInput {
                    file_name: name.into(),
                    ..input(f.video_id, MediaType::Video)
                })
                .await;
            assert_matches!(result, Err(Error::Validation(_)));
        }
    }
}
