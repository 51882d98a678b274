//! UpdateMediaStatus use case
//!
//! The only path through which encoder results mutate a video's media
//! status. Accepts `Completed` and `Error`; anything else is rejected before
//! the video is touched.
//!
//! Results are applied unconditionally: a duplicate `Completed` for an
//! already completed video overwrites the encoded location again.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::unit_of_work::UnitOfWork;
use crate::dispatch::EventDispatcher;
use crate::domain::ports::VideoStore;
use crate::domain::video::{MediaStatus, VideoId};
use crate::error::{Error, Result};

/// Input of [`UpdateMediaStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateMediaStatusInput {
    pub video_id: VideoId,
    pub status: MediaStatus,
    pub encoded_path: Option<String>,
    pub error_message: Option<String>,
}

/// Applies an encoding outcome to a video and commits it.
pub struct UpdateMediaStatus {
    store: Arc<dyn VideoStore>,
    dispatcher: Arc<EventDispatcher>,
}

impl UpdateMediaStatus {
    pub fn new(store: Arc<dyn VideoStore>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    #[instrument(skip(self, input), fields(video_id = %input.video_id, status = %input.status))]
    pub async fn execute(&self, input: UpdateMediaStatusInput) -> Result<()> {
        let mut uow = UnitOfWork::new(Arc::clone(&self.store), Arc::clone(&self.dispatcher));

        let mut video = uow
            .get(&input.video_id)
            .await?
            .ok_or_else(|| Error::video_not_found(input.video_id))?;

        let previous = video.video_media().map(|m| m.status());
        if previous == Some(input.status) {
            debug!("Media already in target status, applying again");
        }

        match input.status {
            MediaStatus::Completed => {
                let encoded_path = input.encoded_path.ok_or_else(|| {
                    Error::Validation("Encoded path is required for a completed media".to_string())
                })?;
                video.mark_encoded(encoded_path)?;
                info!("Media encoded");
            }
            MediaStatus::Error => {
                warn!(
                    error = input.error_message.as_deref().unwrap_or("unknown"),
                    "Encoding failed"
                );
                video.mark_encoding_error()?;
            }
            MediaStatus::Pending | MediaStatus::Processing => {
                return Err(Error::Validation("Invalid media status".to_string()));
            }
        }

        uow.update(video);
        uow.commit().await
    }
}

impl std::fmt::Debug for UpdateMediaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateMediaStatus").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryVideoStore;
    use crate::domain::video::{MediaType, Rating, Video, VideoMetadata};
    use assert_matches::assert_matches;

    async fn setup(with_media: bool) -> (Arc<InMemoryVideoStore>, UpdateMediaStatus, VideoId) {
        let store = Arc::new(InMemoryVideoStore::new());
        let dispatcher = Arc::new(EventDispatcher::default());

        let mut video = Video::create(VideoMetadata {
            title: "Video".into(),
            description: "".into(),
            year_launched: 2001,
            duration: 10.0,
            rating: Rating::Er,
            opened: false,
        })
        .unwrap();
        if with_media {
            video.attach_media(MediaType::Video, "x.mp4".into(), "x.mp4".into());
        }
        let id = video.id();

        let mut uow = UnitOfWork::new(store.clone(), dispatcher.clone());
        uow.insert(video);
        uow.commit().await.unwrap();

        (store.clone(), UpdateMediaStatus::new(store, dispatcher), id)
    }

    fn input(video_id: VideoId, status: MediaStatus) -> UpdateMediaStatusInput {
        UpdateMediaStatusInput {
            video_id,
            status,
            encoded_path: None,
            error_message: None,
        }
    }

    #[tokio::test]
    async fn test_completed_sets_encoded_path() {
        let (store, use_case, id) = setup(true).await;

        use_case
            .execute(UpdateMediaStatusInput {
                encoded_path: Some("enc/x.mp4".into()),
                ..input(id, MediaStatus::Completed)
            })
            .await
            .unwrap();

        let video = store.get(&id).await.unwrap().unwrap();
        let media = video.video_media().unwrap();
        assert_eq!(media.status(), MediaStatus::Completed);
        assert_eq!(media.encoded_location(), Some("enc/x.mp4"));
    }

    #[tokio::test]
    async fn test_error_clears_encoded_path() {
        let (store, use_case, id) = setup(true).await;
        use_case
            .execute(UpdateMediaStatusInput {
                encoded_path: Some("enc/x.mp4".into()),
                ..input(id, MediaStatus::Completed)
            })
            .await
            .unwrap();

        use_case
            .execute(UpdateMediaStatusInput {
                error_message: Some("boom".into()),
                ..input(id, MediaStatus::Error)
            })
            .await
            .unwrap();

        let video = store.get(&id).await.unwrap().unwrap();
        let media = video.video_media().unwrap();
        assert_eq!(media.status(), MediaStatus::Error);
        assert_eq!(media.encoded_location(), None);
    }

    #[tokio::test]
    async fn test_invalid_status_leaves_media_untouched() {
        let (store, use_case, id) = setup(true).await;

        for status in [MediaStatus::Pending, MediaStatus::Processing] {
            let result = use_case.execute(input(id, status)).await;
            assert_matches!(result, Err(Error::Validation(msg)) if msg == "Invalid media status");
        }

        let media = store.get(&id).await.unwrap().unwrap().video_media().cloned().unwrap();
        assert_eq!(media.status(), MediaStatus::Pending);
        assert_eq!(media.encoded_location(), None);
    }

    #[tokio::test]
    async fn test_missing_video_is_not_found() {
        let (_store, use_case, _id) = setup(true).await;

        let result = use_case.execute(input(VideoId::new(), MediaStatus::Error)).await;

        assert_matches!(result, Err(Error::NotFound { entity: "Video", .. }));
    }

    #[tokio::test]
    async fn test_video_without_media() {
        let (_store, use_case, id) = setup(false).await;

        let result = use_case.execute(input(id, MediaStatus::Error)).await;

        assert_matches!(result, Err(Error::MediaNotPresent { .. }));
    }

    #[tokio::test]
    async fn test_completed_without_path_is_rejected() {
        let (_store, use_case, id) = setup(true).await;

        let result = use_case.execute(input(id, MediaStatus::Completed)).await;

        assert_matches!(result, Err(Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_duplicate_completed_is_reapplied() {
        let (store, use_case, id) = setup(true).await;

        for path in ["enc/x.mp4", "enc2/x.mp4"] {
            use_case
                .execute(UpdateMediaStatusInput {
                    encoded_path: Some(path.into()),
                    ..input(id, MediaStatus::Completed)
                })
                .await
                .unwrap();
        }

        let video = store.get(&id).await.unwrap().unwrap();
        assert_eq!(video.video_media().unwrap().encoded_location(), Some("enc2/x.mp4"));
    }
}
