//! CreateVideo use case

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::unit_of_work::UnitOfWork;
use crate::dispatch::EventDispatcher;
use crate::domain::ports::VideoStore;
use crate::domain::video::{Video, VideoId, VideoMetadata};
use crate::error::Result;

/// Input of [`CreateVideo`].
#[derive(Debug, Clone)]
pub struct CreateVideoInput {
    pub metadata: VideoMetadata,
    pub categories: Vec<Uuid>,
    pub genres: Vec<Uuid>,
    pub cast_members: Vec<Uuid>,
}

/// Registers a new video, without media.
pub struct CreateVideo {
    store: Arc<dyn VideoStore>,
    dispatcher: Arc<EventDispatcher>,
}

impl CreateVideo {
    pub fn new(store: Arc<dyn VideoStore>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    #[instrument(skip(self, input), fields(title = %input.metadata.title))]
    pub async fn execute(&self, input: CreateVideoInput) -> Result<VideoId> {
        let mut video = Video::create(input.metadata)?;
        input.categories.into_iter().for_each(|id| video.add_category(id));
        input.genres.into_iter().for_each(|id| video.add_genre(id));
        input
            .cast_members
            .into_iter()
            .for_each(|id| video.add_cast_member(id));

        let id = video.id();
        let mut uow = UnitOfWork::new(Arc::clone(&self.store), Arc::clone(&self.dispatcher));
        uow.insert(video);
        uow.commit().await?;

        info!(video_id = %id, "Video created");
        Ok(id)
    }
}

impl std::fmt::Debug for CreateVideo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateVideo").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryVideoStore;
    use crate::domain::video::Rating;
    use crate::error::Error;
    use assert_matches::assert_matches;

    fn use_case(store: Arc<InMemoryVideoStore>) -> CreateVideo {
        CreateVideo::new(store, Arc::new(EventDispatcher::default()))
    }

    #[tokio::test]
    async fn test_create_persists_video_with_relations() {
        let store = Arc::new(InMemoryVideoStore::new());
        let category = Uuid::new_v4();

        let id = use_case(store.clone())
            .execute(CreateVideoInput {
                metadata: VideoMetadata {
                    title: "Video".into(),
                    description: "".into(),
                    year_launched: 2015,
                    duration: 99.5,
                    rating: Rating::Age18,
                    opened: true,
                },
                categories: vec![category, category],
                genres: vec![Uuid::new_v4()],
                cast_members: vec![],
            })
            .await
            .unwrap();

        let video = store.get(&id).await.unwrap().unwrap();
        assert_eq!(video.categories().len(), 1);
        assert!(video.categories().contains(&category));
        assert_eq!(video.genres().len(), 1);
        assert!(video.video_media().is_none());
    }

    #[tokio::test]
    async fn test_invalid_metadata_is_not_persisted() {
        let store = Arc::new(InMemoryVideoStore::new());

        let result = use_case(store.clone())
            .execute(CreateVideoInput {
                metadata: VideoMetadata {
                    title: "   ".into(),
                    description: "".into(),
                    year_launched: 2015,
                    duration: 1.0,
                    rating: Rating::L,
                    opened: false,
                },
                categories: vec![],
                genres: vec![],
                cast_members: vec![],
            })
            .await;

        assert_matches!(result, Err(Error::Validation(_)));
        assert!(store.is_empty());
    }
}
