//! Video Aggregate
//!
//! The `Video` aggregate root owns catalog metadata, its media files and the
//! encode-status state machine of those files.
//!
//! # Media Status State Machine
//!
//! ```text
//!   Pending ──▶ Processing ──┬──▶ Completed
//!                            └──▶ Error
//! ```
//!
//! `encoded_location` is set if and only if the status is `Completed`.
//! Transitions are only reachable through the `mark_*` methods on [`Video`].

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{DomainEvent, VideoUploadedEvent};
use crate::error::{Error, Result};

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 255;

/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 4096;

const MIN_YEAR: u16 = 1800;
const MAX_YEAR: u16 = 2100;

// =============================================================================
// Value Objects
// =============================================================================

/// Video identifier (value object).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub Uuid);

impl VideoId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VideoId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::Validation(format!("Invalid video id '{}': {}", s, e)))
    }
}

impl From<Uuid> for VideoId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Age rating, a closed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rating {
    #[serde(rename = "ER")]
    Er,
    #[serde(rename = "L")]
    L,
    #[serde(rename = "10")]
    Age10,
    #[serde(rename = "12")]
    Age12,
    #[serde(rename = "14")]
    Age14,
    #[serde(rename = "16")]
    Age16,
    #[serde(rename = "18")]
    Age18,
}

impl Rating {
    pub fn code(&self) -> &'static str {
        match self {
            Rating::Er => "ER",
            Rating::L => "L",
            Rating::Age10 => "10",
            Rating::Age12 => "12",
            Rating::Age14 => "14",
            Rating::Age16 => "16",
            Rating::Age18 => "18",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Rating {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ER" => Ok(Rating::Er),
            "L" => Ok(Rating::L),
            "10" => Ok(Rating::Age10),
            "12" => Ok(Rating::Age12),
            "14" => Ok(Rating::Age14),
            "16" => Ok(Rating::Age16),
            "18" => Ok(Rating::Age18),
            other => Err(Error::Validation(format!("Invalid rating: {}", other))),
        }
    }
}

/// Image attached to a video (banner, thumbnails).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMedia {
    pub name: String,
    pub location: String,
}

impl ImageMedia {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

// =============================================================================
// Media Entity
// =============================================================================

/// Encoding status of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl std::fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaStatus::Pending => write!(f, "PENDING"),
            MediaStatus::Processing => write!(f, "PROCESSING"),
            MediaStatus::Completed => write!(f, "COMPLETED"),
            MediaStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Which media slot of a video a file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Trailer,
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Trailer => write!(f, "trailer"),
        }
    }
}

/// Media file owned by a video. Not addressable on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub name: String,
    raw_location: String,
    encoded_location: Option<String>,
    status: MediaStatus,
}

impl Media {
    /// A freshly uploaded, not yet encoded file.
    pub fn pending(name: impl Into<String>, raw_location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_location: raw_location.into(),
            encoded_location: None,
            status: MediaStatus::Pending,
        }
    }

    pub fn raw_location(&self) -> &str {
        &self.raw_location
    }

    pub fn encoded_location(&self) -> Option<&str> {
        self.encoded_location.as_deref()
    }

    pub fn status(&self) -> MediaStatus {
        self.status
    }

    fn mark_processing(&mut self) {
        self.status = MediaStatus::Processing;
    }

    fn mark_encoded(&mut self, encoded_location: String) {
        self.encoded_location = Some(encoded_location);
        self.status = MediaStatus::Completed;
    }

    fn mark_error(&mut self) {
        self.encoded_location = None;
        self.status = MediaStatus::Error;
    }
}

// =============================================================================
// Video Aggregate
// =============================================================================

/// Catalog metadata accepted by [`Video::create`] and [`Video::update_metadata`].
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub year_launched: u16,
    pub duration: f64,
    pub rating: Rating,
    pub opened: bool,
}

/// Video aggregate root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    id: VideoId,
    title: String,
    description: String,
    year_launched: u16,
    opened: bool,
    published: bool,
    duration: f64,
    rating: Rating,
    created_at: DateTime<Utc>,

    banner: Option<ImageMedia>,
    thumbnail: Option<ImageMedia>,
    thumbnail_half: Option<ImageMedia>,

    video_media: Option<Media>,
    trailer_media: Option<Media>,

    categories: HashSet<Uuid>,
    genres: HashSet<Uuid>,
    cast_members: HashSet<Uuid>,

    /// Raised but not yet published events
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

impl Video {
    /// Create a new, unpublished video.
    pub fn create(metadata: VideoMetadata) -> Result<Self> {
        validate(&metadata)?;

        Ok(Self {
            id: VideoId::new(),
            title: metadata.title,
            description: metadata.description,
            year_launched: metadata.year_launched,
            opened: metadata.opened,
            published: false,
            duration: metadata.duration,
            rating: metadata.rating,
            created_at: Utc::now(),
            banner: None,
            thumbnail: None,
            thumbnail_half: None,
            video_media: None,
            trailer_media: None,
            categories: HashSet::new(),
            genres: HashSet::new(),
            cast_members: HashSet::new(),
            events: Vec::new(),
        })
    }

    /// Replace the catalog metadata, revalidating it.
    pub fn update_metadata(&mut self, metadata: VideoMetadata) -> Result<()> {
        validate(&metadata)?;

        self.title = metadata.title;
        self.description = metadata.description;
        self.year_launched = metadata.year_launched;
        self.duration = metadata.duration;
        self.rating = metadata.rating;
        self.opened = metadata.opened;
        Ok(())
    }

    pub fn id(&self) -> VideoId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn year_launched(&self) -> u16 {
        self.year_launched
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn rating(&self) -> Rating {
        self.rating
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn is_published(&self) -> bool {
        self.published
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn publish(&mut self) {
        self.published = true;
    }

    pub fn unpublish(&mut self) {
        self.published = false;
    }

    // -------------------------------------------------------------------------
    // Images
    // -------------------------------------------------------------------------

    pub fn banner(&self) -> Option<&ImageMedia> {
        self.banner.as_ref()
    }

    pub fn thumbnail(&self) -> Option<&ImageMedia> {
        self.thumbnail.as_ref()
    }

    pub fn thumbnail_half(&self) -> Option<&ImageMedia> {
        self.thumbnail_half.as_ref()
    }

    pub fn replace_banner(&mut self, banner: Option<ImageMedia>) {
        self.banner = banner;
    }

    pub fn replace_thumbnail(&mut self, thumbnail: Option<ImageMedia>) {
        self.thumbnail = thumbnail;
    }

    pub fn replace_thumbnail_half(&mut self, thumbnail_half: Option<ImageMedia>) {
        self.thumbnail_half = thumbnail_half;
    }

    // -------------------------------------------------------------------------
    // Relations
    // -------------------------------------------------------------------------

    pub fn categories(&self) -> &HashSet<Uuid> {
        &self.categories
    }

    pub fn genres(&self) -> &HashSet<Uuid> {
        &self.genres
    }

    pub fn cast_members(&self) -> &HashSet<Uuid> {
        &self.cast_members
    }

    pub fn add_category(&mut self, id: Uuid) {
        self.categories.insert(id);
    }

    pub fn remove_category(&mut self, id: &Uuid) {
        self.categories.remove(id);
    }

    pub fn add_genre(&mut self, id: Uuid) {
        self.genres.insert(id);
    }

    pub fn remove_genre(&mut self, id: &Uuid) {
        self.genres.remove(id);
    }

    pub fn add_cast_member(&mut self, id: Uuid) {
        self.cast_members.insert(id);
    }

    pub fn remove_cast_member(&mut self, id: &Uuid) {
        self.cast_members.remove(id);
    }

    // -------------------------------------------------------------------------
    // Media
    // -------------------------------------------------------------------------

    pub fn video_media(&self) -> Option<&Media> {
        self.video_media.as_ref()
    }

    pub fn trailer_media(&self) -> Option<&Media> {
        self.trailer_media.as_ref()
    }

    /// Attach an uploaded file to one of the media slots.
    ///
    /// The attached media always starts `Pending`. Attaching the primary
    /// video file raises a [`VideoUploadedEvent`] so it gets sent to encode.
    pub fn attach_media(&mut self, media_type: MediaType, name: String, raw_location: String) {
        let media = Media::pending(name, raw_location.clone());
        match media_type {
            MediaType::Video => {
                self.video_media = Some(media);
                self.raise_event(DomainEvent::VideoUploaded(VideoUploadedEvent::new(
                    self.id,
                    raw_location,
                )));
            }
            MediaType::Trailer => {
                self.trailer_media = Some(media);
            }
        }
    }

    /// Pending/Processing -> Processing.
    pub fn mark_sent_to_encode(&mut self) -> Result<()> {
        self.media_mut()?.mark_processing();
        Ok(())
    }

    /// Any -> Completed, recording where the encoded output lives.
    pub fn mark_encoded(&mut self, encoded_location: impl Into<String>) -> Result<()> {
        let encoded_location = encoded_location.into();
        self.media_mut()?.mark_encoded(encoded_location);
        Ok(())
    }

    /// Any -> Error, dropping any encoded location.
    pub fn mark_encoding_error(&mut self) -> Result<()> {
        self.media_mut()?.mark_error();
        Ok(())
    }

    fn media_mut(&mut self) -> Result<&mut Media> {
        let id = self.id;
        self.video_media.as_mut().ok_or_else(|| Error::MediaNotPresent {
            video_id: id.to_string(),
        })
    }

    // -------------------------------------------------------------------------
    // Domain Events
    // -------------------------------------------------------------------------

    /// Append an event to the buffer. No I/O happens here.
    pub fn raise_event(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Events raised since the last drain, in raise order.
    pub fn pending_events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Drain the event buffer.
    pub fn take_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }
}

impl PartialEq for Video {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

fn validate(metadata: &VideoMetadata) -> Result<()> {
    let mut errors = Vec::new();

    if metadata.title.trim().is_empty() {
        errors.push("title cannot be empty".to_string());
    }
    if metadata.title.chars().count() > MAX_TITLE_LEN {
        errors.push(format!(
            "title cannot be longer than {} characters",
            MAX_TITLE_LEN
        ));
    }
    if metadata.description.chars().count() > MAX_DESCRIPTION_LEN {
        errors.push(format!(
            "description cannot be longer than {} characters",
            MAX_DESCRIPTION_LEN
        ));
    }
    if !(MIN_YEAR..=MAX_YEAR).contains(&metadata.year_launched) {
        errors.push(format!(
            "year_launched must be between {} and {}",
            MIN_YEAR, MAX_YEAR
        ));
    }
    if !metadata.duration.is_finite() || metadata.duration < 0.0 {
        errors.push("duration must be a non-negative number".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(errors.join(", ")))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            title: "The Matrix".to_string(),
            description: "Wake up, Neo".to_string(),
            year_launched: 1999,
            duration: 136.0,
            rating: Rating::Age14,
            opened: false,
        }
    }

    fn video_with_media(status: MediaStatus) -> Video {
        let mut video = Video::create(metadata()).unwrap();
        video.attach_media(MediaType::Video, "x.mp4".into(), "videos/x.mp4".into());
        video.take_events();
        match status {
            MediaStatus::Pending => {}
            MediaStatus::Processing => video.mark_sent_to_encode().unwrap(),
            MediaStatus::Completed => video.mark_encoded("enc/x.mp4").unwrap(),
            MediaStatus::Error => video.mark_encoding_error().unwrap(),
        }
        video
    }

    fn any_status() -> impl Strategy<Value = MediaStatus> {
        prop_oneof![
            Just(MediaStatus::Pending),
            Just(MediaStatus::Processing),
            Just(MediaStatus::Completed),
            Just(MediaStatus::Error),
        ]
    }

    #[test]
    fn test_create_valid_video() {
        let video = Video::create(metadata()).unwrap();

        assert_eq!(video.title(), "The Matrix");
        assert!(!video.is_published());
        assert!(video.video_media().is_none());
        assert!(video.pending_events().is_empty());
    }

    #[test]
    fn test_create_collects_all_violations() {
        let err = Video::create(VideoMetadata {
            title: "".into(),
            description: "d".repeat(MAX_DESCRIPTION_LEN + 1),
            year_launched: 1200,
            ..metadata()
        })
        .unwrap_err();

        assert_matches!(err, Error::Validation(msg) => {
            assert!(msg.contains("title cannot be empty"));
            assert!(msg.contains("description cannot be longer"));
            assert!(msg.contains("year_launched"));
        });
    }

    #[test]
    fn test_title_length_bound() {
        let ok = Video::create(VideoMetadata {
            title: "t".repeat(MAX_TITLE_LEN),
            ..metadata()
        });
        assert!(ok.is_ok());

        let too_long = Video::create(VideoMetadata {
            title: "t".repeat(MAX_TITLE_LEN + 1),
            ..metadata()
        });
        assert_matches!(too_long, Err(Error::Validation(_)));
    }

    #[test]
    fn test_rating_codes() {
        assert_eq!("18".parse::<Rating>().unwrap(), Rating::Age18);
        assert_eq!(Rating::Er.to_string(), "ER");
        assert_matches!("21".parse::<Rating>(), Err(Error::Validation(_)));
        assert_eq!(serde_json::to_string(&Rating::Age10).unwrap(), "\"10\"");
    }

    #[test]
    fn test_video_id_parse() {
        let id = VideoId::new();
        assert_eq!(id.to_string().parse::<VideoId>().unwrap(), id);
        assert_matches!("not-a-uuid".parse::<VideoId>(), Err(Error::Validation(_)));
    }

    #[test]
    fn test_attach_primary_media_raises_upload_event() {
        let mut video = Video::create(metadata()).unwrap();
        video.attach_media(MediaType::Video, "x.mp4".into(), "videos/x.mp4".into());

        let media = video.video_media().unwrap();
        assert_eq!(media.status(), MediaStatus::Pending);
        assert_eq!(media.raw_location(), "videos/x.mp4");

        let events = video.take_events();
        assert_eq!(events.len(), 1);
        assert_matches!(&events[0], DomainEvent::VideoUploaded(e) => {
            assert_eq!(e.resource_id, video.id());
            assert_eq!(e.file_path, "videos/x.mp4");
        });
        assert!(video.pending_events().is_empty());
    }

    #[test]
    fn test_attach_trailer_raises_nothing() {
        let mut video = Video::create(metadata()).unwrap();
        video.attach_media(MediaType::Trailer, "t.mp4".into(), "videos/t.mp4".into());

        assert!(video.trailer_media().is_some());
        assert!(video.video_media().is_none());
        assert!(video.pending_events().is_empty());
    }

    #[test]
    fn test_sent_to_encode() {
        let mut video = video_with_media(MediaStatus::Pending);
        video.mark_sent_to_encode().unwrap();
        assert_eq!(video.video_media().unwrap().status(), MediaStatus::Processing);

        video.mark_sent_to_encode().unwrap();
        assert_eq!(video.video_media().unwrap().status(), MediaStatus::Processing);
    }

    #[test]
    fn test_transitions_without_media_fail_and_leave_video_unchanged() {
        let mut video = Video::create(metadata()).unwrap();
        let before = serde_json::to_value(&video).unwrap();

        assert_matches!(video.mark_sent_to_encode(), Err(Error::MediaNotPresent { .. }));
        assert_matches!(video.mark_encoded("enc/x.mp4"), Err(Error::MediaNotPresent { .. }));
        assert_matches!(video.mark_encoding_error(), Err(Error::MediaNotPresent { .. }));

        assert_eq!(serde_json::to_value(&video).unwrap(), before);
        assert!(video.pending_events().is_empty());
    }

    #[test]
    fn test_trailer_alone_does_not_enable_transitions() {
        let mut video = Video::create(metadata()).unwrap();
        video.attach_media(MediaType::Trailer, "t.mp4".into(), "videos/t.mp4".into());

        assert_matches!(video.mark_encoded("enc"), Err(Error::MediaNotPresent { .. }));
        assert!(video.trailer_media().unwrap().encoded_location().is_none());
    }

    #[test]
    fn test_relations_are_sets() {
        let mut video = Video::create(metadata()).unwrap();
        let category = Uuid::new_v4();

        video.add_category(category);
        video.add_category(category);
        video.add_genre(Uuid::new_v4());
        assert_eq!(video.categories().len(), 1);
        assert_eq!(video.genres().len(), 1);

        video.remove_category(&category);
        assert!(video.categories().is_empty());
    }

    #[test]
    fn test_events_are_not_serialized() {
        let mut video = video_with_media(MediaStatus::Pending);
        video.attach_media(MediaType::Video, "y.mp4".into(), "videos/y.mp4".into());

        let json = serde_json::to_string(&video).unwrap();
        let restored: Video = serde_json::from_str(&json).unwrap();
        assert!(restored.pending_events().is_empty());
        assert_eq!(restored.id(), video.id());
    }

    proptest! {
        #[test]
        fn prop_mark_encoded_completes(
            from_processing in any::<bool>(),
            path in "[a-z0-9/_.-]{1,40}",
        ) {
            let start = if from_processing {
                MediaStatus::Processing
            } else {
                MediaStatus::Pending
            };
            let mut video = video_with_media(start);

            video.mark_encoded(path.clone()).unwrap();

            let media = video.video_media().unwrap();
            prop_assert_eq!(media.status(), MediaStatus::Completed);
            prop_assert_eq!(media.encoded_location(), Some(path.as_str()));
        }

        #[test]
        fn prop_mark_error_clears_encoded_location(start in any_status()) {
            let mut video = video_with_media(start);

            video.mark_encoding_error().unwrap();

            let media = video.video_media().unwrap();
            prop_assert_eq!(media.status(), MediaStatus::Error);
            prop_assert_eq!(media.encoded_location(), None);
        }

        #[test]
        fn prop_encoded_location_iff_completed(start in any_status()) {
            let video = video_with_media(start);
            let media = video.video_media().unwrap();

            prop_assert_eq!(
                media.encoded_location().is_some(),
                media.status() == MediaStatus::Completed
            );
        }
    }
}
