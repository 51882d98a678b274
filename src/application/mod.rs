//! Application Layer
//!
//! Use cases and the unit of work that commits them.

mod create_video;
mod unit_of_work;
mod update_media_status;
mod upload_video_media;

pub use create_video::{CreateVideo, CreateVideoInput};
pub use unit_of_work::UnitOfWork;
pub use update_media_status::{UpdateMediaStatus, UpdateMediaStatusInput};
pub use upload_video_media::{UploadVideoMedia, UploadVideoMediaInput};
