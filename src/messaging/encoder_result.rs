//! Encoder result messages
//!
//! Wire shapes published by the external encoder and their mapping onto the
//! `UpdateMediaStatus` input.
//!
//! ```text
//! success: { "video":   { "encoded_video_folder", "file_path", "resource_id" } }
//! failure: { "message": { "file_path", "resource_id" }, "error": "..." }
//! ```

use serde::Deserialize;

use crate::application::UpdateMediaStatusInput;
use crate::domain::video::{MediaStatus, VideoId};
use crate::error::{Error, Result};

const SUCCESS_KEY: &str = "video";
const FAILURE_KEYS: [&str; 2] = ["message", "error"];

/// Payload of a successful encode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EncodedVideo {
    pub encoded_video_folder: String,
    pub file_path: String,
    pub resource_id: String,
}

/// Echo of the original upload event in a failure report.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FailedVideo {
    pub file_path: String,
    pub resource_id: String,
}

/// Result envelope sent back by the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EncoderResult {
    Success { video: EncodedVideo },
    Failure { message: FailedVideo, error: String },
}

impl EncoderResult {
    /// Decode a raw message body.
    ///
    /// The two shapes are mutually exclusive: a body carrying the success
    /// key alongside any failure key is rejected rather than guessed at.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
            Error::MalformedMessage(format!("not a recognised encoder result: {}", e))
        })?;

        if let Some(object) = value.as_object() {
            let success = object.contains_key(SUCCESS_KEY);
            let failure = FAILURE_KEYS.iter().any(|key| object.contains_key(*key));
            if success && failure {
                return Err(Error::MalformedMessage(
                    "ambiguous encoder result: both success and failure fields present"
                        .to_string(),
                ));
            }
        }

        serde_json::from_value(value).map_err(|e| {
            Error::MalformedMessage(format!("not a recognised encoder result: {}", e))
        })
    }

    pub fn resource_id(&self) -> &str {
        match self {
            EncoderResult::Success { video } => &video.resource_id,
            EncoderResult::Failure { message, .. } => &message.resource_id,
        }
    }

    /// Map onto the status update command.
    ///
    /// Success becomes `Completed` with `encoded_video_folder/file_path` as the
    /// encoded location; failure becomes `Error` carrying the encoder's message.
    pub fn into_status_update(self) -> Result<UpdateMediaStatusInput> {
        let video_id = parse_resource_id(self.resource_id())?;

        let input = match self {
            EncoderResult::Success { video } => UpdateMediaStatusInput {
                video_id,
                status: MediaStatus::Completed,
                encoded_path: Some(format!(
                    "{}/{}",
                    video.encoded_video_folder, video.file_path
                )),
                error_message: None,
            },
            EncoderResult::Failure { error, .. } => UpdateMediaStatusInput {
                video_id,
                status: MediaStatus::Error,
                encoded_path: None,
                error_message: Some(error),
            },
        };
        Ok(input)
    }
}

fn parse_resource_id(raw: &str) -> Result<VideoId> {
    raw.parse::<VideoId>()
        .map_err(|_| Error::MalformedMessage(format!("resource_id is not a video id: '{}'", raw)))
}
