//! Multipart upload encoding and download decoding.
//!
//! Drive accepts metadata and content in a single request only as a
//! `multipart/related` body. The payload is JSON text, never raw binary, so
//! a fixed long numeric boundary cannot collide with it.

use crate::error::{DriveError, DriveResult};
use crate::types::{APP_DATA_FOLDER, JSON_MIME_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Boundary separating the metadata and payload parts.
pub const BOUNDARY: &str = "-------314159265358979323846";

const PART_HEADER: &str = "Content-Type: application/json\r\n\r\n";

/// JSON metadata part of an upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    pub name: String,
    pub mime_type: String,
    /// Set only when creating; pins the file inside the app folder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parents: Option<Vec<String>>,
}

impl FileMetadata {
    /// Metadata for creating a new file in the private app folder.
    pub fn for_create(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: JSON_MIME_TYPE.to_string(),
            parents: Some(vec![APP_DATA_FOLDER.to_string()]),
        }
    }

    /// Metadata for replacing an existing file's content.
    pub fn for_update(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: JSON_MIME_TYPE.to_string(),
            parents: None,
        }
    }
}

/// An encoded upload body and the `Content-Type` header that goes with it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultipartBody {
    pub body: String,
    pub content_type: String,
}

impl MultipartBody {
    /// The raw metadata part, if this body has the expected shape.
    pub fn metadata_part(&self) -> Option<&str> {
        self.parts().map(|(metadata, _)| metadata)
    }

    /// The raw payload part, if this body has the expected shape.
    pub fn payload_part(&self) -> Option<&str> {
        self.parts().map(|(_, payload)| payload)
    }

    fn parts(&self) -> Option<(&str, &str)> {
        let delimiter = format!("\r\n--{BOUNDARY}\r\n");
        let close = format!("\r\n--{BOUNDARY}--");

        let rest = self.body.strip_prefix(&delimiter)?;
        let rest = rest.strip_suffix(&close)?;
        let (metadata, payload) = rest.split_once(&delimiter)?;
        Some((
            metadata.strip_prefix(PART_HEADER)?,
            payload.strip_prefix(PART_HEADER)?,
        ))
    }
}

/// Encodes `metadata` and `payload` as a two-part `multipart/related` body.
pub fn encode<T: Serialize + ?Sized>(
    metadata: &FileMetadata,
    payload: &T,
) -> DriveResult<MultipartBody> {
    let metadata_json = serde_json::to_string(metadata)?;
    let payload_json = serde_json::to_string(payload)?;

    let delimiter = format!("\r\n--{BOUNDARY}\r\n");
    let close = format!("\r\n--{BOUNDARY}--");

    let mut body = String::with_capacity(
        metadata_json.len() + payload_json.len() + 2 * (delimiter.len() + PART_HEADER.len()) + close.len(),
    );
    body.push_str(&delimiter);
    body.push_str(PART_HEADER);
    body.push_str(&metadata_json);
    body.push_str(&delimiter);
    body.push_str(PART_HEADER);
    body.push_str(&payload_json);
    body.push_str(&close);

    Ok(MultipartBody {
        body,
        content_type: format!("multipart/related; boundary=\"{BOUNDARY}\""),
    })
}

/// Decodes a downloaded file body back into its JSON payload.
pub fn decode<T: DeserializeOwned>(raw: &[u8]) -> DriveResult<T> {
    serde_json::from_slice(raw).map_err(DriveError::from)
}
