//! Wire types for the captioning service.
//!
//! Request bodies and responses use camelCase field names.  The
//! generate-captions response comes back either as a bare array or wrapped in
//! `{ "captions": [...] }`; [`CaptionsResponse`] accepts both and
//! [`CaptionsResponse::into_captions`] flattens them to one list.

use serde::{Deserialize, Deserializer, Serialize};

/// Upload target issued by `generate-presigned-url`.
///
/// The presigned URL is single-use: every run requests a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignedTarget {
    /// Time-limited write endpoint on the storage host.
    pub presigned_url: String,
    /// Public URL the image is served from once uploaded.
    pub cdn_url: String,
}

/// One caption produced by the generate step.
///
/// Only `id` and `content` are guaranteed; anything else the service sends
/// is kept in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCaption {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub content: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GeneratedCaption {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            extra: serde_json::Map::new(),
        }
    }
}

/// Either response shape of `generate-captions`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CaptionsResponse {
    List(Vec<GeneratedCaption>),
    Wrapped {
        #[serde(default)]
        captions: Vec<GeneratedCaption>,
    },
}

impl CaptionsResponse {
    pub fn into_captions(self) -> Vec<GeneratedCaption> {
        match self {
            CaptionsResponse::List(captions) => captions,
            CaptionsResponse::Wrapped { captions } => captions,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresignRequest<'a> {
    pub content_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterRequest<'a> {
    pub image_url: &'a str,
    pub is_common_use: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RegisterResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub image_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest<'a> {
    pub image_id: &'a str,
}

/// Identifiers are strings on the wire, but numeric ids are tolerated.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}
