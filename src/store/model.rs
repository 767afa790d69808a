//! Row types for captions and votes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// VoteValue
// ---------------------------------------------------------------------------

/// Direction of a vote.  Stored as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    pub fn as_i8(&self) -> i8 {
        match self {
            VoteValue::Up => 1,
            VoteValue::Down => -1,
        }
    }
}

impl From<VoteValue> for i8 {
    fn from(value: VoteValue) -> Self {
        value.as_i8()
    }
}

impl TryFrom<i8> for VoteValue {
    type Error = String;

    fn try_from(raw: i8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(VoteValue::Up),
            -1 => Ok(VoteValue::Down),
            other => Err(format!("invalid vote value {other}; expected 1 or -1")),
        }
    }
}

// ---------------------------------------------------------------------------
// Caption
// ---------------------------------------------------------------------------

/// A caption as shown in the feed.
///
/// `like_count` is maintained by the server; the client only displays it.
#[derive(Debug, Clone, PartialEq)]
pub struct Caption {
    pub id: String,
    pub content: String,
    pub created_datetime_utc: DateTime<Utc>,
    pub like_count: i64,
    pub image_url: Option<String>,
}

/// `captions` row with its embedded `images(url)` relation.
#[derive(Debug, Deserialize)]
pub(crate) struct CaptionRow {
    pub id: String,
    pub content: String,
    pub created_datetime_utc: DateTime<Utc>,
    #[serde(default)]
    pub like_count: Option<i64>,
    #[serde(default)]
    pub images: Option<EmbeddedImages>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImageRef {
    pub url: Option<String>,
}

/// The embedded relation comes back as an object or an array depending on how
/// the foreign key is declared.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum EmbeddedImages {
    One(ImageRef),
    Many(Vec<ImageRef>),
}

impl EmbeddedImages {
    fn into_url(self) -> Option<String> {
        match self {
            EmbeddedImages::One(image) => image.url,
            EmbeddedImages::Many(images) => images.into_iter().next().and_then(|i| i.url),
        }
    }
}

impl From<CaptionRow> for Caption {
    fn from(row: CaptionRow) -> Self {
        Self {
            id: row.id,
            content: row.content,
            created_datetime_utc: row.created_datetime_utc,
            like_count: row.like_count.unwrap_or_default(),
            image_url: row.images.and_then(EmbeddedImages::into_url),
        }
    }
}

// ---------------------------------------------------------------------------
// Vote rows
// ---------------------------------------------------------------------------

/// Body of a vote insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct NewVote<'a> {
    pub vote_value: VoteValue,
    pub profile_id: &'a str,
    pub caption_id: &'a str,
    pub created_datetime_utc: DateTime<Utc>,
    pub modified_datetime_utc: DateTime<Utc>,
}

/// Body of a vote update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct VoteChange {
    pub vote_value: VoteValue,
    pub modified_datetime_utc: DateTime<Utc>,
}

/// Projection used when loading a voter's existing votes.
#[derive(Debug, Deserialize)]
pub(crate) struct VoteRow {
    pub caption_id: String,
    pub vote_value: VoteValue,
}
