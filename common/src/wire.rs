//! Lenient decoding helpers for identifiers as the match server sends them.
//!
//! Stored documents use string ids, turn numbers sometimes arrive as plain
//! integers, and player references may be populated documents.

use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum WireId {
    Text(String),
    Number(i64),
}

impl From<WireId> for String {
    fn from(id: WireId) -> Self {
        match id {
            WireId::Text(text) => text,
            WireId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireRef {
    Id(WireId),
    Document {
        #[serde(rename = "_id")]
        id: WireId,
        #[serde(default)]
        username: Option<String>,
    },
}

impl WireRef {
    /// The referenced id, whether or not the document was populated
    fn into_id(self) -> String {
        match self {
            WireRef::Id(id) | WireRef::Document { id, .. } => id.into(),
        }
    }

    /// The username when populated, the id otherwise
    fn into_label(self) -> String {
        match self {
            WireRef::Document { username: Some(name), .. } => name,
            other => other.into_id(),
        }
    }
}

/// Plain identifiers: strings, or integers rendered as strings
pub(crate) fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireId::deserialize(deserializer).map(String::from)
}

pub(crate) fn optional_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<WireId>::deserialize(deserializer)?.map(String::from))
}

/// Identity fields: compared against the local user id
pub(crate) fn reference_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireRef::deserialize(deserializer).map(WireRef::into_id)
}

pub(crate) fn optional_reference_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<WireRef>::deserialize(deserializer)?.map(WireRef::into_id))
}

/// Display-only fields: shown to the player as is
pub(crate) fn label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    WireRef::deserialize(deserializer).map(WireRef::into_label)
}

pub(crate) fn optional_label<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<WireRef>::deserialize(deserializer)?.map(WireRef::into_label))
}

/// Win counters may be missing or null on freshly created matches
pub(crate) fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(0))
}
