//! # Domain Models
//!
//! These structs represent the core entities of the breachlog backend.
//! Posts are stored as JSON documents; serde defaults cover the fields
//! older documents may lack (`tags`, `comments`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Serde codec for the stored `date` field.
///
/// chrono's default serialization varies the fractional-second width
/// (whole seconds serialize without a fraction, sub-second times with
/// one), so two timestamps close together can compare out of order as
/// strings. Stores sort posts by comparing the serialized `date`
/// lexicographically; a fixed nine-digit fraction keeps string order
/// identical to chronological order.
pub mod stored_date {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&date.to_rfc3339_opts(SecondsFormat::Nanos, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(de)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(D::Error::custom)
    }
}

/// A reader comment attached to a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub body: String,
    pub date: DateTime<Utc>,
}

/// One incident report, as stored and listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    /// Derived from `description`: at most 150 chars plus an ellipsis marker.
    pub preview: String,
    pub description: String,
    /// Attacker infrastructure involved in the incident.
    pub infrastructure: Option<String>,
    pub categories: Option<String>,
    /// Exploited vulnerability.
    pub vulnerability: Option<String>,
    /// Targets of the exploit / source of the attack.
    pub targets: Option<String>,
    pub geography: Option<String>,
    pub references: Option<String>,
    /// Losses are free text ("100 BTC"), never parsed as numerics.
    pub loss_crypto: Option<String>,
    pub loss_fiat: Option<String>,
    pub compromised_at: Option<DateTime<Utc>>,
    pub reported_at: Option<DateTime<Utc>>,
    /// Creation time, set server-side. Immutable after creation.
    #[serde(with = "stored_date")]
    pub date: DateTime<Utc>,
    /// Public 12-character slug. Immutable after creation.
    pub permalink: String,
    pub author: Uuid,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// Raw, unescaped post fields as submitted by a client.
///
/// Every field is optional at this stage; the sanitizer decides which
/// ones are mandatory and degrades the rest to `None` individually.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPostInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub infrastructure: Option<String>,
    pub categories: Option<String>,
    pub vulnerability: Option<String>,
    pub targets: Option<String>,
    pub geography: Option<String>,
    pub references: Option<String>,
    pub loss_crypto: Option<String>,
    pub loss_fiat: Option<String>,
    /// Free-text date, parsed permissively.
    pub compromised_at: Option<String>,
    pub reported_at: Option<String>,
    pub tags: Option<Vec<String>>,
    pub author: Option<Uuid>,
}

/// A post that passed sanitization and is ready to persist.
///
/// Identical to [`Post`] minus the id, which the store generates.
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedPost {
    pub title: String,
    pub preview: String,
    pub description: String,
    pub infrastructure: Option<String>,
    pub categories: Option<String>,
    pub vulnerability: Option<String>,
    pub targets: Option<String>,
    pub geography: Option<String>,
    pub references: Option<String>,
    pub loss_crypto: Option<String>,
    pub loss_fiat: Option<String>,
    pub compromised_at: Option<DateTime<Utc>>,
    pub reported_at: Option<DateTime<Utc>>,
    #[serde(with = "stored_date")]
    pub date: DateTime<Utc>,
    pub permalink: String,
    pub author: Uuid,
    pub tags: Vec<String>,
    pub comments: Vec<Comment>,
}

/// Partial update for a post. Only present fields are replaced.
///
/// `date` and `permalink` have no slot here on purpose: both are
/// immutable after creation, so the type itself strips them from any
/// incoming payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPostPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub infrastructure: Option<String>,
    pub categories: Option<String>,
    pub vulnerability: Option<String>,
    pub targets: Option<String>,
    pub geography: Option<String>,
    pub references: Option<String>,
    pub loss_crypto: Option<String>,
    pub loss_fiat: Option<String>,
    pub compromised_at: Option<String>,
    pub reported_at: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Edit-form projection of a post: same fields, but `tags` flattened
/// into one comma-joined string for form consumption.
#[derive(Debug, Clone)]
pub struct PostForm {
    pub post: Post,
    pub tags: String,
}

impl From<Post> for PostForm {
    fn from(post: Post) -> Self {
        let tags = post.tags.join(",");
        Self { post, tags }
    }
}

/// Blog-wide configuration singleton.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub per_page: u64,
    pub use_search: bool,
    pub title: String,
    pub description: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            per_page: 15,
            use_search: false,
            title: "Blog".to_string(),
            description: String::new(),
        }
    }
}

/// Settings as submitted during install. `per_page` arrives as a raw
/// string and is validated before persisting.
#[derive(Debug, Clone, Deserialize)]
pub struct BlogSettingsInput {
    pub per_page: String,
    pub use_search: bool,
    pub title: String,
    pub description: String,
}

/// Partial settings update; only present fields are merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_search: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A user about to be persisted through the [`UserStore`] port.
///
/// [`UserStore`]: crate::traits::UserStore
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub login: String,
    pub email: Option<String>,
    /// Plain text here; the store implementation is responsible for
    /// hashing before anything touches disk.
    pub password: String,
}

/// One row of the tag aggregation: a tag and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}
