//! # PostSanitizer
//!
//! Turns raw client input into a persistable post: HTML-escapes every
//! free-text field, derives the preview, parses the free-text dates,
//! and attaches the permalink and creation timestamp.
//!
//! Required fields abort with a validation error; every optional field
//! is handled in isolation, so one bad value degrades to `None` without
//! touching its neighbors.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rand::Rng;
use serde_json::{json, Value};

use bl_core::error::{AppError, Result};
use bl_core::models::{RawPostInput, RawPostPatch, SanitizedPost};
use bl_core::traits::Document;

/// 26 uppercase letters + 10 digits over 12 positions gives roughly
/// 4.7e18 combinations; collisions are treated as practically
/// impossible and the generated permalink is NOT checked against
/// existing posts. Known weakness, accepted for this domain.
const PERMALINK_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const PERMALINK_LEN: usize = 12;

/// Preview length in characters, before the ellipsis marker.
const PREVIEW_LEN: usize = 150;
const ELLIPSIS: &str = "...";

/// Validates and escapes a raw post. Invoked on create only; edits go
/// through [`sanitize_patch`].
pub fn sanitize(raw: RawPostInput) -> Result<SanitizedPost> {
    let title = required_text("title", raw.title)?;
    let description = required_attr_text("description", raw.description)?;
    let author = raw
        .author
        .ok_or_else(|| AppError::Validation("author is required".to_string()))?;

    // Derived from the escaped text, so entity expansions count
    // against the budget.
    let preview = preview_of(&description);

    Ok(SanitizedPost {
        title,
        preview,
        description,
        infrastructure: optional_text(raw.infrastructure),
        categories: optional_text(raw.categories),
        vulnerability: optional_text(raw.vulnerability),
        targets: optional_text(raw.targets),
        geography: optional_text(raw.geography),
        references: optional_text(raw.references),
        loss_crypto: optional_text(raw.loss_crypto),
        loss_fiat: optional_text(raw.loss_fiat),
        compromised_at: raw.compromised_at.as_deref().and_then(parse_when),
        reported_at: raw.reported_at.as_deref().and_then(parse_when),
        date: Utc::now(),
        permalink: generate_permalink(),
        author,
        tags: raw.tags.unwrap_or_default(),
        comments: Vec::new(),
    })
}

/// Normalizes an edit patch into a `$set`-style document containing
/// only the fields present in the patch. The patch type has no slot
/// for `date` or `permalink`, so neither can ever reach the store
/// through an edit. When the description changes the preview is
/// re-derived alongside it.
pub fn sanitize_patch(patch: RawPostPatch) -> Document {
    let mut doc = Document::new();

    if let Some(title) = patch.title {
        doc.insert("title".to_string(), json!(escape_text(&title)));
    }
    if let Some(description) = patch.description {
        let escaped = escape_attr_text(&description);
        doc.insert("preview".to_string(), json!(preview_of(&escaped)));
        doc.insert("description".to_string(), json!(escaped));
    }

    let text_fields = [
        ("infrastructure", patch.infrastructure),
        ("categories", patch.categories),
        ("vulnerability", patch.vulnerability),
        ("targets", patch.targets),
        ("geography", patch.geography),
        ("references", patch.references),
        ("loss_crypto", patch.loss_crypto),
        ("loss_fiat", patch.loss_fiat),
    ];
    for (field, value) in text_fields {
        if let Some(value) = value {
            doc.insert(field.to_string(), json!(escape_text(&value)));
        }
    }

    let date_fields = [
        ("compromised_at", patch.compromised_at),
        ("reported_at", patch.reported_at),
    ];
    for (field, value) in date_fields {
        if let Some(raw) = value {
            // Unparseable dates degrade to null, same as on create.
            let parsed = parse_when(&raw).map(|dt| json!(dt)).unwrap_or(Value::Null);
            doc.insert(field.to_string(), parsed);
        }
    }

    if let Some(tags) = patch.tags {
        doc.insert("tags".to_string(), json!(tags));
    }

    doc
}

/// First `PREVIEW_LEN` characters plus an ellipsis marker when the
/// text is longer; the text verbatim otherwise.
pub fn preview_of(text: &str) -> String {
    if text.chars().count() > PREVIEW_LEN {
        let mut preview: String = text.chars().take(PREVIEW_LEN).collect();
        preview.push_str(ELLIPSIS);
        preview
    } else {
        text.to_string()
    }
}

/// 12 characters drawn uniformly from {A-Z, 0-9}.
pub fn generate_permalink() -> String {
    let mut rng = rand::rng();
    (0..PERMALINK_LEN)
        .map(|_| PERMALINK_ALPHABET[rng.random_range(0..PERMALINK_ALPHABET.len())] as char)
        .collect()
}

/// Permissive parser for free-text dates. Tries RFC 3339 first, then a
/// set of common date-time and date-only layouts; date-only values are
/// taken as midnight UTC.
pub fn parse_when(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(naive.and_utc());
        }
    }

    const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%d %b %Y", "%B %d, %Y"];
    for layout in DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, layout) {
            return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }

    None
}

fn escape_text(raw: &str) -> String {
    html_escape::encode_text(raw).into_owned()
}

/// Escapes quotes too; used for the description, which templates may
/// render inside an attribute.
fn escape_attr_text(raw: &str) -> String {
    html_escape::encode_safe(raw).into_owned()
}

fn required_text(field: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(escape_text(&v)),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}

fn required_attr_text(field: &'static str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(escape_attr_text(&v)),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value.map(|v| escape_text(&v))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn raw_input() -> RawPostInput {
        RawPostInput {
            title: Some("Exchange drained".to_string()),
            description: Some("Attackers siphoned hot wallets".to_string()),
            author: Some(Uuid::now_v7()),
            ..Default::default()
        }
    }

    #[test]
    fn test_preview_verbatim_at_150() {
        let text = "x".repeat(150);
        assert_eq!(preview_of(&text), text);
    }

    #[test]
    fn test_preview_truncates_at_151() {
        let text = "x".repeat(151);
        let preview = preview_of(&text);
        assert_eq!(preview.chars().count(), 153);
        assert!(preview.ends_with("..."));
        assert_eq!(&preview[..150], &text[..150]);
    }

    #[test]
    fn test_permalink_alphabet_and_length() {
        for _ in 0..100 {
            let permalink = generate_permalink();
            assert_eq!(permalink.len(), 12);
            assert!(permalink
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_escapes_markup_in_fields() {
        let mut raw = raw_input();
        raw.title = Some("<script>alert(1)</script>".to_string());
        raw.description = Some("a \"quoted\" <b>description</b>".to_string());
        raw.geography = Some("APAC & EMEA".to_string());
        let post = sanitize(raw).unwrap();
        assert_eq!(post.title, "&lt;script&gt;alert(1)&lt;/script&gt;");
        assert!(!post.description.contains('"'));
        assert!(!post.description.contains('<'));
        assert_eq!(post.geography.as_deref(), Some("APAC &amp; EMEA"));
    }

    #[test]
    fn test_missing_required_field_fails() {
        let mut raw = raw_input();
        raw.title = None;
        assert!(matches!(sanitize(raw), Err(AppError::Validation(_))));

        let mut raw = raw_input();
        raw.author = None;
        assert!(matches!(sanitize(raw), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_bad_date_degrades_alone() {
        let mut raw = raw_input();
        raw.compromised_at = Some("not a date at all".to_string());
        raw.reported_at = Some("2018-01-01".to_string());
        let post = sanitize(raw).unwrap();
        assert!(post.compromised_at.is_none());
        assert_eq!(
            post.reported_at.unwrap().to_rfc3339(),
            "2018-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_parse_when_common_layouts() {
        assert!(parse_when("2024-06-01T12:30:00Z").is_some());
        assert!(parse_when("2024-06-01 12:30:00").is_some());
        assert!(parse_when("01/01/2018").is_some());
        assert!(parse_when("1 Jan 2018").is_some());
        assert!(parse_when("").is_none());
        assert!(parse_when("soon").is_none());
    }

    #[test]
    fn test_patch_never_carries_date_or_permalink() {
        let patch = RawPostPatch {
            title: Some("New title".to_string()),
            description: Some("d".repeat(200)),
            ..Default::default()
        };
        let doc = sanitize_patch(patch);
        assert!(doc.get("date").is_none());
        assert!(doc.get("permalink").is_none());
        // Description change re-derives the preview.
        assert_eq!(doc["preview"].as_str().unwrap().chars().count(), 153);
    }

    #[test]
    fn test_patch_contains_only_present_fields() {
        let patch = RawPostPatch {
            geography: Some("EU".to_string()),
            ..Default::default()
        };
        let doc = sanitize_patch(patch);
        assert_eq!(doc.len(), 1);
        assert_eq!(doc["geography"], serde_json::json!("EU"));
    }
}
