//! breachlog/crates/bl-core/src/lib.rs
//!
//! The central domain models and port definitions for the breachlog
//! incident-report backend.

pub mod error;
pub mod models;
pub mod traits;

// Re-exporting for easier access in other crates
pub use error::*;
pub use models::*;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use super::traits::*;
    use uuid::Uuid;

    #[test]
    fn test_post_defaults_on_deserialize() {
        // Older documents carry neither tags nor comments.
        let doc = serde_json::json!({
            "_id": Uuid::now_v7(),
            "title": "Exchange drained",
            "preview": "short",
            "description": "short",
            "infrastructure": null,
            "categories": null,
            "vulnerability": null,
            "targets": null,
            "geography": null,
            "references": null,
            "loss_crypto": null,
            "loss_fiat": null,
            "compromised_at": null,
            "reported_at": null,
            "date": "2024-05-01T00:00:00Z",
            "permalink": "ABC123DEF456",
            "author": Uuid::now_v7(),
        });
        let post: Post = serde_json::from_value(doc).unwrap();
        assert!(post.tags.is_empty());
        assert!(post.comments.is_empty());
    }

    #[test]
    fn test_post_form_joins_tags() {
        let doc = serde_json::json!({
            "_id": Uuid::now_v7(),
            "title": "t",
            "preview": "p",
            "description": "d",
            "infrastructure": null,
            "categories": null,
            "vulnerability": null,
            "targets": null,
            "geography": null,
            "references": null,
            "loss_crypto": null,
            "loss_fiat": null,
            "compromised_at": null,
            "reported_at": null,
            "date": "2024-05-01T00:00:00Z",
            "permalink": "ABC123DEF456",
            "author": Uuid::now_v7(),
            "tags": ["phishing", "defi"],
        });
        let post: Post = serde_json::from_value(doc).unwrap();
        let form = PostForm::from(post);
        assert_eq!(form.tags, "phishing,defi");
    }

    #[test]
    fn test_stored_date_keeps_string_order_chronological() {
        // Whole seconds and sub-second times must serialize with the
        // same fractional width, or string sort on `date` diverges
        // from chronological sort.
        let post = |date: &str| -> Post {
            serde_json::from_value(serde_json::json!({
                "_id": Uuid::now_v7(),
                "title": "t",
                "preview": "p",
                "description": "d",
                "infrastructure": null,
                "categories": null,
                "vulnerability": null,
                "targets": null,
                "geography": null,
                "references": null,
                "loss_crypto": null,
                "loss_fiat": null,
                "compromised_at": null,
                "reported_at": null,
                "date": date,
                "permalink": "ABC123DEF456",
                "author": Uuid::now_v7(),
            }))
            .unwrap()
        };

        let earlier = serde_json::to_value(post("2024-05-01T12:00:00.5Z")).unwrap();
        let later = serde_json::to_value(post("2024-05-01T12:00:01Z")).unwrap();

        let earlier = earlier["date"].as_str().unwrap();
        let later = later["date"].as_str().unwrap();
        assert_eq!(earlier, "2024-05-01T12:00:00.500000000Z");
        assert_eq!(later, "2024-05-01T12:00:01.000000000Z");
        assert!(earlier < later);
    }

    #[test]
    fn test_by_id_filter_shape() {
        let id = Uuid::now_v7();
        match Filter::by_id(id) {
            Filter::Eq(field, value) => {
                assert_eq!(field, "_id");
                assert_eq!(value, serde_json::Value::String(id.to_string()));
            }
            other => panic!("unexpected filter: {other:?}"),
        }
    }
}
