//! # QueryBuilder
//!
//! Pure mapping from the (tag, search) pair a listing receives to the
//! store-native filter the collection adapters interpret.

use bl_core::traits::Filter;
use serde_json::Value;

/// Builds the listing filter. Precedence is fixed: a tag always wins
/// over a search term when both are supplied. Total function, never
/// fails.
pub fn build(tag: Option<&str>, search: Option<&str>) -> Filter {
    if let Some(tag) = tag {
        return Filter::Eq("tags".to_string(), Value::String(tag.to_string()));
    }
    if let Some(search) = search {
        return Filter::Or(vec![
            Filter::Contains {
                field: "title".to_string(),
                needle: search.to_string(),
            },
            Filter::Contains {
                field: "description".to_string(),
                needle: search.to_string(),
            },
        ]);
    }
    Filter::All
}
