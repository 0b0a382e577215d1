//! The bookmark and group data model.

use serde::{Deserialize, Serialize};

/// A type with a stable identity key used for deduplication.
pub trait IdentityKeyed {
    /// Returns the identity key for this row.
    fn identity_key(&self) -> String;
}

/// A bookmarked item.
///
/// Rows that have not yet round-tripped through the server may carry an
/// empty `id`; their identity key falls back to `url` + `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Server-assigned identity. Empty until the row has been confirmed.
    #[serde(default)]
    pub id: String,
    /// The bookmarked URL.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional favicon URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
    /// Optional preview image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    /// Creation time, unix milliseconds.
    pub created_at: i64,
    /// Denormalized group label.
    #[serde(default)]
    pub group_name: String,
    /// Denormalized group color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_color: Option<String>,
}

impl IdentityKeyed for Item {
    /// `id` when the server has assigned one, else `url` + `created_at`.
    ///
    /// The fallback can collide if two distinct rows share both fields;
    /// this is a known limitation, not silently repaired here.
    fn identity_key(&self) -> String {
        if self.id.is_empty() {
            format!("{}#{}", self.url, self.created_at)
        } else {
            self.id.clone()
        }
    }
}

/// A bookmark group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Server-assigned identity.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Display color.
    pub color: String,
    /// Display order, ascending.
    pub order: i32,
    /// Denormalized item count.
    #[serde(default)]
    pub count: u32,
}

impl IdentityKeyed for Group {
    fn identity_key(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_item(id: &str, url: &str, created_at: i64) -> Item {
        Item {
            id: id.into(),
            url: url.into(),
            title: "a title".into(),
            description: None,
            icon_url: None,
            preview_url: None,
            created_at,
            group_name: "Reading".into(),
            group_color: None,
        }
    }

    #[test]
    fn identity_key_prefers_id() {
        let item = make_item("abc", "https://example.com", 100);
        assert_eq!(item.identity_key(), "abc");
    }

    #[test]
    fn identity_key_falls_back_to_url_and_created_at() {
        let item = make_item("", "https://example.com", 100);
        assert_eq!(item.identity_key(), "https://example.com#100");
    }

    #[test]
    fn item_json_round_trip() {
        let item = make_item("abc", "https://example.com", 100);
        let json = serde_json::to_string(&item).unwrap();
        let back: Item = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }

    #[test]
    fn item_tolerates_missing_optional_fields() {
        let json = r#"{"url":"https://example.com","title":"t","createdAt":5}"#;
        let item: Item = serde_json::from_str(json).unwrap();
        assert!(item.id.is_empty());
        assert!(item.description.is_none());
        assert_eq!(item.identity_key(), "https://example.com#5");
    }

    #[test]
    fn group_identity_key_is_id() {
        let group = Group {
            id: "g1".into(),
            name: "Reading".into(),
            color: "#ff0000".into(),
            order: 0,
            count: 3,
        };
        assert_eq!(group.identity_key(), "g1");
    }
}
