use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A single dish as delivered by the menu data endpoint.
///
/// Upstream data is hand-edited JSON, so every field decodes leniently:
/// missing or mistyped values fall back to empty/zero instead of failing
/// the whole catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MenuItem {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub desc: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub category: String,
    #[serde(default, deserialize_with = "lenient_price")]
    pub price: f64,
    #[serde(default, deserialize_with = "lenient_rating")]
    pub rating: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub image: String,
    #[serde(default, deserialize_with = "lenient_tags")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "strict_true")]
    pub special: bool,
}

impl MenuItem {
    /// Category key used for filtering
    pub fn category_key(&self) -> String {
        normalize_category(&self.category)
    }

    /// Image URL, if one was provided
    pub fn image_url(&self) -> Option<&str> {
        let trimmed = self.image.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    }

    pub fn parsed_tags(&self) -> Vec<Tag> {
        self.tags.iter().map(|t| Tag::parse(t)).collect()
    }
}

/// Normalize a category name for comparison.
pub fn normalize_category(category: &str) -> String {
    category.to_lowercase()
}

/// Badge attached to a menu item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    New,
    Popular,
    Bestseller,
    Other(String),
}

impl Tag {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "new" => Tag::New,
            "popular" => Tag::Popular,
            "bestseller" => Tag::Bestseller,
            _ => Tag::Other(raw.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Tag::New => "✨ New",
            Tag::Popular => "⭐ Popular",
            Tag::Bestseller => "🔥 Bestseller",
            Tag::Other(raw) => raw,
        }
    }
}

// ============================================================================
// Lenient field decoders
// ============================================================================

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let price = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };
    // Also catches NaN
    if price > 0.0 {
        Ok(price)
    } else {
        Ok(0.0)
    }
}

fn lenient_rating<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_tags<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn strict_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(matches!(Value::deserialize(deserializer)?, Value::Bool(true)))
}
