//! Upstream records with normalized property bags.
//!
//! Notion pages carry properties under user-chosen names ("Name", "Title",
//! "Photos"...). Names are normalized once here, at ingestion, so the
//! transformer only ever looks up lowercase keys.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a file is hosted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileHosting {
    /// Uploaded to Notion; the URL is signed and expires.
    Notion,
    /// Linked from elsewhere; the URL is static.
    External,
}

/// A file attached to a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub name: Option<String>,
    pub url: String,
    pub hosting: FileHosting,
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    Files(Vec<FileRef>),
    Select(String),
    MultiSelect(Vec<String>),
    Checkbox(bool),
    Url(String),
    Empty,
}

impl PropertyValue {
    /// Text view of the value, for free-text fields.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) | Self::Select(s) | Self::Url(s) if !s.is_empty() => Some(s.clone()),
            Self::MultiSelect(items) if !items.is_empty() => Some(items.join(", ")),
            Self::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Properties keyed by normalized (trimmed, lowercase) name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyBag(BTreeMap<String, PropertyValue>);

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize_name(name: &str) -> String {
        name.trim().to_lowercase()
    }

    pub fn insert(&mut self, name: &str, value: PropertyValue) {
        self.0.insert(Self::normalize_name(name), value);
    }

    /// First non-empty value among `aliases`, in order.
    pub fn lookup(&self, aliases: &[&str]) -> Option<&PropertyValue> {
        aliases
            .iter()
            .filter_map(|alias| self.0.get(*alias))
            .find(|value| !matches!(value, PropertyValue::Empty))
    }

    pub fn text(&self, aliases: &[&str]) -> Option<String> {
        self.lookup(aliases).and_then(PropertyValue::as_text)
    }

    pub fn number(&self, aliases: &[&str]) -> Option<f64> {
        match self.lookup(aliases)? {
            PropertyValue::Number(n) => Some(*n),
            PropertyValue::Text(s) => s.trim().trim_start_matches('$').parse().ok(),
            _ => None,
        }
    }

    pub fn files(&self, aliases: &[&str]) -> Vec<FileRef> {
        aliases
            .iter()
            .filter_map(|alias| match self.0.get(*alias) {
                Some(PropertyValue::Files(files)) if !files.is_empty() => Some(files.clone()),
                _ => None,
            })
            .next()
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A record as delivered by the metadata source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    pub last_edited: Option<DateTime<Utc>>,
    /// Page-level cover image, if set.
    pub cover: Option<FileRef>,
    pub properties: PropertyBag,
}

impl SourceRecord {
    /// Ingest a Notion page object.
    ///
    /// Returns `None` for objects without an `id`.
    pub fn from_notion_page(page: &Value) -> Option<Self> {
        let id = page.get("id")?.as_str()?.to_string();
        let last_edited = page
            .get("last_edited_time")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let cover = page.get("cover").and_then(parse_file);

        let mut properties = PropertyBag::new();
        if let Some(props) = page.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                properties.insert(name, parse_property(prop));
            }
        }

        Some(Self {
            id,
            last_edited,
            cover,
            properties,
        })
    }
}

fn plain_text(rich: Option<&Value>) -> String {
    rich.and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn parse_property(prop: &Value) -> PropertyValue {
    let kind = prop.get("type").and_then(Value::as_str).unwrap_or_default();
    let body = prop.get(kind);

    match kind {
        "title" | "rich_text" => PropertyValue::Text(plain_text(body)),
        "number" => body
            .and_then(Value::as_f64)
            .map_or(PropertyValue::Empty, PropertyValue::Number),
        "select" | "status" => body
            .and_then(|b| b.get("name"))
            .and_then(Value::as_str)
            .map_or(PropertyValue::Empty, |s| PropertyValue::Select(s.to_string())),
        "multi_select" => PropertyValue::MultiSelect(
            body.and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        ),
        "checkbox" => body
            .and_then(Value::as_bool)
            .map_or(PropertyValue::Empty, PropertyValue::Checkbox),
        "url" => body
            .and_then(Value::as_str)
            .map_or(PropertyValue::Empty, |s| PropertyValue::Url(s.to_string())),
        "files" => PropertyValue::Files(
            body.and_then(Value::as_array)
                .map(|files| files.iter().filter_map(parse_file).collect())
                .unwrap_or_default(),
        ),
        _ => PropertyValue::Empty,
    }
}

/// Parse a Notion file object (`{"type": "file"|"external", ...}`).
fn parse_file(file: &Value) -> Option<FileRef> {
    let kind = file.get("type")?.as_str()?;
    let hosting = match kind {
        "file" => FileHosting::Notion,
        "external" => FileHosting::External,
        _ => return None,
    };
    let url = file.get(kind)?.get("url")?.as_str()?;
    if url.is_empty() {
        return None;
    }

    Some(FileRef {
        name: file.get("name").and_then(Value::as_str).map(str::to_string),
        url: url.to_string(),
        hosting,
    })
}
