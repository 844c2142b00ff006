//! Decoding of WordPress REST API records into feed items.
//!
//! WordPress reference: <https://developer.wordpress.org/rest-api/reference/pages/>

use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::Value;
use wpfeed_core::error::AppError;
use wpfeed_core::models::{FeedItem, ItemFailure};

/// Record id: WordPress sends a number, some proxies a string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum WpId {
    Number(u64),
    Text(String),
}

impl WpId {
    fn into_string(self) -> String {
        match self {
            WpId::Number(n) => n.to_string(),
            WpId::Text(s) => s.trim().to_string(),
        }
    }
}

/// A text field that is either `{"rendered": "..."}` or a plain string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum Rendered {
    Object { rendered: String },
    Plain(String),
}

impl Rendered {
    fn text(self) -> String {
        match self {
            Rendered::Object { rendered } | Rendered::Plain(rendered) => rendered,
        }
    }
}

/// Fields of a page/post record this crate reads. Everything else is ignored.
///
/// # Examples
///
/// ```
/// use wpfeed_client::wordpress::WpRecord;
///
/// let json = r#"{
///     "id": 42,
///     "modified_gmt": "2024-01-15T10:30:00",
///     "title": {"rendered": "Chapter 12"},
///     "link": "https://example.com/chapter-12/",
///     "content": {"rendered": "<p>Text</p>", "protected": false}
/// }"#;
///
/// let record: WpRecord = serde_json::from_str(json).unwrap();
/// let item = record.into_item().unwrap();
/// assert_eq!(item.id, "42");
/// assert_eq!(item.updated_at, 1_705_314_600);
/// ```
#[derive(Deserialize, Debug, Clone, Default)]
pub struct WpRecord {
    id: Option<WpId>,
    modified_gmt: Option<String>,
    modified: Option<String>,
    date_gmt: Option<String>,
    date: Option<String>,
    title: Option<Rendered>,
    link: Option<String>,
    content: Option<Rendered>,
    excerpt: Option<Rendered>,
}

impl WpRecord {
    /// Converts the record into a [`FeedItem`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::ItemDecodeFailed` when the id is missing or the
    /// timestamp cannot be parsed. The error's `id` is empty if the record had
    /// no usable id.
    pub fn into_item(self) -> Result<FeedItem, AppError> {
        let id = match self.id.map(WpId::into_string) {
            Some(id) if !id.is_empty() => id,
            _ => {
                return Err(AppError::ItemDecodeFailed {
                    id: String::new(),
                    cause: "record has no id".to_string(),
                })
            }
        };

        let stamp = [&self.modified_gmt, &self.modified, &self.date_gmt, &self.date]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty());
        let Some(stamp) = stamp else {
            return Err(AppError::ItemDecodeFailed {
                id,
                cause: "record has no modified or date timestamp".to_string(),
            });
        };
        let updated_at = match parse_timestamp(stamp) {
            Some(ts) => ts,
            None => {
                return Err(AppError::ItemDecodeFailed {
                    id,
                    cause: format!("unparsable timestamp '{}'", stamp),
                })
            }
        };

        // Feed readers trim text content, so the stored copy is trimmed too.
        let body = self
            .content
            .map(Rendered::text)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.excerpt.map(Rendered::text))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Ok(FeedItem {
            id,
            updated_at,
            title: self
                .title
                .map(|t| t.text().trim().to_string())
                .unwrap_or_default(),
            link: self.link.map(|l| l.trim().to_string()).unwrap_or_default(),
            body,
        })
    }
}

/// Parses a WordPress timestamp into epoch seconds.
///
/// Accepts RFC 3339 with an offset, and naive ISO 8601 (the `*_gmt` fields),
/// which is read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc().timestamp())
}

/// Decodes one raw record, turning any problem into an [`ItemFailure`].
pub fn decode_record(record: Value) -> Result<FeedItem, ItemFailure> {
    let raw_id = record.get("id").and_then(|v| match v {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    });

    let parsed: WpRecord = serde_json::from_value(record).map_err(|e| ItemFailure {
        id: raw_id.clone(),
        cause: format!("malformed record: {}", e),
    })?;

    parsed.into_item().map_err(|e| match e {
        AppError::ItemDecodeFailed { id, cause } => ItemFailure {
            id: if id.is_empty() { raw_id } else { Some(id) },
            cause,
        },
        other => ItemFailure {
            id: raw_id,
            cause: other.to_string(),
        },
    })
}

/// Decodes a page of raw records, keeping good items and rejected records
/// apart. One bad record never hides the rest.
pub fn decode_records(records: Vec<Value>) -> (Vec<FeedItem>, Vec<ItemFailure>) {
    let mut items = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for record in records {
        match decode_record(record) {
            Ok(item) => items.push(item),
            Err(failure) => rejected.push(failure),
        }
    }
    (items, rejected)
}
