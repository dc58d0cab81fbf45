//! Wire models for the *arr v3 API.
//!
//! Only the fields the reconciler reads are modelled; everything else in the
//! payloads is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response of `GET /system/status`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub app_name: Option<String>,
    pub version: Option<String>,
}

/// A status message group attached to a queue record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusMessage {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// One entry of the download queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueRecord {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    /// Total size in bytes, 0 while the client has no metadata yet.
    pub size: f64,
    /// Bytes still to download.
    pub sizeleft: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub tracked_download_status: Option<String>,
    #[serde(default)]
    pub tracked_download_state: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub status_messages: Vec<StatusMessage>,
    #[serde(default)]
    pub series_id: Option<i64>,
    #[serde(default)]
    pub movie_id: Option<i64>,
}

impl QueueRecord {
    /// Percentage downloaded, 0 when the size is unknown.
    pub fn percent_downloaded(&self) -> f64 {
        percent_downloaded(self.size, self.sizeleft)
    }

    /// Library item the record belongs to, falling back to the record id.
    pub fn library_item_id(&self) -> i64 {
        self.series_id.or(self.movie_id).unwrap_or(self.id)
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<untitled>")
    }
}

/// `(size - remaining) / size * 100`, or 0 when `size` is not positive.
pub fn percent_downloaded(size: f64, remaining: f64) -> f64 {
    if size > 0.0 {
        (size - remaining) * 100.0 / size
    } else {
        0.0
    }
}

/// One movie or series in the library.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LibraryEntry {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    pub monitored: bool,
}

/// Queue payloads come either as a bare array or as a paged envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QueuePayload {
    Paged { records: Vec<Value> },
    List(Vec<Value>),
}

impl QueuePayload {
    pub fn into_records(self) -> Vec<Value> {
        match self {
            QueuePayload::Paged { records } => records,
            QueuePayload::List(records) => records,
        }
    }
}

/// Decode items one by one, handing every failure to `on_error`.
///
/// A malformed item never prevents the remaining items from decoding.
pub fn decode_each<T, F>(items: Vec<Value>, mut on_error: F) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
    F: FnMut(usize, serde_json::Error),
{
    items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                on_error(index, e);
                None
            }
        })
        .collect()
}
