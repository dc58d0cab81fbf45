//! Application kind detection and the per-kind endpoint table.

use serde_json::{json, Value};

/// Which *arr application an instance turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppKind {
    /// Not probed yet, or the reported application name was not recognised.
    #[default]
    Unknown,
    Sonarr,
    Radarr,
}

/// Endpoint and command names that differ between application kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindEndpoints {
    /// Library resource, used for listing (`/series`) and deletion (`/series/{id}`).
    pub library_path: &'static str,
    /// Name of the command that searches for a single library item.
    pub search_command: &'static str,
    /// Field of the search command carrying the item id.
    pub id_field: &'static str,
    /// Whether `id_field` takes a list of ids rather than a single id.
    pub id_field_is_list: bool,
}

const SONARR_ENDPOINTS: KindEndpoints = KindEndpoints {
    library_path: "series",
    search_command: "SeriesSearch",
    id_field: "seriesId",
    id_field_is_list: false,
};

const RADARR_ENDPOINTS: KindEndpoints = KindEndpoints {
    library_path: "movie",
    search_command: "MoviesSearch",
    id_field: "movieIds",
    id_field_is_list: true,
};

impl AppKind {
    /// Match a reported application name, ignoring case.
    pub fn from_app_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "sonarr" => AppKind::Sonarr,
            "radarr" => AppKind::Radarr,
            _ => AppKind::Unknown,
        }
    }

    /// Endpoint table entry, `None` for [`AppKind::Unknown`].
    pub fn endpoints(self) -> Option<&'static KindEndpoints> {
        match self {
            AppKind::Sonarr => Some(&SONARR_ENDPOINTS),
            AppKind::Radarr => Some(&RADARR_ENDPOINTS),
            AppKind::Unknown => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppKind::Unknown => "unknown",
            AppKind::Sonarr => "sonarr",
            AppKind::Radarr => "radarr",
        }
    }
}

impl std::fmt::Display for AppKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl KindEndpoints {
    /// Body of the `/command` request that re-searches one library item.
    pub fn search_body(&self, item_id: i64) -> Value {
        let id = if self.id_field_is_list {
            json!([item_id])
        } else {
            json!(item_id)
        };
        let mut body = serde_json::Map::new();
        body.insert("name".to_string(), json!(self.search_command));
        body.insert(self.id_field.to_string(), id);
        Value::Object(body)
    }
}
