// Data models
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Date layout used by catalog entries
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A single playable sound with its display metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    pub id: String,
    pub title: String,
    pub category: String,
    /// Reference to the artwork shown next to the sound
    pub image: String,
    /// ISO-like date, e.g. "2024-10-15"
    pub date: String,
    /// Locator handed to the engine (local path or file:// URL)
    pub resource: String,
}

impl Sound {
    /// Build an ad-hoc sound for a local file
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string());

        Self {
            id: stem.clone(),
            title: stem,
            category: "file".to_string(),
            image: String::new(),
            date: String::new(),
            resource: path.to_string_lossy().to_string(),
        }
    }

    /// Parse the date string, None if it isn't yyyy-MM-dd
    pub fn release_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.date.trim(), DATE_FORMAT).ok()
    }

    pub fn share_payload(&self) -> SharePayload {
        SharePayload {
            sound_id: self.id.clone(),
            title: self.title.clone(),
            resource: self.resource.clone(),
        }
    }
}

/// What a sharing component needs to hand the current sound to another app
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharePayload {
    pub sound_id: String,
    pub title: String,
    pub resource: String,
}
