//! Wire types for the asset server endpoints.

use serde::{Deserialize, Serialize};

/// Entry type in a browse listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    File,
    Folder,
}

/// One file or folder returned by the browse endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowseItem {
    pub name: String,
    /// Path relative to the asset root, without extension for files.
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl BrowseItem {
    pub fn is_folder(&self) -> bool {
        self.item_type == ItemType::Folder
    }
}

/// Response of the browse endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseResponse {
    #[serde(default)]
    pub items: Vec<BrowseItem>,
    #[serde(default)]
    pub current_path: String,
    #[serde(default)]
    pub parent_path: Option<String>,
}

/// One tag search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagSuggestion {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}
