//! Asset server client.
//!
//! Every read goes through the [`ResourceCache`], so repeated lookups for
//! the same listing, group file, metadata document or preview share one
//! request. Writes (group saves, preview uploads) go straight to the
//! fetcher and then seed or invalidate the affected cache entries.
//!
//! Endpoint layout, relative to the configured base url:
//!
//! ```text
//! GET  /pillbox/browse/{kind}?path=..&query=..   -> BrowseResponse
//! GET  /pillbox/tags?query=..&limit=..           -> [TagSuggestion]
//! GET  /pillbox/groups/{name}{ext}               -> [Tag] | 404
//! POST /pillbox/groups/{name}{ext}               <- [Tag]
//! GET  /pillbox/metadata/{file}                  -> JSON | 404
//! GET  /pillbox/preview/{kind}/{name}            -> image | 404
//! POST /pillbox/preview/{kind}/{name}            <- image
//! ```

mod client;
mod types;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::BoxFuture;
use crate::cache::{
    CacheError, CacheKind, CacheValue, DecodedImage, FetchError, ImageFormat, ResourceCache,
};
use crate::codec::{GroupError, GroupResolver};
use crate::tag::{Tag, TagCollection, TagKind};

pub use client::HttpFetcher;
pub use types::{BrowseItem, BrowseResponse, ItemType, TagSuggestion};

/// Extension assumed for group files that were referenced without one.
pub const DEFAULT_GROUP_EXTENSION: &str = ".json";

const API_ROOT: &str = "pillbox";

/// Errors surfaced by [`AssetApi`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ApiError {
    /// True when the server confirmed the resource does not exist.
    pub fn is_missing(&self) -> bool {
        match self {
            ApiError::Cache(err) => err.is_missing(),
            ApiError::Fetch(err) => *err == FetchError::NotFound,
            _ => false,
        }
    }
}

/// Asset categories served by the browse and preview endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    Lora,
    Embedding,
    Group,
}

impl AssetKind {
    pub const ALL: [AssetKind; 3] = [AssetKind::Lora, AssetKind::Embedding, AssetKind::Group];

    /// Path segment used by the endpoints.
    pub fn segment(self) -> &'static str {
        match self {
            AssetKind::Lora => "loras",
            AssetKind::Embedding => "embeddings",
            AssetKind::Group => "groups",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetKind::Lora => "LoRA",
            AssetKind::Embedding => "embedding",
            AssetKind::Group => "group",
        }
    }

    /// The asset category a tag kind refers to, if any.
    pub fn for_tag(kind: TagKind) -> Option<AssetKind> {
        match kind {
            TagKind::Lora => Some(AssetKind::Lora),
            TagKind::Embedding => Some(AssetKind::Embedding),
            TagKind::Group => Some(AssetKind::Group),
            TagKind::Tag => None,
        }
    }

    /// The tag kind produced when a browsed file of this category is added.
    pub fn tag_kind(self) -> TagKind {
        match self {
            AssetKind::Lora => TagKind::Lora,
            AssetKind::Embedding => TagKind::Embedding,
            AssetKind::Group => TagKind::Group,
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.segment())
    }
}

impl FromStr for AssetKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lora" | "loras" => Ok(AssetKind::Lora),
            "embedding" | "embeddings" => Ok(AssetKind::Embedding),
            "group" | "groups" => Ok(AssetKind::Group),
            other => Err(ApiError::InvalidInput(format!("unknown asset kind: {other}"))),
        }
    }
}

/// Client for the asset server, backed by a shared [`ResourceCache`].
#[derive(Debug, Clone)]
pub struct AssetApi {
    cache: ResourceCache,
    base: Url,
}

impl AssetApi {
    pub fn new(cache: ResourceCache, base_url: &str) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)
            .map_err(|e| ApiError::InvalidInput(format!("base url {base_url:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ApiError::InvalidInput(format!(
                "base url {base_url:?} cannot hold a path"
            )));
        }
        Ok(Self { cache, base })
    }

    /// Build a client with an HTTP fetcher configured from `[server]`.
    pub fn from_config(config: &pillbox_config::ServerConfig) -> Result<Self, ApiError> {
        let fetcher = HttpFetcher::new(config.timeout())?;
        info!(base_url = %config.base_url, "asset api ready");
        Self::new(ResourceCache::new(Arc::new(fetcher)), &config.base_url)
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> String {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(API_ROOT);
            for segment in segments {
                path.extend(segment.split('/').filter(|s| !s.is_empty()));
            }
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url.into()
    }

    pub fn browse_url(&self, kind: AssetKind, path: &str, query: &str) -> String {
        self.endpoint(
            &["browse", kind.segment()],
            &[("path", path), ("query", query)],
        )
    }

    pub fn tags_url(&self, query: &str, limit: usize) -> String {
        let limit = limit.to_string();
        self.endpoint(&["tags"], &[("query", query), ("limit", limit.as_str())])
    }

    pub fn group_url(&self, name: &str, extension: Option<&str>) -> String {
        let file = format!("{name}{}", extension.unwrap_or(DEFAULT_GROUP_EXTENSION));
        self.endpoint(&["groups", file.as_str()], &[])
    }

    pub fn metadata_url(&self, file: &str) -> String {
        self.endpoint(&["metadata", file], &[])
    }

    pub fn preview_url(&self, kind: AssetKind, name: &str) -> String {
        self.endpoint(&["preview", kind.segment(), name], &[])
    }

    async fn json(&self, url: &str) -> Result<Arc<Value>, ApiError> {
        match self.cache.get(CacheKind::Json, url).await? {
            CacheValue::Json(value) => Ok(value),
            other => Err(ApiError::Parse(format!("expected json, cached {other:?}"))),
        }
    }

    /// List one folder of an asset category, filtered by `query`.
    pub async fn search_files(
        &self,
        kind: AssetKind,
        path: &str,
        query: &str,
    ) -> Result<BrowseResponse, ApiError> {
        let url = self.browse_url(kind, path, query);
        decode(&*self.json(&url).await?)
    }

    /// Search the tag database.
    pub async fn search_tags(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<TagSuggestion>, ApiError> {
        let url = self.tags_url(query, limit);
        decode(&*self.json(&url).await?)
    }

    /// Load a group file. A missing file is an error for which
    /// [`ApiError::is_missing`] holds.
    pub async fn group(
        &self,
        name: &str,
        extension: Option<&str>,
    ) -> Result<TagCollection, ApiError> {
        let url = self.group_url(name, extension);
        decode(&*self.json(&url).await?)
    }

    /// Metadata document for a model file, `None` when the server has none.
    pub async fn lora_metadata(&self, file: &str) -> Result<Option<Arc<Value>>, ApiError> {
        match self.json(&self.metadata_url(file)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_missing() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Preview image for an asset, `None` when it has no preview.
    pub async fn preview(
        &self,
        kind: AssetKind,
        name: &str,
    ) -> Result<Option<Arc<DecodedImage>>, ApiError> {
        let url = self.preview_url(kind, name);
        match self.cache.get(CacheKind::Image, &url).await {
            Ok(CacheValue::Image(image)) => Ok(Some(image)),
            Ok(other) => Err(ApiError::Parse(format!("expected image, cached {other:?}"))),
            Err(err) if err.is_missing() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Write a group file and seed the cache with what was written.
    pub async fn save_group(&self, name: &str, collection: &TagCollection) -> Result<(), ApiError> {
        let name = validate_group_name(name)?;
        let stem = name.strip_suffix(DEFAULT_GROUP_EXTENSION).unwrap_or(name);
        let url = self.group_url(stem, None);
        let value = serde_json::to_value(collection).map_err(|e| ApiError::Parse(e.to_string()))?;
        let body = serde_json::to_vec(&value).map_err(|e| ApiError::Parse(e.to_string()))?;

        self.cache
            .fetcher()
            .post(&url, body, "application/json")
            .await?;
        self.cache.set(CacheKind::Json, &url, CacheValue::Json(Arc::new(value)));
        info!(group = %stem, tags = collection.len(), "group saved");
        Ok(())
    }

    /// Replace an asset's preview image.
    pub async fn upload_preview(
        &self,
        kind: AssetKind,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), ApiError> {
        if name.trim().is_empty() {
            return Err(ApiError::InvalidInput("preview target name is empty".to_string()));
        }
        let url = self.preview_url(kind, name);
        let content_type = ImageFormat::guess(&bytes)
            .map_or("application/octet-stream", ImageFormat::mime_type);
        self.cache
            .fetcher()
            .post(&url, bytes.clone(), content_type)
            .await?;
        let dropped = self.cache.invalidate(&url);
        debug!(%url, dropped, "preview replaced");
        self.cache
            .set(CacheKind::Binary, &url, CacheValue::Binary(Arc::new(bytes)));
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: &Value) -> Result<T, ApiError> {
    T::deserialize(value).map_err(|e| ApiError::Parse(e.to_string()))
}

fn validate_group_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::InvalidInput("group name is empty".to_string()));
    }
    if name.contains("..") {
        return Err(ApiError::InvalidInput(format!(
            "group name {name:?} must not contain '..'"
        )));
    }
    if name.starts_with('/') || name.starts_with('\\') {
        return Err(ApiError::InvalidInput(format!(
            "group name {name:?} must be relative"
        )));
    }
    Ok(name)
}

/// Trigger word candidates from a model metadata document.
///
/// Reads the `ss_tag_frequency` map written by kohya-style trainers, which
/// maps dataset names to `{word: count}` tables and is often stored as a
/// JSON-encoded string. Counts are summed across datasets; the result is
/// sorted by count descending, then by word.
pub fn trigger_words(metadata: &Value, limit: usize) -> Vec<(String, u64)> {
    let frequency = match metadata.get("ss_tag_frequency") {
        Some(Value::String(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!(error = %err, "ss_tag_frequency is not valid json");
                return Vec::new();
            }
        },
        Some(value) => value.clone(),
        None => return Vec::new(),
    };

    let mut totals: HashMap<String, u64> = HashMap::new();
    if let Value::Object(datasets) = &frequency {
        for table in datasets.values() {
            let Value::Object(words) = table else {
                continue;
            };
            for (word, count) in words {
                let word = word.trim();
                if word.is_empty() {
                    continue;
                }
                let count = count.as_u64().unwrap_or(0);
                *totals.entry(word.to_string()).or_default() += count;
            }
        }
    }

    let mut ranked: Vec<(String, u64)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

/// [`GroupResolver`] that loads group files through an [`AssetApi`].
#[derive(Debug, Clone)]
pub struct CachedGroupResolver {
    api: AssetApi,
}

impl CachedGroupResolver {
    pub fn new(api: AssetApi) -> Self {
        Self { api }
    }
}

impl GroupResolver for CachedGroupResolver {
    fn resolve<'a>(&'a self, group: &'a Tag) -> BoxFuture<'a, Result<TagCollection, GroupError>> {
        Box::pin(async move {
            self.api
                .group(&group.name, group.extension.as_deref())
                .await
                .map_err(|err| {
                    if err.is_missing() {
                        GroupError::Missing(group.name.clone())
                    } else {
                        GroupError::Failed {
                            name: group.name.clone(),
                            reason: err.to_string(),
                        }
                    }
                })
        })
    }
}
