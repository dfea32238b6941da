//! Asset tracking, content hashing and reference rewriting.
//!
//! Rendered HTML documents are scanned for local asset references. Each
//! distinct asset is rendered once, hashed with SHA-256, and every document
//! that uses it is rewritten to point at the hashed path.

use std::{
    collections::HashMap,
    path::Path,
    sync::LazyLock,
};

use folio_core::{Config, ResourceType};
use futures::future::join_all;
use regex::{Captures, Regex};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::render::{RenderOptions, Renderer};

/// Asset processing errors.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Writing a hashed asset failed.
    #[error("failed to write asset {route}: {source}")]
    Write {
        route: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for asset operations.
pub type Result<T> = std::result::Result<T, AssetError>;

/// Element and attribute an asset reference was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Script,
    Stylesheet,
    ImageSrc,
    ImageSrcset,
    MediaSrc,
    SourceSrc,
    SourceSrcset,
}

impl RefKind {
    fn classify(element: &str, attribute: &str) -> Option<Self> {
        match (element, attribute) {
            ("script", "src") => Some(Self::Script),
            ("link", "href") => Some(Self::Stylesheet),
            ("img", "src") => Some(Self::ImageSrc),
            ("img", "srcset") => Some(Self::ImageSrcset),
            ("audio" | "video", "src") => Some(Self::MediaSrc),
            ("source", "src") => Some(Self::SourceSrc),
            ("source", "srcset") => Some(Self::SourceSrcset),
            _ => None,
        }
    }

    fn is_srcset(self) -> bool {
        matches!(self, Self::ImageSrcset | Self::SourceSrcset)
    }
}

/// A local asset reference inside a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub kind: RefKind,
    pub url: String,
}

/// A rendered document awaiting output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub route: String,
    pub resource_type: ResourceType,
    pub content: String,
}

/// A tracked asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub route: String,
    pub resource_type: ResourceType,
    /// Indices of referencing documents, in first-seen order.
    pub used_by: Vec<usize>,
    /// Reference kinds seen for this asset.
    pub kinds: Vec<RefKind>,
    /// Content hash, set once rendered.
    pub hash: Option<String>,
}

/// An asset that rendered successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedAsset {
    pub route: String,
    pub hashed_route: String,
    pub resource_type: ResourceType,
    pub hash: String,
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|link|img|audio|video|source)\b[^>]*>").expect("valid tag regex")
});

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9_:-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

fn attributes(tag: &str) -> impl Iterator<Item = (String, String)> + '_ {
    ATTR_RE.captures_iter(tag).map(|caps| {
        let value = caps.get(2).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        (caps[1].to_ascii_lowercase(), value.to_string())
    })
}

fn is_stylesheet(tag: &str) -> bool {
    attributes(tag).any(|(name, value)| {
        name == "rel"
            && value
                .split_ascii_whitespace()
                .any(|rel| rel.eq_ignore_ascii_case("stylesheet"))
    })
}

/// URLs listed in a `srcset` attribute, without their descriptors.
fn srcset_urls(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .filter_map(|candidate| candidate.split_ascii_whitespace().next())
}

/// Extract every asset reference from an HTML document.
pub fn extract_references(html: &str) -> Vec<Reference> {
    let mut references = Vec::new();

    for caps in TAG_RE.captures_iter(html) {
        let tag = &caps[0];
        let element = caps[1].to_ascii_lowercase();
        if element == "link" && !is_stylesheet(tag) {
            continue;
        }

        for (name, value) in attributes(tag) {
            let Some(kind) = RefKind::classify(&element, &name) else {
                continue;
            };
            if kind.is_srcset() {
                references.extend(srcset_urls(&value).map(|url| Reference {
                    kind,
                    url: url.to_string(),
                }));
            } else if !value.is_empty() {
                references.push(Reference { kind, url: value });
            }
        }
    }

    references
}

/// Rewrite references of one kind from `from` to `to`.
pub fn rewrite_references(html: &str, kind: RefKind, from: &str, to: &str) -> String {
    TAG_RE
        .replace_all(html, |caps: &Captures<'_>| {
            let tag = &caps[0];
            let element = caps[1].to_ascii_lowercase();
            if element == "link" && !is_stylesheet(tag) {
                return tag.to_string();
            }

            ATTR_RE
                .replace_all(tag, |attr: &Captures<'_>| {
                    let name = attr[1].to_ascii_lowercase();
                    if RefKind::classify(&element, &name) != Some(kind) {
                        return attr[0].to_string();
                    }

                    let (value, quote) = match (attr.get(2), attr.get(3)) {
                        (Some(v), _) => (v.as_str(), '"'),
                        (None, Some(v)) => (v.as_str(), '\''),
                        (None, None) => return attr[0].to_string(),
                    };

                    let rewritten = if kind.is_srcset() {
                        value
                            .split(',')
                            .map(|candidate| rewrite_srcset_candidate(candidate, from, to))
                            .collect::<Vec<_>>()
                            .join(",")
                    } else if value == from {
                        to.to_string()
                    } else {
                        return attr[0].to_string();
                    };

                    format!("{}={quote}{rewritten}{quote}", &attr[1])
                })
                .into_owned()
        })
        .into_owned()
}

fn rewrite_srcset_candidate(candidate: &str, from: &str, to: &str) -> String {
    let leading = candidate.len() - candidate.trim_start().len();
    let trimmed = candidate.trim_start();
    let url_len = trimmed
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(trimmed.len());

    if &trimmed[..url_len] == from {
        format!("{}{to}{}", &candidate[..leading], &trimmed[url_len..])
    } else {
        candidate.to_string()
    }
}

/// SHA-256 of the content, hex encoded.
pub fn hash_content(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Insert the hash before the extension of the last path segment, or append
/// it when there is none.
pub fn route_with_content_hash(route: &str, hash: &str) -> String {
    let name_start = route.rfind('/').map_or(0, |i| i + 1);
    match route[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = name_start + dot;
            format!("{}.{hash}{}", &route[..dot], &route[dot..])
        }
        _ => format!("{route}.{hash}"),
    }
}

/// Deduplicated set of assets referenced by rendered documents.
#[derive(Debug)]
pub struct AssetMap {
    prefixes: Vec<String>,
    assets: Vec<Asset>,
    index: HashMap<String, usize>,
}

impl AssetMap {
    /// Create an empty map tracking references under the configured asset
    /// directories.
    pub fn new(config: &Config) -> Self {
        let prefixes = config
            .asset_dirs()
            .iter()
            .map(|dir| format!("/{}/", dir.trim_matches('/')))
            .collect();
        Self {
            prefixes,
            assets: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn is_local(&self, url: &str) -> bool {
        self.prefixes.iter().any(|prefix| url.starts_with(prefix.as_str()))
    }

    /// Record the assets referenced by document `doc` with content `html`.
    ///
    /// Track each document once.
    pub fn track(&mut self, doc: usize, html: &str) {
        for reference in extract_references(html) {
            if !self.is_local(&reference.url) {
                continue;
            }

            let idx = match self.index.get(&reference.url) {
                Some(&idx) => idx,
                None => {
                    let idx = self.assets.len();
                    self.assets.push(Asset {
                        route: reference.url.clone(),
                        resource_type: ResourceType::from_route(&reference.url),
                        used_by: Vec::new(),
                        kinds: Vec::new(),
                        hash: None,
                    });
                    self.index.insert(reference.url.clone(), idx);
                    idx
                }
            };

            let asset = &mut self.assets[idx];
            if !asset.used_by.contains(&doc) {
                asset.used_by.push(doc);
            }
            if !asset.kinds.contains(&reference.kind) {
                asset.kinds.push(reference.kind);
            }
        }
    }

    /// Tracked assets in first-seen order.
    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn get(&self, route: &str) -> Option<&Asset> {
        self.index.get(route).map(|&idx| &self.assets[idx])
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Render, hash and rewrite every tracked asset.
    ///
    /// `documents` is indexed by the values passed to [`AssetMap::track`].
    /// A render failure skips that asset only; a write failure under `dest`
    /// is returned.
    pub async fn render(
        &mut self,
        renderer: &dyn Renderer,
        documents: &mut [Document],
        dest: Option<&Path>,
    ) -> Result<Vec<RenderedAsset>> {
        info!(count = self.assets.len(), "rendering assets");

        let renders = self.assets.iter().map(|asset| {
            let options = RenderOptions {
                used_by: asset
                    .used_by
                    .iter()
                    .filter_map(|&i| documents.get(i))
                    .map(|doc| doc.content.clone())
                    .collect(),
            };
            async move { renderer.render(&asset.route, &options).await }
        });
        let results = join_all(renders).await;

        let mut rendered = Vec::new();
        for (asset, result) in self.assets.iter_mut().zip(results) {
            if result.is_error() {
                warn!(
                    route = %asset.route,
                    status = ?result.error_status,
                    error = result.error_message.as_deref().unwrap_or("unknown error"),
                    "asset render failed, skipping"
                );
                continue;
            }

            let hash = hash_content(&result.content);
            let hashed_route = route_with_content_hash(&asset.route, &hash);

            for &doc in &asset.used_by {
                if let Some(document) = documents.get_mut(doc) {
                    for &kind in &asset.kinds {
                        document.content =
                            rewrite_references(&document.content, kind, &asset.route, &hashed_route);
                    }
                }
            }

            if let Some(dest) = dest {
                let path = dest.join(hashed_route.trim_start_matches('/'));
                write_asset(&path, &result.content)
                    .await
                    .map_err(|source| AssetError::Write {
                        route: hashed_route.clone(),
                        source,
                    })?;
            }

            debug!(route = %asset.route, hashed = %hashed_route, "asset rendered");
            asset.hash = Some(hash.clone());
            rendered.push(RenderedAsset {
                route: asset.route.clone(),
                hashed_route,
                resource_type: result.resource_type.unwrap_or(asset.resource_type),
                hash,
            });
        }

        Ok(rendered)
    }
}

async fn write_asset(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await
}
