//! Resource types for produced routes.

use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

/// Kind of artifact a route produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    Html,
    Css,
    Js,
    Svg,
    Image,
    Audio,
    Video,
    Xml,
    Txt,
    Json,
    Other,
}

/// Source extensions that compile to JavaScript.
pub const JS_EXTENSIONS: &[&str] = &["js", "mjs", "ts", "jsx", "tsx"];

impl ResourceType {
    /// Determine resource type from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "html" | "htm" => Self::Html,
            "css" => Self::Css,
            "js" | "mjs" | "ts" | "jsx" | "tsx" => Self::Js,
            "svg" => Self::Svg,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "avif" | "ico" | "bmp" => Self::Image,
            "mp3" | "wav" | "ogg" | "flac" | "m4a" | "aac" => Self::Audio,
            "mp4" | "webm" | "mov" | "mkv" | "ogv" => Self::Video,
            "xml" => Self::Xml,
            "txt" => Self::Txt,
            "json" => Self::Json,
            _ => Self::Other,
        }
    }

    /// Determine resource type from a route or file path.
    ///
    /// Routes without an extension are pages.
    pub fn from_route(route: &str) -> Self {
        match Path::new(route).extension().and_then(|e| e.to_str()) {
            Some(ext) => Self::from_extension(ext),
            None => Self::Html,
        }
    }

    /// MIME type served for this resource.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Css => "text/css; charset=utf-8",
            Self::Js => "text/javascript; charset=utf-8",
            Self::Svg => "image/svg+xml",
            Self::Image => "image/*",
            Self::Audio => "audio/*",
            Self::Video => "video/*",
            Self::Xml => "application/xml",
            Self::Txt => "text/plain; charset=utf-8",
            Self::Json => "application/json",
            Self::Other => "application/octet-stream",
        }
    }

    /// Lowercase name used in the ledger and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Css => "css",
            Self::Js => "js",
            Self::Svg => "svg",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Xml => "xml",
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// An output path paired with the kind of artifact it holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Slash-separated path without a leading slash.
    pub path: String,

    pub resource_type: ResourceType,
}

impl Route {
    /// Create a route, inferring the resource type from its extension.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let path = path.trim_start_matches('/').to_string();
        let resource_type = ResourceType::from_route(&path);
        Self {
            path,
            resource_type,
        }
    }

    /// File path of this route relative to the output directory.
    ///
    /// A last segment is a file only when its extension is one of
    /// `page_extensions` or a known resource type. Anything else, such as
    /// `blog/v1.2`, is written as `<route>/index.html`.
    pub fn output_path(&self, page_extensions: &[String]) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            return "index.html".to_string();
        }

        let is_file = Path::new(trimmed)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                page_extensions.iter().any(|p| p.eq_ignore_ascii_case(ext))
                    || ResourceType::from_extension(ext) != ResourceType::Other
            });

        if is_file {
            trimmed.to_string()
        } else {
            format!("{trimmed}/index.html")
        }
    }
}
