//! Route discovery and request resolution.
//!
//! Static routes come from walking the pages tree. Any other request path is
//! resolved on demand: asset directories first, then exact page files,
//! directory indexes and finally dynamic templates such as `_slug_.html`.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Component, Path, PathBuf},
};

use folio_content::{ContentStore, QueryOptions, query::field};
use folio_core::{Config, ResourceType, resource::JS_EXTENSIONS};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// A template or asset file that answers a request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Absolute location of the file.
    pub path: PathBuf,

    /// Location relative to the directory it was found in, `/` separated.
    pub template: String,

    pub resource_type: ResourceType,
}

/// Bindings available to a template while rendering one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RouteParams {
    pub path: String,
    pub segments: Vec<String>,
    /// Dynamic parameter, keyed by the name between the underscores.
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

/// Parameter name of a dynamic template such as `_slug_.html`.
///
/// The stem must be one underscore, one or more non-underscore characters,
/// then one underscore.
pub fn dynamic_param(path: &Path) -> Option<&str> {
    let stem = path.file_stem()?.to_str()?;
    let inner = stem.strip_prefix('_')?.strip_suffix('_')?;
    (!inner.is_empty() && !inner.contains('_')).then_some(inner)
}

/// Dot-prefixed entries below the walk root.
pub(crate) fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// List every static page below `pages_path` whose extension is allowed.
///
/// Dot entries are skipped and dynamic templates are left out. A missing
/// directory yields no routes.
pub fn discover_routes(pages_path: &Path, extensions: &[String]) -> io::Result<Vec<String>> {
    if !pages_path.is_dir() {
        debug!(path = %pages_path.display(), "pages directory missing");
        return Ok(Vec::new());
    }

    let mut routes = Vec::new();
    let walker = WalkDir::new(pages_path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e));

    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        let file_type = entry.file_type();
        if !(file_type.is_file() || file_type.is_symlink()) {
            continue;
        }

        let path = entry.path();
        if !has_extension(path, extensions) || dynamic_param(path).is_some() {
            continue;
        }

        if let Ok(relative) = path.strip_prefix(pages_path) {
            routes.push(to_slash(relative));
        }
    }

    debug!(count = routes.len(), "discovered static routes");
    Ok(routes)
}

/// Configured asset directory serving the given resource type.
fn asset_dir(config: &Config, resource_type: ResourceType) -> Option<&str> {
    match resource_type {
        ResourceType::Css => Some(config.dirs.css.as_str()),
        ResourceType::Js => Some(config.dirs.js.as_str()),
        ResourceType::Svg | ResourceType::Image => Some(config.dirs.images.as_str()),
        ResourceType::Audio | ResourceType::Video => Some(config.dirs.media.as_str()),
        _ => None,
    }
}

fn found(path: PathBuf, root: &Path, resource_type: ResourceType) -> Resource {
    let template = path
        .strip_prefix(root)
        .map(to_slash)
        .unwrap_or_else(|_| to_slash(&path));
    Resource {
        path,
        template,
        resource_type,
    }
}

fn find_asset(src: &Path, config: &Config, route: &str, ext: &str) -> Option<Resource> {
    let resource_type = ResourceType::from_extension(ext);
    let dir = asset_dir(config, resource_type)?;
    let base = src.join(dir);
    let relative = route.strip_prefix(&format!("{dir}/")).unwrap_or(route);

    let mut candidates = vec![base.join(relative)];
    if resource_type == ResourceType::Js {
        // Only the final extension is swapped, `vendor.min.js` keeps `.min`.
        let stem = relative.strip_suffix(&format!(".{ext}")).unwrap_or(relative);
        candidates.extend(
            JS_EXTENSIONS
                .iter()
                .map(|candidate| base.join(format!("{stem}.{candidate}"))),
        );
    }

    candidates
        .into_iter()
        .find(|p| p.is_file())
        .map(|p| found(p, &base, resource_type))
}

fn find_dynamic(pages: &Path, segments: &[&str], extensions: &[String]) -> Option<Resource> {
    for depth in (0..segments.len()).rev() {
        let dir = segments[..depth].iter().fold(pages.to_path_buf(), |p, s| p.join(s));
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };

        let mut templates: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_extension(p, extensions) && dynamic_param(p).is_some())
            .collect();
        templates.sort();

        if let Some(template) = templates.into_iter().next() {
            let resource_type = ResourceType::from_route(&template.to_string_lossy());
            return Some(found(template, pages, resource_type));
        }
    }
    None
}

/// Resolve a request path to the file that produces it.
///
/// Returns `None` when nothing matches, including for paths that try to
/// climb out of the source tree.
pub fn find_resource(src: &Path, config: &Config, request_path: &str) -> Option<Resource> {
    let route = request_path.trim_matches('/');
    if Path::new(route)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let ext = Path::new(route).extension().and_then(|e| e.to_str());
    if let Some(ext) = ext
        && let Some(resource) = find_asset(src, config, route, ext)
    {
        return Some(resource);
    }

    let pages = config.pages_path(src);
    let extensions = &config.build.page_extensions;

    if !route.is_empty() {
        let exact = match ext {
            Some(ext) if extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) => {
                pages.join(route)
            }
            _ => pages.join(format!("{route}.html")),
        };
        if exact.is_file() {
            let resource_type = ResourceType::from_route(&exact.to_string_lossy());
            return Some(found(exact, &pages, resource_type));
        }
    }

    let index = pages.join(route).join("index.html");
    if index.is_file() {
        return Some(found(index, &pages, ResourceType::Html));
    }

    let segments: Vec<&str> = route.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return None;
    }
    find_dynamic(&pages, &segments, extensions)
}

/// Bind the request path against the template that answered it.
///
/// A dynamic template receives every segment below its own directory,
/// joined with `/`.
pub fn get_route_params(request_path: &str, template: &str) -> RouteParams {
    let path = request_path.trim_matches('/').to_string();
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let mut params = BTreeMap::new();
    let template = Path::new(template);
    if let Some(name) = dynamic_param(template) {
        let depth = template
            .parent()
            .map(|p| p.components().count())
            .unwrap_or(0);
        let value = segments.get(depth..).unwrap_or_default().join("/");
        params.insert(name.to_string(), value);
    }

    RouteParams {
        path,
        segments,
        params,
    }
}

/// Strip exactly one leading and one trailing `/` from each route.
pub fn normalize_routes(routes: &[String]) -> Vec<String> {
    routes
        .iter()
        .map(|route| {
            let route = route.strip_prefix('/').unwrap_or(route);
            route.strip_suffix('/').unwrap_or(route).to_string()
        })
        .collect()
}

/// Expand `{table.field}` placeholders against the content store.
///
/// A route without placeholders is returned as is. Records lacking the
/// field, or holding a non-scalar value, produce no route.
pub fn expand_route(route: &str, store: &ContentStore) -> Vec<String> {
    let Some(start) = route.find('{') else {
        return vec![route.to_string()];
    };
    let Some(len) = route[start..].find('}') else {
        return vec![route.to_string()];
    };
    let end = start + len;
    let placeholder = &route[start + 1..end];
    let Some((table, path)) = placeholder.split_once('.') else {
        return vec![route.to_string()];
    };

    let mut expanded = Vec::new();
    for record in store.query(table, &QueryOptions::default()) {
        let value = match field(&record, path) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => continue,
        };
        let candidate = format!("{}{}{}", &route[..start], value, &route[end + 1..]);
        expanded.extend(expand_route(&candidate, store));
    }
    expanded
}
