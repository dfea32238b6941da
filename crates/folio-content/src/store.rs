//! The content store: named tables of JSON records built from a directory.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use folio_core::{CoreError, Result};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    formats::parse_file,
    markdown::MarkdownParser,
    query::{QueryOptions, QueryResult, execute},
};

type Tables = BTreeMap<String, Vec<Value>>;

/// Result of looking up a whole table by name.
///
/// Exactly one row unwraps to [`Lookup::Single`]; any other count is
/// [`Lookup::Many`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Single(Value),
    Many(Vec<Value>),
}

impl Lookup {
    fn from_rows(mut rows: Vec<Value>) -> Self {
        if rows.len() == 1 {
            Self::Single(rows.remove(0))
        } else {
            Self::Many(rows)
        }
    }

    /// Convert to a plain JSON value: the record, or an array of records.
    pub fn into_value(self) -> Value {
        match self {
            Self::Single(record) => record,
            Self::Many(rows) => Value::Array(rows),
        }
    }
}

/// An indexed, queryable view of every content file below a directory.
///
/// Readers always observe a complete index: [`ContentStore::prepare`] builds
/// the new tables first and swaps them in under one write lock.
#[derive(Debug, Default)]
pub struct ContentStore {
    tables: RwLock<Tables>,
}

/// A unit of ingestion: a top-level file or a top-level directory.
#[derive(Debug)]
enum Source {
    File(PathBuf),
    Directory(PathBuf),
}

impl ContentStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every content file below `contents_path`, replacing all prior
    /// tables.
    ///
    /// A missing directory is a no-op. Any unreadable or
    /// malformed file fails the whole call and leaves the previous index in
    /// place.
    pub fn prepare(&self, contents_path: &Path) -> Result<()> {
        if !contents_path.is_dir() {
            debug!(dir = %contents_path.display(), "contents directory does not exist, skipping");
            return Ok(());
        }

        info!(dir = %contents_path.display(), "indexing content");

        let sources = collect_sources(contents_path)?;
        let parser = MarkdownParser::new();

        let parsed: Vec<(String, Vec<Value>)> = sources
            .par_iter()
            .map(|(name, source)| {
                let records = match source {
                    Source::File(path) => parse_file(path, &parser)?.unwrap_or_default(),
                    Source::Directory(path) => parse_directory(path, &parser)?,
                };
                Ok((name.clone(), records))
            })
            .collect::<Result<_>>()?;

        let mut tables = Tables::new();
        for (name, records) in parsed {
            debug!(table = %name, rows = records.len(), "indexed table");
            tables.entry(name).or_default().extend(records);
        }

        info!(tables = tables.len(), "content indexed");
        *self.tables.write() = tables;
        Ok(())
    }

    /// Replace the whole index with the given tables.
    pub fn replace(&self, tables: BTreeMap<String, Vec<Value>>) {
        *self.tables.write() = tables;
    }

    /// Names of all indexed tables.
    pub fn tables(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    /// Run a query against a table. Unknown tables are empty.
    pub fn execute(&self, table: &str, options: &QueryOptions) -> QueryResult {
        let tables = self.tables.read();
        match tables.get(table) {
            Some(rows) => execute(rows, options),
            None if options.count => QueryResult::Count(0),
            None => QueryResult::Rows(Vec::new()),
        }
    }

    /// Rows of a table matching the options, ignoring `options.count`.
    pub fn query(&self, table: &str, options: &QueryOptions) -> Vec<Value> {
        let options = QueryOptions {
            count: false,
            ..options.clone()
        };
        match self.execute(table, &options) {
            QueryResult::Rows(rows) => rows,
            QueryResult::Count(_) => Vec::new(),
        }
    }

    /// Number of rows of a table matching the options.
    pub fn count(&self, table: &str, options: &QueryOptions) -> usize {
        let options = QueryOptions {
            count: true,
            ..options.clone()
        };
        match self.execute(table, &options) {
            QueryResult::Count(n) => n,
            QueryResult::Rows(rows) => rows.len(),
        }
    }

    /// Look up a whole table, unwrapping a single-row table to its record.
    pub fn get(&self, table: &str) -> Option<Lookup> {
        let tables = self.tables.read();
        tables.get(table).cloned().map(Lookup::from_rows)
    }

    /// Serialize the index for handoff to an isolated render worker.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&*self.tables.read())?)
    }

    /// Rebuild a read-only copy of an index from [`ContentStore::snapshot`].
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self> {
        let tables: Tables = serde_json::from_slice(bytes)?;
        Ok(Self {
            tables: RwLock::new(tables),
        })
    }
}

/// Derive a table name: the lower-cased base name without extension, with
/// any leading non-letter characters removed (`001-posts` becomes `posts`).
pub fn table_name(path: &Path) -> String {
    let stem = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };
    stem.map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
        .trim_start_matches(|c: char| !c.is_alphabetic())
        .to_string()
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|n| n.to_string_lossy().starts_with('.'))
}

/// Resolve a symlink to its target, relative to the link's own directory.
fn resolve_link(link: &Path) -> Result<PathBuf> {
    let target = fs::read_link(link).map_err(|e| CoreError::content_parse(link, e.to_string()))?;
    Ok(match link.parent() {
        Some(parent) if target.is_relative() => parent.join(target),
        _ => target,
    })
}

/// List the top-level entries of the contents directory, sorted by name.
fn collect_sources(contents_path: &Path) -> Result<Vec<(String, Source)>> {
    let mut entries: Vec<_> = fs::read_dir(contents_path)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| !is_hidden(p))
        .collect();
    entries.sort();

    let mut sources = Vec::with_capacity(entries.len());
    for path in entries {
        let name = table_name(&path);
        let file_type = fs::symlink_metadata(&path)?.file_type();

        let source = if file_type.is_symlink() {
            let target = resolve_link(&path)?;
            if target.is_dir() {
                Source::Directory(target)
            } else {
                Source::File(target)
            }
        } else if file_type.is_dir() {
            Source::Directory(path)
        } else {
            Source::File(path)
        };

        if name.is_empty() {
            debug!(?source, "skipping content source without a usable name");
            continue;
        }
        sources.push((name, source));
    }

    Ok(sources)
}

/// Parse the files directly inside a directory into one concatenated table.
///
/// Nested directories are not descended into.
fn parse_directory(dir: &Path, parser: &MarkdownParser) -> Result<Vec<Value>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| CoreError::content_parse(dir, e.to_string()))?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .filter(|p| !is_hidden(p))
        .collect();
    files.sort();

    let mut records = Vec::new();
    for path in files {
        let file_type = fs::symlink_metadata(&path)?.file_type();
        let path = if file_type.is_symlink() {
            resolve_link(&path)?
        } else {
            path
        };

        if path.is_dir() {
            debug!(dir = %path.display(), "ignoring nested content directory");
            continue;
        }
        if let Some(rows) = parse_file(&path, parser)? {
            records.extend(rows);
        }
    }

    Ok(records)
}
