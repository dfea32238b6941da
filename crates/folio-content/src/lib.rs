//! Folio Content Library
//!
//! Builds a queryable index from the structured content files of a site:
//! JSON, YAML, TOML, CSV and Markdown with frontmatter.
//!
//! Every top-level file or directory below the contents directory becomes a
//! named table of JSON records. Tables are queried with [`QueryOptions`]:
//!
//! ```no_run
//! use std::path::Path;
//!
//! use folio_content::{ContentStore, QueryOptions};
//!
//! let store = ContentStore::new();
//! store.prepare(Path::new("contents")).unwrap();
//! let recent = store.query(
//!     "posts",
//!     &QueryOptions::new().filter("draft_not", true).order_by("date desc").limit(5),
//! );
//! ```

pub mod formats;
pub mod markdown;
pub mod query;
pub mod store;

pub use formats::{ContentFormat, parse_file};
pub use markdown::{Heading, MarkdownParser};
pub use query::{QueryOptions, QueryResult};
pub use store::{ContentStore, Lookup, table_name};
