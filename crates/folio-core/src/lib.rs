//! Folio Core Library
//!
//! Core types, configuration, and error handling for the Folio build engine.

pub mod config;
pub mod error;
pub mod frontmatter;
pub mod resource;

pub use config::Config;
pub use error::{CoreError, Result};
pub use frontmatter::Frontmatter;
pub use resource::{ResourceType, Route};
