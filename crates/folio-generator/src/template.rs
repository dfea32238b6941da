//! Placeholder interpolation for page templates.
//!
//! Templates are plain files with `{{ dotted.path }}` placeholders. A trailing
//! `?` makes a placeholder optional: `{{ params.page? }}` renders empty when
//! the value is missing instead of failing.

use folio_content::{ContentStore, query::field};
use serde_json::{Map, Value};
use thiserror::Error;

/// Template rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Missing required variable.
    #[error("missing required variable: {0}")]
    MissingVariable(String),

    /// Invalid template syntax.
    #[error("invalid template syntax: {0}")]
    InvalidSyntax(String),
}

/// Result type for template operations.
pub type Result<T> = std::result::Result<T, TemplateError>;

/// Values visible to one template render.
///
/// Paths starting with `content.` are answered by the content store:
/// `content.posts` is the whole `posts` table (or its single record) and
/// `content.site.title` reaches into a single-record table.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext<'a> {
    values: Map<String, Value>,
    store: Option<&'a ContentStore>,
}

impl<'a> TemplateContext<'a> {
    /// Create a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `content.*` lookups from the given store.
    #[must_use]
    pub fn with_store(mut self, store: &'a ContentStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Insert a top-level value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Create context with an initial value.
    #[must_use]
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Resolve a dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("content.")
            && let Some(store) = self.store
        {
            let (table, inner) = match rest.split_once('.') {
                Some((table, inner)) => (table, Some(inner)),
                None => (rest, None),
            };
            let value = store.get(table)?.into_value();
            return match inner {
                Some(inner) => field(&value, inner).cloned(),
                None => Some(value),
            };
        }

        let (head, tail) = match path.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (path, None),
        };
        let value = self.values.get(head)?;
        match tail {
            Some(tail) => field(value, tail).cloned(),
            None => Some(value.clone()),
        }
    }
}

/// Text written in place of a placeholder.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A template that supports placeholder interpolation.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    content: String,
}

impl Template {
    /// Create a new template with the given name and content.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Get the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Render the template with the given context.
    ///
    /// Substituted values are not scanned for further placeholders.
    pub fn render(&self, context: &TemplateContext<'_>) -> Result<String> {
        let mut result = self.content.clone();
        let mut pos = 0;

        while let Some(start) = result[pos..].find("{{") {
            let start = pos + start;
            let end = result[start..]
                .find("}}")
                .ok_or_else(|| TemplateError::InvalidSyntax("unclosed {{ delimiter".to_string()))?;
            let end = start + end + 2;

            let var_name = result[start + 2..end - 2].trim();

            let (var_name, optional) = match var_name.strip_suffix('?') {
                Some(stripped) => (stripped.trim_end(), true),
                None => (var_name, false),
            };

            let value = match context.get(var_name) {
                Some(v) => display(&v),
                None if optional => String::new(),
                None => return Err(TemplateError::MissingVariable(var_name.to_string())),
            };

            result.replace_range(start..end, &value);
            pos = start + value.len();
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn test_simple_interpolation() {
        let template = Template::new("test", "Hello, {{ name }}!");
        let ctx = TemplateContext::new().with_var("name", "World");

        assert_eq!(template.render(&ctx).unwrap(), "Hello, World!");
        assert_eq!(template.name(), "test");
    }

    #[test]
    fn test_dotted_paths() {
        let template = Template::new("test", "{{ params.slug }} of {{ segments.0 }}");
        let ctx = TemplateContext::new()
            .with_var("params", json!({"slug": "hello"}))
            .with_var("segments", json!(["blog", "hello"]));

        assert_eq!(template.render(&ctx).unwrap(), "hello of blog");
    }

    #[test]
    fn test_optional_variable() {
        let template = Template::new("test", "Hello{{ suffix? }}!");
        let ctx = TemplateContext::new();

        assert_eq!(template.render(&ctx).unwrap(), "Hello!");
    }

    #[test]
    fn test_missing_required_variable() {
        let template = Template::new("test", "Hello, {{ name }}!");
        let ctx = TemplateContext::new();

        let result = template.render(&ctx);
        assert!(matches!(result, Err(TemplateError::MissingVariable(name)) if name == "name"));
    }

    #[test]
    fn test_unclosed_delimiter() {
        let template = Template::new("test", "Hello, {{ name");
        let ctx = TemplateContext::new().with_var("name", "World");

        assert!(matches!(
            template.render(&ctx),
            Err(TemplateError::InvalidSyntax(_))
        ));
    }

    #[test]
    fn test_values_not_rescanned() {
        let template = Template::new("test", "{{ a }}{{ b }}");
        let ctx = TemplateContext::new()
            .with_var("a", "{{ b }}")
            .with_var("b", 2);

        assert_eq!(template.render(&ctx).unwrap(), "{{ b }}2");
    }

    #[test]
    fn test_content_lookups() {
        let store = ContentStore::new();
        store.replace(BTreeMap::from([
            ("site".to_string(), vec![json!({"title": "Folio"})]),
            (
                "posts".to_string(),
                vec![json!({"slug": "a"}), json!({"slug": "b"})],
            ),
        ]));

        let template = Template::new(
            "test",
            "{{ content.site.title }} {{ content.posts.1.slug }} {{ content.missing? }}",
        );
        let ctx = TemplateContext::new().with_store(&store);

        assert_eq!(template.render(&ctx).unwrap(), "Folio b ");
    }
}
