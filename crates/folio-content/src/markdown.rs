//! Markdown renderer using pulldown-cmark.

use std::path::Path;

use folio_core::{Result, frontmatter::parse_frontmatter};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd, html};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// A heading extracted from rendered Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    /// Heading level, 1 through 6.
    pub depth: u8,
    pub slug: String,
    pub text: String,
}

/// Markdown parser producing content records.
#[derive(Debug)]
pub struct MarkdownParser {
    options: Options,
}

impl Default for MarkdownParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownParser {
    /// Create a new markdown parser with default options.
    pub fn new() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        options.insert(Options::ENABLE_HEADING_ATTRIBUTES);

        Self { options }
    }

    /// Parse a Markdown document into a single content record.
    ///
    /// The record is the frontmatter object plus `content`, `raw_content`,
    /// `content_type` and `headings`.
    pub fn parse(&self, content: &str, path: &Path) -> Result<Value> {
        let (mut record, body) = parse_frontmatter(content, path)?;
        let (html, headings) = self.render(&body);

        record.insert("content".to_string(), Value::String(html));
        record.insert("raw_content".to_string(), Value::String(body));
        record.insert("content_type".to_string(), json!("markdown"));
        record.insert("headings".to_string(), serde_json::to_value(headings)?);

        Ok(Value::Object(record))
    }

    /// Render a Markdown body to HTML, collecting headings in document order.
    pub fn render(&self, body: &str) -> (String, Vec<Heading>) {
        let mut headings = Vec::new();
        let mut current: Option<(u8, String)> = None;

        let events = Parser::new_ext(body, self.options).inspect(|event| match event {
            Event::Start(Tag::Heading { level, .. }) => {
                current = Some((*level as u8, String::new()));
            }
            Event::Text(text) | Event::Code(text) => {
                if let Some((_, ref mut heading_text)) = current {
                    heading_text.push_str(text);
                }
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((depth, text)) = current.take() {
                    headings.push(Heading {
                        depth,
                        slug: slugify(&text),
                        text,
                    });
                }
            }
            _ => {}
        });

        let mut out = String::with_capacity(body.len() * 3 / 2);
        html::push_html(&mut out, events);
        (out, headings)
    }
}

/// Lower-case the text and collapse every run of non-word characters to `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut in_gap = false;

    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.push(c);
            in_gap = false;
        } else if !in_gap {
            slug.push('-');
            in_gap = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_markdown() {
        let parser = MarkdownParser::new();
        let content = r#"---
title: "Test Post"
---

# Hello World

This is a test."#;

        let record = parser.parse(content, Path::new("test.md")).unwrap();

        assert_eq!(record["title"], "Test Post");
        assert_eq!(record["content_type"], "markdown");
        let html = record["content"].as_str().unwrap();
        assert!(html.contains("<h1>Hello World</h1>"));
        assert!(html.contains("<p>This is a test.</p>"));
        assert!(record["raw_content"].as_str().unwrap().starts_with("# Hello"));
    }

    #[test]
    fn test_heading_extraction() {
        let parser = MarkdownParser::new();
        let (_, headings) = parser.render(
            r#"# Heading 1
## Heading `two`
### Third, and last"#,
        );

        assert_eq!(headings.len(), 3);
        assert_eq!(headings[0].depth, 1);
        assert_eq!(headings[0].text, "Heading 1");
        assert_eq!(headings[0].slug, "heading-1");
        assert_eq!(headings[1].depth, 2);
        assert_eq!(headings[1].text, "Heading two");
        assert_eq!(headings[2].slug, "third-and-last");
    }

    #[test]
    fn test_headings_in_record() {
        let parser = MarkdownParser::new();
        let record = parser
            .parse("## Intro\n\ntext", Path::new("a.md"))
            .unwrap();

        assert_eq!(
            record["headings"],
            json!([{ "depth": 2, "slug": "intro", "text": "Intro" }])
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("Multiple   Spaces"), "multiple-spaces");
        assert_eq!(slugify("snake_case stays"), "snake_case-stays");
        assert_eq!(slugify("Ends with bang!"), "ends-with-bang-");
    }

    #[test]
    fn test_table_rendering() {
        let parser = MarkdownParser::new();
        let (html, _) = parser.render(
            r#"| Header 1 | Header 2 |
|----------|----------|
| Cell 1   | Cell 2   |"#,
        );

        assert!(html.contains("<table>"));
        assert!(html.contains("<thead>"));
        assert!(html.contains("<td>"));
    }

    #[test]
    fn test_no_frontmatter() {
        let parser = MarkdownParser::new();
        let content = "# Just Content\n\nNo frontmatter here.";
        let record = parser.parse(content, Path::new("test.md")).unwrap();

        assert!(record.get("title").is_none());
        assert!(record["content"].as_str().unwrap().contains("Just Content"));
    }
}
