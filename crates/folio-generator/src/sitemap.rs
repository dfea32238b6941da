//! Sitemap generation.
//!
//! Builds an XML sitemap from the HTML entries of the resource ledger.

use tracing::debug;

use crate::ledger::LedgerEntry;

/// Sitemap generator.
#[derive(Debug)]
pub struct SitemapGenerator {
    base_url: String,
}

impl SitemapGenerator {
    /// Create a generator resolving routes against `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Public URL of a ledger route. A trailing `index.html` is dropped.
    pub fn loc(&self, route: &str) -> String {
        let route = route.trim_start_matches('/');
        let route = route.strip_suffix("index.html").unwrap_or(route);
        format!("{}/{}", self.base_url, route)
    }

    /// Generate sitemap XML, one `<url>` per entry.
    pub fn generate(&self, entries: &[LedgerEntry]) -> String {
        debug!(count = entries.len(), "generating sitemap");

        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push('\n');
        xml.push_str(r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#);
        xml.push('\n');

        for entry in entries {
            xml.push_str("  <url>\n");
            xml.push_str(&format!(
                "    <loc>{}</loc>\n",
                escape_xml(&self.loc(&entry.route))
            ));
            xml.push_str(&format!(
                "    <lastmod>{}</lastmod>\n",
                escape_xml(&entry.lastmod)
            ));
            xml.push_str("  </url>\n");
        }

        xml.push_str("</urlset>\n");
        xml
    }
}

/// Escape special XML characters.
fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
