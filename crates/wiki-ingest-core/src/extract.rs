//! Character extraction from Fandom-style wiki pages.
//!
//! Each character entry is a portable infobox:
//!
//! ```html
//! <aside class="portable-infobox" data-character-id="7">
//!   <h2 class="pi-title" data-source="name">Arthur Morgan</h2>
//!   <figure class="pi-image"><img src="//static.example.net/arthur.png"></figure>
//!   <div class="pi-data" data-source="universe">
//!     <h3 class="pi-data-label">Universe</h3>
//!     <div class="pi-data-value">Red Dead</div>
//!   </div>
//!   <!-- role, rarity, level, description, or any other labelled row -->
//!   <section class="pi-group" data-group="stats">
//!     <div class="pi-data" data-source="strength"><div class="pi-data-value">80</div></div>
//!   </section>
//!   <section class="pi-group" data-group="abilities">
//!     <div class="pi-ability" data-name="Dead Eye" data-icon="🎯"
//!          data-damage="100-150" data-cooldown="8">Slows time.</div>
//!   </section>
//! </aside>
//! ```
//!
//! The first entry on a page falls back to the page heading for its name
//! and to the article's lead paragraphs for its description. Fandom puts
//! a character's biography in the article body rather than the infobox.
//!
//! Extraction is partial-success: a malformed entry yields exactly one
//! [`ExtractionError`] (listing every bad field) and is skipped, while the
//! rest of the page is still extracted. Output depends only on the page
//! content, so repeated runs over the same input agree.

use std::collections::{BTreeMap, HashSet};

use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::models::{
    parse_non_negative, Ability, CharacterRecord, Damage, RawPage, UniverseInfo,
};

/// Longest stored description, in characters, before truncation.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Infobox fields mapped onto named record fields instead of `attributes`.
const KNOWN_FIELDS: &[&str] = &["name", "universe", "role", "rarity", "level", "description"];

/// One field that failed validation inside an entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub problem: String,
}

impl FieldIssue {
    fn new(field: impl Into<String>, problem: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            problem: problem.into(),
        }
    }
}

/// A page or entry that could not be turned into a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{page_url}: {message}")]
pub struct ExtractionError {
    pub page_url: String,
    /// Zero-based infobox index; `None` for page-level failures.
    pub entry: Option<usize>,
    /// Entry name, when one could be read.
    pub label: Option<String>,
    pub fields: Vec<FieldIssue>,
    pub message: String,
}

impl ExtractionError {
    fn page(page_url: &str, message: impl Into<String>) -> Self {
        Self {
            page_url: page_url.to_string(),
            entry: None,
            label: None,
            fields: Vec::new(),
            message: message.into(),
        }
    }

    fn entry(page_url: &str, index: usize, label: Option<String>, fields: Vec<FieldIssue>) -> Self {
        let detail = fields
            .iter()
            .map(|f| format!("{} {}", f.field, f.problem))
            .collect::<Vec<_>>()
            .join("; ");
        let message = match &label {
            Some(name) => format!("entry {} ({}): {}", index, name, detail),
            None => format!("entry {}: {}", index, detail),
        };
        Self {
            page_url: page_url.to_string(),
            entry: Some(index),
            label,
            fields,
            message,
        }
    }
}

/// Candidates and errors from one page.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub candidates: Vec<CharacterRecord>,
    pub errors: Vec<ExtractionError>,
}

/// Tunables for extraction and link discovery.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Lower-case substrings that mark a `/wiki/` link as a character page.
    pub link_keywords: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            link_keywords: ["character", "personnage", "protagonist", "villain"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Compiled selectors plus options. Cheap to share across tasks.
pub struct Extractor {
    options: ExtractOptions,
    infobox: Selector,
    title: Selector,
    data_item: Selector,
    data_label: Selector,
    data_value: Selector,
    image: Selector,
    stat_item: Selector,
    ability: Selector,
    community_name: Selector,
    page_title: Selector,
    paragraph: Selector,
    link: Selector,
}

/// Page-level context shared by the entries of one page.
#[derive(Clone, Copy)]
struct PageContext<'a> {
    url: &'a str,
    base: Option<&'a Url>,
    universe: Option<&'a str>,
    /// Page heading; only offered to the first entry.
    title: Option<&'a str>,
    /// Article lead text; only offered to the first entry.
    summary: Option<&'a str>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector '{}': {:?}", css, e))
}

impl Extractor {
    pub fn new(options: ExtractOptions) -> Result<Self> {
        Ok(Self {
            options,
            infobox: selector("aside.portable-infobox")?,
            title: selector(".pi-title")?,
            data_item: selector("[data-source]")?,
            data_label: selector(".pi-data-label")?,
            data_value: selector(".pi-data-value")?,
            image: selector(".pi-image img, img.pi-image-thumbnail")?,
            stat_item: selector("section[data-group=\"stats\"] [data-source]")?,
            ability: selector("section[data-group=\"abilities\"] .pi-ability")?,
            community_name: selector(".fandom-community-header__community-name")?,
            page_title: selector("h1.page-header__title, h1#firstHeading")?,
            paragraph: selector(".mw-parser-output > p")?,
            link: selector("a[href]")?,
        })
    }

    /// Extract every character entry on the page.
    pub fn extract(&self, page: &RawPage) -> Extraction {
        self.extract_with_universe(page, None)
    }

    /// Like [`extract`](Self::extract), with a universe to use when neither
    /// the infobox nor the page header names one.
    pub fn extract_with_universe(&self, page: &RawPage, fallback: Option<&str>) -> Extraction {
        let mut out = Extraction::default();

        if !page.is_html() {
            out.errors.push(ExtractionError::page(
                &page.url,
                format!("unsupported content type '{}'", page.content_type),
            ));
            return out;
        }
        if page.body.trim().is_empty() {
            out.errors
                .push(ExtractionError::page(&page.url, "page body is empty"));
            return out;
        }

        let html = Html::parse_document(&page.body);
        let base = Url::parse(&page.url).ok();
        let community = self.community_universe(&html);
        let title = self.page_title(&html);
        let summary = self.article_text(&html);

        let lead = PageContext {
            url: &page.url,
            base: base.as_ref(),
            universe: community.as_deref().or(fallback),
            title: title.as_deref(),
            summary: summary.as_deref(),
        };
        let rest = PageContext {
            title: None,
            summary: None,
            ..lead
        };

        for (index, entry) in html.select(&self.infobox).enumerate() {
            let ctx = if index == 0 { lead } else { rest };
            match self.parse_entry(entry, ctx) {
                Ok(record) => out.candidates.push(record),
                Err((label, fields)) => {
                    tracing::debug!(page = %page.url, entry = index, "skipping malformed entry");
                    out.errors
                        .push(ExtractionError::entry(&page.url, index, label, fields));
                }
            }
        }

        out
    }

    /// Read the landing page of a wiki as a description of its universe.
    ///
    /// The name comes from the community header (or the page heading), the
    /// image and attributes from the first infobox, the description from
    /// the article text. Returns `None` for pages with nothing to name.
    pub fn describe_universe(&self, page: &RawPage) -> Option<UniverseInfo> {
        if !page.is_html() || page.body.trim().is_empty() {
            return None;
        }
        let html = Html::parse_document(&page.body);
        let name = self
            .community_universe(&html)
            .or_else(|| self.page_title(&html))?;
        let base = Url::parse(&page.url).ok();
        let infobox = html.select(&self.infobox).next();

        let image = infobox.and_then(|b| self.image_of(b, base.as_ref()));
        let attributes = infobox
            .map(|b| labelled_attributes(&self.infobox_fields(b)))
            .unwrap_or_default();

        Some(UniverseInfo {
            url: page.url.clone(),
            name,
            image,
            description: self.article_text(&html).map(|d| truncate_description(&d)),
            attributes,
        })
    }

    /// Character page links on an index page, in document order.
    ///
    /// Only same-host `/wiki/` links without a namespace colon whose URL
    /// contains one of the configured keywords are returned.
    pub fn discover_links(&self, page: &RawPage) -> Vec<String> {
        let Ok(base) = Url::parse(&page.url) else {
            return Vec::new();
        };
        let html = Html::parse_document(&page.body);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for a in html.select(&self.link) {
            let Some(href) = a.value().attr("href") else {
                continue;
            };
            let Ok(mut target) = base.join(href.trim()) else {
                continue;
            };
            target.set_fragment(None);
            if target.host_str() != base.host_str() {
                continue;
            }
            let Some(title) = target.path().strip_prefix("/wiki/") else {
                continue;
            };
            let namespaced = title.contains(':') || title.to_ascii_lowercase().contains("%3a");
            if title.is_empty() || namespaced {
                continue;
            }
            let lowered = target.as_str().to_lowercase();
            if !self
                .options
                .link_keywords
                .iter()
                .any(|k| lowered.contains(k.as_str()))
            {
                continue;
            }
            if target.as_str() == base.as_str() {
                continue;
            }
            if seen.insert(target.to_string()) {
                links.push(target.to_string());
            }
        }

        links
    }

    fn community_universe(&self, html: &Html) -> Option<String> {
        let header = html.select(&self.community_name).next()?;
        let name = collapse(header.text());
        let name = name.strip_suffix("Wiki").unwrap_or(&name).trim().to_string();
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    fn page_title(&self, html: &Html) -> Option<String> {
        html.select(&self.page_title)
            .next()
            .map(|h| collapse(h.text()))
            .filter(|t| !t.is_empty())
    }

    /// Lead paragraphs of the article body, joined.
    fn article_text(&self, html: &Html) -> Option<String> {
        let text = html
            .select(&self.paragraph)
            .map(|p| collapse(p.text()))
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Top-level `data-source` rows as `source -> (label, value)`.
    /// First occurrence of each source wins.
    fn infobox_fields(&self, entry: ElementRef<'_>) -> BTreeMap<String, (String, String)> {
        let mut fields = BTreeMap::new();
        for item in entry.select(&self.data_item) {
            if in_group(&item) {
                continue;
            }
            let Some(source) = item.value().attr("data-source") else {
                continue;
            };
            let source = source.trim().to_string();
            if source.is_empty() || fields.contains_key(&source) {
                continue;
            }
            let label = item
                .select(&self.data_label)
                .next()
                .map(|l| collapse(l.text()))
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| source.clone());
            let value = match item.select(&self.data_value).next() {
                Some(v) => collapse(v.text()),
                None => collapse(item.text()),
            };
            fields.insert(source, (label, value));
        }
        fields
    }

    fn image_of(&self, entry: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
        entry
            .select(&self.image)
            .next()
            .and_then(|img| {
                img.value()
                    .attr("src")
                    .or_else(|| img.value().attr("data-src"))
            })
            .and_then(|src| absolute_image_url(src, base))
    }

    fn parse_entry(
        &self,
        entry: ElementRef<'_>,
        ctx: PageContext<'_>,
    ) -> std::result::Result<CharacterRecord, (Option<String>, Vec<FieldIssue>)> {
        let mut issues = Vec::new();

        let fields = self.infobox_fields(entry);
        let field = |name: &str| -> Option<String> {
            fields
                .get(name)
                .map(|(_, v)| v.clone())
                .filter(|v| !v.is_empty())
        };

        let name = field("name").or_else(|| {
            entry
                .select(&self.title)
                .next()
                .map(|t| collapse(t.text()))
                .filter(|t| !t.is_empty())
                .or_else(|| ctx.title.map(String::from))
        });
        if name.is_none() {
            issues.push(FieldIssue::new("name", "is missing"));
        }

        let universe = field("universe").or_else(|| ctx.universe.map(String::from));
        if universe.is_none() {
            issues.push(FieldIssue::new("universe", "is missing"));
        }

        let level = match field("level") {
            None => 0,
            Some(raw) => match raw.parse::<u32>() {
                Ok(level) => level,
                Err(_) => {
                    issues.push(FieldIssue::new(
                        "level",
                        format!("'{}' is not a non-negative integer", raw),
                    ));
                    0
                }
            },
        };

        let mut stats = BTreeMap::new();
        for item in entry.select(&self.stat_item) {
            let Some(key) = item.value().attr("data-source").map(str::trim) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            let raw = match item.select(&self.data_value).next() {
                Some(v) => collapse(v.text()),
                None => collapse(item.text()),
            };
            match parse_non_negative(&raw) {
                Some(value) => {
                    stats.insert(key.to_string(), value);
                }
                None => issues.push(FieldIssue::new(
                    format!("stats.{}", key),
                    format!("'{}' is not a non-negative number", raw),
                )),
            }
        }

        let mut abilities = Vec::new();
        for (i, node) in entry.select(&self.ability).enumerate() {
            let attr = |name: &str| node.value().attr(name).map(|v| v.trim().to_string());
            let path = |f: &str| format!("abilities[{}].{}", i, f);

            let ability_name = attr("data-name").filter(|n| !n.is_empty());
            if ability_name.is_none() {
                issues.push(FieldIssue::new(path("name"), "is missing"));
            }
            let damage = match attr("data-damage") {
                Some(raw) => {
                    let parsed = Damage::parse(&raw);
                    if parsed.is_none() {
                        issues.push(FieldIssue::new(
                            path("damage"),
                            format!("'{}' is not a non-negative number or range", raw),
                        ));
                    }
                    parsed
                }
                None => {
                    issues.push(FieldIssue::new(path("damage"), "is missing"));
                    None
                }
            };
            let cooldown = match attr("data-cooldown") {
                Some(raw) => {
                    let parsed = parse_non_negative(&raw);
                    if parsed.is_none() {
                        issues.push(FieldIssue::new(
                            path("cooldown"),
                            format!("'{}' is not a non-negative number", raw),
                        ));
                    }
                    parsed
                }
                None => {
                    issues.push(FieldIssue::new(path("cooldown"), "is missing"));
                    None
                }
            };

            if let (Some(name), Some(damage), Some(cooldown)) = (ability_name, damage, cooldown) {
                abilities.push(Ability {
                    name,
                    icon: attr("data-icon").unwrap_or_default(),
                    description: collapse(node.text()),
                    damage,
                    cooldown,
                });
            }
        }

        let (Some(name), Some(universe)) = (name.clone(), universe) else {
            return Err((name, issues));
        };
        if !issues.is_empty() {
            return Err((Some(name), issues));
        }

        let image = self.image_of(entry, ctx.base);
        let attributes = labelled_attributes(&fields);
        let description = field("description")
            .or_else(|| ctx.summary.map(String::from))
            .map(|d| truncate_description(&d));

        Ok(CharacterRecord {
            id: entry
                .value()
                .attr("data-character-id")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            name,
            universe,
            role: field("role").unwrap_or_default(),
            rarity: field("rarity").unwrap_or_default(),
            level,
            description,
            image,
            source_url: Some(ctx.url.to_string()),
            stats,
            abilities,
            attributes,
        })
    }
}

/// Infobox rows that are not mapped onto a named record field, keyed by label.
fn labelled_attributes(fields: &BTreeMap<String, (String, String)>) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter(|(source, _)| !KNOWN_FIELDS.contains(&source.as_str()))
        .filter(|(_, (_, value))| !value.is_empty())
        .map(|(_, (label, value))| (label.clone(), value.clone()))
        .collect()
}

/// Whether an element sits inside a `data-group` section.
fn in_group(el: &ElementRef<'_>) -> bool {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().attr("data-group").is_some())
}

/// Join text nodes and collapse all whitespace runs to single spaces.
fn collapse<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_description(text: &str) -> String {
    if text.chars().count() <= MAX_DESCRIPTION_CHARS {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(MAX_DESCRIPTION_CHARS).collect();
    cut.push_str("...");
    cut
}

fn absolute_image_url(src: &str, base: Option<&Url>) -> Option<String> {
    let src = src.trim();
    if src.is_empty() || src.starts_with("data:") {
        return None;
    }
    if let Some(rest) = src.strip_prefix("//") {
        return Some(format!("https://{}", rest));
    }
    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }
    base.and_then(|b| b.join(src).ok()).map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(url: &str, body: &str) -> RawPage {
        RawPage {
            url: url.to_string(),
            status: 200,
            content_type: "text/html".to_string(),
            body: body.to_string(),
            attempts: 1,
        }
    }

    fn extractor() -> Extractor {
        Extractor::new(ExtractOptions::default()).unwrap()
    }

    const ARTHUR: &str = r#"
        <html><body>
        <div class="fandom-community-header__community-name">Red Dead Wiki</div>
        <aside class="portable-infobox" data-character-id="7">
          <h2 class="pi-title" data-source="name">  Arthur   Morgan </h2>
          <figure class="pi-image"><img src="//static.example.net/arthur.png"></figure>
          <div class="pi-data" data-source="role">
            <h3 class="pi-data-label">Role</h3><div class="pi-data-value">Outlaw</div>
          </div>
          <div class="pi-data" data-source="rarity"><div class="pi-data-value">Legendary</div></div>
          <div class="pi-data" data-source="level"><div class="pi-data-value">36</div></div>
          <div class="pi-data" data-source="gang">
            <h3 class="pi-data-label">Gang</h3><div class="pi-data-value">Van der Linde</div>
          </div>
          <section class="pi-group" data-group="stats">
            <div class="pi-data" data-source="strength"><div class="pi-data-value">80</div></div>
            <div class="pi-data" data-source="agility"><div class="pi-data-value">65.5</div></div>
          </section>
          <section class="pi-group" data-group="abilities">
            <div class="pi-ability" data-name="Dead Eye" data-icon="🎯"
                 data-damage="100-150" data-cooldown="8">Slows time.</div>
          </section>
        </aside>
        </body></html>
    "#;

    #[test]
    fn extracts_full_entry() {
        let out = extractor().extract(&page("https://reddead.fandom.com/wiki/Arthur", ARTHUR));
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(out.candidates.len(), 1);

        let c = &out.candidates[0];
        assert_eq!(c.id.as_deref(), Some("7"));
        assert_eq!(c.name, "Arthur Morgan");
        assert_eq!(c.universe, "Red Dead");
        assert_eq!(c.role, "Outlaw");
        assert_eq!(c.rarity, "Legendary");
        assert_eq!(c.level, 36);
        assert_eq!(c.image.as_deref(), Some("https://static.example.net/arthur.png"));
        assert_eq!(c.stats.get("strength"), Some(&80.0));
        assert_eq!(c.stats.get("agility"), Some(&65.5));
        assert_eq!(c.attributes.get("Gang").map(String::as_str), Some("Van der Linde"));
        assert!(!c.attributes.contains_key("strength"));
        assert_eq!(c.abilities.len(), 1);
        assert_eq!(c.abilities[0].name, "Dead Eye");
        assert_eq!(c.abilities[0].description, "Slows time.");
        assert_eq!(
            c.abilities[0].damage,
            Damage::Range {
                min: 100.0,
                max: 150.0
            }
        );
        assert_eq!(c.abilities[0].cooldown, 8.0);
        assert_eq!(
            c.source_url.as_deref(),
            Some("https://reddead.fandom.com/wiki/Arthur")
        );
    }

    #[test]
    fn malformed_entry_is_skipped_with_one_error() {
        let body = r#"
            <aside class="portable-infobox">
              <h2 class="pi-title">Good</h2>
              <div class="pi-data" data-source="universe"><div class="pi-data-value">U</div></div>
            </aside>
            <aside class="portable-infobox">
              <h2 class="pi-title">Bad</h2>
              <div class="pi-data" data-source="universe"><div class="pi-data-value">U</div></div>
              <div class="pi-data" data-source="level"><div class="pi-data-value">-3</div></div>
              <section data-group="abilities">
                <div class="pi-ability" data-name="Zap" data-damage="10" data-cooldown="soon"></div>
              </section>
            </aside>
            <aside class="portable-infobox">
              <h2 class="pi-title">Also Good</h2>
              <div class="pi-data" data-source="universe"><div class="pi-data-value">U</div></div>
            </aside>
        "#;
        let out = extractor().extract(&page("https://u.fandom.com/wiki/List", body));
        assert_eq!(out.candidates.len(), 2);
        assert_eq!(out.errors.len(), 1);

        let err = &out.errors[0];
        assert_eq!(err.entry, Some(1));
        assert_eq!(err.label.as_deref(), Some("Bad"));
        let fields: Vec<&str> = err.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["level", "abilities[0].cooldown"]);
    }

    #[test]
    fn negative_stat_is_a_field_error() {
        let body = r#"
            <aside class="portable-infobox">
              <h2 class="pi-title">X</h2>
              <div class="pi-data" data-source="universe"><div class="pi-data-value">U</div></div>
              <section data-group="stats">
                <div class="pi-data" data-source="speed"><div class="pi-data-value">-1</div></div>
              </section>
            </aside>
        "#;
        let out = extractor().extract(&page("https://u.fandom.com/wiki/X", body));
        assert!(out.candidates.is_empty());
        assert_eq!(out.errors[0].fields[0].field, "stats.speed");
    }

    #[test]
    fn missing_universe_without_header_is_an_error() {
        let body = r#"<aside class="portable-infobox"><h2 class="pi-title">Nobody</h2></aside>"#;
        let out = extractor().extract(&page("https://u.fandom.com/wiki/X", body));
        assert!(out.candidates.is_empty());
        assert_eq!(out.errors[0].fields[0].field, "universe");
    }

    #[test]
    fn empty_and_non_html_pages_fail_whole_page() {
        let ex = extractor();
        let out = ex.extract(&page("https://u.fandom.com/wiki/X", "   "));
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].entry, None);

        let mut json = page("https://u.fandom.com/wiki/X", "{}");
        json.content_type = "application/json".to_string();
        let out = ex.extract(&json);
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("content type"));
    }

    #[test]
    fn page_without_infobox_yields_nothing() {
        let out = extractor().extract(&page("https://u.fandom.com/wiki/X", "<p>hello</p>"));
        assert!(out.candidates.is_empty());
        assert!(out.errors.is_empty());
    }

    #[test]
    fn long_description_is_truncated() {
        let long = "é".repeat(MAX_DESCRIPTION_CHARS + 10);
        let body = format!(
            r#"<aside class="portable-infobox"><h2 class="pi-title">D</h2>
               <div data-source="universe">U</div>
               <div data-source="description">{}</div></aside>"#,
            long
        );
        let out = extractor().extract(&page("https://u.fandom.com/wiki/D", &body));
        let desc = out.candidates[0].description.clone().unwrap();
        assert_eq!(desc.chars().count(), MAX_DESCRIPTION_CHARS + 3);
        assert!(desc.ends_with("..."));
    }

    #[test]
    fn extraction_is_deterministic() {
        let ex = extractor();
        let p = page("https://reddead.fandom.com/wiki/Arthur", ARTHUR);
        let a = ex.extract(&p);
        let b = ex.extract(&p);
        assert_eq!(a.candidates, b.candidates);
        assert_eq!(a.errors, b.errors);
    }

    #[test]
    fn discovers_character_links() {
        let body = r##"
            <a href="/wiki/Main_Characters">chars</a>
            <a href="/wiki/Category:Characters">category</a>
            <a href="/wiki/Villain_List#top">villains</a>
            <a href="/wiki/Villain_List">villains again</a>
            <a href="/wiki/Weapons">weapons</a>
            <a href="https://other.fandom.com/wiki/Characters">other wiki</a>
            <a href="https://reddead.fandom.com/wiki/Protagonist">abs</a>
        "##;
        let links = extractor().discover_links(&page("https://reddead.fandom.com/wiki/Red_Dead", body));
        assert_eq!(
            links,
            vec![
                "https://reddead.fandom.com/wiki/Main_Characters",
                "https://reddead.fandom.com/wiki/Villain_List",
                "https://reddead.fandom.com/wiki/Protagonist",
            ]
        );
    }

    const SADIE: &str = r#"
        <html><body>
        <h1 class="page-header__title">Sadie Adler</h1>
        <div class="mw-parser-output">
          <aside class="portable-infobox" data-character-id="sadie">
            <figure class="pi-image"><img src="//static.example.net/sadie.png"></figure>
            <div class="pi-data" data-source="universe"><div class="pi-data-value">Red Dead</div></div>
          </aside>
          <p>Sadie Adler is a   member of the gang.</p>
          <p></p>
          <p>She later becomes a <a href="/wiki/Bounty_Hunter">bounty hunter</a> in the epilogue.</p>
          <aside class="portable-infobox">
            <div class="pi-data" data-source="universe"><div class="pi-data-value">Red Dead</div></div>
          </aside>
        </div>
        </body></html>
    "#;

    #[test]
    fn first_entry_uses_page_heading_and_article_text() {
        let out = extractor().extract(&page("https://reddead.fandom.com/wiki/Sadie", SADIE));
        assert_eq!(out.candidates.len(), 1);
        let sadie = &out.candidates[0];
        assert_eq!(sadie.name, "Sadie Adler");
        assert_eq!(
            sadie.description.as_deref(),
            Some("Sadie Adler is a member of the gang. She later becomes a bounty hunter in the epilogue.")
        );

        // The heading belongs to the page, not to every entry on it.
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].entry, Some(1));
        assert_eq!(out.errors[0].fields[0].field, "name");
    }

    #[test]
    fn infobox_fields_win_over_page_text() {
        let body = r#"
            <h1 id="firstHeading">Page Heading</h1>
            <div class="mw-parser-output">
              <aside class="portable-infobox">
                <h2 class="pi-title">Infobox Name</h2>
                <div data-source="universe">U</div>
                <div data-source="description">From the infobox.</div>
              </aside>
              <p>From the article.</p>
            </div>
        "#;
        let out = extractor().extract(&page("https://u.fandom.com/wiki/X", body));
        let c = &out.candidates[0];
        assert_eq!(c.name, "Infobox Name");
        assert_eq!(c.description.as_deref(), Some("From the infobox."));
    }

    #[test]
    fn long_article_text_is_truncated() {
        let body = format!(
            r#"<div class="mw-parser-output">
                 <aside class="portable-infobox"><h2 class="pi-title">L</h2><div data-source="universe">U</div></aside>
                 <p>{}</p>
               </div>"#,
            "word ".repeat(200)
        );
        let out = extractor().extract(&page("https://u.fandom.com/wiki/L", &body));
        let desc = out.candidates[0].description.clone().unwrap();
        assert_eq!(desc.chars().count(), MAX_DESCRIPTION_CHARS + 3);
        assert!(desc.ends_with("..."));
    }

    #[test]
    fn universe_fallback_applies_only_without_header() {
        let ex = extractor();
        let bare = r#"<aside class="portable-infobox"><h2 class="pi-title">Nobody</h2></aside>"#;
        let out = ex.extract_with_universe(&page("https://u.fandom.com/wiki/X", bare), Some("Landing"));
        assert_eq!(out.candidates[0].universe, "Landing");

        let out = ex.extract_with_universe(
            &page("https://reddead.fandom.com/wiki/Arthur", ARTHUR),
            Some("Landing"),
        );
        assert_eq!(out.candidates[0].universe, "Red Dead");
    }

    #[test]
    fn landing_page_describes_the_universe() {
        let body = r#"
            <html><body>
            <a class="fandom-community-header__community-name">Red Dead Wiki</a>
            <div class="mw-parser-output">
              <aside class="portable-infobox">
                <h2 class="pi-title" data-source="name">Red Dead Redemption 2</h2>
                <figure class="pi-image"><img src="//static.example.net/rdr2.png"></figure>
                <div class="pi-data" data-source="developer">
                  <h3 class="pi-data-label">Developer</h3><div class="pi-data-value">Rockstar</div>
                </div>
              </aside>
              <p>An open world western.</p>
            </div>
            </body></html>
        "#;
        let info = extractor()
            .describe_universe(&page("https://reddead.fandom.com/wiki/Red_Dead_Wiki", body))
            .unwrap();
        assert_eq!(info.name, "Red Dead");
        assert_eq!(info.image.as_deref(), Some("https://static.example.net/rdr2.png"));
        assert_eq!(info.description.as_deref(), Some("An open world western."));
        assert_eq!(
            info.attributes.get("Developer").map(String::as_str),
            Some("Rockstar")
        );
        assert!(!info.attributes.contains_key("name"));

        let mut json = page("https://reddead.fandom.com/wiki/X", "{}");
        json.content_type = "application/json".to_string();
        assert_eq!(extractor().describe_universe(&json), None);
    }

    #[test]
    fn percent_encoded_namespaces_are_not_character_links() {
        let body = r#"
            <a href="/wiki/Category%3aCharacters">lower</a>
            <a href="/wiki/Category%3ACharacters">upper</a>
            <a href="/wiki/Minor_characters">ok</a>
        "#;
        let links = extractor().discover_links(&page("https://u.fandom.com/wiki/Home", body));
        assert_eq!(links, vec!["https://u.fandom.com/wiki/Minor_characters"]);
    }

    #[test]
    fn image_urls_are_made_absolute() {
        let base = Url::parse("https://a.fandom.com/wiki/X").unwrap();
        assert_eq!(
            absolute_image_url("//img.net/a.png", Some(&base)).as_deref(),
            Some("https://img.net/a.png")
        );
        assert_eq!(
            absolute_image_url("/images/a.png", Some(&base)).as_deref(),
            Some("https://a.fandom.com/images/a.png")
        );
        assert_eq!(absolute_image_url("data:image/gif;base64,xx", Some(&base)), None);
    }
}
