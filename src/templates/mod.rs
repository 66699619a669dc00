//! Built-in blog templates using the Tera template engine
//!
//! The templates are embedded in the binary, so a site needs nothing but
//! its posts and an optional `_config.yml`.

use anyhow::Result;
use chrono::format::{Item, StrftimeItems};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Write;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{parse_date_time, PostMeta};

/// Template renderer with the embedded blog theme
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Create a new renderer with all templates loaded
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_templates(vec![
            ("layout.html", include_str!("blog/layout.html")),
            ("index.html", include_str!("blog/index.html")),
            ("post.html", include_str!("blog/post.html")),
            ("404.html", include_str!("blog/404.html")),
        ])?;

        tera.register_filter("strip_html", strip_html_filter);
        tera.register_filter("truncate_chars", truncate_chars_filter);
        tera.register_filter("date_format", date_format_filter);

        Ok(Self { tera })
    }

    /// Render a template with given context
    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        Ok(self.tera.render(template_name, context)?)
    }
}

/// Tera filter: strip HTML tags
fn strip_html_filter(
    value: &tera::Value,
    _args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("strip_html", "value", String, value);
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    Ok(tera::Value::String(result.trim().to_string()))
}

/// Tera filter: truncate by character count
fn truncate_chars_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("truncate_chars", "value", String, value);
    let length = match args.get("length") {
        Some(val) => tera::try_get_value!("truncate_chars", "length", usize, val),
        None => 150,
    };
    let omission = match args.get("omission") {
        Some(val) => tera::try_get_value!("truncate_chars", "omission", String, val),
        None => "...".to_string(),
    };

    if s.chars().count() <= length {
        Ok(tera::Value::String(s))
    } else {
        let truncated: String = s.chars().take(length).collect();
        Ok(tera::Value::String(format!(
            "{}{}",
            truncated.trim_end(),
            omission
        )))
    }
}

/// Tera filter: reformat a front-matter date with a strftime pattern.
/// Dates that do not parse are shown as written; a pattern chrono cannot
/// apply is a render error.
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "%Y-%m-%d".to_string(),
    };

    let Some(date) = parse_date_time(&s) else {
        return Ok(tera::Value::String(s));
    };

    let invalid = || tera::Error::msg(format!("invalid date format `{}`", format));
    if StrftimeItems::new(&format).any(|item| matches!(item, Item::Error)) {
        return Err(invalid());
    }

    // Specifiers a naive date-time cannot fill (such as `%z`) error here
    let mut out = String::new();
    write!(out, "{}", date.format(&format)).map_err(|_| invalid())?;
    Ok(tera::Value::String(out))
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct SiteData {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,
    pub url: String,
    pub root: String,
    pub date_format: String,
}

impl From<&SiteConfig> for SiteData {
    fn from(config: &SiteConfig) -> Self {
        Self {
            title: config.title.clone(),
            subtitle: config.subtitle.clone(),
            description: config.description.clone(),
            author: config.author.clone(),
            language: config.language.clone(),
            url: config.url.clone(),
            root: config.root_path(),
            date_format: config.date_format.clone(),
        }
    }
}

/// A post as shown in listings and page headers
#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub slug: String,
    pub title: String,
    pub excerpt: Option<String>,
    pub date: Option<String>,
    pub author: Option<String>,
    pub path: String,
}

impl PostData {
    pub fn new(meta: &PostMeta, root: &str) -> Self {
        Self {
            slug: meta.slug.clone(),
            title: meta.display_title().to_string(),
            excerpt: meta.excerpt.clone(),
            date: meta.date.clone(),
            author: meta.author.clone(),
            path: post_path(root, &meta.slug),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NavPost {
    pub title: String,
    pub path: String,
}

impl From<&PostData> for NavPost {
    fn from(post: &PostData) -> Self {
        Self {
            title: post.title.clone(),
            path: post.path.clone(),
        }
    }
}

/// URL path of a post page
pub fn post_path(root: &str, slug: &str) -> String {
    format!("{}posts/{}/", root, slug)
}
