//! Site configuration (_config.yml)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    // Site
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub author: String,
    pub language: String,

    // URL
    pub url: String,
    pub root: String,

    // Directory
    pub posts_dir: String,
    pub public_dir: String,
    pub static_dir: String,

    // Date format used by templates (chrono strftime)
    pub date_format: String,

    #[serde(default)]
    pub markdown: MarkdownConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: "My Blog".to_string(),
            subtitle: String::new(),
            description: String::new(),
            author: "John Doe".to_string(),
            language: "en".to_string(),

            url: "http://example.com".to_string(),
            root: "/".to_string(),

            posts_dir: "posts".to_string(),
            public_dir: "public".to_string(),
            static_dir: "static".to_string(),

            date_format: "%B %d, %Y".to_string(),

            markdown: MarkdownConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: SiteConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// URL path of the site root, always with leading and trailing slash
    pub fn root_path(&self) -> String {
        let trimmed = self.root.trim_matches('/');
        if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{}/", trimmed)
        }
    }
}

/// Which markdown stages run and how
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkdownConfig {
    /// Tables, strikethrough, task lists, footnotes
    pub gfm: bool,
    /// Link bare URLs (only with `gfm`)
    pub autolink: bool,
    /// Drop a second front-matter block at the top of the body
    pub strip_front_matter: bool,
    pub allow_raw_html: bool,
    pub heading_ids: bool,
    pub callouts: bool,
    pub math: bool,
    #[serde(default)]
    pub highlight: HighlightConfig,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            gfm: true,
            autolink: true,
            strip_front_matter: true,
            allow_raw_html: false,
            heading_ids: false,
            callouts: false,
            math: false,
            highlight: HighlightConfig::default(),
        }
    }
}

/// Code highlighting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    pub enable: bool,
    pub theme: String,
    pub line_number: bool,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            enable: false,
            theme: "base16-ocean.dark".to_string(),
            line_number: true,
        }
    }
}
