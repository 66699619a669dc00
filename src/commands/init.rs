//! Initialize a new blog

use anyhow::Result;
use std::fs;
use std::path::Path;

const CONFIG: &str = r#"# Site
title: My Blog
subtitle: ''
description: ''
author: John Doe
language: en

# URL
url: http://example.com
root: /

# Directory
posts_dir: posts
public_dir: public
static_dir: static

# Date format for templates (strftime)
date_format: '%B %d, %Y'

# Markdown pipeline
markdown:
  gfm: true
  autolink: true
  strip_front_matter: true
  allow_raw_html: false
  heading_ids: false
  callouts: false
  math: false
  highlight:
    enable: false
    theme: base16-ocean.dark
    line_number: true
"#;

const STYLE: &str = r#"body { max-width: 42rem; margin: 0 auto; padding: 1rem; font-family: sans-serif; line-height: 1.6; }
.site-header, .site-footer { padding: 1rem 0; }
.post-list { list-style: none; padding: 0; }
.post-card { margin-bottom: 1.5rem; }
.post-card time, .post-author { color: #666; margin-right: 0.5rem; }
.post-nav { display: flex; justify-content: space-between; margin-top: 2rem; }
table { border-collapse: collapse; }
th, td { border: 1px solid #ccc; padding: 0.25rem 0.5rem; }
"#;

const FIRST_POST: &str = r#"---
title: Hello World
excerpt: The first post on this blog.
date: 2024-01-01
author: John Doe
---
# Hello World

Welcome! Edit or delete this post in `posts/hello-world.md`.

| Feature | Supported |
|---------|-----------|
| Tables  | yes       |
| ~~Strikethrough~~ | yes |
"#;

/// Initialize a new blog in the given directory
pub fn init_site(target_dir: &Path) -> Result<()> {
    let config_path = target_dir.join("_config.yml");
    if config_path.exists() {
        anyhow::bail!("A blog already exists in {:?}", target_dir);
    }

    fs::create_dir_all(target_dir.join("posts"))?;
    fs::create_dir_all(target_dir.join("static/css"))?;

    fs::write(&config_path, CONFIG)?;
    fs::write(target_dir.join("static/css/style.css"), STYLE)?;
    fs::write(target_dir.join("posts/hello-world.md"), FIRST_POST)?;

    tracing::debug!("Wrote skeleton into {:?}", target_dir);
    Ok(())
}
