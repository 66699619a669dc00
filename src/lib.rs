//! inkpost: a small markdown blog engine
//!
//! Posts live in a flat directory as `<slug>.md` files with YAML
//! front-matter. [`content::PostRepository`] answers the queries a blog
//! needs (list slugs, list metadata, fetch one post rendered to HTML) and
//! the generator turns those answers into static pages.

pub mod commands;
pub mod config;
pub mod content;
pub mod generator;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

use content::{Pipeline, PostRepository};

/// A blog rooted at one directory
#[derive(Debug, Clone)]
pub struct Blog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Directory of `<slug>.md` posts
    pub posts_dir: PathBuf,
    /// Public (output) directory
    pub public_dir: PathBuf,
    /// Static assets copied verbatim into the output
    pub static_dir: PathBuf,
}

impl Blog {
    /// Open a blog from a directory, reading `_config.yml` if present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let config_path = base_dir.join("_config.yml");

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    pub fn with_config(base_dir: PathBuf, config: config::SiteConfig) -> Self {
        let posts_dir = base_dir.join(&config.posts_dir);
        let public_dir = base_dir.join(&config.public_dir);
        let static_dir = base_dir.join(&config.static_dir);

        Self {
            config,
            base_dir,
            posts_dir,
            public_dir,
            static_dir,
        }
    }

    /// Repository over the posts directory with the configured pipeline
    pub fn repository(&self) -> PostRepository {
        let pipeline = Pipeline::from_config(&self.config.markdown);
        PostRepository::new(&self.posts_dir, pipeline)
    }

    /// Generate the static site
    pub async fn generate(&self) -> Result<()> {
        commands::generate::run(self).await
    }

    /// Clean the public directory
    pub fn clean(&self) -> Result<()> {
        commands::clean::run(self)
    }
}
