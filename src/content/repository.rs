//! Post repository - answers queries against a directory of markdown posts
//!
//! The repository only reads. Every query goes back to the files, so an
//! edited post is picked up on the next call without any invalidation.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

use super::frontmatter::FrontMatter;
use super::pipeline::{ConvertError, Pipeline};
use super::post::{PostContent, PostMeta};

/// Extension of post source files
pub const POST_EXTENSION: &str = "md";

#[derive(Debug, Error)]
pub enum PostError {
    /// No readable `<slug>.md` in the store
    #[error("post `{0}` not found")]
    NotFound(String),

    #[error("failed to render post `{slug}`")]
    Render {
        slug: String,
        #[source]
        source: ConvertError,
    },

    /// The store directory itself could not be listed
    #[error("cannot read post directory {path:?}")]
    Store {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PostError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PostError::NotFound(_))
    }
}

/// Read-only view over a flat directory of `<slug>.md` files
#[derive(Clone)]
pub struct PostRepository {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    pipeline: Pipeline,
}

impl PostRepository {
    pub fn new<P: Into<PathBuf>>(root: P, pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(Inner {
                root: root.into(),
                pipeline,
            }),
        }
    }

    /// Repository using [`Pipeline::standard`]
    pub fn with_standard_pipeline<P: Into<PathBuf>>(root: P) -> Self {
        Self::new(root, Pipeline::standard())
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Slugs of every `<slug>.md` file, in directory order
    pub async fn list_slugs(&self) -> Result<Vec<String>, PostError> {
        let root = self.root();
        let store_error = |source| PostError::Store {
            path: root.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(root).await.map_err(store_error)?;
        let mut slugs = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(store_error)? {
            let path = entry.path();
            let Some(slug) = slug_from_path(&path) else {
                continue;
            };

            // Follows symlinks, so linked posts count as files
            let is_file = fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);
            if is_file {
                slugs.push(slug.to_string());
            }
        }

        tracing::debug!("Found {} posts in {:?}", slugs.len(), root);
        Ok(slugs)
    }

    /// Front-matter of one post plus its slug, or `None` if it cannot be read
    pub async fn get_metadata(&self, slug: &str) -> Option<PostMeta> {
        let raw = self.read_source(slug).await?;
        let matter = FrontMatter::split(&raw);
        Some(PostMeta::from_front_matter(slug, matter.data))
    }

    /// Metadata of every readable post.
    ///
    /// Reads fan out one task per slug; results come back in
    /// [`list_slugs`](Self::list_slugs) order with unreadable posts dropped.
    pub async fn list_all(&self) -> Result<Vec<PostMeta>, PostError> {
        let slugs = self.list_slugs().await?;

        let handles: Vec<_> = slugs
            .into_iter()
            .map(|slug| {
                let repo = self.clone();
                tokio::spawn(async move { repo.get_metadata(&slug).await })
            })
            .collect();

        let mut posts = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Some(meta)) => posts.push(meta),
                Ok(None) => {}
                Err(e) => tracing::warn!("Metadata read task failed: {}", e),
            }
        }

        Ok(posts)
    }

    /// Metadata and rendered body of one post
    pub async fn get_full(&self, slug: &str) -> Result<PostContent, PostError> {
        let raw = self
            .read_source(slug)
            .await
            .ok_or_else(|| PostError::NotFound(slug.to_string()))?;

        let matter = FrontMatter::split(&raw);
        let html = self
            .inner
            .pipeline
            .run(&matter.content)
            .map_err(|source| PostError::Render {
                slug: slug.to_string(),
                source,
            })?;

        Ok(PostContent {
            meta: PostMeta::from_front_matter(slug, matter.data),
            html,
        })
    }

    fn post_path(&self, slug: &str) -> PathBuf {
        self.inner
            .root
            .join(format!("{}.{}", slug, POST_EXTENSION))
    }

    /// Every kind of read failure collapses into `None`. Anything other
    /// than a missing file is still logged.
    async fn read_source(&self, slug: &str) -> Option<String> {
        if !is_valid_slug(slug) {
            tracing::debug!("Rejecting slug {:?}", slug);
            return None;
        }

        let path = self.post_path(slug);
        match fs::read_to_string(&path).await {
            Ok(raw) => {
                tracing::debug!("Read post {:?}", path);
                Some(raw)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No post at {:?}", path);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to read post {:?}, treating as missing: {}", path, e);
                None
            }
        }
    }
}

impl std::fmt::Debug for PostRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostRepository")
            .field("root", &self.inner.root)
            .field("pipeline", &self.inner.pipeline)
            .finish()
    }
}

/// `<name>.md` -> `name`
fn slug_from_path(path: &Path) -> Option<&str> {
    if path.extension()? != POST_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

/// A slug names exactly one file directly inside the root
fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && !slug.contains(['/', '\\', '\0'])
}
