//! Generator module - writes the list page, one page per post and a 404
//! page using the built-in Tera templates

use anyhow::{Context as _, Result};
use std::fs;
use std::path::Path;
use tera::Context;
use walkdir::WalkDir;

use crate::content::{sort_newest_first, PostError, PostMeta, PostRepository};
use crate::templates::{NavPost, PostData, SiteData, TemplateRenderer};
use crate::Blog;

/// What a generation run produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub posts: usize,
    pub assets: usize,
}

/// Static site generator
pub struct Generator {
    blog: Blog,
    repository: PostRepository,
    renderer: TemplateRenderer,
}

impl Generator {
    /// Create a new generator
    pub fn new(blog: &Blog) -> Result<Self> {
        Ok(Self {
            blog: blog.clone(),
            repository: blog.repository(),
            renderer: TemplateRenderer::new()?,
        })
    }

    /// Generate the entire site
    pub async fn generate(&self) -> Result<GenerateReport> {
        let public_dir = &self.blog.public_dir;
        tokio::fs::create_dir_all(public_dir).await?;

        let posts = self.load_posts().await?;
        let site = SiteData::from(&self.blog.config);
        let summaries: Vec<PostData> = posts
            .iter()
            .map(|meta| PostData::new(meta, &site.root))
            .collect();

        self.generate_index(&site, &summaries).await?;
        let written = self.generate_post_pages(&site, &summaries).await?;
        self.generate_not_found(&site).await?;
        let assets = self.copy_static_assets()?;

        Ok(GenerateReport {
            posts: written,
            assets,
        })
    }

    /// Metadata of every post, newest first
    async fn load_posts(&self) -> Result<Vec<PostMeta>> {
        if !self.blog.posts_dir.exists() {
            tracing::warn!("Posts directory {:?} does not exist", self.blog.posts_dir);
            return Ok(Vec::new());
        }

        let mut posts = self.repository.list_all().await?;
        sort_newest_first(&mut posts);
        Ok(posts)
    }

    async fn generate_index(&self, site: &SiteData, posts: &[PostData]) -> Result<()> {
        let mut context = Context::new();
        context.insert("site", site);
        context.insert("posts", posts);

        let html = self.renderer.render("index.html", &context)?;
        write_page(&self.blog.public_dir.join("index.html"), &html).await
    }

    /// Render every post page. A post that disappeared since listing is
    /// skipped; a post that fails to render aborts generation.
    async fn generate_post_pages(&self, site: &SiteData, posts: &[PostData]) -> Result<usize> {
        let mut written = 0;

        for (i, post) in posts.iter().enumerate() {
            // Posts are newest first, so "previous" is the older neighbour
            let prev = posts.get(i + 1).map(NavPost::from);
            let next = i.checked_sub(1).and_then(|j| posts.get(j)).map(NavPost::from);

            let content = match self.repository.get_full(&post.slug).await {
                Ok(content) => content,
                Err(PostError::NotFound(slug)) => {
                    tracing::warn!("Post `{}` vanished during generation, skipping", slug);
                    continue;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("rendering post `{}`", post.slug));
                }
            };

            let mut context = Context::new();
            context.insert("site", site);
            context.insert("post", &PostData::new(&content.meta, &site.root));
            context.insert("html", &content.html);
            context.insert("prev", &prev);
            context.insert("next", &next);

            let html = self.renderer.render("post.html", &context)?;
            let dest = self
                .blog
                .public_dir
                .join("posts")
                .join(&post.slug)
                .join("index.html");
            write_page(&dest, &html).await?;
            written += 1;
        }

        tracing::info!("Rendered {} post pages", written);
        Ok(written)
    }

    async fn generate_not_found(&self, site: &SiteData) -> Result<()> {
        let mut context = Context::new();
        context.insert("site", site);

        let html = self.renderer.render("404.html", &context)?;
        write_page(&self.blog.public_dir.join("404.html"), &html).await
    }

    /// Copy everything under the static directory into the output
    fn copy_static_assets(&self) -> Result<usize> {
        let static_dir = &self.blog.static_dir;
        if !static_dir.exists() {
            return Ok(0);
        }

        let mut copied = 0;
        for entry in WalkDir::new(static_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(static_dir)?;
            let dest = self.blog.public_dir.join(relative);

            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }

            fs::copy(path, &dest)?;
            copied += 1;
        }

        tracing::debug!("Copied {} static assets", copied);
        Ok(copied)
    }
}

async fn write_page(dest: &Path, html: &str) -> Result<()> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(dest, html)
        .await
        .with_context(|| format!("writing {:?}", dest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    fn blog_with_posts(posts: &[(&str, &str)]) -> (TempDir, Blog) {
        let dir = TempDir::new().unwrap();
        let blog = Blog::with_config(dir.path().to_path_buf(), SiteConfig::default());
        fs::create_dir_all(&blog.posts_dir).unwrap();
        for (name, content) in posts {
            fs::write(blog.posts_dir.join(name), content).unwrap();
        }
        (dir, blog)
    }

    #[tokio::test]
    async fn test_generate_site() {
        let (_dir, blog) = blog_with_posts(&[
            (
                "hello.md",
                "---\ntitle: Hello\nexcerpt: E\ndate: 2024-01-01\nauthor: A\n---\n# Hi\n\nthere",
            ),
            (
                "later.md",
                "---\ntitle: Later\ndate: 2024-06-01\n---\nnewer post",
            ),
        ]);
        fs::create_dir_all(blog.static_dir.join("css")).unwrap();
        fs::write(blog.static_dir.join("css/style.css"), "body {}").unwrap();

        let report = Generator::new(&blog).unwrap().generate().await.unwrap();
        assert_eq!(report, GenerateReport { posts: 2, assets: 1 });

        let index = fs::read_to_string(blog.public_dir.join("index.html")).unwrap();
        let later = index.find("/posts/later/").unwrap();
        let hello = index.find("/posts/hello/").unwrap();
        assert!(later < hello, "newest post should be listed first");

        let page = fs::read_to_string(blog.public_dir.join("posts/hello/index.html")).unwrap();
        assert!(page.contains("<h1>Hi</h1>"));
        assert!(page.contains("<p>there</p>"));
        assert!(page.contains(r#"href="/posts/later/""#));

        let not_found = fs::read_to_string(blog.public_dir.join("404.html")).unwrap();
        assert!(not_found.contains("This page does not exist."));
        assert!(blog.public_dir.join("css/style.css").exists());
    }

    #[tokio::test]
    async fn test_generate_without_posts_dir() {
        let dir = TempDir::new().unwrap();
        let blog = Blog::with_config(dir.path().to_path_buf(), SiteConfig::default());

        let report = Generator::new(&blog).unwrap().generate().await.unwrap();
        assert_eq!(report.posts, 0);
        let index = fs::read_to_string(blog.public_dir.join("index.html")).unwrap();
        assert!(index.contains("No posts yet."));
    }

    #[tokio::test]
    async fn test_generate_with_time_in_date_format() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig {
            date_format: "%Y-%m-%d %H:%M".to_string(),
            ..Default::default()
        };
        let blog = Blog::with_config(dir.path().to_path_buf(), config);
        fs::create_dir_all(&blog.posts_dir).unwrap();
        fs::write(
            blog.posts_dir.join("hello.md"),
            "---\ntitle: Hello\ndate: 2024-01-01\n---\nbody",
        )
        .unwrap();

        Generator::new(&blog).unwrap().generate().await.unwrap();
        let index = fs::read_to_string(blog.public_dir.join("index.html")).unwrap();
        assert!(index.contains("2024-01-01 00:00"));
    }

    #[tokio::test]
    async fn test_generate_with_invalid_date_format_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig {
            date_format: "%Q".to_string(),
            ..Default::default()
        };
        let blog = Blog::with_config(dir.path().to_path_buf(), config);
        fs::create_dir_all(&blog.posts_dir).unwrap();
        fs::write(
            blog.posts_dir.join("hello.md"),
            "---\ntitle: Hello\ndate: 2024-01-01\n---\nbody",
        )
        .unwrap();

        assert!(Generator::new(&blog).unwrap().generate().await.is_err());
    }
}
