//! Create a new post

use anyhow::Result;
use std::fs;
use std::path::PathBuf;

use crate::Blog;

/// Create a new post named after the slugified title and return its path
pub fn create_post(
    blog: &Blog,
    title: &str,
    author: Option<&str>,
    excerpt: Option<&str>,
) -> Result<PathBuf> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        anyhow::bail!("Title {:?} does not produce a usable slug", title);
    }

    fs::create_dir_all(&blog.posts_dir)?;

    let file_path = blog.posts_dir.join(format!("{}.md", slug));
    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    let author = author.unwrap_or(blog.config.author.as_str());
    let today = chrono::Local::now().format("%Y-%m-%d");

    let mut content = String::from("---\n");
    content.push_str(&format!("title: {}\n", yaml_scalar(title)));
    if let Some(excerpt) = excerpt {
        content.push_str(&format!("excerpt: {}\n", yaml_scalar(excerpt)));
    }
    content.push_str(&format!("date: {}\n", today));
    if !author.is_empty() {
        content.push_str(&format!("author: {}\n", yaml_scalar(author)));
    }
    content.push_str("---\n\n");

    fs::write(&file_path, content)?;
    tracing::debug!("Created post `{}`", slug);

    Ok(file_path)
}

/// Quote a value so YAML reads it back as the same string
fn yaml_scalar(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use tempfile::TempDir;

    fn blog(dir: &TempDir) -> Blog {
        let config = SiteConfig {
            author: "Site Owner".to_string(),
            ..Default::default()
        };
        Blog::with_config(dir.path().to_path_buf(), config)
    }

    #[tokio::test]
    async fn test_create_post_is_readable() {
        let dir = TempDir::new().unwrap();
        let blog = blog(&dir);

        let path = create_post(&blog, "It's: a Test!", None, Some("Short # summary")).unwrap();
        assert_eq!(path, blog.posts_dir.join("it-s-a-test.md"));

        let meta = blog
            .repository()
            .get_metadata("it-s-a-test")
            .await
            .unwrap();
        assert_eq!(meta.title.as_deref(), Some("It's: a Test!"));
        assert_eq!(meta.excerpt.as_deref(), Some("Short # summary"));
        assert_eq!(meta.author.as_deref(), Some("Site Owner"));
        assert!(meta.published_on().is_some());
    }

    #[test]
    fn test_create_post_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let blog = blog(&dir);

        create_post(&blog, "Twice", Some("Me"), None).unwrap();
        assert!(create_post(&blog, "Twice", Some("Me"), None).is_err());
    }

    #[test]
    fn test_create_post_rejects_empty_slug() {
        let dir = TempDir::new().unwrap();
        assert!(create_post(&blog(&dir), "!!!", None, None).is_err());
    }
}
