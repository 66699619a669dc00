//! Clean the public directory

use anyhow::Result;
use std::fs;

use crate::Blog;

/// Remove the generated output
pub fn run(blog: &Blog) -> Result<()> {
    if blog.public_dir.exists() {
        fs::remove_dir_all(&blog.public_dir)?;
        tracing::info!("Deleted: {:?}", blog.public_dir);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_public_only() {
        let dir = TempDir::new().unwrap();
        let blog = Blog::new(dir.path()).unwrap();
        fs::create_dir_all(blog.public_dir.join("posts/x")).unwrap();
        fs::create_dir_all(&blog.posts_dir).unwrap();

        run(&blog).unwrap();
        assert!(!blog.public_dir.exists());
        assert!(blog.posts_dir.exists());

        // cleaning twice is fine
        run(&blog).unwrap();
    }
}
