//! Markdown posts and category list read from the content directory.
//!
//! Layout:
//! - `posts/{slug}.md` with a YAML front-matter block between `---` lines
//! - `categories.json`, an array of `{slug, name, description?}`
//!
//! Only metadata and the raw markdown body are served; rendering happens in
//! the site generator.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use folio_shared::types::Slug;

use crate::error::ServerError;
use crate::history_store::read_json;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FrontMatter {
    title: String,
    date: NaiveDate,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    draft: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMeta {
    pub slug: String,
    pub title: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(flatten)]
    pub meta: PostMeta,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

pub struct ContentLibrary {
    posts_dir: PathBuf,
    categories_path: PathBuf,
}

impl ContentLibrary {
    pub fn new(content_dir: &Path) -> Self {
        Self {
            posts_dir: content_dir.join("posts"),
            categories_path: content_dir.join("categories.json"),
        }
    }

    /// Whether a posts directory exists at all. Without one, the server
    /// cannot tell real slugs from typos and accepts any valid slug.
    pub async fn has_posts(&self) -> bool {
        fs::metadata(&self.posts_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Published posts, newest first, optionally limited to one category.
    /// Files with broken front matter are skipped with a warning.
    pub async fn list_posts(&self, category: Option<&str>) -> Result<Vec<PostMeta>, ServerError> {
        if !self.has_posts().await {
            return Ok(Vec::new());
        }

        let mut posts = Vec::new();
        let mut entries = fs::read_dir(&self.posts_dir)
            .await
            .map_err(|e| ServerError::Storage(format!("Failed to list posts: {}", e)))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            ServerError::Storage(format!("Failed to read directory entry: {}", e))
        })? {
            let path = entry.path();
            let Some(slug) = slug_from_path(&path) else {
                continue;
            };
            match self.read_post(&path, slug).await {
                Ok(post) if !post.draft => posts.push(post.meta),
                Ok(_) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable post"),
            }
        }

        if let Some(category) = category {
            posts.retain(|p| p.category.as_deref() == Some(category));
        }
        posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.slug.cmp(&b.slug)));
        Ok(posts)
    }

    /// A published post with its markdown body.
    pub async fn get_post(&self, slug: &Slug) -> Result<Post, ServerError> {
        let path = self.posts_dir.join(format!("{}.md", slug));
        if fs::metadata(&path).await.is_err() {
            return Err(ServerError::NotFound(format!("Post {slug}")));
        }

        let loaded = self.read_post(&path, slug.to_string()).await?;
        if loaded.draft {
            return Err(ServerError::NotFound(format!("Post {slug}")));
        }
        Ok(Post {
            meta: loaded.meta,
            body: loaded.body,
        })
    }

    /// Whether `slug` names a published post.
    pub async fn post_exists(&self, slug: &Slug) -> bool {
        self.get_post(slug).await.is_ok()
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ServerError> {
        Ok(read_json(&self.categories_path).await?.unwrap_or_default())
    }

    async fn read_post(&self, path: &Path, slug: String) -> Result<LoadedPost, ServerError> {
        let text = fs::read_to_string(path).await.map_err(|e| {
            ServerError::Storage(format!("Failed to read '{}': {}", path.display(), e))
        })?;
        let (front, body) = split_front_matter(&text)?;

        Ok(LoadedPost {
            draft: front.draft,
            meta: PostMeta {
                slug,
                title: front.title,
                date: front.date,
                category: front.category,
                tags: front.tags,
                summary: front.summary,
            },
            body: body.to_string(),
        })
    }
}

struct LoadedPost {
    meta: PostMeta,
    body: String,
    draft: bool,
}

fn slug_from_path(path: &Path) -> Option<String> {
    if path.extension()? != "md" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Slug::parse(stem).ok().map(|s| s.to_string())
}

/// Split `---\n<yaml>\n---\n<body>` into parsed front matter and body.
fn split_front_matter(text: &str) -> Result<(FrontMatter, &str), ServerError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let rest = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
        .ok_or_else(|| ServerError::Storage("Missing front matter opening delimiter".into()))?;

    let (yaml, body) = find_closing(rest)
        .ok_or_else(|| ServerError::Storage("Missing front matter closing delimiter".into()))?;

    let front: FrontMatter = serde_yaml::from_str(yaml)
        .map_err(|e| ServerError::Storage(format!("Invalid front matter: {e}")))?;
    Ok((front, body))
}

fn find_closing(rest: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    const HELLO: &str = "---\ntitle: Hello world\ndate: 2024-03-01\ncategory: rust\ntags: [intro, meta]\n---\n# Hello\n\nFirst post.\n";
    const OLDER: &str = "---\ntitle: Older\ndate: 2023-11-20\ncategory: life\n---\nBody\n";
    const DRAFT: &str = "---\ntitle: Wip\ndate: 2024-05-01\ndraft: true\n---\nnot yet\n";

    fn library() -> (ContentLibrary, TempDir) {
        let dir = TempDir::new().unwrap();
        let posts = dir.path().join("posts");
        std::fs::create_dir_all(&posts).unwrap();
        std::fs::write(posts.join("hello-world.md"), HELLO).unwrap();
        std::fs::write(posts.join("older.md"), OLDER).unwrap();
        std::fs::write(posts.join("wip.md"), DRAFT).unwrap();
        std::fs::write(posts.join("broken.md"), "no front matter").unwrap();
        std::fs::write(posts.join("README.txt"), "ignored").unwrap();
        std::fs::write(
            dir.path().join("categories.json"),
            r#"[{"slug":"rust","name":"Rust"},{"slug":"life","name":"Life","description":"Everything else"}]"#,
        )
        .unwrap();
        (ContentLibrary::new(dir.path()), dir)
    }

    #[test]
    fn test_split_front_matter() {
        let (front, body) = split_front_matter(HELLO).unwrap();
        assert_eq!(front.title, "Hello world");
        assert_eq!(front.tags, vec!["intro", "meta"]);
        assert!(!front.draft);
        assert!(body.starts_with("# Hello"));
    }

    #[test]
    fn test_split_front_matter_errors() {
        assert!(split_front_matter("title: x\n").is_err());
        assert!(split_front_matter("---\ntitle: x\n").is_err());
        assert!(split_front_matter("---\ntitle: x\n---\n").is_err()); // no date
    }

    #[tokio::test]
    async fn test_list_posts_newest_first_without_drafts() {
        let (lib, _dir) = library();
        let slugs: Vec<_> = lib
            .list_posts(None)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.slug)
            .collect();
        assert_eq!(slugs, vec!["hello-world", "older"]);

        let rust = lib.list_posts(Some("rust")).await.unwrap();
        assert_eq!(rust.len(), 1);
    }

    #[tokio::test]
    async fn test_get_post_and_drafts() {
        let (lib, _dir) = library();
        let post = lib.get_post(&Slug::parse("hello-world").unwrap()).await.unwrap();
        assert_eq!(post.meta.title, "Hello world");
        assert!(post.body.contains("First post."));

        assert!(!lib.post_exists(&Slug::parse("wip").unwrap()).await);
        assert!(!lib.post_exists(&Slug::parse("missing").unwrap()).await);
    }

    #[tokio::test]
    async fn test_categories() {
        let (lib, _dir) = library();
        let cats = lib.list_categories().await.unwrap();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[1].description.as_deref(), Some("Everything else"));
    }

    #[tokio::test]
    async fn test_missing_content_dir() {
        let dir = TempDir::new().unwrap();
        let lib = ContentLibrary::new(&dir.path().join("nope"));
        assert!(!lib.has_posts().await);
        assert!(lib.list_posts(None).await.unwrap().is_empty());
        assert!(lib.list_categories().await.unwrap().is_empty());
    }
}
