use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use gray_matter::{engine::YAML, Matter};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info};

use crate::models::{FrontMatter, PostDescriptor};
use crate::state::AppState;

pub const POSTS_DIR: &str = "posts";
const DELIMITER: &str = "---";
const POST_EXTENSIONS: [&str; 2] = [".mdx", ".md"];

#[derive(Debug, Error)]
pub enum FrontMatterError {
    #[error("front-matter block opened with `---` is never closed")]
    Unterminated,
    #[error("malformed front-matter: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        source: FrontMatterError,
    },
    #[error("duplicate post slug `{slug}` ({} and {})", .first.display(), .second.display())]
    DuplicateSlug {
        slug: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl LoadError {
    fn io(path: &Path, source: io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Page templates read from the content directory.
#[derive(Debug, Clone)]
pub struct Templates {
    pub layout: String,
    pub post: String,
    pub not_found: String, // supports {{slug}} placeholder
}

pub struct Content {
    pub templates: Templates,
    pub posts: Vec<PostDescriptor>,
}

/// A single post split into its metadata and markdown body.
pub struct PostSource {
    pub frontmatter: FrontMatter,
    pub body: String,
}

pub fn slug_from_file_name(file_name: &str) -> &str {
    POST_EXTENSIONS
        .iter()
        .find_map(|ext| file_name.strip_suffix(ext))
        .unwrap_or(file_name)
}

fn ensure_terminated(text: &str) -> Result<(), FrontMatterError> {
    let mut lines = text.lines();
    match lines.next() {
        Some(first) if first.trim_end() == DELIMITER => {}
        _ => return Ok(()),
    }
    if lines.any(|line| line.trim_end() == DELIMITER) {
        Ok(())
    } else {
        Err(FrontMatterError::Unterminated)
    }
}

pub fn parse_post(text: &str) -> Result<PostSource, FrontMatterError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    ensure_terminated(text)?;

    let matter = Matter::<YAML>::new();
    let parsed = matter
        .parse::<FrontMatter>(text)
        .map_err(|e| FrontMatterError::Malformed(e.to_string()))?;

    Ok(PostSource {
        frontmatter: parsed.data.unwrap_or_default(),
        body: parsed.content,
    })
}

/// Parses the leading metadata block of a post. The body is discarded.
pub fn parse_front_matter(text: &str) -> Result<FrontMatter, FrontMatterError> {
    parse_post(text).map(|post| post.frontmatter)
}

/// Reads every file in `dir` into a [`PostDescriptor`], in directory listing
/// order. Any unreadable file or malformed metadata block fails the whole
/// load.
pub async fn load_posts(dir: &Path) -> Result<Vec<PostDescriptor>, LoadError> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| LoadError::io(dir, e))?;

    let mut posts = Vec::new();
    let mut seen: HashMap<String, PathBuf> = HashMap::new();

    while let Some(entry) = entries.next_entry().await.map_err(|e| LoadError::io(dir, e))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|e| LoadError::io(&path, e))?;
        if file_type.is_dir() {
            debug!(path = %path.display(), "skipping subdirectory in posts");
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().into_owned();
        let slug = slug_from_file_name(&file_name).to_string();
        if let Some(first) = seen.get(&slug) {
            return Err(LoadError::DuplicateSlug {
                slug,
                first: first.clone(),
                second: path,
            });
        }

        let text = fs::read_to_string(&path)
            .await
            .map_err(|e| LoadError::io(&path, e))?;
        let frontmatter = parse_front_matter(&text).map_err(|source| LoadError::FrontMatter {
            path: path.clone(),
            source,
        })?;

        debug!(%slug, fields = frontmatter.len(), "loaded post");
        seen.insert(slug.clone(), path);
        posts.push(PostDescriptor { slug, frontmatter });
    }

    info!(count = posts.len(), dir = %dir.display(), "loaded posts");
    Ok(posts)
}

/// Looks up the file backing `slug` and parses it. `Ok(None)` when no such
/// post exists.
pub async fn read_post(dir: &Path, slug: &str) -> Result<Option<PostSource>, LoadError> {
    if slug.is_empty() || slug.contains(['/', '\\']) || slug.contains("..") {
        return Ok(None);
    }

    let candidates = POST_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}{}", slug, ext)))
        .chain(std::iter::once(dir.join(slug)));

    for path in candidates {
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(LoadError::io(&path, e)),
        }
        match fs::read_to_string(&path).await {
            Ok(text) => {
                return parse_post(&text)
                    .map(Some)
                    .map_err(|source| LoadError::FrontMatter { path, source });
            }
            Err(e) => return Err(LoadError::io(&path, e)),
        }
    }
    Ok(None)
}

async fn read_template(content_dir: &Path, name: &str) -> Result<String, LoadError> {
    let path = content_dir.join(name);
    fs::read_to_string(&path)
        .await
        .map_err(|e| LoadError::io(&path, e))
}

pub async fn load_content(content_dir: &Path) -> Result<Content, LoadError> {
    let templates = Templates {
        layout: read_template(content_dir, "layout.html").await?,
        post: read_template(content_dir, "post.html").await?,
        not_found: read_template(content_dir, "not_found.html").await?,
    };
    let posts = load_posts(&content_dir.join(POSTS_DIR)).await?;
    Ok(Content { templates, posts })
}

pub async fn reload_content(app_state: &AppState) {
    info!("Reloading application content...");
    match load_content(&app_state.content_dir).await {
        Ok(Content { templates, posts }) => {
            *app_state.templates.write().await = templates;
            *app_state.posts.write().await = posts;
            info!("Content successfully reloaded.");
        }
        Err(e) => {
            error!("Failed to reload content, keeping previous version: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, text: &str) {
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn slug_strips_trailing_markdown_extension() {
        assert_eq!(slug_from_file_name("hello-world.mdx"), "hello-world");
        assert_eq!(slug_from_file_name("notes.md"), "notes");
        assert_eq!(slug_from_file_name("v1.mdx.mdx"), "v1.mdx");
        assert_eq!(slug_from_file_name("readme.txt"), "readme.txt");
    }

    #[test]
    fn parse_is_idempotent() {
        let text = "---\ntitle: Twice\ntags:\n  - a\n  - b\n---\nbody\n";
        let first = parse_front_matter(text).unwrap();
        let second = parse_front_matter(text).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.tags(), vec!["a", "b"]);
    }

    #[test]
    fn parse_keeps_body_separate() {
        let post = parse_post("---\ntitle: Split\n---\n# Heading\n").unwrap();
        assert_eq!(post.frontmatter.title(), Some("Split"));
        assert!(post.body.contains("# Heading"));
        assert!(!post.body.contains("title:"));
    }

    #[test]
    fn text_without_block_has_empty_front_matter() {
        let fm = parse_front_matter("# Just a heading\n\nSome words.\n").unwrap();
        assert!(fm.is_empty());
    }

    #[test]
    fn unterminated_block_is_an_error() {
        let err = parse_front_matter("---\ntitle: Open\n\nno closing line\n").unwrap_err();
        assert!(matches!(err, FrontMatterError::Unterminated));
    }

    #[tokio::test]
    async fn first_post_scenario() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "first-post.mdx", "---\ntitle: \"First\"\n---\nHello.\n");

        let posts = load_posts(tmp.path()).await.unwrap();

        let expected: FrontMatter = serde_json::from_value(json!({ "title": "First" })).unwrap();
        assert_eq!(
            posts,
            vec![PostDescriptor {
                slug: "first-post".to_string(),
                frontmatter: expected,
            }]
        );
    }

    #[tokio::test]
    async fn empty_directory_yields_no_posts() {
        let tmp = TempDir::new().unwrap();
        let posts = load_posts(tmp.path()).await.unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn missing_directory_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = load_posts(&tmp.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[tokio::test]
    async fn one_post_per_file_in_listing_order() {
        let tmp = TempDir::new().unwrap();
        for (i, name) in ["b-post.mdx", "a-post.mdx", "c-post.md", "d-post.mdx"].iter().enumerate() {
            write(tmp.path(), name, &format!("---\ntitle: Post {}\norder: {}\n---\n", i, i));
        }
        std::fs::create_dir(tmp.path().join("drafts")).unwrap();

        let posts = load_posts(tmp.path()).await.unwrap();

        let listed: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| e.file_type().unwrap().is_file())
            .map(|e| slug_from_file_name(&e.file_name().to_string_lossy()).to_string())
            .collect();
        let slugs: Vec<String> = posts.iter().map(|p| p.slug.clone()).collect();
        assert_eq!(posts.len(), 4);
        assert_eq!(slugs, listed);
        assert!(posts.iter().all(|p| matches!(p.frontmatter.get("order"), Some(Value::Number(_)))));
    }

    #[tokio::test]
    async fn unterminated_block_aborts_load() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "good.mdx", "---\ntitle: Good\n---\n");
        write(tmp.path(), "broken.mdx", "---\ntitle: Broken\nbody without a closing line\n");

        let err = load_posts(tmp.path()).await.unwrap_err();
        match err {
            LoadError::FrontMatter { path, source } => {
                assert!(path.ends_with("broken.mdx"));
                assert!(matches!(source, FrontMatterError::Unterminated));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn leading_byte_order_mark_is_ignored() {
        let fm = parse_front_matter("\u{feff}---\ntitle: Marked\n---\nbody\n").unwrap();
        assert_eq!(fm.title(), Some("Marked"));
    }

    #[tokio::test]
    async fn non_mapping_block_aborts_load() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "list.mdx", "---\n- a\n- b\n---\n");

        let err = load_posts(tmp.path()).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::FrontMatter { source: FrontMatterError::Malformed(_), .. }
        ));
    }

    #[tokio::test]
    async fn invalid_yaml_aborts_load() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "broken.mdx", "---\ntitle: [unclosed\n---\nbody\n");

        let err = load_posts(tmp.path()).await.unwrap_err();
        match err {
            LoadError::FrontMatter { path, source } => {
                assert!(path.ends_with("broken.mdx"));
                assert!(matches!(source, FrontMatterError::Malformed(_)));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn unreadable_file_aborts_load() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("binary.mdx"), [0xff, 0xfe, 0x00, 0xc3, 0x28]).unwrap();

        let err = load_posts(tmp.path()).await.unwrap_err();
        assert!(matches!(err, LoadError::Io { ref path, .. } if path.ends_with("binary.mdx")));
    }

    #[tokio::test]
    async fn duplicate_slugs_are_rejected() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "same.md", "---\ntitle: One\n---\n");
        write(tmp.path(), "same.mdx", "---\ntitle: Two\n---\n");

        let err = load_posts(tmp.path()).await.unwrap_err();
        assert!(matches!(err, LoadError::DuplicateSlug { ref slug, .. } if slug == "same"));
    }

    #[tokio::test]
    async fn read_post_finds_file_by_slug() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "hello-world.mdx", "---\ntitle: Hi\n---\nBody text\n");

        let post = read_post(tmp.path(), "hello-world").await.unwrap().unwrap();
        assert_eq!(post.frontmatter.title(), Some("Hi"));
        assert!(post.body.contains("Body text"));

        assert!(read_post(tmp.path(), "missing").await.unwrap().is_none());
        assert!(read_post(tmp.path(), "../hello-world").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_post_skips_directories_named_like_posts() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join("foo.mdx")).unwrap();
        write(tmp.path(), "foo.md", "---\ntitle: Foo\n---\nFoo body\n");

        let post = read_post(tmp.path(), "foo").await.unwrap().unwrap();
        assert_eq!(post.frontmatter.title(), Some("Foo"));
        assert!(post.body.contains("Foo body"));
    }

    #[tokio::test]
    async fn load_content_reads_templates_and_posts() {
        let tmp = TempDir::new().unwrap();
        for name in ["layout.html", "post.html", "not_found.html"] {
            write(tmp.path(), name, name);
        }
        std::fs::create_dir(tmp.path().join(POSTS_DIR)).unwrap();
        write(&tmp.path().join(POSTS_DIR), "one.mdx", "---\ntitle: One\n---\n");

        let content = load_content(tmp.path()).await.unwrap();
        assert_eq!(content.templates.layout, "layout.html");
        assert_eq!(content.posts.len(), 1);
    }

    #[tokio::test]
    async fn shipped_content_loads() {
        let dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("content");
        let content = load_content(&dir).await.unwrap();
        assert!(content.templates.layout.contains("{{ content }}"));
        assert!(content
            .posts
            .iter()
            .any(|p| p.slug == "hello-world" && p.frontmatter.title() == Some("Hello, world")));
    }

    fn content_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "layout.html", "<body>{{ content }}</body>");
        write(tmp.path(), "post.html", "{{ body }}");
        write(tmp.path(), "not_found.html", "{{slug}}");
        std::fs::create_dir(tmp.path().join(POSTS_DIR)).unwrap();
        write(&tmp.path().join(POSTS_DIR), "one.mdx", "---\ntitle: One\n---\n");
        tmp
    }

    async fn state_for(dir: &Path) -> AppState {
        let Content { templates, posts } = load_content(dir).await.unwrap();
        AppState {
            templates: tokio::sync::RwLock::new(templates),
            posts: tokio::sync::RwLock::new(posts),
            profile: crate::config::Profile::default(),
            content_dir: dir.to_path_buf(),
            repos: None,
            is_development: true,
        }
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous_content() {
        let tmp = content_dir();
        let state = state_for(tmp.path()).await;
        let before = state.posts.read().await.clone();

        write(tmp.path(), "layout.html", "<body>changed</body>");
        write(&tmp.path().join(POSTS_DIR), "one.mdx", "---\ntitle: One\nnever closed\n");
        reload_content(&state).await;

        assert_eq!(*state.posts.read().await, before);
        assert_eq!(state.templates.read().await.layout, "<body>{{ content }}</body>");
    }

    #[tokio::test]
    async fn successful_reload_picks_up_edits() {
        let tmp = content_dir();
        let state = state_for(tmp.path()).await;

        write(&tmp.path().join(POSTS_DIR), "two.mdx", "---\ntitle: Two\n---\n");
        write(tmp.path(), "layout.html", "<body>v2 {{ content }}</body>");
        reload_content(&state).await;

        let posts = state.posts.read().await;
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().any(|p| p.slug == "two" && p.frontmatter.title() == Some("Two")));
        assert_eq!(state.templates.read().await.layout, "<body>v2 {{ content }}</body>");
    }

    #[tokio::test]
    async fn load_content_requires_templates() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(POSTS_DIR)).unwrap();
        let err = load_content(tmp.path()).await.err().unwrap();
        assert!(matches!(err, LoadError::Io { ref path, .. } if path.ends_with("layout.html")));
    }
}
