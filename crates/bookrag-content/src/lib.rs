//! bookrag Content - Book loading and chunking
//!
//! Walks the book's content directory, reads every markdown file and
//! turns it into paragraph chunks with title/section metadata.

pub mod markdown;

pub use markdown::{chunk_markdown, extract_page_reference, extract_title};

use bookrag_core::{ChunkMetadata, ContentChunk};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ============================================================================
// File Types
// ============================================================================

/// Supported content file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Markdown,
    Mdx,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "mdx" => Self::Mdx,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

// ============================================================================
// Loader
// ============================================================================

/// Result of loading the book
#[derive(Debug, Clone, Default)]
pub struct LoadedContent {
    /// All chunks, in file then paragraph order
    pub chunks: Vec<ContentChunk>,

    /// Number of files that produced at least one chunk
    pub files: usize,

    /// Files that could not be read
    pub failed_files: Vec<PathBuf>,

    /// True when the built-in sample content was used
    pub used_sample: bool,
}

/// Loads book content from a directory (or a single file)
#[derive(Debug, Clone)]
pub struct ContentLoader {
    root: PathBuf,
    sample_fallback: bool,
}

impl ContentLoader {
    /// Create a loader for the given path
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sample_fallback: true,
        }
    }

    /// Disable the sample content fallback
    pub fn without_sample_fallback(mut self) -> Self {
        self.sample_fallback = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load and chunk all content
    pub fn load(&self) -> LoadedContent {
        tracing::info!(path = %self.root.display(), "Loading book content");

        if !self.root.exists() {
            tracing::warn!(path = %self.root.display(), "Content path not found");
            return self.fallback(LoadedContent::default());
        }

        let mut loaded = LoadedContent::default();

        for path in self.markdown_files() {
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    let file_path = self.display_path(&path);
                    let chunks = chunk_markdown(&text, &file_path);
                    tracing::debug!(file = %file_path, chunks = chunks.len(), "Chunked file");
                    if !chunks.is_empty() {
                        loaded.files += 1;
                        loaded.chunks.extend(chunks);
                    }
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "Failed to read content file");
                    loaded.failed_files.push(path);
                }
            }
        }

        if loaded.chunks.is_empty() {
            tracing::warn!(path = %self.root.display(), "No markdown content found");
            return self.fallback(loaded);
        }

        tracing::info!(
            files = loaded.files,
            chunks = loaded.chunks.len(),
            "Loaded book content"
        );
        loaded
    }

    /// Markdown files under the root, in sorted order
    fn markdown_files(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "Skipping unreadable directory entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| FileType::from_path(p).is_supported())
            .collect()
    }

    /// Path recorded in chunk metadata, relative to the root when possible
    fn display_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let shown = if relative.as_os_str().is_empty() {
            path.file_name().map(Path::new).unwrap_or(path)
        } else {
            relative
        };
        shown.to_string_lossy().replace('\\', "/")
    }

    fn fallback(&self, mut loaded: LoadedContent) -> LoadedContent {
        if self.sample_fallback {
            tracing::warn!("Using sample content");
            loaded.chunks = sample_content();
            loaded.files = 1;
            loaded.used_sample = true;
        }
        loaded
    }
}

/// Built-in content used when no book is available
pub fn sample_content() -> Vec<ContentChunk> {
    [
        "This is sample content about Physical AI and Humanoid Robotics. Physical AI is an interdisciplinary field combining robotics, machine learning, and biomechanics.",
        "Humanoid robots are designed to resemble and mimic human behavior and appearance. They often feature articulated limbs and a head with sensory capabilities.",
    ]
    .into_iter()
    .enumerate()
    .map(|(i, text)| ContentChunk::new(text, ChunkMetadata::paragraph("sample.md", i as u32)))
    .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("md"), FileType::Markdown);
        assert_eq!(FileType::from_extension("MDX"), FileType::Mdx);
        assert_eq!(FileType::from_extension("txt"), FileType::Unknown);
        assert_eq!(FileType::from_path(Path::new("docs/a.mdx")), FileType::Mdx);
        assert!(!FileType::from_path(Path::new("README")).is_supported());
    }

    #[test]
    fn test_load_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("part1")).unwrap();
        fs::write(
            dir.path().join("part1/intro.md"),
            "# Intro\n\nRobots are machines.\n\nThey move.\n",
        )
        .unwrap();
        fs::write(dir.path().join("sensors.mdx"), "# Sensors\n\nLidar.\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let loaded = ContentLoader::new(dir.path()).load();

        assert!(!loaded.used_sample);
        assert_eq!(loaded.files, 2);
        assert_eq!(loaded.chunks.len(), 3);
        assert_eq!(loaded.chunks[0].metadata.file_path, "part1/intro.md");
        assert_eq!(loaded.chunks[2].metadata.file_path, "sensors.mdx");
        assert_eq!(loaded.chunks[2].content, "Lidar.");
    }

    #[test]
    fn test_reload_produces_same_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.md"), "One.\n\nTwo.\n").unwrap();

        let first = ContentLoader::new(dir.path()).load();
        let second = ContentLoader::new(dir.path()).load();

        let ids = |c: &LoadedContent| c.chunks.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
    }

    #[test]
    fn test_missing_path_uses_sample() {
        let loaded = ContentLoader::new("/definitely/not/here").load();
        assert!(loaded.used_sample);
        assert_eq!(loaded.chunks.len(), 2);
        assert_eq!(loaded.chunks[0].metadata.file_path, "sample.md");
    }

    #[test]
    fn test_empty_directory_without_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ContentLoader::new(dir.path()).without_sample_fallback().load();
        assert!(!loaded.used_sample);
        assert!(loaded.chunks.is_empty());
        assert_eq!(loaded.files, 0);
    }

    #[test]
    fn test_single_file_root() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("chapter.md");
        fs::write(&file, "Only paragraph.\n").unwrap();

        let loaded = ContentLoader::new(&file).load();
        assert_eq!(loaded.chunks.len(), 1);
        assert_eq!(loaded.chunks[0].metadata.file_path, "chapter.md");
    }
}
