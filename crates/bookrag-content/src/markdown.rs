//! Markdown chunking
//!
//! Splits a markdown document into paragraph chunks. Header lines are not
//! chunked themselves; they set the title and section carried by the
//! paragraphs that follow them.

use bookrag_core::{ChunkMetadata, ContentChunk};
use regex::Regex;
use std::sync::OnceLock;

/// Section name used before the first `##`/`###` header
pub const DEFAULT_SECTION: &str = "General Section";

/// Title used when a document has neither an H1 nor a front matter title
pub const UNKNOWN_TITLE: &str = "Unknown Title";

/// A paragraph as it appears in the source, before metadata is attached
#[derive(Debug, Clone, PartialEq, Eq)]
struct Paragraph {
    /// Position of the blank-line separated segment in the document,
    /// counting empty and header-only segments
    index: u32,
    /// Header lines that open the paragraph
    headers: Vec<String>,
    /// Remaining text
    body: String,
}

/// Chunk a markdown document
pub fn chunk_markdown(content: &str, file_path: &str) -> Vec<ContentChunk> {
    let content = content.replace("\r\n", "\n");
    let (front_title, front_len) = parse_front_matter(&content);
    let title = extract_title(&content[front_len..])
        .or(front_title)
        .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

    let mut section = DEFAULT_SECTION.to_string();
    let mut chunks = Vec::new();

    for paragraph in split_paragraphs(&content, front_len) {
        for header in &paragraph.headers {
            if let Some(name) = section_name(header) {
                section = name.to_string();
            }
        }

        let text = paragraph.body.trim();
        if text.is_empty() {
            continue;
        }

        let metadata = ChunkMetadata::paragraph(file_path, paragraph.index)
            .with_title(title.clone())
            .with_section(section.clone())
            .with_page_reference(extract_page_reference(text));

        chunks.push(ContentChunk::new(text, metadata));
    }

    chunks
}

/// Extract the document title (first H1 header)
pub fn extract_title(content: &str) -> Option<String> {
    let mut in_fence = false;
    for line in content.lines() {
        let trimmed = line.trim();
        if is_fence(trimmed) {
            in_fence = !in_fence;
            continue;
        }
        if !in_fence {
            if let Some(title) = trimmed.strip_prefix("# ") {
                return Some(title.trim().to_string());
            }
        }
    }
    None
}

/// Extract a page reference (`page 12`, `p.12`) from a paragraph
pub fn extract_page_reference(text: &str) -> Option<String> {
    static PAGE_PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PAGE_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\bpage\s+(\d+)|\bp\.\s?(\d+)").expect("page pattern is valid")
    });

    re.captures(text)
        .and_then(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().to_string())
}

/// Section name for `##` and `###` headers
fn section_name(header: &str) -> Option<&str> {
    header
        .strip_prefix("### ")
        .or_else(|| header.strip_prefix("## "))
        .map(str::trim)
}

fn is_fence(line: &str) -> bool {
    line.starts_with("```") || line.starts_with("~~~")
}

fn is_header(line: &str) -> bool {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    (1..=6).contains(&hashes) && line[hashes..].starts_with(' ')
}

/// Split on `\n\n`, ignoring the first `skip` bytes (front matter).
///
/// Every segment advances the index, so ids stay stable however the
/// paragraphs around them are spaced. A fenced code block spanning several
/// segments is folded into the paragraph that opened it.
fn split_paragraphs(content: &str, skip: usize) -> Vec<Paragraph> {
    let mut paragraphs: Vec<Paragraph> = Vec::new();
    let mut in_fence = false;
    let mut offset = 0usize;

    for (index, segment) in content.split("\n\n").enumerate() {
        let start = offset;
        let end = start + segment.len();
        offset = end + 2;

        if end <= skip {
            continue;
        }
        let segment = if start < skip {
            &segment[skip - start..]
        } else {
            segment
        };

        let odd_fences = segment.lines().filter(|l| is_fence(l.trim())).count() % 2 == 1;

        if in_fence {
            if let Some(open) = paragraphs.last_mut() {
                open.body.push_str("\n\n");
                open.body.push_str(segment);
            }
            in_fence = !odd_fences;
            continue;
        }

        let mut headers = Vec::new();
        let mut body: Vec<&str> = Vec::new();
        for line in segment.lines() {
            let trimmed = line.trim();
            if body.is_empty() {
                if trimmed.is_empty() {
                    continue;
                }
                if !is_fence(trimmed) && is_header(trimmed) {
                    headers.push(trimmed.to_string());
                    continue;
                }
            }
            body.push(line);
        }

        if headers.is_empty() && body.is_empty() {
            continue;
        }

        in_fence = odd_fences;
        paragraphs.push(Paragraph {
            index: index as u32,
            headers,
            body: body.join("\n"),
        });
    }

    paragraphs
}

/// Parse a leading `---` front matter block.
///
/// Returns its `title:` if present and the byte length of the block,
/// closing line included. The length is 0 when there is no front matter.
fn parse_front_matter(content: &str) -> (Option<String>, usize) {
    let Some(rest) = content.strip_prefix("---\n") else {
        return (None, 0);
    };
    let Some(end) = rest.find("\n---") else {
        return (None, 0);
    };

    let title = rest[..end].lines().find_map(|line| {
        line.trim()
            .strip_prefix("title:")
            .map(|t| t.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .filter(|t| !t.is_empty())
    });

    let closing = 4 + end + 4;
    let len = content[closing..]
        .find('\n')
        .map(|nl| closing + nl + 1)
        .unwrap_or(content.len());
    (title, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookrag_core::ChunkKind;

    const DOC: &str = "# Humanoid Robots\n\nIntro paragraph about robots.\n\n## Locomotion\n\nWalking is hard, see page 42.\n\n### Balance\nZero moment point control.\n\nAnother balance paragraph.\n";

    #[test]
    fn test_headers_set_title_and_section() {
        let chunks = chunk_markdown(DOC, "docs/robots.md");
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();

        assert_eq!(
            contents,
            vec![
                "Intro paragraph about robots.",
                "Walking is hard, see page 42.",
                "Zero moment point control.",
                "Another balance paragraph.",
            ]
        );

        assert!(chunks
            .iter()
            .all(|c| c.metadata.title.as_deref() == Some("Humanoid Robots")));
        assert_eq!(chunks[0].metadata.section.as_deref(), Some(DEFAULT_SECTION));
        assert_eq!(chunks[1].metadata.section.as_deref(), Some("Locomotion"));
        assert_eq!(chunks[2].metadata.section.as_deref(), Some("Balance"));
        assert_eq!(chunks[3].metadata.section.as_deref(), Some("Balance"));
    }

    #[test]
    fn test_chunk_ids_count_header_paragraphs() {
        let chunks = chunk_markdown(DOC, "docs/robots.md");
        let ids: Vec<_> = chunks.iter().map(|c| c.metadata.chunk_id).collect();
        // 0 is the H1, 2 is the "## Locomotion" header paragraph
        assert_eq!(ids, vec![1, 3, 4, 5]);
        assert!(chunks
            .iter()
            .all(|c| c.metadata.kind == ChunkKind::Paragraph
                && c.metadata.file_path == "docs/robots.md"));
    }

    #[test]
    fn test_page_reference() {
        assert_eq!(extract_page_reference("see page 42 for details"), Some("42".into()));
        assert_eq!(extract_page_reference("as shown on p.7"), Some("7".into()));
        assert_eq!(extract_page_reference("Page 3"), Some("3".into()));
        assert_eq!(extract_page_reference("no reference here"), None);

        let chunks = chunk_markdown(DOC, "docs/robots.md");
        assert_eq!(chunks[1].metadata.page_reference.as_deref(), Some("42"));
        assert_eq!(chunks[0].metadata.page_reference, None);
    }

    #[test]
    fn test_code_fences_are_kept_whole() {
        let doc = "# Code\n\n```python\n# not a header\n\nprint('hi')\n```\n\nAfter code.\n";
        let chunks = chunk_markdown(doc, "code.md");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.chunk_id, 1);
        assert_eq!(chunks[1].metadata.chunk_id, 3);
        assert!(chunks[0].content.contains("# not a header"));
        assert!(chunks[0].content.contains("print('hi')"));
        assert_eq!(chunks[0].metadata.section.as_deref(), Some(DEFAULT_SECTION));
        assert_eq!(chunks[1].content, "After code.");
    }

    #[test]
    fn test_front_matter_title() {
        let doc = "---\nsidebar_position: 1\ntitle: \"Sensors\"\n---\n\nLidar and cameras.\n";
        let chunks = chunk_markdown(doc, "sensors.mdx");

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Lidar and cameras.");
        assert_eq!(chunks[0].metadata.title.as_deref(), Some("Sensors"));
        assert_eq!(chunks[0].metadata.chunk_id, 1);
    }

    #[test]
    fn test_empty_segments_advance_chunk_id() {
        let chunks = chunk_markdown("Alpha.\n\n\n\nBeta.\n", "gaps.md");
        let ids: Vec<_> = chunks.iter().map(|c| c.metadata.chunk_id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(chunks[1].content, "Beta.");
    }

    #[test]
    fn test_crlf_and_front_matter_without_gap() {
        let doc = "---\r\ntitle: Joints\r\n---\r\nServo motors.\r\n\r\nGear trains.\r\n";
        let chunks = chunk_markdown(doc, "joints.md");
        let contents: Vec<_> = chunks.iter().map(|c| c.content.as_str()).collect();

        assert_eq!(contents, vec!["Servo motors.", "Gear trains."]);
        assert_eq!(chunks[0].metadata.chunk_id, 0);
        assert_eq!(chunks[1].metadata.chunk_id, 1);
        assert_eq!(chunks[0].metadata.title.as_deref(), Some("Joints"));
    }

    #[test]
    fn test_missing_title() {
        let chunks = chunk_markdown("Just text.", "plain.md");
        assert_eq!(chunks[0].metadata.title.as_deref(), Some(UNKNOWN_TITLE));
    }

    #[test]
    fn test_empty_document() {
        assert!(chunk_markdown("", "empty.md").is_empty());
        assert!(chunk_markdown("# Only a title\n\n## And a section\n", "h.md").is_empty());
    }

    #[test]
    fn test_hashtag_is_not_a_header() {
        assert!(is_header("## Section"));
        assert!(!is_header("#hashtag"));
        assert!(!is_header("####### seven"));
    }
}
