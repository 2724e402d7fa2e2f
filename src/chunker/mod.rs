//! Structural text chunking for the summarizer (spec §4.4).
//!
//! Splits on markdown structure first (headers, horizontal rules), falls
//! back to paragraphs for oversized sections, and falls back again to fixed
//! token windows for a single paragraph that is itself pathologically large.

mod tokens;

pub use tokens::count_tokens;

use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkStrategy {
    Semantic,
    Token,
}

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(#{1,4})\s+(.*)$").unwrap());
static RULE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^(?:-{3,}|_{3,}|\*{3,})\s*$").unwrap());

/// Splits `content` into chunks whose token counts are each `<= chunk_size`
/// (barring a single indivisible run of text), preserving source order and
/// propagating the most recent top-level header into each new chunk.
pub fn chunk(content: &str, strategy: ChunkStrategy, chunk_size: usize, overlap: usize) -> Vec<String> {
    if content.trim().is_empty() {
        return Vec::new();
    }
    let overlap = if overlap >= chunk_size {
        chunk_size.saturating_sub(1)
    } else {
        overlap
    };

    match strategy {
        ChunkStrategy::Token => token_windows(content, chunk_size, overlap),
        ChunkStrategy::Semantic => semantic_chunk(content, chunk_size, overlap),
    }
}

fn semantic_chunk(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sections = split_structural(content);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;
    let mut last_top_header: Option<String> = None;

    for section in sections {
        if let Some(header) = top_level_header(&section) {
            last_top_header = Some(header);
        }
        let section_tokens = count_tokens(&section);

        if section_tokens > chunk_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            chunks.extend(split_oversized_section(&section, chunk_size, overlap, &last_top_header));
            continue;
        }

        if current_tokens + section_tokens > chunk_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        if current.is_empty() {
            if let Some(header) = &last_top_header {
                if !section.trim_start().starts_with(header.as_str()) {
                    current.push_str(header);
                    current.push_str("\n\n");
                    current_tokens += count_tokens(header);
                }
            }
        }

        current.push_str(&section);
        current_tokens += section_tokens;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Breaks the document into runs of consecutive lines separated at ATX
/// headers or horizontal rules, keeping the delimiter attached to the
/// section it introduces.
fn split_structural(content: &str) -> Vec<String> {
    let mut boundaries = vec![0usize];
    for m in HEADER_RE.find_iter(content) {
        boundaries.push(m.start());
    }
    for m in RULE_RE.find_iter(content) {
        boundaries.push(m.start());
    }
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut sections = Vec::new();
    for window in boundaries.windows(2) {
        let section = &content[window[0]..window[1]];
        if !section.trim().is_empty() {
            sections.push(section.to_string());
        }
    }
    if let Some(&last) = boundaries.last() {
        let tail = &content[last..];
        if !tail.trim().is_empty() {
            sections.push(tail.to_string());
        }
    }
    if sections.is_empty() && !content.trim().is_empty() {
        sections.push(content.to_string());
    }
    sections
}

fn top_level_header(section: &str) -> Option<String> {
    HEADER_RE.captures(section).and_then(|caps| {
        let level = caps.get(1)?.as_str();
        if level.len() <= 2 {
            Some(caps.get(0)?.as_str().trim().to_string())
        } else {
            None
        }
    })
}

fn split_oversized_section(section: &str, chunk_size: usize, overlap: usize, header: &Option<String>) -> Vec<String> {
    let paragraphs = split_paragraphs(section);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for paragraph in paragraphs {
        let paragraph_tokens = count_tokens(&paragraph);

        if paragraph_tokens > chunk_size {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            chunks.extend(token_windows(&paragraph, chunk_size, overlap));
            continue;
        }

        if current_tokens + paragraph_tokens > chunk_size && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_tokens = 0;
        }

        if current.is_empty() {
            if let Some(header) = header {
                if !paragraph.trim_start().starts_with(header.as_str()) {
                    current.push_str(header);
                    current.push_str("\n\n");
                    current_tokens += count_tokens(header);
                }
            }
        }

        current.push_str(&paragraph);
        current.push_str("\n\n");
        current_tokens += paragraph_tokens;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_paragraphs(section: &str) -> Vec<String> {
    static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{2,}").unwrap());
    PARAGRAPH_RE
        .split(section)
        .map(|p| p.to_string())
        .filter(|p| !p.trim().is_empty())
        .collect()
}

/// Tertiary fallback: fixed windows of `chunk_size` tokens with `overlap`
/// tokens of carryover between consecutive windows.
fn token_windows(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = content.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let stride = chunk_size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        windows.push(words[start..end].join(" "));
        if end == words.len() {
            break;
        }
        start += stride;
    }
    windows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(chunk("", ChunkStrategy::Semantic, 100, 10).is_empty());
        assert!(chunk("   \n\t  ", ChunkStrategy::Semantic, 100, 10).is_empty());
    }

    #[test]
    fn test_chunks_respect_size_bound() {
        let content = "# Header\n\n".to_string() + &"word ".repeat(500);
        let chunks = chunk(&content, ChunkStrategy::Semantic, 50, 5);
        for c in &chunks {
            assert!(count_tokens(c) <= 50 + count_tokens("# Header"));
        }
    }

    #[test]
    fn test_header_context_propagates_to_first_chunk() {
        let content = "# Zone Overview\n\nSome content about the zone.\n\n## Sub\n\nMore.";
        let chunks = chunk(content, ChunkStrategy::Semantic, 5, 0);
        assert!(chunks[0].starts_with("# Zone Overview"));
    }

    #[test]
    fn test_preserves_document_order() {
        let content = "# A\n\nfirst\n\n# B\n\nsecond\n\n# C\n\nthird";
        let chunks = chunk(content, ChunkStrategy::Semantic, 3, 0);
        let joined = chunks.join(" ");
        let pos_first = joined.find("first").unwrap();
        let pos_second = joined.find("second").unwrap();
        let pos_third = joined.find("third").unwrap();
        assert!(pos_first < pos_second);
        assert!(pos_second < pos_third);
    }

    #[test]
    fn test_oversized_section_falls_back_to_paragraphs() {
        let paragraphs: Vec<String> = (0..20).map(|i| format!("paragraph number {i} with some words in it")).collect();
        let content = format!("# Big\n\n{}", paragraphs.join("\n\n"));
        let chunks = chunk(&content, ChunkStrategy::Semantic, 15, 2);
        assert!(chunks.len() > 1);
    }

    #[test]
    fn test_pathological_paragraph_falls_back_to_token_windows() {
        let content = "word ".repeat(200);
        let chunks = chunk(&content, ChunkStrategy::Semantic, 20, 2);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(count_tokens(c) <= 20);
        }
    }

    #[test]
    fn test_overlap_equal_to_chunk_size_is_clamped() {
        let content = "word ".repeat(50);
        let chunks = chunk(&content, ChunkStrategy::Token, 10, 10);
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 50);
    }

    #[test]
    fn test_token_strategy_skips_structural_tiers() {
        let content = "# H\n\n".to_string() + &"word ".repeat(40);
        let chunks = chunk(&content, ChunkStrategy::Token, 10, 2);
        assert!(chunks.iter().all(|c| !c.starts_with("# H\n\n# H")));
    }
}
