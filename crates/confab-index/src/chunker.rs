use std::collections::{BTreeMap, VecDeque};

use crate::document::{Chunk, Document};

/// Separator preference for character splitting: paragraph break, line
/// break, word boundary, then hard character cut.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Windows shorter than this (in chars) are dropped after splitting.
    pub min_chunk_size: usize,
    /// Heading markers paired with the metadata label they set.
    pub headers: Vec<(String, String)>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            chunk_overlap: 64,
            min_chunk_size: 128,
            headers: default_headers(),
        }
    }
}

/// The six markdown heading levels, labeled `Heading 1`..`Heading 6`.
#[must_use]
pub fn default_headers() -> Vec<(String, String)> {
    (1..=6)
        .map(|level| ("#".repeat(level), format!("Heading {level}")))
        .collect()
}

/// A heading-delimited region of a document, carrying the heading texts
/// of every enclosing level as metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Section {
    pub content: String,
    pub metadata: BTreeMap<String, String>,
}

/// Split all documents into retrieval-sized chunks.
///
/// Each document is split on headings, then each section is windowed to
/// `chunk_size` chars with `chunk_overlap` carried between consecutive
/// windows. Windows shorter than `min_chunk_size` are dropped. Chunk
/// metadata is the document metadata merged with the section's heading
/// metadata; heading keys win on collision.
#[must_use]
pub fn split_documents(documents: &[Document], config: &ChunkerConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for document in documents {
        for section in split_headers(&document.content, &config.headers) {
            let mut metadata = document.metadata.clone();
            metadata.extend(section.metadata);
            for window in
                split_characters(&section.content, config.chunk_size, config.chunk_overlap)
            {
                if window.chars().count() >= config.min_chunk_size {
                    chunks.push(Chunk::new(window, metadata.clone()));
                }
            }
        }
    }
    chunks
}

/// Split markdown text into sections at heading lines.
///
/// A heading line opens a new section, sets the label for its level,
/// clears any deeper levels, and is excluded from section content.
/// Text before the first heading becomes a section with no heading
/// metadata. Whitespace-only sections are skipped.
#[must_use]
pub fn split_headers(text: &str, headers: &[(String, String)]) -> Vec<Section> {
    let mut sections = Vec::new();
    // Stack of (level, label, heading text) for the enclosing headings.
    let mut active: Vec<(usize, String, String)> = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if let Some((level, label, title)) = match_heading(line, headers) {
            finish_section(&mut sections, &mut current, &active);
            while active.last().is_some_and(|(l, _, _)| *l >= level) {
                active.pop();
            }
            active.push((level, label, title));
        } else {
            current.push_str(line);
            current.push('\n');
        }
    }
    finish_section(&mut sections, &mut current, &active);
    sections
}

fn finish_section(
    sections: &mut Vec<Section>,
    current: &mut String,
    active: &[(usize, String, String)],
) {
    let content = std::mem::take(current);
    let content = content.trim();
    if content.is_empty() {
        return;
    }
    let metadata = active
        .iter()
        .map(|(_, label, title)| (label.clone(), title.clone()))
        .collect();
    sections.push(Section {
        content: content.to_owned(),
        metadata,
    });
}

/// Match a heading line against the configured markers; the marker must
/// be followed by a space (or end the line). Longest marker wins.
fn match_heading(line: &str, headers: &[(String, String)]) -> Option<(usize, String, String)> {
    headers
        .iter()
        .filter(|(marker, _)| {
            !marker.is_empty()
                && line.starts_with(marker.as_str())
                && line[marker.len()..].chars().next().is_none_or(|c| c == ' ')
        })
        .max_by_key(|(marker, _)| marker.len())
        .map(|(marker, label)| {
            let title = line[marker.len()..].trim().to_owned();
            (marker.chars().count(), label.clone(), title)
        })
}

/// Window text into pieces of at most `chunk_size` chars, preferring to
/// cut at paragraph, line, and word boundaries before cutting mid-word,
/// with `overlap` chars carried between consecutive windows.
#[must_use]
pub fn split_characters(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    split_with(text, chunk_size, overlap, &SEPARATORS)
}

fn split_with(text: &str, chunk_size: usize, overlap: usize, separators: &[&str]) -> Vec<String> {
    let index = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(index).copied().unwrap_or("");
    let remaining = separators.get(index + 1..).unwrap_or(&[]);

    if separator.is_empty() {
        return hard_windows(text, chunk_size, overlap);
    }

    let mut output = Vec::new();
    let mut good: Vec<&str> = Vec::new();
    for piece in text.split(separator).filter(|p| !p.is_empty()) {
        if piece.chars().count() < chunk_size {
            good.push(piece);
        } else {
            if !good.is_empty() {
                output.extend(merge_splits(&good, separator, chunk_size, overlap));
                good.clear();
            }
            output.extend(split_with(piece, chunk_size, overlap, remaining));
        }
    }
    if !good.is_empty() {
        output.extend(merge_splits(&good, separator, chunk_size, overlap));
    }
    output
}

/// Rejoin small pieces into windows close to `chunk_size`, carrying the
/// trailing pieces that fit within `overlap` into the next window.
fn merge_splits(splits: &[&str], separator: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sep_len = separator.chars().count();
    let mut docs = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for &piece in splits {
        let len = piece.chars().count();
        let joined_len = total + len + if window.is_empty() { 0 } else { sep_len };
        if joined_len > chunk_size && !window.is_empty() {
            if let Some(doc) = join_window(&window, separator) {
                docs.push(doc);
            }
            while total > overlap
                || (total + len + if window.is_empty() { 0 } else { sep_len } > chunk_size
                    && total > 0)
            {
                let Some(front) = window.pop_front() else {
                    break;
                };
                total -= front.chars().count() + if window.is_empty() { 0 } else { sep_len };
            }
        }
        if !window.is_empty() {
            total += sep_len;
        }
        total += len;
        window.push_back(piece);
    }

    if let Some(doc) = join_window(&window, separator) {
        docs.push(doc);
    }
    docs
}

fn join_window(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window
        .iter()
        .copied()
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Fixed-size char windows for text with no usable separator.
fn hard_windows(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut windows = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            windows.push(trimmed.to_owned());
        }
        if end == chars.len() {
            break;
        }
        start += step;
    }
    windows
}
