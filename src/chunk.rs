//! Structure-aware text splitter for oversized record bodies.
//!
//! Splits on paragraph boundaries first, then lines, then sentence ends,
//! falling back to hard cuts only when no boundary fits. Consecutive
//! windows overlap so context spanning a boundary is not lost.

use crate::config::ChunkingConfig;
use crate::models::Document;

/// Boundary separators tried in order before hard-cutting.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", ". "];

/// Split `text` into windows of at most `max_chars` bytes with roughly
/// `overlap` bytes carried over between consecutive windows.
pub fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    if text.len() <= max_chars {
        let trimmed = text.trim();
        return vec![trimmed.to_string()];
    }

    let pieces = split_recursive(text, 0, max_chars);
    merge_pieces(&pieces, max_chars, overlap)
}

/// Split a document whose body exceeds `max_chars` into sibling documents.
///
/// Each chunk inherits the parent's attributes and receives an id of the
/// form `<parent>#<n>` so chunks from the same record stay traceable.
/// Documents at or under the limit pass through untouched.
pub fn chunk_document(doc: &Document, config: &ChunkingConfig) -> Vec<Document> {
    if doc.body.len() <= config.max_chars {
        return vec![doc.clone()];
    }

    let parent_id = doc.id.clone().unwrap_or_else(|| "record".to_string());

    split_text(&doc.body, config.max_chars, config.overlap_chars)
        .into_iter()
        .enumerate()
        .map(|(i, body)| Document {
            id: Some(format!("{}#{}", parent_id, i)),
            body,
            attributes: doc.attributes.clone(),
        })
        .collect()
}

/// Apply chunking across a loaded catalog.
pub fn chunk_documents(docs: Vec<Document>, config: &ChunkingConfig) -> Vec<Document> {
    docs.iter()
        .flat_map(|doc| chunk_document(doc, config))
        .collect()
}

fn split_recursive(text: &str, sep_index: usize, max_chars: usize) -> Vec<String> {
    if text.len() <= max_chars {
        return vec![text.to_string()];
    }

    if sep_index >= SEPARATORS.len() {
        return hard_cut(text, max_chars);
    }

    let sep = SEPARATORS[sep_index];
    let mut pieces = Vec::new();

    for part in text.split_inclusive(sep) {
        if part.len() <= max_chars {
            pieces.push(part.to_string());
        } else {
            pieces.extend(split_recursive(part, sep_index + 1, max_chars));
        }
    }

    pieces
}

/// Cut at max_chars boundaries, backing up to the nearest char boundary.
fn hard_cut(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_chars {
            pieces.push(remaining.to_string());
            break;
        }
        let mut split_at = max_chars;
        while !remaining.is_char_boundary(split_at) {
            split_at -= 1;
        }
        pieces.push(remaining[..split_at].to_string());
        remaining = &remaining[split_at..];
    }

    pieces
}

fn merge_pieces(pieces: &[String], max_chars: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut buf = String::new();

    for piece in pieces {
        if !buf.is_empty() && buf.len() + piece.len() > max_chars {
            chunks.push(buf.trim().to_string());

            buf = overlap_tail(&buf, overlap);
            // Drop the carried tail rather than exceed the window size.
            if buf.len() + piece.len() > max_chars {
                buf.clear();
            }
        }
        buf.push_str(piece);
    }

    if !buf.trim().is_empty() {
        chunks.push(buf.trim().to_string());
    }

    chunks.retain(|c| !c.is_empty());
    chunks
}

/// The last `overlap` bytes of `buf`, aligned forward to a char boundary.
fn overlap_tail(buf: &str, overlap: usize) -> String {
    if overlap == 0 || buf.len() <= overlap {
        return if overlap == 0 { String::new() } else { buf.to_string() };
    }
    let mut start = buf.len() - overlap;
    while !buf.is_char_boundary(start) {
        start += 1;
    }
    buf[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AttrValue, Attributes};

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            enabled: true,
            max_chars,
            overlap_chars,
        }
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = split_text("Hello, world!", 1000, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_paragraphs_grouped_under_limit() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = split_text(text, 1000, 0);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("Third paragraph."));
    }

    #[test]
    fn test_long_text_splits_within_limit() {
        let text = (0..40)
            .map(|i| format!("Paragraph number {} with a bit of padding text.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split_text(&text, 120, 0);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= 120, "chunk too long: {}", chunk.len());
        }
    }

    #[test]
    fn test_overlap_carries_tail() {
        let text = (0..20)
            .map(|i| format!("Sentence number {} goes here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = split_text(&text, 100, 30);
        assert!(chunks.len() > 1);
        // Each later chunk starts with text already seen at the end of an
        // earlier one.
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(10).collect();
            assert!(
                pair[0].contains(head.trim()),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "x".repeat(2500);
        let chunks = split_text(&text, 1000, 0);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() <= 1000));
    }

    #[test]
    fn test_deterministic() {
        let text = "Alpha.\n\nBeta.\n\nGamma.\n\nDelta.".repeat(30);
        let a = split_text(&text, 200, 40);
        let b = split_text(&text, 200, 40);
        assert_eq!(a, b);
    }

    #[test]
    fn test_chunk_document_inherits_attributes() {
        let mut attributes = Attributes::new();
        attributes.insert(
            "Course Name".to_string(),
            AttrValue::Scalar("CS101".to_string()),
        );
        let doc = Document {
            id: Some("CS101".to_string()),
            body: "A long description. ".repeat(100),
            attributes,
        };

        let chunks = chunk_document(&doc, &config(300, 60));
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.id.as_deref(), Some(format!("CS101#{}", i).as_str()));
            assert_eq!(chunk.attributes, doc.attributes);
        }
    }

    #[test]
    fn test_small_document_passes_through() {
        let doc = Document {
            id: Some("CS101".to_string()),
            body: "Short body".to_string(),
            attributes: Attributes::new(),
        };
        let chunks = chunk_document(&doc, &config(1000, 200));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id.as_deref(), Some("CS101"));
    }
}
