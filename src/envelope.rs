//! The textual super-chunk envelope: package header, super-chunk frames,
//! topic sections, chunk envelopes, and footers.
//!
//! Every byte emitted here is part of the downstream paste contract, and
//! the packer budgets super chunks against these exact renderings. Change
//! a separator here and packed sizes change with it; there is no second
//! copy of the format.

use std::collections::HashMap;

use crate::types::{DocId, SuperChunk, TopicSection};

/// Closing line of the whole package, appended to the last super chunk.
pub const PACKAGE_FOOTER: &str = "\n[[/chat package]]";

/// Width reserve for the total super-chunk count, which is unknown while
/// packing. Budgeting headers against this count keeps the rendered size
/// at or below the accounted size for any package of up to 9999 chunks.
pub const TOTAL_COUNT_RESERVE: usize = 9999;

/// The one-time package header carried by the first super chunk.
pub fn package_header(questions: &[String]) -> String {
    let mut header = String::new();
    header.push_str("[[chat package]]\n");
    header.push_str("[[Only respond with OK until all Super Chunks have been provided to you.]]\n\n");
    header.push_str("[[paste all super chunks sequentially]]\n\n");
    header.push_str(
        "[[Answer questions ONLY from the provided content and tell user if other content is needed.]]\n\n",
    );
    header.push_str("Questions:\n");
    for (i, question) in questions.iter().enumerate() {
        header.push_str(&format!("  Q{}: {}\n", i + 1, question));
    }
    header.push('\n');
    header
}

/// Opening frame of super chunk `n` of `total`. Every super chunk after
/// the first carries the continuation line.
pub fn super_chunk_open(n: usize, total: usize) -> String {
    let mut open = format!("[[super chunk {} of {}]]\n", n, total);
    if n > 1 {
        open.push_str("[[continued from previous super chunk]]\n");
    }
    open.push('\n');
    open
}

/// Closing frame of super chunk `n`.
pub fn super_chunk_close(n: usize) -> String {
    format!("\n[[/super chunk {}]]", n)
}

/// A topic section's header: the topic line and the document label of the
/// section's first chunk.
pub fn section_header(question: &str, is_continuation: bool, document_name: &str) -> String {
    let continued = if is_continuation { " (continued)" } else { "" };
    format!("[[topic: {question}{continued}]]\n\n[[document: {document_name}]]\n\n")
}

/// One chunk's envelope: position, score to one decimal, and content.
pub fn chunk_envelope(chunk_number: u32, score: f32, content: &str) -> String {
    format!("[[chunk {chunk_number}]] (score: {score:.1})\n{content}\n")
}

/// A rendered super chunk, ready to paste.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RenderedSuperChunk {
    /// The full envelope text.
    pub content: String,
    /// Byte length of `content`.
    pub char_count: u32,
    /// True for the super chunk carrying the package header.
    pub is_first: bool,
}

/// Look up a document's display name, with a stable fallback.
pub fn document_label(doc_names: &HashMap<DocId, String>, doc_id: DocId) -> String {
    doc_names
        .get(&doc_id)
        .cloned()
        .unwrap_or_else(|| format!("document {doc_id}"))
}

fn render_section(section: &TopicSection, doc_names: &HashMap<DocId, String>) -> String {
    let doc_name = section
        .chunks
        .first()
        .map(|s| document_label(doc_names, s.chunk.doc_id))
        .unwrap_or_default();

    let mut text = section_header(&section.topic_question, section.is_continuation, &doc_name);
    for (i, scored) in section.chunks.iter().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        text.push_str(&chunk_envelope(
            scored.chunk.chunk_number,
            scored.relevance_score,
            &scored.chunk.content,
        ));
    }
    text
}

/// Render a packed list of super chunks into paste-ready text.
///
/// The first super chunk opens with the package header, the last closes
/// with the package footer, and each carries its `n of total` frame.
pub fn render_package(
    super_chunks: &[SuperChunk],
    questions: &[String],
    doc_names: &HashMap<DocId, String>,
) -> Vec<RenderedSuperChunk> {
    let total = super_chunks.len();

    super_chunks
        .iter()
        .enumerate()
        .map(|(i, sc)| {
            let n = i + 1;
            let mut content = String::new();
            if sc.is_first {
                content.push_str(&package_header(questions));
            }
            content.push_str(&super_chunk_open(n, total));
            for (j, section) in sc.topics.iter().enumerate() {
                if j > 0 {
                    content.push('\n');
                }
                content.push_str(&render_section(section, doc_names));
            }
            content.push_str(&super_chunk_close(n));
            if n == total {
                content.push_str(PACKAGE_FOOTER);
            }

            let char_count = content.len() as u32;
            RenderedSuperChunk {
                content,
                char_count,
                is_first: sc.is_first,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ScoreBreakdown, ScoredChunk};

    fn scored(doc_id: DocId, number: u32, content: &str, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(number as u64, doc_id, number, content),
            relevance_score: score,
            breakdown: ScoreBreakdown::default(),
        }
    }

    fn names() -> HashMap<DocId, String> {
        HashMap::from([(1, "manual.txt".to_string())])
    }

    #[test]
    fn test_package_header_numbers_questions() {
        let header = package_header(&["fuel system".to_string(), "safety".to_string()]);
        assert!(header.starts_with("[[chat package]]\n"));
        assert!(header.contains("  Q1: fuel system\n"));
        assert!(header.contains("  Q2: safety\n"));
        assert!(header.ends_with("\n\n"));
    }

    #[test]
    fn test_super_chunk_open_continuation_line() {
        assert!(!super_chunk_open(1, 3).contains("continued from previous"));
        assert!(super_chunk_open(2, 3).contains("[[continued from previous super chunk]]\n"));
    }

    #[test]
    fn test_section_header_continued_suffix() {
        let plain = section_header("fuel system", false, "manual.txt");
        let continued = section_header("fuel system", true, "manual.txt");
        assert!(plain.contains("[[topic: fuel system]]"));
        assert!(continued.contains("[[topic: fuel system (continued)]]"));
        assert!(plain.contains("[[document: manual.txt]]"));
    }

    #[test]
    fn test_chunk_envelope_rounds_score() {
        let env = chunk_envelope(3, 147.567, "body");
        assert_eq!(env, "[[chunk 3]] (score: 147.6)\nbody\n");
    }

    #[test]
    fn test_render_single_super_chunk_package() {
        let mut section = crate::types::TopicSection::new(1, "fuel system", false);
        section.chunks.push(scored(1, 0, "Install the fuel pump.", 150.0));
        let sc = SuperChunk {
            topics: vec![section],
            total_chars: 0,
            is_first: true,
        };

        let rendered = render_package(&[sc], &["fuel system".to_string()], &names());
        assert_eq!(rendered.len(), 1);
        let text = &rendered[0].content;
        assert!(text.starts_with("[[chat package]]"));
        assert!(text.contains("[[super chunk 1 of 1]]"));
        assert!(text.contains("[[topic: fuel system]]"));
        assert!(text.contains("[[document: manual.txt]]"));
        assert!(text.contains("[[chunk 0]] (score: 150.0)\nInstall the fuel pump."));
        assert!(text.ends_with("[[/chat package]]"));
        assert_eq!(rendered[0].char_count as usize, text.len());
    }

    #[test]
    fn test_render_numbers_multiple_super_chunks() {
        let make = |is_first: bool| {
            let mut section = crate::types::TopicSection::new(1, "fuel system", !is_first);
            section.chunks.push(scored(1, 0, "text", 100.0));
            SuperChunk {
                topics: vec![section],
                total_chars: 0,
                is_first,
            }
        };

        let rendered = render_package(
            &[make(true), make(false)],
            &["fuel system".to_string()],
            &names(),
        );
        assert!(rendered[0].content.contains("[[super chunk 1 of 2]]"));
        assert!(rendered[1].content.contains("[[super chunk 2 of 2]]"));
        assert!(rendered[1].content.contains("[[continued from previous super chunk]]"));
        assert!(!rendered[0].content.contains("[[continued from previous"));
        assert!(rendered[1].content.ends_with("[[/chat package]]"));
        assert!(!rendered[0].content.contains("[[/chat package]]"));
    }

    #[test]
    fn test_document_label_fallback() {
        let label = document_label(&HashMap::new(), 9);
        assert_eq!(label, "document 9");
    }
}
