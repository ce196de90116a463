//! Source citation formatting.

use std::path::Path;

use crate::types::Passage;

/// Unique source file stems in first-seen order, extension stripped.
pub fn unique_source_stems(passages: &[Passage]) -> Vec<String> {
    let mut stems: Vec<String> = Vec::new();
    for passage in passages {
        let name = &passage.metadata.file_name;
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        if !stems.contains(&stem) {
            stems.push(stem);
        }
    }
    stems
}

/// Human-readable source block for display under an answer. An empty
/// passage list renders as an empty string, not an empty header.
pub fn format_source_block(passages: &[Passage]) -> String {
    let stems = unique_source_stems(passages);
    if stems.is_empty() {
        return String::new();
    }
    let mut lines = vec!["Sources:".to_string()];
    lines.extend(stems);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(file_name: &str) -> Passage {
        Passage::new("text", format!("files/{file_name}"), file_name)
    }

    #[test]
    fn dedup_preserves_first_seen_order() {
        let passages = vec![passage("a.md"), passage("b.md"), passage("a.md")];
        assert_eq!(unique_source_stems(&passages), vec!["a", "b"]);
    }

    #[test]
    fn extension_is_stripped() {
        let passages = vec![passage("report.pdf.md")];
        assert_eq!(unique_source_stems(&passages), vec!["report.pdf"]);
    }

    #[test]
    fn empty_passages_render_empty_block() {
        assert_eq!(format_source_block(&[]), "");
    }

    #[test]
    fn block_lists_each_source_once() {
        let passages = vec![passage("guide.md"), passage("guide.md"), passage("faq.md")];
        assert_eq!(format_source_block(&passages), "Sources:\nguide\nfaq");
    }
}
