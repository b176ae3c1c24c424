//! Chunk file reader: a JSON array or JSONL of `{content, metadata:{page_id}}`.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::RagError;
use crate::record::ChunkInput;

/// Reads a chunk file from disk.
///
/// # Errors
/// - [`RagError::Io`] if the file cannot be read.
/// - [`RagError::Parse`] if the array or any non-empty line is malformed.
pub fn read_chunk_file(path: impl AsRef<Path>) -> Result<Vec<ChunkInput>, RagError> {
    let path = path.as_ref();
    info!(path = %path.display(), "reading chunk file");
    let raw = std::fs::read_to_string(path)?;
    let chunks = parse_chunks(&raw)?;
    debug!(chunks = chunks.len(), "chunk file loaded");
    Ok(chunks)
}

/// Parses chunk text; a leading `[` selects the JSON array form.
pub fn parse_chunks(raw: &str) -> Result<Vec<ChunkInput>, RagError> {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed)
            .map_err(|e| RagError::Parse(format!("chunk array: {e}")));
    }

    let mut out = Vec::new();
    for (i, line) in trimmed.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let chunk: ChunkInput = serde_json::from_str(line)
            .map_err(|e| RagError::Parse(format!("line {} parse error: {}", i + 1, e)))?;
        out.push(chunk);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_form() {
        let raw = r#"[{"content":"a","metadata":{"pageId":1}},{"content":"b","metadata":{"page_id":2}}]"#;
        let chunks = parse_chunks(raw).unwrap();
        assert_eq!(chunks, vec![ChunkInput::new("a", 1), ChunkInput::new("b", 2)]);
    }

    #[test]
    fn jsonl_form_skips_blank_lines() {
        let raw = "{\"content\":\"a\"}\n\n{\"content\":\"b\",\"metadata\":{\"page\":4}}\n";
        let chunks = parse_chunks(raw).unwrap();
        assert_eq!(chunks, vec![ChunkInput::new("a", 0), ChunkInput::new("b", 4)]);
    }

    #[test]
    fn bad_line_reports_its_number() {
        let raw = "{\"content\":\"a\"}\nnot json\n";
        let err = parse_chunks(raw).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn reads_from_disk() {
        let path = std::env::temp_dir().join(format!("rag-store-chunks-{}.jsonl", std::process::id()));
        std::fs::write(&path, "{\"content\":\"x\",\"metadata\":{\"pageId\":7}}\n").unwrap();
        let chunks = read_chunk_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(chunks, vec![ChunkInput::new("x", 7)]);
    }
}
