//! Text normalization applied to chunk content before embedding.

/// Normalizes extracted document text with minimal layout disruption.
///
/// - Trims trailing whitespace on each line.
/// - Collapses runs of blank lines into a single one.
/// - Drops leading and trailing blank lines.
/// - Cuts the result to at most `max_chars` characters.
pub fn normalize_chunk_text(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars.saturating_mul(4)));
    let mut blank_run = 0usize;

    for line in s.lines() {
        let line = line.trim_end();
        if line.trim_start().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(line);
    }

    truncate_chars(out, max_chars)
}

/// Cuts `s` to `max_chars` characters on a char boundary.
fn truncate_chars(mut s: String, max_chars: usize) -> String {
    if let Some((byte_idx, _)) = s.char_indices().nth(max_chars) {
        s.truncate(byte_idx);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_runs_collapse_and_edges_trim() {
        let s = "\n\n  Intro  \n\n\n\nBody line\t\nnext\n\n";
        assert_eq!(normalize_chunk_text(s, 100), "  Intro\n\nBody line\nnext");
    }

    #[test]
    fn whitespace_only_becomes_empty() {
        assert_eq!(normalize_chunk_text(" \n\t\n ", 100), "");
    }

    #[test]
    fn cut_respects_char_boundaries() {
        assert_eq!(normalize_chunk_text("文档问答系统", 4), "文档问答");
        assert_eq!(normalize_chunk_text("abc", 10), "abc");
    }
}
