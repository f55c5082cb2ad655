use anyhow::{Result, bail};
use oxc_span::Span;

/// Replace the source text covered by `span` with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub span: Span,
    pub replacement: String,
}

/// Splices `edits` into `src`. Edits may come in any order but must not
/// overlap and must fall on character boundaries.
pub fn apply_edits(src: &str, edits: &[TextEdit]) -> Result<String> {
    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by_key(|e| (e.span.start, e.span.end));

    let mut out = String::with_capacity(src.len());
    let mut cursor = 0usize;
    for edit in sorted {
        let (start, end) = (edit.span.start as usize, edit.span.end as usize);
        if start < cursor {
            bail!("Overlapping edits at byte {}", start);
        }
        if end < start || end > src.len() {
            bail!("Edit {}..{} is outside of the source ({} bytes)", start, end, src.len());
        }
        if !src.is_char_boundary(start) || !src.is_char_boundary(end) {
            bail!("Edit {}..{} splits a character", start, end);
        }
        out.push_str(&src[cursor..start]);
        out.push_str(&edit.replacement);
        cursor = end;
    }
    out.push_str(&src[cursor..]);
    Ok(out)
}
