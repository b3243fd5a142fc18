//! Word-level text diff producing renderable chunks

use similar::{ChangeTag, TextDiff};

use crate::model::DiffChunk;

/// Diff `before` against `after` word by word.
///
/// Pure creation and pure deletion come back as a single whole-value chunk
/// instead of being split into words. Joining every chunk that isn't `added`
/// reproduces `before` exactly; joining every chunk that isn't `removed`
/// reproduces `after` exactly.
pub fn compute_text_diff(before: &str, after: &str) -> Vec<DiffChunk> {
    match (before.is_empty(), after.is_empty()) {
        (true, true) => return Vec::new(),
        (true, false) => return vec![DiffChunk::added(after)],
        (false, true) => return vec![DiffChunk::removed(before)],
        (false, false) => {}
    }

    let diff = TextDiff::from_words(before, after);
    let mut chunks: Vec<DiffChunk> = Vec::new();
    let mut current: Option<(ChangeTag, String)> = None;

    for change in diff.iter_all_changes() {
        let tag = change.tag();
        match current.as_mut() {
            Some((open_tag, buf)) if *open_tag == tag => buf.push_str(change.value()),
            _ => {
                if let Some((open_tag, buf)) = current.take() {
                    chunks.push(chunk_for(open_tag, buf));
                }
                current = Some((tag, change.value().to_string()));
            }
        }
    }
    if let Some((tag, buf)) = current {
        chunks.push(chunk_for(tag, buf));
    }

    chunks
}

fn chunk_for(tag: ChangeTag, value: String) -> DiffChunk {
    match tag {
        ChangeTag::Equal => DiffChunk::unchanged(value),
        ChangeTag::Delete => DiffChunk::removed(value),
        ChangeTag::Insert => DiffChunk::added(value),
    }
}

/// Rebuild the `before` side of a chunk sequence.
pub fn reconstruct_before(chunks: &[DiffChunk]) -> String {
    chunks.iter().filter(|c| !c.added).map(|c| c.value.as_str()).collect()
}

/// Rebuild the `after` side of a chunk sequence.
pub fn reconstruct_after(chunks: &[DiffChunk]) -> String {
    chunks.iter().filter(|c| !c.removed).map(|c| c.value.as_str()).collect()
}
