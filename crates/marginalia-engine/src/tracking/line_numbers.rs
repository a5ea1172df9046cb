use crate::editing::Document;

/// 1-based ordinal of the top-level block containing `pos`.
///
/// A position on the boundary between two blocks belongs to the block that
/// starts there; the end of the document belongs to the last block.
pub fn line_number_at(doc: &Document, pos: usize) -> Option<usize> {
    let blocks = doc.top_level_blocks();
    let mut consumed = 0;
    for (index, block) in blocks.iter().enumerate() {
        consumed += block.node_size();
        if pos < consumed {
            return Some(index + 1);
        }
    }
    (pos == consumed && !blocks.is_empty()).then_some(blocks.len())
}
