use marginalia_engine::editing::{Document, Node, NodeType};

// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
#[allow(dead_code)]
pub fn generate_document(sections: usize) -> Document {
    let mut blocks = Vec::with_capacity(sections * 3);
    for section in 0..sections {
        blocks.push(Node::heading(2, &format!("Section {section}")));
        blocks.push(Node::paragraph(
            "Paragraph with some content. It has two sentences for realism.",
        ));
        blocks.push(Node::block(
            NodeType::BulletList,
            vec![Node::list_item("Bullet point"), Node::list_item("Another item")],
        ));
    }
    Document::new(blocks)
}
