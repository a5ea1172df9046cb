use crate::editing::{Document, Mapping, Node, NodeAttrs, Step};
use crate::error::EngineError;

/// Flags attached to a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionMeta {
    /// The comment set changed and highlights must be repainted
    pub comments_changed: bool,
    /// Run a full position reconciliation even if the document is unchanged
    pub force_reconcile: bool,
    /// Record the edit in the completion edit history
    pub add_to_history: bool,
    /// Set on the tracker's own correction transaction
    pub(crate) tracker_pass: bool,
}

impl Default for TransactionMeta {
    fn default() -> Self {
        Self {
            comments_changed: false,
            force_reconcile: false,
            add_to_history: true,
            tracker_pass: false,
        }
    }
}

/// A sequence of steps applied to a document, with the composed mapping
#[derive(Clone, Debug)]
pub struct Transaction {
    before: Document,
    doc: Document,
    /// Document state before each step
    docs: Vec<Document>,
    steps: Vec<Step>,
    mapping: Mapping,
    meta: TransactionMeta,
}

impl Transaction {
    pub fn new(doc: &Document) -> Self {
        Self {
            before: doc.clone(),
            doc: doc.clone(),
            docs: Vec::new(),
            steps: Vec::new(),
            mapping: Mapping::new(),
            meta: TransactionMeta::default(),
        }
    }

    /// Apply a step on top of the current state
    pub fn step(&mut self, step: Step) -> Result<&mut Self, EngineError> {
        let (next, map) = step.apply(&self.doc)?;
        let previous = std::mem::replace(&mut self.doc, next);
        self.docs.push(previous);
        self.steps.push(step);
        self.mapping.push(map);
        Ok(self)
    }

    pub fn insert_text(&mut self, at: usize, text: &str) -> Result<&mut Self, EngineError> {
        self.replace_range(at, at, text)
    }

    pub fn delete_range(&mut self, from: usize, to: usize) -> Result<&mut Self, EngineError> {
        self.replace_range(from, to, "")
    }

    pub fn replace_range(
        &mut self,
        from: usize,
        to: usize,
        text: &str,
    ) -> Result<&mut Self, EngineError> {
        self.step(Step::ReplaceText {
            from,
            to,
            text: text.to_string(),
        })
    }

    pub fn insert_node(&mut self, at: usize, node: Node) -> Result<&mut Self, EngineError> {
        self.step(Step::InsertNode { at, node })
    }

    pub fn delete_node(&mut self, at: usize) -> Result<&mut Self, EngineError> {
        self.step(Step::DeleteNode { at })
    }

    pub fn split_block(&mut self, at: usize) -> Result<&mut Self, EngineError> {
        self.step(Step::SplitBlock { at })
    }

    pub fn set_node_attrs(&mut self, pos: usize, attrs: NodeAttrs) -> Result<&mut Self, EngineError> {
        self.step(Step::SetNodeAttrs { pos, attrs })
    }

    pub fn before(&self) -> &Document {
        &self.before
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    /// Documents as they were before each step, paired with the step
    pub fn steps_with_docs(&self) -> impl Iterator<Item = (&Step, &Document)> {
        self.steps.iter().zip(self.docs.iter())
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// Whether any step changed content, not just attributes
    pub fn doc_changed(&self) -> bool {
        self.steps.iter().any(Step::changes_content)
    }

    pub fn meta(&self) -> &TransactionMeta {
        &self.meta
    }

    pub fn set_comments_changed(&mut self) -> &mut Self {
        self.meta.comments_changed = true;
        self
    }

    pub fn set_force_reconcile(&mut self) -> &mut Self {
        self.meta.force_reconcile = true;
        self
    }

    pub fn set_add_to_history(&mut self, add: bool) -> &mut Self {
        self.meta.add_to_history = add;
        self
    }

    pub(crate) fn mark_tracker_pass(&mut self) -> &mut Self {
        self.meta.tracker_pass = true;
        self.meta.add_to_history = false;
        self
    }

    pub(crate) fn is_tracker_pass(&self) -> bool {
        self.meta.tracker_pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::Assoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_transaction_chains_steps_and_mapping() {
        let doc = Document::new(vec![Node::paragraph("Hello")]);
        let mut tr = Transaction::new(&doc);
        tr.insert_text(6, " world").unwrap().delete_range(1, 2).unwrap();

        assert!(tr.doc_changed());
        assert_eq!(tr.doc().text_content(), "ello world");
        assert_eq!(tr.before().text_content(), "Hello");
        assert_eq!(tr.steps().len(), 2);
        // end of the original paragraph content: +6 then -1
        assert_eq!(tr.mapping().map(6, Assoc::After), 11);
    }

    #[test]
    fn test_failed_step_leaves_transaction_untouched() {
        let doc = Document::new(vec![Node::paragraph("Hello")]);
        let mut tr = Transaction::new(&doc);
        assert!(tr.insert_text(42, "x").is_err());
        assert!(!tr.doc_changed());
        assert_eq!(tr.doc(), &doc);
    }

    #[test]
    fn test_steps_with_docs_pairs_previous_state() {
        let doc = Document::new(vec![Node::paragraph("ab")]);
        let mut tr = Transaction::new(&doc);
        tr.insert_text(3, "c").unwrap().insert_text(4, "d").unwrap();
        let texts: Vec<String> = tr
            .steps_with_docs()
            .map(|(_, before)| before.text_content())
            .collect();
        assert_eq!(texts, vec!["ab".to_string(), "abc".to_string()]);
    }

    #[test]
    fn test_tracker_marker_is_private_and_skips_history() {
        let doc = Document::empty();
        let mut tr = Transaction::new(&doc);
        assert!(!tr.is_tracker_pass());
        tr.mark_tracker_pass();
        assert!(tr.is_tracker_pass());
        assert!(!tr.meta().add_to_history);
    }

    #[test]
    fn test_attribute_steps_do_not_change_the_doc() {
        let doc = Document::new(vec![Node::paragraph("a")]);
        let mut tr = Transaction::new(&doc);
        tr.set_node_attrs(0, NodeAttrs::default()).unwrap();
        assert!(!tr.doc_changed());
        tr.insert_text(1, "b").unwrap();
        assert!(tr.doc_changed());
    }
}
