/*!
 * # Editing Primitives
 *
 * The document model the rest of the engine is written against. It stands in
 * for the host rich-text framework and exposes only what position tracking,
 * comment anchoring and inline completion need.
 *
 * ## Architecture Overview
 *
 * ### 1. Immutable Document Tree
 * - A **`Document`** is a tree of **`Node`**s rooted at a `doc` node
 * - Positions are flat offsets: block nodes add an opening and a closing
 *   token, leaves one token, text one token per character
 * - `descendants`, `nodes_between` and `node_at` are the traversal surface
 *
 * ### 2. Step-Based Editing
 * - Every edit is a **`Step`** (`ReplaceText`, `InsertNode`, `DeleteNode`,
 *   `SplitBlock`, `SetNodeAttrs`) that produces a new document and a
 *   **`StepMap`**
 * - Steps are grouped into a **`Transaction`** whose **`Mapping`** translates
 *   any old position into the new document
 *
 * ### 3. Position Mapping
 * - `Mapping::map(pos, assoc)` is the only primitive anchor remapping relies on
 * - Insertions exactly at a position follow its `Assoc`
 * - Positions inside a deleted range collapse onto the deletion point
 *
 * ## Module Structure
 *
 * - **`node`**: `Node`, `NodeType` and node attributes
 * - **`document`**: `Document` traversal and text extraction
 * - **`mapping`**: `StepMap` and `Mapping`
 * - **`steps`**: the `Step` enum and how each step rewrites the tree
 * - **`transaction`**: `Transaction` and `TransactionMeta`
 *
 * ## Usage Pattern
 *
 * ```rust
 * use marginalia_engine::editing::*;
 *
 * let doc = Document::new(vec![Node::paragraph("Hello")]);
 * let mut tr = Transaction::new(&doc);
 * tr.insert_text(6, " world").unwrap();
 *
 * assert_eq!(tr.doc().text_content(), "Hello world");
 * assert_eq!(tr.mapping().map(6, Assoc::After), 12);
 * ```
 */

pub mod document;
pub mod mapping;
pub mod node;
pub mod steps;
pub mod transaction;

pub use document::{Document, TextblockPos};
pub use mapping::{Assoc, Mapping, MappedRange, StepMap};
pub use node::{Node, NodeAttrs, NodeId, NodeType};
pub use steps::Step;
pub use transaction::{Transaction, TransactionMeta};
