//! Block trees.
//!
//! A [`BlockTree`] is an arena of [`BlockNode`]s addressed by [`NodeId`];
//! inputs and `next` links are indices, not owning pointers. Trees are built
//! programmatically or read from the editor's workspace serialisation with
//! [`BlockTree::from_json`].

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CodegenError, CodegenResult};

/// Index of a node in its [`BlockTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

/// The value the editor stored for a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockNode {
    /// Editor-assigned id, emitted in `highlightBlock` calls.
    pub id: String,
    pub type_name: String,
    pub enabled: bool,
    /// Field values keyed by argument name.
    pub fields: BTreeMap<String, FieldValue>,
    /// Connected children keyed by argument name.
    pub inputs: BTreeMap<String, NodeId>,
    pub next: Option<NodeId>,
}

/// An arena of blocks plus the ordered list of top-level blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockTree {
    nodes: Vec<BlockNode>,
    roots: Vec<NodeId>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unconnected, enabled block and return its id.
    pub fn add_block(&mut self, id: impl Into<String>, type_name: impl Into<String>) -> NodeId {
        let node = NodeId(self.nodes.len());
        self.nodes.push(BlockNode {
            id: id.into(),
            type_name: type_name.into(),
            enabled: true,
            fields: BTreeMap::new(),
            inputs: BTreeMap::new(),
            next: None,
        });
        node
    }

    /// Mark a block as the head of a top-level chain. Roots generate in the
    /// order they were added.
    pub fn add_root(&mut self, node: NodeId) {
        self.roots.push(node);
    }

    pub fn set_field(&mut self, node: NodeId, name: impl Into<String>, value: FieldValue) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.fields.insert(name.into(), value);
        }
    }

    pub fn connect_input(&mut self, parent: NodeId, name: impl Into<String>, child: NodeId) {
        if let Some(n) = self.nodes.get_mut(parent.0) {
            n.inputs.insert(name.into(), child);
        }
    }

    pub fn connect_next(&mut self, prev: NodeId, next: NodeId) {
        if let Some(n) = self.nodes.get_mut(prev.0) {
            n.next = Some(next);
        }
    }

    pub fn set_enabled(&mut self, node: NodeId, enabled: bool) {
        if let Some(n) = self.nodes.get_mut(node.0) {
            n.enabled = enabled;
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&BlockNode> {
        self.nodes.get(id.0)
    }

    pub fn nodes(&self) -> &[BlockNode] {
        &self.nodes
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Read the editor's workspace serialisation.
    pub fn from_json(json: &str) -> CodegenResult<Self> {
        let doc: WorkspaceDoc =
            serde_json::from_str(json).map_err(|e| CodegenError::MalformedWorkspace(e.to_string()))?;
        let mut tree = BlockTree::new();
        for block in &doc.blocks.blocks {
            let root = tree.insert_json(block)?;
            tree.add_root(root);
        }
        Ok(tree)
    }

    fn insert_json(&mut self, block: &JsonBlock) -> CodegenResult<NodeId> {
        let node = self.add_block(block.id.clone(), block.type_name.clone());
        self.set_enabled(node, block.enabled);
        for (name, value) in &block.fields {
            let value = match value {
                Value::String(s) => FieldValue::Text(s.clone()),
                Value::Number(n) => FieldValue::Number(n.as_f64().unwrap_or(f64::NAN)),
                Value::Bool(b) => FieldValue::Text(b.to_string().to_uppercase()),
                other => {
                    return Err(CodegenError::InvalidFieldValue {
                        block_id: block.id.clone(),
                        field: name.clone(),
                        message: format!("unsupported field value {other}"),
                    })
                }
            };
            self.set_field(node, name.clone(), value);
        }
        for (name, conn) in &block.inputs {
            // a real block hides the shadow underneath it
            if let Some(child) = conn.block.as_deref().or(conn.shadow.as_deref()) {
                let child = self.insert_json(child)?;
                self.connect_input(node, name.clone(), child);
            }
        }
        if let Some(next) = block.next.as_ref().and_then(|c| c.block.as_deref().or(c.shadow.as_deref())) {
            let next = self.insert_json(next)?;
            self.connect_next(node, next);
        }
        Ok(node)
    }
}

// ── Serialised form ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct WorkspaceDoc {
    #[serde(default)]
    blocks: TopBlocks,
}

#[derive(Debug, Default, Deserialize)]
struct TopBlocks {
    #[serde(default)]
    blocks: Vec<JsonBlock>,
}

#[derive(Debug, Deserialize)]
struct JsonBlock {
    #[serde(rename = "type")]
    type_name: String,
    id: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
    #[serde(default)]
    inputs: BTreeMap<String, JsonConnection>,
    #[serde(default)]
    next: Option<JsonConnection>,
}

#[derive(Debug, Deserialize)]
struct JsonConnection {
    #[serde(default)]
    block: Option<Box<JsonBlock>>,
    #[serde(default)]
    shadow: Option<Box<JsonBlock>>,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_chains_inputs_and_fields() {
        let json = r#"{
            "blocks": {"languageVersion": 0, "blocks": [
                {"type": "move", "id": "a", "x": 10, "y": 10,
                 "fields": {"_ARG0": "LEFT"},
                 "inputs": {"_ARG1": {"block": {"type": "num", "id": "n", "fields": {"_ARG0": 3}}}},
                 "next": {"block": {"type": "turn", "id": "b", "enabled": false}}}
            ]}
        }"#;
        let tree = BlockTree::from_json(json).unwrap();
        assert_eq!(tree.roots().len(), 1);
        let root = tree.node(tree.roots()[0]).unwrap();
        assert_eq!(root.id, "a");
        assert_eq!(root.fields["_ARG0"], FieldValue::Text("LEFT".into()));
        let child = tree.node(root.inputs["_ARG1"]).unwrap();
        assert_eq!(child.fields["_ARG0"], FieldValue::Number(3.0));
        let next = tree.node(root.next.unwrap()).unwrap();
        assert_eq!(next.id, "b");
        assert!(!next.enabled);
    }

    #[test]
    fn real_block_wins_over_shadow() {
        let json = r#"{"blocks": {"blocks": [
            {"type": "say", "id": "s", "inputs": {"_ARG0": {
                "shadow": {"type": "text", "id": "sh"},
                "block": {"type": "join", "id": "real"}
            }}}
        ]}}"#;
        let tree = BlockTree::from_json(json).unwrap();
        let root = tree.node(tree.roots()[0]).unwrap();
        assert_eq!(tree.node(root.inputs["_ARG0"]).unwrap().id, "real");
    }

    #[test]
    fn empty_workspace_has_no_roots() {
        let tree = BlockTree::from_json("{}").unwrap();
        assert!(tree.is_empty());
        assert!(tree.roots().is_empty());
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = BlockTree::from_json("{\"blocks\": [").unwrap_err();
        assert!(matches!(err, CodegenError::MalformedWorkspace(_)));
    }
}
