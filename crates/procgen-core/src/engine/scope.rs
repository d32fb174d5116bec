use super::ids::NodeId;
use super::node::NodeType;
use super::procedure::Procedure;
use crate::core::expression::{ExpressionValue, ExpressionVariable, VariableSource};

impl Procedure {
    /// Nodes visible from `from`, nearest first: `from` itself, the nodes before it
    /// in its sequence, then the owning node and its predecessors, out to the root.
    ///
    /// Nodes after `from` are never visible, so references can only point backwards.
    pub(crate) fn scope_chain(&self, from: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(from);
        while let Some(id) = current {
            let Some(sequence) = self
                .nodes
                .get(id)
                .and_then(|n| n.scope)
                .and_then(|s| self.sequences.get(s))
            else {
                break;
            };
            if let Some(position) = sequence.nodes.iter().position(|&n| n == id) {
                chain.extend(sequence.nodes[..=position].iter().rev().copied());
            }
            current = sequence.owner;
        }
        chain
    }

    /// Finds the nearest node called `name` (case-insensitive) visible from `from`.
    ///
    /// # Arguments
    ///
    /// * `from` - The node performing the lookup.
    /// * `name` - The node name to find.
    /// * `exclude` - A node that must not match, typically the caller itself.
    /// * `allowed` - Node kinds that may match; an empty slice allows any kind.
    pub fn node_in_scope(
        &self,
        from: NodeId,
        name: &str,
        exclude: Option<NodeId>,
        allowed: &[NodeType],
    ) -> Option<NodeId> {
        self.scope_chain(from).into_iter().find(|&id| {
            Some(id) != exclude
                && self.nodes.get(id).is_some_and(|n| {
                    n.has_name(name) && (allowed.is_empty() || allowed.contains(&n.node_type()))
                })
        })
    }

    /// Resolves a node reference: through scope when `scoped`, otherwise among all
    /// other nodes of the procedure.
    pub fn resolve_reference(
        &self,
        from: NodeId,
        name: &str,
        scoped: bool,
        allowed: &[NodeType],
    ) -> Option<NodeId> {
        if scoped {
            return self.node_in_scope(from, name, Some(from), allowed);
        }
        self.nodes_in_order().into_iter().find(|&id| {
            id != from
                && self.nodes.get(id).is_some_and(|n| {
                    n.has_name(name) && (allowed.is_empty() || allowed.contains(&n.node_type()))
                })
        })
    }

    /// The nearest node of kind `node_type` whose branch contains `from`.
    pub fn enclosing_node(&self, from: NodeId, node_type: NodeType) -> Option<NodeId> {
        let mut current = from;
        loop {
            let owner = self
                .nodes
                .get(current)
                .and_then(|n| n.scope)
                .and_then(|s| self.sequences.get(s))
                .and_then(|s| s.owner)?;
            if self.nodes.get(owner).is_some_and(|n| n.node_type() == node_type) {
                return Some(owner);
            }
            current = owner;
        }
    }

    /// Every node of the allowed kinds visible from `from`, nearest first.
    pub fn nodes_in_scope(&self, from: NodeId, allowed: &[NodeType]) -> Vec<NodeId> {
        self.scope_chain(from)
            .into_iter()
            .filter(|&id| {
                self.nodes
                    .get(id)
                    .is_some_and(|n| allowed.is_empty() || allowed.contains(&n.node_type()))
            })
            .collect()
    }

    /// Finds the nearest parameter with full name `name` visible from `from`.
    ///
    /// `exclude` names a node and parameter base name that must be skipped.
    pub fn parameter_in_scope(
        &self,
        from: NodeId,
        name: &str,
        exclude: Option<(NodeId, &str)>,
    ) -> Option<&ExpressionVariable> {
        self.scope_chain(from).into_iter().find_map(|id| {
            self.nodes.get(id)?.parameters().iter().find(|p| {
                p.name() == name && exclude.is_none_or(|(n, base)| n != id || p.base_name() != base)
            })
        })
    }

    /// All parameters visible from `from`, nearest first, with shadowed ones omitted.
    pub fn parameters_in_scope(&self, from: NodeId) -> Vec<&ExpressionVariable> {
        let mut visible: Vec<&ExpressionVariable> = Vec::new();
        for id in self.scope_chain(from) {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            for p in node.parameters() {
                if !visible.iter().any(|v| v.name() == p.name()) {
                    visible.push(p);
                }
            }
        }
        visible
    }
}

/// Resolves expression variables through the parameters in scope of a node.
#[derive(Clone, Copy)]
pub struct ScopeVariables<'a> {
    procedure: &'a Procedure,
    node: NodeId,
}

impl<'a> ScopeVariables<'a> {
    pub fn new(procedure: &'a Procedure, node: NodeId) -> Self {
        Self { procedure, node }
    }
}

impl VariableSource for ScopeVariables<'_> {
    fn variable(&self, name: &str) -> Option<ExpressionValue> {
        self.procedure
            .parameter_in_scope(self.node, name, None)
            .map(ExpressionVariable::value)
    }
}
