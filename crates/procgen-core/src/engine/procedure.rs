use super::context::ProcedureContext;
use super::error::{NodeError, ProcedureError};
use super::ids::{NodeId, SequenceId};
use super::keywords::{KeywordValue, ParameterDefinition, ReadContext};
use super::node::{Node, NodeType, NodeUsage};
use super::nodes;
use super::progress::Progress;
use super::scope::ScopeVariables;
use super::sequence::{self, NodeSequence};
use crate::core::data::CoreData;
use crate::core::expression::ExpressionVariable;
use slotmap::SlotMap;
use tracing::debug;

/// A complete procedure graph: a root sequence plus every nested branch.
///
/// Nodes and sequences live in arenas and refer to each other by handle. A node
/// records the sequence it belongs to (its scope) and the branch sequence it owns;
/// a sequence records its owning node. Ownership is a tree rooted at [`Self::root`].
#[derive(Debug, Clone)]
pub struct Procedure {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) sequences: SlotMap<SequenceId, NodeSequence>,
    root: SequenceId,
}

impl Procedure {
    pub fn new(context: NodeUsage) -> Self {
        let mut sequences = SlotMap::with_key();
        let root = sequences.insert(NodeSequence::new(None, context.root_keyword(), context));
        Self {
            nodes: SlotMap::with_key(),
            sequences,
            root,
        }
    }

    /// The usage of the root sequence.
    pub fn context(&self) -> NodeUsage {
        self.sequences
            .get(self.root)
            .map(NodeSequence::usage)
            .unwrap_or(NodeUsage::Any)
    }

    pub fn root(&self) -> SequenceId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&NodeSequence> {
        self.sequences.get(id)
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn try_node(&self, id: NodeId) -> Result<&Node, NodeError> {
        self.nodes.get(id).ok_or_else(NodeError::detached)
    }

    pub(crate) fn try_node_mut(&mut self, id: NodeId) -> Result<&mut Node, NodeError> {
        self.nodes.get_mut(id).ok_or_else(NodeError::detached)
    }

    /// A copy of the node handles of `sequence`, empty if the handle is invalid.
    pub(crate) fn sequence_nodes(&self, sequence: SequenceId) -> Vec<NodeId> {
        self.sequences
            .get(sequence)
            .map(|s| s.nodes.clone())
            .unwrap_or_default()
    }

    /// All nodes in execution order (depth-first, branches after their owner).
    pub fn nodes_in_order(&self) -> Vec<NodeId> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        self.collect_nodes(self.root, &mut ordered);
        ordered
    }

    fn collect_nodes(&self, sequence: SequenceId, ordered: &mut Vec<NodeId>) {
        for id in self.sequence_nodes(sequence) {
            ordered.push(id);
            if let Some(branch) = self.nodes.get(id).and_then(Node::branch) {
                self.collect_nodes(branch, ordered);
            }
        }
    }

    /// Finds a node by name anywhere in the procedure (case-insensitive).
    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, n)| n.has_name(name))
            .map(|(id, _)| id)
    }

    pub fn append_node(
        &mut self,
        sequence: SequenceId,
        node_type: NodeType,
        name: Option<&str>,
    ) -> Result<NodeId, ProcedureError> {
        let index = self
            .sequences
            .get(sequence)
            .ok_or(ProcedureError::InvalidSequence)?
            .len();
        self.insert_node(sequence, index, node_type, name)
    }

    /// Creates a node and inserts it at `index` in `sequence` (clamped to the end).
    ///
    /// The node's name must be given if its kind requires one and must not be used by
    /// any other node in the procedure; its kind must be allowed by the sequence's
    /// usage. A branch sequence is created for kinds that own one, inheriting the
    /// usage of `sequence` unless the kind fixes its own (see [`NodeType::branch_usage`]).
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError::MissingName`], [`ProcedureError::DuplicateName`] or
    /// [`ProcedureError::ContextNotAllowed`] if the insertion would break those rules.
    pub fn insert_node(
        &mut self,
        sequence: SequenceId,
        index: usize,
        node_type: NodeType,
        name: Option<&str>,
    ) -> Result<NodeId, ProcedureError> {
        let usage = self
            .sequences
            .get(sequence)
            .ok_or(ProcedureError::InvalidSequence)?
            .usage();
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        if node_type.requires_name() && name.is_none() {
            return Err(ProcedureError::MissingName(node_type));
        }
        if let Some(n) = name {
            check_name(node_type, n)?;
            if self.find_node(n).is_some() {
                return Err(ProcedureError::DuplicateName(n.to_string()));
            }
        }
        if !usage.accepts(node_type.usage()) {
            return Err(ProcedureError::ContextNotAllowed {
                node_type,
                context: usage,
            });
        }

        let mut node = Node::new(node_type, name, nodes::keywords_for(node_type));
        node.scope = Some(sequence);
        let id = self.nodes.insert(node);

        if let Some(keyword) = node_type.branch_keyword() {
            let branch = self
                .sequences
                .insert(NodeSequence::new(Some(id), keyword, node_type.branch_usage(usage)));
            if let Some(node) = self.nodes.get_mut(id) {
                node.branch = Some(branch);
            }
        }

        if let Some(seq) = self.sequences.get_mut(sequence) {
            let index = index.min(seq.nodes.len());
            seq.nodes.insert(index, id);
        }

        debug!(node_type = %node_type, name = ?name, "Inserted node");
        Ok(id)
    }

    /// Removes a node from its sequence and destroys it together with its branch.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), ProcedureError> {
        let scope = self.nodes.get(id).ok_or(ProcedureError::InvalidNode)?.scope;
        if let Some(seq) = scope.and_then(|s| self.sequences.get_mut(s)) {
            seq.nodes.retain(|&n| n != id);
        }
        self.destroy(id);
        Ok(())
    }

    fn destroy(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(id) else {
            return;
        };
        if let Some(branch) = node.branch.and_then(|b| self.sequences.remove(b)) {
            for child in branch.nodes {
                self.destroy(child);
            }
        }
    }

    /// Whether `sequence` lies inside the branch tree owned by `node`.
    fn sequence_within(&self, sequence: SequenceId, node: NodeId) -> bool {
        let mut current = self.sequences.get(sequence).and_then(|s| s.owner);
        while let Some(owner) = current {
            if owner == node {
                return true;
            }
            current = self
                .nodes
                .get(owner)
                .and_then(|n| n.scope)
                .and_then(|s| self.sequences.get(s))
                .and_then(|s| s.owner);
        }
        false
    }

    /// Re-parents a node (with its branch) into `target` at `index`.
    ///
    /// References held by the moved node, or to it, may stop resolving; use
    /// [`Self::validate_references`] after editing.
    pub fn move_node(
        &mut self,
        id: NodeId,
        target: SequenceId,
        index: usize,
    ) -> Result<(), ProcedureError> {
        let node = self.nodes.get(id).ok_or(ProcedureError::InvalidNode)?;
        let node_type = node.node_type();
        let old_scope = node.scope;
        let usage = self
            .sequences
            .get(target)
            .ok_or(ProcedureError::InvalidSequence)?
            .usage();

        if self.sequence_within(target, id) {
            return Err(ProcedureError::Structure(format!(
                "cannot move {} into its own branch",
                node.label()
            )));
        }
        if !usage.accepts(node_type.usage()) {
            return Err(ProcedureError::ContextNotAllowed {
                node_type,
                context: usage,
            });
        }

        if let Some(seq) = old_scope.and_then(|s| self.sequences.get_mut(s)) {
            seq.nodes.retain(|&n| n != id);
        }
        if let Some(seq) = self.sequences.get_mut(target) {
            let index = index.min(seq.nodes.len());
            seq.nodes.insert(index, id);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.scope = Some(target);
        }
        Ok(())
    }

    /// Renames a node, re-prefixing its parameters and updating node references
    /// that pointed at the old name.
    pub fn set_name(&mut self, id: NodeId, name: Option<&str>) -> Result<(), ProcedureError> {
        let node = self.nodes.get(id).ok_or(ProcedureError::InvalidNode)?;
        let node_type = node.node_type();
        let old_name = node.name().map(str::to_string);
        let name = name.map(str::trim).filter(|n| !n.is_empty());

        if node_type.requires_name() && name.is_none() {
            return Err(ProcedureError::MissingName(node_type));
        }
        if let Some(n) = name {
            check_name(node_type, n)?;
            if self.find_node(n).is_some_and(|other| other != id) {
                return Err(ProcedureError::DuplicateName(n.to_string()));
            }
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.set_name(name);
        }

        if let (Some(old), Some(new)) = (old_name, name) {
            for node in self.nodes.values_mut() {
                let names: Vec<&'static str> = node.keywords.iter().map(|k| k.name()).collect();
                for keyword in names {
                    let Some(k) = node.keywords.find_mut(keyword) else {
                        continue;
                    };
                    let mut value = k.value().clone();
                    let changed = match &mut value {
                        KeywordValue::Node(r) => match &mut r.target {
                            Some(t) if t.eq_ignore_ascii_case(&old) => {
                                *t = new.to_string();
                                true
                            }
                            _ => false,
                        },
                        KeywordValue::NodeVector(list) => {
                            let mut changed = false;
                            for t in list.targets.iter_mut().filter(|t| t.eq_ignore_ascii_case(&old)) {
                                *t = new.to_string();
                                changed = true;
                            }
                            changed
                        }
                        _ => false,
                    };
                    if changed {
                        k.assign(value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Sets a keyword from text-format arguments, validated exactly as when reading
    /// a procedure.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError::UnknownKeyword`] if the node has no such keyword, or
    /// the keyword's own validation error. The keyword is unchanged on error.
    pub fn set_keyword(
        &mut self,
        id: NodeId,
        keyword: &str,
        args: &[String],
        core: &CoreData,
    ) -> Result<(), ProcedureError> {
        let node = self.nodes.get(id).ok_or(ProcedureError::InvalidNode)?;
        let existing = node
            .keywords
            .find(keyword)
            .ok_or_else(|| ProcedureError::UnknownKeyword {
                keyword: keyword.to_string(),
                node_type: node.node_type(),
            })?;
        let name = existing.name();
        let mut value = existing.value().clone();
        value.read(
            name,
            args,
            &ReadContext {
                procedure: self,
                node: id,
                core,
            },
        )?;

        let parameters = match &value {
            KeywordValue::ParameterDefinitions(definitions) => {
                Some(self.evaluate_parameters(id, definitions)?)
            }
            _ => None,
        };
        if let Some(node) = self.nodes.get_mut(id) {
            if let Some(k) = node.keywords.find_mut(name) {
                k.assign(value);
            }
            if let Some(parameters) = parameters {
                node.parameters = parameters;
            }
        }
        Ok(())
    }

    /// Sets a keyword from its structured-format value.
    pub fn set_keyword_toml(
        &mut self,
        id: NodeId,
        keyword: &str,
        value: &toml::Value,
        core: &CoreData,
    ) -> Result<(), ProcedureError> {
        let node = self.nodes.get(id).ok_or(ProcedureError::InvalidNode)?;
        let existing = node
            .keywords
            .find(keyword)
            .ok_or_else(|| ProcedureError::UnknownKeyword {
                keyword: keyword.to_string(),
                node_type: node.node_type(),
            })?;
        let lines = existing.value().toml_argument_lines(existing.name(), value)?;
        for args in lines {
            self.set_keyword(id, keyword, &args, core)?;
        }
        Ok(())
    }

    /// Declares (or redefines) a parameter on a Parameters node.
    pub fn add_parameter(
        &mut self,
        id: NodeId,
        name: &str,
        value: &str,
    ) -> Result<(), ProcedureError> {
        let node = self.nodes.get(id).ok_or(ProcedureError::InvalidNode)?;
        if node.node_type() != NodeType::Parameters {
            return Err(ProcedureError::Structure(format!(
                "{} does not accept user-defined parameters",
                node.label()
            )));
        }
        let args = [name.to_string(), value.to_string()];
        self.set_keyword(id, "Parameter", &args, &CoreData::default())
    }

    /// Evaluates parameter definitions against the parameters currently in scope
    /// of `id`. Nothing is changed if any definition fails to evaluate.
    fn evaluate_parameters(
        &self,
        id: NodeId,
        definitions: &[ParameterDefinition],
    ) -> Result<Vec<ExpressionVariable>, ProcedureError> {
        let vars = ScopeVariables::new(self, id);
        definitions
            .iter()
            .map(|d| {
                let value = d.value.evaluate(&vars).map_err(|source| ProcedureError::Expression {
                    text: d.value.to_string(),
                    source,
                })?;
                Ok(ExpressionVariable::new(&d.name, value))
            })
            .collect()
    }

    /// Checks the ownership invariants between nodes and sequences.
    pub fn check(&self) -> Result<(), ProcedureError> {
        let root = self
            .sequences
            .get(self.root)
            .ok_or(ProcedureError::InvalidSequence)?;
        if root.owner.is_some() {
            return Err(ProcedureError::Structure("root sequence has an owner".into()));
        }

        for (seq_id, seq) in &self.sequences {
            for &id in &seq.nodes {
                let node = self.nodes.get(id).ok_or(ProcedureError::InvalidNode)?;
                if node.scope != Some(seq_id) {
                    return Err(ProcedureError::Structure(format!(
                        "{} is listed in a sequence it does not belong to",
                        node.label()
                    )));
                }
            }
            if let Some(owner) = seq.owner {
                let node = self.nodes.get(owner).ok_or(ProcedureError::InvalidNode)?;
                if node.branch != Some(seq_id) {
                    return Err(ProcedureError::Structure(format!(
                        "{} does not own the branch that names it as owner",
                        node.label()
                    )));
                }
            } else if seq_id != self.root {
                return Err(ProcedureError::Structure("orphaned sequence".into()));
            }
        }

        for (id, node) in &self.nodes {
            let in_scope = node
                .scope
                .and_then(|s| self.sequences.get(s))
                .is_some_and(|s| s.nodes.contains(&id));
            if !in_scope {
                return Err(ProcedureError::Structure(format!(
                    "{} is not contained in its scope",
                    node.label()
                )));
            }
            if let Some(name) = node.name() {
                if self.find_node(name) != Some(id) {
                    return Err(ProcedureError::DuplicateName(name.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Reports every node reference and expression variable that no longer resolves
    /// from the node holding it.
    pub fn validate_references(&self) -> Vec<ProcedureError> {
        let mut errors = Vec::new();
        for id in self.nodes_in_order() {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let vars = ScopeVariables::new(self, id);
            for keyword in node.keywords.iter().filter(|k| k.is_set()) {
                let unresolved = |name: &str, allowed, kind, scoped| {
                    self.resolve_reference(id, name, scoped, allowed)
                        .is_none()
                        .then(|| ProcedureError::UnresolvedReference {
                            keyword: keyword.name().to_string(),
                            name: name.to_string(),
                            kind,
                        })
                };
                match keyword.value() {
                    KeywordValue::Node(r) => {
                        if let Some(t) = &r.target {
                            errors.extend(unresolved(t, r.allowed, r.kind, r.scoped));
                        }
                    }
                    KeywordValue::NodeVector(list) => {
                        for t in &list.targets {
                            errors.extend(unresolved(t, list.allowed, list.kind, true));
                        }
                    }
                    KeywordValue::Expression(e) => {
                        if let Err(source) = e.try_evaluate(&vars) {
                            errors.push(ProcedureError::Expression {
                                text: e.text().to_string(),
                                source,
                            });
                        }
                    }
                    other => {
                        for value in other.node_values() {
                            if let Err(source) = value.evaluate(&vars) {
                                errors.push(ProcedureError::Expression {
                                    text: value.to_string(),
                                    source,
                                });
                            }
                        }
                    }
                }
            }
        }
        errors
    }

    pub fn prepare(&mut self, ctx: ProcedureContext) -> Result<(), NodeError> {
        sequence::prepare_sequence(self, self.root, ctx)
    }

    /// Executes the root sequence, reporting one progress step per root node.
    pub fn execute(&mut self, ctx: ProcedureContext) -> Result<(), NodeError> {
        let ids = self.sequence_nodes(self.root);
        ctx.reporter.report(Progress::TaskStart {
            total_steps: ids.len() as u64,
        });
        let result = ids.into_iter().try_for_each(|id| {
            if let Some(node) = self.nodes.get(id) {
                ctx.reporter.report(Progress::NodeStarted { label: node.label() });
            }
            nodes::execute(self, id, ctx)?;
            ctx.reporter.report(Progress::TaskIncrement);
            Ok(())
        });
        ctx.reporter.report(Progress::TaskFinish);
        result
    }

    pub fn finalise(&mut self, ctx: ProcedureContext) -> Result<(), NodeError> {
        sequence::finalise_sequence(self, self.root, ctx)
    }

    /// Runs all three phases. Nodes that completed execution are finalised even if a
    /// later node failed; the execution error is then returned.
    pub fn run(&mut self, ctx: ProcedureContext) -> Result<(), NodeError> {
        self.prepare(ctx)?;
        let executed = self.execute(ctx);
        let finalised = self.finalise(ctx);
        executed.and(finalised)
    }
}

/// Names are written quoted in the text format, so they may hold one kind of quote but not both.
fn check_name(node_type: NodeType, name: &str) -> Result<(), ProcedureError> {
    if name.contains('\'') && name.contains('"') {
        return Err(ProcedureError::InvalidArgument {
            keyword: node_type.keyword().to_string(),
            value: name.to_string(),
            reason: "node names cannot contain both single and double quotes".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::{ExpressionError, ExpressionValue};
    use crate::core::models::species::test_species::water;

    fn core() -> CoreData {
        let mut core = CoreData::new();
        core.add_species(water()).unwrap();
        core
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn names_are_unique_across_the_whole_procedure() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let s1 = p.append_node(root, NodeType::Select, Some("S1")).unwrap();
        let branch = p.node(s1).unwrap().branch().unwrap();

        let err = p.append_node(root, NodeType::Pick, Some("s1")).unwrap_err();
        assert!(matches!(err, ProcedureError::DuplicateName(n) if n == "s1"));
        let err = p.append_node(branch, NodeType::Select, Some("S1")).unwrap_err();
        assert!(matches!(err, ProcedureError::DuplicateName(_)));
        assert_eq!(p.n_nodes(), 1);
    }

    #[test]
    fn required_names_and_contexts_are_enforced() {
        let mut p = Procedure::new(NodeUsage::Analysis);
        let root = p.root();
        assert!(matches!(
            p.append_node(root, NodeType::Select, None),
            Err(ProcedureError::MissingName(NodeType::Select))
        ));
        assert!(matches!(
            p.append_node(root, NodeType::Add, None),
            Err(ProcedureError::ContextNotAllowed { .. })
        ));
        assert!(p.append_node(root, NodeType::Parameters, None).is_ok());
        assert!(p.append_node(root, NodeType::Collect, Some("C")).is_ok());
    }

    #[test]
    fn branches_inherit_the_usage_of_their_parent_sequence() {
        let mut p = Procedure::new(NodeUsage::Analysis);
        let root = p.root();
        let s = p.append_node(root, NodeType::Select, Some("S")).unwrap();
        let branch = p.node(s).unwrap().branch().unwrap();
        assert_eq!(p.sequence(branch).unwrap().usage(), NodeUsage::Analysis);
        assert_eq!(p.sequence(branch).unwrap().end_keyword(), "EndForEach");
        assert!(p.append_node(branch, NodeType::Temperature, None).is_err());
    }

    #[test]
    fn remove_node_destroys_its_branch_recursively() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let outer = p.append_node(root, NodeType::Sequence, None).unwrap();
        let b1 = p.node(outer).unwrap().branch().unwrap();
        let inner = p.append_node(b1, NodeType::Sequence, None).unwrap();
        let b2 = p.node(inner).unwrap().branch().unwrap();
        p.append_node(b2, NodeType::Temperature, None).unwrap();
        let keep = p.append_node(root, NodeType::Box, None).unwrap();

        p.remove_node(outer).unwrap();
        assert_eq!(p.n_nodes(), 1);
        assert!(p.sequence(b1).is_none());
        assert!(p.sequence(b2).is_none());
        assert_eq!(p.sequence(root).unwrap().nodes(), &[keep]);
        p.check().unwrap();
    }

    #[test]
    fn move_node_rejects_moving_into_own_subtree() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let outer = p.append_node(root, NodeType::Sequence, None).unwrap();
        let b1 = p.node(outer).unwrap().branch().unwrap();
        let inner = p.append_node(b1, NodeType::Sequence, None).unwrap();
        let b2 = p.node(inner).unwrap().branch().unwrap();

        assert!(matches!(p.move_node(outer, b2, 0), Err(ProcedureError::Structure(_))));
        assert!(matches!(p.move_node(outer, b1, 0), Err(ProcedureError::Structure(_))));

        p.move_node(inner, root, 0).unwrap();
        assert_eq!(p.sequence(root).unwrap().nodes(), &[inner, outer]);
        assert_eq!(p.node(inner).unwrap().scope(), Some(root));
        assert!(p.sequence(b1).unwrap().is_empty());
        p.check().unwrap();
    }

    #[test]
    fn moving_a_node_above_its_target_breaks_the_reference() {
        let core = core();
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let pick = p.append_node(root, NodeType::Pick, Some("P")).unwrap();
        let remove = p.append_node(root, NodeType::Remove, None).unwrap();
        p.set_keyword(remove, "Selection", &args(&["P"]), &core).unwrap();
        assert!(p.validate_references().is_empty());

        p.move_node(remove, root, 0).unwrap();
        let errors = p.validate_references();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ProcedureError::UnresolvedReference { name, .. } if name == "P"));
        let _ = pick;
    }

    #[test]
    fn renaming_reprefixes_parameters_and_follows_references() {
        let core = core();
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let pick = p.append_node(root, NodeType::Pick, Some("P")).unwrap();
        let remove = p.append_node(root, NodeType::Remove, None).unwrap();
        p.set_keyword(remove, "Selection", &args(&["P"]), &core).unwrap();

        p.set_name(pick, Some("Chosen")).unwrap();
        assert_eq!(p.node(pick).unwrap().parameter("nPicked").unwrap().name(), "Chosen.nPicked");
        let target = p.node(remove).unwrap().keywords().get_node("Selection").unwrap();
        assert_eq!(target.target.as_deref(), Some("Chosen"));
        assert!(p.validate_references().is_empty());
        assert!(matches!(p.set_name(pick, None), Err(ProcedureError::MissingName(_))));
    }

    #[test]
    fn unknown_keyword_names_node_type() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let id = p.append_node(root, NodeType::Temperature, None).unwrap();
        let err = p
            .set_keyword(id, "Pressure", &args(&["1.0"]), &CoreData::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcedureError::UnknownKeyword { keyword, node_type: NodeType::Temperature } if keyword == "Pressure"
        ));
    }

    #[test]
    fn parameters_are_unprefixed_and_evaluated_in_order() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let id = p.append_node(root, NodeType::Parameters, Some("Globals")).unwrap();
        p.add_parameter(id, "a", "3").unwrap();
        p.add_parameter(id, "b", "a*2").unwrap();
        let node = p.node(id).unwrap();
        assert_eq!(node.parameters()[1].name(), "b");
        assert_eq!(node.parameters()[1].value(), ExpressionValue::Integer(6));
        assert!(p.add_parameter(id, "c", "missing+1").is_err());
    }

    #[test]
    fn parameter_that_fails_to_evaluate_is_rejected_and_not_stored() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let id = p.append_node(root, NodeType::Parameters, None).unwrap();
        p.add_parameter(id, "a", "3").unwrap();

        let err = p
            .set_keyword(id, "Parameter", &args(&["z", "1/0"]), &CoreData::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcedureError::Expression { source: ExpressionError::DivisionByZero, .. }
        ));
        let node = p.node(id).unwrap();
        assert_eq!(node.parameters().len(), 1);
        assert_eq!(node.keywords().get_parameter_definitions("Parameter").unwrap().len(), 1);
    }

    #[test]
    fn non_finite_literals_are_rejected() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let id = p.append_node(root, NodeType::Temperature, None).unwrap();
        let err = p
            .set_keyword(id, "Temperature", &args(&["1e999"]), &CoreData::default())
            .unwrap_err();
        assert!(matches!(
            err,
            ProcedureError::InvalidArgument { keyword, value, .. } if keyword == "Temperature" && value == "1e999"
        ));
        let written = p.node(id).unwrap().keywords().get_value("Temperature").unwrap();
        assert_eq!(written.to_argument(), "300.0");
    }

    #[test]
    fn names_mixing_both_quote_kinds_are_rejected() {
        let mut p = Procedure::new(NodeUsage::Generation);
        let root = p.root();
        let err = p
            .append_node(root, NodeType::Select, Some("it's \"odd\""))
            .unwrap_err();
        assert!(matches!(err, ProcedureError::InvalidArgument { .. }));
        assert_eq!(p.n_nodes(), 0);

        let pick = p.append_node(root, NodeType::Pick, Some("it's")).unwrap();
        assert!(p.set_name(pick, Some("say \"it's\"")).is_err());
        assert_eq!(p.node(pick).unwrap().name(), Some("it's"));
        assert!(p.set_name(pick, Some("\"quoted\"")).is_ok());
    }
}
