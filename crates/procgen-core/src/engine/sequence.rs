use super::context::ProcedureContext;
use super::error::NodeError;
use super::ids::{NodeId, SequenceId};
use super::node::NodeUsage;
use super::nodes;
use super::procedure::Procedure;

/// An ordered list of nodes sharing one lexical scope.
///
/// Insertion order is execution order. The owning node, if any, is the node whose
/// branch this sequence is; the root sequence of a procedure has no owner.
#[derive(Debug, Clone)]
pub struct NodeSequence {
    pub(crate) owner: Option<NodeId>,
    pub(crate) nodes: Vec<NodeId>,
    block_keyword: &'static str,
    usage: NodeUsage,
}

impl NodeSequence {
    pub(crate) fn new(owner: Option<NodeId>, block_keyword: &'static str, usage: NodeUsage) -> Self {
        Self {
            owner,
            nodes: Vec::new(),
            block_keyword,
            usage,
        }
    }

    pub fn owner(&self) -> Option<NodeId> {
        self.owner
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Keyword opening this block in the text format.
    pub fn block_keyword(&self) -> &'static str {
        self.block_keyword
    }

    pub fn end_keyword(&self) -> String {
        format!("End{}", self.block_keyword)
    }

    pub fn usage(&self) -> NodeUsage {
        self.usage
    }
}

/// Prepares each node in order, stopping at the first failure.
pub(crate) fn prepare_sequence(
    procedure: &mut Procedure,
    sequence: SequenceId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    for id in procedure.sequence_nodes(sequence) {
        nodes::prepare(procedure, id, ctx)?;
    }
    Ok(())
}

/// Executes each node in order, stopping at the first failure.
pub(crate) fn execute_sequence(
    procedure: &mut Procedure,
    sequence: SequenceId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    for id in procedure.sequence_nodes(sequence) {
        nodes::execute(procedure, id, ctx)?;
    }
    Ok(())
}

/// Finalises, in order, each node whose last execution in this run completed.
pub(crate) fn finalise_sequence(
    procedure: &mut Procedure,
    sequence: SequenceId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    for id in procedure.sequence_nodes(sequence) {
        nodes::finalise(procedure, id, ctx)?;
    }
    Ok(())
}
