use super::{NodeView, set_state};
use crate::core::models::data1d::Data1D;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::node::{NodeState, NodeType};
use crate::engine::procedure::Procedure;
use crate::engine::sequence;
use crate::engine::store::{DataStore, StoredData};
use tracing::{debug, warn};

pub(super) fn keywords() -> KeywordStore {
    KeywordStore::new()
        .add(
            "SourceData",
            "Collect node whose accumulated histogram is processed",
            defaults::node_anywhere(&[NodeType::Collect], "collect"),
        )
        .add("LabelValue", "Label for the processed values", KeywordValue::Text(None))
        .add("LabelX", "Label for the x axis", KeywordValue::Text(None))
}

pub(super) fn prepare(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    NodeView::new(procedure, id)?.required_reference("SourceData")?;
    Ok(())
}

/// Copies the stored, run-averaged histogram of the source Collect node, runs the
/// Normalisation branch over it and publishes the result under this node's name.
pub(super) fn finalise(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let (source_key, key, branch) = {
        let view = NodeView::new(procedure, id)?;
        let source = view.required_reference("SourceData")?;
        let source_name = procedure
            .try_node(source)?
            .name()
            .unwrap_or_default()
            .to_string();
        (
            DataStore::key(ctx.data_prefix(), &source_name),
            DataStore::key(ctx.data_prefix(), view.node().name().unwrap_or_default()),
            view.node().branch(),
        )
    };

    let data = match ctx.engine.store().histogram(&source_key) {
        Some(histogram) => Data1D::from_histogram(histogram),
        None => {
            warn!(key = %source_key, "No collected histogram to process");
            return Ok(());
        }
    };
    set_state(procedure, id, NodeState::Processed(Some(data)))?;

    if let Some(branch) = branch {
        sequence::execute_sequence(procedure, branch, ctx)?;
        sequence::finalise_sequence(procedure, branch, ctx)?;
    }

    let NodeState::Processed(Some(processed)) = procedure.try_node(id)?.state() else {
        return Ok(());
    };
    debug!(key = %key, points = processed.len(), "Publishing processed data");
    ctx.engine
        .store_mut()
        .insert(key, StoredData::Data1D(processed.clone()));
    Ok(())
}

pub(super) fn processed(procedure: &Procedure, id: NodeId) -> Option<&Data1D> {
    match procedure.node(id)?.state() {
        NodeState::Processed(data) => data.as_ref(),
        _ => None,
    }
}

/// Applies `f` to the data the Process1D node `id` is currently working on.
pub(super) fn with_processed(
    procedure: &mut Procedure,
    id: NodeId,
    f: impl FnOnce(&mut Data1D),
) -> Result<(), NodeError> {
    let node = procedure.try_node_mut(id)?;
    match &mut node.state {
        NodeState::Processed(Some(data)) => {
            f(data);
            Ok(())
        }
        _ => Err(node.error("no data is being processed")),
    }
}
