//! Normalisers run from a Process1D node's Normalisation branch, each acting on
//! the data of the nearest enclosing Process1D.

use super::NodeView;
use super::process::{processed, with_processed};
use crate::core::expression::ExpressionValue;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, defaults};
use crate::engine::node::{NodeState, NodeType};
use crate::engine::procedure::Procedure;
use tracing::warn;

pub(super) fn site_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "Site",
        "Selections whose average site count divides the data",
        defaults::nodes(&[NodeType::Select], "site", None),
    )
}

pub(super) fn expression_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "Expression",
        "Replacement for each value, over x and value",
        defaults::expression_over(&["x", "value"]),
    )
}

fn target(procedure: &Procedure, id: NodeId) -> Result<NodeId, NodeError> {
    let node = procedure.try_node(id)?;
    procedure
        .enclosing_node(id, NodeType::Process1D)
        .ok_or_else(|| node.error("must be inside a Process1D Normalisation branch"))
}

/// Average sites per selection of each referenced Select node. Selections that
/// never selected anything are skipped with a warning.
fn average_sites(procedure: &Procedure, id: NodeId) -> Result<Vec<f64>, NodeError> {
    let view = NodeView::new(procedure, id)?;
    let selects = view.references("Site")?;
    if selects.is_empty() {
        return Err(view.keyword_error("Site", "no selections given"));
    }
    Ok(selects
        .into_iter()
        .filter_map(|s| {
            let node = procedure.node(s)?;
            let average = match node.state() {
                NodeState::Select(state) => state.average_sites(),
                _ => 0.0,
            };
            if average > 0.0 {
                Some(average)
            } else {
                warn!(node = %node.label(), "Selection has no average site population; not normalising by it");
                None
            }
        })
        .collect())
}

pub(super) fn execute_site_population(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    let process = target(procedure, id)?;
    let factor: f64 = average_sites(procedure, id)?.iter().product();
    with_processed(procedure, process, |data| data.scale(1.0 / factor))
}

/// Divides by the number density `n / V` of each selection in the current box.
pub(super) fn execute_number_density(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let process = target(procedure, id)?;
    let volume = ctx.configuration.borrow().simbox().volume();
    let factor: f64 = average_sites(procedure, id)?
        .iter()
        .map(|n| n / volume)
        .product();
    with_processed(procedure, process, |data| data.scale(1.0 / factor))
}

pub(super) fn execute_spherical_shell(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    let process = target(procedure, id)?;
    with_processed(procedure, process, |data| data.divide_by_shell_volumes())
}

/// Replaces each value with the expression evaluated at that point.
pub(super) fn execute_expression(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    let process = target(procedure, id)?;
    let values = {
        let view = NodeView::new(procedure, id)?;
        let mut expression = view
            .node()
            .keywords
            .get_expression("Expression")
            .cloned()
            .ok_or_else(|| view.keyword_error("Expression", "no expression given"))?;
        let data = processed(procedure, process)
            .ok_or_else(|| view.error("no data is being processed"))?;
        let variables = view.variables();
        data.points()
            .map(|(x, value)| {
                expression.set_local("x", ExpressionValue::Double(x));
                expression.set_local("value", ExpressionValue::Double(value));
                expression
                    .as_double(&variables)
                    .map_err(|e| view.keyword_error("Expression", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?
    };
    with_processed(procedure, process, |data| data.values_mut().copy_from_slice(&values))
}
