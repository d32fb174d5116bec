use super::NodeView;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue};
use crate::engine::procedure::Procedure;
use crate::engine::sequence::execute_sequence as run_branch;

pub(super) fn parameters_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "Parameter",
        "Defines a named parameter and its value",
        KeywordValue::ParameterDefinitions(Vec::new()),
    )
}

/// Re-evaluates each definition in order, so later parameters see the values of
/// earlier ones from this run.
pub(super) fn execute_parameters(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    let count = NodeView::new(procedure, id)?
        .node()
        .keywords
        .get_parameter_definitions("Parameter")
        .map_or(0, <[_]>::len);

    for index in 0..count {
        let (name, value) = {
            let view = NodeView::new(procedure, id)?;
            let definitions = view
                .node()
                .keywords
                .get_parameter_definitions("Parameter")
                .unwrap_or_default();
            let Some(definition) = definitions.get(index) else {
                break;
            };
            let value = definition
                .value
                .evaluate(&view.variables())
                .map_err(|e| {
                    view.keyword_error(
                        "Parameter",
                        format!("parameter '{}': {}", definition.name, e),
                    )
                })?;
            (definition.name.clone(), value)
        };
        procedure.try_node_mut(id)?.set_parameter(&name, value);
    }
    Ok(())
}

pub(super) fn execute_sequence(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    match procedure.try_node(id)?.branch() {
        Some(branch) => run_branch(procedure, branch, ctx),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::core::expression::ExpressionValue;
    use crate::engine::node::{NodeType, NodeUsage};

    #[test]
    fn later_parameters_see_earlier_values() {
        let mut h = Harness::new(NodeUsage::Generation);
        let params = h.add(NodeType::Parameters, None, &[]);
        h.procedure.add_parameter(params, "a", "3").unwrap();
        h.procedure.add_parameter(params, "b", "a*2").unwrap();
        h.procedure.add_parameter(params, "c", "b+1").unwrap();
        h.procedure.add_parameter(params, "a", "5").unwrap();
        h.run().unwrap();
        assert_eq!(h.parameter(params, "a"), ExpressionValue::Integer(5));
        assert_eq!(h.parameter(params, "b"), ExpressionValue::Integer(10));
        assert_eq!(h.parameter(params, "c"), ExpressionValue::Integer(11));
    }

    #[test]
    fn sequence_runs_its_branch_once() {
        let mut h = Harness::new(NodeUsage::Generation);
        let seq = h.add(NodeType::Sequence, None, &[]);
        let inner = h.add_in(seq, NodeType::SizeFactor, None, &[("SizeFactor", &["2.0"])]);
        h.run().unwrap();
        assert_eq!(h.procedure.node(inner).unwrap().stats().executions, 1);
        assert_eq!(h.configuration.borrow().size_factor(), 2.0);
    }
}
