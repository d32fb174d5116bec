use super::calculate::calculated_value;
use super::{NodeView, current_site, set_state};
use crate::core::models::histogram::Histogram1D;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::node::{CALCULATE_NODES, NodeState, NodeType};
use crate::engine::node_value::NodeValue;
use crate::engine::procedure::Procedure;
use crate::engine::store::{DataStore, StoredData};
use tracing::{debug, warn};

pub(super) fn keywords() -> KeywordStore {
    KeywordStore::new()
        .add(
            "XObservable",
            "One site (distance from the box centre) or two sites (separation)",
            defaults::nodes(&[NodeType::Select], "site", Some(2)),
        )
        .add(
            "QuantityX",
            "Calculate node providing the observable, used instead of XObservable",
            defaults::node(CALCULATE_NODES, "calculate"),
        )
        .add(
            "XRange",
            "Minimum, maximum and bin width of the histogram",
            KeywordValue::BinRange {
                minimum: NodeValue::Double(0.0),
                maximum: NodeValue::Double(10.0),
                width: NodeValue::Double(0.05),
            },
        )
        .add("XAxisLabel", "Label for the observable axis", KeywordValue::Text(None))
}

/// Creates an empty histogram for this run.
pub(super) fn prepare(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    let histogram = {
        let view = NodeView::new(procedure, id)?;
        if view.reference("QuantityX")?.is_none() && view.references("XObservable")?.is_empty() {
            return Err(view.keyword_error("XObservable", "no observable sites or quantity given"));
        }
        let (minimum, maximum, width) = view
            .node()
            .keywords
            .get_bin_range("XRange")
            .ok_or_else(|| view.node().keyword_missing("XRange"))?;
        let vars = view.variables();
        let evaluate = |v: &NodeValue| {
            v.as_double(&vars)
                .map_err(|e| view.keyword_error("XRange", e.to_string()))
        };
        let (minimum, maximum, width) = (evaluate(minimum)?, evaluate(maximum)?, evaluate(width)?);
        Histogram1D::new(minimum, maximum, width).ok_or_else(|| {
            view.keyword_error(
                "XRange",
                format!("invalid range {} to {} with bin width {}", minimum, maximum, width),
            )
        })?
    };
    set_state(procedure, id, NodeState::Collect(Some(histogram)))
}

/// Distance from the box centre (one site) or separation (two sites), or `None`
/// while any site is unset.
fn site_observable(
    view: &NodeView,
    procedure: &Procedure,
    ctx: ProcedureContext,
) -> Result<Option<f64>, NodeError> {
    let sites: Option<Vec<_>> = view
        .references("XObservable")?
        .into_iter()
        .map(|s| current_site(procedure, s))
        .collect();
    let Some(sites) = sites else {
        return Ok(None);
    };
    let configuration = ctx.configuration.borrow();
    let simbox = configuration.simbox();
    match sites.as_slice() {
        [a] => Ok(Some(simbox.minimum_distance(&simbox.centre(), &a.origin))),
        [a, b] => Ok(Some(simbox.minimum_distance(&a.origin, &b.origin))),
        _ => Err(view.keyword_error("XObservable", "expected one or two sites")),
    }
}

/// Bins the observable for the current sites, or the last value of QuantityX when
/// set. Nothing is binned while any site or the quantity is unset.
pub(super) fn execute(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let value = {
        let view = NodeView::new(procedure, id)?;
        match view.reference("QuantityX")? {
            Some(quantity) => calculated_value(procedure, quantity),
            None => site_observable(&view, procedure, ctx)?,
        }
    };
    let Some(value) = value else {
        return Ok(());
    };
    if let NodeState::Collect(Some(histogram)) = &mut procedure.try_node_mut(id)?.state {
        histogram.bin(value);
    }
    Ok(())
}

/// Adds this run's histogram into the data store, replacing any stored histogram
/// whose binning no longer matches.
pub(super) fn finalise(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let node = procedure.try_node(id)?;
    let NodeState::Collect(Some(histogram)) = node.state() else {
        return Ok(());
    };
    let key = DataStore::key(ctx.data_prefix(), node.name().unwrap_or_default());

    let mut store = ctx.engine.store_mut();
    let accumulated = match store.get(&key) {
        Some(StoredData::Histogram(existing)) => {
            let mut merged = existing.clone();
            merged.accumulate(histogram).then_some(merged)
        }
        _ => None,
    };
    let result = match accumulated {
        Some(merged) => merged,
        None => {
            if store.get(&key).is_some() {
                warn!(key = %key, "Stored data is not a histogram with the same binning; replacing it");
            }
            histogram.clone()
        }
    };
    debug!(key = %key, binned = result.n_binned(), "Publishing histogram");
    store.insert(key, StoredData::Histogram(result));
    Ok(())
}
