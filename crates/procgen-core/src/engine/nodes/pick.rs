use super::{NodeView, picked_molecules, region_of, set_count, set_state};
use crate::core::models::configuration::Configuration;
use crate::core::models::ids::MoleculeId;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::node::{NodeState, PICK_NODES, REGION_NODES};
use crate::engine::procedure::Procedure;
use nalgebra::Point3;

fn with_common(store: KeywordStore) -> KeywordStore {
    store.add(
        "From",
        "Restrict picking to molecules of a previous selection",
        defaults::node(PICK_NODES, "selection"),
    )
}

fn species_keyword() -> KeywordValue {
    KeywordValue::SpeciesVector(Vec::new())
}

pub(super) fn pick_keywords() -> KeywordStore {
    with_common(KeywordStore::new().add("Species", "Species to pick", species_keyword()))
}

pub(super) fn proximity_keywords() -> KeywordStore {
    with_common(
        KeywordStore::new()
            .add("Species", "Species to pick", species_keyword())
            .add(
                "NearSpecies",
                "Species counted as neighbours",
                species_keyword(),
            )
            .add(
                "Distance",
                "Distance range within which neighbours are counted",
                defaults::range(0.0, 5.0),
            )
            .add("MinCount", "Minimum number of neighbours", defaults::integer(1))
            .add(
                "MaxCount",
                "Maximum number of neighbours (negative for no limit)",
                defaults::integer(-1),
            ),
    )
}

pub(super) fn region_keywords() -> KeywordStore {
    with_common(
        KeywordStore::new()
            .add("Species", "Species to pick", species_keyword())
            .add(
                "Region",
                "Region that molecule centres must lie in",
                defaults::node(REGION_NODES, "region"),
            ),
    )
}

/// Candidate molecules in configuration order: the `From` selection if given,
/// otherwise all molecules, filtered by the `Species` list when it is non-empty.
fn candidates(
    view: &NodeView,
    procedure: &Procedure,
    configuration: &Configuration,
) -> Result<Vec<MoleculeId>, NodeError> {
    let species = view.species_names("Species");
    let from = view.reference("From")?.map(|f| picked_molecules(procedure, f));
    Ok(configuration
        .molecules_iter()
        .filter(|(id, _)| from.as_ref().is_none_or(|f| f.contains(id)))
        .filter(|(_, m)| {
            species.is_empty() || species.iter().any(|s| s.eq_ignore_ascii_case(&m.species))
        })
        .map(|(id, _)| id)
        .collect())
}

fn store_pick(procedure: &mut Procedure, id: NodeId, picked: Vec<MoleculeId>) -> Result<(), NodeError> {
    set_count(procedure, id, "nPicked", picked.len())?;
    set_state(procedure, id, NodeState::Picked(picked))
}

pub(super) fn execute_pick(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let picked = {
        let view = NodeView::new(procedure, id)?;
        candidates(&view, procedure, &ctx.configuration.borrow())?
    };
    store_pick(procedure, id, picked)
}

/// Picks molecules with a neighbour count within `[MinCount, MaxCount]`, counting
/// `NearSpecies` molecule centres whose minimum-image distance lies in `Distance`.
pub(super) fn execute_proximity(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let picked = {
        let view = NodeView::new(procedure, id)?;
        let (min_distance, max_distance) = view.range("Distance")?;
        let min_count = view.integer("MinCount")?;
        let max_count = view.integer("MaxCount")?;
        let near_species = view.species_names("NearSpecies");
        if near_species.is_empty() {
            return Err(view.keyword_error("NearSpecies", "no neighbour species given"));
        }

        let configuration = ctx.configuration.borrow();
        let chosen = candidates(&view, procedure, &configuration)?;
        let centres: Vec<(MoleculeId, Point3<f64>)> = chosen
            .iter()
            .filter_map(|&m| configuration.molecule(m).map(|mol| (m, mol.centre())))
            .collect();
        let neighbours: Vec<(MoleculeId, Point3<f64>)> = configuration
            .molecules_iter()
            .filter(|(_, m)| near_species.iter().any(|s| s.eq_ignore_ascii_case(&m.species)))
            .map(|(id, m)| (id, m.centre()))
            .collect();
        let simbox = configuration.simbox().clone();

        let counts = ctx.pool.map(&centres, |(molecule, centre)| {
            neighbours
                .iter()
                .filter(|(other, p)| {
                    if other == molecule {
                        return false;
                    }
                    let r = simbox.minimum_distance(centre, p);
                    r >= min_distance && r <= max_distance
                })
                .count() as i64
        });

        centres
            .iter()
            .zip(counts)
            .filter(|(_, n)| *n >= min_count && (max_count < 0 || *n <= max_count))
            .map(|((m, _), _)| *m)
            .collect()
    };
    store_pick(procedure, id, picked)
}

pub(super) fn execute_region(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let picked = {
        let view = NodeView::new(procedure, id)?;
        let region_node = view.required_reference("Region")?;
        let region = region_of(procedure, region_node)
            .ok_or_else(|| view.keyword_error("Region", "referenced region has not been generated"))?;
        let configuration = ctx.configuration.borrow();
        candidates(&view, procedure, &configuration)?
            .into_iter()
            .filter(|&m| {
                configuration
                    .molecule(m)
                    .is_some_and(|mol| region.contains(&mol.centre()))
            })
            .collect()
    };
    store_pick(procedure, id, picked)
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::core::expression::ExpressionValue;
    use crate::core::models::configuration::Molecule;
    use crate::core::models::simbox::SimBox;
    use crate::core::models::species::test_species::{argon, water};
    use crate::engine::node::{NodeType, NodeUsage};
    use nalgebra::Point3;

    fn populate(h: &Harness) {
        let mut cfg = h.configuration.borrow_mut();
        cfg.set_simbox(SimBox::cubic(20.0));
        let a = argon();
        let w = water();
        for x in [1.0, 2.0, 12.0] {
            cfg.add_molecule(Molecule::from_species(&a, vec![Point3::new(x, 1.0, 1.0)]));
        }
        let mut m = Molecule::from_species(&w, w.positions());
        m.set_centre(&Point3::new(1.5, 2.0, 1.0));
        cfg.add_molecule(m);
    }

    #[test]
    fn pick_filters_by_species_and_from() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        let all = h.add(NodeType::Pick, Some("All"), &[]);
        let argon = h.add(NodeType::Pick, Some("Ar"), &[("Species", &["Argon"]), ("From", &["All"])]);
        let none = h.add(NodeType::Pick, Some("None"), &[("Species", &["Water"]), ("From", &["Ar"])]);
        h.run().unwrap();
        assert_eq!(h.parameter(all, "nPicked"), ExpressionValue::Integer(4));
        assert_eq!(h.parameter(argon, "nPicked"), ExpressionValue::Integer(3));
        assert_eq!(h.parameter(none, "nPicked"), ExpressionValue::Integer(0));
    }

    #[test]
    fn proximity_counts_neighbours_within_distance() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        let close = h.add(
            NodeType::PickProximity,
            Some("Close"),
            &[
                ("Species", &["Argon"]),
                ("NearSpecies", &["Argon"]),
                ("Distance", &["0.0", "1.5"]),
                ("MinCount", &["1"]),
            ],
        );
        let lonely = h.add(
            NodeType::PickProximity,
            Some("Lonely"),
            &[
                ("Species", &["Argon"]),
                ("NearSpecies", &["Argon", "Water"]),
                ("Distance", &["0.0", "1.5"]),
                ("MinCount", &["0"]),
                ("MaxCount", &["0"]),
            ],
        );
        h.run().unwrap();
        assert_eq!(h.parameter(close, "nPicked"), ExpressionValue::Integer(2));
        assert_eq!(h.parameter(lonely, "nPicked"), ExpressionValue::Integer(1));
    }

    #[test]
    fn pick_region_keeps_molecules_inside_region() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        h.add(
            NodeType::CustomRegion,
            Some("Low"),
            &[("Expression", &["x"]), ("Minimum", &["0.0"]), ("Maximum", &["5.0"])],
        );
        let picked = h.add(NodeType::PickRegion, Some("InLow"), &[("Species", &["Argon"]), ("Region", &["Low"])]);
        h.run().unwrap();
        assert_eq!(h.parameter(picked, "nPicked"), ExpressionValue::Integer(2));
    }
}
