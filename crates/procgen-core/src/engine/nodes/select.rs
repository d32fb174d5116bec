use super::{NodeView, current_site, picked_molecules, set_count, set_state};
use crate::core::expression::ExpressionValue;
use crate::core::models::site::{Site, element_sites, species_sites};
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::ids::NodeId;
use crate::engine::keywords::{KeywordStore, KeywordValue, defaults};
use crate::engine::node::{NodeState, NodeType, PICK_NODES, SelectedSite};
use crate::engine::procedure::Procedure;
use crate::engine::sequence;
use tracing::info;

const SELECT: &[NodeType] = &[NodeType::Select];
const DYNAMIC_SITE: &[NodeType] = &[NodeType::DynamicSite];

pub(super) fn select_keywords() -> KeywordStore {
    KeywordStore::new()
        .add("Site", "Species sites to select", KeywordValue::SpeciesSites(Vec::new()))
        .add(
            "DynamicSite",
            "DynamicSite nodes generating additional sites",
            defaults::nodes(DYNAMIC_SITE, "dynamic site", None),
        )
        .add(
            "SameMoleculeAsSite",
            "Only select sites on the molecule of the current site of this selection",
            defaults::node(SELECT, "site"),
        )
        .add(
            "ExcludeSameMolecule",
            "Exclude sites on the molecules of the current sites of these selections",
            defaults::nodes(SELECT, "site", None),
        )
        .add(
            "ExcludeSameSite",
            "Exclude the current sites of these selections",
            defaults::nodes(SELECT, "site", None),
        )
        .add(
            "ReferenceSite",
            "Selection whose current site is the origin for InclusiveRange",
            defaults::node(SELECT, "site"),
        )
        .add(
            "InclusiveRange",
            "Distance window from the reference site within which sites are selected",
            defaults::range(0.0, 5.0),
        )
}

pub(super) fn dynamic_site_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "Element",
        "Elements whose atoms become sites",
        KeywordValue::Elements(Vec::new()),
    )
}

pub(super) fn iterate_keywords() -> KeywordStore {
    KeywordStore::new().add(
        "Selection",
        "Picked molecules to iterate over",
        defaults::node(PICK_NODES, "selection"),
    )
}

pub(super) fn prepare_select(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    let node = procedure.try_node(id)?;
    let has_sites = node.keywords().get_sites("Site").is_some_and(|s| !s.is_empty());
    let has_dynamic = node
        .keywords()
        .get_nodes("DynamicSite")
        .is_some_and(|l| !l.targets.is_empty());
    if !has_sites && !has_dynamic {
        return Err(node.keyword_error("Site", "no species sites or dynamic sites defined"));
    }
    Ok(())
}

pub(super) fn execute_dynamic_site(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let sites = {
        let node = procedure.try_node(id)?;
        let elements = node
            .keywords()
            .get_elements("Element")
            .filter(|e| !e.is_empty())
            .ok_or_else(|| node.keyword_missing("Element"))?;
        element_sites(&ctx.configuration.borrow(), elements)
    };
    set_state(procedure, id, NodeState::Sites(sites))
}

fn generated_sites(procedure: &Procedure, id: NodeId) -> &[Site] {
    match procedure.node(id).map(|n| n.state()) {
        Some(NodeState::Sites(sites)) => sites,
        _ => &[],
    }
}

/// Builds the site list, then runs the ForEach branch once per selected site.
///
/// Referenced DynamicSite nodes are regenerated first so that they reflect the
/// configuration as it is now. The last selected site stays current after the loop.
pub(super) fn execute_select(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let dynamic = NodeView::new(procedure, id)?.references("DynamicSite")?;
    for &d in &dynamic {
        execute_dynamic_site(procedure, d, ctx)?;
    }

    let (selected, n_available) = {
        let view = NodeView::new(procedure, id)?;
        let current = |keyword: &'static str, select: NodeId| {
            current_site(procedure, select)
                .ok_or_else(|| view.keyword_error(keyword, "referenced selection has no current site"))
        };

        let same_molecule = match view.reference("SameMoleculeAsSite")? {
            Some(s) => Some(current("SameMoleculeAsSite", s)?.molecule),
            None => None,
        };
        let excluded_molecules: Vec<_> = view
            .references("ExcludeSameMolecule")?
            .into_iter()
            .filter_map(|s| current_site(procedure, s))
            .map(|s| s.molecule)
            .collect();
        let excluded_sites: Vec<Site> = view
            .references("ExcludeSameSite")?
            .into_iter()
            .filter_map(|s| current_site(procedure, s))
            .collect();
        let window = match view.reference("ReferenceSite")? {
            Some(s) => Some((current("ReferenceSite", s)?, view.range("InclusiveRange")?)),
            None => None,
        };

        let configuration = ctx.configuration.borrow();
        let simbox = configuration.simbox();
        let accept = |site: &Site| {
            let molecule_ok = match same_molecule {
                Some(m) => site.molecule == m,
                None => !excluded_molecules.contains(&site.molecule),
            };
            let in_window = window.is_none_or(|(reference, (min, max))| {
                let r = simbox.minimum_distance(&reference.origin, &site.origin);
                r >= min && r <= max
            });
            molecule_ok && in_window && !excluded_sites.contains(site)
        };

        let mut stacks: Vec<Vec<Site>> = Vec::new();
        for reference in view.node().keywords().get_sites("Site").unwrap_or_default() {
            let species = ctx.engine.core().species(&reference.species).ok_or_else(|| {
                view.keyword_error("Site", format!("species '{}' is not defined", reference.species))
            })?;
            let stack = species_sites(&configuration, species, &reference.site).ok_or_else(|| {
                view.keyword_error(
                    "Site",
                    format!("species '{}' has no site '{}'", reference.species, reference.site),
                )
            })?;
            stacks.push(stack);
        }
        for &d in &dynamic {
            stacks.push(generated_sites(procedure, d).to_vec());
        }

        let mut selected = Vec::new();
        let mut site_index = 0;
        for stack in &stacks {
            for (i, site) in stack.iter().enumerate() {
                site_index += 1;
                if accept(site) {
                    selected.push(SelectedSite {
                        site: *site,
                        stack_index: i + 1,
                        site_index,
                    });
                }
            }
        }
        (selected, site_index)
    };

    let n_selected = selected.len();
    set_count(procedure, id, "nSelected", n_selected)?;
    let branch = {
        let node = procedure.try_node_mut(id)?;
        if let NodeState::Select(state) = &mut node.state {
            state.sites = selected.clone();
            state.current = None;
            state.n_selections += 1;
            state.n_available_sites += n_available as u64;
            state.n_cumulative_sites += n_selected as u64;
        }
        node.branch()
    };

    for (index, selection) in selected.iter().enumerate() {
        {
            let node = procedure.try_node_mut(id)?;
            if let NodeState::Select(state) = &mut node.state {
                state.current = Some(selection.site);
            }
            node.set_parameter("siteIndex", ExpressionValue::Integer(selection.site_index as i64));
            node.set_parameter("stackIndex", ExpressionValue::Integer(selection.stack_index as i64));
            node.set_parameter("index", ExpressionValue::Integer(index as i64 + 1));
        }
        if let Some(branch) = branch {
            sequence::execute_sequence(procedure, branch, ctx)?;
        }
    }
    Ok(())
}

pub(super) fn finalise_select(procedure: &mut Procedure, id: NodeId) -> Result<(), NodeError> {
    let node = procedure.try_node(id)?;
    if let NodeState::Select(state) = node.state() {
        let average = state.average_sites();
        info!(
            node = %node.label(),
            selections = state.n_selections,
            last_selection = state.sites.len(),
            average_sites = %format!("{:.2}", average),
            cumulative_sites = state.n_cumulative_sites,
            "Selection summary"
        );
    }
    Ok(())
}

/// Runs the ForEach branch once per molecule of the referenced selection.
pub(super) fn execute_iterate(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let molecules = {
        let view = NodeView::new(procedure, id)?;
        let selection = view.required_reference("Selection")?;
        picked_molecules(procedure, selection)
    };
    set_count(procedure, id, "nSelected", molecules.len())?;
    let branch = procedure.try_node(id)?.branch();

    for (index, molecule) in molecules.into_iter().enumerate() {
        {
            let node = procedure.try_node_mut(id)?;
            node.state = NodeState::Iterate(Some(molecule));
            node.set_parameter("index", ExpressionValue::Integer(index as i64 + 1));
        }
        if let Some(branch) = branch {
            sequence::execute_sequence(procedure, branch, ctx)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::core::models::configuration::Molecule;
    use crate::core::models::species::test_species::{argon, water};
    use crate::engine::node::NodeUsage;
    use nalgebra::{Point3, Vector3};

    fn populate(h: &Harness) {
        let mut cfg = h.configuration.borrow_mut();
        cfg.set_simbox(crate::core::models::simbox::SimBox::cubic(20.0));
        let w = water();
        for i in 0..3 {
            let mut m = Molecule::from_species(&w, w.positions());
            m.translate(&Vector3::new(2.0 + 4.0 * i as f64, 2.0, 2.0));
            cfg.add_molecule(m);
        }
        let a = argon();
        cfg.add_molecule(Molecule::from_species(&a, vec![Point3::new(3.0, 2.0, 2.0)]));
    }

    #[test]
    fn select_iterates_branch_once_per_site_with_indices() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        let select = h.add(NodeType::Select, Some("O"), &[("Site", &["Water", "O"])]);
        let params = h.add_in(select, NodeType::Parameters, None, &[]);
        h.procedure.add_parameter(params, "last", "O.index").unwrap();
        h.run().unwrap();

        assert_eq!(h.parameter(select, "nSelected"), ExpressionValue::Integer(3));
        assert_eq!(h.parameter(select, "index"), ExpressionValue::Integer(3));
        assert_eq!(h.procedure.node(params).unwrap().stats().executions, 3);
        assert_eq!(
            h.procedure.node(params).unwrap().parameters()[0].value(),
            ExpressionValue::Integer(3)
        );
    }

    #[test]
    fn nodes_after_a_select_see_its_final_counts() {
        let mut h = Harness::new(NodeUsage::Analysis);
        {
            let mut cfg = h.configuration.borrow_mut();
            cfg.set_simbox(crate::core::models::simbox::SimBox::cubic(20.0));
            let a = argon();
            for x in [2.0, 6.0, 10.0] {
                cfg.add_molecule(Molecule::from_species(&a, vec![Point3::new(x, 2.0, 2.0)]));
            }
        }
        let select = h.add(NodeType::Select, Some("A"), &[("Site", &["Argon", "Ar"])]);
        let inner = h.add_in(select, NodeType::Parameters, None, &[("Parameter", &["last", "A.index"])]);
        let after = h.add(NodeType::Parameters, None, &[("Parameter", &["n", "A.nSelected*10"])]);
        h.run().unwrap();

        assert_eq!(h.parameter(inner, "last"), ExpressionValue::Integer(3));
        assert_eq!(h.parameter(after, "n"), ExpressionValue::Integer(30));
        assert_eq!(h.procedure.node(inner).unwrap().stats().executions, 3);
        assert_eq!(h.procedure.node(after).unwrap().stats().executions, 1);
    }

    #[test]
    fn exclude_same_molecule_skips_the_outer_molecule() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        let outer = h.add(NodeType::Select, Some("A"), &[("Site", &["Water", "O"])]);
        let inner = h.add_in(
            outer,
            NodeType::Select,
            Some("B"),
            &[("Site", &["Water", "COG"]), ("ExcludeSameMolecule", &["A"])],
        );
        h.run().unwrap();

        assert_eq!(h.parameter(inner, "nSelected"), ExpressionValue::Integer(2));
        let NodeState::Select(state) = h.procedure.node(inner).unwrap().state() else {
            panic!("select state expected");
        };
        assert_eq!(state.n_selections, 3);
        assert_eq!(state.n_cumulative_sites, 6);
    }

    #[test]
    fn inclusive_range_limits_sites_around_reference() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        let reference = h.add(NodeType::Select, Some("Ar"), &[("Site", &["Argon", "Ar"])]);
        let near = h.add_in(
            reference,
            NodeType::Select,
            Some("Near"),
            &[
                ("Site", &["Water", "O"]),
                ("ReferenceSite", &["Ar"]),
                ("InclusiveRange", &["0.0", "2.0"]),
            ],
        );
        h.run().unwrap();
        assert_eq!(h.parameter(near, "nSelected"), ExpressionValue::Integer(1));
    }

    #[test]
    fn dynamic_sites_follow_element_filter() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        h.add(NodeType::DynamicSite, Some("Hydrogens"), &[("Element", &["H"])]);
        let select = h.add(NodeType::Select, Some("H"), &[("DynamicSite", &["Hydrogens"])]);
        h.run().unwrap();
        assert_eq!(h.parameter(select, "nSelected"), ExpressionValue::Integer(6));
    }

    #[test]
    fn select_without_site_source_fails_in_prepare() {
        let mut h = Harness::new(NodeUsage::Generation);
        h.add(NodeType::Select, Some("Empty"), &[]);
        let err = h.run().unwrap_err();
        assert_eq!(err.phase, Some(crate::engine::error::Phase::Prepare));
        assert_eq!(err.keyword, Some("Site"));
    }

    #[test]
    fn iterate_selection_visits_each_picked_molecule() {
        let mut h = Harness::new(NodeUsage::Generation);
        populate(&h);
        h.add(NodeType::Pick, Some("Waters"), &[("Species", &["Water"])]);
        let iterate = h.add(NodeType::IterateSelection, Some("Each"), &[("Selection", &["Waters"])]);
        let body = h.add_in(iterate, NodeType::Sequence, None, &[]);
        h.run().unwrap();
        assert_eq!(h.parameter(iterate, "nSelected"), ExpressionValue::Integer(3));
        assert_eq!(h.procedure.node(body).unwrap().stats().executions, 3);
    }
}
