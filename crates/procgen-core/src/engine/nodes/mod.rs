//! # Node Kinds
//!
//! Keyword sets and phase behaviour for every node kind. Dispatch is an exhaustive
//! match over [`NodeType`], so adding a kind is checked everywhere it matters.
//!
//! - [`select`] - Site selection, dynamic sites and selection iteration
//! - [`pick`] - Molecule picking by species, proximity or region
//! - [`add`] - Molecule insertion and pre-generated coordinate sets
//! - [`region`] - Voxelised box regions
//! - [`potentials`] - External and restraint potentials
//! - [`modify`] - Removal, transmutation, fragment rotation, copying and coordinate import
//! - [`properties`] - Box, temperature and size factor
//! - [`control`] - Parameters and plain sequences
//! - [`calculate`] - Distance and angle observables between selected sites
//! - [`collect`] - Histogram accumulation of site observables
//! - [`process`] - Processing of collected histograms after a run
//! - [`operate`] - Normalisers for processed data

mod add;
mod calculate;
mod collect;
mod control;
mod modify;
mod operate;
mod pick;
mod potentials;
mod process;
mod properties;
mod region;
mod select;

use super::context::ProcedureContext;
use super::error::{NodeError, Phase};
use super::ids::NodeId;
use super::keywords::KeywordStore;
use super::node::{Node, NodeState, NodeType};
use super::node_value::NodeValue;
use super::procedure::Procedure;
use super::scope::ScopeVariables;
use crate::core::data::CoreData;
use crate::core::expression::ExpressionValue;
use crate::core::models::configuration::Configuration;
use crate::core::models::ids::MoleculeId;
use crate::core::models::region::Region;
use crate::core::models::site::Site;
use crate::core::models::species::Species;
use nalgebra::Vector3;
use tracing::trace;

/// The keyword set a freshly created node of `node_type` starts with.
pub(crate) fn keywords_for(node_type: NodeType) -> KeywordStore {
    match node_type {
        NodeType::Add => add::add_keywords(),
        NodeType::AddPair => add::add_pair_keywords(),
        NodeType::Box => properties::box_keywords(),
        NodeType::CalculateAngle => calculate::angle_keywords(),
        NodeType::CalculateDistance => calculate::distance_keywords(),
        NodeType::Collect => collect::keywords(),
        NodeType::CoordinateSets => add::coordinate_sets_keywords(),
        NodeType::Copy => modify::copy_keywords(),
        NodeType::CustomRegion => region::custom_keywords(),
        NodeType::CylindricalGlobalPotential => potentials::cylindrical_keywords(),
        NodeType::CylindricalRegion => region::cylindrical_keywords(),
        NodeType::DynamicSite => select::dynamic_site_keywords(),
        NodeType::GeneralRegion => region::general_keywords(),
        NodeType::ImportCoordinates => modify::import_keywords(),
        NodeType::IterateSelection => select::iterate_keywords(),
        NodeType::OperateExpression => operate::expression_keywords(),
        NodeType::OperateNumberDensityNormalise | NodeType::OperateSitePopulationNormalise => {
            operate::site_keywords()
        }
        NodeType::OperateSphericalShellNormalise => KeywordStore::new(),
        NodeType::Parameters => control::parameters_keywords(),
        NodeType::Pick => pick::pick_keywords(),
        NodeType::PickProximity => pick::proximity_keywords(),
        NodeType::PickRegion => pick::region_keywords(),
        NodeType::Process1D => process::keywords(),
        NodeType::RegionalGlobalPotential => potentials::regional_keywords(),
        NodeType::Remove => modify::remove_keywords(),
        NodeType::RestraintPotential => potentials::restraint_keywords(),
        NodeType::RotateFragment => modify::rotate_fragment_keywords(),
        NodeType::Select => select::select_keywords(),
        NodeType::Sequence => KeywordStore::new(),
        NodeType::SizeFactor => properties::size_factor_keywords(),
        NodeType::SphericalGlobalPotential => potentials::spherical_keywords(),
        NodeType::Temperature => properties::temperature_keywords(),
        NodeType::Transmute => modify::transmute_keywords(),
    }
}

/// Resets the node's run state, runs its kind-specific preparation, then prepares its branch.
pub(crate) fn prepare(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let node = procedure.try_node_mut(id)?;
    let node_type = node.node_type();
    node.stats.completed = false;
    node.stats.prepared += 1;
    node.state = node_type.initial_state();

    let result = match node_type {
        NodeType::Select => select::prepare_select(procedure, id),
        NodeType::Collect => collect::prepare(procedure, id),
        NodeType::Process1D => process::prepare(procedure, id),
        NodeType::Add
        | NodeType::AddPair
        | NodeType::Box
        | NodeType::CalculateAngle
        | NodeType::CalculateDistance
        | NodeType::CoordinateSets
        | NodeType::Copy
        | NodeType::CustomRegion
        | NodeType::CylindricalGlobalPotential
        | NodeType::CylindricalRegion
        | NodeType::DynamicSite
        | NodeType::GeneralRegion
        | NodeType::ImportCoordinates
        | NodeType::IterateSelection
        | NodeType::OperateExpression
        | NodeType::OperateNumberDensityNormalise
        | NodeType::OperateSitePopulationNormalise
        | NodeType::OperateSphericalShellNormalise
        | NodeType::Parameters
        | NodeType::Pick
        | NodeType::PickProximity
        | NodeType::PickRegion
        | NodeType::RegionalGlobalPotential
        | NodeType::Remove
        | NodeType::RestraintPotential
        | NodeType::RotateFragment
        | NodeType::Sequence
        | NodeType::SizeFactor
        | NodeType::SphericalGlobalPotential
        | NodeType::Temperature
        | NodeType::Transmute => Ok(()),
    };
    result.map_err(|e| e.in_phase(Phase::Prepare))?;

    if let Some(branch) = procedure.try_node(id)?.branch() {
        super::sequence::prepare_sequence(procedure, branch, ctx)?;
    }
    Ok(())
}

/// Executes the node. On success the node is marked as completed for this run.
pub(crate) fn execute(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let node = procedure.try_node_mut(id)?;
    let node_type = node.node_type();
    node.stats.completed = false;
    node.stats.executions += 1;
    trace!(node = %node.label(), "Executing node");

    let result = match node_type {
        NodeType::Add => add::execute_add(procedure, id, ctx),
        NodeType::AddPair => add::execute_add_pair(procedure, id, ctx),
        NodeType::Box => properties::execute_box(procedure, id, ctx),
        NodeType::CalculateAngle => calculate::execute_angle(procedure, id, ctx),
        NodeType::CalculateDistance => calculate::execute_distance(procedure, id, ctx),
        NodeType::Collect => collect::execute(procedure, id, ctx),
        NodeType::CoordinateSets => add::execute_coordinate_sets(procedure, id, ctx),
        NodeType::Copy => modify::execute_copy(procedure, id, ctx),
        NodeType::CustomRegion => region::execute_custom(procedure, id, ctx),
        NodeType::CylindricalGlobalPotential => potentials::execute_cylindrical(procedure, id, ctx),
        NodeType::CylindricalRegion => region::execute_cylindrical(procedure, id, ctx),
        NodeType::DynamicSite => select::execute_dynamic_site(procedure, id, ctx),
        NodeType::GeneralRegion => region::execute_general(procedure, id, ctx),
        NodeType::ImportCoordinates => modify::execute_import(procedure, id, ctx),
        NodeType::IterateSelection => select::execute_iterate(procedure, id, ctx),
        NodeType::OperateExpression => operate::execute_expression(procedure, id),
        NodeType::OperateNumberDensityNormalise => operate::execute_number_density(procedure, id, ctx),
        NodeType::OperateSitePopulationNormalise => operate::execute_site_population(procedure, id),
        NodeType::OperateSphericalShellNormalise => operate::execute_spherical_shell(procedure, id),
        NodeType::Parameters => control::execute_parameters(procedure, id),
        NodeType::Pick => pick::execute_pick(procedure, id, ctx),
        NodeType::PickProximity => pick::execute_proximity(procedure, id, ctx),
        NodeType::PickRegion => pick::execute_region(procedure, id, ctx),
        NodeType::Process1D => Ok(()),
        NodeType::RegionalGlobalPotential => potentials::execute_regional(procedure, id, ctx),
        NodeType::Remove => modify::execute_remove(procedure, id, ctx),
        NodeType::RestraintPotential => potentials::execute_restraint(procedure, id, ctx),
        NodeType::RotateFragment => modify::execute_rotate_fragment(procedure, id, ctx),
        NodeType::Select => select::execute_select(procedure, id, ctx),
        NodeType::Sequence => control::execute_sequence(procedure, id, ctx),
        NodeType::SizeFactor => properties::execute_size_factor(procedure, id, ctx),
        NodeType::SphericalGlobalPotential => potentials::execute_spherical(procedure, id, ctx),
        NodeType::Temperature => properties::execute_temperature(procedure, id, ctx),
        NodeType::Transmute => modify::execute_transmute(procedure, id, ctx),
    };
    result.map_err(|e| e.in_phase(Phase::Execute))?;

    procedure.try_node_mut(id)?.stats.completed = true;
    Ok(())
}

/// Finalises the node's branch and then the node itself. Nodes whose last
/// execution in this run did not complete are skipped.
pub(crate) fn finalise(
    procedure: &mut Procedure,
    id: NodeId,
    ctx: ProcedureContext,
) -> Result<(), NodeError> {
    let node = procedure.try_node(id)?;
    if !node.stats.completed {
        return Ok(());
    }
    let node_type = node.node_type();
    if let Some(branch) = node.branch() {
        super::sequence::finalise_sequence(procedure, branch, ctx)?;
    }

    let result = match node_type {
        NodeType::Select => select::finalise_select(procedure, id),
        NodeType::Collect => collect::finalise(procedure, id, ctx),
        NodeType::Process1D => process::finalise(procedure, id, ctx),
        NodeType::Add
        | NodeType::AddPair
        | NodeType::Box
        | NodeType::CalculateAngle
        | NodeType::CalculateDistance
        | NodeType::CoordinateSets
        | NodeType::Copy
        | NodeType::CustomRegion
        | NodeType::CylindricalGlobalPotential
        | NodeType::CylindricalRegion
        | NodeType::DynamicSite
        | NodeType::GeneralRegion
        | NodeType::ImportCoordinates
        | NodeType::IterateSelection
        | NodeType::OperateExpression
        | NodeType::OperateNumberDensityNormalise
        | NodeType::OperateSitePopulationNormalise
        | NodeType::OperateSphericalShellNormalise
        | NodeType::Parameters
        | NodeType::Pick
        | NodeType::PickProximity
        | NodeType::PickRegion
        | NodeType::RegionalGlobalPotential
        | NodeType::Remove
        | NodeType::RestraintPotential
        | NodeType::RotateFragment
        | NodeType::Sequence
        | NodeType::SizeFactor
        | NodeType::SphericalGlobalPotential
        | NodeType::Temperature
        | NodeType::Transmute => Ok(()),
    };
    result.map_err(|e| e.in_phase(Phase::Finalise))?;

    procedure.try_node_mut(id)?.stats.finalised += 1;
    Ok(())
}

/// Read access to one node's keywords, evaluated against its scope.
pub(super) struct NodeView<'a> {
    procedure: &'a Procedure,
    id: NodeId,
    node: &'a Node,
}

impl<'a> NodeView<'a> {
    pub(super) fn new(procedure: &'a Procedure, id: NodeId) -> Result<Self, NodeError> {
        Ok(Self {
            procedure,
            id,
            node: procedure.try_node(id)?,
        })
    }

    pub(super) fn node(&self) -> &'a Node {
        self.node
    }

    pub(super) fn variables(&self) -> ScopeVariables<'a> {
        ScopeVariables::new(self.procedure, self.id)
    }

    pub(super) fn error(&self, reason: impl Into<String>) -> NodeError {
        self.node.error(reason)
    }

    pub(super) fn keyword_error(&self, keyword: &'static str, reason: impl Into<String>) -> NodeError {
        self.node.keyword_error(keyword, reason)
    }

    fn evaluate(&self, keyword: &'static str, value: &NodeValue) -> Result<f64, NodeError> {
        value
            .as_double(&self.variables())
            .map_err(|e| self.keyword_error(keyword, e.to_string()))
    }

    pub(super) fn double(&self, keyword: &'static str) -> Result<f64, NodeError> {
        let value = self
            .node
            .keywords
            .get_value(keyword)
            .ok_or_else(|| self.node.keyword_missing(keyword))?;
        self.evaluate(keyword, value)
    }

    pub(super) fn integer(&self, keyword: &'static str) -> Result<i64, NodeError> {
        let value = self
            .node
            .keywords
            .get_value(keyword)
            .ok_or_else(|| self.node.keyword_missing(keyword))?;
        value
            .as_integer(&self.variables())
            .map_err(|e| self.keyword_error(keyword, e.to_string()))
    }

    pub(super) fn vec3(&self, keyword: &'static str) -> Result<Vector3<f64>, NodeError> {
        let v = self
            .node
            .keywords
            .get_vec3(keyword)
            .ok_or_else(|| self.node.keyword_missing(keyword))?;
        Ok(Vector3::new(
            self.evaluate(keyword, &v[0])?,
            self.evaluate(keyword, &v[1])?,
            self.evaluate(keyword, &v[2])?,
        ))
    }

    pub(super) fn range(&self, keyword: &'static str) -> Result<(f64, f64), NodeError> {
        let (min, max) = self
            .node
            .keywords
            .get_range(keyword)
            .ok_or_else(|| self.node.keyword_missing(keyword))?;
        Ok((self.evaluate(keyword, min)?, self.evaluate(keyword, max)?))
    }

    /// The density-style value with its chosen unit option.
    pub(super) fn value_option(&self, keyword: &'static str) -> Result<(f64, &'static str), NodeError> {
        let (value, option) = self
            .node
            .keywords
            .get_value_option(keyword)
            .ok_or_else(|| self.node.keyword_missing(keyword))?;
        Ok((self.evaluate(keyword, value)?, option))
    }

    pub(super) fn flag(&self, keyword: &'static str) -> bool {
        self.node.keywords.get_bool(keyword).unwrap_or(false)
    }

    pub(super) fn option(&self, keyword: &'static str) -> Result<&'static str, NodeError> {
        self.node
            .keywords
            .get_option(keyword)
            .ok_or_else(|| self.node.keyword_missing(keyword))
    }

    pub(super) fn text(&self, keyword: &'static str) -> Option<&'a str> {
        self.node.keywords.get_text(keyword)
    }

    pub(super) fn species_names(&self, keyword: &'static str) -> &'a [String] {
        self.node.keywords.get_species_vector(keyword).unwrap_or_default()
    }

    /// The species named by a single-species keyword, which must be set.
    pub(super) fn species<'c>(
        &self,
        keyword: &'static str,
        core: &'c CoreData,
    ) -> Result<&'c Species, NodeError> {
        let name = self
            .node
            .keywords
            .get_species(keyword)
            .ok_or_else(|| self.node.keyword_missing(keyword))?;
        core.species(name)
            .ok_or_else(|| self.keyword_error(keyword, format!("species '{}' is not defined", name)))
    }

    /// Re-resolves a node reference through scope. `Ok(None)` if the keyword is unset.
    pub(super) fn reference(&self, keyword: &'static str) -> Result<Option<NodeId>, NodeError> {
        let Some(reference) = self.node.keywords.get_node(keyword) else {
            return Ok(None);
        };
        let Some(target) = &reference.target else {
            return Ok(None);
        };
        self.resolve(keyword, target, reference.allowed, reference.scoped)
            .map(Some)
    }

    pub(super) fn required_reference(&self, keyword: &'static str) -> Result<NodeId, NodeError> {
        self.reference(keyword)?
            .ok_or_else(|| self.node.keyword_missing(keyword))
    }

    pub(super) fn references(&self, keyword: &'static str) -> Result<Vec<NodeId>, NodeError> {
        let Some(list) = self.node.keywords.get_nodes(keyword) else {
            return Ok(Vec::new());
        };
        list.targets
            .iter()
            .map(|t| self.resolve(keyword, t, list.allowed, true))
            .collect()
    }

    fn resolve(
        &self,
        keyword: &'static str,
        target: &str,
        allowed: &[NodeType],
        scoped: bool,
    ) -> Result<NodeId, NodeError> {
        self.procedure
            .resolve_reference(self.id, target, scoped, allowed)
            .ok_or_else(|| self.keyword_error(keyword, format!("node '{}' is no longer in scope", target)))
    }

    /// Molecules named by a species list and/or a Pick-family selection, in
    /// configuration order without duplicates.
    pub(super) fn chosen_molecules(
        &self,
        species_keyword: &'static str,
        selection_keyword: &'static str,
        configuration: &Configuration,
    ) -> Result<Vec<MoleculeId>, NodeError> {
        let species = self.species_names(species_keyword);
        let selection = self.reference(selection_keyword)?;
        if species.is_empty() && selection.is_none() {
            return Err(self.keyword_error(species_keyword, "no species or selection given"));
        }
        let picked = selection
            .map(|s| picked_molecules(self.procedure, s))
            .unwrap_or_default();
        Ok(configuration
            .molecules_iter()
            .filter(|(id, m)| {
                picked.contains(id) || species.iter().any(|s| s.eq_ignore_ascii_case(&m.species))
            })
            .map(|(id, _)| id)
            .collect())
    }
}

/// The site a Select node is currently positioned on.
pub(super) fn current_site(procedure: &Procedure, id: NodeId) -> Option<Site> {
    match procedure.node(id)?.state() {
        NodeState::Select(state) => state.current,
        _ => None,
    }
}

pub(super) fn picked_molecules(procedure: &Procedure, id: NodeId) -> Vec<MoleculeId> {
    match procedure.node(id).map(Node::state) {
        Some(NodeState::Picked(molecules)) => molecules.clone(),
        _ => Vec::new(),
    }
}

pub(super) fn region_of(procedure: &Procedure, id: NodeId) -> Option<&Region> {
    match procedure.node(id)?.state() {
        NodeState::Region(region) => region.as_ref(),
        _ => None,
    }
}

pub(super) fn set_state(procedure: &mut Procedure, id: NodeId, state: NodeState) -> Result<(), NodeError> {
    procedure.try_node_mut(id)?.state = state;
    Ok(())
}

pub(super) fn set_count(
    procedure: &mut Procedure,
    id: NodeId,
    parameter: &str,
    count: usize,
) -> Result<(), NodeError> {
    procedure
        .try_node_mut(id)?
        .set_parameter(parameter, ExpressionValue::Integer(count as i64));
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::core::models::species::test_species::{argon, water};
    use crate::engine::context::Engine;
    use crate::engine::node::NodeUsage;
    use crate::engine::pool::ProcessPool;
    use crate::engine::progress::ProgressReporter;
    use std::cell::RefCell;

    pub fn core() -> CoreData {
        let mut core = CoreData::new();
        core.add_species(water()).unwrap();
        core.add_species(argon()).unwrap();
        core
    }

    pub fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// A procedure under construction plus everything needed to run it.
    pub struct Harness {
        pub procedure: Procedure,
        pub configuration: RefCell<Configuration>,
        pub engine: Engine,
        pub pool: ProcessPool,
    }

    impl Harness {
        pub fn new(context: NodeUsage) -> Self {
            Self {
                procedure: Procedure::new(context),
                configuration: RefCell::new(Configuration::new("Test")),
                engine: Engine::new(core(), Some(7)),
                pool: ProcessPool::serial(),
            }
        }

        /// Appends a node to the root sequence and sets its keywords.
        pub fn add(&mut self, node_type: NodeType, name: Option<&str>, keywords: &[(&str, &[&str])]) -> NodeId {
            let root = self.procedure.root();
            let id = self.procedure.append_node(root, node_type, name).unwrap();
            self.set(id, keywords);
            id
        }

        pub fn add_in(
            &mut self,
            parent: NodeId,
            node_type: NodeType,
            name: Option<&str>,
            keywords: &[(&str, &[&str])],
        ) -> NodeId {
            let branch = self.procedure.node(parent).unwrap().branch().unwrap();
            let id = self.procedure.append_node(branch, node_type, name).unwrap();
            self.set(id, keywords);
            id
        }

        pub fn set(&mut self, id: NodeId, keywords: &[(&str, &[&str])]) {
            for (keyword, values) in keywords {
                self.procedure
                    .set_keyword(id, keyword, &args(values), self.engine.core())
                    .unwrap();
            }
        }

        pub fn run(&mut self) -> Result<(), NodeError> {
            let reporter = ProgressReporter::new();
            let ctx = ProcedureContext::new(&self.configuration, &self.pool, &self.engine, &reporter);
            self.procedure.run(ctx)
        }

        pub fn parameter(&self, id: NodeId, base: &str) -> ExpressionValue {
            self.procedure.node(id).unwrap().parameter(base).unwrap().value()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::engine::node::NodeUsage;

    #[test]
    fn failing_node_stops_the_sequence_and_is_not_finalised() {
        let mut h = Harness::new(NodeUsage::Generation);
        let first = h.add(NodeType::Temperature, None, &[("Temperature", &["250.0"])]);
        let failing = h.add(NodeType::SizeFactor, Some("Grow"), &[("SizeFactor", &["0.5"])]);
        let after = h.add(NodeType::Temperature, None, &[("Temperature", &["400.0"])]);

        let err = h.run().unwrap_err();
        assert_eq!(err.keyword, Some("SizeFactor"));
        assert_eq!(err.phase, Some(Phase::Execute));
        assert_eq!(err.name.as_deref(), Some("Grow"));

        let stats = |id| h.procedure.node(id).unwrap().stats();
        assert_eq!(stats(first).executions, 1);
        assert_eq!(stats(first).finalised, 1);
        assert_eq!(stats(failing).executions, 1);
        assert_eq!(stats(failing).finalised, 0);
        assert_eq!(stats(after).executions, 0);
        assert_eq!(stats(after).finalised, 0);
        assert_eq!(h.configuration.borrow().temperature(), 250.0);
    }

    #[test]
    fn every_phase_runs_once_per_node_on_success() {
        let mut h = Harness::new(NodeUsage::Generation);
        let seq = h.add(NodeType::Sequence, None, &[]);
        let inner = h.add_in(seq, NodeType::Temperature, None, &[("Temperature", &["10"])]);
        h.run().unwrap();
        let stats = h.procedure.node(inner).unwrap().stats();
        assert_eq!((stats.prepared, stats.executions, stats.finalised), (1, 1, 1));
        assert!(stats.completed);
    }

    #[test]
    fn references_that_left_scope_fail_at_execution() {
        let mut h = Harness::new(NodeUsage::Generation);
        h.add(NodeType::Pick, Some("P"), &[("Species", &["Water"])]);
        let remove = h.add(NodeType::Remove, None, &[("Selection", &["P"])]);
        let root = h.procedure.root();
        h.procedure.move_node(remove, root, 0).unwrap();

        let err = h.run().unwrap_err();
        assert_eq!(err.keyword, Some("Selection"));
        assert!(err.reason.contains("no longer in scope"));
    }
}
