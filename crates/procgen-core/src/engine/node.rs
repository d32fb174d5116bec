use super::error::NodeError;
use super::ids::SequenceId;
use super::keywords::KeywordStore;
use crate::core::expression::{ExpressionValue, ExpressionVariable};
use crate::core::models::data1d::Data1D;
use crate::core::models::histogram::Histogram1D;
use crate::core::models::ids::MoleculeId;
use crate::core::models::region::Region;
use crate::core::models::site::Site;
use nalgebra::Point3;
use phf::phf_map;
use std::fmt;

/// The closed set of node kinds a procedure may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    Add,
    AddPair,
    Box,
    CalculateAngle,
    CalculateDistance,
    Collect,
    CoordinateSets,
    Copy,
    CustomRegion,
    CylindricalGlobalPotential,
    CylindricalRegion,
    DynamicSite,
    GeneralRegion,
    ImportCoordinates,
    IterateSelection,
    OperateExpression,
    OperateNumberDensityNormalise,
    OperateSitePopulationNormalise,
    OperateSphericalShellNormalise,
    Parameters,
    Pick,
    PickProximity,
    PickRegion,
    Process1D,
    RegionalGlobalPotential,
    Remove,
    RestraintPotential,
    RotateFragment,
    Select,
    Sequence,
    SizeFactor,
    SphericalGlobalPotential,
    Temperature,
    Transmute,
}

static NODE_TYPES: phf::Map<&'static str, NodeType> = phf_map! {
    "add" => NodeType::Add,
    "addpair" => NodeType::AddPair,
    "box" => NodeType::Box,
    "calculateangle" => NodeType::CalculateAngle,
    "calculatedistance" => NodeType::CalculateDistance,
    "collect" => NodeType::Collect,
    "coordinatesets" => NodeType::CoordinateSets,
    "copy" => NodeType::Copy,
    "customregion" => NodeType::CustomRegion,
    "cylindricalglobalpotential" => NodeType::CylindricalGlobalPotential,
    "cylindricalregion" => NodeType::CylindricalRegion,
    "dynamicsite" => NodeType::DynamicSite,
    "generalregion" => NodeType::GeneralRegion,
    "importcoordinates" => NodeType::ImportCoordinates,
    "iterateselection" => NodeType::IterateSelection,
    "operateexpression" => NodeType::OperateExpression,
    "operatenumberdensitynormalise" => NodeType::OperateNumberDensityNormalise,
    "operatesitepopulationnormalise" => NodeType::OperateSitePopulationNormalise,
    "operatesphericalshellnormalise" => NodeType::OperateSphericalShellNormalise,
    "parameters" => NodeType::Parameters,
    "pick" => NodeType::Pick,
    "pickproximity" => NodeType::PickProximity,
    "pickregion" => NodeType::PickRegion,
    "process1d" => NodeType::Process1D,
    "regionalglobalpotential" => NodeType::RegionalGlobalPotential,
    "remove" => NodeType::Remove,
    "restraintpotential" => NodeType::RestraintPotential,
    "rotatefragment" => NodeType::RotateFragment,
    "select" => NodeType::Select,
    "sequence" => NodeType::Sequence,
    "sizefactor" => NodeType::SizeFactor,
    "sphericalglobalpotential" => NodeType::SphericalGlobalPotential,
    "temperature" => NodeType::Temperature,
    "transmute" => NodeType::Transmute,
};

/// Node kinds that produce a molecule selection.
pub const PICK_NODES: &[NodeType] = &[NodeType::Pick, NodeType::PickProximity, NodeType::PickRegion];

/// Node kinds that describe a region of the box.
/// Node kinds that calculate a single observable from the current sites.
pub const CALCULATE_NODES: &[NodeType] = &[NodeType::CalculateAngle, NodeType::CalculateDistance];

pub const REGION_NODES: &[NodeType] = &[
    NodeType::CustomRegion,
    NodeType::CylindricalRegion,
    NodeType::GeneralRegion,
];

impl NodeType {
    pub fn keyword(&self) -> &'static str {
        match self {
            NodeType::Add => "Add",
            NodeType::AddPair => "AddPair",
            NodeType::Box => "Box",
            NodeType::CalculateAngle => "CalculateAngle",
            NodeType::CalculateDistance => "CalculateDistance",
            NodeType::Collect => "Collect",
            NodeType::CoordinateSets => "CoordinateSets",
            NodeType::Copy => "Copy",
            NodeType::CustomRegion => "CustomRegion",
            NodeType::CylindricalGlobalPotential => "CylindricalGlobalPotential",
            NodeType::CylindricalRegion => "CylindricalRegion",
            NodeType::DynamicSite => "DynamicSite",
            NodeType::GeneralRegion => "GeneralRegion",
            NodeType::ImportCoordinates => "ImportCoordinates",
            NodeType::IterateSelection => "IterateSelection",
            NodeType::OperateExpression => "OperateExpression",
            NodeType::OperateNumberDensityNormalise => "OperateNumberDensityNormalise",
            NodeType::OperateSitePopulationNormalise => "OperateSitePopulationNormalise",
            NodeType::OperateSphericalShellNormalise => "OperateSphericalShellNormalise",
            NodeType::Parameters => "Parameters",
            NodeType::Pick => "Pick",
            NodeType::PickProximity => "PickProximity",
            NodeType::PickRegion => "PickRegion",
            NodeType::Process1D => "Process1D",
            NodeType::RegionalGlobalPotential => "RegionalGlobalPotential",
            NodeType::Remove => "Remove",
            NodeType::RestraintPotential => "RestraintPotential",
            NodeType::RotateFragment => "RotateFragment",
            NodeType::Select => "Select",
            NodeType::Sequence => "Sequence",
            NodeType::SizeFactor => "SizeFactor",
            NodeType::SphericalGlobalPotential => "SphericalGlobalPotential",
            NodeType::Temperature => "Temperature",
            NodeType::Transmute => "Transmute",
        }
    }

    /// Case-insensitive lookup of a node type keyword.
    pub fn from_keyword(keyword: &str) -> Option<NodeType> {
        NODE_TYPES.get(keyword.to_ascii_lowercase().as_str()).copied()
    }

    pub fn usage(&self) -> NodeUsage {
        match self {
            NodeType::Parameters | NodeType::Sequence => NodeUsage::Control,
            NodeType::Select | NodeType::DynamicSite | NodeType::IterateSelection => NodeUsage::Any,
            NodeType::CalculateAngle
            | NodeType::CalculateDistance
            | NodeType::Collect
            | NodeType::Process1D => NodeUsage::Analysis,
            NodeType::OperateExpression
            | NodeType::OperateNumberDensityNormalise
            | NodeType::OperateSitePopulationNormalise
            | NodeType::OperateSphericalShellNormalise => NodeUsage::Operate,
            _ => NodeUsage::Generation,
        }
    }

    pub fn requires_name(&self) -> bool {
        matches!(
            self,
            NodeType::Select
                | NodeType::DynamicSite
                | NodeType::Pick
                | NodeType::PickProximity
                | NodeType::PickRegion
                | NodeType::CustomRegion
                | NodeType::CylindricalRegion
                | NodeType::GeneralRegion
                | NodeType::IterateSelection
                | NodeType::CoordinateSets
                | NodeType::Collect
                | NodeType::CalculateAngle
                | NodeType::CalculateDistance
                | NodeType::Process1D
        )
    }

    /// Keyword opening the node's branch block, for kinds that own a branch.
    pub fn branch_keyword(&self) -> Option<&'static str> {
        match self {
            NodeType::Select | NodeType::IterateSelection => Some("ForEach"),
            NodeType::Sequence => Some("Branch"),
            NodeType::Process1D => Some("Normalisation"),
            _ => None,
        }
    }

    /// Usage of the branch this kind owns when inserted into a sequence of `parent` usage.
    pub fn branch_usage(&self, parent: NodeUsage) -> NodeUsage {
        match self {
            NodeType::Process1D => NodeUsage::Operate,
            _ => parent,
        }
    }

    /// Base names of the parameters every node of this kind exposes.
    pub fn parameters(&self) -> &'static [&'static str] {
        match self {
            NodeType::Select => &["nSelected", "siteIndex", "stackIndex", "index"],
            NodeType::IterateSelection => &["nSelected", "index"],
            NodeType::Pick | NodeType::PickProximity | NodeType::PickRegion => &["nPicked"],
            NodeType::Remove => &["nRemoved"],
            NodeType::CoordinateSets => &["nSets"],
            NodeType::CalculateAngle | NodeType::CalculateDistance => &["value"],
            _ => &[],
        }
    }

    pub(crate) fn initial_state(&self) -> NodeState {
        match self {
            NodeType::Select => NodeState::Select(SelectState::default()),
            NodeType::DynamicSite => NodeState::Sites(Vec::new()),
            NodeType::IterateSelection => NodeState::Iterate(None),
            NodeType::Pick | NodeType::PickProximity | NodeType::PickRegion => {
                NodeState::Picked(Vec::new())
            }
            NodeType::CustomRegion | NodeType::CylindricalRegion | NodeType::GeneralRegion => {
                NodeState::Region(None)
            }
            NodeType::CoordinateSets => NodeState::CoordinateSets(Vec::new()),
            NodeType::Collect => NodeState::Collect(None),
            NodeType::CalculateAngle | NodeType::CalculateDistance => NodeState::Calculated(None),
            NodeType::Process1D => NodeState::Processed(None),
            _ => NodeState::None,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The contexts in which a sequence, and the nodes it accepts, may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeUsage {
    Generation,
    Analysis,
    Operate,
    Control,
    Any,
}

impl NodeUsage {
    pub const ALL: [NodeUsage; 5] = [
        NodeUsage::Generation,
        NodeUsage::Analysis,
        NodeUsage::Operate,
        NodeUsage::Control,
        NodeUsage::Any,
    ];

    /// Whether a sequence of this usage may contain a node of `node_usage`.
    pub fn accepts(&self, node_usage: NodeUsage) -> bool {
        *self == NodeUsage::Any
            || node_usage == NodeUsage::Any
            || node_usage == NodeUsage::Control
            || node_usage == *self
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeUsage::Generation => "generation",
            NodeUsage::Analysis => "analysis",
            NodeUsage::Operate => "operate",
            NodeUsage::Control => "control",
            NodeUsage::Any => "any",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.name().eq_ignore_ascii_case(name))
    }

    /// Keyword opening and naming a root sequence of this usage in the text format.
    pub fn root_keyword(&self) -> &'static str {
        match self {
            NodeUsage::Generation => "Generator",
            NodeUsage::Analysis => "Analyser",
            NodeUsage::Operate => "Operator",
            NodeUsage::Control => "Control",
            NodeUsage::Any => "Procedure",
        }
    }

    pub fn from_root_keyword(keyword: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|u| u.root_keyword().eq_ignore_ascii_case(keyword))
    }
}

impl fmt::Display for NodeUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-run counters kept for inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeRunStats {
    pub prepared: u64,
    pub executions: u64,
    pub finalised: u64,
    /// Whether the most recent execution in this run completed successfully.
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectedSite {
    pub site: Site,
    pub stack_index: usize,
    pub site_index: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectState {
    pub sites: Vec<SelectedSite>,
    pub current: Option<Site>,
    pub n_selections: u64,
    pub n_available_sites: u64,
    pub n_cumulative_sites: u64,
}

impl SelectState {
    /// Mean number of sites selected per selection, zero before any selection.
    pub fn average_sites(&self) -> f64 {
        if self.n_selections == 0 {
            0.0
        } else {
            self.n_cumulative_sites as f64 / self.n_selections as f64
        }
    }
}

/// Runtime data a node produces for later nodes, reset at `prepare`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum NodeState {
    #[default]
    None,
    Select(SelectState),
    Sites(Vec<Site>),
    Iterate(Option<MoleculeId>),
    Picked(Vec<MoleculeId>),
    Region(Option<Region>),
    CoordinateSets(Vec<Vec<Point3<f64>>>),
    Collect(Option<Histogram1D>),
    /// The observable for the current sites; `None` until calculated.
    Calculated(Option<f64>),
    Processed(Option<Data1D>),
}

/// One step of a procedure.
#[derive(Debug, Clone)]
pub struct Node {
    node_type: NodeType,
    name: Option<String>,
    pub(crate) keywords: KeywordStore,
    pub(crate) parameters: Vec<ExpressionVariable>,
    pub(crate) scope: Option<SequenceId>,
    pub(crate) branch: Option<SequenceId>,
    pub(crate) state: NodeState,
    pub(crate) stats: NodeRunStats,
}

impl Node {
    pub(crate) fn new(node_type: NodeType, name: Option<&str>, keywords: KeywordStore) -> Self {
        let name = name.filter(|n| !n.is_empty()).map(str::to_string);
        let prefix = match node_type {
            NodeType::Parameters => None,
            _ => name.as_deref(),
        };
        let parameters = node_type
            .parameters()
            .iter()
            .map(|base| {
                ExpressionVariable::new(base, ExpressionValue::Integer(0)).with_prefix(prefix)
            })
            .collect();
        Self {
            node_type,
            keywords,
            parameters,
            scope: None,
            branch: None,
            state: node_type.initial_state(),
            stats: NodeRunStats::default(),
            name,
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub(crate) fn set_name(&mut self, name: Option<&str>) {
        self.name = name.filter(|n| !n.is_empty()).map(str::to_string);
        if self.node_type != NodeType::Parameters {
            let prefix = self.name.clone();
            for p in &mut self.parameters {
                p.set_prefix(prefix.as_deref());
            }
        }
    }

    /// Case-insensitive name comparison. Unnamed nodes never match.
    pub fn has_name(&self, name: &str) -> bool {
        self.name
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn keywords(&self) -> &KeywordStore {
        &self.keywords
    }

    pub fn parameters(&self) -> &[ExpressionVariable] {
        &self.parameters
    }

    pub fn parameter(&self, base_name: &str) -> Option<&ExpressionVariable> {
        self.parameters.iter().find(|p| p.base_name() == base_name)
    }

    pub(crate) fn set_parameter(&mut self, base_name: &str, value: ExpressionValue) {
        if let Some(p) = self.parameters.iter_mut().find(|p| p.base_name() == base_name) {
            p.set_value(value);
        }
    }

    /// The sequence this node belongs to.
    pub fn scope(&self) -> Option<SequenceId> {
        self.scope
    }

    pub fn branch(&self) -> Option<SequenceId> {
        self.branch
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn stats(&self) -> NodeRunStats {
        self.stats
    }

    /// Label used in log messages, e.g. `Select 'S1'`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => format!("{} '{}'", self.node_type, n),
            None => self.node_type.to_string(),
        }
    }

    pub fn error(&self, reason: impl Into<String>) -> NodeError {
        NodeError::new(self.node_type, self.name(), reason)
    }

    pub fn keyword_error(&self, keyword: &'static str, reason: impl Into<String>) -> NodeError {
        self.error(reason).with_keyword(keyword)
    }

    pub(crate) fn keyword_missing(&self, keyword: &'static str) -> NodeError {
        self.keyword_error(keyword, "keyword has no value")
    }
}
