use super::node::{NodeType, NodeUsage};
use crate::core::data::DataLoadError;
use crate::core::expression::ExpressionError;
use crate::core::io::histogram::HistogramExportError;
use crate::core::io::line_parser::LineParseError;
use crate::core::io::xyz::XyzError;
use std::fmt;
use thiserror::Error;

/// Errors raised while authoring or deserialising a procedure.
#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("Error on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: Box<ProcedureError>,
    },

    #[error("Unrecognised node type '{0}'")]
    UnknownNodeType(String),

    #[error("Unrecognised keyword '{keyword}' found while reading {node_type} node")]
    UnknownKeyword {
        keyword: String,
        node_type: NodeType,
    },

    #[error("Keyword '{keyword}' expects {expected} argument(s) but {found} were given")]
    ArgumentCount {
        keyword: String,
        expected: String,
        found: usize,
    },

    #[error("Invalid argument '{value}' given to {keyword} keyword: {reason}")]
    InvalidArgument {
        keyword: String,
        value: String,
        reason: String,
    },

    #[error("Unrecognised {kind} reference '{name}' given to {keyword} keyword")]
    UnresolvedReference {
        keyword: String,
        name: String,
        kind: &'static str,
    },

    #[error("A node named '{0}' already exists in this procedure")]
    DuplicateName(String),

    #[error("{0} nodes must be given a name")]
    MissingName(NodeType),

    #[error("{node_type} nodes are not allowed in a {context} sequence")]
    ContextNotAllowed {
        node_type: NodeType,
        context: NodeUsage,
    },

    #[error("Invalid expression '{text}': {source}")]
    Expression {
        text: String,
        source: ExpressionError,
    },

    #[error(transparent)]
    Line(#[from] LineParseError),

    #[error("Unexpected end of input while looking for '{0}'")]
    UnexpectedEnd(String),

    #[error("Malformed procedure: {0}")]
    Structure(String),

    #[error("Node handle does not refer to a node in this procedure")]
    InvalidNode,

    #[error("Sequence handle does not refer to a sequence in this procedure")]
    InvalidSequence,

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML writing error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl ProcedureError {
    /// Attaches a line number, unless one is already present.
    pub(crate) fn at_line(self, line: usize) -> Self {
        match self {
            ProcedureError::Parse { .. } => self,
            other => ProcedureError::Parse {
                line,
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any line-number wrapping removed.
    pub fn root_cause(&self) -> &ProcedureError {
        match self {
            ProcedureError::Parse { source, .. } => source.root_cause(),
            other => other,
        }
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            ProcedureError::Parse { line, .. } => Some(*line),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Prepare,
    Execute,
    Finalise,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prepare => "prepare",
            Phase::Execute => "execute",
            Phase::Finalise => "finalise",
        };
        f.write_str(name)
    }
}

fn node_label(node_type: &Option<NodeType>, name: &Option<String>) -> String {
    match (node_type, name) {
        (Some(t), Some(n)) => format!("{} node '{}'", t, n),
        (Some(t), None) => format!("{} node", t),
        (None, _) => "Detached node".to_string(),
    }
}

fn phase_suffix(phase: &Option<Phase>) -> String {
    phase.map(|p| format!(" during {}", p)).unwrap_or_default()
}

fn keyword_suffix(keyword: &Option<&'static str>) -> String {
    keyword.map(|k| format!(" (keyword {})", k)).unwrap_or_default()
}

/// A failure reported by a node during one of the execution phases.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "{} failed{}{}: {reason}",
    node_label(.node_type, .name),
    phase_suffix(.phase),
    keyword_suffix(.keyword)
)]
pub struct NodeError {
    pub node_type: Option<NodeType>,
    pub name: Option<String>,
    pub keyword: Option<&'static str>,
    pub phase: Option<Phase>,
    pub reason: String,
}

impl NodeError {
    pub fn new(node_type: NodeType, name: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            node_type: Some(node_type),
            name: name.map(str::to_string),
            keyword: None,
            phase: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn detached() -> Self {
        Self {
            node_type: None,
            name: None,
            keyword: None,
            phase: None,
            reason: "node handle is no longer valid".to_string(),
        }
    }

    pub fn with_keyword(mut self, keyword: &'static str) -> Self {
        self.keyword = Some(keyword);
        self
    }

    /// Records the phase, keeping any phase already recorded by a nested node.
    pub(crate) fn in_phase(mut self, phase: Phase) -> Self {
        if self.phase.is_none() {
            self.phase = Some(phase);
        }
        self
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Procedure error: {source}")]
    Procedure {
        #[from]
        source: ProcedureError,
    },

    #[error("Execution failed: {source}")]
    Node {
        #[from]
        source: NodeError,
    },

    #[error("Failed to load system data: {source}")]
    DataLoad {
        #[from]
        source: DataLoadError,
    },

    #[error("Coordinate file error: {source}")]
    Coordinates {
        #[from]
        source: XyzError,
    },

    #[error("Data export error: {source}")]
    Export {
        #[from]
        source: HistogramExportError,
    },
}
