use super::error::ProcedureError;
use super::ids::NodeId;
use super::node::NodeType;
use super::node_value::NodeValue;
use super::procedure::Procedure;
use super::scope::ScopeVariables;
use crate::core::data::CoreData;
use crate::core::expression::{Expression, ExpressionError, ExpressionValue, ExpressionVariable};
use crate::core::io::line_parser::{quote, quote_if_needed};
use crate::core::models::elements::atomic_mass;

/// Everything a keyword needs to validate its arguments: the procedure for scope
/// lookups, the node being configured, and the species/configuration registry.
#[derive(Clone, Copy)]
pub struct ReadContext<'a> {
    pub procedure: &'a Procedure,
    pub node: NodeId,
    pub core: &'a CoreData,
}

impl<'a> ReadContext<'a> {
    fn variables(&self) -> ScopeVariables<'a> {
        ScopeVariables::new(self.procedure, self.node)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteReference {
    pub species: String,
    pub site: String,
}

/// A reference to another node, held by name and re-resolved through scope at use.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeReference {
    pub target: Option<String>,
    pub allowed: &'static [NodeType],
    pub kind: &'static str,
    /// Whether the target must be visible through scope, rather than anywhere in the procedure.
    pub scoped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeReferenceList {
    pub targets: Vec<String>,
    pub allowed: &'static [NodeType],
    pub kind: &'static str,
    pub max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDefinition {
    pub name: String,
    pub value: NodeValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue {
    Bool(bool),
    Text(Option<String>),
    Value(NodeValue),
    Vec3([NodeValue; 3]),
    Range(NodeValue, NodeValue),
    BinRange {
        minimum: NodeValue,
        maximum: NodeValue,
        width: NodeValue,
    },
    Option {
        options: &'static [&'static str],
        index: usize,
    },
    ValueOption {
        value: NodeValue,
        options: &'static [&'static str],
        index: usize,
    },
    Species(Option<String>),
    SpeciesVector(Vec<String>),
    SpeciesSites(Vec<SiteReference>),
    Node(NodeReference),
    NodeVector(NodeReferenceList),
    Elements(Vec<String>),
    /// An expression over the local variables `x`, `y` and `z`.
    Expression(Expression),
    Configuration(Option<String>),
    /// One definition per line; later lines add to or replace earlier ones.
    ParameterDefinitions(Vec<ParameterDefinition>),
}

fn expect_args(
    keyword: &str,
    args: &[String],
    min: usize,
    max: Option<usize>,
) -> Result<(), ProcedureError> {
    let ok = args.len() >= min && max.is_none_or(|m| args.len() <= m);
    if ok {
        return Ok(());
    }
    let expected = match max {
        Some(m) if m == min => min.to_string(),
        Some(m) => format!("{}-{}", min, m),
        None => format!("at least {}", min),
    };
    Err(ProcedureError::ArgumentCount {
        keyword: keyword.to_string(),
        expected,
        found: args.len(),
    })
}

fn parse_value(keyword: &str, text: &str, ctx: &ReadContext) -> Result<NodeValue, ProcedureError> {
    NodeValue::parse(text, &ctx.variables()).map_err(|source| match source {
        ExpressionError::InvalidNumber(_) => ProcedureError::InvalidArgument {
            keyword: keyword.to_string(),
            value: text.to_string(),
            reason: "not a finite number".to_string(),
        },
        source => ProcedureError::Expression {
            text: text.to_string(),
            source,
        },
    })
}

fn parse_bool(keyword: &str, text: &str) -> Result<bool, ProcedureError> {
    match text.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(ProcedureError::InvalidArgument {
            keyword: keyword.to_string(),
            value: text.to_string(),
            reason: "expected a boolean (true/false)".to_string(),
        }),
    }
}

fn parse_option(
    keyword: &str,
    text: &str,
    options: &'static [&'static str],
) -> Result<usize, ProcedureError> {
    options
        .iter()
        .position(|o| o.eq_ignore_ascii_case(text))
        .ok_or_else(|| ProcedureError::InvalidArgument {
            keyword: keyword.to_string(),
            value: text.to_string(),
            reason: format!("expected one of: {}", options.join(", ")),
        })
}

fn resolve_species(keyword: &str, name: &str, ctx: &ReadContext) -> Result<String, ProcedureError> {
    ctx.core
        .species(name)
        .map(|s| s.name.clone())
        .ok_or_else(|| ProcedureError::UnresolvedReference {
            keyword: keyword.to_string(),
            name: name.to_string(),
            kind: "species",
        })
}

fn resolve_node(
    keyword: &str,
    name: &str,
    allowed: &'static [NodeType],
    kind: &'static str,
    scoped: bool,
    ctx: &ReadContext,
) -> Result<String, ProcedureError> {
    ctx.procedure
        .resolve_reference(ctx.node, name, scoped, allowed)
        .and_then(|id| ctx.procedure.node(id))
        .and_then(|n| n.name().map(str::to_string))
        .ok_or_else(|| ProcedureError::UnresolvedReference {
            keyword: keyword.to_string(),
            name: name.to_string(),
            kind,
        })
}

fn is_parameter_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn expression_locals() -> Vec<ExpressionVariable> {
    ["x", "y", "z"]
        .into_iter()
        .map(|n| ExpressionVariable::new(n, ExpressionValue::Double(0.0)))
        .collect()
}

fn toml_scalar(keyword: &str, value: &toml::Value) -> Result<String, ProcedureError> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(format!("{:?}", f)),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => Err(ProcedureError::Structure(format!(
            "keyword '{}' expects scalar values but found {}",
            keyword,
            other.type_str()
        ))),
    }
}

fn toml_table_fields(
    keyword: &str,
    value: &toml::Value,
    fields: &[&str],
) -> Result<Vec<String>, ProcedureError> {
    let table = value.as_table().ok_or_else(|| {
        ProcedureError::Structure(format!("keyword '{}' expects an array of tables", keyword))
    })?;
    fields
        .iter()
        .map(|f| {
            table
                .get(*f)
                .ok_or_else(|| {
                    ProcedureError::Structure(format!(
                        "entry of keyword '{}' is missing field '{}'",
                        keyword, f
                    ))
                })
                .and_then(|v| toml_scalar(keyword, v))
        })
        .collect()
}

fn string_array(items: &[String]) -> toml::Value {
    toml::Value::Array(items.iter().cloned().map(toml::Value::String).collect())
}

impl KeywordValue {
    /// Parses text-format arguments into this value, validating names against
    /// `ctx`. The value is left untouched on error.
    pub fn read(
        &mut self,
        keyword: &str,
        args: &[String],
        ctx: &ReadContext,
    ) -> Result<(), ProcedureError> {
        match self {
            KeywordValue::Bool(b) => {
                expect_args(keyword, args, 1, Some(1))?;
                *b = parse_bool(keyword, &args[0])?;
            }
            KeywordValue::Text(t) => {
                expect_args(keyword, args, 1, Some(1))?;
                *t = Some(args[0].clone());
            }
            KeywordValue::Value(v) => {
                expect_args(keyword, args, 1, Some(1))?;
                *v = parse_value(keyword, &args[0], ctx)?;
            }
            KeywordValue::Vec3(v) => {
                expect_args(keyword, args, 3, Some(3))?;
                *v = [
                    parse_value(keyword, &args[0], ctx)?,
                    parse_value(keyword, &args[1], ctx)?,
                    parse_value(keyword, &args[2], ctx)?,
                ];
            }
            KeywordValue::Range(min, max) => {
                expect_args(keyword, args, 2, Some(2))?;
                let new_min = parse_value(keyword, &args[0], ctx)?;
                *max = parse_value(keyword, &args[1], ctx)?;
                *min = new_min;
            }
            KeywordValue::BinRange {
                minimum,
                maximum,
                width,
            } => {
                expect_args(keyword, args, 3, Some(3))?;
                let parsed = (
                    parse_value(keyword, &args[0], ctx)?,
                    parse_value(keyword, &args[1], ctx)?,
                    parse_value(keyword, &args[2], ctx)?,
                );
                (*minimum, *maximum, *width) = parsed;
            }
            KeywordValue::Option { options, index } => {
                expect_args(keyword, args, 1, Some(1))?;
                *index = parse_option(keyword, &args[0], *options)?;
            }
            KeywordValue::ValueOption {
                value,
                options,
                index,
            } => {
                expect_args(keyword, args, 1, Some(2))?;
                let new_index = match args.get(1) {
                    Some(option) => parse_option(keyword, option, *options)?,
                    None => *index,
                };
                *value = parse_value(keyword, &args[0], ctx)?;
                *index = new_index;
            }
            KeywordValue::Species(s) => {
                expect_args(keyword, args, 1, Some(1))?;
                *s = Some(resolve_species(keyword, &args[0], ctx)?);
            }
            KeywordValue::SpeciesVector(list) => {
                expect_args(keyword, args, 1, None)?;
                *list = args
                    .iter()
                    .map(|a| resolve_species(keyword, a, ctx))
                    .collect::<Result<_, _>>()?;
            }
            KeywordValue::SpeciesSites(list) => {
                expect_args(keyword, args, 2, None)?;
                if args.len() % 2 != 0 {
                    return Err(ProcedureError::ArgumentCount {
                        keyword: keyword.to_string(),
                        expected: "species/site pairs".to_string(),
                        found: args.len(),
                    });
                }
                let mut sites = Vec::with_capacity(args.len() / 2);
                for pair in args.chunks(2) {
                    let species = ctx.core.species(&pair[0]).ok_or_else(|| {
                        ProcedureError::UnresolvedReference {
                            keyword: keyword.to_string(),
                            name: pair[0].clone(),
                            kind: "species",
                        }
                    })?;
                    let site = species.site(&pair[1]).ok_or_else(|| {
                        ProcedureError::UnresolvedReference {
                            keyword: keyword.to_string(),
                            name: format!("{}/{}", pair[0], pair[1]),
                            kind: "species site",
                        }
                    })?;
                    sites.push(SiteReference {
                        species: species.name.clone(),
                        site: site.name.clone(),
                    });
                }
                *list = sites;
            }
            KeywordValue::Node(reference) => {
                expect_args(keyword, args, 1, Some(1))?;
                reference.target = Some(resolve_node(
                    keyword,
                    &args[0],
                    reference.allowed,
                    reference.kind,
                    reference.scoped,
                    ctx,
                )?);
            }
            KeywordValue::NodeVector(list) => {
                expect_args(keyword, args, 1, list.max)?;
                list.targets = args
                    .iter()
                    .map(|a| resolve_node(keyword, a, list.allowed, list.kind, true, ctx))
                    .collect::<Result<_, _>>()?;
            }
            KeywordValue::Elements(list) => {
                expect_args(keyword, args, 1, None)?;
                if let Some(bad) = args.iter().find(|a| atomic_mass(a).is_none()) {
                    return Err(ProcedureError::InvalidArgument {
                        keyword: keyword.to_string(),
                        value: bad.clone(),
                        reason: "unknown element symbol".to_string(),
                    });
                }
                *list = args.to_vec();
            }
            KeywordValue::Expression(e) => {
                expect_args(keyword, args, 1, Some(1))?;
                let locals = match e.locals() {
                    [] => expression_locals(),
                    declared => declared.to_vec(),
                };
                *e = Expression::with_locals(&args[0], locals, &ctx.variables())
                    .map_err(|source| ProcedureError::Expression {
                        text: args[0].clone(),
                        source,
                    })?;
            }
            KeywordValue::Configuration(c) => {
                expect_args(keyword, args, 1, Some(1))?;
                let cfg = ctx.core.configuration(&args[0]).ok_or_else(|| {
                    ProcedureError::UnresolvedReference {
                        keyword: keyword.to_string(),
                        name: args[0].clone(),
                        kind: "configuration",
                    }
                })?;
                *c = Some(cfg.name().to_string());
            }
            KeywordValue::ParameterDefinitions(list) => {
                expect_args(keyword, args, 2, Some(2))?;
                if !is_parameter_name(&args[0]) {
                    return Err(ProcedureError::InvalidArgument {
                        keyword: keyword.to_string(),
                        value: args[0].clone(),
                        reason: "parameter names must start with a letter and contain only letters, digits and underscores".to_string(),
                    });
                }
                let value = parse_value(keyword, &args[1], ctx)?;
                match list.iter_mut().find(|d| d.name == args[0]) {
                    Some(existing) => existing.value = value,
                    None => list.push(ParameterDefinition {
                        name: args[0].clone(),
                        value,
                    }),
                }
            }
        }
        Ok(())
    }

    /// The numeric values held by this keyword, for reference checking.
    pub fn node_values(&self) -> Vec<&NodeValue> {
        match self {
            KeywordValue::Value(v) | KeywordValue::ValueOption { value: v, .. } => vec![v],
            KeywordValue::Vec3(v) => v.iter().collect(),
            KeywordValue::Range(min, max) => vec![min, max],
            KeywordValue::BinRange {
                minimum,
                maximum,
                width,
            } => vec![minimum, maximum, width],
            KeywordValue::ParameterDefinitions(list) => list.iter().map(|d| &d.value).collect(),
            _ => Vec::new(),
        }
    }

    /// Argument strings for each output line of the text format. Empty when the
    /// value has nothing to write.
    pub fn text_lines(&self) -> Vec<String> {
        let line = match self {
            KeywordValue::Bool(b) => b.to_string(),
            KeywordValue::Text(Some(t)) => quote_if_needed(t),
            KeywordValue::Value(v) => v.to_argument(),
            KeywordValue::Vec3(v) => v
                .iter()
                .map(NodeValue::to_argument)
                .collect::<Vec<_>>()
                .join(" "),
            KeywordValue::Range(min, max) => format!("{} {}", min.to_argument(), max.to_argument()),
            KeywordValue::BinRange {
                minimum,
                maximum,
                width,
            } => format!(
                "{} {} {}",
                minimum.to_argument(),
                maximum.to_argument(),
                width.to_argument()
            ),
            KeywordValue::Option { options, index } => options[*index].to_string(),
            KeywordValue::ValueOption {
                value,
                options,
                index,
            } => format!("{} {}", value.to_argument(), options[*index]),
            KeywordValue::Species(Some(s)) | KeywordValue::Configuration(Some(s)) => {
                quote_if_needed(s)
            }
            KeywordValue::SpeciesVector(list) | KeywordValue::Elements(list)
                if !list.is_empty() =>
            {
                list.iter()
                    .map(|s| quote_if_needed(s))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
            KeywordValue::SpeciesSites(list) if !list.is_empty() => list
                .iter()
                .map(|s| format!("{} {}", quote_if_needed(&s.species), quote_if_needed(&s.site)))
                .collect::<Vec<_>>()
                .join(" "),
            KeywordValue::Node(NodeReference {
                target: Some(t), ..
            }) => quote_if_needed(t),
            KeywordValue::NodeVector(list) if !list.targets.is_empty() => list
                .targets
                .iter()
                .map(|s| quote_if_needed(s))
                .collect::<Vec<_>>()
                .join(" "),
            KeywordValue::Expression(e) if e.is_valid() => quote(e.text()),
            KeywordValue::ParameterDefinitions(list) => {
                return list
                    .iter()
                    .map(|d| format!("{} {}", d.name, d.value.to_argument()))
                    .collect();
            }
            _ => return Vec::new(),
        };
        vec![line]
    }

    /// The value in the structured format, or `None` if there is nothing to write.
    pub fn to_toml(&self) -> Option<toml::Value> {
        let value = match self {
            KeywordValue::Bool(b) => toml::Value::Boolean(*b),
            KeywordValue::Text(Some(t)) => toml::Value::String(t.clone()),
            KeywordValue::Value(v) => v.to_toml(),
            KeywordValue::Vec3(v) => toml::Value::Array(v.iter().map(NodeValue::to_toml).collect()),
            KeywordValue::Range(min, max) => toml::Value::Array(vec![min.to_toml(), max.to_toml()]),
            KeywordValue::BinRange {
                minimum,
                maximum,
                width,
            } => toml::Value::Array(vec![minimum.to_toml(), maximum.to_toml(), width.to_toml()]),
            KeywordValue::Option { options, index } => toml::Value::String(options[*index].to_string()),
            KeywordValue::ValueOption {
                value,
                options,
                index,
            } => toml::Value::Array(vec![
                value.to_toml(),
                toml::Value::String(options[*index].to_string()),
            ]),
            KeywordValue::Species(Some(s)) | KeywordValue::Configuration(Some(s)) => {
                toml::Value::String(s.clone())
            }
            KeywordValue::SpeciesVector(list) | KeywordValue::Elements(list)
                if !list.is_empty() =>
            {
                string_array(list)
            }
            KeywordValue::SpeciesSites(list) if !list.is_empty() => toml::Value::Array(
                list.iter()
                    .map(|s| {
                        let mut table = toml::Table::new();
                        table.insert("species".into(), toml::Value::String(s.species.clone()));
                        table.insert("site".into(), toml::Value::String(s.site.clone()));
                        toml::Value::Table(table)
                    })
                    .collect(),
            ),
            KeywordValue::Node(NodeReference {
                target: Some(t), ..
            }) => toml::Value::String(t.clone()),
            KeywordValue::NodeVector(list) if !list.targets.is_empty() => string_array(&list.targets),
            KeywordValue::Expression(e) if e.is_valid() => toml::Value::String(e.text().to_string()),
            KeywordValue::ParameterDefinitions(list) if !list.is_empty() => toml::Value::Array(
                list.iter()
                    .map(|d| {
                        let mut table = toml::Table::new();
                        table.insert("name".into(), toml::Value::String(d.name.clone()));
                        table.insert("value".into(), d.value.to_toml());
                        toml::Value::Table(table)
                    })
                    .collect(),
            ),
            _ => return None,
        };
        Some(value)
    }

    /// Converts a structured-format value into the argument lines that
    /// [`read`](Self::read) accepts, one read per returned line.
    pub fn toml_argument_lines(
        &self,
        keyword: &str,
        value: &toml::Value,
    ) -> Result<Vec<Vec<String>>, ProcedureError> {
        match (self, value) {
            (KeywordValue::ParameterDefinitions(_), toml::Value::Array(items)) => items
                .iter()
                .map(|item| toml_table_fields(keyword, item, &["name", "value"]))
                .collect(),
            (KeywordValue::SpeciesSites(_), toml::Value::Array(items)) => {
                let mut args = Vec::with_capacity(items.len() * 2);
                for item in items {
                    args.extend(toml_table_fields(keyword, item, &["species", "site"])?);
                }
                Ok(vec![args])
            }
            (_, toml::Value::Array(items)) => Ok(vec![
                items
                    .iter()
                    .map(|v| toml_scalar(keyword, v))
                    .collect::<Result<_, _>>()?,
            ]),
            (_, scalar) => Ok(vec![vec![toml_scalar(keyword, scalar)?]]),
        }
    }
}

/// A named, typed configuration value of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    name: &'static str,
    description: &'static str,
    value: KeywordValue,
    set: bool,
}

impl Keyword {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn value(&self) -> &KeywordValue {
        &self.value
    }

    /// Whether the keyword has been given a value explicitly. Only set keywords are written.
    pub fn is_set(&self) -> bool {
        self.set
    }

    pub(crate) fn assign(&mut self, value: KeywordValue) {
        self.value = value;
        self.set = true;
    }
}

/// The ordered keyword set of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordStore {
    keywords: Vec<Keyword>,
}

impl KeywordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: &'static str, description: &'static str, value: KeywordValue) -> Self {
        self.keywords.push(Keyword {
            name,
            description,
            value,
            set: false,
        });
        self
    }

    /// Case-insensitive lookup.
    pub fn find(&self, name: &str) -> Option<&Keyword> {
        self.keywords.iter().find(|k| k.name.eq_ignore_ascii_case(name))
    }

    pub(crate) fn find_mut(&mut self, name: &str) -> Option<&mut Keyword> {
        self.keywords
            .iter_mut()
            .find(|k| k.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter()
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.find(name).is_some_and(Keyword::is_set)
    }

    fn value(&self, name: &str) -> Option<&KeywordValue> {
        self.find(name).map(Keyword::value)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.value(name)? {
            KeywordValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        match self.value(name)? {
            KeywordValue::Text(t) => t.as_deref(),
            _ => None,
        }
    }

    pub fn get_value(&self, name: &str) -> Option<&NodeValue> {
        match self.value(name)? {
            KeywordValue::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_vec3(&self, name: &str) -> Option<&[NodeValue; 3]> {
        match self.value(name)? {
            KeywordValue::Vec3(v) => Some(v),
            _ => None,
        }
    }

    pub fn get_range(&self, name: &str) -> Option<(&NodeValue, &NodeValue)> {
        match self.value(name)? {
            KeywordValue::Range(min, max) => Some((min, max)),
            _ => None,
        }
    }

    pub fn get_bin_range(&self, name: &str) -> Option<(&NodeValue, &NodeValue, &NodeValue)> {
        match self.value(name)? {
            KeywordValue::BinRange {
                minimum,
                maximum,
                width,
            } => Some((minimum, maximum, width)),
            _ => None,
        }
    }

    pub fn get_option(&self, name: &str) -> Option<&'static str> {
        match self.value(name)? {
            KeywordValue::Option { options, index } => options.get(*index).copied(),
            _ => None,
        }
    }

    pub fn get_value_option(&self, name: &str) -> Option<(&NodeValue, &'static str)> {
        match self.value(name)? {
            KeywordValue::ValueOption {
                value,
                options,
                index,
            } => options.get(*index).map(|o| (value, *o)),
            _ => None,
        }
    }

    pub fn get_species(&self, name: &str) -> Option<&str> {
        match self.value(name)? {
            KeywordValue::Species(s) => s.as_deref(),
            _ => None,
        }
    }

    pub fn get_species_vector(&self, name: &str) -> Option<&[String]> {
        match self.value(name)? {
            KeywordValue::SpeciesVector(list) => Some(list),
            _ => None,
        }
    }

    pub fn get_sites(&self, name: &str) -> Option<&[SiteReference]> {
        match self.value(name)? {
            KeywordValue::SpeciesSites(list) => Some(list),
            _ => None,
        }
    }

    pub fn get_node(&self, name: &str) -> Option<&NodeReference> {
        match self.value(name)? {
            KeywordValue::Node(reference) => Some(reference),
            _ => None,
        }
    }

    pub fn get_nodes(&self, name: &str) -> Option<&NodeReferenceList> {
        match self.value(name)? {
            KeywordValue::NodeVector(list) => Some(list),
            _ => None,
        }
    }

    pub fn get_elements(&self, name: &str) -> Option<&[String]> {
        match self.value(name)? {
            KeywordValue::Elements(list) => Some(list),
            _ => None,
        }
    }

    pub fn get_expression(&self, name: &str) -> Option<&Expression> {
        match self.value(name)? {
            KeywordValue::Expression(e) if e.is_valid() => Some(e),
            _ => None,
        }
    }

    pub fn get_configuration(&self, name: &str) -> Option<&str> {
        match self.value(name)? {
            KeywordValue::Configuration(c) => c.as_deref(),
            _ => None,
        }
    }

    pub fn get_parameter_definitions(&self, name: &str) -> Option<&[ParameterDefinition]> {
        match self.value(name)? {
            KeywordValue::ParameterDefinitions(list) => Some(list),
            _ => None,
        }
    }
}

/// Keyword value helpers used when declaring node keyword sets.
pub(crate) mod defaults {
    use super::*;

    pub fn integer(v: i64) -> KeywordValue {
        KeywordValue::Value(NodeValue::Integer(v))
    }

    pub fn double(v: f64) -> KeywordValue {
        KeywordValue::Value(NodeValue::Double(v))
    }

    pub fn vec3(x: f64, y: f64, z: f64) -> KeywordValue {
        KeywordValue::Vec3([x.into(), y.into(), z.into()])
    }

    pub fn range(min: f64, max: f64) -> KeywordValue {
        KeywordValue::Range(min.into(), max.into())
    }

    pub fn option(options: &'static [&'static str], default: &str) -> KeywordValue {
        KeywordValue::Option {
            options,
            index: options.iter().position(|o| *o == default).unwrap_or(0),
        }
    }

    pub fn node(allowed: &'static [NodeType], kind: &'static str) -> KeywordValue {
        KeywordValue::Node(NodeReference {
            target: None,
            allowed,
            kind,
            scoped: true,
        })
    }

    /// A reference that may name a matching node anywhere in the procedure.
    pub fn node_anywhere(allowed: &'static [NodeType], kind: &'static str) -> KeywordValue {
        KeywordValue::Node(NodeReference {
            target: None,
            allowed,
            kind,
            scoped: false,
        })
    }

    pub fn nodes(allowed: &'static [NodeType], kind: &'static str, max: Option<usize>) -> KeywordValue {
        KeywordValue::NodeVector(NodeReferenceList {
            targets: Vec::new(),
            allowed,
            kind,
            max,
        })
    }

    pub fn expression() -> KeywordValue {
        KeywordValue::Expression(Expression::new())
    }

    /// An expression over the named local variables instead of `x`, `y` and `z`.
    pub fn expression_over(locals: &[&str]) -> KeywordValue {
        let mut expression = Expression::new();
        for name in locals {
            expression.add_local_variable(name, ExpressionValue::Double(0.0));
        }
        KeywordValue::Expression(expression)
    }
}

#[cfg(test)]
mod tests {
    use super::defaults::*;
    use super::*;
    use crate::core::models::species::test_species::{argon, water};
    use crate::engine::node::NodeUsage;

    fn core() -> CoreData {
        let mut core = CoreData::new();
        core.add_species(water()).unwrap();
        core.add_species(argon()).unwrap();
        core
    }

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn with_node<T>(f: impl FnOnce(&ReadContext) -> T) -> T {
        let mut procedure = Procedure::new(NodeUsage::Generation);
        let root = procedure.root();
        let id = procedure.append_node(root, NodeType::Box, None).unwrap();
        let core = core();
        let ctx = ReadContext {
            procedure: &procedure,
            node: id,
            core: &core,
        };
        f(&ctx)
    }

    #[test]
    fn value_keyword_accepts_literals_and_rejects_unknown_variables() {
        with_node(|ctx| {
            let mut v = integer(1);
            v.read("Population", &args(&["12"]), ctx).unwrap();
            assert_eq!(v, KeywordValue::Value(NodeValue::Integer(12)));

            let err = v.read("Population", &args(&["nWater*2"]), ctx).unwrap_err();
            assert!(matches!(err, ProcedureError::Expression { .. }));
            assert_eq!(v, KeywordValue::Value(NodeValue::Integer(12)));
        });
    }

    #[test]
    fn argument_count_is_checked() {
        with_node(|ctx| {
            let mut v = vec3(0.0, 0.0, 0.0);
            let err = v.read("Lengths", &args(&["1", "2"]), ctx).unwrap_err();
            assert!(matches!(
                err,
                ProcedureError::ArgumentCount { expected, found: 2, .. } if expected == "3"
            ));
        });
    }

    #[test]
    fn options_match_case_insensitively() {
        with_node(|ctx| {
            let mut v = option(&["Central", "Random"], "Random");
            v.read("Positioning", &args(&["central"]), ctx).unwrap();
            assert_eq!(v.text_lines(), vec!["Central"]);
            assert!(v.read("Positioning", &args(&["Nowhere"]), ctx).is_err());
        });
    }

    #[test]
    fn species_sites_are_validated_against_core_data() {
        with_node(|ctx| {
            let mut v = KeywordValue::SpeciesSites(Vec::new());
            v.read("Site", &args(&["water", "cog", "Argon", "Ar"]), ctx).unwrap();
            assert_eq!(v.text_lines(), vec!["Water COG Argon Ar"]);

            let err = v.read("Site", &args(&["Water", "N"]), ctx).unwrap_err();
            assert!(matches!(err, ProcedureError::UnresolvedReference { kind: "species site", .. }));
            assert!(v.read("Site", &args(&["Water"]), ctx).is_err());
        });
    }

    #[test]
    fn parameter_definitions_accumulate_one_per_line() {
        with_node(|ctx| {
            let mut v = KeywordValue::ParameterDefinitions(Vec::new());
            v.read("Parameter", &args(&["a", "3"]), ctx).unwrap();
            v.read("Parameter", &args(&["b", "2.5"]), ctx).unwrap();
            v.read("Parameter", &args(&["a", "4"]), ctx).unwrap();
            assert_eq!(v.text_lines(), vec!["a 4", "b 2.5"]);
            assert!(v.read("Parameter", &args(&["2x", "1"]), ctx).is_err());
        });
    }

    #[test]
    fn structured_values_convert_to_argument_lines() {
        let v = KeywordValue::ParameterDefinitions(Vec::new());
        let table: toml::Table =
            toml::from_str("p = [{ name = \"a\", value = 3 }, { name = \"b\", value = \"a*2\" }]")
                .unwrap();
        let value = table.get("p").unwrap().clone();
        let lines = v.toml_argument_lines("Parameter", &value).unwrap();
        assert_eq!(lines, vec![args(&["a", "3"]), args(&["b", "a*2"])]);

        let range = range(0.0, 1.0);
        let lines = range
            .toml_argument_lines("Distance", &toml::Value::Array(vec![
                toml::Value::Float(1.5),
                toml::Value::Integer(4),
            ]))
            .unwrap();
        assert_eq!(lines, vec![args(&["1.5", "4"])]);
    }

    #[test]
    fn unset_references_write_nothing() {
        assert!(node(&[NodeType::Select], "site").text_lines().is_empty());
        assert!(node(&[NodeType::Select], "site").to_toml().is_none());
        assert!(expression().text_lines().is_empty());
    }

    #[test]
    fn store_lookup_is_case_insensitive_and_typed() {
        let store = KeywordStore::new()
            .add("Rotate", "Randomly rotate", KeywordValue::Bool(true))
            .add("Population", "Number to add", integer(5));
        assert_eq!(store.get_bool("rotate"), Some(true));
        assert_eq!(store.get_value("POPULATION"), Some(&NodeValue::Integer(5)));
        assert_eq!(store.get_bool("Population"), None);
        assert!(!store.is_set("Rotate"));
    }
}
