use crate::core::data::CoreData;
use crate::engine::error::ProcedureError;
use crate::engine::ids::SequenceId;
use crate::engine::node::{NodeType, NodeUsage};
use crate::engine::procedure::Procedure;
use toml::{Table, Value};

const TYPE_KEY: &str = "type";
const NAME_KEY: &str = "name";
const BRANCH_KEY: &str = "branch";

/// Converts a procedure to a tree of tables: `{ context, nodes = [ ... ] }`.
pub fn to_table(procedure: &Procedure) -> Table {
    let mut table = Table::new();
    table.insert(
        "context".into(),
        Value::String(procedure.context().name().to_string()),
    );
    table.insert(
        "nodes".into(),
        Value::Array(sequence_to_values(procedure, procedure.root())),
    );
    table
}

fn sequence_to_values(procedure: &Procedure, sequence: SequenceId) -> Vec<Value> {
    procedure
        .sequence_nodes(sequence)
        .into_iter()
        .filter_map(|id| procedure.node(id))
        .map(|node| {
            let mut table = Table::new();
            table.insert(TYPE_KEY.into(), Value::String(node.node_type().keyword().into()));
            if let Some(name) = node.name() {
                table.insert(NAME_KEY.into(), Value::String(name.into()));
            }
            for keyword in node.keywords().iter().filter(|k| k.is_set()) {
                if let Some(value) = keyword.value().to_toml() {
                    table.insert(keyword.name().into(), value);
                }
            }
            if let Some(branch) = node.branch() {
                let children = sequence_to_values(procedure, branch);
                if !children.is_empty() {
                    table.insert(BRANCH_KEY.into(), Value::Array(children));
                }
            }
            Value::Table(table)
        })
        .collect()
}

/// Rebuilds a procedure from the table form, with the same validation as the
/// text reader.
pub fn from_table(table: &Table, core: &CoreData) -> Result<Procedure, ProcedureError> {
    let context = match table.get("context") {
        Some(Value::String(s)) => NodeUsage::from_name(s).ok_or_else(|| {
            ProcedureError::Structure(format!("unrecognised procedure context '{}'", s))
        })?,
        Some(_) => {
            return Err(ProcedureError::Structure(
                "'context' must be a string".to_string(),
            ));
        }
        None => NodeUsage::Generation,
    };

    let mut procedure = Procedure::new(context);
    let root = procedure.root();
    if let Some(nodes) = table.get("nodes") {
        read_sequence(&mut procedure, root, nodes, core)?;
    }
    Ok(procedure)
}

fn read_sequence(
    procedure: &mut Procedure,
    sequence: SequenceId,
    nodes: &Value,
    core: &CoreData,
) -> Result<(), ProcedureError> {
    let Value::Array(items) = nodes else {
        return Err(ProcedureError::Structure(
            "a node list must be an array of tables".to_string(),
        ));
    };

    for item in items {
        let Value::Table(entry) = item else {
            return Err(ProcedureError::Structure(
                "each node must be a table".to_string(),
            ));
        };
        let node_type = match entry.get(TYPE_KEY) {
            Some(Value::String(t)) => {
                NodeType::from_keyword(t).ok_or_else(|| ProcedureError::UnknownNodeType(t.clone()))?
            }
            _ => {
                return Err(ProcedureError::Structure(
                    "node table is missing its 'type'".to_string(),
                ));
            }
        };
        let name = match entry.get(NAME_KEY) {
            Some(Value::String(n)) => Some(n.as_str()),
            Some(_) => {
                return Err(ProcedureError::Structure(format!(
                    "name of {} node must be a string",
                    node_type
                )));
            }
            None => None,
        };

        let id = procedure.append_node(sequence, node_type, name)?;
        for (key, value) in entry {
            if matches!(key.as_str(), TYPE_KEY | NAME_KEY | BRANCH_KEY) {
                continue;
            }
            procedure.set_keyword_toml(id, key, value, core)?;
        }

        if let Some(children) = entry.get(BRANCH_KEY) {
            let branch = procedure
                .node(id)
                .and_then(|n| n.branch())
                .ok_or_else(|| {
                    ProcedureError::Structure(format!("{} nodes do not own a branch", node_type))
                })?;
            read_sequence(procedure, branch, children, core)?;
        }
    }
    Ok(())
}

pub fn to_toml_string(procedure: &Procedure) -> Result<String, ProcedureError> {
    Ok(toml::to_string(&to_table(procedure))?)
}

pub fn from_toml_str(content: &str, core: &CoreData) -> Result<Procedure, ProcedureError> {
    let table: Table = toml::from_str(content)?;
    from_table(&table, core)
}
