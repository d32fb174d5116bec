use crate::core::data::CoreData;
use crate::core::io::line_parser::{LineParser, ParsedLine};
use crate::engine::error::ProcedureError;
use crate::engine::ids::{NodeId, SequenceId};
use crate::engine::node::{NodeType, NodeUsage};
use crate::engine::procedure::Procedure;
use std::fmt::Write;
use tracing::debug;

const INDENT: &str = "  ";

fn quoted_name(name: &str) -> String {
    if name.contains('\'') {
        format!("\"{}\"", name)
    } else {
        format!("'{}'", name)
    }
}

/// Writes a procedure in the line-oriented text format.
///
/// The root block is opened and closed with the keyword of the procedure's usage
/// (e.g. `Generator` ... `EndGenerator`). Only keywords that have been set are
/// written; empty branches are omitted.
pub fn write_procedure(procedure: &Procedure) -> String {
    let keyword = procedure.context().root_keyword();
    let mut out = String::new();
    let _ = writeln!(out, "{}", keyword);
    write_sequence(procedure, procedure.root(), 1, &mut out);
    let _ = writeln!(out, "End{}", keyword);
    out
}

fn write_sequence(procedure: &Procedure, sequence: SequenceId, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    for id in procedure.sequence_nodes(sequence) {
        let Some(node) = procedure.node(id) else {
            continue;
        };
        let node_type = node.node_type();
        match node.name() {
            Some(name) => {
                let _ = writeln!(out, "{}{} {}", pad, node_type, quoted_name(name));
            }
            None => {
                let _ = writeln!(out, "{}{}", pad, node_type);
            }
        }

        for keyword in node.keywords().iter().filter(|k| k.is_set()) {
            for line in keyword.value().text_lines() {
                let _ = writeln!(out, "{}{}{} {}", pad, INDENT, keyword.name(), line);
            }
        }

        if let (Some(branch), Some(block)) = (node.branch(), node_type.branch_keyword()) {
            if !procedure.sequence_nodes(branch).is_empty() {
                let _ = writeln!(out, "{}{}{}", pad, INDENT, block);
                write_sequence(procedure, branch, depth + 2, out);
                let _ = writeln!(out, "{}{}End{}", pad, INDENT, block);
            }
        }

        let _ = writeln!(out, "{}End{}", pad, node_type);
    }
}

/// Reads a procedure from the text format, validating node names, keyword
/// arguments and references against `core` and the scope at each point.
///
/// # Errors
///
/// Any failure aborts the read; the error carries the line on which it occurred.
pub fn read_procedure(text: &str, core: &CoreData) -> Result<Procedure, ProcedureError> {
    let mut parser = LineParser::new(text);
    let first = next_line(&mut parser, "a procedure block")?;
    let usage = NodeUsage::from_root_keyword(first.keyword()).ok_or_else(|| {
        ProcedureError::Structure(format!(
            "expected a procedure block such as 'Generator' but found '{}'",
            first.keyword()
        ))
        .at_line(first.number)
    })?;

    let mut procedure = Procedure::new(usage);
    let root = procedure.root();
    let end = format!("End{}", usage.root_keyword());
    read_sequence(&mut parser, &mut procedure, root, &end, core)?;

    if let Some(extra) = parser.next_line()? {
        return Err(ProcedureError::Structure(format!(
            "unexpected '{}' after {}",
            extra.keyword(),
            end
        ))
        .at_line(extra.number));
    }

    debug!(context = %usage, nodes = procedure.n_nodes(), "Read procedure");
    Ok(procedure)
}

fn next_line(parser: &mut LineParser, expecting: &str) -> Result<ParsedLine, ProcedureError> {
    parser
        .next_line()?
        .ok_or_else(|| ProcedureError::UnexpectedEnd(expecting.to_string()))
}

/// Reads node blocks into `sequence` until `end` is found.
fn read_sequence(
    parser: &mut LineParser,
    procedure: &mut Procedure,
    sequence: SequenceId,
    end: &str,
    core: &CoreData,
) -> Result<(), ProcedureError> {
    loop {
        let line = next_line(parser, end)?;
        if line.keyword().eq_ignore_ascii_case(end) {
            return Ok(());
        }

        let node_type = NodeType::from_keyword(line.keyword()).ok_or_else(|| {
            ProcedureError::UnknownNodeType(line.keyword().to_string()).at_line(line.number)
        })?;
        let name = match line.arguments() {
            [] => None,
            [name] => Some(name.as_str()),
            more => {
                return Err(ProcedureError::ArgumentCount {
                    keyword: node_type.keyword().to_string(),
                    expected: "at most 1".to_string(),
                    found: more.len(),
                }
                .at_line(line.number));
            }
        };
        let id = procedure
            .append_node(sequence, node_type, name)
            .map_err(|e| e.at_line(line.number))?;
        read_node(parser, procedure, id, node_type, core)?;
    }
}

/// Reads the keyword lines and branch block of one node up to `End<Type>`.
fn read_node(
    parser: &mut LineParser,
    procedure: &mut Procedure,
    id: NodeId,
    node_type: NodeType,
    core: &CoreData,
) -> Result<(), ProcedureError> {
    let end = format!("End{}", node_type.keyword());
    loop {
        let line = next_line(parser, &end)?;
        let keyword = line.keyword();
        if keyword.eq_ignore_ascii_case(&end) {
            return Ok(());
        }

        if let Some(block) = node_type
            .branch_keyword()
            .filter(|b| b.eq_ignore_ascii_case(keyword))
        {
            if !line.arguments().is_empty() {
                return Err(ProcedureError::ArgumentCount {
                    keyword: block.to_string(),
                    expected: "0".to_string(),
                    found: line.arguments().len(),
                }
                .at_line(line.number));
            }
            let branch = procedure
                .node(id)
                .and_then(|n| n.branch())
                .ok_or(ProcedureError::InvalidNode)?;
            read_sequence(parser, procedure, branch, &format!("End{}", block), core)?;
            continue;
        }

        procedure
            .set_keyword(id, keyword, line.arguments(), core)
            .map_err(|e| e.at_line(line.number))?;
    }
}
