use std::io::{BufRead, Write};

use crate::graph::{Graph, GraphBuilder, GraphError, NodeId};

const LINE_WIDTH: usize = 60;

struct PendingEdges {
    line: usize,
    from: String,
    targets: Vec<(f32, String)>,
}

/// Parse the graph text format.
///
/// `>name[:info]` opens a node, tab-free lines append sequence to it, and a
/// line containing tabs lists `src  w1  dst1  w2  dst2 ...`. Edge lines may
/// reference nodes defined further down; they are resolved once the whole
/// input has been read.
pub fn read_graph<R: BufRead>(reader: R) -> Result<Graph, GraphError> {
    let mut builder = GraphBuilder::new();
    let mut current: Option<NodeId> = None;
    let mut pending = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        if let Some(header) = line.strip_prefix('>') {
            let header = header.trim();
            let (name, info) = match header.split_once(':') {
                Some((name, info)) => (name, Some(info.to_string())),
                None => (header, None),
            };
            if name.is_empty() {
                return Err(parse_error(line_no, "node header without a name"));
            }
            current = Some(builder.add_node_with_info(name, info, b"")?);
        } else if line.contains('\t') {
            pending.push(parse_edge_line(line_no, line)?);
        } else {
            let id = current
                .ok_or_else(|| parse_error(line_no, "sequence line before the first node header"))?;
            builder.extend_node(id, line.trim().as_bytes())?;
        }
    }

    for edges in pending {
        let from = resolve(&builder, &edges.from)?;
        for (weight, target) in edges.targets {
            let to = resolve(&builder, &target)?;
            builder.add_edge(from, to, weight).map_err(|err| match err {
                GraphError::InvalidWeight { .. } => {
                    parse_error(edges.line, format!("edge weight {weight} outside [0, 1]"))
                }
                other => other,
            })?;
        }
    }

    builder.build()
}

/// Write `graph` in the text format understood by [`read_graph`].
pub fn write_graph<W: Write>(graph: &Graph, writer: &mut W) -> std::io::Result<()> {
    for node in graph.nodes() {
        match node.info() {
            Some(info) => writeln!(writer, ">{}:{}", node.name(), info)?,
            None => writeln!(writer, ">{}", node.name())?,
        }
        for chunk in node.sequence().chunks(LINE_WIDTH) {
            writer.write_all(chunk)?;
            writer.write_all(b"\n")?;
        }
    }

    for node in graph.nodes() {
        if node.next().is_empty() {
            continue;
        }
        write!(writer, "{}", node.name())?;
        for edge in node.next() {
            write!(writer, "\t{}\t{}", edge.weight, graph.node(edge.to).name())?;
        }
        writeln!(writer)?;
    }

    writer.flush()
}

fn parse_edge_line(line_no: usize, line: &str) -> Result<PendingEdges, GraphError> {
    let mut fields = line.split('\t').map(str::trim);
    let from = fields
        .next()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| parse_error(line_no, "edge line without a source node"))?
        .to_string();

    let rest: Vec<&str> = fields.filter(|field| !field.is_empty()).collect();
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(parse_error(
            line_no,
            "edge line must list weight/destination pairs",
        ));
    }

    let mut targets = Vec::with_capacity(rest.len() / 2);
    for pair in rest.chunks(2) {
        let weight: f32 = pair[0].parse().map_err(|_| {
            parse_error(line_no, format!("invalid edge weight '{}'", pair[0]))
        })?;
        targets.push((weight, pair[1].to_string()));
    }

    Ok(PendingEdges {
        line: line_no,
        from,
        targets,
    })
}

fn resolve(builder: &GraphBuilder, name: &str) -> Result<NodeId, GraphError> {
    builder.node_id(name).ok_or_else(|| GraphError::UnknownNode {
        name: name.to_string(),
    })
}

fn parse_error(line: usize, message: impl Into<String>) -> GraphError {
    GraphError::Parse {
        line,
        message: message.into(),
    }
}
