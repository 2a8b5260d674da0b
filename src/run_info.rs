use std::path::Path;

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::FlowcellError;
use crate::flatten::flatten_str;
use crate::fs_util::read_text;
use crate::node::Node;

const COMPONENT: &str = "run_info";

#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    /// The `Run` element, with `Reads` always a list of read attribute maps.
    pub data: Node,
    /// `<n>x<cycles>` over the non-indexed reads.
    pub recipe: Option<String>,
}

impl RunInfo {
    pub fn parse(
        text: &str,
        input: &str,
        sink: &dyn DiagnosticSink,
    ) -> Result<Self, FlowcellError> {
        let flattened = flatten_str(text, input)?;
        let run = flattened
            .path(&["RunInfo", "Run"])
            .and_then(Node::as_map)
            .ok_or_else(|| FlowcellError::format(input, "missing RunInfo/Run element"))?;

        let mut data = run.clone();
        let reads = run
            .get("Reads")
            .and_then(|reads| reads.get("Read"))
            .map(|read| read.as_items().to_vec())
            .unwrap_or_default();
        let recipe = derive_recipe(&reads, sink);
        data.insert("Reads".to_string(), Node::List(reads));

        Ok(Self {
            data: Node::Map(data),
            recipe,
        })
    }

    pub fn from_path(path: &Path, sink: &dyn DiagnosticSink) -> Result<Self, FlowcellError> {
        let text = read_text(path)?;
        Self::parse(&text, &path.display().to_string(), sink)
    }

    pub fn reads(&self) -> &[Node] {
        self.data.get("Reads").map(Node::as_items).unwrap_or(&[])
    }

    pub fn flowcell(&self) -> Option<&str> {
        self.data.get("Flowcell").and_then(Node::as_str)
    }
}

/// Summarises the read layout as `<n>x<cycles>`, counting only non-indexed reads.
///
/// The first non-indexed cycle count is authoritative; later reads that
/// disagree are reported as warnings. Returns `None` when there is no
/// non-indexed read.
pub fn derive_recipe(reads: &[Node], sink: &dyn DiagnosticSink) -> Option<String> {
    let mut count = 0usize;
    let mut cycles: Option<&str> = None;

    for read in reads {
        let indexed = read.get("IsIndexedRead").and_then(Node::as_str);
        if indexed != Some("N") {
            continue;
        }
        count += 1;
        let read_cycles = read
            .get("NumCycles")
            .and_then(Node::as_str)
            .map(str::trim)
            .unwrap_or_default();
        match cycles {
            None => cycles = Some(read_cycles),
            Some(first) if first != read_cycles => {
                let number = read.get("Number").and_then(Node::as_str).unwrap_or("?");
                sink.event(DiagnosticEvent::warning(
                    COMPONENT,
                    format!(
                        "read {number} has {read_cycles} cycles, expected {first}; keeping {first}"
                    ),
                ));
            }
            Some(_) => {}
        }
    }

    cycles.map(|cycles| format!("{count}x{cycles}"))
}
