use std::path::Path;

use crate::error::FlowcellError;
use crate::flatten::flatten_file;
use crate::node::Node;

pub const FILE_NAMES: [&str; 2] = ["runParameters.xml", "RunParameters.xml"];

/// The run parameters file, flattened as a whole (`{"RunParameters": {..}}`).
#[derive(Debug, Clone, PartialEq)]
pub struct RunParameters {
    pub data: Node,
}

impl RunParameters {
    pub fn from_path(path: &Path) -> Result<Self, FlowcellError> {
        Ok(Self {
            data: flatten_file(path)?,
        })
    }
}
