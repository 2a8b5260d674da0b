use std::fs;
use std::io;
use std::path::Path;

use crate::error::FlowcellError;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Reads a whole input file, keeping a missing file distinct from other I/O failures.
/// A leading byte-order mark is dropped.
pub fn read_text(path: &Path) -> Result<String, FlowcellError> {
    let text = fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => FlowcellError::NotFound(path.to_path_buf()),
        _ => FlowcellError::Filesystem(format!("read {}: {err}", path.display())),
    })?;
    Ok(strip_byte_order_mark(&text).to_string())
}

pub fn strip_byte_order_mark(text: &str) -> &str {
    text.strip_prefix(BYTE_ORDER_MARK).unwrap_or(text)
}
