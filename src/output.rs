use std::io::{self, Write};

use serde::Serialize;

use crate::app::UploadResult;
use crate::reconcile::Document;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_document(document: &Document) -> io::Result<()> {
        Self::print_json(document)
    }

    pub fn print_upload(result: &UploadResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
