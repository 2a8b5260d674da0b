use camino::Utf8Path;
use serde::Serialize;

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::FlowcellError;
use crate::reconcile::{Applied, Document, DocumentStore, document_name, upsert};
use crate::run::RunFolder;

const COMPONENT: &str = "app";

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    /// Replace a differing stored document with the candidate instead of merging.
    pub overwrite: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub name: String,
    pub action: String,
    pub id: Option<String>,
}

impl UploadResult {
    fn from_applied(name: String, applied: Applied) -> Self {
        let (action, id) = match applied {
            Applied::Created { id } => ("create", Some(id)),
            Applied::Replaced { id } => ("replace", Some(id)),
            Applied::Unchanged => ("unchanged", None),
        };
        Self {
            name,
            action: action.to_string(),
            id,
        }
    }
}

pub struct App<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> App<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Parses a run folder into its document without touching the store.
    pub fn parse_run(
        &self,
        path: &Utf8Path,
        sink: &dyn DiagnosticSink,
    ) -> Result<Document, FlowcellError> {
        let folder = RunFolder::open(path)?;
        sink.event(DiagnosticEvent::info(
            COMPONENT,
            format!("parsing run {} from {}", folder.name(), folder.root()),
        ));
        Ok(folder.parse(sink)?.to_document())
    }

    pub fn upload(
        &self,
        path: &Utf8Path,
        options: UploadOptions,
        sink: &dyn DiagnosticSink,
    ) -> Result<UploadResult, FlowcellError> {
        let document = self.parse_run(path, sink)?;
        let name = document_name(&document)?.to_string();
        let applied = upsert(&self.store, &document, options.overwrite, sink)?;
        Ok(UploadResult::from_applied(name, applied))
    }
}
