//! Create-or-update of run documents against a remote store.

use serde_json::{Map, Value};

use crate::diagnostics::{DiagnosticEvent, DiagnosticSink};
use crate::error::FlowcellError;
use crate::merge::merge;

pub type Document = Map<String, Value>;

pub const NAME_FIELD: &str = "name";
pub const ID_FIELD: &str = "_id";
pub const REV_FIELD: &str = "_rev";

const COMPONENT: &str = "reconcile";

/// A document as last persisted, split from its store identity.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub rev: String,
    pub body: Document,
}

impl StoredDocument {
    /// Removes `_id` and `_rev` from a raw stored document.
    pub fn from_raw(mut raw: Document) -> Result<Self, FlowcellError> {
        let id = take_string(&mut raw, ID_FIELD)?;
        let rev = take_string(&mut raw, REV_FIELD)?;
        Ok(Self { id, rev, body: raw })
    }
}

fn take_string(raw: &mut Document, field: &str) -> Result<String, FlowcellError> {
    match raw.shift_remove(field) {
        Some(Value::String(value)) => Ok(value),
        _ => Err(FlowcellError::format(
            "stored document",
            format!("missing string field {field}"),
        )),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create(Document),
    Replace {
        document: Document,
        id: String,
        rev: String,
    },
    NoOp,
    /// More than one stored document carries the candidate's name.
    Conflict { count: usize },
}

/// Decides what to write for `candidate` given the stored documents sharing its name.
///
/// With a single match, an identical body is left alone. A differing body is
/// replaced by the candidate verbatim when `overwrite` is set, otherwise by the
/// candidate with the stored fields merged underneath it.
pub fn reconcile(
    candidate: &Document,
    existing: &[StoredDocument],
    overwrite: bool,
    sink: &dyn DiagnosticSink,
) -> Action {
    match existing {
        [] => Action::Create(candidate.clone()),
        [stored] if stored.body == *candidate => Action::NoOp,
        [stored] => {
            let document = if overwrite {
                candidate.clone()
            } else {
                merge(candidate, &stored.body, sink)
            };
            Action::Replace {
                document,
                id: stored.id.clone(),
                rev: stored.rev.clone(),
            }
        }
        many => Action::Conflict { count: many.len() },
    }
}

pub trait DocumentStore {
    fn find_by_name(&self, name: &str) -> Result<Vec<StoredDocument>, FlowcellError>;
    /// Stores a new document and returns its id.
    fn create(&self, document: &Document) -> Result<String, FlowcellError>;
    /// Replaces document `id`, failing with `RevisionConflict` unless the
    /// stored revision is still `rev`.
    fn replace(&self, id: &str, rev: &str, document: &Document) -> Result<(), FlowcellError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    Created { id: String },
    Replaced { id: String },
    Unchanged,
}

pub fn document_name(document: &Document) -> Result<&str, FlowcellError> {
    document
        .get(NAME_FIELD)
        .and_then(Value::as_str)
        .ok_or_else(|| FlowcellError::format("run document", "missing string field name"))
}

/// Looks up `candidate` by name, reconciles it, and performs the resulting write.
pub fn upsert<S: DocumentStore + ?Sized>(
    store: &S,
    candidate: &Document,
    overwrite: bool,
    sink: &dyn DiagnosticSink,
) -> Result<Applied, FlowcellError> {
    let name = document_name(candidate)?;
    let existing = store.find_by_name(name)?;

    match reconcile(candidate, &existing, overwrite, sink) {
        Action::Create(document) => {
            let id = store.create(&document)?;
            sink.event(DiagnosticEvent::info(COMPONENT, format!("saving {name}")));
            Ok(Applied::Created { id })
        }
        Action::Replace { document, id, rev } => {
            store.replace(&id, &rev, &document)?;
            sink.event(DiagnosticEvent::info(COMPONENT, format!("updating {name}")));
            Ok(Applied::Replaced { id })
        }
        Action::NoOp => {
            sink.event(DiagnosticEvent::info(
                COMPONENT,
                format!("{name} is already up to date"),
            ));
            Ok(Applied::Unchanged)
        }
        Action::Conflict { count } => {
            sink.event(DiagnosticEvent::warning(
                COMPONENT,
                format!("more than one row with name {name} found"),
            ));
            Err(FlowcellError::DuplicateDocuments {
                name: name.to_string(),
                count,
            })
        }
    }
}
