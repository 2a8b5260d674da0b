use std::sync::Mutex;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use flowcell_parser::diagnostics::{CollectingSink, NullSink, Severity};
use flowcell_parser::error::FlowcellError;
use flowcell_parser::merge::merge;
use flowcell_parser::reconcile::{
    Action, Applied, Document, DocumentStore, StoredDocument, reconcile, upsert,
};

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn stored(id: &str, rev: &str, body: Value) -> StoredDocument {
    StoredDocument {
        id: id.to_string(),
        rev: rev.to_string(),
        body: doc(body),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Find(String),
    Create(Document),
    Replace { id: String, rev: String, document: Document },
}

struct MockStore {
    existing: Vec<StoredDocument>,
    conflict_on_replace: bool,
    calls: Mutex<Vec<Call>>,
}

impl MockStore {
    fn with(existing: Vec<StoredDocument>) -> Self {
        Self {
            existing,
            conflict_on_replace: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl DocumentStore for MockStore {
    fn find_by_name(&self, name: &str) -> Result<Vec<StoredDocument>, FlowcellError> {
        self.calls.lock().unwrap().push(Call::Find(name.to_string()));
        Ok(self.existing.clone())
    }

    fn create(&self, document: &Document) -> Result<String, FlowcellError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Create(document.clone()));
        Ok("new-id".to_string())
    }

    fn replace(&self, id: &str, rev: &str, document: &Document) -> Result<(), FlowcellError> {
        self.calls.lock().unwrap().push(Call::Replace {
            id: id.to_string(),
            rev: rev.to_string(),
            document: document.clone(),
        });
        if self.conflict_on_replace {
            return Err(FlowcellError::RevisionConflict {
                id: id.to_string(),
                rev: rev.to_string(),
            });
        }
        Ok(())
    }
}

#[test]
fn merge_keeps_primary_values() {
    let merged = merge(&doc(json!({"a": 1})), &doc(json!({"a": 2, "b": 3})), &NullSink);
    assert_eq!(Value::Object(merged), json!({"a": 1, "b": 3}));
}

#[test]
fn merge_recurses_into_nested_objects() {
    let primary = doc(json!({"illumina": {"Demultiplex_Stats": {"Lanes_stats": [1]}}}));
    let secondary = doc(json!({
        "illumina": {"Demultiplex_Stats": {"Lanes_stats": [2], "Flowcell_stats": {"x": "1"}}},
        "project": "A"
    }));
    let merged = merge(&primary, &secondary, &NullSink);
    assert_eq!(
        Value::Object(merged),
        json!({
            "illumina": {"Demultiplex_Stats": {"Lanes_stats": [1], "Flowcell_stats": {"x": "1"}}},
            "project": "A"
        })
    );
}

#[test]
fn merge_is_idempotent() {
    let x = doc(json!({"a": {"b": 1, "c": {"d": "x"}}, "e": [1, 2]}));
    let y = doc(json!({"a": {"b": 2, "c": {"f": null}}, "e": "other", "g": {"h": 1}}));
    let once = merge(&x, &y, &NullSink);
    let twice = merge(&once, &y, &NullSink);
    assert_eq!(once, twice);
}

#[test]
fn merge_reports_discarded_values() {
    let sink = CollectingSink::new();
    merge(&doc(json!({"a": {"b": 1}})), &doc(json!({"a": {"b": 2}})), &sink);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Debug);
    assert!(events[0].message.contains("a.b"));
}

#[test]
fn reconcile_decides_each_outcome() {
    let candidate = doc(json!({"name": "150424_BH2WY7CCXX", "recipe": "2x151"}));

    assert_eq!(
        reconcile(&candidate, &[], false, &NullSink),
        Action::Create(candidate.clone())
    );

    let same = stored("id1", "1-a", json!({"name": "150424_BH2WY7CCXX", "recipe": "2x151"}));
    assert_eq!(
        reconcile(&candidate, &[same.clone()], false, &NullSink),
        Action::NoOp
    );

    let two = [same.clone(), stored("id2", "1-b", json!({"name": "150424_BH2WY7CCXX"}))];
    assert_eq!(
        reconcile(&candidate, &two, false, &NullSink),
        Action::Conflict { count: 2 }
    );
}

#[test]
fn reconcile_merges_stored_fields_unless_overwriting() {
    let candidate = doc(json!({"name": "run", "recipe": "2x151"}));
    let existing = [stored(
        "id1",
        "3-c",
        json!({"name": "run", "recipe": "2x76", "project": "A"}),
    )];

    assert_eq!(
        reconcile(&candidate, &existing, false, &NullSink),
        Action::Replace {
            document: doc(json!({"name": "run", "recipe": "2x151", "project": "A"})),
            id: "id1".to_string(),
            rev: "3-c".to_string(),
        }
    );
    assert_eq!(
        reconcile(&candidate, &existing, true, &NullSink),
        Action::Replace {
            document: candidate.clone(),
            id: "id1".to_string(),
            rev: "3-c".to_string(),
        }
    );
}

#[test]
fn upsert_creates_missing_document() {
    let store = MockStore::with(Vec::new());
    let candidate = doc(json!({"name": "run"}));
    let applied = upsert(&store, &candidate, false, &NullSink).unwrap();
    assert_eq!(
        applied,
        Applied::Created {
            id: "new-id".to_string()
        }
    );
    assert_eq!(
        store.calls(),
        vec![Call::Find("run".to_string()), Call::Create(candidate)]
    );
}

#[test]
fn upsert_leaves_identical_document_alone() {
    let store = MockStore::with(vec![stored("id1", "1-a", json!({"name": "run"}))]);
    let sink = CollectingSink::new();
    let applied = upsert(&store, &doc(json!({"name": "run"})), false, &sink).unwrap();
    assert_eq!(applied, Applied::Unchanged);
    assert_eq!(store.calls().len(), 1);
    assert!(sink.events().iter().any(|event| event.severity == Severity::Info));
}

#[test]
fn upsert_replaces_with_stored_revision() {
    let store = MockStore::with(vec![stored("id1", "2-b", json!({"name": "run", "a": 1}))]);
    let applied = upsert(&store, &doc(json!({"name": "run", "b": 2})), false, &NullSink).unwrap();
    assert_eq!(
        applied,
        Applied::Replaced {
            id: "id1".to_string()
        }
    );
    assert_eq!(
        store.calls()[1],
        Call::Replace {
            id: "id1".to_string(),
            rev: "2-b".to_string(),
            document: doc(json!({"name": "run", "a": 1, "b": 2})),
        }
    );
}

#[test]
fn upsert_refuses_duplicate_names() {
    let store = MockStore::with(vec![
        stored("id1", "1-a", json!({"name": "run"})),
        stored("id2", "1-b", json!({"name": "run"})),
    ]);
    let sink = CollectingSink::new();
    let err = upsert(&store, &doc(json!({"name": "run", "x": 1})), false, &sink).unwrap_err();
    assert_matches!(err, FlowcellError::DuplicateDocuments { count: 2, .. });
    assert_eq!(store.calls().len(), 1);
    assert_eq!(sink.warnings().len(), 1);
}

#[test]
fn upsert_surfaces_revision_conflicts() {
    let mut store = MockStore::with(vec![stored("id1", "1-a", json!({"name": "run"}))]);
    store.conflict_on_replace = true;
    let err = upsert(&store, &doc(json!({"name": "run", "x": 1})), true, &NullSink).unwrap_err();
    assert_matches!(err, FlowcellError::RevisionConflict { .. });
}

#[test]
fn upsert_requires_a_name() {
    let store = MockStore::with(Vec::new());
    let err = upsert(&store, &doc(json!({"recipe": "1x51"})), false, &NullSink).unwrap_err();
    assert_matches!(err, FlowcellError::Format { .. });
    assert!(store.calls().is_empty());
}
