//! Contract tests run against both storage backends.
//!
//! Every behavior here must hold whichever backend the store was opened
//! with.

use std::sync::Arc;
use std::thread;

use medrec_core::{
    BackendKind, NewAssignment, NewDocument, NewPatient, NewRecord, Store, StoreConfig,
    StoreError, StoreState,
};
use serde_json::Value;
use tempfile::TempDir;

fn open_store(dir: &TempDir, kind: BackendKind) -> Store {
    let config = match kind {
        BackendKind::Document => StoreConfig::document(dir.path().join("data").join("store.json")),
        BackendKind::Relational => StoreConfig::relational(dir.path().join("data").join("medrec.sqlite")),
    };
    Store::open(&config).unwrap()
}

/// One fresh store per backend, each with its own scratch directory.
fn stores() -> Vec<(TempDir, Store)> {
    [BackendKind::Document, BackendKind::Relational]
        .into_iter()
        .map(|kind| {
            let dir = tempfile::tempdir().unwrap();
            let store = open_store(&dir, kind);
            (dir, store)
        })
        .collect()
}

/// Populate the Ada scenario: one patient, one record, one assignment.
fn seed_ada(store: &Store) -> (String, String) {
    let ada = store.add_patient(NewPatient::new("Ada", "1990-01-01")).unwrap();
    let record = store
        .add_record(NewRecord::new(ada.id.clone(), vec!["asthma".to_string()]))
        .unwrap();
    store
        .add_assignment(NewAssignment::new(record.id.clone(), "Dr. X", "Inhaler"))
        .unwrap();
    (ada.id, record.id)
}

/// Blank out scalar values, keeping keys, nesting and array lengths.
fn shape(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), shape(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(shape).collect()),
        Value::Null => Value::Null,
        _ => Value::String(String::new()),
    }
}

#[test]
fn test_end_to_end_doctor_view() {
    for (_dir, store) in stores() {
        let (_, record_id) = seed_ada(&store);

        let view = store.get_all_records_with_assignments().unwrap();
        assert_eq!(view.len(), 1, "{:?}", store.backend_kind());

        let entry = &view[0];
        assert_eq!(entry.record.id, record_id);
        assert_eq!(entry.patient.as_ref().unwrap().name, "Ada");
        assert_eq!(entry.assignments.len(), 1);
        assert_eq!(entry.assignments[0].medication, "Inhaler");
        assert_eq!(entry.assignments[0].doctor, "Dr. X");
        assert_eq!(entry.assignments[0].notes, "");
    }
}

#[test]
fn test_doctor_view_shape_is_backend_independent() {
    let shapes: Vec<Value> = stores()
        .into_iter()
        .map(|(_dir, store)| {
            seed_ada(&store);
            store.add_record(NewRecord::new("pat-missing", "flu")).unwrap();
            let view = store.get_all_records_with_assignments().unwrap();
            shape(&serde_json::to_value(&view).unwrap())
        })
        .collect();

    assert_eq!(shapes[0], shapes[1]);

    let first = &shapes[0][0];
    for key in ["id", "patientId", "conditions", "lastVisit", "patient", "assignments"] {
        assert!(first.get(key).is_some(), "missing {}", key);
    }
    assert!(shapes[0][1]["patient"].is_null());
    assert_eq!(shapes[0][1]["assignments"], serde_json::json!([]));
}

#[test]
fn test_record_read_is_idempotent() {
    for (_dir, store) in stores() {
        let (_, record_id) = seed_ada(&store);
        let first = store.get_record_by_id(&record_id).unwrap();
        let second = store.get_record_by_id(&record_id).unwrap();
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}

#[test]
fn test_last_visit_defaults_to_today() {
    for (_dir, store) in stores() {
        let record = store
            .add_record(NewRecord::new("p1", vec!["flu".to_string()]))
            .unwrap();
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(record.last_visit, today);

        let stored = store.get_record_by_id(&record.id).unwrap().unwrap();
        assert_eq!(stored.last_visit, today);
    }
}

#[test]
fn test_explicit_last_visit_is_kept() {
    for (_dir, store) in stores() {
        let record = store
            .add_record(NewRecord::new("p1", "flu").with_last_visit("2023-11-30"))
            .unwrap();
        let stored = store.get_record_by_id(&record.id).unwrap().unwrap();
        assert_eq!(stored.last_visit, "2023-11-30");
    }
}

#[test]
fn test_single_condition_reads_back_as_sequence() {
    for (_dir, store) in stores() {
        let record = store.add_record(NewRecord::new("p1", "migraine")).unwrap();
        let stored = store.get_record_by_id(&record.id).unwrap().unwrap();
        assert_eq!(stored.conditions, vec!["migraine".to_string()]);
    }
}

#[test]
fn test_assignments_grouped_by_record() {
    for (_dir, store) in stores() {
        let a1 = store
            .add_assignment(NewAssignment::new("r1", "Dr. X", "Inhaler"))
            .unwrap();
        let a2 = store
            .add_assignment(NewAssignment::new("r1", "Dr. Y", "Steroid").with_notes("twice daily"))
            .unwrap();
        store
            .add_assignment(NewAssignment::new("r2", "Dr. X", "Antibiotic"))
            .unwrap();

        let mut ids: Vec<String> = store
            .get_assignments_for_record("r1")
            .unwrap()
            .into_iter()
            .map(|a| a.id)
            .collect();
        ids.sort();
        let mut expected = vec![a1.id, a2.id];
        expected.sort();
        assert_eq!(ids, expected);

        let r1 = store.get_assignments_for_record("r1").unwrap();
        assert!(r1.iter().all(|a| a.record_id == "r1"));
        assert!(r1.iter().any(|a| a.notes == "twice daily"));
    }
}

#[test]
fn test_not_found_is_not_an_error() {
    for (_dir, store) in stores() {
        assert_eq!(store.get_patient_by_id("nonexistent").unwrap(), None);
        assert_eq!(store.get_record_by_id("nonexistent").unwrap(), None);
        assert_eq!(store.get_patient_by_name_dob("Nobody", "2000-01-01").unwrap(), None);
        assert!(store.get_records_by_patient("nonexistent").unwrap().is_empty());
        assert!(store.get_assignments_for_record("nonexistent").unwrap().is_empty());
        assert!(store.get_documents_for_patient("nonexistent").unwrap().is_empty());
        assert!(store.get_all_records_with_assignments().unwrap().is_empty());
    }
}

#[test]
fn test_login_lookup() {
    for (_dir, store) in stores() {
        let first = store.add_patient(NewPatient::new("Ada", "1990-01-01")).unwrap();
        let _twin = store.add_patient(NewPatient::new("Ada", "1990-01-01")).unwrap();
        store.add_patient(NewPatient::new("Grace", "1906-12-09")).unwrap();

        let found = store.get_patient_by_name_dob("Ada", "1990-01-01").unwrap();
        assert_eq!(found, Some(first));

        let grace = store.get_patient_by_name_dob("Grace", "1906-12-09").unwrap();
        assert_eq!(grace.unwrap().name, "Grace");
    }
}

#[test]
fn test_records_by_patient() {
    for (_dir, store) in stores() {
        let ada = store.add_patient(NewPatient::new("Ada", "1990-01-01")).unwrap();
        let grace = store.add_patient(NewPatient::new("Grace", "1906-12-09")).unwrap();
        store.add_record(NewRecord::new(ada.id.clone(), "asthma")).unwrap();
        store.add_record(NewRecord::new(ada.id.clone(), "flu")).unwrap();
        store.add_record(NewRecord::new(grace.id.clone(), "gout")).unwrap();

        let records = store.get_records_by_patient(&ada.id).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.patient_id == ada.id));

        let all = store.list_records().unwrap();
        assert_eq!(all.len(), 3);
    }
}

#[test]
fn test_records_with_patients() {
    for (_dir, store) in stores() {
        let ada = store.add_patient(NewPatient::new("Ada", "1990-01-01")).unwrap();
        store.add_record(NewRecord::new(ada.id.clone(), "asthma")).unwrap();
        store.add_record(NewRecord::new("pat-missing", "flu")).unwrap();

        let listed = store.list_records_with_patients().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].patient, Some(ada.clone()));
        assert_eq!(listed[1].patient, None);
    }
}

#[test]
fn test_document_metadata() {
    for (_dir, store) in stores() {
        let ada = store.add_patient(NewPatient::new("Ada", "1990-01-01")).unwrap();
        let document = store
            .add_document(NewDocument {
                patient_id: ada.id.clone(),
                filename: "1700000000-scan.pdf".into(),
                original_name: "scan.pdf".into(),
                mimetype: "application/pdf".into(),
                size: 48_213,
            })
            .unwrap();
        assert!(document.id.starts_with("doc-"));

        let documents = store.get_documents_for_patient(&ada.id).unwrap();
        assert_eq!(documents, vec![document]);
    }
}

#[test]
fn test_read_state_snapshot() {
    for (_dir, store) in stores() {
        seed_ada(&store);
        let state = store.read_state().unwrap();
        assert_eq!(state.patients.len(), 1);
        assert_eq!(state.records.len(), 1);
        assert_eq!(state.assignments.len(), 1);
        assert!(state.documents.is_empty());
    }
}

#[test]
fn test_write_state_only_on_document_backend() {
    for (_dir, store) in stores() {
        seed_ada(&store);
        let result = store.write_state(&StoreState::default());
        match store.backend_kind() {
            BackendKind::Document => {
                result.unwrap();
                assert_eq!(store.read_state().unwrap(), StoreState::default());
            }
            BackendKind::Relational => {
                assert!(matches!(result, Err(StoreError::Unsupported(_))));
                assert_eq!(store.read_state().unwrap().patients.len(), 1);
            }
        }
    }
}

#[test]
fn test_data_survives_reopen() {
    for kind in [BackendKind::Document, BackendKind::Relational] {
        let dir = tempfile::tempdir().unwrap();
        let (ada_id, _) = {
            let store = open_store(&dir, kind);
            seed_ada(&store)
        };

        let reopened = open_store(&dir, kind);
        let ada = reopened.get_patient_by_id(&ada_id).unwrap().unwrap();
        assert_eq!(ada.name, "Ada");
        assert_eq!(reopened.get_all_records_with_assignments().unwrap().len(), 1);
    }
}

#[test]
fn test_concurrent_adds_are_not_lost() {
    for (_dir, store) in stores() {
        let store = Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..5 {
                        store
                            .add_patient(NewPatient::new(format!("Patient {}-{}", i, j), "2000-01-01"))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.read_state().unwrap().patients.len(), 40);
    }
}

#[test]
fn test_relational_connection_failure_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    // The database's parent directory is a regular file
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let store = Store::open(&StoreConfig::relational(blocker.join("medrec.sqlite"))).unwrap();

    assert!(store.get_patient_by_id("anything").is_err());
    assert!(store.add_patient(NewPatient::new("Ada", "1990-01-01")).is_err());
}

#[test]
fn test_document_io_failure_surfaces() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"").unwrap();
    let store = Store::open(&StoreConfig::document(blocker.join("store.json"))).unwrap();

    assert!(matches!(store.read_state(), Err(StoreError::Io(_))));
}
