//! Repository layer — entity-scoped database operations.
//!
//! Free functions over a live connection, split into one module per
//! entity. All public functions are re-exported here.

mod consultation;
mod patient;
mod prescription;
mod stats;

pub use consultation::*;
pub use diagnostic_test::*;
pub use patient::*;
pub use prescription::*;
pub use stats::*;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rusqlite::Connection;

    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::*;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn new_patient(first: &str, last: &str, email: Option<&str>) -> NewPatient {
        NewPatient {
            first_name: first.into(),
            last_name: last.into(),
            email: email.map(|e| e.to_string()),
            ..Default::default()
        }
    }

    fn make_patient(conn: &Connection, first: &str, last: &str, email: Option<&str>, at: &str) -> Patient {
        insert_patient(conn, &new_patient(first, last, email), None, ts(at)).unwrap()
    }

    fn make_consultation(conn: &Connection, patient_id: i64, at: &str, symptoms: Vec<NewSymptom>) -> Consultation {
        let new = NewConsultation {
            patient_id,
            severity: Some(Severity::Moderate),
            chief_complaint: Some("headache, nausea".into()),
            symptoms,
            ..Default::default()
        };
        create_consultation(conn, &new, ts(at)).unwrap()
    }

    #[test]
    fn patient_insert_and_retrieve() {
        let conn = test_db();
        let patient = insert_patient(
            &conn,
            &NewPatient {
                first_name: "John".into(),
                last_name: "Doe".into(),
                email: Some("john@example.com".into()),
                phone: Some("+1-202-555-0101".into()),
                age: Some(44),
                gender: Some(Gender::Male),
                weight: Some(82.5),
                height: Some(180.0),
                blood_type: Some("A+".into()),
                allergies: Some("Penicillin".into()),
                ..Default::default()
            },
            None,
            ts("2026-03-01 10:00:00"),
        )
        .unwrap();

        let fetched = get_patient(&conn, patient.id).unwrap().unwrap();
        assert_eq!(fetched.first_name, "John");
        assert_eq!(fetched.email.as_deref(), Some("john@example.com"));
        assert_eq!(fetched.gender, Some(Gender::Male));
        assert_eq!(fetched.weight, Some(82.5));
        assert_eq!(fetched.allergies.as_deref(), Some("Penicillin"));
        assert!(fetched.is_active);
        assert_eq!(fetched.created_at, ts("2026-03-01 10:00:00"));
    }

    #[test]
    fn duplicate_email_is_a_conflict_without_any_precheck() {
        let conn = test_db();
        let first = make_patient(&conn, "Ann", "Lee", Some("ann@example.com"), "2026-03-01 10:00:00");

        // Straight to the insert, no pre-read: the UNIQUE constraint is
        // authoritative, so interleaved registrations cannot slip through.
        let err = insert_patient(
            &conn,
            &new_patient("Another", "Person", Some("ann@example.com")),
            None,
            ts("2026-03-01 10:00:01"),
        )
        .unwrap_err();

        match err {
            DatabaseError::DuplicateEmail { email, existing_id } => {
                assert_eq!(email, "ann@example.com");
                assert_eq!(existing_id, first.id);
            }
            other => panic!("Expected DuplicateEmail, got: {other}"),
        }
        assert_eq!(count_active_patients(&conn).unwrap(), 1);
    }

    #[test]
    fn email_uniqueness_spans_inactive_patients() {
        let conn = test_db();
        let first = make_patient(&conn, "Ann", "Lee", Some("ann@example.com"), "2026-03-01 10:00:00");
        assert!(deactivate_patient(&conn, first.id, ts("2026-03-01 11:00:00")).unwrap());

        let err = insert_patient(
            &conn,
            &new_patient("New", "Holder", Some("ann@example.com")),
            None,
            ts("2026-03-02 10:00:00"),
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::DuplicateEmail { .. }));
    }

    #[test]
    fn get_patient_hides_inactive_rows() {
        let conn = test_db();
        let patient = make_patient(&conn, "Eve", "Stone", None, "2026-03-01 10:00:00");
        assert!(deactivate_patient(&conn, patient.id, ts("2026-03-01 11:00:00")).unwrap());

        assert!(get_patient(&conn, patient.id).unwrap().is_none());
        // Direct lookup for the update/deactivate path still finds the row.
        let hidden = get_patient_any(&conn, patient.id).unwrap().unwrap();
        assert!(!hidden.is_active);
    }

    #[test]
    fn deactivate_is_idempotent() {
        let conn = test_db();
        let patient = make_patient(&conn, "Eve", "Stone", None, "2026-03-01 10:00:00");

        assert!(deactivate_patient(&conn, patient.id, ts("2026-03-01 11:00:00")).unwrap());
        assert!(deactivate_patient(&conn, patient.id, ts("2026-03-01 12:00:00")).unwrap());
        assert!(!get_patient_any(&conn, patient.id).unwrap().unwrap().is_active);

        // Only a never-existing id reports false.
        assert!(!deactivate_patient(&conn, 9999, ts("2026-03-01 12:00:00")).unwrap());
    }

    #[test]
    fn list_patients_pages_are_disjoint_and_newest_first() {
        let conn = test_db();
        for i in 1..=5 {
            make_patient(&conn, "P", &format!("Number{i}"), None, &format!("2026-03-0{i} 10:00:00"));
        }

        let page1 = list_patients(&conn, 0, 2).unwrap();
        let page2 = list_patients(&conn, 2, 2).unwrap();
        assert_eq!(page1.len(), 2);
        assert_eq!(page2.len(), 2);

        let ids1: Vec<i64> = page1.iter().map(|p| p.id).collect();
        let ids2: Vec<i64> = page2.iter().map(|p| p.id).collect();
        assert!(ids1.iter().all(|id| !ids2.contains(id)));

        // Creation-descending: the four newest rows, in order.
        assert_eq!(page1[0].last_name, "Number5");
        assert_eq!(page1[1].last_name, "Number4");
        assert_eq!(page2[0].last_name, "Number3");
        assert_eq!(page2[1].last_name, "Number2");

        assert_eq!(count_active_patients(&conn).unwrap(), 5);
    }

    #[test]
    fn list_patients_excludes_inactive() {
        let conn = test_db();
        let keep = make_patient(&conn, "Keep", "Me", None, "2026-03-01 10:00:00");
        let gone = make_patient(&conn, "Drop", "Me", None, "2026-03-02 10:00:00");
        deactivate_patient(&conn, gone.id, ts("2026-03-03 10:00:00")).unwrap();

        let page = list_patients(&conn, 0, 10).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, keep.id);
        assert_eq!(count_active_patients(&conn).unwrap(), 1);
    }

    #[test]
    fn search_matches_name_and_email_case_insensitively() {
        let conn = test_db();
        make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        make_patient(&conn, "Alice", "Smith", Some("ajohnson@x.com"), "2026-03-02 10:00:00");
        make_patient(&conn, "Bob", "Brown", Some("bob@x.com"), "2026-03-03 10:00:00");

        let found = search_patients(&conn, "john").unwrap();
        assert_eq!(found.len(), 2);
        // Newest first within results.
        assert_eq!(found[0].email.as_deref(), Some("ajohnson@x.com"));
        assert_eq!(found[1].first_name, "John");

        let by_last_name = search_patients(&conn, "brown").unwrap();
        assert_eq!(by_last_name.len(), 1);
    }

    #[test]
    fn search_skips_inactive_patients() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        deactivate_patient(&conn, patient.id, ts("2026-03-02 10:00:00")).unwrap();
        assert!(search_patients(&conn, "john").unwrap().is_empty());
    }

    #[test]
    fn update_applies_only_present_fields() {
        let conn = test_db();
        let patient = insert_patient(
            &conn,
            &NewPatient {
                first_name: "Jane".into(),
                last_name: "Roe".into(),
                phone: Some("555-0100".into()),
                weight: Some(70.0),
                ..Default::default()
            },
            None,
            ts("2026-03-01 10:00:00"),
        )
        .unwrap();

        let updated = update_patient(
            &conn,
            patient.id,
            &PatientUpdate {
                weight: Some(72.5),
                medical_history: Some("Asthma".into()),
                ..Default::default()
            },
            None,
            ts("2026-03-05 09:00:00"),
        )
        .unwrap()
        .unwrap();

        assert_eq!(updated.weight, Some(72.5));
        assert_eq!(updated.medical_history.as_deref(), Some("Asthma"));
        // Untouched fields survive.
        assert_eq!(updated.first_name, "Jane");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.updated_at, ts("2026-03-05 09:00:00"));
        assert_eq!(updated.created_at, ts("2026-03-01 10:00:00"));
    }

    #[test]
    fn update_reaches_inactive_rows_and_reports_missing_ids() {
        let conn = test_db();
        let patient = make_patient(&conn, "Eve", "Stone", None, "2026-03-01 10:00:00");
        deactivate_patient(&conn, patient.id, ts("2026-03-02 10:00:00")).unwrap();

        // Data on a deactivated record can still be corrected.
        let updated = update_patient(
            &conn,
            patient.id,
            &PatientUpdate {
                phone: Some("555-0199".into()),
                ..Default::default()
            },
            None,
            ts("2026-03-03 10:00:00"),
        )
        .unwrap()
        .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("555-0199"));
        assert!(!updated.is_active);

        assert!(update_patient(&conn, 9999, &PatientUpdate::default(), None, ts("2026-03-03 10:00:00"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn update_to_taken_email_is_a_conflict() {
        let conn = test_db();
        let holder = make_patient(&conn, "Ann", "Lee", Some("ann@example.com"), "2026-03-01 10:00:00");
        let other = make_patient(&conn, "Bob", "Ray", Some("bob@example.com"), "2026-03-02 10:00:00");

        let err = update_patient(
            &conn,
            other.id,
            &PatientUpdate {
                email: Some("ann@example.com".into()),
                ..Default::default()
            },
            None,
            ts("2026-03-03 10:00:00"),
        )
        .unwrap_err();
        match err {
            DatabaseError::DuplicateEmail { existing_id, .. } => assert_eq!(existing_id, holder.id),
            other => panic!("Expected DuplicateEmail, got: {other}"),
        }
    }

    #[test]
    fn consultation_created_with_symptom_rows() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");

        let consultation = create_consultation(
            &conn,
            &NewConsultation {
                patient_id: patient.id,
                severity: Some(Severity::Severe),
                chief_complaint: Some("fever, cough".into()),
                ai_diagnosis: Some("Likely viral infection".into()),
                urgency_level: Some(UrgencyLevel::SeekCareToday),
                model_used: Some("llama-3.3-70b-versatile".into()),
                model_provider: Some("Groq".into()),
                web_search_enabled: true,
                symptoms: vec![
                    NewSymptom::named("fever"),
                    NewSymptom {
                        symptom_name: "cough".into(),
                        severity: Some(Severity::Mild),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            },
            ts("2026-03-02 09:00:00"),
        )
        .unwrap();

        assert_eq!(consultation.patient_id, patient.id);
        assert_eq!(consultation.urgency_level, Some(UrgencyLevel::SeekCareToday));
        assert!(consultation.web_search_enabled);
        // Date defaulted to creation time.
        assert_eq!(consultation.consultation_date, ts("2026-03-02 09:00:00"));

        let symptoms = symptoms_for_consultation(&conn, consultation.id).unwrap();
        assert_eq!(symptoms.len(), 2);
        // First symptom inherits the consultation severity, second keeps its own.
        assert_eq!(symptoms[0].severity, Some(Severity::Severe));
        assert_eq!(symptoms[1].severity, Some(Severity::Mild));
    }

    #[test]
    fn consultation_without_symptoms_is_allowed() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let consultation = make_consultation(&conn, patient.id, "2026-03-02 09:00:00", vec![]);
        assert!(symptoms_for_consultation(&conn, consultation.id).unwrap().is_empty());
    }

    #[test]
    fn consultation_for_missing_patient_is_referential_error() {
        let conn = test_db();
        let err = create_consultation(
            &conn,
            &NewConsultation {
                patient_id: 4242,
                ..Default::default()
            },
            ts("2026-03-02 09:00:00"),
        )
        .unwrap_err();
        match err {
            DatabaseError::MissingParent { child, parent, id } => {
                assert_eq!(child, "consultation");
                assert_eq!(parent, "patient");
                assert_eq!(id, 4242);
            }
            other => panic!("Expected MissingParent, got: {other}"),
        }
    }

    #[test]
    fn consultation_allowed_for_inactive_patient() {
        let conn = test_db();
        let patient = make_patient(&conn, "Eve", "Stone", None, "2026-03-01 10:00:00");
        deactivate_patient(&conn, patient.id, ts("2026-03-02 10:00:00")).unwrap();

        let consultation = make_consultation(&conn, patient.id, "2026-03-03 09:00:00", vec![]);
        assert_eq!(consultation.patient_id, patient.id);
    }

    #[test]
    fn failed_symptom_write_rolls_back_the_whole_consultation() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");

        // The third symptom violates the non-empty name constraint
        // mid-write; nothing from this consultation may remain visible.
        let result = create_consultation(
            &conn,
            &NewConsultation {
                patient_id: patient.id,
                symptoms: vec![
                    NewSymptom::named("fever"),
                    NewSymptom::named("cough"),
                    NewSymptom::named(""),
                ],
                ..Default::default()
            },
            ts("2026-03-02 09:00:00"),
        );
        assert!(result.is_err());

        assert_eq!(count_consultations(&conn).unwrap(), 0);
        assert_eq!(count_symptoms(&conn).unwrap(), 0);
    }

    #[test]
    fn consultations_for_patient_newest_first_with_count() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let other = make_patient(&conn, "Jane", "Roe", None, "2026-03-01 11:00:00");

        let c1 = make_consultation(&conn, patient.id, "2026-03-02 09:00:00", vec![]);
        let c2 = make_consultation(&conn, patient.id, "2026-03-04 09:00:00", vec![]);
        let c3 = make_consultation(&conn, patient.id, "2026-03-03 09:00:00", vec![]);
        make_consultation(&conn, other.id, "2026-03-05 09:00:00", vec![]);

        let listed = list_consultations_for_patient(&conn, patient.id, 0, 10).unwrap();
        let ids: Vec<i64> = listed.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![c2.id, c3.id, c1.id]);

        assert_eq!(count_consultations_for_patient(&conn, patient.id).unwrap(), 3);
        assert_eq!(count_consultations(&conn).unwrap(), 4);

        let paged = list_consultations_for_patient(&conn, patient.id, 1, 1).unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, c3.id);
    }

    #[test]
    fn recent_consultations_span_patients() {
        let conn = test_db();
        let a = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let b = make_patient(&conn, "Jane", "Roe", None, "2026-03-01 11:00:00");

        make_consultation(&conn, a.id, "2026-03-02 09:00:00", vec![]);
        let newest = make_consultation(&conn, b.id, "2026-03-06 09:00:00", vec![]);
        make_consultation(&conn, a.id, "2026-03-04 09:00:00", vec![]);

        let recent = list_recent_consultations(&conn, 2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, newest.id);
    }

    #[test]
    fn consultation_counts_by_patients_batch() {
        let conn = test_db();
        let a = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let b = make_patient(&conn, "Jane", "Roe", None, "2026-03-01 11:00:00");
        let c = make_patient(&conn, "No", "Visits", None, "2026-03-01 12:00:00");

        make_consultation(&conn, a.id, "2026-03-02 09:00:00", vec![]);
        make_consultation(&conn, a.id, "2026-03-03 09:00:00", vec![]);
        make_consultation(&conn, b.id, "2026-03-04 09:00:00", vec![]);

        let counts = count_consultations_by_patients(&conn, &[a.id, b.id, c.id]).unwrap();
        assert_eq!(counts.get(&a.id), Some(&2));
        assert_eq!(counts.get(&b.id), Some(&1));
        assert_eq!(counts.get(&c.id), None);

        assert!(count_consultations_by_patients(&conn, &[]).unwrap().is_empty());
    }

    #[test]
    fn prescription_appends_to_existing_consultation() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let consultation = make_consultation(&conn, patient.id, "2026-03-02 09:00:00", vec![]);

        let prescription = insert_prescription(
            &conn,
            consultation.id,
            &NewPrescription {
                medication_name: "Ibuprofen".into(),
                medication_type: Some("OTC".into()),
                dosage: Some("400mg".into()),
                frequency: Some("every 8 hours".into()),
                is_otc: true,
                ..Default::default()
            },
            ts("2026-03-02 09:05:00"),
        )
        .unwrap();

        assert_eq!(prescription.consultation_id, consultation.id);
        assert!(prescription.is_otc);

        let listed = prescriptions_for_consultation(&conn, consultation.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].medication_name, "Ibuprofen");
    }

    #[test]
    fn prescription_for_missing_consultation_is_referential_error() {
        let conn = test_db();
        let err = insert_prescription(
            &conn,
            777,
            &NewPrescription {
                medication_name: "Ibuprofen".into(),
                ..Default::default()
            },
            ts("2026-03-02 09:05:00"),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::MissingParent { child: "prescription", parent: "consultation", id: 777 }
        ));
    }

    #[test]
    fn diagnostic_test_appends_and_checks_parent() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let consultation = make_consultation(&conn, patient.id, "2026-03-02 09:00:00", vec![]);

        let test = insert_diagnostic_test(
            &conn,
            consultation.id,
            &NewDiagnosticTest {
                test_name: "Complete blood count".into(),
                test_type: Some("Blood".into()),
                priority: Some("Routine".into()),
                ..Default::default()
            },
            ts("2026-03-02 09:05:00"),
        )
        .unwrap();
        assert_eq!(test.consultation_id, consultation.id);
        assert_eq!(tests_for_consultation(&conn, consultation.id).unwrap().len(), 1);

        let err = insert_diagnostic_test(
            &conn,
            888,
            &NewDiagnosticTest {
                test_name: "X-ray".into(),
                ..Default::default()
            },
            ts("2026-03-02 09:06:00"),
        )
        .unwrap_err();
        assert!(matches!(err, DatabaseError::MissingParent { .. }));
    }

    #[test]
    fn prescriptions_join_across_a_patients_consultations() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let other = make_patient(&conn, "Jane", "Roe", None, "2026-03-01 11:00:00");

        let c1 = make_consultation(&conn, patient.id, "2026-03-02 09:00:00", vec![]);
        let c2 = make_consultation(&conn, patient.id, "2026-03-05 09:00:00", vec![]);
        let foreign = make_consultation(&conn, other.id, "2026-03-06 09:00:00", vec![]);

        for (consultation_id, name, at) in [
            (c1.id, "Ibuprofen", "2026-03-02 09:05:00"),
            (c2.id, "Amoxicillin", "2026-03-05 09:05:00"),
            (foreign.id, "Cetirizine", "2026-03-06 09:05:00"),
        ] {
            insert_prescription(
                &conn,
                consultation_id,
                &NewPrescription {
                    medication_name: name.into(),
                    ..Default::default()
                },
                ts(at),
            )
            .unwrap();
        }

        let mine = prescriptions_for_patient(&conn, patient.id).unwrap();
        assert_eq!(mine.len(), 2);
        // Newest first across consultations.
        assert_eq!(mine[0].medication_name, "Amoxicillin");
        assert_eq!(mine[1].medication_name, "Ibuprofen");
    }

    #[test]
    fn purge_patient_cascades_through_children() {
        let conn = test_db();
        let patient = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let keep = make_patient(&conn, "Jane", "Roe", None, "2026-03-01 11:00:00");

        let consultation = make_consultation(
            &conn,
            patient.id,
            "2026-03-02 09:00:00",
            vec![NewSymptom::named("fever")],
        );
        insert_prescription(
            &conn,
            consultation.id,
            &NewPrescription {
                medication_name: "Ibuprofen".into(),
                ..Default::default()
            },
            ts("2026-03-02 09:05:00"),
        )
        .unwrap();
        insert_diagnostic_test(
            &conn,
            consultation.id,
            &NewDiagnosticTest {
                test_name: "CBC".into(),
                ..Default::default()
            },
            ts("2026-03-02 09:06:00"),
        )
        .unwrap();
        let kept = make_consultation(&conn, keep.id, "2026-03-03 09:00:00", vec![NewSymptom::named("rash")]);

        assert!(purge_patient(&conn, patient.id).unwrap());

        assert!(get_patient_any(&conn, patient.id).unwrap().is_none());
        assert!(get_consultation(&conn, consultation.id).unwrap().is_none());
        assert_eq!(count_symptoms(&conn).unwrap(), 1);
        assert_eq!(count_prescriptions(&conn).unwrap(), 0);
        assert!(tests_for_consultation(&conn, consultation.id).unwrap().is_empty());

        // The other patient's records are untouched.
        assert!(get_consultation(&conn, kept.id).unwrap().is_some());

        // Purging an unknown id reports false.
        assert!(!purge_patient(&conn, patient.id).unwrap());
    }

    #[test]
    fn stats_snapshot_counts_active_patients_only() {
        let conn = test_db();
        let a = make_patient(&conn, "John", "Doe", None, "2026-03-01 10:00:00");
        let b = make_patient(&conn, "Jane", "Roe", None, "2026-03-01 11:00:00");
        deactivate_patient(&conn, b.id, ts("2026-03-02 10:00:00")).unwrap();

        let consultation = make_consultation(
            &conn,
            a.id,
            "2026-03-02 09:00:00",
            vec![NewSymptom::named("fever"), NewSymptom::named("cough")],
        );
        insert_prescription(
            &conn,
            consultation.id,
            &NewPrescription {
                medication_name: "Ibuprofen".into(),
                ..Default::default()
            },
            ts("2026-03-02 09:05:00"),
        )
        .unwrap();

        let stats = collect_stats(&conn).unwrap();
        assert_eq!(stats.total_patients, 1);
        assert_eq!(stats.total_consultations, 1);
        assert_eq!(stats.total_symptoms, 2);
        assert_eq!(stats.total_prescriptions, 1);
    }
}
