use std::collections::BTreeMap;

use rosterlink::{CorrectionReport, IdentifierSet, PipelineInputs, Record, Table};

#[allow(dead_code)]
pub fn provider(
    id: i64,
    first: &str,
    last: &str,
    phone: Option<&str>,
    license: Option<&str>,
    state: &str,
) -> Record {
    Record::new()
        .with("provider_id", id)
        .with("npi", 1_000_000_000 + id)
        .with("first_name", first)
        .with("last_name", last)
        .with("practice_phone", phone)
        .with("license_number", license)
        .with("medical_school", "UCSF")
        .with("residency_program", "UCLA")
        .with("house_no_p", "12")
        .with("practice_state", state)
        .with("status", "Active")
}

#[allow(dead_code)]
pub fn registry_entry(license: &str, first: &str, last: &str, status: &str) -> Record {
    Record::new()
        .with("license_number", license)
        .with("first_name", first)
        .with("last_name", last)
        .with("medical_school", "UCSF")
        .with("residency_program", "UCLA")
        .with("house_no", "12")
        .with("status", status)
}

/// Five rows, two duplicate pairs: 1~2 on name+phone, 3~4 on license
#[allow(dead_code)]
pub fn sample_roster() -> Table {
    Table::from_records(vec![
        provider(1, "Jo", "Lee", Some("5551234567"), Some("A1"), "CA"),
        provider(2, "Jo", "Lee", Some("5551234567"), None, "CA"),
        provider(3, "Al", "Ng", Some("5550000001"), Some("N5"), "NY"),
        provider(4, "Alan", "Ng", None, Some("N5"), "NY"),
        provider(5, "Bo", "Diaz", Some("5559999999"), Some("N7"), "NY"),
    ])
}

#[allow(dead_code)]
pub fn sample_inputs() -> PipelineInputs {
    let registries = BTreeMap::from([
        (
            "CA".to_string(),
            Table::from_records(vec![registry_entry("A1", "Jo", "Lee", "Active")]),
        ),
        (
            "NY".to_string(),
            Table::from_records(vec![
                registry_entry("N5", "Al", "Ng", "Active"),
                registry_entry("X0", "Bo", "Diaz", "Expired"),
            ]),
        ),
    ]);

    PipelineInputs {
        roster: sample_roster(),
        registries,
        corrections: Some(CorrectionReport::from_counts([
            ("first_name", 1),
            ("city", 1),
        ])),
        identifiers: Some(["1000000001", "1000000003"].into_iter().collect::<IdentifierSet>()),
    }
}
