use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use rosterlink::model::{Record, Table, Value};

const FIRST_NAMES: [&str; 8] = ["Ana", "Ben", "Chen", "Dara", "Eli", "Fay", "Gus", "Hana"];
const LAST_NAMES: [&str; 8] = ["Lee", "Patel", "Okafor", "Silva", "Kim", "Novak", "Reyes", "Ito"];
const SCHOOLS: [&str; 4] = ["UCSF", "Columbia", "Stanford", "NYU"];
const PROGRAMS: [&str; 4] = ["UCLA", "Mount Sinai", "Kaiser", "Bellevue"];
const STATES: [&str; 2] = ["CA", "NY"];
const STATUSES: [&str; 3] = ["Active", "Inactive", "Active"];

/// A synthetic roster plus the set of rows each row was copied from
#[derive(Debug, Clone)]
pub struct GeneratedRoster {
    pub table: Table,
    /// `source[i]` is the row index row `i` duplicates, or `i` itself
    #[allow(dead_code)]
    pub source: Vec<usize>,
}

fn fresh_provider(rng: &mut StdRng, id: u32) -> Record {
    let state = STATES[rng.random_range(0..STATES.len())];
    Record::new()
        .with("provider_id", id)
        .with("npi", 1_000_000_000i64 + i64::from(id))
        .with("first_name", FIRST_NAMES[rng.random_range(0..FIRST_NAMES.len())])
        .with(
            "last_name",
            format!("{}{}", LAST_NAMES[rng.random_range(0..LAST_NAMES.len())], id),
        )
        .with("practice_phone", format!("555{:07}", rng.random_range(0..10_000_000)))
        .with("license_number", format!("{state}-{id:06}"))
        .with("license_state", state)
        .with("medical_school", SCHOOLS[rng.random_range(0..SCHOOLS.len())])
        .with("residency_program", PROGRAMS[rng.random_range(0..PROGRAMS.len())])
        .with("house_no_p", rng.random_range(1..999u32))
        .with("practice_state", state)
        .with("status", STATUSES[rng.random_range(0..STATUSES.len())])
}

/// Copy `original` under a new id, dropping some fields so that exactly one
/// match key family still links it back
fn duplicate_of(rng: &mut StdRng, original: &Record, id: u32) -> Record {
    let mut copy = original.clone();
    copy.set("provider_id", id);
    match rng.random_range(0..3) {
        0 => {
            copy.set("license_number", Value::Null);
            copy.set("medical_school", Value::Null);
        }
        1 => {
            copy.set("practice_phone", Value::Null);
            copy.set("residency_program", Value::Null);
        }
        _ => {
            copy.set("practice_phone", Value::Null);
            copy.set("license_number", Value::Null);
        }
    }
    if rng.random_bool(0.3) {
        copy.set("status", "Inactive");
    }
    copy
}

/// Generate `count` roster rows; each row after the first duplicates an
/// earlier row with probability `duplicate_probability`.
pub fn generate_roster(count: u32, duplicate_probability: f64, seed: u64) -> GeneratedRoster {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut records: Vec<Record> = Vec::with_capacity(count as usize);
    let mut source = Vec::with_capacity(count as usize);

    for i in 0..count {
        let id = i + 1;
        if i > 0 && rng.random_bool(duplicate_probability) {
            let from = rng.random_range(0..i as usize);
            let root = source[from];
            let copy = duplicate_of(&mut rng, &records[root], id);
            records.push(copy);
            source.push(root);
        } else {
            records.push(fresh_provider(&mut rng, id));
            source.push(i as usize);
        }
    }

    GeneratedRoster {
        table: Table::from_records(records),
        source,
    }
}

/// Registry rows for the distinct licensed providers of `state` in `roster`
#[allow(dead_code)]
pub fn generate_registry(roster: &Table, state: &str, seed: u64) -> Table {
    let mut rng = StdRng::seed_from_u64(seed);
    roster
        .records()
        .iter()
        .filter(|r| r.value("practice_state").as_str() == Some(state))
        .filter(|r| !r.value("license_number").is_null())
        .map(|r| {
            Record::new()
                .with("license_number", r.value("license_number").clone())
                .with("first_name", r.value("first_name").clone())
                .with("last_name", r.value("last_name").clone())
                .with("medical_school", r.value("medical_school").clone())
                .with("residency_program", r.value("residency_program").clone())
                .with("house_no", r.value("house_no_p").clone())
                .with(
                    "status",
                    if rng.random_bool(0.8) { "Active" } else { "Expired" },
                )
        })
        .collect()
}
