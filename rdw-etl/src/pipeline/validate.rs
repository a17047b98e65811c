use crate::pipeline::dimensions::Scd2Row;
use crate::pipeline::TransformOutput;
use rdw_core::domain::UNKNOWN_KEY;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Post-transform quality gate. Returns the list of violations; an empty list
/// means the transform output is fit to load.
pub fn validate_transform(
    output: &TransformOutput,
    min_rows: &BTreeMap<String, usize>,
) -> Vec<String> {
    let mut failures = Vec::new();

    let counts = output.table_counts();
    for (table, min) in min_rows {
        match counts.get(table.as_str()) {
            Some(actual) if actual >= min => {}
            Some(actual) => {
                failures.push(format!("{table}: expected >= {min} rows, got {actual}"))
            }
            None => failures.push(format!("{table}: unknown table in min_rows config")),
        }
    }

    failures.extend(check_scd2_invariants("dim_customer", &output.dim_customer));
    failures.extend(check_scd2_invariants("dim_product", &output.dim_product));
    failures.extend(check_fact_references(output));

    failures
}

/// Structural SCD2 invariants, per natural key:
/// exactly one current version, versions forming a contiguous 1..n sequence
/// with the current version last, and effective intervals partitioning time
/// with no gaps or overlaps.
pub fn check_scd2_invariants<R: Scd2Row>(table: &str, rows: &[R]) -> Vec<String> {
    let mut by_key: BTreeMap<String, Vec<&R>> = BTreeMap::new();
    for row in rows {
        by_key.entry(row.natural_key()).or_default().push(row);
    }

    let mut failures = Vec::new();
    for (key, mut versions) in by_key {
        versions.sort_by_key(|r| r.version());

        let current_count = versions.iter().filter(|r| r.is_current()).count();
        if current_count != 1 {
            failures.push(format!("{table}/{key}: {current_count} current versions, expected 1"));
        }

        for (i, row) in versions.iter().enumerate() {
            if row.version() != i as i64 + 1 {
                failures.push(format!(
                    "{table}/{key}: version sequence broken at position {i} (version {})",
                    row.version()
                ));
                break;
            }
        }

        if let Some(last) = versions.last() {
            if !last.is_current() && current_count == 1 {
                failures.push(format!("{table}/{key}: current version is not the latest"));
            }
        }

        for pair in versions.windows(2) {
            if pair[0].effective_end() != pair[1].effective_start() {
                failures.push(format!(
                    "{table}/{key}: gap or overlap between versions {} and {}",
                    pair[0].version(),
                    pair[1].version()
                ));
            }
        }
    }
    failures
}

/// Every non-unknown fact foreign key must resolve to exactly one row in its
/// dimension's current version set.
fn check_fact_references(output: &TransformOutput) -> Vec<String> {
    let mut current_customer_keys: HashMap<i64, usize> = HashMap::new();
    for row in output.dim_customer.iter().filter(|r| r.is_current) {
        *current_customer_keys.entry(row.customer_key).or_default() += 1;
    }
    let category_keys: HashSet<i64> =
        output.dim_product_category.iter().map(|r| r.category_key).collect();

    let mut failures = Vec::new();
    for fact in &output.fact_sales {
        if fact.customer_key != UNKNOWN_KEY {
            match current_customer_keys.get(&fact.customer_key) {
                Some(1) => {}
                Some(n) => failures.push(format!(
                    "fact_sales/{}: customer_key {} matches {n} current rows",
                    fact.transaction_id, fact.customer_key
                )),
                None => failures.push(format!(
                    "fact_sales/{}: dangling customer_key {}",
                    fact.transaction_id, fact.customer_key
                )),
            }
        }
        if fact.category_key != UNKNOWN_KEY && !category_keys.contains(&fact.category_key) {
            failures.push(format!(
                "fact_sales/{}: dangling category_key {}",
                fact.transaction_id, fact.category_key
            ));
        }
    }
    failures
}
