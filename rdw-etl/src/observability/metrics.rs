//! Pipeline stage counters, emitted through the `metrics` facade. A recorder
//! is only installed when one is configured by the embedding process; without
//! one these are no-ops.

pub mod extract {
    pub fn records_extracted(source: &str, count: usize) {
        ::metrics::counter!("rdw_extract_records_total", "source" => source.to_string())
            .increment(count as u64);
    }

    pub fn source_error(source: &str) {
        ::metrics::counter!("rdw_extract_source_errors_total", "source" => source.to_string())
            .increment(1);
    }
}

pub mod normalize {
    pub fn rows_normalized(source: &str, count: usize) {
        ::metrics::counter!("rdw_normalize_rows_total", "source" => source.to_string())
            .increment(count as u64);
    }

    pub fn row_rejected(source: &str) {
        ::metrics::counter!("rdw_normalize_rows_rejected_total", "source" => source.to_string())
            .increment(1);
    }

    pub fn amount_mismatch() {
        ::metrics::counter!("rdw_normalize_amount_mismatches_total").increment(1);
    }
}

pub mod dimensions {
    pub fn versions_created(dimension: &str, count: usize) {
        ::metrics::counter!("rdw_dim_versions_created_total", "dimension" => dimension.to_string())
            .increment(count as u64);
    }
}

pub mod facts {
    pub fn rows_built(count: usize) {
        ::metrics::counter!("rdw_fact_rows_total").increment(count as u64);
    }

    pub fn unresolved_reference(dimension: &str) {
        ::metrics::counter!("rdw_fact_unresolved_refs_total", "dimension" => dimension.to_string())
            .increment(1);
    }
}

pub mod load {
    pub fn table_loaded(table: &str, rows: usize) {
        ::metrics::counter!("rdw_load_rows_total", "table" => table.to_string())
            .increment(rows as u64);
    }

    pub fn table_failed(table: &str) {
        ::metrics::counter!("rdw_load_table_failures_total", "table" => table.to_string())
            .increment(1);
    }
}
