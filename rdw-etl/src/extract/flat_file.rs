use crate::common::error::Result;
use crate::extract::SalesSource;
use async_trait::async_trait;
use chrono::Utc;
use rdw_core::domain::{RawBatch, RawRecord, SourceTag};
use rdw_core::EtlError;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::info;

/// Columns the retail sales file must carry, in canonical form.
const REQUIRED_COLUMNS: &[&str] = &[
    "transaction_id",
    "date",
    "customer_id",
    "gender",
    "age",
    "product_category",
    "quantity",
    "price_per_unit",
    "total_amount",
];

/// Reads the retail sales flat file into tagged raw records.
pub struct FlatFileSource {
    path: PathBuf,
}

impl FlatFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

/// "Price per Unit" -> "price_per_unit".
fn canonical_column(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

#[async_trait]
impl SalesSource for FlatFileSource {
    async fn extract(&self) -> Result<RawBatch> {
        let extracted_at = Utc::now();
        info!(path = %self.path.display(), "extracting retail sales");

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_path(&self.path)?;

        let headers: Vec<String> =
            reader.headers()?.iter().map(canonical_column).collect();

        // The batch's overall shape must match the expected schema; a missing
        // required column aborts the whole batch.
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|col| !headers.iter().any(|h| h == *col))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(EtlError::source_format(
                SourceTag::RetailCsv.as_str(),
                format!("missing required columns: {}", missing.join(", ")),
            )
            .into());
        }

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            let mut values = Map::new();
            for (i, header) in headers.iter().enumerate() {
                let cell = row.get(i).unwrap_or("");
                values.insert(header.clone(), Value::String(cell.to_string()));
            }
            records.push(RawRecord { source: SourceTag::RetailCsv, values, extracted_at });
        }

        info!(rows = records.len(), "extracted retail sales");
        Ok(RawBatch { source: SourceTag::RetailCsv, records, extracted_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn extracts_rows_with_canonical_column_names() {
        let file = write_csv(
            "Transaction ID,Date,Customer ID,Gender,Age,Product Category,Quantity,Price per Unit,Total Amount\n\
             1,2023-05-01,CUST001,Female,34,Beauty,2,25,50\n",
        );
        let batch = FlatFileSource::new(file.path()).extract().await.unwrap();
        assert_eq!(batch.records.len(), 1);
        let record = &batch.records[0];
        assert_eq!(record.values["transaction_id"], "1");
        assert_eq!(record.values["price_per_unit"], "25");
        assert_eq!(record.source, SourceTag::RetailCsv);
    }

    #[tokio::test]
    async fn missing_required_column_is_a_source_format_error() {
        let file = write_csv("Transaction ID,Date,Customer ID\n1,2023-05-01,CUST001\n");
        let err = FlatFileSource::new(file.path()).extract().await.unwrap_err();
        assert!(err.is_source_format(), "unexpected error: {err}");
    }

    #[tokio::test]
    async fn header_only_file_yields_empty_batch() {
        let file = write_csv(
            "Transaction ID,Date,Customer ID,Gender,Age,Product Category,Quantity,Price per Unit,Total Amount\n",
        );
        let batch = FlatFileSource::new(file.path()).extract().await.unwrap();
        assert!(batch.records.is_empty());
    }
}
