use super::traits::Warehouse;
use crate::common::error::{EtlError, Result};
use crate::domain::*;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// SQLite-backed warehouse.
///
/// Every replace runs as DELETE + bulk INSERT inside one transaction, so a
/// concurrent reader sees the table either in its pre-run or post-run state.
/// Staging tables are plain INSERTs and accumulate across runs.
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> EtlError {
    EtlError::Database { message: e.to_string() }
}

fn load_err(table: &str, e: rusqlite::Error) -> EtlError {
    EtlError::load(table, e.to_string())
}

fn parse_date(table: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| EtlError::load(table, format!("bad date '{value}': {e}")))
}

fn parse_timestamp(table: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EtlError::load(table, format!("bad timestamp '{value}': {e}")))
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stg_retail_sales (
    transaction_id    INTEGER NOT NULL,
    sale_date         TEXT NOT NULL,
    customer_id       TEXT NOT NULL,
    gender            TEXT NOT NULL,
    age               INTEGER NOT NULL,
    product_category  TEXT NOT NULL,
    quantity          INTEGER NOT NULL,
    price_per_unit    REAL NOT NULL,
    total_amount      REAL NOT NULL,
    source            TEXT NOT NULL,
    extracted_at      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS stg_api_products (
    product_id        INTEGER NOT NULL,
    title             TEXT NOT NULL,
    price             REAL NOT NULL,
    description       TEXT NOT NULL,
    category          TEXT NOT NULL,
    image_url         TEXT NOT NULL,
    rating_rate       REAL NOT NULL,
    rating_count      INTEGER NOT NULL,
    source            TEXT NOT NULL,
    extracted_at      TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_date (
    date_key          INTEGER PRIMARY KEY,
    full_date         TEXT NOT NULL,
    year              INTEGER NOT NULL,
    quarter           INTEGER NOT NULL,
    month             INTEGER NOT NULL,
    month_name        TEXT NOT NULL,
    week_of_year      INTEGER NOT NULL,
    day_of_month      INTEGER NOT NULL,
    day_of_week       INTEGER NOT NULL,
    day_name          TEXT NOT NULL,
    is_weekend        INTEGER NOT NULL,
    fiscal_year       INTEGER NOT NULL,
    fiscal_quarter    INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_customer (
    customer_key         INTEGER PRIMARY KEY,
    customer_id          TEXT NOT NULL,
    gender               TEXT NOT NULL,
    age                  INTEGER NOT NULL,
    age_group            TEXT NOT NULL,
    customer_segment     TEXT NOT NULL,
    first_purchase_date  TEXT NOT NULL,
    last_purchase_date   TEXT NOT NULL,
    total_transactions   INTEGER NOT NULL,
    effective_start_date TEXT NOT NULL,
    effective_end_date   TEXT NOT NULL,
    is_current           INTEGER NOT NULL,
    version              INTEGER NOT NULL,
    row_hash             TEXT NOT NULL,
    loaded_at            TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_product (
    product_key          INTEGER PRIMARY KEY,
    product_id           INTEGER NOT NULL,
    product_name         TEXT NOT NULL,
    price                REAL NOT NULL,
    description          TEXT NOT NULL,
    product_category     TEXT NOT NULL,
    product_image_url    TEXT NOT NULL,
    rating_rate          REAL NOT NULL,
    rating_count         INTEGER NOT NULL,
    effective_start_date TEXT NOT NULL,
    effective_end_date   TEXT NOT NULL,
    is_current           INTEGER NOT NULL,
    version              INTEGER NOT NULL,
    row_hash             TEXT NOT NULL,
    loaded_at            TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS dim_product_category (
    category_key      INTEGER PRIMARY KEY,
    category_name     TEXT NOT NULL,
    category_source   TEXT NOT NULL,
    category_group    TEXT NOT NULL,
    loaded_at         TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS fact_sales (
    sales_key         INTEGER PRIMARY KEY,
    transaction_id    INTEGER NOT NULL,
    date_key          INTEGER NOT NULL,
    customer_key      INTEGER NOT NULL,
    category_key      INTEGER NOT NULL,
    quantity          INTEGER NOT NULL,
    price_per_unit    REAL NOT NULL,
    total_amount      REAL NOT NULL,
    customer_id       TEXT NOT NULL,
    product_category  TEXT NOT NULL,
    gender            TEXT NOT NULL,
    age               INTEGER NOT NULL,
    source            TEXT NOT NULL,
    extracted_at      TEXT NOT NULL,
    loaded_at         TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS mart_sales_performance (
    year               INTEGER NOT NULL,
    month              INTEGER NOT NULL,
    month_name         TEXT NOT NULL,
    total_revenue      REAL NOT NULL,
    total_transactions INTEGER NOT NULL,
    total_quantity     INTEGER NOT NULL,
    avg_order_value    REAL NOT NULL,
    unique_customers   INTEGER NOT NULL,
    revenue_prev_month REAL,
    revenue_growth_pct REAL,
    generated_at       TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS mart_category_analysis (
    product_category   TEXT NOT NULL,
    category_group     TEXT NOT NULL,
    total_revenue      REAL NOT NULL,
    total_transactions INTEGER NOT NULL,
    total_quantity     INTEGER NOT NULL,
    avg_price          REAL NOT NULL,
    avg_order_value    REAL NOT NULL,
    unique_customers   INTEGER NOT NULL,
    avg_customer_age   REAL NOT NULL,
    revenue_share_pct  REAL,
    female_revenue_pct REAL,
    male_revenue_pct   REAL,
    generated_at       TEXT NOT NULL
);
"#;

impl SqliteWarehouse {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        info!(path = %path.display(), "warehouse opened");
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl Warehouse for SqliteWarehouse {
    async fn append_staging_sales(&self, rows: &[SalesRecord]) -> Result<usize> {
        let table = tables::STG_RETAIL_SALES;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "INSERT INTO stg_retail_sales (transaction_id, sale_date, customer_id, gender, \
                 age, product_category, quantity, price_per_unit, total_amount, source, \
                 extracted_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )
            .map_err(|e| load_err(table, e))?;
        for row in rows {
            stmt.execute(params![
                row.transaction_id,
                row.date.to_string(),
                row.customer_id,
                row.gender,
                row.age,
                row.product_category,
                row.quantity,
                row.price_per_unit,
                row.total_amount,
                row.source.as_str(),
                row.extracted_at.to_rfc3339(),
            ])
            .map_err(|e| load_err(table, e))?;
        }
        debug!(rows = rows.len(), "appended to {table}");
        Ok(rows.len())
    }

    async fn append_staging_products(&self, rows: &[ProductRecord]) -> Result<usize> {
        let table = tables::STG_API_PRODUCTS;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "INSERT INTO stg_api_products (product_id, title, price, description, category, \
                 image_url, rating_rate, rating_count, source, extracted_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )
            .map_err(|e| load_err(table, e))?;
        for row in rows {
            stmt.execute(params![
                row.product_id,
                row.title,
                row.price,
                row.description,
                row.category,
                row.image_url,
                row.rating_rate,
                row.rating_count,
                row.source.as_str(),
                row.extracted_at.to_rfc3339(),
            ])
            .map_err(|e| load_err(table, e))?;
        }
        debug!(rows = rows.len(), "appended to {table}");
        Ok(rows.len())
    }

    async fn replace_dim_date(&self, rows: &[DateDimRow]) -> Result<usize> {
        let table = tables::DIM_DATE;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| load_err(table, e))?;
        tx.execute("DELETE FROM dim_date", []).map_err(|e| load_err(table, e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO dim_date (date_key, full_date, year, quarter, month, month_name, \
                     week_of_year, day_of_month, day_of_week, day_name, is_weekend, fiscal_year, \
                     fiscal_quarter) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .map_err(|e| load_err(table, e))?;
            for row in rows {
                stmt.execute(params![
                    row.date_key,
                    row.full_date.to_string(),
                    row.year,
                    row.quarter,
                    row.month,
                    row.month_name,
                    row.week_of_year,
                    row.day_of_month,
                    row.day_of_week,
                    row.day_name,
                    row.is_weekend,
                    row.fiscal_year,
                    row.fiscal_quarter,
                ])
                .map_err(|e| load_err(table, e))?;
            }
        }
        tx.commit().map_err(|e| load_err(table, e))?;
        Ok(rows.len())
    }

    async fn replace_dim_product_category(&self, rows: &[CategoryDimRow]) -> Result<usize> {
        let table = tables::DIM_PRODUCT_CATEGORY;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| load_err(table, e))?;
        tx.execute("DELETE FROM dim_product_category", [])
            .map_err(|e| load_err(table, e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO dim_product_category (category_key, category_name, \
                     category_source, category_group, loaded_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .map_err(|e| load_err(table, e))?;
            for row in rows {
                stmt.execute(params![
                    row.category_key,
                    row.category_name,
                    row.category_source,
                    row.category_group,
                    row.loaded_at.to_rfc3339(),
                ])
                .map_err(|e| load_err(table, e))?;
            }
        }
        tx.commit().map_err(|e| load_err(table, e))?;
        Ok(rows.len())
    }

    async fn replace_dim_customer(&self, rows: &[CustomerDimRow]) -> Result<usize> {
        let table = tables::DIM_CUSTOMER;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| load_err(table, e))?;
        tx.execute("DELETE FROM dim_customer", []).map_err(|e| load_err(table, e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO dim_customer (customer_key, customer_id, gender, age, age_group, \
                     customer_segment, first_purchase_date, last_purchase_date, \
                     total_transactions, effective_start_date, effective_end_date, is_current, \
                     version, row_hash, loaded_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                )
                .map_err(|e| load_err(table, e))?;
            for row in rows {
                stmt.execute(params![
                    row.customer_key,
                    row.customer_id,
                    row.gender,
                    row.age,
                    row.age_group,
                    row.customer_segment,
                    row.first_purchase_date.to_string(),
                    row.last_purchase_date.to_string(),
                    row.total_transactions,
                    row.effective_start_date.to_rfc3339(),
                    row.effective_end_date.to_rfc3339(),
                    row.is_current,
                    row.version,
                    row.row_hash,
                    row.loaded_at.to_rfc3339(),
                ])
                .map_err(|e| load_err(table, e))?;
            }
        }
        tx.commit().map_err(|e| load_err(table, e))?;
        Ok(rows.len())
    }

    async fn fetch_dim_customer(&self) -> Result<Vec<CustomerDimRow>> {
        let table = tables::DIM_CUSTOMER;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT customer_key, customer_id, gender, age, age_group, customer_segment, \
                 first_purchase_date, last_purchase_date, total_transactions, \
                 effective_start_date, effective_end_date, is_current, version, row_hash, \
                 loaded_at FROM dim_customer ORDER BY customer_id, version",
            )
            .map_err(|e| load_err(table, e))?;
        let mapped = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, i64>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, String>(7)?,
                    r.get::<_, i64>(8)?,
                    r.get::<_, String>(9)?,
                    r.get::<_, String>(10)?,
                    r.get::<_, bool>(11)?,
                    r.get::<_, i64>(12)?,
                    r.get::<_, String>(13)?,
                    r.get::<_, String>(14)?,
                ))
            })
            .map_err(|e| load_err(table, e))?;

        let mut rows = Vec::new();
        for item in mapped {
            let (
                customer_key,
                customer_id,
                gender,
                age,
                age_group,
                customer_segment,
                first_purchase,
                last_purchase,
                total_transactions,
                start,
                end,
                is_current,
                version,
                row_hash,
                loaded_at,
            ) = item.map_err(|e| load_err(table, e))?;
            rows.push(CustomerDimRow {
                customer_key,
                customer_id,
                gender,
                age,
                age_group,
                customer_segment,
                first_purchase_date: parse_date(table, &first_purchase)?,
                last_purchase_date: parse_date(table, &last_purchase)?,
                total_transactions,
                effective_start_date: parse_timestamp(table, &start)?,
                effective_end_date: parse_timestamp(table, &end)?,
                is_current,
                version,
                row_hash,
                loaded_at: parse_timestamp(table, &loaded_at)?,
            });
        }
        Ok(rows)
    }

    async fn replace_dim_product(&self, rows: &[ProductDimRow]) -> Result<usize> {
        let table = tables::DIM_PRODUCT;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| load_err(table, e))?;
        tx.execute("DELETE FROM dim_product", []).map_err(|e| load_err(table, e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO dim_product (product_key, product_id, product_name, price, \
                     description, product_category, product_image_url, rating_rate, rating_count, \
                     effective_start_date, effective_end_date, is_current, version, row_hash, \
                     loaded_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                )
                .map_err(|e| load_err(table, e))?;
            for row in rows {
                stmt.execute(params![
                    row.product_key,
                    row.product_id,
                    row.product_name,
                    row.price,
                    row.description,
                    row.product_category,
                    row.product_image_url,
                    row.rating_rate,
                    row.rating_count,
                    row.effective_start_date.to_rfc3339(),
                    row.effective_end_date.to_rfc3339(),
                    row.is_current,
                    row.version,
                    row.row_hash,
                    row.loaded_at.to_rfc3339(),
                ])
                .map_err(|e| load_err(table, e))?;
            }
        }
        tx.commit().map_err(|e| load_err(table, e))?;
        Ok(rows.len())
    }

    async fn fetch_dim_product(&self) -> Result<Vec<ProductDimRow>> {
        let table = tables::DIM_PRODUCT;
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT product_key, product_id, product_name, price, description, \
                 product_category, product_image_url, rating_rate, rating_count, \
                 effective_start_date, effective_end_date, is_current, version, row_hash, \
                 loaded_at FROM dim_product ORDER BY product_id, version",
            )
            .map_err(|e| load_err(table, e))?;
        let mapped = stmt
            .query_map([], |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, f64>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                    r.get::<_, String>(6)?,
                    r.get::<_, f64>(7)?,
                    r.get::<_, i64>(8)?,
                    r.get::<_, String>(9)?,
                    r.get::<_, String>(10)?,
                    r.get::<_, bool>(11)?,
                    r.get::<_, i64>(12)?,
                    r.get::<_, String>(13)?,
                    r.get::<_, String>(14)?,
                ))
            })
            .map_err(|e| load_err(table, e))?;

        let mut rows = Vec::new();
        for item in mapped {
            let (
                product_key,
                product_id,
                product_name,
                price,
                description,
                product_category,
                product_image_url,
                rating_rate,
                rating_count,
                start,
                end,
                is_current,
                version,
                row_hash,
                loaded_at,
            ) = item.map_err(|e| load_err(table, e))?;
            rows.push(ProductDimRow {
                product_key,
                product_id,
                product_name,
                price,
                description,
                product_category,
                product_image_url,
                rating_rate,
                rating_count,
                effective_start_date: parse_timestamp(table, &start)?,
                effective_end_date: parse_timestamp(table, &end)?,
                is_current,
                version,
                row_hash,
                loaded_at: parse_timestamp(table, &loaded_at)?,
            });
        }
        Ok(rows)
    }

    async fn replace_fact_sales(&self, rows: &[FactSalesRow]) -> Result<usize> {
        let table = tables::FACT_SALES;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| load_err(table, e))?;
        tx.execute("DELETE FROM fact_sales", []).map_err(|e| load_err(table, e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO fact_sales (sales_key, transaction_id, date_key, customer_key, \
                     category_key, quantity, price_per_unit, total_amount, customer_id, \
                     product_category, gender, age, source, extracted_at, loaded_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                )
                .map_err(|e| load_err(table, e))?;
            for row in rows {
                stmt.execute(params![
                    row.sales_key,
                    row.transaction_id,
                    row.date_key,
                    row.customer_key,
                    row.category_key,
                    row.quantity,
                    row.price_per_unit,
                    row.total_amount,
                    row.customer_id,
                    row.product_category,
                    row.gender,
                    row.age,
                    row.source.as_str(),
                    row.extracted_at.to_rfc3339(),
                    row.loaded_at.to_rfc3339(),
                ])
                .map_err(|e| load_err(table, e))?;
            }
        }
        tx.commit().map_err(|e| load_err(table, e))?;
        Ok(rows.len())
    }

    async fn replace_mart_sales_performance(&self, rows: &[SalesPerformanceRow]) -> Result<usize> {
        let table = tables::MART_SALES_PERFORMANCE;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| load_err(table, e))?;
        tx.execute("DELETE FROM mart_sales_performance", [])
            .map_err(|e| load_err(table, e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO mart_sales_performance (year, month, month_name, total_revenue, \
                     total_transactions, total_quantity, avg_order_value, unique_customers, \
                     revenue_prev_month, revenue_growth_pct, generated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                )
                .map_err(|e| load_err(table, e))?;
            for row in rows {
                stmt.execute(params![
                    row.year,
                    row.month,
                    row.month_name,
                    row.total_revenue,
                    row.total_transactions,
                    row.total_quantity,
                    row.avg_order_value,
                    row.unique_customers,
                    row.revenue_prev_month,
                    row.revenue_growth_pct,
                    row.generated_at.to_rfc3339(),
                ])
                .map_err(|e| load_err(table, e))?;
            }
        }
        tx.commit().map_err(|e| load_err(table, e))?;
        Ok(rows.len())
    }

    async fn replace_mart_category_analysis(&self, rows: &[CategoryAnalysisRow]) -> Result<usize> {
        let table = tables::MART_CATEGORY_ANALYSIS;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction().map_err(|e| load_err(table, e))?;
        tx.execute("DELETE FROM mart_category_analysis", [])
            .map_err(|e| load_err(table, e))?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO mart_category_analysis (product_category, category_group, \
                     total_revenue, total_transactions, total_quantity, avg_price, \
                     avg_order_value, unique_customers, avg_customer_age, revenue_share_pct, \
                     female_revenue_pct, male_revenue_pct, generated_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                )
                .map_err(|e| load_err(table, e))?;
            for row in rows {
                stmt.execute(params![
                    row.product_category,
                    row.category_group,
                    row.total_revenue,
                    row.total_transactions,
                    row.total_quantity,
                    row.avg_price,
                    row.avg_order_value,
                    row.unique_customers,
                    row.avg_customer_age,
                    row.revenue_share_pct,
                    row.female_revenue_pct,
                    row.male_revenue_pct,
                    row.generated_at.to_rfc3339(),
                ])
                .map_err(|e| load_err(table, e))?;
            }
        }
        tx.commit().map_err(|e| load_err(table, e))?;
        Ok(rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::open_ended_end_date;
    use chrono::Utc;
    use tempfile::tempdir;

    fn sale(transaction_id: i64) -> SalesRecord {
        SalesRecord {
            transaction_id,
            date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            customer_id: "CUST001".to_string(),
            gender: "Female".to_string(),
            age: 34,
            product_category: "Beauty".to_string(),
            quantity: 2,
            price_per_unit: 25.0,
            total_amount: 50.0,
            source: SourceTag::RetailCsv,
            extracted_at: Utc::now(),
        }
    }

    fn customer_version(key: i64, version: i64, is_current: bool) -> CustomerDimRow {
        CustomerDimRow {
            customer_key: key,
            customer_id: "CUST001".to_string(),
            gender: "Female".to_string(),
            age: 34,
            age_group: "26-35".to_string(),
            customer_segment: "New".to_string(),
            first_purchase_date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            last_purchase_date: NaiveDate::from_ymd_opt(2023, 5, 1).unwrap(),
            total_transactions: 1,
            effective_start_date: Utc::now(),
            effective_end_date: open_ended_end_date(),
            is_current,
            version,
            row_hash: format!("hash-{version}"),
            loaded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn staging_accumulates_across_runs() {
        let dir = tempdir().unwrap();
        let wh = SqliteWarehouse::open(&dir.path().join("dw.sqlite")).unwrap();
        wh.append_staging_sales(&[sale(1), sale(2)]).await.unwrap();
        wh.append_staging_sales(&[sale(3)]).await.unwrap();

        let conn = wh.conn.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM stg_retail_sales", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn dim_customer_round_trips_through_replace_and_fetch() {
        let dir = tempdir().unwrap();
        let wh = SqliteWarehouse::open(&dir.path().join("dw.sqlite")).unwrap();
        let rows = vec![customer_version(1, 1, false), customer_version(2, 2, true)];
        wh.replace_dim_customer(&rows).await.unwrap();

        let fetched = wh.fetch_dim_customer().await.unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].version, 1);
        assert!(!fetched[0].is_current);
        assert_eq!(fetched[1].version, 2);
        assert!(fetched[1].is_current);
        assert_eq!(fetched[1].row_hash, "hash-2");
        assert_eq!(fetched[1].effective_end_date, open_ended_end_date());
    }

    #[tokio::test]
    async fn replace_is_idempotent() {
        let dir = tempdir().unwrap();
        let wh = SqliteWarehouse::open(&dir.path().join("dw.sqlite")).unwrap();
        let rows = vec![customer_version(1, 1, true)];
        wh.replace_dim_customer(&rows).await.unwrap();
        wh.replace_dim_customer(&rows).await.unwrap();
        assert_eq!(wh.fetch_dim_customer().await.unwrap().len(), 1);
    }
}
