use crate::pipeline::dimensions::month_name;
use chrono::{DateTime, Utc};
use rdw_core::domain::{CategoryAnalysisRow, CategoryDimRow, FactSalesRow, SalesPerformanceRow};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::info;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Default)]
struct MonthAgg {
    revenue: f64,
    quantity: i64,
    row_count: usize,
    transactions: BTreeSet<i64>,
    customers: BTreeSet<String>,
}

/// Monthly sales performance with month-over-month growth via a lag over the
/// ordered month sequence.
pub fn build_mart_sales_performance(
    facts: &[FactSalesRow],
    generated_at: DateTime<Utc>,
) -> Vec<SalesPerformanceRow> {
    let mut months: BTreeMap<(i32, u32), MonthAgg> = BTreeMap::new();
    for fact in facts {
        let year = (fact.date_key / 10_000) as i32;
        let month = ((fact.date_key / 100) % 100) as u32;
        let agg = months.entry((year, month)).or_default();
        agg.revenue += fact.total_amount;
        agg.quantity += fact.quantity;
        agg.row_count += 1;
        agg.transactions.insert(fact.transaction_id);
        agg.customers.insert(fact.customer_id.clone());
    }

    let mut rows = Vec::with_capacity(months.len());
    let mut prev_revenue: Option<f64> = None;
    for ((year, month), agg) in months {
        let growth = match prev_revenue {
            Some(prev) if prev != 0.0 => Some(round2((agg.revenue - prev) / prev * 100.0)),
            _ => None,
        };
        rows.push(SalesPerformanceRow {
            year,
            month,
            month_name: month_name(month).to_string(),
            total_revenue: agg.revenue,
            total_transactions: agg.transactions.len() as i64,
            total_quantity: agg.quantity,
            avg_order_value: round2(agg.revenue / agg.row_count as f64),
            unique_customers: agg.customers.len() as i64,
            revenue_prev_month: prev_revenue,
            revenue_growth_pct: growth,
            generated_at,
        });
        prev_revenue = Some(agg.revenue);
    }

    info!(months = rows.len(), "built sales performance mart");
    rows
}

#[derive(Default)]
struct CategoryAgg {
    revenue: f64,
    quantity: i64,
    row_count: usize,
    price_sum: f64,
    age_sum: i64,
    transactions: BTreeSet<i64>,
    customers: BTreeSet<String>,
    female_revenue: f64,
    male_revenue: f64,
}

/// Per-category analytics: revenue share and gender split across the run's
/// facts, with the category group joined from the category dimension.
pub fn build_mart_category_analysis(
    facts: &[FactSalesRow],
    dim_category: &[CategoryDimRow],
    generated_at: DateTime<Utc>,
) -> Vec<CategoryAnalysisRow> {
    let groups: HashMap<&str, &str> = dim_category
        .iter()
        .map(|row| (row.category_name.as_str(), row.category_group.as_str()))
        .collect();

    let mut categories: BTreeMap<String, CategoryAgg> = BTreeMap::new();
    for fact in facts {
        let agg = categories.entry(fact.product_category.clone()).or_default();
        agg.revenue += fact.total_amount;
        agg.quantity += fact.quantity;
        agg.row_count += 1;
        agg.price_sum += fact.price_per_unit;
        agg.age_sum += fact.age;
        agg.transactions.insert(fact.transaction_id);
        agg.customers.insert(fact.customer_id.clone());
        match fact.gender.as_str() {
            "Female" => agg.female_revenue += fact.total_amount,
            "Male" => agg.male_revenue += fact.total_amount,
            _ => {}
        }
    }

    let total_revenue: f64 = categories.values().map(|agg| agg.revenue).sum();

    let rows: Vec<CategoryAnalysisRow> = categories
        .into_iter()
        .map(|(name, agg)| {
            let share = if total_revenue != 0.0 {
                Some(round2(agg.revenue / total_revenue * 100.0))
            } else {
                None
            };
            let gendered = agg.female_revenue + agg.male_revenue;
            let (female_pct, male_pct) = if gendered != 0.0 {
                let female = round2(agg.female_revenue / gendered * 100.0);
                (Some(female), Some(round2(100.0 - female)))
            } else {
                (None, None)
            };
            CategoryAnalysisRow {
                category_group: groups.get(name.as_str()).unwrap_or(&"Other").to_string(),
                product_category: name,
                total_revenue: agg.revenue,
                total_transactions: agg.transactions.len() as i64,
                total_quantity: agg.quantity,
                avg_price: round2(agg.price_sum / agg.row_count as f64),
                avg_order_value: round2(agg.revenue / agg.row_count as f64),
                unique_customers: agg.customers.len() as i64,
                avg_customer_age: round2(agg.age_sum as f64 / agg.row_count as f64),
                revenue_share_pct: share,
                female_revenue_pct: female_pct,
                male_revenue_pct: male_pct,
                generated_at,
            }
        })
        .collect();

    info!(categories = rows.len(), "built category analysis mart");
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdw_core::domain::SourceTag;

    fn fact(
        txn: i64,
        date_key: i64,
        customer: &str,
        category: &str,
        gender: &str,
        total: f64,
    ) -> FactSalesRow {
        FactSalesRow {
            sales_key: txn,
            transaction_id: txn,
            date_key,
            customer_key: 1,
            category_key: 1,
            quantity: 1,
            price_per_unit: total,
            total_amount: total,
            customer_id: customer.to_string(),
            product_category: category.to_string(),
            gender: gender.to_string(),
            age: 30,
            source: SourceTag::RetailCsv,
            extracted_at: Utc::now(),
            loaded_at: Utc::now(),
        }
    }

    #[test]
    fn monthly_mart_computes_lagged_growth() {
        let facts = vec![
            fact(1, 20230115, "C1", "Beauty", "Female", 100.0),
            fact(2, 20230210, "C1", "Beauty", "Female", 150.0),
            fact(3, 20230211, "C2", "Beauty", "Male", 50.0),
        ];
        let rows = build_mart_sales_performance(&facts, Utc::now());
        assert_eq!(rows.len(), 2);

        let january = &rows[0];
        assert_eq!(january.month_name, "January");
        assert_eq!(january.revenue_prev_month, None);
        assert_eq!(january.revenue_growth_pct, None);

        let february = &rows[1];
        assert_eq!(february.total_revenue, 200.0);
        assert_eq!(february.revenue_prev_month, Some(100.0));
        assert_eq!(february.revenue_growth_pct, Some(100.0));
        assert_eq!(february.unique_customers, 2);
    }

    #[test]
    fn monthly_mart_orders_across_year_boundaries() {
        let facts = vec![
            fact(1, 20240105, "C1", "Beauty", "Female", 10.0),
            fact(2, 20231201, "C1", "Beauty", "Female", 20.0),
        ];
        let rows = build_mart_sales_performance(&facts, Utc::now());
        assert_eq!((rows[0].year, rows[0].month), (2023, 12));
        assert_eq!((rows[1].year, rows[1].month), (2024, 1));
        assert_eq!(rows[1].revenue_prev_month, Some(20.0));
        assert_eq!(rows[1].revenue_growth_pct, Some(-50.0));
    }

    #[test]
    fn revenue_shares_sum_to_one_hundred() {
        let facts = vec![
            fact(1, 20230101, "C1", "Beauty", "Female", 33.0),
            fact(2, 20230102, "C2", "Clothing", "Male", 41.5),
            fact(3, 20230103, "C3", "Electronics", "Female", 25.5),
        ];
        let rows = build_mart_category_analysis(&facts, &[], Utc::now());
        let total_share: f64 = rows.iter().filter_map(|r| r.revenue_share_pct).sum();
        assert!((total_share - 100.0).abs() < 0.05, "shares summed to {total_share}");
    }

    #[test]
    fn gender_split_percentages_are_complementary() {
        let facts = vec![
            fact(1, 20230101, "C1", "Beauty", "Female", 75.0),
            fact(2, 20230102, "C2", "Beauty", "Male", 25.0),
        ];
        let rows = build_mart_category_analysis(&facts, &[], Utc::now());
        assert_eq!(rows[0].female_revenue_pct, Some(75.0));
        assert_eq!(rows[0].male_revenue_pct, Some(25.0));
    }

    #[test]
    fn category_group_joins_from_the_dimension() {
        let dim = vec![CategoryDimRow {
            category_key: 1,
            category_name: "Beauty".to_string(),
            category_source: "retail".to_string(),
            category_group: "Beauty & Accessories".to_string(),
            loaded_at: Utc::now(),
        }];
        let facts = vec![fact(1, 20230101, "C1", "Beauty", "Female", 10.0)];
        let rows = build_mart_category_analysis(&facts, &dim, Utc::now());
        assert_eq!(rows[0].category_group, "Beauty & Accessories");
    }

    #[test]
    fn empty_facts_yield_empty_marts() {
        assert!(build_mart_sales_performance(&[], Utc::now()).is_empty());
        assert!(build_mart_category_analysis(&[], &[], Utc::now()).is_empty());
    }
}
