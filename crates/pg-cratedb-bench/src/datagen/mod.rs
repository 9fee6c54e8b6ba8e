//! Synthetic dataset generation.
//!
//! Every table gets `record_count` rows with 1-based sequential ids. Foreign
//! key columns draw uniformly from the id range of the referenced table, so
//! joins in the bench queries always find partners.

mod faker;

pub use faker::{now_utc, Faker, FIVE_YEARS_DAYS};

use rand::Rng;
use tracing::info;

use crate::error::{BenchError, Result};
use crate::schema::{self, TableDef};
use crate::value::{SqlValue, ValueRow};

pub const CUSTOMER_STATUSES: &[&str] = &["active", "inactive", "pending"];

pub const PRODUCT_CATEGORIES: &[&str] = &[
    "Electronics",
    "Clothing",
    "Books",
    "Home",
    "Sports",
    "Food",
    "Toys",
    "Automotive",
    "Beauty",
    "Garden",
];

pub const ORDER_STATUSES: &[&str] = &["completed", "processing", "shipped", "cancelled"];

pub const WAREHOUSES: &[&str] = &[
    "North",
    "South",
    "East",
    "West",
    "Central",
    "Online Fulfillment",
];

/// Maximum length of a product description.
pub const DESCRIPTION_MAX_CHARS: usize = 200;

/// Generated rows for one table.
#[derive(Debug, Clone)]
pub struct TableData {
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<ValueRow>,
}

impl TableData {
    fn new(def: &TableDef, rows: Vec<ValueRow>) -> Self {
        Self {
            table: def.name,
            columns: def.column_names(),
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn money_between(faker: &mut Faker, low: f64, high: f64) -> SqlValue {
    SqlValue::money(faker.rng().gen_range(low..=high))
}

/// INTEGER id column value. Ids past `i32::MAX` are rejected, never wrapped.
pub fn id(n: usize) -> Result<SqlValue> {
    i32::try_from(n)
        .map(SqlValue::Int)
        .map_err(|_| BenchError::Generate(format!("id {} exceeds the INTEGER id range", n)))
}

fn random_id(faker: &mut Faker, max: usize) -> Result<SqlValue> {
    id(faker.rng().gen_range(1..=max.max(1)))
}

/// Customer rows starting at `first_id`.
pub fn customers_from(faker: &mut Faker, first_id: usize, count: usize) -> Result<Vec<ValueRow>> {
    (0..count)
        .map(|i| {
            Ok(vec![
                id(first_id.saturating_add(i))?,
                SqlValue::Text(faker.name()),
                SqlValue::Text(faker.unique_email()),
                SqlValue::Timestamp(faker.recent_date_time()),
                SqlValue::text(faker.choice(CUSTOMER_STATUSES)),
            ])
        })
        .collect()
}

pub fn customers(faker: &mut Faker, count: usize) -> Result<Vec<ValueRow>> {
    customers_from(faker, 1, count)
}

pub fn products(faker: &mut Faker, count: usize) -> Result<Vec<ValueRow>> {
    (1..=count)
        .map(|n| {
            let word = faker.word();
            let name = format!("{}{} {}", word[..1].to_uppercase(), &word[1..], faker.color_name());
            Ok(vec![
                id(n)?,
                SqlValue::Text(name),
                SqlValue::Text(faker.text(DESCRIPTION_MAX_CHARS)),
                money_between(faker, 9.99, 999.99),
                SqlValue::text(faker.choice(PRODUCT_CATEGORIES)),
            ])
        })
        .collect()
}

pub fn orders(faker: &mut Faker, count: usize, customer_count: usize) -> Result<Vec<ValueRow>> {
    (1..=count)
        .map(|n| {
            Ok(vec![
                id(n)?,
                random_id(faker, customer_count)?,
                SqlValue::Timestamp(faker.recent_date_time()),
                money_between(faker, 10.0, 5000.0),
                SqlValue::text(faker.choice(ORDER_STATUSES)),
            ])
        })
        .collect()
}

pub fn order_items(
    faker: &mut Faker,
    count: usize,
    order_count: usize,
    product_count: usize,
) -> Result<Vec<ValueRow>> {
    (1..=count)
        .map(|n| {
            Ok(vec![
                id(n)?,
                random_id(faker, order_count)?,
                random_id(faker, product_count)?,
                SqlValue::Int(faker.rng().gen_range(1..=10)),
                money_between(faker, 9.99, 499.99),
            ])
        })
        .collect()
}

pub fn inventory(faker: &mut Faker, count: usize, product_count: usize) -> Result<Vec<ValueRow>> {
    (1..=count)
        .map(|n| {
            Ok(vec![
                id(n)?,
                random_id(faker, product_count)?,
                SqlValue::Int(faker.rng().gen_range(0..=1000)),
                SqlValue::text(faker.choice(WAREHOUSES)),
                SqlValue::Timestamp(faker.recent_date_time()),
            ])
        })
        .collect()
}

/// All five tables, in catalog order.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub tables: Vec<TableData>,
}

impl Dataset {
    /// Generate `record_count` rows for every table.
    pub fn generate(record_count: usize, faker: &mut Faker) -> Result<Self> {
        if record_count == 0 {
            return Err(BenchError::Generate(
                "record_count must be at least 1".into(),
            ));
        }
        if record_count > i32::MAX as usize {
            return Err(BenchError::Generate(format!(
                "record_count {} exceeds the INTEGER id range",
                record_count
            )));
        }

        let mut tables = Vec::with_capacity(5);
        for def in schema::catalog() {
            info!("Generating {} {}...", record_count, def.name);
            let rows = match def.name {
                schema::CUSTOMERS => customers(faker, record_count)?,
                schema::PRODUCTS => products(faker, record_count)?,
                schema::ORDERS => orders(faker, record_count, record_count)?,
                schema::ORDER_ITEMS => {
                    order_items(faker, record_count, record_count, record_count)?
                }
                schema::INVENTORY => inventory(faker, record_count, record_count)?,
                other => {
                    return Err(BenchError::Generate(format!(
                        "no generator for table '{}'",
                        other
                    )))
                }
            };
            tables.push(TableData::new(&def, rows));
        }

        Ok(Self { tables })
    }

    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(TableData::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::collections::HashSet;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn in_money_range(v: &SqlValue, low: &str, high: &str) -> bool {
        match v {
            SqlValue::Decimal(d) => *d >= dec(low) && *d <= dec(high) && d.scale() <= 2,
            _ => false,
        }
    }

    #[test]
    fn test_zero_records_is_an_error() {
        let mut faker = Faker::seeded(1);
        assert!(matches!(
            Dataset::generate(0, &mut faker),
            Err(BenchError::Generate(_))
        ));
    }

    #[test]
    fn test_dataset_shape_follows_catalog() {
        let mut faker = Faker::seeded(1);
        let dataset = Dataset::generate(50, &mut faker).unwrap();
        assert_eq!(dataset.tables.len(), 5);
        assert_eq!(dataset.total_rows(), 250);

        for (data, def) in dataset.tables.iter().zip(schema::catalog()) {
            assert_eq!(data.table, def.name);
            assert_eq!(data.columns, def.column_names());
            for row in &data.rows {
                assert_eq!(row.len(), def.columns.len());
            }
        }
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut faker = Faker::seeded(2);
        let dataset = Dataset::generate(20, &mut faker).unwrap();
        for data in &dataset.tables {
            let ids: Vec<i64> = data.rows.iter().map(|r| r[0].as_i64().unwrap()).collect();
            assert_eq!(ids, (1..=20).collect::<Vec<i64>>(), "{}", data.table);
        }
    }

    #[test]
    fn test_customer_values() {
        let mut faker = Faker::seeded(3);
        let rows = customers(&mut faker, 500).unwrap();
        let emails: HashSet<_> = rows.iter().map(|r| r[2].to_string()).collect();
        assert_eq!(emails.len(), 500);
        for row in &rows {
            assert!(CUSTOMER_STATUSES.contains(&row[4].as_str().unwrap()));
            assert!(matches!(row[3], SqlValue::Timestamp(_)));
        }
    }

    #[test]
    fn test_customers_from_offset() {
        let mut faker = Faker::seeded(3);
        let rows = customers_from(&mut faker, 1_001, 3).unwrap();
        assert_eq!(rows[0][0].as_i64(), Some(1_001));
        assert_eq!(rows[2][0].as_i64(), Some(1_003));
    }

    #[test]
    fn test_ids_past_integer_range_are_rejected() {
        let max = i32::MAX as usize;
        assert_eq!(id(max).unwrap(), SqlValue::Int(i32::MAX));
        assert!(matches!(id(max + 1), Err(BenchError::Generate(_))));

        let mut faker = Faker::seeded(3);
        assert!(customers_from(&mut faker, max, 1).is_ok());
        assert!(matches!(
            customers_from(&mut faker, max, 2),
            Err(BenchError::Generate(_))
        ));
    }

    #[test]
    fn test_product_values() {
        let mut faker = Faker::seeded(4);
        for row in products(&mut faker, 200).unwrap() {
            assert_eq!(row[1].as_str().unwrap().split(' ').count(), 2);
            assert!(row[2].as_str().unwrap().len() <= DESCRIPTION_MAX_CHARS);
            assert!(in_money_range(&row[3], "9.99", "999.99"));
            assert!(PRODUCT_CATEGORIES.contains(&row[4].as_str().unwrap()));
        }
    }

    #[test]
    fn test_foreign_keys_stay_in_range() {
        let mut faker = Faker::seeded(5);
        for row in orders(&mut faker, 300, 7).unwrap() {
            let customer = row[1].as_i64().unwrap();
            assert!((1..=7).contains(&customer));
            assert!(in_money_range(&row[3], "10.00", "5000.00"));
            assert!(ORDER_STATUSES.contains(&row[4].as_str().unwrap()));
        }
        for row in order_items(&mut faker, 300, 4, 9).unwrap() {
            assert!((1..=4).contains(&row[1].as_i64().unwrap()));
            assert!((1..=9).contains(&row[2].as_i64().unwrap()));
            assert!((1..=10).contains(&row[3].as_i64().unwrap()));
            assert!(in_money_range(&row[4], "9.99", "499.99"));
        }
        for row in inventory(&mut faker, 300, 3).unwrap() {
            assert!((1..=3).contains(&row[1].as_i64().unwrap()));
            assert!((0..=1000).contains(&row[2].as_i64().unwrap()));
            assert!(WAREHOUSES.contains(&row[3].as_str().unwrap()));
        }
    }

    #[test]
    fn test_seed_reproduces_dataset() {
        let a = Dataset::generate(30, &mut Faker::seeded(99)).unwrap();
        let b = Dataset::generate(30, &mut Faker::seeded(99)).unwrap();
        for (x, y) in a.tables.iter().zip(&b.tables) {
            // Timestamps depend on the clock; compare everything else.
            for (rx, ry) in x.rows.iter().zip(&y.rows) {
                for (vx, vy) in rx.iter().zip(ry) {
                    if !matches!(vx, SqlValue::Timestamp(_)) {
                        assert_eq!(vx, vy);
                    }
                }
            }
        }
    }
}
