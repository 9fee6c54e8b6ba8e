//! Table catalog shared by both engines.
//!
//! The five demo tables are described once as [`TableDef`] values and rendered
//! to engine-specific DDL by a [`Dialect`]. CrateDB does not enforce foreign
//! keys, so none are declared on either side.

mod dialect;

pub use dialect::{CrateDialect, Dialect, DialectImpl, PostgresDialect};

/// Logical column type, mapped to a concrete type by each dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Varchar(u32),
    Text,
    Numeric(u8, u8),
    Timestamp,
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
}

/// A secondary index declared inline in CrateDB DDL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrateIndex {
    pub name: &'static str,
    pub column: &'static str,
}

/// Table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: Vec<Column>,
    pub primary_key: &'static str,
    /// BTREE indexes (CrateDB only; PostgreSQL relies on the primary key).
    pub crate_indexes: Vec<CrateIndex>,
    /// Column carrying a FULLTEXT index in CrateDB.
    pub fulltext: Option<&'static str>,
}

impl TableDef {
    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub const CUSTOMERS: &str = "customers";
pub const PRODUCTS: &str = "products";
pub const ORDERS: &str = "orders";
pub const ORDER_ITEMS: &str = "order_items";
pub const INVENTORY: &str = "inventory";

/// Order in which tables are emptied before a reload.
pub const CLEANUP_ORDER: [&str; 5] = [ORDER_ITEMS, ORDERS, INVENTORY, PRODUCTS, CUSTOMERS];

fn col(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

/// The demo catalog, in creation order.
pub fn catalog() -> Vec<TableDef> {
    use ColumnType::*;

    vec![
        TableDef {
            name: CUSTOMERS,
            columns: vec![
                col("customer_id", Integer),
                col("name", Varchar(100)),
                col("email", Varchar(100)),
                col("registration_date", Timestamp),
                col("status", Varchar(20)),
            ],
            primary_key: "customer_id",
            crate_indexes: vec![CrateIndex {
                name: "status_idx",
                column: "status",
            }],
            fulltext: None,
        },
        TableDef {
            name: PRODUCTS,
            columns: vec![
                col("product_id", Integer),
                col("name", Varchar(255)),
                col("description", Text),
                col("price", Numeric(10, 2)),
                col("category", Varchar(100)),
            ],
            primary_key: "product_id",
            crate_indexes: vec![CrateIndex {
                name: "category_idx",
                column: "category",
            }],
            fulltext: Some("description"),
        },
        TableDef {
            name: ORDERS,
            columns: vec![
                col("order_id", Integer),
                col("customer_id", Integer),
                col("order_date", Timestamp),
                col("total_amount", Numeric(10, 2)),
                col("status", Varchar(50)),
            ],
            primary_key: "order_id",
            crate_indexes: vec![],
            fulltext: None,
        },
        TableDef {
            name: ORDER_ITEMS,
            columns: vec![
                col("item_id", Integer),
                col("order_id", Integer),
                col("product_id", Integer),
                col("quantity", Integer),
                col("unit_price", Numeric(10, 2)),
            ],
            primary_key: "item_id",
            crate_indexes: vec![],
            fulltext: None,
        },
        TableDef {
            name: INVENTORY,
            columns: vec![
                col("inventory_id", Integer),
                col("product_id", Integer),
                col("quantity", Integer),
                col("warehouse", Varchar(100)),
                col("last_updated", Timestamp),
            ],
            primary_key: "inventory_id",
            crate_indexes: vec![],
            fulltext: None,
        },
    ]
}

/// Find a table in the catalog by name.
pub fn find_table(name: &str) -> Option<TableDef> {
    catalog().into_iter().find(|t| t.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_five_tables_in_order() {
        let names: Vec<_> = catalog().iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec![CUSTOMERS, PRODUCTS, ORDERS, ORDER_ITEMS, INVENTORY]
        );
    }

    #[test]
    fn test_primary_key_is_first_column() {
        for table in catalog() {
            assert_eq!(table.columns[0].name, table.primary_key, "{}", table.name);
        }
    }

    #[test]
    fn test_cleanup_order_covers_catalog() {
        let mut cleanup: Vec<_> = CLEANUP_ORDER.to_vec();
        let mut names: Vec<_> = catalog().iter().map(|t| t.name).collect();
        cleanup.sort();
        names.sort();
        assert_eq!(cleanup, names);
    }

    #[test]
    fn test_crate_indexes_only_on_string_columns() {
        for table in catalog() {
            for idx in &table.crate_indexes {
                let column = table.column(idx.column).unwrap();
                assert!(matches!(column.ty, ColumnType::Varchar(_)));
            }
        }
    }

    #[test]
    fn test_find_table() {
        let products = find_table("products").unwrap();
        assert_eq!(products.fulltext, Some("description"));
        assert!(find_table("users").is_none());
    }
}
