//! SQL dialects for PostgreSQL and CrateDB.

use super::{ColumnType, TableDef};

/// SQL syntax strategy for one engine.
pub trait Dialect {
    /// Dialect name ("postgres" or "cratedb").
    fn name(&self) -> &str;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Positional parameter placeholder (1-based).
    fn param_placeholder(&self, index: usize) -> String;

    /// Concrete column type.
    fn map_type(&self, ty: ColumnType) -> String;

    /// CREATE TABLE IF NOT EXISTS statement for a table.
    fn create_table_sql(&self, table: &TableDef) -> String;

    /// Single-row INSERT with placeholders.
    fn insert_sql(&self, table: &str, columns: &[&str]) -> String {
        let cols: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let params: Vec<String> = (1..=columns.len())
            .map(|i| self.param_placeholder(i))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.quote_ident(table),
            cols.join(", "),
            params.join(", ")
        )
    }
}

/// PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }

    /// Multi-row INSERT for `row_count` rows of `columns.len()` parameters each.
    pub fn multi_row_insert_sql(&self, table: &str, columns: &[&str], row_count: usize) -> String {
        let cols: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        let width = columns.len();

        let mut values = Vec::with_capacity(row_count);
        for row in 0..row_count {
            let params: Vec<String> = (1..=width)
                .map(|i| self.param_placeholder(row * width + i))
                .collect();
            values.push(format!("({})", params.join(", ")));
        }

        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.quote_ident(table),
            cols.join(", "),
            values.join(", ")
        )
    }

    /// COPY statement in text format.
    pub fn copy_in_sql(&self, table: &str, columns: &[&str]) -> String {
        let cols: Vec<String> = columns.iter().map(|c| self.quote_ident(c)).collect();
        format!(
            "COPY {} ({}) FROM STDIN WITH (FORMAT text)",
            self.quote_ident(table),
            cols.join(", ")
        )
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn map_type(&self, ty: ColumnType) -> String {
        match ty {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Varchar(n) => format!("VARCHAR({})", n),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Numeric(p, s) => format!("NUMERIC({}, {})", p, s),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn create_table_sql(&self, table: &TableDef) -> String {
        let cols: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let pk = if c.name == table.primary_key {
                    " PRIMARY KEY"
                } else {
                    ""
                };
                format!("    {} {}{}", self.quote_ident(c.name), self.map_type(c.ty), pk)
            })
            .collect();

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.quote_ident(table.name),
            cols.join(",\n")
        )
    }
}

/// CrateDB dialect.
///
/// VARCHAR maps to STRING and NUMERIC to FLOAT. BTREE indexes are only
/// declared on string columns; CrateDB rejects them on INTEGER and TIMESTAMP.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrateDialect;

impl CrateDialect {
    pub fn new() -> Self {
        Self
    }

    /// REFRESH TABLE statement making recent writes visible to queries.
    pub fn refresh_sql(&self, table: &str) -> String {
        format!("REFRESH TABLE {}", self.quote_ident(table))
    }
}

impl Dialect for CrateDialect {
    fn name(&self) -> &str {
        "cratedb"
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn map_type(&self, ty: ColumnType) -> String {
        match ty {
            ColumnType::Integer => "INTEGER".to_string(),
            ColumnType::Varchar(_) => "STRING".to_string(),
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::Numeric(_, _) => "FLOAT".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
        }
    }

    fn create_table_sql(&self, table: &TableDef) -> String {
        let mut parts: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let mut line = format!("    {} {}", self.quote_ident(c.name), self.map_type(c.ty));
                if c.name == table.primary_key {
                    line.push_str(" PRIMARY KEY");
                }
                if table.fulltext == Some(c.name) {
                    line.push_str(" INDEX USING FULLTEXT WITH (analyzer = 'standard')");
                }
                line
            })
            .collect();

        for idx in &table.crate_indexes {
            parts.push(format!(
                "    INDEX {} USING BTREE ({})",
                idx.name,
                self.quote_ident(idx.column)
            ));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            self.quote_ident(table.name),
            parts.join(",\n")
        )
    }
}

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone, Copy)]
pub enum DialectImpl {
    Postgres(PostgresDialect),
    Crate(CrateDialect),
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        match self {
            DialectImpl::Postgres(d) => d.name(),
            DialectImpl::Crate(d) => d.name(),
        }
    }

    fn quote_ident(&self, name: &str) -> String {
        match self {
            DialectImpl::Postgres(d) => d.quote_ident(name),
            DialectImpl::Crate(d) => d.quote_ident(name),
        }
    }

    fn param_placeholder(&self, index: usize) -> String {
        match self {
            DialectImpl::Postgres(d) => d.param_placeholder(index),
            DialectImpl::Crate(d) => d.param_placeholder(index),
        }
    }

    fn map_type(&self, ty: ColumnType) -> String {
        match self {
            DialectImpl::Postgres(d) => d.map_type(ty),
            DialectImpl::Crate(d) => d.map_type(ty),
        }
    }

    fn create_table_sql(&self, table: &TableDef) -> String {
        match self {
            DialectImpl::Postgres(d) => d.create_table_sql(table),
            DialectImpl::Crate(d) => d.create_table_sql(table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{catalog, find_table};

    #[test]
    fn test_postgres_customers_ddl() {
        let table = find_table("customers").unwrap();
        let ddl = PostgresDialect::new().create_table_sql(&table);
        assert!(ddl.starts_with("CREATE TABLE IF NOT EXISTS \"customers\" ("));
        assert!(ddl.contains("\"customer_id\" INTEGER PRIMARY KEY"));
        assert!(ddl.contains("\"email\" VARCHAR(100)"));
        assert!(ddl.contains("\"registration_date\" TIMESTAMP"));
        assert!(!ddl.contains("BTREE"));
    }

    #[test]
    fn test_postgres_numeric_type() {
        let table = find_table("products").unwrap();
        let ddl = PostgresDialect::new().create_table_sql(&table);
        assert!(ddl.contains("\"price\" NUMERIC(10, 2)"));
        assert!(ddl.contains("\"description\" TEXT"));
        assert!(!ddl.contains("FULLTEXT"));
    }

    #[test]
    fn test_crate_products_ddl() {
        let table = find_table("products").unwrap();
        let ddl = CrateDialect::new().create_table_sql(&table);
        assert!(ddl.contains("\"name\" STRING"));
        assert!(ddl.contains("\"price\" FLOAT"));
        assert!(ddl.contains(
            "\"description\" TEXT INDEX USING FULLTEXT WITH (analyzer = 'standard')"
        ));
        assert!(ddl.contains("INDEX category_idx USING BTREE (\"category\")"));
    }

    #[test]
    fn test_crate_orders_has_no_btree() {
        let table = find_table("orders").unwrap();
        let ddl = CrateDialect::new().create_table_sql(&table);
        assert!(!ddl.contains("BTREE"));
        assert!(ddl.contains("\"order_id\" INTEGER PRIMARY KEY"));
    }

    #[test]
    fn test_every_table_renders_in_both_dialects() {
        let dialects = [
            DialectImpl::Postgres(PostgresDialect::new()),
            DialectImpl::Crate(CrateDialect::new()),
        ];
        for dialect in dialects {
            for table in catalog() {
                let ddl = dialect.create_table_sql(&table);
                assert!(ddl.ends_with("\n)"), "{} {}", dialect.name(), table.name);
                for column in &table.columns {
                    assert!(ddl.contains(&dialect.quote_ident(column.name)));
                }
            }
        }
    }

    #[test]
    fn test_insert_placeholders() {
        let cols = ["customer_id", "name"];
        assert_eq!(
            PostgresDialect::new().insert_sql("customers", &cols),
            "INSERT INTO \"customers\" (\"customer_id\", \"name\") VALUES ($1, $2)"
        );
        assert_eq!(
            CrateDialect::new().insert_sql("customers", &cols),
            "INSERT INTO \"customers\" (\"customer_id\", \"name\") VALUES (?, ?)"
        );
    }

    #[test]
    fn test_multi_row_insert_numbers_params_sequentially() {
        let sql = PostgresDialect::new().multi_row_insert_sql("t", &["a", "b"], 3);
        assert_eq!(
            sql,
            "INSERT INTO \"t\" (\"a\", \"b\") VALUES ($1, $2), ($3, $4), ($5, $6)"
        );
    }

    #[test]
    fn test_copy_and_refresh_sql() {
        assert_eq!(
            PostgresDialect::new().copy_in_sql("orders", &["order_id"]),
            "COPY \"orders\" (\"order_id\") FROM STDIN WITH (FORMAT text)"
        );
        assert_eq!(
            CrateDialect::new().refresh_sql("orders"),
            "REFRESH TABLE \"orders\""
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(PostgresDialect::new().quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
