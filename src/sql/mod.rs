//! SQL generation for duplicate-count probes.
//!
//! Only two pieces of SQL are needed by the search: identifier quoting per
//! dialect and the grouped duplicate-count query itself.
//!
//! ```ignore
//! use keyscout::sql::{duplicate_count_sql, Dialect};
//!
//! let sql = duplicate_count_sql(Dialect::Postgres, "public", "airport", &["code".into()])?;
//! ```

mod duplicates;

pub use duplicates::duplicate_count_sql;

/// SQL dialects the probe query can be rendered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    DuckDb,
    MySql,
    TSql,
}

impl Dialect {
    /// Quote an identifier for this dialect.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Dialect::Sqlite | Dialect::Postgres | Dialect::DuckDb => quote_double(ident),
            Dialect::MySql => quote_backtick(ident),
            Dialect::TSql => quote_bracket(ident),
        }
    }

    /// Quote a schema-qualified table name.
    ///
    /// An empty schema yields an unqualified name.
    pub fn qualified_table(&self, schema: &str, table: &str) -> String {
        if schema.is_empty() {
            self.quote_identifier(table)
        } else {
            format!(
                "{}.{}",
                self.quote_identifier(schema),
                self.quote_identifier(table)
            )
        }
    }

    /// Dialect name for display/logging.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::DuckDb => "duckdb",
            Dialect::MySql => "mysql",
            Dialect::TSql => "tsql",
        }
    }
}

/// Quote identifier with double quotes (ANSI style).
fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote identifier with backticks.
fn quote_backtick(ident: &str) -> String {
    format!("`{}`", ident.replace('`', "``"))
}

/// Quote identifier with square brackets.
fn quote_bracket(ident: &str) -> String {
    format!("[{}]", ident.replace(']', "]]"))
}
