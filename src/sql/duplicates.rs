use super::Dialect;
use crate::backend::{QueryError, QueryResult};

/// Build the query counting excess rows when grouping by `columns`.
///
/// Every group of `n > 1` identical rows contributes `n - 1`; unique
/// groupings return 0. NULLs group together, as `GROUP BY` defines.
pub fn duplicate_count_sql(
    dialect: Dialect,
    schema: &str,
    table: &str,
    columns: &[String],
) -> QueryResult<String> {
    if columns.is_empty() {
        return Err(QueryError::EmptyColumnList);
    }

    let group_by = columns
        .iter()
        .map(|c| dialect.quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "SELECT COALESCE(SUM(n - 1), 0) FROM (SELECT COUNT(*) AS n FROM {} GROUP BY {} HAVING COUNT(*) > 1) AS dup",
        dialect.qualified_table(schema, table),
        group_by
    ))
}
