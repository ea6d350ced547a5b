use crate::error::ApiError;
use sqlx::MySqlPool;

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    F64(f64),
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// ===============================
/// Build dynamic UPDATE SQL
/// ===============================
/// Only the provided fields end up in the SET clause. Column names come
/// from the caller, never from the request.
pub fn build_update_sql(
    table: &str,
    fields: Vec<(&'static str, Option<SqlValue>)>,
    id_column: &str,
    id_value: u64,
) -> Result<SqlUpdate, ApiError> {
    let provided: Vec<_> = fields
        .into_iter()
        .filter_map(|(column, value)| value.map(|v| (column, v)))
        .collect();

    if provided.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    let set_clause = provided
        .iter()
        .map(|(column, _)| format!("{} = ?", column))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE {} = ?", table, set_clause, id_column);

    let mut values: Vec<SqlValue> = provided.into_iter().map(|(_, v)| v).collect();
    values.push(SqlValue::U64(id_value));

    Ok(SqlUpdate { sql, values })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// ===============================
/// Dynamic WHERE clause
/// ===============================
#[derive(Debug, Default)]
pub struct WhereClause {
    conditions: Vec<String>,
    pub values: Vec<SqlValue>,
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `column = ?` when a value is present.
    pub fn and_eq(mut self, column: &str, value: Option<SqlValue>) -> Self {
        if let Some(value) = value {
            self.conditions.push(format!("{} = ?", column));
            self.values.push(value);
        }
        self
    }

    pub fn to_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }
}
