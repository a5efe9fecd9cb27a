//! PostgreSQL connection implementation

use async_trait::async_trait;
use bytes::BytesMut;
use sqlrelay_core::{
    Connection, DbError, ExecResult, QueryResult, Result, Row, Transaction, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row as PgRow, Statement};

fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    match error.as_db_error() {
        Some(db_error) => {
            let code = db_error.code();
            let mut message = db_error.message().to_string();
            if let Some(detail) = db_error.detail() {
                if !detail.trim().is_empty() {
                    message.push_str(&format!(" (detail: {})", detail));
                }
            }
            format!("{} (code: {:?})", message, code)
        }
        None => error.to_string(),
    }
}

/// PostgreSQL connection wrapper.
///
/// Transactions hold the client mutex's BEGIN…COMMIT window by sharing the
/// same `Arc<Mutex<Client>>`, which keeps statement order on one wire
/// connection.
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
    closed: Arc<AtomicBool>,
}

impl PostgresConnection {
    /// Connect using a libpq-style DSN
    /// (`host=… port=… dbname=… user=… password=…`)
    pub async fn connect(dsn: &str) -> Result<Self> {
        tracing::info!("connecting to PostgreSQL");
        let (client, connection) = tokio_postgres::connect(dsn, NoTls)
            .await
            .map_err(|e| DbError::Connection(format_postgres_error(&e)))?;

        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();
        // the connection future drives the socket until it drops
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection terminated");
            }
            closed_flag.store(true, Ordering::SeqCst);
        });

        tracing::info!("PostgreSQL connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            closed,
        })
    }
}

async fn prepare_params(
    client: &Client,
    sql: &str,
    params: &[Value],
) -> Result<(Statement, Vec<PgValue>)> {
    let statement = client
        .prepare(sql)
        .await
        .map_err(|e| DbError::Query(format!("failed to prepare statement: {}", format_postgres_error(&e))))?;

    let param_types = statement.params();
    let pg_params: Vec<PgValue> = params
        .iter()
        .enumerate()
        .map(|(i, value)| match param_types.get(i) {
            Some(target) => PgValue::from_value_for_type(value, target),
            None => PgValue::from_value(value),
        })
        .collect();

    Ok((statement, pg_params))
}

async fn run_query(client: &Client, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let (statement, pg_params) = prepare_params(client, sql, params).await?;
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let pg_rows = client
        .query(&statement, &param_refs)
        .await
        .map_err(|e| DbError::Query(format!("failed to execute query: {}", format_postgres_error(&e))))?;

    // take columns from the prepared statement so empty results keep them
    let columns: Vec<String> = statement
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let mut rows = Vec::with_capacity(pg_rows.len());
    for pg_row in &pg_rows {
        let mut values = Vec::with_capacity(columns.len());
        for idx in 0..columns.len() {
            values.push(postgres_to_value(pg_row, idx));
        }
        rows.push(Row::new(columns.clone(), values));
    }

    tracing::debug!(row_count = rows.len(), "query executed");
    Ok(QueryResult { columns, rows })
}

async fn run_execute(client: &Client, sql: &str, params: &[Value]) -> Result<ExecResult> {
    let (statement, pg_params) = prepare_params(client, sql, params).await?;
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let rows_affected = client
        .execute(&statement, &param_refs)
        .await
        .map_err(|e| DbError::Query(format!("failed to execute statement: {}", format_postgres_error(&e))))?;

    tracing::debug!(affected_rows = rows_affected, "statement executed");
    Ok(ExecResult {
        // PostgreSQL reports generated ids through RETURNING, not here
        last_insert_id: 0,
        rows_affected,
    })
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn ping(&self) -> Result<()> {
        let client = self.client.lock().await;
        client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| DbError::Connection(format_postgres_error(&e)))
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let client = self.client.lock().await;
        run_execute(&client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let client = self.client.lock().await;
        run_query(&client, sql, params).await
    }

    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning PostgreSQL transaction");
        {
            let client = self.client.lock().await;
            client
                .execute("BEGIN", &[])
                .await
                .map_err(|e| DbError::Query(format!("failed to begin transaction: {}", format_postgres_error(&e))))?;
        }
        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// PostgreSQL transaction wrapper
pub struct PostgresTransaction {
    client: Arc<Mutex<Client>>,
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<ExecResult> {
        let client = self.client.lock().await;
        run_execute(&client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let client = self.client.lock().await;
        run_query(&client, sql, params).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        tracing::debug!("committing PostgreSQL transaction");
        let client = self.client.lock().await;
        client
            .execute("COMMIT", &[])
            .await
            .map(|_| ())
            .map_err(|e| DbError::Query(format!("failed to commit transaction: {}", format_postgres_error(&e))))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        tracing::debug!("rolling back PostgreSQL transaction");
        let client = self.client.lock().await;
        client
            .execute("ROLLBACK", &[])
            .await
            .map(|_| ())
            .map_err(|e| DbError::Query(format!("failed to rollback transaction: {}", format_postgres_error(&e))))
    }
}

/// Owned parameter wrapper so a `Value` can be handed to tokio-postgres
/// with the binary width the prepared statement expects.
#[derive(Debug)]
enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    DateTime(chrono::NaiveDateTime),
}

impl PgValue {
    fn from_value_for_type(value: &Value, target: &tokio_postgres::types::Type) -> Self {
        use tokio_postgres::types::Type;

        match value {
            Value::Int(v) => Self::coerce_int(*v, target),
            Value::Uint(v) => Self::coerce_int(*v as i64, target),
            Value::Time(v) => match *target {
                Type::TIMESTAMP => PgValue::DateTime(v.naive_utc()),
                _ => PgValue::DateTimeUtc(*v),
            },
            Value::String(v) if matches!(*target, Type::JSON | Type::JSONB) => {
                serde_json::from_str::<serde_json::Value>(v)
                    .map(PgValue::Json)
                    .unwrap_or_else(|_| PgValue::String(v.clone()))
            }
            Value::Named { value, .. } => Self::from_value_for_type(value, target),
            other => Self::from_value(other),
        }
    }

    fn coerce_int(value: i64, target: &tokio_postgres::types::Type) -> Self {
        use tokio_postgres::types::Type;
        match *target {
            Type::INT2 => PgValue::Int16(value as i16),
            Type::INT4 => PgValue::Int32(value as i32),
            _ => PgValue::Int64(value),
        }
    }

    /// Fallback when no target type is known (raw queries)
    fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int(v) => PgValue::Int64(*v),
            Value::Uint(v) => PgValue::Int64(*v as i64),
            Value::Float(v) => PgValue::Float64(*v),
            Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Time(v) => PgValue::DateTimeUtc(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::Named { value, .. } => Self::from_value(value),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &tokio_postgres::types::Type,
        out: &mut BytesMut,
    ) -> std::result::Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(postgres_types::IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &tokio_postgres::types::Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();

    match type_name {
        "bool" => row
            .try_get::<_, Option<bool>>(idx)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),
        "int2" => int_value::<i16>(row, idx),
        "int4" => int_value::<i32>(row, idx),
        "int8" => int_value::<i64>(row, idx),
        "float4" => row
            .try_get::<_, Option<f32>>(idx)
            .ok()
            .flatten()
            .map(|f| Value::Float(f as f64))
            .unwrap_or(Value::Null),
        "float8" => row
            .try_get::<_, Option<f64>>(idx)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),
        // NUMERIC arrives in binary groups of four decimal digits; decode
        // to text so precision survives
        "numeric" => row
            .try_get::<_, Option<PgNumeric>>(idx)
            .ok()
            .flatten()
            .map(|n| Value::String(n.0))
            .unwrap_or(Value::Null),
        "bytea" => row
            .try_get::<_, Option<Vec<u8>>>(idx)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)
            .ok()
            .flatten()
            .map(Value::Json)
            .unwrap_or(Value::Null),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)
            .ok()
            .flatten()
            .map(|t| Value::Time(t.and_utc()))
            .unwrap_or(Value::Null),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::Utc>>>(idx)
            .ok()
            .flatten()
            .map(Value::Time)
            .unwrap_or(Value::Null),
        _ => row
            .try_get::<_, Option<String>>(idx)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

fn int_value<'a, T>(row: &'a PgRow, idx: usize) -> Value
where
    T: tokio_postgres::types::FromSql<'a> + Into<i64>,
{
    row.try_get::<_, Option<T>>(idx)
        .ok()
        .flatten()
        .map(|n| Value::Int(n.into()))
        .unwrap_or(Value::Null)
}

/// Decimal text decoded from the NUMERIC wire format
#[derive(Debug)]
struct PgNumeric(String);

impl PgNumeric {
    fn parse(raw: &[u8]) -> std::result::Result<String, Box<dyn std::error::Error + Sync + Send>> {
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }

        let ndigits = i16::from_be_bytes([raw[0], raw[1]]) as usize;
        let weight = i16::from_be_bytes([raw[2], raw[3]]);
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        let dscale = i16::from_be_bytes([raw[6], raw[7]]) as usize;

        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }
        if sign == 0xC000 {
            return Ok("NaN".to_string());
        }

        let mut digits = Vec::with_capacity(ndigits);
        for index in 0..ndigits {
            let offset = 8 + index * 2;
            digits.push(u16::from_be_bytes([raw[offset], raw[offset + 1]]));
        }
        if digits.is_empty() {
            return Ok("0".to_string());
        }

        let integer_groups = if weight >= 0 { weight as usize + 1 } else { 0 };
        let mut integer_text = String::new();
        if integer_groups == 0 {
            integer_text.push('0');
        } else {
            for group_index in 0..integer_groups {
                let group = digits.get(group_index).copied().unwrap_or(0);
                if group_index == 0 {
                    integer_text.push_str(&group.to_string());
                } else {
                    integer_text.push_str(&format!("{group:04}"));
                }
            }
        }

        let mut fraction_text = String::new();
        if dscale > 0 {
            for group in digits.iter().skip(integer_groups.min(digits.len())) {
                fraction_text.push_str(&format!("{group:04}"));
            }
            if fraction_text.len() < dscale {
                fraction_text.push_str(&"0".repeat(dscale - fraction_text.len()));
            } else {
                fraction_text.truncate(dscale);
            }
            while fraction_text.ends_with('0') {
                fraction_text.pop();
            }
        }

        let mut output = String::new();
        if sign == 0x4000 && integer_text != "0" {
            output.push('-');
        }
        output.push_str(&integer_text);
        if !fraction_text.is_empty() {
            output.push('.');
            output.push_str(&fraction_text);
        }
        Ok(output)
    }
}

impl<'a> tokio_postgres::types::FromSql<'a> for PgNumeric {
    fn from_sql(
        _: &tokio_postgres::types::Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(Self::parse(raw)?))
    }

    fn accepts(ty: &tokio_postgres::types::Type) -> bool {
        *ty == tokio_postgres::types::Type::NUMERIC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric_payload(ndigits: i16, weight: i16, sign: u16, dscale: i16, groups: &[u16]) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&ndigits.to_be_bytes());
        raw.extend_from_slice(&weight.to_be_bytes());
        raw.extend_from_slice(&sign.to_be_bytes());
        raw.extend_from_slice(&dscale.to_be_bytes());
        for g in groups {
            raw.extend_from_slice(&g.to_be_bytes());
        }
        raw
    }

    #[test]
    fn numeric_decodes_integers_and_fractions() {
        // 12345.678 = groups [1, 2345, 6780] with weight 1, dscale 3
        let raw = numeric_payload(3, 1, 0x0000, 3, &[1, 2345, 6780]);
        assert_eq!(PgNumeric::parse(&raw).unwrap(), "12345.678");

        let raw = numeric_payload(1, 0, 0x4000, 0, &[42]);
        assert_eq!(PgNumeric::parse(&raw).unwrap(), "-42");

        let raw = numeric_payload(0, 0, 0x0000, 0, &[]);
        assert_eq!(PgNumeric::parse(&raw).unwrap(), "0");

        let raw = numeric_payload(0, 0, 0xC000, 0, &[]);
        assert_eq!(PgNumeric::parse(&raw).unwrap(), "NaN");
    }
}
