use crate::domain::model::{Column, Row, Value};
use crate::domain::ports::ResultFetcher;
use crate::utils::error::{DbError, Result};
use futures::Stream;
use std::collections::VecDeque;
use std::fmt;

/// Column holding one line per row when a result has no tabular schema.
pub const TEXT_RESULT_COLUMN: &str = "result";

enum RowSource {
    /// Result body not downloaded yet.
    Pending(Box<dyn ResultFetcher>),
    Buffered(VecDeque<Row>),
    Exhausted,
}

/// Rows and column metadata of one query.
///
/// Rows are single-pass: each row is handed out once, and a failed result
/// never yields any.
pub struct ResultSet {
    columns: Vec<Column>,
    error: Option<String>,
    source: RowSource,
}

impl ResultSet {
    /// A successful result whose rows are downloaded on first access.
    ///
    /// With no `columns`, the result is untyped: columns are read from the
    /// body once it is downloaded.
    pub fn lazy(columns: Vec<Column>, fetcher: Box<dyn ResultFetcher>) -> Self {
        Self {
            columns,
            error: None,
            source: RowSource::Pending(fetcher),
        }
    }

    pub fn from_rows(columns: Vec<Column>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            error: None,
            source: RowSource::Buffered(rows.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        let mut message = message.into();
        if message.trim().is_empty() {
            message = "statement failed without a message".to_string();
        }
        Self {
            columns: Vec::new(),
            error: Some(message),
            source: RowSource::Exhausted,
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Ordered `(name, type)` pairs.
    pub fn column_info(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.type_name.clone()))
            .collect()
    }

    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        self.load().await?;
        let next = match &mut self.source {
            RowSource::Buffered(rows) => rows.pop_front(),
            _ => None,
        };
        if next.is_none() {
            self.source = RowSource::Exhausted;
        }
        Ok(next)
    }

    /// Up to `size` further rows; empty once the result is drained.
    pub async fn fetch(&mut self, size: usize) -> Result<Vec<Row>> {
        let mut batch = Vec::with_capacity(size.min(1024));
        while batch.len() < size {
            match self.next_row().await? {
                Some(row) => batch.push(row),
                None => break,
            }
        }
        Ok(batch)
    }

    pub async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Drops rows that were not handed out yet.
    pub fn close(&mut self) {
        self.source = RowSource::Exhausted;
    }

    /// Rows as a stream, in order, ending after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + Send {
        futures::stream::unfold(Some(self), |state| async move {
            let mut rs = state?;
            match rs.next_row().await {
                Ok(Some(row)) => Some((Ok(row), Some(rs))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }

    /// Downloads the result body if it is still pending. Untyped results
    /// know their columns only after this.
    pub async fn load(&mut self) -> Result<()> {
        if !matches!(self.source, RowSource::Pending(_)) {
            return Ok(());
        }
        let RowSource::Pending(fetcher) = std::mem::replace(&mut self.source, RowSource::Exhausted)
        else {
            return Ok(());
        };

        let body = fetcher.fetch_result().await?;
        let rows = if self.columns.is_empty() {
            parse_untyped_rows(&body, &mut self.columns)?
        } else {
            parse_csv_rows(&body, &mut self.columns)?
        };
        tracing::debug!("Downloaded {} result rows", rows.len());
        self.source = RowSource::Buffered(rows);
        Ok(())
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.source {
            RowSource::Pending(_) => "pending".to_string(),
            RowSource::Buffered(rows) => format!("{} buffered", rows.len()),
            RowSource::Exhausted => "exhausted".to_string(),
        };
        f.debug_struct("ResultSet")
            .field("columns", &self.columns)
            .field("error", &self.error)
            .field("rows", &state)
            .finish()
    }
}

/// Parses a CSV result body whose first line names the columns.
///
/// When `columns` is empty it is filled from the header with `string` types.
pub fn parse_csv_rows(body: &str, columns: &mut Vec<Column>) -> Result<VecDeque<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    if columns.is_empty() {
        columns.extend(headers.iter().map(|name| Column::new(name, "string")));
    }

    let mut rows = VecDeque::new();
    for record in reader.records() {
        let record = record?;
        if record.len() != columns.len() {
            return Err(DbError::DecodeError {
                message: format!(
                    "result row has {} fields, expected {}",
                    record.len(),
                    columns.len()
                ),
            });
        }
        let values = record
            .iter()
            .zip(columns.iter())
            .map(|(raw, column)| Value::decode(raw, &column.type_name))
            .collect::<Result<Vec<_>>>()?;
        rows.push_back(Row(values));
    }
    Ok(rows)
}

/// Parses a result body that came without a schema.
///
/// A body whose rows all have the header's width (more than one field) is
/// read as CSV with `string` columns. Anything else, such as the framed text
/// of `desc` or the plain lines of `show tables`, becomes one
/// `TEXT_RESULT_COLUMN` row per non-empty line.
pub fn parse_untyped_rows(body: &str, columns: &mut Vec<Column>) -> Result<VecDeque<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let width = reader.headers().map(|h| h.len()).unwrap_or(0);
    let tabular = width > 1
        && reader
            .records()
            .all(|record| record.map(|r| r.len() == width).unwrap_or(false));

    columns.clear();
    if tabular {
        return parse_csv_rows(body, columns);
    }

    columns.push(Column::new(TEXT_RESULT_COLUMN, "string"));
    Ok(body
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Row(vec![Value::String(line.to_string())]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingFetcher {
        body: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ResultFetcher for CountingFetcher {
        async fn fetch_result(&self) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    fn iris_columns() -> Vec<Column> {
        vec![Column::new("sepal_length", "double"), Column::new("class", "bigint")]
    }

    #[tokio::test]
    async fn test_rows_are_fetched_lazily_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let fetcher = CountingFetcher {
            body: "sepal_length,class\n5.1,0\n4.9,1\n".to_string(),
            calls: calls.clone(),
        };
        let mut rs = ResultSet::lazy(iris_columns(), Box::new(fetcher));

        assert!(rs.success());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let first = rs.next_row().await.unwrap().unwrap();
        assert_eq!(first.values(), &[Value::Double(5.1), Value::Int(0)]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let rest = rs.fetch_all().await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(rs.next_row().await.unwrap().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetch_in_batches() {
        let rows = (0..5).map(|i| Row(vec![Value::Int(i)])).collect();
        let mut rs = ResultSet::from_rows(vec![Column::new("a", "bigint")], rows);

        assert_eq!(rs.fetch(2).await.unwrap().len(), 2);
        assert_eq!(rs.fetch(2).await.unwrap().len(), 2);
        assert_eq!(rs.fetch(2).await.unwrap().len(), 1);
        assert!(rs.fetch(2).await.unwrap().is_empty());
    }

    #[test]
    fn test_failed_result_has_message_and_no_rows() {
        let mut rs = ResultSet::failed("ODPS-0130131: Table not found - notexist");
        assert!(!rs.success());
        assert!(rs.error().unwrap().contains("Table not found"));
        assert!(rs.column_info().is_empty());

        let rows = tokio_test::block_on(rs.fetch_all()).unwrap();
        assert!(rows.is_empty());

        assert!(!ResultSet::failed("").error().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_discards_pending_rows() {
        let rows = vec![Row(vec![Value::Int(1)])];
        let mut rs = ResultSet::from_rows(vec![Column::new("a", "int")], rows);
        rs.close();
        assert!(rs.next_row().await.unwrap().is_none());
    }

    #[test]
    fn test_parse_csv_fills_missing_columns() {
        let mut columns = Vec::new();
        let rows = parse_csv_rows("name,city\n\"Doe, J\",\\N\n", &mut columns).unwrap();
        assert_eq!(
            columns,
            vec![Column::new("name", "string"), Column::new("city", "string")]
        );
        assert_eq!(
            rows[0].values(),
            &[Value::String("Doe, J".to_string()), Value::Null]
        );
    }

    #[test]
    fn test_parse_csv_rejects_ragged_rows() {
        let mut columns = vec![Column::new("a", "bigint")];
        assert!(parse_csv_rows("a\n1,2\n", &mut columns).is_err());
    }

    #[tokio::test]
    async fn test_untyped_result_reads_columns_on_load() {
        let fetcher = CountingFetcher {
            body: "key,value\nodps.sql.mode,on\n".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let mut rs = ResultSet::lazy(Vec::new(), Box::new(fetcher));
        assert!(rs.column_info().is_empty());

        rs.load().await.unwrap();
        assert_eq!(
            rs.column_info(),
            vec![
                ("key".to_string(), "string".to_string()),
                ("value".to_string(), "string".to_string())
            ]
        );
        assert_eq!(rs.fetch_all().await.unwrap().len(), 1);
    }

    #[test]
    fn test_parse_untyped_text_lines() {
        let body = "+----------------------+\n| Owner: ALIYUN$ci     |\n+----------------------+\n\n| a, b | bigint |\n";
        let mut columns = vec![Column::new("stale", "bigint")];
        let rows = parse_untyped_rows(body, &mut columns).unwrap();

        assert_eq!(columns, vec![Column::new(TEXT_RESULT_COLUMN, "string")]);
        assert_eq!(rows.len(), 4);
        assert_eq!(
            rows[1].values(),
            &[Value::String("| Owner: ALIYUN$ci     |".to_string())]
        );
        assert_eq!(
            rows[3].values(),
            &[Value::String("| a, b | bigint |".to_string())]
        );
    }

    #[tokio::test]
    async fn test_rows_as_stream() {
        let rows = (0..3).map(|i| Row(vec![Value::Int(i)])).collect();
        let rs = ResultSet::from_rows(vec![Column::new("a", "bigint")], rows);

        let collected: Vec<Row> = rs
            .into_stream()
            .map(|row| row.unwrap())
            .collect()
            .await;
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[2][0], Value::Int(2));
    }

    #[test]
    fn test_parse_empty_body() {
        let mut columns = iris_columns();
        assert!(parse_csv_rows("", &mut columns).unwrap().is_empty());
    }
}
