use crate::domain::model::{Column, Row};
use crate::domain::ports::DbConnection;
use crate::domain::result_set::ResultSet;
use crate::utils::error::Result;
use futures::StreamExt;
use std::io::Write;

const QUERY_KEYWORDS: [&str; 6] = ["select", "with", "desc", "describe", "show", "explain"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum OutputFormat {
    /// Aligned columns for terminals
    Table,
    Csv,
    /// One JSON object per row
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Query,
    Exec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Rows(usize),
    Executed,
    Failed(String),
}

/// Picks `query` for statements that return rows, `exec` for the rest.
pub fn classify(sql: &str) -> StatementKind {
    let body = sql
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .collect::<Vec<_>>()
        .join(" ");
    let first = body
        .trim_start_matches(|c: char| c == '(' || c.is_whitespace())
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    if QUERY_KEYWORDS.iter().any(|k| *k == first) {
        StatementKind::Query
    } else {
        StatementKind::Exec
    }
}

/// Runs one statement through a connection and prints what it returns.
pub struct StatementRunner<'a, C: DbConnection + ?Sized> {
    conn: &'a C,
    format: OutputFormat,
}

impl<'a, C: DbConnection + ?Sized> StatementRunner<'a, C> {
    pub fn new(conn: &'a C, format: OutputFormat) -> Self {
        Self { conn, format }
    }

    pub async fn run<W: Write>(&self, sql: &str, out: &mut W) -> Result<RunOutcome> {
        match classify(sql) {
            StatementKind::Query => {
                let rs = self.conn.query(sql).await?;
                if let Some(error) = rs.error() {
                    return Ok(RunOutcome::Failed(error.to_string()));
                }
                let count = self.write_rows(rs, out).await?;
                tracing::info!("{} rows returned", count);
                Ok(RunOutcome::Rows(count))
            }
            StatementKind::Exec => {
                if self.conn.exec(sql).await? {
                    tracing::info!("Statement executed");
                    Ok(RunOutcome::Executed)
                } else {
                    let message = self
                        .conn
                        .last_error()
                        .unwrap_or_else(|| "statement failed".to_string());
                    Ok(RunOutcome::Failed(message))
                }
            }
        }
    }

    async fn write_rows<W: Write>(&self, mut rs: ResultSet, out: &mut W) -> Result<usize> {
        // untyped results name their columns only once downloaded
        rs.load().await?;
        match self.format {
            OutputFormat::Table => {
                let rows = rs.fetch_all().await?;
                write_table(rs.columns(), &rows, out)?;
                Ok(rows.len())
            }
            OutputFormat::Csv => {
                let mut writer = csv::Writer::from_writer(&mut *out);
                writer.write_record(rs.columns().iter().map(|c| c.name.as_str()))?;
                let mut rows = Box::pin(rs.into_stream());
                let mut count = 0;
                while let Some(row) = rows.next().await {
                    writer.write_record(row?.values().iter().map(|v| {
                        if v.is_null() {
                            String::new()
                        } else {
                            v.to_string()
                        }
                    }))?;
                    count += 1;
                }
                writer.flush()?;
                Ok(count)
            }
            OutputFormat::Json => {
                let names: Vec<String> = rs.columns().iter().map(|c| c.name.clone()).collect();
                let mut rows = Box::pin(rs.into_stream());
                let mut count = 0;
                while let Some(row) = rows.next().await {
                    let object: serde_json::Map<String, serde_json::Value> = names
                        .iter()
                        .cloned()
                        .zip(row?.values().iter().map(serde_json::to_value))
                        .map(|(name, value)| value.map(|v| (name, v)))
                        .collect::<std::result::Result<_, _>>()?;
                    serde_json::to_writer(&mut *out, &object)?;
                    writeln!(out)?;
                    count += 1;
                }
                Ok(count)
            }
        }
    }
}

fn write_table<W: Write>(columns: &[Column], rows: &[Row], out: &mut W) -> Result<()> {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values().iter().map(|v| v.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(widths.iter())
            .map(|(value, width)| format!("{:<width$}", value, width = *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    writeln!(out, "{}", line(columns.iter().map(|c| c.name.as_str()).collect()))?;
    writeln!(
        out,
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-")
    )?;
    for row in &cells {
        writeln!(out, "{}", line(row.iter().map(String::as_str).collect()))?;
    }
    writeln!(
        out,
        "({} row{})",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" }
    )?;
    Ok(())
}
