//! Read-only schema and statistics report for the k-bar database.
//!
//! Table selection, column heuristics and SQL construction are plain
//! functions; only [`SchemaReporter::build`] talks to a [`Catalog`].

use std::fmt;

use tracing::debug;

use crate::database::{Catalog, ColumnInfo};
use crate::error::StoreError;

pub const DEFAULT_MARKER: &str = "kbar";
pub const DEFAULT_SAMPLE_LIMIT: usize = 5;

const DATE_TYPE_HINTS: [&str; 3] = ["date", "time", "timestamp"];
const DATE_NAME_HINTS: [&str; 4] = ["date", "time", "ts", "dt"];
const SYMBOL_NAME_HINT: &str = "symbol";

/// Quote an identifier for Postgres or SQLite, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Tables whose name contains `marker` (case-insensitive). When none match,
/// every table is selected and `fallback` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSelection {
    pub tables: Vec<String>,
    pub fallback: bool,
}

pub fn select_tables(tables: &[String], marker: &str) -> TableSelection {
    let marker = marker.to_lowercase();
    let matched: Vec<String> = tables
        .iter()
        .filter(|t| t.to_lowercase().contains(&marker))
        .cloned()
        .collect();

    if matched.is_empty() {
        TableSelection {
            tables: tables.to_vec(),
            fallback: true,
        }
    } else {
        TableSelection {
            tables: matched,
            fallback: false,
        }
    }
}

/// Date-like columns by declared type; if no type matches, by name.
pub fn date_columns(columns: &[ColumnInfo]) -> Vec<String> {
    let by_type: Vec<String> = columns
        .iter()
        .filter(|c| {
            let ty = c.data_type.to_lowercase();
            DATE_TYPE_HINTS.iter().any(|hint| ty.contains(hint))
        })
        .map(|c| c.name.clone())
        .collect();
    if !by_type.is_empty() {
        return by_type;
    }

    columns
        .iter()
        .filter(|c| {
            let name = c.name.to_lowercase();
            DATE_NAME_HINTS.iter().any(|hint| name.contains(hint))
        })
        .map(|c| c.name.clone())
        .collect()
}

pub fn symbol_columns(columns: &[ColumnInfo]) -> Vec<String> {
    columns
        .iter()
        .filter(|c| c.name.to_lowercase().contains(SYMBOL_NAME_HINT))
        .map(|c| c.name.clone())
        .collect()
}

pub fn count_rows_sql(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {}", quote_ident(table))
}

pub fn count_distinct_sql(table: &str, column: &str) -> String {
    format!(
        "SELECT COUNT(DISTINCT {}) FROM {}",
        quote_ident(column),
        quote_ident(table)
    )
}

pub fn min_max_sql(table: &str, column: &str) -> String {
    let col = quote_ident(column);
    format!(
        "SELECT CAST(MIN({col}) AS TEXT), CAST(MAX({col}) AS TEXT) FROM {}",
        quote_ident(table)
    )
}

/// Latest rows by `order_by`, every column cast to text so any column type
/// can be rendered.
pub fn latest_rows_sql(table: &str, columns: &[ColumnInfo], order_by: &str, limit: usize) -> String {
    let select_list = columns
        .iter()
        .map(|c| format!("CAST({} AS TEXT)", quote_ident(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "SELECT {} FROM {} ORDER BY {} DESC LIMIT {}",
        select_list,
        quote_ident(table),
        quote_ident(order_by),
        limit
    )
}

/// `1234567` -> `1,234,567`
pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateRange {
    pub column: String,
    pub min: Option<String>,
    pub max: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableReport {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    pub date_columns: Vec<String>,
    pub symbol_columns: Vec<String>,
    pub row_count: i64,
    pub distinct_counts: Vec<(String, i64)>,
    pub date_ranges: Vec<DateRange>,
    pub latest_rows: Vec<Vec<(String, Option<String>)>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaReport {
    pub marker: String,
    pub all_tables: Vec<String>,
    pub fallback_to_all: bool,
    pub sample_limit: usize,
    pub tables: Vec<TableReport>,
}

pub struct SchemaReporter {
    marker: String,
    sample_limit: usize,
}

impl Default for SchemaReporter {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER, DEFAULT_SAMPLE_LIMIT)
    }
}

impl SchemaReporter {
    pub fn new(marker: &str, sample_limit: usize) -> Self {
        Self {
            marker: marker.to_string(),
            sample_limit,
        }
    }

    pub async fn build<C>(&self, catalog: &mut C) -> Result<SchemaReport, StoreError>
    where
        C: Catalog + ?Sized,
    {
        let all_tables = catalog.list_tables().await?;
        let selection = select_tables(&all_tables, &self.marker);

        let mut tables = Vec::with_capacity(selection.tables.len());
        for table in &selection.tables {
            tables.push(self.inspect_table(catalog, table).await?);
        }

        Ok(SchemaReport {
            marker: self.marker.clone(),
            all_tables,
            fallback_to_all: selection.fallback,
            sample_limit: self.sample_limit,
            tables,
        })
    }

    async fn inspect_table<C>(&self, catalog: &mut C, table: &str) -> Result<TableReport, StoreError>
    where
        C: Catalog + ?Sized,
    {
        debug!("Inspecting table {}", table);

        let columns = catalog.list_columns(table).await?;
        let date_cols = date_columns(&columns);
        let symbol_cols = symbol_columns(&columns);

        let row_count = catalog.fetch_count(&count_rows_sql(table)).await?;

        let mut distinct_counts = Vec::with_capacity(symbol_cols.len());
        for column in &symbol_cols {
            let count = catalog.fetch_count(&count_distinct_sql(table, column)).await?;
            distinct_counts.push((column.clone(), count));
        }

        let mut date_ranges = Vec::with_capacity(date_cols.len());
        for column in &date_cols {
            let rows = catalog.fetch_text_rows(&min_max_sql(table, column)).await?;
            let (min, max) = match rows.into_iter().next() {
                Some(row) => {
                    let mut cells = row.into_iter();
                    (cells.next().flatten(), cells.next().flatten())
                }
                None => (None, None),
            };
            date_ranges.push(DateRange {
                column: column.clone(),
                min,
                max,
            });
        }

        let mut latest_rows = Vec::new();
        if let Some(order_by) = date_cols.first() {
            if self.sample_limit > 0 && !columns.is_empty() {
                let sql = latest_rows_sql(table, &columns, order_by, self.sample_limit);
                latest_rows = catalog
                    .fetch_text_rows(&sql)
                    .await?
                    .into_iter()
                    .map(|row| {
                        columns
                            .iter()
                            .map(|c| c.name.clone())
                            .zip(row)
                            .collect::<Vec<_>>()
                    })
                    .collect();
            }
        }

        Ok(TableReport {
            name: table.to_string(),
            columns,
            date_columns: date_cols,
            symbol_columns: symbol_cols,
            row_count,
            distinct_counts,
            date_ranges,
            latest_rows,
        })
    }
}

fn or_none_found(items: &[String]) -> String {
    if items.is_empty() {
        "None found".to_string()
    } else {
        items.join(", ")
    }
}

fn cell(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("NULL")
}

impl fmt::Display for TableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "{rule}")?;
        writeln!(f, "Table: {}", self.name)?;
        writeln!(f, "{rule}")?;

        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} ({})", c.name, c.data_type))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "Columns: {columns}")?;
        writeln!(f, "Date/Time columns: {}", or_none_found(&self.date_columns))?;
        writeln!(f, "Symbol columns: {}", or_none_found(&self.symbol_columns))?;
        writeln!(f, "Total rows: {}", format_thousands(self.row_count))?;

        for (column, count) in &self.distinct_counts {
            writeln!(f, "Distinct {column}: {count}")?;
        }

        if !self.date_ranges.is_empty() {
            writeln!(f)?;
            writeln!(f, "Last dates:")?;
            for range in &self.date_ranges {
                writeln!(f, "  - MAX({}): {}", range.column, cell(&range.max))?;
                writeln!(f, "  - MIN({}): {}", range.column, cell(&range.min))?;
            }
        }

        if !self.latest_rows.is_empty() {
            writeln!(f)?;
            writeln!(f, "Latest {} records:", self.latest_rows.len())?;
            for row in &self.latest_rows {
                let fields = row
                    .iter()
                    .map(|(name, value)| format!("{name}: {}", cell(value)))
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(f, "  {{{fields}}}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for SchemaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(f, "Found {} tables in the database:", self.all_tables.len())?;
        for table in &self.all_tables {
            writeln!(f, "  - {table}")?;
        }

        writeln!(f)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Analyzing {} tables...", self.marker)?;
        writeln!(f, "{rule}")?;
        if self.fallback_to_all {
            writeln!(
                f,
                "No {} tables found. Checking all tables for date/time columns...",
                self.marker
            )?;
        }

        for table in &self.tables {
            writeln!(f)?;
            write!(f, "{table}")?;
        }

        writeln!(f)?;
        writeln!(f, "{rule}")?;
        writeln!(f, "Query completed successfully!")?;
        write!(f, "{rule}")
    }
}
