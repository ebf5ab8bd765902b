//! Chart-ready series from the first two columns.

use std::fmt;
use std::str::FromStr;

use crate::error::{GridError, Result};
use crate::value::{CellValue, Matrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
        })
    }
}

impl FromStr for ChartKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "pie" => Ok(ChartKind::Pie),
            other => Err(GridError::Unsupported(format!("chart type '{other}'"))),
        }
    }
}

/// Parallel label/value sequences, always the same length.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// A finished request for the chart component.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRequest {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Numeric coercion for chart values. Empty cells and blank text count
/// as zero; other text must parse to a finite number.
fn chart_number(value: &CellValue) -> Option<f64> {
    match value {
        CellValue::Empty => Some(0.0),
        CellValue::Text(s) if s.trim().is_empty() => Some(0.0),
        other => other.to_number(),
    }
}

/// Column 0 becomes the label, column 1 the value, for every row after
/// the header. Rows whose value is not numeric, or that have no second
/// column, are skipped entirely.
pub fn extract(matrix: &Matrix) -> Result<ChartSeries> {
    if matrix.len() < 2 {
        return Err(GridError::InsufficientData);
    }
    let mut series = ChartSeries::default();
    for row in &matrix[1..] {
        let Some(value) = row.get(1).and_then(chart_number) else {
            continue;
        };
        let label = row.first().map(|v| v.to_string()).unwrap_or_default();
        series.labels.push(label);
        series.values.push(value);
    }
    if series.values.is_empty() {
        return Err(GridError::NoNumericData);
    }
    Ok(series)
}

/// Extract a series and package it for `kind`.
pub fn create_chart(matrix: &Matrix, kind: ChartKind) -> Result<ChartRequest> {
    let ChartSeries { labels, values } = extract(matrix)?;
    tracing::info!(%kind, points = values.len(), "chart data extracted");
    Ok(ChartRequest {
        kind,
        labels,
        values,
    })
}
