//! File import/export of the matrix.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{GridError, Result};
use crate::value::{CellValue, Matrix};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferKind {
    Csv,
    Excel,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransferKind::Csv => "csv",
            TransferKind::Excel => "excel",
        })
    }
}

impl FromStr for TransferKind {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(TransferKind::Csv),
            "excel" | "xlsx" => Ok(TransferKind::Excel),
            other => Err(GridError::Unsupported(format!("file type '{other}'"))),
        }
    }
}

/// Write `matrix` to `path`. Returns the number of rows written.
pub fn export(kind: TransferKind, matrix: &Matrix, path: &Path) -> Result<usize> {
    match kind {
        TransferKind::Csv => {
            let mut w = csv::WriterBuilder::new().flexible(false).from_path(path)?;
            for row in matrix {
                w.write_record(row.iter().map(|v| v.to_string()))?;
            }
            w.flush()?;
            tracing::info!(path = %path.display(), rows = matrix.len(), "exported csv");
            Ok(matrix.len())
        }
        TransferKind::Excel => Err(GridError::Unsupported("excel export".into())),
    }
}

/// Read a matrix from `path`. Short rows are padded with empty cells.
pub fn import(kind: TransferKind, path: &Path) -> Result<Matrix> {
    match kind {
        TransferKind::Csv => {
            let mut rdr = csv::ReaderBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_path(path)?;
            let mut matrix = Matrix::new();
            let mut width = 0;
            for record in rdr.records() {
                let record = record?;
                let row: Vec<CellValue> = record.iter().map(CellValue::parse_input).collect();
                width = width.max(row.len());
                matrix.push(row);
            }
            for row in &mut matrix {
                row.resize(width, CellValue::Empty);
            }
            tracing::info!(path = %path.display(), rows = matrix.len(), cols = width, "imported csv");
            Ok(matrix)
        }
        TransferKind::Excel => Err(GridError::Unsupported("excel import".into())),
    }
}
