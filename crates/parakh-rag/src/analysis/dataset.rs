//! Dataset accessor for the analysis pipeline.
//!
//! Loads the fixed CSV once per run and exposes the views the prompts
//! need: column names, inferred types, value samples, and shape.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset has no columns")]
    Empty,
}

/// Declared type of a column, inferred from its values. Display uses the
/// names generated analysis code expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Integer => "int",
            ColumnType::Float => "float",
            ColumnType::Boolean => "bool",
            ColumnType::Text => "str",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    /// Distinct non-missing values in first-appearance order, capped at
    /// the configured sample limit.
    pub samples: Vec<String>,
}

/// In-memory view of the analysis dataset.
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    columns: Vec<Column>,
    row_count: usize,
}

impl Dataset {
    /// Load a CSV file, inferring per-column types and collecting value
    /// samples.
    pub fn load(path: &Path, samples_per_column: usize) -> Result<Self, DatasetError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() {
            return Err(DatasetError::Empty);
        }

        let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        let mut row_count = 0;
        for record in reader.records() {
            let record = record?;
            for (i, field) in record.iter().enumerate() {
                if i < raw_columns.len() {
                    raw_columns[i].push(field.to_string());
                }
            }
            row_count += 1;
        }

        let columns = headers
            .into_iter()
            .zip(raw_columns)
            .map(|(name, values)| Column {
                column_type: infer_column_type(&values),
                samples: distinct_samples(&values, samples_per_column),
                name,
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            row_count,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        (self.row_count, self.columns.len())
    }

    pub fn column_names_joined(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// "name: type" lines for prompts.
    pub fn describe_types(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}: {}", c.name, c.column_type))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// "name: [v1, v2, ...]" lines for prompts.
    pub fn describe_samples(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}: [{}]", c.name, c.samples.join(", ")))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn infer_column_type(values: &[String]) -> ColumnType {
    let non_missing: Vec<&str> = values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();
    if non_missing.is_empty() {
        return ColumnType::Text;
    }
    if non_missing.iter().all(|v| v.parse::<i64>().is_ok()) {
        return ColumnType::Integer;
    }
    if non_missing.iter().all(|v| v.parse::<f64>().is_ok()) {
        return ColumnType::Float;
    }
    if non_missing
        .iter()
        .all(|v| matches!(v.to_lowercase().as_str(), "true" | "false"))
    {
        return ColumnType::Boolean;
    }
    ColumnType::Text
}

fn distinct_samples(values: &[String], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut samples = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            samples.push(trimmed.to_string());
            if samples.len() == limit {
                break;
            }
        }
    }
    samples
}
