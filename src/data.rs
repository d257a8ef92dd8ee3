use crate::error::{Result, SearchError};
use crate::param;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;
use std::path::Path;

/// Chronologically ordered load dataset.
///
/// Rows are time samples (their order matters: validation folds are cut along it),
/// columns are named features, `y` holds the load to forecast.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Data {
    pub X: Vec<f64>,           // Row-major feature matrix
    pub y: Vec<f64>,           // Target value for each row
    pub features: Vec<String>, // Feature names, in column order
    pub feature_len: usize,
    pub sample_len: usize,
}

impl Data {
    /// Build a dataset from in-memory rows.
    pub fn from_rows(features: Vec<String>, rows: Vec<Vec<f64>>, y: Vec<f64>) -> Result<Data> {
        if rows.len() != y.len() {
            return Err(SearchError::MalformedData {
                path: "<memory>".to_string(),
                reason: format!("{} rows for {} target values", rows.len(), y.len()),
            });
        }

        let feature_len = features.len();
        let mut X = Vec::with_capacity(rows.len() * feature_len);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != feature_len {
                return Err(SearchError::MalformedData {
                    path: "<memory>".to_string(),
                    reason: format!("row {} has {} values, expected {}", i, row.len(), feature_len),
                });
            }
            X.extend_from_slice(row);
        }

        Ok(Data {
            X,
            sample_len: y.len(),
            y,
            features,
            feature_len,
        })
    }

    /// Load the dataset registered under `key` in the data section of the parameters.
    pub fn load(key: &str, param: &param::Data) -> Result<Data> {
        let path = param
            .datasets
            .get(key)
            .ok_or_else(|| SearchError::UnknownDataset(key.to_string()))?;
        Data::load_csv(path)
    }

    /// Load a CSV file whose last column is the target and the others are features.
    pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Data> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        info!("Loading file {}...", path_str);

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        if headers.len() < 2 {
            return Err(SearchError::MalformedData {
                path: path_str,
                reason: format!(
                    "{} column(s) found, at least one feature and one target are needed",
                    headers.len()
                ),
            });
        }

        let feature_len = headers.len() - 1;
        let mut X: Vec<f64> = Vec::new();
        let mut y: Vec<f64> = Vec::new();

        for (line, record) in reader.records().enumerate() {
            let record = record?;
            for (column, field) in record.iter().enumerate() {
                let value: f64 = field.parse().map_err(|_| SearchError::MalformedData {
                    path: path_str.clone(),
                    reason: format!(
                        "non numeric value '{}' in column '{}' at row {}",
                        field,
                        headers[column],
                        line + 1
                    ),
                })?;
                if column < feature_len {
                    X.push(value);
                } else {
                    y.push(value);
                }
            }
        }

        if y.is_empty() {
            return Err(SearchError::MalformedData {
                path: path_str,
                reason: "no data rows".to_string(),
            });
        }

        let data = Data {
            X,
            sample_len: y.len(),
            y,
            features: headers[..feature_len].to_vec(),
            feature_len,
        };
        debug!("{} rows and {} features loaded", data.sample_len, data.feature_len);

        Ok(data)
    }

    #[inline]
    pub fn value(&self, sample: usize, feature: usize) -> f64 {
        self.X[sample * self.feature_len + feature]
    }

    /// Copy the selected columns of a contiguous block of rows into a row-major matrix.
    pub fn design(&self, rows: Range<usize>, columns: &[usize]) -> Vec<f64> {
        let mut matrix = Vec::with_capacity(rows.len() * columns.len());
        for i in rows {
            matrix.extend(columns.iter().map(|&j| self.value(i, j)));
        }
        matrix
    }

    pub fn targets(&self, rows: Range<usize>) -> &[f64] {
        &self.y[rows]
    }

    /// Every column index, in order.
    pub fn all_columns(&self) -> Vec<usize> {
        (0..self.feature_len).collect()
    }

    /// Names of the selected columns, in column order.
    pub fn feature_names(&self, columns: &[usize]) -> Vec<String> {
        columns.iter().map(|&j| self.features[j].clone()).collect()
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Features: {}   Samples: {}", self.feature_len, self.sample_len)?;

        let header = self.features.join("\t");
        let truncated_header = if header.chars().count() > 100 {
            format!("{}...", header.chars().take(97).collect::<String>())
        } else {
            header
        };
        writeln!(f, "X:      {}", truncated_header)?;

        // Limit to the first 10 rows
        for i in (0..self.sample_len).take(10) {
            let row_display: String = (0..self.feature_len)
                .map(|j| format!("{:.2}", self.value(i, j)))
                .collect::<Vec<_>>()
                .join("\t");

            let truncated_row = if row_display.len() > 80 {
                format!("{}...", &row_display[..77])
            } else {
                row_display
            };

            writeln!(f, "{:<7} {}\t| y={:.2}", i, truncated_row, self.y[i])?;
        }

        Ok(())
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Reuse the Display formatter
        write!(f, "{}", self)
    }
}
