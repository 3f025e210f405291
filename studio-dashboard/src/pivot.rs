//! Long-to-wide reshaping of raw readings
//!
//! Rows are keyed by timestamp in ascending order and columns are the distinct
//! field names in ascending order. A cell is empty when its field has no
//! reading at that timestamp.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use studio_common::{ConflictPolicy, RawRecord};

use crate::error::{DashboardError, DashboardResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    pub time: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}

/// Table with one row per timestamp and one column per field
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PivotTable {
    columns: Vec<String>,
    rows: Vec<PivotRow>,
}

impl PivotTable {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[PivotRow] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Value of `column` at `time`, if both exist and the cell is filled
    pub fn cell(&self, time: DateTime<Utc>, column: &str) -> Option<f64> {
        let idx = self.column_index(column)?;
        let row = self.rows.binary_search_by_key(&time, |row| row.time).ok()?;
        self.rows[row].values[idx]
    }

    /// Every timestamp paired with the column's cell
    pub fn series(&self, column: &str) -> Option<Vec<(DateTime<Utc>, Option<f64>)>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|row| (row.time, row.values[idx])).collect())
    }
}

struct Cell {
    value: f64,
    sum: f64,
    count: u32,
}

/// Pivot `records` on `(time, field)`, resolving duplicates with `policy`
pub fn pivot(records: &[RawRecord], policy: ConflictPolicy) -> DashboardResult<PivotTable> {
    let mut cells: BTreeMap<(DateTime<Utc>, &str), Cell> = BTreeMap::new();

    for record in records {
        match cells.entry((record.time, record.field.as_str())) {
            Entry::Vacant(entry) => {
                entry.insert(Cell {
                    value: record.value,
                    sum: record.value,
                    count: 1,
                });
            }
            Entry::Occupied(mut entry) => {
                let cell = entry.get_mut();
                match policy {
                    ConflictPolicy::Reject => {
                        if !same_reading(cell.value, record.value) {
                            return Err(DashboardError::PivotConflict {
                                time: record.time,
                                field: record.field.clone(),
                                first: cell.value,
                                second: record.value,
                            });
                        }
                    }
                    ConflictPolicy::LastWriteWins => cell.value = record.value,
                    ConflictPolicy::Mean => {
                        cell.sum += record.value;
                        cell.count += 1;
                        cell.value = cell.sum / f64::from(cell.count);
                    }
                }
            }
        }
    }

    let columns: Vec<String> = cells
        .keys()
        .map(|(_, field)| *field)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect();
    let column_idx: HashMap<&str, usize> = columns
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.as_str(), idx))
        .collect();

    let mut rows: Vec<PivotRow> = Vec::new();
    for ((time, field), cell) in &cells {
        if rows.last().map(|row| row.time) != Some(*time) {
            rows.push(PivotRow {
                time: *time,
                values: vec![None; columns.len()],
            });
        }
        if let (Some(row), Some(&idx)) = (rows.last_mut(), column_idx.get(field)) {
            row.values[idx] = Some(cell.value);
        }
    }

    Ok(PivotTable { columns, rows })
}

fn same_reading(a: f64, b: f64) -> bool {
    a == b || (a.is_nan() && b.is_nan())
}
