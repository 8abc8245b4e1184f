//! Result surface: price points x simulation steps.
//!
//! Rows follow `calc_price` in the order given, columns are steps
//! `[0, runs_step)`. Core only guarantees the shape; any reordering for
//! presentation belongs to the consumer.

use serde::{Deserialize, Serialize};

use crate::config::EvaluationGrid;
use crate::error::SurfaceError;

/// Expected grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceShape {
    pub rows: usize,
    pub cols: usize,
}

/// Dense row-major grid of values.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultSurface {
    values: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl ResultSurface {
    /// Parse `result_data` and check it against `shape`.
    pub fn decode(data: &str, shape: SurfaceShape) -> Result<Self, SurfaceError> {
        let rows: Vec<Vec<f64>> =
            serde_json::from_str(data).map_err(|e| SurfaceError::Malformed(e.to_string()))?;
        let surface = Self::from_rows(rows)?;
        if surface.shape() != shape {
            return Err(SurfaceError::ShapeMismatch {
                rows: surface.rows,
                cols: surface.cols,
                expected_rows: shape.rows,
                expected_cols: shape.cols,
            });
        }
        Ok(surface)
    }

    /// Build from nested rows; every row must have the first row's length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, SurfaceError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut values = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(SurfaceError::Ragged {
                    row: i,
                    len: row.len(),
                    expected: cols,
                });
            }
            values.extend_from_slice(row);
        }
        Ok(Self {
            values,
            rows: rows.len(),
            cols,
        })
    }

    /// Grid of `shape` filled by `f(row, col)`.
    pub fn from_fn(shape: SurfaceShape, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(shape.rows * shape.cols);
        for r in 0..shape.rows {
            for c in 0..shape.cols {
                values.push(f(r, c));
            }
        }
        Self {
            values,
            rows: shape.rows,
            cols: shape.cols,
        }
    }

    pub fn shape(&self) -> SurfaceShape {
        SurfaceShape {
            rows: self.rows,
            cols: self.cols,
        }
    }

    pub fn row(&self, r: usize) -> Option<&[f64]> {
        (r < self.rows).then(|| &self.values[r * self.cols..(r + 1) * self.cols])
    }

    pub fn get(&self, r: usize, c: usize) -> Option<f64> {
        self.row(r).and_then(|row| row.get(c).copied())
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f64]> + '_ {
        (0..self.rows).filter_map(move |r| self.row(r))
    }

    /// Columns `[from, from + days)` of every row.
    pub fn window(&self, from: usize, days: usize) -> Result<SurfaceWindow<'_>, SurfaceError> {
        let end = from + days;
        if end > self.cols {
            return Err(SurfaceError::WindowOutOfRange {
                from,
                end,
                cols: self.cols,
            });
        }
        Ok(SurfaceWindow {
            surface: self,
            from,
            days,
        })
    }

    /// The reporting window an evaluation grid asks for.
    pub fn reporting_window(&self, grid: &EvaluationGrid) -> Result<SurfaceWindow<'_>, SurfaceError> {
        self.window(grid.run_from as usize, grid.run_days as usize)
    }

    /// `result_data` form: a JSON array of rows.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let rows: Vec<&[f64]> = self.rows().collect();
        serde_json::to_string(&rows)
    }
}

/// Read-only view of a column range.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceWindow<'a> {
    surface: &'a ResultSurface,
    from: usize,
    days: usize,
}

impl<'a> SurfaceWindow<'a> {
    /// First column of the view in surface coordinates.
    pub fn start(&self) -> usize {
        self.from
    }

    pub fn days(&self) -> usize {
        self.days
    }

    pub fn row_count(&self) -> usize {
        self.surface.rows
    }

    pub fn row(&self, r: usize) -> Option<&'a [f64]> {
        self.surface
            .row(r)
            .map(|row| &row[self.from..self.from + self.days])
    }

    pub fn rows(&self) -> impl Iterator<Item = &'a [f64]> + 'a {
        let window = *self;
        (0..window.surface.rows).filter_map(move |r| window.row(r))
    }
}
