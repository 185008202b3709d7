use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Dense boolean dependency matrix, row-major.
///
/// Row `i` describes output `i`; cell `(i, j)` is `true` when output `i`
/// may depend on input `j`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CoordMatrix {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
}

impl CoordMatrix {
    /// All-`false` matrix of the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![false; cell_count(rows, cols)],
        }
    }

    /// All-`true` matrix of the given shape.
    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![true; cell_count(rows, cols)],
        }
    }

    /// `k×k` identity: output `i` depends on input `i` only.
    pub fn identity(k: usize) -> Self {
        let mut m = Self::zeros(k, k);
        for i in 0..k {
            m.set(i, i, true);
        }
        m
    }

    /// Build from explicit rows. Returns `None` if the rows are ragged.
    pub fn from_rows<R: AsRef<[bool]>>(rows: &[R]) -> Option<Self> {
        let cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut cells = Vec::with_capacity(cell_count(rows.len(), cols));
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return None;
            }
            cells.extend_from_slice(row);
        }
        Some(Self {
            rows: rows.len(),
            cols,
            cells,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.rows
    }

    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`, i.e. `(n_outputs, n_inputs)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> bool {
        assert!(row < self.rows && col < self.cols, "index out of bounds");
        self.cells[row * self.cols + col]
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: bool) {
        assert!(row < self.rows && col < self.cols, "index out of bounds");
        self.cells[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[bool] {
        &self.cells[row * self.cols..(row + 1) * self.cols]
    }

    /// Iterate over rows in output order.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> + '_ {
        (0..self.rows).map(move |r| self.row(r))
    }

    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        self.rows().map(|r| r.to_vec()).collect()
    }

    /// Copy of the `rows×cols` block whose top-left corner is `(row, col)`.
    pub fn block(&self, row: usize, col: usize, rows: usize, cols: usize) -> CoordMatrix {
        assert!(
            row + rows <= self.rows && col + cols <= self.cols,
            "block out of bounds"
        );
        let mut out = CoordMatrix::zeros(rows, cols);
        for r in 0..rows {
            let src = &self.row(row + r)[col..col + cols];
            out.cells[r * cols..(r + 1) * cols].copy_from_slice(src);
        }
        out
    }

    /// Overwrite the block at `(row, col)` with `src`, cell by cell.
    pub(crate) fn write_block(&mut self, row: usize, col: usize, src: &CoordMatrix) {
        assert!(
            row + src.rows <= self.rows && col + src.cols <= self.cols,
            "block out of bounds"
        );
        for r in 0..src.rows {
            let dst_start = (row + r) * self.cols + col;
            self.cells[dst_start..dst_start + src.cols].copy_from_slice(src.row(r));
        }
    }

    /// Number of `true` cells in each row.
    pub fn row_counts(&self) -> Vec<usize> {
        self.rows()
            .map(|r| r.iter().filter(|&&c| c).count())
            .collect()
    }

    pub fn count_true(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// True if every row has at least one `true` cell (vacuously true
    /// when there are no columns to depend on).
    pub fn rows_all_nonempty(&self) -> bool {
        self.cols == 0 || self.rows().all(|r| r.iter().any(|&c| c))
    }

    pub fn is_identity(&self) -> bool {
        self.rows == self.cols && *self == CoordMatrix::identity(self.rows)
    }
}

/// Callers bound both sides by `MAX_ARITY`; overflow here is a bug.
fn cell_count(rows: usize, cols: usize) -> usize {
    rows.checked_mul(cols)
        .unwrap_or_else(|| panic!("matrix shape {}x{} overflows usize", rows, cols))
}

impl fmt::Display for CoordMatrix {
    /// One line per output, `1`/`0` per input, space separated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.rows().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            let line: Vec<&str> = row.iter().map(|&c| if c { "1" } else { "0" }).collect();
            write!(f, "{}", line.join(" "))?;
        }
        Ok(())
    }
}

impl fmt::Debug for CoordMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoordMatrix({}x{})", self.rows, self.cols)?;
        for row in self.rows() {
            let line: String = row.iter().map(|&c| if c { 'T' } else { '.' }).collect();
            write!(f, "\n  {}", line)?;
        }
        Ok(())
    }
}

impl Serialize for CoordMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows))?;
        for row in self.rows() {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}
