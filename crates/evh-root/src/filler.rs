//! Histogram filling from column data with selections used as weights.
//!
//! Follows TTree::Draw semantics: an expression touching per-record arrays
//! (jagged columns) is evaluated once per array element with scalar columns
//! broadcast, and arrays of unequal length are iterated up to the shortest.
//! The selection value is the fill weight; a zero (or NaN) selection skips
//! the element.

use std::ops::Range;

use evh_core::Histogram;

use crate::error::{Result, RootError};
use crate::expr::CompiledExpr;

/// Borrowed view of one column.
#[derive(Debug, Clone, Copy)]
pub enum Column<'a> {
    /// One value per record.
    Scalar(&'a [f64]),
    /// One array per record.
    Jagged(&'a [Vec<f64>]),
}

impl Column<'_> {
    fn len_at(&self, entry: usize) -> Option<usize> {
        match self {
            Column::Scalar(_) => None,
            Column::Jagged(v) => Some(v[entry].len()),
        }
    }

    fn value(&self, entry: usize, element: usize) -> f64 {
        match self {
            Column::Scalar(v) => v[entry],
            Column::Jagged(v) => v[entry][element],
        }
    }
}

/// An expression with its columns resolved.
struct Bound<'e, 'c> {
    expr: &'e CompiledExpr,
    columns: Vec<Column<'c>>,
    row: Vec<f64>,
}

impl<'e, 'c> Bound<'e, 'c> {
    fn new<F>(expr: &'e CompiledExpr, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<Column<'c>>,
    {
        let columns = expr
            .required_branches
            .iter()
            .map(|name| lookup(name).ok_or_else(|| RootError::BranchNotFound(name.clone())))
            .collect::<Result<Vec<_>>>()?;
        let row = vec![0.0; columns.len()];
        Ok(Self { expr, columns, row })
    }

    fn eval(&mut self, entry: usize, element: usize) -> f64 {
        for (slot, col) in self.row.iter_mut().zip(&self.columns) {
            *slot = col.value(entry, element);
        }
        self.expr.eval_row(&self.row)
    }
}

/// Fill `hist` from the records in `range`.
///
/// `axes` are given in x, y, z, t order and must match the histogram
/// dimensionality. `lookup` resolves a branch name to its column. Returns the
/// number of fills performed.
pub fn fill_range<'c, F>(
    hist: &mut Histogram,
    axes: &[&CompiledExpr],
    selection: Option<&CompiledExpr>,
    lookup: F,
    range: Range<u64>,
) -> Result<u64>
where
    F: Fn(&str) -> Option<Column<'c>>,
{
    if axes.len() != hist.dimension() {
        return Err(RootError::HistogramFill(format!(
            "histogram '{}' has {} axes but {} variable expression(s) were given",
            hist.name,
            hist.dimension(),
            axes.len()
        )));
    }

    let mut bound_axes =
        axes.iter().map(|e| Bound::new(e, &lookup)).collect::<Result<Vec<_>>>()?;
    let mut bound_sel = selection.map(|e| Bound::new(e, &lookup)).transpose()?;

    let mut coords = vec![0.0; axes.len()];
    let mut fills = 0u64;

    for entry in range {
        let entry = entry as usize;
        let n_elements = bound_axes
            .iter()
            .chain(bound_sel.iter())
            .flat_map(|b| b.columns.iter().filter_map(|c| c.len_at(entry)))
            .min()
            .unwrap_or(1);

        for element in 0..n_elements {
            let weight = match bound_sel.as_mut() {
                Some(sel) => sel.eval(entry, element),
                None => 1.0,
            };
            if weight == 0.0 || weight.is_nan() {
                continue;
            }
            for (c, axis) in coords.iter_mut().zip(bound_axes.iter_mut()) {
                *c = axis.eval(entry, element);
            }
            hist.fill(&coords, weight).map_err(|e| RootError::HistogramFill(e.to_string()))?;
            fills += 1;
        }
    }

    Ok(fills)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use evh_core::Axis;

    use super::*;

    fn hist_1d(edges: Vec<f64>) -> Histogram {
        Histogram::new("h", "", vec![Axis::new(edges).unwrap()]).unwrap()
    }

    #[test]
    fn fill_scalar_columns_with_selection_weight() {
        let x = vec![0.5, 1.5, 2.5, 0.5];
        let w = vec![2.0, 0.0, 1.0, 1.0];
        let cols: HashMap<&str, Column> =
            HashMap::from([("x", Column::Scalar(&x)), ("w", Column::Scalar(&w))]);

        let var = CompiledExpr::compile("x").unwrap();
        let sel = CompiledExpr::compile("w").unwrap();
        let mut h = hist_1d(vec![0.0, 1.0, 2.0, 3.0]);
        let n = fill_range(&mut h, &[&var], Some(&sel), |n| cols.get(n).copied(), 0..4).unwrap();

        assert_eq!(n, 3);
        assert_eq!(h.bin_content(1), 3.0);
        assert_eq!(h.bin_content(2), 0.0);
        assert_eq!(h.bin_content(3), 1.0);
    }

    #[test]
    fn fill_jagged_broadcasts_scalars() {
        let e = vec![vec![1.0, 2.0, 3.0], vec![], vec![0.5]];
        let id = vec![vec![11.0, 22.0, 11.0], vec![], vec![11.0]];
        let scale = vec![1.0, 1.0, 2.0];
        let cols: HashMap<&str, Column> = HashMap::from([
            ("S.energy", Column::Jagged(&e)),
            ("S.speciesId", Column::Jagged(&id)),
            ("scale", Column::Scalar(&scale)),
        ]);

        let var = CompiledExpr::compile("S.energy*scale").unwrap();
        let sel = CompiledExpr::compile("S.speciesId==11").unwrap();
        let mut h = hist_1d(vec![0.0, 2.0, 4.0]);
        let n = fill_range(&mut h, &[&var], Some(&sel), |n| cols.get(n).copied(), 0..3).unwrap();

        assert_eq!(n, 3);
        assert_eq!(h.bin_content(1), 2.0); // 1.0 and 0.5*2
        assert_eq!(h.bin_content(2), 1.0); // 3.0
    }

    #[test]
    fn fill_window_restricts_records() {
        let x = vec![0.5, 1.5, 2.5];
        let cols: HashMap<&str, Column> = HashMap::from([("x", Column::Scalar(&x))]);
        let var = CompiledExpr::compile("x").unwrap();
        let mut h = hist_1d(vec![0.0, 1.0, 2.0, 3.0]);
        fill_range(&mut h, &[&var], None, |n| cols.get(n).copied(), 1..2).unwrap();
        assert_eq!(h.integral(), 1.0);
        assert_eq!(h.bin_content(2), 1.0);
    }

    #[test]
    fn fill_2d() {
        let x = vec![0.5, 1.5];
        let y = vec![10.0, 30.0];
        let cols: HashMap<&str, Column> =
            HashMap::from([("x", Column::Scalar(&x)), ("y", Column::Scalar(&y))]);
        let ex = CompiledExpr::compile("x").unwrap();
        let ey = CompiledExpr::compile("y").unwrap();
        let mut h = Histogram::new(
            "h2",
            "",
            vec![Axis::uniform(2, 0.0, 2.0).unwrap(), Axis::uniform(2, 0.0, 40.0).unwrap()],
        )
        .unwrap();
        fill_range(&mut h, &[&ex, &ey], None, |n| cols.get(n).copied(), 0..2).unwrap();
        assert_eq!(h.bin_content(h.cell_index(&[1, 1]).unwrap()), 1.0);
        assert_eq!(h.bin_content(h.cell_index(&[2, 2]).unwrap()), 1.0);
    }

    #[test]
    fn missing_branch_and_dimension_mismatch() {
        let cols: HashMap<&str, Column> = HashMap::new();
        let var = CompiledExpr::compile("nope").unwrap();
        let mut h = hist_1d(vec![0.0, 1.0]);
        let err = fill_range(&mut h, &[&var], None, |n| cols.get(n).copied(), 0..1).unwrap_err();
        assert!(matches!(err, RootError::BranchNotFound(_)));

        let err =
            fill_range(&mut h, &[&var, &var], None, |n| cols.get(n).copied(), 0..1).unwrap_err();
        assert!(matches!(err, RootError::HistogramFill(_)));
    }
}
