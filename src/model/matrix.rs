use std::collections::HashSet;

use crate::error::MatrixError;

/// Genes x cells expression values, stored column-wise (one sparse column per cell).
///
/// Gene and cell identifiers are unique; every column is sorted by gene index and holds only
/// non-negative finite values. Zero entries may be omitted.
#[derive(Debug, Clone)]
pub struct ExpressionMatrix {
    genes: Vec<String>,
    cells: Vec<String>,
    columns: Vec<Vec<(u32, f32)>>,
}

impl ExpressionMatrix {
    pub fn from_columns(
        genes: Vec<String>,
        cells: Vec<String>,
        columns: Vec<Vec<(u32, f32)>>,
    ) -> Result<Self, MatrixError> {
        if columns.len() != cells.len() {
            return Err(MatrixError::ShapeMismatch {
                expected: cells.len(),
                got: columns.len(),
            });
        }

        let mut seen_genes = HashSet::with_capacity(genes.len());
        for gene in &genes {
            if !seen_genes.insert(gene.as_str()) {
                return Err(MatrixError::DuplicateGene(gene.clone()));
            }
        }

        let mut seen_cells = HashSet::with_capacity(cells.len());
        for cell in &cells {
            if !seen_cells.insert(cell.as_str()) {
                return Err(MatrixError::DuplicateCell(cell.clone()));
            }
        }

        let n_genes = genes.len();
        for (cell, column) in cells.iter().zip(&columns) {
            let mut prev: Option<u32> = None;
            for &(gene, value) in column {
                if gene as usize >= n_genes {
                    return Err(MatrixError::GeneOutOfRange {
                        cell: cell.clone(),
                        gene,
                        n_genes,
                    });
                }
                if prev.is_some_and(|p| p >= gene) {
                    return Err(MatrixError::UnsortedColumn {
                        cell: cell.clone(),
                        gene,
                    });
                }
                if !value.is_finite() || value < 0.0 {
                    return Err(MatrixError::InvalidValue {
                        cell: cell.clone(),
                        value,
                    });
                }
                prev = Some(gene);
            }
        }

        Ok(Self {
            genes,
            cells,
            columns,
        })
    }

    /// Builds a matrix from dense rows (`rows[gene][cell]`), dropping zeros.
    pub fn from_dense(
        genes: Vec<String>,
        cells: Vec<String>,
        rows: &[Vec<f32>],
    ) -> Result<Self, MatrixError> {
        if rows.len() != genes.len() {
            return Err(MatrixError::ShapeMismatch {
                expected: genes.len(),
                got: rows.len(),
            });
        }
        let mut columns: Vec<Vec<(u32, f32)>> = vec![Vec::new(); cells.len()];
        for (gene, row) in rows.iter().enumerate() {
            if row.len() != cells.len() {
                return Err(MatrixError::ShapeMismatch {
                    expected: cells.len(),
                    got: row.len(),
                });
            }
            for (cell, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    columns[cell].push((gene as u32, value));
                }
            }
        }
        Self::from_columns(genes, cells, columns)
    }

    pub fn n_genes(&self) -> usize {
        self.genes.len()
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn genes(&self) -> &[String] {
        &self.genes
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    #[inline]
    pub fn column(&self, cell: usize) -> &[(u32, f32)] {
        &self.columns[cell]
    }

    pub fn libsize(&self, cell: usize) -> f32 {
        let mut sum = 0f64;
        for &(_, v) in &self.columns[cell] {
            sum += v as f64;
        }
        sum as f32
    }

    /// Rewrites every column through `f(libsize, value)`; the gene/cell layout is kept.
    pub fn map_columns(&self, f: impl Fn(f64, f32) -> f32) -> Self {
        let mut columns = Vec::with_capacity(self.columns.len());
        for cell in 0..self.columns.len() {
            let lib = self.libsize(cell) as f64;
            let col = self.columns[cell]
                .iter()
                .map(|&(gene, v)| (gene, f(lib, v)))
                .collect();
            columns.push(col);
        }
        Self {
            genes: self.genes.clone(),
            cells: self.cells.clone(),
            columns,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/model/matrix.rs"]
mod tests;
