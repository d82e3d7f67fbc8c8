use crate::model::matrix::ExpressionMatrix;

pub const CP10K_SCALE: f64 = 10_000.0;

/// Library-size scaling to counts per 10,000. Cells without counts stay empty.
pub fn normalize_cp10k(matrix: &ExpressionMatrix) -> ExpressionMatrix {
    matrix.map_columns(|lib, v| {
        if lib > 0.0 {
            (v as f64 / lib * CP10K_SCALE) as f32
        } else {
            0.0
        }
    })
}
