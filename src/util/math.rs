//! Math type re-exports and RIB-specific numeric helpers.
//!
//! Matrices follow the RenderMan row-vector convention: a point is
//! transformed as `p * M`, and the translation lives in elements 12..14 of
//! the 16-float array. `glam` stores matrices column-major with the same
//! translation slots, so `to_cols_array()` is written to the stream as-is.

pub use glam::{DMat4, DVec3, Mat4, Vec2, Vec3, Vec4};

/// Tolerance used when deciding whether two samples are congruent.
pub const FLOAT_EPSILON: f32 = 0.0001;

/// Test two floats for equality within [`FLOAT_EPSILON`].
#[inline]
pub fn equiv(a: f32, b: f32) -> bool {
    (a - b).abs() < FLOAT_EPSILON
}

/// Element-wise [`equiv`] over two slices; differing lengths never match.
pub fn equiv_slice(a: &[f32], b: &[f32]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equiv(*x, *y))
}

/// Element-wise [`equiv`] over two point arrays.
pub fn equiv_points(a: &[Vec3], b: &[Vec3]) -> bool {
    equiv_slice(bytemuck::cast_slice(a), bytemuck::cast_slice(b))
}

/// Flatten a transform into the 16 floats of a RIB matrix.
#[inline]
pub fn rib_matrix(m: &DMat4) -> [f32; 16] {
    m.as_mat4().to_cols_array()
}

/// Matrix equality as the animation test sees it.
pub fn matrices_equal(a: &DMat4, b: &DMat4) -> bool {
    a.to_cols_array()
        .iter()
        .zip(b.to_cols_array().iter())
        .all(|(x, y)| (x - y).abs() < f64::from(FLOAT_EPSILON))
}
