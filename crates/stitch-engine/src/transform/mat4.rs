use core::ops::Mul;

use crate::coords::Vec2;

/// 4×4 homogeneous transform, `col * 4 + row` layout.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4(pub [f64; 16]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ]);

    /// Pure translation by `v` (z = 0).
    #[inline]
    pub fn translation(v: Vec2) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        m.0[12] = v.x;
        m.0[13] = v.y;
        m
    }

    /// Uniform scale about the origin (x, y and z).
    #[inline]
    pub fn uniform_scale(s: f64) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        m.0[0] = s;
        m.0[5] = s;
        m.0[10] = s;
        m
    }

    /// `T(anchor) · S(factor) · T(-anchor)`: scales about `anchor`, which stays fixed.
    pub fn scale_around(anchor: Vec2, factor: f64) -> Mat4 {
        Mat4::chain(&[
            Mat4::translation(anchor),
            Mat4::uniform_scale(factor),
            Mat4::translation(-anchor),
        ])
    }

    /// Left-to-right product `m[0] · m[1] · … · m[n-1]`.
    ///
    /// The rightmost matrix is applied to points first. An empty slice is the identity.
    pub fn chain(matrices: &[Mat4]) -> Mat4 {
        matrices
            .iter()
            .fold(Mat4::IDENTITY, |acc, m| acc.multiply(m))
    }

    /// Matrix product `self · rhs`.
    pub fn multiply(&self, rhs: &Mat4) -> Mat4 {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0; 16];
        for col in 0..4 {
            for row in 0..4 {
                out[col * 4 + row] = (0..4).map(|k| a[k * 4 + row] * b[col * 4 + k]).sum();
            }
        }
        Mat4(out)
    }

    /// Matrix · homogeneous column vector.
    pub fn transform_vec4(&self, v: [f64; 4]) -> [f64; 4] {
        let m = &self.0;
        let mut out = [0.0; 4];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = v[0] * m[row] + v[1] * m[4 + row] + v[2] * m[8 + row] + v[3] * m[12 + row];
        }
        out
    }

    /// Maps a 2D point (z = 0, w = 1).
    #[inline]
    pub fn transform_point(&self, p: Vec2) -> Vec2 {
        let [x, y, _, _] = self.transform_vec4([p.x, p.y, 0.0, 1.0]);
        Vec2::new(x, y)
    }

    #[inline]
    pub fn translation_xy(&self) -> Vec2 {
        Vec2::new(self.0[12], self.0[13])
    }

    #[inline]
    pub fn set_translation_x(&mut self, x: f64) {
        self.0[12] = x;
    }

    #[inline]
    pub fn set_translation_y(&mut self, y: f64) {
        self.0[13] = y;
    }

    /// Adds `d` to the translation in place; equivalent to `T(d) · self` for affine matrices.
    #[inline]
    pub fn translate_by(&mut self, d: Vec2) {
        self.0[12] += d.x;
        self.0[13] += d.y;
    }

    /// True when the bottom row is `[0, 0, 0, 1]`.
    pub fn is_affine(&self) -> bool {
        self.0[3] == 0.0 && self.0[7] == 0.0 && self.0[11] == 0.0 && self.0[15] == 1.0
    }

    /// Inverse of the 2D part (x/y linear block plus x/y translation).
    ///
    /// Returns `None` when the 2D block is singular or the matrix is not affine.
    pub fn inverse_2d(&self) -> Option<Mat4> {
        if !self.is_affine() {
            return None;
        }
        let m = &self.0;
        let (a, b, c, d) = (m[0], m[4], m[1], m[5]);
        let det = a * d - b * c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let inv_det = 1.0 / det;
        let (ia, ib, ic, id) = (d * inv_det, -b * inv_det, -c * inv_det, a * inv_det);
        let (tx, ty) = (m[12], m[13]);

        let mut out = Mat4::IDENTITY;
        out.0[0] = ia;
        out.0[4] = ib;
        out.0[1] = ic;
        out.0[5] = id;
        out.0[12] = -(ia * tx + ib * ty);
        out.0[13] = -(ic * tx + id * ty);
        Some(out)
    }

    /// CSS `matrix3d(...)` rendering, handy for logs.
    pub fn to_css(&self) -> String {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        format!("matrix3d({})", parts.join(","))
    }
}

impl Default for Mat4 {
    fn default() -> Self {
        Mat4::IDENTITY
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    #[inline]
    fn mul(self, rhs: Mat4) -> Mat4 {
        self.multiply(&rhs)
    }
}
