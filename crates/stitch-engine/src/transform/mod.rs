//! Affine transform library.
//!
//! Stateless 4×4 homogeneous matrices laid out in CSS `matrix3d` order: entry
//! `col * 4 + row`, so the translation lives at indices 12, 13 and 14.
//! Points are column vectors (`p' = M · p`) and `a * b` applies `b` first.
//!
//! Only translations and uniform scales are ever composed here, so entry 15
//! stays 1 and the projective row stays zero.

mod mat4;

pub use mat4::Mat4;
