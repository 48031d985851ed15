//! Affine matrix composition and decomposition.
//!
//! Matrices follow the CSS conventions: `matrix(a, b, c, d, e, f)` for 2-D and a
//! column-major `matrix3d(...)` with 16 values for 3-D.

use nalgebra::Matrix4;

use super::css::{parse_number, split_functions};
use super::{Channel, Transform};
use crate::error::AnimationError;

/// Matrix as reported by a host for an element's computed transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ComputedMatrix {
    /// `matrix(a, b, c, d, e, f)`
    Affine2d([f64; 6]),
    /// `matrix3d(...)`, column-major
    Affine3d([f64; 16]),
}

impl ComputedMatrix {
    /// Parse a host matrix string. `none` and the empty string mean "no transform".
    pub fn parse(input: &str) -> Result<Option<Self>, AnimationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "none" {
            return Ok(None);
        }
        let mut functions = split_functions(trimmed)?;
        if functions.len() != 1 {
            return Err(AnimationError::TransformParse {
                reason: format!("expected a single matrix function, got '{trimmed}'"),
            });
        }
        let (name, args) = functions.remove(0);
        let values = args
            .iter()
            .map(|a| parse_number(a))
            .collect::<Result<Vec<f64>, _>>()?;
        match (name.as_str(), values.len()) {
            ("matrix", 6) => {
                let mut m = [0.0; 6];
                m.copy_from_slice(&values);
                Ok(Some(Self::Affine2d(m)))
            }
            ("matrix3d", 16) => {
                let mut m = [0.0; 16];
                m.copy_from_slice(&values);
                Ok(Some(Self::Affine3d(m)))
            }
            (name, n) => Err(AnimationError::TransformParse {
                reason: format!("unsupported matrix '{name}' with {n} values"),
            }),
        }
    }

    /// Pick the 2-D form when the matrix has no 3-D component.
    pub fn from_matrix(m: &Matrix4<f64>) -> Self {
        let c = m.as_slice();
        let is_2d = c[2] == 0.0
            && c[3] == 0.0
            && c[6] == 0.0
            && c[7] == 0.0
            && c[8] == 0.0
            && c[9] == 0.0
            && c[10] == 1.0
            && c[11] == 0.0
            && c[14] == 0.0
            && c[15] == 1.0;
        if is_2d {
            Self::Affine2d([c[0], c[1], c[4], c[5], c[12], c[13]])
        } else {
            let mut values = [0.0; 16];
            values.copy_from_slice(c);
            Self::Affine3d(values)
        }
    }

    /// Host string for this matrix
    pub fn to_css(&self) -> String {
        let (name, values): (&str, &[f64]) = match self {
            Self::Affine2d(v) => ("matrix", &v[..]),
            Self::Affine3d(v) => ("matrix3d", &v[..]),
        };
        let joined = values
            .iter()
            // -0 prints as "-0"
            .map(|v| (if *v == 0.0 { 0.0 } else { *v }).to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!("{name}({joined})")
    }

    /// Decompose into transform channels.
    ///
    /// Translation comes from the last column, scale from the magnitude of each
    /// basis column, rotation from `atan2` of the scale-normalised rotation block
    /// (rotations are composed X, then Y, then Z). Skew and perspective are not
    /// recovered.
    pub fn decompose(&self) -> Transform {
        match *self {
            Self::Affine2d([a, b, c, d, e, f]) => Transform::new()
                .with(Channel::TranslateX, e)
                .with(Channel::TranslateY, f)
                .with(Channel::RotateZ, b.atan2(a).to_degrees())
                .with(Channel::ScaleX, a.hypot(b))
                .with(Channel::ScaleY, c.hypot(d)),
            Self::Affine3d(m) => {
                let sx = norm3(m[0], m[1], m[2]);
                let sy = norm3(m[4], m[5], m[6]);
                let sz = norm3(m[8], m[9], m[10]);
                let nx = non_zero(sx);
                let ny = non_zero(sy);
                let nz = non_zero(sz);

                let rotate_x = (-m[9]).atan2(m[10]);
                let rotate_y = (m[8] / nz).atan2((m[9] / nz).hypot(m[10] / nz));
                let rotate_z = (-m[4] / ny).atan2(m[0] / nx);

                Transform::new()
                    .with(Channel::TranslateX, m[12])
                    .with(Channel::TranslateY, m[13])
                    .with(Channel::TranslateZ, m[14])
                    .with(Channel::RotateX, rotate_x.to_degrees())
                    .with(Channel::RotateY, rotate_y.to_degrees())
                    .with(Channel::RotateZ, rotate_z.to_degrees())
                    .with(Channel::ScaleX, sx)
                    .with(Channel::ScaleY, sy)
                    .with(Channel::ScaleZ, sz)
            }
        }
    }
}

#[inline]
fn norm3(x: f64, y: f64, z: f64) -> f64 {
    (x * x + y * y + z * z).sqrt()
}

#[inline]
fn non_zero(v: f64) -> f64 {
    if v.abs() < f64::EPSILON {
        1.0
    } else {
        v
    }
}

impl Transform {
    /// Compose the 4×4 matrix in canonical order:
    /// `perspective · translate · rotateX · rotateY · rotateZ · scale · skewX · skewY`.
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();

        let perspective = self.value(Channel::Perspective);
        if perspective > 0.0 {
            let mut p = Matrix4::identity();
            p[(3, 2)] = -1.0 / perspective;
            m *= p;
        }

        m *= Matrix4::new_translation(&nalgebra::Vector3::new(
            self.value(Channel::TranslateX),
            self.value(Channel::TranslateY),
            self.value(Channel::TranslateZ),
        ));

        let (sa, ca) = self.value(Channel::RotateX).to_radians().sin_cos();
        let mut rx = Matrix4::identity();
        rx[(1, 1)] = ca;
        rx[(1, 2)] = -sa;
        rx[(2, 1)] = sa;
        rx[(2, 2)] = ca;
        m *= rx;

        let (sb, cb) = self.value(Channel::RotateY).to_radians().sin_cos();
        let mut ry = Matrix4::identity();
        ry[(0, 0)] = cb;
        ry[(0, 2)] = sb;
        ry[(2, 0)] = -sb;
        ry[(2, 2)] = cb;
        m *= ry;

        let (sc, cc) = self.value(Channel::RotateZ).to_radians().sin_cos();
        let mut rz = Matrix4::identity();
        rz[(0, 0)] = cc;
        rz[(0, 1)] = -sc;
        rz[(1, 0)] = sc;
        rz[(1, 1)] = cc;
        m *= rz;

        m *= Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::new(
            self.value(Channel::ScaleX),
            self.value(Channel::ScaleY),
            self.value(Channel::ScaleZ),
        ));

        let skew_x = self.value(Channel::SkewX);
        if skew_x != 0.0 {
            let mut k = Matrix4::identity();
            k[(0, 1)] = skew_x.to_radians().tan();
            m *= k;
        }
        let skew_y = self.value(Channel::SkewY);
        if skew_y != 0.0 {
            let mut k = Matrix4::identity();
            k[(1, 0)] = skew_y.to_radians().tan();
            m *= k;
        }

        m
    }

    /// Host-style computed matrix string for this transform
    pub fn to_matrix_css(&self) -> String {
        if self.is_empty() {
            return "none".to_string();
        }
        ComputedMatrix::from_matrix(&self.to_matrix()).to_css()
    }
}
