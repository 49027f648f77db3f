//! Affine helpers for strike keys
//!
//! Glyph shape depends on the linear part of a transform only, so keys
//! strip translation and the retention policy needs to know how "unusual"
//! a transform is. Both questions are answered here on top of
//! [`kurbo::Affine`], whose coefficients `[a, b, c, d, e, f]` map
//! `(x, y)` to `(a·x + c·y + e, b·x + d·y + f)`.

use kurbo::Affine;

/// Drop the translation component, keeping the linear part
pub fn strip_translation(tx: Affine) -> Affine {
    let [a, b, c, d, _, _] = tx.as_coeffs();
    Affine::new([a, b, c, d, 0.0, 0.0])
}

/// True when the transform carries any translation
pub fn has_translation(tx: &Affine) -> bool {
    let [_, _, _, _, e, f] = tx.as_coeffs();
    e != 0.0 || f != 0.0
}

/// True when the linear parts are equal
///
/// Signed zeros compare equal, matching float equality.
pub fn linear_eq(lhs: &Affine, rhs: &Affine) -> bool {
    let l = lhs.as_coeffs();
    let r = rhs.as_coeffs();
    l[..4] == r[..4]
}

/// Hash-stable bit pattern of the linear part
///
/// `-0.0` is folded onto `0.0` so that [`linear_eq`] and this agree.
pub fn linear_bits(tx: &Affine) -> [u64; 4] {
    let c = tx.as_coeffs();
    let norm = |v: f64| if v == 0.0 { 0u64 } else { v.to_bits() };
    [norm(c[0]), norm(c[1]), norm(c[2]), norm(c[3])]
}

/// Effective vertical scale, with shear folded in
///
/// Used to turn a nominal point size into the size glyphs are really
/// rasterized at.
pub fn vertical_scale(tx: &Affine) -> f64 {
    let [_, _, c, d, _, _] = tx.as_coeffs();
    if c != 0.0 {
        (c * c + d * d).sqrt()
    } else {
        d.abs()
    }
}

/// How a transform distorts glyph shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransformClass {
    Identity,
    Translation,
    /// Axis-aligned scaling, possibly non-uniform
    Scale,
    /// Axis-aligned with a mirrored axis
    Flip,
    /// Rotation by a multiple of 90 degrees (with optional scale)
    QuadrantRotation,
    /// Rotation by an arbitrary angle, axes still orthogonal
    GeneralRotation,
    /// Shear or any other non-orthogonal mapping
    General,
}

impl TransformClass {
    /// Classify a transform
    pub fn of(tx: &Affine) -> Self {
        let [a, b, c, d, _, _] = tx.as_coeffs();

        if b == 0.0 && c == 0.0 {
            if a == 1.0 && d == 1.0 {
                return if has_translation(tx) {
                    TransformClass::Translation
                } else {
                    TransformClass::Identity
                };
            }
            if a < 0.0 || d < 0.0 {
                return TransformClass::Flip;
            }
            return TransformClass::Scale;
        }

        // Columns must be orthogonal and equally long for a pure rotation
        let dot = a * c + b * d;
        let len_x = a * a + b * b;
        let len_y = c * c + d * d;
        let tolerance = 1e-9 * len_x.max(len_y).max(1.0);
        if dot.abs() > tolerance || (len_x - len_y).abs() > tolerance {
            return TransformClass::General;
        }

        if a == 0.0 && d == 0.0 {
            TransformClass::QuadrantRotation
        } else {
            TransformClass::GeneralRotation
        }
    }

    /// Anything beyond a quadrant rotation
    pub fn is_general(self) -> bool {
        matches!(self, TransformClass::General)
    }

    pub fn is_general_rotation(self) -> bool {
        matches!(self, TransformClass::GeneralRotation)
    }
}
