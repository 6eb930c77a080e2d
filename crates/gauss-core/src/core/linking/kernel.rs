use crate::core::models::curve::Segment;
use nalgebra::Vector3;
use std::f64::consts::PI;

/// Cross products with a norm below this value, and triple products with a magnitude
/// below it, are treated as zero.
pub const DEGENERACY_TOLERANCE: f64 = 1e-12;

const FOUR_PI: f64 = 4.0 * PI;

/// Computes the Gauss linking integral between two directed straight segments.
///
/// The magnitude is the solid angle Ω subtended by the quadrilateral spanned by the
/// four connecting vectors, divided by 4π. Its sign is that of
/// `((q2 - q1) × (p2 - p1)) · (q1 - p1)`, so the value equals the Gauss double integral
/// `1/4π ∫∫ (dγa × dγb)·(γa - γb) / |γa - γb|³`. Swapping the two segments leaves the
/// value unchanged; reversing either one flips its sign. Coplanar pairs have no
/// orientation and contribute 0 when `signed`; unsigned they keep `|Ω| / 4π`, which is
/// `0.5` for two segments crossing each other in a common plane.
///
/// Degenerate inputs (coincident or collinear points, parallel or zero-length
/// segments) return exactly `0.0`.
///
/// # Arguments
///
/// * `seg_a` - Segment `p1 → p2` of the first structure.
/// * `seg_b` - Segment `q1 → q2` of the second structure.
/// * `signed` - If `false`, the absolute value is returned.
pub fn segment_linking(seg_a: &Segment, seg_b: &Segment, signed: bool) -> f64 {
    linking_between(
        &seg_a.start.coords,
        &seg_a.end.coords,
        &seg_b.start.coords,
        &seg_b.end.coords,
        signed,
    )
}

/// Point-level form of [`segment_linking`] used by the pairwise loops.
#[inline]
pub(crate) fn linking_between(
    p1: &Vector3<f64>,
    p2: &Vector3<f64>,
    q1: &Vector3<f64>,
    q2: &Vector3<f64>,
    signed: bool,
) -> f64 {
    let direction = (q2 - q1).cross(&(p2 - p1));
    if direction.norm() < DEGENERACY_TOLERANCE {
        return 0.0;
    }

    let r11 = q1 - p1;
    let r12 = q2 - p1;
    let r22 = q2 - p2;
    let r21 = q1 - p2;

    let Some(n1) = unit_normal(&r11, &r12) else {
        return 0.0;
    };
    let Some(n2) = unit_normal(&r12, &r22) else {
        return 0.0;
    };
    let Some(n3) = unit_normal(&r22, &r21) else {
        return 0.0;
    };
    let Some(n4) = unit_normal(&r21, &r11) else {
        return 0.0;
    };

    let omega = clamped_asin(n1.dot(&n2))
        + clamped_asin(n2.dot(&n3))
        + clamped_asin(n3.dot(&n4))
        + clamped_asin(n4.dot(&n1));

    let magnitude = omega.abs() / FOUR_PI;
    if !signed {
        return magnitude;
    }
    let orientation = direction.dot(&r11);
    if orientation.abs() < DEGENERACY_TOLERANCE {
        0.0
    } else {
        magnitude.copysign(orientation)
    }
}

#[inline]
fn unit_normal(a: &Vector3<f64>, b: &Vector3<f64>) -> Option<Vector3<f64>> {
    let c = a.cross(b);
    let norm = c.norm();
    if norm < DEGENERACY_TOLERANCE {
        None
    } else {
        Some(c / norm)
    }
}

#[inline]
fn clamped_asin(x: f64) -> f64 {
    x.clamp(-1.0, 1.0).asin()
}
