// src/geometry.rs

/// Angle in degrees at vertex `p2` between the rays towards `p1` and `p3`.
///
/// Returns `None` when either ray has zero length, which is how collapsed
/// keypoints (two landmarks predicted onto the same pixel) show up. The dot
/// product is clamped to [-1, 1] before `acos` so floating-point overshoot at
/// the domain boundary cannot produce NaN.
pub fn angle(p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)) -> Option<f64> {
    let v1 = (p1.0 - p2.0, p1.1 - p2.1);
    let v2 = (p3.0 - p2.0, p3.1 - p2.1);

    let n1 = (v1.0 * v1.0 + v1.1 * v1.1).sqrt();
    let n2 = (v2.0 * v2.0 + v2.1 * v2.1).sqrt();
    if n1 == 0.0 || n2 == 0.0 {
        return None;
    }

    let dot = (v1.0 / n1) * (v2.0 / n2) + (v1.1 / n1) * (v2.1 / n2);
    Some(dot.clamp(-1.0, 1.0).acos().to_degrees())
}

/// Euclidean distance between two points.
pub fn distance(p1: (f64, f64), p2: (f64, f64)) -> f64 {
    let dx = p1.0 - p2.0;
    let dy = p1.1 - p2.1;
    (dx * dx + dy * dy).sqrt()
}
