//! B-spline evaluation helpers shared by curves and surfaces.
//!
//! Host applications usually describe a degree `p` spline with `n` control
//! points by `n + p - 1` knots, leaving out the two outermost entries of the
//! textbook `n + p + 1` vector. [`expand_host_knots`] and [`host_knots`]
//! convert between the two forms.

use super::core::Point3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct HPoint4 {
    pub(crate) x: f64,
    pub(crate) y: f64,
    pub(crate) z: f64,
    pub(crate) w: f64,
}

impl HPoint4 {
    pub(crate) const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub(crate) const fn weighted(point: Point3, w: f64) -> Self {
        Self::new(point.x * w, point.y * w, point.z * w, w)
    }

    pub(crate) fn lerp(self, rhs: Self, t: f64) -> Self {
        let s = 1.0 - t;
        Self::new(
            self.x * s + rhs.x * t,
            self.y * s + rhs.y * t,
            self.z * s + rhs.z * t,
            self.w * s + rhs.w * t,
        )
    }

    pub(crate) const fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.w - rhs.w)
    }

    pub(crate) const fn mul_scalar(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }

    pub(crate) fn to_point3(self) -> Option<Point3> {
        if self.w.is_finite() && self.w != 0.0 {
            Some(Point3::new(self.x / self.w, self.y / self.w, self.z / self.w))
        } else {
            None
        }
    }
}

pub(crate) fn is_non_decreasing(values: &[f64]) -> bool {
    values.windows(2).all(|w| w[0] <= w[1])
}

pub(crate) fn wrap_param(value: f64, start: f64, end: f64) -> f64 {
    let span = end - start;
    if !span.is_finite() || span == 0.0 {
        return start;
    }
    let mut t = (value - start) % span;
    if t < 0.0 {
        t += span;
    }
    start + t
}

/// Knot span index containing `u` for a spline with `n + 1` control points.
pub(crate) fn find_span(n: usize, p: usize, u: f64, knots: &[f64]) -> usize {
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[p] {
        return p;
    }

    let mut low = p;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// In-place de Boor recursion; the result ends up in `d[p]`.
pub(crate) fn de_boor(d: &mut [HPoint4], span: usize, p: usize, u: f64, knots: &[f64]) {
    for r in 1..=p {
        for j in (r..=p).rev() {
            let i = span - p + j;
            let denom = knots[i + p + 1 - r] - knots[i];
            let alpha = if denom == 0.0 { 0.0 } else { (u - knots[i]) / denom };
            d[j] = d[j - 1].lerp(d[j], alpha);
        }
    }
}

/// Adds the two outermost knots a host knot vector leaves implicit.
///
/// A clamped end repeats its boundary knot; an unclamped (periodic) end
/// continues the spacing of its neighbour, so `[-2, -1, .., 10]` becomes
/// `[-3, -2, .., 11]`.
pub fn expand_host_knots(host: &[f64]) -> Result<Vec<f64>, String> {
    if host.len() < 2 {
        return Err(format!("host knot vector needs at least 2 entries, got {}", host.len()));
    }
    if host.iter().any(|k| !k.is_finite()) {
        return Err("host knot vector must be finite".to_string());
    }
    if !is_non_decreasing(host) {
        return Err("host knot vector must be non-decreasing".to_string());
    }

    let last = host.len() - 1;
    let first = if host[0] == host[1] {
        host[0]
    } else {
        host[0] - (host[1] - host[0])
    };
    let end = if host[last] == host[last - 1] {
        host[last]
    } else {
        host[last] + (host[last] - host[last - 1])
    };

    let mut full = Vec::with_capacity(host.len() + 2);
    full.push(first);
    full.extend_from_slice(host);
    full.push(end);
    Ok(full)
}

/// Drops the outermost knots of a full knot vector.
#[must_use]
pub fn host_knots(full: &[f64]) -> Vec<f64> {
    if full.len() <= 2 {
        return Vec::new();
    }
    full[1..full.len() - 1].to_vec()
}
