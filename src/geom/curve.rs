use super::basis::{de_boor, expand_host_knots, find_span, host_knots, is_non_decreasing, HPoint4};
use super::core::{Point3, Tolerance, Vec3};

pub trait Curve3 {
    fn point_at(&self, t: f64) -> Point3;

    #[must_use]
    fn domain(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn derivative_at(&self, t: f64) -> Vec3 {
        let (a, b) = self.domain();
        let span = b - a;
        if !span.is_finite() || span == 0.0 {
            return Vec3::ZERO;
        }

        let h = Tolerance::DERIVATIVE.relative_to(span);
        if !h.is_finite() || h == 0.0 {
            return Vec3::ZERO;
        }

        let t0 = (t - h).max(a);
        let t1 = (t + h).min(b);
        if t1 == t0 {
            return Vec3::ZERO;
        }

        let p0 = self.point_at(t0);
        let p1 = self.point_at(t1);
        p1.sub_point(p0).mul_scalar(1.0 / (t1 - t0))
    }

    /// Returns the unit tangent vector at parameter `t`.
    /// Returns `None` if the derivative is zero or degenerate.
    #[must_use]
    fn tangent_at(&self, t: f64) -> Option<Vec3> {
        self.derivative_at(t).normalized()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve3 {
    pub degree: usize,
    pub control_points: Vec<Point3>,
    pub knots: Vec<f64>,
    pub weights: Option<Vec<f64>>,
}

impl NurbsCurve3 {
    pub fn new(
        degree: usize,
        control_points: Vec<Point3>,
        knots: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        if control_points.len() < 2 {
            return Err("nurbs curve requires at least 2 control points".to_string());
        }
        if degree == 0 {
            return Err("nurbs curve degree must be >= 1".to_string());
        }
        if degree >= control_points.len() {
            return Err("nurbs curve degree must be < control point count".to_string());
        }
        if control_points.iter().any(|p| !p.is_finite()) {
            return Err("nurbs curve control points must be finite".to_string());
        }

        let expected_knot_len = control_points.len() + degree + 1;
        if knots.len() != expected_knot_len {
            return Err(format!(
                "nurbs curve knot length must be {}, got {}",
                expected_knot_len,
                knots.len()
            ));
        }

        if let Some(ref weights) = weights {
            if weights.len() != control_points.len() {
                return Err("nurbs curve weights length must match control point count".to_string());
            }
            if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err("nurbs curve weights must be finite and > 0".to_string());
            }
        }

        if !is_non_decreasing(&knots) {
            return Err("nurbs curve knots must be non-decreasing".to_string());
        }

        Ok(Self {
            degree,
            control_points,
            knots,
            weights,
        })
    }

    /// Builds a curve from a host-style knot vector (`n + p - 1` entries).
    pub fn from_host_knots(
        degree: usize,
        control_points: Vec<Point3>,
        host: &[f64],
        weights: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        let expected = (control_points.len() + degree).saturating_sub(1);
        if host.len() != expected {
            return Err(format!(
                "nurbs curve host knot length must be {}, got {}",
                expected,
                host.len()
            ));
        }
        let knots = expand_host_knots(host)?;
        Self::new(degree, control_points, knots, weights)
    }

    /// Knot vector in host form (outermost knots dropped).
    #[must_use]
    pub fn knots_host(&self) -> Vec<f64> {
        host_knots(&self.knots)
    }

    /// Distinct knot values inside the domain, including both ends.
    #[must_use]
    pub fn span_breaks(&self) -> Vec<f64> {
        let (a, b) = self.domain();
        let mut breaks = vec![a];
        for &k in &self.knots[self.degree..=self.control_points.len()] {
            if k > a && k < b && breaks.last().is_some_and(|last| k > *last) {
                breaks.push(k);
            }
        }
        if b > a {
            breaks.push(b);
        }
        breaks
    }

    fn homogeneous(&self, index: usize) -> HPoint4 {
        let w = self
            .weights
            .as_ref()
            .and_then(|weights| weights.get(index).copied())
            .unwrap_or(1.0);
        HPoint4::weighted(self.control_points[index], w)
    }
}

impl Curve3 for NurbsCurve3 {
    fn point_at(&self, t: f64) -> Point3 {
        let p = self.degree;
        let (a, b) = self.domain();
        let u = t.clamp(a, b);

        let n = self.control_points.len() - 1;
        let span = find_span(n, p, u, &self.knots);

        let mut d: Vec<HPoint4> = (0..=p).map(|j| self.homogeneous(span - p + j)).collect();
        de_boor(&mut d, span, p, u, &self.knots);
        d[p].to_point3().unwrap_or(self.control_points[0])
    }

    fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.control_points.len()])
    }

    fn is_closed(&self) -> bool {
        let (a, b) = self.domain();
        Tolerance::default_geom().approx_eq_point3(self.point_at(a), self.point_at(b))
    }

    fn derivative_at(&self, t: f64) -> Vec3 {
        // Hodograph: degree p-1 spline with control points p * (P[i+1] - P[i]) / (u[i+p+1] - u[i+1]),
        // combined with the quotient rule for rational curves.
        let p = self.degree;
        let (a, b) = self.domain();
        let u = t.clamp(a, b);

        let n = self.control_points.len() - 1;
        let span = find_span(n, p, u, &self.knots);

        let mut d: Vec<HPoint4> = (0..=p).map(|j| self.homogeneous(span - p + j)).collect();

        let mut d_prime = Vec::with_capacity(p);
        for j in 0..p {
            let i = span - p + j;
            let denom = self.knots[i + p + 1] - self.knots[i + 1];
            let factor = if denom.abs() > 1e-14 { p as f64 / denom } else { 0.0 };
            d_prime.push(d[j + 1].sub(d[j]).mul_scalar(factor));
        }

        de_boor(&mut d, span, p, u, &self.knots);
        let value = d[p];

        let knots_der = &self.knots[1..self.knots.len() - 1];
        de_boor(&mut d_prime, span - 1, p - 1, u, knots_der);
        let deriv = d_prime[p - 1];

        let w = value.w;
        if w.abs() <= 1e-14 {
            return Vec3::ZERO;
        }
        let w_sq = w * w;
        Vec3::new(
            (deriv.x * w - value.x * deriv.w) / w_sq,
            (deriv.y * w - value.y * deriv.w) / w_sq,
            (deriv.z * w - value.z * deriv.w) / w_sq,
        )
    }
}

/// Chord-sum length approximation using `samples` uniform parameter steps.
#[must_use]
pub fn curve_arc_length<C: Curve3>(curve: &C, samples: usize) -> f64 {
    let samples = samples.max(1);
    let (t0, t1) = curve.domain();
    let span = t1 - t0;
    if !span.is_finite() || span == 0.0 {
        return 0.0;
    }

    let mut length = 0.0;
    let mut prev = curve.point_at(t0);
    for i in 1..=samples {
        let t = t0 + span * (i as f64 / samples as f64);
        let curr = curve.point_at(t);
        length += curr.sub_point(prev).length();
        prev = curr;
    }
    length
}

// 5-point Gauss–Legendre rule on [-1, 1].
const GAUSS_NODES: [f64; 5] = [
    0.0,
    -0.538_469_310_105_683_1,
    0.538_469_310_105_683_1,
    -0.906_179_845_938_664,
    0.906_179_845_938_664,
];
const GAUSS_WEIGHTS: [f64; 5] = [
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
    0.236_926_885_056_189_1,
];

/// Sub-intervals integrated per knot span.
const GAUSS_SUBDIVISIONS: usize = 8;

/// Arc length of a NURBS curve by Gauss–Legendre quadrature of `|C'(t)|`
/// over every knot span.
///
/// Spans whose speed is polynomial (e.g. collinear control points in
/// monotone order) are integrated exactly.
#[must_use]
pub fn curve_length(curve: &NurbsCurve3) -> f64 {
    let breaks = curve.span_breaks();
    let mut length = 0.0;
    for pair in breaks.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let step = (b - a) / GAUSS_SUBDIVISIONS as f64;
        for s in 0..GAUSS_SUBDIVISIONS {
            let lo = a + step * s as f64;
            let half = step / 2.0;
            let mid = lo + half;
            let sum: f64 = GAUSS_NODES
                .iter()
                .zip(GAUSS_WEIGHTS.iter())
                .map(|(x, w)| w * curve.derivative_at(mid + half * x).length())
                .sum();
            length += sum * half;
        }
    }
    length
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cubic(points: [[f64; 3]; 4]) -> NurbsCurve3 {
        NurbsCurve3::from_host_knots(
            3,
            points.iter().copied().map(Point3::from).collect(),
            &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            None,
        )
        .expect("valid cubic")
    }

    #[test]
    fn host_knot_length_is_validated() {
        let cvs = vec![Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)];
        assert!(NurbsCurve3::from_host_knots(1, cvs.clone(), &[0.0, 1.0], None).is_ok());
        assert!(NurbsCurve3::from_host_knots(1, cvs, &[0.0, 0.5, 1.0], None).is_err());
    }

    #[test]
    fn cubic_bezier_interpolates_end_points() {
        let curve = cubic([[0.0, 0.0, 0.0], [1.0, 2.0, 0.0], [3.0, 2.0, 0.0], [4.0, 0.0, 0.0]]);
        let tol = Tolerance::DEFAULT;
        assert!(tol.approx_eq_point3(curve.point_at(0.0), Point3::ORIGIN));
        assert!(tol.approx_eq_point3(curve.point_at(1.0), Point3::new(4.0, 0.0, 0.0)));
        assert_eq!(curve.knots_host(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn analytic_derivative_matches_end_tangents() {
        let curve = cubic([[0.0, 0.0, 0.0], [1.0, 2.0, 0.0], [3.0, 2.0, 0.0], [4.0, 0.0, 0.0]]);
        let tol = Tolerance::new(1e-9);
        assert!(tol.approx_eq_vec3(curve.derivative_at(0.0), Vec3::new(3.0, 6.0, 0.0)));
        assert!(tol.approx_eq_vec3(curve.derivative_at(1.0), Vec3::new(3.0, -6.0, 0.0)));
    }

    #[test]
    fn straight_cubic_length_is_exact() {
        let curve = cubic([[0.0, 0.0, 0.0], [0.0, 0.0, 2.5], [0.0, 0.0, 7.5], [0.0, 0.0, 10.0]]);
        assert!((curve_length(&curve) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn quadrature_agrees_with_dense_chord_sum() {
        let curve = cubic([[0.0, 0.0, 0.0], [1.0, 2.0, 0.0], [3.0, 2.0, 1.0], [4.0, 0.0, 0.0]]);
        let gauss = curve_length(&curve);
        let chords = curve_arc_length(&curve, 20_000);
        assert!((gauss - chords).abs() < 1e-6, "gauss={gauss} chords={chords}");
    }

    #[test]
    fn degenerate_curve_has_zero_length() {
        let curve = cubic([[1.0, 1.0, 1.0]; 4]);
        assert_eq!(curve_length(&curve), 0.0);
        assert!(curve.tangent_at(0.5).is_none());
    }
}
