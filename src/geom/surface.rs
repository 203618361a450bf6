use super::basis::{
    de_boor, expand_host_knots, find_span, host_knots, is_non_decreasing, wrap_param, HPoint4,
};
use super::core::{Point3, Tolerance, Vec3};

fn orthogonal_unit_vector(reference: Vec3) -> Vec3 {
    let candidate = if reference.x.abs() < reference.y.abs() {
        Vec3::new(0.0, -reference.z, reference.y)
    } else {
        Vec3::new(-reference.z, 0.0, reference.x)
    };

    candidate.normalized().unwrap_or(Vec3::X)
}

fn frame_axes_from_xaxis_normal(x_axis: Vec3, normal: Vec3) -> (Vec3, Vec3, Vec3) {
    let z = normal.normalized().unwrap_or(Vec3::Z);
    let projected = x_axis.sub(z.mul_scalar(x_axis.dot(z)));
    let x = projected
        .normalized()
        .unwrap_or_else(|| orthogonal_unit_vector(z));
    let y = z.cross(x).normalized().unwrap_or(Vec3::Y);
    (x, y, z)
}

/// Parametric surface evaluation used to resolve attachment points.
pub trait Surface {
    fn point_at(&self, u: f64, v: f64) -> Point3;

    #[must_use]
    fn domain_u(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn domain_v(&self) -> (f64, f64) {
        (0.0, 1.0)
    }

    #[must_use]
    fn is_u_closed(&self) -> bool {
        false
    }

    #[must_use]
    fn is_v_closed(&self) -> bool {
        false
    }

    /// Central finite differences, one-sided at open domain ends.
    #[must_use]
    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();

        let u_span = u1 - u0;
        let v_span = v1 - v0;

        let u = if self.is_u_closed() {
            wrap_param(u, u0, u1)
        } else {
            u.clamp(u0, u1)
        };

        let v = if self.is_v_closed() {
            wrap_param(v, v0, v1)
        } else {
            v.clamp(v0, v1)
        };

        let mut du = Vec3::ZERO;
        let mut dv = Vec3::ZERO;

        if u_span.is_finite() && u_span != 0.0 {
            let h = Tolerance::DERIVATIVE.relative_to(u_span);
            if h.is_finite() && h != 0.0 {
                let ua = if self.is_u_closed() { u - h } else { (u - h).max(u0) };
                let ub = if self.is_u_closed() { u + h } else { (u + h).min(u1) };

                if ua != ub {
                    let pa = self.point_at(ua, v);
                    let pb = self.point_at(ub, v);
                    du = pb.sub_point(pa).mul_scalar(1.0 / (ub - ua));
                }
            }
        }

        if v_span.is_finite() && v_span != 0.0 {
            let h = Tolerance::DERIVATIVE.relative_to(v_span);
            if h.is_finite() && h != 0.0 {
                let va = if self.is_v_closed() { v - h } else { (v - h).max(v0) };
                let vb = if self.is_v_closed() { v + h } else { (v + h).min(v1) };

                if va != vb {
                    let pa = self.point_at(u, va);
                    let pb = self.point_at(u, vb);
                    dv = pb.sub_point(pa).mul_scalar(1.0 / (vb - va));
                }
            }
        }

        (du, dv)
    }

    #[must_use]
    fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (du, dv) = self.partial_derivatives_at(u, v);
        du.cross(dv).normalized()
    }

    /// Unnormalized `(tangentU, tangentV)`, i.e. the first partial derivatives.
    #[must_use]
    fn tangents_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        self.partial_derivatives_at(u, v)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Analytic surfaces
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSurface {
    pub origin: Point3,
    pub u_axis: Vec3,
    pub v_axis: Vec3,
}

impl PlaneSurface {
    #[must_use]
    pub const fn new(origin: Point3, u_axis: Vec3, v_axis: Vec3) -> Self {
        Self {
            origin,
            u_axis,
            v_axis,
        }
    }
}

impl Surface for PlaneSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        self.origin
            .add_vec(self.u_axis.mul_scalar(u))
            .add_vec(self.v_axis.mul_scalar(v))
    }

    fn partial_derivatives_at(&self, _u: f64, _v: f64) -> (Vec3, Vec3) {
        (self.u_axis, self.v_axis)
    }

    fn normal_at(&self, _u: f64, _v: f64) -> Option<Vec3> {
        self.u_axis.cross(self.v_axis).normalized()
    }
}

/// Cylinder parameterized by `u` around the axis (one turn over `[0, 1]`) and `v` along it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderSurface {
    pub base: Point3,
    pub axis: Vec3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub radius: f64,
}

impl CylinderSurface {
    pub fn new(base: Point3, axis: Vec3, radius: f64) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("cylinder radius must be finite and > 0".to_string());
        }

        let axis_dir = axis
            .normalized()
            .ok_or_else(|| "cylinder axis must be non-zero".to_string())?;
        let (x_axis, y_axis, _) =
            frame_axes_from_xaxis_normal(orthogonal_unit_vector(axis_dir), axis_dir);

        Ok(Self {
            base,
            axis,
            x_axis,
            y_axis,
            radius,
        })
    }
}

impl Surface for CylinderSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let angle = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        let radial = self
            .x_axis
            .mul_scalar(angle.cos())
            .add(self.y_axis.mul_scalar(angle.sin()))
            .mul_scalar(self.radius);

        self.base.add_vec(radial).add_vec(self.axis.mul_scalar(v))
    }

    fn is_u_closed(&self) -> bool {
        true
    }

    fn partial_derivatives_at(&self, u: f64, _v: f64) -> (Vec3, Vec3) {
        let angle = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        let du = self
            .x_axis
            .mul_scalar(-angle.sin())
            .add(self.y_axis.mul_scalar(angle.cos()))
            .mul_scalar(std::f64::consts::TAU * self.radius);
        (du, self.axis)
    }
}

/// Sphere with `u` as longitude over `[0, 1]` and `v` from the south (`0`) to the north pole (`1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereSurface {
    pub center: Point3,
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
    pub radius: f64,
}

impl SphereSurface {
    pub fn new(center: Point3, radius: f64) -> Result<Self, String> {
        if !radius.is_finite() || radius <= 0.0 {
            return Err("sphere radius must be finite and > 0".to_string());
        }

        Ok(Self {
            center,
            x_axis: Vec3::X,
            y_axis: Vec3::Y,
            z_axis: Vec3::Z,
            radius,
        })
    }
}

impl Surface for SphereSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let theta = std::f64::consts::TAU * wrap_param(u, 0.0, 1.0);
        let phi = std::f64::consts::PI * (v.clamp(0.0, 1.0) - 0.5);

        let cos_phi = phi.cos();
        let x = cos_phi * theta.cos();
        let y = cos_phi * theta.sin();
        let z = phi.sin();

        self.center.add_vec(
            self.x_axis
                .mul_scalar(x)
                .add(self.y_axis.mul_scalar(y))
                .add(self.z_axis.mul_scalar(z))
                .mul_scalar(self.radius),
        )
    }

    fn is_u_closed(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// NURBS surface
// ─────────────────────────────────────────────────────────────────────────────

/// Tensor-product NURBS surface; control point `(u, v)` lives at `v * u_count + u`.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSurface {
    pub degree_u: usize,
    pub degree_v: usize,
    pub u_count: usize,
    pub v_count: usize,
    pub control_points: Vec<Point3>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
    pub weights: Option<Vec<f64>>,
    u_closed: bool,
    v_closed: bool,
}

impl NurbsSurface {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<Point3>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        if u_count < 2 || v_count < 2 {
            return Err("nurbs surface requires at least a 2x2 control net".to_string());
        }
        if degree_u == 0 || degree_v == 0 {
            return Err("nurbs surface degrees must be >= 1".to_string());
        }
        if degree_u >= u_count || degree_v >= v_count {
            return Err("nurbs surface degrees must be < control point counts".to_string());
        }
        if control_points.len() != u_count * v_count {
            return Err("nurbs surface control point count must match u_count*v_count".to_string());
        }
        if control_points.iter().any(|p| !p.is_finite()) {
            return Err("nurbs surface control points must be finite".to_string());
        }

        let expected_u_knots = u_count + degree_u + 1;
        if knots_u.len() != expected_u_knots {
            return Err(format!(
                "nurbs surface u knot length must be {}, got {}",
                expected_u_knots,
                knots_u.len()
            ));
        }

        let expected_v_knots = v_count + degree_v + 1;
        if knots_v.len() != expected_v_knots {
            return Err(format!(
                "nurbs surface v knot length must be {}, got {}",
                expected_v_knots,
                knots_v.len()
            ));
        }

        if !is_non_decreasing(&knots_u) || !is_non_decreasing(&knots_v) {
            return Err("nurbs surface knots must be non-decreasing".to_string());
        }

        if let Some(ref weights) = weights {
            if weights.len() != control_points.len() {
                return Err(
                    "nurbs surface weights length must match control point count".to_string(),
                );
            }
            if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
                return Err("nurbs surface weights must be finite and > 0".to_string());
            }
        }

        let mut surface = Self {
            degree_u,
            degree_v,
            u_count,
            v_count,
            control_points,
            knots_u,
            knots_v,
            weights,
            u_closed: false,
            v_closed: false,
        };

        let tol = Tolerance::default_geom();
        surface.u_closed = surface.compute_u_closed(tol);
        surface.v_closed = surface.compute_v_closed(tol);

        Ok(surface)
    }

    /// Builds a surface from host-style knot vectors (`count + degree - 1` entries each).
    #[allow(clippy::too_many_arguments)]
    pub fn from_host_knots(
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<Point3>,
        host_u: &[f64],
        host_v: &[f64],
        weights: Option<Vec<f64>>,
    ) -> Result<Self, String> {
        let expected_u = (u_count + degree_u).saturating_sub(1);
        if host_u.len() != expected_u {
            return Err(format!(
                "nurbs surface u host knot length must be {}, got {}",
                expected_u,
                host_u.len()
            ));
        }
        let expected_v = (v_count + degree_v).saturating_sub(1);
        if host_v.len() != expected_v {
            return Err(format!(
                "nurbs surface v host knot length must be {}, got {}",
                expected_v,
                host_v.len()
            ));
        }

        Self::new(
            degree_u,
            degree_v,
            u_count,
            v_count,
            control_points,
            expand_host_knots(host_u)?,
            expand_host_knots(host_v)?,
            weights,
        )
    }

    #[must_use]
    pub fn knots_u_host(&self) -> Vec<f64> {
        host_knots(&self.knots_u)
    }

    #[must_use]
    pub fn knots_v_host(&self) -> Vec<f64> {
        host_knots(&self.knots_v)
    }

    #[must_use]
    pub fn control_point(&self, u_index: usize, v_index: usize) -> Option<Point3> {
        if u_index >= self.u_count || v_index >= self.v_count {
            return None;
        }
        self.control_points.get(v_index * self.u_count + u_index).copied()
    }

    fn control_hpoint(&self, u_index: usize, v_index: usize) -> HPoint4 {
        let idx = v_index * self.u_count + u_index;
        let w = self
            .weights
            .as_ref()
            .and_then(|weights| weights.get(idx).copied())
            .unwrap_or(1.0);
        HPoint4::weighted(self.control_points[idx], w)
    }

    fn point_at_clamped(&self, u: f64, v: f64) -> Point3 {
        let p = self.degree_u;
        let q = self.degree_v;

        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let u = u.clamp(u0, u1);
        let v = v.clamp(v0, v1);

        let span_u = find_span(self.u_count - 1, p, u, &self.knots_u);
        let span_v = find_span(self.v_count - 1, q, v, &self.knots_v);

        let mut temp = Vec::with_capacity(q + 1);
        for l in 0..=q {
            let v_index = span_v - q + l;
            let mut d: Vec<HPoint4> = (0..=p)
                .map(|j| self.control_hpoint(span_u - p + j, v_index))
                .collect();
            de_boor(&mut d, span_u, p, u, &self.knots_u);
            temp.push(d[p]);
        }

        de_boor(&mut temp, span_v, q, v, &self.knots_v);
        temp[q].to_point3().unwrap_or(self.control_points[0])
    }

    fn compute_u_closed(&self, tol: Tolerance) -> bool {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        if u1 - u0 == 0.0 {
            return false;
        }

        let v_mid = 0.5 * (v0 + v1);
        [v0, v_mid, v1].iter().all(|&v| {
            tol.approx_eq_point3(self.point_at_clamped(u0, v), self.point_at_clamped(u1, v))
        })
    }

    fn compute_v_closed(&self, tol: Tolerance) -> bool {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        if v1 - v0 == 0.0 {
            return false;
        }

        let u_mid = 0.5 * (u0 + u1);
        [u0, u_mid, u1].iter().all(|&u| {
            tol.approx_eq_point3(self.point_at_clamped(u, v0), self.point_at_clamped(u, v1))
        })
    }
}

impl Surface for NurbsSurface {
    fn point_at(&self, u: f64, v: f64) -> Point3 {
        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let u = if self.u_closed { wrap_param(u, u0, u1) } else { u };
        let v = if self.v_closed { wrap_param(v, v0, v1) } else { v };
        self.point_at_clamped(u, v)
    }

    fn domain_u(&self) -> (f64, f64) {
        (self.knots_u[self.degree_u], self.knots_u[self.u_count])
    }

    fn domain_v(&self) -> (f64, f64) {
        (self.knots_v[self.degree_v], self.knots_v[self.v_count])
    }

    fn is_u_closed(&self) -> bool {
        self.u_closed
    }

    fn is_v_closed(&self) -> bool {
        self.v_closed
    }

    fn partial_derivatives_at(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let p = self.degree_u;
        let q = self.degree_v;

        let (u0, u1) = self.domain_u();
        let (v0, v1) = self.domain_v();
        let u = if self.u_closed {
            wrap_param(u, u0, u1)
        } else {
            u.clamp(u0, u1)
        };
        let v = if self.v_closed {
            wrap_param(v, v0, v1)
        } else {
            v.clamp(v0, v1)
        };

        let span_u = find_span(self.u_count - 1, p, u, &self.knots_u);
        let span_v = find_span(self.v_count - 1, q, v, &self.knots_v);

        let knots_u_der = &self.knots_u[1..self.knots_u.len() - 1];
        let knots_v_der = &self.knots_v[1..self.knots_v.len() - 1];

        // Evaluate every row at u (value and u-derivative), then collapse the rows in v.
        let mut rows = Vec::with_capacity(q + 1);
        let mut rows_du = Vec::with_capacity(q + 1);
        for l in 0..=q {
            let v_index = span_v - q + l;
            let ctrl: Vec<HPoint4> = (0..=p)
                .map(|j| self.control_hpoint(span_u - p + j, v_index))
                .collect();

            let mut d_der: Vec<HPoint4> = (0..p)
                .map(|k| {
                    let i = span_u - p + k;
                    let denom = self.knots_u[i + p + 1] - self.knots_u[i + 1];
                    let scale = if denom == 0.0 { 0.0 } else { p as f64 / denom };
                    ctrl[k + 1].sub(ctrl[k]).mul_scalar(scale)
                })
                .collect();
            de_boor(&mut d_der, span_u - 1, p - 1, u, knots_u_der);
            rows_du.push(d_der[p - 1]);

            let mut eval = ctrl;
            de_boor(&mut eval, span_u, p, u, &self.knots_u);
            rows.push(eval[p]);
        }

        let mut d_der: Vec<HPoint4> = (0..q)
            .map(|k| {
                let i = span_v - q + k;
                let denom = self.knots_v[i + q + 1] - self.knots_v[i + 1];
                let scale = if denom == 0.0 { 0.0 } else { q as f64 / denom };
                rows[k + 1].sub(rows[k]).mul_scalar(scale)
            })
            .collect();
        de_boor(&mut d_der, span_v - 1, q - 1, v, knots_v_der);
        let hv = d_der[q - 1];

        de_boor(&mut rows, span_v, q, v, &self.knots_v);
        let h = rows[q];

        de_boor(&mut rows_du, span_v, q, v, &self.knots_v);
        let hu = rows_du[q];

        if !h.w.is_finite() || h.w == 0.0 {
            return (Vec3::ZERO, Vec3::ZERO);
        }

        let w = h.w;
        let inv_w2 = 1.0 / (w * w);

        let du = Vec3::new(
            (hu.x * w - h.x * hu.w) * inv_w2,
            (hu.y * w - h.y * hu.w) * inv_w2,
            (hu.z * w - h.z * hu.w) * inv_w2,
        );

        let dv = Vec3::new(
            (hv.x * w - h.x * hv.w) * inv_w2,
            (hv.y * w - h.y * hv.w) * inv_w2,
            (hv.z * w - h.z * hv.w) * inv_w2,
        );

        (du, dv)
    }
}

/// Samples a `u_count × v_count` grid of points, row-major in `u`.
///
/// Closed directions skip the duplicate seam sample.
#[must_use]
pub fn tessellate_surface_grid<S: Surface + ?Sized>(
    surface: &S,
    u_count: usize,
    v_count: usize,
) -> Vec<Point3> {
    let (u0, u1) = surface.domain_u();
    let (v0, v1) = surface.domain_v();

    let u_closed = surface.is_u_closed();
    let v_closed = surface.is_v_closed();

    let u_count = if u_closed { u_count.max(3) } else { u_count.max(2) };
    let v_count = if v_closed { v_count.max(3) } else { v_count.max(2) };

    let u_denom = (if u_closed { u_count } else { u_count - 1 }) as f64;
    let v_denom = (if v_closed { v_count } else { v_count - 1 }) as f64;

    let mut points = Vec::with_capacity(u_count * v_count);
    for v in 0..v_count {
        let v_t = v0 + (v1 - v0) * (v as f64 / v_denom);
        for u in 0..u_count {
            let u_t = u0 + (u1 - u0) * (u as f64 / u_denom);
            points.push(surface.point_at(u_t, v_t));
        }
    }
    points
}
