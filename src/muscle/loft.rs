use crate::geom::{NurbsCurve3, NurbsSurface, Point3};

use super::MuscleError;
use super::sections::CrossSection;

pub const RING_DEGREE: usize = 3;
pub const RING_CV_COUNT: usize = 11;

/// Unit octagon-like ring in the local XZ plane. The last three points repeat
/// the first three so the periodic direction closes with C2 continuity.
pub const RING_TEMPLATE: [[f64; 3]; RING_CV_COUNT] = [
    [-0.424_779, 0.0, -1.025_506],
    [0.424_779, 0.0, -1.025_506],
    [1.025_506, 0.0, -0.424_779],
    [1.025_506, 0.0, 0.424_779],
    [0.424_779, 0.0, 1.025_506],
    [-0.424_779, 0.0, 1.025_506],
    [-1.025_506, 0.0, 0.424_779],
    [-1.025_506, 0.0, -0.424_779],
    [-0.424_779, 0.0, -1.025_506],
    [0.424_779, 0.0, -1.025_506],
    [1.025_506, 0.0, -0.424_779],
];

/// Periodic knots of the ring direction in host form.
pub const RING_HOST_KNOTS: [f64; RING_CV_COUNT + RING_DEGREE - 1] = [
    -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0,
];

/// Places the template ring into a cross section.
///
/// Ring X is scaled by `-height` along `a`, ring Z by `width` along `b`, and
/// ring Y maps onto `c` unscaled.
#[must_use]
pub fn transform_ring(section: &CrossSection) -> [Point3; RING_CV_COUNT] {
    let frame = section.frame;
    RING_TEMPLATE.map(|[x, y, z]| {
        section.position
            + frame.a * (-section.height * x)
            + frame.b * (section.width * z)
            + frame.c * y
    })
}

/// Lofts the four rings into a degree 3x3 surface.
///
/// Surface U runs around the ring (periodic), surface V runs along the muscle
/// with the centerline's knots. Control points are stored ring after ring.
pub fn loft_muscle_surface(
    sections: &[CrossSection; 4],
    curve: &NurbsCurve3,
) -> Result<NurbsSurface, MuscleError> {
    let mut control_points = Vec::with_capacity(RING_CV_COUNT * sections.len());
    for section in sections {
        control_points.extend(transform_ring(section));
    }

    NurbsSurface::from_host_knots(
        RING_DEGREE,
        curve.degree,
        RING_CV_COUNT,
        sections.len(),
        control_points,
        &RING_HOST_KNOTS,
        &curve.knots_host(),
        None,
    )
    .map_err(MuscleError::Surface)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Surface, Vec3};
    use crate::muscle::sections::{Frame, SectionKind};

    fn section(kind: SectionKind, z: f64, height: f64, width: f64) -> CrossSection {
        CrossSection {
            kind,
            position: Point3::new(0.0, 0.0, z),
            height,
            width,
            frame: Frame {
                a: Vec3::Y,
                b: Vec3::X,
                c: -Vec3::Z,
            },
        }
    }

    #[test]
    fn ring_is_scaled_in_the_section_plane() {
        let ring = transform_ring(&section(SectionKind::OriginVolume, 2.0, 2.0, 3.0));
        // (x, 0, z) -> (width * z, -height * x, 0) + position
        let p = ring[2];
        assert!((p.x - 3.0 * -0.424_779).abs() < 1e-12);
        assert!((p.y - -2.0 * 1.025_506).abs() < 1e-12);
        assert!((p.z - 2.0).abs() < 1e-12);
        assert_eq!(ring[8], ring[0]);
    }

    #[test]
    fn loft_has_44_control_points_and_closes_around_the_ring() {
        let curve = NurbsCurve3::from_host_knots(
            3,
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 2.5),
                Point3::new(0.0, 0.0, 7.5),
                Point3::new(0.0, 0.0, 10.0),
            ],
            &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            None,
        )
        .expect("curve");
        let sections = [
            section(SectionKind::OriginMid, 0.0, 1.0, 1.0),
            section(SectionKind::OriginVolume, 2.5, 1.0, 1.0),
            section(SectionKind::InsertionVolume, 7.5, 1.0, 1.0),
            section(SectionKind::InsertionMid, 10.0, 1.0, 1.0),
        ];
        let surface = loft_muscle_surface(&sections, &curve).expect("surface");

        assert_eq!(surface.control_points.len(), 44);
        assert_eq!(surface.domain_u(), (0.0, 8.0));
        assert_eq!(surface.domain_v(), (0.0, 1.0));
        assert!(surface.is_u_closed());
        assert!(!surface.is_v_closed());
        assert_eq!(surface.knots_u_host(), RING_HOST_KNOTS.to_vec());
        assert_eq!(surface.control_point(0, 1).map(|p| p.z), Some(2.5));

        let start = surface.point_at(0.0, 0.0);
        let end = surface.point_at(8.0, 0.0);
        assert!(start.distance_to(end) < 1e-9);
    }
}
