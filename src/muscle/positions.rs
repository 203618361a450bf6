use crate::geom::{Point3, Vec3};

use super::attachment::ResolvedAttachments;
use super::params::MuscleParams;

/// The five stations along a muscle, origin to insertion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MusclePositions {
    pub origin: Point3,
    pub origin_volume: Point3,
    pub center: Point3,
    pub insertion_volume: Point3,
    pub insertion: Point3,
}

impl MusclePositions {
    #[must_use]
    pub const fn to_array(&self) -> [Point3; 5] {
        [
            self.origin,
            self.origin_volume,
            self.center,
            self.insertion_volume,
            self.insertion,
        ]
    }

    /// Positions of the four cross sections; the center is skipped.
    #[must_use]
    pub const fn section_points(&self) -> [Point3; 4] {
        [
            self.origin,
            self.origin_volume,
            self.insertion_volume,
            self.insertion,
        ]
    }
}

/// Local frame an end's volume offset is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetFrame {
    pub span: Vec3,
    pub up: Vec3,
    pub out: Vec3,
}

impl OffsetFrame {
    /// `span` runs from `a` to `b`, `up` averages the two normals.
    #[must_use]
    pub fn between(a: Point3, b: Point3, normal_a: Vec3, normal_b: Vec3) -> Self {
        let up = (normal_a + normal_b).normalize_or_zero();
        let span = b.sub_point(a).normalize_or_zero();
        let out = up.cross(span).normalize_or_zero();
        Self { span, up, out }
    }

    #[must_use]
    pub fn displace(&self, base: Point3, offset: [f64; 3]) -> Point3 {
        base + self.span * offset[0] + self.up * offset[1] + self.out * offset[2]
    }
}

/// Places the five stations.
///
/// Offsets always use the raw surface normals, regardless of up selectors.
/// A locked end measures its volume offset from the end midpoint instead of
/// from the halfway point towards the center.
#[must_use]
pub fn compute_positions(attachments: &ResolvedAttachments, params: &MuscleParams) -> MusclePositions {
    let [e0, e1, e2, e3] = attachments.positions();
    let [n0, n1, n2, n3] = attachments.normals();

    let origin = e0.midpoint(e1);
    let insertion = e2.midpoint(e3);
    let center = origin.midpoint(insertion);

    let origin_frame = OffsetFrame::between(e0, e1, n0, n1);
    let insertion_frame = OffsetFrame::between(e2, e3, n2, n3);

    let origin_base = if params.origin_lock {
        origin
    } else {
        origin.midpoint(center)
    };
    let insertion_base = if params.insertion_lock {
        insertion
    } else {
        insertion.midpoint(center)
    };

    let [ix, iy, iz] = params.insertion_offset;

    MusclePositions {
        origin,
        origin_volume: origin_frame.displace(origin_base, params.origin_offset),
        center,
        insertion_volume: insertion_frame.displace(insertion_base, [ix, iy, -iz]),
        insertion,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muscle::attachment::ResolvedAttachment;

    fn attachments(points: [[f64; 3]; 4], normal: Vec3) -> ResolvedAttachments {
        let mut resolved = ResolvedAttachments::default();
        for (slot, p) in resolved.attachments.iter_mut().zip(points) {
            *slot = ResolvedAttachment {
                position: Point3::from(p),
                normal,
                tangent_u: Vec3::X,
                tangent_v: Vec3::Z,
                connected: true,
                ..ResolvedAttachment::default()
            };
        }
        resolved
    }

    fn straight() -> ResolvedAttachments {
        attachments(
            [
                [-1.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [-1.0, 0.0, 10.0],
                [1.0, 0.0, 10.0],
            ],
            Vec3::Y,
        )
    }

    #[test]
    fn unlocked_stations_sit_between_ends_and_center() {
        let positions = compute_positions(&straight(), &MuscleParams::default());
        assert_eq!(positions.origin, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(positions.center, Point3::new(0.0, 0.0, 5.0));
        assert_eq!(positions.insertion, Point3::new(0.0, 0.0, 10.0));
        assert_eq!(positions.origin_volume, Point3::new(0.0, 0.0, 2.5));
        assert_eq!(positions.insertion_volume, Point3::new(0.0, 0.0, 7.5));
    }

    #[test]
    fn offsets_follow_local_frames() {
        // span = +X, up = +Y, out = Y x X = -Z
        let params = MuscleParams::default()
            .with_origin_offset([1.0, 2.0, 3.0])
            .with_insertion_offset([1.0, 2.0, 3.0]);
        let positions = compute_positions(&straight(), &params);

        assert_eq!(positions.origin_volume, Point3::new(1.0, 2.0, 2.5 - 3.0));
        // Insertion Z offset is mirrored.
        assert_eq!(positions.insertion_volume, Point3::new(1.0, 2.0, 7.5 + 3.0));
    }

    #[test]
    fn locked_stations_start_from_the_end_midpoint() {
        let params = MuscleParams::default()
            .with_locks(true, true)
            .with_origin_offset([0.0, 1.0, 0.0]);
        let positions = compute_positions(&straight(), &params);
        assert_eq!(positions.origin_volume, Point3::new(0.0, 1.0, 0.0));
        assert_eq!(positions.insertion_volume, positions.insertion);
    }

    #[test]
    fn zero_normals_keep_offsets_along_span_only() {
        let resolved = attachments(
            [
                [-1.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [-1.0, 0.0, 4.0],
                [1.0, 0.0, 4.0],
            ],
            Vec3::ZERO,
        );
        let params = MuscleParams::default().with_origin_offset([1.0, 5.0, 5.0]);
        let positions = compute_positions(&resolved, &params);
        assert_eq!(positions.origin_volume, Point3::new(1.0, 0.0, 1.0));
    }
}
