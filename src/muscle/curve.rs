use crate::geom::NurbsCurve3;

use super::MuscleError;
use super::positions::MusclePositions;

pub const MUSCLE_CURVE_DEGREE: usize = 3;
/// Single Bezier span over `[0, 1]`, in host form.
pub const MUSCLE_CURVE_HOST_KNOTS: [f64; 6] = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

/// Centerline through the four cross-section positions.
///
/// Only used for length measurement and as the loft direction's knots.
pub fn build_muscle_curve(positions: &MusclePositions) -> Result<NurbsCurve3, MuscleError> {
    NurbsCurve3::from_host_knots(
        MUSCLE_CURVE_DEGREE,
        positions.section_points().to_vec(),
        &MUSCLE_CURVE_HOST_KNOTS,
        None,
    )
    .map_err(MuscleError::Curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::{Curve3, Point3, curve_length};

    fn positions(z: [f64; 4]) -> MusclePositions {
        MusclePositions {
            origin: Point3::new(0.0, 0.0, z[0]),
            origin_volume: Point3::new(0.0, 0.0, z[1]),
            center: Point3::new(0.0, 0.0, (z[0] + z[3]) / 2.0),
            insertion_volume: Point3::new(0.0, 0.0, z[2]),
            insertion: Point3::new(0.0, 0.0, z[3]),
        }
    }

    #[test]
    fn curve_interpolates_the_end_stations() {
        let curve = build_muscle_curve(&positions([0.0, 2.5, 7.5, 10.0])).expect("curve");
        assert_eq!(curve.knots, vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(curve.knots_host(), MUSCLE_CURVE_HOST_KNOTS.to_vec());
        assert_eq!(curve.point_at(0.0), Point3::new(0.0, 0.0, 0.0));
        assert!((curve.point_at(1.0).z - 10.0).abs() < 1e-12);
        assert!((curve_length(&curve) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_station_is_a_curve_error() {
        let result = build_muscle_curve(&positions([0.0, f64::NAN, 7.5, 10.0]));
        assert!(matches!(result, Err(MuscleError::Curve(_))));
    }
}
