use crate::geom::{GeomTimingReport, Point3, Transform};

use super::DeformerError;
use super::map::CorrespondenceMap;

/// Per-call summary of a deform pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeformDiagnostics {
    pub vertex_count: usize,
    pub moved: usize,
    pub zero_weight: usize,
    pub unmapped: usize,
    /// World-space displacement over all vertices, skipped ones included.
    pub min_displacement: f64,
    pub max_displacement: f64,
    pub avg_displacement: f64,
    /// True when this call built a new map before deforming.
    pub rebound: bool,
    pub timing: Option<GeomTimingReport>,
    pub warnings: Vec<String>,
}

/// Weight and envelope of a single call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Influence<'a> {
    pub weights: Option<&'a [f64]>,
    pub envelope: f64,
}

impl Influence<'_> {
    fn at(&self, index: usize) -> f64 {
        self.weights.and_then(|w| w.get(index)).copied().unwrap_or(1.0) * self.envelope
    }
}

/// Moves every mapped, weighted vertex toward its driver vertex.
///
/// Blending happens in world space; results are written back in the
/// driven geometry's local space. Vertices with zero influence or without a
/// mapping are copied unchanged.
pub(crate) fn deform_pass(
    map: &CorrespondenceMap,
    driven_local: &[Point3],
    driver_world: &[Point3],
    influence: Influence<'_>,
    local_to_world: Transform,
    world_to_local: Transform,
    diagnostics: &mut DeformDiagnostics,
) -> Result<Vec<Point3>, DeformerError> {
    if map.len() != driven_local.len() {
        return Err(DeformerError::IndexOutOfRange {
            map_len: map.len(),
            vertex_count: driven_local.len(),
        });
    }
    if let Some(max) = map.max_driver_index().filter(|&max| max >= driver_world.len()) {
        return Err(DeformerError::DriverIndexOutOfRange {
            index: max,
            driver_count: driver_world.len(),
        });
    }

    let mut out = Vec::with_capacity(driven_local.len());
    let mut min_displacement = f64::INFINITY;
    let mut max_displacement = 0.0_f64;
    let mut total_displacement = 0.0;

    for (index, &local) in driven_local.iter().enumerate() {
        let ww = influence.at(index);
        let target = map.get(index).and_then(|j| driver_world.get(j).copied());

        let (position, displacement) = match target {
            _ if ww == 0.0 => {
                diagnostics.zero_weight += 1;
                (local, 0.0)
            }
            None => {
                diagnostics.unmapped += 1;
                (local, 0.0)
            }
            Some(target) => {
                let current = local_to_world.apply_point(local);
                let blended = current.lerp(target, ww);
                diagnostics.moved += 1;
                (world_to_local.apply_point(blended), current.distance_to(blended))
            }
        };

        min_displacement = min_displacement.min(displacement);
        max_displacement = max_displacement.max(displacement);
        total_displacement += displacement;
        out.push(position);
    }

    diagnostics.vertex_count = out.len();
    if out.is_empty() {
        min_displacement = 0.0;
    } else {
        diagnostics.avg_displacement = total_displacement / out.len() as f64;
    }
    diagnostics.min_displacement = min_displacement;
    diagnostics.max_displacement = max_displacement;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;

    fn run(
        map: &CorrespondenceMap,
        driven: &[Point3],
        driver: &[Point3],
        weights: Option<&[f64]>,
        envelope: f64,
    ) -> (Result<Vec<Point3>, DeformerError>, DeformDiagnostics) {
        let mut diagnostics = DeformDiagnostics::default();
        let result = deform_pass(
            map,
            driven,
            driver,
            Influence { weights, envelope },
            Transform::identity(),
            Transform::identity(),
            &mut diagnostics,
        );
        (result, diagnostics)
    }

    #[test]
    fn half_weight_moves_halfway() {
        let map = CorrespondenceMap::from_entries(vec![0]);
        let (out, diagnostics) = run(
            &map,
            &[Point3::ORIGIN],
            &[Point3::new(2.0, 4.0, 0.0)],
            Some(&[0.5]),
            1.0,
        );
        assert_eq!(out.expect("deforms"), vec![Point3::new(1.0, 2.0, 0.0)]);
        assert_eq!(diagnostics.moved, 1);
        assert!((diagnostics.avg_displacement - 5.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn extrapolation_is_allowed() {
        let map = CorrespondenceMap::from_entries(vec![0]);
        let (out, _) = run(&map, &[Point3::ORIGIN], &[Point3::new(1.0, 0.0, 0.0)], None, 2.0);
        assert_eq!(out.expect("deforms"), vec![Point3::new(2.0, 0.0, 0.0)]);
    }

    #[test]
    fn stale_map_is_rejected() {
        let map = CorrespondenceMap::from_entries(vec![0, 0]);
        let (out, _) = run(&map, &[Point3::ORIGIN], &[Point3::ORIGIN], None, 1.0);
        assert_eq!(
            out,
            Err(DeformerError::IndexOutOfRange {
                map_len: 2,
                vertex_count: 1
            })
        );

        let map = CorrespondenceMap::from_entries(vec![3]);
        let (out, _) = run(&map, &[Point3::ORIGIN], &[Point3::ORIGIN], None, 1.0);
        assert_eq!(
            out,
            Err(DeformerError::DriverIndexOutOfRange {
                index: 3,
                driver_count: 1
            })
        );
    }

    #[test]
    fn blending_happens_in_world_space() {
        let offset = Vec3::new(0.0, 0.0, 10.0);
        let local_to_world = Transform::translate(offset);
        let world_to_local = Transform::translate(-offset);
        let map = CorrespondenceMap::from_entries(vec![0]);
        let mut diagnostics = DeformDiagnostics::default();

        let out = deform_pass(
            &map,
            &[Point3::ORIGIN],
            &[Point3::new(0.0, 0.0, 12.0)],
            Influence {
                weights: None,
                envelope: 1.0,
            },
            local_to_world,
            world_to_local,
            &mut diagnostics,
        )
        .expect("deforms");

        assert!((out[0].z - 2.0).abs() < 1e-12);
        assert!((diagnostics.max_displacement - 2.0).abs() < 1e-12);
    }

    #[test]
    fn full_weight_lands_exactly_on_fractional_drivers() {
        let driven: Vec<Point3> = (0..1000)
            .map(|i| {
                let c = 0.1 * f64::from(i) + 0.1;
                Point3::new(c, c, c)
            })
            .collect();
        let driver: Vec<Point3> = (0..1000)
            .map(|i| {
                let c = 0.7 * f64::from(i) + 0.3;
                Point3::new(c, c, c)
            })
            .collect();
        let map = CorrespondenceMap::from_entries((0..1000).collect());

        let (out, diagnostics) = run(&map, &driven, &driver, None, 1.0);
        assert_eq!(out.expect("deforms"), driver);
        assert_eq!(diagnostics.moved, 1000);
    }
}
