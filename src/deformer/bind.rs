//! Brute-force nearest vertex search used when (re)binding.

use crate::geom::Point3;

use super::map::CorrespondenceMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Index of the driver vertex closest to `point`. Ties keep the first index.
#[must_use]
pub fn nearest_vertex(point: Point3, driver: &[Point3]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in driver.iter().enumerate() {
        let distance = point.distance_squared_to(*candidate);
        if best.is_none_or(|(_, best_distance)| distance < best_distance) {
            best = Some((index, distance));
        }
    }
    best.map(|(index, _)| index)
}

/// Builds a complete map for `driven` (world space) against `driver`.
///
/// The returned map has one entry per driven vertex; entries stay unmapped
/// when the driver has no vertices.
#[must_use]
pub fn build_correspondence(driven: &[Point3], driver: &[Point3]) -> CorrespondenceMap {
    let mut map = CorrespondenceMap::unmapped(driven.len());
    for (index, nearest) in nearest_vertices(driven, driver).into_iter().enumerate() {
        if let Some(driver_index) = nearest {
            map.set(index, driver_index);
        }
    }
    map
}

#[cfg(feature = "parallel")]
fn nearest_vertices(driven: &[Point3], driver: &[Point3]) -> Vec<Option<usize>> {
    driven
        .par_iter()
        .map(|point| nearest_vertex(*point, driver))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn nearest_vertices(driven: &[Point3], driver: &[Point3]) -> Vec<Option<usize>> {
    driven
        .iter()
        .map(|point| nearest_vertex(*point, driver))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deformer::map::UNMAPPED;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn picks_the_closest_driver_vertex() {
        let driver = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
        ];
        assert_eq!(nearest_vertex(Point3::new(4.0, 4.0, 0.0), &driver), Some(2));
    }

    #[test]
    fn ties_keep_the_first_driver_vertex() {
        let driver = [Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        assert_eq!(nearest_vertex(Point3::ORIGIN, &driver), Some(0));
    }

    #[test]
    fn empty_driver_leaves_everything_unmapped() {
        let map = build_correspondence(&[Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)], &[]);
        assert_eq!(map.as_slice(), &[UNMAPPED, UNMAPPED]);
    }

    #[test]
    fn random_clouds_map_to_a_minimum_distance_vertex() {
        let mut rng = StdRng::seed_from_u64(0x736e_6170);
        let mut cloud = |count: usize| -> Vec<Point3> {
            (0..count)
                .map(|_| {
                    Point3::new(
                        rng.random_range(-5.0..5.0),
                        rng.random_range(-5.0..5.0),
                        rng.random_range(-5.0..5.0),
                    )
                })
                .collect()
        };
        let driver = cloud(64);
        let driven = cloud(48);

        let map = build_correspondence(&driven, &driver);
        assert_eq!(map.len(), driven.len());
        for (i, point) in driven.iter().enumerate() {
            let mapped = map.get(i).expect("mapped");
            let best = point.distance_squared_to(driver[mapped]);
            assert!(driver.iter().all(|q| best <= point.distance_squared_to(*q)));
        }
    }
}
