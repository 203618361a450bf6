//! Vertex snap deformer: binds each driven vertex to its nearest driver
//! vertex once, then pulls driven vertices toward their partners under a
//! painted weight and a global envelope.

pub mod bind;
pub mod deform;
pub mod map;
pub mod state;

pub use bind::{build_correspondence, nearest_vertex};
pub use deform::DeformDiagnostics;
pub use map::{CorrespondenceMap, UNMAPPED};
pub use state::BindState;

use serde::{Deserialize, Serialize};

use crate::geom::{GeomMetrics, Point3, TimingBucket, Transform};

use deform::{Influence, deform_pass};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeformerError {
    #[error("vertex map has {map_len} entries but the driven mesh has {vertex_count} vertices; rebind required")]
    IndexOutOfRange { map_len: usize, vertex_count: usize },
    #[error("vertex map references driver vertex {index} but the driver has {driver_count} vertices; rebind required")]
    DriverIndexOutOfRange { index: usize, driver_count: usize },
    #[error("expected {expected} weights, got {actual}")]
    WeightCountMismatch { expected: usize, actual: usize },
    #[error("local-to-world transform is not invertible")]
    SingularTransform,
    #[error("{role} mesh has no vertices")]
    EmptyMesh { role: &'static str },
}

/// Per-deformer knobs that are not geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeformerOptions {
    pub envelope: f64,
}

impl Default for DeformerOptions {
    fn default() -> Self {
        Self { envelope: 1.0 }
    }
}

/// Geometry for a single deform call.
#[derive(Debug, Clone, Copy)]
pub struct DeformInput<'a> {
    /// Driven vertices in the driven geometry's local space.
    pub driven: &'a [Point3],
    /// Driver vertices in world space.
    pub driver: &'a [Point3],
    /// Painted weights, one per driven vertex. `None` paints 1.0 everywhere.
    pub weights: Option<&'a [f64]>,
    pub local_to_world: Transform,
}

impl<'a> DeformInput<'a> {
    #[must_use]
    pub fn new(driven: &'a [Point3], driver: &'a [Point3]) -> Self {
        Self {
            driven,
            driver,
            weights: None,
            local_to_world: Transform::identity(),
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: &'a [f64]) -> Self {
        self.weights = Some(weights);
        self
    }

    #[must_use]
    pub fn with_local_to_world(mut self, local_to_world: Transform) -> Self {
        self.local_to_world = local_to_world;
        self
    }
}

/// Persistent state of one deformer instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VertexSnapDeformer {
    state: BindState,
    map: CorrespondenceMap,
    options: DeformerOptions,
}

impl VertexSnapDeformer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a deformer for a driver/driven pair, ready to bind on its
    /// first deform call.
    pub fn attach(driver: &[Point3], driven: &[Point3]) -> Result<Self, DeformerError> {
        if driver.is_empty() {
            return Err(DeformerError::EmptyMesh { role: "driver" });
        }
        if driven.is_empty() {
            return Err(DeformerError::EmptyMesh { role: "driven" });
        }
        Ok(Self {
            state: BindState::Rebinding,
            ..Self::default()
        })
    }

    /// Restores a persisted state and map, e.g. from a saved scene.
    #[must_use]
    pub fn restore(state: BindState, map: CorrespondenceMap) -> Self {
        Self {
            state,
            map,
            options: DeformerOptions::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> BindState {
        self.state
    }

    #[must_use]
    pub fn map(&self) -> &CorrespondenceMap {
        &self.map
    }

    #[must_use]
    pub const fn options(&self) -> DeformerOptions {
        self.options
    }

    pub fn set_options(&mut self, options: DeformerOptions) {
        self.options = options;
    }

    pub fn set_envelope(&mut self, envelope: f64) {
        self.options.envelope = envelope;
    }

    /// The next deform call rebuilds the map.
    pub fn request_rebind(&mut self) {
        self.state = BindState::Rebinding;
    }

    /// Binds if needed, then deforms. Returns new local positions.
    ///
    /// Unbound and Rebinding both bind and deform within this call; the map
    /// is only replaced once the search has finished. On error the previous
    /// state and map are kept.
    pub fn deform(
        &mut self,
        input: &DeformInput<'_>,
    ) -> Result<(Vec<Point3>, DeformDiagnostics), DeformerError> {
        if let Some(actual) = input
            .weights
            .map(<[f64]>::len)
            .filter(|&len| len != input.driven.len())
        {
            return Err(DeformerError::WeightCountMismatch {
                expected: input.driven.len(),
                actual,
            });
        }
        let world_to_local = input
            .local_to_world
            .inverse()
            .ok_or(DeformerError::SingularTransform)?;

        let mut metrics = GeomMetrics::default();
        metrics.begin();
        let mut diagnostics = DeformDiagnostics::default();

        let fresh_map = if self.state.needs_bind() {
            let map = metrics.time(TimingBucket::Bind, || {
                let driven_world: Vec<Point3> = input
                    .driven
                    .iter()
                    .map(|p| input.local_to_world.apply_point(*p))
                    .collect();
                build_correspondence(&driven_world, input.driver)
            });
            if input.driver.is_empty() {
                let warning = "driver mesh has no vertices; every vertex stays unmapped".to_string();
                log::warn!("{warning}");
                diagnostics.warnings.push(warning);
            }
            crate::debug_log!(
                "vertex snap bound {} of {} vertices",
                map.mapped_count(),
                map.len()
            );
            diagnostics.rebound = true;
            Some(map)
        } else {
            None
        };

        let influence = Influence {
            weights: input.weights,
            envelope: self.options.envelope,
        };
        let positions = metrics.time(TimingBucket::Deform, || {
            deform_pass(
                fresh_map.as_ref().unwrap_or(&self.map),
                input.driven,
                input.driver,
                influence,
                input.local_to_world,
                world_to_local,
                &mut diagnostics,
            )
        })?;

        if let Some(map) = fresh_map {
            self.map = map;
            self.state = BindState::Bound;
        }
        diagnostics.timing = metrics.end();
        Ok((positions, diagnostics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::Vec3;

    fn driver() -> Vec<Point3> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(5.0, 5.0, 0.0),
        ]
    }

    #[test]
    fn unbound_deformer_binds_and_deforms_in_one_call() {
        let driver = driver();
        let driven = [Point3::new(4.0, 4.0, 0.0), Point3::new(9.0, 1.0, 0.0)];
        let mut deformer = VertexSnapDeformer::new();
        assert_eq!(deformer.state(), BindState::Unbound);

        let (out, diagnostics) = deformer.deform(&DeformInput::new(&driven, &driver)).expect("deforms");

        assert_eq!(deformer.state(), BindState::Bound);
        assert_eq!(deformer.map().as_slice(), &[2, 1]);
        assert_eq!(out, vec![driver[2], driver[1]]);
        assert!(diagnostics.rebound);
        assert_eq!(diagnostics.moved, 2);
    }

    #[test]
    fn zero_weight_and_zero_envelope_leave_positions_untouched() {
        let driver = driver();
        let driven = [Point3::new(0.1, 0.2, 0.3), Point3::new(4.4, 4.4, 0.1)];
        let mut deformer = VertexSnapDeformer::new();

        let weights = [0.0, 1.0];
        let (out, diagnostics) = deformer
            .deform(&DeformInput::new(&driven, &driver).with_weights(&weights))
            .expect("deforms");
        assert_eq!(out[0], driven[0]);
        assert_eq!(out[1], driver[2]);
        assert_eq!(diagnostics.zero_weight, 1);

        deformer.set_envelope(0.0);
        let (out, _) = deformer.deform(&DeformInput::new(&driven, &driver)).expect("deforms");
        assert_eq!(out, driven.to_vec());
    }

    #[test]
    fn repeated_deforms_keep_the_map() {
        let driver = driver();
        let driven = [Point3::new(1.0, 0.0, 0.0), Point3::new(6.0, 6.0, 0.0)];
        let mut deformer = VertexSnapDeformer::attach(&driver, &driven).expect("attach");
        assert_eq!(deformer.state(), BindState::Rebinding);

        deformer.deform(&DeformInput::new(&driven, &driver)).expect("first");
        let bound = deformer.map().clone();
        assert_eq!(bound.len(), driven.len());

        // Moving the driven mesh must not change the correspondence.
        let moved = [Point3::new(9.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)];
        let (_, diagnostics) = deformer.deform(&DeformInput::new(&moved, &driver)).expect("second");
        assert!(!diagnostics.rebound);
        assert_eq!(deformer.map(), &bound);

        deformer.request_rebind();
        deformer.deform(&DeformInput::new(&moved, &driver)).expect("rebind");
        assert_eq!(deformer.map().as_slice(), &[1, 0]);
    }

    #[test]
    fn topology_change_requires_rebind() {
        let driver = driver();
        let mut deformer = VertexSnapDeformer::restore(
            BindState::Bound,
            CorrespondenceMap::from_entries(vec![0, 1]),
        );
        let driven = [Point3::ORIGIN; 3];

        let err = deformer.deform(&DeformInput::new(&driven, &driver)).unwrap_err();
        assert_eq!(
            err,
            DeformerError::IndexOutOfRange {
                map_len: 2,
                vertex_count: 3
            }
        );
        assert_eq!(deformer.state(), BindState::Bound);
        assert_eq!(deformer.map().len(), 2);

        deformer.request_rebind();
        let (out, _) = deformer.deform(&DeformInput::new(&driven, &driver)).expect("rebound");
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn input_validation() {
        let driver = driver();
        let driven = [Point3::ORIGIN];
        let mut deformer = VertexSnapDeformer::new();

        let weights = [1.0, 1.0];
        assert_eq!(
            deformer.deform(&DeformInput::new(&driven, &driver).with_weights(&weights)),
            Err(DeformerError::WeightCountMismatch {
                expected: 1,
                actual: 2
            })
        );

        let flat = Transform::scale(1.0, 1.0, 0.0);
        assert_eq!(
            deformer.deform(&DeformInput::new(&driven, &driver).with_local_to_world(flat)),
            Err(DeformerError::SingularTransform)
        );
        assert_eq!(deformer.state(), BindState::Unbound);

        assert_eq!(
            VertexSnapDeformer::attach(&[], &driven),
            Err(DeformerError::EmptyMesh { role: "driver" })
        );
    }

    #[test]
    fn empty_driver_warns_and_keeps_positions() {
        let driven = [Point3::new(1.0, 2.0, 3.0)];
        let mut deformer = VertexSnapDeformer::new();
        let (out, diagnostics) = deformer.deform(&DeformInput::new(&driven, &[])).expect("deforms");
        assert_eq!(out, driven.to_vec());
        assert_eq!(diagnostics.unmapped, 1);
        assert_eq!(diagnostics.warnings.len(), 1);
        assert_eq!(deformer.map().as_slice(), &[UNMAPPED]);
    }

    #[test]
    fn full_weight_under_a_world_transform_reaches_the_driver() {
        let driver = [Point3::new(3.0, 0.0, 5.0)];
        let driven = [Point3::new(0.0, 0.0, 0.0)];
        let local_to_world = Transform::translate(Vec3::new(0.0, 0.0, 4.0));
        let mut deformer = VertexSnapDeformer::new();

        let (out, _) = deformer
            .deform(&DeformInput::new(&driven, &driver).with_local_to_world(local_to_world))
            .expect("deforms");
        let world = local_to_world.apply_point(out[0]);
        assert!(world.distance_to(driver[0]) < 1e-12);
    }
}
