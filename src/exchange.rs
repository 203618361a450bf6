//! Serde data-transfer types for the JS boundary.
//!
//! Incoming descriptors are plain arrays and tagged enums; they are turned
//! into domain types (`MuscleInputs`, `DeformInput`) here so the `Engine`
//! facade only deals with conversion errors in one place.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::deformer::{BindState, DeformDiagnostics};
use crate::geom::{
    CylinderSurface, GeomMesh, MeshDiagnostics, NurbsCurve3, NurbsSurface, PlaneSurface, Point3,
    SphereSurface, Transform, Vec3,
};
use crate::muscle::{
    ATTACHMENT_COUNT, AttachmentInput, MuscleError, MuscleInputs, MuscleParams, MuscleValue,
    SharedSurface, decode_up_selector,
};
use crate::schema::RegistrationReport;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("expected {ATTACHMENT_COUNT} attachments, got {0}")]
    AttachmentCount(usize),
    #[error("attachment {index}: {message}")]
    Surface { index: usize, message: String },
    #[error(transparent)]
    Muscle(#[from] MuscleError),
}

// ====================================================================
// Inputs
// ====================================================================

/// Parametric surface an attachment sits on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SurfaceDescriptor {
    Plane {
        origin: [f64; 3],
        u_axis: [f64; 3],
        v_axis: [f64; 3],
    },
    Cylinder {
        base: [f64; 3],
        axis: [f64; 3],
        radius: f64,
    },
    Sphere {
        center: [f64; 3],
        radius: f64,
    },
    /// Knots in host form (`count + degree - 1` entries).
    Nurbs {
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<[f64; 3]>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weights: Option<Vec<f64>>,
    },
}

impl SurfaceDescriptor {
    pub fn build(&self) -> Result<SharedSurface, String> {
        Ok(match self {
            Self::Plane {
                origin,
                u_axis,
                v_axis,
            } => Arc::new(PlaneSurface::new(
                Point3::from(*origin),
                Vec3::from(*u_axis),
                Vec3::from(*v_axis),
            )),
            Self::Cylinder { base, axis, radius } => Arc::new(CylinderSurface::new(
                Point3::from(*base),
                Vec3::from(*axis),
                *radius,
            )?),
            Self::Sphere { center, radius } => {
                Arc::new(SphereSurface::new(Point3::from(*center), *radius)?)
            }
            Self::Nurbs {
                degree_u,
                degree_v,
                u_count,
                v_count,
                control_points,
                knots_u,
                knots_v,
                weights,
            } => Arc::new(NurbsSurface::from_host_knots(
                *degree_u,
                *degree_v,
                *u_count,
                *v_count,
                control_points.iter().copied().map(Point3::from).collect(),
                knots_u,
                knots_v,
                weights.clone(),
            )?),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AttachmentDescriptor {
    /// `None` leaves the attachment disconnected.
    pub surface: Option<SurfaceDescriptor>,
    pub u: f64,
    pub v: f64,
    /// 0 = normal, 1 = tangentU, 2 = tangentV.
    pub up: i32,
    pub flip: bool,
    /// Host world matrix, row-vector convention.
    pub world_matrix: Option<[[f64; 4]; 4]>,
}

impl AttachmentDescriptor {
    pub fn to_input(&self, index: usize) -> Result<AttachmentInput, ExchangeError> {
        let up_selector = decode_up_selector(index, self.up)?;
        let mut input = match &self.surface {
            Some(descriptor) => {
                let surface = descriptor
                    .build()
                    .map_err(|message| ExchangeError::Surface { index, message })?;
                AttachmentInput::on_surface(surface, self.u, self.v)
            }
            None => AttachmentInput::disconnected(),
        };
        input = input.with_up_selector(up_selector).with_flip(self.flip);
        if let Some(rows) = self.world_matrix {
            input = input.with_transform(Transform::from_rows(rows));
        }
        Ok(input)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MuscleInputsDescriptor {
    pub attachments: Vec<AttachmentDescriptor>,
    #[serde(default)]
    pub params: MuscleParams,
}

impl MuscleInputsDescriptor {
    pub fn to_inputs(&self) -> Result<MuscleInputs, ExchangeError> {
        if self.attachments.len() != ATTACHMENT_COUNT {
            return Err(ExchangeError::AttachmentCount(self.attachments.len()));
        }
        let mut attachments: [AttachmentInput; ATTACHMENT_COUNT] = Default::default();
        for (index, (slot, descriptor)) in attachments.iter_mut().zip(&self.attachments).enumerate() {
            *slot = descriptor.to_input(index)?;
        }
        Ok(MuscleInputs::new(attachments, self.params))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeformRequest {
    pub driven: Vec<[f64; 3]>,
    pub driver: Vec<[f64; 3]>,
    #[serde(default)]
    pub weights: Option<Vec<f64>>,
    #[serde(default)]
    pub envelope: Option<f64>,
    /// Host world matrix of the driven geometry, row-vector convention.
    #[serde(default)]
    pub local_to_world: Option<[[f64; 4]; 4]>,
}

impl DeformRequest {
    #[must_use]
    pub fn driven_points(&self) -> Vec<Point3> {
        self.driven.iter().copied().map(Point3::from).collect()
    }

    #[must_use]
    pub fn driver_points(&self) -> Vec<Point3> {
        self.driver.iter().copied().map(Point3::from).collect()
    }

    #[must_use]
    pub fn transform(&self) -> Transform {
        self.local_to_world.map(Transform::from_rows).unwrap_or_default()
    }
}

// ====================================================================
// Exports
// ====================================================================

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type")]
pub enum MuscleValueExport {
    Surface {
        degree_u: usize,
        degree_v: usize,
        u_count: usize,
        v_count: usize,
        control_points: Vec<[f64; 3]>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
    },
    Curve {
        degree: usize,
        control_points: Vec<[f64; 3]>,
        knots: Vec<f64>,
    },
    Doubles {
        values: Vec<f64>,
    },
    Distance {
        value: f64,
    },
    Points {
        points: Vec<[f64; 3]>,
    },
    Vectors {
        vectors: Vec<[f64; 3]>,
    },
    Ints {
        values: Vec<i32>,
    },
}

impl From<&NurbsSurface> for MuscleValueExport {
    fn from(surface: &NurbsSurface) -> Self {
        Self::Surface {
            degree_u: surface.degree_u,
            degree_v: surface.degree_v,
            u_count: surface.u_count,
            v_count: surface.v_count,
            control_points: surface.control_points.iter().map(|p| p.to_array()).collect(),
            knots_u: surface.knots_u_host(),
            knots_v: surface.knots_v_host(),
        }
    }
}

impl From<&NurbsCurve3> for MuscleValueExport {
    fn from(curve: &NurbsCurve3) -> Self {
        Self::Curve {
            degree: curve.degree,
            control_points: curve.control_points.iter().map(|p| p.to_array()).collect(),
            knots: curve.knots_host(),
        }
    }
}

impl From<&MuscleValue> for MuscleValueExport {
    fn from(value: &MuscleValue) -> Self {
        match value {
            MuscleValue::Surface(surface) => surface.into(),
            MuscleValue::Curve(curve) => curve.into(),
            MuscleValue::Doubles(values) => Self::Doubles {
                values: values.clone(),
            },
            MuscleValue::Distance(value) => Self::Distance { value: *value },
            MuscleValue::Points(points) => Self::Points {
                points: points.iter().map(|p| p.to_array()).collect(),
            },
            MuscleValue::Vectors(vectors) => Self::Vectors {
                vectors: vectors.iter().map(|v| v.to_array()).collect(),
            },
            MuscleValue::Ints(values) => Self::Ints {
                values: values.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeshExport {
    pub vertices: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normals: Option<Vec<[f64; 3]>>,
    pub open_edges: usize,
    pub degenerate_triangles: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl MeshExport {
    #[must_use]
    pub fn new(mesh: GeomMesh, diagnostics: MeshDiagnostics) -> Self {
        Self {
            vertices: mesh.positions,
            indices: mesh.indices,
            normals: mesh.normals,
            open_edges: diagnostics.open_edge_count,
            degenerate_triangles: diagnostics.degenerate_triangle_count,
            warnings: diagnostics.warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeformDiagnosticsExport {
    pub vertex_count: usize,
    pub moved: usize,
    pub zero_weight: usize,
    pub unmapped: usize,
    pub min_displacement: f64,
    pub max_displacement: f64,
    pub avg_displacement: f64,
    pub rebound: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl From<DeformDiagnostics> for DeformDiagnosticsExport {
    fn from(diagnostics: DeformDiagnostics) -> Self {
        Self {
            vertex_count: diagnostics.vertex_count,
            moved: diagnostics.moved,
            zero_weight: diagnostics.zero_weight,
            unmapped: diagnostics.unmapped,
            min_displacement: diagnostics.min_displacement,
            max_displacement: diagnostics.max_displacement,
            avg_displacement: diagnostics.avg_displacement,
            rebound: diagnostics.rebound,
            warnings: diagnostics.warnings,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeformResponse {
    pub positions: Vec<[f64; 3]>,
    pub state: i32,
    pub diagnostics: DeformDiagnosticsExport,
}

impl DeformResponse {
    #[must_use]
    pub fn new(positions: &[Point3], state: BindState, diagnostics: DeformDiagnostics) -> Self {
        Self {
            positions: positions.iter().map(|p| p.to_array()).collect(),
            state: state.index(),
            diagnostics: diagnostics.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegistrationExport {
    pub success: bool,
    pub nodes: usize,
    pub attributes: usize,
    pub dependencies: usize,
    pub failures: Vec<String>,
}

impl From<&RegistrationReport> for RegistrationExport {
    fn from(report: &RegistrationReport) -> Self {
        Self {
            success: report.is_success(),
            nodes: report.nodes_registered,
            attributes: report.attributes_added,
            dependencies: report.dependencies_declared,
            failures: report
                .failures()
                .iter()
                .map(|failure| format!("{}: {}: {}", failure.node, failure.step, failure.error))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::muscle::UpSelector;

    fn plane(z: f64) -> SurfaceDescriptor {
        SurfaceDescriptor::Plane {
            origin: [0.0, 0.0, z],
            u_axis: [0.0, 0.0, 1.0],
            v_axis: [1.0, 0.0, 0.0],
        }
    }

    #[test]
    fn descriptors_convert_to_muscle_inputs() {
        let descriptor = MuscleInputsDescriptor {
            attachments: vec![
                AttachmentDescriptor {
                    surface: Some(plane(0.0)),
                    v: -1.0,
                    up: 2,
                    ..AttachmentDescriptor::default()
                },
                AttachmentDescriptor {
                    surface: Some(plane(0.0)),
                    v: 1.0,
                    flip: true,
                    ..AttachmentDescriptor::default()
                },
                AttachmentDescriptor::default(),
                AttachmentDescriptor {
                    surface: Some(SurfaceDescriptor::Sphere {
                        center: [0.0, 0.0, 10.0],
                        radius: 1.0,
                    }),
                    world_matrix: Some([
                        [1.0, 0.0, 0.0, 0.0],
                        [0.0, 1.0, 0.0, 0.0],
                        [0.0, 0.0, 1.0, 0.0],
                        [0.0, 0.0, 3.0, 1.0],
                    ]),
                    ..AttachmentDescriptor::default()
                },
            ],
            params: MuscleParams::default(),
        };

        let inputs = descriptor.to_inputs().expect("converts");
        assert_eq!(inputs.attachments[0].up_selector, UpSelector::TangentV);
        assert!(inputs.attachments[1].flip);
        assert!(!inputs.attachments[2].is_connected());
        assert_eq!(inputs.attachments[3].transform.translation(), Vec3::new(0.0, 0.0, 3.0));
    }

    #[test]
    fn bad_descriptors_are_rejected() {
        let short = MuscleInputsDescriptor::default();
        assert!(matches!(short.to_inputs(), Err(ExchangeError::AttachmentCount(0))));

        let bad_up = AttachmentDescriptor {
            up: 5,
            ..AttachmentDescriptor::default()
        };
        assert!(matches!(
            bad_up.to_input(1),
            Err(ExchangeError::Muscle(MuscleError::InvalidUpSelector { index: 1, value: 5 }))
        ));

        let bad_sphere = AttachmentDescriptor {
            surface: Some(SurfaceDescriptor::Sphere {
                center: [0.0; 3],
                radius: 0.0,
            }),
            ..AttachmentDescriptor::default()
        };
        assert!(matches!(bad_sphere.to_input(2), Err(ExchangeError::Surface { index: 2, .. })));
    }

    #[test]
    fn distance_export_is_tagged() {
        let export = MuscleValueExport::from(&MuscleValue::Distance(10.0));
        assert_eq!(export, MuscleValueExport::Distance { value: 10.0 });
    }
}
