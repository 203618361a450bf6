mod basis;
mod core;
mod curve;
mod mesh;
mod metrics;
mod surface;
mod triangulation;

pub use basis::{expand_host_knots, host_knots};
pub use core::{Point3, Tolerance, Transform, Vec3};
pub use curve::{Curve3, NurbsCurve3, curve_arc_length, curve_length};
pub use mesh::{GeomMesh, MeshDiagnostics, mesh_surface_grid};
pub use metrics::{GeomMetrics, GeomTimingReport, TimingBucket};
pub use surface::{
    CylinderSurface, NurbsSurface, PlaneSurface, SphereSurface, Surface, tessellate_surface_grid,
};
pub use triangulation::{triangulate_grid, triangulate_grid_wrapped};
