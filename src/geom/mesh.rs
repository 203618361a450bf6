use std::collections::HashMap;

use super::metrics::{GeomMetrics, GeomTimingReport, TimingBucket};
use super::surface::{tessellate_surface_grid, Surface};
use super::triangulation::triangulate_grid_wrapped;
use super::{Point3, Tolerance, Vec3};

/// Indexed triangle mesh used for previews and for deformer input/output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeomMesh {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
    pub uvs: Option<Vec<[f64; 2]>>,
    pub normals: Option<Vec<[f64; 3]>>,
}

impl GeomMesh {
    /// Create a new mesh with positions and indices only.
    #[must_use]
    pub fn new(positions: Vec<[f64; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            indices,
            uvs: None,
            normals: None,
        }
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn point(&self, index: usize) -> Option<Point3> {
        self.positions.get(index).copied().map(Point3::from)
    }

    /// Returns true if any vertex position contains NaN or Inf values.
    #[must_use]
    pub fn has_invalid_vertices(&self) -> bool {
        self.positions
            .iter()
            .any(|p| !p[0].is_finite() || !p[1].is_finite() || !p[2].is_finite())
    }

    /// Returns true if all vertex indices are within bounds.
    #[must_use]
    pub fn has_valid_indices(&self) -> bool {
        let n = self.positions.len();
        self.indices.iter().all(|&i| (i as usize) < n)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err("mesh indices are not a triangle list (len % 3 != 0)".to_string());
        }
        if self.has_invalid_vertices() {
            return Err("mesh has invalid vertex coordinates (NaN/Inf)".to_string());
        }
        if !self.has_valid_indices() {
            return Err("mesh has out-of-bounds vertex indices".to_string());
        }
        let n = self.positions.len();
        if self.uvs.as_ref().is_some_and(|uvs| uvs.len() != n)
            || self.normals.as_ref().is_some_and(|normals| normals.len() != n)
        {
            return Err("mesh attribute buffers do not match vertex count".to_string());
        }
        Ok(())
    }
}

/// Topology summary returned alongside every generated mesh.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MeshDiagnostics {
    pub vertex_count: usize,
    pub triangle_count: usize,
    /// Triangles with (near) zero area. They are kept in the index buffer.
    pub degenerate_triangle_count: usize,
    /// Edges with a single adjacent triangle. An open loft has two boundary rings.
    pub open_edge_count: usize,
    pub non_manifold_edge_count: usize,
    /// Only populated with the `engine_metrics` feature on native targets.
    pub timing: Option<GeomTimingReport>,
    pub warnings: Vec<String>,
}

/// Samples `surface` on a grid and triangulates it, wrapping closed directions.
#[must_use]
pub fn mesh_surface_grid<S: Surface + ?Sized>(
    surface: &S,
    u_count: usize,
    v_count: usize,
) -> (GeomMesh, MeshDiagnostics) {
    let mut metrics = GeomMetrics::default();
    metrics.begin();

    let wrap_u = surface.is_u_closed();
    let wrap_v = surface.is_v_closed();
    let u_count = if wrap_u { u_count.max(3) } else { u_count.max(2) };
    let v_count = if wrap_v { v_count.max(3) } else { v_count.max(2) };

    let points = metrics.time(TimingBucket::SurfaceTessellation, || {
        tessellate_surface_grid(surface, u_count, v_count)
    });
    let indices = metrics.time(TimingBucket::Triangulation, || {
        triangulate_grid_wrapped(u_count, v_count, wrap_u, wrap_v)
    });

    let uvs = grid_uvs(u_count, v_count, wrap_u, wrap_v);
    let normals = compute_smooth_normals(&points, &indices);

    let degenerate_triangle_count = count_degenerate_triangles(&points, &indices, Tolerance::DEFAULT);
    let (open_edge_count, non_manifold_edge_count) = count_edge_topology(&indices);

    let mut warnings = Vec::new();
    if points.iter().any(|p| !p.is_finite()) {
        warnings.push("surface produced non-finite samples".to_string());
    }
    if degenerate_triangle_count > 0 {
        warnings.push(format!("mesh has {degenerate_triangle_count} degenerate triangles"));
    }
    if non_manifold_edge_count > 0 {
        warnings.push("mesh has non-manifold edges".to_string());
    }

    let mesh = GeomMesh {
        positions: points.into_iter().map(Point3::to_array).collect(),
        indices,
        uvs: Some(uvs),
        normals: Some(normals),
    };

    let diagnostics = MeshDiagnostics {
        vertex_count: mesh.vertex_count(),
        triangle_count: mesh.triangle_count(),
        degenerate_triangle_count,
        open_edge_count,
        non_manifold_edge_count,
        timing: metrics.end(),
        warnings,
    };

    (mesh, diagnostics)
}

fn grid_uvs(u_count: usize, v_count: usize, wrap_u: bool, wrap_v: bool) -> Vec<[f64; 2]> {
    let u_denom = (if wrap_u { u_count } else { u_count - 1 }) as f64;
    let v_denom = (if wrap_v { v_count } else { v_count - 1 }) as f64;
    let mut uvs = Vec::with_capacity(u_count * v_count);
    for v in 0..v_count {
        for u in 0..u_count {
            uvs.push([u as f64 / u_denom, v as f64 / v_denom]);
        }
    }
    uvs
}

fn compute_smooth_normals(points: &[Point3], indices: &[u32]) -> Vec<[f64; 3]> {
    let mut normals = vec![Vec3::ZERO; points.len()];

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let (Some(a), Some(b), Some(c)) = (points.get(i0), points.get(i1), points.get(i2)) else {
            continue;
        };
        let n = b.sub_point(*a).cross(c.sub_point(*a));
        normals[i0] = normals[i0] + n;
        normals[i1] = normals[i1] + n;
        normals[i2] = normals[i2] + n;
    }

    normals
        .into_iter()
        .map(|n| n.normalized().unwrap_or(Vec3::Z).to_array())
        .collect()
}

fn count_degenerate_triangles(points: &[Point3], indices: &[u32], tol: Tolerance) -> usize {
    indices
        .chunks_exact(3)
        .filter(|tri| {
            let (Some(a), Some(b), Some(c)) = (
                points.get(tri[0] as usize),
                points.get(tri[1] as usize),
                points.get(tri[2] as usize),
            ) else {
                return true;
            };
            b.sub_point(*a).cross(c.sub_point(*a)).length() <= tol.eps
        })
        .count()
}

fn count_edge_topology(indices: &[u32]) -> (usize, usize) {
    let mut edge_counts: HashMap<(u32, u32), u32> = HashMap::new();

    for tri in indices.chunks_exact(3) {
        let (i0, i1, i2) = (tri[0], tri[1], tri[2]);
        if i0 == i1 || i1 == i2 || i0 == i2 {
            continue;
        }

        for (ea, eb) in [(i0, i1), (i1, i2), (i2, i0)] {
            let key = if ea <= eb { (ea, eb) } else { (eb, ea) };
            *edge_counts.entry(key).or_insert(0) += 1;
        }
    }

    let open_edge_count = edge_counts.values().filter(|&&count| count == 1).count();
    let non_manifold_edge_count = edge_counts.values().filter(|&&count| count > 2).count();
    (open_edge_count, non_manifold_edge_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::CylinderSurface;

    #[test]
    fn cylinder_grid_is_open_only_at_the_caps() {
        let cylinder = CylinderSurface::new(Point3::ORIGIN, Vec3::new(0.0, 0.0, 2.0), 1.0)
            .expect("valid cylinder");
        let (mesh, diag) = mesh_surface_grid(&cylinder, 16, 4);

        assert!(mesh.validate().is_ok());
        assert_eq!(diag.vertex_count, 16 * 4);
        assert_eq!(diag.triangle_count, 16 * 3 * 2);
        assert_eq!(diag.open_edge_count, 2 * 16);
        assert_eq!(diag.non_manifold_edge_count, 0);
        assert_eq!(diag.degenerate_triangle_count, 0);
        assert!(diag.warnings.is_empty());
    }

    #[test]
    fn validate_rejects_out_of_range_indices() {
        let mesh = GeomMesh::new(vec![[0.0; 3]; 3], vec![0, 1, 3]);
        assert!(mesh.validate().is_err());
        let mesh = GeomMesh::new(vec![[0.0; 3]; 3], vec![0, 1]);
        assert!(mesh.validate().is_err());
    }
}
