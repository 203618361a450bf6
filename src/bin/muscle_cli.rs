#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(all(not(target_arch = "wasm32"), not(feature = "scenario_cli")))]
fn main() {
    eprintln!(
        "muscle_cli is a native-only tool and requires `--features scenario_cli`.\n\
         Example: cargo run --bin muscle_cli --features scenario_cli -- list"
    );
    std::process::exit(1);
}

#[cfg(all(not(target_arch = "wasm32"), feature = "scenario_cli"))]
fn main() {
    if let Err(err) = native::run() {
        eprintln!("muscle_cli error: {err}");
        std::process::exit(1);
    }
}

#[cfg(all(not(target_arch = "wasm32"), feature = "scenario_cli"))]
mod native {
    use std::fmt::Write as _;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use anatomy_engine::deformer::{DeformDiagnostics, DeformInput, VertexSnapDeformer};
    use anatomy_engine::geom::{
        GeomMesh, MeshDiagnostics, PlaneSurface, Point3, Transform, Vec3, mesh_surface_grid,
        triangulate_grid,
    };
    use anatomy_engine::muscle::{
        AttachmentInput, MuscleEvaluation, MuscleInputs, MuscleNode, MuscleParams, SharedSurface,
    };
    use anatomy_engine::MeshPreviewOptions;

    /// Snapshot values are rounded to this step before printing.
    const SNAPSHOT_STEP: f64 = 1e-6;
    const SNAPSHOT_PRECISION: usize = 6;

    const USAGE: &str = r#"muscle_cli (anatomy-engine)

USAGE:
  muscle_cli list
  muscle_cli run <scenario|all> [--out-dir <dir> | --obj <path> | --snap <path>] [--overwrite]

SCENARIOS:
  straight_muscle
  bent_muscle_volume
  locked_muscle
  vertex_snap_plane

Without an output flag the snapshot of a single scenario goes to stdout.
`run all` needs --out-dir and writes <scenario>.obj and <scenario>.snap.
"#;

    pub fn run() -> Result<(), String> {
        let mut args = std::env::args().skip(1);
        match args.next().as_deref() {
            None | Some("-h" | "--help" | "help") => {
                println!("{USAGE}");
                Ok(())
            }
            Some("list") => {
                Scenario::ALL.iter().for_each(|s| println!("{}", s.name()));
                Ok(())
            }
            Some("run") => {
                let target = args.next().ok_or("missing scenario name")?;
                let options = RunOptions::parse(args)?;
                cmd_run(&target, &options)
            }
            Some(other) => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    /// Where `run` sends its results.
    #[derive(Debug, Default)]
    enum Destination {
        #[default]
        Stdout,
        Files {
            obj: Option<PathBuf>,
            snap: Option<PathBuf>,
        },
        Dir(PathBuf),
    }

    #[derive(Debug, Default)]
    struct RunOptions {
        destination: Destination,
        overwrite: bool,
    }

    impl RunOptions {
        fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
            let mut options = Self::default();
            let mut obj = None;
            let mut snap = None;
            let mut dir = None;

            while let Some(flag) = args.next() {
                let mut value = || args.next().map(PathBuf::from).ok_or(format!("{flag} needs a value"));
                match flag.as_str() {
                    "--out-dir" => dir = Some(value()?),
                    "--obj" => obj = Some(value()?),
                    "--snap" => snap = Some(value()?),
                    "--overwrite" => options.overwrite = true,
                    other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
                }
            }

            options.destination = match (dir, obj, snap) {
                (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                    return Err("--out-dir cannot be combined with --obj or --snap".to_string());
                }
                (Some(dir), None, None) => Destination::Dir(dir),
                (None, None, None) => Destination::Stdout,
                (None, obj, snap) => Destination::Files { obj, snap },
            };
            Ok(options)
        }
    }

    fn cmd_run(target: &str, options: &RunOptions) -> Result<(), String> {
        let scenarios: Vec<Scenario> = if target == "all" {
            if !matches!(options.destination, Destination::Dir(_)) {
                return Err("`run all` requires --out-dir".to_string());
            }
            Scenario::ALL.to_vec()
        } else {
            vec![Scenario::from_str(target).ok_or_else(|| unknown_scenario(target))?]
        };

        for scenario in scenarios {
            let output = run_scenario(scenario)?;
            match &options.destination {
                Destination::Stdout => print!("{}", output.snapshot),
                Destination::Files { obj, snap } => {
                    match snap {
                        Some(path) => save(path, &output.snapshot, options.overwrite)?,
                        None => print!("{}", output.snapshot),
                    }
                    if let Some(path) = obj {
                        save(path, &obj_text(&output.mesh, output.name)?, options.overwrite)?;
                    }
                }
                Destination::Dir(dir) => {
                    let stem = dir.join(output.name);
                    save(&stem.with_extension("snap"), &output.snapshot, options.overwrite)?;
                    let obj = obj_text(&output.mesh, output.name)?;
                    save(&stem.with_extension("obj"), &obj, options.overwrite)?;
                }
            }
            eprintln!(
                "{}: {} vertices, {} triangles, {} warnings",
                output.name,
                output.mesh.vertex_count(),
                output.mesh.triangle_count(),
                output.warning_count
            );
        }
        Ok(())
    }

    fn unknown_scenario(name: &str) -> String {
        let known: Vec<&str> = Scenario::ALL.iter().map(|s| s.name()).collect();
        format!("unknown scenario `{name}` (known: {})", known.join(", "))
    }

    fn save(path: &Path, contents: &str, overwrite: bool) -> Result<(), String> {
        if !overwrite && path.exists() {
            return Err(format!("{} exists; pass --overwrite to replace it", path.display()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| format!("{}: {e}", parent.display()))?;
        }
        fs::write(path, contents).map_err(|e| format!("{}: {e}", path.display()))?;
        eprintln!("wrote {}", path.display());
        Ok(())
    }

    /// Wavefront OBJ with shared position/uv/normal indices.
    fn obj_text(mesh: &GeomMesh, name: &str) -> Result<String, String> {
        mesh.validate().map_err(|e| format!("{name}: invalid mesh: {e}"))?;

        let mut out = format!("# anatomy-engine muscle_cli\no {name}\n");
        for [x, y, z] in &mesh.positions {
            let _ = writeln!(out, "v {x} {y} {z}");
        }
        for [u, v] in mesh.uvs.iter().flatten() {
            let _ = writeln!(out, "vt {u} {v}");
        }
        for [x, y, z] in mesh.normals.iter().flatten() {
            let _ = writeln!(out, "vn {x} {y} {z}");
        }

        let corner = |i: u32| {
            let i = i + 1;
            match (mesh.uvs.is_some(), mesh.normals.is_some()) {
                (true, true) => format!("{i}/{i}/{i}"),
                (true, false) => format!("{i}/{i}"),
                (false, true) => format!("{i}//{i}"),
                (false, false) => i.to_string(),
            }
        };
        for tri in mesh.indices.chunks_exact(3) {
            let _ = writeln!(out, "f {} {} {}", corner(tri[0]), corner(tri[1]), corner(tri[2]));
        }
        Ok(out)
    }

    // ====================================================================
    // Snapshot text
    // ====================================================================

    fn push_number(out: &mut String, value: f64) {
        let rounded = if value.is_finite() {
            let q = (value / SNAPSHOT_STEP).round() * SNAPSHOT_STEP;
            // Avoid printing -0.000000.
            if q == 0.0 { 0.0 } else { q }
        } else {
            value
        };
        let _ = write!(out, "{rounded:.SNAPSHOT_PRECISION$}");
    }

    fn push_scalar(out: &mut String, key: &str, value: f64) {
        out.push_str(key);
        out.push(' ');
        push_number(out, value);
        out.push('\n');
    }

    fn push_vec3(out: &mut String, key: &str, v: [f64; 3]) {
        out.push_str(key);
        for component in v {
            out.push(' ');
            push_number(out, component);
        }
        out.push('\n');
    }

    fn push_warnings(out: &mut String, prefix: &str, warnings: &[String]) {
        let _ = writeln!(out, "{prefix}.warning_count {}", warnings.len());
        for (idx, warning) in warnings.iter().enumerate() {
            let _ = writeln!(out, "{prefix}.warning.{idx} {warning}");
        }
    }

    fn write_muscle(out: &mut String, eval: &MuscleEvaluation) {
        let positions = eval.positions;
        push_vec3(out, "position.origin", positions.origin.to_array());
        push_vec3(out, "position.origin_volume", positions.origin_volume.to_array());
        push_vec3(out, "position.center", positions.center.to_array());
        push_vec3(out, "position.insertion_volume", positions.insertion_volume.to_array());
        push_vec3(out, "position.insertion", positions.insertion.to_array());

        push_scalar(out, "length.continuous", eval.curve_length);
        push_scalar(out, "length.rest", eval.rest_length);
        push_scalar(out, "volume_factor", eval.diagnostics.volume_factor);

        for section in &eval.sections {
            let name = section.kind.name();
            push_scalar(out, &format!("section.{name}.height"), section.height);
            push_scalar(out, &format!("section.{name}.width"), section.width);
            push_vec3(out, &format!("section.{name}.a"), section.frame.a.to_array());
            push_vec3(out, &format!("section.{name}.b"), section.frame.b.to_array());
            push_vec3(out, &format!("section.{name}.c"), section.frame.c.to_array());
        }

        let surface = &eval.surface;
        let _ = writeln!(
            out,
            "surface.degree {} {}",
            surface.degree_u, surface.degree_v
        );
        let _ = writeln!(out, "surface.cv_count {} {}", surface.u_count, surface.v_count);
        for p in &surface.control_points {
            push_vec3(out, "cv", p.to_array());
        }
        push_warnings(out, "muscle_diag", &eval.diagnostics.warnings);
    }

    fn write_mesh_diagnostics(out: &mut String, diag: &MeshDiagnostics) {
        let _ = writeln!(out, "mesh_diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "mesh_diag.triangle_count {}", diag.triangle_count);
        let _ = writeln!(
            out,
            "mesh_diag.degenerate_triangle_count {}",
            diag.degenerate_triangle_count
        );
        let _ = writeln!(out, "mesh_diag.open_edge_count {}", diag.open_edge_count);
        let _ = writeln!(
            out,
            "mesh_diag.non_manifold_edge_count {}",
            diag.non_manifold_edge_count
        );
        push_warnings(out, "mesh_diag", &diag.warnings);
    }

    fn write_deform_diagnostics(out: &mut String, diag: &DeformDiagnostics) {
        let _ = writeln!(out, "deform_diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "deform_diag.moved {}", diag.moved);
        let _ = writeln!(out, "deform_diag.zero_weight {}", diag.zero_weight);
        let _ = writeln!(out, "deform_diag.unmapped {}", diag.unmapped);
        let _ = writeln!(out, "deform_diag.rebound {}", diag.rebound);
        push_scalar(out, "deform_diag.min_displacement", diag.min_displacement);
        push_scalar(out, "deform_diag.max_displacement", diag.max_displacement);
        push_scalar(out, "deform_diag.avg_displacement", diag.avg_displacement);
        push_warnings(out, "deform_diag", &diag.warnings);
    }

    fn snapshot(op: &str, sections: impl FnOnce(&mut String)) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# anatomy-engine golden v1");
        let _ = writeln!(out, "op {op}");
        let _ = writeln!(out, "step {SNAPSHOT_STEP:.1e}");
        sections(&mut out);
        out
    }

    // ====================================================================
    // Scenarios
    // ====================================================================

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        StraightMuscle,
        BentMuscleVolume,
        LockedMuscle,
        VertexSnapPlane,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::StraightMuscle,
            Scenario::BentMuscleVolume,
            Scenario::LockedMuscle,
            Scenario::VertexSnapPlane,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::StraightMuscle => "straight_muscle",
                Scenario::BentMuscleVolume => "bent_muscle_volume",
                Scenario::LockedMuscle => "locked_muscle",
                Scenario::VertexSnapPlane => "vertex_snap_plane",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|scenario| scenario.name() == name)
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: GeomMesh,
        warning_count: usize,
        snapshot: String,
    }

    fn run_scenario(scenario: Scenario) -> Result<ScenarioOutput, String> {
        match scenario {
            Scenario::StraightMuscle => scenario_straight_muscle(),
            Scenario::BentMuscleVolume => scenario_bent_muscle_volume(),
            Scenario::LockedMuscle => scenario_locked_muscle(),
            Scenario::VertexSnapPlane => scenario_vertex_snap_plane(),
        }
    }

    /// Plane through `origin` facing +Y; `v` runs along X.
    fn attachment_plane(origin: Point3) -> SharedSurface {
        Arc::new(PlaneSurface::new(origin, Vec3::Z, Vec3::X))
    }

    /// Two attachments at z = 0 and two at the insertion plane, 2 units apart.
    fn muscle_inputs(insertion: Transform, params: MuscleParams) -> MuscleInputs {
        let origin = attachment_plane(Point3::ORIGIN);
        let insertion_plane = attachment_plane(Point3::new(0.0, 0.0, 10.0));
        MuscleInputs::new(
            [
                AttachmentInput::on_surface(origin.clone(), 0.0, -1.0),
                AttachmentInput::on_surface(origin, 0.0, 1.0),
                AttachmentInput::on_surface(insertion_plane.clone(), 0.0, -1.0).with_transform(insertion),
                AttachmentInput::on_surface(insertion_plane, 0.0, 1.0).with_transform(insertion),
            ],
            params,
        )
    }

    fn muscle_output(
        name: &'static str,
        eval: &MuscleEvaluation,
    ) -> ScenarioOutput {
        let preview = MeshPreviewOptions::default();
        let (mesh, mesh_diag) = mesh_surface_grid(&eval.surface, preview.u_samples, preview.v_samples);
        let snap = snapshot(name, |out| {
            write_muscle(out, eval);
            write_mesh_diagnostics(out, &mesh_diag);
        });
        ScenarioOutput {
            name,
            mesh,
            warning_count: eval.diagnostics.warnings.len() + mesh_diag.warnings.len(),
            snapshot: snap,
        }
    }

    fn scenario_straight_muscle() -> Result<ScenarioOutput, String> {
        let mut node = MuscleNode::new();
        let eval = node
            .evaluate(&muscle_inputs(Transform::identity(), MuscleParams::default()))
            .map_err(|e| e.to_string())?;
        Ok(muscle_output("straight_muscle", &eval))
    }

    /// Rest pose at length 10, then the insertion moves sideways and away
    /// with volume preservation on.
    fn scenario_bent_muscle_volume() -> Result<ScenarioOutput, String> {
        let mut node = MuscleNode::new();
        node.evaluate(&muscle_inputs(Transform::identity(), MuscleParams::default()))
            .map_err(|e| e.to_string())?;

        let bent = Transform::translate(Vec3::new(4.0, 0.0, 3.0));
        let params = MuscleParams::default()
            .with_volume(true)
            .with_origin_offset([0.0, 0.5, 0.0])
            .with_insertion_offset([0.0, 0.5, 0.0]);
        let eval = node
            .evaluate(&muscle_inputs(bent, params))
            .map_err(|e| e.to_string())?;
        Ok(muscle_output("bent_muscle_volume", &eval))
    }

    fn scenario_locked_muscle() -> Result<ScenarioOutput, String> {
        let params = MuscleParams::default()
            .with_locks(true, true)
            .with_origin_offset([0.0, 0.0, 2.0])
            .with_insertion_offset([0.0, 0.0, 2.0])
            .with_rest_heights([0.5, 1.5, 1.5, 0.5])
            .with_rest_widths([1.25, 1.25]);
        let mut node = MuscleNode::new();
        let eval = node
            .evaluate(&muscle_inputs(Transform::identity(), params))
            .map_err(|e| e.to_string())?;
        Ok(muscle_output("locked_muscle", &eval))
    }

    /// A flat 5x5 grid snapping onto a raised, denser grid with a weight ramp.
    fn scenario_vertex_snap_plane() -> Result<ScenarioOutput, String> {
        let grid = |count: usize, spacing: f64, z: f64| -> Vec<Point3> {
            let mut points = Vec::with_capacity(count * count);
            for v in 0..count {
                for u in 0..count {
                    points.push(Point3::new(u as f64 * spacing, v as f64 * spacing, z));
                }
            }
            points
        };
        let driven = grid(5, 1.0, 0.0);
        let driver: Vec<Point3> = grid(9, 0.5, 1.0)
            .into_iter()
            .map(|p| p + Vec3::new(0.1, -0.1, 0.0))
            .collect();
        let weights: Vec<f64> = driven.iter().map(|p| p.x / 4.0).collect();

        let mut deformer = VertexSnapDeformer::attach(&driver, &driven).map_err(|e| e.to_string())?;
        let (positions, diag) = deformer
            .deform(&DeformInput::new(&driven, &driver).with_weights(&weights))
            .map_err(|e| e.to_string())?;

        let mesh = GeomMesh::new(
            positions.iter().map(|p| p.to_array()).collect(),
            triangulate_grid(5, 5),
        );
        let snap = snapshot("vertex_snap_plane", |out| {
            let _ = writeln!(out, "bind.state {}", deformer.state().label());
            let map = deformer
                .map()
                .as_slice()
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(out, "bind.map {map}");
            write_deform_diagnostics(out, &diag);
            for p in &positions {
                push_vec3(out, "p", p.to_array());
            }
        });

        Ok(ScenarioOutput {
            name: "vertex_snap_plane",
            mesh,
            warning_count: diag.warnings.len(),
            snapshot: snap,
        })
    }
}
