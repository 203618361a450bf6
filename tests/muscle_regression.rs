use std::sync::Arc;

use anatomy_engine::geom::{Curve3, PlaneSurface, Point3, Surface, Tolerance, Vec3};
use anatomy_engine::muscle::{
    AttachmentInput, MuscleInputs, MuscleNode, MuscleOutput, MuscleParams, MuscleValue,
    SharedSurface,
};

const TOL: f64 = 1e-9;

fn plane(z: f64) -> SharedSurface {
    Arc::new(PlaneSurface::new(Point3::new(0.0, 0.0, z), Vec3::Z, Vec3::X))
}

/// Origin attachments at x = +-`origin_half`, insertion at x = +-`insertion_half`.
fn muscle(length: f64, origin_half: f64, insertion_half: f64, params: MuscleParams) -> MuscleInputs {
    let bottom = plane(0.0);
    let top = plane(length);
    MuscleInputs::new(
        [
            AttachmentInput::on_surface(bottom.clone(), 0.0, -origin_half),
            AttachmentInput::on_surface(bottom, 0.0, origin_half),
            AttachmentInput::on_surface(top.clone(), 0.0, -insertion_half),
            AttachmentInput::on_surface(top, 0.0, insertion_half),
        ],
        params,
    )
}

fn assert_point(actual: Point3, expected: Point3) {
    assert!(
        actual.distance_to(expected) < TOL,
        "expected {expected:?}, got {actual:?}"
    );
}

#[test]
fn straight_muscle_reference_values() {
    let mut node = MuscleNode::new();
    let eval = node
        .evaluate(&muscle(10.0, 1.0, 1.0, MuscleParams::default()))
        .expect("evaluates");

    assert!((eval.curve_length - 10.0).abs() < 1e-6);
    assert_point(eval.positions.origin, Point3::new(0.0, 0.0, 0.0));
    assert_point(eval.positions.origin_volume, Point3::new(0.0, 0.0, 2.5));
    assert_point(eval.positions.center, Point3::new(0.0, 0.0, 5.0));
    assert_point(eval.positions.insertion_volume, Point3::new(0.0, 0.0, 7.5));
    assert_point(eval.positions.insertion, Point3::new(0.0, 0.0, 10.0));

    assert_eq!(eval.surface.control_points.len(), 44);
    assert_eq!(eval.diagnostics.degenerate_frame_count, 0);
    assert_eq!(eval.heights(), [1.0; 4]);
    assert_eq!(eval.widths(), [1.0; 4]);
}

#[test]
fn straight_centerline_stays_on_the_axis() {
    let mut node = MuscleNode::new();
    let eval = node
        .evaluate(&muscle(10.0, 1.0, 1.0, MuscleParams::default()))
        .expect("evaluates");

    let (t0, t1) = eval.curve.domain();
    for i in 0..=16 {
        let t = t0 + (t1 - t0) * f64::from(i) / 16.0;
        let p = eval.curve.point_at(t);
        assert!(p.x.abs() < TOL && p.y.abs() < TOL, "t={t} -> {p:?}");
        assert!((-TOL..=10.0 + TOL).contains(&p.z), "t={t} -> {p:?}");
    }
}

#[test]
fn ring_wraps_around_the_centerline() {
    let mut node = MuscleNode::new();
    let eval = node
        .evaluate(&muscle(10.0, 1.0, 1.0, MuscleParams::default()))
        .expect("evaluates");
    let surface = &eval.surface;

    assert!(surface.is_u_closed());
    let (u0, u1) = surface.domain_u();
    let (v0, v1) = surface.domain_v();
    let v = (v0 + v1) / 2.0;

    let start = surface.point_at(u0, v);
    let end = surface.point_at(u1, v);
    assert!(start.distance_to(end) < 1e-6, "{start:?} vs {end:?}");

    // Samples straddle the axis on both sides in x.
    let xs: Vec<f64> = (0..8)
        .map(|i| surface.point_at(u0 + (u1 - u0) * f64::from(i) / 8.0, v).x)
        .collect();
    assert!(xs.iter().any(|x| *x > 0.1), "{xs:?}");
    assert!(xs.iter().any(|x| *x < -0.1), "{xs:?}");
}

#[test]
fn end_widths_follow_attachment_spread() {
    let mut node = MuscleNode::new();
    let eval = node
        .evaluate(&muscle(10.0, 1.0, 2.0, MuscleParams::default()))
        .expect("evaluates");

    assert_eq!(eval.rest_dimensions.widths, [1.0, 1.0, 1.0, 2.0]);

    let mut mirrored = MuscleNode::new();
    let flipped = mirrored
        .evaluate(&muscle(10.0, 2.0, 1.0, MuscleParams::default()))
        .expect("evaluates");
    let mut reversed = flipped.widths();
    reversed.reverse();
    assert_eq!(eval.widths(), reversed);
}

#[test]
fn offsets_mirror_the_out_axis_at_the_insertion() {
    let params = MuscleParams::default()
        .with_origin_offset([0.0, 0.0, 1.0])
        .with_insertion_offset([0.0, 0.0, 1.0]);
    let mut node = MuscleNode::new();
    let eval = node.evaluate(&muscle(10.0, 1.0, 1.0, params)).expect("evaluates");

    // out = normal x span = Y x X = -Z, mirrored for the insertion.
    assert_point(eval.positions.origin_volume, Point3::new(0.0, 0.0, 1.5));
    assert_point(eval.positions.insertion_volume, Point3::new(0.0, 0.0, 8.5));
}

#[test]
fn up_offset_lifts_the_volume_station_along_the_normal() {
    let params = MuscleParams::default().with_origin_offset([0.0, 2.0, 0.0]);
    let mut node = MuscleNode::new();
    let eval = node.evaluate(&muscle(10.0, 1.0, 1.0, params)).expect("evaluates");
    assert_point(eval.positions.origin_volume, Point3::new(0.0, 2.0, 2.5));
    assert_point(eval.positions.insertion_volume, Point3::new(0.0, 0.0, 7.5));
}

#[test]
fn locked_ends_measure_offsets_from_the_attachment_midpoint() {
    let params = MuscleParams::default()
        .with_locks(true, true)
        .with_origin_offset([0.0, 1.0, 0.0])
        .with_insertion_offset([0.0, 1.0, 0.0]);
    let mut node = MuscleNode::new();
    let eval = node.evaluate(&muscle(10.0, 1.0, 1.0, params)).expect("evaluates");

    assert_point(eval.positions.origin_volume, Point3::new(0.0, 1.0, 0.0));
    assert_point(eval.positions.insertion_volume, Point3::new(0.0, 1.0, 10.0));
    for section in &eval.sections {
        assert!(section.frame.is_orthonormal(Tolerance::LOOSE), "{section:?}");
    }
}

#[test]
fn negative_rest_knobs_are_clamped_with_warnings() {
    let params = MuscleParams::default()
        .with_rest_heights([1.0, -2.0, 1.0, 1.0])
        .with_rest_widths([1.0, f64::NAN]);
    let mut node = MuscleNode::new();
    let eval = node.evaluate(&muscle(10.0, 1.0, 1.0, params)).expect("evaluates");

    assert_eq!(eval.heights(), [1.0, 0.0, 1.0, 1.0]);
    assert_eq!(eval.widths(), [1.0, 1.0, 1.0, 1.0]);
    assert_eq!(eval.diagnostics.warnings.len(), 2, "{:?}", eval.diagnostics.warnings);
}

#[test]
fn volume_example_halves_every_dimension() {
    let mut node = MuscleNode::new();
    node.evaluate(&muscle(10.0, 1.0, 1.0, MuscleParams::default()))
        .expect("rest pose");

    let params = MuscleParams::default().with_volume(true);
    let inputs = muscle(40.0, 1.0, 1.0, params);
    let Ok(MuscleValue::Doubles(widths)) = node.compute(MuscleOutput::Widths, &inputs) else {
        panic!("widths should be doubles");
    };
    assert_eq!(widths.len(), 4);
    for width in widths {
        assert!((width - 0.5).abs() < TOL, "{width}");
    }
    assert_eq!(node.rest_length().map(|l| (l - 10.0).abs() < 1e-6), Some(true));
}
