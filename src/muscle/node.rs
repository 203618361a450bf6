//! The muscle node: enumerated outputs and the evaluation pipeline.

use crate::geom::{
    GeomMetrics, GeomTimingReport, NurbsCurve3, NurbsSurface, Point3, TimingBucket, Vec3,
    curve_length,
};
use crate::schema::{AttributeRole, NodeSchema};

use super::attachment::{ATTACHMENT_COUNT, AttachmentInput, ResolvedAttachments, resolve_attachments};
use super::curve::build_muscle_curve;
use super::loft::loft_muscle_surface;
use super::params::MuscleParams;
use super::positions::{MusclePositions, compute_positions};
use super::sections::{
    CrossSection, SectionDimensions, build_cross_sections, rest_dimensions, section_frames,
    volume_factor,
};
use super::MuscleError;

// ====================================================================
// Outputs
// ====================================================================

/// Every value the muscle node can compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MuscleOutput {
    Surface,
    Curve,
    Heights,
    Widths,
    RestLength,
    Positions,
    UpVectors,
    UpSelectors,
    Locks,
    ContinuousLength,
}

impl MuscleOutput {
    /// Host dispatch order.
    pub const ALL: [Self; 10] = [
        Self::Surface,
        Self::Curve,
        Self::Heights,
        Self::Widths,
        Self::RestLength,
        Self::Positions,
        Self::UpVectors,
        Self::UpSelectors,
        Self::Locks,
        Self::ContinuousLength,
    ];

    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            Self::Surface => "muscleSurface",
            Self::Curve => "internalMuscleCurve",
            Self::Heights => "internalMuscleHeights",
            Self::Widths => "internalMuscleWidths",
            Self::RestLength => "internalMuscleLength",
            Self::Positions => "internalMusclePositions",
            Self::UpVectors => "internalVPoints",
            Self::UpSelectors => "internalWhichUp",
            Self::Locks => "internalMuscleLocks",
            Self::ContinuousLength => "muscleLength",
        }
    }

    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Surface => "ms",
            Self::Curve => "icv",
            Self::Heights => "iRh",
            Self::Widths => "iRw",
            Self::RestLength => "iRl",
            Self::Positions => "iMp",
            Self::UpVectors => "iVp",
            Self::UpSelectors => "iwu",
            Self::Locks => "iml",
            Self::ContinuousLength => "mL",
        }
    }

    /// Matches long or short host names.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|output| output.long_name() == name || output.short_name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MuscleValue {
    Surface(NurbsSurface),
    Curve(NurbsCurve3),
    Doubles(Vec<f64>),
    Distance(f64),
    Points(Vec<Point3>),
    Vectors(Vec<Vec3>),
    Ints(Vec<i32>),
}

/// Result of a plug request. Unknown plugs are left for the host to route.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Handled(MuscleValue),
    NotHandled,
}

impl Evaluation {
    #[must_use]
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled(_))
    }

    #[must_use]
    pub fn into_value(self) -> Option<MuscleValue> {
        match self {
            Self::Handled(value) => Some(value),
            Self::NotHandled => None,
        }
    }
}

// ====================================================================
// Evaluation
// ====================================================================

#[derive(Debug, Clone, Default)]
pub struct MuscleInputs {
    pub attachments: [AttachmentInput; ATTACHMENT_COUNT],
    pub params: MuscleParams,
}

impl MuscleInputs {
    #[must_use]
    pub fn new(attachments: [AttachmentInput; ATTACHMENT_COUNT], params: MuscleParams) -> Self {
        Self { attachments, params }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MuscleDiagnostics {
    pub volume_factor: f64,
    pub degenerate_frame_count: usize,
    /// Only populated with the `engine_metrics` feature on native targets.
    pub timing: Option<GeomTimingReport>,
    pub warnings: Vec<String>,
}

/// Everything one evaluation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct MuscleEvaluation {
    pub params: MuscleParams,
    pub attachments: ResolvedAttachments,
    pub positions: MusclePositions,
    /// Dimensions before volume scaling.
    pub rest_dimensions: SectionDimensions,
    /// Volume-scaled sections the surface was lofted from.
    pub sections: [CrossSection; 4],
    pub curve: NurbsCurve3,
    pub curve_length: f64,
    pub rest_length: f64,
    pub surface: NurbsSurface,
    pub diagnostics: MuscleDiagnostics,
}

impl MuscleEvaluation {
    #[must_use]
    pub fn heights(&self) -> [f64; 4] {
        self.sections.map(|s| s.height)
    }

    #[must_use]
    pub fn widths(&self) -> [f64; 4] {
        self.sections.map(|s| s.width)
    }

    #[must_use]
    pub fn value(&self, output: MuscleOutput) -> MuscleValue {
        match output {
            MuscleOutput::Surface => MuscleValue::Surface(self.surface.clone()),
            MuscleOutput::Curve => MuscleValue::Curve(self.curve.clone()),
            MuscleOutput::Heights => MuscleValue::Doubles(self.heights().to_vec()),
            MuscleOutput::Widths => MuscleValue::Doubles(self.widths().to_vec()),
            MuscleOutput::RestLength => MuscleValue::Distance(self.rest_length),
            MuscleOutput::Positions => MuscleValue::Points(self.positions.to_array().to_vec()),
            MuscleOutput::UpVectors => MuscleValue::Vectors(self.attachments.up_vectors().to_vec()),
            MuscleOutput::UpSelectors => MuscleValue::Ints(
                self.attachments
                    .up_selectors()
                    .iter()
                    .map(|selector| selector.index())
                    .collect(),
            ),
            MuscleOutput::Locks => MuscleValue::Ints(self.params.locks().to_vec()),
            MuscleOutput::ContinuousLength => MuscleValue::Distance(self.curve_length),
        }
    }
}

/// One muscle instance.
///
/// The only state kept between evaluations is the rest length: it tracks the
/// live curve length while volume preservation is off and is frozen while it
/// is on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MuscleNode {
    rest_length: Option<f64>,
}

impl MuscleNode {
    #[must_use]
    pub const fn new() -> Self {
        Self { rest_length: None }
    }

    #[must_use]
    pub const fn rest_length(&self) -> Option<f64> {
        self.rest_length
    }

    /// Restores a persisted rest length (`internalMuscleLength`).
    pub fn set_rest_length(&mut self, rest_length: Option<f64>) {
        self.rest_length = rest_length.filter(|length| length.is_finite() && *length >= 0.0);
    }

    pub fn evaluate(&mut self, inputs: &MuscleInputs) -> Result<MuscleEvaluation, MuscleError> {
        let mut metrics = GeomMetrics::default();
        metrics.begin();

        let (params, mut warnings) = inputs.params.sanitized();

        let attachments = metrics.time(TimingBucket::Attachments, || {
            resolve_attachments(&inputs.attachments)
        })?;
        warnings.extend(attachments.warnings.iter().cloned());

        let (positions, curve) = metrics.time(TimingBucket::Curve, || {
            let positions = compute_positions(&attachments, &params);
            build_muscle_curve(&positions).map(|curve| (positions, curve))
        })?;
        let live_length = curve_length(&curve);

        let rest_length = if params.calculate_volume {
            if let Some(rest) = self.rest_length {
                rest
            } else {
                let warning = format!(
                    "volume preservation enabled without a rest length; capturing {live_length}"
                );
                log::warn!("{warning}");
                warnings.push(warning);
                self.rest_length = Some(live_length);
                live_length
            }
        } else {
            self.rest_length = Some(live_length);
            live_length
        };

        let factor = if params.calculate_volume {
            volume_factor(rest_length, live_length).unwrap_or_else(|| {
                let warning = format!("muscle curve length {live_length} is not positive; volume factor 1");
                log::warn!("{warning}");
                warnings.push(warning);
                1.0
            })
        } else {
            1.0
        };

        let (rest, sections, frame_warnings) = metrics.time(TimingBucket::Sections, || {
            let rest = rest_dimensions(&attachments, &params);
            let (frames, frame_warnings) = section_frames(&attachments, &positions, &params);
            let sections = build_cross_sections(&positions, &frames, &rest.scaled(factor));
            (rest, sections, frame_warnings)
        });
        let degenerate_frame_count = frame_warnings.len();
        warnings.extend(frame_warnings);

        let surface = metrics.time(TimingBucket::Loft, || loft_muscle_surface(&sections, &curve))?;

        crate::debug_log!(
            "muscle evaluated: length={live_length:.4} rest={rest_length:.4} factor={factor:.4}"
        );

        Ok(MuscleEvaluation {
            params,
            attachments,
            positions,
            rest_dimensions: rest,
            sections,
            curve,
            curve_length: live_length,
            rest_length,
            surface,
            diagnostics: MuscleDiagnostics {
                volume_factor: factor,
                degenerate_frame_count,
                timing: metrics.end(),
                warnings,
            },
        })
    }

    /// Computes a single output.
    pub fn compute(
        &mut self,
        output: MuscleOutput,
        inputs: &MuscleInputs,
    ) -> Result<MuscleValue, MuscleError> {
        Ok(self.evaluate(inputs)?.value(output))
    }

    /// Resolves a host plug name through `schema` and computes it.
    ///
    /// Inputs and names the muscle does not produce come back as
    /// [`Evaluation::NotHandled`].
    pub fn compute_plug(
        &mut self,
        schema: &NodeSchema,
        plug: &str,
        inputs: &MuscleInputs,
    ) -> Result<Evaluation, MuscleError> {
        let Some(output) = schema
            .attribute(plug)
            .filter(|attr| attr.role != AttributeRole::Input)
            .and_then(|attr| MuscleOutput::from_name(attr.long_name))
        else {
            return Ok(Evaluation::NotHandled);
        };
        self.compute(output, inputs).map(Evaluation::Handled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::geom::PlaneSurface;
    use crate::muscle::attachment::SharedSurface;
    use crate::schema::MUSCLE_NODE;

    /// Attachments on two planes facing +Y, at z = 0 and z = `length`.
    fn inputs(length: f64, params: MuscleParams) -> MuscleInputs {
        let plane = |z: f64| -> SharedSurface {
            Arc::new(PlaneSurface::new(Point3::new(0.0, 0.0, z), Vec3::Z, Vec3::X))
        };
        let bottom = plane(0.0);
        let top = plane(length);
        MuscleInputs::new(
            [
                AttachmentInput::on_surface(bottom.clone(), 0.0, -1.0),
                AttachmentInput::on_surface(bottom, 0.0, 1.0),
                AttachmentInput::on_surface(top.clone(), 0.0, -1.0),
                AttachmentInput::on_surface(top, 0.0, 1.0),
            ],
            params,
        )
    }

    #[test]
    fn output_names_round_trip() {
        for output in MuscleOutput::ALL {
            assert_eq!(MuscleOutput::from_name(output.long_name()), Some(output));
            assert_eq!(MuscleOutput::from_name(output.short_name()), Some(output));
            assert!(MUSCLE_NODE.attribute(output.long_name()).is_some());
        }
        assert_eq!(MuscleOutput::from_name("restHeightO"), None);
    }

    #[test]
    fn straight_muscle_end_to_end() {
        let mut node = MuscleNode::new();
        let eval = node.evaluate(&inputs(10.0, MuscleParams::default())).expect("evaluates");

        assert!((eval.curve_length - 10.0).abs() < 1e-9);
        assert!((eval.rest_length - 10.0).abs() < 1e-9);
        assert_eq!(eval.positions.center, Point3::new(0.0, 0.0, 5.0));
        assert_eq!(eval.surface.control_points.len(), 44);
        assert_eq!(eval.heights(), [1.0; 4]);
        assert_eq!(eval.widths(), [1.0; 4]);
        assert!(eval.diagnostics.warnings.is_empty(), "{:?}", eval.diagnostics.warnings);
        assert_eq!(node.rest_length(), Some(eval.curve_length));
    }

    #[test]
    fn volume_preservation_freezes_rest_length() {
        let mut node = MuscleNode::new();
        node.evaluate(&inputs(10.0, MuscleParams::default())).expect("rest pose");

        let params = MuscleParams::default().with_volume(true);
        let stretched = node.evaluate(&inputs(40.0, params)).expect("stretched");

        assert!((stretched.rest_length - 10.0).abs() < 1e-9);
        assert!((stretched.diagnostics.volume_factor - 0.5).abs() < 1e-9);
        assert!((stretched.heights()[1] - 0.5).abs() < 1e-9);
        // End widths are half the 2.0 attachment distance, then scaled.
        assert!((stretched.widths()[0] - 0.5).abs() < 1e-9);
        assert_eq!(stretched.rest_dimensions.widths[0], 1.0);
    }

    #[test]
    fn volume_without_rest_pose_captures_once() {
        let mut node = MuscleNode::new();
        let params = MuscleParams::default().with_volume(true);
        let first = node.evaluate(&inputs(8.0, params)).expect("first");
        assert_eq!(first.diagnostics.warnings.len(), 1);
        assert!((first.diagnostics.volume_factor - 1.0).abs() < 1e-12);

        let second = node.evaluate(&inputs(2.0, params)).expect("second");
        assert!(second.diagnostics.warnings.is_empty());
        assert!((second.diagnostics.volume_factor - 2.0).abs() < 1e-9);
    }

    #[test]
    fn compute_plug_dispatches_by_name() {
        let mut node = MuscleNode::new();
        let inputs = inputs(10.0, MuscleParams::default().with_locks(true, false));

        let length = node.compute_plug(&MUSCLE_NODE, "mL", &inputs).expect("length");
        assert!(matches!(length, Evaluation::Handled(MuscleValue::Distance(l)) if (l - 10.0).abs() < 1e-9));

        let locks = node.compute_plug(&MUSCLE_NODE, "internalMuscleLocks", &inputs).expect("locks");
        assert_eq!(locks, Evaluation::Handled(MuscleValue::Ints(vec![1, 0])));

        let ups = node.compute(MuscleOutput::UpVectors, &inputs).expect("ups");
        assert!(matches!(ups, MuscleValue::Vectors(v) if v.len() == 12));

        assert_eq!(
            node.compute_plug(&MUSCLE_NODE, "restHeightO", &inputs),
            Ok(Evaluation::NotHandled)
        );
        assert_eq!(
            node.compute_plug(&MUSCLE_NODE, "bogus", &inputs),
            Ok(Evaluation::NotHandled)
        );
    }

    #[test]
    fn disconnected_attachment_still_evaluates() {
        let mut inputs = inputs(10.0, MuscleParams::default());
        inputs.attachments[3] = AttachmentInput::disconnected();

        let mut node = MuscleNode::new();
        let eval = node.evaluate(&inputs).expect("permissive");
        assert_eq!(eval.surface.control_points.len(), 44);
        assert!(!eval.diagnostics.warnings.is_empty());
    }
}
