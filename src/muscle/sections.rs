use crate::geom::{Point3, Tolerance, Vec3};

use super::attachment::ResolvedAttachments;
use super::params::MuscleParams;
use super::positions::MusclePositions;

// ====================================================================
// Cross sections
// ====================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    OriginMid = 0,
    OriginVolume = 1,
    InsertionVolume = 2,
    InsertionMid = 3,
}

impl SectionKind {
    pub const ALL: [Self; 4] = [
        Self::OriginMid,
        Self::OriginVolume,
        Self::InsertionVolume,
        Self::InsertionMid,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub const fn is_origin_side(self) -> bool {
        matches!(self, Self::OriginMid | Self::OriginVolume)
    }

    #[must_use]
    pub const fn is_end(self) -> bool {
        matches!(self, Self::OriginMid | Self::InsertionMid)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OriginMid => "origin",
            Self::OriginVolume => "originVolume",
            Self::InsertionVolume => "insertionVolume",
            Self::InsertionMid => "insertion",
        }
    }
}

/// Orientation of a template ring. Ring X scales along `a`, ring Z along `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Frame {
    pub const ZERO: Self = Self {
        a: Vec3::ZERO,
        b: Vec3::ZERO,
        c: Vec3::ZERO,
    };

    /// Largest deviation from unit length or from mutual orthogonality.
    #[must_use]
    pub fn orthonormality_error(&self) -> f64 {
        let lengths = [self.a, self.b, self.c].map(|v| (v.length() - 1.0).abs());
        let dots = [self.a.dot(self.b), self.b.dot(self.c), self.c.dot(self.a)].map(f64::abs);
        lengths.into_iter().chain(dots).fold(0.0, f64::max)
    }

    #[must_use]
    pub fn is_orthonormal(&self, tol: Tolerance) -> bool {
        self.orthonormality_error() <= tol.eps
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossSection {
    pub kind: SectionKind,
    pub position: Point3,
    pub height: f64,
    pub width: f64,
    pub frame: Frame,
}

// ====================================================================
// Dimensions and volume
// ====================================================================

/// Per-section `(height, width)`, indexed by [`SectionKind::index`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SectionDimensions {
    pub heights: [f64; 4],
    pub widths: [f64; 4],
}

impl SectionDimensions {
    #[must_use]
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            heights: self.heights.map(|h| h * factor),
            widths: self.widths.map(|w| w * factor),
        }
    }
}

/// Heights come from the rest knobs. End widths are half the distance
/// between the two attachments of that end.
#[must_use]
pub fn rest_dimensions(attachments: &ResolvedAttachments, params: &MuscleParams) -> SectionDimensions {
    let [e0, e1, e2, e3] = attachments.positions();
    SectionDimensions {
        heights: params.rest_heights,
        widths: [
            e0.distance_to(e1) / 2.0,
            params.rest_widths[0],
            params.rest_widths[1],
            e2.distance_to(e3) / 2.0,
        ],
    }
}

/// `sqrt(rest / live)`; `None` when the live length cannot divide.
#[must_use]
pub fn volume_factor(rest_length: f64, curve_length: f64) -> Option<f64> {
    if !(curve_length.is_finite() && curve_length > 0.0) || !rest_length.is_finite() {
        return None;
    }
    Some((rest_length.max(0.0) / curve_length).sqrt())
}

// ====================================================================
// Frames
// ====================================================================

/// Builds the four section frames and reports sections whose frame
/// collapsed (zero up vectors or coincident attachments).
#[must_use]
pub fn section_frames(
    attachments: &ResolvedAttachments,
    positions: &MusclePositions,
    params: &MuscleParams,
) -> ([Frame; 4], Vec<String>) {
    let e = attachments.positions();
    let ups = attachments.selected_ups();
    let points = positions.section_points();

    let mut frames = [Frame::ZERO; 4];
    let mut warnings = Vec::new();

    for kind in SectionKind::ALL {
        let (ea, eb, up_a, up_b) = if kind.is_origin_side() {
            (e[0], e[1], ups[0], ups[1])
        } else {
            (e[2], e[3], ups[2], ups[3])
        };

        let up = (up_a + up_b).normalize_or_zero();
        let span = eb.sub_point(ea).normalize_or_zero();
        // The insertion end cap writes this as -(span x up); same vector.
        let out = up.cross(span).normalize_or_zero();

        let symmetrized = |x: Point3| ((out + x.sub_point(ea)) + (out + x.sub_point(eb))) / 2.0;
        let straight = points[0].sub_point(points[3]);

        let c = match kind {
            SectionKind::OriginMid => symmetrized(points[0]),
            SectionKind::InsertionMid => symmetrized(points[3]),
            SectionKind::OriginVolume if params.origin_lock => symmetrized(points[0]),
            SectionKind::InsertionVolume if params.insertion_lock => symmetrized(points[3]),
            SectionKind::OriginVolume | SectionKind::InsertionVolume => straight,
        };

        let c = c.normalize_or_zero();
        let a = span.cross(c).normalize_or_zero();
        let b = c.cross(a).normalize_or_zero();
        let frame = Frame { a, b, c };

        if !frame.is_orthonormal(Tolerance::LOOSE) {
            let warning = format!("{} cross-section frame is degenerate", kind.name());
            log::warn!("{warning}");
            warnings.push(warning);
        }
        frames[kind.index()] = frame;
    }

    (frames, warnings)
}

#[must_use]
pub fn build_cross_sections(
    positions: &MusclePositions,
    frames: &[Frame; 4],
    dimensions: &SectionDimensions,
) -> [CrossSection; 4] {
    let points = positions.section_points();
    SectionKind::ALL.map(|kind| {
        let i = kind.index();
        CrossSection {
            kind,
            position: points[i],
            height: dimensions.heights[i],
            width: dimensions.widths[i],
            frame: frames[i],
        }
    })
}
