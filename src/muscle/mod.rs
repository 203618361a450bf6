//! Procedural muscle surface built from four surface attachments.
//!
//! Evaluation order: attachments, positions, centerline curve, rest
//! dimensions and volume factor, section frames, lofted surface. Every
//! output is recomputed from scratch; only the rest length survives between
//! evaluations (see [`MuscleNode`]).

pub mod attachment;
pub mod curve;
pub mod loft;
pub mod node;
pub mod params;
pub mod positions;
pub mod sections;

pub use attachment::{
    ATTACHMENT_COUNT, AttachmentError, AttachmentInput, ResolvedAttachment, ResolvedAttachments,
    SharedSurface, UpSelector, resolve_attachment, resolve_attachments,
};
pub use curve::{MUSCLE_CURVE_DEGREE, MUSCLE_CURVE_HOST_KNOTS, build_muscle_curve};
pub use loft::{RING_CV_COUNT, RING_HOST_KNOTS, RING_TEMPLATE, loft_muscle_surface, transform_ring};
pub use node::{
    Evaluation, MuscleDiagnostics, MuscleEvaluation, MuscleInputs, MuscleNode, MuscleOutput,
    MuscleValue,
};
pub use params::MuscleParams;
pub use positions::{MusclePositions, OffsetFrame, compute_positions};
pub use sections::{
    CrossSection, Frame, SectionDimensions, SectionKind, build_cross_sections, rest_dimensions,
    section_frames, volume_factor,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MuscleError {
    #[error("attachment {index}: up selector {value} is not 0 (normal), 1 (tangentU) or 2 (tangentV)")]
    InvalidUpSelector { index: usize, value: i32 },
    #[error(transparent)]
    Attachment(#[from] AttachmentError),
    #[error("muscle curve: {0}")]
    Curve(String),
    #[error("muscle surface: {0}")]
    Surface(String),
}

/// Decodes a host `connectionUp` integer for attachment `index`.
pub fn decode_up_selector(index: usize, value: i32) -> Result<UpSelector, MuscleError> {
    UpSelector::from_index(value).ok_or(MuscleError::InvalidUpSelector { index, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_selector_decoding() {
        assert_eq!(decode_up_selector(0, 2), Ok(UpSelector::TangentV));
        let err = decode_up_selector(3, 7).unwrap_err();
        assert_eq!(err, MuscleError::InvalidUpSelector { index: 3, value: 7 });
        assert!(err.to_string().contains("attachment 3"));
    }
}
