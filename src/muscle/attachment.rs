//! Resolves the four surface attachments into world-space frames.

use std::fmt;
use std::sync::Arc;

use crate::geom::{Point3, Surface, Transform, Vec3};

pub const ATTACHMENT_COUNT: usize = 4;

/// Surfaces are shared between attachments and across evaluations.
pub type SharedSurface = Arc<dyn Surface + Send + Sync>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AttachmentError {
    #[error("attachment {index}: surface normal or tangents are zero-length")]
    DegenerateSurface { index: usize },
    #[error("attachment {index}: parameter ({u}, {v}) is not finite")]
    InvalidParameter { index: usize, u: f64, v: f64 },
}

/// Which surface vector the cross-section frames use as "up".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UpSelector {
    #[default]
    Normal = 0,
    TangentU = 1,
    TangentV = 2,
}

impl UpSelector {
    #[must_use]
    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Normal),
            1 => Some(Self::TangentU),
            2 => Some(Self::TangentV),
            _ => None,
        }
    }

    #[must_use]
    pub const fn index(self) -> i32 {
        self as i32
    }
}

/// One `connectionPt` element: a surface reference plus sampling parameters.
#[derive(Clone, Default)]
pub struct AttachmentInput {
    /// `None` models a disconnected plug.
    pub surface: Option<SharedSurface>,
    pub u: f64,
    pub v: f64,
    pub up_selector: UpSelector,
    pub flip: bool,
    /// Object-to-world matrix of the surface.
    pub transform: Transform,
}

impl fmt::Debug for AttachmentInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentInput")
            .field("connected", &self.surface.is_some())
            .field("u", &self.u)
            .field("v", &self.v)
            .field("up_selector", &self.up_selector)
            .field("flip", &self.flip)
            .field("transform", &self.transform)
            .finish()
    }
}

impl AttachmentInput {
    #[must_use]
    pub fn on_surface(surface: SharedSurface, u: f64, v: f64) -> Self {
        Self {
            surface: Some(surface),
            u,
            v,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_up_selector(mut self, up_selector: UpSelector) -> Self {
        self.up_selector = up_selector;
        self
    }

    #[must_use]
    pub fn with_flip(mut self, flip: bool) -> Self {
        self.flip = flip;
        self
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.surface.is_some()
    }
}

/// World-space sample of one attachment. Vectors are unit length, or zero
/// when the attachment is disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolvedAttachment {
    pub position: Point3,
    pub normal: Vec3,
    pub tangent_u: Vec3,
    pub tangent_v: Vec3,
    pub up_selector: UpSelector,
    pub connected: bool,
}

impl ResolvedAttachment {
    #[must_use]
    pub fn up_vector(&self) -> Vec3 {
        match self.up_selector {
            UpSelector::Normal => self.normal,
            UpSelector::TangentU => self.tangent_u,
            UpSelector::TangentV => self.tangent_v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedAttachments {
    pub attachments: [ResolvedAttachment; ATTACHMENT_COUNT],
    pub warnings: Vec<String>,
}

impl ResolvedAttachments {
    #[must_use]
    pub fn positions(&self) -> [Point3; ATTACHMENT_COUNT] {
        self.attachments.map(|a| a.position)
    }

    #[must_use]
    pub fn normals(&self) -> [Vec3; ATTACHMENT_COUNT] {
        self.attachments.map(|a| a.normal)
    }

    #[must_use]
    pub fn up_selectors(&self) -> [UpSelector; ATTACHMENT_COUNT] {
        self.attachments.map(|a| a.up_selector)
    }

    /// Up vector picked by each attachment's selector.
    #[must_use]
    pub fn selected_ups(&self) -> [Vec3; ATTACHMENT_COUNT] {
        self.attachments.map(|a| a.up_vector())
    }

    /// Normals, then U tangents, then V tangents: `selector * 4 + index`.
    #[must_use]
    pub fn up_vectors(&self) -> [Vec3; 3 * ATTACHMENT_COUNT] {
        let mut vectors = [Vec3::ZERO; 3 * ATTACHMENT_COUNT];
        for (i, a) in self.attachments.iter().enumerate() {
            vectors[i] = a.normal;
            vectors[ATTACHMENT_COUNT + i] = a.tangent_u;
            vectors[2 * ATTACHMENT_COUNT + i] = a.tangent_v;
        }
        vectors
    }

    #[must_use]
    pub fn all_connected(&self) -> bool {
        self.attachments.iter().all(|a| a.connected)
    }
}

/// Samples one attachment in world space, applying the flip to every vector.
pub fn resolve_attachment(
    index: usize,
    input: &AttachmentInput,
) -> Result<ResolvedAttachment, AttachmentError> {
    let Some(surface) = input.surface.as_ref() else {
        return Ok(ResolvedAttachment {
            up_selector: input.up_selector,
            ..ResolvedAttachment::default()
        });
    };

    let (u, v) = (input.u, input.v);
    if !u.is_finite() || !v.is_finite() {
        return Err(AttachmentError::InvalidParameter { index, u, v });
    }

    let local = surface.point_at(u, v);
    let (du, dv) = surface.tangents_at(u, v);
    let normal = surface
        .normal_at(u, v)
        .ok_or(AttachmentError::DegenerateSurface { index })?;

    let position = input.transform.apply_point(local);
    if !position.is_finite() {
        return Err(AttachmentError::DegenerateSurface { index });
    }

    let sign = if input.flip { -1.0 } else { 1.0 };
    let unit = |vector: Vec3| {
        (vector * sign)
            .normalized()
            .ok_or(AttachmentError::DegenerateSurface { index })
    };

    Ok(ResolvedAttachment {
        position,
        normal: unit(input.transform.apply_normal(normal))?,
        tangent_u: unit(input.transform.apply_vec(du))?,
        tangent_v: unit(input.transform.apply_vec(dv))?,
        up_selector: input.up_selector,
        connected: true,
    })
}

/// Resolves all four attachments.
///
/// Disconnected attachments resolve to the origin with zero vectors and a
/// warning; the rest of the evaluation keeps running on that data.
pub fn resolve_attachments(
    inputs: &[AttachmentInput; ATTACHMENT_COUNT],
) -> Result<ResolvedAttachments, AttachmentError> {
    let mut resolved = ResolvedAttachments::default();
    for (index, input) in inputs.iter().enumerate() {
        if !input.is_connected() {
            let warning = format!("attachment {index} is disconnected; using zero vectors");
            log::warn!("{warning}");
            resolved.warnings.push(warning);
        }
        resolved.attachments[index] = resolve_attachment(index, input)?;
    }
    Ok(resolved)
}
