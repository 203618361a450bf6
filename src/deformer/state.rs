/// Binding phase of a vertex snap deformer, persisted as the host's
/// `initialize` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindState {
    #[default]
    Unbound = 0,
    /// One-shot: consumed by the next deform call.
    Rebinding = 1,
    Bound = 2,
}

impl BindState {
    pub const ALL: [Self; 3] = [Self::Unbound, Self::Rebinding, Self::Bound];

    #[must_use]
    pub const fn from_index(index: i32) -> Option<Self> {
        match index {
            0 => Some(Self::Unbound),
            1 => Some(Self::Rebinding),
            2 => Some(Self::Bound),
            _ => None,
        }
    }

    #[must_use]
    pub const fn index(self) -> i32 {
        self as i32
    }

    /// Label shown in the host's enum field.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unbound => "Off",
            Self::Rebinding => "Re-Set Bind",
            Self::Bound => "Bound",
        }
    }

    /// True when the next deform call has to build the map first.
    #[must_use]
    pub const fn needs_bind(self) -> bool {
        !matches!(self, Self::Bound)
    }
}
