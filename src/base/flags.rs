//! Three-valued container flags.
//!
//! Every node carries a [`FlagSet`] where each flag is `Some(true)`,
//! `Some(false)`, or `None` (inherit from parent). Resolution walks to the
//! nearest ancestor with a definite value; the root defaults to `false`.

/// A node flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Rejects any mutation on the subtree.
    Readonly,
    /// Forbids adding or removing keys on map containers.
    Struct,
}

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Readonly => "readonly",
            Self::Struct => "struct",
        }
    }
}

/// Per-node flag storage with inherit-from-parent semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagSet {
    readonly: Option<bool>,
    struct_mode: Option<bool>,
}

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The locally-set value of a flag, `None` meaning inherit.
    pub fn get(&self, flag: Flag) -> Option<bool> {
        match flag {
            Flag::Readonly => self.readonly,
            Flag::Struct => self.struct_mode,
        }
    }

    /// Set or clear (with `None`) a flag locally.
    pub fn set(&mut self, flag: Flag, value: Option<bool>) {
        match flag {
            Flag::Readonly => self.readonly = value,
            Flag::Struct => self.struct_mode = value,
        }
    }
}
