//! Runtime enumeration descriptors.
//!
//! Configuration enums are declared at runtime as an ordered member list.
//! Members can be looked up by name, by qualified name (`Class.MEMBER`), or
//! by ordinal.

use std::sync::Arc;

use smol_str::SmolStr;

/// A declared enumeration type: a name plus an ordered list of members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumClass {
    name: SmolStr,
    members: Vec<SmolStr>,
}

impl EnumClass {
    pub fn new(name: impl Into<SmolStr>, members: impl IntoIterator<Item = impl Into<SmolStr>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            members: members.into_iter().map(Into::into).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|m| m.as_str())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Look up a member by bare name or qualified `Class.MEMBER` name.
    pub fn member_by_name(self: &Arc<Self>, name: &str) -> Option<EnumMember> {
        let bare = match name.split_once('.') {
            Some((class, member)) if class == self.name => member,
            Some(_) => return None,
            None => name,
        };
        let ordinal = self.members.iter().position(|m| m == bare)?;
        Some(EnumMember {
            class: Arc::clone(self),
            ordinal,
        })
    }

    /// Look up a member by ordinal.
    pub fn member_by_ordinal(self: &Arc<Self>, ordinal: usize) -> Option<EnumMember> {
        if ordinal < self.members.len() {
            Some(EnumMember {
                class: Arc::clone(self),
                ordinal,
            })
        } else {
            None
        }
    }
}

/// A member of an [`EnumClass`].
#[derive(Debug, Clone)]
pub struct EnumMember {
    class: Arc<EnumClass>,
    ordinal: usize,
}

impl EnumMember {
    pub fn class(&self) -> &Arc<EnumClass> {
        &self.class
    }

    pub fn name(&self) -> &str {
        &self.class.members[self.ordinal]
    }

    /// The `Class.MEMBER` form.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.class.name, self.name())
    }

    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

impl PartialEq for EnumMember {
    fn eq(&self, other: &Self) -> bool {
        self.class.name == other.class.name && self.ordinal == other.ordinal
    }
}

impl std::fmt::Display for EnumMember {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
