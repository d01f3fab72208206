//! Dense integer handles into the pool
//!
//! Every interned string, relation, and package is addressed by a small
//! integer. Dependency positions store the packed `Dep` form where the high
//! bit distinguishes relation ids from string ids; the unpacked enum is used
//! everywhere outside the flat storage arrays.

use serde::{Deserialize, Serialize};
use std::fmt;

/// High bit tagging a packed dependency as a relation id
pub const REL_TAG: u32 = 0x8000_0000;

/// Interned string handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrId(pub u32);

impl StrId {
    /// The null string (id 0)
    pub const NULL: Self = Self(0);
    /// The empty string (id 1)
    pub const EMPTY: Self = Self(1);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Interned relation handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelId(pub u32);

impl RelId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Package (solvable) handle; index into the pool's solvable vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SolvId(pub u32);

impl SolvId {
    /// The null solvable (id 0, never a real package)
    pub const NULL: Self = Self(0);
    /// The distinguished system solvable
    pub const SYSTEM: Self = Self(1);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for SolvId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Repository handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoId(pub u32);

impl RepoId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Opaque offset into a flat, zero-terminated id list
///
/// Offsets index either a repo's dependency array or the pool's shared
/// providers array. `0` means "unset"; `1` is the canonical empty list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Offset(pub u32);

impl Offset {
    /// Not computed / not present
    pub const UNSET: Self = Self(0);
    /// The canonical empty list
    pub const EMPTY: Self = Self(1);
    /// The canonical one-element list holding the system solvable
    pub const SYSTEM: Self = Self(2);

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_unset(self) -> bool {
        self.0 == 0
    }
}

/// A dependency position: either a plain name or a relation, packed to 32
/// bits for the flat storage arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Dep(u32);

/// Unpacked form of a [`Dep`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepKind {
    Str(StrId),
    Rel(RelId),
}

impl Dep {
    /// The null dependency, used as the list terminator
    pub const NULL: Self = Self(0);

    #[must_use]
    pub const fn from_str_id(id: StrId) -> Self {
        Self(id.0)
    }

    #[must_use]
    pub const fn from_rel_id(id: RelId) -> Self {
        Self(id.0 | REL_TAG)
    }

    /// Reconstruct from the packed storage form
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The packed storage form
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn is_rel(self) -> bool {
        self.0 & REL_TAG != 0
    }

    #[must_use]
    pub const fn kind(self) -> DepKind {
        if self.is_rel() {
            DepKind::Rel(RelId(self.0 & !REL_TAG))
        } else {
            DepKind::Str(StrId(self.0))
        }
    }

    /// The string id, if this is a plain name
    #[must_use]
    pub const fn as_str_id(self) -> Option<StrId> {
        if self.is_rel() {
            None
        } else {
            Some(StrId(self.0))
        }
    }

    /// The relation id, if this is a relation
    #[must_use]
    pub const fn as_rel_id(self) -> Option<RelId> {
        if self.is_rel() {
            Some(RelId(self.0 & !REL_TAG))
        } else {
            None
        }
    }
}

impl From<StrId> for Dep {
    fn from(id: StrId) -> Self {
        Self::from_str_id(id)
    }
}

impl From<RelId> for Dep {
    fn from(id: RelId) -> Self {
        Self::from_rel_id(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dep_packing_round_trips() {
        let s = Dep::from_str_id(StrId(42));
        assert!(!s.is_rel());
        assert_eq!(s.kind(), DepKind::Str(StrId(42)));
        assert_eq!(Dep::from_raw(s.raw()), s);

        let r = Dep::from_rel_id(RelId(7));
        assert!(r.is_rel());
        assert_eq!(r.kind(), DepKind::Rel(RelId(7)));
        assert_eq!(Dep::from_raw(r.raw()), r);
    }

    #[test]
    fn null_dep_is_str_null() {
        assert!(Dep::NULL.is_null());
        assert_eq!(Dep::NULL.as_str_id(), Some(StrId::NULL));
    }
}
