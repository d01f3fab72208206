//! Relation interning
//!
//! A relation is a structured dependency expression `(name, evr, flags)`.
//! Both operands are dependency positions themselves, so boolean operators
//! nest. Interning is keyed on the full triple; relation ids never move and
//! never reference an id greater than their own.

use crate::id::{Dep, RelId};
use solvent_errors::{Error, PoolError};
use xxhash_rust::xxh3::xxh3_64;

/// Comparator bit: strictly less
pub const REL_LT: u8 = 1;
/// Comparator bit: equal
pub const REL_EQ: u8 = 2;
/// Comparator bit: strictly greater
pub const REL_GT: u8 = 4;

pub const REL_AND: u8 = 16;
pub const REL_OR: u8 = 17;
pub const REL_WITH: u8 = 18;
pub const REL_WITHOUT: u8 = 19;
pub const REL_COND: u8 = 20;
pub const REL_UNLESS: u8 = 21;
pub const REL_ELSE: u8 = 22;
pub const REL_COMPAT: u8 = 23;
pub const REL_KIND: u8 = 24;
pub const REL_MULTIARCH: u8 = 25;
pub const REL_FILECONFLICT: u8 = 26;
pub const REL_ARCH: u8 = 27;
pub const REL_NAMESPACE: u8 = 28;
pub const REL_CONDA: u8 = 29;

/// True for comparator relations (`<`, `<=`, `=`, `>=`, `>`, `<>`)
#[must_use]
pub const fn is_comparator(flags: u8) -> bool {
    flags != 0 && flags < 8
}

/// A versioned relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rel {
    pub name: Dep,
    pub evr: Dep,
    pub flags: u8,
}

const HASHCHAIN_START: u64 = 7;
const RELID_LIMIT: u32 = 0x7fff_ffff;

#[derive(Debug, Clone)]
pub struct RelPool {
    rels: Vec<Rel>,
    table: Vec<u32>,
    mask: u64,
}

impl Default for RelPool {
    fn default() -> Self {
        Self::new()
    }
}

impl RelPool {
    #[must_use]
    pub fn new() -> Self {
        let mut pool = Self {
            // rel id 0 is a null sentinel so valid ids start at 1
            rels: vec![Rel {
                name: Dep::NULL,
                evr: Dep::NULL,
                flags: 0,
            }],
            table: Vec::new(),
            mask: 0,
        };
        pool.rehash(16);
        pool
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rels.len() <= 1
    }

    /// Look up an interned relation
    ///
    /// # Panics
    ///
    /// Panics if `id` was not handed out by this pool.
    #[must_use]
    pub fn resolve(&self, id: RelId) -> Rel {
        self.rels[id.index()]
    }

    /// Intern a relation, returning the packed dependency
    ///
    /// `(name, NULL, 0)` collapses to the plain name without creating a
    /// relation.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InternLimit`] once the relation id space is
    /// exhausted.
    pub fn intern(&mut self, name: Dep, evr: Dep, flags: u8) -> Result<Dep, Error> {
        if evr.is_null() && flags == 0 {
            return Ok(name);
        }
        let rel = Rel { name, evr, flags };
        if self.rels.len() * 2 > self.mask as usize {
            self.rehash(self.rels.len() * 2);
        }
        let mut h = Self::hash(&rel) & self.mask;
        let mut hh = HASHCHAIN_START;
        loop {
            let id = self.table[h as usize];
            if id == 0 {
                break;
            }
            if self.rels[id as usize] == rel {
                return Ok(Dep::from_rel_id(RelId(id)));
            }
            h = (h + hh) & self.mask;
            hh += 1;
        }
        if self.rels.len() as u32 >= RELID_LIMIT {
            return Err(PoolError::InternLimit { limit: RELID_LIMIT }.into());
        }
        let id = u32::try_from(self.rels.len()).unwrap_or(u32::MAX);
        self.rels.push(rel);
        self.table[h as usize] = id;
        Ok(Dep::from_rel_id(RelId(id)))
    }

    fn hash(rel: &Rel) -> u64 {
        let mut key = [0u8; 9];
        key[0..4].copy_from_slice(&rel.name.raw().to_le_bytes());
        key[4..8].copy_from_slice(&rel.evr.raw().to_le_bytes());
        key[8] = rel.flags;
        xxh3_64(&key)
    }

    fn rehash(&mut self, want: usize) {
        let size = (want.max(16) * 2).next_power_of_two();
        self.mask = (size - 1) as u64;
        self.table = vec![0; size];
        for id in 1..self.rels.len() {
            let mut h = Self::hash(&self.rels[id]) & self.mask;
            let mut hh = HASHCHAIN_START;
            while self.table[h as usize] != 0 {
                h = (h + hh) & self.mask;
                hh += 1;
            }
            self.table[h as usize] = u32::try_from(id).unwrap_or(u32::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::StrId;

    #[test]
    fn plain_name_is_not_interned() {
        let mut p = RelPool::new();
        let name = Dep::from_str_id(StrId(5));
        assert_eq!(p.intern(name, Dep::NULL, 0).unwrap(), name);
        assert!(p.is_empty());
    }

    #[test]
    fn interning_is_idempotent() {
        let mut p = RelPool::new();
        let name = Dep::from_str_id(StrId(5));
        let evr = Dep::from_str_id(StrId(9));
        let a = p.intern(name, evr, REL_EQ).unwrap();
        let b = p.intern(name, evr, REL_EQ).unwrap();
        assert_eq!(a, b);
        assert!(a.is_rel());
        let rel = p.resolve(a.as_rel_id().unwrap());
        assert_eq!(rel.name, name);
        assert_eq!(rel.evr, evr);
        assert_eq!(rel.flags, REL_EQ);
    }

    #[test]
    fn distinct_flags_distinct_rels() {
        let mut p = RelPool::new();
        let name = Dep::from_str_id(StrId(5));
        let evr = Dep::from_str_id(StrId(9));
        let eq = p.intern(name, evr, REL_EQ).unwrap();
        let ge = p.intern(name, evr, REL_EQ | REL_GT).unwrap();
        assert_ne!(eq, ge);
    }

    #[test]
    fn nested_relations() {
        let mut p = RelPool::new();
        let a = Dep::from_str_id(StrId(5));
        let b = Dep::from_str_id(StrId(6));
        let and = p.intern(a, b, REL_AND).unwrap();
        let or = p.intern(and, b, REL_OR).unwrap();
        let outer = p.resolve(or.as_rel_id().unwrap());
        assert_eq!(outer.name, and);
    }
}
