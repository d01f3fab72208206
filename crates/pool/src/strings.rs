//! String interning
//!
//! Append-only byte arena plus an open-addressing hash table keyed by string
//! content. Duplicate strings yield identical ids; ids never move. The table
//! uses double hashing on the collision chain and stays on the intern hot
//! path, which is why it is hand-rolled rather than a generic map.

use crate::id::StrId;
use solvent_errors::{Error, PoolError};
use xxhash_rust::xxh3::xxh3_64;

/// Start value for the double-hash chain increment
const HASHCHAIN_START: u64 = 7;

/// Interning beyond this many strings exhausts the id space
const STRID_LIMIT: u32 = 0x7fff_ffff;

#[derive(Debug, Clone)]
pub struct StringPool {
    /// Concatenated NUL-terminated string bytes
    space: Vec<u8>,
    /// Per-id offset into `space`
    offsets: Vec<u32>,
    /// Open-addressing table of string ids; 0 = free slot
    table: Vec<u32>,
    mask: u64,
}

impl StringPool {
    /// Create a pool holding the reserved strings, in id order
    #[must_use]
    pub fn with_reserved(reserved: &[&str]) -> Self {
        let mut pool = Self {
            space: Vec::with_capacity(64 * 1024),
            offsets: Vec::new(),
            table: Vec::new(),
            mask: 0,
        };
        // id 0 is the null sentinel, id 1 the empty string
        pool.append("<NULL>");
        pool.append("");
        for s in reserved {
            pool.append(s);
        }
        pool.rehash(pool.offsets.len() * 2);
        pool
    }

    /// Number of interned strings (the next id to be handed out)
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false // ids 0 and 1 always exist
    }

    /// Look up the bytes of an interned string
    ///
    /// # Panics
    ///
    /// Panics if `id` was not handed out by this pool.
    #[must_use]
    pub fn resolve(&self, id: StrId) -> &str {
        let start = self.offsets[id.index()] as usize;
        let end = start
            + self.space[start..]
                .iter()
                .position(|&b| b == 0)
                .unwrap_or(0);
        // the arena only ever receives &str bytes
        std::str::from_utf8(&self.space[start..end]).unwrap_or("")
    }

    /// Find an already-interned string without creating it
    #[must_use]
    pub fn find(&self, s: &str) -> Option<StrId> {
        if s.is_empty() {
            return Some(StrId::EMPTY);
        }
        let mut h = xxh3_64(s.as_bytes()) & self.mask;
        let mut hh = HASHCHAIN_START;
        loop {
            let id = self.table[h as usize];
            if id == 0 {
                return None;
            }
            if self.entry_matches(id, s) {
                return Some(StrId(id));
            }
            h = (h + hh) & self.mask;
            hh += 1;
        }
    }

    /// Intern a string, returning its stable id
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InternLimit`] once the 31-bit id space is
    /// exhausted.
    pub fn intern(&mut self, s: &str) -> Result<StrId, Error> {
        if s.is_empty() {
            return Ok(StrId::EMPTY);
        }
        if self.offsets.len() * 2 > self.mask as usize {
            self.rehash(self.offsets.len() * 2);
        }
        let mut h = xxh3_64(s.as_bytes()) & self.mask;
        let mut hh = HASHCHAIN_START;
        loop {
            let id = self.table[h as usize];
            if id == 0 {
                break;
            }
            if self.entry_matches(id, s) {
                return Ok(StrId(id));
            }
            h = (h + hh) & self.mask;
            hh += 1;
        }
        if self.offsets.len() as u32 >= STRID_LIMIT {
            return Err(PoolError::InternLimit { limit: STRID_LIMIT }.into());
        }
        let id = self.append(s);
        self.table[h as usize] = id.0;
        Ok(id)
    }

    fn entry_matches(&self, id: u32, s: &str) -> bool {
        let start = self.offsets[id as usize] as usize;
        let bytes = s.as_bytes();
        self.space.len() >= start + bytes.len() + 1
            && &self.space[start..start + bytes.len()] == bytes
            && self.space[start + bytes.len()] == 0
    }

    fn append(&mut self, s: &str) -> StrId {
        let id = StrId(u32::try_from(self.offsets.len()).unwrap_or(u32::MAX));
        self.offsets
            .push(u32::try_from(self.space.len()).unwrap_or(u32::MAX));
        self.space.extend_from_slice(s.as_bytes());
        self.space.push(0);
        id
    }

    /// Rebuild the hash table for at least `want` live entries
    fn rehash(&mut self, want: usize) {
        let size = (want.max(16) * 2).next_power_of_two();
        self.mask = (size - 1) as u64;
        self.table = vec![0; size];
        // ids 0 and 1 are found without the table
        for id in 2..self.offsets.len() {
            let s = {
                let start = self.offsets[id] as usize;
                let end = start + self.space[start..].iter().position(|&b| b == 0).unwrap_or(0);
                &self.space[start..end]
            };
            let mut h = xxh3_64(s) & self.mask;
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
    use proptest::prelude::*;

    fn pool() -> StringPool {
        StringPool::with_reserved(&[])
    }

    #[test]
    fn empty_string_is_reserved() {
        let mut p = pool();
        assert_eq!(p.intern("").unwrap(), StrId::EMPTY);
        assert_eq!(p.resolve(StrId::EMPTY), "");
    }

    #[test]
    fn interning_is_idempotent() {
        let mut p = pool();
        let a = p.intern("libfoo").unwrap();
        let b = p.intern("libfoo").unwrap();
        assert_eq!(a, b);
        assert_eq!(p.resolve(a), "libfoo");
    }

    #[test]
    fn distinct_strings_get_distinct_ids() {
        let mut p = pool();
        let a = p.intern("a").unwrap();
        let b = p.intern("b").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn find_does_not_create() {
        let mut p = pool();
        assert_eq!(p.find("ghost"), None);
        let id = p.intern("ghost").unwrap();
        assert_eq!(p.find("ghost"), Some(id));
    }

    #[test]
    fn survives_rehash() {
        let mut p = pool();
        let ids: Vec<_> = (0..1000)
            .map(|i| p.intern(&format!("pkg-{i}")).unwrap())
            .collect();
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(p.resolve(*id), format!("pkg-{i}"));
            assert_eq!(p.find(&format!("pkg-{i}")), Some(*id));
        }
    }

    proptest! {
        #[test]
        fn intern_is_injective(a in "[a-zA-Z0-9._/-]{0,24}", b in "[a-zA-Z0-9._/-]{0,24}") {
            let mut p = pool();
            let ia = p.intern(&a).unwrap();
            let ib = p.intern(&b).unwrap();
            prop_assert_eq!(ia == ib, a == b);
            prop_assert_eq!(p.resolve(ia), a.as_str());
            prop_assert_eq!(p.resolve(ib), b.as_str());
        }
    }
}
