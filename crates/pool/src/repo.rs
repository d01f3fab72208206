//! Repositories
//!
//! A repo owns a contiguous `[start, end)` range of the pool's solvable
//! vector and the flat id array backing those solvables' dependency lists.
//! Lists are zero-terminated; a marker dependency may split a list into
//! semantically distinct sublists (ordinary requires before the marker,
//! pre-requires after it).

use crate::id::{Dep, Offset, RepoId, SolvId};

#[derive(Debug, Clone)]
pub struct Repo {
    pub id: RepoId,
    pub name: String,
    /// Higher priority wins during candidate pruning
    pub priority: i32,
    pub subpriority: i32,
    pub disabled: bool,
    /// First solvable id owned by this repo
    pub start: u32,
    /// One past the last solvable id owned by this repo
    pub end: u32,
    /// Flat storage for dependency lists; slot 0 is reserved so offset 0
    /// means "unset"
    idarray: Vec<u32>,
}

impl Repo {
    #[must_use]
    pub fn new(id: RepoId, name: String, first_solvable: u32) -> Self {
        Self {
            id,
            name,
            priority: 0,
            subpriority: 0,
            disabled: false,
            start: first_solvable,
            end: first_solvable,
            idarray: vec![0],
        }
    }

    /// Number of solvables owned by this repo
    #[must_use]
    pub fn len(&self) -> usize {
        (self.end - self.start) as usize
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Iterate this repo's solvable ids
    pub fn solvables(&self) -> impl Iterator<Item = SolvId> {
        (self.start..self.end).map(SolvId)
    }

    #[must_use]
    pub fn contains(&self, p: SolvId) -> bool {
        p.0 >= self.start && p.0 < self.end
    }

    /// Store a dependency list, eliminating duplicates while preserving
    /// first-seen order. Returns the unset offset for an empty list.
    pub fn add_dep_list(&mut self, deps: &[Dep]) -> Offset {
        if deps.is_empty() {
            return Offset::UNSET;
        }
        let off = u32::try_from(self.idarray.len()).unwrap_or(u32::MAX);
        let before = self.idarray.len();
        for &dep in deps {
            let raw = dep.raw();
            if !self.idarray[before..].contains(&raw) {
                self.idarray.push(raw);
            }
        }
        self.idarray.push(0);
        Offset(off)
    }

    /// Store a two-part dependency list separated by `marker`
    /// (e.g. ordinary requires, then pre-requires). The marker is omitted
    /// when the second part is empty.
    pub fn add_dep_list_with_marker(&mut self, head: &[Dep], marker: Dep, tail: &[Dep]) -> Offset {
        if tail.is_empty() {
            return self.add_dep_list(head);
        }
        if head.is_empty() && tail.is_empty() {
            return Offset::UNSET;
        }
        let off = u32::try_from(self.idarray.len()).unwrap_or(u32::MAX);
        let before = self.idarray.len();
        for &dep in head {
            let raw = dep.raw();
            if !self.idarray[before..].contains(&raw) {
                self.idarray.push(raw);
            }
        }
        self.idarray.push(marker.raw());
        let mid = self.idarray.len();
        for &dep in tail {
            let raw = dep.raw();
            if !self.idarray[mid..].contains(&raw) {
                self.idarray.push(raw);
            }
        }
        self.idarray.push(0);
        Offset(off)
    }

    /// The raw zero-terminated list starting at `off` (terminator excluded)
    #[must_use]
    pub fn dep_list_raw(&self, off: Offset) -> &[u32] {
        if off.is_unset() {
            return &[];
        }
        let start = off.index();
        let end = start
            + self.idarray[start..]
                .iter()
                .position(|&d| d == 0)
                .unwrap_or(0);
        &self.idarray[start..end]
    }

    /// Iterate a dependency list, including any marker entries
    pub fn dep_list(&self, off: Offset) -> impl Iterator<Item = Dep> + '_ {
        self.dep_list_raw(off).iter().map(|&raw| Dep::from_raw(raw))
    }

    /// Split a marked list into `(before_marker, after_marker)`
    #[must_use]
    pub fn dep_list_split(&self, off: Offset, marker: Dep) -> (&[u32], &[u32]) {
        let raw = self.dep_list_raw(off);
        match raw.iter().position(|&d| d == marker.raw()) {
            Some(pos) => (&raw[..pos], &raw[pos + 1..]),
            None => (raw, &[]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::StrId;

    fn dep(n: u32) -> Dep {
        Dep::from_str_id(StrId(n))
    }

    #[test]
    fn empty_list_is_unset() {
        let mut r = Repo::new(RepoId(0), "test".into(), 2);
        assert_eq!(r.add_dep_list(&[]), Offset::UNSET);
        assert!(r.dep_list_raw(Offset::UNSET).is_empty());
    }

    #[test]
    fn duplicates_eliminated_on_insert() {
        let mut r = Repo::new(RepoId(0), "test".into(), 2);
        let off = r.add_dep_list(&[dep(5), dep(6), dep(5)]);
        assert_eq!(r.dep_list_raw(off), &[5, 6]);
    }

    #[test]
    fn marker_splits_list() {
        let mut r = Repo::new(RepoId(0), "test".into(), 2);
        let marker = dep(100);
        let off = r.add_dep_list_with_marker(&[dep(5)], marker, &[dep(6), dep(7)]);
        let (head, tail) = r.dep_list_split(off, marker);
        assert_eq!(head, &[5]);
        assert_eq!(tail, &[6, 7]);
    }

    #[test]
    fn marker_omitted_without_tail() {
        let mut r = Repo::new(RepoId(0), "test".into(), 2);
        let marker = dep(100);
        let off = r.add_dep_list_with_marker(&[dep(5)], marker, &[]);
        let (head, tail) = r.dep_list_split(off, marker);
        assert_eq!(head, &[5]);
        assert!(tail.is_empty());
    }
}
