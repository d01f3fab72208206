//! The provides index
//!
//! An inverted mapping from dependency names to the packages that provide
//! them. Built in two passes (count, fill) over every installable package;
//! identical provider lists share offsets afterwards. Relational
//! dependencies get an empty per-relation slot that is resolved on first
//! access; file-provides names may resolve lazily through a caller-supplied
//! file list.

use crate::dep::{dep_base_name, ProvidersIter};
use crate::id::{Dep, DepKind, Offset, RelId, SolvId, StrId};
use crate::knownids;
use crate::rels::{
    REL_AND, REL_ARCH, REL_CONDA, REL_COND, REL_ELSE, REL_FILECONFLICT, REL_KIND, REL_NAMESPACE,
    REL_OR, REL_UNLESS, REL_WITH, REL_WITHOUT,
};
use crate::{conda, FileProvidesState, Pool, Queue};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Answer of a namespace callback
#[derive(Debug, Clone)]
pub enum NamespaceAnswer {
    /// Nothing provides the namespace dependency
    None,
    /// The system itself provides it
    System,
    /// A concrete set of packages provides it
    Packages(Vec<SolvId>),
}

/// User-supplied resolver for `NAMESPACE(name, evr)` dependencies
///
/// Single-threaded contract: invoked synchronously from index resolution,
/// never concurrently.
pub trait NamespaceProvider {
    fn providers(&mut self, pool: &Pool, name: StrId, evr: Dep) -> NamespaceAnswer;
}

/// User-supplied file list lookup for lazy file-provides resolution
///
/// Single-threaded contract like [`NamespaceProvider`]. Returned package
/// lists need not be sorted; the pool sorts and merges them.
pub trait FileListProvider {
    /// All packages whose file list contains `path`
    ///
    /// # Errors
    ///
    /// A failed lookup degrades to "no providers" with a warning.
    fn providers_of(&mut self, pool: &Pool, path: &str) -> Result<Vec<SolvId>, String>;
}

impl Pool {
    /// Like [`installable`](Self::installable), but keeps installed
    /// packages visible regardless of the arch policy
    fn installable_whatprovides(&self, p: SolvId) -> bool {
        self.is_installed(p) || self.installable(p)
    }

    /// (Re)build the provides index
    ///
    /// Frees all prior offsets atomically; anything stored through
    /// [`ids_to_whatprovides`](Self::ids_to_whatprovides) is gone too.
    #[allow(clippy::too_many_lines)]
    pub fn create_whatprovides(&mut self) {
        let num = self.strings.len();
        let nsolv = self.solvables.len();
        let mut wp = vec![0u32; num];

        // first pass: count providers per name
        for i in (2..nsolv).rev() {
            let s = &self.solvables[i];
            if s.provides.is_unset() {
                continue;
            }
            let Some(rid) = s.repo else { continue };
            if self.repos[rid.index()].disabled {
                continue;
            }
            if !self.installable_whatprovides(SolvId(u32::try_from(i).unwrap_or(u32::MAX))) {
                continue;
            }
            for &raw in self.repos[rid.index()].dep_list_raw(s.provides) {
                let name = dep_base_name(self, Dep::from_raw(raw));
                wp[name.index()] += 1;
            }
        }

        // assign offsets; each list is written backwards from its terminator
        let mut off: u32 = 4;
        for slot in wp.iter_mut().skip(2) {
            let n = *slot;
            if n == 0 {
                *slot = Offset::EMPTY.0;
                continue;
            }
            off += n;
            *slot = off;
            off += 1;
        }
        wp[0] = 0;
        wp[1] = Offset::EMPTY.0;

        let mut data = vec![0u32; off as usize];
        data[Offset::SYSTEM.index()] = SolvId::SYSTEM.0;
        let mut auxdata = vec![0u32; off as usize];

        // second pass: fill, descending so each list ends up ascending
        for i in (2..nsolv).rev() {
            let p = u32::try_from(i).unwrap_or(u32::MAX);
            let s = &self.solvables[i];
            if s.provides.is_unset() {
                continue;
            }
            let Some(rid) = s.repo else { continue };
            if self.repos[rid.index()].disabled {
                continue;
            }
            if !self.installable_whatprovides(SolvId(p)) {
                continue;
            }
            for &raw in self.repos[rid.index()].dep_list_raw(s.provides) {
                let dep = Dep::from_raw(raw);
                let name = dep_base_name(self, dep);
                let slot = wp[name.index()] as usize;
                let mut auxid = raw;
                if data[slot] == p {
                    // same solvable provides the name twice; degrade the
                    // aux entry to bare-name matching
                    auxid = 1;
                } else {
                    data[slot - 1] = p;
                    wp[name.index()] -= 1;
                }
                auxdata[wp[name.index()] as usize] = auxid;
            }
        }

        // aux offsets are the pre-shrink provider offsets
        let aux = wp.clone();

        // shrink: unify identical provider lists so they share offsets
        let mut seen: HashMap<&[u32], u32> = HashMap::new();
        let mut shrunk = 0usize;
        for slot in wp.iter_mut().skip(2) {
            let o = *slot as usize;
            if o < 4 {
                continue;
            }
            let end = o + data[o..].iter().position(|&x| x == 0).unwrap_or(0);
            match seen.entry(&data[o..end]) {
                std::collections::hash_map::Entry::Occupied(e) => {
                    *slot = *e.get();
                    shrunk += 1;
                }
                std::collections::hash_map::Entry::Vacant(e) => {
                    e.insert(*slot);
                }
            }
        }
        drop(seen);
        debug!(names = num, providers = off, shared = shrunk, "built provides index");

        // lazy file provides: forget the eager entries, remember them for
        // the merge on first access
        self.lazywhatprovides.clear();
        let mut auxoff = aux;
        if self.fileprovides_state != FileProvidesState::Complete {
            for id in 2..num {
                let s = self
                    .strings
                    .resolve(StrId(u32::try_from(id).unwrap_or(u32::MAX)));
                if !s.starts_with('/') {
                    continue;
                }
                if wp[id] > 1 {
                    self.lazywhatprovides
                        .push((u32::try_from(id).unwrap_or(u32::MAX), wp[id]));
                }
                wp[id] = 0;
                auxoff[id] = 0;
            }
        }

        self.whatprovides = wp;
        self.whatprovides_rel = vec![0; self.rels.len()];
        self.whatprovidesdata = data;
        self.whatprovidesaux = auxoff;
        self.whatprovidesauxdata = auxdata;
        self.whatprovides_ready = true;
    }

    /// True once [`create_whatprovides`](Self::create_whatprovides) ran and
    /// nothing invalidated it
    #[must_use]
    pub fn whatprovides_ready(&self) -> bool {
        self.whatprovides_ready
    }

    /// The providers of a dependency, materializing lazily resolved entries
    pub fn whatprovides(&mut self, dep: Dep) -> Offset {
        match dep.kind() {
            DepKind::Str(id) => {
                let off = self.whatprovides.get(id.index()).copied().unwrap_or(0);
                if off != 0 {
                    return Offset(off);
                }
                self.add_std_providers(id)
            }
            DepKind::Rel(rid) => {
                let off = self.whatprovides_rel.get(rid.index()).copied().unwrap_or(0);
                if off != 0 {
                    return Offset(off);
                }
                self.add_rel_providers(rid)
            }
        }
    }

    /// The zero-terminated provider list at `off` (terminator excluded)
    #[must_use]
    pub fn providers_at(&self, off: Offset) -> &[u32] {
        if off.is_unset() || off.index() >= self.whatprovidesdata.len() {
            return &[];
        }
        let start = off.index();
        let end = start
            + self.whatprovidesdata[start..]
                .iter()
                .position(|&d| d == 0)
                .unwrap_or(0);
        &self.whatprovidesdata[start..end]
    }

    /// Iterate the providers at `off` as solvable ids
    #[must_use]
    pub fn providers_iter(&self, off: Offset) -> ProvidersIter<'_> {
        ProvidersIter::new(self.providers_at(off))
    }

    /// Store an id list in the shared providers arena; used for job rules,
    /// learnt rules and cached relational results
    pub fn ids_to_whatprovides(&mut self, ids: &[u32]) -> Offset {
        if ids.is_empty() {
            return Offset::EMPTY;
        }
        if ids == [SolvId::SYSTEM.0] {
            return Offset::SYSTEM;
        }
        let off = u32::try_from(self.whatprovidesdata.len()).unwrap_or(u32::MAX);
        self.whatprovidesdata.extend_from_slice(ids);
        self.whatprovidesdata.push(0);
        Offset(off)
    }

    /// Store a queue of solvable ids in the shared providers arena
    pub fn queue_to_whatprovides(&mut self, q: &Queue) -> Offset {
        let ids: Vec<u32> = q
            .iter()
            .map(|&id| u32::try_from(id).unwrap_or(0))
            .collect();
        self.ids_to_whatprovides(&ids)
    }

    /// Override the cached providers of a dependency
    pub fn set_whatprovides(&mut self, dep: Dep, off: Offset) {
        match dep.kind() {
            DepKind::Str(id) => {
                if id.index() >= self.whatprovides.len() {
                    self.whatprovides.resize(id.index() + 1, 0);
                }
                self.whatprovides[id.index()] = off.0;
            }
            DepKind::Rel(rid) => {
                if rid.index() >= self.whatprovides_rel.len() {
                    self.whatprovides_rel.resize(rid.index() + 1, 0);
                }
                self.whatprovides_rel[rid.index()] = off.0;
            }
        }
    }

    /// Invalidate cached namespace answers so the callback is asked again
    ///
    /// `ns`/`evr` of `None` match every namespace relation.
    pub fn flush_namespace_providers(&mut self, ns: Option<StrId>, evr: Option<Dep>) {
        for rid in 1..self.rels.len() {
            let rd = self.rels.resolve(RelId(u32::try_from(rid).unwrap_or(u32::MAX)));
            if rd.flags != REL_NAMESPACE {
                continue;
            }
            if rd.name == Dep::from_str_id(knownids::NS_OTHERPROVIDERS) {
                continue;
            }
            if let Some(ns) = ns {
                if rd.name != Dep::from_str_id(ns) {
                    continue;
                }
            }
            if let Some(evr) = evr {
                if rd.evr != evr {
                    continue;
                }
            }
            if rid < self.whatprovides_rel.len() {
                self.whatprovides_rel[rid] = 0;
            }
        }
    }

    fn lazy_old_offset(&self, name: StrId) -> u32 {
        self.lazywhatprovides
            .binary_search_by_key(&name.0, |&(id, _)| id)
            .map(|i| self.lazywhatprovides[i].1)
            .unwrap_or(0)
    }

    /// Lazy population of the index for a plain name; only file paths can
    /// still gain providers after the build
    fn add_std_providers(&mut self, name: StrId) -> Offset {
        if name.index() >= self.whatprovides.len() {
            self.whatprovides.resize(name.index() + 1, 0);
        }
        if self.fileprovides_state == FileProvidesState::Complete
            || !self.strings.resolve(name).starts_with('/')
        {
            self.whatprovides[name.index()] = Offset::EMPTY.0;
            return Offset::EMPTY;
        }
        let path = self.strings.resolve(name).to_string();
        let mut found: Vec<SolvId> = Vec::new();
        let mut provider = self.filelist_provider.take();
        if let Some(p) = provider.as_mut() {
            match p.providers_of(self, &path) {
                Ok(list) => found = list,
                Err(message) => {
                    warn!(path = %path, error = %message, "file list lookup failed, assuming no providers");
                }
            }
        }
        self.filelist_provider = provider;
        found.retain(|&p| self.installable_whatprovides(p));
        found.sort_unstable();
        found.dedup();

        let old = self.lazy_old_offset(name);
        let off = if found.is_empty() {
            if old != 0 {
                Offset(old)
            } else {
                Offset::EMPTY
            }
        } else {
            // merge with the providers remembered from the eager build
            let mut merged: Vec<u32> = found.iter().map(|p| p.0).collect();
            if old != 0 {
                merged.extend_from_slice(self.providers_at(Offset(old)));
                merged.sort_unstable();
                merged.dedup();
            }
            self.ids_to_whatprovides(&merged)
        };
        self.whatprovides[name.index()] = off.0;
        off
    }

    /// Resolve the providers of a relational dependency and cache them
    #[allow(clippy::too_many_lines)]
    fn add_rel_providers(&mut self, rid: RelId) -> Offset {
        if rid.index() >= self.whatprovides_rel.len() {
            self.whatprovides_rel.resize(rid.index() + 1, 0);
        }
        let rd = self.rels.resolve(rid);
        let (name, evr, flags) = (rd.name, rd.evr, rd.flags);
        let mut plist: Vec<u32> = Vec::new();
        // wp != 0 means an existing offset can be reused verbatim
        let mut wp: u32 = 0;

        if flags >= 8 {
            match flags {
                REL_WITH => {
                    let woff = self.whatprovides(name);
                    let eoff = self.whatprovides(evr);
                    wp = woff.0;
                    let right: Vec<u32> = self.providers_at(eoff).to_vec();
                    for &p in self.providers_at(woff) {
                        if right.contains(&p) {
                            plist.push(p);
                        } else {
                            wp = 0;
                        }
                    }
                    if wp != 0 {
                        plist.clear();
                    }
                }
                REL_WITHOUT => {
                    let woff = self.whatprovides(name);
                    let eoff = self.whatprovides(evr);
                    wp = woff.0;
                    let right: Vec<u32> = self.providers_at(eoff).to_vec();
                    for &p in self.providers_at(woff) {
                        if right.contains(&p) {
                            wp = 0;
                        } else {
                            plist.push(p);
                        }
                    }
                    if wp != 0 {
                        plist.clear();
                    }
                }
                REL_AND | REL_OR | REL_COND | REL_UNLESS => {
                    // potential match: union of both operands; for COND and
                    // UNLESS only the ELSE branch contributes
                    let mut evr = evr;
                    if matches!(flags, REL_COND | REL_UNLESS) {
                        evr = match evr.as_rel_id() {
                            Some(er) => {
                                let erd = self.rels.resolve(er);
                                if erd.flags == REL_ELSE {
                                    erd.evr
                                } else {
                                    Dep::NULL
                                }
                            }
                            None => Dep::NULL,
                        };
                    }
                    let woff = self.whatprovides(name);
                    if self.providers_at(woff).is_empty() {
                        wp = if evr.is_null() {
                            Offset::EMPTY.0
                        } else {
                            self.whatprovides(evr).0
                        };
                    } else if evr.is_null() {
                        wp = woff.0;
                    } else {
                        let eoff = self.whatprovides(evr);
                        let left: Vec<u32> = self.providers_at(woff).to_vec();
                        let right: Vec<u32> = self.providers_at(eoff).to_vec();
                        plist = left.clone();
                        plist.extend_from_slice(&right);
                        plist.sort_unstable();
                        plist.dedup();
                        if plist.len() == left.len() {
                            wp = woff.0;
                            plist.clear();
                        }
                    }
                }
                REL_NAMESPACE => {
                    if name == Dep::from_str_id(knownids::NS_OTHERPROVIDERS) {
                        wp = self.whatprovides(evr).0;
                    } else if let Some(ns) = name.as_str_id() {
                        let mut cb = self.namespace_callback.take();
                        let answer = cb
                            .as_mut()
                            .map(|c| c.providers(self, ns, evr));
                        self.namespace_callback = cb;
                        match answer {
                            Some(NamespaceAnswer::System) => {
                                plist.push(SolvId::SYSTEM.0);
                            }
                            Some(NamespaceAnswer::Packages(pkgs)) => {
                                plist = pkgs.iter().map(|p| p.0).collect();
                                plist.sort_unstable();
                                plist.dedup();
                            }
                            Some(NamespaceAnswer::None) | None => {}
                        }
                    }
                }
                REL_ARCH => {
                    let evr_arch = evr.as_str_id();
                    if evr_arch == Some(knownids::ARCH_SRC)
                        || evr_arch == Some(knownids::ARCH_NOSRC)
                    {
                        // src packages provide nothing, walk the pool
                        for i in 2..self.solvables.len() {
                            let p = SolvId(u32::try_from(i).unwrap_or(u32::MAX));
                            let s = &self.solvables[i];
                            let Some(r) = s.repo else { continue };
                            if self.repos[r.index()].disabled {
                                continue;
                            }
                            if Dep::from_str_id(s.arch) != evr && s.arch != knownids::ARCH_NOSRC {
                                continue;
                            }
                            if name.is_null() || self.match_nevr(p, name) {
                                plist.push(p.0);
                            }
                        }
                    } else if name.is_null() {
                        for i in 2..self.solvables.len() {
                            let p = SolvId(u32::try_from(i).unwrap_or(u32::MAX));
                            if !self.installable_whatprovides(p) {
                                continue;
                            }
                            if Dep::from_str_id(self.solvables[i].arch) == evr {
                                plist.push(p.0);
                            }
                        }
                    } else {
                        let woff = self.whatprovides(name);
                        wp = woff.0;
                        for &p in self.providers_at(woff) {
                            if Dep::from_str_id(self.solvables[p as usize].arch) == evr {
                                plist.push(p);
                            } else {
                                wp = 0;
                            }
                        }
                        if wp != 0 {
                            plist.clear();
                        }
                    }
                }
                REL_KIND => {
                    let woff = self.whatprovides(name);
                    wp = woff.0;
                    let providers: Vec<u32> = self.providers_at(woff).to_vec();
                    for p in providers {
                        let pname = self.solvables[p as usize].name;
                        if self.name_is_kind(pname, evr) {
                            plist.push(p);
                        } else {
                            wp = 0;
                        }
                    }
                    if wp != 0 {
                        plist.clear();
                    }
                }
                REL_FILECONFLICT => {
                    // providers carrying this exact relation in provides
                    let orig = Dep::from_rel_id(rid);
                    let woff = self.whatprovides(name);
                    let providers: Vec<u32> = self.providers_at(woff).to_vec();
                    for p in providers {
                        let s = &self.solvables[p as usize];
                        let Some(r) = s.repo else { continue };
                        if self.repos[r.index()]
                            .dep_list(s.provides)
                            .any(|d| d == orig)
                        {
                            plist.push(p);
                        }
                    }
                }
                REL_CONDA => {
                    let woff = self.whatprovides(name);
                    let providers: Vec<u32> = self.providers_at(woff).to_vec();
                    let spec = evr
                        .as_str_id()
                        .map(|id| self.strings.resolve(id).to_string())
                        .unwrap_or_default();
                    for p in providers {
                        let pevr = self.strings.resolve(self.solvables[p as usize].evr);
                        if conda::conda_matchspec(pevr, &spec) {
                            plist.push(p);
                        }
                    }
                }
                _ => {}
            }
            if wp != 0 {
                self.whatprovides_rel[rid.index()] = wp;
                return Offset(wp);
            }
        } else if flags != 0 {
            // simple comparator relation: filter the name's providers by
            // the exact provides entry that caused each match
            let woff = self.whatprovides(name);
            let providers: Vec<u32> = self.providers_at(woff).to_vec();
            let aux: Vec<u32> = name
                .as_str_id()
                .filter(|id| id.index() < self.whatprovidesaux.len())
                .map(|id| self.whatprovidesaux[id.index()])
                .filter(|&o| o != 0)
                .map(|o| {
                    let start = o as usize;
                    self.whatprovidesauxdata[start..start + providers.len()].to_vec()
                })
                .unwrap_or_default();

            for (idx, &p) in providers.iter().enumerate() {
                let s = &self.solvables[p as usize];
                if let Some(&auxid) = aux.get(idx) {
                    if auxid != 0 && auxid != 1 {
                        let pid = Dep::from_raw(auxid);
                        if self.provides_entry_matches(pid, name, flags, evr) {
                            plist.push(p);
                        }
                        continue;
                    }
                }
                if s.provides.is_unset()
                    || s.arch == knownids::ARCH_SRC
                    || s.arch == knownids::ARCH_NOSRC
                {
                    // no provides or src package: check the nevr itself
                    if self.match_nevr(SolvId(p), Dep::from_rel_id(rid)) {
                        plist.push(p);
                    }
                    continue;
                }
                let Some(r) = s.repo else { continue };
                let matched = self.repos[r.index()]
                    .dep_list(s.provides)
                    .any(|pid| self.provides_entry_matches(pid, name, flags, evr));
                if matched {
                    plist.push(p);
                }
            }
            // the system solvable satisfies unknown rpmlib() capabilities
            if plist.is_empty() {
                if let Some(n) = name.as_str_id() {
                    if self.strings.resolve(n).starts_with("rpmlib(") {
                        plist.push(SolvId::SYSTEM.0);
                    }
                }
            }
        }

        let off = self.ids_to_whatprovides(&plist);
        self.whatprovides_rel[rid.index()] = off.0;
        off
    }

    /// Does one provides entry satisfy the comparator `(name, flags, evr)`?
    fn provides_entry_matches(&self, pid: Dep, name: Dep, flags: u8, evr: Dep) -> bool {
        match pid.kind() {
            DepKind::Str(_) => {
                // unversioned provides match any version under rpm
                // semantics but never under deb
                pid == name && self.disttype != crate::DistType::Deb
            }
            DepKind::Rel(pr) => {
                let prd = self.rels.resolve(pr);
                prd.name == name && self.intersect_evrs(prd.flags, prd.evr, flags, evr)
            }
        }
    }

    /// `kind:` prefix filtering for `KIND` relations; kind id 1 means
    /// "no kind prefix"
    fn name_is_kind(&self, name: StrId, kind: Dep) -> bool {
        let n = self.strings.resolve(name);
        match kind.as_str_id() {
            None => false,
            Some(StrId::NULL) => true,
            Some(StrId(1)) => {
                let trimmed = n.trim_start_matches(|c: char| c.is_ascii_lowercase());
                !trimmed.starts_with(':')
            }
            Some(k) => {
                let kn = self.strings.resolve(k);
                n.len() > kn.len() && n.starts_with(kn) && n.as_bytes()[kn.len()] == b':'
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rels::{REL_EQ, REL_GT};
    use crate::DistType;

    /// Build a pool where each package provides its own name=evr plus any
    /// extra provides
    fn build_pool(pkgs: &[(&str, &str, &[&str])]) -> (Pool, Vec<SolvId>) {
        let mut pool = Pool::new(DistType::Rpm);
        let repo = pool.add_repo("test");
        let mut ids = Vec::new();
        for (name, evr, extra) in pkgs {
            let p = pool.add_solvable(repo).unwrap();
            let name_id = pool.intern(name).unwrap();
            let evr_id = pool.intern(evr).unwrap();
            let arch_id = pool.intern("x86_64").unwrap();
            let selfprov = pool
                .rel(
                    Dep::from_str_id(name_id),
                    Dep::from_str_id(evr_id),
                    REL_EQ,
                )
                .unwrap();
            let mut provides = vec![selfprov];
            for e in *extra {
                let d = pool.str2dep(e).unwrap();
                provides.push(d);
            }
            let off = pool.repo_mut(repo).add_dep_list(&provides);
            let s = pool.solvable_mut(p);
            s.name = name_id;
            s.evr = evr_id;
            s.arch = arch_id;
            s.provides = off;
            ids.push(p);
        }
        pool.create_whatprovides();
        (pool, ids)
    }

    #[test]
    fn name_lookup_finds_providers() {
        let (mut pool, ids) = build_pool(&[
            ("a", "1-1", &[]),
            ("libfoo", "1-1", &["libfoo.so.1"]),
            ("libfoo", "2-1", &["libfoo.so.2"]),
        ]);
        let name = pool.find_str("libfoo").unwrap();
        let off = pool.whatprovides(Dep::from_str_id(name));
        let providers: Vec<u32> = pool.providers_at(off).to_vec();
        assert_eq!(providers, vec![ids[1].0, ids[2].0]);
    }

    #[test]
    fn versioned_lookup_filters() {
        let (mut pool, ids) = build_pool(&[("a", "1-1", &[]), ("a", "2-1", &[])]);
        let name = pool.find_str("a").unwrap();
        let v2 = pool.intern("2").unwrap();
        let ge2 = pool
            .rel(
                Dep::from_str_id(name),
                Dep::from_str_id(v2),
                REL_GT | REL_EQ,
            )
            .unwrap();
        let off = pool.whatprovides(ge2);
        assert_eq!(pool.providers_at(off), &[ids[1].0]);
    }

    #[test]
    fn unversioned_provides_matches_versioned_dep() {
        let (mut pool, ids) = build_pool(&[("a", "1-1", &["cap"])]);
        let cap = pool.find_str("cap").unwrap();
        let v9 = pool.intern("9").unwrap();
        let ge9 = pool
            .rel(
                Dep::from_str_id(cap),
                Dep::from_str_id(v9),
                REL_GT | REL_EQ,
            )
            .unwrap();
        let off = pool.whatprovides(ge9);
        assert_eq!(pool.providers_at(off), &[ids[0].0]);
    }

    #[test]
    fn rebuild_preserves_provider_sets() {
        let (mut pool, _) = build_pool(&[("a", "1-1", &["cap"]), ("b", "1-1", &["cap"])]);
        let cap = pool.find_str("cap").unwrap();
        let before: Vec<u32> = {
            let off = pool.whatprovides(Dep::from_str_id(cap));
            pool.providers_at(off).to_vec()
        };
        pool.create_whatprovides();
        let after: Vec<u32> = {
            let off = pool.whatprovides(Dep::from_str_id(cap));
            pool.providers_at(off).to_vec()
        };
        assert_eq!(before, after);
    }

    #[test]
    fn identical_lists_share_offsets() {
        let (mut pool, _) = build_pool(&[("a", "1-1", &["cap1", "cap2"])]);
        let c1 = pool.find_str("cap1").unwrap();
        let c2 = pool.find_str("cap2").unwrap();
        let o1 = pool.whatprovides(Dep::from_str_id(c1));
        let o2 = pool.whatprovides(Dep::from_str_id(c2));
        assert_eq!(o1, o2);
    }

    #[test]
    fn unknown_name_has_no_providers() {
        let (mut pool, _) = build_pool(&[("a", "1-1", &[])]);
        let ghost = pool.intern("ghost").unwrap();
        let off = pool.whatprovides(Dep::from_str_id(ghost));
        assert!(pool.providers_at(off).is_empty());
    }

    struct StaticFiles(Vec<(String, Vec<SolvId>)>);

    impl FileListProvider for StaticFiles {
        fn providers_of(&mut self, _pool: &Pool, path: &str) -> Result<Vec<SolvId>, String> {
            Ok(self
                .0
                .iter()
                .find(|(p, _)| p == path)
                .map(|(_, v)| v.clone())
                .unwrap_or_default())
        }
    }

    #[test]
    fn lazy_file_provides_materialize_on_access() {
        let (mut pool, ids) = build_pool(&[("a", "1-1", &[]), ("b", "1-1", &[])]);
        pool.set_filelist_provider(Some(Box::new(StaticFiles(vec![(
            "/usr/bin/tool".to_string(),
            vec![ids[1]],
        )]))));
        let path = pool.intern("/usr/bin/tool").unwrap();
        pool.create_whatprovides();
        let off = pool.whatprovides(Dep::from_str_id(path));
        assert_eq!(pool.providers_at(off), &[ids[1].0]);
        // cached now
        let again = pool.whatprovides(Dep::from_str_id(path));
        assert_eq!(off, again);
    }

    struct InstalledLang;

    impl NamespaceProvider for InstalledLang {
        fn providers(&mut self, _pool: &Pool, _name: StrId, _evr: Dep) -> NamespaceAnswer {
            NamespaceAnswer::System
        }
    }

    #[test]
    fn namespace_callback_and_flush() {
        let (mut pool, _) = build_pool(&[("a", "1-1", &[])]);
        let ns = pool.intern("namespace:language").unwrap();
        let en = pool.intern("en").unwrap();
        let nsdep = pool
            .rel(
                Dep::from_str_id(ns),
                Dep::from_str_id(en),
                REL_NAMESPACE,
            )
            .unwrap();
        pool.create_whatprovides();
        // no callback: no providers
        let off = pool.whatprovides(nsdep);
        assert!(pool.providers_at(off).is_empty());
        pool.set_namespace_callback(Some(Box::new(InstalledLang)));
        // still cached
        let cached = pool.whatprovides(nsdep);
        assert!(pool.providers_at(cached).is_empty());
        pool.flush_namespace_providers(Some(ns), None);
        let off = pool.whatprovides(nsdep);
        assert_eq!(pool.providers_at(off), &[SolvId::SYSTEM.0]);
    }
}
