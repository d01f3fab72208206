//! Dependency matching
//!
//! Structural matching of relations against solvables and against other
//! relations. Complex operators (`AND`, `OR`, `WITH`, `COND`, …) are
//! evaluated semantically; two comparator relations intersect via the
//! direction table over `{<,=,>} × {<,=,>}`.

use crate::id::{Dep, DepKind, SolvId, StrId};
use crate::knownids;
use crate::rels::{
    is_comparator, REL_AND, REL_ARCH, REL_COMPAT, REL_COND, REL_ELSE, REL_EQ, REL_GT, REL_LT,
    REL_OR, REL_UNLESS, REL_WITH, REL_WITHOUT,
};
use crate::solvable::DepKey;
use crate::{Pool, Queue};

impl Pool {
    /// Do the version ranges `(pflags, pevr)` and `(flags, evr)` intersect?
    ///
    /// `pevr`/`evr` are interned EVR strings; the provider side may carry a
    /// `COMPAT` relation whose name is the actual version and whose evr is
    /// the backwards-compatibility floor.
    #[must_use]
    pub fn intersect_evrs(&self, pflags: u8, pevr: Dep, flags: u8, evr: Dep) -> bool {
        if !is_comparator(pflags) || !is_comparator(flags) {
            return false;
        }
        if pflags == 7 || flags == 7 {
            return true; // matches every version
        }
        if pflags & flags & (REL_LT | REL_GT) != 0 {
            return true; // both point in the same direction
        }
        if pevr == evr {
            return pflags & flags & REL_EQ != 0;
        }
        if let DepKind::Rel(rid) = pevr.kind() {
            let rd = self.rel_unchecked(rid);
            if rd.flags == REL_COMPAT {
                // rd.name is the actual version, rd.evr the floor
                if flags & REL_GT == 0 || flags & REL_LT != 0 {
                    return self.intersect_evrs(REL_EQ, rd.name, flags, evr);
                }
                return self.intersect_evrs(REL_LT | REL_EQ, rd.name, flags, evr)
                    && self.intersect_evrs(REL_GT | REL_EQ, rd.evr, REL_EQ, evr);
            }
            return false;
        }
        let (Some(pevr), Some(evr)) = (pevr.as_str_id(), evr.as_str_id()) else {
            return false;
        };
        match self.evrcmp(pevr, evr, self.depcmp_mode()) {
            -2 => pflags & REL_EQ != 0,
            -1 => flags & REL_LT != 0 || pflags & REL_GT != 0,
            0 => flags & pflags & REL_EQ != 0,
            1 => flags & REL_GT != 0 || pflags & REL_LT != 0,
            2 => flags & REL_EQ != 0,
            _ => false,
        }
    }

    /// Does a solvable's name/evr/arch match a dependency?
    #[must_use]
    pub fn match_nevr(&self, p: SolvId, dep: Dep) -> bool {
        let s = self.solvable(p);
        match dep.kind() {
            DepKind::Str(name) => s.name == name,
            DepKind::Rel(rid) => {
                let rd = self.rel_unchecked(rid);
                if rd.flags > 7 {
                    return match rd.flags {
                        REL_ARCH => {
                            let arch_ok = Dep::from_str_id(s.arch) == rd.evr
                                || (rd.evr == Dep::from_str_id(knownids::ARCH_SRC)
                                    && s.arch == knownids::ARCH_NOSRC);
                            arch_ok && self.match_nevr(p, rd.name)
                        }
                        REL_OR => self.match_nevr(p, rd.name) || self.match_nevr(p, rd.evr),
                        REL_AND | REL_WITH => {
                            self.match_nevr(p, rd.name) && self.match_nevr(p, rd.evr)
                        }
                        REL_WITHOUT => {
                            self.match_nevr(p, rd.name) && !self.match_nevr(p, rd.evr)
                        }
                        _ => false,
                    };
                }
                if !self.match_nevr(p, rd.name) {
                    return false;
                }
                if Dep::from_str_id(s.evr) == rd.evr {
                    return rd.flags & REL_EQ != 0;
                }
                if rd.flags == 0 {
                    return false;
                }
                if rd.flags == 7 {
                    return true;
                }
                let Some(evr) = rd.evr.as_str_id() else {
                    return false;
                };
                match self.evrcmp(s.evr, evr, self.depcmp_mode()) {
                    -2 => true,
                    -1 => rd.flags & REL_LT != 0,
                    0 | 2 => rd.flags & REL_EQ != 0,
                    1 => rd.flags & REL_GT != 0,
                    _ => false,
                }
            }
        }
    }

    /// Is `d1`/`d2` an interval pair `name > x WITH name < y`?
    fn is_interval_dep(&self, d1: Dep, d2: Dep) -> bool {
        let (DepKind::Rel(r1), DepKind::Rel(r2)) = (d1.kind(), d2.kind()) else {
            return false;
        };
        let (rd1, rd2) = (self.rel_unchecked(r1), self.rel_unchecked(r2));
        rd1.name == rd2.name
            && rd1.flags < 8
            && rd2.flags < 8
            && (rd1.flags ^ rd2.flags) & (REL_LT | REL_GT) == (REL_LT | REL_GT)
    }

    /// Can the provider dependency `d1` satisfy the dependency `d2`?
    ///
    /// Complex operands match "potentially": a provider `A & B` matches a
    /// query for `A`.
    #[must_use]
    pub fn match_dep(&self, d1: Dep, d2: Dep) -> bool {
        if d1 == d2 {
            return true;
        }
        if let DepKind::Rel(r1) = d1.kind() {
            let rd1 = self.rel_unchecked(r1);
            if matches!(
                rd1.flags,
                REL_AND | REL_OR | REL_WITH | REL_WITHOUT | REL_COND | REL_UNLESS
            ) {
                if rd1.flags == REL_WITH && self.is_interval_dep(rd1.name, rd1.evr) {
                    return self.match_dep(rd1.name, d2) && self.match_dep(rd1.evr, d2);
                }
                if self.match_dep(rd1.name, d2) {
                    return true;
                }
                let mut evr = rd1.evr;
                if matches!(rd1.flags, REL_COND | REL_UNLESS) {
                    let DepKind::Rel(er) = evr.kind() else {
                        return false;
                    };
                    let erd = self.rel_unchecked(er);
                    if erd.flags != REL_ELSE {
                        return false;
                    }
                    evr = erd.evr;
                    return self.match_dep(evr, d2);
                }
                if rd1.flags != REL_WITHOUT && self.match_dep(evr, d2) {
                    return true;
                }
                return false;
            }
        }
        if let DepKind::Rel(r2) = d2.kind() {
            let rd2 = self.rel_unchecked(r2);
            if matches!(
                rd2.flags,
                REL_AND | REL_OR | REL_WITH | REL_WITHOUT | REL_COND | REL_UNLESS
            ) {
                if rd2.flags == REL_WITH && self.is_interval_dep(rd2.name, rd2.evr) {
                    return self.match_dep(d1, rd2.name) && self.match_dep(d1, rd2.evr);
                }
                if self.match_dep(d1, rd2.name) {
                    return true;
                }
                let mut evr = rd2.evr;
                if matches!(rd2.flags, REL_COND | REL_UNLESS) {
                    let DepKind::Rel(er) = evr.kind() else {
                        return false;
                    };
                    let erd = self.rel_unchecked(er);
                    if erd.flags != REL_ELSE {
                        return false;
                    }
                    evr = erd.evr;
                    return self.match_dep(d1, evr);
                }
                if rd2.flags != REL_WITHOUT && self.match_dep(d1, evr) {
                    return true;
                }
                return false;
            }
        }
        match (d1.kind(), d2.kind()) {
            (DepKind::Str(_), DepKind::Str(_)) => false, // d1 != d2
            (DepKind::Str(_), DepKind::Rel(r2)) => {
                self.match_dep(d1, self.rel_unchecked(r2).name)
            }
            (DepKind::Rel(r1), DepKind::Str(_)) => {
                self.match_dep(self.rel_unchecked(r1).name, d2)
            }
            (DepKind::Rel(r1), DepKind::Rel(r2)) => {
                let (rd1, rd2) = (self.rel_unchecked(r1), self.rel_unchecked(r2));
                if !self.match_dep(rd1.name, rd2.name) {
                    return false;
                }
                self.intersect_evrs(rd1.flags, rd1.evr, rd2.flags, rd2.evr)
            }
        }
    }

    /// Collect packages whose `key` list holds a dependency matching `dep`
    pub fn what_matches_dep(&self, key: DepKey, dep: Dep, out: &mut Queue) {
        out.clear();
        for p in self.solvable_ids() {
            let s = self.solvable(p);
            let Some(repo) = s.repo else { continue };
            let repo = self.repo(repo);
            let off = s.dep_offset(key);
            if off.is_unset() {
                continue;
            }
            for d in repo.dep_list(off) {
                if d == knownids::PREREQ_MARKER {
                    continue;
                }
                if self.match_dep(d, dep) {
                    out.push(i32::try_from(p.0).unwrap_or(i32::MAX));
                    break;
                }
            }
        }
    }

    /// Collect packages whose `key` list contains `dep` verbatim
    pub fn what_contains_dep(&self, key: DepKey, dep: Dep, out: &mut Queue) {
        out.clear();
        for p in self.solvable_ids() {
            let s = self.solvable(p);
            let Some(repo) = s.repo else { continue };
            let repo = self.repo(repo);
            let off = s.dep_offset(key);
            if off.is_unset() {
                continue;
            }
            if repo.dep_list(off).any(|d| d == dep) {
                out.push(i32::try_from(p.0).unwrap_or(i32::MAX));
            }
        }
    }

    /// Human-readable rendering of a dependency
    #[must_use]
    pub fn dep2str(&self, dep: Dep) -> String {
        match dep.kind() {
            DepKind::Str(id) => self.str(id).to_string(),
            DepKind::Rel(rid) => {
                let rd = self.rel_unchecked(rid);
                let name = self.dep2str(rd.name);
                let evr = self.dep2str(rd.evr);
                match rd.flags {
                    f if is_comparator(f) => {
                        let op = match f {
                            1 => "<",
                            2 => "=",
                            3 => "<=",
                            4 => ">",
                            5 => "<>",
                            6 => ">=",
                            _ => "<=>",
                        };
                        format!("{name} {op} {evr}")
                    }
                    REL_AND => format!("{name} & {evr}"),
                    REL_OR => format!("{name} | {evr}"),
                    REL_WITH => format!("{name} + {evr}"),
                    REL_WITHOUT => format!("{name} - {evr}"),
                    REL_COND => format!("{name} <IF> {evr}"),
                    REL_UNLESS => format!("{name} <UNLESS> {evr}"),
                    REL_ELSE => format!("{name} <ELSE> {evr}"),
                    REL_ARCH => format!("{name}.{evr}"),
                    crate::rels::REL_NAMESPACE => format!("{name}({evr})"),
                    crate::rels::REL_KIND => format!("{evr}:{name}"),
                    crate::rels::REL_CONDA => format!("{name} {evr}"),
                    crate::rels::REL_FILECONFLICT => format!("{name} <FILECONFLICT> {evr}"),
                    _ => format!("{name} <?> {evr}"),
                }
            }
        }
    }

    /// Intern the string form of a dependency back into a [`Dep`]; inverse
    /// of [`dep2str`](Self::dep2str) for names and comparator relations
    ///
    /// # Errors
    ///
    /// Propagates intern failure.
    pub fn str2dep(&mut self, s: &str) -> solvent_errors::Result<Dep> {
        let s = s.trim();
        for (op, flags) in [
            ("<=>", 7u8),
            ("<=", REL_LT | REL_EQ),
            (">=", REL_GT | REL_EQ),
            ("<>", REL_LT | REL_GT),
            ("<", REL_LT),
            (">", REL_GT),
            ("=", REL_EQ),
        ] {
            if let Some(pos) = s.find(&format!(" {op} ")) {
                let name = self.str2dep(&s[..pos])?;
                let evr = self.intern(s[pos + op.len() + 2..].trim())?;
                return self.rel(name, Dep::from_str_id(evr), flags);
            }
        }
        Ok(Dep::from_str_id(self.intern(s)?))
    }
}

/// A borrowed view over the providers of a dependency
///
/// Obtained from [`Pool::providers_at`]; iteration yields solvable ids.
pub struct ProvidersIter<'a> {
    data: &'a [u32],
    pos: usize,
}

impl<'a> ProvidersIter<'a> {
    pub(crate) fn new(data: &'a [u32]) -> Self {
        Self { data, pos: 0 }
    }
}

impl Iterator for ProvidersIter<'_> {
    type Item = SolvId;

    fn next(&mut self) -> Option<SolvId> {
        let &id = self.data.get(self.pos)?;
        if id == 0 {
            return None;
        }
        self.pos += 1;
        Some(SolvId(id))
    }
}

/// Helper for callers that track names: resolve the base name of a
/// dependency, recursing through relation names
#[must_use]
pub fn dep_base_name(pool: &Pool, mut dep: Dep) -> StrId {
    loop {
        match dep.kind() {
            DepKind::Str(id) => return id,
            DepKind::Rel(rid) => dep = pool.rel_unchecked(rid).name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DistType;

    fn pool_with(pkgs: &[(&str, &str, &str)]) -> (Pool, Vec<SolvId>) {
        let mut pool = Pool::new(DistType::Rpm);
        let repo = pool.add_repo("test");
        let mut ids = Vec::new();
        for (name, evr, arch) in pkgs {
            let p = pool.add_solvable(repo).unwrap();
            let name = pool.intern(name).unwrap();
            let evr = pool.intern(evr).unwrap();
            let arch = pool.intern(arch).unwrap();
            let s = pool.solvable_mut(p);
            s.name = name;
            s.evr = evr;
            s.arch = arch;
            ids.push(p);
        }
        (pool, ids)
    }

    #[test]
    fn match_nevr_plain_name() {
        let (mut pool, ids) = pool_with(&[("a", "1-1", "x86_64")]);
        let a = pool.intern("a").unwrap();
        let b = pool.intern("b").unwrap();
        assert!(pool.match_nevr(ids[0], Dep::from_str_id(a)));
        assert!(!pool.match_nevr(ids[0], Dep::from_str_id(b)));
    }

    #[test]
    fn match_nevr_versioned() {
        let (mut pool, ids) = pool_with(&[("a", "2-1", "x86_64")]);
        let a = pool.intern("a").unwrap();
        let v1 = pool.intern("1").unwrap();
        let v3 = pool.intern("3").unwrap();
        let ge1 = pool
            .rel(Dep::from_str_id(a), Dep::from_str_id(v1), REL_GT | REL_EQ)
            .unwrap();
        let ge3 = pool
            .rel(Dep::from_str_id(a), Dep::from_str_id(v3), REL_GT | REL_EQ)
            .unwrap();
        assert!(pool.match_nevr(ids[0], ge1));
        assert!(!pool.match_nevr(ids[0], ge3));
    }

    #[test]
    fn intersect_directions() {
        let mut pool = Pool::new(DistType::Rpm);
        let v1 = Dep::from_str_id(pool.intern("1").unwrap());
        let v2 = Dep::from_str_id(pool.intern("2").unwrap());
        // > 1 intersects > 2 (same direction)
        assert!(pool.intersect_evrs(REL_GT, v1, REL_GT, v2));
        // = 1 does not intersect = 2
        assert!(!pool.intersect_evrs(REL_EQ, v1, REL_EQ, v2));
        // >= 2 intersects = 2
        assert!(pool.intersect_evrs(REL_GT | REL_EQ, v2, REL_EQ, v2));
        // < 2 intersects = 1
        assert!(pool.intersect_evrs(REL_LT, v2, REL_EQ, v1));
        // > 2 does not intersect = 1
        assert!(!pool.intersect_evrs(REL_GT, v2, REL_EQ, v1));
    }

    #[test]
    fn match_dep_complex_is_potential() {
        let (mut pool, _) = pool_with(&[]);
        let a = Dep::from_str_id(pool.intern("a").unwrap());
        let b = Dep::from_str_id(pool.intern("b").unwrap());
        let and = pool.rel(a, b, REL_AND).unwrap();
        // provider "a & b" potentially matches a query for plain a
        assert!(pool.match_dep(and, a));
        assert!(pool.match_dep(and, b));
        let c = Dep::from_str_id(pool.intern("c").unwrap());
        assert!(!pool.match_dep(and, c));
    }

    #[test]
    fn dep2str_round_trip() {
        let mut pool = Pool::new(DistType::Rpm);
        let d = pool.str2dep("libfoo >= 1.2-3").unwrap();
        assert_eq!(pool.dep2str(d), "libfoo >= 1.2-3");
        let plain = pool.str2dep("bar").unwrap();
        assert_eq!(pool.dep2str(plain), "bar");
    }
}
