#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! The package pool: interned strings, relations, solvables and the
//! provides index
//!
//! A [`Pool`] is the immutable universe a solve runs against. External
//! parsers intern package metadata into it; the solver reads it through the
//! provides index. The pool is not safe for concurrent mutation; multiple
//! readers may share it only while nothing rebuilds the index.

pub mod arch;
pub mod bitmap;
pub mod conda;
pub mod dep;
pub mod dirpool;
pub mod evr;
pub mod id;
pub mod queue;
pub mod rels;
pub mod repo;
pub mod solvable;
pub mod solvfile;
pub mod strings;
pub mod whatprovides;

pub use arch::ArchPolicy;
pub use bitmap::Map;
pub use dirpool::{DirId, DirPool};
pub use evr::EvrCmpMode;
pub use id::{Dep, DepKind, Offset, RelId, RepoId, SolvId, StrId};
pub use queue::Queue;
pub use rels::{Rel, RelPool};
pub use repo::Repo;
pub use solvable::{DepKey, Solvable};
pub use strings::StringPool;
pub use whatprovides::{FileListProvider, NamespaceAnswer, NamespaceProvider};

use solvent_errors::{PoolError, Result};

/// Reserved string ids, interned at pool creation in this order
pub mod knownids {
    use crate::id::{Dep, StrId};

    pub const ARCH_SRC: StrId = StrId(2);
    pub const ARCH_NOSRC: StrId = StrId(3);
    pub const ARCH_NOARCH: StrId = StrId(4);
    pub const NAME_SYSTEM: StrId = StrId(5);
    /// Splits a requires list into ordinary and pre-requires
    pub const PREREQ_MARKER: Dep = Dep::from_str_id(StrId(6));
    pub const NS_OTHERPROVIDERS: StrId = StrId(7);

    pub(crate) const RESERVED: &[&str] = &[
        "src",
        "nosrc",
        "noarch",
        "system:system",
        "solvable:prereqmarker",
        "namespace:otherproviders",
    ];
}

/// Version semantics selected per pool at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistType {
    #[default]
    Rpm,
    Deb,
    Conda,
    Haiku,
}

/// Pool-wide policy switches consumed by the solver and the index
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolFlags {
    /// Treat a missing epoch as `0` instead of matching any epoch
    pub promote_epoch: bool,
    /// Obsoletes match against provides, not only names
    pub obsolete_uses_provides: bool,
    /// Same-name implicit obsoletes match against provides
    pub implicit_obsolete_uses_provides: bool,
    /// Installed packages never obsolete anything
    pub no_installed_obsoletes: bool,
    /// A package conflicting with its own provides is an error
    pub forbid_selfconflicts: bool,
}

/// How far file provides have been materialized into the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileProvidesState {
    /// Nothing added; `/`-prefixed names resolve lazily
    #[default]
    None,
    /// The standard file list was added; nonstandard paths resolve lazily
    Partial,
    /// Everything is in the index, no lazy path remains
    Complete,
}

/// Per-directory disk usage carried by a package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DuEntry {
    pub dir: DirId,
    pub kbytes: u32,
    pub inodes: u32,
}

/// The shared universe of strings, relations and packages
pub struct Pool {
    pub(crate) strings: StringPool,
    pub(crate) rels: RelPool,
    pub(crate) solvables: Vec<Solvable>,
    pub(crate) repos: Vec<Repo>,
    pub(crate) installed: Option<RepoId>,
    pub(crate) arch_policy: ArchPolicy,
    pub disttype: DistType,
    pub flags: PoolFlags,

    // provides index (see whatprovides.rs)
    pub(crate) whatprovides: Vec<u32>,
    pub(crate) whatprovides_rel: Vec<u32>,
    pub(crate) whatprovidesdata: Vec<u32>,
    pub(crate) whatprovidesaux: Vec<u32>,
    pub(crate) whatprovidesauxdata: Vec<u32>,
    /// `(name id, pre-lazy offset)` pairs, sorted by name id
    pub(crate) lazywhatprovides: Vec<(u32, u32)>,
    pub(crate) whatprovides_ready: bool,

    pub(crate) namespace_callback: Option<Box<dyn NamespaceProvider>>,
    pub(crate) filelist_provider: Option<Box<dyn FileListProvider>>,
    pub(crate) fileprovides_state: FileProvidesState,
    pub(crate) considered: Option<Map>,

    pub(crate) dirpool: DirPool,
    pub(crate) diskusage: std::collections::HashMap<u32, Vec<DuEntry>>,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("strings", &self.strings.len())
            .field("rels", &self.rels.len())
            .field("solvables", &self.solvables.len())
            .field("repos", &self.repos.len())
            .field("disttype", &self.disttype)
            .finish_non_exhaustive()
    }
}

impl Default for Pool {
    fn default() -> Self {
        Self::new(DistType::Rpm)
    }
}

impl Pool {
    #[must_use]
    pub fn new(disttype: DistType) -> Self {
        let strings = StringPool::with_reserved(knownids::RESERVED);
        // solvable 0 is the null record, solvable 1 the system solvable
        let mut solvables = vec![Solvable::default(); 2];
        solvables[SolvId::SYSTEM.index()].name = knownids::NAME_SYSTEM;
        solvables[SolvId::SYSTEM.index()].arch = knownids::ARCH_NOARCH;
        solvables[SolvId::SYSTEM.index()].evr = StrId::EMPTY;

        Self {
            strings,
            rels: RelPool::new(),
            solvables,
            repos: Vec::new(),
            installed: None,
            arch_policy: ArchPolicy::new(),
            disttype,
            flags: PoolFlags::default(),
            whatprovides: Vec::new(),
            whatprovides_rel: Vec::new(),
            whatprovidesdata: Vec::new(),
            whatprovidesaux: Vec::new(),
            whatprovidesauxdata: Vec::new(),
            lazywhatprovides: Vec::new(),
            whatprovides_ready: false,
            namespace_callback: None,
            filelist_provider: None,
            fileprovides_state: FileProvidesState::default(),
            considered: None,
            dirpool: DirPool::new(),
            diskusage: std::collections::HashMap::new(),
        }
    }

    // ------------------------------------------------------------------
    // strings and relations

    /// Intern a string
    ///
    /// # Errors
    ///
    /// Fails once the id space is exhausted.
    pub fn intern(&mut self, s: &str) -> Result<StrId> {
        self.strings.intern(s)
    }

    /// Find an interned string without creating it
    #[must_use]
    pub fn find_str(&self, s: &str) -> Option<StrId> {
        self.strings.find(s)
    }

    #[must_use]
    pub fn str(&self, id: StrId) -> &str {
        self.strings.resolve(id)
    }

    #[must_use]
    pub fn nstrings(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn nrels(&self) -> usize {
        self.rels.len()
    }

    /// Intern a relation; `(name, NULL, 0)` collapses to the plain name and
    /// `ARCH` relations normalize `nosrc` to `src`
    ///
    /// # Errors
    ///
    /// Fails once the relation id space is exhausted.
    pub fn rel(&mut self, name: Dep, mut evr: Dep, flags: u8) -> Result<Dep> {
        if flags == rels::REL_ARCH && evr == Dep::from_str_id(knownids::ARCH_NOSRC) {
            evr = Dep::from_str_id(knownids::ARCH_SRC);
        }
        self.rels.intern(name, evr, flags)
    }

    /// Resolve a relation id
    ///
    /// # Errors
    ///
    /// Fails when `dep` is a plain name.
    pub fn rel_of(&self, dep: Dep) -> Result<Rel> {
        dep.as_rel_id()
            .map(|rid| self.rels.resolve(rid))
            .ok_or_else(|| PoolError::NotARelation { id: dep.raw() }.into())
    }

    /// Resolve a relation id, panicking on plain names (internal paths
    /// that already checked `is_rel`)
    #[must_use]
    pub(crate) fn rel_unchecked(&self, rid: RelId) -> Rel {
        self.rels.resolve(rid)
    }

    // ------------------------------------------------------------------
    // repos and solvables

    /// Create a new, empty repo
    pub fn add_repo(&mut self, name: &str) -> RepoId {
        let id = RepoId(u32::try_from(self.repos.len()).unwrap_or(u32::MAX));
        let first = u32::try_from(self.solvables.len()).unwrap_or(u32::MAX);
        self.repos.push(Repo::new(id, name.to_string(), first));
        id
    }

    #[must_use]
    pub fn repo(&self, id: RepoId) -> &Repo {
        &self.repos[id.index()]
    }

    pub fn repo_mut(&mut self, id: RepoId) -> &mut Repo {
        &mut self.repos[id.index()]
    }

    #[must_use]
    pub fn repos(&self) -> &[Repo] {
        &self.repos
    }

    /// Find a repo by name
    #[must_use]
    pub fn repo_by_name(&self, name: &str) -> Option<RepoId> {
        self.repos.iter().find(|r| r.name == name).map(|r| r.id)
    }

    /// Mark a repo as the installed system
    ///
    /// # Errors
    ///
    /// A pool holds at most one installed repo.
    pub fn set_installed(&mut self, repo: RepoId) -> Result<()> {
        if let Some(existing) = self.installed {
            if existing != repo {
                return Err(PoolError::DuplicateInstalledRepo {
                    repo: self.repos[existing.index()].name.clone(),
                }
                .into());
            }
        }
        self.installed = Some(repo);
        Ok(())
    }

    #[must_use]
    pub fn installed(&self) -> Option<RepoId> {
        self.installed
    }

    /// Append a fresh solvable to a repo
    ///
    /// Repos own contiguous ranges, so only the repo at the tail of the
    /// solvable vector can grow.
    ///
    /// # Errors
    ///
    /// Fails when another repo's range would be broken.
    pub fn add_solvable(&mut self, repo: RepoId) -> Result<SolvId> {
        let next = u32::try_from(self.solvables.len()).unwrap_or(u32::MAX);
        let r = &mut self.repos[repo.index()];
        if r.end != next {
            return Err(PoolError::RepoOverlap {
                repo: r.name.clone(),
            }
            .into());
        }
        r.end = next + 1;
        self.solvables.push(Solvable {
            repo: Some(repo),
            ..Solvable::default()
        });
        self.whatprovides_ready = false;
        Ok(SolvId(next))
    }

    #[must_use]
    pub fn solvable(&self, p: SolvId) -> &Solvable {
        &self.solvables[p.index()]
    }

    pub fn solvable_mut(&mut self, p: SolvId) -> &mut Solvable {
        self.whatprovides_ready = false;
        &mut self.solvables[p.index()]
    }

    #[must_use]
    pub fn nsolvables(&self) -> usize {
        self.solvables.len()
    }

    /// Iterate all live solvable ids (excluding null and system)
    pub fn solvable_ids(&self) -> impl Iterator<Item = SolvId> + '_ {
        (2..self.solvables.len())
            .map(|i| SolvId(u32::try_from(i).unwrap_or(u32::MAX)))
            .filter(|p| !self.solvables[p.index()].is_deleted())
    }

    /// True if `p` belongs to the installed repo
    #[must_use]
    pub fn is_installed(&self, p: SolvId) -> bool {
        self.installed
            .is_some_and(|r| self.repos[r.index()].contains(p))
    }

    /// Find a solvable by its `name-evr.arch` or `name-evr` rendering
    #[must_use]
    pub fn find_solvable(&self, nevra: &str) -> Option<SolvId> {
        self.solvable_ids().find(|&p| {
            let s = &self.solvables[p.index()];
            let name = self.str(s.name);
            let evr = self.str(s.evr);
            let arch = self.str(s.arch);
            nevra == format!("{name}-{evr}.{arch}") || nevra == format!("{name}-{evr}")
        })
    }

    /// `name-evr.arch` rendering of a solvable
    #[must_use]
    pub fn solvid2str(&self, p: SolvId) -> String {
        if p == SolvId::SYSTEM {
            return "@system".to_string();
        }
        let s = &self.solvables[p.index()];
        let name = self.str(s.name);
        let evr = self.str(s.evr);
        let arch = self.str(s.arch);
        if arch.is_empty() {
            format!("{name}-{evr}")
        } else {
            format!("{name}-{evr}.{arch}")
        }
    }

    // ------------------------------------------------------------------
    // architecture

    /// Configure the architecture policy for a machine architecture,
    /// e.g. `"x86_64"`
    ///
    /// # Errors
    ///
    /// Propagates intern failure.
    pub fn set_arch(&mut self, machine: &str) -> Result<()> {
        let policy = ArchPolicy::builtin_policy(machine);
        let policy = if policy.is_empty() { machine } else { policy };
        self.set_arch_policy(policy)
    }

    /// Configure an explicit `:`-separated policy, best arch first
    ///
    /// # Errors
    ///
    /// Propagates intern failure.
    pub fn set_arch_policy(&mut self, policy: &str) -> Result<()> {
        let mut ids = Vec::new();
        for a in policy.split(':').filter(|a| !a.is_empty()) {
            ids.push(self.strings.intern(a)?);
        }
        let noarch = self.strings.intern("any")?;
        self.arch_policy
            .set(&ids, &[knownids::ARCH_NOARCH, noarch, StrId::EMPTY]);
        Ok(())
    }

    /// Whether an architecture policy has been configured
    #[must_use]
    pub fn has_arch_policy(&self) -> bool {
        self.arch_policy.is_set()
    }

    /// Compatibility score of an arch id; 0 = incompatible, 1 = noarch
    #[must_use]
    pub fn arch_score(&self, arch: StrId) -> u32 {
        if self.arch_policy.is_set() {
            self.arch_policy.score(arch)
        } else if arch == knownids::ARCH_SRC || arch == knownids::ARCH_NOSRC {
            0
        } else {
            1
        }
    }

    // ------------------------------------------------------------------
    // installability

    /// Restrict the universe to the packages set in `considered`
    pub fn set_considered(&mut self, considered: Option<Map>) {
        self.considered = considered;
        self.whatprovides_ready = false;
    }

    /// True if the package may appear in solver results
    #[must_use]
    pub fn installable(&self, p: SolvId) -> bool {
        let s = &self.solvables[p.index()];
        let Some(repo) = s.repo else {
            return false;
        };
        if self.repos[repo.index()].disabled {
            return false;
        }
        if s.arch == knownids::ARCH_SRC || s.arch == knownids::ARCH_NOSRC {
            return false;
        }
        if self.arch_policy.is_set() && !self.is_installed(p) && self.arch_score(s.arch) == 0 {
            return false;
        }
        if let Some(considered) = &self.considered {
            if !considered.test(p.index()) {
                return false;
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // version comparison

    /// Compare two interned EVR strings under the pool's dist semantics
    #[must_use]
    pub fn evrcmp(&self, a: StrId, b: StrId, mode: EvrCmpMode) -> i32 {
        if a == b {
            return 0;
        }
        self.evrcmp_str(self.str(a), self.str(b), mode)
    }

    /// Compare two EVR strings under the pool's dist semantics
    #[must_use]
    pub fn evrcmp_str(&self, a: &str, b: &str, mode: EvrCmpMode) -> i32 {
        match self.disttype {
            DistType::Rpm | DistType::Haiku => {
                evr::rpm_evrcmp(a, b, mode, self.flags.promote_epoch)
            }
            DistType::Deb => evr::deb_evrcmp(a, b),
            DistType::Conda => conda::conda_evrcmp(a, b, false),
        }
    }

    /// The lax dependency-compare mode for this dist: rpm treats a missing
    /// release as "essentially equal", deb compares fully
    #[must_use]
    pub fn depcmp_mode(&self) -> EvrCmpMode {
        match self.disttype {
            DistType::Deb => EvrCmpMode::Compare,
            _ => EvrCmpMode::MatchRelease,
        }
    }

    // ------------------------------------------------------------------
    // callbacks

    pub fn set_namespace_callback(&mut self, cb: Option<Box<dyn NamespaceProvider>>) {
        self.namespace_callback = cb;
    }

    pub fn set_filelist_provider(&mut self, provider: Option<Box<dyn FileListProvider>>) {
        self.filelist_provider = provider;
    }

    /// Record how complete the file-provides data already interned is
    pub fn set_fileprovides_state(&mut self, state: FileProvidesState) {
        self.fileprovides_state = state;
        self.whatprovides_ready = false;
    }

    // ------------------------------------------------------------------
    // disk usage

    /// Attach a per-directory disk-usage vector to a package
    pub fn set_diskusage(&mut self, p: SolvId, entries: Vec<DuEntry>) {
        self.diskusage.insert(p.0, entries);
    }

    #[must_use]
    pub fn diskusage(&self, p: SolvId) -> &[DuEntry] {
        self.diskusage.get(&p.0).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn dirpool(&self) -> &DirPool {
        &self.dirpool
    }

    /// Intern a directory path for disk-usage entries
    ///
    /// # Errors
    ///
    /// Propagates intern failure.
    pub fn intern_dir(&mut self, path: &str) -> Result<DirId> {
        self.dirpool.intern_dir(&mut self.strings, path)
    }

    #[must_use]
    pub fn dir_path(&self, dir: DirId) -> String {
        self.dirpool.dir_path(&self.strings, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_pool_has_system_solvable() {
        let pool = Pool::new(DistType::Rpm);
        assert_eq!(pool.nsolvables(), 2);
        let sys = pool.solvable(SolvId::SYSTEM);
        assert_eq!(sys.name, knownids::NAME_SYSTEM);
        assert_eq!(pool.str(sys.name), "system:system");
        assert_eq!(pool.str(knownids::ARCH_NOARCH), "noarch");
    }

    #[test]
    fn repo_ranges_stay_contiguous() {
        let mut pool = Pool::new(DistType::Rpm);
        let a = pool.add_repo("a");
        let p1 = pool.add_solvable(a).unwrap();
        let p2 = pool.add_solvable(a).unwrap();
        assert_eq!(p1, SolvId(2));
        assert_eq!(p2, SolvId(3));

        let b = pool.add_repo("b");
        let p3 = pool.add_solvable(b).unwrap();
        assert_eq!(p3, SolvId(4));
        // repo a can no longer grow
        assert!(pool.add_solvable(a).is_err());
    }

    #[test]
    fn installed_repo_is_unique() {
        let mut pool = Pool::new(DistType::Rpm);
        let a = pool.add_repo("a");
        let b = pool.add_repo("b");
        pool.set_installed(a).unwrap();
        pool.set_installed(a).unwrap();
        assert!(pool.set_installed(b).is_err());
    }

    #[test]
    fn arch_nosrc_normalizes_to_src() {
        let mut pool = Pool::new(DistType::Rpm);
        let name = pool.intern("pkg").unwrap();
        let d = pool
            .rel(
                Dep::from_str_id(name),
                Dep::from_str_id(knownids::ARCH_NOSRC),
                rels::REL_ARCH,
            )
            .unwrap();
        let rel = pool.rel_of(d).unwrap();
        assert_eq!(rel.evr, Dep::from_str_id(knownids::ARCH_SRC));
    }

    #[test]
    fn evrcmp_dispatches_by_disttype() {
        let rpm = Pool::new(DistType::Rpm);
        assert!(rpm.evrcmp_str("1.0~rc1", "1.0", EvrCmpMode::Compare) < 0);
        let conda = Pool::new(DistType::Conda);
        assert!(conda.evrcmp_str("1.0post", "1.0", EvrCmpMode::Compare) > 0);
    }
}
