#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Transactions
//!
//! From the solver's final decision vector, compute the set of install and
//! erase steps, pair each install with the installed packages it replaces,
//! classify every step, and order the steps so that dependencies are
//! honored as far as cycles permit. A transaction copies what it needs and
//! may outlive the solver.

pub mod diskusage;
pub mod order;

pub use diskusage::{DuChanges, MountPoint};
pub use order::{Cycle, CycleSeverity, OrderData};

use serde::{Deserialize, Serialize};
use solvent_errors::{Result, SolveError};
use solvent_pool::{EvrCmpMode, Map, Pool, Queue, SolvId};
use solvent_solver::Solver;
use std::collections::HashMap;

/// What happens to one package
///
/// Erase-side kinds describe the installed package being removed or
/// replaced; install-side kinds describe the incoming package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepKind {
    Ignore,
    // erase side
    Erase,
    Reinstalled,
    Downgraded,
    Changed,
    Upgraded,
    Obsoleted,
    // install side
    Install,
    Reinstall,
    Downgrade,
    Change,
    Upgrade,
    Obsoletes,
    // multiversion installs never replace anything
    MultiInstall,
    MultiReinstall,
}

impl StepKind {
    /// True for kinds that remove bytes from disk
    #[must_use]
    pub const fn is_erase(self) -> bool {
        matches!(
            self,
            Self::Erase
                | Self::Reinstalled
                | Self::Downgraded
                | Self::Changed
                | Self::Upgraded
                | Self::Obsoleted
        )
    }
}

/// Show-mode flags for [`Transaction::step_kind`] and classification
pub mod showmode {
    pub const ACTIVE: u32 = 1 << 0;
    pub const ALL: u32 = 1 << 1;
    pub const OBSOLETES: u32 = 1 << 2;
    pub const MULTIINSTALL: u32 = 1 << 3;
    pub const CHANGE_IS_REINSTALL: u32 = 1 << 4;
    pub const MERGE_VENDORCHANGES: u32 = 1 << 5;
    pub const MERGE_ARCHCHANGES: u32 = 1 << 6;
}

/// One classification bucket of the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub kind: StepKind,
    pub count: usize,
    /// Set for arch/vendor change groups
    pub from_arch: Option<String>,
    pub to_arch: Option<String>,
}

/// The computed transaction
#[derive(Debug, Clone)]
pub struct Transaction {
    /// All steps: erase steps use the installed package's id, install
    /// steps the incoming package's id
    pub steps: Queue,
    /// install step -> installed ids it replaces
    obsoletes: HashMap<u32, Vec<u32>>,
    /// installed id -> the install step replacing it
    obsoleted_by: HashMap<u32, u32>,
    /// every id taking part in the transaction
    pub transactsmap: Map,
    multiversionmap: Map,
    orderdata: Option<OrderData>,
}

impl Transaction {
    /// Build a transaction from a finished, problem-free solve
    ///
    /// # Errors
    ///
    /// Fails when the solver still has open problems.
    pub fn from_solver(solver: &Solver<'_>) -> Result<Self> {
        let problems = solver.problem_count();
        if problems > 0 {
            return Err(SolveError::UnresolvedProblems { problems }.into());
        }
        Ok(Self::from_decisions(
            solver.pool(),
            solver.decisions(),
            solver.multiversion_map(),
        ))
    }

    /// Build from a raw decision queue; `multiversion` marks ids whose
    /// names may coexist in several versions
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn from_decisions(pool: &Pool, decisions: &Queue, multiversion: &Map) -> Self {
        let nsolv = pool.nsolvables();
        let mut transactsmap = Map::new(nsolv);
        let mut installs: Vec<SolvId> = Vec::new();
        let mut erases: Vec<SolvId> = Vec::new();

        for &v in decisions {
            let p = SolvId(v.unsigned_abs());
            if p == SolvId::SYSTEM || p.index() >= nsolv {
                continue;
            }
            if v > 0 && !pool.is_installed(p) {
                installs.push(p);
                transactsmap.set(p.index());
            } else if v < 0 && pool.is_installed(p) {
                erases.push(p);
                transactsmap.set(p.index());
            }
        }
        installs.sort_unstable();
        erases.sort_unstable();

        // pair each install with the installed packages it replaces
        let mut obsoletes: HashMap<u32, Vec<u32>> = HashMap::new();
        let mut obsoleted_by: HashMap<u32, u32> = HashMap::new();
        for &p in &installs {
            if multiversion.test(p.index()) {
                continue;
            }
            let s = pool.solvable(p);
            let mut replaced: Vec<u32> = Vec::new();
            for &q in &erases {
                let qs = pool.solvable(q);
                // implicit same-name obsoletes
                if qs.name == s.name {
                    replaced.push(q.0);
                    continue;
                }
                // explicit obsoletes
                let Some(repo_id) = s.repo else { continue };
                let hit = pool
                    .repo(repo_id)
                    .dep_list(s.obsoletes)
                    .any(|obs| pool.match_nevr(q, obs));
                if hit {
                    replaced.push(q.0);
                }
            }
            if replaced.is_empty() {
                continue;
            }
            // same-name pairing wins when several installs target one erase
            for &q in &replaced {
                let same_name = pool.solvable(SolvId(q)).name == s.name;
                match obsoleted_by.get(&q) {
                    None => {
                        obsoleted_by.insert(q, p.0);
                    }
                    Some(&prev) => {
                        let prev_same = pool.solvable(SolvId(prev)).name
                            == pool.solvable(SolvId(q)).name;
                        if same_name && !prev_same {
                            obsoleted_by.insert(q, p.0);
                        }
                    }
                }
            }
            obsoletes.insert(p.0, replaced);
        }

        let mut steps = Queue::new();
        for &q in &erases {
            steps.push(i32::try_from(q.0).unwrap_or(0));
        }
        for &p in &installs {
            steps.push(i32::try_from(p.0).unwrap_or(0));
        }

        Self {
            steps,
            obsoletes,
            obsoleted_by,
            transactsmap,
            multiversionmap: multiversion.clone(),
            orderdata: None,
        }
    }

    /// All installed packages replaced by the install step `p`
    #[must_use]
    pub fn obs_pkgs(&self, p: SolvId) -> Vec<SolvId> {
        self.obsoletes
            .get(&p.0)
            .map(|v| v.iter().map(|&q| SolvId(q)).collect())
            .unwrap_or_default()
    }

    /// The principal package replaced by install step `p`
    #[must_use]
    pub fn obs_pkg(&self, pool: &Pool, p: SolvId) -> Option<SolvId> {
        let list = self.obsoletes.get(&p.0)?;
        let name = pool.solvable(p).name;
        list.iter()
            .copied()
            .find(|&q| pool.solvable(SolvId(q)).name == name)
            .or_else(|| list.first().copied())
            .map(SolvId)
    }

    /// The install step replacing the erased package `q`, if any
    #[must_use]
    pub fn obsoleted_by(&self, q: SolvId) -> Option<SolvId> {
        self.obsoleted_by.get(&q.0).copied().map(SolvId)
    }

    /// The per-step kind under the given show mode
    #[must_use]
    #[allow(clippy::too_many_lines)]
    pub fn step_kind(&self, pool: &Pool, p: SolvId, mode: u32) -> StepKind {
        if !self.transactsmap.test(p.index()) {
            return StepKind::Ignore;
        }
        if pool.is_installed(p) {
            // erase side
            let Some(by) = self.obsoleted_by(p) else {
                return StepKind::Erase;
            };
            let s = pool.solvable(p);
            let bs = pool.solvable(by);
            let kind = if s.name == bs.name {
                match pool.evrcmp(bs.evr, s.evr, EvrCmpMode::Compare) {
                    x if x > 0 => StepKind::Upgraded,
                    x if x < 0 => StepKind::Downgraded,
                    _ if s.arch != bs.arch || s.vendor != bs.vendor => StepKind::Changed,
                    _ => StepKind::Reinstalled,
                }
            } else {
                StepKind::Obsoleted
            };
            if mode & showmode::CHANGE_IS_REINSTALL != 0 && kind == StepKind::Changed {
                return StepKind::Reinstalled;
            }
            kind
        } else {
            // install side
            if self.multiversionmap.test(p.index()) {
                let s = pool.solvable(p);
                let reinstall = pool
                    .installed()
                    .map(|r| {
                        pool.repo(r).solvables().any(|q| {
                            let qs = pool.solvable(q);
                            qs.name == s.name && qs.evr == s.evr && qs.arch == s.arch
                        })
                    })
                    .unwrap_or(false);
                return if reinstall {
                    StepKind::MultiReinstall
                } else {
                    StepKind::MultiInstall
                };
            }
            let Some(q) = self.obs_pkg(pool, p) else {
                return StepKind::Install;
            };
            let s = pool.solvable(p);
            let qs = pool.solvable(q);
            let kind = if s.name == qs.name {
                match pool.evrcmp(s.evr, qs.evr, EvrCmpMode::Compare) {
                    x if x > 0 => StepKind::Upgrade,
                    x if x < 0 => StepKind::Downgrade,
                    _ if s.arch != qs.arch || s.vendor != qs.vendor => StepKind::Change,
                    _ => StepKind::Reinstall,
                }
            } else {
                StepKind::Obsoletes
            };
            if mode & showmode::CHANGE_IS_REINSTALL != 0 && kind == StepKind::Change {
                return StepKind::Reinstall;
            }
            kind
        }
    }

    /// Group the steps into a classification summary
    #[must_use]
    pub fn classify(&self, pool: &Pool, mode: u32) -> Vec<ClassEntry> {
        let mut counts: HashMap<StepKind, usize> = HashMap::new();
        let mut archchanges: HashMap<(String, String), usize> = HashMap::new();
        for &v in &self.steps {
            let p = SolvId(v.unsigned_abs());
            let kind = self.step_kind(pool, p, mode);
            if kind == StepKind::Ignore {
                continue;
            }
            // the summary counts each replacement once, on the install side
            if kind.is_erase() && self.obsoleted_by(p).is_some() {
                continue;
            }
            *counts.entry(kind).or_insert(0) += 1;
            if mode & showmode::MERGE_ARCHCHANGES == 0 {
                if let Some(q) = self.obs_pkg(pool, p) {
                    let s = pool.solvable(p);
                    let qs = pool.solvable(q);
                    if s.arch != qs.arch {
                        *archchanges
                            .entry((
                                pool.str(qs.arch).to_string(),
                                pool.str(s.arch).to_string(),
                            ))
                            .or_insert(0) += 1;
                    }
                }
            }
        }
        let mut out: Vec<ClassEntry> = counts
            .into_iter()
            .map(|(kind, count)| ClassEntry {
                kind,
                count,
                from_arch: None,
                to_arch: None,
            })
            .collect();
        for ((from, to), count) in archchanges {
            out.push(ClassEntry {
                kind: StepKind::Change,
                count,
                from_arch: Some(from),
                to_arch: Some(to),
            });
        }
        out.sort_by_key(|e| (format!("{:?}", e.kind), e.from_arch.clone()));
        out
    }

    /// The packages of one classification bucket
    #[must_use]
    pub fn classified_pkgs(&self, pool: &Pool, kind: StepKind, mode: u32) -> Vec<SolvId> {
        self.steps
            .iter()
            .map(|&v| SolvId(v.unsigned_abs()))
            .filter(|&p| self.step_kind(pool, p, mode) == kind)
            .collect()
    }

    /// Order the steps; see [`order`](crate::order)
    pub fn order(&mut self, pool: &mut Pool) {
        let data = order::order_transaction(pool, self);
        self.steps = data.ordered.clone();
        self.orderdata = Some(data);
    }

    /// Cycles recorded by the last [`order`](Self::order) call
    #[must_use]
    pub fn cycles(&self) -> &[Cycle] {
        self.orderdata.as_ref().map_or(&[], |d| &d.cycles)
    }

    /// One recorded cycle, filtered by minimum severity
    #[must_use]
    pub fn cycle(&self, index: usize, min_severity: CycleSeverity) -> Option<&Cycle> {
        self.cycles()
            .iter()
            .filter(|c| c.severity >= min_severity)
            .nth(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solvent_pool::rels::REL_EQ;
    use solvent_pool::{Dep, DistType};

    /// Minimal two-repo pool: installed + available
    pub(crate) struct Fixture {
        pub pool: Pool,
        system: solvent_pool::RepoId,
        available: Option<solvent_pool::RepoId>,
        adding_installed: bool,
    }

    impl Fixture {
        pub fn new() -> Self {
            let mut pool = Pool::new(DistType::Rpm);
            let system = pool.add_repo("@system");
            pool.set_installed(system).unwrap();
            Self {
                pool,
                system,
                available: None,
                adding_installed: true,
            }
        }

        /// Repos own contiguous solvable ranges, so "available" is only
        /// created once every installed solvable has been added.
        fn available_repo(&mut self) -> solvent_pool::RepoId {
            match self.available {
                Some(repo) => repo,
                None => {
                    let repo = self.pool.add_repo("available");
                    self.available = Some(repo);
                    repo
                }
            }
        }

        pub fn installed(&mut self, name: &str, evr: &str) -> SolvId {
            assert!(self.adding_installed);
            self.add(self.system, name, evr, &[], &[], &[])
        }

        pub fn available(&mut self, name: &str, evr: &str) -> SolvId {
            self.adding_installed = false;
            let repo = self.available_repo();
            self.add(repo, name, evr, &[], &[], &[])
        }

        pub fn available_full(
            &mut self,
            name: &str,
            evr: &str,
            requires: &[&str],
            prereqs: &[&str],
            obsoletes: &[&str],
        ) -> SolvId {
            self.adding_installed = false;
            let repo = self.available_repo();
            self.add(repo, name, evr, requires, prereqs, obsoletes)
        }

        fn add(
            &mut self,
            repo: solvent_pool::RepoId,
            name: &str,
            evr: &str,
            requires: &[&str],
            prereqs: &[&str],
            obsoletes: &[&str],
        ) -> SolvId {
            let p = self.pool.add_solvable(repo).unwrap();
            let name_id = self.pool.intern(name).unwrap();
            let evr_id = self.pool.intern(evr).unwrap();
            let arch_id = self.pool.intern("x86_64").unwrap();
            let selfprov = self
                .pool
                .rel(Dep::from_str_id(name_id), Dep::from_str_id(evr_id), REL_EQ)
                .unwrap();
            let prov_off = self.pool.repo_mut(repo).add_dep_list(&[selfprov]);
            let reqs: Vec<Dep> = requires
                .iter()
                .map(|s| self.pool.str2dep(s).unwrap())
                .collect();
            let pres: Vec<Dep> = prereqs
                .iter()
                .map(|s| self.pool.str2dep(s).unwrap())
                .collect();
            let req_off = self.pool.repo_mut(repo).add_dep_list_with_marker(
                &reqs,
                solvent_pool::knownids::PREREQ_MARKER,
                &pres,
            );
            let obs: Vec<Dep> = obsoletes
                .iter()
                .map(|s| self.pool.str2dep(s).unwrap())
                .collect();
            let obs_off = self.pool.repo_mut(repo).add_dep_list(&obs);
            let s = self.pool.solvable_mut(p);
            s.name = name_id;
            s.evr = evr_id;
            s.arch = arch_id;
            s.provides = prov_off;
            s.requires = req_off;
            s.obsoletes = obs_off;
            p
        }
    }

    fn decisions(pairs: &[(SolvId, bool)]) -> Queue {
        let mut q = Queue::new();
        q.push(1); // system solvable
        for &(p, up) in pairs {
            let lit = i32::try_from(p.0).unwrap();
            q.push(if up { lit } else { -lit });
        }
        q
    }

    #[test]
    fn upgrade_pairs_and_kinds() {
        let mut fx = Fixture::new();
        let old = fx.installed("app", "1-1");
        let new = fx.available("app", "2-1");
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&[(old, false), (new, true)]),
            &Map::new(fx.pool.nsolvables()),
        );
        assert_eq!(trans.step_kind(&fx.pool, new, 0), StepKind::Upgrade);
        assert_eq!(trans.step_kind(&fx.pool, old, 0), StepKind::Upgraded);
        assert_eq!(trans.obs_pkg(&fx.pool, new), Some(old));
        assert_eq!(trans.obsoleted_by(old), Some(new));
    }

    #[test]
    fn downgrade_kind() {
        let mut fx = Fixture::new();
        let old = fx.installed("app", "2-1");
        let new = fx.available("app", "1-1");
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&[(old, false), (new, true)]),
            &Map::new(fx.pool.nsolvables()),
        );
        assert_eq!(trans.step_kind(&fx.pool, new, 0), StepKind::Downgrade);
        assert_eq!(trans.step_kind(&fx.pool, old, 0), StepKind::Downgraded);
    }

    #[test]
    fn plain_install_and_erase() {
        let mut fx = Fixture::new();
        let gone = fx.installed("legacy", "1-1");
        let fresh = fx.available("shiny", "1-1");
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&[(gone, false), (fresh, true)]),
            &Map::new(fx.pool.nsolvables()),
        );
        assert_eq!(trans.step_kind(&fx.pool, fresh, 0), StepKind::Install);
        assert_eq!(trans.step_kind(&fx.pool, gone, 0), StepKind::Erase);
    }

    #[test]
    fn explicit_obsoletes_pairing() {
        let mut fx = Fixture::new();
        let old = fx.installed("oldname", "1-1");
        let new = fx.available_full("newname", "1-1", &[], &[], &["oldname"]);
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&[(old, false), (new, true)]),
            &Map::new(fx.pool.nsolvables()),
        );
        assert_eq!(trans.step_kind(&fx.pool, new, 0), StepKind::Obsoletes);
        assert_eq!(trans.step_kind(&fx.pool, old, 0), StepKind::Obsoleted);
    }

    #[test]
    fn multiversion_install_keeps_old() {
        let mut fx = Fixture::new();
        let old = fx.installed("kernel", "1-1");
        let new = fx.available("kernel", "3-1");
        let mut mv = Map::new(fx.pool.nsolvables());
        mv.set(new.index());
        mv.set(old.index());
        let trans =
            Transaction::from_decisions(&fx.pool, &decisions(&[(new, true)]), &mv);
        assert_eq!(trans.step_kind(&fx.pool, new, 0), StepKind::MultiInstall);
        // old stays: not part of the transaction at all
        assert_eq!(trans.step_kind(&fx.pool, old, 0), StepKind::Ignore);
        assert!(trans.obs_pkg(&fx.pool, new).is_none());
    }

    #[test]
    fn classify_counts_replacements_once() {
        let mut fx = Fixture::new();
        let old = fx.installed("app", "1-1");
        let new = fx.available("app", "2-1");
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&[(old, false), (new, true)]),
            &Map::new(fx.pool.nsolvables()),
        );
        let classes = trans.classify(&fx.pool, 0);
        assert_eq!(classes.len(), 1);
        assert_eq!(classes[0].kind, StepKind::Upgrade);
        assert_eq!(classes[0].count, 1);
    }
}
