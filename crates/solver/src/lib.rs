#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! The dependency solver
//!
//! Translates package metadata and user jobs into CNF rules, runs a
//! CDCL search with package-aware branching over them, and either yields a
//! decision vector for the transaction builder or a set of problems with
//! user-selectable solutions.
//!
//! A solver is created per solve and borrows the pool mutably for its
//! lifetime (rule literals live in the pool's shared arena). `solve()`
//! always returns; callers inspect the problem count, walk
//! problems/solutions, optionally apply one and re-run.

mod cdcl;
pub mod job;
pub mod policy;
pub mod problems;
pub mod rules;
pub mod select;
mod rulegen;

pub use job::{jobflags, jobtype, select as jobselect, Job};
pub use problems::{Problem, Solution, SolutionElement};
pub use rules::{Rule, RuleClass, RuleInfo, RuleRanges};
pub use select::{selection_make, Selection, SelectionFlags};

use solvent_errors::{Result, SolveError};
use solvent_pool::{Map, Pool, Queue, SolvId};
use std::collections::HashMap;
use tracing::{debug, info};

/// Policy switches for one solver run
#[derive(Debug, Clone, Copy)]
pub struct SolverFlags {
    /// Permit replacing an installed package with an older version
    pub allow_downgrade: bool,
    /// Permit replacing an installed package with one of another arch
    pub allow_arch_change: bool,
    /// Permit replacing an installed package with one of another vendor
    pub allow_vendor_change: bool,
    /// Permit removing installed packages to satisfy jobs
    pub allow_uninstall: bool,
    /// Restart the search after this many conflicts (0 = never); learnt
    /// rules survive the restart
    pub restart_interval: u32,
    /// Do not install recommended packages in the weak phase
    pub ignore_recommended: bool,
}

impl Default for SolverFlags {
    fn default() -> Self {
        Self {
            allow_downgrade: false,
            allow_arch_change: false,
            allow_vendor_change: false,
            allow_uninstall: false,
            restart_interval: 1000,
            ignore_recommended: false,
        }
    }
}

/// Counters reported through tracing after each solve
#[derive(Debug, Clone, Copy, Default)]
pub struct SolverStats {
    pub decisions: u64,
    pub propagations: u64,
    pub conflicts: u64,
    pub learnt: u64,
    pub restarts: u64,
}

/// The CDCL dependency solver
pub struct Solver<'a> {
    pool: &'a mut Pool,
    pub flags: SolverFlags,
    jobs: Vec<Job>,

    // rules, index 0 is a placeholder
    pub(crate) rules: Vec<rules::Rule>,
    pub(crate) ranges: rules::RuleRanges,
    pub(crate) pkg_info: Vec<rules::RuleInfo>,
    /// job index per rule in the job range
    pub(crate) rule_to_job: HashMap<usize, usize>,

    // engine state
    pub(crate) decisionmap: Vec<i32>,
    pub(crate) decisionq: Queue,
    pub(crate) decisionq_why: Queue,
    pub(crate) propagate_index: usize,
    pub(crate) watches: Vec<u32>,
    pub(crate) learnt_why: Vec<usize>,
    pub(crate) learnt_pool: Vec<i32>,

    // problem state
    pub(crate) problems: Vec<i32>,
    pub(crate) problem_descriptions: Vec<String>,
    pub(crate) unrecoverable: bool,
    pub(crate) choice_disabled_this_pass: bool,

    // job-derived maps
    pub(crate) multiversion: Map,
    pub(crate) noupdate: Map,
    pub(crate) update_all: bool,
    pub(crate) update_targets: HashMap<u32, Vec<u32>>,
    pub(crate) dup_all: bool,
    pub(crate) dup_involved: bool,
    pub(crate) favored: HashMap<u32, i32>,
    pub(crate) allowuninstall_map: Map,
    pub(crate) allowuninstall_all: bool,
    pub(crate) fix_map: Map,
    pub(crate) cleandeps_targets: Vec<SolvId>,

    pub(crate) recommends_index: usize,
    pub(crate) weak_dont_retry: Map,
    pub(crate) cleandeps_active: bool,

    pub(crate) stats: SolverStats,
    interrupt: Option<Box<dyn Fn() -> bool + 'a>>,
}

impl std::fmt::Debug for Solver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("rules", &self.rules.len())
            .field("decisions", &self.decisionq.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl<'a> Solver<'a> {
    pub fn new(pool: &'a mut Pool) -> Self {
        Self {
            pool,
            flags: SolverFlags::default(),
            jobs: Vec::new(),
            rules: vec![rules::Rule::default()],
            ranges: rules::RuleRanges::default(),
            pkg_info: vec![rules::RuleInfo::Other],
            rule_to_job: HashMap::new(),
            decisionmap: Vec::new(),
            decisionq: Queue::new(),
            decisionq_why: Queue::new(),
            propagate_index: 0,
            watches: Vec::new(),
            learnt_why: Vec::new(),
            learnt_pool: Vec::new(),
            problems: Vec::new(),
            problem_descriptions: Vec::new(),
            unrecoverable: false,
            choice_disabled_this_pass: false,
            multiversion: Map::default(),
            noupdate: Map::default(),
            update_all: false,
            update_targets: HashMap::new(),
            dup_all: false,
            dup_involved: false,
            favored: HashMap::new(),
            allowuninstall_map: Map::default(),
            allowuninstall_all: false,
            fix_map: Map::default(),
            cleandeps_targets: Vec::new(),
            recommends_index: usize::MAX,
            weak_dont_retry: Map::default(),
            cleandeps_active: false,
            stats: SolverStats::default(),
            interrupt: None,
        }
    }

    #[must_use]
    pub fn pool(&self) -> &Pool {
        self.pool
    }

    pub fn pool_mut(&mut self) -> &mut Pool {
        self.pool
    }

    /// Install a cooperative interrupt; checked at safe points in the
    /// outer loop
    pub fn set_interrupt(&mut self, f: Option<Box<dyn Fn() -> bool + 'a>>) {
        self.interrupt = f;
    }

    fn interrupted(&self) -> bool {
        self.interrupt.as_ref().is_some_and(|f| f())
    }

    /// The jobs of the current solve
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Current truth value of a package: positive level if decided true,
    /// negative if false, 0 if undecided
    #[must_use]
    pub fn decision_for(&self, p: SolvId) -> i32 {
        self.decisionmap.get(p.index()).copied().unwrap_or(0)
    }

    /// The trail of decisions, as signed solvable literals
    #[must_use]
    pub fn decisions(&self) -> &Queue {
        &self.decisionq
    }

    /// The multiversion map of the last solve, for the transaction builder
    #[must_use]
    pub fn multiversion_map(&self) -> &Map {
        &self.multiversion
    }

    #[must_use]
    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    /// Run the solve; returns the number of problems found (0 = success)
    ///
    /// # Errors
    ///
    /// [`SolveError::Cancelled`] when the interrupt fired; internal
    /// invariant violations surface as errors instead of panics.
    pub fn solve(&mut self, jobs: Vec<Job>) -> Result<usize> {
        if !self.pool.whatprovides_ready() {
            self.pool.create_whatprovides();
        }
        let nsolv = self.pool.nsolvables();
        self.jobs = jobs;
        self.rules = vec![rules::Rule::default()];
        self.pkg_info = vec![rules::RuleInfo::Other];
        self.rule_to_job.clear();
        self.decisionmap = vec![0; nsolv];
        self.decisionq.clear();
        self.decisionq_why.clear();
        self.propagate_index = 0;
        self.learnt_why.clear();
        self.learnt_pool.clear();
        self.problems.clear();
        self.problem_descriptions.clear();
        self.unrecoverable = false;
        self.choice_disabled_this_pass = false;
        self.multiversion = Map::new(nsolv);
        self.noupdate = Map::new(nsolv);
        self.update_all = false;
        self.update_targets.clear();
        self.dup_all = false;
        self.dup_involved = false;
        self.favored.clear();
        self.allowuninstall_map = Map::new(nsolv);
        self.allowuninstall_all = false;
        self.fix_map = Map::new(nsolv);
        self.cleandeps_targets.clear();
        self.weak_dont_retry = Map::new(nsolv);
        self.recommends_index = usize::MAX;
        self.stats = SolverStats::default();

        self.preprocess_jobs()?;
        self.generate_rules()?;
        self.ranges.learnt = self.rules.len();
        self.ranges.end = self.rules.len();

        self.decide_system_solvable();
        self.make_watches();
        self.make_rule_decisions();

        info!(
            rules = self.rules.len(),
            jobs = self.jobs.len(),
            "starting solver run"
        );
        self.run(true, true)?;
        if self.problem_count() == 0 {
            self.cleandeps_sweep()?;
        }
        let problems = self.problem_count();
        debug!(
            decisions = self.stats.decisions,
            conflicts = self.stats.conflicts,
            learnt = self.stats.learnt,
            problems,
            "solver run finished"
        );
        Ok(problems)
    }

    pub(crate) fn decide_system_solvable(&mut self) {
        if self.decisionmap[SolvId::SYSTEM.index()] == 0 {
            self.decide(i32::try_from(SolvId::SYSTEM.0).unwrap_or(1), 1, 0);
        }
    }

    /// Apply all enabled assertion rules as level-1 decisions; conflicting
    /// assertions become problems right away
    pub(crate) fn make_rule_decisions(&mut self) {
        let mut restart = true;
        while restart {
            restart = false;
            for idx in 1..self.rules.len() {
                let r = self.rules[idx];
                if r.is_disabled() || r.p == 0 || !r.is_assertion() {
                    continue;
                }
                let v = r.p;
                let vv = v.unsigned_abs() as usize;
                if self.decisionmap[vv] == 0 {
                    self.decide(v, 1, idx);
                    continue;
                }
                if self.decisionmap_true(v) {
                    continue;
                }
                // conflicting assertion: find the earlier decision's rule
                let pos = self
                    .decisionq
                    .iter()
                    .position(|&d| d.unsigned_abs() as usize == vv);
                let other_why =
                    pos.map_or(0, |i| usize::try_from(self.decisionq_why[i]).unwrap_or(0));
                let start = self.problems.len();
                for &widx in &[other_why, idx] {
                    if widx != 0 && self.ranges.class_of(widx).is_disableable() {
                        self.problems.push(i32::try_from(widx).unwrap_or(0));
                    }
                }
                // the pkg-rule side carries the informative message
                let describe_idx = if other_why != 0
                    && self.ranges.class_of(other_why) == rules::RuleClass::Pkg
                {
                    other_why
                } else {
                    idx
                };
                if self.problems.len() == start {
                    // nothing can be disabled: record both for reporting
                    if other_why != 0 {
                        self.problems.push(i32::try_from(other_why).unwrap_or(0));
                    }
                    self.problems.push(i32::try_from(idx).unwrap_or(0));
                    self.problems.push(0);
                    self.problem_descriptions.push(self.describe_rule(describe_idx));
                    self.unrecoverable = true;
                    continue;
                }
                let to_disable: Vec<i32> = self.problems[start..].to_vec();
                self.problems.push(0);
                self.problem_descriptions.push(self.describe_rule(describe_idx));
                for ridx in to_disable {
                    self.disable_problem_rule(usize::try_from(ridx).unwrap_or(0));
                }
                // start over with the reduced rule set
                while let Some(v) = self.decisionq.last() {
                    self.decisionmap[v.unsigned_abs() as usize] = 0;
                    self.decisionq.pop();
                    self.decisionq_why.pop();
                }
                self.propagate_index = 0;
                self.decide_system_solvable();
                restart = true;
                break;
            }
        }
    }

    /// The staged solver loop: keep installed, update, decide remaining
    /// rules, then weak dependencies
    #[allow(clippy::too_many_lines)]
    pub(crate) fn run(&mut self, disablerules: bool, doweak: bool) -> Result<()> {
        let mut level: i32 = 1;
        let mut systemlevel: i32 = 2;
        let installed_range = self
            .pool
            .installed()
            .map(|r| (self.pool.repo(r).start, self.pool.repo(r).end));

        loop {
            if self.interrupted() {
                return Err(SolveError::Cancelled.into());
            }

            // level-1 propagation; conflicts here are problems
            if level == 1 {
                if let Some(conflict) = self.propagate(1) {
                    self.analyze_unsolvable(conflict, disablerules);
                    if self.unrecoverable || !disablerules {
                        return Ok(());
                    }
                    continue;
                }
            }

            // stage: installed packages (keep, then update)
            if let Some((start, end)) = installed_range {
                if level < systemlevel {
                    let mut hard_restart = false;
                    let mut progressed = true;
                    while progressed && !hard_restart {
                        progressed = false;
                        // keep installed packages that nothing wants changed
                        for i in start..end {
                            let p = i as usize;
                            if self.decisionmap[p] != 0 || self.pool.solvable(SolvId(i)).is_deleted()
                            {
                                continue;
                            }
                            if self.wants_update(i) {
                                continue; // decided in the update pass below
                            }
                            let olevel = level;
                            level = self.set_propagate_learn(
                                level,
                                i32::try_from(i).unwrap_or(0),
                                disablerules,
                            );
                            if level == 0 {
                                if self.unrecoverable || !disablerules {
                                    return Ok(());
                                }
                                hard_restart = true;
                                break;
                            }
                            if level <= olevel {
                                progressed = true;
                            }
                        }
                        if hard_restart {
                            break;
                        }
                        // update pass: pick the best candidate allowed by
                        // the update rule
                        for i in start..end {
                            let p = i as usize;
                            if self.decisionmap[p] > 0 || self.pool.solvable(SolvId(i)).is_deleted()
                            {
                                continue;
                            }
                            let uidx = self.ranges.update + (i - start) as usize;
                            if uidx >= self.ranges.feature {
                                continue;
                            }
                            let r = self.rules[uidx];
                            if r.p == 0 || r.is_disabled() {
                                continue;
                            }
                            let mut dq = Queue::new();
                            let mut fulfilled = false;
                            for v in self.rule_literals(&r) {
                                if v > 0 {
                                    if self.decisionmap_true(v) {
                                        fulfilled = true;
                                        break;
                                    }
                                    if self.decisionmap[v.unsigned_abs() as usize] == 0 {
                                        dq.push(v);
                                    }
                                }
                            }
                            if fulfilled || dq.is_empty() {
                                continue;
                            }
                            self.prune_to_best(&mut dq);
                            let choice = dq[0];
                            let olevel = level;
                            level = self.set_propagate_learn(level, choice, disablerules);
                            if level == 0 {
                                if self.unrecoverable || !disablerules {
                                    return Ok(());
                                }
                                hard_restart = true;
                                break;
                            }
                            if level <= olevel {
                                progressed = true;
                            }
                        }
                    }
                    if hard_restart {
                        level = 1;
                        systemlevel = 2;
                        continue;
                    }
                    systemlevel = level.max(1);
                    continue;
                }
            }

            // stage: decide remaining unfulfilled rules
            let mut decided_any = false;
            let nrules = self.rules.len();
            let mut restart_outer = false;
            for idx in 1..nrules {
                let r = self.rules[idx];
                if r.is_disabled() || r.p == 0 || r.is_assertion() {
                    continue;
                }
                let mut dq = Queue::new();
                if r.d == 0 {
                    // binary: need two positive undecided literals
                    if r.p < 0 || r.w2 <= 0 {
                        continue;
                    }
                    if self.decisionmap[r.p.unsigned_abs() as usize] != 0
                        || self.decisionmap[r.w2.unsigned_abs() as usize] != 0
                    {
                        continue;
                    }
                    dq.push(r.p);
                    dq.push(r.w2);
                } else {
                    // only decide rules where every negative literal is
                    // already violated-by-installation (its package is
                    // true) and no positive literal holds yet; what
                    // remains are the undecided positive candidates
                    let mut skip = false;
                    for v in self.rule_literals(&r) {
                        let vv = v.unsigned_abs() as usize;
                        if v < 0 {
                            if self.decisionmap[vv] <= 0 {
                                skip = true;
                                break;
                            }
                        } else {
                            if self.decisionmap[vv] > 0 {
                                skip = true;
                                break;
                            }
                            if self.decisionmap[vv] == 0 {
                                dq.push(v);
                            }
                        }
                    }
                    if skip || dq.is_empty() {
                        continue;
                    }
                }
                if dq.len() > 1 {
                    self.prune_to_best(&mut dq);
                }
                let choice = dq[0];
                level = self.set_propagate_learn(level, choice, disablerules);
                if level == 0 {
                    if self.unrecoverable || !disablerules {
                        return Ok(());
                    }
                    restart_outer = true;
                    level = 1;
                    break;
                }
                if level < systemlevel {
                    restart_outer = true;
                    break;
                }
                // every decision (or backjump) warrants a clean re-pass so
                // rules made branchable by it are not missed
                decided_any = true;
            }
            if restart_outer || decided_any {
                continue;
            }

            // stage: weak dependencies (recommends / supplements)
            if doweak && self.problem_count() == 0 && !self.flags.ignore_recommended {
                if let Some(p) = self.pick_weak_candidate() {
                    let olevel = level;
                    let problems_before = self.problems.len();
                    level = self.set_propagate_learn(level, p, false);
                    if level == 0 || level < olevel {
                        // weak failures roll back and are not fatal
                        self.weak_dont_retry.set(p.unsigned_abs() as usize);
                        self.problems.truncate(problems_before);
                        self.unrecoverable = false;
                        if level == 0 {
                            self.revert(olevel);
                            level = olevel;
                        }
                    }
                    continue;
                }
            }
            break;
        }
        Ok(())
    }

    /// Is an installed package scheduled for update or distupgrade?
    pub(crate) fn wants_update(&self, p: u32) -> bool {
        if self.noupdate.test(p as usize) {
            return false;
        }
        self.update_all || self.dup_all || self.update_targets.contains_key(&p)
    }

    /// Guards against re-entering the cleandeps sweep from its own re-runs
    pub(crate) fn cleandeps_guard(&mut self) -> bool {
        if self.cleandeps_active {
            return false;
        }
        self.cleandeps_active = true;
        true
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;
    use solvent_pool::rels::REL_EQ;
    use solvent_pool::{Dep, DistType};

    /// Tiny fixture: a pool with an `@system` repo and an `available` repo
    pub struct TestPool {
        pub pool: Pool,
        system: solvent_pool::RepoId,
        available: Option<solvent_pool::RepoId>,
        system_open: bool,
    }

    impl TestPool {
        pub fn new() -> Self {
            let mut pool = Pool::new(DistType::Rpm);
            let system = pool.add_repo("@system");
            pool.set_installed(system).unwrap();
            Self {
                pool,
                system,
                available: None,
                system_open: true,
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

        fn add(
            &mut self,
            repo: solvent_pool::RepoId,
            name: &str,
            evr: &str,
            requires: &[&str],
            conflicts: &[&str],
            provides: &[&str],
        ) -> SolvId {
            let p = self.pool.add_solvable(repo).unwrap();
            let name_id = self.pool.intern(name).unwrap();
            let evr_id = self.pool.intern(evr).unwrap();
            let arch_id = self.pool.intern("x86_64").unwrap();
            let selfprov = self
                .pool
                .rel(Dep::from_str_id(name_id), Dep::from_str_id(evr_id), REL_EQ)
                .unwrap();
            let mut prov = vec![selfprov];
            for s in provides {
                let d = self.pool.str2dep(s).unwrap();
                prov.push(d);
            }
            let mut reqs = Vec::new();
            for s in requires {
                let d = self.pool.str2dep(s).unwrap();
                reqs.push(d);
            }
            let mut cons = Vec::new();
            for s in conflicts {
                let d = self.pool.str2dep(s).unwrap();
                cons.push(d);
            }
            let prov_off = self.pool.repo_mut(repo).add_dep_list(&prov);
            let req_off = self.pool.repo_mut(repo).add_dep_list(&reqs);
            let con_off = self.pool.repo_mut(repo).add_dep_list(&cons);
            let s = self.pool.solvable_mut(p);
            s.name = name_id;
            s.evr = evr_id;
            s.arch = arch_id;
            s.provides = prov_off;
            s.requires = req_off;
            s.conflicts = con_off;
            p
        }

        /// Add an installed package (must precede any `add_available`)
        pub fn add_installed(&mut self, name: &str, evr: &str) -> SolvId {
            assert!(self.system_open, "installed packages must be added first");
            self.add(self.system, name, evr, &[], &[], &[])
        }

        pub fn add_available(
            &mut self,
            name: &str,
            evr: &str,
            requires: &[&str],
            conflicts: &[&str],
        ) -> SolvId {
            self.system_open = false;
            let repo = self.available_repo();
            self.add(repo, name, evr, requires, conflicts, &[])
        }

        pub fn add_available_providing(
            &mut self,
            name: &str,
            evr: &str,
            provides: &[&str],
        ) -> SolvId {
            self.system_open = false;
            let repo = self.available_repo();
            self.add(repo, name, evr, &[], &[], provides)
        }

        pub fn solver(&mut self) -> Solver<'_> {
            self.pool.create_whatprovides();
            Solver::new(&mut self.pool)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tests_support::TestPool;
    use super::*;

    #[test]
    fn empty_pool_empty_jobs_no_problems() {
        let mut pool = Pool::default();
        pool.create_whatprovides();
        let mut solver = Solver::new(&mut pool);
        let problems = solver.solve(Vec::new()).unwrap();
        assert_eq!(problems, 0);
        // only the system solvable is decided
        assert_eq!(solver.decisions().len(), 1);
    }

    #[test]
    fn install_with_requires_chain() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["libfoo"], &[]);
        tp.add_available_providing("libfoo-pkg", "1-1", &["libfoo"]);
        let mut solver = tp.solver();
        let name = solver.pool().find_str("a").unwrap();
        let problems = solver
            .solve(vec![Job::install_name(solvent_pool::Dep::from_str_id(
                name,
            ))])
            .unwrap();
        assert_eq!(problems, 0);
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let lib = solver.pool().find_solvable("libfoo-pkg-1-1.x86_64").unwrap();
        assert!(solver.decision_for(a) > 0);
        assert!(solver.decision_for(lib) > 0);
    }

    #[test]
    fn conflict_produces_problem_not_panic() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &[], &["b"]);
        tp.add_available("b", "1-1", &[], &[]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let b = solver.pool().find_solvable("b-1-1.x86_64").unwrap();
        let problems = solver.solve(vec![Job::install(a), Job::install(b)]).unwrap();
        assert_eq!(problems, 1);
    }

    #[test]
    fn install_missing_provider_is_a_problem() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["nothing-has-this"], &[]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let problems = solver.solve(vec![Job::install(a)]).unwrap();
        assert_eq!(problems, 1);
    }

    #[test]
    fn installed_packages_stay_by_default() {
        let mut tp = TestPool::new();
        let old = tp.add_installed("keepme", "1-1");
        tp.add_available("keepme", "2-1", &[], &[]);
        let mut solver = tp.solver();
        let problems = solver.solve(Vec::new()).unwrap();
        assert_eq!(problems, 0);
        assert!(solver.decision_for(old) > 0);
    }

    #[test]
    fn update_all_picks_newer_version() {
        let mut tp = TestPool::new();
        let old = tp.add_installed("app", "1-1");
        let newer = tp.add_available("app", "2-1", &[], &[]);
        let mut solver = tp.solver();
        let problems = solver.solve(vec![Job::update_all()]).unwrap();
        assert_eq!(problems, 0);
        assert!(solver.decision_for(newer) > 0, "newer version installed");
        assert!(solver.decision_for(old) < 0, "old version replaced");
    }

    #[test]
    fn deterministic_reruns() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["cap"], &[]);
        tp.add_available_providing("p1", "1-1", &["cap"]);
        tp.add_available_providing("p2", "1-1", &["cap"]);
        let name = tp.pool.find_str("a").unwrap();
        let job = Job::install_name(solvent_pool::Dep::from_str_id(name));

        let first: Vec<i32> = {
            let mut solver = tp.solver();
            solver.solve(vec![job]).unwrap();
            solver.decisions().iter().copied().collect()
        };
        let second: Vec<i32> = {
            let mut solver = tp.solver();
            solver.solve(vec![job]).unwrap();
            solver.decisions().iter().copied().collect()
        };
        assert_eq!(first, second);
    }

    #[test]
    fn cancellation_surfaces_as_error() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &[], &[]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        solver.set_interrupt(Some(Box::new(|| true)));
        let err = solver.solve(vec![Job::install(a)]);
        assert!(matches!(
            err,
            Err(solvent_errors::Error::Solve(SolveError::Cancelled))
        ));
    }
}
