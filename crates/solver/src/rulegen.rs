//! Rule generation
//!
//! Walks the transitive closure of packages reachable from the installed
//! set and the job targets ("addedmap"), emitting pkg rules for their
//! metadata, then job rules, update/feature rules for the installed repo
//! and the policy rule blocks (infarch, dup, best, yumobs, choice). The
//! rule set only mentions packages relevant to the instance.

use crate::job::{jobflags, jobtype, select, Job};
use crate::rules::{rule_sort_key, Rule, RuleInfo};
use crate::Solver;
use solvent_errors::Result;
use solvent_pool::knownids;
use solvent_pool::solvable::DepKey;
use solvent_pool::{Dep, Map, Offset, SolvId};
use std::collections::HashMap;
use tracing::debug;

impl Solver<'_> {
    /// Digest non-rule jobs into the solver's maps
    #[allow(clippy::too_many_lines)]
    pub(crate) fn preprocess_jobs(&mut self) -> Result<()> {
        let jobs = self.jobs.clone();
        for job in &jobs {
            match job.job_type() {
                jobtype::MULTIVERSION => {
                    for q in self.job_candidates(job) {
                        self.multiversion.set(q as usize);
                    }
                }
                jobtype::FAVOR | jobtype::DISFAVOR => {
                    let weight = if job.job_type() == jobtype::FAVOR { 1 } else { -1 };
                    for q in self.job_candidates(job) {
                        self.favored.insert(q, weight);
                    }
                }
                jobtype::ALLOWUNINSTALL => {
                    if job.selection() == select::SOLVABLE_ALL {
                        self.allowuninstall_all = true;
                    } else {
                        for q in self.job_candidates(job) {
                            self.allowuninstall_map.set(q as usize);
                        }
                    }
                }
                jobtype::UPDATE => {
                    if job.selection() == select::SOLVABLE_ALL {
                        self.update_all = true;
                    } else {
                        for q in self.job_candidates(job) {
                            self.mark_update_target(SolvId(q), job.has_flag(jobflags::TARGETED));
                        }
                    }
                }
                jobtype::DISTUPGRADE => {
                    self.dup_involved = true;
                    if job.selection() == select::SOLVABLE_ALL {
                        self.dup_all = true;
                    } else {
                        for q in self.job_candidates(job) {
                            self.mark_update_target(SolvId(q), true);
                        }
                    }
                }
                jobtype::VERIFY => {
                    for q in self.job_candidates(job) {
                        if self.pool.is_installed(SolvId(q)) {
                            self.fix_map.set(q as usize);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Remember that an installed package may be swapped for an update;
    /// non-installed targets register against their installed counterpart
    fn mark_update_target(&mut self, q: SolvId, targeted: bool) {
        if self.pool.is_installed(q) {
            self.update_targets.entry(q.0).or_default();
            return;
        }
        let name = self.pool.solvable(q).name;
        let installed: Vec<u32> = self
            .pool
            .installed()
            .map(|r| {
                self.pool
                    .repo(r)
                    .solvables()
                    .filter(|&i| self.pool.solvable(i).name == name)
                    .map(|i| i.0)
                    .collect()
            })
            .unwrap_or_default();
        for i in installed {
            let entry = self.update_targets.entry(i).or_default();
            if targeted {
                entry.push(q.0);
            }
        }
    }

    /// Resolve a job's selection to concrete solvable ids
    pub(crate) fn job_candidates(&mut self, job: &Job) -> Vec<u32> {
        match job.selection() {
            select::SOLVABLE => vec![job.what],
            select::SOLVABLE_NAME => {
                let dep = job.what_dep();
                let off = self.pool.whatprovides(dep);
                self.pool
                    .providers_at(off)
                    .iter()
                    .copied()
                    .filter(|&q| self.pool.match_nevr(SolvId(q), dep))
                    .collect()
            }
            select::SOLVABLE_PROVIDES => {
                let off = self.pool.whatprovides(job.what_dep());
                self.pool.providers_at(off).to_vec()
            }
            select::SOLVABLE_ONE_OF => self.pool.providers_at(Offset(job.what)).to_vec(),
            select::SOLVABLE_REPO => self
                .pool
                .repo(job.what_repo())
                .solvables()
                .map(|p| p.0)
                .collect(),
            select::SOLVABLE_ALL => {
                // "all" binds to the installed universe for erase-like
                // jobs and to every package otherwise
                match job.job_type() {
                    jobtype::ERASE
                    | jobtype::UPDATE
                    | jobtype::DISTUPGRADE
                    | jobtype::VERIFY
                    | jobtype::ALLOWUNINSTALL => self
                        .pool
                        .installed()
                        .map(|r| self.pool.repo(r).solvables().map(|p| p.0).collect())
                        .unwrap_or_default(),
                    _ => self.pool.solvable_ids().map(|p| p.0).collect(),
                }
            }
            _ => Vec::new(),
        }
    }

    /// Add one rule; see the rule encoding in [`crate::rules`]
    ///
    /// `d < 0` is a direct second literal (binary rule), `d > 0` an offset
    /// into the shared literal arena. Self-fulfilling and self-conflicting
    /// rules are dropped.
    pub(crate) fn add_rule(&mut self, p: i32, d: i32, info: RuleInfo) -> Option<usize> {
        let mut d = d;
        let mut w2;
        if d < 0 {
            // binary conflict rule
            if p == d {
                return None;
            }
            w2 = d;
            d = 0;
        } else if d == 0 {
            w2 = 0;
        } else {
            let lits = self
                .pool
                .providers_at(Offset(u32::try_from(d).unwrap_or(0)))
                .to_vec();
            if lits.iter().any(|&raw| crate::cdcl::reinterpret_literal(raw) == -p) {
                return None; // self-fulfilling
            }
            if lits.len() == 1 {
                w2 = crate::cdcl::reinterpret_literal(lits[0]);
                d = 0;
            } else {
                w2 = crate::cdcl::reinterpret_literal(lits[0]);
            }
        }
        let mut p = p;
        if d == 0 && w2 != 0 && p > w2 {
            // order binary literals for cheap duplicate detection
            std::mem::swap(&mut p, &mut w2);
        }
        // prune immediate duplicates of the previous rule
        if let Some(last) = self.rules.last() {
            if last.p == p && last.d == d && last.w2 == w2 && self.rules.len() > 1 {
                return Some(self.rules.len() - 1);
            }
        }
        let idx = self.rules.len();
        self.rules.push(Rule {
            p,
            d,
            w1: p,
            w2,
            n1: 0,
            n2: 0,
        });
        self.pkg_info.push(info);
        Some(idx)
    }

    /// Does any installed package provide the dependency right now?
    fn installed_provider_exists(&mut self, dep: Dep) -> bool {
        let off = self.pool.whatprovides(dep);
        self.pool
            .providers_at(off)
            .iter()
            .any(|&q| self.pool.is_installed(SolvId(q)))
    }

    /// Emit the pkg rules for a package and everything reachable from it
    #[allow(clippy::too_many_lines)]
    pub(crate) fn add_pkg_rules_for_solvable(&mut self, start: SolvId, addedmap: &mut Map) {
        let mut work = vec![start];
        while let Some(n) = work.pop() {
            if addedmap.test(n.index()) {
                continue;
            }
            addedmap.set(n.index());
            let nlit = i32::try_from(n.0).unwrap_or(0);
            let s = *self.pool.solvable(n);
            let installed = self.pool.is_installed(n);
            // tolerate pre-existing breakage on installed packages unless a
            // verify job asked to fix them
            let dontfix = installed && !self.fix_map.test(n.index());

            if !installed && !self.pool.installable(n) {
                self.add_rule(-nlit, 0, RuleInfo::NotInstallable { p: n });
                continue;
            }

            let Some(repo_id) = s.repo else { continue };

            // requires (ordinary and pre-requires alike)
            let reqs: Vec<Dep> = self
                .pool
                .repo(repo_id)
                .dep_list(s.requires)
                .filter(|&d| d != knownids::PREREQ_MARKER)
                .collect();
            for req in reqs {
                let off = self.pool.whatprovides(req);
                let providers = self.pool.providers_at(off).to_vec();
                if providers.is_empty() {
                    if dontfix && !self.installed_provider_exists(req) {
                        continue; // was already broken before this solve
                    }
                    if !dontfix {
                        self.add_rule(-nlit, 0, RuleInfo::NothingProvidesDep { p: n, dep: req });
                    }
                    continue;
                }
                if dontfix && !providers.iter().any(|&q| self.pool.is_installed(SolvId(q))) {
                    continue;
                }
                self.add_rule(
                    -nlit,
                    i32::try_from(off.0).unwrap_or(0),
                    RuleInfo::Requires { p: n, dep: req },
                );
                for &q in &providers {
                    work.push(SolvId(q));
                }
            }

            // conflicts
            let cons: Vec<Dep> = self.pool.repo(repo_id).dep_list(s.conflicts).collect();
            for con in cons {
                let off = self.pool.whatprovides(con);
                for &q in &self.pool.providers_at(off).to_vec() {
                    let qs = SolvId(q);
                    if qs == n {
                        if self.pool.flags.forbid_selfconflicts {
                            self.add_rule(-nlit, 0, RuleInfo::SelfConflict { p: n, dep: con });
                        }
                        continue;
                    }
                    if dontfix && self.pool.is_installed(qs) {
                        continue; // both already coexist on the system
                    }
                    let qlit = i32::try_from(q).unwrap_or(0);
                    self.add_rule(-nlit, -qlit, RuleInfo::Conflicts { p: n, q: qs, dep: con });
                }
            }

            // obsoletes and same-name exclusion
            let multiversion = self.multiversion.test(n.index());
            if !installed {
                if !multiversion {
                    // same-name packages exclude each other
                    let name_dep = Dep::from_str_id(s.name);
                    let off = self.pool.whatprovides(name_dep);
                    for &q in &self.pool.providers_at(off).to_vec() {
                        let qs = SolvId(q);
                        if qs == n {
                            continue;
                        }
                        let qsol = self.pool.solvable(qs);
                        let same_name = qsol.name == s.name;
                        if !same_name && !self.pool.flags.implicit_obsolete_uses_provides {
                            continue;
                        }
                        if self.multiversion.test(qs.index()) {
                            continue;
                        }
                        let qlit = i32::try_from(q).unwrap_or(0);
                        let info = if same_name {
                            RuleInfo::SameName { p: n, q: qs }
                        } else {
                            RuleInfo::ImplicitObsoletes { p: n, q: qs }
                        };
                        self.add_rule(-nlit, -qlit, info);
                    }
                }
                let obsoletes: Vec<Dep> = self.pool.repo(repo_id).dep_list(s.obsoletes).collect();
                for obs in obsoletes {
                    let candidates: Vec<u32> = if self.pool.flags.obsolete_uses_provides {
                        let off = self.pool.whatprovides(obs);
                        self.pool.providers_at(off).to_vec()
                    } else {
                        let base = solvent_pool::dep::dep_base_name(self.pool, obs);
                        let off = self.pool.whatprovides(Dep::from_str_id(base));
                        self.pool
                            .providers_at(off)
                            .iter()
                            .copied()
                            .filter(|&q| self.pool.match_nevr(SolvId(q), obs))
                            .collect()
                    };
                    for q in candidates {
                        let qs = SolvId(q);
                        if qs == n || self.multiversion.test(qs.index()) {
                            continue;
                        }
                        let qlit = i32::try_from(q).unwrap_or(0);
                        self.add_rule(
                            -nlit,
                            -qlit,
                            RuleInfo::Obsoletes { p: n, q: qs, dep: obs },
                        );
                    }
                }
            } else if !self.pool.flags.no_installed_obsoletes {
                // installed packages keep obsoleting what they obsolete
                let obsoletes: Vec<Dep> = self.pool.repo(repo_id).dep_list(s.obsoletes).collect();
                for obs in obsoletes {
                    let off = self.pool.whatprovides(obs);
                    for &q in &self.pool.providers_at(off).to_vec() {
                        let qs = SolvId(q);
                        if qs == n || self.pool.is_installed(qs) {
                            continue;
                        }
                        if self.multiversion.test(qs.index()) {
                            continue;
                        }
                        if !self.pool.match_nevr(qs, obs) {
                            continue;
                        }
                        let qlit = i32::try_from(q).unwrap_or(0);
                        self.add_rule(
                            -qlit,
                            -nlit,
                            RuleInfo::InstalledObsoletes { p: n, q: qs, dep: obs },
                        );
                    }
                }
            }

            // pull weak-dependency targets into the closure (no rules)
            for key in [DepKey::Recommends, DepKey::Suggests] {
                let deps: Vec<Dep> = self.pool.repo(repo_id).dep_list(s.dep_offset(key)).collect();
                for dep in deps {
                    let off = self.pool.whatprovides(dep);
                    for &q in &self.pool.providers_at(off).to_vec() {
                        work.push(SolvId(q));
                    }
                }
            }
        }
    }

    /// Pull in packages whose supplements/enhances could trigger against
    /// the added set
    pub(crate) fn add_pkg_rules_for_weak(&mut self, addedmap: &mut Map) {
        loop {
            let mut found = Vec::new();
            for p in self.pool.solvable_ids().collect::<Vec<_>>() {
                if addedmap.test(p.index()) || !self.pool.installable(p) {
                    continue;
                }
                let s = *self.pool.solvable(p);
                let Some(repo_id) = s.repo else { continue };
                let weak: Vec<Dep> = self
                    .pool
                    .repo(repo_id)
                    .dep_list(s.supplements)
                    .chain(self.pool.repo(repo_id).dep_list(s.enhances))
                    .collect();
                let mut triggered = false;
                for dep in weak {
                    let off = self.pool.whatprovides(dep);
                    if self
                        .pool
                        .providers_at(off)
                        .iter()
                        .any(|&q| addedmap.test(q as usize))
                    {
                        triggered = true;
                        break;
                    }
                }
                if triggered {
                    found.push(p);
                }
            }
            if found.is_empty() {
                return;
            }
            for p in found {
                self.add_pkg_rules_for_solvable(p, addedmap);
            }
        }
    }

    /// Sort the pkg rules and prune duplicates; idempotent
    pub(crate) fn unify_rules(&mut self) {
        if self.rules.len() <= 2 {
            return;
        }
        let n = self.rules.len();
        let mut order: Vec<usize> = (1..n).collect();
        order.sort_by(|&a, &b| {
            rule_sort_key(self.pool, &self.rules[a]).cmp(&rule_sort_key(self.pool, &self.rules[b]))
        });
        let mut rules = Vec::with_capacity(n);
        let mut info = Vec::with_capacity(n);
        rules.push(Rule::default());
        info.push(RuleInfo::Other);
        let mut last_key = None;
        for idx in order {
            let key = rule_sort_key(self.pool, &self.rules[idx]);
            if Some(&key) == last_key.as_ref() {
                continue;
            }
            last_key = Some(key);
            rules.push(self.rules[idx]);
            info.push(self.pkg_info[idx]);
        }
        debug!(before = n, after = rules.len(), "unified pkg rules");
        self.rules = rules;
        self.pkg_info = info;
    }

    /// All rule blocks, in class-range order
    #[allow(clippy::too_many_lines)]
    pub(crate) fn generate_rules(&mut self) -> Result<()> {
        let mut addedmap = Map::new(self.pool.nsolvables());

        // pkg rules for the installed universe
        if let Some(inst) = self.pool.installed() {
            let range: Vec<SolvId> = self.pool.repo(inst).solvables().collect();
            for p in range {
                if !self.pool.solvable(p).is_deleted() {
                    self.add_pkg_rules_for_solvable(p, &mut addedmap);
                }
            }
        }
        // pkg rules for job targets
        let jobs = self.jobs.clone();
        for job in &jobs {
            match job.job_type() {
                jobtype::INSTALL | jobtype::UPDATE | jobtype::DISTUPGRADE | jobtype::LOCK => {
                    for q in self.job_candidates(job) {
                        self.add_pkg_rules_for_solvable(SolvId(q), &mut addedmap);
                    }
                }
                _ => {}
            }
        }
        // update candidates of installed packages need rules too
        if let Some(inst) = self.pool.installed() {
            let range: Vec<SolvId> = self.pool.repo(inst).solvables().collect();
            for p in range {
                if self.pool.solvable(p).is_deleted() {
                    continue;
                }
                for q in self.find_update_candidates(p, true) {
                    self.add_pkg_rules_for_solvable(SolvId(q), &mut addedmap);
                }
            }
        }
        self.add_pkg_rules_for_weak(&mut addedmap);
        self.unify_rules();

        self.ranges.job = self.rules.len();
        self.add_job_rules();

        self.ranges.update = self.rules.len();
        self.add_update_and_feature_rules();

        self.ranges.infarch = self.rules.len();
        self.add_infarch_rules(&addedmap);

        self.ranges.dup = self.rules.len();
        self.add_dup_rules();

        self.ranges.best = self.rules.len();
        self.add_best_rules();

        self.ranges.yumobs = self.rules.len();
        self.add_yumobs_rules();

        self.ranges.choice = self.rules.len();
        self.add_choice_rules();

        self.ranges.recommends = self.rules.len();
        self.ranges.black = self.rules.len();
        self.ranges.strict_repo_priority = self.rules.len();
        Ok(())
    }

    /// Job rules; the impossible assertion `¬system` carries "nothing
    /// provides the job target" into problem reporting
    #[allow(clippy::too_many_lines)]
    fn add_job_rules(&mut self) {
        let syslit = i32::try_from(SolvId::SYSTEM.0).unwrap_or(1);
        let jobs = self.jobs.clone();
        for (ji, job) in jobs.iter().enumerate() {
            match job.job_type() {
                jobtype::INSTALL => {
                    if job.has_flag(jobflags::WEAK) {
                        for q in self.job_candidates(job) {
                            self.favored.insert(q, 1);
                        }
                        continue;
                    }
                    let mut candidates = self.job_candidates(job);
                    if job.has_flag(jobflags::FORCEBEST) {
                        let mut q: solvent_pool::Queue = candidates
                            .iter()
                            .map(|&c| i32::try_from(c).unwrap_or(0))
                            .collect();
                        self.prune_to_best(&mut q);
                        candidates = q.iter().map(|&c| c.unsigned_abs()).collect();
                    }
                    let idx = if candidates.is_empty() {
                        self.add_rule(-syslit, 0, RuleInfo::Other)
                    } else if candidates.len() == 1 {
                        let p = i32::try_from(candidates[0]).unwrap_or(0);
                        self.add_rule(p, 0, RuleInfo::Other)
                    } else {
                        let p = i32::try_from(candidates[0]).unwrap_or(0);
                        let rest = self.pool.ids_to_whatprovides(&candidates[1..]);
                        self.add_rule(p, i32::try_from(rest.0).unwrap_or(0), RuleInfo::Other)
                    };
                    if let Some(idx) = idx {
                        self.rule_to_job.insert(idx, ji);
                    }
                }
                jobtype::ERASE => {
                    if job.has_flag(jobflags::WEAK) {
                        for q in self.job_candidates(job) {
                            self.favored.insert(q, -1);
                        }
                        continue;
                    }
                    let candidates = self.job_candidates(job);
                    if job.has_flag(jobflags::CLEANDEPS) {
                        for &q in &candidates {
                            self.cleandeps_targets.push(SolvId(q));
                        }
                    }
                    for q in candidates {
                        let qlit = i32::try_from(q).unwrap_or(0);
                        if let Some(idx) = self.add_rule(-qlit, 0, RuleInfo::Other) {
                            self.rule_to_job.insert(idx, ji);
                        }
                        self.noupdate.set(q as usize);
                    }
                }
                jobtype::LOCK => {
                    for q in self.job_candidates(job) {
                        let qlit = i32::try_from(q).unwrap_or(0);
                        let lit = if self.pool.is_installed(SolvId(q)) {
                            qlit
                        } else {
                            -qlit
                        };
                        if let Some(idx) = self.add_rule(lit, 0, RuleInfo::Other) {
                            self.rule_to_job.insert(idx, ji);
                        }
                        if lit > 0 {
                            self.noupdate.set(q as usize);
                        }
                    }
                }
                jobtype::UPDATE if job.selection() != select::SOLVABLE_ALL => {
                    // a targeted update is a request, not just an
                    // allowance: if a newer candidate exists the job rule
                    // demands one of them
                    let candidates = self.job_candidates(job);
                    let installed: Vec<u32> = candidates
                        .iter()
                        .copied()
                        .filter(|&q| self.pool.is_installed(SolvId(q)))
                        .collect();
                    for i in installed {
                        let iv = SolvId(i);
                        let ievr = self.pool.solvable(iv).evr;
                        let ups: Vec<u32> = self
                            .find_update_candidates(iv, false)
                            .into_iter()
                            .filter(|&q| {
                                let qs = self.pool.solvable(SolvId(q));
                                self.pool.evrcmp(
                                    qs.evr,
                                    ievr,
                                    solvent_pool::EvrCmpMode::Compare,
                                ) > 0
                            })
                            .collect();
                        if ups.is_empty() {
                            continue; // nothing newer, keeping is fine
                        }
                        let p = crate::cdcl::reinterpret_literal(ups[0]);
                        let d = if ups.len() > 1 {
                            i32::try_from(self.pool.ids_to_whatprovides(&ups[1..]).0)
                                .unwrap_or(0)
                        } else {
                            0
                        };
                        if let Some(idx) = self.add_rule(p, d, RuleInfo::Other) {
                            self.rule_to_job.insert(idx, ji);
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Is `q` an acceptable replacement for the installed `s` under the
    /// given freedoms?
    fn update_candidate_ok(&self, i: SolvId, q: SolvId, allow_all: bool) -> bool {
        let s = self.pool.solvable(i);
        let qs = self.pool.solvable(q);
        if !allow_all {
            if !self.flags.allow_downgrade
                && self
                    .pool
                    .evrcmp(qs.evr, s.evr, solvent_pool::EvrCmpMode::Compare)
                    < 0
            {
                return false;
            }
            if !self.flags.allow_arch_change && qs.arch != s.arch {
                let noarch = knownids::ARCH_NOARCH;
                if qs.arch != noarch && s.arch != noarch {
                    return false;
                }
            }
            if !self.flags.allow_vendor_change && qs.vendor != s.vendor {
                return false;
            }
        }
        true
    }

    /// Replacement candidates for an installed package: same-name packages
    /// plus explicit obsoleters
    pub(crate) fn find_update_candidates(&mut self, i: SolvId, allow_all: bool) -> Vec<u32> {
        let s = *self.pool.solvable(i);
        let mut out = Vec::new();
        let off = self.pool.whatprovides(Dep::from_str_id(s.name));
        for &q in &self.pool.providers_at(off).to_vec() {
            let qs = SolvId(q);
            if qs == i || self.pool.is_installed(qs) {
                continue;
            }
            if self.pool.solvable(qs).name != s.name {
                continue;
            }
            if !self.pool.installable(qs) {
                continue;
            }
            if self.update_candidate_ok(i, qs, allow_all) {
                out.push(q);
            }
        }
        // obsoleters also count as updates
        for q in self.pool.solvable_ids().collect::<Vec<_>>() {
            let qs = *self.pool.solvable(q);
            if self.pool.is_installed(q) || qs.name == s.name || !self.pool.installable(q) {
                continue;
            }
            let Some(repo_id) = qs.repo else { continue };
            let obsoletes: Vec<Dep> = self.pool.repo(repo_id).dep_list(qs.obsoletes).collect();
            let mut hits = false;
            for obs in obsoletes {
                if self.pool.flags.obsolete_uses_provides {
                    let ooff = self.pool.whatprovides(obs);
                    if self.pool.providers_at(ooff).contains(&i.0) {
                        hits = true;
                        break;
                    }
                } else if self.pool.match_nevr(i, obs) {
                    hits = true;
                    break;
                }
            }
            if hits {
                out.push(q.0);
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// One update rule and one feature rule per installed solvable, in
    /// repo order; placeholders keep the index arithmetic valid
    fn add_update_and_feature_rules(&mut self) {
        let Some(inst) = self.pool.installed() else {
            self.ranges.feature = self.rules.len();
            return;
        };
        let range: Vec<SolvId> = self.pool.repo(inst).solvables().collect();
        let mut features: Vec<Option<(i32, Vec<u32>)>> = Vec::with_capacity(range.len());

        for &i in &range {
            let ilit = i32::try_from(i.0).unwrap_or(0);
            let deleted = self.pool.solvable(i).is_deleted();
            let skip = deleted
                || self.noupdate.test(i.index())
                || self.flags.allow_uninstall
                || self.allowuninstall_all
                || self.allowuninstall_map.test(i.index());
            if skip {
                self.rules.push(Rule::default());
                self.pkg_info.push(RuleInfo::Other);
                features.push(None);
                continue;
            }
            let normal = self.find_update_candidates(i, false);
            let all = self.find_update_candidates(i, true);
            let mut candidates = normal.clone();
            if let Some(extra) = self.update_targets.get(&i.0) {
                for &q in extra {
                    if !candidates.contains(&q) {
                        candidates.push(q);
                    }
                }
                candidates.sort_unstable();
            }
            if candidates.is_empty() {
                // no way to replace it: the update rule is the assertion
                // "keep installed"
                self.add_update_rule_raw(ilit, &[]);
            } else {
                self.add_update_rule_raw(ilit, &candidates);
            }
            if all == normal {
                features.push(None);
            } else {
                features.push(Some((ilit, all)));
            }
        }

        self.ranges.feature = self.rules.len();
        for feature in features {
            match feature {
                None => {
                    self.rules.push(Rule::default());
                    self.pkg_info.push(RuleInfo::Other);
                }
                Some((ilit, all)) => {
                    let idx = self.rules.len();
                    self.add_update_rule_raw(ilit, &all);
                    // feature rules sleep until their update rule is
                    // disabled
                    if idx < self.rules.len() {
                        self.rules[idx].disable();
                    }
                }
            }
        }
    }

    /// Push `(p | candidates…)` without the duplicate pruning of
    /// [`add_rule`] so block indexing stays exact
    fn add_update_rule_raw(&mut self, p: i32, candidates: &[u32]) {
        let (d, w2) = if candidates.is_empty() {
            (0, 0)
        } else if candidates.len() == 1 {
            (0, crate::cdcl::reinterpret_literal(candidates[0]))
        } else {
            let off = self.pool.ids_to_whatprovides(candidates);
            (
                i32::try_from(off.0).unwrap_or(0),
                crate::cdcl::reinterpret_literal(candidates[0]),
            )
        };
        self.rules.push(Rule {
            p,
            d,
            w1: p,
            w2,
            n1: 0,
            n2: 0,
        });
        self.pkg_info.push(RuleInfo::Other);
    }

    /// Forbid inferior architectures when a better-arch candidate of the
    /// same name exists
    fn add_infarch_rules(&mut self, addedmap: &Map) {
        if !self.pool.has_arch_policy() {
            return;
        }
        let mut by_name: HashMap<u32, Vec<SolvId>> = HashMap::new();
        for idx in addedmap.iter_set() {
            let p = SolvId(u32::try_from(idx).unwrap_or(0));
            if p.0 < 2 || p.index() >= self.pool.nsolvables() {
                continue;
            }
            let s = self.pool.solvable(p);
            if s.is_deleted() {
                continue;
            }
            by_name.entry(s.name.0).or_default().push(p);
        }
        for (_, group) in by_name {
            if group.len() < 2 {
                continue;
            }
            let mut best = 0u32;
            for &p in &group {
                let sc = self.pool.arch_score(self.pool.solvable(p).arch);
                if sc > 1 && (best == 0 || sc < best) {
                    best = sc;
                }
            }
            if best == 0 {
                continue;
            }
            for &p in &group {
                let sc = self.pool.arch_score(self.pool.solvable(p).arch);
                if sc > best && !self.pool.is_installed(p) {
                    let plit = i32::try_from(p.0).unwrap_or(0);
                    self.add_rule(-plit, 0, RuleInfo::Other);
                }
            }
        }
    }

    /// Distupgrade: every installed package must move to (or already be
    /// at) the version carried by the highest-priority repo
    fn add_dup_rules(&mut self) {
        if !self.dup_all {
            return;
        }
        let Some(inst) = self.pool.installed() else { return };
        let range: Vec<SolvId> = self.pool.repo(inst).solvables().collect();
        for i in range {
            let s = *self.pool.solvable(i);
            if s.is_deleted() || self.noupdate.test(i.index()) {
                continue;
            }
            let ilit = i32::try_from(i.0).unwrap_or(0);
            let off = self.pool.whatprovides(Dep::from_str_id(s.name));
            let mut candidates: Vec<u32> = self
                .pool
                .providers_at(off)
                .iter()
                .copied()
                .filter(|&q| {
                    let qs = SolvId(q);
                    !self.pool.is_installed(qs)
                        && self.pool.solvable(qs).name == s.name
                        && self.pool.installable(qs)
                })
                .collect();
            if candidates.is_empty() {
                continue; // nothing carries the package, leave it alone
            }
            let best_prio = candidates
                .iter()
                .map(|&q| {
                    let r = self.pool.solvable(SolvId(q)).repo;
                    r.map_or(i32::MIN, |r| self.pool.repo(r).priority)
                })
                .max()
                .unwrap_or(i32::MIN);
            candidates.retain(|&q| {
                let r = self.pool.solvable(SolvId(q)).repo;
                r.map_or(false, |r| self.pool.repo(r).priority == best_prio)
            });
            let d = i32::try_from(self.pool.ids_to_whatprovides(&candidates).0).unwrap_or(0);
            self.add_rule(-ilit, d, RuleInfo::Other);
        }
    }

    /// `FORCEBEST` install jobs must take one of the best candidates
    fn add_best_rules(&mut self) {
        let jobs = self.jobs.clone();
        for (ji, job) in jobs.iter().enumerate() {
            if job.job_type() != jobtype::INSTALL || !job.has_flag(jobflags::FORCEBEST) {
                continue;
            }
            let candidates = self.job_candidates(job);
            if candidates.len() < 2 {
                continue;
            }
            let mut q: solvent_pool::Queue = candidates
                .iter()
                .map(|&c| i32::try_from(c).unwrap_or(0))
                .collect();
            self.prune_to_best(&mut q);
            if q.len() == candidates.len() {
                continue;
            }
            let best: Vec<u32> = q.iter().map(|&c| c.unsigned_abs()).collect();
            let p = crate::cdcl::reinterpret_literal(best[0]);
            let d = if best.len() > 1 {
                i32::try_from(self.pool.ids_to_whatprovides(&best[1..]).0).unwrap_or(0)
            } else {
                0
            };
            if let Some(idx) = self.add_rule(p, d, RuleInfo::Other) {
                self.rule_to_job.insert(idx, ji);
            }
        }
    }

    /// Competing obsoleters of one installed package exclude each other
    fn add_yumobs_rules(&mut self) {
        let Some(inst) = self.pool.installed() else { return };
        let range: Vec<SolvId> = self.pool.repo(inst).solvables().collect();
        for i in range {
            if self.pool.solvable(i).is_deleted() {
                continue;
            }
            let mut obsoleters: Vec<SolvId> = Vec::new();
            for q in self.pool.solvable_ids().collect::<Vec<_>>() {
                if self.pool.is_installed(q) {
                    continue;
                }
                let qs = *self.pool.solvable(q);
                let Some(repo_id) = qs.repo else { continue };
                let obsoletes: Vec<Dep> =
                    self.pool.repo(repo_id).dep_list(qs.obsoletes).collect();
                if obsoletes.iter().any(|&obs| self.pool.match_nevr(i, obs)) {
                    obsoleters.push(q);
                }
            }
            let mut names: Vec<u32> = obsoleters
                .iter()
                .map(|&q| self.pool.solvable(q).name.0)
                .collect();
            names.sort_unstable();
            names.dedup();
            if names.len() < 2 {
                continue;
            }
            for a in 0..obsoleters.len() {
                for b in a + 1..obsoleters.len() {
                    let (qa, qb) = (obsoleters[a], obsoleters[b]);
                    if self.pool.solvable(qa).name == self.pool.solvable(qb).name {
                        continue;
                    }
                    let la = i32::try_from(qa.0).unwrap_or(0);
                    let lb = i32::try_from(qb.0).unwrap_or(0);
                    self.add_rule(-la, -lb, RuleInfo::Other);
                }
            }
        }
    }

    /// Prefer updating installed packages over pulling in fresh names:
    /// narrow requires rules to providers related to the installed set
    fn add_choice_rules(&mut self) {
        if self.pool.installed().is_none() {
            return;
        }
        let installed_names: Vec<u32> = self
            .pool
            .installed()
            .map(|r| {
                self.pool
                    .repo(r)
                    .solvables()
                    .map(|p| self.pool.solvable(p).name.0)
                    .collect()
            })
            .unwrap_or_default();
        for idx in 1..self.ranges.job {
            let r = self.rules[idx];
            if r.p >= 0 || r.d <= 0 {
                continue; // only n-ary requires rules
            }
            if !matches!(self.pkg_info[idx], RuleInfo::Requires { .. }) {
                continue;
            }
            let providers: Vec<u32> = self
                .pool
                .providers_at(Offset(u32::try_from(r.d).unwrap_or(0)))
                .to_vec();
            let narrowed: Vec<u32> = providers
                .iter()
                .copied()
                .filter(|&q| {
                    let qs = SolvId(q);
                    self.pool.is_installed(qs)
                        || installed_names.contains(&self.pool.solvable(qs).name.0)
                })
                .collect();
            if narrowed.is_empty() || narrowed.len() == providers.len() {
                continue;
            }
            let d = i32::try_from(self.pool.ids_to_whatprovides(&narrowed).0).unwrap_or(0);
            self.add_rule(r.p, d, RuleInfo::Other);
        }
    }

    /// After a clean solve, sweep dependencies orphaned by cleandeps-erase
    /// jobs: kept installed packages that only the erased closure needed
    pub(crate) fn cleandeps_sweep(&mut self) -> Result<()> {
        if self.cleandeps_targets.is_empty() {
            return Ok(());
        }
        // closure of what the erased targets required
        let mut erased_closure = Map::new(self.pool.nsolvables());
        let mut work: Vec<SolvId> = self.cleandeps_targets.clone();
        while let Some(p) = work.pop() {
            if erased_closure.test(p.index()) {
                continue;
            }
            erased_closure.set(p.index());
            let s = *self.pool.solvable(p);
            let Some(repo_id) = s.repo else { continue };
            let reqs: Vec<Dep> = self
                .pool
                .repo(repo_id)
                .dep_list(s.requires)
                .filter(|&d| d != knownids::PREREQ_MARKER)
                .collect();
            for req in reqs {
                let off = self.pool.whatprovides(req);
                for &q in &self.pool.providers_at(off).to_vec() {
                    if self.pool.is_installed(SolvId(q)) {
                        work.push(SolvId(q));
                    }
                }
            }
        }
        // what the remaining true packages still require
        let mut needed = Map::new(self.pool.nsolvables());
        for idx in 0..self.decisionq.len() {
            let v = self.decisionq[idx];
            if v <= 1 {
                continue;
            }
            let p = SolvId(v.unsigned_abs());
            let s = *self.pool.solvable(p);
            if erased_closure.test(p.index()) && self.pool.is_installed(p) {
                continue;
            }
            let Some(repo_id) = s.repo else { continue };
            let reqs: Vec<Dep> = self
                .pool
                .repo(repo_id)
                .dep_list(s.requires)
                .filter(|&d| d != knownids::PREREQ_MARKER)
                .collect();
            for req in reqs {
                let off = self.pool.whatprovides(req);
                for &q in &self.pool.providers_at(off).to_vec() {
                    needed.set(q as usize);
                }
            }
        }
        // orphans: in the erased closure, still true, not needed, not the
        // erase target itself, never a multiversion name
        let mut orphan_jobs = Vec::new();
        for idx in erased_closure.iter_set() {
            let p = SolvId(u32::try_from(idx).unwrap_or(0));
            if self.cleandeps_targets.contains(&p) {
                continue;
            }
            if !self.pool.is_installed(p) || self.decision_for(p) <= 0 {
                continue;
            }
            if needed.test(idx) || self.multiversion.test(idx) {
                continue;
            }
            orphan_jobs.push(Job::erase(p));
        }
        if orphan_jobs.is_empty() {
            return Ok(());
        }
        if !self.cleandeps_guard() {
            return Ok(());
        }
        debug!(orphans = orphan_jobs.len(), "cleandeps re-run");
        let base_jobs = self.jobs.clone();
        let mut jobs = base_jobs.clone();
        jobs.extend(orphan_jobs);
        let problems = self.solve(jobs)?;
        if problems > 0 {
            // orphan removal must never break the solve; retry without it
            self.solve(base_jobs)?;
        }
        self.cleandeps_active = false;
        Ok(())
    }
}
