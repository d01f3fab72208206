//! Branching policy
//!
//! Candidate pruning for the decision stages: favored packages first, then
//! best architecture, best repo priority (installed wins ties), highest
//! version per name, vendor stability, and finally ascending package id
//! for determinism. The weak phase picks recommended and supplemented
//! packages after the strong model has settled.

use crate::Solver;
use solvent_pool::rels::{REL_AND, REL_COND, REL_ELSE, REL_NAMESPACE, REL_OR, REL_UNLESS, REL_WITH};
use solvent_pool::solvable::DepKey;
use solvent_pool::{Dep, EvrCmpMode, Queue, SolvId};

impl Solver<'_> {
    /// Prune a candidate queue down to the policy-preferred entries,
    /// best first
    pub(crate) fn prune_to_best(&mut self, q: &mut Queue) {
        if q.len() <= 1 {
            return;
        }
        let mut cands: Vec<i32> = q.iter().copied().collect();

        // favored candidates beat everything; disfavored lose to anything
        if !self.favored.is_empty() {
            let favored: Vec<i32> = cands
                .iter()
                .copied()
                .filter(|&v| self.favored.get(&v.unsigned_abs()).copied().unwrap_or(0) > 0)
                .collect();
            if !favored.is_empty() {
                cands = favored;
            } else {
                let not_disfavored: Vec<i32> = cands
                    .iter()
                    .copied()
                    .filter(|&v| self.favored.get(&v.unsigned_abs()).copied().unwrap_or(0) >= 0)
                    .collect();
                if !not_disfavored.is_empty() {
                    cands = not_disfavored;
                }
            }
        }

        // best architecture: lowest positive score, noarch compatible
        if self.pool.has_arch_policy() && cands.len() > 1 {
            let mut best = 0u32;
            for &v in &cands {
                let sc = self.pool.arch_score(self.sol(v).arch);
                if sc > 1 && (best == 0 || sc < best) {
                    best = sc;
                }
            }
            if best != 0 {
                let keep: Vec<i32> = cands
                    .iter()
                    .copied()
                    .filter(|&v| {
                        let sc = self.pool.arch_score(self.sol(v).arch);
                        sc == best || sc == 1
                    })
                    .collect();
                if !keep.is_empty() {
                    cands = keep;
                }
            }
        }

        // best repo priority; installed candidates always survive so the
        // version stage can still prefer keeping what is there
        if cands.len() > 1 {
            let prio = |slf: &Self, v: i32| -> i64 {
                slf.sol(v)
                    .repo
                    .map_or(i64::MIN, |r| i64::from(slf.pool.repo(r).priority))
            };
            let best = cands
                .iter()
                .filter(|&&v| !self.pool.is_installed(SolvId(v.unsigned_abs())))
                .map(|&v| prio(self, v))
                .max();
            if let Some(best) = best {
                cands.retain(|&v| {
                    self.pool.is_installed(SolvId(v.unsigned_abs())) || prio(self, v) == best
                });
            }
        }

        // highest version per name
        if cands.len() > 1 {
            let mut keep = Vec::with_capacity(cands.len());
            for &v in &cands {
                let s = self.sol(v);
                let better_exists = cands.iter().any(|&o| {
                    o != v && {
                        let os = self.sol(o);
                        os.name == s.name
                            && self.pool.evrcmp(os.evr, s.evr, EvrCmpMode::Compare) > 0
                    }
                });
                if !better_exists {
                    keep.push(v);
                }
            }
            if !keep.is_empty() {
                cands = keep;
            }
        }

        // vendor stability: prefer the installed package's vendor
        if cands.len() > 1 {
            if let Some(inst_repo) = self.pool.installed() {
                let keep: Vec<i32> = cands
                    .iter()
                    .copied()
                    .filter(|&v| {
                        let s = self.sol(v);
                        let installed_vendor = self
                            .pool
                            .repo(inst_repo)
                            .solvables()
                            .find(|&i| self.pool.solvable(i).name == s.name)
                            .map(|i| self.pool.solvable(i).vendor);
                        installed_vendor.is_none_or(|vend| vend == s.vendor)
                    })
                    .collect();
                if !keep.is_empty() {
                    cands = keep;
                }
            }
        }

        // deterministic: lowest package id first
        cands.sort_unstable();
        q.clear();
        q.extend_from_slice(&cands);
    }

    fn sol(&self, v: i32) -> &solvent_pool::Solvable {
        self.pool.solvable(SolvId(v.unsigned_abs()))
    }

    /// Is a dependency fulfilled by the current decisions?
    pub(crate) fn dep_fulfilled(&mut self, dep: Dep) -> bool {
        if let Ok(rd) = self.pool.rel_of(dep) {
            match rd.flags {
                REL_AND | REL_WITH => {
                    return self.dep_fulfilled(rd.name) && self.dep_fulfilled(rd.evr);
                }
                REL_OR => {
                    return self.dep_fulfilled(rd.name) || self.dep_fulfilled(rd.evr);
                }
                REL_COND | REL_UNLESS => {
                    // COND: name IF evr (ELSE alternative); UNLESS mirrors
                    let mut evr = rd.evr;
                    let mut alt = None;
                    if let Ok(erd) = self.pool.rel_of(evr) {
                        if erd.flags == REL_ELSE {
                            evr = erd.name;
                            alt = Some(erd.evr);
                        }
                    }
                    let cond_holds = self.dep_fulfilled(evr);
                    let positive = rd.flags == REL_COND;
                    if cond_holds == positive {
                        return self.dep_fulfilled(rd.name);
                    }
                    return alt.is_some_and(|a| self.dep_fulfilled(a));
                }
                REL_NAMESPACE => {
                    let off = self.pool.whatprovides(dep);
                    return self
                        .pool
                        .providers_at(off)
                        .iter()
                        .any(|&p| self.decisionmap[p as usize] > 0);
                }
                _ => {}
            }
        }
        let off = self.pool.whatprovides(dep);
        self.pool
            .providers_at(off)
            .iter()
            .any(|&p| self.decisionmap[p as usize] > 0)
    }

    /// Choose the next weak-phase candidate: a recommended package of an
    /// installed-to-be package, or a package whose supplements hold
    pub(crate) fn pick_weak_candidate(&mut self) -> Option<i32> {
        let mut dq = Queue::new();

        // recommends of everything decided true
        for i in 2..self.decisionmap.len() {
            if self.decisionmap[i] <= 0 {
                continue;
            }
            let p = SolvId(u32::try_from(i).unwrap_or(0));
            let s = *self.pool.solvable(p);
            let Some(repo_id) = s.repo else { continue };
            let recs: Vec<Dep> = self
                .pool
                .repo(repo_id)
                .dep_list(s.dep_offset(DepKey::Recommends))
                .collect();
            for rec in recs {
                let off = self.pool.whatprovides(rec);
                let providers = self.pool.providers_at(off).to_vec();
                if providers
                    .iter()
                    .any(|&q| self.decisionmap[q as usize] > 0)
                {
                    continue; // already satisfied
                }
                for &q in &providers {
                    if self.decisionmap[q as usize] == 0
                        && !self.weak_dont_retry.test(q as usize)
                        && self.pool.installable(SolvId(q))
                    {
                        dq.push_unique(i32::try_from(q).unwrap_or(0));
                    }
                }
            }
        }

        // packages whose supplements are fulfilled by the model
        for p in self.pool.solvable_ids().collect::<Vec<_>>() {
            let i = p.index();
            if self.decisionmap[i] != 0
                || self.weak_dont_retry.test(i)
                || !self.pool.installable(p)
            {
                continue;
            }
            let s = *self.pool.solvable(p);
            let Some(repo_id) = s.repo else { continue };
            let supps: Vec<Dep> = self
                .pool
                .repo(repo_id)
                .dep_list(s.dep_offset(DepKey::Supplements))
                .collect();
            if supps.is_empty() {
                continue;
            }
            if supps.iter().any(|&d| self.dep_fulfilled(d)) {
                dq.push_unique(i32::try_from(p.0).unwrap_or(0));
            }
        }

        if dq.is_empty() {
            return None;
        }
        self.prune_to_best(&mut dq);
        Some(dq[0])
    }
}

#[cfg(test)]
mod tests {
    use crate::tests_support::TestPool;
    use crate::Job;

    #[test]
    fn prefers_highest_version_provider() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["cap"], &[]);
        tp.add_available_providing("prov", "1-1", &["cap"]);
        tp.add_available_providing("prov", "2-1", &["cap"]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let v2 = solver.pool().find_solvable("prov-2-1.x86_64").unwrap();
        let v1 = solver.pool().find_solvable("prov-1-1.x86_64").unwrap();
        let problems = solver.solve(vec![Job::install(a)]).unwrap();
        assert_eq!(problems, 0);
        assert!(solver.decision_for(v2) > 0, "highest version chosen");
        assert!(solver.decision_for(v1) <= 0);
    }

    #[test]
    fn lowest_id_breaks_full_ties() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["cap"], &[]);
        let first = tp.add_available_providing("prov1", "1-1", &["cap"]);
        tp.add_available_providing("prov2", "1-1", &["cap"]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let problems = solver.solve(vec![Job::install(a)]).unwrap();
        assert_eq!(problems, 0);
        assert!(solver.decision_for(first) > 0, "lowest id wins the tie");
    }

    #[test]
    fn disfavored_provider_loses() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["cap"], &[]);
        let p1 = tp.add_available_providing("prov1", "1-1", &["cap"]);
        let p2 = tp.add_available_providing("prov2", "1-1", &["cap"]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let problems = solver
            .solve(vec![
                Job::install(a),
                crate::Job::new(
                    crate::jobtype::DISFAVOR | crate::jobselect::SOLVABLE,
                    p1.0,
                ),
            ])
            .unwrap();
        assert_eq!(problems, 0);
        assert!(solver.decision_for(p2) > 0, "disfavored one is skipped");
        assert!(solver.decision_for(p1) <= 0);
    }
}
