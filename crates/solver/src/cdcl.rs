//! Unit propagation, conflict analysis and backjumping
//!
//! Two-watched-literal propagation over the rule set: every literal has a
//! chain of rules watching it, threaded through the rules' `n1`/`n2`
//! fields. Conflict analysis walks the trail backwards to the first unique
//! implication point and learns a new rule; level-1 conflicts instead feed
//! the problem analyzer.

use crate::rules::{Rule, RuleClass, RuleInfo};
use crate::Solver;
use solvent_pool::Offset;
use tracing::{debug, trace};

impl Solver<'_> {
    #[inline]
    pub(crate) fn decisionmap_true(&self, v: i32) -> bool {
        if v > 0 {
            self.decisionmap[v.unsigned_abs() as usize] > 0
        } else {
            self.decisionmap[v.unsigned_abs() as usize] < 0
        }
    }

    #[inline]
    pub(crate) fn literal_level(&self, v: i32) -> i32 {
        self.decisionmap[v.unsigned_abs() as usize].abs()
    }

    /// Record a decision on the trail
    pub(crate) fn decide(&mut self, v: i32, level: i32, why: usize) {
        let vv = v.unsigned_abs() as usize;
        self.decisionmap[vv] = if v > 0 { level } else { -level };
        self.decisionq.push(v);
        self.decisionq_why
            .push(i32::try_from(why).unwrap_or(i32::MAX));
    }

    /// Watch list head slot for a literal
    #[inline]
    fn watch_slot(&self, lit: i32) -> usize {
        usize::try_from(i32::try_from(self.decisionmap.len()).unwrap_or(i32::MAX) + lit)
            .unwrap_or(0)
    }

    /// Build the watch lists from scratch; disabled rules stay unhooked
    pub(crate) fn make_watches(&mut self) {
        self.watches = vec![0; self.decisionmap.len() * 2];
        // reverse order so the watch chains are in ascending rule order
        for i in (1..self.rules.len()).rev() {
            let r = self.rules[i];
            if r.p != 0 && !r.is_assertion() && !r.is_disabled() {
                self.add_watches(i);
            }
        }
    }

    /// Hook a rule into the chains of its two watched literals
    pub(crate) fn add_watches(&mut self, idx: usize) {
        let (w1, w2) = (self.rules[idx].w1, self.rules[idx].w2);
        let s1 = self.watch_slot(w1);
        self.rules[idx].n1 = self.watches[s1];
        self.watches[s1] = u32::try_from(idx).unwrap_or(0);
        let s2 = self.watch_slot(w2);
        self.rules[idx].n2 = self.watches[s2];
        self.watches[s2] = u32::try_from(idx).unwrap_or(0);
    }

    /// Propagate all queued decisions; returns the conflicting rule index
    /// if a clause went false
    pub(crate) fn propagate(&mut self, level: i32) -> Option<usize> {
        while self.propagate_index < self.decisionq.len() {
            // watches trigger when a literal goes false
            let pkg = -self.decisionq[self.propagate_index];
            self.propagate_index += 1;
            let slot = self.watch_slot(pkg);
            let mut ridx = self.watches[slot] as usize;

            while ridx != 0 {
                let r = self.rules[ridx];
                let (other_watch, next) = if pkg == r.w1 {
                    (r.w2, r.n1)
                } else {
                    (r.w1, r.n2)
                };
                if r.is_disabled() || self.decisionmap_true(other_watch) {
                    ridx = next as usize;
                    continue;
                }
                if r.d > 0 {
                    // n-ary: look for a replacement watch
                    let mut replacement = 0;
                    if r.p != 0 && r.p != other_watch && !self.decisionmap_true(-r.p) {
                        replacement = r.p;
                    } else {
                        for &cand in self
                            .pool
                            .providers_at(Offset(u32::try_from(r.d).unwrap_or(0)))
                        {
                            let cand = reinterpret_literal(cand);
                            if cand != other_watch && !self.decisionmap_true(-cand) {
                                replacement = cand;
                                break;
                            }
                        }
                    }
                    if replacement != 0 {
                        // move the watch from pkg to the replacement
                        self.unhook_watch(ridx, pkg);
                        let rs = self.watch_slot(replacement);
                        if pkg == self.rules[ridx].w1 {
                            self.rules[ridx].w1 = replacement;
                            self.rules[ridx].n1 = self.watches[rs];
                        } else {
                            self.rules[ridx].w2 = replacement;
                            self.rules[ridx].n2 = self.watches[rs];
                        }
                        self.watches[rs] = u32::try_from(ridx).unwrap_or(0);
                        ridx = next as usize;
                        continue;
                    }
                }
                // unit: the other watch must become true
                if self.decisionmap_true(-other_watch) {
                    trace!(rule = ridx, "conflict during propagation");
                    return Some(ridx);
                }
                self.decide(other_watch, level, ridx);
                self.stats.propagations += 1;
                ridx = next as usize;
            }
        }
        None
    }

    /// Remove `ridx` from the watch chain of literal `lit`
    fn unhook_watch(&mut self, ridx: usize, lit: i32) {
        let slot = self.watch_slot(lit);
        let mut cur = self.watches[slot] as usize;
        if cur == ridx {
            let r = &self.rules[ridx];
            self.watches[slot] = if lit == r.w1 { r.n1 } else { r.n2 };
            return;
        }
        while cur != 0 {
            let r = self.rules[cur];
            let next = if lit == r.w1 { r.n1 } else { r.n2 };
            if next as usize == ridx {
                let t = &self.rules[ridx];
                let newnext = if lit == t.w1 { t.n1 } else { t.n2 };
                if lit == self.rules[cur].w1 {
                    self.rules[cur].n1 = newnext;
                } else {
                    self.rules[cur].n2 = newnext;
                }
                return;
            }
            cur = next as usize;
        }
    }

    /// All literals of a rule, in `p`-first order
    pub(crate) fn rule_literals(&self, r: &Rule) -> Vec<i32> {
        let mut lits = Vec::new();
        if r.p != 0 {
            lits.push(r.p);
        }
        let d = r.effective_d();
        if d == 0 {
            if r.w2 != 0 && r.w2 != r.p {
                lits.push(r.w2);
            }
        } else if d > 0 {
            for &raw in self
                .pool
                .providers_at(Offset(u32::try_from(d).unwrap_or(0)))
            {
                lits.push(reinterpret_literal(raw));
            }
        }
        lits
    }

    /// First-UIP conflict analysis
    ///
    /// Returns `(backjump_level, p, d, learnt_why_start)` where `p ∨ d…` is
    /// the learnt clause with `p` the asserting literal.
    pub(crate) fn analyze(&mut self, level: i32, conflict: usize) -> (i32, i32, i32, usize) {
        let mut seen = vec![false; self.decisionmap.len()];
        let mut learnt: Vec<i32> = Vec::new();
        let mut backjump = 1;
        let mut num_this_level = 0;
        let learnt_why_start = self.learnt_pool.len();
        let mut idx = self.decisionq.len();
        let mut c = conflict;
        let mut uip = 0;

        loop {
            self.learnt_pool
                .push(i32::try_from(c).unwrap_or(i32::MAX));
            for v in self.rule_literals(&self.rules[c].clone()) {
                if self.decisionmap_true(v) {
                    continue; // the one true literal of the reason
                }
                let vv = v.unsigned_abs() as usize;
                if seen[vv] {
                    continue;
                }
                let l = self.literal_level(v);
                if l == 1 {
                    continue; // level-1 settings stay implicit
                }
                seen[vv] = true;
                if l == level {
                    num_this_level += 1;
                } else {
                    learnt.push(v);
                    if l > backjump {
                        backjump = l;
                    }
                }
            }
            // walk back to the next marked trail entry
            loop {
                debug_assert!(idx > 0, "ran off the trail during analysis");
                idx -= 1;
                uip = self.decisionq[idx];
                if seen[uip.unsigned_abs() as usize] {
                    break;
                }
            }
            seen[uip.unsigned_abs() as usize] = false;
            num_this_level -= 1;
            if num_this_level <= 0 {
                break;
            }
            c = usize::try_from(self.decisionq_why[idx]).unwrap_or(0);
            debug_assert!(c != 0, "implied literal without a reason");
        }

        let p = -uip;
        let d = if learnt.is_empty() {
            0
        } else if learnt.len() == 1 && learnt[0] < 0 {
            learnt[0]
        } else {
            let raws: Vec<u32> = learnt.iter().map(|&v| v.cast_unsigned()).collect();
            i32::try_from(self.pool.ids_to_whatprovides(&raws).0).unwrap_or(0)
        };
        self.learnt_pool.push(0);
        self.stats.learnt += 1;
        debug!(level, backjump, lits = learnt.len() + 1, "learnt clause");
        (backjump, p, d, learnt_why_start)
    }

    /// Undo all decisions above `level`
    pub(crate) fn revert(&mut self, level: i32) {
        while let Some(v) = self.decisionq.last() {
            let vv = v.unsigned_abs() as usize;
            if self.decisionmap[vv].abs() <= level {
                break;
            }
            self.decisionmap[vv] = 0;
            self.decisionq.pop();
            self.decisionq_why.pop();
        }
        self.propagate_index = self.decisionq.len();
        self.recommends_index = usize::MAX;
    }

    /// Put the second watch of a fresh learnt rule on the literal decided
    /// at the highest level, so backjumping keeps the watches valid
    pub(crate) fn watch2_on_highest(&mut self, idx: usize) {
        let r = self.rules[idx];
        if r.d <= 0 {
            return;
        }
        let mut best_level = 0;
        let mut w2 = r.w2;
        for &raw in self
            .pool
            .providers_at(Offset(u32::try_from(r.d).unwrap_or(0)))
        {
            let v = reinterpret_literal(raw);
            let l = self.literal_level(v);
            if l > best_level {
                best_level = l;
                w2 = v;
            }
        }
        self.rules[idx].w2 = w2;
    }

    /// Decide a literal, propagate, and on conflict learn and backjump.
    /// Returns the new level, or 0 when a level-1 conflict was analyzed as
    /// a problem.
    pub(crate) fn set_propagate_learn(
        &mut self,
        mut level: i32,
        decision: i32,
        disablerules: bool,
    ) -> i32 {
        if decision != 0 {
            level += 1;
            self.decide(decision, level, 0);
            self.stats.decisions += 1;
        }
        loop {
            let Some(conflict) = self.propagate(level) else {
                return level;
            };
            if level == 1 {
                self.analyze_unsolvable(conflict, disablerules);
                return 0;
            }
            self.stats.conflicts += 1;
            let (backjump, p, d, why) = self.analyze(level, conflict);
            debug_assert!(backjump < level && backjump > 0);
            level = backjump;
            self.revert(level);
            let idx = self.add_learnt_rule(p, d, why);
            self.decide(p, level, idx);
            if self.flags.restart_interval > 0
                && self.stats.conflicts % u64::from(self.flags.restart_interval) == 0
            {
                // restart: drop to the root but keep the learnt rules
                self.stats.restarts += 1;
                debug!(conflicts = self.stats.conflicts, "restarting search");
                self.revert(1);
                return 1;
            }
        }
    }

    /// Record the learnt clause as a rule and hook its watches
    pub(crate) fn add_learnt_rule(&mut self, p: i32, d: i32, why: usize) -> usize {
        let idx = self.rules.len();
        let w2 = if d > 0 {
            self.pool
                .providers_at(Offset(u32::try_from(d).unwrap_or(0)))
                .first()
                .map_or(0, |&raw| reinterpret_literal(raw))
        } else if d < 0 {
            d
        } else {
            0
        };
        let (d, w2) = if d < 0 { (0, w2) } else { (d, w2) };
        self.rules.push(Rule {
            p,
            d,
            w1: p,
            w2,
            n1: 0,
            n2: 0,
        });
        self.pkg_info.push(crate::rules::RuleInfo::Other);
        self.ranges.end = self.rules.len();
        self.learnt_why.push(why);
        if w2 != 0 {
            self.watch2_on_highest(idx);
            self.add_watches(idx);
        }
        idx
    }

    /// Collect the disableable rules responsible for a level-1 conflict,
    /// record them as one problem, and optionally disable them so the
    /// search can continue
    pub(crate) fn analyze_unsolvable(&mut self, conflict: usize, disablerules: bool) {
        let start = self.problems.len();
        self.choice_disabled_this_pass = false;
        let mut seen = vec![false; self.decisionmap.len()];
        self.record_unsolvable_rule(conflict);
        for v in self.rule_literals(&self.rules[conflict].clone()) {
            if !self.decisionmap_true(v) {
                seen[v.unsigned_abs() as usize] = true;
            }
        }
        for idx in (0..self.decisionq.len()).rev() {
            let v = self.decisionq[idx];
            if !seen[v.unsigned_abs() as usize] {
                continue;
            }
            let why = usize::try_from(self.decisionq_why[idx]).unwrap_or(0);
            if why == 0 {
                continue; // free decision or initial setting
            }
            self.record_unsolvable_rule(why);
            for v in self.rule_literals(&self.rules[why].clone()) {
                if !self.decisionmap_true(v) {
                    seen[v.unsigned_abs() as usize] = true;
                }
            }
        }
        let found_any = self.problems.len() > start;
        if !found_any && self.choice_disabled_this_pass && disablerules {
            // only choice rules were involved; they are disabled silently
            // and the search simply retries
            self.reset_solver();
            return;
        }
        self.problems.push(0); // problem terminator
        self.problem_descriptions.push(self.describe_rule(conflict));
        if found_any && disablerules {
            let rules_to_disable: Vec<i32> = self.problems[start..self.problems.len() - 1].to_vec();
            for ridx in rules_to_disable {
                self.disable_problem_rule(usize::try_from(ridx).unwrap_or(0));
            }
            self.reset_solver();
        } else {
            self.unrecoverable = true;
        }
    }

    /// Human-readable account of one rule, used for problem summaries
    pub(crate) fn describe_rule(&self, idx: usize) -> String {
        if let Some(&ji) = self.rule_to_job.get(&idx) {
            return format!(
                "conflicting request: {}",
                self.jobs[ji].describe(self.pool)
            );
        }
        let pool = &*self.pool;
        match self.pkg_info.get(idx).copied().unwrap_or(RuleInfo::Other) {
            RuleInfo::NotInstallable { p } => {
                format!("package {} is not installable", pool.solvid2str(p))
            }
            RuleInfo::NothingProvidesDep { p, dep } => format!(
                "nothing provides {} needed by {}",
                pool.dep2str(dep),
                pool.solvid2str(p)
            ),
            RuleInfo::Requires { p, dep } => format!(
                "package {} requires {}, but none of the providers can be installed",
                pool.solvid2str(p),
                pool.dep2str(dep)
            ),
            RuleInfo::Conflicts { p, q, dep } => format!(
                "package {} conflicts with {} provided by {}",
                pool.solvid2str(p),
                pool.dep2str(dep),
                pool.solvid2str(q)
            ),
            RuleInfo::Obsoletes { p, q, dep } => format!(
                "package {} obsoletes {} provided by {}",
                pool.solvid2str(p),
                pool.dep2str(dep),
                pool.solvid2str(q)
            ),
            RuleInfo::InstalledObsoletes { p, q, dep } => format!(
                "installed package {} obsoletes {} provided by {}",
                pool.solvid2str(p),
                pool.dep2str(dep),
                pool.solvid2str(q)
            ),
            RuleInfo::ImplicitObsoletes { p, q } | RuleInfo::SameName { p, q } => format!(
                "cannot install both {} and {}",
                pool.solvid2str(p),
                pool.solvid2str(q)
            ),
            RuleInfo::SelfConflict { p, dep } => format!(
                "package {} conflicts with {} provided by itself",
                pool.solvid2str(p),
                pool.dep2str(dep)
            ),
            RuleInfo::Other => match self.ranges.class_of(idx) {
                RuleClass::Update | RuleClass::Feature => "problem with installed package".into(),
                RuleClass::Infarch => "inferior architecture".into(),
                RuleClass::Dup => "distupgrade constraint".into(),
                RuleClass::Best => "best-version constraint".into(),
                _ => "unsatisfiable rule".into(),
            },
        }
    }

    /// Add one rule to the problem being assembled, expanding learnt rules
    /// into their sources and honoring the disableability table
    fn record_unsolvable_rule(&mut self, idx: usize) {
        let class = self.ranges.class_of(idx);
        if class == RuleClass::Learnt {
            let learnt_idx = idx - self.ranges.learnt;
            let mut i = self.learnt_why[learnt_idx];
            while self.learnt_pool[i] != 0 {
                let src = usize::try_from(self.learnt_pool[i]).unwrap_or(0);
                self.record_unsolvable_rule(src);
                i += 1;
            }
            return;
        }
        if class == RuleClass::Choice {
            // choice rules are only preferences; drop them without
            // bothering the user
            self.rules[idx].disable();
            self.choice_disabled_this_pass = true;
            return;
        }
        if !class.is_disableable() {
            return;
        }
        // unify within the problem being assembled
        let mut i = self.problems.len();
        while i > 0 && self.problems[i - 1] != 0 {
            i -= 1;
            if self.problems[i] == i32::try_from(idx).unwrap_or(i32::MAX) {
                return;
            }
        }
        self.problems.push(i32::try_from(idx).unwrap_or(i32::MAX));
    }

    /// Disable a rule for problem handling; disabling an update rule also
    /// enables the matching feature rule so the installed package keeps a
    /// fallback
    pub(crate) fn disable_problem_rule(&mut self, idx: usize) {
        let class = self.ranges.class_of(idx);
        self.rules[idx].disable();
        if class == RuleClass::Update {
            let fidx = self.ranges.feature + (idx - self.ranges.update);
            if fidx < self.ranges.infarch && self.rules[fidx].p != 0 {
                self.rules[fidx].enable();
            }
        }
    }

    /// Undo [`disable_problem_rule`](Self::disable_problem_rule): the
    /// feature counterpart goes back to sleep with its update rule active
    pub(crate) fn enable_problem_rule(&mut self, idx: usize) {
        let class = self.ranges.class_of(idx);
        self.rules[idx].enable();
        if class == RuleClass::Update {
            let fidx = self.ranges.feature + (idx - self.ranges.update);
            if fidx < self.ranges.infarch && self.rules[fidx].p != 0 {
                self.rules[fidx].disable();
            }
        }
    }

    /// Forget every decision above the level-1 assertions and rebuild the
    /// watches (rule enablement may have changed)
    pub(crate) fn reset_solver(&mut self) {
        self.revert(1);
        // also drop level-1 decisions; assertions get re-applied
        while let Some(v) = self.decisionq.last() {
            let vv = v.unsigned_abs() as usize;
            self.decisionmap[vv] = 0;
            self.decisionq.pop();
            self.decisionq_why.pop();
        }
        self.propagate_index = 0;
        self.decide_system_solvable();
        self.make_watches();
        self.make_rule_decisions();
    }
}

/// Provider arena entries are stored as unsigned; learnt rules may store
/// negative literals in the same arena
#[inline]
pub(crate) fn reinterpret_literal(raw: u32) -> i32 {
    raw.cast_signed()
}

#[cfg(test)]
mod tests {
    use crate::tests_support::TestPool;

    #[test]
    fn propagation_forces_unit_literals() {
        // a requires b: installing a forces b
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["b"], &[]);
        tp.add_available("b", "1-1", &[], &[]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1").unwrap();
        let b = solver.pool().find_solvable("b-1-1").unwrap();
        let problems = solver
            .solve(vec![crate::Job::install(a)])
            .expect("solve runs");
        assert_eq!(problems, 0);
        assert!(solver.decision_for(a) > 0);
        assert!(solver.decision_for(b) > 0);
    }

    #[test]
    fn conflicting_assertions_become_a_problem() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &[], &[]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1").unwrap();
        let problems = solver
            .solve(vec![crate::Job::install(a), crate::Job::erase(a)])
            .expect("solve runs");
        assert_eq!(problems, 1);
    }
}
