//! Problems and solutions
//!
//! A problem is a minimal set of disableable rules whose simultaneous
//! enablement makes the instance unsatisfiable; the solver records one per
//! level-1 conflict while it keeps searching with those rules disabled.
//! Solutions are refined per problem by re-enabling all but one suspect
//! rule and re-solving until the instance goes satisfiable; each element
//! describes a user-facing move and how to edit the job queue for it.

use crate::job::{jobtype, Job};
use crate::rules::{RuleClass, RuleInfo};
use crate::Solver;
use serde::{Deserialize, Serialize};
use solvent_errors::{Result, SolveError};
use solvent_pool::{EvrCmpMode, SolvId};

/// One reported problem
#[derive(Debug, Clone)]
pub struct Problem {
    pub index: usize,
    /// The disableable rules forming the conflict core
    pub rules: Vec<usize>,
    /// Human-readable summary
    pub description: String,
}

/// One user-selectable move that resolves a problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolutionElement {
    /// Drop an install job
    DoNotInstall { job: usize },
    /// Drop an erase job
    DoNotErase { job: usize },
    /// Drop any other job
    DropJob { job: usize },
    /// Keep the installed package even though a job wants it changed
    KeepInstalled { p: SolvId },
    /// Permit deinstallation of an installed package
    AllowRemove { p: SolvId },
    /// Permit replacing the installed package with an older version
    AllowDowngrade { from: SolvId, to: SolvId },
    /// Permit replacing with a different architecture
    AllowArchChange { from: SolvId, to: SolvId },
    /// Permit replacing with a different vendor's package
    AllowVendorChange { from: SolvId, to: SolvId },
    /// Permit a same-version replacement
    AllowReplacement { from: SolvId, to: SolvId },
    /// Accept an inferior architecture
    InfarchChange { p: SolvId },
    /// Keep the package from the non-target repo on distupgrade
    DistupgradeChange { p: SolvId },
    /// Accept a non-best version
    BestChange { job: Option<usize> },
}

/// A set of elements that together resolve one problem
#[derive(Debug, Clone)]
pub struct Solution {
    pub elements: Vec<SolutionElement>,
    pub(crate) rules: Vec<usize>,
}

impl Solver<'_> {
    /// Number of problems recorded by the last solve
    #[must_use]
    pub fn problem_count(&self) -> usize {
        self.problems.iter().filter(|&&r| r == 0).count()
    }

    /// The rule core of one problem
    ///
    /// # Errors
    ///
    /// Fails when `index` is out of range.
    pub fn problem(&self, index: usize) -> Result<Problem> {
        let mut start = 0;
        let mut n = 0;
        for (i, &r) in self.problems.iter().enumerate() {
            if r == 0 {
                if n == index {
                    let rules: Vec<usize> = self.problems[start..i]
                        .iter()
                        .map(|&r| usize::try_from(r).unwrap_or(0))
                        .collect();
                    let description = self
                        .problem_descriptions
                        .get(index)
                        .cloned()
                        .unwrap_or_else(|| self.describe_problem_rules(&rules));
                    return Ok(Problem {
                        index,
                        rules,
                        description,
                    });
                }
                n += 1;
                start = i + 1;
            }
        }
        Err(SolveError::NoSuchProblem { problem: index }.into())
    }

    /// All problems of the last solve
    #[must_use]
    pub fn all_problems(&self) -> Vec<Problem> {
        (0..self.problem_count())
            .filter_map(|i| self.problem(i).ok())
            .collect()
    }

    pub(crate) fn describe_problem_rules(&self, rules: &[usize]) -> String {
        for &r in rules {
            if let Some(&ji) = self.rule_to_job.get(&r) {
                return format!("conflicting request: {}", self.jobs[ji].describe(self.pool));
            }
        }
        for &r in rules {
            if self.ranges.class_of(r) == RuleClass::Update {
                let p = self.update_rule_package(r);
                return format!("problem with installed package {}", self.pool.solvid2str(p));
            }
        }
        "unsatisfiable rule set".to_string()
    }

    fn update_rule_package(&self, idx: usize) -> SolvId {
        let start = self
            .pool
            .installed()
            .map_or(0, |r| self.pool.repo(r).start);
        SolvId(start + u32::try_from(idx - self.ranges.update).unwrap_or(0))
    }

    /// Enumerate the solutions of a problem by iterative rule-disabling
    /// trials; the solver state is restored afterwards
    ///
    /// # Errors
    ///
    /// Propagates cancellation from the interrupt callback.
    pub fn solutions(&mut self, problem: usize) -> Result<Vec<Solution>> {
        let prob = self.problem(problem)?;
        let saved_problems = self.problems.clone();
        let saved_descriptions = self.problem_descriptions.clone();
        let saved_unrecoverable = self.unrecoverable;
        let mut out = Vec::new();

        for &sug in &prob.rules {
            if let Some(&ji) = self.rule_to_job.get(&sug) {
                if self.jobs[ji].has_flag(crate::jobflags::ESSENTIAL) {
                    continue; // essential jobs cannot be dropped
                }
            }
            // enable everything in the core but the suspect
            for &r in &prob.rules {
                if r != sug {
                    self.enable_problem_rule(r);
                }
            }
            self.disable_problem_rule(sug);

            let mut refined = vec![sug];
            let mut extra_disabled: Vec<usize> = Vec::new();
            loop {
                self.problems.clear();
                self.problem_descriptions.clear();
                self.unrecoverable = false;
                self.reset_solver();
                self.run(false, false)?;
                if self.problem_count() == 0 {
                    break; // satisfiable: the refined set is a solution
                }
                let culprits: Vec<usize> = self
                    .problems
                    .iter()
                    .take_while(|&&r| r != 0)
                    .map(|&r| usize::try_from(r).unwrap_or(0))
                    .filter(|r| !refined.contains(r) && !extra_disabled.contains(r))
                    .collect();
                if culprits.is_empty() {
                    refined.clear(); // invalid suggestion
                    break;
                }
                if culprits.len() == 1 {
                    refined.push(culprits[0]);
                }
                for &r in &culprits {
                    self.disable_problem_rule(r);
                    extra_disabled.push(r);
                }
            }
            // restore rule state: the core stays disabled, everything the
            // refinement touched goes back to enabled
            for r in extra_disabled {
                if !prob.rules.contains(&r) {
                    self.enable_problem_rule(r);
                }
            }
            for &r in &prob.rules {
                self.disable_problem_rule(r);
            }
            if !refined.is_empty() {
                let elements = self.solution_elements(&refined);
                if !elements.is_empty() {
                    out.push(Solution {
                        elements,
                        rules: refined,
                    });
                }
            }
        }

        self.problems = saved_problems;
        self.problem_descriptions = saved_descriptions;
        self.unrecoverable = saved_unrecoverable;
        self.reset_solver();
        Ok(out)
    }

    /// Translate a refined rule set into user-facing moves
    #[allow(clippy::too_many_lines)]
    fn solution_elements(&mut self, rules: &[usize]) -> Vec<SolutionElement> {
        let mut elements = Vec::new();
        for &r in rules {
            match self.ranges.class_of(r) {
                RuleClass::Job => {
                    let Some(&ji) = self.rule_to_job.get(&r) else {
                        continue;
                    };
                    let element = match self.jobs[ji].job_type() {
                        jobtype::INSTALL => SolutionElement::DoNotInstall { job: ji },
                        jobtype::ERASE => SolutionElement::DoNotErase { job: ji },
                        _ => SolutionElement::DropJob { job: ji },
                    };
                    elements.push(element);
                }
                RuleClass::Update => {
                    let p = self.update_rule_package(r);
                    let fidx = self.ranges.feature + (r - self.ranges.update);
                    let has_feature =
                        fidx < self.ranges.infarch && self.rules[fidx].p != 0;
                    if has_feature {
                        // the feature freedoms say what becomes possible
                        let normal = self.find_update_candidates(p, false);
                        let all = self.find_update_candidates(p, true);
                        let mut seen_downgrade = false;
                        let mut seen_arch = false;
                        let mut seen_vendor = false;
                        for q in all {
                            if normal.contains(&q) {
                                continue;
                            }
                            let qs = SolvId(q);
                            let s = self.pool.solvable(p);
                            let qsol = self.pool.solvable(qs);
                            if !seen_downgrade
                                && self.pool.evrcmp(qsol.evr, s.evr, EvrCmpMode::Compare) < 0
                            {
                                seen_downgrade = true;
                                elements
                                    .push(SolutionElement::AllowDowngrade { from: p, to: qs });
                            } else if !seen_arch && qsol.arch != s.arch {
                                seen_arch = true;
                                elements
                                    .push(SolutionElement::AllowArchChange { from: p, to: qs });
                            } else if !seen_vendor && qsol.vendor != s.vendor {
                                seen_vendor = true;
                                elements
                                    .push(SolutionElement::AllowVendorChange { from: p, to: qs });
                            }
                        }
                        if !(seen_downgrade || seen_arch || seen_vendor) {
                            elements.push(SolutionElement::AllowRemove { p });
                        }
                    } else {
                        elements.push(SolutionElement::AllowRemove { p });
                    }
                }
                RuleClass::Feature => {
                    let p = SolvId(
                        self.pool
                            .installed()
                            .map_or(0, |rep| self.pool.repo(rep).start)
                            + u32::try_from(r - self.ranges.feature).unwrap_or(0),
                    );
                    elements.push(SolutionElement::AllowRemove { p });
                }
                RuleClass::Infarch => {
                    let p = SolvId(self.rules[r].p.unsigned_abs());
                    elements.push(SolutionElement::InfarchChange { p });
                }
                RuleClass::Dup => {
                    let p = SolvId(self.rules[r].p.unsigned_abs());
                    elements.push(SolutionElement::DistupgradeChange { p });
                }
                RuleClass::Best => {
                    elements.push(SolutionElement::BestChange {
                        job: self.rule_to_job.get(&r).copied(),
                    });
                }
                _ => {}
            }
        }
        elements
    }

    /// Apply a solution to a job queue, yielding the queue for the next
    /// solve
    #[must_use]
    pub fn apply_solution(&self, jobs: &[Job], solution: &Solution) -> Vec<Job> {
        let mut drop: Vec<usize> = Vec::new();
        let mut extra: Vec<Job> = Vec::new();
        for element in &solution.elements {
            match *element {
                SolutionElement::DoNotInstall { job }
                | SolutionElement::DoNotErase { job }
                | SolutionElement::DropJob { job } => drop.push(job),
                SolutionElement::KeepInstalled { p } => extra.push(Job::lock(p)),
                SolutionElement::AllowRemove { p } => extra.push(Job::new(
                    jobtype::ALLOWUNINSTALL | crate::jobselect::SOLVABLE,
                    p.0,
                )),
                SolutionElement::AllowDowngrade { to, .. }
                | SolutionElement::AllowArchChange { to, .. }
                | SolutionElement::AllowVendorChange { to, .. }
                | SolutionElement::AllowReplacement { to, .. } => {
                    extra.push(Job::install(to));
                }
                SolutionElement::InfarchChange { p }
                | SolutionElement::DistupgradeChange { p } => {
                    extra.push(Job::install(p));
                }
                SolutionElement::BestChange { job } => {
                    if let Some(ji) = job {
                        // re-issue the job without the best constraint
                        if let Some(j) = jobs.get(ji) {
                            drop.push(ji);
                            extra.push(Job::new(
                                j.how & !crate::jobflags::FORCEBEST,
                                j.what,
                            ));
                        }
                    }
                }
            }
        }
        let mut out: Vec<Job> = jobs
            .iter()
            .enumerate()
            .filter(|(i, _)| !drop.contains(i))
            .map(|(_, j)| *j)
            .collect();
        out.extend(extra);
        out
    }

    /// Sorted explanation of every decision: why is each package in (or
    /// out of) the result?
    #[must_use]
    pub fn describe_decisions(&self) -> Vec<DecisionReason> {
        let mut out = Vec::new();
        for i in 0..self.decisionq.len() {
            let literal = self.decisionq[i];
            let why = usize::try_from(self.decisionq_why[i]).unwrap_or(0);
            let reason = if why == 0 {
                if literal == 1 {
                    ReasonKind::SystemSolvable
                } else {
                    ReasonKind::Branching
                }
            } else {
                ReasonKind::Rule
            };
            let (rule_class, info) = if why == 0 {
                (None, RuleInfo::Other)
            } else {
                (Some(self.ranges.class_of(why)), self.pkg_info[why])
            };
            out.push(DecisionReason {
                literal,
                reason,
                rule_class,
                info,
            });
        }
        out.sort_by_key(|d| d.literal.unsigned_abs());
        out
    }
}

/// Why a literal ended up on the trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReasonKind {
    /// The always-true system solvable
    SystemSolvable,
    /// A free branching decision of the policy
    Branching,
    /// Forced by a rule (see `rule_class`/`info`)
    Rule,
}

/// One entry of the decision explanation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DecisionReason {
    pub literal: i32,
    pub reason: ReasonKind,
    pub rule_class: Option<RuleClass>,
    pub info: RuleInfo,
}

#[cfg(test)]
mod tests {
    use crate::tests_support::TestPool;
    use crate::{Job, SolutionElement};

    #[test]
    fn conflict_offers_both_sided_solutions() {
        // installed a-1; a-2 conflicts with b; job: install b + update a
        let mut tp = TestPool::new();
        tp.add_installed("a", "1-1");
        tp.add_available("a", "2-1", &[], &["b"]);
        tp.add_available("b", "1-1", &[], &[]);
        let mut solver = tp.solver();
        let b = solver.pool().find_solvable("b-1-1.x86_64").unwrap();
        let a_name = solver.pool().find_str("a").unwrap();
        let jobs = vec![
            Job::install(b),
            Job::new(
                crate::jobtype::UPDATE | crate::jobselect::SOLVABLE_NAME,
                solvent_pool::Dep::from_str_id(a_name).raw(),
            ),
        ];
        let problems = solver.solve(jobs.clone()).unwrap();
        assert_eq!(problems, 1);

        let solutions = solver.solutions(0).unwrap();
        assert!(!solutions.is_empty(), "at least one solution offered");
        // one of the solutions must drop the install-b job
        let drops_install = solutions.iter().any(|s| {
            s.elements
                .iter()
                .any(|e| matches!(e, SolutionElement::DoNotInstall { job: 0 }))
        });
        assert!(drops_install, "dropping the install job is offered");

        // taking that solution and re-solving succeeds
        let sol = solutions
            .iter()
            .find(|s| {
                s.elements
                    .iter()
                    .any(|e| matches!(e, SolutionElement::DoNotInstall { job: 0 }))
            })
            .unwrap();
        let new_jobs = solver.apply_solution(&jobs, sol);
        let problems = solver.solve(new_jobs).unwrap();
        assert_eq!(problems, 0, "solution resolves the problem");
    }

    #[test]
    fn missing_provider_solution_is_do_not_install() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["ghost"], &[]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let jobs = vec![Job::install(a)];
        let problems = solver.solve(jobs.clone()).unwrap();
        assert_eq!(problems, 1);
        let solutions = solver.solutions(0).unwrap();
        assert!(solutions.iter().any(|s| {
            s.elements
                .iter()
                .any(|e| matches!(e, SolutionElement::DoNotInstall { job: 0 }))
        }));
    }

    #[test]
    fn taking_a_solution_never_reproduces_the_same_core() {
        let mut tp = TestPool::new();
        tp.add_available("a", "1-1", &["ghost"], &[]);
        let mut solver = tp.solver();
        let a = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
        let jobs = vec![Job::install(a)];
        solver.solve(jobs.clone()).unwrap();
        let core = solver.problem(0).unwrap().rules;
        let solutions = solver.solutions(0).unwrap();
        let new_jobs = solver.apply_solution(&jobs, &solutions[0]);
        let problems = solver.solve(new_jobs).unwrap();
        if problems > 0 {
            assert_ne!(solver.problem(0).unwrap().rules, core);
        }
    }
}
