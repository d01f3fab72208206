//! End-to-end scenarios over the textual testcase format

use solvent_pool::SolvId;
use solvent_solver::{Solver, SolutionElement};
use solvent_testcase::{format_result, read_case};
use solvent_transaction::{CycleSeverity, StepKind, Transaction};

#[test]
fn install_with_requires_orders_provider_first() {
    let mut case = read_case(
        "\
repo available 99
solvable a 1-1 x86_64
requires libfoo
solvable libfoo 1-1 x86_64
system x86_64 rpm
job install name a
",
    )
    .unwrap();
    let jobs = case.parts[0].clone();
    let mut solver = Solver::new(&mut case.pool);
    let problems = solver.solve(jobs).unwrap();
    assert_eq!(problems, 0);
    let mut trans = Transaction::from_solver(&solver).unwrap();
    drop(solver);
    trans.order(&mut case.pool);

    let order: Vec<String> = trans
        .steps
        .iter()
        .map(|&v| case.pool.solvid2str(SolvId(v.unsigned_abs())))
        .collect();
    assert_eq!(order, vec!["libfoo-1-1.x86_64", "a-1-1.x86_64"]);
    assert!(trans.cycles().is_empty());
}

#[test]
fn conflict_yields_problem_with_two_solutions() {
    let mut case = read_case(
        "\
repo @System 0
solvable a 1-1 x86_64
repo available 99
solvable a 2-1 x86_64
conflicts b
solvable b 1-1 x86_64
system x86_64 rpm @System
job install name b
job update name a
",
    )
    .unwrap();
    let jobs = case.parts[0].clone();
    let mut solver = Solver::new(&mut case.pool);
    let problems = solver.solve(jobs.clone()).unwrap();
    assert_eq!(problems, 1);

    let solutions = solver.solutions(0).unwrap();
    assert!(solutions.len() >= 2, "both sides offered: {solutions:?}");
    let has_no_install = solutions.iter().any(|s| {
        s.elements
            .iter()
            .any(|e| matches!(e, SolutionElement::DoNotInstall { job: 0 }))
    });
    let has_no_update = solutions.iter().any(|s| {
        s.elements
            .iter()
            .any(|e| matches!(e, SolutionElement::DropJob { job: 1 }))
    });
    assert!(has_no_install, "'do not install b' offered");
    assert!(has_no_update, "'do not update a' offered");

    // either solution resolves the problem
    for sol in &solutions {
        let new_jobs = solver.apply_solution(&jobs, sol);
        let problems = solver.solve(new_jobs).unwrap();
        assert_eq!(problems, 0);
    }
}

#[test]
fn distupgrade_moves_to_high_priority_repo() {
    let mut case = read_case(
        "\
repo @System 0
solvable a 1-1 x86_64
repo lowprio 10
solvable a 1-2 x86_64
repo highprio 99
solvable a 2-1 x86_64
system x86_64 rpm @System
job distupgrade all
",
    )
    .unwrap();
    let jobs = case.parts[0].clone();
    let mut solver = Solver::new(&mut case.pool);
    let problems = solver.solve(jobs).unwrap();
    assert_eq!(problems, 0);
    let a2 = solver.pool().find_solvable("a-2-1.x86_64").unwrap();
    let a1 = solver.pool().find_solvable("a-1-1.x86_64").unwrap();
    assert!(solver.decision_for(a2) > 0);
    assert!(solver.decision_for(a1) < 0);
    let trans = Transaction::from_solver(&solver).unwrap();
    assert_eq!(
        trans.step_kind(solver.pool(), a2, 0),
        StepKind::Upgrade
    );
    assert_eq!(
        trans.step_kind(solver.pool(), a1, 0),
        StepKind::Upgraded
    );
}

#[test]
fn multiversion_installs_latest_besides_installed() {
    let mut case = read_case(
        "\
repo @System 0
solvable kernel 1-1 x86_64
repo available 99
solvable kernel 2-1 x86_64
solvable kernel 3-1 x86_64
system x86_64 rpm @System
job multiversion name kernel
job install name kernel = 3-1
",
    )
    .unwrap();
    let jobs = case.parts[0].clone();
    let mut solver = Solver::new(&mut case.pool);
    let problems = solver.solve(jobs).unwrap();
    assert_eq!(problems, 0);
    let k1 = solver.pool().find_solvable("kernel-1-1.x86_64").unwrap();
    let k2 = solver.pool().find_solvable("kernel-2-1.x86_64").unwrap();
    let k3 = solver.pool().find_solvable("kernel-3-1.x86_64").unwrap();
    assert!(solver.decision_for(k3) > 0, "latest installed");
    assert!(solver.decision_for(k1) > 0, "installed one stays");
    assert!(solver.decision_for(k2) <= 0, "middle version untouched");

    let trans = Transaction::from_solver(&solver).unwrap();
    assert_eq!(
        trans.step_kind(solver.pool(), k3, 0),
        StepKind::MultiInstall
    );
    assert!(trans.obs_pkg(solver.pool(), k3).is_none(), "no obsolete pair");
}

#[test]
fn prereq_cycle_reported_critical_with_usable_order() {
    let mut case = read_case(
        "\
repo available 99
solvable a 1-1 x86_64
requires b
solvable b 1-1 x86_64
prerequires a
system x86_64 rpm
job install name a
job install name b
",
    )
    .unwrap();
    let jobs = case.parts[0].clone();
    let mut solver = Solver::new(&mut case.pool);
    let problems = solver.solve(jobs).unwrap();
    assert_eq!(problems, 0);
    let mut trans = Transaction::from_solver(&solver).unwrap();
    drop(solver);
    trans.order(&mut case.pool);

    assert_eq!(trans.steps.len(), 2, "transaction still emitted");
    assert_eq!(trans.cycles().len(), 1);
    assert_eq!(trans.cycles()[0].severity, CycleSeverity::Critical);
    assert!(trans.cycle(0, CycleSeverity::Normal).is_some());

    // deterministic: the pre-requires edge survives, so a precedes b
    let order: Vec<String> = trans
        .steps
        .iter()
        .map(|&v| case.pool.solvid2str(SolvId(v.unsigned_abs())))
        .collect();
    assert_eq!(order, vec!["a-1-1.x86_64", "b-1-1.x86_64"]);
}

#[test]
fn rpm_comparator_scenarios() {
    use solvent_pool::{DistType, EvrCmpMode, Pool};
    let pool = Pool::new(DistType::Rpm);
    assert!(pool.evrcmp_str("1.0~rc1", "1.0", EvrCmpMode::Compare) < 0);
    assert!(pool.evrcmp_str("1.0", "1.0^post", EvrCmpMode::Compare) < 0);
    assert!(pool.evrcmp_str("1.10", "1.2", EvrCmpMode::Compare) > 0);
}

#[test]
fn file_driven_cases_round_trip_and_solve() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/cases");
    let mut ran = 0;
    for entry in std::fs::read_dir(&dir).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("case") {
            continue;
        }
        let text = std::fs::read_to_string(&path).unwrap();
        let mut case = read_case(&text).unwrap();

        // write o read must be a fixpoint
        let written = solvent_testcase::write_case(&case);
        let reread = read_case(&written).unwrap();
        assert_eq!(
            written,
            solvent_testcase::write_case(&reread),
            "{path:?} round-trips"
        );

        // the recorded result must reproduce
        let expected = case.results.clone();
        for (part, want) in expected.iter().enumerate() {
            let got = format_result(&mut case, part).unwrap();
            assert_eq!(&got, want, "{path:?} part {part}");
        }
        ran += 1;
    }
    assert!(ran >= 2, "case files present");
}
