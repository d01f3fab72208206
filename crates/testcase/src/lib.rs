#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Textual testcases
//!
//! A line-oriented format describing a pool, a job queue and the expected
//! result, used as the regression-test contract. One statement per line,
//! whitespace-separated values, `#` comments. Reading a written case
//! yields the same case back (modulo comment placement).
//!
//! ```text
//! repo available 99
//! solvable vim 9.0-1 x86_64
//! requires libfoo >= 1
//! system x86_64 rpm @System
//! job install name vim [weak]
//! nextjob
//! ```

use solvent_errors::{Error, ParseError, Result};
use solvent_pool::solvable::DepKey;
use solvent_pool::{knownids, Dep, DistType, Pool, SolvId, StrId};
use solvent_solver::{jobflags, jobselect, jobtype, Job, Solver, SolverFlags};
use solvent_transaction::{StepKind, Transaction};

/// A parsed testcase: the pool plus one job queue per `nextjob` part
#[derive(Debug)]
pub struct TestCase {
    pub pool: Pool,
    pub parts: Vec<Vec<Job>>,
    pub flags: SolverFlags,
    /// Expected result blocks, one per part that declared one
    pub results: Vec<String>,
}

#[derive(Debug, Default)]
struct PendingSolvable {
    repo: Option<solvent_pool::RepoId>,
    id: Option<SolvId>,
    name: StrId,
    evr: StrId,
    deps: Vec<(DepKey, Vec<Dep>)>,
    prereqs: Vec<Dep>,
}

fn dep_key(keyword: &str) -> Option<DepKey> {
    Some(match keyword {
        "provides" => DepKey::Provides,
        "requires" => DepKey::Requires,
        "conflicts" => DepKey::Conflicts,
        "obsoletes" => DepKey::Obsoletes,
        "recommends" => DepKey::Recommends,
        "suggests" => DepKey::Suggests,
        "supplements" => DepKey::Supplements,
        "enhances" => DepKey::Enhances,
        _ => return None,
    })
}

fn dep_key_keyword(key: DepKey) -> &'static str {
    match key {
        DepKey::Provides => "provides",
        DepKey::Requires => "requires",
        DepKey::Conflicts => "conflicts",
        DepKey::Obsoletes => "obsoletes",
        DepKey::Recommends => "recommends",
        DepKey::Suggests => "suggests",
        DepKey::Supplements => "supplements",
        DepKey::Enhances => "enhances",
    }
}

fn parse_err(line: usize, message: impl Into<String>) -> Error {
    ParseError::Testcase {
        line,
        message: message.into(),
    }
    .into()
}

/// Flush a pending solvable's dependency lists into its repo
fn flush_solvable(pool: &mut Pool, pending: &mut PendingSolvable) -> Result<()> {
    let (Some(repo), Some(id)) = (pending.repo, pending.id) else {
        return Ok(());
    };
    // implicit self-provides: name = evr
    let selfprov = pool.rel(
        Dep::from_str_id(pending.name),
        Dep::from_str_id(pending.evr),
        solvent_pool::rels::REL_EQ,
    )?;
    let mut offsets: Vec<(DepKey, solvent_pool::Offset)> = Vec::new();
    let mut saw_provides = false;
    for (key, deps) in &pending.deps {
        let off = if *key == DepKey::Requires && !pending.prereqs.is_empty() {
            pool.repo_mut(repo).add_dep_list_with_marker(
                deps,
                knownids::PREREQ_MARKER,
                &pending.prereqs.clone(),
            )
        } else if *key == DepKey::Provides {
            saw_provides = true;
            let mut all = deps.clone();
            all.insert(0, selfprov);
            pool.repo_mut(repo).add_dep_list(&all)
        } else {
            pool.repo_mut(repo).add_dep_list(deps)
        };
        offsets.push((*key, off));
    }
    if !saw_provides {
        let off = pool.repo_mut(repo).add_dep_list(&[selfprov]);
        offsets.push((DepKey::Provides, off));
    }
    if !pending.prereqs.is_empty() && !pending.deps.iter().any(|(k, _)| *k == DepKey::Requires) {
        let off = pool.repo_mut(repo).add_dep_list_with_marker(
            &[],
            knownids::PREREQ_MARKER,
            &pending.prereqs.clone(),
        );
        offsets.push((DepKey::Requires, off));
    }
    let s = pool.solvable_mut(id);
    for (key, off) in offsets {
        s.set_dep_offset(key, off);
    }
    pending.id = None;
    pending.deps.clear();
    pending.prereqs.clear();
    Ok(())
}

fn parse_job_flags(token: &str) -> u32 {
    let mut flags = 0;
    for f in token.trim_matches(['[', ']']).split(',') {
        flags |= match f {
            "weak" => jobflags::WEAK,
            "essential" => jobflags::ESSENTIAL,
            "cleandeps" => jobflags::CLEANDEPS,
            "orupdate" => jobflags::ORUPDATE,
            "forcebest" => jobflags::FORCEBEST,
            "targeted" => jobflags::TARGETED,
            "setev" => jobflags::SETEV,
            "setevr" => jobflags::SETEVR,
            "setarch" => jobflags::SETARCH,
            "setvendor" => jobflags::SETVENDOR,
            "setrepo" => jobflags::SETREPO,
            "noautoset" => jobflags::NOAUTOSET,
            _ => 0,
        };
    }
    flags
}

fn job_flags_string(how: u32) -> String {
    let mut flags = Vec::new();
    for (bit, name) in [
        (jobflags::WEAK, "weak"),
        (jobflags::ESSENTIAL, "essential"),
        (jobflags::CLEANDEPS, "cleandeps"),
        (jobflags::ORUPDATE, "orupdate"),
        (jobflags::FORCEBEST, "forcebest"),
        (jobflags::TARGETED, "targeted"),
        (jobflags::SETEV, "setev"),
        (jobflags::SETEVR, "setevr"),
        (jobflags::SETARCH, "setarch"),
        (jobflags::SETVENDOR, "setvendor"),
        (jobflags::SETREPO, "setrepo"),
        (jobflags::NOAUTOSET, "noautoset"),
    ] {
        if how & bit != 0 {
            flags.push(name);
        }
    }
    if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(","))
    }
}

/// Read a testcase from its textual form
///
/// # Errors
///
/// Malformed statements surface as [`ParseError::Testcase`] with the line
/// number; the pool is not partially mutated visible to the caller.
#[allow(clippy::too_many_lines)]
pub fn read_case(text: &str) -> Result<TestCase> {
    let mut pool = Pool::new(DistType::Rpm);
    let mut flags = SolverFlags::default();
    let mut parts: Vec<Vec<Job>> = vec![Vec::new()];
    let mut results: Vec<String> = Vec::new();
    let mut pending = PendingSolvable::default();
    let mut current_repo = None;
    let mut in_result = false;
    let mut result_buf = String::new();

    for (lineno, raw) in text.lines().enumerate() {
        let lineno = lineno + 1;
        let line = raw.trim();
        if in_result {
            if line == "endresult" {
                in_result = false;
                results.push(result_buf.clone());
                result_buf.clear();
            } else {
                result_buf.push_str(line);
                result_buf.push('\n');
            }
            continue;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or("");
        let rest: Vec<&str> = tokens.collect();

        match keyword {
            "repo" => {
                flush_solvable(&mut pool, &mut pending)?;
                let name = rest
                    .first()
                    .ok_or_else(|| parse_err(lineno, "repo needs a name"))?;
                let priority: i32 = rest.get(1).and_then(|p| p.parse().ok()).unwrap_or(0);
                let id = pool.add_repo(name);
                pool.repo_mut(id).priority = priority;
                current_repo = Some(id);
            }
            "solvable" => {
                flush_solvable(&mut pool, &mut pending)?;
                let repo =
                    current_repo.ok_or_else(|| parse_err(lineno, "solvable outside a repo"))?;
                let name = rest
                    .first()
                    .ok_or_else(|| parse_err(lineno, "solvable needs a name"))?;
                let evr = rest
                    .get(1)
                    .ok_or_else(|| parse_err(lineno, "solvable needs an evr"))?;
                let arch = rest.get(2).unwrap_or(&"noarch");
                let id = pool.add_solvable(repo)?;
                let name_id = pool.intern(name)?;
                let evr_id = pool.intern(evr)?;
                let arch_id = pool.intern(arch)?;
                let vendor_id = match rest.get(3) {
                    Some(v) => pool.intern(v)?,
                    None => StrId::EMPTY,
                };
                let s = pool.solvable_mut(id);
                s.name = name_id;
                s.evr = evr_id;
                s.arch = arch_id;
                s.vendor = vendor_id;
                pending.repo = Some(repo);
                pending.id = Some(id);
                pending.name = name_id;
                pending.evr = evr_id;
            }
            "prerequires" => {
                if pending.id.is_none() {
                    return Err(parse_err(lineno, "dependency outside a solvable"));
                }
                let dep = pool.str2dep(&rest.join(" "))?;
                pending.prereqs.push(dep);
            }
            kw if dep_key(kw).is_some() => {
                let key = dep_key(kw).unwrap_or(DepKey::Provides);
                if pending.id.is_none() {
                    return Err(parse_err(lineno, "dependency outside a solvable"));
                }
                let dep = pool.str2dep(&rest.join(" "))?;
                match pending.deps.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, list)) => list.push(dep),
                    None => pending.deps.push((key, vec![dep])),
                }
            }
            "system" => {
                flush_solvable(&mut pool, &mut pending)?;
                if let Some(arch) = rest.first() {
                    if *arch != "unset" {
                        pool.set_arch(arch)?;
                    }
                }
                if let Some(dist) = rest.get(1) {
                    pool.disttype = match *dist {
                        "deb" => DistType::Deb,
                        "conda" => DistType::Conda,
                        "haiku" => DistType::Haiku,
                        _ => DistType::Rpm,
                    };
                }
                if let Some(repo_name) = rest.get(2) {
                    if let Some(id) = pool.repo_by_name(repo_name) {
                        pool.set_installed(id)?;
                    }
                }
            }
            "job" => {
                flush_solvable(&mut pool, &mut pending)?;
                let job = parse_job(&mut pool, &rest, lineno)?;
                parts
                    .last_mut()
                    .ok_or_else(|| parse_err(lineno, "no job part"))?
                    .push(job);
            }
            "solverflags" | "feature" => {
                for f in &rest {
                    match *f {
                        "allowdowngrade" => flags.allow_downgrade = true,
                        "allowarchchange" => flags.allow_arch_change = true,
                        "allowvendorchange" => flags.allow_vendor_change = true,
                        "allowuninstall" => flags.allow_uninstall = true,
                        "ignorerecommended" => flags.ignore_recommended = true,
                        _ => return Err(parse_err(lineno, format!("unknown solver flag {f}"))),
                    }
                }
            }
            "pool" => {
                // pool-level knobs: disttype and obsolete semantics
                for f in &rest {
                    match *f {
                        "rpm" => pool.disttype = DistType::Rpm,
                        "deb" => pool.disttype = DistType::Deb,
                        "conda" => pool.disttype = DistType::Conda,
                        "haiku" => pool.disttype = DistType::Haiku,
                        "promoteepoch" => pool.flags.promote_epoch = true,
                        "obsoleteusesprovides" => pool.flags.obsolete_uses_provides = true,
                        "implicitobsoleteusesprovides" => {
                            pool.flags.implicit_obsolete_uses_provides = true;
                        }
                        "noinstalledobsoletes" => pool.flags.no_installed_obsoletes = true,
                        "forbidselfconflicts" => pool.flags.forbid_selfconflicts = true,
                        _ => return Err(parse_err(lineno, format!("unknown pool flag {f}"))),
                    }
                }
            }
            "disable" => {
                flush_solvable(&mut pool, &mut pending)?;
                let target = rest.join(" ");
                let Some(p) = pool.find_solvable(target.trim_start_matches("pkg ").trim()) else {
                    return Err(parse_err(lineno, format!("cannot disable '{target}'")));
                };
                let mut considered = solvent_pool::Map::new(pool.nsolvables());
                considered.set_all();
                considered.clear(p.index());
                pool.set_considered(Some(considered));
            }
            "enable" => {
                pool.set_considered(None);
            }
            "namespace" => {
                // namespace <name> <evr> [providers...]: a static answer
                flush_solvable(&mut pool, &mut pending)?;
                let ns = rest
                    .first()
                    .ok_or_else(|| parse_err(lineno, "namespace needs a name"))?;
                let evr = rest
                    .get(1)
                    .ok_or_else(|| parse_err(lineno, "namespace needs an argument"))?;
                let providers: Vec<String> =
                    rest.iter().skip(2).map(|s| (*s).to_string()).collect();
                register_namespace(&mut pool, ns, evr, &providers)?;
            }
            "nextjob" => {
                flush_solvable(&mut pool, &mut pending)?;
                parts.push(Vec::new());
            }
            "result" => {
                flush_solvable(&mut pool, &mut pending)?;
                in_result = true;
            }
            other => return Err(parse_err(lineno, format!("unknown statement '{other}'"))),
        }
    }
    flush_solvable(&mut pool, &mut pending)?;
    if parts.last().is_some_and(Vec::is_empty) && parts.len() > 1 {
        parts.pop();
    }
    pool.create_whatprovides();
    Ok(TestCase {
        pool,
        parts,
        flags,
        results,
    })
}

struct StaticNamespace {
    entries: Vec<(StrId, StrId, Vec<SolvId>)>,
}

impl solvent_pool::NamespaceProvider for StaticNamespace {
    fn providers(
        &mut self,
        _pool: &Pool,
        name: StrId,
        evr: Dep,
    ) -> solvent_pool::NamespaceAnswer {
        for (ns, arg, pkgs) in &self.entries {
            if Dep::from_str_id(*arg) == evr && *ns == name {
                if pkgs.is_empty() {
                    return solvent_pool::NamespaceAnswer::System;
                }
                return solvent_pool::NamespaceAnswer::Packages(pkgs.clone());
            }
        }
        solvent_pool::NamespaceAnswer::None
    }
}

fn register_namespace(pool: &mut Pool, ns: &str, evr: &str, providers: &[String]) -> Result<()> {
    let ns_id = pool.intern(ns)?;
    let evr_id = pool.intern(evr)?;
    let pkgs: Vec<SolvId> = providers
        .iter()
        .filter_map(|nevra| pool.find_solvable(nevra))
        .collect();
    // testcases only ever declare a handful of namespace answers
    pool.set_namespace_callback(Some(Box::new(StaticNamespace {
        entries: vec![(ns_id, evr_id, pkgs)],
    })));
    Ok(())
}

fn parse_job(pool: &mut Pool, rest: &[&str], lineno: usize) -> Result<Job> {
    let type_kw = rest
        .first()
        .ok_or_else(|| parse_err(lineno, "job needs a type"))?;
    let how_type = match *type_kw {
        "install" => jobtype::INSTALL,
        "erase" => jobtype::ERASE,
        "update" => jobtype::UPDATE,
        "distupgrade" => jobtype::DISTUPGRADE,
        "verify" => jobtype::VERIFY,
        "lock" => jobtype::LOCK,
        "multiversion" => jobtype::MULTIVERSION,
        "favor" => jobtype::FAVOR,
        "disfavor" => jobtype::DISFAVOR,
        "allowuninstall" => jobtype::ALLOWUNINSTALL,
        "noop" => jobtype::NOOP,
        other => return Err(parse_err(lineno, format!("unknown job type '{other}'"))),
    };
    let sel_kw = rest
        .get(1)
        .ok_or_else(|| parse_err(lineno, "job needs a selection"))?;
    let mut flags = 0;
    let args: Vec<&str> = rest[2..]
        .iter()
        .filter(|t| {
            if t.starts_with('[') {
                flags |= parse_job_flags(t);
                false
            } else {
                true
            }
        })
        .copied()
        .collect();
    let arg = args.join(" ");
    let (selection, what) = match *sel_kw {
        "pkg" => {
            let p = pool
                .find_solvable(&arg)
                .ok_or_else(|| parse_err(lineno, format!("no solvable '{arg}'")))?;
            (jobselect::SOLVABLE, p.0)
        }
        "name" => {
            let dep = pool.str2dep(&arg)?;
            (jobselect::SOLVABLE_NAME, dep.raw())
        }
        "provides" => {
            let dep = pool.str2dep(&arg)?;
            (jobselect::SOLVABLE_PROVIDES, dep.raw())
        }
        "oneof" => {
            let ids: Vec<u32> = args
                .iter()
                .filter_map(|nevra| pool.find_solvable(nevra))
                .map(|p| p.0)
                .collect();
            let off = pool.ids_to_whatprovides(&ids);
            (jobselect::SOLVABLE_ONE_OF, off.0)
        }
        "repo" => {
            let id = pool
                .repo_by_name(&arg)
                .ok_or_else(|| parse_err(lineno, format!("no repo '{arg}'")))?;
            (jobselect::SOLVABLE_REPO, id.0)
        }
        "all" => (jobselect::SOLVABLE_ALL, 0),
        other => return Err(parse_err(lineno, format!("unknown selection '{other}'"))),
    };
    Ok(Job::new(how_type | selection | flags, what))
}

/// Write a testcase back to its textual form
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn write_case(case: &TestCase) -> String {
    let pool = &case.pool;
    let mut out = String::new();
    for repo in pool.repos() {
        out.push_str(&format!("repo {} {}\n", repo.name, repo.priority));
        for p in repo.solvables() {
            let s = pool.solvable(p);
            if s.is_deleted() {
                continue;
            }
            let vendor = pool.str(s.vendor);
            if vendor.is_empty() {
                out.push_str(&format!(
                    "solvable {} {} {}\n",
                    pool.str(s.name),
                    pool.str(s.evr),
                    pool.str(s.arch)
                ));
            } else {
                out.push_str(&format!(
                    "solvable {} {} {} {}\n",
                    pool.str(s.name),
                    pool.str(s.evr),
                    pool.str(s.arch),
                    vendor
                ));
            }
            for key in [
                DepKey::Provides,
                DepKey::Requires,
                DepKey::Conflicts,
                DepKey::Obsoletes,
                DepKey::Recommends,
                DepKey::Suggests,
                DepKey::Supplements,
                DepKey::Enhances,
            ] {
                let off = s.dep_offset(key);
                if off.is_unset() {
                    continue;
                }
                if key == DepKey::Requires {
                    let (ordinary, pre) =
                        repo.dep_list_split(off, knownids::PREREQ_MARKER);
                    for &raw in ordinary {
                        out.push_str(&format!(
                            "requires {}\n",
                            pool.dep2str(Dep::from_raw(raw))
                        ));
                    }
                    for &raw in pre {
                        out.push_str(&format!(
                            "prerequires {}\n",
                            pool.dep2str(Dep::from_raw(raw))
                        ));
                    }
                    continue;
                }
                for dep in repo.dep_list(off) {
                    if key == DepKey::Provides && is_self_provides(pool, s, dep) {
                        continue;
                    }
                    out.push_str(&format!(
                        "{} {}\n",
                        dep_key_keyword(key),
                        pool.dep2str(dep)
                    ));
                }
            }
        }
    }
    // system line
    let installed = pool
        .installed()
        .map(|r| pool.repo(r).name.clone());
    let dist = match pool.disttype {
        DistType::Rpm => "rpm",
        DistType::Deb => "deb",
        DistType::Conda => "conda",
        DistType::Haiku => "haiku",
    };
    match installed {
        Some(name) => out.push_str(&format!("system unset {dist} {name}\n")),
        None => out.push_str(&format!("system unset {dist}\n")),
    }
    // solver flags
    let mut fl = Vec::new();
    if case.flags.allow_downgrade {
        fl.push("allowdowngrade");
    }
    if case.flags.allow_arch_change {
        fl.push("allowarchchange");
    }
    if case.flags.allow_vendor_change {
        fl.push("allowvendorchange");
    }
    if case.flags.allow_uninstall {
        fl.push("allowuninstall");
    }
    if case.flags.ignore_recommended {
        fl.push("ignorerecommended");
    }
    if !fl.is_empty() {
        out.push_str(&format!("solverflags {}\n", fl.join(" ")));
    }
    // jobs
    for (i, part) in case.parts.iter().enumerate() {
        if i > 0 {
            out.push_str("nextjob\n");
        }
        for job in part {
            out.push_str(&write_job(pool, *job));
        }
    }
    for result in &case.results {
        out.push_str("result\n");
        out.push_str(result);
        out.push_str("endresult\n");
    }
    out
}

fn is_self_provides(pool: &Pool, s: &solvent_pool::Solvable, dep: Dep) -> bool {
    pool.rel_of(dep).is_ok_and(|rel| {
        rel.name == Dep::from_str_id(s.name)
            && rel.evr == Dep::from_str_id(s.evr)
            && rel.flags == solvent_pool::rels::REL_EQ
    })
}

fn write_job(pool: &Pool, job: Job) -> String {
    let type_kw = match job.job_type() {
        jobtype::INSTALL => "install",
        jobtype::ERASE => "erase",
        jobtype::UPDATE => "update",
        jobtype::DISTUPGRADE => "distupgrade",
        jobtype::VERIFY => "verify",
        jobtype::LOCK => "lock",
        jobtype::MULTIVERSION => "multiversion",
        jobtype::FAVOR => "favor",
        jobtype::DISFAVOR => "disfavor",
        jobtype::ALLOWUNINSTALL => "allowuninstall",
        _ => "noop",
    };
    let flags = job_flags_string(job.how);
    match job.selection() {
        jobselect::SOLVABLE => format!(
            "job {type_kw} pkg {}{flags}\n",
            pool.solvid2str(job.what_solvable())
        ),
        jobselect::SOLVABLE_NAME => format!(
            "job {type_kw} name {}{flags}\n",
            pool.dep2str(job.what_dep())
        ),
        jobselect::SOLVABLE_PROVIDES => format!(
            "job {type_kw} provides {}{flags}\n",
            pool.dep2str(job.what_dep())
        ),
        jobselect::SOLVABLE_ONE_OF => {
            let names: Vec<String> = pool
                .providers_at(solvent_pool::Offset(job.what))
                .iter()
                .map(|&q| pool.solvid2str(SolvId(q)))
                .collect();
            format!("job {type_kw} oneof {}{flags}\n", names.join(" "))
        }
        jobselect::SOLVABLE_REPO => format!(
            "job {type_kw} repo {}{flags}\n",
            pool.repo(job.what_repo()).name
        ),
        _ => format!("job {type_kw} all{flags}\n"),
    }
}

/// Solve one part of a testcase and render the canonical result listing
///
/// # Errors
///
/// Propagates solver errors (cancellation, internal invariants).
pub fn format_result(case: &mut TestCase, part: usize) -> Result<String> {
    let jobs = case.parts.get(part).cloned().unwrap_or_default();
    let mut solver = Solver::new(&mut case.pool);
    solver.flags = case.flags;
    let problems = solver.solve(jobs)?;
    let mut lines: Vec<String> = Vec::new();
    if problems > 0 {
        for p in solver.all_problems() {
            lines.push(format!("problem {}", p.description));
        }
    } else {
        let trans = Transaction::from_solver(&solver)?;
        let pool = solver.pool();
        for &v in &trans.steps {
            let p = SolvId(v.unsigned_abs());
            let kind = trans.step_kind(pool, p, 0);
            let verb = match kind {
                StepKind::Erase => "erase",
                StepKind::Install | StepKind::MultiInstall => "install",
                StepKind::Reinstall | StepKind::MultiReinstall => "reinstall",
                StepKind::Upgrade => "upgrade",
                StepKind::Downgrade => "downgrade",
                StepKind::Change => "change",
                StepKind::Obsoletes => "obsoletes",
                _ => continue, // erase side of a replacement: shown once
            };
            lines.push(format!("{verb} {}", pool.solvid2str(p)));
        }
    }
    lines.sort();
    let mut out = lines.join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASE: &str = "\
repo @System 0
solvable a 1-1 x86_64
repo available 99
solvable a 2-1 x86_64
requires libfoo
solvable libfoo-pkg 1-1 x86_64
provides libfoo
system unset rpm @System
job update name a
";

    #[test]
    fn read_builds_pool_and_jobs() {
        let case = read_case(CASE).unwrap();
        assert_eq!(case.pool.repos().len(), 2);
        assert_eq!(case.parts.len(), 1);
        assert_eq!(case.parts[0].len(), 1);
        assert!(case.pool.installed().is_some());
        assert!(case.pool.find_solvable("a-2-1.x86_64").is_some());
    }

    #[test]
    fn round_trip_is_stable() {
        let case = read_case(CASE).unwrap();
        let written = write_case(&case);
        let reread = read_case(&written).unwrap();
        let rewritten = write_case(&reread);
        assert_eq!(written, rewritten, "write o read is a fixpoint");
    }

    #[test]
    fn solve_produces_expected_steps() {
        let mut case = read_case(CASE).unwrap();
        let result = format_result(&mut case, 0).unwrap();
        assert!(result.contains("upgrade a-2-1.x86_64"), "result: {result}");
        assert!(
            result.contains("install libfoo-pkg-1-1.x86_64"),
            "result: {result}"
        );
    }

    #[test]
    fn unknown_statement_is_an_error() {
        let err = read_case("fnord x y\n");
        assert!(err.is_err());
    }

    #[test]
    fn nextjob_splits_parts() {
        let text = format!("{CASE}nextjob\njob erase pkg a-1-1.x86_64\n");
        let case = read_case(&text).unwrap();
        assert_eq!(case.parts.len(), 2);
        assert_eq!(case.parts[1].len(), 1);
    }

    #[test]
    fn result_blocks_are_captured() {
        let text = format!("{CASE}result\nupgrade a-2-1.x86_64\nendresult\n");
        let case = read_case(&text).unwrap();
        assert_eq!(case.results.len(), 1);
        assert!(case.results[0].contains("upgrade"));
    }
}
