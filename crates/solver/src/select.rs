//! The selection engine
//!
//! Turns user strings and globs into concrete job entries. Matching is
//! tried in a fixed order: file list paths, names (with optional `.arch`
//! suffix and relational tail), provides, canonical `name-evr.arch`
//! parsing, and finally a case-insensitive retry. Selections compose with
//! add (union), subtract and filter (intersection).

use crate::job::{jobflags, select as sel, Job};
use regex::Regex;
use solvent_errors::{Result, SelectionError};
use solvent_pool::rels::{REL_ARCH, REL_EQ, REL_GT, REL_LT};
use solvent_pool::{Dep, Pool, SolvId, StrId};

/// What to match and how, see spec of the `selection_make` contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SelectionFlags(pub u32);

impl SelectionFlags {
    pub const NAME: u32 = 1 << 0;
    pub const PROVIDES: u32 = 1 << 1;
    pub const FILELIST: u32 = 1 << 2;
    pub const CANON: u32 = 1 << 3;
    pub const DOTARCH: u32 = 1 << 4;
    pub const REL: u32 = 1 << 5;
    pub const GLOB: u32 = 1 << 9;
    pub const FLAT: u32 = 1 << 10;
    pub const NOCASE: u32 = 1 << 11;
    pub const INSTALLED_ONLY: u32 = 1 << 12;
    pub const SOURCE_ONLY: u32 = 1 << 13;
    pub const WITH_SOURCE: u32 = 1 << 14;
    pub const WITH_DISABLED: u32 = 1 << 15;
    pub const SKIP_KIND: u32 = 1 << 16;
    pub const FILTER_KEEP_IFEMPTY: u32 = 1 << 17;

    /// Everything a plain package argument should try
    #[must_use]
    pub const fn default_mask() -> Self {
        Self(Self::NAME | Self::PROVIDES | Self::CANON | Self::DOTARCH | Self::REL | Self::GLOB)
    }

    #[must_use]
    pub const fn has(self, flag: u32) -> bool {
        self.0 & flag != 0
    }
}

/// A resolved selection: job templates plus the flag that matched
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// `(selection-kind | set-bits, what)` entries, job type still unset
    pub jobs: Vec<Job>,
    /// Which `SelectionFlags` bit produced the match (0 = nothing)
    pub matched: u32,
}

impl Selection {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Combine with a job type into runnable jobs
    #[must_use]
    pub fn to_jobs(&self, how: u32) -> Vec<Job> {
        self.jobs
            .iter()
            .map(|j| Job::new(how | j.how, j.what))
            .collect()
    }

    /// Expand to the concrete solvables the selection covers
    pub fn solvables(&self, pool: &mut Pool) -> Vec<SolvId> {
        let mut out = Vec::new();
        for j in &self.jobs {
            match j.selection() {
                sel::SOLVABLE => out.push(SolvId(j.what)),
                sel::SOLVABLE_NAME => {
                    let dep = j.what_dep();
                    let off = pool.whatprovides(dep);
                    for &q in &pool.providers_at(off).to_vec() {
                        if pool.match_nevr(SolvId(q), dep) {
                            out.push(SolvId(q));
                        }
                    }
                }
                sel::SOLVABLE_PROVIDES => {
                    let off = pool.whatprovides(j.what_dep());
                    for &q in pool.providers_at(off) {
                        out.push(SolvId(q));
                    }
                }
                sel::SOLVABLE_ONE_OF => {
                    for &q in pool.providers_at(solvent_pool::Offset(j.what)) {
                        out.push(SolvId(q));
                    }
                }
                sel::SOLVABLE_REPO => {
                    out.extend(pool.repo(j.what_repo()).solvables());
                }
                sel::SOLVABLE_ALL => {
                    out.extend(pool.solvable_ids());
                }
                _ => {}
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Union with another selection
    pub fn add(&mut self, other: &Selection) {
        for j in &other.jobs {
            if !self.jobs.contains(j) {
                self.jobs.push(*j);
            }
        }
        if self.matched == 0 {
            self.matched = other.matched;
        }
    }

    /// Remove the solvables of `other` from this selection
    pub fn subtract(&mut self, other: &Selection, pool: &mut Pool) {
        let mine = self.solvables(pool);
        let theirs = other.solvables(pool);
        let remaining: Vec<u32> = mine
            .iter()
            .filter(|p| !theirs.contains(p))
            .map(|p| p.0)
            .collect();
        self.replace_with_set(&remaining, pool);
    }

    /// Keep only the solvables also selected by `other`
    pub fn filter(&mut self, other: &Selection, pool: &mut Pool, keep_if_empty: bool) {
        let mine = self.solvables(pool);
        let theirs = other.solvables(pool);
        let remaining: Vec<u32> = mine
            .iter()
            .filter(|p| theirs.contains(p))
            .map(|p| p.0)
            .collect();
        if remaining.is_empty() && keep_if_empty {
            return;
        }
        self.replace_with_set(&remaining, pool);
    }

    fn replace_with_set(&mut self, set: &[u32], pool: &mut Pool) {
        self.jobs.clear();
        match set.len() {
            0 => {}
            1 => self
                .jobs
                .push(Job::new(sel::SOLVABLE | jobflags::NOAUTOSET, set[0])),
            _ => {
                let off = pool.ids_to_whatprovides(set);
                self.jobs
                    .push(Job::new(sel::SOLVABLE_ONE_OF | jobflags::NOAUTOSET, off.0));
            }
        }
    }
}

/// Turn a glob pattern into an anchored regex
fn glob_regex(pattern: &str, nocase: bool) -> Option<Regex> {
    let mut re = String::with_capacity(pattern.len() * 2 + 8);
    if nocase {
        re.push_str("(?i)");
    }
    re.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => re.push('['),
            ']' => re.push(']'),
            c if regex::escape(&c.to_string()).len() > 1 => {
                re.push_str(&regex::escape(&c.to_string()));
            }
            c => re.push(c),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

/// Build a selection for a user pattern
///
/// # Errors
///
/// [`SelectionError::NothingMatches`] when no matcher produced anything.
pub fn selection_make(pool: &mut Pool, pattern: &str, flags: SelectionFlags) -> Result<Selection> {
    // 1. file list
    if flags.has(SelectionFlags::FILELIST) && pattern.starts_with('/') {
        if let Some(s) = match_filelist(pool, pattern, flags) {
            return Ok(s);
        }
    }

    // split a relational tail: "name op evr"
    let (base, relop): (&str, Option<(u8, &str)>) = if flags.has(SelectionFlags::REL) {
        split_rel(pattern)
    } else {
        (pattern, None)
    };

    // 2. name (with optional .arch)
    if flags.has(SelectionFlags::NAME) {
        if let Some(s) = match_name(pool, base, relop, flags, false)? {
            return Ok(s);
        }
    }

    // 3. provides
    if flags.has(SelectionFlags::PROVIDES) {
        if let Some(s) = match_provides(pool, base, relop, flags)? {
            return Ok(s);
        }
    }

    // 4. canonical name-[epoch:]version-release.arch
    if flags.has(SelectionFlags::CANON) && relop.is_none() {
        if let Some(s) = match_canon(pool, pattern, flags)? {
            return Ok(s);
        }
    }

    // 5. case-insensitive retry
    if !flags.has(SelectionFlags::NOCASE) && flags.has(SelectionFlags::NAME) {
        if let Some(s) = match_name(pool, base, relop, flags, true)? {
            return Ok(s);
        }
    }

    Err(SelectionError::NothingMatches {
        pattern: pattern.to_string(),
    }
    .into())
}

/// Split `"name >= 1.2"` (spaces optional) into name and comparator tail
fn split_rel(pattern: &str) -> (&str, Option<(u8, &str)>) {
    for (op, flags) in [
        ("<=", REL_LT | REL_EQ),
        (">=", REL_GT | REL_EQ),
        ("<>", REL_LT | REL_GT),
        ("=", REL_EQ),
        ("<", REL_LT),
        (">", REL_GT),
    ] {
        if let Some(pos) = pattern.find(op) {
            if pos == 0 {
                continue;
            }
            let name = pattern[..pos].trim_end();
            let evr = pattern[pos + op.len()..].trim_start();
            if !name.is_empty() && !evr.is_empty() {
                return (name, Some((flags, evr)));
            }
        }
    }
    (pattern, None)
}

fn keep_solvable(pool: &Pool, p: SolvId, flags: SelectionFlags) -> bool {
    let s = pool.solvable(p);
    let is_src = s.arch == solvent_pool::knownids::ARCH_SRC
        || s.arch == solvent_pool::knownids::ARCH_NOSRC;
    if flags.has(SelectionFlags::SOURCE_ONLY) {
        return is_src;
    }
    if is_src && !flags.has(SelectionFlags::WITH_SOURCE) {
        return false;
    }
    if flags.has(SelectionFlags::INSTALLED_ONLY) && !pool.is_installed(p) {
        return false;
    }
    if !flags.has(SelectionFlags::WITH_DISABLED) && !pool.is_installed(p) && !pool.installable(p) {
        return false;
    }
    true
}

/// All distinct `(name, arch)` candidate names matching a base pattern
fn matching_names(pool: &Pool, base: &str, flags: SelectionFlags, nocase: bool) -> Vec<StrId> {
    if !nocase && !(flags.has(SelectionFlags::GLOB) && is_glob(base)) {
        return pool.find_str(base).map(|id| vec![id]).unwrap_or_default();
    }
    let matcher: Box<dyn Fn(&str) -> bool> =
        if flags.has(SelectionFlags::GLOB) && is_glob(base) {
            match glob_regex(base, nocase) {
                Some(re) => Box::new(move |s: &str| re.is_match(s)),
                None => return Vec::new(),
            }
        } else {
            let lowered = base.to_lowercase();
            Box::new(move |s: &str| s.to_lowercase() == lowered)
        };
    let mut names: Vec<StrId> = pool
        .solvable_ids()
        .map(|p| pool.solvable(p).name)
        .filter(|&n| matcher(pool.str(n)))
        .collect();
    names.sort_unstable();
    names.dedup();
    names
}

#[allow(clippy::unnecessary_wraps)]
fn match_name(
    pool: &mut Pool,
    base: &str,
    relop: Option<(u8, &str)>,
    flags: SelectionFlags,
    nocase: bool,
) -> Result<Option<Selection>> {
    // optional .arch suffix
    let mut tries: Vec<(&str, Option<&str>)> = vec![(base, None)];
    if flags.has(SelectionFlags::DOTARCH) {
        if let Some(pos) = base.rfind('.') {
            let (name, arch) = (&base[..pos], &base[pos + 1..]);
            if !name.is_empty() && !arch.is_empty() && pool.find_str(arch).is_some() {
                tries.insert(0, (name, Some(arch)));
            }
        }
    }
    for (name_pat, arch) in tries {
        let names = matching_names(pool, name_pat, flags, nocase);
        let mut selection = Selection {
            jobs: Vec::new(),
            matched: SelectionFlags::NAME,
        };
        for name in names {
            let mut dep = Dep::from_str_id(name);
            let mut setbits = 0;
            if let Some(arch) = arch {
                let arch_id = pool.intern(arch)?;
                dep = pool.rel(dep, Dep::from_str_id(arch_id), REL_ARCH)?;
                setbits |= jobflags::SETARCH;
            }
            if let Some((relflags, evr)) = relop {
                let evr_id = pool.intern(evr)?;
                dep = pool.rel(dep, Dep::from_str_id(evr_id), relflags)?;
                setbits |= jobflags::SETEVR;
            }
            // verify at least one matching solvable exists
            let off = pool.whatprovides(dep);
            let any = pool
                .providers_at(off)
                .to_vec()
                .iter()
                .any(|&q| pool.match_nevr(SolvId(q), dep) && keep_solvable(pool, SolvId(q), flags));
            if any {
                selection
                    .jobs
                    .push(Job::new(sel::SOLVABLE_NAME | setbits, dep.raw()));
            }
        }
        if !selection.jobs.is_empty() {
            return Ok(Some(selection));
        }
    }
    Ok(None)
}

#[allow(clippy::unnecessary_wraps)]
fn match_provides(
    pool: &mut Pool,
    base: &str,
    relop: Option<(u8, &str)>,
    flags: SelectionFlags,
) -> Result<Option<Selection>> {
    let candidates: Vec<StrId> = if flags.has(SelectionFlags::GLOB) && is_glob(base) {
        // glob over all known provide names is too wide; restrict to
        // package names and exact interned matches
        matching_names(pool, base, flags, false)
    } else {
        pool.find_str(base).map(|id| vec![id]).unwrap_or_default()
    };
    let mut selection = Selection {
        jobs: Vec::new(),
        matched: SelectionFlags::PROVIDES,
    };
    for name in candidates {
        let mut dep = Dep::from_str_id(name);
        let mut setbits = 0;
        if let Some((relflags, evr)) = relop {
            let evr_id = pool.intern(evr)?;
            dep = pool.rel(dep, Dep::from_str_id(evr_id), relflags)?;
            setbits |= jobflags::SETEVR;
        }
        let off = pool.whatprovides(dep);
        let any = pool
            .providers_at(off)
            .to_vec()
            .iter()
            .any(|&q| keep_solvable(pool, SolvId(q), flags));
        if any {
            selection
                .jobs
                .push(Job::new(sel::SOLVABLE_PROVIDES | setbits, dep.raw()));
        }
    }
    if selection.jobs.is_empty() {
        Ok(None)
    } else {
        Ok(Some(selection))
    }
}

fn match_filelist(pool: &mut Pool, pattern: &str, flags: SelectionFlags) -> Option<Selection> {
    let path = pool.intern(pattern).ok()?;
    let dep = Dep::from_str_id(path);
    let off = pool.whatprovides(dep);
    let any = pool
        .providers_at(off)
        .to_vec()
        .iter()
        .any(|&q| keep_solvable(pool, SolvId(q), flags));
    if any {
        Some(Selection {
            jobs: vec![Job::new(sel::SOLVABLE_PROVIDES, dep.raw())],
            matched: SelectionFlags::FILELIST,
        })
    } else {
        None
    }
}

/// `name-[epoch:]version-release.arch` and `name-[epoch:]version` forms
#[allow(clippy::unnecessary_wraps)]
fn match_canon(pool: &mut Pool, pattern: &str, flags: SelectionFlags) -> Result<Option<Selection>> {
    let mut matches: Vec<u32> = Vec::new();
    // strip a known arch suffix first, if any
    let (body, arch) = match pattern.rfind('.') {
        Some(pos) => {
            let arch = &pattern[pos + 1..];
            if pool.find_str(arch).is_some() && !arch.is_empty() {
                (&pattern[..pos], Some(arch.to_string()))
            } else {
                (pattern, None)
            }
        }
        None => (pattern, None),
    };
    // split name-evr at every '-' from the right
    let positions: Vec<usize> = body
        .char_indices()
        .filter(|&(_, c)| c == '-')
        .map(|(i, _)| i)
        .collect();
    for &pos in positions.iter().rev() {
        let (name, evr) = (&body[..pos], &body[pos + 1..]);
        if name.is_empty() || evr.is_empty() {
            continue;
        }
        let Some(name_id) = pool.find_str(name) else {
            continue;
        };
        for p in pool.solvable_ids().collect::<Vec<_>>() {
            let s = pool.solvable(p);
            if s.name != name_id || !keep_solvable(pool, p, flags) {
                continue;
            }
            if let Some(arch) = &arch {
                if pool.str(s.arch) != arch {
                    continue;
                }
            }
            let sevr = pool.str(s.evr);
            // tolerate a missing epoch or release in the pattern
            let evr_matches = sevr == evr
                || sevr.split(':').next_back().unwrap_or(sevr) == evr
                || sevr.rsplit_once('-').is_some_and(|(v, _)| v == evr);
            if evr_matches {
                matches.push(p.0);
            }
        }
        if !matches.is_empty() {
            break;
        }
    }
    if matches.is_empty() {
        return Ok(None);
    }
    matches.sort_unstable();
    matches.dedup();
    let mut selection = Selection {
        jobs: Vec::new(),
        matched: SelectionFlags::CANON,
    };
    if matches.len() == 1 {
        selection.jobs.push(Job::new(
            sel::SOLVABLE | jobflags::SETEVR | jobflags::SETARCH,
            matches[0],
        ));
    } else {
        let off = pool.ids_to_whatprovides(&matches);
        selection.jobs.push(Job::new(
            sel::SOLVABLE_ONE_OF | jobflags::SETEVR | jobflags::SETARCH,
            off.0,
        ));
    }
    Ok(Some(selection))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solvent_pool::rels::REL_EQ;
    use solvent_pool::DistType;

    fn sample_pool() -> Pool {
        let mut pool = Pool::new(DistType::Rpm);
        let repo = pool.add_repo("repo");
        for (name, evr) in [
            ("vim", "8.2-1"),
            ("vim", "9.0-1"),
            ("vim-data", "9.0-1"),
            ("emacs", "28.1-1"),
        ] {
            let p = pool.add_solvable(repo).unwrap();
            let name_id = pool.intern(name).unwrap();
            let evr_id = pool.intern(evr).unwrap();
            let arch_id = pool.intern("x86_64").unwrap();
            let selfprov = pool
                .rel(Dep::from_str_id(name_id), Dep::from_str_id(evr_id), REL_EQ)
                .unwrap();
            let off = pool.repo_mut(repo).add_dep_list(&[selfprov]);
            let s = pool.solvable_mut(p);
            s.name = name_id;
            s.evr = evr_id;
            s.arch = arch_id;
            s.provides = off;
        }
        pool.create_whatprovides();
        pool
    }

    #[test]
    fn plain_name_selects_all_versions() {
        let mut pool = sample_pool();
        let s = selection_make(&mut pool, "vim", SelectionFlags::default_mask()).unwrap();
        assert_eq!(s.matched, SelectionFlags::NAME);
        assert_eq!(s.solvables(&mut pool).len(), 2);
    }

    #[test]
    fn glob_matches_multiple_names() {
        let mut pool = sample_pool();
        let s = selection_make(&mut pool, "vim*", SelectionFlags::default_mask()).unwrap();
        assert_eq!(s.solvables(&mut pool).len(), 3);
    }

    #[test]
    fn relational_tail_filters_versions() {
        let mut pool = sample_pool();
        let s = selection_make(&mut pool, "vim >= 9", SelectionFlags::default_mask()).unwrap();
        let ids = s.solvables(&mut pool);
        assert_eq!(ids.len(), 1);
        assert_eq!(pool.solvid2str(ids[0]), "vim-9.0-1.x86_64");
    }

    #[test]
    fn dotarch_suffix() {
        let mut pool = sample_pool();
        let s = selection_make(&mut pool, "emacs.x86_64", SelectionFlags::default_mask()).unwrap();
        assert_eq!(s.solvables(&mut pool).len(), 1);
    }

    #[test]
    fn canonical_nevra() {
        let mut pool = sample_pool();
        let s =
            selection_make(&mut pool, "vim-9.0-1.x86_64", SelectionFlags::default_mask()).unwrap();
        assert_eq!(s.matched, SelectionFlags::CANON);
        let ids = s.solvables(&mut pool);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn nocase_fallback() {
        let mut pool = sample_pool();
        let s = selection_make(&mut pool, "VIM", SelectionFlags::default_mask()).unwrap();
        assert_eq!(s.solvables(&mut pool).len(), 2);
    }

    #[test]
    fn nothing_matches_is_an_error() {
        let mut pool = sample_pool();
        assert!(selection_make(&mut pool, "no-such-thing", SelectionFlags::default_mask()).is_err());
    }

    #[test]
    fn subtract_and_filter() {
        let mut pool = sample_pool();
        let mut all = selection_make(&mut pool, "vim*", SelectionFlags::default_mask()).unwrap();
        let data = selection_make(&mut pool, "vim-data", SelectionFlags::default_mask()).unwrap();
        all.subtract(&data, &mut pool);
        assert_eq!(all.solvables(&mut pool).len(), 2);

        let mut both = selection_make(&mut pool, "vim*", SelectionFlags::default_mask()).unwrap();
        let keep = selection_make(&mut pool, "vim-data", SelectionFlags::default_mask()).unwrap();
        both.filter(&keep, &mut pool, false);
        assert_eq!(both.solvables(&mut pool).len(), 1);
    }
}
