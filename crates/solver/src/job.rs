//! Job encoding
//!
//! A job is a `(how, what)` pair: `how` packs the selection kind, the job
//! type and modifier flags into one word; `what` is a packed dependency,
//! a solvable id or a repo id depending on the selection kind. This is the
//! even-length queue contract the caller hands to the solver.

use solvent_pool::{Dep, Pool, RepoId, SolvId};

/// Selection kinds (low byte of `how`)
pub mod select {
    pub const NONE: u32 = 0x00;
    pub const SOLVABLE: u32 = 0x01;
    pub const SOLVABLE_NAME: u32 = 0x02;
    pub const SOLVABLE_PROVIDES: u32 = 0x03;
    pub const SOLVABLE_ONE_OF: u32 = 0x04;
    pub const SOLVABLE_ALL: u32 = 0x05;
    pub const SOLVABLE_REPO: u32 = 0x06;
    pub const MASK: u32 = 0xff;
}

/// Job types (second byte of `how`)
pub mod jobtype {
    pub const NOOP: u32 = 0x0000;
    pub const INSTALL: u32 = 0x0100;
    pub const ERASE: u32 = 0x0200;
    pub const UPDATE: u32 = 0x0300;
    pub const DISTUPGRADE: u32 = 0x0400;
    pub const VERIFY: u32 = 0x0500;
    pub const LOCK: u32 = 0x0600;
    pub const MULTIVERSION: u32 = 0x0700;
    pub const FAVOR: u32 = 0x0800;
    pub const DISFAVOR: u32 = 0x0900;
    pub const ALLOWUNINSTALL: u32 = 0x0a00;
    pub const MASK: u32 = 0xff00;
}

/// Modifier flags (upper half of `how`)
pub mod jobflags {
    pub const WEAK: u32 = 1 << 16;
    pub const ESSENTIAL: u32 = 1 << 17;
    pub const CLEANDEPS: u32 = 1 << 18;
    pub const ORUPDATE: u32 = 1 << 19;
    pub const FORCEBEST: u32 = 1 << 20;
    pub const TARGETED: u32 = 1 << 21;

    pub const SETEV: u32 = 1 << 24;
    pub const SETEVR: u32 = 1 << 25;
    pub const SETARCH: u32 = 1 << 26;
    pub const SETVENDOR: u32 = 1 << 27;
    pub const SETREPO: u32 = 1 << 28;
    pub const NOAUTOSET: u32 = 1 << 29;
    pub const SETMASK: u32 = 0x3f << 24;
}

/// One solver job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub how: u32,
    pub what: u32,
}

impl Job {
    #[must_use]
    pub const fn new(how: u32, what: u32) -> Self {
        Self { how, what }
    }

    /// Install a concrete solvable
    #[must_use]
    pub const fn install(p: SolvId) -> Self {
        Self::new(jobtype::INSTALL | select::SOLVABLE, p.0)
    }

    /// Install something providing the dependency, constrained to matching
    /// names
    #[must_use]
    pub const fn install_name(dep: Dep) -> Self {
        Self::new(jobtype::INSTALL | select::SOLVABLE_NAME, dep.raw())
    }

    /// Install something providing the dependency
    #[must_use]
    pub const fn install_provides(dep: Dep) -> Self {
        Self::new(jobtype::INSTALL | select::SOLVABLE_PROVIDES, dep.raw())
    }

    #[must_use]
    pub const fn erase(p: SolvId) -> Self {
        Self::new(jobtype::ERASE | select::SOLVABLE, p.0)
    }

    #[must_use]
    pub const fn erase_name(dep: Dep) -> Self {
        Self::new(jobtype::ERASE | select::SOLVABLE_NAME, dep.raw())
    }

    #[must_use]
    pub const fn update_all() -> Self {
        Self::new(jobtype::UPDATE | select::SOLVABLE_ALL, 0)
    }

    #[must_use]
    pub const fn distupgrade_all() -> Self {
        Self::new(jobtype::DISTUPGRADE | select::SOLVABLE_ALL, 0)
    }

    #[must_use]
    pub const fn verify_all() -> Self {
        Self::new(jobtype::VERIFY | select::SOLVABLE_ALL, 0)
    }

    #[must_use]
    pub const fn lock(p: SolvId) -> Self {
        Self::new(jobtype::LOCK | select::SOLVABLE, p.0)
    }

    #[must_use]
    pub const fn multiversion_name(dep: Dep) -> Self {
        Self::new(jobtype::MULTIVERSION | select::SOLVABLE_NAME, dep.raw())
    }

    #[must_use]
    pub const fn with_flags(mut self, flags: u32) -> Self {
        self.how |= flags;
        self
    }

    #[must_use]
    pub const fn job_type(self) -> u32 {
        self.how & jobtype::MASK
    }

    #[must_use]
    pub const fn selection(self) -> u32 {
        self.how & select::MASK
    }

    #[must_use]
    pub const fn has_flag(self, flag: u32) -> bool {
        self.how & flag != 0
    }

    /// The packed dependency argument, for name/provides selections
    #[must_use]
    pub const fn what_dep(self) -> Dep {
        Dep::from_raw(self.what)
    }

    /// The solvable argument, for solvable selections
    #[must_use]
    pub const fn what_solvable(self) -> SolvId {
        SolvId(self.what)
    }

    /// The repo argument, for repo selections
    #[must_use]
    pub const fn what_repo(self) -> RepoId {
        RepoId(self.what)
    }

    /// Human-readable rendering for problem descriptions
    #[must_use]
    pub fn describe(self, pool: &Pool) -> String {
        let verb = match self.job_type() {
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
        let target = match self.selection() {
            select::SOLVABLE => pool.solvid2str(self.what_solvable()),
            select::SOLVABLE_NAME | select::SOLVABLE_PROVIDES | select::SOLVABLE_ONE_OF => {
                pool.dep2str(self.what_dep())
            }
            select::SOLVABLE_ALL => "all packages".to_string(),
            select::SOLVABLE_REPO => pool.repo(self.what_repo()).name.clone(),
            _ => "nothing".to_string(),
        };
        format!("{verb} {target}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_round_trips() {
        let j = Job::install(SolvId(42)).with_flags(jobflags::WEAK | jobflags::FORCEBEST);
        assert_eq!(j.job_type(), jobtype::INSTALL);
        assert_eq!(j.selection(), select::SOLVABLE);
        assert_eq!(j.what_solvable(), SolvId(42));
        assert!(j.has_flag(jobflags::WEAK));
        assert!(j.has_flag(jobflags::FORCEBEST));
        assert!(!j.has_flag(jobflags::CLEANDEPS));
    }

    #[test]
    fn describe_names_the_action() {
        let mut pool = Pool::default();
        let name = pool.intern("vim").unwrap();
        let j = Job::install_name(Dep::from_str_id(name));
        assert_eq!(j.describe(&pool), "install vim");
    }
}
