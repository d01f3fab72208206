//! CNF rules
//!
//! The atomic clause of the engine. A rule is kept deliberately small:
//! `p` is the first literal, `d` an offset into the pool's shared literal
//! arena for n-ary clauses, `w1`/`w2` the watched literals and `n1`/`n2`
//! the per-watch chain links. Negative `d` marks a disabled rule
//! (`d = -original - 1`), so disabling is reversible in place.
//!
//! Rule classes live in fixed index ranges, in generation order: pkg, job,
//! update, feature, infarch, dup, best, yumobs, choice, recommends, black,
//! strict-repo-priority, learnt. The class of a rule is derived from its
//! index alone.

use serde::{Deserialize, Serialize};
use solvent_pool::{Dep, Offset, Pool, SolvId};

/// A CNF clause with two watched literals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rule {
    /// First literal; 0 for placeholder rules
    pub p: i32,
    /// 0 = assertion or binary; > 0 = offset of the remaining literals;
    /// < 0 = disabled (original is `-d - 1`)
    pub d: i32,
    /// Watched literals; `w2 == 0` marks an assertion
    pub w1: i32,
    pub w2: i32,
    /// Watch chain links (rule indices)
    pub n1: u32,
    pub n2: u32,
}

impl Rule {
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.d < 0
    }

    #[must_use]
    pub const fn is_assertion(&self) -> bool {
        self.w2 == 0
    }

    /// The enabled-form `d`, regardless of the disabled bit
    #[must_use]
    pub const fn effective_d(&self) -> i32 {
        if self.d < 0 {
            -self.d - 1
        } else {
            self.d
        }
    }

    pub fn disable(&mut self) {
        if self.d >= 0 {
            self.d = -self.d - 1;
        }
    }

    pub fn enable(&mut self) {
        if self.d < 0 {
            self.d = -self.d - 1;
        }
    }
}

/// Rule classes, ordered as their index ranges are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleClass {
    Pkg,
    Job,
    Update,
    Feature,
    Infarch,
    Dup,
    Best,
    Yumobs,
    Choice,
    Recommends,
    Black,
    StrictRepoPriority,
    Learnt,
}

impl RuleClass {
    /// Whether problem analysis may disable rules of this class; the map is
    /// a first-class table, not scattered conditionals
    #[must_use]
    pub const fn is_disableable(self) -> bool {
        match self {
            Self::Job
            | Self::Update
            | Self::Feature
            | Self::Infarch
            | Self::Dup
            | Self::Best
            | Self::Choice => true,
            // learnt rules expand into their sources instead
            Self::Pkg
            | Self::Yumobs
            | Self::Recommends
            | Self::Black
            | Self::StrictRepoPriority
            | Self::Learnt => false,
        }
    }
}

/// Start indices of the class ranges; `[start[i], start[i+1])` holds class
/// `i`'s rules
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleRanges {
    pub job: usize,
    pub update: usize,
    pub feature: usize,
    pub infarch: usize,
    pub dup: usize,
    pub best: usize,
    pub yumobs: usize,
    pub choice: usize,
    pub recommends: usize,
    pub black: usize,
    pub strict_repo_priority: usize,
    pub learnt: usize,
    pub end: usize,
}

impl RuleRanges {
    #[must_use]
    pub fn class_of(&self, idx: usize) -> RuleClass {
        if idx >= self.learnt {
            RuleClass::Learnt
        } else if idx >= self.strict_repo_priority {
            RuleClass::StrictRepoPriority
        } else if idx >= self.black {
            RuleClass::Black
        } else if idx >= self.recommends {
            RuleClass::Recommends
        } else if idx >= self.choice {
            RuleClass::Choice
        } else if idx >= self.yumobs {
            RuleClass::Yumobs
        } else if idx >= self.best {
            RuleClass::Best
        } else if idx >= self.dup {
            RuleClass::Dup
        } else if idx >= self.infarch {
            RuleClass::Infarch
        } else if idx >= self.feature {
            RuleClass::Feature
        } else if idx >= self.update {
            RuleClass::Update
        } else if idx >= self.job {
            RuleClass::Job
        } else {
            RuleClass::Pkg
        }
    }
}

/// Fine-grained origin of a pkg rule, recorded at generation time so
/// problem reports can name the dependency involved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleInfo {
    /// `¬p`: the package can never be installed
    NotInstallable { p: SolvId },
    /// `¬p`: one of p's requires has no providers at all
    NothingProvidesDep { p: SolvId, dep: Dep },
    /// `¬p ∨ providers…`
    Requires { p: SolvId, dep: Dep },
    /// `¬p ∨ ¬q` from an explicit conflict
    Conflicts { p: SolvId, q: SolvId, dep: Dep },
    /// `¬p ∨ ¬q` from an explicit obsolete
    Obsoletes { p: SolvId, q: SolvId, dep: Dep },
    /// `¬p ∨ ¬q` from an installed package's obsolete
    InstalledObsoletes { p: SolvId, q: SolvId, dep: Dep },
    /// `¬p ∨ ¬q` implicit same-name obsolete
    ImplicitObsoletes { p: SolvId, q: SolvId },
    /// `¬p ∨ ¬q`, same name, not multiversion
    SameName { p: SolvId, q: SolvId },
    /// `¬p`: package conflicts with itself
    SelfConflict { p: SolvId, dep: Dep },
    /// Anything that is not a pkg rule
    Other,
}

/// Sort key used by `unify_rules`: `(p, literal list)`
pub(crate) fn rule_sort_key(pool: &Pool, r: &Rule) -> (i32, i32, Vec<u32>) {
    let lits: Vec<u32> = if r.d > 0 {
        pool.providers_at(Offset(u32::try_from(r.d).unwrap_or(0)))
            .to_vec()
    } else {
        Vec::new()
    };
    (r.p, r.w2, lits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_is_reversible() {
        let mut r = Rule {
            p: -3,
            d: 17,
            ..Rule::default()
        };
        r.disable();
        assert!(r.is_disabled());
        assert_eq!(r.effective_d(), 17);
        r.disable(); // idempotent
        assert_eq!(r.d, -18);
        r.enable();
        assert_eq!(r.d, 17);
    }

    #[test]
    fn binary_rule_disable() {
        let mut r = Rule {
            p: -3,
            d: 0,
            w1: -3,
            w2: 5,
            ..Rule::default()
        };
        r.disable();
        assert_eq!(r.d, -1);
        assert!(r.is_disabled());
        r.enable();
        assert_eq!(r.d, 0);
    }

    #[test]
    fn class_ranges() {
        let ranges = RuleRanges {
            job: 10,
            update: 20,
            feature: 30,
            infarch: 30,
            dup: 30,
            best: 30,
            yumobs: 30,
            choice: 30,
            recommends: 32,
            black: 32,
            strict_repo_priority: 32,
            learnt: 32,
            end: 40,
        };
        assert_eq!(ranges.class_of(1), RuleClass::Pkg);
        assert_eq!(ranges.class_of(10), RuleClass::Job);
        assert_eq!(ranges.class_of(25), RuleClass::Update);
        assert_eq!(ranges.class_of(31), RuleClass::Choice);
        assert_eq!(ranges.class_of(35), RuleClass::Learnt);
    }

    #[test]
    fn disableable_table() {
        assert!(RuleClass::Job.is_disableable());
        assert!(RuleClass::Update.is_disableable());
        assert!(RuleClass::Best.is_disableable());
        assert!(!RuleClass::Pkg.is_disableable());
        assert!(!RuleClass::Learnt.is_disableable());
        assert!(!RuleClass::StrictRepoPriority.is_disableable());
    }
}
