//! Architecture compatibility scores
//!
//! A policy string like `"x86_64:i686:i586"` maps each listed architecture
//! to a score; lower scores are preferred during branching. Score 0 means
//! incompatible, score 1 is reserved for `noarch`-style architectures that
//! are compatible with everything.

use crate::id::StrId;
use std::collections::HashMap;

/// Score of architectures compatible with everything
pub const ARCH_SCORE_NOARCH: u32 = 1;

/// Built-in policies for well-known machine architectures
const ARCH_POLICIES: &[(&str, &str)] = &[
    ("x86_64", "x86_64:i686:i586:i486:i386"),
    ("i686", "i686:i586:i486:i386"),
    ("i586", "i586:i486:i386"),
    ("aarch64", "aarch64"),
    ("armv7hl", "armv7hl:armv6hl"),
    ("ppc64le", "ppc64le"),
    ("s390x", "s390x"),
    ("riscv64", "riscv64"),
];

#[derive(Debug, Clone, Default)]
pub struct ArchPolicy {
    scores: HashMap<StrId, u32>,
}

impl ArchPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the built-in policy string for a machine architecture
    #[must_use]
    pub fn builtin_policy(arch: &str) -> &'static str {
        ARCH_POLICIES
            .iter()
            .find(|(name, _)| *name == arch)
            .map_or("", |(_, policy)| policy)
    }

    /// Install the scores for a `:`-separated policy, best arch first.
    /// `noarch_ids` receive the always-compatible score.
    pub fn set(&mut self, policy_ids: &[StrId], noarch_ids: &[StrId]) {
        self.scores.clear();
        for (i, &id) in policy_ids.iter().enumerate() {
            let score = u32::try_from(i).unwrap_or(u32::MAX - 2) + 2;
            self.scores.entry(id).or_insert(score);
        }
        for &id in noarch_ids {
            self.scores.insert(id, ARCH_SCORE_NOARCH);
        }
    }

    /// Score for an architecture id; 0 = incompatible
    #[must_use]
    pub fn score(&self, arch: StrId) -> u32 {
        self.scores.get(&arch).copied().unwrap_or(0)
    }

    /// Whether any policy has been installed
    #[must_use]
    pub fn is_set(&self) -> bool {
        !self.scores.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_follow_policy_order() {
        let mut p = ArchPolicy::new();
        p.set(&[StrId(10), StrId(11), StrId(12)], &[StrId(20)]);
        assert_eq!(p.score(StrId(10)), 2);
        assert_eq!(p.score(StrId(11)), 3);
        assert_eq!(p.score(StrId(12)), 4);
        assert_eq!(p.score(StrId(20)), ARCH_SCORE_NOARCH);
        assert_eq!(p.score(StrId(99)), 0);
    }

    #[test]
    fn builtin_policies() {
        assert_eq!(
            ArchPolicy::builtin_policy("x86_64"),
            "x86_64:i686:i586:i486:i386"
        );
        assert_eq!(ArchPolicy::builtin_policy("unknown"), "");
    }
}
