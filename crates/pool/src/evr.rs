//! Version comparison
//!
//! Total order over epoch-version-release strings with distribution-specific
//! segment semantics. The rpm variant is the default; deb is selectable per
//! pool. The conda comparator lives in [`crate::conda`].

/// Comparison mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvrCmpMode {
    /// Full comparison of epoch, version and release
    Compare,
    /// Like `Compare`, but report a missing release as "essentially equal":
    /// `-2` when only the left side lacks a release, `2` when only the
    /// right side does
    MatchRelease,
}

fn is_digit(b: u8) -> bool {
    b.is_ascii_digit()
}

fn is_alpha(b: u8) -> bool {
    b.is_ascii_alphabetic()
}

/// rpm segment comparison of two version fragments
///
/// Tilde sorts before everything including the empty string; caret marks a
/// post-release that sorts after the bare version but before any longer
/// segment. Numeric runs compare as integers with leading zeros stripped,
/// alphabetic runs as ASCII.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn rpm_vercmp(a: &str, b: &str) -> i32 {
    if a == b {
        return 0;
    }
    let mut one = a.as_bytes();
    let mut two = b.as_bytes();

    while !one.is_empty() || !two.is_empty() {
        while let Some(&c) = one.first() {
            if is_digit(c) || is_alpha(c) || c == b'~' || c == b'^' {
                break;
            }
            one = &one[1..];
        }
        while let Some(&c) = two.first() {
            if is_digit(c) || is_alpha(c) || c == b'~' || c == b'^' {
                break;
            }
            two = &two[1..];
        }

        let t1 = one.first() == Some(&b'~');
        let t2 = two.first() == Some(&b'~');
        if t1 || t2 {
            if !t1 {
                return 1;
            }
            if !t2 {
                return -1;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        let c1 = one.first() == Some(&b'^');
        let c2 = two.first() == Some(&b'^');
        if c1 || c2 {
            if one.is_empty() {
                return -1;
            }
            if two.is_empty() {
                return 1;
            }
            if !c1 {
                return 1;
            }
            if !c2 {
                return -1;
            }
            one = &one[1..];
            two = &two[1..];
            continue;
        }

        if one.is_empty() || two.is_empty() {
            break;
        }

        let numeric = is_digit(one[0]);
        let seg1 = if numeric {
            one.iter().take_while(|&&c| is_digit(c)).count()
        } else {
            one.iter().take_while(|&&c| is_alpha(c)).count()
        };
        let seg2 = if numeric {
            two.iter().take_while(|&&c| is_digit(c)).count()
        } else {
            two.iter().take_while(|&&c| is_alpha(c)).count()
        };

        if seg2 == 0 {
            // different segment types; numeric is newer
            return if numeric { 1 } else { -1 };
        }

        let (s1, s2) = (&one[..seg1], &two[..seg2]);
        let rc = if numeric {
            let n1 = strip_zeros(s1);
            let n2 = strip_zeros(s2);
            match n1.len().cmp(&n2.len()) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Greater => 1,
                std::cmp::Ordering::Equal => cmp_bytes(n1, n2),
            }
        } else {
            cmp_bytes(s1, s2)
        };
        if rc != 0 {
            return rc;
        }
        one = &one[seg1..];
        two = &two[seg2..];
    }

    match (one.is_empty(), two.is_empty()) {
        (true, true) => 0,
        (true, false) => -1,
        (false, _) => 1,
    }
}

fn strip_zeros(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|&&c| c == b'0').count();
    &s[n..]
}

fn cmp_bytes(a: &[u8], b: &[u8]) -> i32 {
    match a.cmp(b) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

/// Split an EVR string into `(epoch, version, release)` parts
#[must_use]
pub fn split_evr(evr: &str) -> (Option<&str>, &str, Option<&str>) {
    let (epoch, rest) = match evr.find(':') {
        Some(pos) if evr[..pos].bytes().all(|b| b.is_ascii_digit()) => {
            (Some(&evr[..pos]), &evr[pos + 1..])
        }
        _ => (None, evr),
    };
    match rest.rfind('-') {
        Some(pos) => (epoch, &rest[..pos], Some(&rest[pos + 1..])),
        None => (epoch, rest, None),
    }
}

/// rpm-style EVR comparison
///
/// Missing epochs are promoted to `"0"` only when `promote_epoch` is set;
/// otherwise an absent epoch matches any epoch. In
/// [`EvrCmpMode::MatchRelease`] the result is `-2`/`2` when the versions
/// agree and exactly one side carries a release.
#[must_use]
pub fn rpm_evrcmp(evr1: &str, evr2: &str, mode: EvrCmpMode, promote_epoch: bool) -> i32 {
    if evr1 == evr2 {
        return 0;
    }
    let (e1, v1, r1) = split_evr(evr1);
    let (e2, v2, r2) = split_evr(evr2);

    if e1.is_some() || e2.is_some() {
        let compare_epochs = promote_epoch || (e1.is_some() && e2.is_some());
        if compare_epochs {
            let rc = rpm_vercmp(e1.unwrap_or("0"), e2.unwrap_or("0"));
            if rc != 0 {
                return rc;
            }
        }
    }

    let rc = rpm_vercmp(v1, v2);
    if rc != 0 {
        return rc;
    }

    match (r1, r2) {
        (Some(r1), Some(r2)) => rpm_vercmp(r1, r2),
        (None, None) => 0,
        (None, Some(_)) => {
            if mode == EvrCmpMode::MatchRelease {
                -2
            } else {
                0
            }
        }
        (Some(_), None) => {
            if mode == EvrCmpMode::MatchRelease {
                2
            } else {
                0
            }
        }
    }
}

/// deb character weight: `~` sorts before end-of-string, letters before
/// every other character
fn deb_order(c: u8) -> i32 {
    match c {
        b'~' => -1,
        c if is_alpha(c) => i32::from(c),
        0 => 0,
        c => i32::from(c) + 256,
    }
}

/// Debian upstream-version fragment comparison
#[must_use]
pub fn deb_vercmp(a: &str, b: &str) -> i32 {
    let mut one = a.as_bytes();
    let mut two = b.as_bytes();
    loop {
        // non-digit prefix
        loop {
            let c1 = one.first().copied().filter(|c| !is_digit(*c));
            let c2 = two.first().copied().filter(|c| !is_digit(*c));
            if c1.is_none() && c2.is_none() {
                break;
            }
            let o1 = deb_order(c1.unwrap_or(0));
            let o2 = deb_order(c2.unwrap_or(0));
            if o1 != o2 {
                return if o1 < o2 { -1 } else { 1 };
            }
            if c1.is_some() {
                one = &one[1..];
            }
            if c2.is_some() {
                two = &two[1..];
            }
        }
        if one.is_empty() && two.is_empty() {
            return 0;
        }
        // digit run, compared numerically
        let d1 = one.iter().take_while(|&&c| is_digit(c)).count();
        let d2 = two.iter().take_while(|&&c| is_digit(c)).count();
        let n1 = strip_zeros(&one[..d1]);
        let n2 = strip_zeros(&two[..d2]);
        let rc = match n1.len().cmp(&n2.len()) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Equal => cmp_bytes(n1, n2),
        };
        if rc != 0 {
            return rc;
        }
        one = &one[d1..];
        two = &two[d2..];
    }
}

/// deb-style EVR comparison over `epoch:upstream-revision`
#[must_use]
pub fn deb_evrcmp(evr1: &str, evr2: &str) -> i32 {
    if evr1 == evr2 {
        return 0;
    }
    let (e1, v1, r1) = split_evr(evr1);
    let (e2, v2, r2) = split_evr(evr2);
    let rc = deb_vercmp(e1.unwrap_or("0"), e2.unwrap_or("0"));
    if rc != 0 {
        return rc;
    }
    let rc = deb_vercmp(v1, v2);
    if rc != 0 {
        return rc;
    }
    deb_vercmp(r1.unwrap_or(""), r2.unwrap_or(""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn tilde_sorts_before_release() {
        assert!(rpm_vercmp("1.0~rc1", "1.0") < 0);
        assert!(rpm_vercmp("1.0~rc1", "1.0~rc2") < 0);
        assert!(rpm_vercmp("1.0~~", "1.0~") < 0);
    }

    #[test]
    fn caret_sorts_after_release() {
        assert!(rpm_vercmp("1.0", "1.0^post") < 0);
        assert!(rpm_vercmp("1.0^post", "1.0.1") < 0);
        assert!(rpm_vercmp("1.0^post1", "1.0^post2") < 0);
    }

    #[test]
    fn numeric_runs_compare_as_integers() {
        assert!(rpm_vercmp("1.10", "1.2") > 0);
        assert!(rpm_vercmp("1.010", "1.10") == 0);
        assert!(rpm_vercmp("2", "10") < 0);
    }

    #[test]
    fn alpha_vs_numeric() {
        assert!(rpm_vercmp("1.0a", "1.0.1") < 0);
        assert!(rpm_vercmp("1.a", "1.1") < 0);
    }

    #[test]
    fn empty_is_smallest() {
        assert!(rpm_vercmp("", "0") < 0);
        assert_eq!(rpm_vercmp("", ""), 0);
    }

    #[test]
    fn evr_split() {
        assert_eq!(split_evr("1:2.0-3"), (Some("1"), "2.0", Some("3")));
        assert_eq!(split_evr("2.0"), (None, "2.0", None));
        assert_eq!(split_evr("2.0-3.el9"), (None, "2.0", Some("3.el9")));
    }

    #[test]
    fn epoch_promotion() {
        // without promotion a missing epoch matches any epoch
        assert_eq!(
            rpm_evrcmp("1.0", "2:1.0", EvrCmpMode::Compare, false),
            0
        );
        assert!(rpm_evrcmp("1.0", "2:1.0", EvrCmpMode::Compare, true) < 0);
        assert!(rpm_evrcmp("1:1.0", "2:1.0", EvrCmpMode::Compare, false) < 0);
    }

    #[test]
    fn match_release_mode() {
        assert_eq!(
            rpm_evrcmp("1.0", "1.0-1", EvrCmpMode::MatchRelease, false),
            -2
        );
        assert_eq!(
            rpm_evrcmp("1.0-1", "1.0", EvrCmpMode::MatchRelease, false),
            2
        );
        assert_eq!(
            rpm_evrcmp("1.0-1", "1.0-2", EvrCmpMode::MatchRelease, false),
            -1
        );
    }

    #[test]
    fn deb_tilde_and_letters() {
        assert!(deb_vercmp("1.0~rc1", "1.0") < 0);
        assert!(deb_vercmp("1.0a", "1.0") > 0);
        // letters sort before non-letters in deb ordering
        assert!(deb_vercmp("1.0a", "1.0+") < 0);
        assert!(deb_evrcmp("1:0.1", "2:0.0") < 0);
    }

    proptest! {
        #[test]
        fn rpm_vercmp_antisymmetric(a in "[0-9a-z.~^]{0,12}", b in "[0-9a-z.~^]{0,12}") {
            prop_assert_eq!(rpm_vercmp(&a, &b), -rpm_vercmp(&b, &a));
        }

        #[test]
        fn rpm_vercmp_reflexive(a in "[0-9a-z.~^]{0,12}") {
            prop_assert_eq!(rpm_vercmp(&a, &a), 0);
        }

        #[test]
        fn rpm_vercmp_transitive(
            a in "[0-9a-z.]{0,8}",
            b in "[0-9a-z.]{0,8}",
            c in "[0-9a-z.]{0,8}",
        ) {
            let ab = rpm_vercmp(&a, &b);
            let bc = rpm_vercmp(&b, &c);
            if ab <= 0 && bc <= 0 {
                prop_assert!(rpm_vercmp(&a, &c) <= 0);
            }
        }
    }
}
