//! Conda version ordering and match specs
//!
//! Conda versions split on `.`, `-` and `_` into segments whose parts
//! alternate between numeric and alphabetic runs. `post` sorts after
//! everything, `dev` before every other alphabetic part, and a `+local`
//! suffix forms a secondary version compared the same way. Match specs
//! combine comparators with `,` (and) and `|` (or), support `=x.y.*`
//! startswith globs, the `~=` compatible-release operator, plain globs and
//! anchored regular expressions.

use crate::rels::{REL_EQ, REL_GT, REL_LT};
use regex::Regex;

fn is_sep(b: u8) -> bool {
    b == b'.' || b == b'-' || b == b'_'
}

fn seg_end(s: &[u8]) -> usize {
    s.iter().position(|&b| is_sep(b)).unwrap_or(s.len())
}

/// End of the next part inside a segment: a numeric run, a `*` run, or an
/// alphabetic run
fn part_end(s: &[u8]) -> usize {
    if s.is_empty() {
        return 0;
    }
    if s[0].is_ascii_digit() {
        s.iter().position(|&b| !b.is_ascii_digit()).unwrap_or(s.len())
    } else if s[0] == b'*' {
        s.iter().position(|&b| b != b'*').unwrap_or(s.len())
    } else {
        s.iter()
            .skip(1)
            .position(|&b| b.is_ascii_digit() || b == b'*')
            .map_or(s.len(), |p| p + 1)
    }
}

fn eq_ignore_case(s: &[u8], word: &[u8]) -> bool {
    s.len() == word.len() && s.eq_ignore_ascii_case(word)
}

/// Segment-wise conda version comparison
///
/// With `startswith` set, returns 0 as soon as the right-hand side is
/// exhausted (used for `=x.y.*` matching).
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn conda_vercmp(a: &str, b: &str, startswith: bool) -> i32 {
    let mut s1 = a.as_bytes();
    let mut s2 = b.as_bytes();
    // ignore trailing separators on the prefix side
    let s2_significant = if startswith {
        let mut n = s2.len();
        while n > 0 && is_sep(s2[n - 1]) {
            n -= 1;
        }
        n
    } else {
        usize::MAX
    };
    let mut s2_consumed = 0usize;

    loop {
        while !s1.is_empty() && is_sep(s1[0]) {
            s1 = &s1[1..];
        }
        while !s2.is_empty() && is_sep(s2[0]) {
            s2_consumed += 1;
            s2 = &s2[1..];
        }
        if s1.is_empty() && s2.is_empty() {
            return 0;
        }
        if startswith && s2.is_empty() {
            return 0;
        }
        let e1 = seg_end(s1);
        let e2 = seg_end(s2);
        let (mut p1, mut p2) = (&s1[..e1], &s2[..e2]);
        let mut isfirst = true;

        loop {
            if p1.is_empty() && p2.is_empty() {
                break;
            }
            if startswith && s2_consumed + (e2 - p2.len()) >= s2_significant {
                return 0;
            }
            let mut n1 = part_end(p1);
            let mut n2 = part_end(p2);
            // the first part of a segment is implicitly numeric: a leading
            // alphabetic run compares as if preceded by 0
            if isfirst {
                if n1 > 0 && !p1[0].is_ascii_digit() {
                    n1 = 0;
                }
                if n2 > 0 && !p2[0].is_ascii_digit() {
                    n2 = 0;
                }
            }
            let (w1, w2) = (&p1[..n1], &p2[..n2]);

            if eq_ignore_case(w1, b"post") {
                if eq_ignore_case(w2, b"post") {
                    p1 = &p1[n1..];
                    p2 = &p2[n2..];
                    isfirst = false;
                    continue;
                }
                return 1;
            }
            if eq_ignore_case(w2, b"post") {
                return -1;
            }

            let numeric1 = w1.is_empty() || p1.first().is_some_and(u8::is_ascii_digit);
            let numeric2 = w2.is_empty() || p2.first().is_some_and(u8::is_ascii_digit);
            if isfirst || (numeric1 && numeric2) {
                let d1 = {
                    let z = w1.iter().take_while(|&&c| c == b'0').count();
                    &w1[z..]
                };
                let d2 = {
                    let z = w2.iter().take_while(|&&c| c == b'0').count();
                    &w2[z..]
                };
                if d1.len() != d2.len() {
                    return if d1.len() < d2.len() { -1 } else { 1 };
                }
                match d1.cmp(d2) {
                    std::cmp::Ordering::Less => return -1,
                    std::cmp::Ordering::Greater => return 1,
                    std::cmp::Ordering::Equal => {}
                }
            } else if numeric1 {
                return 1;
            } else if numeric2 {
                return -1;
            } else {
                // dev sorts before every other alphabetic part
                if p2[0] != b'*' && eq_ignore_case(w1, b"dev") {
                    if eq_ignore_case(w2, b"dev") {
                        p1 = &p1[n1..];
                        p2 = &p2[n2..];
                        isfirst = false;
                        continue;
                    }
                    return -1;
                }
                if p1[0] != b'*' && eq_ignore_case(w2, b"dev") {
                    return 1;
                }
                let common = w1.len().min(w2.len());
                let c1: Vec<u8> = w1[..common].to_ascii_lowercase();
                let c2: Vec<u8> = w2[..common].to_ascii_lowercase();
                match c1.cmp(&c2) {
                    std::cmp::Ordering::Less => return -1,
                    std::cmp::Ordering::Greater => return 1,
                    std::cmp::Ordering::Equal => {}
                }
                if w1.len() != w2.len() {
                    return if w1.len() < w2.len() { -1 } else { 1 };
                }
            }
            p1 = &p1[n1..];
            p2 = &p2[n2..];
            isfirst = false;
        }
        s2_consumed += e2;
        s1 = &s1[e1..];
        s2 = &s2[e2..];
    }
}

fn split_epoch(evr: &str) -> (Option<&str>, &str) {
    match evr.find('!') {
        Some(pos) if pos > 0 && evr[..pos].bytes().all(|b| b.is_ascii_digit()) => {
            (Some(&evr[..pos]), &evr[pos + 1..])
        }
        _ => (None, evr),
    }
}

/// Full conda EVR comparison over `epoch!version+local`
#[must_use]
pub fn conda_evrcmp(evr1: &str, evr2: &str, startswith: bool) -> i32 {
    if evr1 == evr2 {
        return 0;
    }
    let (e1, v1) = split_epoch(evr1);
    let (e2, v2) = split_epoch(evr2);
    if e1.is_some() || e2.is_some() {
        let rc = conda_vercmp(e1.unwrap_or("0"), e2.unwrap_or("0"), false);
        if rc != 0 {
            return rc;
        }
    }
    let (v1, l1) = match v1.rfind('+') {
        Some(p) => (&v1[..p], Some(&v1[p + 1..])),
        None => (v1, None),
    };
    let (v2, l2) = match v2.rfind('+') {
        Some(p) => (&v2[..p], Some(&v2[p + 1..])),
        None => (v2, None),
    };
    let rc = conda_vercmp(v1, v2, l2.is_none() && startswith);
    if rc != 0 {
        return rc;
    }
    match (l1, l2) {
        (None, None) => 0,
        (None, Some(_)) => -1,
        (Some(_), None) => 1,
        (Some(l1), Some(l2)) => conda_vercmp(l1, l2, startswith),
    }
}

/// Check one comparator-or-pattern term of a match spec against `evr`
#[allow(clippy::too_many_lines)]
fn match_single(evr: &str, version: &str) -> bool {
    if version.is_empty() || version == "*" {
        return true;
    }
    if version.len() >= 2 && version.starts_with('^') && version.ends_with('$') {
        return Regex::new(version).is_ok_and(|re| re.is_match(evr));
    }
    let bytes = version.as_bytes();
    if matches!(bytes[0], b'=' | b'<' | b'>' | b'!' | b'~') {
        // 8 = startswith, 9 = compatible release, 10 = not-startswith
        let flags: u8 = match bytes[0] {
            b'=' => {
                if bytes.get(1) == Some(&b'=') {
                    REL_EQ
                } else {
                    8
                }
            }
            b'!' | b'~' => {
                if bytes.get(1) != Some(&b'=') {
                    return false;
                }
                if bytes[0] == b'!' {
                    REL_LT | REL_GT
                } else {
                    9
                }
            }
            _ => {
                let mut f = if bytes[0] == b'<' { REL_LT } else { REL_GT };
                if bytes.get(1) == Some(&b'=') {
                    f |= REL_EQ;
                }
                f
            }
        };
        let oplen = if flags == 8 || flags == REL_LT || flags == REL_GT {
            1
        } else {
            2
        };
        if version.len() < oplen + 1 {
            return false;
        }
        let mut ver = &version[oplen..];
        let mut flags = flags;
        if matches!(ver.as_bytes()[0], b'=' | b'<' | b'>' | b'!' | b'~') {
            return false;
        }
        if ver.ends_with(".*") {
            if flags == 8 || flags == (REL_GT | REL_EQ) {
                ver = &ver[..ver.len() - 2];
            } else if flags == (REL_LT | REL_GT) {
                ver = &ver[..ver.len() - 2];
                flags = 10;
            } else {
                return false;
            }
        }
        if flags < 8 {
            let r = conda_evrcmp(evr, ver, false);
            return match r.cmp(&0) {
                std::cmp::Ordering::Less => flags & REL_LT != 0,
                std::cmp::Ordering::Equal => flags & REL_EQ != 0,
                std::cmp::Ordering::Greater => flags & REL_GT != 0,
            };
        }
        if flags == 8 || flags == 10 {
            let r = conda_evrcmp(evr, ver, true);
            return if flags == 8 { r == 0 } else { r != 0 };
        }
        // compatible release: >=x.y.z, startswith(x.y)
        if conda_evrcmp(evr, ver, false) < 0 {
            return false;
        }
        match ver.rfind('.') {
            Some(p) if p >= 1 => conda_evrcmp(evr, &ver[..p], true) == 0,
            _ => false,
        }
    } else if version[..version.len() - 1].contains('*') {
        // inner glob
        let mut pat = String::with_capacity(version.len() * 2 + 2);
        pat.push('^');
        for ch in version.chars() {
            match ch {
                '*' => pat.push_str(".*"),
                '.' | '+' => {
                    pat.push('\\');
                    pat.push(ch);
                }
                _ => pat.push(ch),
            }
        }
        pat.push('$');
        Regex::new(&pat).is_ok_and(|re| re.is_match(evr))
    } else if version.len() > 1 && version.ends_with('*') {
        let trimmed = version.trim_end_matches('*').trim_end_matches('.');
        conda_evrcmp(evr, trimmed, true) == 0
    } else if version.contains('@') {
        evr == version
    } else {
        conda_evrcmp(evr, version, false) == 0
    }
}

/// Evaluate a conda match spec (`,` binds tighter than `|`, parentheses
/// group) against a version string
#[must_use]
pub fn conda_matchspec(evr: &str, spec: &str) -> bool {
    let mut chars = spec.as_bytes();
    match matchspec_rec(evr, &mut chars) {
        Some(v) => v && chars.is_empty(),
        None => false,
    }
}

fn matchspec_rec(evr: &str, rest: &mut &[u8]) -> Option<bool> {
    let mut vor = false;
    let mut vand: Option<bool> = None;
    if rest.is_empty() {
        return None;
    }
    loop {
        let v = if rest.first() == Some(&b'(') {
            *rest = &rest[1..];
            let v = matchspec_rec(evr, rest)?;
            if rest.first() != Some(&b')') {
                return None;
            }
            *rest = &rest[1..];
            v
        } else if matches!(rest.first(), Some(b')' | b'|' | b',') | None) {
            return None;
        } else {
            let end = rest
                .iter()
                .position(|&b| matches!(b, b'(' | b')' | b'|' | b','))
                .unwrap_or(rest.len());
            let term = std::str::from_utf8(&rest[..end]).ok()?;
            *rest = &rest[end..];
            // skip the expensive match when the result cannot matter
            if vand == Some(false) || (vand.is_none() && vor) {
                false
            } else {
                match_single(evr, term.trim())
            }
        };
        match rest.first() {
            None | Some(b')') => {
                return Some(vor || vand.map_or(v, |a| a && v));
            }
            Some(b',') => {
                vand = Some(vand.map_or(v, |a| a && v));
                *rest = &rest[1..];
            }
            Some(b'|') => {
                vor = vor || vand.map_or(v, |a| a && v);
                vand = None;
                *rest = &rest[1..];
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_ordering() {
        assert!(conda_vercmp("1.0", "1.1", false) < 0);
        assert!(conda_vercmp("1.10", "1.2", false) > 0);
        assert_eq!(conda_vercmp("1.0", "1.0.0", false), 0);
        assert_eq!(conda_vercmp("1.0", "1_0", false), 0);
    }

    #[test]
    fn post_sorts_after() {
        assert!(conda_vercmp("1.0post", "1.0", false) > 0);
        assert!(conda_vercmp("1.0post", "1.0.1", false) < 0);
        assert!(conda_vercmp("1.0.post", "1.0.z", false) > 0);
    }

    #[test]
    fn dev_sorts_before() {
        assert!(conda_vercmp("1.0dev", "1.0a", false) < 0);
        assert!(conda_vercmp("1.0.dev1", "1.0.a1", false) < 0);
    }

    #[test]
    fn local_version_suffix() {
        assert!(conda_evrcmp("1.0", "1.0+local", false) < 0);
        assert!(conda_evrcmp("1.0+2", "1.0+10", false) < 0);
        assert_eq!(conda_evrcmp("1.0+x", "1.0+x", false), 0);
    }

    #[test]
    fn epoch_bang() {
        assert!(conda_evrcmp("1!0.5", "2.0", false) > 0);
        assert!(conda_evrcmp("0.5", "1!0.1", false) < 0);
    }

    #[test]
    fn startswith_mode() {
        assert_eq!(conda_evrcmp("1.2.3", "1.2", true), 0);
        assert!(conda_evrcmp("1.3.0", "1.2", true) != 0);
    }

    #[test]
    fn matchspec_comparators() {
        assert!(conda_matchspec("1.5", ">=1.2,<2.0"));
        assert!(!conda_matchspec("2.0", ">=1.2,<2.0"));
        assert!(conda_matchspec("2.0", ">=1.2,<1.5|=2.0"));
        assert!(conda_matchspec("1.2.9", "=1.2.*"));
        assert!(!conda_matchspec("1.3.0", "=1.2.*"));
        assert!(conda_matchspec("1.2.9", "~=1.2.0"));
        assert!(!conda_matchspec("1.1.0", "~=1.2.0"));
        assert!(conda_matchspec("1.5", "!=1.4"));
        assert!(!conda_matchspec("1.4", "!=1.4"));
    }

    #[test]
    fn matchspec_patterns() {
        assert!(conda_matchspec("1.2.3", "1.*.3"));
        assert!(!conda_matchspec("1.2.4", "1.*.3"));
        assert!(conda_matchspec("1.2.3", "1.2*"));
        assert!(conda_matchspec("1.8.0", "^1\\.[78]\\..*$"));
        assert!(!conda_matchspec("1.9.0", "^1\\.[78]\\..*$"));
    }

    #[test]
    fn matchspec_grouping() {
        assert!(conda_matchspec("1.7", "(>=1.6|<1.0),!=1.8"));
        assert!(!conda_matchspec("1.8", "(>=1.6|<1.0),!=1.8"));
    }
}
