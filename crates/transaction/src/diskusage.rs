//! Disk-usage accounting
//!
//! Aggregates the per-directory usage vectors of every transaction step
//! over a caller-supplied set of mountpoints. Installs add, erased
//! packages subtract, so replacing a package nets out per directory.
//! Kilobytes and inodes are tracked separately.

use crate::Transaction;
use serde::{Deserialize, Serialize};
use solvent_pool::{Pool, SolvId};

/// Caller-declared mountpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    /// Absolute path, e.g. `/usr`
    pub path: String,
}

impl MountPoint {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Aggregated deltas for one mountpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuChanges {
    pub path: String,
    /// Kilobyte delta across the whole transaction
    pub kbytes: i64,
    /// Inode delta across the whole transaction
    pub files: i64,
}

/// Does `dir` live on the mountpoint rooted at `mp`?
fn covered_by(dir: &str, mp: &str) -> bool {
    if mp == "/" {
        return true;
    }
    dir == mp || dir.strip_prefix(mp).is_some_and(|rest| rest.starts_with('/'))
}

/// The deepest mountpoint covering a directory
fn mountpoint_for<'a>(mountpoints: &'a [MountPoint], dir: &str) -> Option<&'a MountPoint> {
    mountpoints
        .iter()
        .filter(|mp| covered_by(dir, &mp.path))
        .max_by_key(|mp| mp.path.len())
}

/// Compute the disk-usage changes of a transaction per mountpoint
///
/// The result has one entry per input mountpoint, in input order.
#[must_use]
pub fn diskusage_changes(
    pool: &Pool,
    trans: &Transaction,
    mountpoints: &[MountPoint],
) -> Vec<DuChanges> {
    let mut out: Vec<DuChanges> = mountpoints
        .iter()
        .map(|mp| DuChanges {
            path: mp.path.clone(),
            kbytes: 0,
            files: 0,
        })
        .collect();

    for &v in &trans.steps {
        let p = SolvId(v.unsigned_abs());
        let erase = pool.is_installed(p);
        let sign: i64 = if erase { -1 } else { 1 };
        for entry in pool.diskusage(p) {
            let dir = pool.dir_path(entry.dir);
            let Some(mp) = mountpoint_for(mountpoints, &dir) else {
                continue;
            };
            if let Some(changes) = out.iter_mut().find(|c| c.path == mp.path) {
                changes.kbytes += sign * i64::from(entry.kbytes);
                changes.files += sign * i64::from(entry.inodes);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Fixture;
    use solvent_pool::{DuEntry, Map, Queue};

    fn du(pool: &mut Pool, p: SolvId, entries: &[(&str, u32, u32)]) {
        let list: Vec<DuEntry> = entries
            .iter()
            .map(|&(path, kbytes, inodes)| {
                let dir = pool.intern_dir(path).unwrap();
                DuEntry {
                    dir,
                    kbytes,
                    inodes,
                }
            })
            .collect();
        pool.set_diskusage(p, list);
    }

    #[test]
    fn install_adds_erase_subtracts() {
        let mut fx = Fixture::new();
        let old = fx.installed("app", "1-1");
        let new = fx.available("app", "2-1");
        du(&mut fx.pool, old, &[("/usr/bin", 100, 3), ("/var/lib", 10, 1)]);
        du(&mut fx.pool, new, &[("/usr/bin", 150, 4)]);

        let mut decisions = Queue::new();
        decisions.push(1);
        decisions.push(-i32::try_from(old.0).unwrap());
        decisions.push(i32::try_from(new.0).unwrap());
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions,
            &Map::new(fx.pool.nsolvables()),
        );

        let mps = vec![MountPoint::new("/usr"), MountPoint::new("/var")];
        let changes = diskusage_changes(&fx.pool, &trans, &mps);
        assert_eq!(changes[0].path, "/usr");
        assert_eq!(changes[0].kbytes, 50, "usage nets out per directory");
        assert_eq!(changes[0].files, 1);
        assert_eq!(changes[1].kbytes, -10);
        assert_eq!(changes[1].files, -1);
    }

    #[test]
    fn deepest_mountpoint_wins() {
        let mut fx = Fixture::new();
        let new = fx.available("app", "1-1");
        du(&mut fx.pool, new, &[("/usr/share/doc", 42, 7)]);

        let mut decisions = Queue::new();
        decisions.push(1);
        decisions.push(i32::try_from(new.0).unwrap());
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions,
            &Map::new(fx.pool.nsolvables()),
        );

        let mps = vec![
            MountPoint::new("/"),
            MountPoint::new("/usr"),
            MountPoint::new("/usr/share"),
        ];
        let changes = diskusage_changes(&fx.pool, &trans, &mps);
        assert_eq!(changes[2].kbytes, 42);
        assert_eq!(changes[1].kbytes, 0);
        assert_eq!(changes[0].kbytes, 0);
    }

    #[test]
    fn sums_match_final_minus_initial() {
        // install two, erase one; per-mountpoint sum equals the delta of
        // summing states
        let mut fx = Fixture::new();
        let gone = fx.installed("legacy", "1-1");
        let a = fx.available("a", "1-1");
        let b = fx.available("b", "1-1");
        du(&mut fx.pool, gone, &[("/opt", 30, 2)]);
        du(&mut fx.pool, a, &[("/opt", 20, 1)]);
        du(&mut fx.pool, b, &[("/opt", 25, 5)]);

        let mut decisions = Queue::new();
        decisions.push(1);
        decisions.push(-i32::try_from(gone.0).unwrap());
        decisions.push(i32::try_from(a.0).unwrap());
        decisions.push(i32::try_from(b.0).unwrap());
        let trans = Transaction::from_decisions(
            &fx.pool,
            &decisions,
            &Map::new(fx.pool.nsolvables()),
        );
        let changes =
            diskusage_changes(&fx.pool, &trans, &[MountPoint::new("/opt")]);
        assert_eq!(changes[0].kbytes, 20 + 25 - 30);
        assert_eq!(changes[0].files, 1 + 5 - 2);
    }
}
