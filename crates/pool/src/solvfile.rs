//! `.solv` pool persistence
//!
//! Little-endian binary: an 8-byte magic with the format version in the
//! last byte, counts for strings/relations/solvables, the string arena as
//! length-prefixed entries, relation triples, a repo table and packed
//! solvable rows. Ids inside a file are relative to the file's own header;
//! reading remaps them through an idmap so a file can be merged into any
//! pool.

use crate::id::{Dep, DepKind, Offset, RepoId, StrId};
use crate::solvable::DepKey;
use crate::{knownids, Pool};
use solvent_errors::{Error, ParseError, Result};
use std::io::{Read, Write};

const SOLV_MAGIC: &[u8; 7] = b"SOLV\0\0\0";
const SOLV_VERSION: u8 = 7;

const DEP_KEYS: [DepKey; 8] = [
    DepKey::Provides,
    DepKey::Requires,
    DepKey::Conflicts,
    DepKey::Obsoletes,
    DepKey::Recommends,
    DepKey::Suggests,
    DepKey::Supplements,
    DepKey::Enhances,
];

fn put_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn get_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn get_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Write the whole pool: strings, relations, repos and solvables
///
/// # Errors
///
/// Propagates I/O failure.
pub fn write_solv<W: Write>(pool: &Pool, w: &mut W) -> Result<()> {
    w.write_all(SOLV_MAGIC)?;
    w.write_all(&[SOLV_VERSION])?;

    let nstrings = u32::try_from(pool.nstrings()).unwrap_or(u32::MAX);
    let nrels = u32::try_from(pool.nrels()).unwrap_or(u32::MAX);
    let nsolv = u32::try_from(pool.nsolvables()).unwrap_or(u32::MAX);
    put_u32(w, nstrings)?;
    put_u32(w, nrels)?;
    put_u32(w, nsolv)?;

    // string arena, length-prefixed
    for i in 0..nstrings {
        let s = pool.str(StrId(i));
        put_u32(w, u32::try_from(s.len()).unwrap_or(u32::MAX))?;
        w.write_all(s.as_bytes())?;
    }

    // relation triples; operands never reference a higher relation id
    for i in 1..nrels {
        let rel = pool.rels.resolve(crate::RelId(i));
        put_u32(w, rel.name.raw())?;
        put_u32(w, rel.evr.raw())?;
        w.write_all(&[rel.flags])?;
    }

    // repo table
    let repos = pool.repos();
    put_u32(w, u32::try_from(repos.len()).unwrap_or(u32::MAX))?;
    for repo in repos {
        put_u32(w, u32::try_from(repo.name.len()).unwrap_or(u32::MAX))?;
        w.write_all(repo.name.as_bytes())?;
        #[allow(clippy::cast_sign_loss)]
        put_u32(w, repo.priority as u32)?;
        put_u32(w, u32::from(pool.installed() == Some(repo.id)))?;
        put_u32(w, repo.start)?;
        put_u32(w, repo.end)?;
    }

    // packed solvable rows
    for i in 2..nsolv {
        let s = pool.solvable(crate::SolvId(i));
        put_u32(w, s.name.0)?;
        put_u32(w, s.evr.0)?;
        put_u32(w, s.arch.0)?;
        put_u32(w, s.vendor.0)?;
        put_u32(w, s.repo.map_or(u32::MAX, |r| r.0))?;
        for key in DEP_KEYS {
            let off = s.dep_offset(key);
            match s.repo {
                Some(rid) if !off.is_unset() => {
                    let list = pool.repo(rid).dep_list_raw(off);
                    put_u32(w, u32::try_from(list.len()).unwrap_or(u32::MAX))?;
                    for &d in list {
                        put_u32(w, d)?;
                    }
                }
                _ => put_u32(w, 0)?,
            }
        }
    }
    Ok(())
}

/// Read a `.solv` stream into `pool`, remapping ids
///
/// Returns the repo ids created for the file's repos, in file order.
///
/// # Errors
///
/// Fails on bad magic, unsupported version or truncated data.
#[allow(clippy::too_many_lines)]
pub fn read_solv<R: Read>(pool: &mut Pool, r: &mut R) -> Result<Vec<RepoId>> {
    let mut magic = [0u8; 8];
    r.read_exact(&mut magic)?;
    if &magic[..7] != SOLV_MAGIC {
        return Err(ParseError::SolvFile {
            message: "bad magic".to_string(),
        }
        .into());
    }
    let version = magic[7];
    if version != 7 && version != 8 {
        return Err(ParseError::SolvVersion {
            version: u32::from(version),
        }
        .into());
    }

    let nstrings = get_u32(r)? as usize;
    let nrels = get_u32(r)? as usize;
    let nsolv = get_u32(r)? as usize;
    if nstrings < 2 || nsolv < 2 {
        return Err(ParseError::SolvFile {
            message: "counts too small".to_string(),
        }
        .into());
    }

    // string idmap: file string id -> pool string id
    let mut strmap = vec![StrId::NULL; nstrings];
    strmap[1] = StrId::EMPTY;
    let mut buf = Vec::new();
    for (i, slot) in strmap.iter_mut().enumerate() {
        let len = get_u32(r)? as usize;
        buf.resize(len, 0);
        r.read_exact(&mut buf)?;
        if i < 2 {
            continue; // null and empty are fixed
        }
        let s = std::str::from_utf8(&buf).map_err(|_| ParseError::SolvFile {
            message: format!("string {i} is not utf-8"),
        })?;
        *slot = pool.intern(s)?;
    }

    // dep idmap built incrementally: a relation only references earlier ids
    let mut relmap = vec![Dep::NULL; nrels.max(1)];
    let remap = |d: u32, strmap: &[StrId], relmap: &[Dep]| -> Result<Dep> {
        let dep = Dep::from_raw(d);
        match dep.kind() {
            DepKind::Str(id) => strmap
                .get(id.index())
                .copied()
                .map(Dep::from_str_id)
                .ok_or_else(|| bad_id(d)),
            DepKind::Rel(rid) => relmap.get(rid.index()).copied().ok_or_else(|| bad_id(d)),
        }
    };
    for i in 1..nrels {
        let name = get_u32(r)?;
        let evr = get_u32(r)?;
        let flags = get_u8(r)?;
        let name = remap(name, &strmap, &relmap)?;
        let evr = remap(evr, &strmap, &relmap)?;
        relmap[i] = pool.rel(name, evr, flags)?;
    }

    // repos
    let nrepos = get_u32(r)? as usize;
    let mut repomap = Vec::with_capacity(nrepos);
    let mut ranges = Vec::with_capacity(nrepos);
    for _ in 0..nrepos {
        let len = get_u32(r)? as usize;
        buf.resize(len, 0);
        r.read_exact(&mut buf)?;
        let name = String::from_utf8_lossy(&buf).into_owned();
        #[allow(clippy::cast_possible_wrap)]
        let priority = get_u32(r)? as i32;
        let installed = get_u32(r)? != 0;
        let start = get_u32(r)?;
        let end = get_u32(r)?;
        let id = pool.add_repo(&name);
        pool.repo_mut(id).priority = priority;
        if installed {
            pool.set_installed(id)?;
        }
        repomap.push(id);
        ranges.push((start, end));
    }

    // solvables; file ids start at 2
    for i in 2..nsolv {
        let file_id = u32::try_from(i).unwrap_or(u32::MAX);
        let name = get_u32(r)?;
        let evr = get_u32(r)?;
        let arch = get_u32(r)?;
        let vendor = get_u32(r)?;
        let file_repo = get_u32(r)?;
        let repo_idx = ranges
            .iter()
            .position(|&(s, e)| file_id >= s && file_id < e)
            .or_else(|| usize::try_from(file_repo).ok().filter(|&x| x < nrepos))
            .ok_or_else(|| ParseError::SolvFile {
                message: format!("solvable {i} outside any repo range"),
            })?;
        let repo_id = repomap[repo_idx];
        let p = pool.add_solvable(repo_id)?;

        let mut offsets = [Offset::UNSET; 8];
        for slot in &mut offsets {
            let len = get_u32(r)? as usize;
            let mut deps = Vec::with_capacity(len);
            for _ in 0..len {
                let d = get_u32(r)?;
                deps.push(remap(d, &strmap, &relmap)?);
            }
            if !deps.is_empty() {
                *slot = store_marked_list(pool, repo_id, &deps);
            }
        }

        let str_of = |d: u32, strmap: &[StrId]| -> Result<StrId> {
            strmap.get(d as usize).copied().ok_or_else(|| bad_id(d))
        };
        let s = pool.solvable_mut(p);
        s.name = str_of(name, &strmap)?;
        s.evr = str_of(evr, &strmap)?;
        s.arch = str_of(arch, &strmap)?;
        s.vendor = str_of(vendor, &strmap)?;
        for (key, off) in DEP_KEYS.iter().zip(offsets) {
            s.set_dep_offset(*key, off);
        }
    }
    Ok(repomap)
}

fn bad_id(id: u32) -> Error {
    ParseError::SolvFile {
        message: format!("dangling id {id}"),
    }
    .into()
}

/// Store a list that may contain the prereq marker, preserving it
fn store_marked_list(pool: &mut Pool, repo: RepoId, deps: &[Dep]) -> Offset {
    let marker = knownids::PREREQ_MARKER;
    match deps.iter().position(|&d| d == marker) {
        Some(pos) => {
            let (head, tail) = (deps[..pos].to_vec(), deps[pos + 1..].to_vec());
            pool.repo_mut(repo)
                .add_dep_list_with_marker(&head, marker, &tail)
        }
        None => pool.repo_mut(repo).add_dep_list(deps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rels::REL_EQ;
    use crate::{DistType, SolvId};

    fn sample_pool() -> Pool {
        let mut pool = Pool::new(DistType::Rpm);
        let repo = pool.add_repo("packages");
        pool.repo_mut(repo).priority = 99;
        for (name, evr) in [("a", "1-1"), ("b", "2-1")] {
            let p = pool.add_solvable(repo).unwrap();
            let name_id = pool.intern(name).unwrap();
            let evr_id = pool.intern(evr).unwrap();
            let arch = pool.intern("x86_64").unwrap();
            let selfprov = pool
                .rel(
                    Dep::from_str_id(name_id),
                    Dep::from_str_id(evr_id),
                    REL_EQ,
                )
                .unwrap();
            let off = pool.repo_mut(repo).add_dep_list(&[selfprov]);
            let s = pool.solvable_mut(p);
            s.name = name_id;
            s.evr = evr_id;
            s.arch = arch;
            s.provides = off;
        }
        pool
    }

    #[test]
    fn round_trip_preserves_semantics() {
        let pool = sample_pool();
        let mut bytes = Vec::new();
        write_solv(&pool, &mut bytes).unwrap();

        let mut restored = Pool::new(DistType::Rpm);
        let repos = read_solv(&mut restored, &mut bytes.as_slice()).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(restored.nsolvables(), pool.nsolvables());
        assert_eq!(restored.repo(repos[0]).priority, 99);

        for i in 2..pool.nsolvables() {
            let p = SolvId(u32::try_from(i).unwrap());
            assert_eq!(pool.solvid2str(p), restored.solvid2str(p));
            let (a, b) = (pool.solvable(p), restored.solvable(p));
            let ra = pool.repo(a.repo.unwrap());
            let rb = restored.repo(b.repo.unwrap());
            let da: Vec<String> = ra
                .dep_list(a.provides)
                .map(|d| pool.dep2str(d))
                .collect();
            let db: Vec<String> = rb
                .dep_list(b.provides)
                .map(|d| restored.dep2str(d))
                .collect();
            assert_eq!(da, db);
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut pool = Pool::new(DistType::Rpm);
        let err = read_solv(&mut pool, &mut &b"NOTSOLV\x07xxxx"[..]);
        assert!(err.is_err());
    }

    #[test]
    fn version_8_accepted_9_rejected() {
        let pool = sample_pool();
        let mut bytes = Vec::new();
        write_solv(&pool, &mut bytes).unwrap();
        bytes[7] = 8;
        let mut restored = Pool::new(DistType::Rpm);
        assert!(read_solv(&mut restored, &mut bytes.as_slice()).is_ok());
        bytes[7] = 9;
        let mut restored = Pool::new(DistType::Rpm);
        assert!(read_solv(&mut restored, &mut bytes.as_slice()).is_err());
    }

    #[test]
    fn file_round_trips_through_disk() {
        let pool = sample_pool();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo.solv");
        let mut f = std::fs::File::create(&path).unwrap();
        write_solv(&pool, &mut f).unwrap();
        drop(f);

        let mut restored = Pool::new(DistType::Rpm);
        let mut f = std::fs::File::open(&path).unwrap();
        read_solv(&mut restored, &mut f).unwrap();
        assert_eq!(restored.nsolvables(), pool.nsolvables());
    }
}
