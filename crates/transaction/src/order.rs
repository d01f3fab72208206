//! Transaction ordering
//!
//! Builds a directed graph over the steps (requires edges between
//! installs, reversed edges between erases, erase-before-install for
//! same-name replacements), finds strongly connected components, records
//! each non-trivial component as a cycle ranked by the strongest edge it
//! contains, breaks it, and emits a deterministic topological order.

use crate::Transaction;
use serde::{Deserialize, Serialize};
use solvent_pool::{knownids, Dep, Pool, Queue, SolvId};
use std::collections::HashMap;
use tracing::debug;

/// Edge weights, strongest last
const WEIGHT_SAME_NAME: u8 = 1;
const WEIGHT_REQUIRES: u8 = 2;
const WEIGHT_PREREQ: u8 = 3;

/// How bad breaking a cycle was
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CycleSeverity {
    /// No requires edges at all
    Harmless,
    /// Only ordinary requires
    Normal,
    /// A pre-requires edge had to be broken
    Critical,
}

/// One broken dependency cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cycle {
    /// Steps in the cycle, ascending
    pub members: Vec<SolvId>,
    pub severity: CycleSeverity,
}

/// Result of ordering, kept on the transaction
#[derive(Debug, Clone)]
pub struct OrderData {
    pub ordered: Queue,
    pub cycles: Vec<Cycle>,
    /// surviving edges as (before, after) step pairs
    pub edges: Vec<(SolvId, SolvId)>,
}

struct StepGraph {
    nodes: Vec<SolvId>,
    index_of: HashMap<u32, usize>,
    /// adjacency: edge from -> (to, weight); from is scheduled before to
    succ: Vec<Vec<(usize, u8)>>,
}

impl StepGraph {
    fn new(nodes: Vec<SolvId>) -> Self {
        let index_of = nodes
            .iter()
            .enumerate()
            .map(|(i, p)| (p.0, i))
            .collect();
        let succ = vec![Vec::new(); nodes.len()];
        Self {
            nodes,
            index_of,
            succ,
        }
    }

    fn add_edge(&mut self, from: usize, to: usize, weight: u8) {
        if from == to {
            return;
        }
        if let Some(e) = self.succ[from].iter_mut().find(|(t, _)| *t == to) {
            if e.1 < weight {
                e.1 = weight;
            }
            return;
        }
        self.succ[from].push((to, weight));
    }
}

/// The providers of a dependency restricted to steps of one side
fn step_providers(
    pool: &mut Pool,
    dep: Dep,
    graph: &StepGraph,
    is_erase: &[bool],
    erase_side: bool,
) -> Vec<usize> {
    let off = pool.whatprovides(dep);
    pool.providers_at(off)
        .iter()
        .filter_map(|&q| graph.index_of.get(&q).copied())
        .filter(|&i| is_erase[i] == erase_side)
        .collect()
}

#[allow(clippy::too_many_lines)]
pub(crate) fn order_transaction(pool: &mut Pool, trans: &Transaction) -> OrderData {
    let nodes: Vec<SolvId> = trans
        .steps
        .iter()
        .map(|&v| SolvId(v.unsigned_abs()))
        .collect();
    let mut graph = StepGraph::new(nodes.clone());
    let is_erase: Vec<bool> = nodes.iter().map(|&p| pool.is_installed(p)).collect();

    for (ni, &p) in nodes.iter().enumerate() {
        let s = *pool.solvable(p);
        let Some(repo_id) = s.repo else { continue };
        let (ordinary, pre) = {
            let repo = pool.repo(repo_id);
            let (head, tail) = repo.dep_list_split(s.requires, knownids::PREREQ_MARKER);
            (head.to_vec(), tail.to_vec())
        };
        for (deps, weight) in [(ordinary, WEIGHT_REQUIRES), (pre, WEIGHT_PREREQ)] {
            for raw in deps {
                let dep = Dep::from_raw(raw);
                let providers = step_providers(pool, dep, &graph, &is_erase, is_erase[ni]);
                for pi in providers {
                    if is_erase[ni] {
                        // erase ordering is reversed: remove the
                        // dependent before what it depends on
                        graph.add_edge(ni, pi, weight);
                    } else {
                        // install the provider before the requirer
                        graph.add_edge(pi, ni, weight);
                    }
                }
            }
        }
    }

    // erase-before-install for same-name replacement pairs
    for (ni, &p) in nodes.iter().enumerate() {
        if is_erase[ni] {
            continue;
        }
        for q in trans.obs_pkgs(p) {
            if let Some(&qi) = graph.index_of.get(&q.0) {
                graph.add_edge(qi, ni, WEIGHT_SAME_NAME);
            }
        }
    }

    // Tarjan strongly connected components
    let sccs = tarjan(&graph);

    // record non-trivial components as cycles and break them by dropping
    // their lowest-weight internal edges
    let mut cycles = Vec::new();
    let mut comp_of = vec![0usize; graph.nodes.len()];
    for (ci, comp) in sccs.iter().enumerate() {
        for &n in comp {
            comp_of[n] = ci;
        }
    }
    for comp in &sccs {
        if comp.len() < 2 {
            continue;
        }
        let mut max_weight = 0u8;
        let mut min_weight = u8::MAX;
        for &n in comp {
            for &(t, w) in &graph.succ[n] {
                if comp_of[t] == comp_of[n] {
                    max_weight = max_weight.max(w);
                    min_weight = min_weight.min(w);
                }
            }
        }
        let severity = match max_weight {
            WEIGHT_PREREQ => CycleSeverity::Critical,
            WEIGHT_REQUIRES => CycleSeverity::Normal,
            _ => CycleSeverity::Harmless,
        };
        let mut members: Vec<SolvId> = comp.iter().map(|&n| graph.nodes[n]).collect();
        members.sort_unstable();
        debug!(?severity, size = members.len(), "breaking dependency cycle");
        cycles.push(Cycle { members, severity });
        // cut every internal edge of the lowest weight present; repeat via
        // the outer fixpoint below if the component stays cyclic
        for &n in comp {
            let cf = comp_of[n];
            graph.succ[n].retain(|&(t, w)| comp_of[t] != cf || w > min_weight);
        }
    }

    // the first cut may leave smaller cycles; keep cutting until acyclic
    loop {
        let sccs = tarjan(&graph);
        let mut cyclic = false;
        let mut comp_of = vec![0usize; graph.nodes.len()];
        for (ci, comp) in sccs.iter().enumerate() {
            for &n in comp {
                comp_of[n] = ci;
            }
        }
        for comp in &sccs {
            if comp.len() < 2 {
                continue;
            }
            cyclic = true;
            let mut min_weight = u8::MAX;
            for &n in comp {
                for &(t, w) in &graph.succ[n] {
                    if comp_of[t] == comp_of[n] {
                        min_weight = min_weight.min(w);
                    }
                }
            }
            for &n in comp {
                let cf = comp_of[n];
                graph.succ[n].retain(|&(t, w)| comp_of[t] != cf || w > min_weight);
            }
        }
        if !cyclic {
            break;
        }
    }

    // deterministic topological order: Kahn, preferring erases, then repo
    // grouping, then ascending id
    let n = graph.nodes.len();
    let mut indegree = vec![0usize; n];
    for succs in &graph.succ {
        for &(t, _) in succs {
            indegree[t] += 1;
        }
    }
    let sort_key = |i: usize| -> (bool, u32, u32) {
        let p = graph.nodes[i];
        let repo = pool.solvable(p).repo.map_or(u32::MAX, |r| r.0);
        (!is_erase[i], repo, p.0)
    };
    let mut ready: Vec<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut ordered = Queue::new();
    let mut edges = Vec::new();
    while !ready.is_empty() {
        ready.sort_by_key(|&i| sort_key(i));
        let i = ready.remove(0);
        ordered.push(i32::try_from(graph.nodes[i].0).unwrap_or(0));
        for &(t, _) in &graph.succ[i] {
            edges.push((graph.nodes[i], graph.nodes[t]));
            indegree[t] -= 1;
            if indegree[t] == 0 {
                ready.push(t);
            }
        }
    }
    debug_assert_eq!(ordered.len(), n, "order must cover every step");

    OrderData {
        ordered,
        cycles,
        edges,
    }
}

/// Iterative Tarjan SCC over the step graph
fn tarjan(graph: &StepGraph) -> Vec<Vec<usize>> {
    let n = graph.nodes.len();
    let mut index = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut sccs: Vec<Vec<usize>> = Vec::new();

    // explicit call stack: (node, next successor position)
    for root in 0..n {
        if index[root] != usize::MAX {
            continue;
        }
        let mut call: Vec<(usize, usize)> = vec![(root, 0)];
        while let Some(&(v, pos)) = call.last() {
            if index[v] == usize::MAX {
                index[v] = next_index;
                low[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }
            if pos < graph.succ[v].len() {
                call.last_mut().expect("frame exists").1 += 1;
                let (w, _) = graph.succ[v][pos];
                if index[w] == usize::MAX {
                    call.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
            } else {
                call.pop();
                if let Some(&(parent, _)) = call.last() {
                    low[parent] = low[parent].min(low[v]);
                }
                if low[v] == index[v] {
                    let mut comp = Vec::new();
                    loop {
                        let w = stack.pop().expect("scc stack underflow");
                        on_stack[w] = false;
                        comp.push(w);
                        if w == v {
                            break;
                        }
                    }
                    sccs.push(comp);
                }
            }
        }
    }
    sccs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::Fixture;
    use solvent_pool::Map;

    fn decisions(pool: &Pool, installs: &[SolvId], erases: &[SolvId]) -> Queue {
        let _ = pool;
        let mut q = Queue::new();
        q.push(1);
        for &p in erases {
            q.push(-i32::try_from(p.0).unwrap());
        }
        for &p in installs {
            q.push(i32::try_from(p.0).unwrap());
        }
        q
    }

    #[test]
    fn requires_orders_provider_first() {
        let mut fx = Fixture::new();
        let a = fx.available_full("a", "1-1", &["libfoo"], &[], &[]);
        let lib = fx.available_full("libfoo", "1-1", &[], &[], &[]);
        fx.pool.create_whatprovides();
        let mut trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&fx.pool, &[a, lib], &[]),
            &Map::new(fx.pool.nsolvables()),
        );
        trans.order(&mut fx.pool);
        let order: Vec<u32> = trans.steps.iter().map(|&v| v.unsigned_abs()).collect();
        let lib_pos = order.iter().position(|&p| p == lib.0).unwrap();
        let a_pos = order.iter().position(|&p| p == a.0).unwrap();
        assert!(lib_pos < a_pos, "dependency installs before dependent");
        assert!(trans.cycles().is_empty());
    }

    #[test]
    fn requires_cycle_is_normal_severity() {
        let mut fx = Fixture::new();
        let a = fx.available_full("a", "1-1", &["b"], &[], &[]);
        let b = fx.available_full("b", "1-1", &["a"], &[], &[]);
        fx.pool.create_whatprovides();
        let mut trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&fx.pool, &[a, b], &[]),
            &Map::new(fx.pool.nsolvables()),
        );
        trans.order(&mut fx.pool);
        assert_eq!(trans.steps.len(), 2);
        assert_eq!(trans.cycles().len(), 1);
        assert_eq!(trans.cycles()[0].severity, CycleSeverity::Normal);
        assert!(trans.cycle(0, CycleSeverity::Critical).is_none());
    }

    #[test]
    fn prereq_cycle_is_critical_and_breaks_the_weak_edge() {
        // a requires b, b pre-requires a
        let mut fx = Fixture::new();
        let a = fx.available_full("a", "1-1", &["b"], &[], &[]);
        let b = fx.available_full("b", "1-1", &[], &["a"], &[]);
        fx.pool.create_whatprovides();
        let mut trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&fx.pool, &[a, b], &[]),
            &Map::new(fx.pool.nsolvables()),
        );
        trans.order(&mut fx.pool);
        assert_eq!(trans.cycles().len(), 1);
        assert_eq!(trans.cycles()[0].severity, CycleSeverity::Critical);
        // the pre-requires edge survives the cut: a before b
        let order: Vec<u32> = trans.steps.iter().map(|&v| v.unsigned_abs()).collect();
        let a_pos = order.iter().position(|&p| p == a.0).unwrap();
        let b_pos = order.iter().position(|&p| p == b.0).unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn erase_of_old_version_precedes_install() {
        let mut fx = Fixture::new();
        let old = fx.installed("app", "1-1");
        let new = fx.available("app", "2-1");
        fx.pool.create_whatprovides();
        let mut trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&fx.pool, &[new], &[old]),
            &Map::new(fx.pool.nsolvables()),
        );
        trans.order(&mut fx.pool);
        let order: Vec<u32> = trans.steps.iter().map(|&v| v.unsigned_abs()).collect();
        let old_pos = order.iter().position(|&p| p == old.0).unwrap();
        let new_pos = order.iter().position(|&p| p == new.0).unwrap();
        assert!(old_pos < new_pos);
    }

    #[test]
    fn deterministic_order() {
        let mut fx = Fixture::new();
        let a = fx.available_full("a", "1-1", &[], &[], &[]);
        let b = fx.available_full("b", "1-1", &[], &[], &[]);
        let c = fx.available_full("c", "1-1", &[], &[], &[]);
        fx.pool.create_whatprovides();
        let mut trans = Transaction::from_decisions(
            &fx.pool,
            &decisions(&fx.pool, &[c, a, b], &[]),
            &Map::new(fx.pool.nsolvables()),
        );
        trans.order(&mut fx.pool);
        let order: Vec<u32> = trans.steps.iter().map(|&v| v.unsigned_abs()).collect();
        assert_eq!(order, vec![a.0, b.0, c.0], "ascending id for free steps");
    }
}
