//! Smallest set of smallest rings, from the bond graph alone.
//!
//! Unlike face-based perception this ignores coordinates, so crossed or
//! collapsed drawings still report their chemical rings.

use std::collections::{BTreeMap, VecDeque};

use petgraph::unionfind::UnionFind;

use crate::mol::{AtomId, Mol};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingInfo {
    rings: Vec<Vec<AtomId>>,
}

impl RingInfo {
    pub fn sssr(mol: &Mol) -> Self {
        let graph = Dense::new(mol);
        let needed = graph.cycle_rank();
        if needed == 0 {
            return Self::default();
        }
        let candidates = graph.horton_candidates();
        let mut basis: Vec<Vec<u64>> = Vec::with_capacity(needed);
        let mut rings: Vec<Vec<AtomId>> = Vec::with_capacity(needed);
        for ring in &candidates {
            if rings.len() >= needed {
                break;
            }
            let bv = graph.edge_bits(ring);
            if bv.iter().all(|&w| w == 0) {
                continue;
            }
            if try_add_to_basis(&mut basis, bv) {
                rings.push(normalize_ring(ring).into_iter().map(|i| graph.atoms[i]).collect());
            }
        }
        rings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        Self { rings }
    }

    /// `E − V + C` for the whole structure.
    pub fn cycle_rank(mol: &Mol) -> usize {
        Dense::new(mol).cycle_rank()
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    pub fn rings(&self) -> &[Vec<AtomId>] {
        &self.rings
    }

    pub fn is_ring_atom(&self, atom: AtomId) -> bool {
        self.rings.iter().any(|ring| ring.contains(&atom))
    }

    pub fn is_ring_bond(&self, a: AtomId, b: AtomId) -> bool {
        self.rings.iter().any(|ring| {
            let len = ring.len();
            (0..len).any(|i| {
                let j = (i + 1) % len;
                (ring[i] == a && ring[j] == b) || (ring[i] == b && ring[j] == a)
            })
        })
    }

    pub fn smallest_ring_size(&self, atom: AtomId) -> Option<usize> {
        self.rings
            .iter()
            .filter(|ring| ring.contains(&atom))
            .map(Vec::len)
            .min()
    }
}

// Compact copy of the bond graph: atoms renumbered 0..n, bonds 0..m.
struct Dense {
    atoms: Vec<AtomId>,
    adj: Vec<Vec<usize>>,
    edges: BTreeMap<(usize, usize), usize>,
}

impl Dense {
    fn new(mol: &Mol) -> Self {
        let atoms: Vec<AtomId> = mol.atoms().collect();
        let pos: BTreeMap<AtomId, usize> = atoms.iter().enumerate().map(|(i, &a)| (a, i)).collect();
        let mut adj = vec![Vec::new(); atoms.len()];
        let mut edges = BTreeMap::new();
        for bond in mol.bonds() {
            let Some((a, b)) = mol.bond_endpoints(bond) else {
                continue;
            };
            let (Some(&u), Some(&v)) = (pos.get(&a), pos.get(&b)) else {
                continue;
            };
            adj[u].push(v);
            adj[v].push(u);
            let next = edges.len();
            edges.insert((u.min(v), u.max(v)), next);
        }
        Self { atoms, adj, edges }
    }

    fn cycle_rank(&self) -> usize {
        let n = self.atoms.len();
        let mut sets = UnionFind::<usize>::new(n);
        for &(u, v) in self.edges.keys() {
            sets.union(u, v);
        }
        let components = (0..n).filter(|&i| sets.find(i) == i).count();
        (self.edges.len() + components).saturating_sub(n)
    }

    fn edge_bits(&self, ring: &[usize]) -> Vec<u64> {
        let mut bv = vec![0u64; self.edges.len().div_ceil(64)];
        let len = ring.len();
        for i in 0..len {
            let (a, b) = (ring[i], ring[(i + 1) % len]);
            if let Some(&idx) = self.edges.get(&(a.min(b), a.max(b))) {
                bv[idx / 64] |= 1u64 << (idx % 64);
            }
        }
        bv
    }

    fn horton_candidates(&self) -> Vec<Vec<usize>> {
        let n = self.atoms.len();
        let trees: Vec<(Vec<u32>, Vec<Option<usize>>)> = (0..n).map(|src| self.bfs(src)).collect();
        let mut candidates = Vec::new();
        for &(u, v) in self.edges.keys() {
            for (dist, pred) in &trees {
                let (du, dv) = (dist[u], dist[v]);
                if du == u32::MAX || dv == u32::MAX || du + dv + 1 < 3 {
                    continue;
                }
                let path_u = path_to(pred, u);
                let path_v = path_to(pred, v);
                if path_u[1..].iter().any(|x| path_v[1..].contains(x)) {
                    continue;
                }
                let mut ring = path_u;
                ring.extend(path_v[1..].iter().rev());
                candidates.push(ring);
            }
        }
        candidates.sort_by(|a: &Vec<usize>, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        candidates.dedup();
        candidates
    }

    fn bfs(&self, src: usize) -> (Vec<u32>, Vec<Option<usize>>) {
        let n = self.atoms.len();
        let mut dist = vec![u32::MAX; n];
        let mut pred = vec![None; n];
        dist[src] = 0;
        let mut queue = VecDeque::from([src]);
        while let Some(cur) = queue.pop_front() {
            for &nb in &self.adj[cur] {
                if dist[nb] == u32::MAX {
                    dist[nb] = dist[cur] + 1;
                    pred[nb] = Some(cur);
                    queue.push_back(nb);
                }
            }
        }
        (dist, pred)
    }
}

// Path from the BFS root to `dst`, root first.
fn path_to(pred: &[Option<usize>], dst: usize) -> Vec<usize> {
    let mut path = vec![dst];
    let mut cur = dst;
    while let Some(p) = pred[cur] {
        path.push(p);
        cur = p;
    }
    path.reverse();
    path
}

fn try_add_to_basis(basis: &mut Vec<Vec<u64>>, candidate: Vec<u64>) -> bool {
    let mut v = candidate;
    for row in basis.iter() {
        if let Some(p) = leading_bit(row) {
            if v[p / 64] & (1u64 << (p % 64)) != 0 {
                xor_into(&mut v, row);
            }
        }
    }
    if v.iter().all(|&w| w == 0) {
        return false;
    }
    basis.push(v);
    true
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, &w)| w != 0)
        .map(|(i, &w)| i * 64 + w.trailing_zeros() as usize)
}

fn xor_into(a: &mut [u64], b: &[u64]) {
    for (aw, bw) in a.iter_mut().zip(b) {
        *aw ^= *bw;
    }
}

/// Rotates a ring to start at its smallest member and orients it towards
/// the smaller neighbour.
fn normalize_ring(ring: &[usize]) -> Vec<usize> {
    let len = ring.len();
    let Some(start) = (0..len).min_by_key(|&i| ring[i]) else {
        return Vec::new();
    };
    let mut out: Vec<usize> = (0..len).map(|i| ring[(start + i) % len]).collect();
    if len > 2 && out[1] > out[len - 1] {
        out[1..].reverse();
    }
    out
}
