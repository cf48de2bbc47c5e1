// src/louvain.rs

//! Modularity-optimising community detection over CSR graphs.
//!
//! This is the iterative contraction scheme of Blondel et al.: a one-level
//! pass greedily moves nodes between neighbouring communities while the
//! modularity gain exceeds a small precision, then the partition is
//! contracted into a weighted super-graph and the pass repeats. The driver
//! tracks which original nodes each super-node stands for, so the final
//! partition is expressed in original interned ids.
//!
//! Everything here is deterministic for a byte-identical input graph: nodes
//! are visited in ascending id order, candidate communities in first-seen
//! order, ties keep the earliest candidate, and contracted community ids are
//! renumbered by first appearance.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::csr::{self, CsrGraph};

/// Default modularity improvement threshold.
pub const MODULARITY_PRECISION: f64 = 1e-6;

/// Levels are capped as a guard against non-terminating updates.
const MAX_LEVELS: u32 = 50;

/// Adjacency for one detection level. Level zero is the unweighted CSR
/// graph; contracted levels carry accumulated edge weights.
pub struct LouvainGraph {
    nb_nodes: usize,
    /// Cumulative degrees, as in the CSR binary.
    degrees: Vec<u64>,
    links: Vec<u32>,
    /// Parallel to `links`; `None` means every link weighs 1.
    weights: Option<Vec<f64>>,
    /// Sum of all weighted degrees (2m).
    total_weight: f64,
}

impl LouvainGraph {
    pub fn from_csr(g: &CsrGraph) -> Self {
        let total_weight = g.total_links() as f64;
        LouvainGraph {
            nb_nodes: g.n_nodes as usize,
            degrees: g.degrees.clone(),
            links: g.links.clone(),
            weights: None,
            total_weight,
        }
    }

    pub fn nb_nodes(&self) -> usize {
        self.nb_nodes
    }

    pub fn nb_links(&self) -> u64 {
        self.degrees.last().copied().unwrap_or(0)
    }

    fn link_range(&self, node: usize) -> (usize, usize) {
        let start = if node == 0 { 0 } else { self.degrees[node - 1] } as usize;
        (start, self.degrees[node] as usize)
    }

    fn link_weight(&self, pos: usize) -> f64 {
        match &self.weights {
            Some(w) => w[pos],
            None => 1.0,
        }
    }

    /// Sum of the weights of all links touching `node` (self-loop once).
    fn weighted_degree(&self, node: usize) -> f64 {
        match &self.weights {
            Some(w) => {
                let (start, end) = self.link_range(node);
                w[start..end].iter().sum()
            }
            None => {
                let (start, end) = self.link_range(node);
                (end - start) as f64
            }
        }
    }

    /// Weight of `node`'s self-loop, if present.
    fn nb_selfloops(&self, node: usize) -> f64 {
        let (start, end) = self.link_range(node);
        let mut total = 0.0;
        for pos in start..end {
            if self.links[pos] as usize == node {
                total += self.link_weight(pos);
            }
        }
        total
    }
}

/// Mutable detection state over one [`LouvainGraph`] level.
pub struct Community {
    g: LouvainGraph,
    precision: f64,
    node_to_comm: Vec<usize>,
    /// Total weight of links internal to each community.
    inside: Vec<f64>,
    /// Total weighted degree of each community.
    tot: Vec<f64>,
}

impl Community {
    /// Start from the all-singletons partition.
    pub fn new(g: LouvainGraph, precision: f64) -> Self {
        let n = g.nb_nodes();
        let mut inside = vec![0.0; n];
        let mut tot = vec![0.0; n];
        for node in 0..n {
            inside[node] = g.nb_selfloops(node);
            tot[node] = g.weighted_degree(node);
        }
        Community {
            g,
            precision,
            node_to_comm: (0..n).collect(),
            inside,
            tot,
        }
    }

    /// Current modularity of the partition.
    pub fn modularity(&self) -> f64 {
        let m2 = self.g.total_weight;
        if m2 == 0.0 {
            return 0.0;
        }
        let mut q = 0.0;
        for c in 0..self.g.nb_nodes() {
            if self.tot[c] > 0.0 {
                q += self.inside[c] / m2 - (self.tot[c] / m2) * (self.tot[c] / m2);
            }
        }
        q
    }

    /// Weights from `node` to each neighbouring community, in first-seen
    /// order. The node's own community is listed first (possibly with
    /// weight zero); self-loops are excluded.
    fn neigh_comm_weights(&self, node: usize) -> Vec<(usize, f64)> {
        let mut order: Vec<(usize, f64)> = Vec::with_capacity(8);
        order.push((self.node_to_comm[node], 0.0));

        let (start, end) = self.g.link_range(node);
        for pos in start..end {
            let neigh = self.g.links[pos] as usize;
            if neigh == node {
                continue;
            }
            let comm = self.node_to_comm[neigh];
            let w = self.g.link_weight(pos);
            match order.iter_mut().find(|(c, _)| *c == comm) {
                Some(entry) => entry.1 += w,
                None => order.push((comm, w)),
            }
        }
        order
    }

    fn remove(&mut self, node: usize, comm: usize, w_node_comm: f64) {
        self.tot[comm] -= self.g.weighted_degree(node);
        self.inside[comm] -= 2.0 * w_node_comm + self.g.nb_selfloops(node);
        self.node_to_comm[node] = usize::MAX;
    }

    fn insert(&mut self, node: usize, comm: usize, w_node_comm: f64) {
        self.tot[comm] += self.g.weighted_degree(node);
        self.inside[comm] += 2.0 * w_node_comm + self.g.nb_selfloops(node);
        self.node_to_comm[node] = comm;
    }

    /// One refinement level: repeated deterministic sweeps over all nodes,
    /// moving each to the neighbouring community with the best positive
    /// modularity gain, until a sweep stops improving. Returns whether any
    /// node moved.
    pub fn one_level(&mut self) -> bool {
        let n = self.g.nb_nodes();
        let m2 = self.g.total_weight;
        if n == 0 || m2 == 0.0 {
            return false;
        }

        let mut improvement = false;
        let mut cur_mod = self.modularity();

        loop {
            let mut nb_moves = 0u64;

            for node in 0..n {
                let node_comm = self.node_to_comm[node];
                let w_degree = self.g.weighted_degree(node);
                let neigh = self.neigh_comm_weights(node);
                let own_weight = neigh
                    .iter()
                    .find(|(c, _)| *c == node_comm)
                    .map(|(_, w)| *w)
                    .unwrap_or(0.0);
                self.remove(node, node_comm, own_weight);

                // Strictly-greater comparison keeps the first-seen candidate
                // on ties, which makes the sweep deterministic.
                let mut best_comm = node_comm;
                let mut best_weight = own_weight;
                let mut best_gain = 0.0;
                for &(comm, w) in &neigh {
                    let gain = w - self.tot[comm] * w_degree / m2;
                    if gain > best_gain {
                        best_comm = comm;
                        best_weight = w;
                        best_gain = gain;
                    }
                }

                self.insert(node, best_comm, best_weight);
                if best_comm != node_comm {
                    nb_moves += 1;
                }
            }

            if nb_moves > 0 {
                improvement = true;
            }
            let new_mod = self.modularity();
            if nb_moves == 0 || new_mod - cur_mod <= self.precision {
                break;
            }
            cur_mod = new_mod;
        }

        improvement
    }

    /// Contract the current partition: returns the member super-nodes of
    /// each community (renumbered densely by first appearance in ascending
    /// node order) and the induced weighted graph over communities.
    pub fn partition_to_graph(&self) -> (Vec<Vec<u32>>, LouvainGraph) {
        let n = self.g.nb_nodes();

        // Dense renumbering of the surviving communities.
        let mut renumber: Vec<usize> = vec![usize::MAX; n];
        let mut members: Vec<Vec<u32>> = Vec::new();
        for node in 0..n {
            let comm = self.node_to_comm[node];
            if renumber[comm] == usize::MAX {
                renumber[comm] = members.len();
                members.push(Vec::new());
            }
            members[renumber[comm]].push(node as u32);
        }

        let nb_comm = members.len();

        // Accumulate inter-community weights; BTreeMap keeps neighbour
        // order ascending and therefore reproducible.
        let mut degrees = Vec::with_capacity(nb_comm);
        let mut links: Vec<u32> = Vec::new();
        let mut weights: Vec<f64> = Vec::new();
        let mut total_weight = 0.0;

        for comm_members in &members {
            let mut acc: BTreeMap<usize, f64> = BTreeMap::new();
            for &member in comm_members {
                let node = member as usize;
                let (start, end) = self.g.link_range(node);
                for pos in start..end {
                    let neigh = self.g.links[pos] as usize;
                    let neigh_comm = renumber[self.node_to_comm[neigh]];
                    *acc.entry(neigh_comm).or_insert(0.0) += self.g.link_weight(pos);
                }
            }
            for (neigh_comm, w) in acc {
                links.push(neigh_comm as u32);
                weights.push(w);
                total_weight += w;
            }
            degrees.push(links.len() as u64);
        }

        let graph = LouvainGraph {
            nb_nodes: nb_comm,
            degrees,
            links,
            weights: Some(weights),
            total_weight,
        };
        (members, graph)
    }
}

/// Run the full detection driver over a CSR binary graph.
///
/// Applies `one_level` and contraction until a level stops improving (or the
/// level cap is hit) and returns the top-level communities as lists of
/// original interned node ids, in the detector's deterministic order.
///
/// # Errors
///
/// Fails when the CSR file cannot be read.
pub fn detect_communities<P: AsRef<Path>>(
    csr_path: P,
    precision: f64,
) -> io::Result<Vec<Vec<u32>>> {
    let csr = csr::load_csr(csr_path)?;
    if csr.n_nodes == 0 {
        return Ok(Vec::new());
    }

    // membership[s] lists the original nodes behind super-node s.
    let mut membership: Vec<Vec<u32>> = (0..csr.n_nodes).map(|i| vec![i]).collect();
    let mut community = Community::new(LouvainGraph::from_csr(&csr), precision);
    let mut cur_mod = community.modularity();
    let mut level = 0u32;

    loop {
        println!(
            "🧩 level {}: network of {} nodes and {} links",
            level,
            community.g.nb_nodes(),
            community.g.nb_links()
        );

        let improved = community.one_level();
        let new_mod = community.modularity();
        let (parts, contracted) = community.partition_to_graph();

        membership = parts
            .iter()
            .map(|super_nodes| {
                super_nodes
                    .iter()
                    .flat_map(|&s| membership[s as usize].iter().copied())
                    .collect()
            })
            .collect();

        level += 1;
        println!(
            "🧩 modularity {:.6} -> {:.6} ({} communities)",
            cur_mod,
            new_mod,
            membership.len()
        );
        cur_mod = new_mod;
        community = Community::new(contracted, precision);

        if !improved || level >= MAX_LEVELS {
            break;
        }
    }

    Ok(membership)
}
