// src/refine.rs

//! Recursive refinement of oversized communities.
//!
//! After detection, any community exceeding the configured caps on node
//! count, total sequence length, or intra-community edge count is
//! re-partitioned: its edges are projected out of the sorted global edge
//! list into a local dense id space, a local CSR graph is built, and the
//! detector runs again on that subgraph. Fresh global community ids are
//! assigned in a deterministic order (ascending original id; sub-communities
//! in sub-index order), so two builds over identical inputs agree. One
//! recursion depth only.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::csr;
use crate::edges::parse_edge_line;
use crate::gfa::{self, RecordType};
use crate::louvain::{self, MODULARITY_PRECISION};
use crate::reader::{LineReader, ReaderOptions};

/// Per-community size measures driving the oversize policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommunityStats {
    pub node_count: u64,
    pub seq_bp_total: u64,
    pub edge_count: u64,
}

/// Knobs for the refinement pass. The soft caps trip in combination (two of
/// three), the hard caps individually.
#[derive(Debug, Clone)]
pub struct RefineConfig {
    pub enabled: bool,
    pub max_nodes: u64,
    pub max_seq_bp: u64,
    pub max_edges: u64,
    pub hard_max_nodes: u64,
    pub hard_max_seq_bp: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        RefineConfig {
            enabled: false,
            max_nodes: 1_000_000,
            max_seq_bp: 500_000_000,
            max_edges: 5_000_000,
            hard_max_nodes: 5_000_000,
            hard_max_seq_bp: 3_000_000_000,
        }
    }
}

/// A community is oversized when it breaks a hard cap, or at least two of
/// the three soft caps.
pub fn should_recurse(stats: &CommunityStats, config: &RefineConfig) -> bool {
    if stats.node_count > config.hard_max_nodes {
        return true;
    }
    if stats.seq_bp_total > config.hard_max_seq_bp {
        return true;
    }

    let mut above = 0;
    if stats.node_count > config.max_nodes {
        above += 1;
    }
    if stats.seq_bp_total > config.max_seq_bp {
        above += 1;
    }
    if stats.edge_count > config.max_edges {
        above += 1;
    }
    above >= 2
}

/// Accumulate per-community stats: node counts from the partition vector,
/// sequence lengths and intra-community edge counts from one GFA scan.
///
/// # Errors
///
/// Fails on I/O or parse errors while re-reading the GFA.
pub fn compute_community_stats<P: AsRef<Path>>(
    input_gfa: P,
    node_ids: &HashMap<Vec<u8>, u32>,
    id_to_comm: &[u32],
    ncom: u32,
    reader_opts: &ReaderOptions,
) -> io::Result<Vec<CommunityStats>> {
    let mut stats = vec![CommunityStats::default(); ncom as usize];

    for &comm in id_to_comm {
        if (comm as usize) < stats.len() {
            stats[comm as usize].node_count += 1;
        }
    }

    let mut reader = LineReader::open(&input_gfa, reader_opts.clone())?;
    while let Some(line) = reader.read_line()? {
        match gfa::record_type(line) {
            RecordType::Segment => {
                let (node_id, seq) = gfa::extract_s_node(line)?;
                let Some(&int_id) = node_ids.get(node_id) else {
                    continue;
                };
                let comm = id_to_comm[int_id as usize] as usize;
                if comm < stats.len() {
                    stats[comm].seq_bp_total += seq.len() as u64;
                }
            }
            RecordType::Link => {
                let (src, dst) = gfa::extract_l_nodes(line)?;
                let (Some(&src_id), Some(&dst_id)) = (node_ids.get(src), node_ids.get(dst))
                else {
                    continue;
                };
                let src_comm = id_to_comm[src_id as usize];
                let dst_comm = id_to_comm[dst_id as usize];
                if src_comm == dst_comm && (src_comm as usize) < stats.len() {
                    stats[src_comm as usize].edge_count += 1;
                }
            }
            _ => {}
        }
    }

    Ok(stats)
}

/// Write the per-community stats table as a TSV with a header row.
pub fn write_community_stats_tsv<P: AsRef<Path>>(
    stats: &[CommunityStats],
    out_path: P,
) -> io::Result<()> {
    let mut out = BufWriter::new(File::create(out_path)?);
    writeln!(out, "community_id\tnode_count\tseq_bp_total\tedge_count")?;
    for (cid, s) in stats.iter().enumerate() {
        writeln!(
            out,
            "{}\t{}\t{}\t{}",
            cid, s.node_count, s.seq_bp_total, s.edge_count
        )?;
    }
    out.flush()
}

/// Project the sorted global edge list down to the edges internal to one
/// community, translated to local ids. Returns the local edge count.
fn write_local_edgelist(
    sorted_edgelist: &Path,
    global_to_local: &HashMap<u32, u32>,
    out_path: &Path,
) -> io::Result<u64> {
    let reader = BufReader::new(File::open(sorted_edgelist)?);
    let mut out = BufWriter::new(File::create(out_path)?);

    let mut edge_count = 0u64;
    for line in reader.lines() {
        let line = line?;
        let Some((src, dst)) = parse_edge_line(&line)? else {
            continue;
        };
        let (Some(&local_src), Some(&local_dst)) =
            (global_to_local.get(&src), global_to_local.get(&dst))
        else {
            continue;
        };
        writeln!(out, "{} {}", local_src, local_dst)?;
        edge_count += 1;
    }

    out.flush()?;
    Ok(edge_count)
}

/// Re-partition every oversized community and renumber the whole partition.
///
/// `id_to_comm` is rewritten in place; the new community count is returned
/// when refinement happened, `None` when it was disabled or nothing was
/// oversized.
///
/// # Errors
///
/// Fails on I/O errors in the stats scan, the local edge projection, the
/// local CSR build, or the local detection run.
pub fn refine_partition(
    input_gfa: &Path,
    sorted_edgelist: &Path,
    tmp_dir: &Path,
    node_ids: &HashMap<Vec<u8>, u32>,
    reader_opts: &ReaderOptions,
    config: &RefineConfig,
    id_to_comm: &mut Vec<u32>,
) -> io::Result<Option<u32>> {
    if !config.enabled || id_to_comm.is_empty() {
        return Ok(None);
    }

    let base_ncom = id_to_comm.iter().copied().max().map_or(0, |m| m + 1);
    if base_ncom == 0 {
        return Ok(None);
    }

    println!("📏 Computing per-community stats for recursive chunking");
    let stats = compute_community_stats(input_gfa, node_ids, id_to_comm, base_ncom, reader_opts)?;

    let mut is_recursed = vec![false; base_ncom as usize];
    let mut any = false;
    for (cid, s) in stats.iter().enumerate() {
        if should_recurse(s, config) {
            is_recursed[cid] = true;
            any = true;
        }
    }
    if !any {
        println!("📏 No communities exceed the recursive thresholds");
        return Ok(None);
    }

    // Member lists for just the communities being split, in interned-id
    // order (id_to_comm is scanned ascending).
    let mut comm_nodes: HashMap<u32, Vec<u32>> = HashMap::new();
    for (node_id, &comm) in id_to_comm.iter().enumerate() {
        if is_recursed[comm as usize] {
            comm_nodes.entry(comm).or_default().push(node_id as u32);
        }
    }

    let recursive_dir = tmp_dir.join("recursive");
    std::fs::create_dir_all(&recursive_dir)?;

    let mut new_id_to_comm = vec![u32::MAX; id_to_comm.len()];
    let mut next_comm_id = 0u32;
    let mut non_recursed_remap: HashMap<u32, u32> = HashMap::new();

    for cid in 0..base_ncom {
        if !is_recursed[cid as usize] {
            non_recursed_remap.insert(cid, next_comm_id);
            next_comm_id += 1;
            continue;
        }

        let Some(nodes) = comm_nodes.get(&cid) else {
            continue;
        };
        if nodes.is_empty() {
            continue;
        }

        let mut global_to_local: HashMap<u32, u32> = HashMap::with_capacity(nodes.len());
        let mut local_to_global: Vec<u32> = Vec::with_capacity(nodes.len());
        for (local, &global) in nodes.iter().enumerate() {
            global_to_local.insert(global, local as u32);
            local_to_global.push(global);
        }

        let local_edgelist = recursive_dir.join(format!("comm_{}_edgelist.txt", cid));
        let local_binary = recursive_dir.join(format!("comm_{}_binary.bin", cid));

        println!("📏 Building local edge list for community {}", cid);
        let local_edges =
            write_local_edgelist(sorted_edgelist, &global_to_local, &local_edgelist)?;

        if local_edges == 0 {
            // Nothing to split on; the community keeps a single fresh id.
            let only_comm = next_comm_id;
            next_comm_id += 1;
            for &global in nodes {
                new_id_to_comm[global as usize] = only_comm;
            }
            continue;
        }

        csr::write_csr_from_edgelist(&local_edgelist, &local_binary, nodes.len() as u32)?;

        println!("📏 Running community detection for community {}", cid);
        let sub_parts = louvain::detect_communities(&local_binary, MODULARITY_PRECISION)?;

        for sub in &sub_parts {
            let sub_comm = next_comm_id;
            next_comm_id += 1;
            for &local in sub {
                let global = local_to_global[local as usize];
                new_id_to_comm[global as usize] = sub_comm;
            }
        }
    }

    // Nodes of untouched communities take their community's remapped id.
    for (node_id, &old_comm) in id_to_comm.iter().enumerate() {
        if new_id_to_comm[node_id] != u32::MAX {
            continue;
        }
        let mapped = match non_recursed_remap.get(&old_comm) {
            Some(&mapped) => mapped,
            None => {
                let mapped = next_comm_id;
                next_comm_id += 1;
                non_recursed_remap.insert(old_comm, mapped);
                mapped
            }
        };
        new_id_to_comm[node_id] = mapped;
    }

    *id_to_comm = new_id_to_comm;
    println!(
        "📏 Recursive chunking produced {} communities (from {})",
        next_comm_id, base_ncom
    );
    Ok(Some(next_comm_id))
}
