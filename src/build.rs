// src/build.rs

//! The indexing pipeline: one linear pass through the build stages, from
//! edge-list extraction to the sorted node hash index.
//!
//! Each stage consumes the previous stage's on-disk artifact from a uniquely
//! named temp directory, which is removed on success unless the caller asks
//! to keep it. All counters and the interning map travel in a
//! [`BuildContext`] so that two builds in one process cannot interfere.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::compress;
use crate::edges;
use crate::louvain::{self, MODULARITY_PRECISION};
use crate::node_index;
use crate::reader::{LineReader, ReaderOptions};
use crate::refine::{self, RefineConfig};
use crate::split::{self, DEFAULT_MAX_OPEN};
use crate::{csr, gfa};

/// Per-build state: the interning map and the node/edge counters.
#[derive(Debug, Default)]
pub struct BuildContext {
    /// Node identifier string -> dense interned id, in first-seen order.
    pub node_ids: HashMap<Vec<u8>, u32>,
    pub n_nodes: u32,
    pub n_edges: u64,
    pub reader_opts: ReaderOptions,
    /// Log cadence for streaming stages; 0 disables.
    pub progress_every: u64,
}

/// Everything the `index_gfa` command can configure.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub keep_tmp: bool,
    /// Base directory for the unique temp dir; defaults to the input's
    /// parent directory.
    pub tmp_dir: Option<PathBuf>,
    pub progress_every: u64,
    pub gzip_level: u32,
    pub strip_cr: bool,
    pub max_open_handles: usize,
    pub refine: RefineConfig,
    pub community_stats_tsv: Option<PathBuf>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            keep_tmp: false,
            tmp_dir: None,
            progress_every: 1_000_000,
            gzip_level: 6,
            strip_cr: false,
            max_open_handles: DEFAULT_MAX_OPEN,
            refine: RefineConfig::default(),
            community_stats_tsv: None,
        }
    }
}

/// Create a uniquely named temp directory under `base` and re-point a
/// `latest` symlink beside it. The symlink is best-effort; the directory is
/// not.
pub fn create_temp_dir(base: &Path, prefix: &str) -> io::Result<PathBuf> {
    let pid = process::id();
    let mut nonce = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);

    loop {
        let dir = base.join(format!("{}{}_{:x}", prefix, pid, nonce));
        match fs::create_dir_all(base).and_then(|_| fs::create_dir(&dir)) {
            Ok(()) => {
                point_latest_symlink(base, &dir);
                return Ok(dir);
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                nonce += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(unix)]
fn point_latest_symlink(base: &Path, dir: &Path) {
    let link = base.join("latest");
    let _ = fs::remove_file(&link);
    let _ = std::os::unix::fs::symlink(dir, &link);
}

#[cfg(not(unix))]
fn point_latest_symlink(_base: &Path, _dir: &Path) {}

/// Scan the GFA for Segment identifiers that never appeared in a Link and
/// append them as one extra "singletons" community. Fresh interned ids are
/// allocated in file order.
pub fn add_singleton_community<P: AsRef<Path>>(
    input_gfa: P,
    ctx: &mut BuildContext,
    communities: &mut Vec<Vec<u32>>,
) -> io::Result<()> {
    let mut reader = LineReader::open(&input_gfa, ctx.reader_opts.clone())?;
    let mut singletons: Vec<u32> = Vec::new();

    while let Some(line) = reader.read_line()? {
        if gfa::record_type(line) != gfa::RecordType::Segment {
            continue;
        }
        let node_id = gfa::extract_s_node_id(line)?;
        if ctx.node_ids.contains_key(node_id) {
            continue;
        }
        let int_id = edges::intern_node(ctx, node_id);
        singletons.push(int_id);
    }

    if singletons.is_empty() {
        println!("ℹ️  No singleton nodes found");
    } else {
        println!(
            "ℹ️  Added {} singleton nodes as community {}",
            singletons.len(),
            communities.len()
        );
        communities.push(singletons);
    }
    Ok(())
}

/// Flatten a list-of-lists partition into the dense `id_to_comm` vector.
fn partition_to_id_to_comm(communities: &[Vec<u32>], n_nodes: u32) -> Vec<u32> {
    let mut id_to_comm = vec![0u32; n_nodes as usize];
    for (c, members) in communities.iter().enumerate() {
        for &node in members {
            id_to_comm[node as usize] = c as u32;
        }
    }
    id_to_comm
}

/// Run the whole indexing pipeline.
///
/// Produces `out_gz`, `<out_gz>.idx`, and `<out_gz>.ndx`. Refuses to start
/// when `out_gz` or `<out_gz>.ndx` already exists.
///
/// # Errors
///
/// Any stage failure aborts the build; partial artifacts and the temp
/// directory are left on disk for diagnosis.
pub fn index_gfa(in_gfa: &Path, out_gz: &Path, opts: &BuildOptions) -> io::Result<()> {
    let total_time = Instant::now();

    if !in_gfa.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("input file does not exist: {}", in_gfa.display()),
        ));
    }
    if out_gz.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("output file already exists: {}", out_gz.display()),
        ));
    }
    let node_index_path = companion_path(out_gz, "ndx");
    if node_index_path.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "node index file already exists: {}",
                node_index_path.display()
            ),
        ));
    }
    let offset_index_path = companion_path(out_gz, "idx");

    let tmp_base = match &opts.tmp_dir {
        Some(dir) => dir.clone(),
        None => in_gfa.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };
    let tmp_dir = create_temp_dir(&tmp_base, "gfachunk_tmp_")?;
    println!("📂 Using temp directory {}", tmp_dir.display());

    let mut ctx = BuildContext {
        node_ids: HashMap::new(),
        n_nodes: 0,
        n_edges: 0,
        reader_opts: ReaderOptions {
            strip_cr: opts.strip_cr,
            ..ReaderOptions::default()
        },
        progress_every: opts.progress_every,
    };

    // Stages 1-3: stream the GFA, intern nodes, emit the canonical edge list.
    let tmp_edgelist = tmp_dir.join("tmp_edgelist.txt");
    let timer = Instant::now();
    edges::generate_edgelist(in_gfa, &tmp_edgelist, &mut ctx)?;
    println!(
        "✅ Edge list written in {:.2?} ({} link-connected nodes, {} L lines)",
        timer.elapsed(),
        ctx.n_nodes,
        ctx.n_edges
    );

    // Stage 4: external sort with deduplication.
    let sorted_edgelist = tmp_dir.join("tmp_edgelist_sorted.txt");
    let timer = Instant::now();
    println!("🔃 Sorting the edge list");
    edges::run_sort(&tmp_edgelist, &sorted_edgelist, &tmp_dir)?;
    println!("✅ Edge list sorted in {:.2?}", timer.elapsed());

    // Stage 5: CSR binary adjacency.
    let tmp_binary = tmp_dir.join("tmp_binary.bin");
    let timer = Instant::now();
    println!("🗜️  Writing the binary graph to {}", tmp_binary.display());
    csr::write_csr_from_edgelist(&sorted_edgelist, &tmp_binary, ctx.n_nodes)?;
    println!("✅ Binary graph written in {:.2?}", timer.elapsed());

    // Stage 6: community detection.
    let timer = Instant::now();
    println!("🧩 Starting community detection");
    let mut communities = louvain::detect_communities(&tmp_binary, MODULARITY_PRECISION)?;
    println!(
        "✅ Community detection finished in {:.2?} ({} communities)",
        timer.elapsed(),
        communities.len()
    );

    // Stage 7: adopt segments that no Link ever mentioned.
    let timer = Instant::now();
    println!("🔍 Scanning for singleton nodes");
    add_singleton_community(in_gfa, &mut ctx, &mut communities)?;
    println!("✅ Singleton scan finished in {:.2?}", timer.elapsed());

    let mut id_to_comm = partition_to_id_to_comm(&communities, ctx.n_nodes);
    let mut ncom = communities.len() as u32;
    drop(communities);

    // Stage 8: optional recursive refinement of oversized communities.
    if opts.refine.enabled {
        let timer = Instant::now();
        if let Some(refined_ncom) = refine::refine_partition(
            in_gfa,
            &sorted_edgelist,
            &tmp_dir,
            &ctx.node_ids,
            &ctx.reader_opts,
            &opts.refine,
            &mut id_to_comm,
        )? {
            ncom = refined_ncom;
        }
        println!(
            "✅ Recursive chunking pass finished in {:.2?}",
            timer.elapsed()
        );
    }

    if let Some(stats_path) = &opts.community_stats_tsv {
        let stats = refine::compute_community_stats(
            in_gfa,
            &ctx.node_ids,
            &id_to_comm,
            ncom,
            &ctx.reader_opts,
        )?;
        refine::write_community_stats_tsv(&stats, stats_path)?;
        println!("📊 Community stats written to {}", stats_path.display());
    }

    // Stage 9: split the GFA into per-community slices, sink last.
    let timer = Instant::now();
    let part_paths = split::build_part_paths(&tmp_dir, ncom + 1)?;
    split::split_gfa_to_parts(
        in_gfa,
        &ctx.node_ids,
        &id_to_comm,
        part_paths.clone(),
        opts.max_open_handles,
        &ctx.reader_opts,
        ctx.progress_every,
    )?;
    println!("✅ Split finished in {:.2?}", timer.elapsed());

    // Stage 10: one gzip member per community plus the offset index.
    let timer = Instant::now();
    let entries = compress::compress_parts(out_gz, &part_paths, opts.gzip_level)?;
    compress::write_offset_index(&entries, &offset_index_path)?;
    println!(
        "✅ Wrote {} gzip members and {} in {:.2?}",
        entries.len(),
        offset_index_path.display(),
        timer.elapsed()
    );

    // Stage 11: sorted node hash index.
    let timer = Instant::now();
    println!(
        "#️⃣  Writing node hash index to {}",
        node_index_path.display()
    );
    node_index::write_node_hash_index(&ctx.node_ids, &id_to_comm, &node_index_path)?;
    println!("✅ Node hash index written in {:.2?}", timer.elapsed());

    if !opts.keep_tmp {
        println!("🧹 Removing the temporary files");
        fs::remove_dir_all(&tmp_dir)?;
        let link = tmp_base.join("latest");
        if link.symlink_metadata().is_ok() {
            let _ = fs::remove_file(&link);
        }
    }

    println!("⏰ Completed in {:.2?} total.", total_time.elapsed());
    Ok(())
}

/// `<out_gz>.<ext>` companion path (`graph.gfa.gz` -> `graph.gfa.gz.idx`).
pub fn companion_path(out_gz: &Path, ext: &str) -> PathBuf {
    let mut name = out_gz.as_os_str().to_os_string();
    name.push(format!(".{}", ext));
    PathBuf::from(name)
}
