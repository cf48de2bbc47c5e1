use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use gfachunk::{build, node_index, refine, retrieve};

/// Gfachunk: index a GFA into community-sized gzip chunks and stream them back
#[derive(Parser)]
#[command(
    name = "gfachunk",
    version,
    about = "Index a GFA file into community chunks and retrieve the chunk holding any node"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index and split a GFA file into communities
    #[command(name = "index_gfa")]
    IndexGfa {
        /// Path to the input GFA file (plain or gzip)
        in_gfa: PathBuf,
        /// Path to the output multi-member gzip file
        out_gz: PathBuf,
        /// Keep the temporary directory after a successful build
        #[arg(long)]
        keep_tmp: bool,
        /// Base directory for the build's unique temp directory
        /// (default: the input file's parent directory)
        #[arg(long)]
        tmp_dir: Option<PathBuf>,
        /// Log progress every N input lines (0 disables)
        #[arg(long, default_value_t = 1_000_000)]
        progress_every: u64,
        /// Gzip compression level for the output members
        #[arg(long, default_value_t = 6, value_parser = clap::value_parser!(u32).range(1..=9))]
        gzip_level: u32,
        /// Gzip memory level; accepted for compatibility, the embedded
        /// deflate implementation manages its own memory
        #[arg(long, default_value_t = 8, value_parser = clap::value_parser!(u32).range(1..=9))]
        gzip_mem_level: u32,
        /// Strip a trailing carriage return from every input line
        #[arg(long)]
        strip_cr: bool,
        /// Re-partition communities that exceed the size caps
        #[arg(long)]
        recursive_chunking: bool,
        /// Soft cap on nodes per community
        #[arg(long, default_value_t = 1_000_000)]
        recursive_max_nodes: u64,
        /// Soft cap on total sequence length (bp) per community
        #[arg(long, default_value_t = 500_000_000)]
        recursive_max_seq_bp: u64,
        /// Soft cap on intra-community edges
        #[arg(long, default_value_t = 5_000_000)]
        recursive_max_edges: u64,
        /// Hard cap on nodes per community
        #[arg(long, default_value_t = 5_000_000)]
        recursive_hard_max_nodes: u64,
        /// Hard cap on total sequence length (bp) per community
        #[arg(long, default_value_t = 3_000_000_000)]
        recursive_hard_max_seq_bp: u64,
        /// Write a per-community stats table (TSV) to this path
        #[arg(long)]
        community_stats_tsv: Option<PathBuf>,
    },
    /// Stream a community chunk from an indexed GFA
    #[command(name = "get_chunk")]
    GetChunk {
        /// Path to the indexed GFA gzip file
        in_gz: PathBuf,
        /// Path to the offset index (defaults to <in_gz>.idx)
        #[arg(long)]
        index: Option<PathBuf>,
        /// Path to the node hash index (defaults to <in_gz>.ndx)
        #[arg(long)]
        node_index: Option<PathBuf>,
        /// Community id to stream
        #[arg(long)]
        community_id: Option<u32>,
        /// Node id to resolve into a community id (takes precedence)
        #[arg(long)]
        node_id: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::IndexGfa {
            in_gfa,
            out_gz,
            keep_tmp,
            tmp_dir,
            progress_every,
            gzip_level,
            gzip_mem_level,
            strip_cr,
            recursive_chunking,
            recursive_max_nodes,
            recursive_max_seq_bp,
            recursive_max_edges,
            recursive_hard_max_nodes,
            recursive_hard_max_seq_bp,
            community_stats_tsv,
        } => {
            if gzip_mem_level != 8 {
                println!(
                    "ℹ️  --gzip_mem_level {} accepted but has no effect with the embedded deflate implementation",
                    gzip_mem_level
                );
            }
            let opts = build::BuildOptions {
                keep_tmp,
                tmp_dir,
                progress_every,
                gzip_level,
                strip_cr,
                refine: refine::RefineConfig {
                    enabled: recursive_chunking,
                    max_nodes: recursive_max_nodes,
                    max_seq_bp: recursive_max_seq_bp,
                    max_edges: recursive_max_edges,
                    hard_max_nodes: recursive_hard_max_nodes,
                    hard_max_seq_bp: recursive_hard_max_seq_bp,
                },
                community_stats_tsv,
                ..build::BuildOptions::default()
            };
            build::index_gfa(&in_gfa, &out_gz, &opts)
        }
        Commands::GetChunk {
            in_gz,
            index,
            node_index,
            community_id,
            node_id,
        } => run_get_chunk(in_gz, index, node_index, community_id, node_id),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn run_get_chunk(
    in_gz: PathBuf,
    index: Option<PathBuf>,
    node_index_path: Option<PathBuf>,
    community_id: Option<u32>,
    node_id: Option<String>,
) -> io::Result<()> {
    if !in_gz.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("input file does not exist: {}", in_gz.display()),
        ));
    }

    let index_path = index.unwrap_or_else(|| build::companion_path(&in_gz, "idx"));
    if !index_path.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("index file does not exist: {}", index_path.display()),
        ));
    }

    let community_id = match (&node_id, community_id) {
        (Some(node), _) => {
            // The node id wins when both selectors are given.
            let ndx_path =
                node_index_path.unwrap_or_else(|| build::companion_path(&in_gz, "ndx"));
            if !ndx_path.is_file() {
                return Err(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("node index file does not exist: {}", ndx_path.display()),
                ));
            }
            let ndx = node_index::NodeHashIndex::open(&ndx_path)?;
            ndx.lookup(node.as_bytes()).ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("node id {} does not exist in index {}", node, ndx_path.display()),
                )
            })?
        }
        (None, Some(cid)) => cid,
        (None, None) => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "either --community_id or --node_id must be provided",
            ));
        }
    };

    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let mut write_err = None;
    retrieve::stream_community_lines(&index_path, &in_gz, community_id, |line| {
        let ok = out
            .write_all(line)
            .and_then(|_| out.write_all(b"\n"))
            .map_err(|err| write_err = Some(err))
            .is_ok();
        ok
    })?;
    if let Some(err) = write_err {
        return Err(err);
    }
    out.flush()
}
