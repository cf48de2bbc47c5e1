// src/edges.rs

//! First-pass edge list construction and the external sort step.
//!
//! The GFA is scanned once; Link endpoints are interned to dense `u32` ids
//! in first-seen order and every link is emitted to a temp text file as the
//! canonical pair `min max`. The file is then sorted and deduplicated with
//! the system `sort` utility, which keeps graphs whose edge set exceeds
//! memory out of RAM.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::process::Command;

use crate::build::BuildContext;
use crate::gfa::{self, RecordType};
use crate::progress;
use crate::reader::LineReader;

/// Look up `node_id` in the interning map, allocating the next dense id on
/// first sight.
pub fn intern_node(ctx: &mut BuildContext, node_id: &[u8]) -> u32 {
    if let Some(&id) = ctx.node_ids.get(node_id) {
        return id;
    }
    let id = ctx.n_nodes;
    ctx.node_ids.insert(node_id.to_vec(), id);
    ctx.n_nodes += 1;
    id
}

/// Scan the GFA and write the canonical edge list to `out_path`.
///
/// Every Link record contributes one `min max` line; self-loops are
/// preserved. `ctx` accumulates the interning map and the node/edge
/// counters.
///
/// # Errors
///
/// Fails on I/O errors, on malformed Link records, and on unreadable input.
pub fn generate_edgelist(
    input_gfa: &Path,
    out_path: &Path,
    ctx: &mut BuildContext,
) -> io::Result<()> {
    let mut file_reader = LineReader::open(input_gfa, ctx.reader_opts.clone())?;
    let out = File::create(out_path)?;
    let mut writer = BufWriter::new(out);

    println!("🔍 Reading the GFA file {}", input_gfa.display());
    let pb = progress::line_spinner("edge list");

    while let Some(line) = file_reader.read_line()? {
        if gfa::record_type(line) == RecordType::Link {
            let (from, to) = gfa::extract_l_nodes(line)?;
            let src = intern_node(ctx, from);
            let dst = intern_node(ctx, to);
            ctx.n_edges += 1;

            if src <= dst {
                writeln!(writer, "{} {}", src, dst)?;
            } else {
                writeln!(writer, "{} {}", dst, src)?;
            }
        }
        progress::tick_lines(&pb, file_reader.line_number(), ctx.progress_every);
    }
    pb.finish_and_clear();

    writer.flush()?;
    Ok(())
}

/// Sort and deduplicate the edge list with the external `sort` utility:
/// first column numeric, then second column numeric, unique, temp files in
/// the build's temp directory.
///
/// # Errors
///
/// Fails when `sort` is not on `PATH` or exits non-zero.
pub fn run_sort<P: AsRef<Path>>(input_edges: P, output_edges: P, tmp_dir: P) -> io::Result<()> {
    let status = Command::new("sort")
        .arg("-k1,1n")
        .arg("-k2,2n")
        .arg("-u")
        .arg("-S")
        .arg("50%")
        .arg("--parallel=1")
        .arg("-T")
        .arg(tmp_dir.as_ref())
        .arg("-o")
        .arg(output_edges.as_ref())
        .arg(input_edges.as_ref())
        .status()
        .map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    "the external 'sort' utility was not found on PATH",
                )
            } else {
                err
            }
        })?;

    if !status.success() {
        return Err(io::Error::other(format!(
            "external sort failed with status {}",
            status
        )));
    }
    Ok(())
}

/// Parse one `src dst` edge-list line. Returns `None` for blank lines.
pub fn parse_edge_line(line: &str) -> io::Result<Option<(u32, u32)>> {
    let mut fields = line.split_ascii_whitespace();
    let Some(first) = fields.next() else {
        return Ok(None);
    };
    let Some(second) = fields.next() else {
        return Err(bad_edge_line(line));
    };
    let src = first.parse::<u32>().map_err(|_| bad_edge_line(line))?;
    let dst = second.parse::<u32>().map_err(|_| bad_edge_line(line))?;
    Ok(Some((src, dst)))
}

fn bad_edge_line(line: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!("malformed edge list line: {:?}", line),
    )
}
