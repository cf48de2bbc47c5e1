// src/gfa.rs

//! Field extraction for tab-delimited GFA records.
//!
//! Only the record types the pipeline routes on are parsed (`H`, `S`, `L`,
//! plus `P` for completeness); everything else is carried through as raw
//! bytes. A record missing a required tab is a fatal parse error naming the
//! offending line.

use std::io;

/// GFA record kinds, dispatched on the first byte of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    Header,
    Segment,
    Link,
    Path,
    Other,
}

/// Classify a line by its leading record-type character.
pub fn record_type(line: &[u8]) -> RecordType {
    match line.first() {
        Some(b'H') => RecordType::Header,
        Some(b'S') => RecordType::Segment,
        Some(b'L') => RecordType::Link,
        Some(b'P') => RecordType::Path,
        _ => RecordType::Other,
    }
}

fn offending_line(line: &[u8]) -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        format!(
            "malformed GFA record (missing tab). Offending line: {}",
            String::from_utf8_lossy(line)
        ),
    )
}

/// Position of the `n`-th tab strictly after `from`, if any.
fn tab_after(line: &[u8], from: usize) -> Option<usize> {
    line[from..].iter().position(|&b| b == b'\t').map(|p| from + p)
}

/// Extract the two endpoint node identifiers from a Link record.
///
/// The hardcoded layout is `L\t<from>\t<from_orient>\t<to>\t<to_orient>\t<overlap>`;
/// fields 2 and 4 are returned. Orientations and overlap are not inspected.
///
/// # Errors
///
/// Fails with a parse error naming the line when any of the first four tabs
/// is missing.
pub fn extract_l_nodes(line: &[u8]) -> io::Result<(&[u8], &[u8])> {
    let t1 = tab_after(line, 0).ok_or_else(|| offending_line(line))?;
    let t2 = tab_after(line, t1 + 1).ok_or_else(|| offending_line(line))?;
    let t3 = tab_after(line, t2 + 1).ok_or_else(|| offending_line(line))?;
    let t4 = tab_after(line, t3 + 1).ok_or_else(|| offending_line(line))?;

    Ok((&line[t1 + 1..t2], &line[t3 + 1..t4]))
}

/// Extract the node identifier and sequence from a Segment record
/// (`S\t<id>\t<sequence>[\t<tags>...]`). The sequence runs to the next tab
/// or to end of line.
pub fn extract_s_node(line: &[u8]) -> io::Result<(&[u8], &[u8])> {
    let t1 = tab_after(line, 0).ok_or_else(|| offending_line(line))?;
    let t2 = tab_after(line, t1 + 1).ok_or_else(|| offending_line(line))?;
    let seq_end = tab_after(line, t2 + 1).unwrap_or(line.len());

    Ok((&line[t1 + 1..t2], &line[t2 + 1..seq_end]))
}

/// Extract only the node identifier from a Segment record, skipping the
/// sequence field entirely. The splitter's routing key needs nothing else.
pub fn extract_s_node_id(line: &[u8]) -> io::Result<&[u8]> {
    let t1 = tab_after(line, 0).ok_or_else(|| offending_line(line))?;
    let t2 = tab_after(line, t1 + 1).ok_or_else(|| offending_line(line))?;
    Ok(&line[t1 + 1..t2])
}

/// Extract the path name and the comma-separated node-with-orientation
/// tokens from a Path record (`P\t<name>\t<node_list>\t<overlaps>[...]`).
pub fn extract_p_path(line: &[u8]) -> io::Result<(&[u8], Vec<&[u8]>)> {
    let t1 = tab_after(line, 0).ok_or_else(|| offending_line(line))?;
    let t2 = tab_after(line, t1 + 1).ok_or_else(|| offending_line(line))?;
    let t3 = tab_after(line, t2 + 1).ok_or_else(|| offending_line(line))?;

    let name = &line[t1 + 1..t2];
    let nodes = line[t2 + 1..t3]
        .split(|&b| b == b',')
        .filter(|tok| !tok.is_empty())
        .collect();

    Ok((name, nodes))
}
