// src/node_index.rs

//! Sorted on-disk hash table from node identifiers to community ids.
//!
//! Each record is 12 bytes: the FNV-1a-64 hash of the node string
//! (little-endian u64) followed by the community id (little-endian u32).
//! Records are sorted ascending by hash so lookups binary-search a
//! memory-mapped file. The writer refuses the build outright when two
//! distinct node strings collide on the same 64-bit hash, keeping lookups
//! unambiguous.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Bytes per on-disk record.
pub const ENTRY_SIZE: usize = 12;

/// 64-bit FNV-1a over a byte string.
pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Hash every interned node, pair it with its community, sort by hash, and
/// write the fixed-record binary table.
///
/// # Errors
///
/// Fails on I/O errors, on a node id outside the partition vector (a
/// consistency error), and when two distinct node strings share a hash.
pub fn write_node_hash_index<P: AsRef<Path>>(
    node_ids: &HashMap<Vec<u8>, u32>,
    id_to_comm: &[u32],
    out_path: P,
) -> io::Result<()> {
    let mut entries: Vec<(u64, u32)> = Vec::with_capacity(node_ids.len());

    for (node, &int_id) in node_ids {
        if int_id as usize >= id_to_comm.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "node id {} out of range while building the hash index",
                    int_id
                ),
            ));
        }
        entries.push((fnv1a_hash(node), id_to_comm[int_id as usize]));
    }

    entries.sort_unstable_by_key(|&(hash, _)| hash);

    // Interning guarantees distinct strings, so equal adjacent hashes can
    // only be a real 64-bit collision.
    for pair in entries.windows(2) {
        if pair[0].0 == pair[1].0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "two distinct node identifiers hash to {:#018x}; refusing to build an ambiguous index",
                    pair[0].0
                ),
            ));
        }
    }

    let mut out = BufWriter::new(File::create(out_path)?);
    for (hash, comm) in entries {
        out.write_all(&hash.to_le_bytes())?;
        out.write_all(&comm.to_le_bytes())?;
    }
    out.flush()
}

/// Memory-mapped read view over a sorted `.ndx` file.
pub struct NodeHashIndex {
    // None only for a zero-record file, which cannot be mapped.
    mmap: Option<Mmap>,
    n_entries: usize,
}

impl NodeHashIndex {
    /// Open and validate an index file.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or mapped, or when its size is
    /// not a whole number of records.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(&path)?;
        let len = file.metadata()?.len() as usize;
        if len % ENTRY_SIZE != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "node index file size {} is not a whole number of records: {}",
                    len,
                    path.as_ref().display()
                ),
            ));
        }

        if len == 0 {
            // An empty graph still gets a valid (empty) index.
            return Ok(NodeHashIndex {
                mmap: None,
                n_entries: 0,
            });
        }

        let mmap = unsafe { Mmap::map(&file)? };
        Ok(NodeHashIndex {
            mmap: Some(mmap),
            n_entries: len / ENTRY_SIZE,
        })
    }

    pub fn len(&self) -> usize {
        self.n_entries
    }

    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    /// Binary-search for the community of `node_id`. `None` means the node
    /// was not indexed.
    pub fn lookup(&self, node_id: &[u8]) -> Option<u32> {
        let data = self.mmap.as_deref()?;
        let query = fnv1a_hash(node_id);

        let mut low = 0usize;
        let mut high = self.n_entries;
        while low < high {
            let mid = low + (high - low) / 2;
            let (hash, comm) = read_entry(data, mid);
            if hash < query {
                low = mid + 1;
            } else if hash > query {
                high = mid;
            } else {
                return Some(comm);
            }
        }
        None
    }
}

/// Decode the `i`-th 12-byte record from the mapped table.
fn read_entry(data: &[u8], i: usize) -> (u64, u32) {
    let at = i * ENTRY_SIZE;
    let hash = u64::from_le_bytes([
        data[at],
        data[at + 1],
        data[at + 2],
        data[at + 3],
        data[at + 4],
        data[at + 5],
        data[at + 6],
        data[at + 7],
    ]);
    let comm = u32::from_le_bytes([data[at + 8], data[at + 9], data[at + 10], data[at + 11]]);
    (hash, comm)
}
