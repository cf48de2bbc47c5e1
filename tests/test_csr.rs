// tests/test_csr.rs

use gfachunk::csr::*;

use std::io::Write;
use std::path::Path;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn write_edges(dir: &Path, name: &str, edges: &[(u32, u32)]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for (u, v) in edges {
            writeln!(file, "{} {}", u, v).unwrap();
        }
        path
    }

    /// Test 4.1: Header, cumulative degrees, and neighbour ranges of a small
    /// triangle-plus-tail graph.
    #[test]
    fn test_csr_layout() {
        let dir = tempdir().unwrap();
        // Triangle 0-1-2 plus an edge 2-3.
        let edges = write_edges(dir.path(), "e.txt", &[(0, 1), (0, 2), (1, 2), (2, 3)]);
        let bin = dir.path().join("g.bin");

        write_csr_from_edgelist(&edges, &bin, 4).unwrap();
        let g = load_csr(&bin).unwrap();

        assert_eq!(g.n_nodes, 4);
        assert_eq!(g.degrees, vec![2, 4, 7, 8]);
        assert_eq!(g.total_links(), 8);
        assert_eq!(g.degree(0), 2);
        assert_eq!(g.degree(2), 3);
        assert_eq!(g.neighbors(0), &[1, 2]);
        assert_eq!(g.neighbors(1), &[0, 2]);
        assert_eq!(g.neighbors(2), &[0, 1, 3]);
        assert_eq!(g.neighbors(3), &[2]);
    }

    /// Test 4.2: Every non-self-loop edge appears in both endpoints' ranges.
    #[test]
    fn test_csr_symmetry() {
        let dir = tempdir().unwrap();
        let edge_set = [(0u32, 3u32), (1, 3), (2, 4), (0, 4), (3, 4)];
        let edges = write_edges(dir.path(), "e.txt", &edge_set);
        let bin = dir.path().join("g.bin");

        write_csr_from_edgelist(&edges, &bin, 5).unwrap();
        let g = load_csr(&bin).unwrap();

        for &(u, v) in &edge_set {
            assert!(g.neighbors(u).contains(&v), "{} missing from {}'s range", v, u);
            assert!(g.neighbors(v).contains(&u), "{} missing from {}'s range", u, v);
        }
    }

    /// Test 4.3: A self-loop contributes one degree unit and one neighbour
    /// entry.
    #[test]
    fn test_csr_self_loop() {
        let dir = tempdir().unwrap();
        let edges = write_edges(dir.path(), "e.txt", &[(0, 0), (0, 1)]);
        let bin = dir.path().join("g.bin");

        write_csr_from_edgelist(&edges, &bin, 2).unwrap();
        let g = load_csr(&bin).unwrap();

        assert_eq!(g.degree(0), 2);
        assert_eq!(g.neighbors(0), &[0, 1]);
        assert_eq!(g.neighbors(1), &[0]);
        assert_eq!(g.total_links(), 3);
    }

    /// Test 4.4: The on-disk bytes are little-endian `u32 N | u64 D | u32
    /// links`.
    #[test]
    fn test_csr_binary_format() {
        let dir = tempdir().unwrap();
        let edges = write_edges(dir.path(), "e.txt", &[(0, 1)]);
        let bin = dir.path().join("g.bin");

        write_csr_from_edgelist(&edges, &bin, 2).unwrap();
        let bytes = fs::read(&bin).unwrap();

        assert_eq!(bytes.len(), 4 + 2 * 8 + 2 * 4);
        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 2);
        assert_eq!(u64::from_le_bytes(bytes[4..12].try_into().unwrap()), 1);
        assert_eq!(u64::from_le_bytes(bytes[12..20].try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 0);
    }

    /// Test 4.5: An out-of-range endpoint aborts the stage.
    #[test]
    fn test_csr_out_of_range_endpoint() {
        let dir = tempdir().unwrap();
        let edges = write_edges(dir.path(), "e.txt", &[(0, 5)]);
        let bin = dir.path().join("g.bin");

        let err = write_csr_from_edgelist(&edges, &bin, 3).unwrap_err();
        assert!(err.to_string().contains("outside"));
    }

    /// Test 4.6: An empty edge list still produces a loadable graph.
    #[test]
    fn test_csr_empty_graph() {
        let dir = tempdir().unwrap();
        let edges = write_edges(dir.path(), "e.txt", &[]);
        let bin = dir.path().join("g.bin");

        write_csr_from_edgelist(&edges, &bin, 0).unwrap();
        let g = load_csr(&bin).unwrap();
        assert_eq!(g.n_nodes, 0);
        assert_eq!(g.total_links(), 0);
    }

    /// Test 4.7: A truncated CSR file is rejected on load.
    #[test]
    fn test_csr_truncated_file() {
        let dir = tempdir().unwrap();
        let bin = dir.path().join("g.bin");
        fs::write(&bin, [5u8, 0, 0, 0, 1, 2]).unwrap();

        assert!(load_csr(&bin).is_err());
    }
}
