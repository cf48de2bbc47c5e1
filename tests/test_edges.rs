// tests/test_edges.rs

use gfachunk::build::BuildContext;
use gfachunk::edges::*;

use std::io::Write;
use std::path::Path;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    fn write_file(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    /// Test 3.1: Interned ids are dense and follow first appearance in the
    /// Link records; the edge list holds canonical min-max pairs.
    #[test]
    fn test_edgelist_interning_order() {
        let dir = tempdir().unwrap();
        let gfa = write_file(
            dir.path(),
            "g.gfa",
            "H\tVN:Z:1.0\n\
             S\tzulu\tAC\n\
             S\talpha\tGT\n\
             L\tzulu\t+\talpha\t+\t0M\n\
             L\talpha\t+\tmike\t-\t0M\n\
             L\tmike\t+\tzulu\t+\t0M\n",
        );
        let out = dir.path().join("edges.txt");

        let mut ctx = BuildContext::default();
        generate_edgelist(&gfa, &out, &mut ctx).unwrap();

        // zulu first, then alpha, then mike.
        assert_eq!(ctx.node_ids.get(b"zulu".as_slice()), Some(&0));
        assert_eq!(ctx.node_ids.get(b"alpha".as_slice()), Some(&1));
        assert_eq!(ctx.node_ids.get(b"mike".as_slice()), Some(&2));
        assert_eq!(ctx.n_nodes, 3);
        assert_eq!(ctx.n_edges, 3);

        let content = fs::read_to_string(&out).unwrap();
        assert_eq!(content, "0 1\n1 2\n0 2\n");
    }

    /// Test 3.2: Self-loops are preserved as `u u` lines.
    #[test]
    fn test_edgelist_self_loop() {
        let dir = tempdir().unwrap();
        let gfa = write_file(dir.path(), "g.gfa", "S\tp\tAA\nL\tp\t+\tp\t+\t0M\n");
        let out = dir.path().join("edges.txt");

        let mut ctx = BuildContext::default();
        generate_edgelist(&gfa, &out, &mut ctx).unwrap();

        assert_eq!(fs::read_to_string(&out).unwrap(), "0 0\n");
        assert_eq!(ctx.n_nodes, 1);
    }

    /// Test 3.3: Two builds over the same bytes intern identically.
    #[test]
    fn test_interning_determinism() {
        let dir = tempdir().unwrap();
        let gfa = write_file(
            dir.path(),
            "g.gfa",
            "L\tc\t+\ta\t+\t0M\nL\tb\t+\tc\t+\t0M\nL\ta\t+\tb\t+\t0M\n",
        );

        let mut ctx1 = BuildContext::default();
        generate_edgelist(&gfa, &dir.path().join("e1.txt"), &mut ctx1).unwrap();
        let mut ctx2 = BuildContext::default();
        generate_edgelist(&gfa, &dir.path().join("e2.txt"), &mut ctx2).unwrap();

        assert_eq!(ctx1.node_ids, ctx2.node_ids);
    }

    /// Test 3.4: The external sort orders numerically and collapses
    /// duplicate canonical edges.
    #[test]
    fn test_run_sort_dedup() {
        let dir = tempdir().unwrap();
        let unsorted = write_file(
            dir.path(),
            "edges.txt",
            "10 12\n2 5\n10 12\n0 1\n2 5\n0 10\n",
        );
        let sorted = dir.path().join("sorted.txt");

        run_sort(&unsorted, &sorted, &dir.path().to_path_buf()).unwrap();

        assert_eq!(
            fs::read_to_string(&sorted).unwrap(),
            "0 1\n0 10\n2 5\n10 12\n"
        );
    }

    /// Test 3.5: Edge-list line parsing accepts blank lines and rejects
    /// garbage.
    #[test]
    fn test_parse_edge_line() {
        assert_eq!(parse_edge_line("3 7").unwrap(), Some((3, 7)));
        assert_eq!(parse_edge_line("").unwrap(), None);
        assert!(parse_edge_line("3").is_err());
        assert!(parse_edge_line("a b").is_err());
    }
}
