// tests/test_gfa.rs

use gfachunk::gfa::*;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test 2.1: Record dispatch on the leading character.
    #[test]
    fn test_record_type_dispatch() {
        assert_eq!(record_type(b"H\tVN:Z:1.0"), RecordType::Header);
        assert_eq!(record_type(b"S\ta\tACGT"), RecordType::Segment);
        assert_eq!(record_type(b"L\ta\t+\tb\t+\t0M"), RecordType::Link);
        assert_eq!(record_type(b"P\tp1\ta+,b+\t*"), RecordType::Path);
        assert_eq!(record_type(b"W\tsample\t1"), RecordType::Other);
        assert_eq!(record_type(b"# comment"), RecordType::Other);
        assert_eq!(record_type(b""), RecordType::Other);
    }

    /// Test 2.2: Link extraction returns fields 2 and 4 verbatim.
    #[test]
    fn test_extract_l_nodes() {
        let (from, to) = extract_l_nodes(b"L\tnode_a\t+\tnode_b\t-\t12M").unwrap();
        assert_eq!(from, b"node_a");
        assert_eq!(to, b"node_b");

        // The overlap may be the last field with nothing after it.
        let (from, to) = extract_l_nodes(b"L\t17\t-\t42\t+\t*").unwrap();
        assert_eq!(from, b"17");
        assert_eq!(to, b"42");
    }

    /// Test 2.3: A Link missing one of its required tabs is a parse error
    /// that names the line.
    #[test]
    fn test_extract_l_nodes_missing_tab() {
        let err = extract_l_nodes(b"L\ta\t+\tb").unwrap_err();
        assert!(err.to_string().contains("L\ta\t+\tb"));

        assert!(extract_l_nodes(b"L").is_err());
        assert!(extract_l_nodes(b"Lab").is_err());
    }

    /// Test 2.4: Segment extraction returns the identifier and the sequence,
    /// with the sequence ending at a tab or end of line.
    #[test]
    fn test_extract_s_node() {
        let (id, seq) = extract_s_node(b"S\tchr1_seg\tACGTACGT").unwrap();
        assert_eq!(id, b"chr1_seg");
        assert_eq!(seq, b"ACGTACGT");

        let (id, seq) = extract_s_node(b"S\ts1\tTTT\tLN:i:3").unwrap();
        assert_eq!(id, b"s1");
        assert_eq!(seq, b"TTT");
    }

    /// Test 2.5: The id-only Segment fast path agrees with the full parser.
    #[test]
    fn test_extract_s_node_id() {
        assert_eq!(extract_s_node_id(b"S\tabc\tACGT").unwrap(), b"abc");
        assert!(extract_s_node_id(b"S\tabc").is_err());
        assert!(extract_s_node(b"S\tabc").is_err());
    }

    /// Test 2.6: Path extraction returns the name and the node tokens.
    #[test]
    fn test_extract_p_path() {
        let (name, nodes) = extract_p_path(b"P\tsample#1\ta+,b-,c+\t4M,2M").unwrap();
        assert_eq!(name, b"sample#1");
        assert_eq!(nodes, vec![&b"a+"[..], &b"b-"[..], &b"c+"[..]]);

        assert!(extract_p_path(b"P\tsample\ta+,b-").is_err());
    }
}
