use proptest::prelude::*;
use simplegraph::kmer::{decode_kmer, encode_kmer, reverse_complement};
use simplegraph::seed::{find_seeds, rank_chains, SeedScratch};
use simplegraph::{Graph, KmerIndex, Strand};

fn dna(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(b"ACGT".to_vec()), len)
}

/// A chain of 2-4 nodes with an optional skip edge from the first node to
/// the last, so paths can branch.
fn small_graph() -> impl Strategy<Value = Graph> {
    (prop::collection::vec(dna(4..20), 2..5), any::<bool>()).prop_map(|(seqs, skip)| {
        let mut builder = Graph::builder();
        let ids: Vec<_> = seqs
            .iter()
            .enumerate()
            .map(|(idx, seq)| builder.add_node(format!("n{idx}"), seq).unwrap())
            .collect();
        for pair in ids.windows(2) {
            builder.add_edge(pair[0], pair[1], 1.0).unwrap();
        }
        if skip && ids.len() > 2 {
            builder.add_edge(ids[0], ids[ids.len() - 1], 0.5).unwrap();
        }
        builder.build().unwrap()
    })
}

proptest! {
    #[test]
    fn kmer_codec_round_trips(seq in dna(1..33)) {
        let key = encode_kmer(&seq).unwrap();
        prop_assert_eq!(decode_kmer(key, seq.len()), seq);
    }

    #[test]
    fn reverse_complement_is_an_involution(seq in dna(0..64)) {
        prop_assert_eq!(reverse_complement(&reverse_complement(&seq)), seq);
    }

    #[test]
    fn seeds_match_the_graph_and_follow_edges(
        graph in small_graph(),
        read in dna(8..40),
        k in 4usize..8,
    ) {
        let index = KmerIndex::build(&graph, k, 1).unwrap();
        let mut scratch = SeedScratch::new();
        find_seeds(&graph, &index, &read, 16, &mut scratch).unwrap();
        rank_chains(scratch.buffer_mut());

        let reverse = reverse_complement(&read);
        let buffer = scratch.buffer();
        for chain in buffer.chains() {
            let oriented = match chain.strand {
                Strand::Forward => &read,
                Strand::Reverse => &reverse,
            };
            let segments = buffer.segments_of(chain);
            prop_assert!(!segments.is_empty());
            let mut total = 0;
            for seg in segments {
                let node = graph.node(seg.node);
                let target = &node.sequence()[seg.target_start as usize..seg.target_end() as usize];
                let query = &oriented[seg.query_start as usize..seg.query_end() as usize];
                prop_assert_eq!(target, query);
                total += seg.len;
            }
            prop_assert_eq!(total, chain.total_len);
            for pair in segments.windows(2) {
                prop_assert!(graph.has_edge(pair[0].node, pair[1].node));
                prop_assert_eq!(pair[0].target_end() as usize, graph.node(pair[0].node).len());
                prop_assert_eq!(pair[1].target_start, 0);
                prop_assert_eq!(pair[0].query_end(), pair[1].query_start);
            }
        }
    }

    #[test]
    fn ranking_is_idempotent(graph in small_graph(), read in dna(8..40)) {
        let index = KmerIndex::build(&graph, 5, 1).unwrap();
        let mut scratch = SeedScratch::new();
        find_seeds(&graph, &index, &read, 16, &mut scratch).unwrap();
        rank_chains(scratch.buffer_mut());
        let once: Vec<_> = scratch.buffer().chains().to_vec();
        rank_chains(scratch.buffer_mut());
        prop_assert_eq!(scratch.buffer().chains().to_vec(), once.clone());
        for pair in once.windows(2) {
            prop_assert!(pair[0].total_len >= pair[1].total_len);
        }
    }
}
