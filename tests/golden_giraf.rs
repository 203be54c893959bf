#[path = "common/mod.rs"]
mod common;

use std::sync::Arc;

use common::{assert_snapshot, branch_graph, read};
use simplegraph::io::render_giraf;
use simplegraph::{AlignerConfig, GraphAligner, Scratch};

#[test]
fn branch_graph_alignments_match_golden() {
    let config = AlignerConfig::default().with_kmer_len(8).with_step(1);
    let aligner = GraphAligner::new(Arc::new(branch_graph()), config).expect("aligner builds");

    let reads = [
        read("bubble", b"GATCCGATTACATCAAGTCTGAAGTTGCAA"),
        read("noise", b"CCCCCCCCCCCCCCCCCCCCCCCC"),
    ];
    let records = aligner.align_batch(&reads);
    let records: Vec<_> = records
        .into_iter()
        .map(|r| r.expect("alignment succeeds"))
        .collect();

    assert_snapshot("giraf/branch.giraf", &render_giraf(&records).unwrap());
}
