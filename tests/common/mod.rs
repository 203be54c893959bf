#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use simplegraph::{Graph, Read};

/// Single-node reference used by the scenario and pipeline tests.
pub const REFERENCE: &[u8] = b"TTGACCATGCAGGTACCTAGGATCCGATTACAGGCATTAGCCTAGTTGCA";

/// `a -> b -> {c, d} -> e`, with `c` and `d` sharing no k-mers.
pub const BRANCH_GRAPH: &str = "\
>a
TTGACCATGCAGGTAC
>b:shared backbone
CTAGGATCCGATTACA
>c
GGCATTAGCC
>d
TCAAGTCTGA
>e
AGTTGCAACGTCCATG
a\t1.0\tb
b\t0.5\tc\t0.5\td
c\t1.0\te
d\t1.0\te
";

pub fn single_node_graph() -> Graph {
    let mut builder = Graph::builder();
    builder.add_node("chr", REFERENCE).expect("valid node");
    builder.build().expect("valid graph")
}

pub fn branch_graph() -> Graph {
    Graph::read(BRANCH_GRAPH.as_bytes()).expect("fixture parses")
}

pub fn read(name: &str, sequence: &[u8]) -> Read {
    Read::new(name, sequence, &vec![b'I'; sequence.len()])
}

fn snapshot_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("snapshots")
}

pub fn assert_snapshot(name: &str, actual: &str) {
    let path = snapshot_root().join(name);
    if std::env::var("SIMPLEGRAPH_UPDATE_SNAPSHOTS").is_ok() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create snapshot directory");
        }
        fs::write(&path, actual).expect("write snapshot");
        return;
    }

    let expected =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("snapshot {:?} not found", path));
    if normalize(&expected) != normalize(actual) {
        panic!(
            "Snapshot mismatch for {:?}. Set SIMPLEGRAPH_UPDATE_SNAPSHOTS=1 to regenerate.\nExpected:\n{}\nActual:\n{}",
            path,
            expected,
            actual
        );
    }
}

fn normalize(input: &str) -> String {
    input.replace("\r\n", "\n")
}
