//! SAM/BAM projection of graph alignments.
//!
//! Every node becomes one reference sequence (`@SQ`, in node id order). A
//! record is placed on its first path node at the path start offset; `=` and
//! `X` are folded into `M`.

use std::io::{self, Write};
use std::path::Path;

use rust_htslib::bam::{
    self,
    header::{Header, HeaderRecord},
    record::{Aux, Cigar, CigarString},
};
use thiserror::Error;

use crate::graph::{Graph, NodeId};
use crate::types::{AlignmentRecord, CigarOp, CigarOpKind};

/// Segment unmapped.
pub const FLAG_UNMAPPED: u16 = 0x4;
/// Sequence reverse complemented.
pub const FLAG_REVERSE: u16 = 0x10;

/// Failure while writing SAM or BAM.
#[derive(Debug, Error)]
pub enum SamError {
    /// Text output failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// htslib rejected a header or record.
    #[error("htslib error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    /// Record placed on a node the graph does not have.
    #[error("record references unknown node {0}")]
    UnknownNode(NodeId),
}

/// Linear coordinates of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamPlacement {
    /// FLAG field.
    pub flag: u16,
    /// Reference index (node id), `None` when unmapped.
    pub tid: Option<NodeId>,
    /// 0-based leftmost position.
    pub pos: usize,
    /// Operations with `=`/`X` folded into `M`.
    pub cigar: Vec<(char, u32)>,
}

/// Project `record` onto the linear coordinates of its first node.
pub fn project(record: &AlignmentRecord) -> SamPlacement {
    let Some(&first) = record.path.nodes.first() else {
        return SamPlacement {
            flag: FLAG_UNMAPPED,
            tid: None,
            pos: 0,
            cigar: Vec::new(),
        };
    };
    let mut flag = 0;
    if record.strand.is_reverse() {
        flag |= FLAG_REVERSE;
    }
    SamPlacement {
        flag,
        tid: Some(first),
        pos: record.path.start,
        cigar: fold_cigar(&record.cigar),
    }
}

fn fold_cigar(ops: &[CigarOp]) -> Vec<(char, u32)> {
    let mut out: Vec<(char, u32)> = Vec::with_capacity(ops.len());
    for op in ops {
        let code = match op.kind {
            CigarOpKind::Match | CigarOpKind::Mismatch => 'M',
            CigarOpKind::Insertion => 'I',
            CigarOpKind::Deletion => 'D',
            CigarOpKind::SoftClip => 'S',
        };
        match out.last_mut() {
            Some((last, len)) if *last == code => *len += op.len,
            _ => out.push((code, op.len)),
        }
    }
    out
}

/// Text SAM writer.
#[derive(Debug)]
pub struct SamWriter<'g, W: Write> {
    inner: W,
    graph: &'g Graph,
}

impl<'g, W: Write> SamWriter<'g, W> {
    /// Write the header and return the writer.
    pub fn new(mut inner: W, graph: &'g Graph) -> io::Result<Self> {
        writeln!(inner, "@HD\tVN:1.6\tSO:unknown")?;
        for node in graph.nodes() {
            writeln!(inner, "@SQ\tSN:{}\tLN:{}", node.name(), node.len())?;
        }
        writeln!(
            inner,
            "@PG\tID:simplegraph\tPN:simplegraph\tVN:{}",
            env!("CARGO_PKG_VERSION")
        )?;
        Ok(Self { inner, graph })
    }

    /// Append one record.
    pub fn write(&mut self, record: &AlignmentRecord) -> Result<(), SamError> {
        let placement = project(record);
        let (rname, pos) = match placement.tid {
            Some(tid) => {
                let node = self.graph.get(tid).ok_or(SamError::UnknownNode(tid))?;
                (node.name(), placement.pos + 1)
            }
            None => ("*", 0),
        };
        let cigar = if placement.cigar.is_empty() {
            "*".to_string()
        } else {
            placement
                .cigar
                .iter()
                .map(|(code, len)| format!("{len}{code}"))
                .collect()
        };
        let mapq = if placement.tid.is_some() { record.mapq } else { 0 };

        write!(
            self.inner,
            "{}\t{}\t{}\t{}\t{}\t{}\t*\t0\t0\t",
            record.name, placement.flag, rname, pos, mapq, cigar
        )?;
        self.inner.write_all(star_if_empty(&record.sequence))?;
        self.inner.write_all(b"\t")?;
        self.inner.write_all(star_if_empty(&record.qualities))?;
        if placement.tid.is_some() {
            write!(self.inner, "\tAS:i:{}", record.score)?;
        }
        for note in &record.notes {
            write!(self.inner, "\t{note}")?;
        }
        self.inner.write_all(b"\n")?;
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Recover the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn star_if_empty(bytes: &[u8]) -> &[u8] {
    if bytes.is_empty() {
        b"*"
    } else {
        bytes
    }
}

/// BAM writer backed by htslib.
pub struct BamWriter {
    writer: bam::Writer,
}

impl std::fmt::Debug for BamWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BamWriter").finish_non_exhaustive()
    }
}

impl BamWriter {
    /// Create `path` with one `@SQ` line per graph node.
    pub fn from_path<P: AsRef<Path>>(path: P, graph: &Graph) -> Result<Self, SamError> {
        let mut header = Header::new();

        let mut hd = HeaderRecord::new(b"HD");
        hd.push_tag(b"VN", &"1.6");
        hd.push_tag(b"SO", &"unknown");
        header.push_record(&hd);

        for node in graph.nodes() {
            let mut sq = HeaderRecord::new(b"SQ");
            sq.push_tag(b"SN", node.name());
            sq.push_tag(b"LN", &(node.len() as i64));
            header.push_record(&sq);
        }

        let mut pg = HeaderRecord::new(b"PG");
        pg.push_tag(b"ID", &"simplegraph");
        pg.push_tag(b"PN", &"simplegraph");
        header.push_record(&pg);

        let writer = bam::Writer::from_path(path, &header, bam::Format::Bam)?;
        Ok(Self { writer })
    }

    /// Append one record.
    pub fn write(&mut self, record: &AlignmentRecord) -> Result<(), SamError> {
        let placement = project(record);
        let cigar = CigarString(
            placement
                .cigar
                .iter()
                .map(|&(code, len)| match code {
                    'I' => Cigar::Ins(len),
                    'D' => Cigar::Del(len),
                    'S' => Cigar::SoftClip(len),
                    _ => Cigar::Match(len),
                })
                .collect(),
        );
        let qualities: Vec<u8> = record
            .qualities
            .iter()
            .map(|&q| q.saturating_sub(33))
            .collect();

        let mut out = bam::Record::new();
        let cigar = placement.tid.is_some().then_some(&cigar);
        out.set(record.name.as_bytes(), cigar, &record.sequence, &qualities);
        out.set_flags(placement.flag);
        match placement.tid {
            Some(tid) => {
                out.set_tid(tid as i32);
                out.set_pos(placement.pos as i64);
                out.set_mapq(record.mapq);
            }
            None => {
                out.set_tid(-1);
                out.set_pos(-1);
                out.set_mapq(0);
            }
        }
        out.set_mtid(-1);
        out.set_mpos(-1);
        out.set_insert_size(0);

        if placement.tid.is_some() {
            out.push_aux(b"AS", Aux::I32(record.score as i32))?;
        }
        for note in &record.notes {
            match parse_note(note) {
                Some((tag, NoteValue::Int(value))) => out.push_aux(tag, Aux::I32(value))?,
                Some((tag, NoteValue::Text(value))) => out.push_aux(tag, Aux::String(value))?,
                None => {}
            }
        }

        self.writer.write(&out)?;
        Ok(())
    }
}

enum NoteValue<'a> {
    Int(i32),
    Text(&'a str),
}

/// Split a `TG:T:value` note into tag and typed value.
fn parse_note(note: &str) -> Option<(&[u8], NoteValue<'_>)> {
    let mut parts = note.splitn(3, ':');
    let tag = parts.next()?;
    let kind = parts.next()?;
    let value = parts.next()?;
    if tag.len() != 2 {
        return None;
    }
    match kind {
        "i" => value.parse().ok().map(|v| (tag.as_bytes(), NoteValue::Int(v))),
        "Z" => Some((tag.as_bytes(), NoteValue::Text(value))),
        _ => None,
    }
}
