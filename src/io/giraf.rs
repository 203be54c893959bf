use std::io::{self, Write};

use crate::types::{cigar_string, AlignmentRecord};

/// Write one tab-separated GIRAF line for `record`.
///
/// Columns: name, query start, query end, strand, path, cigar, score, mapq,
/// sequence, qualities, then any notes.
pub fn write_giraf_record<W: Write>(writer: &mut W, record: &AlignmentRecord) -> io::Result<()> {
    write!(
        writer,
        "{name}\t{qstart}\t{qend}\t{strand}\t{path}\t{cigar}\t{score}\t{mapq}\t",
        name = record.name,
        qstart = record.query_start,
        qend = record.query_end,
        strand = record.strand.symbol(),
        path = record.path,
        cigar = cigar_string(&record.cigar),
        score = record.score,
        mapq = record.mapq,
    )?;
    writer.write_all(or_star(&record.sequence))?;
    writer.write_all(b"\t")?;
    writer.write_all(or_star(&record.qualities))?;
    for note in &record.notes {
        write!(writer, "\t{note}")?;
    }
    writer.write_all(b"\n")
}

/// Write every record and flush.
pub fn write_giraf<W: Write>(writer: &mut W, records: &[AlignmentRecord]) -> io::Result<()> {
    for record in records {
        write_giraf_record(writer, record)?;
    }
    writer.flush()
}

/// Render records into a string (used for snapshots).
pub fn render_giraf(records: &[AlignmentRecord]) -> io::Result<String> {
    let mut buffer = Vec::new();
    write_giraf(&mut buffer, records)?;
    String::from_utf8(buffer).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn or_star(bytes: &[u8]) -> &[u8] {
    if bytes.is_empty() {
        b"*"
    } else {
        bytes
    }
}

/// Streaming GIRAF writer over any byte sink.
#[derive(Debug)]
pub struct GirafWriter<W: Write> {
    inner: W,
    written: usize,
}

impl<W: Write> GirafWriter<W> {
    /// Wrap `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Append one record.
    pub fn write(&mut self, record: &AlignmentRecord) -> io::Result<()> {
        write_giraf_record(&mut self.inner, record)?;
        self.written += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn written(&self) -> usize {
        self.written
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
