//! Read input and alignment output formats.

mod fastq;
mod giraf;
mod sam;

pub use fastq::{FastqError, FastqReads};
pub use giraf::{render_giraf, write_giraf, write_giraf_record, GirafWriter};
pub use sam::{project, BamWriter, SamError, SamPlacement, SamWriter, FLAG_REVERSE, FLAG_UNMAPPED};
