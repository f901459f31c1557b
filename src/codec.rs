use std::io;

use crate::header::Header;
use crate::record::Record;

/// What happened on an attempt to pull one record from an input.
pub enum PullOutcome {
    Record(Record, u64),
    Eof,
    /// The codec detected a corrupt or incomplete record. Callers treat
    /// this the same as `Eof` for that input, but log a warning first.
    Truncated,
}

/// Reads and writes the fixed core plus opaque payload of a record.
/// `bytes_read`/`tell` let callers account memory and offsets without the
/// engine itself knowing the wire format.
pub trait RecordCodec {
    fn read_record(&mut self, input: &mut dyn io::Read) -> io::Result<PullOutcome>;
    fn write_record(&mut self, output: &mut dyn io::Write, record: &Record) -> io::Result<()>;

    /// Current output byte offset, i.e. the position the next write will
    /// land at. Used by the emission sink to hand the index observer real
    /// file offsets without the engine itself tracking wire-format sizes.
    fn tell(&self, output: &mut dyn io::Write) -> io::Result<u64>;
}

/// Reads and writes the header (reference dictionary + free text).
pub trait HeaderCodec {
    fn read_header(&mut self, input: &mut dyn io::Read) -> io::Result<Header>;
    fn write_header(&mut self, output: &mut dyn io::Write, header: &Header) -> io::Result<()>;
}

/// A single auxiliary tag value. Only the subset of BAM's aux type tags
/// needed by RG injection and the reference observers is modeled.
#[derive(Debug, Clone, PartialEq)]
pub enum AuxValue {
    Str(String),
    Int(i64),
}

/// Reads/mutates the opaque aux bytes carried by a record's payload.
pub trait AuxCodec {
    fn aux_get(&self, record: &Record, tag: [u8; 2]) -> Option<AuxValue>;
    fn aux_del(&self, record: &mut Record, tag: [u8; 2]);
    fn aux_append(&self, record: &mut Record, tag: [u8; 2], value: AuxValue);
}
