//! A small, self-contained binary container used by this crate's reference
//! codec. It is deliberately not BAM-compatible: its only job is to give
//! the sort/merge engine (and its tests) something real to read, write,
//! and round-trip. Swapping in a production BAM/CRAM codec means
//! implementing `RecordCodec`/`HeaderCodec`/`AuxCodec` against the real
//! wire format; nothing in `order`, `heap`, `run_generator`, `sort_driver`
//! or `merge_driver` depends on this module.

use std::cell::Cell;
use std::io::{self, Read, Write};

use crate::codec::{AuxCodec, AuxValue, HeaderCodec, PullOutcome, RecordCodec};
use crate::header::Header;
use crate::record::Record;

const MAGIC: &[u8; 4] = b"ALN1";

/// `bytes_written` tracks the running output offset across every
/// `write_header`/`write_record` call made through this instance, so
/// `tell` can answer without the underlying writer supporting `Seek`
/// (stdout and gzip-wrapped writers don't).
#[derive(Debug, Default)]
pub struct NativeCodec {
    bytes_written: Cell<u64>,
}

impl NativeCodec {
    pub fn new() -> Self {
        NativeCodec::default()
    }
}

fn read_exact_or_eof(input: &mut dyn Read, buf: &mut [u8]) -> io::Result<bool> {
    let mut read_total = 0;
    while read_total < buf.len() {
        match input.read(&mut buf[read_total..]) {
            Ok(0) => break,
            Ok(n) => read_total += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    if read_total == 0 {
        Ok(false)
    } else if read_total == buf.len() {
        Ok(true)
    } else {
        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "truncated record",
        ))
    }
}

impl HeaderCodec for NativeCodec {
    fn read_header(&mut self, input: &mut dyn Read) -> io::Result<Header> {
        let mut magic = [0u8; 4];
        input.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
        }

        let n_targets = read_u32(input)?;
        let mut target_names = Vec::with_capacity(n_targets as usize);
        let mut target_lengths = Vec::with_capacity(n_targets as usize);

        for _ in 0..n_targets {
            let name_len = read_u16(input)? as usize;
            let mut name_bytes = vec![0u8; name_len];
            input.read_exact(&mut name_bytes)?;
            let name = String::from_utf8(name_bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let length = read_i32(input)?;
            target_names.push(name);
            target_lengths.push(length);
        }

        let text_len = read_u32(input)? as usize;
        let mut text_bytes = vec![0u8; text_len];
        input.read_exact(&mut text_bytes)?;
        let text =
            String::from_utf8(text_bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok(Header {
            target_names,
            target_lengths,
            text,
        })
    }

    fn write_header(&mut self, output: &mut dyn Write, header: &Header) -> io::Result<()> {
        output.write_all(MAGIC)?;
        write_u32(output, header.target_names.len() as u32)?;

        let mut size = 4 + 4u64;
        for (name, length) in header.target_names.iter().zip(header.target_lengths.iter()) {
            write_u16(output, name.len() as u16)?;
            output.write_all(name.as_bytes())?;
            write_i32(output, *length)?;
            size += 2 + name.len() as u64 + 4;
        }

        write_u32(output, header.text.len() as u32)?;
        output.write_all(header.text.as_bytes())?;
        size += 4 + header.text.len() as u64;

        self.bytes_written.set(self.bytes_written.get() + size);
        Ok(())
    }
}

impl RecordCodec for NativeCodec {
    fn read_record(&mut self, input: &mut dyn Read) -> io::Result<PullOutcome> {
        let mut tid_buf = [0u8; 4];
        if !read_exact_or_eof(input, &mut tid_buf)? {
            return Ok(PullOutcome::Eof);
        }

        let result = (|| -> io::Result<Record> {
            let tid = i32::from_le_bytes(tid_buf);
            let pos = read_i32(input)?;
            let flag = read_u16(input)?;
            let qname_len = read_u16(input)? as usize;
            let mut qname_bytes = vec![0u8; qname_len];
            input.read_exact(&mut qname_bytes)?;
            let qname = String::from_utf8(qname_bytes)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let payload_len = read_u32(input)? as usize;
            let mut payload = vec![0u8; payload_len];
            input.read_exact(&mut payload)?;

            Ok(Record {
                tid,
                pos,
                flag,
                qname,
                payload,
            })
        })();

        match result {
            Ok(record) => {
                let bytes_read = 4 + 4 + 2 + 2 + record.qname.len() as u64 + 4 + record.payload.len() as u64;
                Ok(PullOutcome::Record(record, bytes_read))
            }
            Err(ref e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(PullOutcome::Truncated),
            Err(e) => Err(e),
        }
    }

    fn write_record(&mut self, output: &mut dyn Write, record: &Record) -> io::Result<()> {
        write_i32(output, record.tid)?;
        write_i32(output, record.pos)?;
        write_u16(output, record.flag)?;
        write_u16(output, record.qname.len() as u16)?;
        output.write_all(record.qname.as_bytes())?;
        write_u32(output, record.payload.len() as u32)?;
        output.write_all(&record.payload)?;

        let size = 4 + 4 + 2 + 2 + record.qname.len() as u64 + 4 + record.payload.len() as u64;
        self.bytes_written.set(self.bytes_written.get() + size);
        Ok(())
    }

    fn tell(&self, _output: &mut dyn Write) -> io::Result<u64> {
        Ok(self.bytes_written.get())
    }
}

/// Aux tags are stored back-to-back in `Record::payload` as
/// `tag(2) type(1 'Z'|'i') ...value`, `Z` values null-terminated and `i`
/// values 8 bytes little-endian.
pub struct NativeAuxCodec;

impl AuxCodec for NativeAuxCodec {
    fn aux_get(&self, record: &Record, tag: [u8; 2]) -> Option<AuxValue> {
        let mut i = 0;
        let data = &record.payload;
        while i + 3 <= data.len() {
            let this_tag = [data[i], data[i + 1]];
            let kind = data[i + 2];
            i += 3;
            match kind {
                b'Z' => {
                    let end = data[i..].iter().position(|&b| b == 0)? + i;
                    let value = std::str::from_utf8(&data[i..end]).ok()?.to_string();
                    if this_tag == tag {
                        return Some(AuxValue::Str(value));
                    }
                    i = end + 1;
                }
                b'i' => {
                    if i + 8 > data.len() {
                        return None;
                    }
                    let mut buf = [0u8; 8];
                    buf.copy_from_slice(&data[i..i + 8]);
                    let value = i64::from_le_bytes(buf);
                    if this_tag == tag {
                        return Some(AuxValue::Int(value));
                    }
                    i += 8;
                }
                _ => return None,
            }
        }
        None
    }

    fn aux_del(&self, record: &mut Record, tag: [u8; 2]) {
        let data = &mut record.payload;
        let mut i = 0;
        while i + 3 <= data.len() {
            let this_tag = [data[i], data[i + 1]];
            let kind = data[i + 2];
            let entry_start = i;
            let entry_end;
            match kind {
                b'Z' => {
                    let Some(rel_end) = data[i + 3..].iter().position(|&b| b == 0) else {
                        return;
                    };
                    entry_end = i + 3 + rel_end + 1;
                }
                b'i' => {
                    if i + 11 > data.len() {
                        return;
                    }
                    entry_end = i + 11;
                }
                _ => return,
            }

            if this_tag == tag {
                data.drain(entry_start..entry_end);
                return;
            }
            i = entry_end;
        }
    }

    fn aux_append(&self, record: &mut Record, tag: [u8; 2], value: AuxValue) {
        record.payload.push(tag[0]);
        record.payload.push(tag[1]);
        match value {
            AuxValue::Str(s) => {
                record.payload.push(b'Z');
                record.payload.extend_from_slice(s.as_bytes());
                record.payload.push(0);
            }
            AuxValue::Int(n) => {
                record.payload.push(b'i');
                record.payload.extend_from_slice(&n.to_le_bytes());
            }
        }
    }
}

fn read_u16(input: &mut dyn Read) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    input.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32(input: &mut dyn Read) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_i32(input: &mut dyn Read) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn write_u16(output: &mut dyn Write, v: u16) -> io::Result<()> {
    output.write_all(&v.to_le_bytes())
}

fn write_u32(output: &mut dyn Write, v: u32) -> io::Result<()> {
    output.write_all(&v.to_le_bytes())
}

fn write_i32(output: &mut dyn Write, v: i32) -> io::Result<()> {
    output.write_all(&v.to_le_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> Header {
        Header {
            target_names: vec!["chr1".to_string(), "chr2".to_string()],
            target_lengths: vec![1000, 2000],
            text: "@HD\tVN:1.6\n".to_string(),
        }
    }

    fn sample_record() -> Record {
        Record {
            tid: 0,
            pos: 42,
            flag: 0,
            qname: "read1".to_string(),
            payload: Vec::new(),
        }
    }

    #[test]
    fn header_round_trips() {
        let mut codec = NativeCodec::new();
        let mut buf = Vec::new();
        codec.write_header(&mut buf, &sample_header()).unwrap();
        let mut cursor = &buf[..];
        let decoded = codec.read_header(&mut cursor).unwrap();
        assert_eq!(decoded.target_names, sample_header().target_names);
        assert_eq!(decoded.text, sample_header().text);
    }

    #[test]
    fn record_round_trips() {
        let mut codec = NativeCodec::new();
        let mut buf = Vec::new();
        codec.write_record(&mut buf, &sample_record()).unwrap();
        let mut cursor = &buf[..];
        match codec.read_record(&mut cursor).unwrap() {
            PullOutcome::Record(r, bytes_read) => {
                assert_eq!(r.qname, "read1");
                assert_eq!(r.pos, 42);
                assert_eq!(bytes_read as usize, buf.len());
            }
            _ => panic!("expected a record"),
        }
    }

    #[test]
    fn eof_on_empty_input() {
        let mut codec = NativeCodec::new();
        let mut cursor: &[u8] = &[];
        match codec.read_record(&mut cursor).unwrap() {
            PullOutcome::Eof => (),
            _ => panic!("expected eof"),
        }
    }

    #[test]
    fn truncated_record_is_reported() {
        let mut codec = NativeCodec::new();
        let mut buf = Vec::new();
        codec.write_record(&mut buf, &sample_record()).unwrap();
        buf.truncate(buf.len() - 2);
        let mut cursor = &buf[..];
        match codec.read_record(&mut cursor).unwrap() {
            PullOutcome::Truncated => (),
            _ => panic!("expected truncation"),
        }
    }

    #[test]
    fn aux_append_get_del_round_trip() {
        let aux = NativeAuxCodec;
        let mut record = sample_record();
        aux.aux_append(&mut record, *b"RG", AuxValue::Str("sample1".to_string()));
        assert_eq!(
            aux.aux_get(&record, *b"RG"),
            Some(AuxValue::Str("sample1".to_string()))
        );
        aux.aux_del(&mut record, *b"RG");
        assert_eq!(aux.aux_get(&record, *b"RG"), None);
    }

    #[test]
    fn aux_del_preserves_other_tags() {
        let aux = NativeAuxCodec;
        let mut record = sample_record();
        aux.aux_append(&mut record, *b"RG", AuxValue::Str("a".to_string()));
        aux.aux_append(&mut record, *b"NM", AuxValue::Int(3));
        aux.aux_del(&mut record, *b"RG");
        assert_eq!(aux.aux_get(&record, *b"NM"), Some(AuxValue::Int(3)));
    }
}
