use std::collections::VecDeque;
use std::io::{self, Read};
use std::path::Path;

use crate::codec::{HeaderCodec, PullOutcome, RecordCodec};
use crate::format::native::NativeCodec;
use crate::header::{self, Header};
use crate::heap::{Heap, RecordSource, SourceOutcome};
use crate::order::OrderMode;
use crate::record::Record;
use crate::region::{self, RegionIndex};
use crate::sink::EmissionSink;

/// One merge input: its reader plus the RG tag that will be injected into
/// every record drawn from it, if RG injection is enabled.
struct FileSource<'a> {
    reader: Box<dyn Read + 'a>,
    codec: NativeCodec,
}

impl<'a> RecordSource for FileSource<'a> {
    fn pull(&mut self) -> io::Result<SourceOutcome> {
        match self.codec.read_record(&mut self.reader)? {
            PullOutcome::Record(record, _) => Ok(SourceOutcome::Record(record)),
            PullOutcome::Eof => Ok(SourceOutcome::Eof),
            PullOutcome::Truncated => Ok(SourceOutcome::Truncated),
        }
    }
}

/// A source backed by records already pulled out of a `RegionIndex` query.
/// Used for the region-filtered merge path: the index itself is dropped
/// once its query result has been collected here (see `indexed_source`),
/// matching C7's "load index, obtain iterator, release index" sequence.
struct IndexedSource {
    records: VecDeque<Record>,
}

impl RecordSource for IndexedSource {
    fn pull(&mut self) -> io::Result<SourceOutcome> {
        match self.records.pop_front() {
            Some(record) => Ok(SourceOutcome::Record(record)),
            None => Ok(SourceOutcome::Eof),
        }
    }
}

/// Reads every record out of one input, building the reference
/// `NaiveRegionIndex` over it, queries the index for `(tid, beg, end)`,
/// and returns a source over just the matching records plus whether the
/// input was truncated while being read in. The index itself does not
/// outlive this function.
fn indexed_source(
    reader: &mut dyn Read,
    tid: i32,
    beg: i32,
    end: i32,
) -> io::Result<(IndexedSource, bool)> {
    let mut codec = NativeCodec::new();
    let mut records = Vec::new();
    let truncated = loop {
        match codec.read_record(reader)? {
            PullOutcome::Record(record, _) => records.push(record),
            PullOutcome::Eof => break false,
            PullOutcome::Truncated => break true,
        }
    };

    let index = region::NaiveRegionIndex::from_records(records);
    let matching: VecDeque<Record> = index.query(tid, beg, end).collect();
    drop(index);

    Ok((IndexedSource { records: matching }, truncated))
}

/// Derives the RG tag injected into records from one input, from the
/// basename of its path: strip a trailing `.bam` suffix, strip any
/// directory prefix.
pub fn rg_from_filename(path: &str) -> String {
    let name = Path::new(path)
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());
    name.strip_suffix(".bam").unwrap_or(&name).to_string()
}

pub struct MergeInput<'a> {
    pub path: String,
    pub reader: Box<dyn Read + 'a>,
}

pub struct MergeOptions {
    pub mode: OrderMode,
    pub inject_rg: bool,
    pub region: Option<String>,
    pub override_header: Option<Header>,
}

/// Opens every input's header, reconciles them, optionally narrows each
/// input to a region, drives the heap merger, and feeds every emitted
/// record (with RG injection applied first, if enabled) to `sink`.
/// Returns any warnings collected along the way (header mismatches
/// downgraded by an active region, and truncated inputs).
pub fn run(
    inputs: Vec<MergeInput<'_>>,
    options: MergeOptions,
    sink: &mut EmissionSink<'_>,
) -> io::Result<(Vec<String>, Header)> {
    let mut warnings = Vec::new();
    let n = inputs.len();

    let mut codec = NativeCodec::new();
    let mut headers = Vec::with_capacity(n);
    let mut paths = Vec::with_capacity(n);
    let mut readers = Vec::with_capacity(n);

    for input in inputs {
        let mut reader = input.reader;
        let header = codec.read_header(&mut reader).map_err(|e| {
            io::Error::new(e.kind(), format!("failed to read header of {}: {}", input.path, e))
        })?;
        headers.push(header);
        paths.push(input.path);
        readers.push(reader);
    }

    let region_active = options.region.is_some();

    let (mut out_header, header_warnings) =
        header::reconcile(&headers, &paths, region_active)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?;
    warnings.extend(header_warnings);

    if let Some(over) = &options.override_header {
        if let Some(w) = header::apply_override(&mut out_header, over, region_active)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?
        {
            warnings.push(w);
        }
    }

    let region_bounds = match &options.region {
        Some(region_str) => Some(
            region::parse_region(&out_header, region_str)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?,
        ),
        None => None,
    };

    let mut sources: Vec<Box<dyn RecordSource>> = Vec::with_capacity(n);
    match region_bounds {
        Some((tid, beg, end)) => {
            for (idx, mut reader) in readers.into_iter().enumerate() {
                let (source, truncated) = indexed_source(&mut reader, tid, beg, end)?;
                if truncated {
                    warnings.push(format!("truncated input: {}", paths[idx]));
                }
                sources.push(Box::new(source));
            }
        }
        None => {
            for reader in readers {
                sources.push(Box::new(FileSource {
                    reader,
                    codec: NativeCodec::new(),
                }));
            }
        }
    }

    let mut heap = Heap::new(options.mode, sources)?;

    for input_idx in heap.truncated_inputs() {
        let msg = format!("truncated input: {}", paths[input_idx]);
        if !warnings.contains(&msg) {
            warnings.push(msg);
        }
    }

    let returned_header = out_header.clone();
    sink.put_header(out_header)?;

    while let Some((record, input_idx)) = heap.pop()? {
        let rg = if options.inject_rg {
            Some(rg_from_filename(&paths[input_idx]))
        } else {
            None
        };
        sink.put_record(record, rg.as_deref())?;
    }

    for input_idx in heap.truncated_inputs() {
        let msg = format!("truncated input: {}", paths[input_idx]);
        if !warnings.contains(&msg) {
            warnings.push(msg);
        }
    }

    Ok((warnings, returned_header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;

    fn encode(records: &[(i32, i32)]) -> Vec<u8> {
        let mut codec = NativeCodec::new();
        let mut buf = Vec::new();
        codec
            .write_header(
                &mut buf,
                &Header {
                    target_names: vec!["chr1".to_string()],
                    target_lengths: vec![1000],
                    text: String::new(),
                },
            )
            .unwrap();
        for &(tid, pos) in records {
            codec
                .write_record(
                    &mut buf,
                    &Record {
                        tid,
                        pos,
                        flag: 0,
                        qname: format!("r{}", pos),
                        payload: vec![],
                    },
                )
                .unwrap();
        }
        buf
    }

    #[test]
    fn rg_from_filename_strips_dir_and_suffix() {
        assert_eq!(rg_from_filename("bar/baz.bam"), "baz");
        assert_eq!(rg_from_filename("foo.bam"), "foo");
    }

    #[test]
    fn merges_two_files_into_sorted_output() {
        let a = encode(&[(0, 1), (0, 5)]);
        let b = encode(&[(0, 2), (0, 7)]);

        let inputs = vec![
            MergeInput { path: "a.bam".to_string(), reader: Box::new(&a[..]) },
            MergeInput { path: "b.bam".to_string(), reader: Box::new(&b[..]) },
        ];

        let mut out: Vec<u8> = Vec::new();
        let mut sink = EmissionSink::new(Box::new(&mut out));

        let (warnings, _header) = run(
            inputs,
            MergeOptions {
                mode: OrderMode::Positional,
                inject_rg: false,
                region: None,
                override_header: None,
            },
            &mut sink,
        )
        .unwrap();
        sink.close().unwrap();

        assert!(warnings.is_empty());

        let mut cursor = &out[..];
        let mut codec = NativeCodec::new();
        codec.read_header(&mut cursor).unwrap();
        let mut positions = Vec::new();
        loop {
            match codec.read_record(&mut cursor).unwrap() {
                PullOutcome::Record(r, _) => positions.push(r.pos),
                PullOutcome::Eof => break,
                PullOutcome::Truncated => panic!("unexpected truncation"),
            }
        }
        assert_eq!(positions, vec![1, 2, 5, 7]);
    }
}
