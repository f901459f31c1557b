use std::io::{self, Write};

use crate::codec::{AuxCodec, AuxValue, HeaderCodec, RecordCodec};
use crate::format::native::{NativeAuxCodec, NativeCodec};
use crate::header::Header;
use crate::observer::{CoverageObserver, FlagObserver, IndexObserver};
use crate::record::Record;

const RG_TAG: [u8; 2] = *b"RG";

/// The single write-out endpoint for both the sort and merge drivers. Owns
/// the destination writer and the reconciled output header, and fans every
/// emitted record to whichever observers are attached, always in the
/// fixed order: index, then flag, then coverage.
pub struct EmissionSink<'a> {
    writer: Box<dyn Write + 'a>,
    codec: NativeCodec,
    aux_codec: NativeAuxCodec,
    offset: u64,
    index_observer: Option<&'a mut dyn IndexObserver>,
    flag_observer: Option<&'a mut dyn FlagObserver>,
    coverage_observer: Option<&'a mut dyn CoverageObserver>,
    header: Option<Header>,
}

impl<'a> EmissionSink<'a> {
    pub fn new(writer: Box<dyn Write + 'a>) -> Self {
        EmissionSink {
            writer,
            codec: NativeCodec::new(),
            aux_codec: NativeAuxCodec,
            offset: 0,
            index_observer: None,
            flag_observer: None,
            coverage_observer: None,
            header: None,
        }
    }

    pub fn with_index_observer(mut self, observer: &'a mut dyn IndexObserver) -> Self {
        self.index_observer = Some(observer);
        self
    }

    pub fn with_flag_observer(mut self, observer: &'a mut dyn FlagObserver) -> Self {
        self.flag_observer = Some(observer);
        self
    }

    pub fn with_coverage_observer(mut self, observer: &'a mut dyn CoverageObserver) -> Self {
        self.coverage_observer = Some(observer);
        self
    }

    pub fn put_header(&mut self, header: Header) -> io::Result<()> {
        self.codec.write_header(&mut self.writer, &header)?;
        self.offset = self.codec.tell(&mut self.writer)?;

        if let Some(observer) = self.index_observer.as_deref_mut() {
            observer.init(header.n_targets(), self.offset);
        }

        self.header = Some(header);
        Ok(())
    }

    /// Writes one record, optionally rewriting its RG tag first, then
    /// feeds every attached observer in emission order: index, flag,
    /// coverage.
    pub fn put_record(&mut self, mut record: Record, inject_rg: Option<&str>) -> io::Result<()> {
        if let Some(rg) = inject_rg {
            self.aux_codec.aux_del(&mut record, RG_TAG);
            self.aux_codec
                .aux_append(&mut record, RG_TAG, AuxValue::Str(rg.to_string()));
        }

        self.codec.write_record(&mut self.writer, &record)?;
        self.offset = self.codec.tell(&mut self.writer)?;

        let rg = match self.aux_codec.aux_get(&record, RG_TAG) {
            Some(AuxValue::Str(s)) => Some(s),
            _ => None,
        };

        if let Some(observer) = self.index_observer.as_deref_mut() {
            observer.step(&record, self.offset);
        }
        if let Some(observer) = self.flag_observer.as_deref_mut() {
            observer.step(rg.as_deref(), &record);
        }
        if let Some(observer) = self.coverage_observer.as_deref_mut() {
            if let Some(header) = &self.header {
                observer.step(rg.as_deref(), header, &record);
            }
        }

        Ok(())
    }

    pub fn close(mut self) -> io::Result<()> {
        if let Some(observer) = self.index_observer.as_deref_mut() {
            observer.finish(self.offset);
        }
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NativeIndexObserver;

    #[test]
    fn header_then_record_order_is_preserved() {
        let mut buf: Vec<u8> = Vec::new();
        let mut index_observer = NativeIndexObserver::new();

        {
            let mut sink = EmissionSink::new(Box::new(&mut buf)).with_index_observer(&mut index_observer);
            sink.put_header(Header::default()).unwrap();
            sink.put_record(
                Record { tid: 0, pos: 1, flag: 0, qname: "r".into(), payload: vec![] },
                None,
            )
            .unwrap();
            sink.close().unwrap();
        }

        assert_eq!(index_observer.entries().len(), 1);
    }

    #[test]
    fn rg_injection_overwrites_existing_tag() {
        let mut buf: Vec<u8> = Vec::new();
        let mut sink = EmissionSink::new(Box::new(&mut buf));
        sink.put_header(Header::default()).unwrap();

        let mut record = Record { tid: 0, pos: 1, flag: 0, qname: "r".into(), payload: vec![] };
        NativeAuxCodec.aux_append(&mut record, RG_TAG, AuxValue::Str("old".into()));
        sink.put_record(record, Some("new")).unwrap();
        sink.close().unwrap();
    }
}
