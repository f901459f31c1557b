use std::fmt;

use crate::header::Header;
use crate::record::Record;

#[derive(Debug)]
pub struct RegionError(pub String);

impl fmt::Display for RegionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid region: {}", self.0)
    }
}

impl std::error::Error for RegionError {}

/// Parses a `chr`, `chr:beg`, or `chr:beg-end` region string against a
/// reconciled header, returning `(tid, beg, end)` with 0-based, half-open
/// coordinates. `beg`/`end` default to the full length of the named
/// reference when omitted.
pub fn parse_region(header: &Header, region: &str) -> Result<(i32, i32, i32), RegionError> {
    let (name, range) = match region.split_once(':') {
        Some((name, range)) => (name, Some(range)),
        None => (region, None),
    };

    let tid = header
        .target_names
        .iter()
        .position(|n| n == name)
        .ok_or_else(|| RegionError(format!("unknown reference '{}'", name)))? as i32;

    let target_len = header.target_lengths[tid as usize];

    let (beg, end) = match range {
        None => (0, target_len),
        Some(range) => match range.split_once('-') {
            Some((beg, end)) => {
                let beg: i32 = beg
                    .parse()
                    .map_err(|_| RegionError(format!("bad start coordinate '{}'", beg)))?;
                let end: i32 = end
                    .parse()
                    .map_err(|_| RegionError(format!("bad end coordinate '{}'", end)))?;
                (beg - 1, end)
            }
            None => {
                let beg: i32 = range
                    .parse()
                    .map_err(|_| RegionError(format!("bad start coordinate '{}'", range)))?;
                (beg - 1, target_len)
            }
        },
    };

    if beg < 0 || end < beg {
        return Err(RegionError(format!("invalid range {}-{}", beg + 1, end)));
    }

    Ok((tid, beg, end))
}

/// An index over a sorted record stream, used to produce a filtered
/// iterator without scanning records that fall outside the queried region.
/// This reference implementation is a naive linear scan held entirely in
/// memory; it stands in for a real offset-based index (e.g. BAI/CSI) at
/// the seam `merge_driver` actually depends on.
pub trait RegionIndex {
    fn query<'a>(
        &'a self,
        tid: i32,
        beg: i32,
        end: i32,
    ) -> Box<dyn Iterator<Item = Record> + 'a>;
}

pub struct NaiveRegionIndex {
    records: Vec<Record>,
}

impl NaiveRegionIndex {
    pub fn from_records(records: Vec<Record>) -> Self {
        NaiveRegionIndex { records }
    }
}

fn overlaps(record: &Record, tid: i32, beg: i32, end: i32) -> bool {
    record.tid == tid && record.pos < end && record.pos >= beg
}

impl RegionIndex for NaiveRegionIndex {
    fn query<'a>(&'a self, tid: i32, beg: i32, end: i32) -> Box<dyn Iterator<Item = Record> + 'a> {
        Box::new(
            self.records
                .iter()
                .filter(move |r| overlaps(r, tid, beg, end))
                .cloned(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            target_names: vec!["chr1".to_string(), "chr2".to_string()],
            target_lengths: vec![1000, 2000],
            text: String::new(),
        }
    }

    #[test]
    fn parses_full_region() {
        let (tid, beg, end) = parse_region(&header(), "chr1").unwrap();
        assert_eq!((tid, beg, end), (0, 0, 1000));
    }

    #[test]
    fn parses_bounded_region() {
        let (tid, beg, end) = parse_region(&header(), "chr2:100-200").unwrap();
        assert_eq!((tid, beg, end), (1, 99, 200));
    }

    #[test]
    fn unknown_reference_errors() {
        assert!(parse_region(&header(), "chrX:1-10").is_err());
    }

    #[test]
    fn naive_index_filters_by_overlap() {
        let records = vec![
            Record { tid: 0, pos: 50, flag: 0, qname: "a".into(), payload: vec![] },
            Record { tid: 0, pos: 500, flag: 0, qname: "b".into(), payload: vec![] },
            Record { tid: 1, pos: 50, flag: 0, qname: "c".into(), payload: vec![] },
        ];
        let index = NaiveRegionIndex::from_records(records);
        let hits: Vec<_> = index.query(0, 0, 100).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].qname, "a");
    }
}
