use std::collections::BTreeMap;
use std::io::{self, Write};

use crate::header::Header;
use crate::record::{Record, FLAG_PAIRED, FLAG_REVERSE};

/// Tallies per-read-group flag statistics. Fed every record the record
/// writer is fed, in emission order.
pub trait FlagObserver {
    fn step(&mut self, rg: Option<&str>, record: &Record);
    fn print(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// Accumulates a coarse per-reference coverage histogram.
pub trait CoverageObserver {
    fn step(&mut self, rg: Option<&str>, header: &Header, record: &Record);
    fn print(&self, out: &mut dyn Write, header: &Header) -> io::Result<()>;
}

/// Builds a positional index mapping record boundaries to file offsets,
/// keyed by the order records were actually emitted in.
pub trait IndexObserver {
    fn init(&mut self, n_targets: usize, first_offset: u64);
    fn step(&mut self, record: &Record, end_offset: u64);
    fn finish(&mut self, final_offset: u64);
}

#[derive(Debug, Default)]
struct FlagTally {
    total: u64,
    mapped: u64,
    paired: u64,
    reverse: u64,
}

#[derive(Debug, Default)]
pub struct NativeFlagObserver {
    by_rg: BTreeMap<String, FlagTally>,
}

impl NativeFlagObserver {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FlagObserver for NativeFlagObserver {
    fn step(&mut self, rg: Option<&str>, record: &Record) {
        let tally = self
            .by_rg
            .entry(rg.unwrap_or("").to_string())
            .or_default();
        tally.total += 1;
        if !record.is_unmapped() {
            tally.mapped += 1;
        }
        if record.is_paired() {
            tally.paired += 1;
        }
        if record.flag & FLAG_REVERSE != 0 {
            tally.reverse += 1;
        }
    }

    fn print(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut buf = itoa::Buffer::new();
        for (rg, tally) in &self.by_rg {
            out.write_all(rg.as_bytes())?;
            out.write_all(b"\ttotal=")?;
            out.write_all(buf.format(tally.total).as_bytes())?;
            out.write_all(b"\tmapped=")?;
            out.write_all(buf.format(tally.mapped).as_bytes())?;
            out.write_all(b"\tpaired=")?;
            out.write_all(buf.format(tally.paired).as_bytes())?;
            out.write_all(b"\treverse=")?;
            out.write_all(buf.format(tally.reverse).as_bytes())?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }
}

/// Counts records overlapping each reference, bucketed by a fixed-width
/// window. Reference only, not base-level pileup depth.
#[derive(Debug)]
pub struct NativeCoverageObserver {
    window: i32,
    by_rg: BTreeMap<String, BTreeMap<(i32, i32), u64>>,
}

impl NativeCoverageObserver {
    pub fn new(window: i32) -> Self {
        NativeCoverageObserver {
            window,
            by_rg: BTreeMap::new(),
        }
    }
}

impl CoverageObserver for NativeCoverageObserver {
    fn step(&mut self, rg: Option<&str>, _header: &Header, record: &Record) {
        if record.is_unmapped() {
            return;
        }
        let bucket = record.pos / self.window;
        *self
            .by_rg
            .entry(rg.unwrap_or("").to_string())
            .or_default()
            .entry((record.tid, bucket))
            .or_insert(0) += 1;
    }

    fn print(&self, out: &mut dyn Write, header: &Header) -> io::Result<()> {
        let mut buf = itoa::Buffer::new();
        for (rg, buckets) in &self.by_rg {
            for (&(tid, bucket), count) in buckets {
                let name = header
                    .target_names
                    .get(tid as usize)
                    .map(String::as_str)
                    .unwrap_or("*");
                out.write_all(rg.as_bytes())?;
                out.write_all(b"\t")?;
                out.write_all(name.as_bytes())?;
                out.write_all(b"\t")?;
                out.write_all(buf.format(bucket * self.window).as_bytes())?;
                out.write_all(b"\t")?;
                out.write_all(buf.format(*count).as_bytes())?;
                out.write_all(b"\n")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct NativeIndexObserver {
    first_offset: u64,
    n_targets: usize,
    entries: Vec<(i32, i32, u64)>,
}

impl NativeIndexObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[(i32, i32, u64)] {
        &self.entries
    }
}

impl IndexObserver for NativeIndexObserver {
    fn init(&mut self, n_targets: usize, first_offset: u64) {
        self.n_targets = n_targets;
        self.first_offset = first_offset;
    }

    fn step(&mut self, record: &Record, end_offset: u64) {
        self.entries.push((record.tid, record.pos, end_offset));
    }

    fn finish(&mut self, _final_offset: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(tid: i32, pos: i32, flag: u16) -> Record {
        Record { tid, pos, flag, qname: "r".into(), payload: vec![] }
    }

    #[test]
    fn flag_observer_tallies_per_rg() {
        let mut obs = NativeFlagObserver::new();
        obs.step(Some("rg1"), &rec(0, 10, FLAG_PAIRED));
        obs.step(Some("rg1"), &rec(0, 20, 0));
        obs.step(Some("rg2"), &rec(-1, -1, 0));

        assert_eq!(obs.by_rg["rg1"].total, 2);
        assert_eq!(obs.by_rg["rg1"].paired, 1);
        assert_eq!(obs.by_rg["rg2"].mapped, 0);
    }

    #[test]
    fn index_observer_records_in_emission_order() {
        let mut obs = NativeIndexObserver::new();
        obs.init(1, 0);
        obs.step(&rec(0, 10, 0), 40);
        obs.step(&rec(0, 20, 0), 80);
        assert_eq!(obs.entries(), &[(0, 10, 40), (0, 20, 80)]);
    }
}
