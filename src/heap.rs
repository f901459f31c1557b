use std::io;

use crate::order::{self, OrderMode};
use crate::record::Record;

/// What a cursor's underlying input yields on each pull: this mirrors
/// `codec::PullOutcome` but at the cursor level, after any region
/// filtering has already been applied.
pub enum SourceOutcome {
    Record(Record),
    Eof,
    Truncated,
}

/// One input to a merge. Implemented directly over a raw record stream,
/// or wrapped by a region-filtering adapter; either way the heap only
/// ever calls `pull`.
pub trait RecordSource {
    fn pull(&mut self) -> io::Result<SourceOutcome>;
}

struct Cursor<'a> {
    input_index: usize,
    arrival_idx: u64,
    record: Option<Record>,
    source: Box<dyn RecordSource + 'a>,
    truncated: bool,
}

/// A binary min-heap over a fixed array of cursors, as recommended for
/// this engine: cursor slots are mutated and resifted in place rather than
/// reallocated, so pulling the next record from an input never touches
/// any buffer but that cursor's own.
pub struct Heap<'a> {
    mode: OrderMode,
    cursors: Vec<Cursor<'a>>,
    next_arrival: u64,
}

impl<'a> Heap<'a> {
    /// Primes one cursor per source (pulling its first record) and builds
    /// the heap invariant over them.
    pub fn new(mode: OrderMode, sources: Vec<Box<dyn RecordSource + 'a>>) -> io::Result<Self> {
        let mut heap = Heap {
            mode,
            cursors: Vec::with_capacity(sources.len()),
            next_arrival: 0,
        };

        for (input_index, source) in sources.into_iter().enumerate() {
            let mut cursor = Cursor {
                input_index,
                arrival_idx: 0,
                record: None,
                source,
                truncated: false,
            };
            heap.fill(&mut cursor)?;
            heap.cursors.push(cursor);
        }

        heap.heapify();
        Ok(heap)
    }

    fn fill(&mut self, cursor: &mut Cursor<'a>) -> io::Result<()> {
        match cursor.source.pull()? {
            SourceOutcome::Record(record) => {
                cursor.record = Some(record);
                cursor.arrival_idx = self.next_arrival;
                self.next_arrival += 1;
            }
            SourceOutcome::Eof => {
                cursor.record = None;
            }
            SourceOutcome::Truncated => {
                cursor.record = None;
                cursor.truncated = true;
            }
        }
        Ok(())
    }

    fn is_less(&self, a: usize, b: usize) -> bool {
        match (&self.cursors[a].record, &self.cursors[b].record) {
            (None, None) => false,
            (None, Some(_)) => false,
            (Some(_), None) => true,
            (Some(ra), Some(rb)) => {
                order::compare(
                    self.mode,
                    ra,
                    rb,
                    self.cursors[a].input_index,
                    self.cursors[b].input_index,
                    self.cursors[a].arrival_idx,
                    self.cursors[b].arrival_idx,
                ) == std::cmp::Ordering::Less
            }
        }
    }

    fn heapify(&mut self) {
        let n = self.cursors.len();
        if n < 2 {
            return;
        }
        for i in (0..n / 2).rev() {
            self.sift_down(i);
        }
    }

    fn sift_down(&mut self, mut root: usize) {
        let n = self.cursors.len();
        loop {
            let left = 2 * root + 1;
            let right = 2 * root + 2;
            let mut smallest = root;

            if left < n && self.is_less(left, smallest) {
                smallest = left;
            }
            if right < n && self.is_less(right, smallest) {
                smallest = right;
            }
            if smallest == root {
                break;
            }
            self.cursors.swap(root, smallest);
            root = smallest;
        }
    }

    /// True once every cursor is exhausted.
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty() || self.cursors[0].record.is_none()
    }

    /// Emits the current root record, pulls the next record for that
    /// input, and restores the heap invariant. Returns `None` once every
    /// cursor is exhausted. The root's input index is handed back
    /// alongside the record so callers (RG injection, `--source-column`
    /// style fan-out) can tell which input it came from.
    pub fn pop(&mut self) -> io::Result<Option<(Record, usize)>> {
        if self.is_empty() {
            return Ok(None);
        }

        let root_index = self.cursors[0].input_index;
        let root_record = self.cursors[0].record.take().expect("checked non-empty");

        {
            let mut cursor = std::mem::replace(
                &mut self.cursors[0],
                Cursor {
                    input_index: root_index,
                    arrival_idx: 0,
                    record: None,
                    source: Box::new(ExhaustedSource),
                    truncated: false,
                },
            );
            self.fill(&mut cursor)?;
            self.cursors[0] = cursor;
        }

        self.sift_down(0);

        Ok(Some((root_record, root_index)))
    }

    /// Names each input that reported a truncated record, for the caller
    /// to log a warning per the non-fatal truncation policy.
    pub fn truncated_inputs(&self) -> Vec<usize> {
        self.cursors
            .iter()
            .filter(|c| c.truncated)
            .map(|c| c.input_index)
            .collect()
    }
}

struct ExhaustedSource;

impl RecordSource for ExhaustedSource {
    fn pull(&mut self) -> io::Result<SourceOutcome> {
        Ok(SourceOutcome::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct VecSource(VecDeque<Record>);

    impl RecordSource for VecSource {
        fn pull(&mut self) -> io::Result<SourceOutcome> {
            Ok(match self.0.pop_front() {
                Some(r) => SourceOutcome::Record(r),
                None => SourceOutcome::Eof,
            })
        }
    }

    fn rec(tid: i32, pos: i32) -> Record {
        Record { tid, pos, flag: 0, qname: format!("{}:{}", tid, pos), payload: vec![] }
    }

    fn source(records: Vec<Record>) -> Box<dyn RecordSource> {
        Box::new(VecSource(records.into()))
    }

    #[test]
    fn merges_two_sorted_inputs_in_order() {
        let a = source(vec![rec(0, 1), rec(0, 5)]);
        let b = source(vec![rec(0, 2), rec(0, 7)]);
        let mut heap = Heap::new(OrderMode::Positional, vec![a, b]).unwrap();

        let mut out = Vec::new();
        while let Some((record, _)) = heap.pop().unwrap() {
            out.push(record.pos);
        }
        assert_eq!(out, vec![1, 2, 5, 7]);
    }

    #[test]
    fn empty_input_contributes_nothing() {
        let a = source(vec![]);
        let b = source(vec![rec(0, 2)]);
        let mut heap = Heap::new(OrderMode::Positional, vec![a, b]).unwrap();
        let (record, _) = heap.pop().unwrap().unwrap();
        assert_eq!(record.pos, 2);
        assert!(heap.pop().unwrap().is_none());
    }

    #[test]
    fn arrival_order_breaks_ties_between_inputs() {
        let a = source(vec![rec(0, 1)]);
        let b = source(vec![rec(0, 1)]);
        let mut heap = Heap::new(OrderMode::Positional, vec![a, b]).unwrap();
        let (_, first_input) = heap.pop().unwrap().unwrap();
        assert_eq!(first_input, 0);
    }
}
