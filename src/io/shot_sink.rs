//! The output boundary the frame sampler writes shot data through.
//!
//! Encoding shot data into any of the textual/binary formats is out of scope for
//! this crate; [ShotSink] only fixes the interface the sampler drives so that a
//! separate format-aware crate can implement it. [NullSink] and [VecSink] are the
//! only implementors provided here — one for benchmarking/fuzzing without the
//! cost of retaining output, one for collecting results in-memory (used
//! pervasively by this crate's own tests).

use crate::bits::{BitTable, BitVec, DefaultWord as Word};

/// Which kind of result row a [ShotSink::begin_result_type] call is about to
/// receive, mirroring the distinction a real encoder's header needs (measurement
/// vs. detection-event vs. observable-flip streams use different format markers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultTypeTag {
    /// Raw measurement results, in program order.
    Measurements,
    /// Detection events, in `DETECTOR` declaration order.
    DetectionEvents,
    /// Logical observable flips, by observable id.
    ObservableFlips,
}

/// Where a sampler or detection-event pass writes its output rows.
///
/// One row is one measurement/detector/observable's bit across every shot in the
/// batch; callers write one row at a time as they produce it; `write_bit` exists
/// alongside `write_row` for sinks that want single-shot streaming instead of
/// batching rows (e.g. Stream mode; see the per-shot path in upstream samplers).
pub trait ShotSink {
    /// Announce that every subsequent `write_row`/`write_bit` call belongs to
    /// `kind`, until the next `begin_result_type` call.
    fn begin_result_type(&mut self, kind: ResultTypeTag);

    /// Append a single shot's bit to the current row.
    fn write_bit(&mut self, shot: usize, bit: bool);

    /// Append a whole row (one bit per shot) at once.
    fn write_row(&mut self, row: &BitVec<Word>);

    /// Flush any buffered output. A no-op for in-memory sinks.
    fn flush(&mut self);
}

/// Discards everything written to it. Useful for benchmarking the sampler/analyzer
/// without paying for output retention.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NullSink;

impl ShotSink for NullSink {
    fn begin_result_type(&mut self, _kind: ResultTypeTag) {}
    fn write_bit(&mut self, _shot: usize, _bit: bool) {}
    fn write_row(&mut self, _row: &BitVec<Word>) {}
    fn flush(&mut self) {}
}

/// Collects every written row into an in-memory [BitTable], one table per
/// [ResultTypeTag] section encountered.
#[derive(Debug, Clone, Default)]
pub struct VecSink {
    measurements: Vec<BitVec<Word>>,
    detection_events: Vec<BitVec<Word>>,
    observable_flips: Vec<BitVec<Word>>,
    current: Option<ResultTypeTag>,
}

impl VecSink {
    /// A sink with no rows collected yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows collected under [ResultTypeTag::Measurements], in write order.
    pub fn measurements(&self) -> &[BitVec<Word>] {
        &self.measurements
    }

    /// Rows collected under [ResultTypeTag::DetectionEvents], in write order.
    pub fn detection_events(&self) -> &[BitVec<Word>] {
        &self.detection_events
    }

    /// Rows collected under [ResultTypeTag::ObservableFlips], in write order.
    pub fn observable_flips(&self) -> &[BitVec<Word>] {
        &self.observable_flips
    }

    /// Pack this sink's rows for `kind` into a [BitTable] (one table row per
    /// collected row, `num_shots` columns each).
    pub fn to_table(&self, kind: ResultTypeTag, num_shots: usize) -> BitTable<Word> {
        let rows = match kind {
            ResultTypeTag::Measurements => &self.measurements,
            ResultTypeTag::DetectionEvents => &self.detection_events,
            ResultTypeTag::ObservableFlips => &self.observable_flips,
        };
        let mut table = BitTable::zeros(rows.len(), num_shots);
        for (r, row) in rows.iter().enumerate() {
            for shot in 0..num_shots {
                table.set(r, shot, row.get(shot));
            }
        }
        table
    }

    fn active_mut(&mut self) -> &mut Vec<BitVec<Word>> {
        match self.current.expect("write called before begin_result_type") {
            ResultTypeTag::Measurements => &mut self.measurements,
            ResultTypeTag::DetectionEvents => &mut self.detection_events,
            ResultTypeTag::ObservableFlips => &mut self.observable_flips,
        }
    }
}

impl ShotSink for VecSink {
    fn begin_result_type(&mut self, kind: ResultTypeTag) {
        self.current = Some(kind);
    }

    fn write_bit(&mut self, shot: usize, bit: bool) {
        let rows = self.active_mut();
        if rows.is_empty() {
            rows.push(BitVec::zeros(shot + 1));
        }
        let last = rows.last_mut().expect("just ensured non-empty");
        if last.len() <= shot {
            let mut grown = BitVec::zeros(shot + 1);
            for i in 0..last.len() {
                grown.set(i, last.get(i));
            }
            *last = grown;
        }
        last.set(shot, bit);
    }

    fn write_row(&mut self, row: &BitVec<Word>) {
        self.active_mut().push(row.clone());
    }

    fn flush(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_sink_accepts_anything() {
        let mut sink = NullSink;
        sink.begin_result_type(ResultTypeTag::Measurements);
        sink.write_bit(0, true);
        sink.write_row(&BitVec::zeros(4));
        sink.flush();
    }

    #[test]
    fn vec_sink_collects_rows_per_section() {
        let mut sink = VecSink::new();
        sink.begin_result_type(ResultTypeTag::Measurements);
        let mut row = BitVec::<Word>::zeros(3);
        row.set(0, true);
        sink.write_row(&row);

        sink.begin_result_type(ResultTypeTag::DetectionEvents);
        let mut row = BitVec::<Word>::zeros(3);
        row.set(1, true);
        sink.write_row(&row);

        assert_eq!(sink.measurements().len(), 1);
        assert_eq!(sink.detection_events().len(), 1);
        assert!(sink.measurements()[0].get(0));
        assert!(sink.detection_events()[0].get(1));
    }

    #[test]
    fn vec_sink_write_bit_grows_the_active_row() {
        let mut sink = VecSink::new();
        sink.begin_result_type(ResultTypeTag::ObservableFlips);
        sink.write_bit(0, true);
        sink.write_bit(2, true);
        assert_eq!(sink.observable_flips().len(), 1);
        assert!(sink.observable_flips()[0].get(0));
        assert!(sink.observable_flips()[0].get(2));
        assert!(!sink.observable_flips()[0].get(1));
    }

    #[test]
    fn to_table_packs_rows_by_section() {
        let mut sink = VecSink::new();
        sink.begin_result_type(ResultTypeTag::Measurements);
        let mut row = BitVec::<Word>::zeros(2);
        row.set(1, true);
        sink.write_row(&row);

        let table = sink.to_table(ResultTypeTag::Measurements, 2);
        assert_eq!(table.rows(), 1);
        assert!(table.get(0, 1));
        assert!(!table.get(0, 0));
    }
}
