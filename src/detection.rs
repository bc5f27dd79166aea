//! Measurements -> detection events: forward XOR of resolved measurement rows
//! against `DETECTOR`/`OBSERVABLE_INCLUDE` definitions.
//!
//! Operates on already-resolved classical measurement bits (frame XOR reference
//! sample), one [BitVec] row per shot-batch per measurement index, matching
//! [crate::frame_sim::FrameSimulator::record_row] once XORed against
//! [crate::tableau::Tableau]'s reference sample.

use thiserror::Error;

use crate::bits::{BitVec, DefaultWord as Word};
use crate::circuit::{measurement_row_count, Circuit, CircuitInstruction};
use crate::gate::{GateTarget, GateType};

/// Errors raised while converting measurements to detection events.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DetectionError {
    /// A `rec[-k]` lookback pointed further back than any measurement produced so
    /// far.
    #[error("rec[-{offset}] at measurement position {position} looks back past the start")]
    LookbackOutOfRange {
        /// The lookback offset requested.
        offset: u32,
        /// How many measurements had been produced at that point.
        position: usize,
    },
    /// Fewer measurement rows were supplied than the circuit produces.
    #[error("circuit produces {expected} measurements, only {actual} were supplied")]
    NotEnoughMeasurements {
        /// Measurements the circuit expects.
        expected: usize,
        /// Measurements actually supplied.
        actual: usize,
    },
}

/// The detection events and observable-flip bits derived from one run's worth of
/// measurements.
#[derive(Debug, Clone, Default)]
pub struct DetectionEvents {
    /// One row per `DETECTOR`, in declaration order.
    pub detectors: Vec<BitVec<Word>>,
    /// One row per distinct `OBSERVABLE_INCLUDE` id, accumulated by XOR across
    /// every instruction that references it (ids not referenced stay absent).
    pub observables: Vec<Option<BitVec<Word>>>,
}

struct Walker<'a> {
    measurements: &'a [BitVec<Word>],
    num_shots: usize,
    position: usize,
    events: DetectionEvents,
}

impl<'a> Walker<'a> {
    fn lookback(&self, offset: u32) -> Result<&'a BitVec<Word>, DetectionError> {
        let offset = offset as usize;
        if offset == 0 || offset > self.position {
            return Err(DetectionError::LookbackOutOfRange { offset: offset as u32, position: self.position });
        }
        Ok(&self.measurements[self.position - offset])
    }

    fn xor_targets(&self, targets: &[GateTarget]) -> Result<BitVec<Word>, DetectionError> {
        let mut row = BitVec::<Word>::zeros(self.num_shots);
        for &t in targets {
            row.xor_assign(self.lookback(t.rec_offset())?);
        }
        Ok(row)
    }

    fn walk(&mut self, circuit: &Circuit) -> Result<(), DetectionError> {
        for instr in &circuit.instructions {
            if let Some((block_index, count)) = instr.repeat_block(circuit) {
                for _ in 0..count {
                    self.walk(&circuit.blocks[block_index])?;
                }
                continue;
            }
            self.visit(circuit, instr)?;
        }
        Ok(())
    }

    fn visit(&mut self, circuit: &Circuit, instr: &CircuitInstruction) -> Result<(), DetectionError> {
        let targets = circuit.targets(instr);
        let args = circuit.args(instr);
        match instr.gate {
            GateType::Detector => {
                let row = self.xor_targets(targets)?;
                self.events.detectors.push(row);
            }
            GateType::ObservableInclude => {
                let row = self.xor_targets(targets)?;
                let id = args[0] as usize;
                if self.events.observables.len() <= id {
                    self.events.observables.resize(id + 1, None);
                }
                match &mut self.events.observables[id] {
                    Some(existing) => existing.xor_assign(&row),
                    slot @ None => *slot = Some(row),
                }
            }
            _ => {
                self.position += measurement_row_count(instr.gate, args, targets);
            }
        }
        Ok(())
    }
}

/// Walk `circuit`'s `DETECTOR`/`OBSERVABLE_INCLUDE` annotations against an
/// already-produced table of resolved measurement rows (one [BitVec] per
/// measurement index, one bit per shot), producing every detection event and
/// observable-flip row in declaration order.
///
/// # Errors
/// [DetectionError::NotEnoughMeasurements] if `measurements` is shorter than the
/// circuit's total measurement count; [DetectionError::LookbackOutOfRange] if a
/// `rec[-k]` points before the start of the circuit.
pub fn measurements_to_detection_events(
    circuit: &Circuit,
    measurements: &[BitVec<Word>],
) -> Result<DetectionEvents, DetectionError> {
    let expected = circuit.compute_stats().num_measurements as usize;
    if measurements.len() < expected {
        return Err(DetectionError::NotEnoughMeasurements { expected, actual: measurements.len() });
    }
    let num_shots = measurements.first().map_or(0, |row| row.len());
    let mut walker = Walker { measurements, num_shots, position: 0, events: DetectionEvents::default() };
    walker.walk(circuit)?;
    Ok(walker.events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(bits: &[bool]) -> BitVec<Word> {
        let mut v = BitVec::<Word>::zeros(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            v.set(i, b);
        }
        v
    }

    #[test]
    fn single_detector_xors_one_measurement() {
        let mut c = Circuit::new();
        c.push(GateType::M, &[], &[GateTarget::qubit(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let measurements = vec![row(&[true, false, true])];
        let events = measurements_to_detection_events(&c, &measurements).unwrap();
        assert_eq!(events.detectors.len(), 1);
        assert_eq!(events.detectors[0].words(), row(&[true, false, true]).words());
    }

    #[test]
    fn detector_xors_two_measurements() {
        let mut c = Circuit::new();
        c.push(GateType::M, &[], &[GateTarget::qubit(0), GateTarget::qubit(1)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1), GateTarget::rec(2)], None).unwrap();

        let measurements = vec![row(&[true, false]), row(&[true, true])];
        let events = measurements_to_detection_events(&c, &measurements).unwrap();
        // rec[-1] is the second M (index 1), rec[-2] is the first (index 0).
        assert_eq!(events.detectors[0].get(0), false); // true ^ true
        assert_eq!(events.detectors[0].get(1), true); // false ^ true
    }

    #[test]
    fn observable_accumulates_across_instructions() {
        let mut c = Circuit::new();
        c.push(GateType::M, &[], &[GateTarget::qubit(0)], None).unwrap();
        c.push(GateType::ObservableInclude, &[2.0], &[GateTarget::rec(1)], None).unwrap();
        c.push(GateType::M, &[], &[GateTarget::qubit(1)], None).unwrap();
        c.push(GateType::ObservableInclude, &[2.0], &[GateTarget::rec(1)], None).unwrap();

        let measurements = vec![row(&[true]), row(&[true])];
        let events = measurements_to_detection_events(&c, &measurements).unwrap();
        assert_eq!(events.observables[2].as_ref().unwrap().get(0), false); // true ^ true
    }

    #[test]
    fn lookback_past_start_errors() {
        let mut c = Circuit::new();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();
        let err = measurements_to_detection_events(&c, &[]).unwrap_err();
        assert!(matches!(err, DetectionError::LookbackOutOfRange { .. }));
    }

    #[test]
    fn detects_through_repeat() {
        let mut body = Circuit::new();
        body.push(GateType::M, &[], &[GateTarget::qubit(0)], None).unwrap();
        body.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();
        let mut top = Circuit::new();
        top.push_repeat(3, body).unwrap();

        let measurements = vec![row(&[true]), row(&[false]), row(&[true])];
        let events = measurements_to_detection_events(&top, &measurements).unwrap();
        assert_eq!(events.detectors.len(), 3);
    }
}
