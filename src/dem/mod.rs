//! The detector error model (DEM): a list of independent error mechanisms, each a
//! probability plus the set of detectors/observables it flips, over a block
//! structure mirroring [crate::circuit::Circuit]'s `REPEAT` blocks.

mod target;

pub use target::DemTarget;

use thiserror::Error;

use crate::bits::{Arena, ArenaSlice};

/// Which kind of row a [DemInstruction] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DemInstructionKind {
    /// `error(p) T_1 ... T_k`: an independent error mechanism at probability `p`.
    Error,
    /// `detector(coords...) Dk`: names and places one detector.
    Detector,
    /// `logical_observable Lk`: names one observable (its targets accumulate
    /// separately, via [DemInstruction::targets] on `Error` rows that reference it).
    LogicalObservable,
    /// `shift_detectors(coords...) n`: offsets every later detector id by `n` and
    /// every later detector's coordinates by `coords`.
    ShiftDetectors,
    /// `repeat n { ... }`: references a child block by index, run `n` times with
    /// an implied per-iteration detector-id shift tracked by the block itself.
    Repeat,
    /// A tick-equivalent separator some DEM text emits between detector layers;
    /// carries no data.
    Tick,
}

/// One instruction in a [DetectorErrorModel].
#[derive(Debug, Clone, PartialEq)]
pub struct DemInstruction {
    /// Which kind of row this is.
    pub kind: DemInstructionKind,
    /// Numeric args: the probability for `Error`, the coordinate list for
    /// `Detector`/`ShiftDetectors`, or `[block_index, repeat_count]` for `Repeat`.
    pub args: ArenaSlice<f64>,
    /// Targets: the (possibly separator-delimited) target list for `Error`, or the
    /// single target for `Detector`/`LogicalObservable`. Empty for the rest.
    pub targets: ArenaSlice<DemTarget>,
    /// Free-form annotation, carried through unchanged.
    pub tag: Option<Box<str>>,
}

/// Errors raised while building or validating a [DetectorErrorModel].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DemError {
    /// An `error` instruction's probability fell outside `[0, 1]`.
    #[error("error probability {0} is out of range")]
    InvalidProbability(f64),
    /// A `repeat` instruction referenced a block index that doesn't exist.
    #[error("repeat references block {index}, but the model only has {len} blocks")]
    MissingBlock {
        /// The out-of-range block index.
        index: usize,
        /// Number of blocks actually present.
        len: usize,
    },
}

/// A detector error model: a flat instruction list plus the child models `repeat`
/// instructions refer to by index, exactly mirroring [crate::circuit::Circuit]'s
/// own block structure.
#[derive(Debug, Clone, Default)]
pub struct DetectorErrorModel {
    /// Top-level instructions, in emission order.
    pub instructions: Vec<DemInstruction>,
    /// Bodies of `repeat` blocks, referenced by index.
    pub blocks: Vec<DetectorErrorModel>,
    target_arena: Arena<DemTarget>,
    arg_arena: Arena<f64>,
}

impl DetectorErrorModel {
    /// An empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an instruction's numeric args.
    pub fn args(&self, instr: &DemInstruction) -> &[f64] {
        self.arg_arena.get(instr.args)
    }

    /// Resolve an instruction's targets.
    pub fn targets(&self, instr: &DemInstruction) -> &[DemTarget] {
        self.target_arena.get(instr.targets)
    }

    fn push(
        &mut self,
        kind: DemInstructionKind,
        args: &[f64],
        targets: &[DemTarget],
        tag: Option<Box<str>>,
    ) -> Result<(), DemError> {
        let args_slice = self.arg_arena.intern(args);
        let targets_slice = self.target_arena.intern(targets);
        self.instructions.push(DemInstruction { kind, args: args_slice, targets: targets_slice, tag });
        Ok(())
    }

    /// Append one `error(p) T_1 ... T_k` mechanism. `targets` may include
    /// [DemTarget::separator] to mark decomposed sub-component boundaries.
    pub fn push_error(
        &mut self,
        probability: f64,
        targets: &[DemTarget],
        tag: Option<Box<str>>,
    ) -> Result<(), DemError> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(DemError::InvalidProbability(probability));
        }
        self.push(DemInstructionKind::Error, &[probability], targets, tag)
    }

    /// Append a `detector(coords...) Dk` row.
    pub fn push_detector(&mut self, coords: &[f64], id: DemTarget) -> Result<(), DemError> {
        self.push(DemInstructionKind::Detector, coords, &[id], None)
    }

    /// Append a `logical_observable Lk` row.
    pub fn push_logical_observable(&mut self, id: DemTarget) -> Result<(), DemError> {
        self.push(DemInstructionKind::LogicalObservable, &[], &[id], None)
    }

    /// Append a `shift_detectors(coords...) n` row.
    pub fn push_shift_detectors(&mut self, shift: i64, coords: &[f64]) -> Result<(), DemError> {
        let mut args = Vec::with_capacity(coords.len() + 1);
        args.push(shift as f64);
        args.extend_from_slice(coords);
        self.push(DemInstructionKind::ShiftDetectors, &args, &[], None)
    }

    /// Append a `tick` separator row.
    pub fn push_tick(&mut self) -> Result<(), DemError> {
        self.push(DemInstructionKind::Tick, &[], &[], None)
    }

    /// Append a `repeat count { body }` instruction, taking ownership of `body` as
    /// a new block.
    pub fn push_repeat(&mut self, count: u64, body: DetectorErrorModel) -> Result<(), DemError> {
        let index = self.blocks.len();
        self.blocks.push(body);
        self.push(DemInstructionKind::Repeat, &[index as f64, count as f64], &[], None)
    }

    /// For a `Repeat` instruction, `(block_index, repeat_count)`.
    pub fn repeat_block(&self, instr: &DemInstruction) -> Option<(usize, u64)> {
        if instr.kind != DemInstructionKind::Repeat {
            return None;
        }
        let args = self.arg_arena.get(instr.args);
        Some((args[0] as usize, args[1] as u64))
    }

    /// Check that every `repeat` instruction's block index is in range.
    pub fn validate(&self) -> Result<(), DemError> {
        for instr in &self.instructions {
            if let Some((index, _)) = self.repeat_block(instr) {
                if index >= self.blocks.len() {
                    return Err(DemError::MissingBlock { index, len: self.blocks.len() });
                }
            }
        }
        for block in &self.blocks {
            block.validate()?;
        }
        Ok(())
    }

    /// Total number of detectors declared, expanding `repeat` multiplicities.
    pub fn num_detectors(&self) -> u64 {
        self.accumulate_num_detectors(1)
    }

    fn accumulate_num_detectors(&self, multiplicity: u64) -> u64 {
        let mut total = 0;
        for instr in &self.instructions {
            if let Some((block_index, count)) = self.repeat_block(instr) {
                total += self.blocks[block_index].accumulate_num_detectors(multiplicity * count);
                continue;
            }
            if instr.kind == DemInstructionKind::Detector {
                total += multiplicity;
            }
        }
        total
    }

    /// Approximate equality, ignoring instruction order within a model (error
    /// mechanisms commute) but not nesting structure: every `Error` row in `self`
    /// must have a matching row in `other` whose probability is within `atol` and
    /// whose target *set* (order-independent, separators included as-is) is
    /// identical, and vice versa; every non-`Error` row must match exactly in the
    /// given order.
    pub fn approx_equals(&self, other: &Self, atol: f64) -> bool {
        if self.blocks.len() != other.blocks.len() {
            return false;
        }
        for (a, b) in self.blocks.iter().zip(other.blocks.iter()) {
            if !a.approx_equals(b, atol) {
                return false;
            }
        }
        let (mut self_errors, mut self_rest) = (Vec::new(), Vec::new());
        for instr in &self.instructions {
            if instr.kind == DemInstructionKind::Error {
                self_errors.push(instr);
            } else {
                self_rest.push(instr);
            }
        }
        let (mut other_errors, mut other_rest) = (Vec::new(), Vec::new());
        for instr in &other.instructions {
            if instr.kind == DemInstructionKind::Error {
                other_errors.push(instr);
            } else {
                other_rest.push(instr);
            }
        }
        if self_errors.len() != other_errors.len() || self_rest.len() != other_rest.len() {
            return false;
        }
        for (a, b) in self_rest.iter().zip(other_rest.iter()) {
            if a.kind != b.kind || a.tag != b.tag {
                return false;
            }
            if self.args(a) != other.args(b) || self.targets(a) != other.targets(b) {
                return false;
            }
        }
        let mut matched = vec![false; other_errors.len()];
        'outer: for a in &self_errors {
            let mut a_targets: Vec<DemTarget> = self.targets(a).to_vec();
            a_targets.sort_unstable();
            for (j, b) in other_errors.iter().enumerate() {
                if matched[j] {
                    continue;
                }
                let mut b_targets: Vec<DemTarget> = other.targets(b).to_vec();
                b_targets.sort_unstable();
                let prob_close = (self.args(a)[0] - other.args(b)[0]).abs() <= atol;
                if prob_close && a_targets == b_targets && a.tag == b.tag {
                    matched[j] = true;
                    continue 'outer;
                }
            }
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(id: u64) -> DemTarget {
        DemTarget::relative_detector_id(id)
    }

    #[test]
    fn push_and_resolve_error() {
        let mut dem = DetectorErrorModel::new();
        dem.push_error(0.125, &[d(0), d(1)], None).unwrap();
        let instr = &dem.instructions[0];
        assert_eq!(dem.args(instr), &[0.125]);
        assert_eq!(dem.targets(instr), &[d(0), d(1)]);
    }

    #[test]
    fn rejects_bad_probability() {
        let mut dem = DetectorErrorModel::new();
        assert!(dem.push_error(1.5, &[d(0)], None).is_err());
    }

    #[test]
    fn num_detectors_counts_through_repeat() {
        let mut body = DetectorErrorModel::new();
        body.push_detector(&[], d(0)).unwrap();
        let mut top = DetectorErrorModel::new();
        top.push_detector(&[], d(0)).unwrap();
        top.push_repeat(10, body).unwrap();
        assert_eq!(top.num_detectors(), 11);
    }

    #[test]
    fn approx_equals_ignores_error_order() {
        let mut a = DetectorErrorModel::new();
        a.push_error(0.1, &[d(0)], None).unwrap();
        a.push_error(0.2, &[d(1)], None).unwrap();

        let mut b = DetectorErrorModel::new();
        b.push_error(0.2, &[d(1)], None).unwrap();
        b.push_error(0.1000001, &[d(0)], None).unwrap();

        assert!(a.approx_equals(&b, 1e-5));
    }

    #[test]
    fn approx_equals_rejects_different_targets() {
        let mut a = DetectorErrorModel::new();
        a.push_error(0.1, &[d(0)], None).unwrap();
        let mut b = DetectorErrorModel::new();
        b.push_error(0.1, &[d(1)], None).unwrap();
        assert!(!a.approx_equals(&b, 1e-5));
    }
}
