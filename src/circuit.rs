//! The circuit data model: instructions, child blocks (for `REPEAT`), and the arenas
//! that back their target/argument lists.

use std::ops::{Add, Mul};

use thiserror::Error;

use crate::bits::{Arena, ArenaSlice};
use crate::gate::{GateFlags, GateTarget, GateType};

/// One instruction in a [Circuit]: a gate, its numeric arguments, and its targets.
///
/// Argument and target lists live in the owning `Circuit`'s arenas; this struct only
/// holds the `ArenaSlice` handles, so copying or cloning an instruction never copies
/// the underlying data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitInstruction {
    /// Which gate this instruction invokes.
    pub gate: GateType,
    /// Numeric arguments (probabilities, coordinates, or a repeat count encoded
    /// separately for `REPEAT`), resolved against the owning circuit's arg arena.
    pub args: ArenaSlice<f64>,
    /// Targets, resolved against the owning circuit's target arena.
    pub targets: ArenaSlice<GateTarget>,
    /// Free-form annotation carried through unchanged; never interpreted by this
    /// crate. Used by the error analyzer only as a secondary key alongside the
    /// target multiset when accumulating error-class probabilities.
    pub tag: Option<Box<str>>,
}

impl CircuitInstruction {
    /// For a `REPEAT` instruction, the index into [Circuit::blocks] of the repeated
    /// body and its repetition count, packed as `(block_index, repeat_count)` into
    /// the first two args.
    pub fn repeat_block(&self, circuit: &Circuit) -> Option<(usize, u64)> {
        if self.gate != GateType::Repeat {
            return None;
        }
        let args = circuit.arg_arena.get(self.args);
        Some((args[0] as usize, args[1] as u64))
    }
}

/// Errors raised while building or validating a [Circuit].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CircuitError {
    /// A gate received a number of targets inconsistent with its
    /// [GateFlags::TARGETS_PAIRS] requirement.
    #[error("gate {gate} requires an even number of targets, got {count}")]
    OddPairedTargets {
        /// The offending gate's name.
        gate: &'static str,
        /// How many targets it was actually given.
        count: usize,
    },
    /// A gate received a number of numeric args inconsistent with its catalog entry.
    #[error("gate {gate} expects {expected} args, got {actual}")]
    WrongArgCount {
        /// The offending gate's name.
        gate: &'static str,
        /// The expected count from the catalog.
        expected: usize,
        /// How many args were actually given.
        actual: usize,
    },
    /// A `REPEAT` instruction referenced a block index that doesn't exist.
    #[error("REPEAT references block {index}, but the circuit only has {len} blocks")]
    MissingBlock {
        /// The out-of-range block index.
        index: usize,
        /// Number of blocks actually present.
        len: usize,
    },
}

/// Aggregate statistics over a [Circuit], computed once so the sampler and tracker
/// can size their tables without a separate pre-pass per use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CircuitStats {
    /// Highest qubit index referenced, plus one (`0` for an empty circuit).
    pub num_qubits: usize,
    /// Total number of measurement results produced, counting every shot through
    /// every level of every `REPEAT` block.
    pub num_measurements: u64,
    /// Total number of `DETECTOR` annotations, through `REPEAT` expansion.
    pub num_detectors: u64,
    /// Number of distinct `OBSERVABLE_INCLUDE` ids referenced.
    pub num_observables: usize,
    /// Total number of `TICK` instructions, through `REPEAT` expansion.
    pub num_ticks: u64,
}

/// An immutable (once built) quantum circuit: a flat instruction list plus the child
/// circuits `REPEAT` instructions refer to by index.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    /// Top-level instructions, in program order.
    pub instructions: Vec<CircuitInstruction>,
    /// Bodies of `REPEAT` blocks, referenced by index from a `REPEAT`
    /// [CircuitInstruction]'s first arg.
    pub blocks: Vec<Circuit>,
    target_arena: Arena<GateTarget>,
    arg_arena: Arena<f64>,
}

impl PartialEq for Circuit {
    fn eq(&self, other: &Self) -> bool {
        if self.instructions.len() != other.instructions.len()
            || self.blocks.len() != other.blocks.len()
        {
            return false;
        }
        for (a, b) in self.instructions.iter().zip(other.instructions.iter()) {
            if a.gate != b.gate || a.tag != b.tag {
                return false;
            }
            if self.arg_arena.get(a.args) != other.arg_arena.get(b.args) {
                return false;
            }
            if self.target_arena.get(a.targets) != other.target_arena.get(b.targets) {
                return false;
            }
        }
        self.blocks == other.blocks
    }
}
impl Eq for Circuit {}

impl Circuit {
    /// An empty circuit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one instruction, interning `args` and `targets` into this circuit's
    /// arenas.
    ///
    /// # Errors
    /// [CircuitError::OddPairedTargets] if the gate requires paired targets and an
    /// odd number was given; [CircuitError::WrongArgCount] if the gate has a fixed
    /// arg count that doesn't match.
    pub fn push(
        &mut self,
        gate: GateType,
        args: &[f64],
        targets: &[GateTarget],
        tag: Option<Box<str>>,
    ) -> Result<(), CircuitError> {
        let flags = gate.flags();
        if flags.contains(GateFlags::TARGETS_PAIRS) && targets.len() % 2 != 0 {
            return Err(CircuitError::OddPairedTargets { gate: gate.name(), count: targets.len() });
        }
        if let Some(expected) = gate.arg_count() {
            if gate != GateType::Repeat && args.len() != expected {
                return Err(CircuitError::WrongArgCount {
                    gate: gate.name(),
                    expected,
                    actual: args.len(),
                });
            }
        }
        let args_slice = self.arg_arena.intern(args);
        let targets_slice = self.target_arena.intern(targets);
        self.instructions.push(CircuitInstruction {
            gate,
            args: args_slice,
            targets: targets_slice,
            tag,
        });
        Ok(())
    }

    /// Append a `REPEAT count { body }` instruction, taking ownership of `body` as a
    /// new block.
    pub fn push_repeat(&mut self, count: u64, body: Circuit) -> Result<(), CircuitError> {
        let index = self.blocks.len();
        self.blocks.push(body);
        self.push(GateType::Repeat, &[index as f64, count as f64], &[], None)
    }

    /// Resolve an instruction's numeric args.
    pub fn args(&self, instr: &CircuitInstruction) -> &[f64] {
        self.arg_arena.get(instr.args)
    }

    /// Resolve an instruction's targets.
    pub fn targets(&self, instr: &CircuitInstruction) -> &[GateTarget] {
        self.target_arena.get(instr.targets)
    }

    /// Resolve a `REPEAT` instruction's body. Panics if `instr` isn't `REPEAT` or the
    /// block index is out of range (validate with [Circuit::validate] first if the
    /// circuit wasn't built exclusively through [Circuit::push_repeat]).
    pub fn repeat_body(&self, instr: &CircuitInstruction) -> &Circuit {
        let (index, _) = instr.repeat_block(self).expect("not a REPEAT instruction");
        &self.blocks[index]
    }

    /// Check that every `REPEAT` instruction's block index is in range.
    pub fn validate(&self) -> Result<(), CircuitError> {
        for instr in &self.instructions {
            if let Some((index, _)) = instr.repeat_block(self) {
                if index >= self.blocks.len() {
                    return Err(CircuitError::MissingBlock { index, len: self.blocks.len() });
                }
            }
        }
        for block in &self.blocks {
            block.validate()?;
        }
        Ok(())
    }

    /// Compute aggregate statistics, expanding `REPEAT` multiplicities.
    pub fn compute_stats(&self) -> CircuitStats {
        let mut stats = CircuitStats::default();
        let mut observable_ids = std::collections::BTreeSet::new();
        self.accumulate_stats(&mut stats, &mut observable_ids, 1);
        stats.num_observables = observable_ids.len();
        stats
    }

    fn accumulate_stats(
        &self,
        stats: &mut CircuitStats,
        observable_ids: &mut std::collections::BTreeSet<u32>,
        multiplicity: u64,
    ) {
        for instr in &self.instructions {
            let flags = instr.gate.flags();
            if let Some((block_index, count)) = instr.repeat_block(self) {
                self.blocks[block_index].accumulate_stats(
                    stats,
                    observable_ids,
                    multiplicity * count,
                );
                continue;
            }
            for t in self.targets(instr) {
                if !t.is_record_target() && !t.is_sweep_bit_target() && !t.is_combiner() {
                    stats.num_qubits = stats.num_qubits.max(t.qubit_value() as usize + 1);
                }
            }
            if flags.contains(GateFlags::PRODUCES_RESULTS) {
                stats.num_measurements += multiplicity * measurement_row_count(instr.gate, self.args(instr), self.targets(instr)) as u64;
            }
            if instr.gate == GateType::Detector {
                stats.num_detectors += multiplicity;
            }
            if instr.gate == GateType::Tick {
                stats.num_ticks += multiplicity;
            }
            if instr.gate == GateType::ObservableInclude && !self.targets(instr).is_empty() {
                observable_ids.insert(self.args(instr)[0] as u32);
            }
        }
    }
}

impl Add for Circuit {
    type Output = Circuit;

    /// Concatenate two circuits: every instruction of `other` is appended after
    /// `self`'s, with `REPEAT` block indices shifted to land in the merged `blocks`
    /// vector.
    fn add(mut self, other: Circuit) -> Circuit {
        let block_offset = self.blocks.len();
        self.blocks.extend(other.blocks);
        for instr in other.instructions {
            let args = other_args_shifted(&other.arg_arena, instr.args, instr.gate, block_offset);
            let targets = other.target_arena.get(instr.targets);
            self.push(instr.gate, &args, targets, instr.tag)
                .expect("already-valid instruction stayed valid across concatenation");
        }
        self
    }
}

fn other_args_shifted(
    arena: &Arena<f64>,
    slice: ArenaSlice<f64>,
    gate: GateType,
    block_offset: usize,
) -> Vec<f64> {
    let args = arena.get(slice);
    if gate == GateType::Repeat {
        let mut shifted = args.to_vec();
        shifted[0] += block_offset as f64;
        shifted
    } else {
        args.to_vec()
    }
}

/// How many measurement-record rows one instruction produces: `1` per plain
/// qubit target for `M`/`MX`/`MY`/`MR`/`MRX`/`MRY`/`HERALDED_*`, `1` per pair for
/// `MXX`/`MYY`/`MZZ`, `1` per Pauli-product term (targets joined by a `*`
/// combiner count once) for `MPP`, and `1` per arg for `MPAD`. Zero for anything
/// that doesn't set [GateFlags::PRODUCES_RESULTS].
pub(crate) fn measurement_row_count(gate: GateType, args: &[f64], targets: &[GateTarget]) -> usize {
    use GateType::*;
    match gate {
        MX | MY | M | MRX | MRY | MR => targets.len(),
        MXX | MYY | MZZ => targets.len() / 2,
        MPP => {
            let mut count = 0;
            let mut prev_combiner = false;
            for t in targets {
                if t.is_combiner() {
                    prev_combiner = true;
                    continue;
                }
                if !prev_combiner {
                    count += 1;
                }
                prev_combiner = false;
            }
            count
        }
        MPAD => args.len(),
        HERALDED_ERASE | HERALDED_PAULI_CHANNEL_1 => targets.len(),
        _ => 0,
    }
}

impl Mul<u64> for Circuit {
    type Output = Circuit;

    /// Repeat-factor this circuit: wrap it in a single `REPEAT factor { self }`
    /// block rather than physically duplicating instructions `factor` times.
    fn mul(self, factor: u64) -> Circuit {
        let mut out = Circuit::new();
        out.push_repeat(factor, self).expect("a freshly built REPEAT is always valid");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(i: u32) -> GateTarget {
        GateTarget::qubit(i)
    }

    #[test]
    fn push_rejects_odd_pairs() {
        let mut c = Circuit::new();
        let err = c.push(GateType::CX, &[], &[q(0)], None).unwrap_err();
        assert!(matches!(err, CircuitError::OddPairedTargets { .. }));
    }

    #[test]
    fn push_rejects_wrong_arg_count() {
        let mut c = Circuit::new();
        let err = c.push(GateType::X_ERROR, &[0.1, 0.2], &[q(0)], None).unwrap_err();
        assert!(matches!(err, CircuitError::WrongArgCount { .. }));
    }

    #[test]
    fn compute_stats_counts_through_repeat() {
        let mut body = Circuit::new();
        body.push(GateType::M, &[], &[q(0)], None).unwrap();
        body.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let mut top = Circuit::new();
        top.push(GateType::H, &[], &[q(0)], None).unwrap();
        top.push_repeat(5, body).unwrap();

        let stats = top.compute_stats();
        assert_eq!(stats.num_qubits, 1);
        assert_eq!(stats.num_measurements, 5);
        assert_eq!(stats.num_detectors, 5);
    }

    #[test]
    fn concat_shifts_repeat_block_indices() {
        let mut left_body = Circuit::new();
        left_body.push(GateType::M, &[], &[q(0)], None).unwrap();
        let mut left = Circuit::new();
        left.push_repeat(2, left_body).unwrap();

        let mut right_body = Circuit::new();
        right_body.push(GateType::M, &[], &[q(1)], None).unwrap();
        let mut right = Circuit::new();
        right.push_repeat(3, right_body).unwrap();

        let merged = left + right;
        assert_eq!(merged.blocks.len(), 2);
        let second_repeat = &merged.instructions[1];
        let (block_index, count) = second_repeat.repeat_block(&merged).unwrap();
        assert_eq!(block_index, 1);
        assert_eq!(count, 3);
        merged.validate().unwrap();
    }

    #[test]
    fn mul_wraps_in_single_repeat_block() {
        let mut body = Circuit::new();
        body.push(GateType::H, &[], &[q(0)], None).unwrap();
        let wrapped = body * 10;
        assert_eq!(wrapped.instructions.len(), 1);
        assert_eq!(wrapped.blocks.len(), 1);
        wrapped.validate().unwrap();
    }
}
