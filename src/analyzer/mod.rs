//! The reverse error analyzer (CORE 2): walks a [Circuit] backward with a
//! [ReverseFrameTracker], turning every noise instruction it crosses into one or
//! more independent mechanisms of a [DetectorErrorModel].
//!
//! # Scope
//! Implemented: every Clifford gate, `M`/`MX`/`MY`/`MR`/`MRX`/`MRY`/`R`/`RX`/`RY`,
//! `MPP`/`MXX`/`MYY`/`MZZ`, `DETECTOR`/`OBSERVABLE_INCLUDE`, `X_ERROR`/`Y_ERROR`/
//! `Z_ERROR`, `DEPOLARIZE1`/`DEPOLARIZE2`, `PAULI_CHANNEL_1`,
//! `CORRELATED_ERROR`/`ELSE_CORRELATED_ERROR`, `MPAD`, period-wide `REPEAT`
//! folding, and construction-based local decomposition.
//!
//! `PAULI_CHANNEL_2`, `HERALDED_ERASE`, and `HERALDED_PAULI_CHANNEL_1` are also
//! implemented: the two heralded channels reduce exactly to existing single-qubit
//! machinery (their herald bit is an independent record row, handled the same way
//! `MPAD` is), but `PAULI_CHANNEL_2`'s 15 cases are treated as already-independent
//! probabilities rather than run through a genuine disjoint-to-independent solve —
//! a correct multi-variable solve over 15 non-uniform cases isn't grounded anywhere
//! else in this crate, so this is a deliberate, threshold-guarded approximation,
//! not an exact reduction. Global hyperedge decomposition (searching across
//! *different* error mechanisms for a shared compact basis) isn't implemented
//! either; decomposition only ever splits one channel's own combinatorial cases
//! into that channel's own atomic components.
//! `SHIFT_COORDS`/`QUBIT_COORDS` are no-ops — this analyzer never tracks detector
//! coordinates, so declared `detector()` rows never carry any.

pub mod decomp;

use std::collections::HashMap;

use thiserror::Error;

use crate::bits::SparseXorVec;
use crate::circuit::{Circuit, CircuitError, CircuitInstruction};
use crate::dem::{DemError, DemTarget, DetectorErrorModel};
use crate::frame_sim::Axis;
use crate::gate::{GateTarget, GateType};
use crate::reverse_tracker::{ReverseFrameTracker, ReverseTrackerError};

/// Tunables for [analyze], mirroring the upstream analyzer's own flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    /// Split a multi-channel noise gate's composite cases into their atomic
    /// per-channel components (joined by [DemTarget::separator]) instead of one
    /// fused target set. Construction-based: always valid, not always the most
    /// compact decomposition.
    pub decompose_errors: bool,
    /// Attempt to fold a fully shape-periodic `REPEAT` body's error output into a
    /// `repeat` block instead of emitting every iteration flat. Detection is
    /// retrospective (every iteration is still walked for correctness); only the
    /// *output* is compacted, so this doesn't save analysis work the way the
    /// upstream tortoise/hare algorithm does.
    pub fold_loops: bool,
    /// When a measurement/reset/initialization gauge check finds a non-empty,
    /// non-observable sensitivity set, treat it as a 50% "gauge detector" error
    /// mechanism instead of failing. When `false`, any non-determinism is an error.
    pub allow_gauge_detectors: bool,
    /// Reject an individual decomposed/disjoint error mechanism whose probability
    /// would exceed this threshold (mirrors `approximate_disjoint_errors` guarding
    /// against wildly over-mixed channels slipping through silently).
    pub approximate_disjoint_errors_threshold: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            decompose_errors: true,
            fold_loops: true,
            allow_gauge_detectors: false,
            approximate_disjoint_errors_threshold: 1.0,
        }
    }
}

/// Errors raised while analyzing a circuit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalyzerError {
    /// The input circuit failed its own structural validation.
    #[error("invalid circuit: {0}")]
    Circuit(#[from] CircuitError),
    /// The tracker rejected an operation (out-of-range qubit, bad lookback, ...).
    #[error("{0}")]
    Tracker(#[from] ReverseTrackerError),
    /// The accumulated model failed its own structural validation.
    #[error("invalid detector error model: {0}")]
    Dem(#[from] DemError),
    /// A measurement's, reset's, or the circuit's initial state's determinism
    /// couldn't be established: a sensitivity set that should have collapsed to
    /// empty didn't, and either gauge detectors are disallowed or the set touches
    /// a logical observable (which can never be a gauge degree of freedom).
    #[error("non-deterministic {context} on qubit {qubit} (references a logical observable: {observable})")]
    NonDeterministic {
        /// Where the check failed: `"measurement"`, `"reset"`, or `"initialization"`.
        context: &'static str,
        /// The offending qubit.
        qubit: usize,
        /// Whether the unresolved sensitivity set touches a logical observable.
        observable: bool,
    },
    /// A `DEPOLARIZE1`/`DEPOLARIZE2` probability exceeded the channel's fully
    /// mixing rate (`3/4` and `15/16` respectively).
    #[error("probability {probability} is over the mixing rate for {gate:?}")]
    OverMixingProbability {
        /// The offending gate.
        gate: GateType,
        /// The probability that was out of range.
        probability: f64,
    },
    /// A disjoint-to-independent decomposed probability exceeded
    /// [AnalyzerConfig::approximate_disjoint_errors_threshold].
    #[error("decomposed probability {probability} exceeds the configured threshold {threshold}")]
    DisjointProbabilityTooLarge {
        /// The probability that was rejected.
        probability: f64,
        /// The threshold it was checked against.
        threshold: f64,
    },
    /// This analyzer has no backward noise-to-mechanism rule for this gate.
    #[error("gate {0:?} has no reverse error rule")]
    UnsupportedGate(GateType),
    /// An `ELSE_CORRELATED_ERROR` appeared without a preceding `CORRELATED_ERROR`
    /// to chain from, or a chain was left open at the end of a block.
    #[error("CORRELATED_ERROR/ELSE_CORRELATED_ERROR chain is malformed or unterminated")]
    MalformedCorrelatedErrorChain,
}

/// The canonical key an accumulated error mechanism is stored under: its
/// (already sorted, deduplicated) target list plus the free-form tag circuits
/// carry through. Two mechanisms with the same key combine via [Walker::merge_error]
/// rather than appearing as separate `error(...)` rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ErrorKey {
    targets: Vec<DemTarget>,
    tag: Option<Box<str>>,
}

struct PendingChainLink {
    probability: f64,
    set: SparseXorVec<DemTarget>,
    tag: Option<Box<str>>,
}

struct Walker<'a> {
    tracker: ReverseFrameTracker,
    config: &'a AnalyzerConfig,
    errors: HashMap<ErrorKey, f64>,
    dem: DetectorErrorModel,
    /// `CORRELATED_ERROR`/`ELSE_CORRELATED_ERROR` links collected while walking
    /// backward, in backward-encounter order (so the chain's first-in-forward-
    /// order link, a `CORRELATED_ERROR`, is always the *last* one pushed).
    chain: Vec<PendingChainLink>,
}

impl<'a> Walker<'a> {
    fn merge_error(&mut self, mut targets: Vec<DemTarget>, tag: Option<Box<str>>, probability: f64) {
        if probability <= 0.0 {
            return;
        }
        targets.sort_unstable();
        let key = ErrorKey { targets, tag };
        let entry = self.errors.entry(key).or_insert(0.0);
        *entry = *entry * (1.0 - probability) + (1.0 - *entry) * probability;
    }

    fn gauge_or_error(
        &mut self,
        set: SparseXorVec<DemTarget>,
        qubit: usize,
        context: &'static str,
    ) -> Result<bool, AnalyzerError> {
        if set.is_empty() {
            return Ok(false);
        }
        let observable = set.iter().any(|t| t.is_observable_id());
        if self.config.allow_gauge_detectors && !observable {
            log::debug!("qubit {qubit} {context} is non-deterministic, adding a gauge detector");
            self.merge_error(set.as_slice().to_vec(), None, 0.5);
            Ok(true)
        } else {
            Err(AnalyzerError::NonDeterministic { context, qubit, observable })
        }
    }

    fn check_measurement_gauge(&mut self, q: usize, basis: Axis) -> Result<(), AnalyzerError> {
        match basis {
            Axis::X => {
                let set = self.tracker.zs(q).clone();
                if self.gauge_or_error(set.clone(), q, "measurement")? {
                    self.tracker.xor_axis(q, Axis::Z, &set)?;
                }
            }
            Axis::Z => {
                let set = self.tracker.xs(q).clone();
                if self.gauge_or_error(set.clone(), q, "measurement")? {
                    self.tracker.xor_axis(q, Axis::X, &set)?;
                }
            }
            Axis::Y => {
                let diff = self.tracker.xs(q).xor_merge(self.tracker.zs(q));
                if diff.is_empty() {
                    return Ok(());
                }
                if self.gauge_or_error(diff.clone(), q, "measurement")? {
                    self.tracker.xor_axis(q, Axis::Z, &diff)?;
                }
            }
        }
        Ok(())
    }

    fn check_reset_gauge(
        &mut self,
        q: usize,
        basis: Axis,
        before_x: SparseXorVec<DemTarget>,
        before_z: SparseXorVec<DemTarget>,
    ) -> Result<(), AnalyzerError> {
        match basis {
            Axis::X => {
                self.gauge_or_error(before_z, q, "reset")?;
            }
            Axis::Z => {
                self.gauge_or_error(before_x, q, "reset")?;
            }
            Axis::Y => {
                let diff = before_x.xor_merge(&before_z);
                if !diff.is_empty() {
                    self.gauge_or_error(diff, q, "reset")?;
                }
            }
        }
        Ok(())
    }

    fn axis_contribution(&self, q: usize, axis: Axis) -> SparseXorVec<DemTarget> {
        match axis {
            Axis::X => self.tracker.zs(q).clone(),
            Axis::Z => self.tracker.xs(q).clone(),
            Axis::Y => self.tracker.xs(q).xor_merge(self.tracker.zs(q)),
        }
    }

    fn term_anticommuting_set(&self, term: &[(usize, Axis)]) -> SparseXorVec<DemTarget> {
        let mut acc = SparseXorVec::new();
        for &(q, axis) in term {
            acc = acc.xor_merge(&self.axis_contribution(q, axis));
        }
        acc
    }

    /// Undo one product measurement (a single-qubit `M`/`MX`/`MY`, one pair of
    /// `MXX`/`MYY`/`MZZ`, or one `MPP` term): pop one measurement index, XOR its
    /// dependency set into every qubit's own axis, then check the product's joint
    /// anticommuting sensitivity and collapse it if it's a permissible gauge.
    ///
    /// Mirrors [crate::frame_sim::FrameSimulator::mpp]'s own simplification (the
    /// net effect of a basis-change/CNOT-cascade/uncompute decomposition collapses
    /// to a flat per-qubit axis sum when only frame bits are tracked) rather than
    /// literally replaying that decomposition backward.
    fn undo_product_measurement(&mut self, term: &[(usize, Axis)]) -> Result<(), AnalyzerError> {
        let (first_q, first_axis) = *term.first().ok_or(AnalyzerError::MalformedCorrelatedErrorChain)?;
        let dep = self.tracker.undo_measurement(first_q, first_axis)?;
        for &(q, axis) in &term[1..] {
            self.tracker.xor_axis(q, axis, &dep)?;
        }
        let combined = self.term_anticommuting_set(term);
        if combined.is_empty() {
            return Ok(());
        }
        if self.gauge_or_error(combined.clone(), first_q, "measurement")? {
            let clear_axis = match first_axis {
                Axis::X => Axis::Z,
                Axis::Z => Axis::X,
                Axis::Y => Axis::Z,
            };
            self.tracker.xor_axis(first_q, clear_axis, &combined)?;
        }
        Ok(())
    }

    fn parse_pauli_terms(targets: &[GateTarget]) -> Vec<Vec<(usize, Axis)>> {
        let mut terms: Vec<Vec<(usize, Axis)>> = Vec::new();
        let mut joined = false;
        for &t in targets {
            if t.is_combiner() {
                joined = true;
                continue;
            }
            let axis = match (t.is_x_target(), t.is_z_target()) {
                (true, true) => Axis::Y,
                (true, false) => Axis::X,
                _ => Axis::Z,
            };
            let entry = (t.qubit_value() as usize, axis);
            if joined {
                terms.last_mut().expect("combiner never leads a target list").push(entry);
            } else {
                terms.push(vec![entry]);
            }
            joined = false;
        }
        terms
    }

    fn record_detector_like(
        &mut self,
        target: DemTarget,
        targets: &[GateTarget],
    ) -> Result<(), AnalyzerError> {
        for &t in targets {
            let idx = self.tracker.resolve_lookback(t.rec_offset())?;
            self.tracker.record_dependency(idx, target);
        }
        Ok(())
    }

    fn combine_components(components: &[&SparseXorVec<DemTarget>], decompose: bool) -> Vec<DemTarget> {
        if components.len() <= 1 || !decompose {
            let mut acc = SparseXorVec::new();
            for c in components {
                acc = acc.xor_merge(c);
            }
            acc.as_slice().to_vec()
        } else {
            let mut out = Vec::new();
            for (i, c) in components.iter().enumerate() {
                if i > 0 {
                    out.push(DemTarget::separator());
                }
                out.extend_from_slice(c.as_slice());
            }
            out
        }
    }

    fn check_threshold(&self, probability: f64) -> Result<(), AnalyzerError> {
        if probability > self.config.approximate_disjoint_errors_threshold {
            return Err(AnalyzerError::DisjointProbabilityTooLarge {
                probability,
                threshold: self.config.approximate_disjoint_errors_threshold,
            });
        }
        Ok(())
    }

    /// Shared by [Self::undo_depolarize1] and [Self::undo_heralded_erase]: fold an
    /// already-independent single-qubit depolarizing rate into the model across
    /// qubit `q`'s X/Y/Z cases.
    fn merge_depolarize1_channel(&mut self, q: usize, q_chan: f64, tag: Option<Box<str>>) {
        let basis_x = self.tracker.zs(q).clone();
        let basis_z = self.tracker.xs(q).clone();
        let basis = [&basis_x, &basis_z];
        for mask in 1..=3usize {
            let components: Vec<&SparseXorVec<DemTarget>> =
                decomp::basis_indices_for_mask(mask, 2).into_iter().map(|i| basis[i]).collect();
            let targets = Self::combine_components(&components, self.config.decompose_errors);
            self.merge_error(targets, tag.clone(), q_chan);
        }
    }

    /// Shared by [Self::undo_pauli_channel1] and
    /// [Self::undo_heralded_pauli_channel1]: fold independent per-Pauli rates
    /// `qx`/`qy`/`qz` into the model on qubit `q`.
    fn merge_xyz_channel(&mut self, q: usize, qx: f64, qy: f64, qz: f64, tag: Option<Box<str>>) {
        let x_target = self.tracker.zs(q).as_slice().to_vec();
        let z_target = self.tracker.xs(q).as_slice().to_vec();
        let y_target = self.tracker.xs(q).xor_merge(self.tracker.zs(q)).as_slice().to_vec();
        self.merge_error(x_target, tag.clone(), qx);
        self.merge_error(y_target, tag.clone(), qy);
        self.merge_error(z_target, tag, qz);
    }

    fn undo_depolarize1(&mut self, qubits: &[usize], p: f64) -> Result<(), AnalyzerError> {
        if p > 0.75 {
            return Err(AnalyzerError::OverMixingProbability { gate: GateType::DEPOLARIZE1, probability: p });
        }
        let q_chan = decomp::depolarize1_to_independent(p);
        self.check_threshold(q_chan)?;
        for &q in qubits {
            self.merge_depolarize1_channel(q, q_chan, None);
        }
        Ok(())
    }

    /// `HERALDED_ERASE(p)` fires independently of qubit state with probability
    /// `p`; conditioned on firing, the qubit is left in a uniformly random Pauli
    /// state (I/X/Y/Z each with probability 1/4), so unconditionally it's a
    /// `3p/4` depolarizing channel. The herald result is its own record row,
    /// uncorrelated with any qubit's stabilizers, so it's discarded the same way
    /// [Self::undo_instruction]'s `MPAD` arm discards its rows.
    fn undo_heralded_erase(&mut self, targets: &[GateTarget], p: f64, tag: Option<Box<str>>) -> Result<(), AnalyzerError> {
        let q_chan = decomp::depolarize1_to_independent(3.0 * p / 4.0);
        self.check_threshold(q_chan)?;
        for &t in targets.iter().rev() {
            let q = t.qubit_value() as usize;
            self.tracker.discard_measurement();
            self.merge_depolarize1_channel(q, q_chan, tag.clone());
        }
        Ok(())
    }

    /// Mask (1..=15) over the four virtual bits [Self::undo_depolarize2] decomposes
    /// a two-qubit channel into (`xa, za, xb, zb`), mapped to the index of the
    /// matching case in `PAULI_CHANNEL_2`'s canonical
    /// `IX,IY,IZ,XI,XX,XY,XZ,YI,YX,YY,YZ,ZI,ZX,ZY,ZZ` argument order. Index 0 is
    /// unused (mask is never 0 here).
    const PAULI_CHANNEL_2_ARG_FOR_MASK: [usize; 16] = [0, 3, 11, 7, 0, 4, 12, 8, 2, 6, 14, 10, 1, 5, 13, 9];

    /// Unlike [Self::undo_depolarize2], treats each of the 15 arguments as already
    /// an independent probability instead of running a disjoint-to-independent
    /// solve: `PAULI_CHANNEL_2` isn't symmetric across its cases the way
    /// `DEPOLARIZE2` is, and a correct multi-variable solve for 15 non-uniform
    /// cases isn't grounded anywhere else in this crate. [Self::check_threshold]
    /// guards against this silently mismodeling a heavily mixed channel.
    fn undo_pauli_channel2(&mut self, pairs: &[(usize, usize)], args: &[f64], tag: Option<Box<str>>) -> Result<(), AnalyzerError> {
        for &(a, b) in pairs {
            let basis_xa = self.tracker.zs(a).clone();
            let basis_za = self.tracker.xs(a).clone();
            let basis_xb = self.tracker.zs(b).clone();
            let basis_zb = self.tracker.xs(b).clone();
            let basis = [&basis_xa, &basis_za, &basis_xb, &basis_zb];
            for mask in 1..=15usize {
                let p = args[Self::PAULI_CHANNEL_2_ARG_FOR_MASK[mask]];
                self.check_threshold(p)?;
                let components: Vec<&SparseXorVec<DemTarget>> =
                    decomp::basis_indices_for_mask(mask, 4).into_iter().map(|i| basis[i]).collect();
                let targets = Self::combine_components(&components, self.config.decompose_errors);
                self.merge_error(targets, tag.clone(), p);
            }
        }
        Ok(())
    }

    fn undo_depolarize2(&mut self, pairs: &[(usize, usize)], p: f64) -> Result<(), AnalyzerError> {
        if p > 15.0 / 16.0 {
            return Err(AnalyzerError::OverMixingProbability { gate: GateType::DEPOLARIZE2, probability: p });
        }
        let q_chan = decomp::depolarize2_to_independent(p);
        self.check_threshold(q_chan)?;
        for &(a, b) in pairs {
            let basis_xa = self.tracker.zs(a).clone();
            let basis_za = self.tracker.xs(a).clone();
            let basis_xb = self.tracker.zs(b).clone();
            let basis_zb = self.tracker.xs(b).clone();
            let basis = [&basis_xa, &basis_za, &basis_xb, &basis_zb];
            for mask in 1..=15usize {
                let components: Vec<&SparseXorVec<DemTarget>> =
                    decomp::basis_indices_for_mask(mask, 4).into_iter().map(|i| basis[i]).collect();
                let targets = Self::combine_components(&components, self.config.decompose_errors);
                self.merge_error(targets, None, q_chan);
            }
        }
        Ok(())
    }

    fn undo_pauli_channel1(&mut self, qubits: &[usize], px: f64, py: f64, pz: f64) -> Result<(), AnalyzerError> {
        let (qx, qy, qz) = decomp::disjoint_xyz_to_independent(px, py, pz);
        self.check_threshold(qx)?;
        self.check_threshold(qy)?;
        self.check_threshold(qz)?;
        for &q in qubits {
            self.merge_xyz_channel(q, qx, qy, qz, None);
        }
        Ok(())
    }

    /// `HERALDED_PAULI_CHANNEL_1(p_i, p_x, p_y, p_z)` gives `p_x`/`p_y`/`p_z` as
    /// absolute (disjoint) probabilities already, the same convention
    /// `PAULI_CHANNEL_1` uses, so the Pauli-error contribution reduces directly to
    /// [Self::undo_pauli_channel1]'s own solve. The herald result is its own
    /// record row, discarded the same way `MPAD`'s rows are.
    fn undo_heralded_pauli_channel1(
        &mut self,
        targets: &[GateTarget],
        args: &[f64],
        tag: Option<Box<str>>,
    ) -> Result<(), AnalyzerError> {
        let (qx, qy, qz) = decomp::disjoint_xyz_to_independent(args[1], args[2], args[3]);
        self.check_threshold(qx)?;
        self.check_threshold(qy)?;
        self.check_threshold(qz)?;
        for &t in targets.iter().rev() {
            let q = t.qubit_value() as usize;
            self.tracker.discard_measurement();
            self.merge_xyz_channel(q, qx, qy, qz, tag.clone());
        }
        Ok(())
    }

    /// Flush the collected `CORRELATED_ERROR`/`ELSE_CORRELATED_ERROR` chain. The
    /// chain was pushed in backward-encounter order, so reversing it restores true
    /// forward order (`CORRELATED_ERROR` first); the standard ELSE-chain
    /// marginal-probability formula (`p_i * prod_{j<i}(1-p_j)`) is then applied
    /// left to right.
    fn flush_chain(&mut self) -> Result<(), AnalyzerError> {
        let mut links = std::mem::take(&mut self.chain);
        links.reverse();
        let mut remaining = 1.0;
        for link in links {
            let actual_p = link.probability * remaining;
            remaining *= 1.0 - link.probability;
            self.check_threshold(actual_p)?;
            self.merge_error(link.set.as_slice().to_vec(), link.tag, actual_p);
        }
        Ok(())
    }

    fn undo_instruction(&mut self, circuit: &Circuit, instr: &CircuitInstruction) -> Result<(), AnalyzerError> {
        use GateType::*;

        let targets = circuit.targets(instr);
        let args = circuit.args(instr);
        let gate = instr.gate;

        if gate != CORRELATED_ERROR && gate != ELSE_CORRELATED_ERROR && !self.chain.is_empty() {
            return Err(AnalyzerError::MalformedCorrelatedErrorChain);
        }

        match gate {
            Detector | Tick | QubitCoords | ShiftCoords | Repeat => {
                if gate == Detector {
                    let id = self.tracker.next_detector_id();
                    let target = DemTarget::relative_detector_id(id as u64);
                    self.record_detector_like(target, targets)?;
                    self.dem.push_detector(&[], target)?;
                }
                Ok(())
            }
            ObservableInclude => {
                let id = args[0] as u32;
                let target = DemTarget::observable_id(id);
                self.record_detector_like(target, targets)?;
                Ok(())
            }

            I => Ok(()),
            H => self.for_each_qubit_rev(targets, ReverseFrameTracker::h),
            H_XY => self.for_each_qubit_rev(targets, ReverseFrameTracker::h_xy),
            H_YZ => self.for_each_qubit_rev(targets, ReverseFrameTracker::h_yz),
            X | Y | Z => self.for_each_qubit_rev(targets, ReverseFrameTracker::pauli_noop),
            C_XYZ => self.for_each_qubit_rev(targets, ReverseFrameTracker::c_xyz),
            C_ZYX => self.for_each_qubit_rev(targets, ReverseFrameTracker::c_zyx),
            SQRT_X | SQRT_X_DAG => self.for_each_qubit_rev(targets, ReverseFrameTracker::sqrt_x),
            SQRT_Y | SQRT_Y_DAG => self.for_each_qubit_rev(targets, ReverseFrameTracker::sqrt_y),
            S | S_DAG => self.for_each_qubit_rev(targets, ReverseFrameTracker::s),

            CX => self.for_each_pair_rev(targets, ReverseFrameTracker::cx),
            CY => self.for_each_pair_rev(targets, ReverseFrameTracker::cy),
            CZ => self.for_each_pair_rev(targets, ReverseFrameTracker::cz),
            XCX => self.for_each_pair_rev(targets, ReverseFrameTracker::xcx),
            XCY => self.for_each_pair_rev(targets, ReverseFrameTracker::xcy),
            XCZ => self.for_each_pair_rev(targets, ReverseFrameTracker::xcz),
            YCX => self.for_each_pair_rev(targets, ReverseFrameTracker::ycx),
            YCY => self.for_each_pair_rev(targets, ReverseFrameTracker::ycy),
            YCZ => self.for_each_pair_rev(targets, ReverseFrameTracker::ycz),
            SWAP => self.for_each_pair_rev(targets, ReverseFrameTracker::swap),
            ISWAP | ISWAP_DAG => self.for_each_pair_rev(targets, ReverseFrameTracker::iswap),
            CXSWAP => self.for_each_pair_rev(targets, ReverseFrameTracker::cxswap),
            SWAPCX => self.for_each_pair_rev(targets, ReverseFrameTracker::swapcx),
            SQRT_XX => self.for_each_pair_rev(targets, ReverseFrameTracker::sqrt_xx),
            SQRT_YY => self.for_each_pair_rev(targets, ReverseFrameTracker::sqrt_yy),
            SQRT_ZZ => self.for_each_pair_rev(targets, ReverseFrameTracker::sqrt_zz),

            M => self.undo_measure_targets(targets, Axis::Z),
            MX => self.undo_measure_targets(targets, Axis::X),
            MY => self.undo_measure_targets(targets, Axis::Y),
            R => self.undo_reset_targets(targets, Axis::Z),
            RX => self.undo_reset_targets(targets, Axis::X),
            RY => self.undo_reset_targets(targets, Axis::Y),
            MR => self.undo_measure_reset_targets(targets, Axis::Z),
            MRX => self.undo_measure_reset_targets(targets, Axis::X),
            MRY => self.undo_measure_reset_targets(targets, Axis::Y),
            MXX => self.undo_pair_measure_targets(targets, Axis::X),
            MYY => self.undo_pair_measure_targets(targets, Axis::Y),
            MZZ => self.undo_pair_measure_targets(targets, Axis::Z),
            MPP => {
                for term in Self::parse_pauli_terms(targets).into_iter().rev() {
                    self.undo_product_measurement(&term)?;
                }
                Ok(())
            }
            MPAD => {
                for _ in 0..args.len() {
                    self.tracker.discard_measurement();
                }
                Ok(())
            }

            X_ERROR => {
                for &q in &Self::plain_qubits(targets) {
                    let set = self.tracker.zs(q).as_slice().to_vec();
                    self.merge_error(set, instr.tag.clone(), args[0]);
                }
                Ok(())
            }
            Z_ERROR => {
                for &q in &Self::plain_qubits(targets) {
                    let set = self.tracker.xs(q).as_slice().to_vec();
                    self.merge_error(set, instr.tag.clone(), args[0]);
                }
                Ok(())
            }
            Y_ERROR => {
                for &q in &Self::plain_qubits(targets) {
                    let set = self.tracker.xs(q).xor_merge(self.tracker.zs(q)).as_slice().to_vec();
                    self.merge_error(set, instr.tag.clone(), args[0]);
                }
                Ok(())
            }
            DEPOLARIZE1 => self.undo_depolarize1(&Self::plain_qubits(targets), args[0]),
            DEPOLARIZE2 => self.undo_depolarize2(&Self::plain_pairs(targets), args[0]),
            PAULI_CHANNEL_1 => self.undo_pauli_channel1(&Self::plain_qubits(targets), args[0], args[1], args[2]),

            CORRELATED_ERROR => {
                let term = Self::parse_pauli_terms(targets).into_iter().next().unwrap_or_default();
                let set = self.term_anticommuting_set_as_targets(&term);
                self.chain.push(PendingChainLink { probability: args[0], set, tag: instr.tag.clone() });
                self.flush_chain()
            }
            ELSE_CORRELATED_ERROR => {
                let term = Self::parse_pauli_terms(targets).into_iter().next().unwrap_or_default();
                let set = self.term_anticommuting_set_as_targets(&term);
                self.chain.push(PendingChainLink { probability: args[0], set, tag: instr.tag.clone() });
                Ok(())
            }

            PAULI_CHANNEL_2 => self.undo_pauli_channel2(&Self::plain_pairs(targets), args, instr.tag.clone()),
            HERALDED_ERASE => self.undo_heralded_erase(targets, args[0], instr.tag.clone()),
            HERALDED_PAULI_CHANNEL_1 => self.undo_heralded_pauli_channel1(targets, args, instr.tag.clone()),

            other => Err(AnalyzerError::UnsupportedGate(other)),
        }
    }

    /// A `CORRELATED_ERROR` target list names a Pauli product directly (not an
    /// anticommuting check against a measurement); its flipped-target set is the
    /// XOR of each named qubit's own axis contribution, same construction as
    /// [Self::term_anticommuting_set] reuses for the product-measurement check.
    fn term_anticommuting_set_as_targets(&self, term: &[(usize, Axis)]) -> SparseXorVec<DemTarget> {
        self.term_anticommuting_set(term)
    }

    fn plain_qubits(targets: &[GateTarget]) -> Vec<usize> {
        targets.iter().map(|t| t.qubit_value() as usize).collect()
    }

    fn plain_pairs(targets: &[GateTarget]) -> Vec<(usize, usize)> {
        targets.chunks_exact(2).map(|p| (p[0].qubit_value() as usize, p[1].qubit_value() as usize)).collect()
    }

    fn for_each_qubit_rev(
        &mut self,
        targets: &[GateTarget],
        f: fn(&mut ReverseFrameTracker, usize) -> Result<(), ReverseTrackerError>,
    ) -> Result<(), AnalyzerError> {
        for &t in targets.iter().rev() {
            f(&mut self.tracker, t.qubit_value() as usize)?;
        }
        Ok(())
    }

    fn for_each_pair_rev(
        &mut self,
        targets: &[GateTarget],
        f: fn(&mut ReverseFrameTracker, usize, usize) -> Result<(), ReverseTrackerError>,
    ) -> Result<(), AnalyzerError> {
        for pair in targets.chunks_exact(2).rev() {
            f(&mut self.tracker, pair[0].qubit_value() as usize, pair[1].qubit_value() as usize)?;
        }
        Ok(())
    }

    fn undo_measure_targets(&mut self, targets: &[GateTarget], basis: Axis) -> Result<(), AnalyzerError> {
        for &t in targets.iter().rev() {
            let q = t.qubit_value() as usize;
            self.tracker.undo_measurement(q, basis)?;
            self.check_measurement_gauge(q, basis)?;
        }
        Ok(())
    }

    fn undo_reset_targets(&mut self, targets: &[GateTarget], basis: Axis) -> Result<(), AnalyzerError> {
        for &t in targets.iter().rev() {
            let q = t.qubit_value() as usize;
            let (before_x, before_z) = self.tracker.undo_reset(q)?;
            self.check_reset_gauge(q, basis, before_x, before_z)?;
        }
        Ok(())
    }

    fn undo_measure_reset_targets(&mut self, targets: &[GateTarget], basis: Axis) -> Result<(), AnalyzerError> {
        for &t in targets.iter().rev() {
            let q = t.qubit_value() as usize;
            let (before_x, before_z) = self.tracker.undo_reset(q)?;
            self.check_reset_gauge(q, basis, before_x, before_z)?;
            self.tracker.undo_measurement(q, basis)?;
            self.check_measurement_gauge(q, basis)?;
        }
        Ok(())
    }

    fn undo_pair_measure_targets(&mut self, targets: &[GateTarget], basis: Axis) -> Result<(), AnalyzerError> {
        for pair in targets.chunks_exact(2).rev() {
            let a = pair[0].qubit_value() as usize;
            let b = pair[1].qubit_value() as usize;
            self.undo_product_measurement(&[(a, basis), (b, basis)])?;
        }
        Ok(())
    }

    fn undo_circuit(&mut self, circuit: &Circuit) -> Result<(), AnalyzerError> {
        for instr in circuit.instructions.iter().rev() {
            if let Some((block_index, count)) = instr.repeat_block(circuit) {
                self.run_loop(&circuit.blocks[block_index], count)?;
                continue;
            }
            self.undo_instruction(circuit, instr)?;
        }
        Ok(())
    }

    fn run_loop(&mut self, body: &Circuit, count: u64) -> Result<(), AnalyzerError> {
        if !self.config.fold_loops || count < 2 {
            for _ in 0..count {
                self.undo_circuit(body)?;
            }
            return Ok(());
        }

        let mut iteration_errors: Vec<HashMap<ErrorKey, f64>> = Vec::with_capacity(count as usize);
        let mut before_detectors: Vec<usize> = Vec::with_capacity(count as usize);
        let mut after_detectors: Vec<usize> = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let (_, before) = self.tracker.counters();
            let saved = std::mem::take(&mut self.errors);
            self.undo_circuit(body)?;
            let this_iter = std::mem::replace(&mut self.errors, saved);
            let (_, after) = self.tracker.counters();
            iteration_errors.push(this_iter);
            before_detectors.push(before);
            after_detectors.push(after);
        }

        if let Some(body_dem) = self.try_fold(&iteration_errors, &before_detectors, &after_detectors) {
            log::debug!("folded a {count}-iteration repeat block into one representative body");
            self.dem.push_repeat(count, body_dem)?;
        } else {
            log::trace!("{count}-iteration repeat block isn't shape-periodic, emitting flat");
            for iter_errors in iteration_errors {
                for (key, p) in iter_errors {
                    let entry = self.errors.entry(key).or_insert(0.0);
                    *entry = *entry * (1.0 - p) + (1.0 - *entry) * p;
                }
            }
        }
        Ok(())
    }

    /// Every iteration's error map must be an exact detector-id-shifted copy of
    /// the first iteration's, and every iteration must consume the same number of
    /// detector ids, for the whole loop to fold into one `repeat` block. A
    /// deliberately simplified stand-in for general-period tortoise/hare
    /// detection: only the trivial (period covering the whole remaining loop)
    /// case is recognized.
    fn try_fold(
        &self,
        iteration_errors: &[HashMap<ErrorKey, f64>],
        before: &[usize],
        after: &[usize],
    ) -> Option<DetectorErrorModel> {
        let n = iteration_errors.len();
        if n < 2 {
            return None;
        }
        let stride = before[0] as i64 - after[0] as i64;
        for i in 0..n {
            if before[i] as i64 - after[i] as i64 != stride {
                return None;
            }
        }
        for i in 1..n {
            let shift = before[0] as i64 - before[i] as i64;
            if !errors_match_shifted(&iteration_errors[0], &iteration_errors[i], shift) {
                return None;
            }
        }
        let base = after[0] as i64;
        let mut body_dem = DetectorErrorModel::new();
        for (key, &p) in &iteration_errors[0] {
            if p <= 0.0 {
                continue;
            }
            let shifted: Vec<DemTarget> = key.targets.iter().map(|t| t.shifted(-base)).collect();
            body_dem.push_error(p, &shifted, key.tag.clone()).ok()?;
        }
        Some(body_dem)
    }

    fn flush(&mut self) -> Result<(), AnalyzerError> {
        for (key, p) in std::mem::take(&mut self.errors) {
            if p <= 0.0 {
                continue;
            }
            self.dem.push_error(p, &key.targets, key.tag)?;
        }
        Ok(())
    }

    fn check_initialization(&mut self) -> Result<(), AnalyzerError> {
        for q in 0..self.tracker.num_qubits() {
            let set = self.tracker.xs(q).clone();
            self.gauge_or_error(set, q, "initialization")?;
        }
        Ok(())
    }
}

fn errors_match_shifted(a: &HashMap<ErrorKey, f64>, b: &HashMap<ErrorKey, f64>, shift: i64) -> bool {
    if a.len() != b.len() {
        return false;
    }
    for (key, &pa) in a {
        let shifted_targets: Vec<DemTarget> = {
            let mut v: Vec<DemTarget> = key.targets.iter().map(|t| t.shifted(shift)).collect();
            v.sort_unstable();
            v
        };
        let shifted_key = ErrorKey { targets: shifted_targets, tag: key.tag.clone() };
        match b.get(&shifted_key) {
            Some(&pb) if (pa - pb).abs() < 1e-12 => {}
            _ => return false,
        }
    }
    true
}

/// Walk `circuit` backward, turning every noise instruction into one or more
/// independent [DetectorErrorModel] mechanisms.
///
/// # Errors
/// See [AnalyzerError]'s variants: a malformed circuit, a tracker-level error
/// (bad lookback, out-of-range qubit), a non-deterministic measurement/reset/
/// initialization under the configured gauge policy, an over-mixed or
/// over-threshold noise probability, or an unsupported gate.
pub fn analyze(circuit: &Circuit, config: &AnalyzerConfig) -> Result<DetectorErrorModel, AnalyzerError> {
    circuit.validate()?;
    let stats = circuit.compute_stats();
    let mut walker = Walker {
        tracker: ReverseFrameTracker::new(stats.num_qubits, stats.num_measurements as usize, stats.num_detectors as usize),
        config,
        errors: HashMap::new(),
        dem: DetectorErrorModel::new(),
        chain: Vec::new(),
    };
    walker.undo_circuit(circuit)?;
    if !walker.chain.is_empty() {
        return Err(AnalyzerError::MalformedCorrelatedErrorChain);
    }
    walker.check_initialization()?;
    walker.flush()?;
    walker.dem.validate()?;
    Ok(walker.dem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::GateTarget;

    fn q(i: u32) -> GateTarget {
        GateTarget::qubit(i)
    }

    #[test]
    fn single_x_error_before_z_measurement_detector() {
        let mut c = Circuit::new();
        c.push(GateType::X_ERROR, &[0.1], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig::default()).unwrap();
        let mut expected = DetectorErrorModel::new();
        expected.push_error(0.1, &[DemTarget::relative_detector_id(0)], None).unwrap();
        expected.push_detector(&[], DemTarget::relative_detector_id(0)).unwrap();
        assert!(dem.approx_equals(&expected, 1e-9));
    }

    #[test]
    fn z_error_is_invisible_to_z_detector() {
        let mut c = Circuit::new();
        c.push(GateType::Z_ERROR, &[0.1], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig::default()).unwrap();
        let errors: Vec<_> = dem
            .instructions
            .iter()
            .filter(|i| i.kind == crate::dem::DemInstructionKind::Error)
            .collect();
        assert!(errors.is_empty());
    }

    #[test]
    fn depolarize1_produces_three_mechanisms_per_qubit() {
        let mut c = Circuit::new();
        c.push(GateType::DEPOLARIZE1, &[0.3], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig { decompose_errors: false, ..AnalyzerConfig::default() }).unwrap();
        let errors: Vec<_> = dem
            .instructions
            .iter()
            .filter(|i| i.kind == crate::dem::DemInstructionKind::Error)
            .collect();
        // Only the X-case (zs[0]) actually flips the Z-basis detector; Z-case and
        // Y-case touch xs[0], which nothing downstream reads here, so they vanish
        // (empty target set, never merged).
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn repeated_repetition_code_round_folds_to_a_repeat_block() {
        let mut body = Circuit::new();
        body.push(GateType::X_ERROR, &[0.1], &[q(0)], None).unwrap();
        body.push(GateType::M, &[], &[q(0)], None).unwrap();
        body.push(GateType::Detector, &[], &[GateTarget::rec(1), GateTarget::rec(2)], None).unwrap();
        body.push(GateType::M, &[], &[q(0)], None).unwrap();

        let mut c = Circuit::new();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push_repeat(20, body).unwrap();

        let dem = analyze(&c, &AnalyzerConfig::default()).unwrap();
        let has_repeat = dem.instructions.iter().any(|i| i.kind == crate::dem::DemInstructionKind::Repeat);
        assert!(has_repeat, "expected the periodic tail to fold into a repeat block");
    }

    #[test]
    fn non_deterministic_measurement_errors_without_gauge_detectors() {
        let mut c = Circuit::new();
        c.push(GateType::H, &[], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let err = analyze(&c, &AnalyzerConfig::default()).unwrap_err();
        assert!(matches!(err, AnalyzerError::NonDeterministic { .. }));
    }

    #[test]
    fn non_deterministic_measurement_becomes_gauge_detector_when_allowed() {
        let mut c = Circuit::new();
        c.push(GateType::H, &[], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let config = AnalyzerConfig { allow_gauge_detectors: true, ..AnalyzerConfig::default() };
        let dem = analyze(&c, &config).unwrap();
        let errors: Vec<_> = dem
            .instructions
            .iter()
            .filter(|i| i.kind == crate::dem::DemInstructionKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(dem.args(errors[0])[0], 0.5);
    }

    #[test]
    fn heralded_erase_reduces_to_a_3p_over_4_depolarizing_channel() {
        let mut c = Circuit::new();
        c.push(GateType::HERALDED_ERASE, &[0.2], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig { decompose_errors: false, ..AnalyzerConfig::default() }).unwrap();
        let errors: Vec<_> = dem
            .instructions
            .iter()
            .filter(|i| i.kind == crate::dem::DemInstructionKind::Error)
            .collect();
        // Same reasoning as `depolarize1_produces_three_mechanisms_per_qubit`: only
        // the X-case reaches the Z-basis detector.
        assert_eq!(errors.len(), 1);
        let expected = decomp::depolarize1_to_independent(3.0 * 0.2 / 4.0);
        assert!((dem.args(errors[0])[0] - expected).abs() < 1e-9);
    }

    #[test]
    fn heralded_erase_herald_bit_can_be_referenced_without_becoming_an_error() {
        let mut c = Circuit::new();
        c.push(GateType::HERALDED_ERASE, &[0.2], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig::default()).unwrap();
        let stats = c.compute_stats();
        assert_eq!(dem.num_detectors(), stats.num_detectors);
    }

    #[test]
    fn heralded_pauli_channel1_reduces_to_the_plain_disjoint_xyz_solve() {
        let mut c = Circuit::new();
        c.push(GateType::HERALDED_PAULI_CHANNEL_1, &[0.1, 0.2, 0.05, 0.05], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig { decompose_errors: false, ..AnalyzerConfig::default() }).unwrap();
        let errors: Vec<_> = dem
            .instructions
            .iter()
            .filter(|i| i.kind == crate::dem::DemInstructionKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn pauli_channel_2_xi_case_flips_only_the_first_qubits_detector() {
        let mut args = [0.0; 15];
        args[3] = 0.25; // canonical order IX,IY,IZ,XI,... -> index 3 is "XI".
        let mut c = Circuit::new();
        c.push(GateType::PAULI_CHANNEL_2, &args, &[q(0), q(1)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(1)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(2)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig { decompose_errors: false, ..AnalyzerConfig::default() }).unwrap();
        let errors: Vec<_> = dem
            .instructions
            .iter()
            .filter(|i| i.kind == crate::dem::DemInstructionKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!((dem.args(errors[0])[0] - 0.25).abs() < 1e-9);
        assert_eq!(dem.targets(errors[0]), &[DemTarget::relative_detector_id(0)]);
    }

    #[test]
    fn correlated_error_chain_marginalizes_in_forward_order() {
        let mut c = Circuit::new();
        c.push(GateType::CORRELATED_ERROR, &[0.5], &[q(0)], None).unwrap();
        c.push(GateType::M, &[], &[q(0)], None).unwrap();
        c.push(GateType::Detector, &[], &[GateTarget::rec(1)], None).unwrap();

        let dem = analyze(&c, &AnalyzerConfig::default()).unwrap();
        let errors: Vec<_> = dem
            .instructions
            .iter()
            .filter(|i| i.kind == crate::dem::DemInstructionKind::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!((dem.args(errors[0])[0] - 0.5).abs() < 1e-9);
    }
}
