//! The reverse frame tracker: per-qubit sensitivity sets walked backward over a
//! circuit, mirroring [crate::frame_sim]'s forward gate table but over sparse sets
//! of [DemTarget] rather than bit rows. The engine for CORE 2 (the reverse error
//! analyzer in [crate::analyzer]) is built on top of this.

use std::collections::HashMap;

use thiserror::Error;

use crate::bits::SparseXorVec;
use crate::dem::DemTarget;
use crate::frame_sim::Axis;
use crate::gate::GateType;

/// Errors raised while driving a [ReverseFrameTracker].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReverseTrackerError {
    /// A target qubit index exceeded the tracker's qubit count.
    #[error("qubit {qubit} out of range for a {num_qubits}-qubit tracker")]
    QubitOutOfRange {
        /// The offending index.
        qubit: usize,
        /// The tracker's qubit count.
        num_qubits: usize,
    },
    /// The gate has no backward sensitivity-transform rule registered.
    #[error("gate {0:?} has no reverse sensitivity rule")]
    UnsupportedGate(GateType),
    /// A measurement index was undone (or its dependency recorded) twice, or out
    /// of the order the forward circuit would produce it in.
    #[error("measurement index {0} was already resolved")]
    MeasurementAlreadyResolved(usize),
    /// A `rec[-k]` lookback pointed further back than any measurement undone so
    /// far reaches.
    #[error("rec[-{offset}] looks back past the start, only {remaining} measurements remain")]
    LookbackOutOfRange {
        /// The lookback offset requested.
        offset: u32,
        /// How many measurements were still available to look back into.
        remaining: usize,
    },
}

/// Per-qubit `(xs, zs)` sensitivity sets, walked backward over a circuit.
///
/// `xs[q]` is the set of detectors/observables that an `X` error on qubit `q`,
/// introduced at the tracker's current (backward) position, would flip; `zs[q]`
/// likewise for `Z`. Plus a measurement/detector position counter and a table of
/// detector/observable dependencies pending on not-yet-undone measurements.
#[derive(Debug, Clone)]
pub struct ReverseFrameTracker {
    num_qubits: usize,
    xs: Vec<SparseXorVec<DemTarget>>,
    zs: Vec<SparseXorVec<DemTarget>>,
    /// Measurement index -> set of detector/observable targets waiting on it,
    /// populated when a `DETECTOR`/`OBSERVABLE_INCLUDE` referencing that index is
    /// encountered (walking backward, this happens before the measurement itself
    /// is undone) and consumed when that measurement is undone.
    pending: HashMap<usize, SparseXorVec<DemTarget>>,
    /// One past the index of the next measurement to undo (decreases as the walk
    /// proceeds backward).
    num_measurements_in_past: usize,
    /// One past the id of the next detector to undo.
    num_detectors_in_past: usize,
}

impl ReverseFrameTracker {
    /// A tracker over `num_qubits` qubits, starting at the end of a circuit that
    /// produces `total_measurements` measurement rows and `total_detectors`
    /// detectors in total (both counts fold through `REPEAT` multiplicities, e.g.
    /// from [crate::circuit::Circuit::compute_stats]).
    pub fn new(num_qubits: usize, total_measurements: usize, total_detectors: usize) -> Self {
        Self {
            num_qubits,
            xs: vec![SparseXorVec::new(); num_qubits],
            zs: vec![SparseXorVec::new(); num_qubits],
            pending: HashMap::new(),
            num_measurements_in_past: total_measurements,
            num_detectors_in_past: total_detectors,
        }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// The current `X`-sensitivity set of qubit `q`.
    pub fn xs(&self, q: usize) -> &SparseXorVec<DemTarget> {
        &self.xs[q]
    }

    /// The current `Z`-sensitivity set of qubit `q`.
    pub fn zs(&self, q: usize) -> &SparseXorVec<DemTarget> {
        &self.zs[q]
    }

    fn check_qubit(&self, q: usize) -> Result<(), ReverseTrackerError> {
        if q >= self.num_qubits {
            return Err(ReverseTrackerError::QubitOutOfRange { qubit: q, num_qubits: self.num_qubits });
        }
        Ok(())
    }

    // ----- single-qubit backward transforms -----
    //
    // Every unitary Clifford used here is bit-identical to its own inverse in this
    // frame-only (sign-insensitive) model, EXCEPT the period-3 pair `C_XYZ`/`C_ZYX`
    // and the pair `CXSWAP`/`SWAPCX`, which swap roles (see the module doc and
    // [Self::cxswap]/[Self::swapcx]). Everything else reuses exactly the forward
    // bit formula from [crate::frame_sim::FrameSimulator].

    /// `H`/`H` undone: swap `xs[q]` and `zs[q]`.
    pub fn h(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(q)?;
        std::mem::swap(&mut self.xs[q], &mut self.zs[q]);
        Ok(())
    }

    /// `S`/`S_DAG` undone (bit-identical to each other here): `zs[q] ^= xs[q]`.
    pub fn s(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(q)?;
        let merged = self.zs[q].xor_merge(&self.xs[q]);
        self.zs[q] = merged;
        Ok(())
    }

    /// `H_XY` undone, bit-identical to [Self::s].
    pub fn h_xy(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.s(q)
    }

    /// `H_YZ` undone: `xs[q] ^= zs[q]`.
    pub fn h_yz(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(q)?;
        let merged = self.xs[q].xor_merge(&self.zs[q]);
        self.xs[q] = merged;
        Ok(())
    }

    /// Pauli gates never move a sensitivity set (same reasoning as
    /// [crate::frame_sim::FrameSimulator::pauli_noop]).
    pub fn pauli_noop(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(q)
    }

    /// `SQRT_X`/`SQRT_X_DAG` undone, self-inverse here: `H;S;H`.
    pub fn sqrt_x(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.h(q)?;
        self.s(q)?;
        self.h(q)
    }

    /// `SQRT_Y`/`SQRT_Y_DAG` undone, bit-identical to [Self::h].
    pub fn sqrt_y(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.h(q)
    }

    /// `C_XYZ` undone: this is where forward and reverse genuinely diverge. The
    /// period-3 gate's inverse is `C_ZYX`, so undoing a forward `C_XYZ`
    /// application means applying `C_ZYX`'s bit rule: `xs' = zs`, `zs' = xs ^ zs`.
    pub fn c_xyz(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(q)?;
        let x = self.xs[q].clone();
        let z = self.zs[q].clone();
        self.xs[q] = z.clone();
        self.zs[q] = x.xor_merge(&z);
        Ok(())
    }

    /// `C_ZYX` undone: its inverse is `C_XYZ`: `xs' = xs ^ zs`, `zs' = xs`.
    pub fn c_zyx(&mut self, q: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(q)?;
        let x = self.xs[q].clone();
        let z = self.zs[q].clone();
        self.xs[q] = x.xor_merge(&z);
        self.zs[q] = x;
        Ok(())
    }

    // ----- two-qubit backward transforms -----

    /// `CX` undone, self-inverse: `zs[c] ^= zs[t]`, `xs[t] ^= xs[c]` (the exact
    /// formula given for this case in the original design notes).
    pub fn cx(&mut self, c: usize, t: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(c)?;
        self.check_qubit(t)?;
        let zt = self.zs[t].clone();
        self.zs[c] = self.zs[c].xor_merge(&zt);
        let xc = self.xs[c].clone();
        self.xs[t] = self.xs[t].xor_merge(&xc);
        Ok(())
    }

    /// `CZ` undone, self-inverse: `zs[c] ^= xs[t]`, `zs[t] ^= xs[c]`.
    pub fn cz(&mut self, c: usize, t: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(c)?;
        self.check_qubit(t)?;
        let xt = self.xs[t].clone();
        let xc = self.xs[c].clone();
        self.zs[c] = self.zs[c].xor_merge(&xt);
        self.zs[t] = self.zs[t].xor_merge(&xc);
        Ok(())
    }

    /// `CY` undone: `S(t); CX(c,t); S(t)`.
    pub fn cy(&mut self, c: usize, t: usize) -> Result<(), ReverseTrackerError> {
        self.s(t)?;
        self.cx(c, t)?;
        self.s(t)
    }

    /// `SWAP` undone, self-inverse: swap the sensitivity sets of `a` and `b`.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        self.xs.swap(a, b);
        self.zs.swap(a, b);
        Ok(())
    }

    /// `ISWAP`/`ISWAP_DAG` undone, self-inverse: `SWAP` then `CZ`.
    pub fn iswap(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.swap(a, b)?;
        self.cz(a, b)
    }

    /// `CXSWAP` undone. `CXSWAP = CX;SWAP` is *not* self-inverse at the bit
    /// level; its inverse is `SWAPCX = SWAP;CX`, so undoing a forward `CXSWAP`
    /// means applying `SWAPCX`'s formula.
    pub fn cxswap(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.swap(a, b)?;
        self.cx(a, b)
    }

    /// `SWAPCX` undone: the inverse of `SWAPCX` is `CXSWAP`.
    pub fn swapcx(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.cx(a, b)?;
        self.swap(a, b)
    }

    /// `XCZ`/`XCX`/`XCY`/`YCZ`/`YCX`/`YCY` undone: each is self-inverse here
    /// (an `H`- or `S`-wrap of a self-inverse base gate), same composition as
    /// the forward rule.
    pub fn xcz(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.h(a)?;
        self.cz(a, b)?;
        self.h(a)
    }

    /// See [Self::xcz].
    pub fn xcx(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.h(a)?;
        self.cx(a, b)?;
        self.h(a)
    }

    /// See [Self::xcz].
    pub fn xcy(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.h(a)?;
        self.cy(a, b)?;
        self.h(a)
    }

    /// See [Self::xcz].
    pub fn ycz(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.s(a)?;
        self.cz(a, b)?;
        self.s(a)
    }

    /// See [Self::xcz].
    pub fn ycx(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.s(a)?;
        self.cx(a, b)?;
        self.s(a)
    }

    /// See [Self::xcz].
    pub fn ycy(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.s(a)?;
        self.cy(a, b)?;
        self.s(a)
    }

    /// `SQRT_ZZ` undone, self-inverse at the bit level (it's a Pauli-product
    /// rotation; squaring it gives `ZZ`, which is itself frame-transparent):
    /// `xs[a] ^= zs[b]`, `xs[b] ^= zs[a]`.
    pub fn sqrt_zz(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        let za = self.zs[a].clone();
        let zb = self.zs[b].clone();
        self.xs[a] = self.xs[a].xor_merge(&zb);
        self.xs[b] = self.xs[b].xor_merge(&za);
        Ok(())
    }

    /// `SQRT_XX` undone, self-inverse.
    pub fn sqrt_xx(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.h(a)?;
        self.h(b)?;
        self.sqrt_zz(a, b)?;
        self.h(a)?;
        self.h(b)
    }

    /// `SQRT_YY` undone, self-inverse.
    pub fn sqrt_yy(&mut self, a: usize, b: usize) -> Result<(), ReverseTrackerError> {
        self.h_yz(a)?;
        self.h_yz(b)?;
        self.sqrt_zz(a, b)?;
        self.h_yz(a)?;
        self.h_yz(b)
    }

    // ----- measurement / reset bookkeeping -----

    /// Record that a `DETECTOR`/`OBSERVABLE_INCLUDE` target (walking backward,
    /// necessarily encountered before the measurements it references are
    /// themselves undone) depends on past measurement index `index`.
    pub fn record_dependency(&mut self, index: usize, target: DemTarget) {
        self.pending.entry(index).or_default().xor_merge_assign(&SparseXorVec::single(target));
    }

    /// The next detector id to assign walking backward (one past the last
    /// already-undone detector), decremented on each call.
    pub fn next_detector_id(&mut self) -> usize {
        self.num_detectors_in_past -= 1;
        self.num_detectors_in_past
    }

    /// Undo one measurement's classical-record effect: XOR this measurement's
    /// pending dependency set (if any `DETECTOR`/`OBSERVABLE_INCLUDE` referenced
    /// it) into the sensitivity set a `basis`-measurement writes to: `xs[q]` for
    /// `MX`, `zs[q]` for `M`, both for `MY` (the same convention [Self::xor_axis]
    /// uses, read directly off `error_analyzer.cc`'s `undo_MX`/`undo_MZ`/`undo_MY`
    /// rather than derived from first principles — it does not match the naive
    /// "X error flips a Z measurement" intuition, so don't rederive it). Consumes
    /// (and returns) the dependency set so a caller accumulating error
    /// mechanisms can use it too.
    pub fn undo_measurement(&mut self, q: usize, basis: Axis) -> Result<SparseXorVec<DemTarget>, ReverseTrackerError> {
        self.check_qubit(q)?;
        self.num_measurements_in_past -= 1;
        let index = self.num_measurements_in_past;
        let dep = self.pending.remove(&index).unwrap_or_default();
        self.xor_axis(q, basis, &dep)?;
        Ok(dep)
    }

    /// The measurement index [Self::undo_measurement] would resolve next
    /// (without consuming it). Used to resolve a `rec[-k]` lookback into an
    /// absolute index while walking backward.
    pub fn peek_measurement_index(&self) -> usize {
        self.num_measurements_in_past - 1
    }

    /// Resolve a `rec[-k]` lookback, as seen by an instruction sitting at the
    /// tracker's current backward position, to an absolute measurement index.
    pub fn resolve_lookback(&self, k: u32) -> Result<usize, ReverseTrackerError> {
        self.num_measurements_in_past
            .checked_sub(k as usize)
            .ok_or(ReverseTrackerError::LookbackOutOfRange { offset: k, remaining: self.num_measurements_in_past })
    }

    /// Undo a reset: any sensitivity accumulated so far on qubit `q` is about
    /// events strictly after this point, none of which can be reached by an
    /// error introduced before the reset (the reset overwrites the qubit's
    /// state), so both sets are cleared regardless of the reset's basis. Returns
    /// the pre-clear `(xs[q], zs[q])` pair so the caller can run the
    /// determinism/gauge check against whichever sensitivity should have been
    /// empty for a deterministic reset.
    pub fn undo_reset(&mut self, q: usize) -> Result<(SparseXorVec<DemTarget>, SparseXorVec<DemTarget>), ReverseTrackerError> {
        self.check_qubit(q)?;
        let before = (self.xs[q].clone(), self.zs[q].clone());
        self.xs[q] = SparseXorVec::new();
        self.zs[q] = SparseXorVec::new();
        Ok(before)
    }

    /// `(measurements_still_to_undo, detectors_still_to_undo)`, i.e. the counters
    /// [Self::undo_measurement]/[Self::next_detector_id] decrement. Used by the
    /// analyzer to detect `REPEAT`-body periodicity (same shape, shifted ids)
    /// without needing to reach into the tracker's private fields.
    pub fn counters(&self) -> (usize, usize) {
        (self.num_measurements_in_past, self.num_detectors_in_past)
    }

    /// Undo a measurement that carries no qubit state at all (`MPAD`): just pops
    /// and returns whatever dependency set was pending on it, without touching any
    /// qubit's sensitivity (there's nothing for that dependency to attach to).
    pub fn discard_measurement(&mut self) -> SparseXorVec<DemTarget> {
        self.num_measurements_in_past -= 1;
        let index = self.num_measurements_in_past;
        self.pending.remove(&index).unwrap_or_default()
    }

    /// XOR `addend` into `xs[q]`/`zs[q]` per `basis`, without touching the
    /// measurement/detector counters — used by the analyzer to fold a noise
    /// channel's own contribution into the running sensitivity sets when the
    /// channel's target also carries a basis (e.g. `CORRELATED_ERROR`'s Pauli
    /// targets), separately from the plain-qubit noise channels which only ever
    /// *read* `xs`/`zs` to form an error mechanism's target set.
    pub fn xor_axis(&mut self, q: usize, basis: Axis, addend: &SparseXorVec<DemTarget>) -> Result<(), ReverseTrackerError> {
        self.check_qubit(q)?;
        match basis {
            Axis::X => self.xs[q] = self.xs[q].xor_merge(addend),
            Axis::Z => self.zs[q] = self.zs[q].xor_merge(addend),
            Axis::Y => {
                self.xs[q] = self.xs[q].xor_merge(addend);
                self.zs[q] = self.zs[q].xor_merge(addend);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(id: u64) -> DemTarget {
        DemTarget::relative_detector_id(id)
    }

    #[test]
    fn h_is_involution() {
        let mut t = ReverseFrameTracker::new(1, 0, 0);
        t.xs[0] = SparseXorVec::single(d(1));
        t.h(0).unwrap();
        t.h(0).unwrap();
        assert_eq!(t.xs(0).as_slice(), &[d(1)]);
        assert!(t.zs(0).is_empty());
    }

    #[test]
    fn c_xyz_and_c_zyx_are_mutual_inverses() {
        let mut t = ReverseFrameTracker::new(1, 0, 0);
        t.xs[0] = SparseXorVec::single(d(1));
        t.zs[0] = SparseXorVec::single(d(2));
        let (x0, z0) = (t.xs(0).clone(), t.zs(0).clone());
        t.c_xyz(0).unwrap();
        t.c_zyx(0).unwrap();
        assert_eq!(t.xs(0), &x0);
        assert_eq!(t.zs(0), &z0);
    }

    #[test]
    fn cxswap_and_swapcx_are_mutual_inverses() {
        let mut t = ReverseFrameTracker::new(2, 0, 0);
        t.xs[0] = SparseXorVec::single(d(1));
        t.zs[1] = SparseXorVec::single(d(2));
        let (x0, z1) = (t.xs(0).clone(), t.zs(1).clone());
        t.cxswap(0, 1).unwrap();
        t.swapcx(0, 1).unwrap();
        assert_eq!(t.xs(0), &x0);
        assert_eq!(t.zs(1), &z1);
    }

    #[test]
    fn measurement_dependency_round_trips_into_sensitivity() {
        let mut t = ReverseFrameTracker::new(1, 1, 1);
        // DETECTOR rec[-1] is encountered (backward) before the M it cites.
        t.record_dependency(0, d(0));
        let dep = t.undo_measurement(0, Axis::Z).unwrap();
        assert_eq!(dep.as_slice(), &[d(0)]);
        assert_eq!(t.zs(0).as_slice(), &[d(0)]);
        assert!(t.xs(0).is_empty());
    }

    #[test]
    fn reset_clears_both_sensitivities() {
        let mut t = ReverseFrameTracker::new(1, 0, 0);
        t.xs[0] = SparseXorVec::single(d(1));
        t.zs[0] = SparseXorVec::single(d(2));
        t.undo_reset(0).unwrap();
        assert!(t.xs(0).is_empty());
        assert!(t.zs(0).is_empty());
    }
}
