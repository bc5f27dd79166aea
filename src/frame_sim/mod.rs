//! The batched Pauli-frame sampler (CORE 1): propagates many shots of Pauli error
//! forward through a circuit in lockstep, one word-parallel bit operation per gate
//! per qubit. XORing its output against a noiseless reference sample (see
//! [crate::tableau]) gives the actual measurement results.

mod noise;

pub use noise::Axis;

use thiserror::Error;

use crate::bits::{BitTable, BitVec, DefaultWord as Word, Word as WordTrait};
use crate::circuit::{Circuit, CircuitInstruction};
use crate::gate::{GateTarget, GateType};
use crate::rng::EngineRng;

/// Errors raised while driving a [FrameSimulator].
#[derive(Debug, Error)]
pub enum FrameSimError {
    /// A target qubit index exceeded the simulator's qubit count.
    #[error("qubit {qubit} out of range for a {num_qubits}-qubit simulator")]
    QubitOutOfRange {
        /// The offending index.
        qubit: usize,
        /// The simulator's qubit count.
        num_qubits: usize,
    },
    /// A record or sweep-bit target was used where this simulator expects a plain
    /// qubit index. The only place a classical target is valid is the control slot
    /// of a gate whose catalog entry carries
    /// [crate::gate::GateFlags::CAN_TARGET_BITS] (`CX`, `XCX`, `XCY`, `XCZ`, `YCX`,
    /// `YCY`, `YCZ`); everywhere else — including the *target* slot of those same
    /// gates — a classical reference is invalid.
    #[error("classical (record/sweep) target used where a plain qubit is required")]
    ClassicalTargetUnsupported,
    /// The gate has no forward frame-propagation rule registered.
    #[error("gate {0:?} has no frame propagation rule")]
    UnsupportedGate(GateType),
    /// A noise probability argument was outside `[0, 1]` (or the gate-specific
    /// valid range, e.g. `p <= 15/16` for `DEPOLARIZE2`).
    #[error("probability {value} is out of range for {gate:?}")]
    InvalidProbability {
        /// The gate the probability was given to.
        gate: GateType,
        /// The offending value.
        value: f64,
    },
}

/// The batched Pauli-frame sampler. Owns one `X` and one `Z` bit table of shape
/// `(num_qubits, num_shots)`, plus the growing measurement record.
pub struct FrameSimulator {
    num_qubits: usize,
    num_shots: usize,
    x: BitTable<Word>,
    z: BitTable<Word>,
    record: Vec<BitVec<Word>>,
    /// Bits set by the most recent `CORRELATED_ERROR`, consumed and cleared by a
    /// following `ELSE_CORRELATED_ERROR` chain.
    last_correlated_mask: BitVec<Word>,
    rng: EngineRng,
}

impl FrameSimulator {
    /// A simulator with `num_qubits` qubits and `num_shots` shots, all frames
    /// starting at the identity (no error).
    pub fn new(num_qubits: usize, num_shots: usize, rng: EngineRng) -> Self {
        Self {
            num_qubits,
            num_shots,
            x: BitTable::zeros(num_qubits, num_shots),
            z: BitTable::zeros(num_qubits, num_shots),
            record: Vec::new(),
            last_correlated_mask: BitVec::zeros(num_shots),
            rng,
        }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Number of shots.
    pub fn num_shots(&self) -> usize {
        self.num_shots
    }

    /// Number of measurement rows recorded so far.
    pub fn measurement_count(&self) -> usize {
        self.record.len()
    }

    /// The frame contribution recorded for measurement `m` (one bit per shot). XOR
    /// this against the reference sample's bit at the same measurement index to get
    /// the actual classical outcome.
    pub fn record_row(&self, m: usize) -> &BitVec<Word> {
        &self.record[m]
    }

    fn check_qubit(&self, q: usize) -> Result<(), FrameSimError> {
        if q >= self.num_qubits {
            return Err(FrameSimError::QubitOutOfRange { qubit: q, num_qubits: self.num_qubits });
        }
        Ok(())
    }

    /// Swap rows `a` and `b` of the same table.
    fn swap_rows(table: &mut BitTable<Word>, a: usize, b: usize) {
        if a == b {
            return;
        }
        let a_words: Vec<Word> = table.row(a).to_vec();
        let b_words: Vec<Word> = table.row(b).to_vec();
        table.row_mut(a).copy_from_slice(&b_words);
        table.row_mut(b).copy_from_slice(&a_words);
    }

    // ----- single-qubit Clifford frame propagation -----

    /// `H`: swap the X and Z rows of `q`.
    pub fn h(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.check_qubit(q)?;
        let x_words: Vec<Word> = self.x.row(q).to_vec();
        let z_words: Vec<Word> = self.z.row(q).to_vec();
        self.x.row_mut(q).copy_from_slice(&z_words);
        self.z.row_mut(q).copy_from_slice(&x_words);
        Ok(())
    }

    /// `S`: `Z[q] ^= X[q]`. Bit-identical to `S_DAG` since the frame doesn't track
    /// sign, only which Pauli a frame error currently is.
    pub fn s(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.check_qubit(q)?;
        let x_words: Vec<Word> = self.x.row(q).to_vec();
        for (d, s) in self.z.row_mut(q).iter_mut().zip(x_words.iter()) {
            *d = d.bitxor(*s);
        }
        Ok(())
    }

    /// `S_DAG`, identical to [Self::s] at the bit level.
    pub fn s_dag(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.s(q)
    }

    /// `H_XY`: swaps X and Y (negates Z, which the frame doesn't track): `Z[q] ^=
    /// X[q]`.
    pub fn h_xy(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.s(q)
    }

    /// `H_YZ`: swaps Y and Z (negates X): `X[q] ^= Z[q]`.
    pub fn h_yz(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.check_qubit(q)?;
        let z_words: Vec<Word> = self.z.row(q).to_vec();
        for (d, s) in self.x.row_mut(q).iter_mut().zip(z_words.iter()) {
            *d = d.bitxor(*s);
        }
        Ok(())
    }

    /// `C_XYZ`: the period-3 gate cycling `X -> Y -> Z -> X`. Bit rule (derived by
    /// composing `S` then `H`): `x' = x ^ z`, `z' = x`.
    pub fn c_xyz(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.check_qubit(q)?;
        let x = self.x.row(q).to_vec();
        let z = self.z.row(q).to_vec();
        for i in 0..self.x.words_per_row() {
            self.x.row_mut(q)[i] = x[i].bitxor(z[i]);
            self.z.row_mut(q)[i] = x[i];
        }
        Ok(())
    }

    /// `C_ZYX`, the inverse 3-cycle: `x' = z`, `z' = x ^ z`.
    pub fn c_zyx(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.check_qubit(q)?;
        let x = self.x.row(q).to_vec();
        let z = self.z.row(q).to_vec();
        for i in 0..self.x.words_per_row() {
            self.x.row_mut(q)[i] = z[i];
            self.z.row_mut(q)[i] = x[i].bitxor(z[i]);
        }
        Ok(())
    }

    /// `X`/`Y`/`Z`: Pauli gates never move a Pauli frame error (conjugating a Pauli
    /// by a Pauli only changes its sign, which the frame doesn't track), so these
    /// are no-ops. Still validates the qubit index.
    pub fn pauli_noop(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.check_qubit(q)
    }

    /// `SQRT_X`/`SQRT_X_DAG`: `H;S;H`, bit-identical for both (sign-insensitive).
    pub fn sqrt_x(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.h(q)?;
        self.s(q)?;
        self.h(q)
    }

    /// `SQRT_Y`/`SQRT_Y_DAG`: a Y-axis quarter turn swaps X and Z the same way `H`
    /// does; the two differ only by a sign the frame doesn't track, so both are
    /// bit-identical to [Self::h].
    pub fn sqrt_y(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.h(q)
    }

    // ----- two-qubit Clifford frame propagation -----

    /// `CX` control `c`, target `t`: `Z[c] ^= Z[t]`, `X[t] ^= X[c]`.
    pub fn cx(&mut self, c: usize, t: usize) -> Result<(), FrameSimError> {
        self.check_qubit(c)?;
        self.check_qubit(t)?;
        assert_ne!(c, t);
        let zt = self.z.row(t).to_vec();
        for (d, s) in self.z.row_mut(c).iter_mut().zip(zt.iter()) {
            *d = d.bitxor(*s);
        }
        let xc = self.x.row(c).to_vec();
        for (d, s) in self.x.row_mut(t).iter_mut().zip(xc.iter()) {
            *d = d.bitxor(*s);
        }
        Ok(())
    }

    /// `CZ` on `c`, `t`: `Z[c] ^= X[t]`, `Z[t] ^= X[c]`.
    pub fn cz(&mut self, c: usize, t: usize) -> Result<(), FrameSimError> {
        self.check_qubit(c)?;
        self.check_qubit(t)?;
        assert_ne!(c, t);
        let xt = self.x.row(t).to_vec();
        let xc = self.x.row(c).to_vec();
        for (d, s) in self.z.row_mut(c).iter_mut().zip(xt.iter()) {
            *d = d.bitxor(*s);
        }
        for (d, s) in self.z.row_mut(t).iter_mut().zip(xc.iter()) {
            *d = d.bitxor(*s);
        }
        Ok(())
    }

    /// `CY` control `c`, target `t`: `S(t); CX(c,t); S(t)`.
    pub fn cy(&mut self, c: usize, t: usize) -> Result<(), FrameSimError> {
        self.s(t)?;
        self.cx(c, t)?;
        self.s(t)
    }

    /// `SWAP`: swap the X and Z rows of `a` and `b`.
    pub fn swap(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        Self::swap_rows(&mut self.x, a, b);
        Self::swap_rows(&mut self.z, a, b);
        Ok(())
    }

    /// `ISWAP`: `SWAP` followed by the `CZ` correction, per the standard
    /// decomposition.
    pub fn iswap(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.swap(a, b)?;
        self.cz(a, b)
    }

    /// `ISWAP_DAG`, bit-identical to [Self::iswap] (differs only by a phase the
    /// frame doesn't track).
    pub fn iswap_dag(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.iswap(a, b)
    }

    /// `CXSWAP`: `CX(a,b)` then `SWAP(a,b)`.
    pub fn cxswap(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.cx(a, b)?;
        self.swap(a, b)
    }

    /// `SWAPCX`: `SWAP(a,b)` then `CX(a,b)`.
    pub fn swapcx(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.swap(a, b)?;
        self.cx(a, b)
    }

    /// `XCZ`: `CZ` with the control's sensitivity rotated from Z-type to X-type
    /// (`H` before and after on the control qubit).
    pub fn xcz(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.h(a)?;
        self.cz(a, b)?;
        self.h(a)
    }

    /// `XCX`: `CX` with the control rotated from Z-type to X-type.
    pub fn xcx(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.h(a)?;
        self.cx(a, b)?;
        self.h(a)
    }

    /// `XCY`: `CY` with the control rotated from Z-type to X-type.
    pub fn xcy(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.h(a)?;
        self.cy(a, b)?;
        self.h(a)
    }

    /// `YCZ`: `CZ` with the control rotated from Z-type to Y-type.
    pub fn ycz(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.s(a)?;
        self.cz(a, b)?;
        self.s(a)
    }

    /// `YCX`: `CX` with the control rotated from Z-type to Y-type.
    pub fn ycx(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.s(a)?;
        self.cx(a, b)?;
        self.s(a)
    }

    /// `YCY`: `CY` with the control rotated from Z-type to Y-type.
    pub fn ycy(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.s(a)?;
        self.cy(a, b)?;
        self.s(a)
    }

    /// `SQRT_ZZ`: `exp(i pi/4 ZZ)`. Bit rule: `X[a] ^= Z[b]`, `X[b] ^= Z[a]` (using
    /// pre-update Z values), Z rows untouched.
    pub fn sqrt_zz(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.check_qubit(a)?;
        self.check_qubit(b)?;
        assert_ne!(a, b);
        let za = self.z.row(a).to_vec();
        let zb = self.z.row(b).to_vec();
        for (d, s) in self.x.row_mut(a).iter_mut().zip(zb.iter()) {
            *d = d.bitxor(*s);
        }
        for (d, s) in self.x.row_mut(b).iter_mut().zip(za.iter()) {
            *d = d.bitxor(*s);
        }
        Ok(())
    }

    /// `SQRT_XX`: `SQRT_ZZ` with both qubits rotated from Z-type to X-type.
    pub fn sqrt_xx(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.h(a)?;
        self.h(b)?;
        self.sqrt_zz(a, b)?;
        self.h(a)?;
        self.h(b)
    }

    /// `SQRT_YY`: `SQRT_ZZ` with both qubits rotated from Z-type to Y-type.
    pub fn sqrt_yy(&mut self, a: usize, b: usize) -> Result<(), FrameSimError> {
        self.h_yz(a)?;
        self.h_yz(b)?;
        self.sqrt_zz(a, b)?;
        self.h_yz(a)?;
        self.h_yz(b)
    }

    // ----- measurement, reset, MPP -----

    /// Measure qubit `q` in the given basis, optionally biasing in a per-shot
    /// measurement-error probability. Appends and returns the new record row index.
    pub fn measure(&mut self, q: usize, basis: Axis, flip_prob: Option<f64>) -> Result<usize, FrameSimError> {
        self.check_qubit(q)?;
        let mut row = self.axis_contribution(q, basis);
        if let Some(p) = flip_prob {
            let mut noise = BitVec::<Word>::zeros(self.num_shots);
            noise.randomize_biased(self.rng.inner_mut(), p);
            row.xor_assign(&noise);
        }
        self.record.push(row);
        Ok(self.record.len() - 1)
    }

    fn axis_contribution(&self, q: usize, basis: Axis) -> BitVec<Word> {
        match basis {
            Axis::Z => self.x.row_to_bitvec(q),
            Axis::X => self.z.row_to_bitvec(q),
            Axis::Y => {
                let mut v = self.x.row_to_bitvec(q);
                v.xor_assign(&self.z.row_to_bitvec(q));
                v
            }
        }
    }

    /// Reset qubit `q` to `|0>` (Z basis): clear `X[q]`, refresh `Z[q]` with fresh
    /// per-shot randomness.
    pub fn reset(&mut self, q: usize) -> Result<(), FrameSimError> {
        self.reset_in_basis(q, Axis::Z)
    }

    /// Reset qubit `q` to the `+1` eigenstate of `basis`: clear the row matching
    /// that basis, refresh the other with fresh per-shot randomness (so a later
    /// measurement in a different basis sees a fair coin flip).
    pub fn reset_in_basis(&mut self, q: usize, basis: Axis) -> Result<(), FrameSimError> {
        self.check_qubit(q)?;
        let (clear, fill) = match basis {
            Axis::Z => (&mut self.x, &mut self.z),
            Axis::X | Axis::Y => (&mut self.z, &mut self.x),
        };
        for w in clear.row_mut(q).iter_mut() {
            *w = <Word as WordTrait>::ZERO;
        }
        let mut fresh = BitVec::<Word>::zeros(self.num_shots);
        fresh.randomize_biased(self.rng.inner_mut(), 0.5);
        fill.row_mut(q).copy_from_slice(fresh.words());
        if basis == Axis::Y {
            // |+i> has X and Z perfectly correlated (Y = +1 means X and Z agree).
            let fresh_words = fresh.words().to_vec();
            self.z.row_mut(q).copy_from_slice(&fresh_words);
        }
        Ok(())
    }

    /// `MXX`/`MYY`/`MZZ`: two-qubit Pauli-product measurement in a single axis.
    pub fn measure_pair(&mut self, a: usize, b: usize, basis: Axis) -> Result<usize, FrameSimError> {
        self.mpp(&[(a, basis), (b, basis)])
    }

    /// `MPAD`: reserve a record row of deterministic zero, optionally biased by a
    /// measurement-error probability.
    pub fn mpad(&mut self, flip_prob: Option<f64>) -> usize {
        let mut row = BitVec::<Word>::zeros(self.num_shots);
        if let Some(p) = flip_prob {
            row.randomize_biased(self.rng.inner_mut(), p);
        }
        self.record.push(row);
        self.record.len() - 1
    }

    /// `MPP`: measure the product of single-qubit Paulis named in `terms`. The
    /// outcome is the XOR of each term's single-qubit contribution — the net effect
    /// of a basis-change/CNOT-cascade/uncompute decomposition collapses to this
    /// when only frame bits (not the underlying state) are being tracked.
    pub fn mpp(&mut self, terms: &[(usize, Axis)]) -> Result<usize, FrameSimError> {
        for &(q, _) in terms {
            self.check_qubit(q)?;
        }
        let mut row = BitVec::<Word>::zeros(self.num_shots);
        for &(q, axis) in terms {
            row.xor_assign(&self.axis_contribution(q, axis));
        }
        self.record.push(row);
        Ok(self.record.len() - 1)
    }

    /// Combined measure-then-reset (`MR`/`MRX`/`MRY`): measure, then reset to `|0>`.
    pub fn measure_reset(&mut self, q: usize, basis: Axis, flip_prob: Option<f64>) -> Result<usize, FrameSimError> {
        let idx = self.measure(q, basis, flip_prob)?;
        self.reset(q)?;
        Ok(idx)
    }

    // ----- circuit-driven dispatch -----

    /// Resolve a [GateTarget] to a plain qubit index.
    ///
    /// # Errors
    /// [FrameSimError::ClassicalTargetUnsupported] if `t` is a measurement-record
    /// lookback or sweep-bit reference — this simulator doesn't implement classical
    /// feedback, so a record/sweep bit can only ever appear where a gate's own
    /// target list explicitly allows it, which it never does for the gates that
    /// reach this helper.
    fn plain_qubit(t: GateTarget) -> Result<usize, FrameSimError> {
        if t.is_record_target() || t.is_sweep_bit_target() {
            return Err(FrameSimError::ClassicalTargetUnsupported);
        }
        Ok(t.qubit_value() as usize)
    }

    fn plain_qubits(targets: &[GateTarget]) -> Result<Vec<usize>, FrameSimError> {
        targets.iter().map(|&t| Self::plain_qubit(t)).collect()
    }

    fn plain_pairs(targets: &[GateTarget]) -> Result<Vec<(usize, usize)>, FrameSimError> {
        targets
            .chunks_exact(2)
            .map(|p| Ok((Self::plain_qubit(p[0])?, Self::plain_qubit(p[1])?)))
            .collect()
    }

    fn target_axis(t: GateTarget) -> Result<Axis, FrameSimError> {
        if t.is_record_target() || t.is_sweep_bit_target() {
            return Err(FrameSimError::ClassicalTargetUnsupported);
        }
        Ok(match (t.is_x_target(), t.is_z_target()) {
            (true, true) => Axis::Y,
            (true, false) => Axis::X,
            _ => Axis::Z,
        })
    }

    /// Split an `MPP`/`CORRELATED_ERROR`-style target list into Pauli-product
    /// terms: a `*` combiner joins the target after it to the same term as the
    /// target before it; any other boundary starts a new term.
    fn parse_pauli_terms(targets: &[GateTarget]) -> Result<Vec<Vec<(usize, Axis)>>, FrameSimError> {
        let mut terms: Vec<Vec<(usize, Axis)>> = Vec::new();
        let mut joined = false;
        for &t in targets {
            if t.is_combiner() {
                joined = true;
                continue;
            }
            let entry = (Self::plain_qubit(t)?, Self::target_axis(t)?);
            if joined {
                terms.last_mut().expect("combiner never leads a target list").push(entry);
            } else {
                terms.push(vec![entry]);
            }
            joined = false;
        }
        Ok(terms)
    }

    fn for_each_qubit(
        &mut self,
        targets: &[GateTarget],
        f: fn(&mut Self, usize) -> Result<(), FrameSimError>,
    ) -> Result<(), FrameSimError> {
        for &t in targets {
            let q = Self::plain_qubit(t)?;
            f(self, q)?;
        }
        Ok(())
    }

    fn for_each_pair(
        &mut self,
        targets: &[GateTarget],
        f: fn(&mut Self, usize, usize) -> Result<(), FrameSimError>,
    ) -> Result<(), FrameSimError> {
        for pair in targets.chunks_exact(2) {
            let a = Self::plain_qubit(pair[0])?;
            let b = Self::plain_qubit(pair[1])?;
            f(self, a, b)?;
        }
        Ok(())
    }

    /// Like [Self::for_each_pair], but for gates whose catalog entry carries
    /// [crate::gate::GateFlags::CAN_TARGET_BITS]: the first target of a pair may be
    /// a measurement-record or sweep-bit reference, making the gate a classically
    /// controlled Pauli (conditionally applied to the second target, per shot,
    /// based on that classical bit). Conjugating a Pauli frame error by any Pauli
    /// never changes which Pauli it is, only a sign this simulator doesn't track
    /// (the same reasoning behind [Self::pauli_noop]), so whether the condition
    /// holds or not in a given shot the frame table itself never moves: a classical
    /// control is a no-op here, but the second target still has to be a real,
    /// in-range qubit.
    fn for_each_pair_allow_classical_control(
        &mut self,
        targets: &[GateTarget],
        f: fn(&mut Self, usize, usize) -> Result<(), FrameSimError>,
    ) -> Result<(), FrameSimError> {
        for pair in targets.chunks_exact(2) {
            let b = Self::plain_qubit(pair[1])?;
            if pair[0].is_record_target() || pair[0].is_sweep_bit_target() {
                self.check_qubit(b)?;
                continue;
            }
            let a = Self::plain_qubit(pair[0])?;
            f(self, a, b)?;
        }
        Ok(())
    }

    fn invert_record_row(&mut self, idx: usize) {
        for w in self.record[idx].words_mut() {
            *w = w.not();
        }
        self.record[idx].mask_tail();
    }

    fn measure_targets(
        &mut self,
        targets: &[GateTarget],
        basis: Axis,
        flip_prob: Option<f64>,
    ) -> Result<(), FrameSimError> {
        for &t in targets {
            let q = Self::plain_qubit(t)?;
            let idx = self.measure(q, basis, flip_prob)?;
            if t.is_inverted_result() {
                self.invert_record_row(idx);
            }
        }
        Ok(())
    }

    fn reset_targets(&mut self, targets: &[GateTarget], basis: Axis) -> Result<(), FrameSimError> {
        for &t in targets {
            let q = Self::plain_qubit(t)?;
            self.reset_in_basis(q, basis)?;
        }
        Ok(())
    }

    fn measure_reset_targets(
        &mut self,
        targets: &[GateTarget],
        basis: Axis,
        flip_prob: Option<f64>,
    ) -> Result<(), FrameSimError> {
        for &t in targets {
            let q = Self::plain_qubit(t)?;
            let idx = self.measure(q, basis, flip_prob)?;
            if t.is_inverted_result() {
                self.invert_record_row(idx);
            }
            self.reset_in_basis(q, basis)?;
        }
        Ok(())
    }

    fn measure_pair_targets(&mut self, targets: &[GateTarget], basis: Axis) -> Result<(), FrameSimError> {
        for pair in targets.chunks_exact(2) {
            let a = Self::plain_qubit(pair[0])?;
            let b = Self::plain_qubit(pair[1])?;
            let idx = self.measure_pair(a, b, basis)?;
            let inverted = pair.iter().filter(|t| t.is_inverted_result()).count() % 2 == 1;
            if inverted {
                self.invert_record_row(idx);
            }
        }
        Ok(())
    }

    /// Drive one instruction: resolves its targets out of `circuit`'s arena, maps
    /// its gate to the matching propagation/measurement/noise method, and recurses
    /// into `REPEAT` bodies.
    ///
    /// # Errors
    /// [FrameSimError::ClassicalTargetUnsupported] if a record or sweep-bit target
    /// is used where this simulator expects a plain qubit, other than the control
    /// slot of a `CAN_TARGET_BITS` gate; [FrameSimError::UnsupportedGate] for a gate
    /// this dispatcher doesn't recognize.
    pub fn apply_instruction(
        &mut self,
        circuit: &Circuit,
        instr: &CircuitInstruction,
    ) -> Result<(), FrameSimError> {
        if let Some((block_index, count)) = instr.repeat_block(circuit) {
            let body = &circuit.blocks[block_index];
            for _ in 0..count {
                self.apply_circuit(body)?;
            }
            return Ok(());
        }
        let args = circuit.args(instr);
        let targets = circuit.targets(instr);
        self.apply_gate(instr.gate, args, targets)
    }

    /// Drive every top-level instruction of `circuit`, in order.
    pub fn apply_circuit(&mut self, circuit: &Circuit) -> Result<(), FrameSimError> {
        for instr in &circuit.instructions {
            self.apply_instruction(circuit, instr)?;
        }
        Ok(())
    }

    fn apply_gate(&mut self, gate: GateType, args: &[f64], targets: &[GateTarget]) -> Result<(), FrameSimError> {
        use GateType::*;
        match gate {
            Detector | ObservableInclude | Tick | QubitCoords | ShiftCoords => {
                // Pure annotations: no frame effect. DETECTOR/OBSERVABLE_INCLUDE
                // are consumed by the forward/reverse trackers, not the sampler.
                Ok(())
            }
            Repeat => Ok(()),

            I => self.for_each_qubit(targets, |_, _| Ok(())),
            H => self.for_each_qubit(targets, Self::h),
            H_XY => self.for_each_qubit(targets, Self::h_xy),
            H_YZ => self.for_each_qubit(targets, Self::h_yz),
            X | Y | Z => self.for_each_qubit(targets, Self::pauli_noop),
            C_XYZ => self.for_each_qubit(targets, Self::c_xyz),
            C_ZYX => self.for_each_qubit(targets, Self::c_zyx),
            SQRT_X | SQRT_X_DAG => self.for_each_qubit(targets, Self::sqrt_x),
            SQRT_Y | SQRT_Y_DAG => self.for_each_qubit(targets, Self::sqrt_y),
            S | S_DAG => self.for_each_qubit(targets, Self::s),

            CX => self.for_each_pair_allow_classical_control(targets, Self::cx),
            CY => self.for_each_pair(targets, Self::cy),
            CZ => self.for_each_pair(targets, Self::cz),
            XCX => self.for_each_pair_allow_classical_control(targets, Self::xcx),
            XCY => self.for_each_pair_allow_classical_control(targets, Self::xcy),
            XCZ => self.for_each_pair_allow_classical_control(targets, Self::xcz),
            YCX => self.for_each_pair_allow_classical_control(targets, Self::ycx),
            YCY => self.for_each_pair_allow_classical_control(targets, Self::ycy),
            YCZ => self.for_each_pair_allow_classical_control(targets, Self::ycz),
            SWAP => self.for_each_pair(targets, Self::swap),
            ISWAP => self.for_each_pair(targets, Self::iswap),
            ISWAP_DAG => self.for_each_pair(targets, Self::iswap_dag),
            CXSWAP => self.for_each_pair(targets, Self::cxswap),
            SWAPCX => self.for_each_pair(targets, Self::swapcx),
            SQRT_XX => self.for_each_pair(targets, Self::sqrt_xx),
            SQRT_YY => self.for_each_pair(targets, Self::sqrt_yy),
            SQRT_ZZ => self.for_each_pair(targets, Self::sqrt_zz),

            M => self.measure_targets(targets, Axis::Z, None),
            MX => self.measure_targets(targets, Axis::X, None),
            MY => self.measure_targets(targets, Axis::Y, None),
            MR => self.measure_reset_targets(targets, Axis::Z, None),
            MRX => self.measure_reset_targets(targets, Axis::X, None),
            MRY => self.measure_reset_targets(targets, Axis::Y, None),
            R => self.reset_targets(targets, Axis::Z),
            RX => self.reset_targets(targets, Axis::X),
            RY => self.reset_targets(targets, Axis::Y),
            MXX => self.measure_pair_targets(targets, Axis::X),
            MYY => self.measure_pair_targets(targets, Axis::Y),
            MZZ => self.measure_pair_targets(targets, Axis::Z),
            MPP => {
                for term in Self::parse_pauli_terms(targets)? {
                    self.mpp(&term)?;
                }
                Ok(())
            }
            MPAD => {
                for _ in 0..args.len() {
                    self.mpad(None);
                }
                Ok(())
            }

            X_ERROR => self.x_error(&Self::plain_qubits(targets)?, args[0]),
            Z_ERROR => self.z_error(&Self::plain_qubits(targets)?, args[0]),
            Y_ERROR => self.y_error(&Self::plain_qubits(targets)?, args[0]),
            DEPOLARIZE1 => self.depolarize1(&Self::plain_qubits(targets)?, args[0]),
            DEPOLARIZE2 => self.depolarize2(&Self::plain_pairs(targets)?, args[0]),
            PAULI_CHANNEL_1 => self.pauli_channel1(&Self::plain_qubits(targets)?, args[0], args[1], args[2]),
            PAULI_CHANNEL_2 => {
                let probs: [f64; 15] = args[..15].try_into().expect("catalog guarantees 15 args");
                self.pauli_channel2(&Self::plain_pairs(targets)?, &probs)
            }
            HERALDED_ERASE => self.heralded_erase(&Self::plain_qubits(targets)?, args[0]).map(|_| ()),
            HERALDED_PAULI_CHANNEL_1 => self
                .heralded_pauli_channel1(&Self::plain_qubits(targets)?, args[0], args[1], args[2], args[3])
                .map(|_| ()),
            CORRELATED_ERROR => {
                let term = Self::parse_pauli_terms(targets)?.into_iter().next().unwrap_or_default();
                self.correlated_error(&term, args[0])
            }
            ELSE_CORRELATED_ERROR => {
                let term = Self::parse_pauli_terms(targets)?.into_iter().next().unwrap_or_default();
                self.else_correlated_error(&term, args[0])
            }

            other => Err(FrameSimError::UnsupportedGate(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::EngineRng;

    fn sim(num_qubits: usize, num_shots: usize) -> FrameSimulator {
        FrameSimulator::new(num_qubits, num_shots, EngineRng::from_seed(1))
    }

    #[test]
    fn noiseless_m_is_all_zero() {
        let mut s = sim(3, 64);
        for q in 0..3 {
            s.measure(q, Axis::Z, None).unwrap();
        }
        for m in 0..3 {
            assert!(s.record_row(m).is_zero());
        }
    }

    #[test]
    fn x_error_flips_every_shot_at_p_one() {
        let mut s = sim(1, 64);
        s.x_error(&[0], 1.0).unwrap();
        s.measure(0, Axis::Z, None).unwrap();
        assert_eq!(s.record_row(0).popcount() as usize, s.num_shots());
    }

    #[test]
    fn z_error_is_invisible_to_z_measurement() {
        let mut s = sim(1, 64);
        s.z_error(&[0], 1.0).unwrap();
        s.measure(0, Axis::Z, None).unwrap();
        assert!(s.record_row(0).is_zero());
    }

    #[test]
    fn cx_propagates_x_error_from_control_to_target() {
        let mut s = sim(2, 64);
        s.x_error(&[0], 1.0).unwrap();
        s.cx(0, 1).unwrap();
        s.measure(0, Axis::Z, None).unwrap();
        s.measure(1, Axis::Z, None).unwrap();
        assert!(s.record_row(0).popcount() > 0);
        assert_eq!(s.record_row(0).words(), s.record_row(1).words());
    }

    #[test]
    fn h_then_x_error_then_h_is_a_z_error() {
        let mut s = sim(1, 64);
        s.h(0).unwrap();
        s.x_error(&[0], 1.0).unwrap();
        s.h(0).unwrap();
        s.measure(0, Axis::Z, None).unwrap();
        // H;X_ERROR;H == Z_ERROR, which M (Z basis) can't see.
        assert!(s.record_row(0).is_zero());
    }

    #[test]
    fn mpp_of_zz_sees_correlated_x_errors_cancel() {
        let mut s = sim(2, 64);
        s.x_error(&[0, 1], 1.0).unwrap();
        s.measure_pair(0, 1, Axis::Z).unwrap();
        assert!(s.record_row(0).is_zero());
    }

    #[test]
    fn correlated_error_chain_is_mutually_exclusive() {
        let mut s = sim(1, 256);
        s.correlated_error(&[(0, Axis::X)], 0.5).unwrap();
        let first_hits = s.last_correlated_mask.clone();
        s.else_correlated_error(&[(0, Axis::X)], 1.0).unwrap();
        // every shot not hit by the first link must be hit by the unconditional else
        let mut combined = first_hits;
        combined.or_assign(&s.last_correlated_mask);
        assert_eq!(combined.popcount() as usize, s.num_shots());
    }

    #[test]
    fn classically_controlled_cx_is_accepted_and_leaves_the_frame_untouched() {
        use crate::gate::GateTarget;

        let mut c = Circuit::new();
        c.push(GateType::M, &[], &[GateTarget::qubit(0)], None).unwrap();
        c.push(GateType::CX, &[], &[GateTarget::rec(1), GateTarget::qubit(1)], None).unwrap();

        let mut s = sim(2, 32);
        s.x_error(&[1], 1.0).unwrap();
        let x1_before = s.x.row(1).to_vec();
        s.apply_circuit(&c).unwrap();
        assert_eq!(s.x.row(1), x1_before.as_slice());
    }

    #[test]
    fn classically_controlled_cz_is_still_rejected() {
        use crate::gate::GateTarget;

        let mut c = Circuit::new();
        c.push(GateType::M, &[], &[GateTarget::qubit(0)], None).unwrap();
        c.push(GateType::CZ, &[], &[GateTarget::rec(1), GateTarget::qubit(1)], None).unwrap();

        let mut s = sim(2, 32);
        assert!(matches!(s.apply_circuit(&c), Err(FrameSimError::ClassicalTargetUnsupported)));
    }
}
