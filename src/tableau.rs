//! The inverse stabilizer tableau used to compute the noiseless reference sample.
//!
//! For `n` qubits this tracks, as four `n`×`n` bit tables plus two sign vectors, the
//! image of every single-qubit Pauli generator under the Clifford applied so far:
//! `x2x`/`x2z` hold the image of each `X_i` (the destabilizers, in
//! Aaronson-Gottesman terms), `z2x`/`z2z` hold the image of each `Z_i` (the
//! stabilizers of the evolved state, since `Z_i` stabilizes `|0...0>`). Measuring a
//! qubit updates this in place using the standard CHP algorithm, always biased
//! towards the `+1` outcome when the result isn't already deterministic — that bias
//! is what makes the result a *reference* sample rather than a physical one.

use thiserror::Error;

use crate::bits::{BitVec, DefaultWord as Word, Word as WordTrait};
use crate::gate::GateType;

/// Errors raised while applying a gate to a [Tableau].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TableauError {
    /// The gate isn't one of the Clifford unitaries the reference tableau knows how
    /// to conjugate by. Noise, annotations, and measurement/reset gates are handled
    /// separately (noise is skipped when building the reference; measurement/reset
    /// go through [Tableau::measure]/[Tableau::reset]).
    #[error("gate {0:?} has no tableau conjugation rule")]
    UnsupportedGate(GateType),
    /// A qubit index was out of range for this tableau's qubit count.
    #[error("qubit {qubit} out of range for a {num_qubits}-qubit tableau")]
    QubitOutOfRange {
        /// The offending index.
        qubit: usize,
        /// The tableau's qubit count.
        num_qubits: usize,
    },
}

/// The inverse stabilizer tableau for `n` qubits, initialized to the identity
/// Clifford acting on `|0...0>`.
#[derive(Debug, Clone)]
pub struct Tableau {
    num_qubits: usize,
    /// Image of `X_i`: `x2x[i]`, `x2z[i]` give the X/Z parts on every qubit.
    x2x: Vec<BitVec<Word>>,
    x2z: Vec<BitVec<Word>>,
    x_sign: BitVec<Word>,
    /// Image of `Z_i`, i.e. the stabilizer generators of the evolved state.
    z2x: Vec<BitVec<Word>>,
    z2z: Vec<BitVec<Word>>,
    z_sign: BitVec<Word>,
}

impl Tableau {
    /// The identity tableau over `num_qubits` qubits.
    pub fn identity(num_qubits: usize) -> Self {
        let mut x2x = Vec::with_capacity(num_qubits);
        let mut x2z = Vec::with_capacity(num_qubits);
        let mut z2x = Vec::with_capacity(num_qubits);
        let mut z2z = Vec::with_capacity(num_qubits);
        for i in 0..num_qubits {
            let mut row_x2x = BitVec::zeros(num_qubits);
            row_x2x.set(i, true);
            x2x.push(row_x2x);
            x2z.push(BitVec::zeros(num_qubits));
            let mut row_z2z = BitVec::zeros(num_qubits);
            row_z2z.set(i, true);
            z2z.push(row_z2z);
            z2x.push(BitVec::zeros(num_qubits));
        }
        Self {
            num_qubits,
            x2x,
            x2z,
            x_sign: BitVec::zeros(num_qubits),
            z2x,
            z2z,
            z_sign: BitVec::zeros(num_qubits),
        }
    }

    /// Number of qubits this tableau tracks.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    fn check_qubit(&self, q: usize) -> Result<(), TableauError> {
        if q >= self.num_qubits {
            return Err(TableauError::QubitOutOfRange { qubit: q, num_qubits: self.num_qubits });
        }
        Ok(())
    }

    /// Apply the gate's conjugation to every tracked generator.
    ///
    /// Only a verified subset of unitary gates is implemented directly; the rest are
    /// composed from that subset (see the per-method docs). Non-unitary gates
    /// (noise, measurement, reset, annotations) aren't handled here.
    pub fn apply(&mut self, gate: GateType, targets: &[usize]) -> Result<(), TableauError> {
        for &q in targets {
            self.check_qubit(q)?;
        }
        match (gate, targets) {
            (GateType::I, [_]) => {}
            (GateType::H, &[q]) => self.h(q),
            (GateType::S, &[q]) => self.s(q),
            (GateType::S_DAG, &[q]) => self.s_dag(q),
            (GateType::X, &[q]) => self.x(q),
            (GateType::Y, &[q]) => self.y(q),
            (GateType::Z, &[q]) => self.z(q),
            (GateType::SQRT_X, &[q]) => self.sqrt_x(q),
            (GateType::SQRT_X_DAG, &[q]) => self.sqrt_x_dag(q),
            (GateType::CX, &[c, t]) => self.cx(c, t),
            (GateType::CZ, &[c, t]) => self.cz(c, t),
            (GateType::CY, &[c, t]) => self.cy(c, t),
            (GateType::SWAP, &[a, b]) => self.swap(a, b),
            (GateType::H_XY, &[q]) => self.h_xy(q),
            (GateType::H_YZ, &[q]) => self.h_yz(q),
            (GateType::C_XYZ, &[q]) => self.c_xyz(q),
            (GateType::C_ZYX, &[q]) => self.c_zyx(q),
            (GateType::SQRT_Y, &[q]) => self.sqrt_y(q),
            (GateType::SQRT_Y_DAG, &[q]) => self.sqrt_y_dag(q),
            (GateType::XCZ, &[a, b]) => self.xcz(a, b),
            (GateType::XCX, &[a, b]) => self.xcx(a, b),
            (GateType::XCY, &[a, b]) => self.xcy(a, b),
            (GateType::YCZ, &[a, b]) => self.ycz(a, b),
            (GateType::YCX, &[a, b]) => self.ycx(a, b),
            (GateType::YCY, &[a, b]) => self.ycy(a, b),
            (GateType::ISWAP, &[a, b]) => self.iswap(a, b),
            (GateType::ISWAP_DAG, &[a, b]) => self.iswap_dag(a, b),
            (GateType::CXSWAP, &[a, b]) => self.cxswap(a, b),
            (GateType::SWAPCX, &[a, b]) => self.swapcx(a, b),
            (GateType::SQRT_ZZ, &[a, b]) => self.sqrt_zz(a, b),
            (GateType::SQRT_XX, &[a, b]) => self.sqrt_xx(a, b),
            (GateType::SQRT_YY, &[a, b]) => self.sqrt_yy(a, b),
            _ => return Err(TableauError::UnsupportedGate(gate)),
        }
        Ok(())
    }

    /// Conjugate every generator by `H` on qubit `q`: swap the X/Z parts of column
    /// `q`, with the standard CHP sign-flip condition `r ^= x_q & z_q` evaluated on
    /// the pre-swap bits.
    pub fn h(&mut self, q: usize) {
        for row in 0..self.num_qubits {
            Self::h_row(&mut self.x2x[row], &mut self.x2z[row], &mut self.x_sign, row, q);
            Self::h_row(&mut self.z2x[row], &mut self.z2z[row], &mut self.z_sign, row, q);
        }
    }

    fn h_row(xs: &mut BitVec<Word>, zs: &mut BitVec<Word>, signs: &mut BitVec<Word>, row: usize, q: usize) {
        let x = xs.get(q);
        let z = zs.get(q);
        if x & z {
            signs.flip(row);
        }
        xs.set(q, z);
        zs.set(q, x);
    }

    /// Conjugate by `S` on qubit `q`: `z_q ^= x_q`, `r ^= x_q & z_q` (pre-update `z`).
    pub fn s(&mut self, q: usize) {
        for row in 0..self.num_qubits {
            Self::s_row(&mut self.x2x[row], &mut self.x2z[row], &mut self.x_sign, row, q);
            Self::s_row(&mut self.z2x[row], &mut self.z2z[row], &mut self.z_sign, row, q);
        }
    }

    fn s_row(xs: &mut BitVec<Word>, zs: &mut BitVec<Word>, signs: &mut BitVec<Word>, row: usize, q: usize) {
        let x = xs.get(q);
        let z = zs.get(q);
        if x & z {
            signs.flip(row);
        }
        zs.set(q, z ^ x);
    }

    /// `S_DAG = S;S;S`.
    pub fn s_dag(&mut self, q: usize) {
        self.s(q);
        self.s(q);
        self.s(q);
    }

    /// `Z = S;S`.
    pub fn z(&mut self, q: usize) {
        self.s(q);
        self.s(q);
    }

    /// `X = H;Z;H`.
    pub fn x(&mut self, q: usize) {
        self.h(q);
        self.z(q);
        self.h(q);
    }

    /// `Y`: conjugation by Y equals conjugation by `Z*X` up to a global phase, which
    /// cancels under conjugation, so applying `X` then `Z` has the same action.
    pub fn y(&mut self, q: usize) {
        self.x(q);
        self.z(q);
    }

    /// `SQRT_X = H;S;H`.
    pub fn sqrt_x(&mut self, q: usize) {
        self.h(q);
        self.s(q);
        self.h(q);
    }

    /// `SQRT_X_DAG = H;S_DAG;H` (the inverse of [Self::sqrt_x], since `H` is its own
    /// inverse).
    pub fn sqrt_x_dag(&mut self, q: usize) {
        self.h(q);
        self.s_dag(q);
        self.h(q);
    }

    /// Conjugate by `CX` with control `c`, target `t`:
    /// `r ^= x_c & z_t & (x_t ^ z_c ^ 1)`, `x_t ^= x_c`, `z_c ^= z_t` (all using
    /// pre-update bits).
    pub fn cx(&mut self, c: usize, t: usize) {
        assert_ne!(c, t);
        for row in 0..self.num_qubits {
            Self::cx_row(&mut self.x2x[row], &mut self.x2z[row], &mut self.x_sign, row, c, t);
            Self::cx_row(&mut self.z2x[row], &mut self.z2z[row], &mut self.z_sign, row, c, t);
        }
    }

    fn cx_row(xs: &mut BitVec<Word>, zs: &mut BitVec<Word>, signs: &mut BitVec<Word>, row: usize, c: usize, t: usize) {
        let xc = xs.get(c);
        let zt = zs.get(t);
        let xt = xs.get(t);
        let zc = zs.get(c);
        if xc & zt & (xt ^ zc ^ true) {
            signs.flip(row);
        }
        xs.set(t, xt ^ xc);
        zs.set(c, zc ^ zt);
    }

    /// `CZ = H(t); CX(c,t); H(t)`.
    pub fn cz(&mut self, c: usize, t: usize) {
        self.h(t);
        self.cx(c, t);
        self.h(t);
    }

    /// `CY = S_DAG(t); CX(c,t); S(t)`.
    pub fn cy(&mut self, c: usize, t: usize) {
        self.s_dag(t);
        self.cx(c, t);
        self.s(t);
    }

    /// `SWAP = CX(a,b); CX(b,a); CX(a,b)`.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.cx(a, b);
        self.cx(b, a);
        self.cx(a, b);
    }

    /// `C_XYZ = S;H` (the order-3 rotation cycling `X -> Y -> Z -> X`).
    pub fn c_xyz(&mut self, q: usize) {
        self.s(q);
        self.h(q);
    }

    /// `C_ZYX = H;S_DAG`, the inverse of [Self::c_xyz].
    pub fn c_zyx(&mut self, q: usize) {
        self.h(q);
        self.s_dag(q);
    }

    /// `H_YZ = S_DAG;H;S`: conjugate `H` by `S`, giving the reflection that swaps
    /// `Y`/`Z` and negates `X`.
    pub fn h_yz(&mut self, q: usize) {
        self.s_dag(q);
        self.h(q);
        self.s(q);
    }

    /// `H_XY = C_XYZ;H_YZ;C_ZYX`: conjugate `H_YZ` by `C_XYZ`, giving the reflection
    /// that swaps `X`/`Y` and negates `Z`.
    pub fn h_xy(&mut self, q: usize) {
        self.c_xyz(q);
        self.h_yz(q);
        self.c_zyx(q);
    }

    /// `SQRT_Y = S_DAG;SQRT_X;S`, i.e. `S_DAG;H;S;H;S`: conjugate `SQRT_X` by `S`,
    /// giving the quarter turn around `Y` (fixes `Y`, takes `X -> Z -> -X -> -Z`).
    pub fn sqrt_y(&mut self, q: usize) {
        self.s_dag(q);
        self.h(q);
        self.s(q);
        self.h(q);
        self.s(q);
    }

    /// `SQRT_Y_DAG`, the inverse of [Self::sqrt_y] (reverse the circuit, invert
    /// every step).
    pub fn sqrt_y_dag(&mut self, q: usize) {
        self.s_dag(q);
        self.h(q);
        self.s_dag(q);
        self.h(q);
        self.s(q);
    }

    /// `XCZ = H(a);CZ(a,b);H(a)`: rotate the control from `Z`-type to `X`-type.
    pub fn xcz(&mut self, a: usize, b: usize) {
        self.h(a);
        self.cz(a, b);
        self.h(a);
    }

    /// `XCX = H(a);CX(a,b);H(a)`.
    pub fn xcx(&mut self, a: usize, b: usize) {
        self.h(a);
        self.cx(a, b);
        self.h(a);
    }

    /// `XCY = H(a);CY(a,b);H(a)`.
    pub fn xcy(&mut self, a: usize, b: usize) {
        self.h(a);
        self.cy(a, b);
        self.h(a);
    }

    /// `YCZ = S_DAG(a);CZ(a,b);S(a)`: rotate the control from `Z`-type to `Y`-type.
    /// Unlike the `X`-wrap above, `S` isn't self-inverse, so the sandwich needs
    /// `S_DAG` on one side to stay a genuine conjugation.
    pub fn ycz(&mut self, a: usize, b: usize) {
        self.s_dag(a);
        self.cz(a, b);
        self.s(a);
    }

    /// `YCX = S_DAG(a);CX(a,b);S(a)`.
    pub fn ycx(&mut self, a: usize, b: usize) {
        self.s_dag(a);
        self.cx(a, b);
        self.s(a);
    }

    /// `YCY = S_DAG(a);CY(a,b);S(a)`.
    pub fn ycy(&mut self, a: usize, b: usize) {
        self.s_dag(a);
        self.cy(a, b);
        self.s(a);
    }

    /// `ISWAP = SWAP(a,b);CZ(a,b)`.
    pub fn iswap(&mut self, a: usize, b: usize) {
        self.swap(a, b);
        self.cz(a, b);
    }

    /// `ISWAP_DAG`, the inverse of [Self::iswap] (reverse order; `SWAP` and `CZ` are
    /// each self-inverse).
    pub fn iswap_dag(&mut self, a: usize, b: usize) {
        self.cz(a, b);
        self.swap(a, b);
    }

    /// `CXSWAP = CX(a,b);SWAP(a,b)`.
    pub fn cxswap(&mut self, a: usize, b: usize) {
        self.cx(a, b);
        self.swap(a, b);
    }

    /// `SWAPCX = SWAP(a,b);CX(a,b)`, the inverse of [Self::cxswap].
    pub fn swapcx(&mut self, a: usize, b: usize) {
        self.swap(a, b);
        self.cx(a, b);
    }

    /// `SQRT_ZZ = H(a);H(b);CZ(a,b);H(a);H(b)`: conjugate `CZ` by `H` on both
    /// qubits, swapping the `X`/`Z` roles in `CZ`'s update rule.
    pub fn sqrt_zz(&mut self, a: usize, b: usize) {
        self.h(a);
        self.h(b);
        self.cz(a, b);
        self.h(a);
        self.h(b);
    }

    /// `SQRT_XX = H(a);H(b);SQRT_ZZ(a,b);H(a);H(b)`.
    pub fn sqrt_xx(&mut self, a: usize, b: usize) {
        self.h(a);
        self.h(b);
        self.sqrt_zz(a, b);
        self.h(a);
        self.h(b);
    }

    /// `SQRT_YY = H_YZ(a);H_YZ(b);SQRT_ZZ(a,b);H_YZ(a);H_YZ(b)`.
    pub fn sqrt_yy(&mut self, a: usize, b: usize) {
        self.h_yz(a);
        self.h_yz(b);
        self.sqrt_zz(a, b);
        self.h_yz(a);
        self.h_yz(b);
    }

    /// Measure qubit `q` in the Z basis, biased towards the `+1` outcome whenever
    /// the result isn't already forced by the current stabilizer state, and update
    /// the tableau to reflect the post-measurement state.
    ///
    /// Returns the classical outcome bit (`true` = `-1`/one, `false` = `+1`/zero).
    pub fn measure(&mut self, q: usize) -> bool {
        // Random branch: some stabilizer generator anticommutes with Z_q (has an X
        // part on column q). Collapse onto +1 deterministically.
        if let Some(p) = (0..self.num_qubits).find(|&i| self.z2x[i].get(q)) {
            for i in 0..self.num_qubits {
                if i != p && self.z2x[i].get(q) {
                    self.rowsum_stabilizer(i, p);
                }
            }
            // the destabilizer of p must also be updated to keep the tableau
            // consistent: it's replaced by the old stabilizer p (standard CHP swap).
            self.x2x[p] = self.z2x[p].clone();
            self.x2z[p] = self.z2z[p].clone();
            let old_sign = self.z_sign.get(p);
            self.x_sign.set(p, old_sign);
            self.z2x[p] = BitVec::zeros(self.num_qubits);
            self.z2z[p] = BitVec::zeros(self.num_qubits);
            self.z2z[p].set(q, true);
            self.z_sign.set(p, false);
            return false;
        }

        // Deterministic branch: read the sign by summing (rowsum) every stabilizer
        // generator whose destabilizer has an X part at column q, onto a scratch
        // accumulator starting from the identity.
        let mut scratch_x = BitVec::<Word>::zeros(self.num_qubits);
        let mut scratch_z = BitVec::<Word>::zeros(self.num_qubits);
        let mut scratch_sign = false;
        for a in 0..self.num_qubits {
            if self.x2x[a].get(q) {
                rowsum(
                    &mut scratch_x,
                    &mut scratch_z,
                    &mut scratch_sign,
                    &self.z2x[a],
                    &self.z2z[a],
                    self.z_sign.get(a),
                );
            }
        }
        scratch_sign
    }

    /// Combine stabilizer row `dst` with stabilizer row `src` in place
    /// (`dst := dst * src` as a Pauli product), used while clearing the other
    /// anticommuting generators during a random-outcome measurement.
    fn rowsum_stabilizer(&mut self, dst: usize, src: usize) {
        let (src_x, src_z, src_sign) =
            (self.z2x[src].clone(), self.z2z[src].clone(), self.z_sign.get(src));
        let mut dst_sign = self.z_sign.get(dst);
        rowsum(&mut self.z2x[dst], &mut self.z2z[dst], &mut dst_sign, &src_x, &src_z, src_sign);
        self.z_sign.set(dst, dst_sign);
    }

    /// Reset qubit `q` to `|0>`: measure it (forcing the generator assignment just
    /// as [Self::measure] does), then, if the outcome came out `true`, apply `X` to
    /// flip it back to `|0>`.
    pub fn reset(&mut self, q: usize) {
        if self.measure(q) {
            self.x(q);
        }
    }
}

/// Multiply Pauli row `(dst_x, dst_z, dst_sign)` by `(src_x, src_z, src_sign)`,
/// in place on the destination, tracking the resulting sign via the standard
/// Aaronson-Gottesman `g` phase-exponent table summed over every qubit.
fn rowsum(
    dst_x: &mut BitVec<Word>,
    dst_z: &mut BitVec<Word>,
    dst_sign: &mut bool,
    src_x: &BitVec<Word>,
    src_z: &BitVec<Word>,
    src_sign: bool,
) {
    let n = dst_x.len();
    let mut phase_sum: i32 = if *dst_sign { 2 } else { 0 };
    phase_sum += if src_sign { 2 } else { 0 };
    for j in 0..n {
        phase_sum += g(src_x.get(j), src_z.get(j), dst_x.get(j), dst_z.get(j));
    }
    let phase_sum = phase_sum.rem_euclid(4);
    debug_assert!(phase_sum == 0 || phase_sum == 2, "rowsum produced a non-real phase");
    *dst_sign = phase_sum == 2;
    dst_x.xor_assign(src_x);
    dst_z.xor_assign(src_z);
}

/// The phase exponent (as a multiple of `i`) picked up by multiplying the single
/// qubit Pauli `(x1, z1)` onto `(x2, z2)`, from the standard CHP measurement
/// algorithm's lookup table.
fn g(x1: bool, z1: bool, x2: bool, z2: bool) -> i32 {
    match (x1, z1) {
        (false, false) => 0,
        (true, true) => (z2 as i32) - (x2 as i32),
        (true, false) => {
            if z2 {
                2 * (x2 as i32) - 1
            } else {
                0
            }
        }
        (false, true) => {
            if x2 {
                1 - 2 * (z2 as i32)
            } else {
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn h_is_involution() {
        let mut t = Tableau::identity(3);
        t.h(1);
        t.h(1);
        let identity = Tableau::identity(3);
        assert_eq!(t.z2x[1].words(), identity.z2x[1].words());
        assert_eq!(t.z_sign.get(1), identity.z_sign.get(1));
    }

    #[test]
    fn bell_pair_stabilizers() {
        // H(0); CX(0,1) on |00> gives stabilizers XX, ZZ.
        let mut t = Tableau::identity(2);
        t.h(0);
        t.cx(0, 1);
        assert!(t.z2x[0].get(0) && t.z2x[0].get(1)); // XX
        assert!(t.z2z[1].get(0) && t.z2z[1].get(1)); // ZZ
        assert!(!t.z_sign.get(0));
        assert!(!t.z_sign.get(1));
    }

    #[test]
    fn measuring_fresh_qubit_is_deterministic_zero() {
        let mut t = Tableau::identity(4);
        for q in 0..4 {
            assert!(!t.measure(q));
        }
    }

    #[test]
    fn bell_pair_measurement_is_correlated() {
        let mut t = Tableau::identity(2);
        t.h(0);
        t.cx(0, 1);
        let first = t.measure(0);
        let second = t.measure(1);
        // biased-to-+1 collapse always resolves correlated qubits consistently
        assert_eq!(first, second);
    }

    #[test]
    fn reset_always_yields_zero_afterwards() {
        let mut t = Tableau::identity(1);
        t.h(0);
        t.reset(0);
        assert!(!t.measure(0));
    }

    #[test]
    fn x_then_measure_is_one() {
        let mut t = Tableau::identity(1);
        t.x(0);
        assert!(t.measure(0));
    }

    fn assert_identity(t: &Tableau, n: usize) {
        let identity = Tableau::identity(n);
        for i in 0..n {
            assert_eq!(t.x2x[i].words(), identity.x2x[i].words());
            assert_eq!(t.x2z[i].words(), identity.x2z[i].words());
            assert_eq!(t.z2x[i].words(), identity.z2x[i].words());
            assert_eq!(t.z2z[i].words(), identity.z2z[i].words());
        }
        assert_eq!(t.x_sign.words(), identity.x_sign.words());
        assert_eq!(t.z_sign.words(), identity.z_sign.words());
    }

    #[test]
    fn h_xy_and_h_yz_are_involutions() {
        let mut t = Tableau::identity(2);
        t.h_xy(0);
        t.h_xy(0);
        t.h_yz(1);
        t.h_yz(1);
        assert_identity(&t, 2);
    }

    #[test]
    fn c_xyz_has_order_three() {
        let mut t = Tableau::identity(1);
        t.c_xyz(0);
        t.c_xyz(0);
        t.c_xyz(0);
        assert_identity(&t, 1);
    }

    #[test]
    fn c_zyx_undoes_c_xyz() {
        let mut t = Tableau::identity(2);
        t.c_xyz(0);
        t.c_zyx(0);
        assert_identity(&t, 2);
    }

    #[test]
    fn sqrt_y_has_order_four() {
        let mut t = Tableau::identity(1);
        t.sqrt_y(0);
        t.sqrt_y(0);
        t.sqrt_y(0);
        t.sqrt_y(0);
        assert_identity(&t, 1);
    }

    #[test]
    fn sqrt_y_dag_undoes_sqrt_y() {
        let mut t = Tableau::identity(1);
        t.sqrt_y(0);
        t.sqrt_y_dag(0);
        assert_identity(&t, 1);
    }

    #[test]
    fn iswap_dag_undoes_iswap() {
        let mut t = Tableau::identity(2);
        t.iswap(0, 1);
        t.iswap_dag(0, 1);
        assert_identity(&t, 2);
    }

    #[test]
    fn swapcx_undoes_cxswap() {
        let mut t = Tableau::identity(2);
        t.cxswap(0, 1);
        t.swapcx(0, 1);
        assert_identity(&t, 2);
    }

    #[test]
    fn sqrt_zz_squares_to_cz_conjugated_pauli() {
        // SQRT_ZZ applied twice is a Clifford of order dividing 4 on a fresh
        // tableau; on |00> (stabilized by Z0, Z1, which SQRT_ZZ leaves fixed)
        // four applications must return to the identity stabilizers.
        let mut t = Tableau::identity(2);
        for _ in 0..4 {
            t.sqrt_zz(0, 1);
        }
        assert_identity(&t, 2);
    }

    #[test]
    fn xcz_and_ycz_are_involutions() {
        let mut t = Tableau::identity(2);
        t.xcz(0, 1);
        t.xcz(0, 1);
        assert_identity(&t, 2);

        let mut t = Tableau::identity(2);
        t.ycz(0, 1);
        t.ycz(0, 1);
        assert_identity(&t, 2);
    }
}
