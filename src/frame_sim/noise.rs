//! Noise channel application: rare-event sampling of independent and correlated
//! Pauli errors onto the frame tables.

use rand::RngCore;

use super::{FrameSimError, FrameSimulator};
use crate::bits::{BitVec, DefaultWord as Word, Word as WordTrait};
use crate::gate::GateType;
use crate::rng::geometric_skip;

/// Which single-qubit Pauli axis a measurement, MPP term, or correlated-error
/// target refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

fn check_probability(gate: GateType, p: f64, max: f64) -> Result<(), FrameSimError> {
    if !(0.0..=max).contains(&p) {
        return Err(FrameSimError::InvalidProbability { gate, value: p });
    }
    Ok(())
}

fn inverted(v: &BitVec<Word>) -> BitVec<Word> {
    let mut out = v.clone();
    out.words_mut().iter_mut().for_each(|w| *w = w.not());
    out
}

impl FrameSimulator {
    fn flip_bit(table: &mut crate::bits::BitTable<Word>, row: usize, shot: usize) {
        let word_idx = shot / Word::BITS as usize;
        let bit = (shot % Word::BITS as usize) as u32;
        let w = &mut table.row_mut(row)[word_idx];
        *w = w.set_bit(bit, !w.get_bit(bit));
    }

    /// Independent `X_ERROR(p)` on every qubit in `qubits`, flipping `X[q,s]` for
    /// each hit. Uses [geometric_skip] to jump straight to each hit across the
    /// flattened `qubits.len() * num_shots` trial space, so cost is proportional to
    /// the number of actual flips rather than the number of trials.
    pub fn x_error(&mut self, qubits: &[usize], p: f64) -> Result<(), FrameSimError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        check_probability(GateType::X_ERROR, p, 1.0)?;
        let total = qubits.len() * self.num_shots;
        let mut cursor = 0u64;
        loop {
            cursor += geometric_skip(self.rng.inner_mut(), p);
            if cursor == 0 || cursor as usize > total {
                break;
            }
            let idx = (cursor - 1) as usize;
            let (qi, shot) = (idx / self.num_shots, idx % self.num_shots);
            Self::flip_bit(&mut self.x, qubits[qi], shot);
        }
        Ok(())
    }

    /// Independent `Z_ERROR(p)`, flipping `Z[q,s]` per hit.
    pub fn z_error(&mut self, qubits: &[usize], p: f64) -> Result<(), FrameSimError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        check_probability(GateType::Z_ERROR, p, 1.0)?;
        let total = qubits.len() * self.num_shots;
        let mut cursor = 0u64;
        loop {
            cursor += geometric_skip(self.rng.inner_mut(), p);
            if cursor == 0 || cursor as usize > total {
                break;
            }
            let idx = (cursor - 1) as usize;
            let (qi, shot) = (idx / self.num_shots, idx % self.num_shots);
            Self::flip_bit(&mut self.z, qubits[qi], shot);
        }
        Ok(())
    }

    /// Independent `Y_ERROR(p)`, flipping both `X[q,s]` and `Z[q,s]` per hit.
    pub fn y_error(&mut self, qubits: &[usize], p: f64) -> Result<(), FrameSimError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        check_probability(GateType::Y_ERROR, p, 1.0)?;
        let total = qubits.len() * self.num_shots;
        let mut cursor = 0u64;
        loop {
            cursor += geometric_skip(self.rng.inner_mut(), p);
            if cursor == 0 || cursor as usize > total {
                break;
            }
            let idx = (cursor - 1) as usize;
            let (qi, shot) = (idx / self.num_shots, idx % self.num_shots);
            Self::flip_bit(&mut self.x, qubits[qi], shot);
            Self::flip_bit(&mut self.z, qubits[qi], shot);
        }
        Ok(())
    }

    /// `DEPOLARIZE1(p)`: for each hit among `qubits.len() * num_shots` trials at
    /// rate `p`, apply a uniformly random non-identity single-qubit Pauli.
    pub fn depolarize1(&mut self, qubits: &[usize], p: f64) -> Result<(), FrameSimError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        check_probability(GateType::DEPOLARIZE1, p, 1.0)?;
        let total = qubits.len() * self.num_shots;
        let mut cursor = 0u64;
        loop {
            cursor += geometric_skip(self.rng.inner_mut(), p);
            if cursor == 0 || cursor as usize > total {
                break;
            }
            let idx = (cursor - 1) as usize;
            let (qi, shot) = (idx / self.num_shots, idx % self.num_shots);
            let q = qubits[qi];
            match self.rng.inner_mut().next_u32() % 3 {
                0 => Self::flip_bit(&mut self.x, q, shot),
                1 => {
                    Self::flip_bit(&mut self.x, q, shot);
                    Self::flip_bit(&mut self.z, q, shot);
                }
                _ => Self::flip_bit(&mut self.z, q, shot),
            }
        }
        Ok(())
    }

    /// `DEPOLARIZE2(p)`: for each hit among `pairs.len() * num_shots` trials, apply
    /// a uniformly random one of the 15 non-identity 2-qubit Paulis.
    pub fn depolarize2(&mut self, pairs: &[(usize, usize)], p: f64) -> Result<(), FrameSimError> {
        for &(a, b) in pairs {
            self.check_qubit(a)?;
            self.check_qubit(b)?;
        }
        check_probability(GateType::DEPOLARIZE2, p, 15.0 / 16.0)?;
        let total = pairs.len() * self.num_shots;
        let mut cursor = 0u64;
        loop {
            cursor += geometric_skip(self.rng.inner_mut(), p);
            if cursor == 0 || cursor as usize > total {
                break;
            }
            let idx = (cursor - 1) as usize;
            let (pi, shot) = (idx / self.num_shots, idx % self.num_shots);
            let (a, b) = pairs[pi];
            // Uniform over the 15 nonzero 4-bit cases (xa, za, xb, zb).
            let case = 1 + (self.rng.inner_mut().next_u32() % 15);
            if case & 0b1000 != 0 {
                Self::flip_bit(&mut self.x, a, shot);
            }
            if case & 0b0100 != 0 {
                Self::flip_bit(&mut self.z, a, shot);
            }
            if case & 0b0010 != 0 {
                Self::flip_bit(&mut self.x, b, shot);
            }
            if case & 0b0001 != 0 {
                Self::flip_bit(&mut self.z, b, shot);
            }
        }
        Ok(())
    }

    fn sample_bernoulli_row(&mut self, p: f64) -> BitVec<Word> {
        let mut row = BitVec::<Word>::zeros(self.num_shots);
        row.randomize_biased(self.rng.inner_mut(), p);
        row
    }

    /// `CORRELATED_ERROR(p) <targets>`: sample one Bernoulli bit per shot at rate
    /// `p`, XOR it into every targeted qubit's X and/or Z row per its Pauli axis,
    /// and remember which shots fired for a following `ELSE_CORRELATED_ERROR`
    /// chain.
    pub fn correlated_error(&mut self, targets: &[(usize, Axis)], p: f64) -> Result<(), FrameSimError> {
        for &(q, _) in targets {
            self.check_qubit(q)?;
        }
        check_probability(GateType::CORRELATED_ERROR, p, 1.0)?;
        let hits = self.sample_bernoulli_row(p);
        self.apply_masked_pauli(targets, &hits);
        self.last_correlated_mask = hits;
        Ok(())
    }

    /// `ELSE_CORRELATED_ERROR(p)`: sample at rate `p`, but only on shots where no
    /// earlier link in the same chain already fired, then fold those shots into the
    /// chain mask and apply.
    pub fn else_correlated_error(&mut self, targets: &[(usize, Axis)], p: f64) -> Result<(), FrameSimError> {
        for &(q, _) in targets {
            self.check_qubit(q)?;
        }
        check_probability(GateType::ELSE_CORRELATED_ERROR, p, 1.0)?;
        let mut hits = self.sample_bernoulli_row(p);
        hits.and_assign(&inverted(&self.last_correlated_mask));
        self.apply_masked_pauli(targets, &hits);
        self.last_correlated_mask.or_assign(&hits);
        Ok(())
    }

    /// `PAULI_CHANNEL_1(px,py,pz)`: per qubit, independently rewritten as a
    /// `CORRELATED_ERROR(px)` / `ELSE_CORRELATED_ERROR(py)` / `ELSE_CORRELATED_ERROR(pz)`
    /// chain over conditional probabilities, without touching the shared
    /// [FrameSimulator::correlated_error] chain state (each qubit's chain is
    /// independent of every other qubit's).
    pub fn pauli_channel1(&mut self, qubits: &[usize], px: f64, py: f64, pz: f64) -> Result<(), FrameSimError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        check_probability(GateType::PAULI_CHANNEL_1, px + py + pz, 1.0)?;
        for &q in qubits {
            let hit_x = self.sample_bernoulli_row(px);
            let not_x = inverted(&hit_x);
            let py_cond = if px < 1.0 { py / (1.0 - px) } else { 0.0 };
            let mut hit_y = self.sample_bernoulli_row(py_cond);
            hit_y.and_assign(&not_x);
            let pz_cond = if px + py < 1.0 { pz / (1.0 - px - py) } else { 0.0 };
            let mut hit_z = self.sample_bernoulli_row(pz_cond);
            let mut remaining = not_x;
            remaining.and_assign(&inverted(&hit_y));
            hit_z.and_assign(&remaining);
            self.apply_masked_pauli(&[(q, Axis::X)], &hit_x);
            self.apply_masked_pauli(&[(q, Axis::Y)], &hit_y);
            self.apply_masked_pauli(&[(q, Axis::Z)], &hit_z);
        }
        Ok(())
    }

    /// `PAULI_CHANNEL_2(p1..p15)`: per qubit pair, the 15-way generalization of
    /// [Self::pauli_channel1], walking the same `(xa,za,xb,zb)` 4-bit case
    /// encoding as [Self::depolarize2] but with an explicit, possibly non-uniform,
    /// probability per case, chained via conditional probabilities in case order.
    pub fn pauli_channel2(&mut self, pairs: &[(usize, usize)], probs: &[f64; 15]) -> Result<(), FrameSimError> {
        for &(a, b) in pairs {
            self.check_qubit(a)?;
            self.check_qubit(b)?;
        }
        let total: f64 = probs.iter().sum();
        check_probability(GateType::PAULI_CHANNEL_2, total, 1.0)?;
        for &(a, b) in pairs {
            let mut remaining = self.sample_bernoulli_row(1.0);
            let mut consumed = 0.0;
            for (i, &p) in probs.iter().enumerate() {
                let cond = if consumed < 1.0 { p / (1.0 - consumed) } else { 0.0 };
                let mut hit = self.sample_bernoulli_row(cond);
                hit.and_assign(&remaining);
                remaining.and_assign(&inverted(&hit));
                consumed += p;
                let case = i + 1;
                if case & 0b1000 != 0 {
                    self.apply_masked_pauli(&[(a, Axis::X)], &hit);
                }
                if case & 0b0100 != 0 {
                    self.apply_masked_pauli(&[(a, Axis::Z)], &hit);
                }
                if case & 0b0010 != 0 {
                    self.apply_masked_pauli(&[(b, Axis::X)], &hit);
                }
                if case & 0b0001 != 0 {
                    self.apply_masked_pauli(&[(b, Axis::Z)], &hit);
                }
            }
        }
        Ok(())
    }

    /// `HERALDED_ERASE(p)`: per qubit, a herald bit fires at rate `p` and appends
    /// to the record; on the shots where it fires, a uniformly random one of
    /// `{I, X, Y, Z}` is applied (so even a heralded erasure carries no error a
    /// quarter of the time). Returns the herald record-row index per qubit.
    pub fn heralded_erase(&mut self, qubits: &[usize], p: f64) -> Result<Vec<usize>, FrameSimError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        check_probability(GateType::HERALDED_ERASE, p, 1.0)?;
        let mut indices = Vec::with_capacity(qubits.len());
        for &q in qubits {
            let herald = self.sample_bernoulli_row(p);
            let r1 = self.sample_bernoulli_row(0.5);
            let r2 = self.sample_bernoulli_row(0.5);
            let mut x_mask = r1.clone();
            x_mask.and_assign(&inverted(&r2));
            x_mask.and_assign(&herald);
            let mut z_mask = r2.clone();
            z_mask.and_assign(&inverted(&r1));
            z_mask.and_assign(&herald);
            let mut y_mask = r1;
            y_mask.and_assign(&r2);
            y_mask.and_assign(&herald);
            self.apply_masked_pauli(&[(q, Axis::X)], &x_mask);
            self.apply_masked_pauli(&[(q, Axis::Z)], &z_mask);
            self.apply_masked_pauli(&[(q, Axis::Y)], &y_mask);
            self.record.push(herald);
            indices.push(self.record.len() - 1);
        }
        Ok(indices)
    }

    /// `HERALDED_PAULI_CHANNEL_1(p,px,py,pz)`: a herald bit fires at rate `p`, and
    /// on the shots where it fires, `X`/`Y`/`Z` is chosen per the conditional
    /// chain from [Self::pauli_channel1] (the remainder being `I`). Returns the
    /// herald record-row index per qubit.
    pub fn heralded_pauli_channel1(
        &mut self,
        qubits: &[usize],
        p: f64,
        px: f64,
        py: f64,
        pz: f64,
    ) -> Result<Vec<usize>, FrameSimError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        check_probability(GateType::HERALDED_PAULI_CHANNEL_1, p, 1.0)?;
        check_probability(GateType::HERALDED_PAULI_CHANNEL_1, px + py + pz, 1.0)?;
        let mut indices = Vec::with_capacity(qubits.len());
        for &q in qubits {
            let herald = self.sample_bernoulli_row(p);
            let hit_x_raw = self.sample_bernoulli_row(px);
            let not_x = inverted(&hit_x_raw);
            let mut hit_x = hit_x_raw;
            hit_x.and_assign(&herald);
            let py_cond = if px < 1.0 { py / (1.0 - px) } else { 0.0 };
            let hit_y_raw = self.sample_bernoulli_row(py_cond);
            let mut hit_y = hit_y_raw.clone();
            hit_y.and_assign(&not_x);
            let mut remaining = not_x;
            remaining.and_assign(&inverted(&hit_y_raw));
            hit_y.and_assign(&herald);
            let pz_cond = if px + py < 1.0 { pz / (1.0 - px - py) } else { 0.0 };
            let mut hit_z = self.sample_bernoulli_row(pz_cond);
            hit_z.and_assign(&remaining);
            hit_z.and_assign(&herald);
            self.apply_masked_pauli(&[(q, Axis::X)], &hit_x);
            self.apply_masked_pauli(&[(q, Axis::Y)], &hit_y);
            self.apply_masked_pauli(&[(q, Axis::Z)], &hit_z);
            self.record.push(herald);
            indices.push(self.record.len() - 1);
        }
        Ok(indices)
    }

    fn apply_masked_pauli(&mut self, targets: &[(usize, Axis)], mask: &BitVec<Word>) {
        for &(q, axis) in targets {
            match axis {
                Axis::X => {
                    for (w, m) in self.x.row_mut(q).iter_mut().zip(mask.words().iter()) {
                        *w = w.bitxor(*m);
                    }
                }
                Axis::Z => {
                    for (w, m) in self.z.row_mut(q).iter_mut().zip(mask.words().iter()) {
                        *w = w.bitxor(*m);
                    }
                }
                Axis::Y => {
                    for (w, m) in self.x.row_mut(q).iter_mut().zip(mask.words().iter()) {
                        *w = w.bitxor(*m);
                    }
                    for (w, m) in self.z.row_mut(q).iter_mut().zip(mask.words().iter()) {
                        *w = w.bitxor(*m);
                    }
                }
            }
        }
    }
}
