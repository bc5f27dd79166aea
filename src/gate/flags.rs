//! Per-gate capability flags.

use bitflags::bitflags;

bitflags! {
    /// Static properties of a [super::GateType], looked up once per gate kind rather
    /// than re-derived from the gate's name at every dispatch site.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    pub struct GateFlags: u32 {
        /// The gate is a unitary Clifford operation (has a tableau image).
        const IS_UNITARY = 1 << 0;
        /// The gate injects noise (probabilistic Pauli error or heralded event).
        const IS_NOISE = 1 << 1;
        /// The gate resets one or more qubits to a computational basis state.
        const IS_RESET = 1 << 2;
        /// The gate appends to the measurement record.
        const PRODUCES_RESULTS = 1 << 3;
        /// Targets come in fixed-size pairs (two-qubit gates).
        const TARGETS_PAIRS = 1 << 4;
        /// Targets form a single combined Pauli-product (MPP-style).
        const TARGETS_PAULI_STRING = 1 << 5;
        /// Targets may only be measurement-record lookback references.
        const ONLY_TARGETS_RECORD = 1 << 6;
        /// Targets may reference per-shot sweep configuration bits.
        const CAN_TARGET_BITS = 1 << 7;
        /// The gate takes no targets (e.g. TICK).
        const TAKES_NO_TARGETS = 1 << 8;
        /// Numeric args are probabilities in `[0, 1]`.
        const ARGS_ARE_PROBABILITIES = 1 << 9;
        /// Numeric args are non-negative integers (e.g. coordinate shifts).
        const ARGS_ARE_UNSIGNED_INTEGERS = 1 << 10;
        /// Targets may include Pauli-product combiners (`*`).
        const TARGETS_COMBINERS = 1 << 11;
        /// The instruction refers to a child circuit block (REPEAT).
        const IS_BLOCK = 1 << 12;
        /// The gate has no effect on qubit state (pure annotation).
        const HAS_NO_EFFECT_ON_QUBITS = 1 << 13;
    }
}

impl Default for GateFlags {
    fn default() -> Self {
        GateFlags::empty()
    }
}
