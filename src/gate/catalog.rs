//! The gate catalog: every instruction kind the circuit model and simulator know
//! about, with per-gate metadata attached at the single point where each is named.

use super::flags::GateFlags;

/// One row of truth per gate: name, capability flags, and expected argument count.
/// Expanding this table is the only place a new gate kind needs to be named; the
/// enum, the flag lookup, and the name lookup are all generated from it, mirroring
/// the "declarative macro table" approach used elsewhere in this crate's gate-family
/// code (rather than hand-maintaining three parallel `match` blocks that can drift).
macro_rules! gate_table {
    ($(($variant:ident, $name:literal, $flags:expr, $args:expr),)*) => {
        /// Every instruction kind a [crate::circuit::Circuit] can contain.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[non_exhaustive]
        pub enum GateType {
            $(
                #[doc = concat!("The `", $name, "` gate.")]
                $variant,
            )*
        }

        impl GateType {
            /// The canonical instruction name, as it would appear in circuit text.
            pub fn name(&self) -> &'static str {
                match self {
                    $(GateType::$variant => $name,)*
                }
            }

            /// The gate's static capability flags.
            pub fn flags(&self) -> GateFlags {
                match self {
                    $(GateType::$variant => $flags,)*
                }
            }

            /// Expected numeric argument count, when fixed. `None` means variable
            /// (e.g. `PAULI_CHANNEL_2`'s 15 probabilities, or annotation gates that
            /// accept any number of coordinate args).
            pub fn arg_count(&self) -> Option<usize> {
                match self {
                    $(GateType::$variant => $args,)*
                }
            }

            /// All gate kinds, in table order. Used by tests and by anything that
            /// wants to enumerate the catalog (e.g. building a name-lookup map).
            pub const ALL: &'static [GateType] = &[$(GateType::$variant,)*];
        }
    };
}

use GateFlags as F;

gate_table! {
    // Annotations
    (Detector, "DETECTOR", F::HAS_NO_EFFECT_ON_QUBITS.union(F::ONLY_TARGETS_RECORD), None),
    (ObservableInclude, "OBSERVABLE_INCLUDE", F::HAS_NO_EFFECT_ON_QUBITS.union(F::ONLY_TARGETS_RECORD), Some(1)),
    (Tick, "TICK", F::HAS_NO_EFFECT_ON_QUBITS.union(F::TAKES_NO_TARGETS), Some(0)),
    (QubitCoords, "QUBIT_COORDS", F::HAS_NO_EFFECT_ON_QUBITS, None),
    (ShiftCoords, "SHIFT_COORDS", F::HAS_NO_EFFECT_ON_QUBITS.union(F::TAKES_NO_TARGETS).union(F::ARGS_ARE_UNSIGNED_INTEGERS), None),

    // Control flow
    (Repeat, "REPEAT", F::IS_BLOCK, Some(0)),

    // Collapsing: measurements
    (MX, "MX", F::PRODUCES_RESULTS, Some(0)),
    (MY, "MY", F::PRODUCES_RESULTS, Some(0)),
    (M, "M", F::PRODUCES_RESULTS, Some(0)),
    (MRX, "MRX", F::PRODUCES_RESULTS.union(F::IS_RESET), Some(0)),
    (MRY, "MRY", F::PRODUCES_RESULTS.union(F::IS_RESET), Some(0)),
    (MR, "MR", F::PRODUCES_RESULTS.union(F::IS_RESET), Some(0)),
    (RX, "RX", F::IS_RESET, Some(0)),
    (RY, "RY", F::IS_RESET, Some(0)),
    (R, "R", F::IS_RESET, Some(0)),
    (MPP, "MPP", F::PRODUCES_RESULTS.union(F::TARGETS_PAULI_STRING).union(F::TARGETS_COMBINERS), Some(0)),
    (MPAD, "MPAD", F::PRODUCES_RESULTS.union(F::TAKES_NO_TARGETS), None),
    (MXX, "MXX", F::PRODUCES_RESULTS.union(F::TARGETS_PAIRS), Some(0)),
    (MYY, "MYY", F::PRODUCES_RESULTS.union(F::TARGETS_PAIRS), Some(0)),
    (MZZ, "MZZ", F::PRODUCES_RESULTS.union(F::TARGETS_PAIRS), Some(0)),

    // 2-qubit controlled
    (XCX, "XCX", F::IS_UNITARY.union(F::TARGETS_PAIRS).union(F::CAN_TARGET_BITS), Some(0)),
    (XCY, "XCY", F::IS_UNITARY.union(F::TARGETS_PAIRS).union(F::CAN_TARGET_BITS), Some(0)),
    (XCZ, "XCZ", F::IS_UNITARY.union(F::TARGETS_PAIRS).union(F::CAN_TARGET_BITS), Some(0)),
    (YCX, "YCX", F::IS_UNITARY.union(F::TARGETS_PAIRS).union(F::CAN_TARGET_BITS), Some(0)),
    (YCY, "YCY", F::IS_UNITARY.union(F::TARGETS_PAIRS).union(F::CAN_TARGET_BITS), Some(0)),
    (YCZ, "YCZ", F::IS_UNITARY.union(F::TARGETS_PAIRS).union(F::CAN_TARGET_BITS), Some(0)),
    (CX, "CX", F::IS_UNITARY.union(F::TARGETS_PAIRS).union(F::CAN_TARGET_BITS), Some(0)),
    (CY, "CY", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),
    (CZ, "CZ", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),

    // Hadamard family
    (H, "H", F::IS_UNITARY, Some(0)),
    (H_XY, "H_XY", F::IS_UNITARY, Some(0)),
    (H_YZ, "H_YZ", F::IS_UNITARY, Some(0)),

    // Pauli
    (I, "I", F::IS_UNITARY, Some(0)),
    (X, "X", F::IS_UNITARY, Some(0)),
    (Y, "Y", F::IS_UNITARY, Some(0)),
    (Z, "Z", F::IS_UNITARY, Some(0)),

    // Period-3
    (C_XYZ, "C_XYZ", F::IS_UNITARY, Some(0)),
    (C_ZYX, "C_ZYX", F::IS_UNITARY, Some(0)),

    // Period-4
    (SQRT_X, "SQRT_X", F::IS_UNITARY, Some(0)),
    (SQRT_X_DAG, "SQRT_X_DAG", F::IS_UNITARY, Some(0)),
    (SQRT_Y, "SQRT_Y", F::IS_UNITARY, Some(0)),
    (SQRT_Y_DAG, "SQRT_Y_DAG", F::IS_UNITARY, Some(0)),
    (S, "S", F::IS_UNITARY, Some(0)),
    (S_DAG, "S_DAG", F::IS_UNITARY, Some(0)),

    // Pauli-product square roots
    (SQRT_XX, "SQRT_XX", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),
    (SQRT_YY, "SQRT_YY", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),
    (SQRT_ZZ, "SQRT_ZZ", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),

    // Swaps
    (SWAP, "SWAP", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),
    (ISWAP, "ISWAP", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),
    (ISWAP_DAG, "ISWAP_DAG", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),
    (CXSWAP, "CXSWAP", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),
    (SWAPCX, "SWAPCX", F::IS_UNITARY.union(F::TARGETS_PAIRS), Some(0)),

    // Noise
    (DEPOLARIZE1, "DEPOLARIZE1", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES), Some(1)),
    (DEPOLARIZE2, "DEPOLARIZE2", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES).union(F::TARGETS_PAIRS), Some(1)),
    (X_ERROR, "X_ERROR", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES), Some(1)),
    (Y_ERROR, "Y_ERROR", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES), Some(1)),
    (Z_ERROR, "Z_ERROR", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES), Some(1)),
    (PAULI_CHANNEL_1, "PAULI_CHANNEL_1", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES), Some(3)),
    (PAULI_CHANNEL_2, "PAULI_CHANNEL_2", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES).union(F::TARGETS_PAIRS), Some(15)),
    (HERALDED_ERASE, "HERALDED_ERASE", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES).union(F::PRODUCES_RESULTS), Some(1)),
    (HERALDED_PAULI_CHANNEL_1, "HERALDED_PAULI_CHANNEL_1", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES).union(F::PRODUCES_RESULTS), Some(4)),
    (CORRELATED_ERROR, "CORRELATED_ERROR", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES).union(F::TARGETS_PAULI_STRING).union(F::TARGETS_COMBINERS), Some(1)),
    (ELSE_CORRELATED_ERROR, "ELSE_CORRELATED_ERROR", F::IS_NOISE.union(F::ARGS_ARE_PROBABILITIES).union(F::TARGETS_PAULI_STRING).union(F::TARGETS_COMBINERS), Some(1)),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_gate_has_a_unique_name() {
        let mut names: Vec<&str> = GateType::ALL.iter().map(|g| g.name()).collect();
        names.sort_unstable();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len(), "duplicate gate name in catalog");
    }

    #[test]
    fn noise_gates_carry_probability_args() {
        assert!(GateType::X_ERROR.flags().contains(GateFlags::IS_NOISE));
        assert!(GateType::X_ERROR.flags().contains(GateFlags::ARGS_ARE_PROBABILITIES));
        assert_eq!(GateType::X_ERROR.arg_count(), Some(1));
    }

    #[test]
    fn annotations_have_no_effect_on_qubits() {
        assert!(GateType::Detector.flags().contains(GateFlags::HAS_NO_EFFECT_ON_QUBITS));
        assert!(GateType::Tick.flags().contains(GateFlags::TAKES_NO_TARGETS));
    }

    #[test]
    fn two_qubit_gates_target_pairs() {
        for g in [GateType::CX, GateType::CZ, GateType::SWAP, GateType::ISWAP] {
            assert!(g.flags().contains(GateFlags::TARGETS_PAIRS), "{g:?}");
        }
    }
}
