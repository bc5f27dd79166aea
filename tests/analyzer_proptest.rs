//! Randomized sanity check: any circuit built from a restricted, always-valid
//! gate set analyzes without panicking and produces a self-consistent model.
//! Deliberately avoids gates whose determinism depends on circuit history
//! (plain Hadamards etc.), since failing that check is a legitimate analyzer
//! error, not a bug in the generator.

use stim_core::analyzer::{analyze, AnalyzerConfig};
use stim_core::circuit::Circuit;
use stim_core::gate::{GateTarget, GateType};
use proptest::{
    prop_oneof, proptest,
    strategy::Strategy,
    test_runner::{Config, FileFailurePersistence},
};

const NUM_QUBITS: u32 = 4;
const MAX_OPS: usize = 40;

#[derive(Debug, Clone, Copy)]
enum Op {
    Clifford1(GateType, u32),
    Clifford2(GateType, u32, u32),
    NoiseX(u32, f64),
    Depolarize1(u32, f64),
    MeasureAndDetect(u32),
}

fn qubit() -> impl Strategy<Value = u32> {
    0..NUM_QUBITS
}

fn probability() -> impl Strategy<Value = f64> {
    (0u32..100).prop_map(|p| p as f64 / 200.0)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        qubit().prop_map(|q| Op::Clifford1(GateType::H, q)),
        qubit().prop_map(|q| Op::Clifford1(GateType::S, q)),
        (qubit(), qubit()).prop_filter("distinct qubits", |(a, b)| a != b).prop_map(|(a, b)| Op::Clifford2(GateType::CX, a, b)),
        (qubit(), probability()).prop_map(|(q, p)| Op::NoiseX(q, p)),
        (qubit(), probability()).prop_map(|(q, p)| Op::Depolarize1(q, p)),
        qubit().prop_map(Op::MeasureAndDetect),
    ]
}

fn vec_op(max: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(op(), 0..max)
}

/// Tracks how many measurements have been recorded for each qubit so a
/// `MeasureAndDetect` can pair with the *previous* measurement of the same
/// qubit (if any) instead of producing a detector that is trivially
/// non-deterministic on the very first measurement.
struct Builder {
    circuit: Circuit,
    last_measurement_of: [Option<u32>; NUM_QUBITS as usize],
    measurement_count: u32,
}

impl Builder {
    fn new() -> Self {
        Self { circuit: Circuit::new(), last_measurement_of: [None; NUM_QUBITS as usize], measurement_count: 0 }
    }

    fn apply(&mut self, ops: &[Op]) {
        for op in ops {
            match *op {
                Op::Clifford1(gate, q) => {
                    self.circuit.push(gate, &[], &[GateTarget::qubit(q)], None).unwrap();
                }
                Op::Clifford2(gate, a, b) => {
                    self.circuit
                        .push(gate, &[], &[GateTarget::qubit(a), GateTarget::qubit(b)], None)
                        .unwrap();
                }
                Op::NoiseX(q, p) => {
                    if p > 0.0 {
                        self.circuit.push(GateType::X_ERROR, &[p], &[GateTarget::qubit(q)], None).unwrap();
                    }
                }
                Op::Depolarize1(q, p) => {
                    if p > 0.0 {
                        self.circuit.push(GateType::DEPOLARIZE1, &[p], &[GateTarget::qubit(q)], None).unwrap();
                    }
                }
                Op::MeasureAndDetect(q) => {
                    self.circuit.push(GateType::M, &[], &[GateTarget::qubit(q)], None).unwrap();
                    self.measurement_count += 1;
                    let current = self.measurement_count;
                    if let Some(previous) = self.last_measurement_of[q as usize] {
                        let back_to_previous = current - previous;
                        self.circuit
                            .push(
                                GateType::Detector,
                                &[],
                                &[GateTarget::rec(1), GateTarget::rec(1 + back_to_previous)],
                                None,
                            )
                            .unwrap();
                    }
                    self.last_measurement_of[q as usize] = Some(current);
                }
            }
        }
    }
}

proptest! {
    #![proptest_config(Config {
        failure_persistence: Some(Box::new(FileFailurePersistence::WithSource(
            "regressions",
        ))),
        ..Default::default()
    })]
    #[test]
    #[ignore = "run proptests explicitly"]
    fn analyze_never_panics_on_repeated_measurements(ops in vec_op(MAX_OPS)) {
        let mut builder = Builder::new();
        builder.apply(&ops);

        // `allow_gauge_detectors` means every possible source of non-determinism
        // in this restricted gate set converts to a gauge mechanism rather than
        // an error, so analysis should never fail here, only potentially panic.
        let config = AnalyzerConfig { allow_gauge_detectors: true, ..AnalyzerConfig::default() };
        let dem = analyze(&builder.circuit, &config).unwrap();
        dem.validate().unwrap();
        let stats = builder.circuit.compute_stats();
        assert_eq!(dem.num_detectors(), stats.num_detectors);
    }
}
