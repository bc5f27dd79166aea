//! Integration tests for [stim_core::analyzer] against small but complete
//! circuits, mirroring scenarios a reverse error analyzer is expected to get
//! right: a genuine multi-qubit correlated-error pattern, and loop folding.

use stim_core::analyzer::{analyze, AnalyzerConfig};
use stim_core::circuit::Circuit;
use stim_core::dem::{DemTarget, DetectorErrorModel};
use stim_core::gate::{GateTarget, GateType};

fn q(i: u32) -> GateTarget {
    GateTarget::qubit(i)
}

fn x(i: u32) -> GateTarget {
    GateTarget::x(i, false)
}

fn comb() -> GateTarget {
    GateTarget::combiner()
}

fn d(id: u64) -> DemTarget {
    DemTarget::relative_detector_id(id)
}

fn l(id: u32) -> DemTarget {
    DemTarget::observable_id(id)
}

/// A 7-qubit repetition code round: prepare every qubit in `|+>`, measure the
/// six adjacent-pair parities, apply independent Z errors, remeasure every
/// qubit singly, and detect each pair parity against its two single-qubit
/// readouts. Every detector only shares qubits with its neighbors, so each
/// independent Z error shows up as a two-detector (or boundary, detector +
/// observable) mechanism.
fn repetition_code_round() -> Circuit {
    let mut c = Circuit::new();
    c.push(GateType::RX, &[], &(0..7).map(q).collect::<Vec<_>>(), None).unwrap();

    let mut pair_targets = Vec::new();
    for i in 0..6u32 {
        pair_targets.push(x(i));
        pair_targets.push(comb());
        pair_targets.push(x(i + 1));
    }
    c.push(GateType::MPP, &[], &pair_targets, None).unwrap();

    c.push(GateType::Z_ERROR, &[0.125], &(0..7).map(q).collect::<Vec<_>>(), None).unwrap();

    c.push(GateType::MPP, &[], &(0..7).map(x).collect::<Vec<_>>(), None).unwrap();

    // 13 measurements total (6 pair parities + 7 singles); every rec[] below
    // is resolved against that fixed count, since DETECTOR/OBSERVABLE_INCLUDE
    // don't themselves produce measurements.
    for k in 0..6u32 {
        let pair_offset = 8 + k; // rec[-8] .. rec[-13]
        c.push(
            GateType::Detector,
            &[],
            &[GateTarget::rec(1 + k), GateTarget::rec(2 + k), GateTarget::rec(pair_offset)],
            None,
        )
        .unwrap();
    }
    c.push(GateType::ObservableInclude, &[0.0], &[GateTarget::rec(1)], None).unwrap();

    c
}

#[test]
fn repetition_code_round_produces_neighbor_chained_errors() {
    let circuit = repetition_code_round();
    let config = AnalyzerConfig { decompose_errors: false, ..AnalyzerConfig::default() };
    let dem = analyze(&circuit, &config).unwrap();

    let mut expected = DetectorErrorModel::new();
    expected.push_error(0.125, &[d(0), d(1)], None).unwrap();
    expected.push_error(0.125, &[d(0), l(0)], None).unwrap();
    expected.push_error(0.125, &[d(1), d(2)], None).unwrap();
    expected.push_error(0.125, &[d(2), d(3)], None).unwrap();
    expected.push_error(0.125, &[d(3), d(4)], None).unwrap();
    expected.push_error(0.125, &[d(4), d(5)], None).unwrap();
    expected.push_error(0.125, &[d(5)], None).unwrap();

    let errors_only: Vec<_> =
        dem.instructions.iter().filter(|i| i.kind == stim_core::dem::DemInstructionKind::Error).cloned().collect();
    let mut errors_dem = DetectorErrorModel::new();
    for instr in &errors_only {
        errors_dem.push_error(dem.args(instr)[0], dem.targets(instr), instr.tag.clone()).unwrap();
    }
    assert!(errors_dem.approx_equals(&expected, 1e-9), "got: {:#?}", errors_only);
}

/// A 100-round repetition code with uniform depolarizing noise: with loop
/// folding on, every round should be shape-identical up to a detector-id
/// shift, so the analyzer should collapse the bulk into one `repeat` block
/// instead of emitting 100 flat copies.
fn looped_repetition_code(rounds: u64) -> Circuit {
    let mut body = Circuit::new();
    body.push(GateType::DEPOLARIZE1, &[0.01], &[q(0), q(1)], None).unwrap();
    body.push(GateType::MPP, &[], &[x(0), comb(), x(1)], None).unwrap();
    body.push(GateType::Detector, &[], &[GateTarget::rec(1), GateTarget::rec(2)], None).unwrap();

    let mut c = Circuit::new();
    c.push(GateType::RX, &[], &[q(0), q(1)], None).unwrap();
    c.push(GateType::MPP, &[], &[x(0), comb(), x(1)], None).unwrap();
    c.push_repeat(rounds, body).unwrap();
    c
}

#[test]
fn large_repeat_block_folds_instead_of_unrolling() {
    let circuit = looped_repetition_code(100);
    let config = AnalyzerConfig { fold_loops: true, allow_gauge_detectors: true, ..AnalyzerConfig::default() };
    let dem = analyze(&circuit, &config).unwrap();

    let repeats: Vec<_> = dem
        .instructions
        .iter()
        .filter_map(|instr| dem.repeat_block(instr))
        .collect();
    assert_eq!(repeats.len(), 1, "expected exactly one folded repeat block, got {:#?}", repeats);
    let (_, count) = repeats[0];
    assert!(count >= 99, "expected the fold to absorb nearly all 100 rounds, got count={count}");
}

#[test]
fn empty_circuit_analyzes_to_an_empty_model() {
    let circuit = Circuit::new();
    let dem = analyze(&circuit, &AnalyzerConfig::default()).unwrap();
    assert!(dem.instructions.is_empty());
    assert!(dem.blocks.is_empty());
}
