//! End-to-end analyses through the public API.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use nodal_core::{
    CircuitError, ComponentKind, ComponentSpec, ErrorCategory, Simulator, SimulatorConfig, Topology, Transient,
    TransientParams,
};

fn simulator(topology: &Topology) -> Simulator {
    Simulator::from_topology(topology, SimulatorConfig::new().with_strict(true)).unwrap()
}

fn divider() -> Topology {
    let mut t = Topology::new();
    t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 5.0))
        .add(ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", 270.0))
        .add(ComponentSpec::new("mid", ComponentKind::Junction))
        .add(ComponentSpec::new("R2", ComponentKind::Resistor).with("resistance", 150.0))
        .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "R1.a").unwrap();
    t.connect("R1.b", "mid.node").unwrap();
    t.connect("mid.node", "R2.a").unwrap();
    t.connect("R2.b", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();
    t
}

fn rectifier(amplitude: f64) -> Topology {
    let mut t = Topology::new();
    t.add(
        ComponentSpec::new("V1", ComponentKind::VoltageSource)
            .with("amplitude", amplitude)
            .with("frequency", 50.0),
    )
    .add(ComponentSpec::new("in", ComponentKind::Junction))
    .add(ComponentSpec::new("D1", ComponentKind::Diode))
    .add(ComponentSpec::new("out", ComponentKind::Junction))
    .add(ComponentSpec::new("RL", ComponentKind::Resistor).with("resistance", 1e3))
    .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "in.node").unwrap();
    t.connect("in.node", "D1.anode").unwrap();
    t.connect("D1.cathode", "out.node").unwrap();
    t.connect("out.node", "RL.a").unwrap();
    t.connect("RL.b", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();
    t
}

fn rl_load(level: f64) -> Topology {
    let mut t = Topology::new();
    t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 10.0))
        .add(
            ComponentSpec::new("X1", ComponentKind::Load)
                .with("resistance", 10.0)
                .with("inductance", 0.1)
                .with("level", level),
        )
        .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "X1.a").unwrap();
    t.connect("X1.b", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();
    t
}

#[test]
fn voltage_divider_single_pass() {
    let mut sim = simulator(&divider());
    let op = sim.dc_operating_point().unwrap();

    assert_eq!(sim.last_iterations(), 1);
    assert_abs_diff_eq!(op.values["mid"], 5.0 * 150.0 / 420.0, epsilon = 1e-9);
    assert_abs_diff_eq!(op.values["mid"], 1.786, epsilon = 1e-3);
    // Source delivers 5/420 A, reported as current entering its positive terminal
    assert_abs_diff_eq!(op.values["V1_I"], -5.0 / 420.0, epsilon = 1e-12);
    assert_abs_diff_eq!(op.values["R1_I"], 5.0 / 420.0, epsilon = 1e-12);
}

#[test]
fn half_wave_rectifier_blocks_negative_half_cycle() {
    let sim = simulator(&rectifier(5.0));
    let mut run = Transient::new(sim, TransientParams::new(1e-4, 0.04)).unwrap();
    let series = run.run_to_end().unwrap();
    assert_eq!(series.len(), 401);

    let mut peak_out = f64::MIN;
    for s in &series.samples {
        if s.values["in"] < 0.0 {
            assert!(s.values["RL_I"].abs() < 1e-12, "conducting at t = {}", s.time);
        }
        peak_out = peak_out.max(s.values["out"]);
    }
    // Forward drop at ~4 mA is well above half a volt
    assert!(peak_out < 5.0 - 0.5, "peak output {peak_out}");
    assert!(peak_out > 5.0 - 0.9, "peak output {peak_out}");
}

#[test]
fn rectifier_below_threshold_never_conducts() {
    let sim = simulator(&rectifier(0.2));
    let mut run = Transient::new(sim, TransientParams::new(1e-4, 0.02)).unwrap();
    for s in &run.run_to_end().unwrap().samples {
        assert!(s.values["RL_I"].abs() < 1e-8);
    }
}

#[test]
fn rl_load_step_response() {
    let tau = 0.1 / 10.0;
    let dt = 1e-4;
    let sim = simulator(&rl_load(100.0));
    let mut run = Transient::new(sim, TransientParams::new(dt, 5.0 * tau)).unwrap();
    let series = run.run_to_end().unwrap();

    let first = &series.samples[0];
    assert_abs_diff_eq!(first.values["X1_I"], 0.0, epsilon = 1e-6);

    for s in &series.samples {
        let expected = 1.0 - (-s.time / tau).exp();
        assert_abs_diff_eq!(s.values["X1_I"], expected, epsilon = 5e-3);
    }

    // Halving dt shrinks the worst error
    let worst = |dt: f64| {
        let sim = simulator(&rl_load(100.0));
        let mut run = Transient::new(sim, TransientParams::new(dt, tau)).unwrap();
        run.run_to_end()
            .unwrap()
            .samples
            .iter()
            .map(|s| (s.values["X1_I"] - (1.0 - (-s.time / tau).exp())).abs())
            .fold(0.0, f64::max)
    };
    assert!(worst(dt / 2.0) < worst(dt));
}

#[test]
fn rl_with_discrete_inductor() {
    let mut t = Topology::new();
    t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 1.0))
        .add(ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", 100.0))
        .add(ComponentSpec::new("L1", ComponentKind::Inductor).with("inductance", 0.1))
        .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "R1.a").unwrap();
    t.connect("R1.b", "L1.a").unwrap();
    t.connect("L1.b", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();

    let tau = 1e-3;
    let mut run = Transient::new(simulator(&t), TransientParams::new(1e-5, 5e-3)).unwrap();
    for s in &run.run_to_end().unwrap().samples {
        assert_abs_diff_eq!(s.values["L1_I"], 0.01 * (1.0 - (-s.time / tau).exp()), epsilon = 5e-5);
    }
}

#[test]
fn rc_charge_curve() {
    let mut t = Topology::new();
    t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 1.0))
        .add(ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", 1e3))
        .add(ComponentSpec::new("out", ComponentKind::Junction))
        .add(ComponentSpec::new("C1", ComponentKind::Capacitor).with("capacitance", 1e-6))
        .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "R1.a").unwrap();
    t.connect("R1.b", "out.node").unwrap();
    t.connect("out.node", "C1.a").unwrap();
    t.connect("C1.b", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();

    let mut run = Transient::new(simulator(&t), TransientParams::new(1e-5, 5e-3)).unwrap();
    let series = run.run_to_end().unwrap();
    let (start, end) = series.time_range().unwrap();
    assert_eq!(start, 0.0);
    assert_relative_eq!(end, 5e-3, max_relative = 1e-12);
    for s in &series.samples {
        assert_abs_diff_eq!(s.values["out"], 1.0 - (-s.time / 1e-3).exp(), epsilon = 5e-3);
        assert_relative_eq!(s.values["C1_I"], s.values["R1_I"], max_relative = 1e-6);
    }
}

#[test]
fn zero_level_load_is_nearly_open() {
    let mut sim = simulator(&rl_load(0.0));
    let op = sim.dc_operating_point().unwrap();
    assert!(op.values["X1_I"].abs() < 1e-7);
    assert!(op.values["X1_I"].is_finite());
}

#[test]
fn isolated_node_is_topology_error() {
    let mut t = divider();
    t.add(ComponentSpec::new("R3", ComponentKind::Resistor));
    t.connect("R3.a", "mid.node").unwrap();

    let err = Simulator::from_topology(&t, SimulatorConfig::new()).unwrap_err();
    assert!(matches!(err, CircuitError::FloatingNode { .. }));
    assert_eq!(err.category(), ErrorCategory::Topology);

    let err = Simulator::from_topology(&t, SimulatorConfig::new().with_strict(true)).unwrap_err();
    assert!(matches!(err, CircuitError::DanglingTerminal { .. }));
}

#[test]
fn state_survives_save_and_restore() {
    let dt = 1e-4;

    let mut straight = Transient::new(simulator(&rl_load(100.0)), TransientParams::new(dt, 0.02)).unwrap();
    let expected = straight.run_to_end().unwrap().last().unwrap().values["X1_I"];

    // First half, then persist state through JSON
    let mut topo = rl_load(100.0);
    let mut first = Transient::new(simulator(&topo), TransientParams::new(dt, 0.01)).unwrap();
    first.run_to_end().unwrap();
    topo.apply_states(&first.simulator().component_states());
    let restored = Topology::from_json(&topo.to_json().unwrap()).unwrap();
    assert_eq!(restored.component("X1").unwrap().state, topo.component("X1").unwrap().state);

    let mut second = Transient::new(simulator(&restored), TransientParams::new(dt, 0.01)).unwrap();
    let resumed = second.run_to_end().unwrap().last().unwrap().values["X1_I"];
    assert_abs_diff_eq!(resumed, expected, epsilon = 1e-12);
}

#[test]
fn meters_and_transformer() {
    let mut t = Topology::new();
    t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 10.0))
        .add(ComponentSpec::new("A1", ComponentKind::Ammeter))
        .add(ComponentSpec::new("T1", ComponentKind::Transformer).with("ratio", 2.0))
        .add(ComponentSpec::new("W1", ComponentKind::Wattmeter))
        .add(ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", 100.0))
        .add(ComponentSpec::new("VM1", ComponentKind::Voltmeter))
        .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "A1.pos").unwrap();
    t.connect("A1.neg", "T1.p1").unwrap();
    t.connect("T1.p2", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();
    t.connect("T1.s1", "W1.i_in").unwrap();
    t.connect("W1.i_out", "R1.a").unwrap();
    t.connect("R1.b", "GND.gnd").unwrap();
    t.connect("T1.s2", "GND.gnd").unwrap();
    t.connect("W1.v_pos", "R1.a").unwrap();
    t.connect("W1.v_neg", "GND.gnd").unwrap();
    t.connect("VM1.pos", "R1.a").unwrap();
    t.connect("VM1.neg", "GND.gnd").unwrap();

    let op = simulator(&t).dc_operating_point().unwrap();
    assert_relative_eq!(op.values["VM1_V"], 5.0, max_relative = 1e-4);
    assert_relative_eq!(op.values["W1_V"], 5.0, max_relative = 1e-4);
    assert_relative_eq!(op.values["W1_I"], 0.05, max_relative = 1e-4);
    assert_relative_eq!(op.values["W1_P"], 0.25, max_relative = 1e-4);
    assert_relative_eq!(op.values["A1_I"], 0.025, max_relative = 1e-4);
    assert_relative_eq!(op.values["V1_I"], -0.025, max_relative = 1e-4);
}

#[test]
fn inverting_amplifier() {
    let mut t = Topology::new();
    t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 0.1))
        .add(ComponentSpec::new("Rin", ComponentKind::Resistor).with("resistance", 1e3))
        .add(ComponentSpec::new("Rf", ComponentKind::Resistor).with("resistance", 1e4))
        .add(ComponentSpec::new("U1", ComponentKind::OpAmp))
        .add(ComponentSpec::new("out", ComponentKind::Junction))
        .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "Rin.a").unwrap();
    t.connect("Rin.b", "U1.in_neg").unwrap();
    t.connect("Rf.a", "U1.in_neg").unwrap();
    t.connect("Rf.b", "out.node").unwrap();
    t.connect("U1.out", "out.node").unwrap();
    t.connect("U1.in_pos", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();

    let op = simulator(&t).dc_operating_point().unwrap();
    assert_abs_diff_eq!(op.values["out"], -1.0, epsilon = 1e-3);
}

#[test]
fn cancelled_run_reports_category() {
    let sim = simulator(&rl_load(100.0));
    let mut run = Transient::new(sim, TransientParams::new(1e-4, 0.01)).unwrap();
    run.advance(10).unwrap();
    run.cancel_flag().cancel();
    let err = run.advance(10).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Cancelled);
    assert_eq!(run.series().len(), 11);
}

#[test]
fn bad_property_fails_before_run() {
    let mut t = rl_load(100.0);
    t.components[1].properties.insert("level".into(), 150.0);
    let err = Simulator::from_topology(&t, SimulatorConfig::new()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Parameter);
}

#[test]
fn junction_named_like_auto_node_keeps_both_voltages() {
    let mut t = Topology::new();
    t.add(ComponentSpec::new("V1", ComponentKind::VoltageSource).with("dc", 5.0))
        .add(ComponentSpec::new("R1", ComponentKind::Resistor).with("resistance", 270.0))
        .add(ComponentSpec::new("N1", ComponentKind::Junction))
        .add(ComponentSpec::new("R2", ComponentKind::Resistor).with("resistance", 150.0))
        .add(ComponentSpec::new("GND", ComponentKind::Ground));
    t.connect("V1.pos", "R1.a").unwrap();
    t.connect("R1.b", "N1.node").unwrap();
    t.connect("N1.node", "R2.a").unwrap();
    t.connect("R2.b", "GND.gnd").unwrap();
    t.connect("V1.neg", "GND.gnd").unwrap();

    let mut sim = simulator(&t);
    let op = sim.dc_operating_point().unwrap();
    assert_abs_diff_eq!(op.values["N1"], 5.0 * 150.0 / 420.0, epsilon = 1e-9);
    assert_abs_diff_eq!(op.values["N1_1"], 5.0, epsilon = 1e-9);
    for (name, value) in &op.values {
        if let Some(v) = sim.node_voltage(name) {
            assert_eq!(v, *value, "{name}");
        }
    }
}
