use critline_core::critical::{CriticalTrace, CriticalTracer, Termination};
use critline_core::models::VdW;
use critline_core::{trace_critical_arclength_binary, ContinuationOptions, ModelSpec, ResidualModel};
use nalgebra::DVector;

const TC: [f64; 2] = [190.564, 305.32];
const PC: [f64; 2] = [4.5992e6, 4.872e6];

fn methane_ethane() -> VdW {
    VdW::new(&TC, &PC)
}

fn pure_start(model: &VdW) -> DVector<f64> {
    DVector::from_vec(vec![model.critical_density(0), 0.0])
}

#[test]
fn zero_step_trace_reproduces_the_critical_point() {
    let model = methane_ethane();
    let options = ContinuationOptions {
        max_step_count: 0,
        ..Default::default()
    };
    let trace = trace_critical_arclength_binary(&model, TC[0], &pure_start(&model), options, None)
        .expect("trace should start");

    assert_eq!(trace.termination, Termination::Exhausted);
    assert_eq!(trace.points.len(), 1);
    let point = &trace.points[0];
    assert!(point.lambda1.abs() <= 1e-6, "lambda1 = {}", point.lambda1);
    assert!(point.dirderiv_lambda1.abs() <= 1e-6, "dirderiv = {}", point.dirderiv_lambda1);
    assert_eq!(point.rho1, 0.0);
    assert!((point.pressure - PC[0]).abs() < 1e-6 * PC[0]);
}

#[test]
fn initial_direction_flips_away_from_negative_concentrations() {
    let model = methane_ethane();
    let rho = pure_start(&model);

    let forward = CriticalTracer::new(
        &model,
        TC[0],
        &rho,
        ContinuationOptions {
            init_c: 1.0,
            ..Default::default()
        },
    )
    .expect("tracer");
    let backward = CriticalTracer::new(
        &model,
        TC[0],
        &rho,
        ContinuationOptions {
            init_c: -1.0,
            ..Default::default()
        },
    )
    .expect("tracer");

    // Only one of the two requested signs keeps rho1 non-negative, so both
    // tracers must settle on the same one.
    assert_eq!(forward.direction(), backward.direction());
    for mut tracer in [forward, backward] {
        let first = tracer.next().expect("initial point");
        assert_eq!(first.c, tracer.direction());
        assert!(first.drho1dt > 0.0, "drho1/dt = {}", first.drho1dt);
    }
}

fn assert_normal_end(trace: &CriticalTrace) {
    assert!(
        matches!(
            trace.termination,
            Termination::OutOfDomain | Termination::Converged
        ),
        "trace ended with {}",
        trace.termination
    );
}

#[test]
fn binary_trace_sweeps_the_composition_range() {
    let model = methane_ethane();
    let options = ContinuationOptions {
        max_step_count: 200,
        integration_order: 5,
        polish: false,
        ..Default::default()
    };
    let trace = trace_critical_arclength_binary(&model, TC[0], &pure_start(&model), options, None)
        .expect("trace should start");

    assert_normal_end(&trace);
    assert!(trace.points.len() > 5, "only {} points", trace.points.len());
    let z0: Vec<f64> = trace.points.iter().map(|p| p.z0()).collect();
    assert_eq!(z0[0], 1.0);
    assert!(z0.iter().all(|z| (0.0..=1.0).contains(z)));
    assert!(
        z0.windows(2).all(|w| w[1] <= w[0] + 1e-12),
        "mole fraction must vary monotonically"
    );
    let last = trace.points.last().expect("points");
    assert!(last.z0() < 1e-3, "trace stopped at z0 = {}", last.z0());
    assert!((last.temperature - TC[1]).abs() < 1.0, "end temperature {}", last.temperature);
    assert!(trace.points.windows(2).all(|w| w[1].t > w[0].t));
}

#[test]
fn trace_from_the_heavier_component_reaches_the_lighter_one() {
    let model = methane_ethane();
    let rho = DVector::from_vec(vec![0.0, model.critical_density(1)]);
    let options = ContinuationOptions {
        max_step_count: 200,
        ..Default::default()
    };
    let trace = trace_critical_arclength_binary(&model, TC[1], &rho, options, None)
        .expect("trace should start");

    assert_normal_end(&trace);
    assert_eq!(trace.points[0].z0(), 0.0);
    let last = trace.points.last().expect("points");
    assert!(last.z0() > 1.0 - 1e-3, "trace stopped at z0 = {}", last.z0());
}

#[test]
fn polished_points_satisfy_the_criticality_conditions() {
    let model = methane_ethane();
    let options = ContinuationOptions {
        max_step_count: 15,
        polish: true,
        ..Default::default()
    };
    let trace = trace_critical_arclength_binary(&model, TC[0], &pure_start(&model), options, None)
        .expect("trace should start");

    assert!(trace.points.len() > 1);
    for point in &trace.points {
        assert!(point.lambda1.abs() < 1e-6, "lambda1 = {}", point.lambda1);
        assert!(
            point.dirderiv_lambda1.abs() < 1e-6,
            "dirderiv = {}",
            point.dirderiv_lambda1
        );
    }
}

#[test]
fn euler_trace_takes_fixed_steps() {
    let model = methane_ethane();
    let options = ContinuationOptions {
        integration_order: 1,
        max_step_count: 20,
        ..Default::default()
    };
    let trace = trace_critical_arclength_binary(&model, TC[0], &pure_start(&model), options, None)
        .expect("trace should start");

    assert_eq!(trace.termination, Termination::Exhausted);
    assert_eq!(trace.points.len(), 21);
    for (k, point) in trace.points.iter().enumerate() {
        assert!((point.t - 10.0 * k as f64).abs() < 1e-9);
    }
}

#[test]
fn model_built_from_json_traces_like_the_direct_model() {
    let spec: ModelSpec = serde_json::from_str(
        r#"{"kind": "vdW", "model": {"Tcrit / K": [190.564, 305.32], "pcrit / Pa": [4.5992e6, 4.872e6]}}"#,
    )
    .expect("spec");
    let model = spec.build().expect("model");
    assert_eq!(model.component_count(), 2);

    let direct = methane_ethane();
    let rho = pure_start(&direct);
    let options = ContinuationOptions {
        max_step_count: 3,
        ..Default::default()
    };
    let from_spec = trace_critical_arclength_binary(&model, TC[0], &rho, options, None).expect("trace");
    let from_direct = trace_critical_arclength_binary(&direct, TC[0], &rho, options, None).expect("trace");
    assert_eq!(from_spec.points, from_direct.points);
}
