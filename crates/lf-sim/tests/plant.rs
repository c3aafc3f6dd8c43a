use lf_controls::ProcessIo;
use lf_fuzzy::Valve;
use lf_sim::{
    FirstOrderActuator, IntegratorType, OpenLoopOptions, SimulatedProcess, StepSchedule, TankPlant,
    TransientModel, run_open_loop,
};

fn plant() -> TankPlant {
    TankPlant::new(
        0.5,
        0.02,
        0.02,
        5.0,
        2.0,
        FirstOrderActuator::new(1.0, 0.5).unwrap(),
    )
    .unwrap()
}

#[test]
fn open_fill_valve_raises_level_at_line_capacity() {
    let mut p = plant();
    p.commands.fill = 1.0;
    let opts = OpenLoopOptions {
        dt: 0.05,
        duration_s: 30.0,
        record_every: 10,
        ..OpenLoopOptions::default()
    };
    let traj = run_open_loop(&mut p, &opts).unwrap();
    let (_, last) = traj.last().unwrap();
    assert!((last.fill_position - 1.0).abs() < 1e-6);

    // Once fully open the level rises at 0.02 / 0.5 = 0.04 m/s.
    let n = traj.len();
    let (t0, x0) = traj.samples[n - 11];
    let (t1, x1) = traj.samples[n - 1];
    let slope = (x1.level_m - x0.level_m) / (t1 - t0);
    assert!((slope - 0.04).abs() < 1e-6);
}

#[test]
fn level_never_leaves_the_tank() {
    let mut p = plant();
    p.commands.drain = 1.0;
    let opts = OpenLoopOptions {
        dt: 0.1,
        duration_s: 200.0,
        ..OpenLoopOptions::default()
    };
    let traj = run_open_loop(&mut p, &opts).unwrap();
    for (_, x) in &traj.samples {
        assert!((0.0..=5.0).contains(&x.level_m));
    }
    assert_eq!(traj.last().unwrap().1.level_m, 0.0);
}

#[test]
fn integrators_agree_on_smooth_drain() {
    let run = |integrator| {
        let mut p = plant();
        p.commands.drain = 0.4;
        let opts = OpenLoopOptions {
            dt: 0.01,
            duration_s: 20.0,
            record_every: 100,
            integrator,
        };
        run_open_loop(&mut p, &opts).unwrap().last().unwrap().1.level_m
    };
    let rk4 = run(IntegratorType::RK4);
    let euler = run(IntegratorType::ForwardEuler);
    assert!((rk4 - euler).abs() < 1e-3);
    assert!(rk4 < plant().initial_state().level_m);
}

#[test]
fn process_follows_setpoint_schedule() {
    let valves = vec![
        Valve::new("fill", 0.0, 10.0).unwrap(),
        Valve::new("drain", 0.0, 10.0).unwrap(),
    ];
    let setpoints = StepSchedule::new(vec![(30.0, 2.5)]).unwrap();
    let mut process = SimulatedProcess::new(plant(), &valves, 3.3)
        .unwrap()
        .with_setpoints(setpoints)
        .with_integrator(IntegratorType::ForwardEuler);

    assert_eq!(process.read_setpoint().unwrap(), 3.3);
    process.write_actuator("fill", 10.0).unwrap();
    process.advance_to(30.0).unwrap();
    assert_eq!(process.read_setpoint().unwrap(), 2.5);
    assert!(process.read_measurement().unwrap() > 2.0);
    assert!((process.time() - 30.0).abs() < 1e-9);
}
