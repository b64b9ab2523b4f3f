//! # PID Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::sim;
use drive_lib::{
    pid_ctrl::{Coefficients, ControllerConfig, FixedConfig, PidCtrl, Twiddle, TuningConfig},
    sim_server::handle_frame,
};

fn pid_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build controllers ----

    let coefficients = Coefficients::new(0.1, 1e-4, 4.0);

    let mut fixed = PidCtrl::new(ControllerConfig::Fixed(FixedConfig {
        coefficients,
        off_track_cte: 5.0,
    }));

    // Long enough that no episode ends during the benchmark
    let mut tuning = PidCtrl::new(ControllerConfig::Tuning(TuningConfig {
        coefficients,
        deltas: Coefficients::new(0.01, 1e-5, 0.1),
        off_track_cte: 5.0,
        track_length_m: f64::MAX,
    }));

    let frame = r#"42["telemetry",{"cte":"0.7598","speed":"30.4380","steering_angle":"-1.25","throttle":"0.5000","image":""}]"#;

    // Bench the control law alone
    c.bench_function("PidCtrl::proc::fixed", |b| {
        b.iter(|| fixed.proc(black_box(0.25), black_box(45.0)))
    });

    // Bench with episode tracking
    c.bench_function("PidCtrl::proc::tuning", |b| {
        b.iter(|| tuning.proc(black_box(0.25), black_box(45.0)))
    });

    c.bench_function("sim::parse_frame", |b| {
        b.iter(|| sim::parse_frame(black_box(frame)).unwrap())
    });

    // Bench the full frame, decode to encoded reply
    c.bench_function("handle_frame", |b| {
        b.iter(|| handle_frame(&mut fixed, black_box(frame)).map(|cmd| cmd.to_frame()))
    });

    c.bench_function("Twiddle::submit", |b| {
        let mut twiddle = Twiddle::new(coefficients.with_deltas(&Coefficients::new(0.01, 1e-5, 0.1)));
        let mut score = 1e6;
        b.iter(|| {
            score *= 0.999;
            twiddle.submit(black_box(score))
        })
    });
}

criterion_group!(benches, pid_ctrl_benchmark);
criterion_main!(benches);
