//! # MPC Solve Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use mpc_lib::mpc::{InputData, MpcCtrl, Params, RefCoeffs, VehicleState};
use util::module::State;

fn mpc_solve_benchmark(c: &mut Criterion) {
    // ---- Build the controller ----

    let mut mpc_ctrl = MpcCtrl::new(Params::default()).unwrap();

    // Flat reference one metre to the left of a vehicle travelling at 10
    let input = InputData {
        state: VehicleState::new(0.0, 0.0, 0.0, 10.0, 1.0, 0.1),
        coeffs: RefCoeffs([1.0, 0.0, 0.0, 0.0])
    };

    // ---- Benchmark one full build-solve-extract cycle ----

    c.bench_function("mpc_solve", |b| b.iter(|| mpc_ctrl.proc(&input).unwrap()));
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = mpc_solve_benchmark
}
criterion_main!(benches);
