//! Benchmark: emulated simtk kernels vs sequential host reference.

use std::time::Instant;

use simtk_core::Executor;
use simtk_kernels::{ops, Matrix};

fn time_it(iters: usize, mut f: impl FnMut()) -> f64 {
    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn gflops(m: usize, n: usize, k: usize, secs: f64) -> f64 {
    (2.0 * m as f64 * n as f64 * k as f64) / secs / 1e9
}

fn pattern(rows: usize, cols: usize, mul: usize, modulus: usize) -> Matrix {
    let data = (0..rows * cols)
        .map(|i| ((i * mul + 3) % modulus) as f32 * 0.1 - 0.6)
        .collect();
    Matrix::from_col_major(rows, cols, data).unwrap()
}

fn main() {
    let exec = Executor::global();
    println!("=== simtk GEMM Benchmark ===");
    println!("Blocks: {}, workers: {:?}\n",
        if exec.config().parallel_blocks { "parallel" } else { "serial" },
        exec.config().worker_threads);

    println!("{:<16} {:>12} {:>12} {:>9} {:>10} {:>10}",
        "Size", "Naive (ms)", "GEMM (ms)", "Speedup", "GEMM GF/s", "Max err");
    println!("{}", "-".repeat(74));

    for &(m, k, n) in &[(128, 128, 128), (256, 256, 256), (512, 512, 512), (1024, 1024, 1024)] {
        let a = pattern(m, k, 7, 13);
        let b = pattern(k, n, 11, 17);
        let iters = if m <= 128 { 50 } else if m <= 256 { 10 } else if m <= 512 { 3 } else { 1 };

        let reference = a.matmul_naive(&b).unwrap();
        let result = ops::matmul(exec, &a, &b).unwrap();

        let naive_s = time_it(iters, || { let _ = a.matmul_naive(&b); });
        let gemm_s = time_it(iters, || { let _ = ops::matmul(exec, &a, &b); });

        println!("{:<16} {:>10.3}ms {:>10.3}ms {:>8.1}x {:>10.2} {:>10.2e}",
            format!("{}x{}x{}", m, k, n),
            naive_s * 1000.0,
            gemm_s * 1000.0,
            naive_s / gemm_s,
            gflops(m, n, k, gemm_s),
            result.max_abs_diff(&reference),
        );
    }

    println!("\n=== Element-wise / Transpose Benchmark ===\n");
    println!("{:<16} {:>12} {:>12} {:>14}",
        "Elements", "Add (ms)", "Sigmoid (ms)", "Transpose (ms)");
    println!("{}", "-".repeat(58));

    for &side in &[256usize, 512, 1024, 2048] {
        let a = pattern(side, side, 7, 13);
        let b = pattern(side, side, 5, 11);
        let iters = if side <= 512 { 20 } else { 5 };

        let add_s = time_it(iters, || { let _ = ops::add(exec, &a, &b); });
        let sig_s = time_it(iters, || { let _ = ops::sigmoid(exec, &a); });
        let tr_s = time_it(iters, || { let _ = ops::transpose(exec, &a); });

        println!("{:<16} {:>10.3}ms {:>10.3}ms {:>12.3}ms",
            format!("{}x{}", side, side),
            add_s * 1000.0,
            sig_s * 1000.0,
            tr_s * 1000.0,
        );
    }
}
