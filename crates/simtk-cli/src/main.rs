use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::EnvFilter;

use simtk_core::{Executor, ExecutorConfig};
use simtk_kernels::geometry::{self, TRANSPOSE_TILE, TSK, TSM, TSN, WPTM, WPTN};
use simtk_kernels::{ops, sigmoid_f32, Matrix};

#[derive(Parser)]
#[command(
    name = "simtk",
    about = "simtk kernel CLI",
    long_about = "Dense matrix kernels on an emulated SIMT device.\n\nInspect tile geometry, benchmark the register-blocked GEMM and\nverify every kernel against a sequential host reference.",
    version,
)]
struct Cli {
    /// Executor config (JSON). Defaults to SIMTK_WORKER_THREADS / SIMTK_SERIAL.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Show executor config, tile constants and launch geometry
    Info,
    /// Benchmark GEMM against the naive reference
    Bench {
        /// Square matrix sizes, multiples of 128 (comma-separated)
        #[arg(long, default_value = "128,256,512")]
        sizes: String,
    },
    /// Run every kernel on random inputs and compare with the host reference
    Verify {
        #[arg(long, default_value = "0")]
        seed: u64,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match ExecutorConfig::from_json_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("error: {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => ExecutorConfig::from_env(),
    };
    let exec = match Executor::new(config) {
        Ok(exec) => exec,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Commands::Info => {
            cmd_info(&exec);
            ExitCode::SUCCESS
        }
        Commands::Bench { sizes } => {
            cmd_bench(&exec, &sizes);
            ExitCode::SUCCESS
        }
        Commands::Verify { seed } => cmd_verify(&exec, seed),
    }
}

fn cmd_info(exec: &Executor) {
    println!("simtk v{}\n", env!("CARGO_PKG_VERSION"));

    let cfg = exec.config();
    println!("Executor");
    println!("  blocks:  {}", if cfg.parallel_blocks { "parallel" } else { "serial" });
    match cfg.worker_threads {
        Some(n) => println!("  workers: {} (dedicated pool)", n),
        None => println!("  workers: {} (global pool)", default_workers()),
    }
    println!("  max threads/block: {}", cfg.limits.max_threads_per_block);
    println!("  max shared/block:  {} bytes", cfg.limits.max_shared_mem_bytes);

    println!("\nTiles");
    println!("  transpose: {0}x{0}", TRANSPOSE_TILE);
    println!("  gemm:      TSM={} TSN={} TSK={}  micro-tile {}x{}", TSM, TSN, TSK, WPTM, WPTN);

    println!("\nLaunch geometry");
    let rows = [
        ("elementwise n=1000", geometry::elementwise_config("add", 1000)),
        ("transpose 300x200", geometry::transpose_config(300, 200)),
        ("gemm 512x64x256", geometry::gemm_config(512, 64, 256)),
    ];
    for (label, cfg) in rows {
        match cfg {
            Ok(c) => println!("  {:<20} grid {:?} block {:?}", label, c.grid_dim, c.block_dim),
            Err(e) => println!("  {:<20} {}", label, e),
        }
    }

    #[cfg(feature = "cuda")]
    println!("\nCUDA: {}", if simtk_kernels::cuda::is_cuda_available() { "available" } else { "not available" });
    #[cfg(not(feature = "cuda"))]
    println!("\nCUDA: not compiled (build with --features cuda)");
}

fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

fn cmd_bench(exec: &Executor, sizes_str: &str) {
    let sizes: Vec<usize> = sizes_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    println!("=== simtk GEMM Benchmark ===\n");
    println!("{:<14} {:>12} {:>12} {:>9} {:>10} {:>10}",
        "Size", "Naive (ms)", "GEMM (ms)", "Speedup", "GEMM GF/s", "Max err");
    println!("{}", "-".repeat(72));

    for &sz in &sizes {
        if sz == 0 || sz % TSM != 0 {
            println!("{:<14} skipped: not a multiple of {}", format!("{}x{}", sz, sz), TSM);
            continue;
        }
        let a_data: Vec<f32> = (0..sz * sz).map(|i| ((i * 7 + 3) % 13) as f32 * 0.1 - 0.6).collect();
        let b_data: Vec<f32> = (0..sz * sz).map(|i| ((i * 11 + 5) % 17) as f32 * 0.1 - 0.8).collect();
        let (a, b) = match (Matrix::from_col_major(sz, sz, a_data), Matrix::from_col_major(sz, sz, b_data)) {
            (Ok(a), Ok(b)) => (a, b),
            _ => continue,
        };

        let iters = if sz <= 128 { 20 } else if sz <= 256 { 5 } else { 1 };

        // Warmup
        let result = match ops::matmul(exec, &a, &b) {
            Ok(c) => c,
            Err(e) => {
                println!("{:<14} error: {}", format!("{}x{}", sz, sz), e);
                continue;
            }
        };
        let reference = match a.matmul_naive(&b) {
            Ok(c) => c,
            Err(_) => continue,
        };

        let naive_s = time_it(iters, || { let _ = a.matmul_naive(&b); });
        let gemm_s = time_it(iters, || { let _ = ops::matmul(exec, &a, &b); });
        let gflops = (2.0 * (sz as f64).powi(3)) / gemm_s / 1e9;

        println!("{:<14} {:>10.3}ms {:>10.3}ms {:>8.1}x {:>10.2} {:>10.2e}",
            format!("{}x{}", sz, sz),
            naive_s * 1000.0,
            gemm_s * 1000.0,
            naive_s / gemm_s,
            gflops,
            result.max_abs_diff(&reference),
        );
    }
}

fn time_it(iters: usize, mut f: impl FnMut()) -> f64 {
    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    start.elapsed().as_secs_f64() / iters as f64
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize) -> Matrix {
    let mut m = Matrix::zeros(rows, cols);
    for c in 0..cols {
        for r in 0..rows {
            m.set(r, c, rng.gen_range(-1.0f32..1.0));
        }
    }
    m
}

fn map(a: &Matrix, f: impl Fn(f32) -> f32) -> Matrix {
    let mut out = a.clone();
    for c in 0..a.cols() {
        for r in 0..a.rows() {
            out.set(r, c, f(a.get(r, c)));
        }
    }
    out
}

fn zip(a: &Matrix, b: &Matrix, f: impl Fn(f32, f32) -> f32) -> Matrix {
    let mut out = a.clone();
    for c in 0..a.cols() {
        for r in 0..a.rows() {
            out.set(r, c, f(a.get(r, c), b.get(r, c)));
        }
    }
    out
}

fn cmd_verify(exec: &Executor, seed: u64) -> ExitCode {
    let mut rng = StdRng::seed_from_u64(seed);
    let a = random_matrix(&mut rng, 77, 45);
    let b = random_matrix(&mut rng, 77, 45);
    let s = rng.gen_range(-4.0f32..4.0);
    let ga = random_matrix(&mut rng, 256, 48);
    let gb = random_matrix(&mut rng, 48, 128);

    println!("=== simtk verify (seed {}) ===\n", seed);

    type Check = (&'static str, simtk_core::Result<Matrix>, Matrix, f32);
    let checks: Vec<Check> = vec![
        ("add", ops::add(exec, &a, &b), zip(&a, &b, |x, y| x + y), 0.0),
        ("sub", ops::sub(exec, &a, &b), zip(&a, &b, |x, y| x - y), 0.0),
        ("mul", ops::mul(exec, &a, &b), zip(&a, &b, |x, y| x * y), 0.0),
        ("mul_scalar", ops::mul_scalar(exec, &a, s), map(&a, |x| x * s), 0.0),
        ("scalar_sub", ops::scalar_sub(exec, s, &a), map(&a, |x| s - x), 0.0),
        ("sub_scalar", ops::sub_scalar(exec, &a, s), map(&a, |x| x - s), 0.0),
        ("sigmoid", ops::sigmoid(exec, &a), map(&a, sigmoid_f32), 0.0),
        ("transpose", ops::transpose(exec, &a), a.transposed(), 0.0),
        ("matmul", ops::matmul(exec, &ga, &gb), ga.matmul_naive(&gb).unwrap_or_else(|_| Matrix::zeros(0, 0)), 1e-4),
    ];

    let mut failed = 0;
    for (name, got, want, tol) in checks {
        let verdict = match got {
            Ok(got) => {
                let err = got.max_abs_diff(&want);
                if err <= tol {
                    format!("ok    max err {:.2e}", err)
                } else {
                    failed += 1;
                    format!("FAIL  max err {:.2e} > {:.0e}", err, tol)
                }
            }
            Err(e) => {
                failed += 1;
                format!("FAIL  {}", e)
            }
        };
        println!("  {:<12} {}", name, verdict);
    }

    if failed == 0 {
        println!("\nall kernels passed");
        ExitCode::SUCCESS
    } else {
        println!("\n{} kernel(s) failed", failed);
        ExitCode::FAILURE
    }
}
