//! VM benchmark binary.
//!
//! Measures assembly, object codec and execution time for representative routines.
//! Run with: `cargo run --release --bin bench`

use std::time::{Duration, Instant};

use imp::machine::assembler::assemble_source;
use imp::machine::config::VmConfig;
use imp::machine::console::BufferConsole;
use imp::machine::program::Routine;
use imp::machine::vm::VM;

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Instructions executed per run (None to omit column).
    steps: Option<u64>,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        let steps = self
            .steps
            .map(|n| format!("{n:>10}"))
            .unwrap_or_else(|| "         -".to_string());
        let ns_per_step = self
            .steps
            .filter(|&n| n > 0)
            .map(|n| format!("{:>8.1}", ns_per_op as f64 / n as f64))
            .unwrap_or_else(|| "       -".to_string());
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {} steps  {} ns/step",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            steps,
            ns_per_step,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
///
/// `f` returns the number of VM steps it executed, or 0 for non-VM work.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> u64,
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let mut last_steps = 0u64;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        last_steps = f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        steps: (last_steps > 0).then_some(last_steps),
    }
}

/// Runs the routine to completion, returns the number of executed steps.
fn run_steps(routine: &Routine) -> u64 {
    let mut vm = VM::new(routine, VmConfig::default());
    vm.run(&mut BufferConsole::default()).expect("run failed");
    vm.steps()
}

// ---------------------------------------------------------------------------
// Benchmark definitions
// ---------------------------------------------------------------------------

const GCD_ASM: &str = "DATA 2312 320 INS LOAD 0 LOAD 1 EQZJP 11 SWAP OVER MOD JUMP 4 DROP";

const GCD_FIBONACCI_ASM: &str = r#"
; consecutive Fibonacci numbers are the worst case for Euclid
DATA 2971215073 1836311903
INS
        LOAD 0
        LOAD 1
loop:   EQZJP @done
        SWAP
        OVER
        MOD
        JUMP @loop
done:   DROP
"#;

const SMALLEST_DIVISOR_ASM: &str = r#"
DATA
    65521   ; largest prime below 2^16
    2
INS
        LOAD 0
        LOAD 1
loop:   EQJP @found
        OVER
        OVER
        MOD
        EQZJP @divides
        DROP
        INC
        JUMP @loop
divides:
        DROP
found:  NIP
"#;

const COUNTDOWN_ASM: &str = r#"
DATA 100000
INS
        LOAD 0
loop:   DEC
        GTZJP @loop
"#;

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let min = Duration::from_secs(2);

    println!("VM Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>16}  {:>12}",
        "benchmark", "iters", "avg time", "steps/run", "ns/step"
    );
    println!("  {}", "-".repeat(88));

    // Pre-assemble routines (assembly cost excluded from execution benchmarks)
    let gcd = assemble_source(GCD_ASM).expect("asm");
    let gcd_fib = assemble_source(GCD_FIBONACCI_ASM).expect("asm");
    let divisor = assemble_source(SMALLEST_DIVISOR_ASM).expect("asm");
    let countdown = assemble_source(COUNTDOWN_ASM).expect("asm");

    // 1. Execution
    bench("gcd(2312, 320)", min, || run_steps(&gcd)).print();
    bench("gcd(fib 47, fib 46)", min, || run_steps(&gcd_fib)).print();
    bench("smallest_divisor(65521)", min, || run_steps(&divisor)).print();
    bench("countdown(100K)", min, || run_steps(&countdown)).print();

    // 2. Assembly
    bench("assemble(smallest_divisor)", min, || {
        assemble_source(SMALLEST_DIVISOR_ASM).expect("asm");
        0
    })
    .print();

    // 3. Object codec
    let object = divisor.to_bytes().expect("encode");
    bench("encode(smallest_divisor)", min, || {
        divisor.to_bytes().expect("encode");
        0
    })
    .print();
    bench("decode(smallest_divisor)", min, || {
        Routine::from_bytes(&object).expect("decode");
        0
    })
    .print();

    println!();
}
