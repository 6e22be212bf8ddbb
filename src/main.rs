//! IMP stack machine driver.
//!
//! Runs, assembles or lists IMP routines from the command line.
//!
//! # Usage
//! ```text
//! imp <file> [OPTIONS]
//! imp <source> <output.obj>
//! ```
//!
//! `<file>` may be assembly source or an object file; object files are
//! recognised by their magic bytes.
//!
//! # Options
//! - `--trace`: Log pc, mnemonic and stack before every instruction
//! - `--profile`: Print executed instructions per category after the run
//! - `--max-steps <n>`: Abort after `n` instructions
//! - `-d, --disassemble`: Print the routine listing instead of running it
//!
//! # Environment
//! `IMP_TRACE` and `IMP_MAX_STEPS` supply defaults for `--trace` and
//! `--max-steps`.

use imp::machine::assembler::assemble_named;
use imp::machine::config::{MAX_STEPS_ENV, VmConfig, parse_max_steps};
use imp::machine::console::StdConsole;
use imp::machine::disasm::disassemble;
use imp::machine::program::{Routine, is_object};
use imp::machine::vm::{StepProfile, VM};
use imp::utils::log::SHOW_TIMESTAMP;
use imp::{error, info, warn};
use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::atomic::Ordering;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    SHOW_TIMESTAMP.store(false, Ordering::Relaxed);

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut trace = false;
    let mut profile = false;
    let mut disassemble_only = false;
    let mut max_steps: Option<u64> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--trace" => {
                trace = true;
                i += 1;
            }
            "--profile" => {
                profile = true;
                i += 1;
            }
            "--disassemble" | "-d" => {
                disassemble_only = true;
                i += 1;
            }
            k @ "--max-steps" => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                max_steps = Some(parse_max_steps(MAX_STEPS_ENV, &args[i]).unwrap_or_else(|_| {
                    error!("Invalid step limit: '{}' is not a positive number", args[i]);
                    process::exit(1);
                }));
                i += 1;
            }
            other if !other.starts_with('-') && output_path.is_none() => {
                output_path = Some(other.to_string());
                i += 1;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let mut config = VmConfig::from_env().unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });
    if trace {
        config.trace = true;
    }
    if max_steps.is_some() {
        config.max_steps = max_steps;
    }

    let routine = load_routine(input_path);

    if (output_path.is_some() || disassemble_only) && (profile || config.trace) {
        warn!("--trace and --profile only apply when running a routine");
    }

    if let Some(output_path) = output_path {
        write_object(&routine, input_path, &output_path);
        return;
    }

    if disassemble_only {
        print!("{}", disassemble(&routine));
        return;
    }

    let mut vm = VM::new(&routine, config);
    let mut console = StdConsole::new();
    let result = vm.run(&mut console);

    if profile {
        print_profile(vm.profile());
    }

    match result {
        Ok(()) => println!("{:?}", vm.stack()),
        Err(e) => {
            error!("Runtime error at pc {}: {}", vm.pc(), e);
            error!("Stack: {:?}", vm.stack());
            process::exit(1);
        }
    }
}

/// Loads an object file, or assembles a source file, exiting on failure.
fn load_routine(path: &str) -> Routine {
    if !Path::new(path).exists() {
        error!("Input file does not exist: {}", path);
        process::exit(1);
    }

    let bytes = fs::read(path).unwrap_or_else(|e| {
        error!("Failed to read {}: {}", path, e);
        process::exit(1);
    });

    if is_object(&bytes) {
        return Routine::from_bytes(&bytes).unwrap_or_else(|e| {
            error!("{}: {}", path, e);
            process::exit(1);
        });
    }

    let source = String::from_utf8(bytes).unwrap_or_else(|_| {
        error!("{} is neither an object file nor UTF-8 source", path);
        process::exit(1);
    });

    // The assembler has already logged a diagnostic.
    assemble_named(&source, path).unwrap_or_else(|_| process::exit(1))
}

fn write_object(routine: &Routine, input_path: &str, output_path: &str) {
    if let Some(parent) = Path::new(output_path).parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        error!("Output directory does not exist: {}", parent.display());
        process::exit(1);
    }

    let bytes = routine.to_bytes().unwrap_or_else(|e| {
        error!("Cannot encode {}: {}", input_path, e);
        process::exit(1);
    });

    if let Err(e) = fs::write(output_path, &bytes) {
        error!("Failed to write output file: {}", e);
        process::exit(1);
    }

    info!(
        "Compiled {} -> {} ({} bytes)",
        input_path,
        output_path,
        bytes.len()
    );
}

fn print_profile(profile: &StepProfile) {
    let total_u = profile.total();
    let total = total_u as f64;

    let cat_w = 2 + profile
        .iter()
        .map(|(c, _)| c.as_str().chars().count())
        .max()
        .unwrap_or(0)
        .max("total".chars().count());

    let amt_w = profile
        .iter()
        .map(|(_, a)| format_with_commas(a).chars().count())
        .max()
        .unwrap_or(0)
        .max(format_with_commas(total_u).chars().count());

    let dash_w = cat_w + 1 + amt_w + 2 + "( 100.0%)".len();

    println!("Step Profile:");
    println!("{}", "-".repeat(dash_w));

    for (category, amount) in profile.iter() {
        if amount == 0 {
            continue;
        }

        let percent = if total > 0.0 {
            (amount as f64 / total) * 100.0
        } else {
            0.0
        };

        println!(
            "{:<cat_w$} {:>amt_w$} ({:>5.1}%)",
            category.as_str(),
            format_with_commas(amount),
            percent,
        );
    }

    println!("{}", "-".repeat(dash_w));
    println!(
        "{:<cat_w$} {:>amt_w$} ({:>5.1}%)",
        "total",
        format_with_commas(total_u),
        100.0,
    );
}

fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

const USAGE: &str = "\
IMP Stack Machine

USAGE:
    {program} <file> [OPTIONS]
    {program} <source> <output.obj>

ARGS:
    <file>          Assembly source or object file to run
    <output.obj>    Assemble <source> and write an object file instead of running

OPTIONS:
    --trace             Log pc, mnemonic and stack before every instruction
    --profile           Print executed instructions per category
    --max-steps <n>     Abort after n instructions
    -d, --disassemble   Print the routine listing instead of running it
    -h, --help          Print this help message

ENVIRONMENT:
    IMP_TRACE           Default for --trace (1/true/yes/on)
    IMP_MAX_STEPS       Default for --max-steps

EXAMPLES:
    # Run a source file and print the final stack
    {program} gcd.imp

    # Assemble to an object file, then run it
    {program} gcd.imp gcd.obj
    {program} gcd.obj --profile
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
