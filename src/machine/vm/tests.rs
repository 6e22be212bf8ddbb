use super::*;
use crate::machine::console::BufferConsole;
use crate::utils::test_utils::utils::{GCD_SOURCE, IS_PRIME_SOURCE, assemble};

fn run_source(source: &str) -> Result<Vec<i64>, VMError> {
    execute(&assemble(source), &mut BufferConsole::default())
}

fn stack_of(source: &str) -> Vec<i64> {
    run_source(source).unwrap_or_else(|e| panic!("{source:?} failed: {e}"))
}

// ==================== Stack shuffles ====================

#[test]
fn stack_laws() {
    assert_eq!(stack_of("DATA 5 INS LOAD 0 DUP"), vec![5, 5]);
    assert_eq!(stack_of("DATA 1 2 INS LOAD 0 LOAD 1 SWAP"), vec![2, 1]);
    assert_eq!(stack_of("DATA 1 2 INS LOAD 0 LOAD 1 OVER"), vec![1, 2, 1]);
    assert_eq!(stack_of("DATA 1 2 3 INS LOAD 0 LOAD 1 LOAD 2 ROT"), vec![2, 3, 1]);
    assert_eq!(stack_of("DATA 1 2 3 INS LOAD 0 LOAD 1 LOAD 2 -ROT"), vec![3, 1, 2]);
    assert_eq!(stack_of("DATA 1 2 INS LOAD 0 LOAD 1 NIP"), vec![2]);
    assert_eq!(stack_of("DATA 1 2 INS LOAD 0 LOAD 1 DROP"), vec![1]);
    assert_eq!(stack_of("DATA 1 INS NOOP LOAD 0 NOOP"), vec![1]);
}

#[test]
fn shuffles_that_restore_the_stack() {
    let base = stack_of("DATA 1 2 3 INS LOAD 0 LOAD 1 LOAD 2");
    assert_eq!(stack_of("DATA 1 2 3 INS LOAD 0 LOAD 1 LOAD 2 DUP DROP"), base);
    assert_eq!(stack_of("DATA 1 2 3 INS LOAD 0 LOAD 1 LOAD 2 SWAP SWAP"), base);
}

#[test]
fn tuck_behaves_as_over() {
    assert_eq!(
        stack_of("DATA 1 2 INS LOAD 0 LOAD 1 TUCK"),
        stack_of("DATA 1 2 INS LOAD 0 LOAD 1 OVER")
    );
}

#[test]
fn rot_and_rot_back_cancel() {
    assert_eq!(
        stack_of("DATA 4 5 6 INS LOAD 0 LOAD 1 LOAD 2 ROT -ROT"),
        vec![4, 5, 6]
    );
}

#[test]
fn underflow_leaves_stack_untouched() {
    let routine = assemble("DATA 1 2 INS LOAD 0 LOAD 1 ROT");
    let mut vm = VM::new(&routine, VmConfig::default());
    let err = vm.run(&mut BufferConsole::default()).unwrap_err();
    assert!(matches!(
        err,
        VMError::StackUnderflow {
            instruction: "ROT",
            required: 3,
            available: 2
        }
    ));
    assert_eq!(vm.stack(), &[1, 2]);
    assert_eq!(vm.pc(), 5);
}

#[test]
fn drop_on_empty_stack() {
    let routine = assemble("DATA INS DROP");
    let mut console = BufferConsole::default();
    let err = execute(&routine, &mut console).unwrap_err();
    assert!(matches!(
        err,
        VMError::StackUnderflow {
            instruction: "DROP",
            required: 1,
            available: 0
        }
    ));
    assert!(console.outputs().is_empty());
}

// ==================== Arithmetic ====================

#[test]
fn arithmetic() {
    assert_eq!(stack_of("DATA 7 3 INS LOAD 0 LOAD 1 ADD"), vec![10]);
    assert_eq!(stack_of("DATA 7 3 INS LOAD 0 LOAD 1 SUB"), vec![4]);
    assert_eq!(stack_of("DATA 7 3 INS LOAD 0 LOAD 1 MUL"), vec![21]);
    assert_eq!(stack_of("DATA 7 3 INS LOAD 0 LOAD 1 DIV"), vec![2]);
    assert_eq!(stack_of("DATA 7 3 INS LOAD 0 LOAD 1 MOD"), vec![1]);
    assert_eq!(stack_of("DATA 7 INS LOAD 0 INC"), vec![8]);
    assert_eq!(stack_of("DATA 7 INS LOAD 0 DEC DEC"), vec![5]);
}

#[test]
fn division_rounds_toward_negative_infinity() {
    assert_eq!(stack_of("DATA -7 2 INS LOAD 0 LOAD 1 DIV"), vec![-4]);
    assert_eq!(stack_of("DATA -7 2 INS LOAD 0 LOAD 1 MOD"), vec![1]);
    assert_eq!(stack_of("DATA 7 -2 INS LOAD 0 LOAD 1 DIV"), vec![-4]);
    assert_eq!(stack_of("DATA 7 -2 INS LOAD 0 LOAD 1 MOD"), vec![-1]);
    assert_eq!(stack_of("DATA -7 -2 INS LOAD 0 LOAD 1 DIV"), vec![3]);
    assert_eq!(stack_of("DATA -7 -2 INS LOAD 0 LOAD 1 MOD"), vec![-1]);
}

#[test]
fn floor_div_and_mod_agree() {
    for a in -20i64..=20 {
        for b in [-7i64, -3, -1, 1, 2, 5] {
            let q = floor_div(a, b);
            let r = floor_mod(a, b);
            assert_eq!(q * b + r, a, "a={a} b={b}");
            assert!(r == 0 || (r < 0) == (b < 0), "a={a} b={b} r={r}");
        }
    }
    assert_eq!(floor_div(i64::MIN, -1), i64::MIN);
    assert_eq!(floor_mod(i64::MIN, -1), 0);
}

#[test]
fn arithmetic_wraps() {
    let routine = Routine::new(vec![i64::MAX, i64::MIN], vec![0x02, 0, 0x0A, 0x02, 1, 0x0B]);
    let stack = execute(&routine, &mut BufferConsole::default()).unwrap();
    assert_eq!(stack, vec![i64::MIN, i64::MAX]);
}

#[test]
fn division_by_zero() {
    for op in ["DIV", "MOD"] {
        let routine = assemble(&format!("DATA 1 0 INS LOAD 0 LOAD 1 {op}"));
        let mut vm = VM::new(&routine, VmConfig::default());
        assert!(matches!(
            vm.run(&mut BufferConsole::default()),
            Err(VMError::DivisionByZero)
        ));
        assert_eq!(vm.stack(), &[1, 0]);
    }
}

// ==================== Control flow ====================

#[test]
fn gcd_scenario() {
    let routine = assemble(GCD_SOURCE);
    let mut vm = VM::new(&routine, VmConfig::default());
    vm.run(&mut BufferConsole::default()).unwrap();
    assert_eq!(vm.stack(), &[8]);
    assert_eq!(vm.pc(), routine.instructions.len());
}

#[test]
fn gcd_profile() {
    let routine = assemble(GCD_SOURCE);
    let mut vm = VM::new(&routine, VmConfig::default());
    vm.run(&mut BufferConsole::default()).unwrap();

    let profile = vm.profile();
    assert_eq!(profile.get(OpCategory::Stack), 11);
    assert_eq!(profile.get(OpCategory::Arithmetic), 4);
    assert_eq!(profile.get(OpCategory::Control), 9);
    assert_eq!(profile.get(OpCategory::Io), 0);
    assert_eq!(profile.total(), 24);
    assert_eq!(vm.steps(), 24);
}

#[test]
fn is_prime_scenario() {
    // 135341 = 41 * 3301
    assert_eq!(stack_of(IS_PRIME_SOURCE), vec![41]);

    let mut routine = assemble(IS_PRIME_SOURCE);
    routine.data[0] = 97;
    let stack = execute(&routine, &mut BufferConsole::default()).unwrap();
    assert_eq!(stack, vec![97]);
}

#[test]
fn two_operand_jumps_peek() {
    // LOAD 0 LOAD 1 <jump> 7 DROP: taken keeps both values, fallthrough drops one.
    for (op, a, b, taken) in [
        ("EQJP", 3, 3, true),
        ("EQJP", 3, 4, false),
        ("GTJP", 4, 3, true),
        ("GTJP", 3, 4, false),
        ("LTJP", 3, 4, true),
        ("LTJP", 4, 3, false),
        ("LTJP", -5, 2, true),
    ] {
        let stack = stack_of(&format!("DATA {a} {b} INS LOAD 0 LOAD 1 {op} 7 DROP"));
        let expected = if taken { vec![a, b] } else { vec![a] };
        assert_eq!(stack, expected, "{op} {a} {b}");
    }
}

#[test]
fn zero_jumps_peek() {
    // LOAD 0 <jump> 5 DROP
    for (op, a, taken) in [
        ("EQZJP", 0, true),
        ("EQZJP", 1, false),
        ("GTZJP", 1, true),
        ("GTZJP", 0, false),
        ("LTZJP", -1, true),
        ("LTZJP", 0, false),
    ] {
        let stack = stack_of(&format!("DATA {a} INS LOAD 0 {op} 5 DROP"));
        let expected = if taken { vec![a] } else { vec![] };
        assert_eq!(stack, expected, "{op} {a}");
    }
}

#[test]
fn conditional_jump_underflow() {
    assert!(matches!(
        run_source("DATA 1 INS LOAD 0 EQJP 0"),
        Err(VMError::StackUnderflow {
            instruction: "EQJP",
            required: 2,
            available: 1
        })
    ));
    assert!(matches!(
        run_source("DATA INS GTZJP 0"),
        Err(VMError::StackUnderflow { .. })
    ));
}

#[test]
fn jump_to_end_halts() {
    let routine = assemble("DATA INS JUMP 3 NOOP");
    let mut vm = VM::new(&routine, VmConfig::default());
    vm.run(&mut BufferConsole::default()).unwrap();
    assert_eq!(vm.pc(), 3);
    assert_eq!(vm.steps(), 1);

    // LOAD 0 LOAD 1 JUMP 7 DROP
    assert_eq!(stack_of("DATA 4 9 INS LOAD 0 LOAD 1 JUMP 7 DROP"), vec![4, 9]);
}

#[test]
fn jump_past_end() {
    assert!(matches!(
        run_source("DATA INS JUMP 3"),
        Err(VMError::InvalidJumpTarget {
            instruction: "JUMP",
            target: 3,
            len: 2
        })
    ));
}

#[test]
fn untaken_branch_target_not_checked() {
    assert_eq!(stack_of("DATA 1 INS LOAD 0 EQZJP 200"), vec![1]);
}

#[test]
fn empty_routine_halts_immediately() {
    assert_eq!(stack_of("DATA 1 2 INS"), Vec::<i64>::new());
}

// ==================== Decoding faults ====================

#[test]
fn invalid_opcode() {
    let routine = Routine::new(vec![], vec![0x00, 0xFF]);
    assert!(matches!(
        execute(&routine, &mut BufferConsole::default()),
        Err(VMError::InvalidInstruction {
            opcode: 0xFF,
            offset: 1
        })
    ));
}

#[test]
fn missing_operand() {
    let routine = Routine::new(vec![], vec![0x00, 0x02]);
    assert!(matches!(
        execute(&routine, &mut BufferConsole::default()),
        Err(VMError::UnexpectedEndOfInstructions {
            instruction: "LOAD",
            offset: 1
        })
    ));
}

#[test]
fn load_out_of_bounds() {
    assert!(matches!(
        run_source("DATA 1 INS LOAD 1"),
        Err(VMError::OutOfBounds { index: 1, len: 1 })
    ));
}

// ==================== Console ====================

#[test]
fn in_and_out() {
    let routine = assemble("DATA INS IN IN ADD OUT");
    let mut console = BufferConsole::new([4, 5]);
    let stack = execute(&routine, &mut console).unwrap();
    assert!(stack.is_empty());
    assert_eq!(console.outputs(), &[9]);
}

#[test]
fn out_on_empty_stack_writes_nothing() {
    let mut console = BufferConsole::default();
    assert!(matches!(
        execute(&assemble("DATA INS OUT"), &mut console),
        Err(VMError::StackUnderflow {
            instruction: "OUT",
            ..
        })
    ));
    assert!(console.outputs().is_empty());
}

#[test]
fn in_without_input() {
    assert!(matches!(
        run_source("DATA INS IN"),
        Err(VMError::ConsoleError { .. })
    ));
}

// ==================== Configuration ====================

#[test]
fn step_limit_stops_infinite_loop() {
    let routine = assemble("DATA INS loop: JUMP @loop");
    let config = VmConfig::new().with_max_steps(Some(100));
    let mut vm = VM::new(&routine, config);
    assert!(matches!(
        vm.run(&mut BufferConsole::default()),
        Err(VMError::StepLimitExceeded { limit: 100 })
    ));
    assert_eq!(vm.steps(), 100);
}

#[test]
fn step_limit_boundary() {
    let routine = assemble("DATA INS NOOP NOOP");
    let exact = VmConfig::new().with_max_steps(Some(2));
    assert!(execute_with(&routine, exact, &mut BufferConsole::default()).is_ok());

    let short = VmConfig::new().with_max_steps(Some(1));
    assert!(matches!(
        execute_with(&routine, short, &mut BufferConsole::default()),
        Err(VMError::StepLimitExceeded { limit: 1 })
    ));
}

#[test]
fn trace_does_not_change_results() {
    for source in [GCD_SOURCE, IS_PRIME_SOURCE] {
        let routine = assemble(source);
        let plain = execute(&routine, &mut BufferConsole::default()).unwrap();
        let traced = execute_with(
            &routine,
            VmConfig::new().with_trace(true),
            &mut BufferConsole::default(),
        )
        .unwrap();
        assert_eq!(plain, traced);
    }
}

#[test]
fn vms_share_a_routine() {
    let routine = assemble("DATA INS IN DUP MUL OUT");
    let mut first = BufferConsole::new([3]);
    let mut second = BufferConsole::new([-4]);
    let mut a = VM::new(&routine, VmConfig::default());
    let mut b = VM::new(&routine, VmConfig::default());
    a.run(&mut first).unwrap();
    b.run(&mut second).unwrap();
    assert_eq!(first.outputs(), &[9]);
    assert_eq!(second.outputs(), &[16]);
}
