//! Stack machine interpreter.
//!
//! The VM runs a borrowed [`Routine`] from offset 0 and halts when the
//! program counter lands exactly on the end of the instruction stream. All
//! arithmetic is on `i64` and wraps on overflow; division and modulo round
//! toward negative infinity.

pub mod profile;
mod stack;

#[cfg(test)]
mod tests;

pub use profile::{OpCategory, StepProfile};

use crate::machine::config::VmConfig;
use crate::machine::console::Console;
use crate::machine::errors::VMError;
use crate::machine::isa::Instruction;
use crate::machine::program::Routine;
use crate::trace;
use stack::Stack;

macro_rules! exec_vm {
    // Entry point
    (
        vm = $vm:ident,
        console = $console:ident,
        instr = $instr:ident,
        { $( $variant:ident => $handler:ident $args:tt ),* $(,)? }
    ) => {{
        match $instr {
            $(
                Instruction::$variant => {
                    let instr_name = $instr.mnemonic();
                    exec_vm!(@call $vm, $console, instr_name, $handler, $args)
                }
            ),*
        }
    }};

    // Handler that talks to the console (semicolon separator)
    (@call $vm:ident, $console:ident, $instr_name:expr, $handler:ident,
        (console; $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $vm, $instr_name, $kind)?; )*
        $vm.$handler($instr_name, $console, $( $field ),*)
    }};

    // Handler on the stack alone
    (@call $vm:ident, $console:ident, $instr_name:expr, $handler:ident,
        ( $( $field:ident : $kind:ident ),* $(,)? )
    ) => {{
        $( let $field = exec_vm!(@read $vm, $instr_name, $kind)?; )*
        $vm.$handler($instr_name, $( $field ),*)
    }};

    // Data segment index
    (@read $vm:ident, $instr_name:expr, Imm) => {{
        $vm.read_operand($instr_name)
    }};

    // Absolute instruction offset
    (@read $vm:ident, $instr_name:expr, Addr) => {{
        $vm.read_operand($instr_name)
    }};
}

/// Floor division: rounds the quotient toward negative infinity. `b` must be non-zero.
pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    if a.wrapping_rem(b) != 0 && ((a < 0) != (b < 0)) {
        q.wrapping_sub(1)
    } else {
        q
    }
}

/// Floor modulo: the result has the sign of `b`. `b` must be non-zero.
pub fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

/// Stack machine executing one [`Routine`].
///
/// Each VM owns its stack and program counter and only reads the routine,
/// so any number of VMs may run the same routine.
pub struct VM<'a> {
    /// Routine being executed.
    routine: &'a Routine,
    /// Offset of the next opcode.
    pc: usize,
    /// Operand stack.
    stack: Stack,
    config: VmConfig,
    /// Instructions executed so far.
    steps: u64,
    profile: StepProfile,
}

impl<'a> VM<'a> {
    /// Creates a VM positioned at offset 0 with an empty stack.
    pub fn new(routine: &'a Routine, config: VmConfig) -> Self {
        Self {
            routine,
            pc: 0,
            stack: Stack::new(),
            config,
            steps: 0,
            profile: StepProfile::new(),
        }
    }

    /// Runs until the program counter reaches the end of the instruction stream.
    ///
    /// Any fault aborts the run; the stack is left as it was just before the
    /// faulting instruction.
    pub fn run<C: Console>(&mut self, console: &mut C) -> Result<(), VMError> {
        let routine = self.routine;
        let code = routine.instructions.as_slice();

        while self.pc < code.len() {
            if let Some(limit) = self.config.max_steps {
                if self.steps >= limit {
                    return Err(VMError::StepLimitExceeded { limit });
                }
            }

            let offset = self.pc;
            let opcode = code[offset];
            let instr = Instruction::try_from(opcode)
                .map_err(|_| VMError::InvalidInstruction { opcode, offset })?;

            if self.config.trace {
                trace!(
                    "pc={offset:<4} {:<6} stack={:?}",
                    instr.mnemonic(),
                    self.stack.as_slice()
                );
            }

            self.pc += 1;
            self.exec(instr, console)?;
            self.steps += 1;
            self.profile.record(instr.category());
        }

        Ok(())
    }

    /// Current stack, bottom first.
    pub fn stack(&self) -> &[i64] {
        self.stack.as_slice()
    }

    /// Consumes the VM and returns its stack, bottom first.
    pub fn into_stack(self) -> Vec<i64> {
        self.stack.into_vec()
    }

    /// Offset of the next instruction.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Number of instructions executed.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn profile(&self) -> &StepProfile {
        &self.profile
    }

    /// Reads the one-byte operand following the current opcode.
    fn read_operand(&mut self, instr: &'static str) -> Result<u8, VMError> {
        let byte = self
            .routine
            .instructions
            .get(self.pc)
            .copied()
            .ok_or(VMError::UnexpectedEndOfInstructions {
                instruction: instr,
                offset: self.pc - 1,
            })?;
        self.pc += 1;
        Ok(byte)
    }

    /// Executes a single instruction whose opcode has already been consumed.
    fn exec<C: Console>(&mut self, instruction: Instruction, console: &mut C) -> Result<(), VMError> {
        exec_vm! {
            vm = self,
            console = console,
            instr = instruction,
            {
                // Stack
                Noop => op_noop(),
                Drop => op_drop(),
                Load => op_load(index: Imm),
                Dup => op_dup(),
                Swap => op_swap(),
                Over => op_over(),
                Rot => op_rot(),
                Nip => op_nip(),
                Tuck => op_over(),
                RotBack => op_rot_back(),
                // Arithmetic
                Add => op_add(),
                Inc => op_inc(),
                Dec => op_dec(),
                Sub => op_sub(),
                Mul => op_mul(),
                Div => op_div(),
                Mod => op_mod(),
                // Control flow
                Jump => op_jump(target: Addr),
                EqJp => op_eq_jp(target: Addr),
                GtJp => op_gt_jp(target: Addr),
                LtJp => op_lt_jp(target: Addr),
                EqzJp => op_eqz_jp(target: Addr),
                GtzJp => op_gtz_jp(target: Addr),
                LtzJp => op_ltz_jp(target: Addr),
                // Console
                In => op_in(console;),
                Out => op_out(console;),
            }
        }
    }

    fn op_noop(&mut self, _instr: &'static str) -> Result<(), VMError> {
        Ok(())
    }

    fn op_drop(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.stack.pop(instr).map(|_| ())
    }

    fn op_load(&mut self, _instr: &'static str, index: u8) -> Result<(), VMError> {
        let data = &self.routine.data;
        let value = data
            .get(index as usize)
            .copied()
            .ok_or(VMError::OutOfBounds {
                index: index as usize,
                len: data.len(),
            })?;
        self.stack.push(value);
        Ok(())
    }

    fn op_dup(&mut self, instr: &'static str) -> Result<(), VMError> {
        let a = self.stack.peek(instr)?;
        self.stack.push(a);
        Ok(())
    }

    fn op_swap(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.stack.top_n_mut(instr, 2)?.swap(0, 1);
        Ok(())
    }

    /// `(a b -- a b a)`; TUCK shares this handler.
    fn op_over(&mut self, instr: &'static str) -> Result<(), VMError> {
        let (a, _) = self.stack.peek2(instr)?;
        self.stack.push(a);
        Ok(())
    }

    fn op_rot(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.stack.top_n_mut(instr, 3)?.rotate_left(1);
        Ok(())
    }

    fn op_rot_back(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.stack.top_n_mut(instr, 3)?.rotate_right(1);
        Ok(())
    }

    fn op_nip(&mut self, instr: &'static str) -> Result<(), VMError> {
        let (_, b) = self.stack.pop2(instr)?;
        self.stack.push(b);
        Ok(())
    }

    /// Pops `(a b)`, pushes `f(a, b)`.
    fn binary_op<F>(&mut self, instr: &'static str, f: F) -> Result<(), VMError>
    where
        F: FnOnce(i64, i64) -> Result<i64, VMError>,
    {
        let (a, b) = self.stack.peek2(instr)?;
        let result = f(a, b)?;
        self.stack.pop2(instr)?;
        self.stack.push(result);
        Ok(())
    }

    fn op_add(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.binary_op(instr, |a, b| Ok(a.wrapping_add(b)))
    }

    fn op_sub(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.binary_op(instr, |a, b| Ok(a.wrapping_sub(b)))
    }

    fn op_mul(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.binary_op(instr, |a, b| Ok(a.wrapping_mul(b)))
    }

    fn op_div(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.binary_op(instr, |a, b| {
            if b == 0 {
                return Err(VMError::DivisionByZero);
            }
            Ok(floor_div(a, b))
        })
    }

    fn op_mod(&mut self, instr: &'static str) -> Result<(), VMError> {
        self.binary_op(instr, |a, b| {
            if b == 0 {
                return Err(VMError::DivisionByZero);
            }
            Ok(floor_mod(a, b))
        })
    }

    fn op_inc(&mut self, instr: &'static str) -> Result<(), VMError> {
        let top = self.stack.top_mut(instr)?;
        *top = top.wrapping_add(1);
        Ok(())
    }

    fn op_dec(&mut self, instr: &'static str) -> Result<(), VMError> {
        let top = self.stack.top_mut(instr)?;
        *top = top.wrapping_sub(1);
        Ok(())
    }

    fn jump_to(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        let target = target as usize;
        let len = self.routine.instructions.len();
        if target > len {
            return Err(VMError::InvalidJumpTarget {
                instruction: instr,
                target,
                len,
            });
        }
        self.pc = target;
        Ok(())
    }

    fn op_jump(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        self.jump_to(instr, target)
    }

    /// Branches when `cond(a, b)` holds; `(a b)` stay on the stack.
    fn branch_if2<F>(&mut self, instr: &'static str, target: u8, cond: F) -> Result<(), VMError>
    where
        F: FnOnce(i64, i64) -> bool,
    {
        let (a, b) = self.stack.peek2(instr)?;
        if cond(a, b) {
            self.jump_to(instr, target)?;
        }
        Ok(())
    }

    /// Branches when `cond(top)` holds; the top stays on the stack.
    fn branch_if<F>(&mut self, instr: &'static str, target: u8, cond: F) -> Result<(), VMError>
    where
        F: FnOnce(i64) -> bool,
    {
        if cond(self.stack.peek(instr)?) {
            self.jump_to(instr, target)?;
        }
        Ok(())
    }

    fn op_eq_jp(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        self.branch_if2(instr, target, |a, b| a == b)
    }

    fn op_gt_jp(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        self.branch_if2(instr, target, |a, b| a > b)
    }

    fn op_lt_jp(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        self.branch_if2(instr, target, |a, b| a < b)
    }

    fn op_eqz_jp(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        self.branch_if(instr, target, |a| a == 0)
    }

    fn op_gtz_jp(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        self.branch_if(instr, target, |a| a > 0)
    }

    fn op_ltz_jp(&mut self, instr: &'static str, target: u8) -> Result<(), VMError> {
        self.branch_if(instr, target, |a| a < 0)
    }

    fn op_in<C: Console>(&mut self, _instr: &'static str, console: &mut C) -> Result<(), VMError> {
        let value = console.read_integer()?;
        self.stack.push(value);
        Ok(())
    }

    fn op_out<C: Console>(&mut self, instr: &'static str, console: &mut C) -> Result<(), VMError> {
        let value = self.stack.peek(instr)?;
        console.write_integer(value)?;
        self.stack.pop(instr)?;
        Ok(())
    }
}

/// Runs `routine` with the default configuration and returns the final stack.
pub fn execute<C: Console>(routine: &Routine, console: &mut C) -> Result<Vec<i64>, VMError> {
    execute_with(routine, VmConfig::default(), console)
}

/// Runs `routine` with `config` and returns the final stack.
pub fn execute_with<C: Console>(
    routine: &Routine,
    config: VmConfig,
    console: &mut C,
) -> Result<Vec<i64>, VMError> {
    let mut vm = VM::new(routine, config);
    vm.run(console)?;
    Ok(vm.into_stack())
}
