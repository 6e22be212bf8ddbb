use crate::machine::errors::VMError;

/// Operand stack of the VM. The top of the stack is the last element.
///
/// Every accessor checks depth before touching the stack, so an underflowing
/// instruction leaves it unchanged.
#[derive(Debug, Default, Clone)]
pub(super) struct Stack {
    items: Vec<i64>,
}

impl Stack {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn as_slice(&self) -> &[i64] {
        &self.items
    }

    pub(super) fn into_vec(self) -> Vec<i64> {
        self.items
    }

    /// Fails with [`VMError::StackUnderflow`] unless `required` values are present.
    pub(super) fn require(&self, instr: &'static str, required: usize) -> Result<(), VMError> {
        if self.items.len() < required {
            return Err(VMError::StackUnderflow {
                instruction: instr,
                required,
                available: self.items.len(),
            });
        }
        Ok(())
    }

    pub(super) fn push(&mut self, value: i64) {
        self.items.push(value);
    }

    pub(super) fn pop(&mut self, instr: &'static str) -> Result<i64, VMError> {
        self.items.pop().ok_or(VMError::StackUnderflow {
            instruction: instr,
            required: 1,
            available: 0,
        })
    }

    /// Pops `(a b)` where `b` was on top.
    pub(super) fn pop2(&mut self, instr: &'static str) -> Result<(i64, i64), VMError> {
        self.require(instr, 2)?;
        let b = self.pop(instr)?;
        let a = self.pop(instr)?;
        Ok((a, b))
    }

    pub(super) fn peek(&self, instr: &'static str) -> Result<i64, VMError> {
        self.require(instr, 1)?;
        Ok(self.items[self.items.len() - 1])
    }

    /// Reads `(a b)` where `b` is on top, without popping.
    pub(super) fn peek2(&self, instr: &'static str) -> Result<(i64, i64), VMError> {
        self.require(instr, 2)?;
        let n = self.items.len();
        Ok((self.items[n - 2], self.items[n - 1]))
    }

    pub(super) fn top_mut(&mut self, instr: &'static str) -> Result<&mut i64, VMError> {
        self.require(instr, 1)?;
        let n = self.items.len();
        Ok(&mut self.items[n - 1])
    }

    /// Mutable view of the top `depth` values, deepest first.
    pub(super) fn top_n_mut(
        &mut self,
        instr: &'static str,
        depth: usize,
    ) -> Result<&mut [i64], VMError> {
        self.require(instr, depth)?;
        let n = self.items.len();
        Ok(&mut self.items[n - depth..])
    }
}
