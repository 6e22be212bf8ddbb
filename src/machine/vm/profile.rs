/// Number of instruction categories tracked by [`StepProfile`].
const OP_CATEGORY_COUNT: usize = 4;

/// Instruction families used to break down executed steps.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum OpCategory {
    /// Stack shuffles and data loads.
    Stack = 0,
    /// Integer arithmetic.
    Arithmetic = 1,
    /// Jumps and conditional branches.
    Control = 2,
    /// Console input and output.
    Io = 3,
}

impl OpCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OpCategory::Stack => "Stack",
            OpCategory::Arithmetic => "Arithmetic",
            OpCategory::Control => "Control",
            OpCategory::Io => "I/O",
        }
    }

    /// All categories in discriminant order.
    const ALL: [OpCategory; OP_CATEGORY_COUNT] = [
        OpCategory::Stack,
        OpCategory::Arithmetic,
        OpCategory::Control,
        OpCategory::Io,
    ];
}

/// Executed-instruction counts per [`OpCategory`].
///
/// Backed by a flat array indexed by the category discriminant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepProfile {
    counts: [u64; OP_CATEGORY_COUNT],
}

impl StepProfile {
    /// Creates a new empty profile.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one executed instruction of the given category.
    #[inline(always)]
    pub fn record(&mut self, category: OpCategory) {
        let slot = &mut self.counts[category as usize];
        *slot = slot.saturating_add(1);
    }

    /// Returns the number of instructions executed in `category`.
    pub fn get(&self, category: OpCategory) -> u64 {
        self.counts[category as usize]
    }

    /// Returns the total number of executed instructions.
    pub fn total(&self) -> u64 {
        self.counts
            .iter()
            .fold(0u64, |acc, &v| acc.saturating_add(v))
    }

    /// Returns an iterator over all categories and their counts.
    pub fn iter(&self) -> impl Iterator<Item = (OpCategory, u64)> {
        OpCategory::ALL.into_iter().zip(self.counts)
    }
}
