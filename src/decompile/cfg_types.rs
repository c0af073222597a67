/// A straight-line range of code, `[from_offset, to_offset)`, as delimited by
/// control-flow construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BasicBlock {
    pub from_offset: usize,
    pub to_offset: usize,
    /// Branch sense chosen by control-flow construction: when set, the
    /// condition ending the block is built negated.
    pub must_invert_condition: bool,
}

impl BasicBlock {
    pub fn new(from_offset: usize, to_offset: usize) -> Self {
        BasicBlock {
            from_offset,
            to_offset,
            must_invert_condition: false,
        }
    }

    pub fn inverted(mut self) -> Self {
        self.must_invert_condition = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.from_offset >= self.to_offset
    }
}
