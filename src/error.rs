use thiserror::Error;

/// Failures raised while resolving constant pool entries.
#[derive(Debug, Error)]
pub enum ConstantPoolError {
    #[error("constant pool index {0} is out of range")]
    BadIndex(u16),
    #[error("constant pool entry {index} is not a {expected} constant")]
    UnexpectedTag { index: u16, expected: &'static str },
    #[error("failed to decode constant pool: {0}")]
    Decode(#[from] binrw::Error),
}

/// Failures raised while turning descriptors into types.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("malformed descriptor `{0}`")]
    Malformed(String),
    #[error("`{0}` does not name a primitive type")]
    UnexpectedPrimitive(String),
}

/// Failures that abort the decompilation of one method.
#[derive(Debug, Error)]
pub enum DecompileError {
    #[error("operand stack underflow at offset {offset}")]
    StackUnderflow { offset: usize },
    #[error("cannot build a post-increment from step {delta} at offset {offset}")]
    UnexpectedIncrement { offset: usize, delta: i32 },
    #[error("unexpected operator `{operator}` in a store")]
    UnexpectedOperator { operator: String },
    #[error("instruction at offset {offset} runs past the end of the code")]
    Truncated { offset: usize },
    #[error("tableswitch at offset {offset} has low {low} above high {high}")]
    BadSwitchRange { offset: usize, low: i32, high: i32 },
    #[error("bootstrap method {index} is missing")]
    MissingBootstrapMethod { index: u16 },
    #[error("method reference captures {count} values")]
    UnexpectedCapture { count: usize },
    #[error(transparent)]
    ConstantPool(#[from] ConstantPoolError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

pub type Result<T, E = DecompileError> = std::result::Result<T, E>;
