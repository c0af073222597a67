//! Narrowest-type classification for literals, array tags and descriptors.

use crate::error::DescriptorError;

use super::types::{PrimitiveFlags, PrimitiveType};

/// The provisional type of an `int` literal: the smallest family the value
/// fits in, remembering whether it may still be a boolean or a char.
pub fn from_value(value: i32) -> PrimitiveType {
    if value >= 0 {
        match value {
            0..=1 => PrimitiveType::MAYBE_BOOLEAN,
            2..=127 => PrimitiveType::MAYBE_BYTE,
            128..=32767 => PrimitiveType::MAYBE_SHORT,
            32768..=65535 => PrimitiveType::MAYBE_CHAR,
            _ => PrimitiveType::MAYBE_INT,
        }
    } else {
        match value {
            -128..=-1 => PrimitiveType::MAYBE_NEGATIVE_BYTE,
            -32768..=-129 => PrimitiveType::MAYBE_NEGATIVE_SHORT,
            _ => PrimitiveType::MAYBE_INT,
        }
    }
}

/// Element type of a `newarray` instruction.
pub fn from_newarray_tag(tag: u8) -> Option<PrimitiveType> {
    match tag {
        4 => Some(PrimitiveType::BOOLEAN),
        5 => Some(PrimitiveType::CHAR),
        6 => Some(PrimitiveType::FLOAT),
        7 => Some(PrimitiveType::DOUBLE),
        8 => Some(PrimitiveType::BYTE),
        9 => Some(PrimitiveType::SHORT),
        10 => Some(PrimitiveType::INT),
        11 => Some(PrimitiveType::LONG),
        _ => None,
    }
}

pub fn from_descriptor(descriptor: &str) -> Result<PrimitiveType, DescriptorError> {
    match descriptor {
        "Z" => Ok(PrimitiveType::BOOLEAN),
        "B" => Ok(PrimitiveType::BYTE),
        "C" => Ok(PrimitiveType::CHAR),
        "S" => Ok(PrimitiveType::SHORT),
        "I" => Ok(PrimitiveType::INT),
        "J" => Ok(PrimitiveType::LONG),
        "F" => Ok(PrimitiveType::FLOAT),
        "D" => Ok(PrimitiveType::DOUBLE),
        "V" => Ok(PrimitiveType::VOID),
        _ => Err(DescriptorError::UnexpectedPrimitive(descriptor.to_string())),
    }
}

/// The primitive behind a boxed `java/lang` wrapper.
pub fn from_wrapper(internal_name: &str) -> Option<PrimitiveType> {
    match internal_name {
        "java/lang/Boolean" => Some(PrimitiveType::BOOLEAN),
        "java/lang/Character" => Some(PrimitiveType::CHAR),
        "java/lang/Float" => Some(PrimitiveType::FLOAT),
        "java/lang/Double" => Some(PrimitiveType::DOUBLE),
        "java/lang/Byte" => Some(PrimitiveType::BYTE),
        "java/lang/Short" => Some(PrimitiveType::SHORT),
        "java/lang/Integer" => Some(PrimitiveType::INT),
        "java/lang/Long" => Some(PrimitiveType::LONG),
        "java/lang/Void" => Some(PrimitiveType::VOID),
        _ => None,
    }
}

/// The type whose flag set is exactly `flags`, if there is one.
pub fn from_flags(flags: PrimitiveFlags) -> Option<PrimitiveType> {
    [
        PrimitiveType::BOOLEAN,
        PrimitiveType::CHAR,
        PrimitiveType::FLOAT,
        PrimitiveType::DOUBLE,
        PrimitiveType::BYTE,
        PrimitiveType::SHORT,
        PrimitiveType::INT,
        PrimitiveType::LONG,
        PrimitiveType::VOID,
        PrimitiveType::MAYBE_CHAR,
        PrimitiveType::MAYBE_SHORT,
        PrimitiveType::MAYBE_BYTE,
        PrimitiveType::MAYBE_BOOLEAN,
        PrimitiveType::MAYBE_NEGATIVE_BYTE,
        PrimitiveType::MAYBE_NEGATIVE_SHORT,
        PrimitiveType::MAYBE_NEGATIVE_BOOLEAN,
    ]
    .into_iter()
    .find(|t| t.flags() == flags)
}

/// The widest single interpretation in `flags`, boolean last.
pub fn widest_flag(flags: PrimitiveFlags) -> PrimitiveFlags {
    [
        PrimitiveFlags::DOUBLE,
        PrimitiveFlags::FLOAT,
        PrimitiveFlags::LONG,
        PrimitiveFlags::INT,
        PrimitiveFlags::SHORT,
        PrimitiveFlags::CHAR,
        PrimitiveFlags::BYTE,
    ]
    .into_iter()
    .find(|f| flags.contains(*f))
    .unwrap_or(PrimitiveFlags::BOOLEAN)
}

/// Resolves a flag set to a concrete type, falling back to the widest member.
pub fn resolve_flags(flags: PrimitiveFlags) -> PrimitiveType {
    if let Some(exact) = from_flags(flags) {
        return exact;
    }
    let widest = widest_flag(flags);
    from_flags(widest).unwrap_or(PrimitiveType::INT)
}
