//! JVM field and method descriptor parsing.

use crate::error::DescriptorError;

use super::types::{ObjectType, PrimitiveType, Type};

/// Parameter and return types of a method descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodTypes {
    pub parameter_types: Vec<Type>,
    pub return_type: Type,
}

impl MethodTypes {
    pub fn is_void(&self) -> bool {
        self.return_type == Type::Primitive(PrimitiveType::VOID)
    }
}

fn malformed(desc: &str) -> DescriptorError {
    DescriptorError::Malformed(desc.to_string())
}

/// Parse a single type descriptor starting at position `pos` in `desc`.
/// Returns the type and the position after it.
pub fn parse_type_at(desc: &str, pos: usize) -> Result<(Type, usize), DescriptorError> {
    let bytes = desc.as_bytes();
    let primitive = match bytes.get(pos) {
        Some(b'B') => PrimitiveType::BYTE,
        Some(b'C') => PrimitiveType::CHAR,
        Some(b'D') => PrimitiveType::DOUBLE,
        Some(b'F') => PrimitiveType::FLOAT,
        Some(b'I') => PrimitiveType::INT,
        Some(b'J') => PrimitiveType::LONG,
        Some(b'S') => PrimitiveType::SHORT,
        Some(b'Z') => PrimitiveType::BOOLEAN,
        Some(b'V') => PrimitiveType::VOID,
        Some(b'L') => {
            let semi = desc[pos + 1..].find(';').ok_or_else(|| malformed(desc))?;
            let class_name = &desc[pos + 1..pos + 1 + semi];
            return Ok((
                Type::Object(ObjectType::from_internal_name(class_name)),
                pos + 1 + semi + 1,
            ));
        }
        Some(b'[') => {
            let dimension = bytes[pos..].iter().take_while(|b| **b == b'[').count();
            let (element, next) = parse_type_at(desc, pos + dimension)?;
            if element == Type::Primitive(PrimitiveType::VOID) {
                return Err(malformed(desc));
            }
            return Ok((element.create_type(dimension), next));
        }
        _ => return Err(malformed(desc)),
    };
    Ok((Type::Primitive(primitive), pos + 1))
}

/// Parse a full type descriptor string.
pub fn parse_type_descriptor(desc: &str) -> Result<Type, DescriptorError> {
    let (ty, next) = parse_type_at(desc, 0)?;
    if next != desc.len() {
        return Err(malformed(desc));
    }
    Ok(ty)
}

/// Parse a method descriptor, e.g. "(II)V".
pub fn parse_method_descriptor(desc: &str) -> Result<MethodTypes, DescriptorError> {
    if !desc.starts_with('(') {
        return Err(malformed(desc));
    }
    let close = desc.find(')').ok_or_else(|| malformed(desc))?;
    let mut parameter_types = Vec::new();
    let mut pos = 1;
    while pos < close {
        let (ty, next) = parse_type_at(desc, pos)?;
        parameter_types.push(ty);
        pos = next;
    }
    let return_type = parse_type_descriptor(&desc[close + 1..])?;
    Ok(MethodTypes {
        parameter_types,
        return_type,
    })
}

/// Number of declared parameters; `long` and `double` count once.
pub fn count_method_parameters(desc: &str) -> usize {
    let bytes = desc.as_bytes();
    let mut count = 0;
    let mut i = 1;
    while i < bytes.len() && bytes[i] != b')' {
        while i < bytes.len() && bytes[i] == b'[' {
            i += 1;
        }
        if bytes.get(i) == Some(&b'L') {
            while i < bytes.len() && bytes[i] != b';' {
                i += 1;
            }
        }
        i += 1;
        count += 1;
    }
    count
}

/// True when the return type is `V`.
pub fn returns_void(desc: &str) -> bool {
    desc.ends_with(")V")
}
