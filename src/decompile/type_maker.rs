//! The type-resolution seam: names and descriptors to [`Type`] values, plus
//! assignability between object types.

use std::collections::HashMap;

use crate::error::DescriptorError;

use super::descriptor::{self, MethodTypes};
use super::types::{ObjectType, Type};

pub trait TypeMaker {
    fn make_from_internal_type_name(&self, internal_type_name: &str) -> ObjectType;

    fn make_from_descriptor(&self, descriptor: &str) -> Result<Type, DescriptorError> {
        descriptor::parse_type_descriptor(descriptor)
    }

    /// Array class constants are descriptors (`[I`), everything else is an
    /// internal name.
    fn make_from_descriptor_or_internal_type_name(
        &self,
        name: &str,
    ) -> Result<ObjectType, DescriptorError> {
        if name.starts_with('[') {
            match self.make_from_descriptor(name)? {
                Type::Object(o) => Ok(o),
                _ => Err(DescriptorError::Malformed(name.to_string())),
            }
        } else {
            Ok(self.make_from_internal_type_name(name))
        }
    }

    fn make_field_type(
        &self,
        _owner: &ObjectType,
        _name: &str,
        descriptor: &str,
    ) -> Result<Type, DescriptorError> {
        self.make_from_descriptor(descriptor)
    }

    /// Types of a method signature with no owner to consult, such as an
    /// INVOKEDYNAMIC call site.
    fn make_method_types_from_descriptor(
        &self,
        descriptor: &str,
    ) -> Result<MethodTypes, DescriptorError> {
        descriptor::parse_method_descriptor(descriptor)
    }

    fn make_method_types(
        &self,
        _owner: &ObjectType,
        _name: &str,
        descriptor: &str,
    ) -> Result<MethodTypes, DescriptorError> {
        self.make_method_types_from_descriptor(descriptor)
    }

    /// Can a `child` value be stored where a `parent` is expected?
    fn is_assignable(&self, parent: &ObjectType, child: &ObjectType) -> bool;
}

/// Resolves types straight from descriptors. Assignability follows the
/// registered super types.
#[derive(Clone, Debug, Default)]
pub struct DescriptorTypeMaker {
    super_types: HashMap<String, Vec<String>>,
}

impl DescriptorTypeMaker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the direct super class and interfaces of `internal_name`.
    pub fn with_super_types(mut self, internal_name: &str, super_types: &[&str]) -> Self {
        self.super_types.insert(
            internal_name.to_string(),
            super_types.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn extends(&self, child: &str, parent: &str) -> bool {
        let mut pending = vec![child];
        let mut seen = Vec::new();
        while let Some(name) = pending.pop() {
            if name == parent {
                return true;
            }
            if seen.contains(&name) {
                continue;
            }
            seen.push(name);
            if let Some(supers) = self.super_types.get(name) {
                pending.extend(supers.iter().map(String::as_str));
            }
        }
        false
    }
}

impl TypeMaker for DescriptorTypeMaker {
    fn make_from_internal_type_name(&self, internal_type_name: &str) -> ObjectType {
        ObjectType::from_internal_name(internal_type_name)
    }

    fn is_assignable(&self, parent: &ObjectType, child: &ObjectType) -> bool {
        if parent.dimension == 0 && parent.internal_name == "java/lang/Object" {
            return true;
        }
        parent.dimension == child.dimension && self.extends(&child.internal_name, &parent.internal_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::types::{PrimitiveType, TYPE_STRING};

    #[test]
    fn test_descriptor_or_internal_name() {
        let maker = DescriptorTypeMaker::new();
        let array = maker.make_from_descriptor_or_internal_type_name("[I").unwrap();
        assert_eq!(array.dimension, 1);
        assert_eq!(array.create_type(0), Type::Primitive(PrimitiveType::INT));
        let string = maker.make_from_descriptor_or_internal_type_name("java/lang/String").unwrap();
        assert_eq!(string, *TYPE_STRING);
    }

    #[test]
    fn test_assignability() {
        let maker = DescriptorTypeMaker::new()
            .with_super_types("a/ArrayList", &["a/AbstractList", "a/List"])
            .with_super_types("a/AbstractList", &["java/lang/Object"]);
        let list = ObjectType::from_internal_name("a/List");
        let array_list = ObjectType::from_internal_name("a/ArrayList");
        assert!(maker.is_assignable(&list, &array_list));
        assert!(!maker.is_assignable(&array_list, &list));
        assert!(maker.is_assignable(&ObjectType::from_internal_name("java/lang/Object"), &list));
    }
}
