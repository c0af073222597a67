//! The enclosing class as the simulator sees it.

use crate::attribute_info::{BootstrapMethod, BootstrapMethodsAttribute};
use crate::method_info::MethodAccessFlags;

use super::expr::Statement;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDeclaration {
    pub name: String,
    pub descriptor: String,
}

/// A method of the class, with its already reconstructed body. Synthetic
/// lambda bodies are inlined from here.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MethodDeclaration {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub parameter_names: Vec<String>,
    pub statements: Vec<Statement>,
}

impl MethodDeclaration {
    pub fn new(access_flags: MethodAccessFlags, name: &str, descriptor: &str) -> Self {
        MethodDeclaration {
            access_flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            ..Default::default()
        }
    }

    pub fn with_parameter_names(mut self, names: &[&str]) -> Self {
        self.parameter_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn with_statements(mut self, statements: Vec<Statement>) -> Self {
        self.statements = statements;
        self
    }

    pub fn is_synthetic_private(&self) -> bool {
        self.access_flags
            .contains(MethodAccessFlags::SYNTHETIC | MethodAccessFlags::PRIVATE)
    }
}

/// A nested class, looked up when an anonymous class is instantiated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InnerTypeDeclaration {
    pub internal_name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassDeclaration {
    pub internal_type_name: String,
    pub fields: Vec<FieldDeclaration>,
    pub methods: Vec<MethodDeclaration>,
    pub inner_types: Vec<InnerTypeDeclaration>,
    pub bootstrap_methods: BootstrapMethodsAttribute,
}

impl ClassDeclaration {
    pub fn new(internal_type_name: &str) -> Self {
        ClassDeclaration {
            internal_type_name: internal_type_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_field(mut self, name: &str, descriptor: &str) -> Self {
        self.fields.push(FieldDeclaration {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        });
        self
    }

    pub fn with_method(mut self, method: MethodDeclaration) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_inner_type(mut self, inner: InnerTypeDeclaration) -> Self {
        self.inner_types.push(inner);
        self
    }

    pub fn with_bootstrap_method(mut self, method: BootstrapMethod) -> Self {
        self.bootstrap_methods.bootstrap_methods.push(method);
        self.bootstrap_methods.num_bootstrap_methods =
            self.bootstrap_methods.bootstrap_methods.len() as u16;
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    pub fn has_method(&self, name: &str, descriptor: &str) -> bool {
        self.methods
            .iter()
            .any(|m| m.name == name && m.descriptor == descriptor)
    }

    pub fn inner_type(&self, internal_name: &str) -> Option<&InnerTypeDeclaration> {
        self.inner_types
            .iter()
            .find(|t| t.internal_name == internal_name)
    }

    /// The private synthetic method a lambda call site points at.
    pub fn synthetic_method(&self, name: &str, descriptor: &str) -> Option<&MethodDeclaration> {
        self.methods
            .iter()
            .find(|m| m.is_synthetic_private() && m.name == name && m.descriptor == descriptor)
    }

    pub fn bootstrap_method(&self, index: u16) -> Option<&BootstrapMethod> {
        self.bootstrap_methods.bootstrap_methods.get(index as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let class = ClassDeclaration::new("a/Foo")
            .with_field("count", "I")
            .with_method(MethodDeclaration::new(
                MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
                "lambda$run$0",
                "(I)I",
            ))
            .with_method(MethodDeclaration::new(MethodAccessFlags::PRIVATE, "helper", "()V"))
            .with_bootstrap_method(BootstrapMethod::new(4, vec![5, 6, 7]));
        assert!(class.has_field("count"));
        assert!(!class.has_field("size"));
        assert!(class.has_method("helper", "()V"));
        assert!(class.synthetic_method("lambda$run$0", "(I)I").is_some());
        assert!(class.synthetic_method("helper", "()V").is_none());
        assert_eq!(class.bootstrap_method(0).unwrap().bootstrap_method_ref, 4);
        assert!(class.bootstrap_method(1).is_none());
    }
}
