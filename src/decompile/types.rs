//! The type model attached to every reconstructed expression.

use std::fmt;

use once_cell::sync::Lazy;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct PrimitiveFlags(u16);

bitflags! {
    impl PrimitiveFlags: u16 {
        const BOOLEAN = 0x0001;
        const CHAR = 0x0002;
        const FLOAT = 0x0004;
        const DOUBLE = 0x0008;
        const BYTE = 0x0010;
        const SHORT = 0x0020;
        const INT = 0x0040;
        const LONG = 0x0080;
        const VOID = 0x0100;
    }
}

const B: PrimitiveFlags = PrimitiveFlags::BOOLEAN;
const C: PrimitiveFlags = PrimitiveFlags::CHAR;
const BY: PrimitiveFlags = PrimitiveFlags::BYTE;
const S: PrimitiveFlags = PrimitiveFlags::SHORT;
const I: PrimitiveFlags = PrimitiveFlags::INT;

/// A primitive type, or a provisional one that still admits several primitive
/// interpretations.
///
/// `flags` is the set of interpretations. `left_flags` are the types a value of
/// this type may be assigned to, `right_flags` the types it accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PrimitiveType {
    name: &'static str,
    descriptor: &'static str,
    flags: PrimitiveFlags,
    left_flags: PrimitiveFlags,
    right_flags: PrimitiveFlags,
}

impl PrimitiveType {
    pub const BOOLEAN: PrimitiveType = PrimitiveType::new("boolean", "Z", B, B, B);
    pub const BYTE: PrimitiveType = PrimitiveType::new("byte", "B", BY, BY, BY.union(I).union(S));
    pub const CHAR: PrimitiveType = PrimitiveType::new("char", "C", C, C, C.union(I));
    pub const SHORT: PrimitiveType = PrimitiveType::new("short", "S", S, S.union(BY), S.union(I));
    pub const INT: PrimitiveType =
        PrimitiveType::new("int", "I", I, I.union(BY).union(C).union(S), I);
    pub const LONG: PrimitiveType = PrimitiveType::uniform("long", "J", PrimitiveFlags::LONG);
    pub const FLOAT: PrimitiveType = PrimitiveType::uniform("float", "F", PrimitiveFlags::FLOAT);
    pub const DOUBLE: PrimitiveType = PrimitiveType::uniform("double", "D", PrimitiveFlags::DOUBLE);
    pub const VOID: PrimitiveType = PrimitiveType::uniform("void", "V", PrimitiveFlags::VOID);

    pub const MAYBE_CHAR: PrimitiveType = PrimitiveType::uniform("maybe_char", "C", C.union(I));
    pub const MAYBE_BYTE: PrimitiveType =
        PrimitiveType::uniform("maybe_byte", "B", BY.union(C).union(S).union(I));
    pub const MAYBE_SHORT: PrimitiveType =
        PrimitiveType::uniform("maybe_short", "S", C.union(S).union(I));
    pub const MAYBE_INT: PrimitiveType = PrimitiveType::uniform("maybe_int", "I", I);
    pub const MAYBE_NEGATIVE_BYTE: PrimitiveType =
        PrimitiveType::uniform("maybe_negative_byte", "B", BY.union(S).union(I));
    pub const MAYBE_NEGATIVE_SHORT: PrimitiveType =
        PrimitiveType::uniform("maybe_negative_short", "S", S.union(I));
    pub const MAYBE_NEGATIVE_INT: PrimitiveType =
        PrimitiveType::uniform("maybe_negative_int", "I", I);
    pub const MAYBE_BOOLEAN: PrimitiveType =
        PrimitiveType::uniform("maybe_boolean", "Z", B.union(BY).union(C).union(S).union(I));
    pub const MAYBE_NEGATIVE_BOOLEAN: PrimitiveType =
        PrimitiveType::uniform("maybe_negative_boolean", "Z", B.union(BY).union(S).union(I));

    const fn new(
        name: &'static str,
        descriptor: &'static str,
        flags: PrimitiveFlags,
        left_flags: PrimitiveFlags,
        right_flags: PrimitiveFlags,
    ) -> Self {
        PrimitiveType {
            name,
            descriptor,
            flags,
            left_flags,
            right_flags,
        }
    }

    const fn uniform(name: &'static str, descriptor: &'static str, flags: PrimitiveFlags) -> Self {
        PrimitiveType::new(name, descriptor, flags, flags, flags)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn descriptor(&self) -> &'static str {
        self.descriptor
    }

    pub fn flags(&self) -> PrimitiveFlags {
        self.flags
    }

    pub fn left_flags(&self) -> PrimitiveFlags {
        self.left_flags
    }

    pub fn right_flags(&self) -> PrimitiveFlags {
        self.right_flags
    }

    pub fn create_type(&self, dimension: usize) -> Type {
        if dimension == 0 {
            Type::Primitive(*self)
        } else {
            Type::Object(ObjectType::primitive_array(*self, dimension))
        }
    }
}

/// A class, interface or array type.
///
/// Arrays of primitives keep the primitive descriptor as their internal name
/// (`"I"` for `int[]`). Anonymous classes have neither a qualified nor a simple
/// name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectType {
    pub internal_name: String,
    pub qualified_name: Option<String>,
    pub name: Option<String>,
    pub type_arguments: Vec<Type>,
    pub dimension: usize,
    pub descriptor: String,
    /// Set on the placeholder type of `null`, which is never equal to `Object`.
    pub undefined: bool,
}

impl ObjectType {
    pub fn new(
        internal_name: impl Into<String>,
        qualified_name: Option<String>,
        name: Option<String>,
    ) -> Self {
        let internal_name = internal_name.into();
        let descriptor = format!("L{};", internal_name);
        ObjectType {
            internal_name,
            qualified_name,
            name,
            type_arguments: Vec::new(),
            dimension: 0,
            descriptor,
            undefined: false,
        }
    }

    /// Builds the names from an internal name. A `$` suffix made of digits marks
    /// an anonymous class.
    pub fn from_internal_name(internal_name: &str) -> Self {
        let simple = internal_name.rsplit('/').next().unwrap_or(internal_name);
        let inner = simple.rsplit('$').next().unwrap_or(simple);
        let anonymous =
            simple.contains('$') && !inner.is_empty() && inner.bytes().all(|b| b.is_ascii_digit());
        if anonymous {
            ObjectType::new(internal_name, None, None)
        } else {
            ObjectType::new(
                internal_name,
                Some(internal_name.replace(['/', '$'], ".")),
                Some(inner.to_string()),
            )
        }
    }

    pub fn primitive_array(element: PrimitiveType, dimension: usize) -> Self {
        let mut array = ObjectType::new(
            element.descriptor(),
            Some(element.name().to_string()),
            Some(element.name().to_string()),
        );
        array.dimension = dimension;
        array.descriptor = format!("{}{}", "[".repeat(dimension), element.descriptor());
        array
    }

    pub fn with_type_arguments(mut self, type_arguments: Vec<Type>) -> Self {
        self.type_arguments = type_arguments;
        self
    }

    pub fn is_anonymous(&self) -> bool {
        self.qualified_name.is_none() && self.name.is_none()
    }

    fn primitive_element(&self) -> Option<PrimitiveType> {
        match self.internal_name.as_str() {
            "Z" => Some(PrimitiveType::BOOLEAN),
            "B" => Some(PrimitiveType::BYTE),
            "C" => Some(PrimitiveType::CHAR),
            "S" => Some(PrimitiveType::SHORT),
            "I" => Some(PrimitiveType::INT),
            "J" => Some(PrimitiveType::LONG),
            "F" => Some(PrimitiveType::FLOAT),
            "D" => Some(PrimitiveType::DOUBLE),
            _ => None,
        }
    }

    /// The same type at another array dimension. Dimension 0 of a primitive
    /// array is the primitive itself.
    pub fn create_type(&self, dimension: usize) -> Type {
        if dimension == self.dimension {
            return Type::Object(self.clone());
        }
        match self.primitive_element() {
            Some(element) => element.create_type(dimension),
            None => {
                let mut created = self.clone();
                created.dimension = dimension;
                created.descriptor =
                    format!("{}L{};", "[".repeat(dimension), self.internal_name);
                Type::Object(created)
            }
        }
    }

    /// Same class and dimension, ignoring type arguments.
    pub fn raw_eq(&self, other: &ObjectType) -> bool {
        self.internal_name == other.internal_name
            && self.dimension == other.dimension
            && self.undefined == other.undefined
    }
}

/// A type variable such as `T`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GenericType {
    pub name: String,
    pub dimension: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Primitive(PrimitiveType),
    Object(ObjectType),
    Generic(GenericType),
}

impl Type {
    pub fn dimension(&self) -> usize {
        match self {
            Type::Primitive(_) => 0,
            Type::Object(o) => o.dimension,
            Type::Generic(g) => g.dimension,
        }
    }

    pub fn create_type(&self, dimension: usize) -> Type {
        match self {
            Type::Primitive(p) => p.create_type(dimension),
            Type::Object(o) => o.create_type(dimension),
            Type::Generic(g) => Type::Generic(GenericType {
                name: g.name.clone(),
                dimension,
            }),
        }
    }

    pub fn descriptor(&self) -> String {
        match self {
            Type::Primitive(p) => p.descriptor().to_string(),
            Type::Object(o) => o.descriptor.clone(),
            Type::Generic(g) => format!("{}T{};", "[".repeat(g.dimension), g.name),
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveType> {
        match self {
            Type::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectType> {
        match self {
            Type::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Type::Primitive(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Type::Object(_))
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, Type::Generic(_))
    }

    /// Occupies two operand stack words.
    pub fn is_wide(&self) -> bool {
        *self == Type::Primitive(PrimitiveType::LONG) || *self == Type::Primitive(PrimitiveType::DOUBLE)
    }
}

impl From<PrimitiveType> for Type {
    fn from(p: PrimitiveType) -> Self {
        Type::Primitive(p)
    }
}

impl From<ObjectType> for Type {
    fn from(o: ObjectType) -> Self {
        Type::Object(o)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Primitive(p) => write!(f, "{}", p.name()),
            Type::Object(o) => {
                let name = o.qualified_name.as_deref().unwrap_or(&o.internal_name);
                write!(f, "{}{}", name, "[]".repeat(o.dimension))
            }
            Type::Generic(g) => write!(f, "{}{}", g.name, "[]".repeat(g.dimension)),
        }
    }
}

fn well_known(internal_name: &str) -> ObjectType {
    ObjectType::from_internal_name(internal_name)
}

pub static TYPE_OBJECT: Lazy<ObjectType> = Lazy::new(|| well_known("java/lang/Object"));
pub static TYPE_UNDEFINED_OBJECT: Lazy<ObjectType> = Lazy::new(|| ObjectType {
    undefined: true,
    ..well_known("java/lang/Object")
});
pub static TYPE_STRING: Lazy<ObjectType> = Lazy::new(|| well_known("java/lang/String"));
pub static TYPE_CLASS: Lazy<ObjectType> = Lazy::new(|| well_known("java/lang/Class"));
pub static TYPE_MATH: Lazy<ObjectType> = Lazy::new(|| well_known("java/lang/Math"));
pub static TYPE_STRING_BUILDER: Lazy<ObjectType> =
    Lazy::new(|| well_known("java/lang/StringBuilder"));
pub static TYPE_STRING_BUFFER: Lazy<ObjectType> =
    Lazy::new(|| well_known("java/lang/StringBuffer"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_types_differ_from_real_ones() {
        assert_ne!(PrimitiveType::MAYBE_INT, PrimitiveType::INT);
        assert_eq!(PrimitiveType::MAYBE_INT.flags(), PrimitiveType::INT.flags());
    }

    #[test]
    fn test_undefined_object_is_not_object() {
        assert_ne!(*TYPE_UNDEFINED_OBJECT, *TYPE_OBJECT);
        assert_eq!(TYPE_UNDEFINED_OBJECT.internal_name, TYPE_OBJECT.internal_name);
    }

    #[test]
    fn test_primitive_array_round_trip() {
        let ints = PrimitiveType::INT.create_type(2);
        assert_eq!(ints.descriptor(), "[[I");
        assert_eq!(ints.create_type(1).descriptor(), "[I");
        assert_eq!(ints.create_type(0), Type::Primitive(PrimitiveType::INT));
    }

    #[test]
    fn test_object_array_dimension() {
        let strings = TYPE_STRING.create_type(1);
        assert_eq!(strings.descriptor(), "[Ljava/lang/String;");
        assert_eq!(strings.create_type(0), Type::Object(TYPE_STRING.clone()));
        assert_eq!(strings.to_string(), "java.lang.String[]");
    }

    #[test]
    fn test_anonymous_names() {
        assert!(ObjectType::from_internal_name("a/Outer$1").is_anonymous());
        let inner = ObjectType::from_internal_name("a/Outer$Inner");
        assert_eq!(inner.name.as_deref(), Some("Inner"));
        assert_eq!(inner.qualified_name.as_deref(), Some("a.Outer.Inner"));
    }

    #[test]
    fn test_wide_types() {
        assert!(Type::from(PrimitiveType::LONG).is_wide());
        assert!(Type::from(PrimitiveType::DOUBLE).is_wide());
        assert!(!Type::from(PrimitiveType::INT).is_wide());
        assert!(!Type::from(TYPE_OBJECT.clone()).is_wide());
    }
}
