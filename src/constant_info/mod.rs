//! The constant pool and its typed accessors.

mod types;

pub use self::types::*;

use std::io::Cursor;

use binrw::BinRead;

use crate::error::ConstantPoolError;

type Result<T> = std::result::Result<T, ConstantPoolError>;

/// A resolved field, method or interface method reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberRef<'a> {
    pub class_name: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// A resolved `CONSTANT_InvokeDynamic` entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InvokeDynamicRef<'a> {
    pub bootstrap_method_attr_index: u16,
    pub name: &'a str,
    pub descriptor: &'a str,
}

/// The constant pool of one class, addressed by 1-based index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConstantPool {
    entries: Vec<ConstantInfo>,
}

impl ConstantPool {
    /// Wraps entries already laid out slot by slot, `Unusable` fillers included.
    pub fn new(entries: Vec<ConstantInfo>) -> Self {
        ConstantPool { entries }
    }

    /// Decodes `constant_pool_count - 1` slots from the bytes that follow the
    /// count in a class file.
    pub fn read(bytes: &[u8], constant_pool_count: u16) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let mut entries = Vec::with_capacity(constant_pool_count as usize);
        let mut index = 1;
        while index < constant_pool_count {
            let entry = ConstantInfo::read(&mut cursor)?;
            let wide = entry.is_wide();
            entries.push(entry);
            index += 1;
            if wide {
                entries.push(ConstantInfo::Unusable);
                index += 1;
            }
        }
        log::trace!("read {} constant pool slots", entries.len());
        Ok(ConstantPool { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ConstantInfo] {
        &self.entries
    }

    pub fn get(&self, index: u16) -> Result<&ConstantInfo> {
        (index as usize)
            .checked_sub(1)
            .and_then(|slot| self.entries.get(slot))
            .ok_or(ConstantPoolError::BadIndex(index))
    }

    pub fn utf8(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            ConstantInfo::Utf8(u) => Ok(&u.utf8_string),
            _ => Err(unexpected(index, "Utf8")),
        }
    }

    /// Internal name (or array descriptor) of a `CONSTANT_Class` entry.
    pub fn type_name(&self, class_index: u16) -> Result<&str> {
        match self.get(class_index)? {
            ConstantInfo::Class(c) => self.utf8(c.name_index),
            _ => Err(unexpected(class_index, "Class")),
        }
    }

    /// Text of a `CONSTANT_String` entry.
    pub fn string(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            ConstantInfo::String(s) => self.utf8(s.string_index),
            _ => Err(unexpected(index, "String")),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            ConstantInfo::NameAndType(nat) => {
                Ok((self.utf8(nat.name_index)?, self.utf8(nat.descriptor_index)?))
            }
            _ => Err(unexpected(index, "NameAndType")),
        }
    }

    /// Resolve a Fieldref, Methodref or InterfaceMethodref entry.
    pub fn member_ref(&self, index: u16) -> Result<MemberRef<'_>> {
        let (class_index, nat_index) = match self.get(index)? {
            ConstantInfo::FieldRef(r) => (r.class_index, r.name_and_type_index),
            ConstantInfo::MethodRef(r) => (r.class_index, r.name_and_type_index),
            ConstantInfo::InterfaceMethodRef(r) => (r.class_index, r.name_and_type_index),
            _ => return Err(unexpected(index, "member reference")),
        };
        let class_name = self.type_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nat_index)?;
        Ok(MemberRef {
            class_name,
            name,
            descriptor,
        })
    }

    /// Descriptor of a `CONSTANT_MethodType` entry.
    pub fn method_type(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            ConstantInfo::MethodType(mt) => self.utf8(mt.descriptor_index),
            _ => Err(unexpected(index, "MethodType")),
        }
    }

    /// The member a `CONSTANT_MethodHandle` entry points at.
    pub fn method_handle(&self, index: u16) -> Result<MemberRef<'_>> {
        match self.get(index)? {
            ConstantInfo::MethodHandle(mh) => self.member_ref(mh.reference_index),
            _ => Err(unexpected(index, "MethodHandle")),
        }
    }

    pub fn invoke_dynamic(&self, index: u16) -> Result<InvokeDynamicRef<'_>> {
        match self.get(index)? {
            ConstantInfo::InvokeDynamic(indy) => {
                let (name, descriptor) = self.name_and_type(indy.name_and_type_index)?;
                Ok(InvokeDynamicRef {
                    bootstrap_method_attr_index: indy.bootstrap_method_attr_index,
                    name,
                    descriptor,
                })
            }
            _ => Err(unexpected(index, "InvokeDynamic")),
        }
    }

    fn push(&mut self, entry: ConstantInfo) -> u16 {
        let wide = entry.is_wide();
        self.entries.push(entry);
        let index = self.entries.len() as u16;
        if wide {
            self.entries.push(ConstantInfo::Unusable);
        }
        index
    }

    fn find(&self, entry: &ConstantInfo) -> Option<u16> {
        self.entries
            .iter()
            .position(|e| e == entry)
            .map(|slot| slot as u16 + 1)
    }

    fn get_or_add(&mut self, entry: ConstantInfo) -> u16 {
        match self.find(&entry) {
            Some(index) => index,
            None => self.push(entry),
        }
    }

    pub fn get_or_add_utf8(&mut self, value: &str) -> u16 {
        self.get_or_add(ConstantInfo::Utf8(Utf8Constant::new(value)))
    }

    pub fn get_or_add_integer(&mut self, value: i32) -> u16 {
        self.get_or_add(ConstantInfo::Integer(IntegerConstant { value }))
    }

    pub fn get_or_add_float(&mut self, value: f32) -> u16 {
        self.get_or_add(ConstantInfo::Float(FloatConstant { value }))
    }

    pub fn get_or_add_long(&mut self, value: i64) -> u16 {
        self.get_or_add(ConstantInfo::Long(LongConstant { value }))
    }

    pub fn get_or_add_double(&mut self, value: f64) -> u16 {
        self.get_or_add(ConstantInfo::Double(DoubleConstant { value }))
    }

    pub fn get_or_add_class(&mut self, internal_name: &str) -> u16 {
        let name_index = self.get_or_add_utf8(internal_name);
        self.get_or_add(ConstantInfo::Class(ClassConstant { name_index }))
    }

    pub fn get_or_add_string(&mut self, value: &str) -> u16 {
        let string_index = self.get_or_add_utf8(value);
        self.get_or_add(ConstantInfo::String(StringConstant { string_index }))
    }

    pub fn get_or_add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.get_or_add_utf8(name);
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.get_or_add(ConstantInfo::NameAndType(NameAndTypeConstant {
            name_index,
            descriptor_index,
        }))
    }

    pub fn get_or_add_field_ref(&mut self, class_name: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.get_or_add_class(class_name);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.get_or_add(ConstantInfo::FieldRef(FieldRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn get_or_add_method_ref(&mut self, class_name: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.get_or_add_class(class_name);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.get_or_add(ConstantInfo::MethodRef(MethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn get_or_add_interface_method_ref(
        &mut self,
        class_name: &str,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        let class_index = self.get_or_add_class(class_name);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.get_or_add(ConstantInfo::InterfaceMethodRef(InterfaceMethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn get_or_add_method_handle(&mut self, reference_kind: u8, reference_index: u16) -> u16 {
        self.get_or_add(ConstantInfo::MethodHandle(MethodHandleConstant {
            reference_kind,
            reference_index,
        }))
    }

    pub fn get_or_add_method_type(&mut self, descriptor: &str) -> u16 {
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.get_or_add(ConstantInfo::MethodType(MethodTypeConstant { descriptor_index }))
    }

    pub fn get_or_add_invoke_dynamic(
        &mut self,
        bootstrap_method_attr_index: u16,
        name: &str,
        descriptor: &str,
    ) -> u16 {
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.get_or_add(ConstantInfo::InvokeDynamic(InvokeDynamicConstant {
            bootstrap_method_attr_index,
            name_and_type_index,
        }))
    }
}

fn unexpected(index: u16, expected: &'static str) -> ConstantPoolError {
    ConstantPoolError::UnexpectedTag { index, expected }
}
