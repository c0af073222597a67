use binrw::binrw;

use crate::attribute_info::{LineNumberTableAttribute, LocalVariableTableAttribute};

/// The parts of a method the simulator reads: flags, signature, raw code and
/// the optional debug tables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Method {
    pub access_flags: MethodAccessFlags,
    pub name: String,
    pub descriptor: String,
    pub code: Vec<u8>,
    pub line_number_table: Option<LineNumberTableAttribute>,
    pub local_variable_table: Option<LocalVariableTableAttribute>,
}

impl Method {
    pub fn new(
        access_flags: MethodAccessFlags,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        code: Vec<u8>,
    ) -> Self {
        Method {
            access_flags,
            name: name.into(),
            descriptor: descriptor.into(),
            code,
            line_number_table: None,
            local_variable_table: None,
        }
    }

    pub fn with_line_numbers(mut self, table: LineNumberTableAttribute) -> Self {
        self.line_number_table = Some(table);
        self
    }

    pub fn with_local_variables(mut self, table: LocalVariableTableAttribute) -> Self {
        self.local_variable_table = Some(table);
        self
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Source line for a code offset; 0 without a line number table.
    pub fn line_number(&self, offset: usize) -> u32 {
        self.line_number_table
            .as_ref()
            .map_or(0, |table| table.line_number(offset) as u32)
    }
}

#[binrw]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct MethodAccessFlags(u16);

bitflags! {
    impl MethodAccessFlags: u16 {
        const PUBLIC = 0x0001;       // 	Declared public; may be accessed from outside its package.
        const PRIVATE = 0x0002;      // 	Declared private; accessible only within the defining class.
        const PROTECTED = 0x0004;    // 	Declared protected; may be accessed within subclasses.
        const STATIC = 0x0008;       // 	Declared static.
        const FINAL = 0x0010;        // 	Declared final; must not be overridden.
        const SYNCHRONIZED = 0x0020; // 	Declared synchronized; invocation is wrapped by a monitor use.
        const BRIDGE = 0x0040;       // 	A bridge method, generated by the compiler.
        const VARARGS = 0x0080;      // 	Declared with variable number of arguments.
        const NATIVE = 0x0100;       // 	Declared native; implemented in a language other than Java.
        const ABSTRACT = 0x0400;     // 	Declared abstract; no implementation is provided.
        const STRICT = 0x0800;       // 	Declared strictfp; floating-point mode is FP-strict.
        const SYNTHETIC = 0x1000;    // 	Declared synthetic; not present in the source code.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute_info::LineNumberTableEntry;

    #[test]
    fn test_line_number_without_table() {
        let method = Method::new(MethodAccessFlags::STATIC, "m", "()V", vec![0xb1]);
        assert!(method.is_static());
        assert_eq!(method.line_number(0), 0);
    }

    #[test]
    fn test_line_number_with_table() {
        let method = Method::new(MethodAccessFlags::PUBLIC, "m", "()V", vec![0; 8]).with_line_numbers(
            LineNumberTableAttribute::new(vec![
                LineNumberTableEntry { start_pc: 0, line_number: 3 },
                LineNumberTableEntry { start_pc: 4, line_number: 4 },
            ]),
        );
        assert!(!method.is_static());
        assert_eq!(method.line_number(3), 3);
        assert_eq!(method.line_number(6), 4);
    }
}
