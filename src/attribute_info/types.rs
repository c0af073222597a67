/// One entry of the BootstrapMethods attribute.
///
/// `bootstrap_arguments` are constant pool indices; for the lambda metafactory
/// they are a MethodType, a MethodHandle and another MethodType.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootstrapMethod {
    pub bootstrap_method_ref: u16,
    pub num_bootstrap_arguments: u16,
    pub bootstrap_arguments: Vec<u16>,
}

impl BootstrapMethod {
    pub fn new(bootstrap_method_ref: u16, bootstrap_arguments: Vec<u16>) -> Self {
        BootstrapMethod {
            bootstrap_method_ref,
            num_bootstrap_arguments: bootstrap_arguments.len() as u16,
            bootstrap_arguments,
        }
    }
}

/// The BootstrapMethods attribute records the bootstrap methods used by
/// `invokedynamic` instructions.
/// [see more](https://docs.oracle.com/javase/specs/jvms/se8/html/jvms-4.html#jvms-4.7.23)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BootstrapMethodsAttribute {
    pub num_bootstrap_methods: u16,
    pub bootstrap_methods: Vec<BootstrapMethod>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LineNumberTableEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

/// Maps code offsets to source lines.
/// [see more](https://docs.oracle.com/javase/specs/jvms/se8/html/jvms-4.html#jvms-4.7.12)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineNumberTableAttribute {
    pub line_number_table_length: u16,
    pub line_number_table: Vec<LineNumberTableEntry>,
}

impl LineNumberTableAttribute {
    pub fn new(line_number_table: Vec<LineNumberTableEntry>) -> Self {
        LineNumberTableAttribute {
            line_number_table_length: line_number_table.len() as u16,
            line_number_table,
        }
    }

    /// Line of the last entry starting at or before `offset`, 0 if none.
    pub fn line_number(&self, offset: usize) -> u16 {
        self.line_number_table
            .iter()
            .filter(|entry| entry.start_pc as usize <= offset)
            .max_by_key(|entry| entry.start_pc)
            .map(|entry| entry.line_number)
            .unwrap_or(0)
    }
}

/// Names and descriptors are constant pool indices.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LocalVariableTableEntry {
    pub start_pc: u16,
    pub length: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub index: u16,
}

/// Debug information about the local variables of a method.
/// [see more](https://docs.oracle.com/javase/specs/jvms/se8/html/jvms-4.html#jvms-4.7.13)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalVariableTableAttribute {
    pub local_variable_table_length: u16,
    pub items: Vec<LocalVariableTableEntry>,
}
