use nom::{
    error::Error,
    multi::count,
    number::complete::be_u16,
    Err as BaseErr,
};

use crate::attribute_info::types::*;

// Using a type alias here evades a Clippy warning about complex types.
type Err<E> = BaseErr<Error<E>>;

fn bootstrap_method_parser(input: &[u8]) -> Result<(&[u8], BootstrapMethod), Err<&[u8]>> {
    let (input, bootstrap_method_ref) = be_u16(input)?;
    let (input, num_bootstrap_arguments) = be_u16(input)?;
    let (input, bootstrap_arguments) = count(be_u16, num_bootstrap_arguments as usize)(input)?;
    Ok((
        input,
        BootstrapMethod {
            bootstrap_method_ref,
            num_bootstrap_arguments,
            bootstrap_arguments,
        },
    ))
}

pub fn bootstrap_methods_attribute_parser(
    input: &[u8],
) -> Result<(&[u8], BootstrapMethodsAttribute), Err<&[u8]>> {
    let (input, num_bootstrap_methods) = be_u16(input)?;
    let (input, bootstrap_methods) =
        count(bootstrap_method_parser, num_bootstrap_methods as usize)(input)?;
    Ok((
        input,
        BootstrapMethodsAttribute {
            num_bootstrap_methods,
            bootstrap_methods,
        },
    ))
}

pub fn line_number_table_attribute_parser(
    input: &[u8],
) -> Result<(&[u8], LineNumberTableAttribute), Err<&[u8]>> {
    let (input, line_number_table_length) = be_u16(input)?;
    let (input, line_number_table) = count(
        line_number_table_entry_parser,
        line_number_table_length as usize,
    )(input)?;
    Ok((
        input,
        LineNumberTableAttribute {
            line_number_table_length,
            line_number_table,
        },
    ))
}

pub fn line_number_table_entry_parser(
    input: &[u8],
) -> Result<(&[u8], LineNumberTableEntry), Err<&[u8]>> {
    let (input, start_pc) = be_u16(input)?;
    let (input, line_number) = be_u16(input)?;
    Ok((
        input,
        LineNumberTableEntry {
            start_pc,
            line_number,
        },
    ))
}

pub fn local_variable_table_attribute_parser(
    input: &[u8],
) -> Result<(&[u8], LocalVariableTableAttribute), Err<&[u8]>> {
    let (input, local_variable_table_length) = be_u16(input)?;
    let (input, items) = count(
        local_variable_table_entry_parser,
        local_variable_table_length as usize,
    )(input)?;
    Ok((
        input,
        LocalVariableTableAttribute {
            local_variable_table_length,
            items,
        },
    ))
}

fn local_variable_table_entry_parser(
    input: &[u8],
) -> Result<(&[u8], LocalVariableTableEntry), Err<&[u8]>> {
    let (input, start_pc) = be_u16(input)?;
    let (input, length) = be_u16(input)?;
    let (input, name_index) = be_u16(input)?;
    let (input, descriptor_index) = be_u16(input)?;
    let (input, index) = be_u16(input)?;
    Ok((
        input,
        LocalVariableTableEntry {
            start_pc,
            length,
            name_index,
            descriptor_index,
            index,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_methods() {
        let bytes = [0, 1, 0, 20, 0, 3, 0, 21, 0, 22, 0, 23];
        let (rest, attr) = bootstrap_methods_attribute_parser(&bytes).unwrap();
        assert!(rest.is_empty());
        assert_eq!(attr.bootstrap_methods.len(), 1);
        assert_eq!(attr.bootstrap_methods[0].bootstrap_method_ref, 20);
        assert_eq!(attr.bootstrap_methods[0].bootstrap_arguments, vec![21, 22, 23]);
    }

    #[test]
    fn test_line_number_lookup() {
        let bytes = [0, 2, 0, 0, 0, 10, 0, 5, 0, 11];
        let (_, attr) = line_number_table_attribute_parser(&bytes).unwrap();
        assert_eq!(attr.line_number(0), 10);
        assert_eq!(attr.line_number(4), 10);
        assert_eq!(attr.line_number(5), 11);
        assert_eq!(attr.line_number(99), 11);
    }

    #[test]
    fn test_local_variable_table() {
        let bytes = [0, 1, 0, 0, 0, 12, 0, 7, 0, 8, 0, 1];
        let (_, attr) = local_variable_table_attribute_parser(&bytes).unwrap();
        assert_eq!(
            attr.items[0],
            LocalVariableTableEntry {
                start_pc: 0,
                length: 12,
                name_index: 7,
                descriptor_index: 8,
                index: 1,
            }
        );
    }

    #[test]
    fn test_truncated_input_fails() {
        assert!(bootstrap_methods_attribute_parser(&[0, 1, 0]).is_err());
    }
}
