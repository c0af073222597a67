//! The instruction decoder shared by the simulator and the scanners.

use std::io::Cursor;

use binrw::BinRead;

use crate::code_attribute::{Instruction, LAST_OPCODE, WIDE};
use crate::error::{DecompileError, Result};

/// One instruction of a code array.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    pub offset: usize,
    pub length: usize,
    pub opcode: u8,
    /// `None` for reserved opcodes and unknown `wide` forms, which are skipped.
    pub instruction: Option<Instruction>,
}

impl DecodedInstruction {
    pub fn next_offset(&self) -> usize {
        self.offset + self.length
    }
}

fn is_wide_operand(opcode: u8) -> bool {
    matches!(opcode, 0x15..=0x19 | 0x36..=0x3a | 0x84 | 0xa9)
}

const TABLESWITCH: u8 = 0xaa;

fn read_i32(code: &[u8], at: usize, offset: usize) -> Result<i32> {
    code.get(at..at + 4)
        .map(|b| i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(DecompileError::Truncated { offset })
}

const LOOKUPSWITCH: u8 = 0xab;

/// Checks that a switch table lies inside the code before its entries are
/// read, so a hostile count fails instead of allocating.
fn check_switch_table(code: &[u8], offset: usize, opcode: u8) -> Result<()> {
    let padding = (4 - (offset + 1) % 4) % 4;
    let table = offset + 1 + padding;
    let (entries_at, needed) = if opcode == TABLESWITCH {
        let low = read_i32(code, table + 4, offset)?;
        let high = read_i32(code, table + 8, offset)?;
        if high < low {
            log::debug!("tableswitch at offset {} has low {} above high {}", offset, low, high);
            return Err(DecompileError::BadSwitchRange { offset, low, high });
        }
        (table + 12, 4 * (i64::from(high) - i64::from(low) + 1) as u64)
    } else {
        let npairs = read_i32(code, table + 4, offset)? as u32;
        (table + 8, 8 * u64::from(npairs))
    };
    let remaining = code.len().saturating_sub(entries_at) as u64;
    if needed > remaining {
        log::debug!(
            "switch at offset {} needs {} table bytes, {} remain",
            offset,
            needed,
            remaining
        );
        return Err(DecompileError::Truncated { offset });
    }
    Ok(())
}

/// Decodes the instruction starting at `offset`.
pub fn decode_instruction(code: &[u8], offset: usize) -> Result<DecodedInstruction> {
    let opcode = *code
        .get(offset)
        .ok_or(DecompileError::Truncated { offset })?;

    if opcode > LAST_OPCODE {
        log::debug!("ignoring reserved opcode {:#04x} at offset {}", opcode, offset);
        return Ok(DecodedInstruction {
            offset,
            length: 1,
            opcode,
            instruction: None,
        });
    }
    if opcode == WIDE {
        let modified = *code
            .get(offset + 1)
            .ok_or(DecompileError::Truncated { offset })?;
        if !is_wide_operand(modified) {
            log::debug!("ignoring wide form {:#04x} at offset {}", modified, offset);
            return Ok(DecodedInstruction {
                offset,
                length: 4,
                opcode,
                instruction: None,
            });
        }
    }

    if opcode == TABLESWITCH || opcode == LOOKUPSWITCH {
        check_switch_table(code, offset, opcode)?;
    }

    // Every opcode up to LAST_OPCODE has a variant, so a failed read means the
    // operands run past the end of the code.
    let mut cursor = Cursor::new(code);
    cursor.set_position(offset as u64);
    let instruction = Instruction::read_args(&mut cursor, binrw::args! { address: offset as u32 })
        .map_err(|source| {
            log::debug!("cannot decode opcode {:#04x} at offset {}: {}", opcode, offset, source);
            DecompileError::Truncated { offset }
        })?;
    let length = cursor.position() as usize - offset;
    log::trace!("{:>5}: {:?}", offset, instruction);
    Ok(DecodedInstruction {
        offset,
        length,
        opcode,
        instruction: Some(instruction),
    })
}

/// Walks the instructions of `[from, to)` in offset order.
pub struct Instructions<'a> {
    code: &'a [u8],
    offset: usize,
    to: usize,
}

impl<'a> Iterator for Instructions<'a> {
    type Item = Result<DecodedInstruction>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.to {
            return None;
        }
        match decode_instruction(self.code, self.offset) {
            Ok(decoded) => {
                self.offset = decoded.next_offset();
                Some(Ok(decoded))
            }
            Err(e) => {
                self.offset = self.to;
                Some(Err(e))
            }
        }
    }
}

pub fn instructions(code: &[u8], from: usize, to: usize) -> Instructions<'_> {
    Instructions {
        code,
        offset: from,
        to: to.min(code.len()),
    }
}

fn saturate(size: u64) -> u32 {
    u32::try_from(size).unwrap_or(u32::MAX)
}

/// Returns the byte size of an instruction in the code array.
/// `address` is the bytecode offset of this instruction (needed for switch alignment).
pub fn byte_size(instr: &Instruction, address: u32) -> u32 {
    match instr {
        Instruction::Bipush(_) | Instruction::Ldc(_) | Instruction::Newarray(_) => 2,
        Instruction::Iload(_) | Instruction::Lload(_) | Instruction::Fload(_)
        | Instruction::Dload(_) | Instruction::Aload(_) => 2,
        Instruction::Istore(_) | Instruction::Lstore(_) | Instruction::Fstore(_)
        | Instruction::Dstore(_) | Instruction::Astore(_) => 2,
        Instruction::Ret(_) => 2,
        Instruction::Sipush(_) | Instruction::LdcW(_) | Instruction::Ldc2W(_) => 3,
        Instruction::Iinc { .. } => 3,
        Instruction::Ifeq(_) | Instruction::Ifne(_) | Instruction::Iflt(_)
        | Instruction::Ifge(_) | Instruction::Ifgt(_) | Instruction::Ifle(_) => 3,
        Instruction::IfIcmpeq(_) | Instruction::IfIcmpne(_) | Instruction::IfIcmplt(_)
        | Instruction::IfIcmpge(_) | Instruction::IfIcmpgt(_) | Instruction::IfIcmple(_) => 3,
        Instruction::IfAcmpeq(_) | Instruction::IfAcmpne(_) => 3,
        Instruction::Ifnull(_) | Instruction::Ifnonnull(_) => 3,
        Instruction::Goto(_) | Instruction::Jsr(_) => 3,
        Instruction::Getstatic(_) | Instruction::Putstatic(_)
        | Instruction::Getfield(_) | Instruction::Putfield(_) => 3,
        Instruction::Invokevirtual(_) | Instruction::Invokespecial(_)
        | Instruction::Invokestatic(_) => 3,
        Instruction::New(_) | Instruction::Anewarray(_) => 3,
        Instruction::Checkcast(_) | Instruction::Instanceof(_) => 3,
        Instruction::Multianewarray { .. } => 4,
        Instruction::Invokeinterface { .. } | Instruction::Invokedynamic { .. } => 5,
        Instruction::GotoW(_) | Instruction::JsrW(_) => 5,
        Instruction::Tableswitch { low, high, .. } => {
            let padding = u64::from((4 - (address + 1) % 4) % 4);
            let entries = (i64::from(*high) - i64::from(*low) + 1).max(0) as u64;
            // 1 (opcode) + padding + 4 (default) + 4 (low) + 4 (high) + 4*(high-low+1)
            saturate(1 + padding + 4 + 4 + 4 + 4 * entries)
        }
        Instruction::Lookupswitch { npairs, .. } => {
            let padding = u64::from((4 - (address + 1) % 4) % 4);
            // 1 (opcode) + padding + 4 (default) + 4 (npairs) + 8*npairs
            saturate(1 + padding + 4 + 4 + 8 * u64::from(*npairs))
        }
        // wide instructions: 2 bytes magic + 2 bytes index
        Instruction::IloadWide(_) | Instruction::LloadWide(_) | Instruction::FloadWide(_)
        | Instruction::DloadWide(_) | Instruction::AloadWide(_) => 4,
        Instruction::IstoreWide(_) | Instruction::LstoreWide(_) | Instruction::FstoreWide(_)
        | Instruction::DstoreWide(_) | Instruction::AstoreWide(_) => 4,
        Instruction::RetWide(_) => 4,
        Instruction::IincWide { .. } => 6,
        _ => 1,
    }
}

/// Signed branch target of a jump instruction, relative to its own offset.
pub fn branch_delta(instr: &Instruction) -> Option<i32> {
    match instr {
        Instruction::Ifeq(d) | Instruction::Ifne(d) | Instruction::Iflt(d)
        | Instruction::Ifge(d) | Instruction::Ifgt(d) | Instruction::Ifle(d)
        | Instruction::IfIcmpeq(d) | Instruction::IfIcmpne(d) | Instruction::IfIcmplt(d)
        | Instruction::IfIcmpge(d) | Instruction::IfIcmpgt(d) | Instruction::IfIcmple(d)
        | Instruction::IfAcmpeq(d) | Instruction::IfAcmpne(d)
        | Instruction::Ifnull(d) | Instruction::Ifnonnull(d)
        | Instruction::Goto(d) => Some(*d as i32),
        Instruction::GotoW(d) => Some(*d),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_simple() {
        let code = [0x10, 0xfe, 0x3c, 0xb1];
        let first = decode_instruction(&code, 0).unwrap();
        assert_eq!(first.instruction, Some(Instruction::Bipush(-2)));
        assert_eq!(first.length, 2);
        let offsets: Vec<_> = instructions(&code, 0, code.len())
            .map(|i| i.unwrap().offset)
            .collect();
        assert_eq!(offsets, vec![0, 2, 3]);
    }

    #[test]
    fn test_tableswitch_padding() {
        // nop; tableswitch at 1, padded to 4: default 20, low 0, high 1
        let code = [
            0x00, 0xaa, 0, 0, //
            0, 0, 0, 20, //
            0, 0, 0, 0, //
            0, 0, 0, 1, //
            0, 0, 0, 10, //
            0, 0, 0, 12,
        ];
        let decoded = decode_instruction(&code, 1).unwrap();
        assert_eq!(decoded.length, 23);
        let instr = decoded.instruction.unwrap();
        assert_eq!(byte_size(&instr, 1), 23);
        assert!(matches!(instr, Instruction::Tableswitch { low: 0, high: 1, .. }));
    }

    #[test]
    fn test_wide_forms() {
        let code = [0xc4, 0x84, 0x01, 0x00, 0xff, 0xfe];
        let decoded = decode_instruction(&code, 0).unwrap();
        assert_eq!(decoded.length, 6);
        assert_eq!(
            decoded.instruction,
            Some(Instruction::IincWide { index: 256, value: -2 })
        );
        let unknown = decode_instruction(&[0xc4, 0x60, 0, 0], 0).unwrap();
        assert_eq!((unknown.length, unknown.instruction), (4, None));
    }

    #[test]
    fn test_reserved_opcode_is_skipped() {
        let decoded = decode_instruction(&[0xca], 0).unwrap();
        assert_eq!((decoded.length, decoded.instruction), (1, None));
    }

    #[test]
    fn test_inverted_switch_range() {
        let code = [0xaa, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 5, 0, 0, 0, 1];
        assert!(matches!(
            decode_instruction(&code, 0),
            Err(DecompileError::BadSwitchRange { offset: 0, low: 5, high: 1 })
        ));
    }

    #[test]
    fn test_oversized_switch_tables() {
        // tableswitch low 0, high i32::MAX, no entries
        let code = [0xaa, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x7f, 0xff, 0xff, 0xff];
        assert!(matches!(
            decode_instruction(&code, 0),
            Err(DecompileError::Truncated { offset: 0 })
        ));
        // tableswitch low i32::MIN, high i32::MAX
        let code = [0xaa, 0, 0, 0, 0, 0, 0, 0, 0x80, 0, 0, 0, 0x7f, 0xff, 0xff, 0xff];
        assert!(matches!(
            decode_instruction(&code, 0),
            Err(DecompileError::Truncated { offset: 0 })
        ));
        // lookupswitch with u32::MAX pairs
        let code = [0xab, 0, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(
            decode_instruction(&code, 0),
            Err(DecompileError::Truncated { offset: 0 })
        ));
        assert_eq!(
            byte_size(
                &Instruction::Tableswitch { default: 0, low: i32::MIN, high: i32::MAX, offsets: vec![] },
                0
            ),
            u32::MAX
        );
    }

    #[test]
    fn test_truncated() {
        assert!(matches!(
            decode_instruction(&[0x11, 0x00], 0),
            Err(DecompileError::Truncated { offset: 0 })
        ));
        assert!(matches!(
            decode_instruction(&[], 0),
            Err(DecompileError::Truncated { offset: 0 })
        ));
    }

    #[test]
    fn test_branch_delta() {
        assert_eq!(branch_delta(&Instruction::Ifnull(7)), Some(7));
        assert_eq!(branch_delta(&Instruction::GotoW(-70000)), Some(-70000));
        assert_eq!(branch_delta(&Instruction::Jsr(5)), None);
    }
}
