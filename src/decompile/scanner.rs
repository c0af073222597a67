//! Questions control-flow construction asks about a block without
//! simulating it.

use crate::code_attribute::Instruction;
use crate::constant_info::ConstantPool;
use crate::error::Result;

use super::cfg_types::BasicBlock;
use super::util::{self, DecodedInstruction};

pub use super::descriptor::count_method_parameters;

/// Net number of values a block leaves on the operand stack, counted the way
/// [`StackSimulator`](super::StackSimulator) counts them: one entry per value
/// whatever its category. Conditional branches consume their operands.
pub fn eval_stack_depth(constants: &ConstantPool, code: &[u8], block: &BasicBlock) -> Result<i32> {
    let mut stack = ShadowStack::default();
    for decoded in util::instructions(code, block.from_offset, block.to_offset) {
        let decoded = decoded?;
        if let Some(instruction) = &decoded.instruction {
            stack.apply(constants, instruction)?;
        }
    }
    Ok(stack.depth)
}

/// Long and double values.
fn is_wide_descriptor(descriptor: &str) -> bool {
    matches!(descriptor.as_bytes().first(), Some(b'J' | b'D'))
}

fn return_descriptor(descriptor: &str) -> &str {
    descriptor
        .rfind(')')
        .map_or(descriptor, |end| &descriptor[end + 1..])
}

/// Widths of the values pushed inside the block. Values inherited from
/// before the block are taken as category 1.
#[derive(Debug, Default)]
struct ShadowStack {
    depth: i32,
    wide: Vec<bool>,
}

impl ShadowStack {
    fn push(&mut self, wide: bool) {
        self.depth += 1;
        self.wide.push(wide);
    }

    fn pop(&mut self) -> bool {
        self.depth -= 1;
        self.wide.pop().unwrap_or(false)
    }

    fn push_all(&mut self, values: &[bool]) {
        for &wide in values {
            self.push(wide);
        }
    }

    /// Pops `pops` values, then pushes one result when there is one.
    fn replace(&mut self, pops: usize, push: Option<bool>) {
        for _ in 0..pops {
            self.pop();
        }
        if let Some(wide) = push {
            self.push(wide);
        }
    }

    fn invoke(&mut self, descriptor: &str, receiver: usize) {
        let result = return_descriptor(descriptor);
        let push = (result != "V").then(|| is_wide_descriptor(result));
        self.replace(receiver + count_method_parameters(descriptor), push);
    }

    fn apply(&mut self, constants: &ConstantPool, instruction: &Instruction) -> Result<()> {
        use Instruction::*;

        match instruction {
            Aconstnull | Iconstm1 | Iconst0 | Iconst1 | Iconst2 | Iconst3 | Iconst4 | Iconst5
            | Fconst0 | Fconst1 | Fconst2 | Bipush(_) | Sipush(_) | Ldc(_) | LdcW(_) => self.push(false),
            Lconst0 | Lconst1 | Dconst0 | Dconst1 | Ldc2W(_) => self.push(true),
            Iload(_) | Fload(_) | Aload(_) | Iload0 | Iload1 | Iload2 | Iload3 | Fload0 | Fload1
            | Fload2 | Fload3 | Aload0 | Aload1 | Aload2 | Aload3 | IloadWide(_) | FloadWide(_)
            | AloadWide(_) => self.push(false),
            Lload(_) | Dload(_) | Lload0 | Lload1 | Lload2 | Lload3 | Dload0 | Dload1 | Dload2
            | Dload3 | LloadWide(_) | DloadWide(_) => self.push(true),
            Jsr(_) | JsrW(_) | New(_) => self.push(false),
            Getstatic(index) => self.push(is_wide_descriptor(constants.member_ref(*index)?.descriptor)),
            Getfield(index) => {
                let wide = is_wide_descriptor(constants.member_ref(*index)?.descriptor);
                self.replace(1, Some(wide));
            }

            Iaload | Faload | Aaload | Baload | Caload | Saload => self.replace(2, Some(false)),
            Laload | Daload => self.replace(2, Some(true)),
            Istore(_) | Lstore(_) | Fstore(_) | Dstore(_) | Astore(_) | Istore0 | Istore1
            | Istore2 | Istore3 | Lstore0 | Lstore1 | Lstore2 | Lstore3 | Fstore0 | Fstore1
            | Fstore2 | Fstore3 | Dstore0 | Dstore1 | Dstore2 | Dstore3 | Astore0 | Astore1
            | Astore2 | Astore3 | IstoreWide(_) | LstoreWide(_) | FstoreWide(_) | DstoreWide(_)
            | AstoreWide(_) => self.replace(1, None),
            Iastore | Lastore | Fastore | Dastore | Aastore | Bastore | Castore | Sastore => {
                self.replace(3, None)
            }

            Pop => self.replace(1, None),
            Pop2 => {
                if !self.pop() {
                    self.pop();
                }
            }
            Dup => {
                let v1 = self.pop();
                self.push_all(&[v1, v1]);
            }
            Dupx1 => {
                let (v1, v2) = (self.pop(), self.pop());
                self.push_all(&[v1, v2, v1]);
            }
            Dupx2 => {
                let (v1, v2) = (self.pop(), self.pop());
                if v2 {
                    self.push_all(&[v1, v2, v1]);
                } else {
                    let v3 = self.pop();
                    self.push_all(&[v1, v3, v2, v1]);
                }
            }
            Dup2 => {
                let v1 = self.pop();
                if v1 {
                    self.push_all(&[v1, v1]);
                } else {
                    let v2 = self.pop();
                    self.push_all(&[v2, v1, v2, v1]);
                }
            }
            Dup2x1 => {
                let (v1, v2) = (self.pop(), self.pop());
                if v1 {
                    self.push_all(&[v1, v2, v1]);
                } else {
                    let v3 = self.pop();
                    self.push_all(&[v2, v1, v3, v2, v1]);
                }
            }
            Dup2x2 => {
                let (v1, v2) = (self.pop(), self.pop());
                match (v1, v2) {
                    (true, true) => self.push_all(&[v1, v2, v1]),
                    (true, false) => {
                        let v3 = self.pop();
                        self.push_all(&[v1, v3, v2, v1]);
                    }
                    (false, _) => {
                        let v3 = self.pop();
                        if v3 {
                            self.push_all(&[v2, v1, v3, v2, v1]);
                        } else {
                            let v4 = self.pop();
                            self.push_all(&[v2, v1, v4, v3, v2, v1]);
                        }
                    }
                }
            }
            Swap => {
                let (v1, v2) = (self.pop(), self.pop());
                self.push_all(&[v1, v2]);
            }

            Iadd | Fadd | Isub | Fsub | Imul | Fmul | Idiv | Fdiv | Irem | Frem | Ishl | Ishr
            | Iushr | Iand | Ior | Ixor => self.replace(2, Some(false)),
            Ladd | Dadd | Lsub | Dsub | Lmul | Dmul | Ldiv | Ddiv | Lrem | Drem | Lshl | Lshr
            | Lushr | Land | Lor | Lxor => self.replace(2, Some(true)),
            Ineg | Fneg | I2f | I2b | I2c | I2s | L2i | L2f | F2i | D2i | D2f => {
                self.replace(1, Some(false))
            }
            Lneg | Dneg | I2l | I2d | L2d | F2l | F2d | D2l => self.replace(1, Some(true)),
            Lcmp | Fcmpl | Fcmpg | Dcmpl | Dcmpg => self.replace(2, Some(false)),

            Ifeq(_) | Ifne(_) | Iflt(_) | Ifge(_) | Ifgt(_) | Ifle(_) | Ifnull(_) | Ifnonnull(_) => {
                self.replace(1, None)
            }
            IfIcmpeq(_) | IfIcmpne(_) | IfIcmplt(_) | IfIcmpge(_) | IfIcmpgt(_) | IfIcmple(_)
            | IfAcmpeq(_) | IfAcmpne(_) => self.replace(2, None),
            Tableswitch { .. } | Lookupswitch { .. } => self.replace(1, None),
            Ireturn | Lreturn | Freturn | Dreturn | Areturn | Athrow => self.replace(1, None),
            Monitorenter | Monitorexit | Putstatic(_) => self.replace(1, None),
            Putfield(_) => self.replace(2, None),

            Newarray(_) | Anewarray(_) | Arraylength | Checkcast(_) | Instanceof(_) => {
                self.replace(1, Some(false))
            }
            Multianewarray { dimensions, .. } => self.replace(usize::from(*dimensions), Some(false)),

            Invokevirtual(index) | Invokespecial(index) | Invokeinterface { index, .. } => {
                self.invoke(constants.member_ref(*index)?.descriptor, 1)
            }
            Invokestatic(index) => self.invoke(constants.member_ref(*index)?.descriptor, 0),
            Invokedynamic { index, .. } => self.invoke(constants.invoke_dynamic(*index)?.descriptor, 0),

            Nop | Iinc { .. } | IincWide { .. } | Goto(_) | GotoW(_) | Ret(_) | RetWide(_) | Return => {}
        }
        Ok(())
    }
}

/// Where a forward scan goes next: forward branches are followed.
fn next_scan_offset(decoded: &DecodedInstruction) -> usize {
    match decoded.instruction.as_ref().and_then(util::branch_delta) {
        Some(delta) if delta > 0 => decoded.offset + delta as usize,
        _ => decoded.next_offset(),
    }
}

/// Opcode reached by scanning forward from the start of `block`, following
/// forward branches, stopping at `min(block.to_offset, max_offset)`. Returns
/// 0 when the scan ends past `max_offset`.
pub fn search_next_opcode(code: &[u8], block: &BasicBlock, max_offset: usize) -> Result<u8> {
    let to = block.to_offset.min(max_offset).min(code.len());
    let mut offset = block.from_offset;
    while offset < to {
        offset = next_scan_offset(&util::decode_instruction(code, offset)?);
    }
    if offset <= max_offset {
        Ok(code.get(offset).copied().unwrap_or(0))
    } else {
        Ok(0)
    }
}

/// Opcode of the last instruction the same forward scan visits; 0 for an
/// empty block.
pub fn last_opcode(code: &[u8], block: &BasicBlock) -> Result<u8> {
    let to = block.to_offset.min(code.len());
    let mut offset = block.from_offset;
    let mut last = 0;
    while offset < to {
        let decoded = util::decode_instruction(code, offset)?;
        last = decoded.opcode;
        offset = next_scan_offset(&decoded);
    }
    Ok(last)
}

/// Does `block` start by reading `<class>.$assertionsDisabled`?
pub fn is_assert_condition(
    internal_type_name: &str,
    constants: &ConstantPool,
    code: &[u8],
    block: &BasicBlock,
) -> Result<bool> {
    if block.from_offset + 3 > block.to_offset || block.from_offset >= code.len() {
        return Ok(false);
    }
    let decoded = util::decode_instruction(code, block.from_offset)?;
    let Some(Instruction::Getstatic(index)) = decoded.instruction else {
        return Ok(false);
    };
    let field = constants.member_ref(index)?;
    Ok(field.name == "$assertionsDisabled"
        && field.descriptor == "Z"
        && field.class_name == internal_type_name)
}

/// Slot an exception handler block stores the caught exception into, or -1
/// when the handler discards it.
pub fn exception_local_variable_index(code: &[u8], block: &BasicBlock) -> Result<i32> {
    if block.is_empty() || block.from_offset >= code.len() {
        return Ok(-1);
    }
    let decoded = util::decode_instruction(code, block.from_offset)?;
    let index = match decoded.instruction {
        Some(Instruction::Astore(index)) => index as i32,
        Some(Instruction::AstoreWide(index)) => index as i32,
        Some(Instruction::Astore0) => 0,
        Some(Instruction::Astore1) => 1,
        Some(Instruction::Astore2) => 2,
        Some(Instruction::Astore3) => 3,
        _ => -1,
    };
    Ok(index)
}
