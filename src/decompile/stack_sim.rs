//! The per-opcode interpreter.
//!
//! [`StackSimulator::simulate_block`] replays one basic block. Every
//! instruction pops its operands from the [`OperandStack`] as expression
//! nodes and pushes the node it builds; instructions without a result emit a
//! [`Statement`] instead. Conditional branches leave their condition on the
//! stack for control-flow construction to pick up.

use std::rc::Rc;

use crate::code_attribute::Instruction;
use crate::constant_info::{ConstantInfo, ConstantPool, MemberRef};
use crate::error::{ConstantPoolError, Result};
use crate::method_info::Method;

use super::array_init;
use super::cfg_types::BasicBlock;
use super::declaration::ClassDeclaration;
use super::expr::{BinaryOperator, ExprRef, Expression, Statement, UnaryOperator};
use super::local_variable::{LocalVariables, VariableId};
use super::operators::binary;
use super::primitive;
use super::stack::{OperandStack, Statements};
use super::string_concat;
use super::type_maker::TypeMaker;
use super::types::{
    ObjectType, PrimitiveFlags, PrimitiveType, Type, TYPE_MATH, TYPE_OBJECT, TYPE_STRING_BUFFER,
    TYPE_STRING_BUILDER, TYPE_UNDEFINED_OBJECT,
};
use super::util::{self, DecodedInstruction};

const POP: u8 = 0x57;
const ARETURN: u8 = 0xb0;

/// Options controlling which source idioms are rebuilt.
#[derive(Clone, Debug)]
pub struct SimulatorOptions {
    /// StringBuilder/StringBuffer `append` chains become `+`.
    pub fold_string_concatenation: bool,
    /// Calls to private synthetic methods of the class become lambdas.
    pub inline_lambdas: bool,
    /// `new T[n]` plus constant-index stores become `new T[]{...}`.
    pub collapse_array_initializers: bool,
    /// Literals equal to `MAX_VALUE`, `Math.PI` and friends become field
    /// references.
    pub named_numeric_constants: bool,
}

impl Default for SimulatorOptions {
    fn default() -> Self {
        Self {
            fold_string_concatenation: true,
            inline_lambdas: true,
            collapse_array_initializers: true,
            named_numeric_constants: true,
        }
    }
}

/// Interprets the blocks of one method.
pub struct StackSimulator<'a> {
    pub(crate) type_maker: &'a dyn TypeMaker,
    pub(crate) constants: &'a ConstantPool,
    pub(crate) class: &'a ClassDeclaration,
    pub(crate) method: &'a Method,
    pub(crate) locals: LocalVariables,
    pub(crate) options: SimulatorOptions,
    pub(crate) class_type: ObjectType,
    pub(crate) return_type: Type,
}

fn int_constant(line: u32, ty: PrimitiveType, value: i32) -> ExprRef {
    Rc::new(Expression::IntegerConstant { line, ty, value })
}

fn primitive(ty: PrimitiveType) -> Type {
    Type::Primitive(ty)
}

/// Line of the leftmost node, which is where the expression starts.
fn first_line(expression: &Expression) -> u32 {
    let line = expression.line();
    let leftmost = match expression {
        Expression::BinaryOperator { left, .. } => Some(left),
        Expression::FieldReference { receiver, .. }
        | Expression::MethodInvocation { receiver, .. } => Some(receiver),
        Expression::ArrayElement { array, .. } => Some(array),
        Expression::PostOperator { expression, .. } => Some(expression),
        _ => None,
    };
    match leftmost.map(|e| first_line(e)) {
        Some(inner) if inner > 0 && (line == 0 || inner < line) => inner,
        _ => line,
    }
}

impl<'a> StackSimulator<'a> {
    /// Declares the bindings of `method` and resolves its return type.
    pub fn new(
        type_maker: &'a dyn TypeMaker,
        constants: &'a ConstantPool,
        class: &'a ClassDeclaration,
        method: &'a Method,
    ) -> Result<Self> {
        let class_type = type_maker.make_from_internal_type_name(&class.internal_type_name);
        let locals = LocalVariables::for_method(method, constants, type_maker, &class_type)?;
        let return_type = type_maker
            .make_method_types(&class_type, &method.name, &method.descriptor)?
            .return_type;
        Ok(StackSimulator {
            type_maker,
            constants,
            class,
            method,
            locals,
            options: SimulatorOptions::default(),
            class_type,
            return_type,
        })
    }

    pub fn with_options(mut self, options: SimulatorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SimulatorOptions {
        &self.options
    }

    pub fn locals(&self) -> &LocalVariables {
        &self.locals
    }

    pub fn into_locals(self) -> LocalVariables {
        self.locals
    }

    /// Interprets `[block.from_offset, block.to_offset)`, appending to
    /// `statements` and leaving the block's results on `stack`.
    pub fn simulate_block(
        &mut self,
        block: &BasicBlock,
        statements: &mut Statements,
        stack: &mut OperandStack,
    ) -> Result<()> {
        let method = self.method;
        let code = method.code.as_slice();
        for decoded in util::instructions(code, block.from_offset, block.to_offset) {
            let decoded = decoded?;
            let Some(instruction) = &decoded.instruction else {
                continue;
            };
            let line = method.line_number(decoded.offset);
            self.simulate_instruction(block, &decoded, instruction, line, statements, stack)
                .map_err(|e| {
                    log::debug!(
                        "{}{}: offset {}: {}",
                        method.name,
                        method.descriptor,
                        decoded.offset,
                        e
                    );
                    e
                })?;
        }
        Ok(())
    }

    fn simulate_instruction(
        &mut self,
        block: &BasicBlock,
        decoded: &DecodedInstruction,
        instruction: &Instruction,
        line: u32,
        statements: &mut Statements,
        stack: &mut OperandStack,
    ) -> Result<()> {
        let offset = decoded.offset;
        let opcode = decoded.opcode;
        let inverted = block.must_invert_condition;

        match instruction {
            Instruction::Nop => {}

            // Constants
            Instruction::Aconstnull => stack.push(Rc::new(Expression::Null {
                line,
                ty: Type::Object(TYPE_UNDEFINED_OBJECT.clone()),
            })),
            Instruction::Iconstm1 => {
                stack.push(int_constant(line, PrimitiveType::MAYBE_NEGATIVE_BYTE, -1))
            }
            Instruction::Iconst0 | Instruction::Iconst1 => {
                stack.push(int_constant(line, PrimitiveType::MAYBE_BOOLEAN, (opcode - 0x03) as i32))
            }
            Instruction::Iconst2 | Instruction::Iconst3 | Instruction::Iconst4 | Instruction::Iconst5 => {
                stack.push(int_constant(line, PrimitiveType::MAYBE_BYTE, (opcode - 0x03) as i32))
            }
            Instruction::Lconst0 | Instruction::Lconst1 => stack.push(Rc::new(Expression::LongConstant {
                line,
                value: (opcode - 0x09) as i64,
            })),
            Instruction::Fconst0 | Instruction::Fconst1 | Instruction::Fconst2 => {
                stack.push(Rc::new(Expression::FloatConstant {
                    line,
                    value: (opcode - 0x0b) as f32,
                }))
            }
            Instruction::Dconst0 | Instruction::Dconst1 => stack.push(Rc::new(Expression::DoubleConstant {
                line,
                value: (opcode - 0x0e) as f64,
            })),
            Instruction::Bipush(value) => {
                let value = *value as i32;
                stack.push(int_constant(line, primitive::from_value(value), value));
            }
            Instruction::Sipush(value) => {
                let value = *value as i32;
                stack.push(int_constant(line, primitive::from_value(value), value));
            }
            Instruction::Ldc(index) => stack.push(self.load_constant(line, *index as u16)?),
            Instruction::LdcW(index) | Instruction::Ldc2W(index) => {
                stack.push(self.load_constant(line, *index)?)
            }

            // Loads
            Instruction::Iload(index) => {
                self.parse_iload(statements, stack, line, *index as u16, offset + 1)
            }
            Instruction::Iload0 | Instruction::Iload1 | Instruction::Iload2 | Instruction::Iload3 => {
                self.parse_iload(statements, stack, line, short_form_index(opcode, 0x1a), offset)
            }
            Instruction::Lload(index) => {
                stack.push(self.load(line, *index as u16, offset + 1, PrimitiveType::LONG))
            }
            Instruction::Fload(index) => {
                stack.push(self.load(line, *index as u16, offset + 1, PrimitiveType::FLOAT))
            }
            Instruction::Dload(index) => {
                stack.push(self.load(line, *index as u16, offset + 1, PrimitiveType::DOUBLE))
            }
            Instruction::Lload0 | Instruction::Lload1 | Instruction::Lload2 | Instruction::Lload3 => {
                let index = short_form_index(opcode, 0x1a);
                stack.push(self.load(line, index, offset, PrimitiveType::LONG))
            }
            Instruction::Fload0 | Instruction::Fload1 | Instruction::Fload2 | Instruction::Fload3 => {
                let index = short_form_index(opcode, 0x1a);
                stack.push(self.load(line, index, offset, PrimitiveType::FLOAT))
            }
            Instruction::Dload0 | Instruction::Dload1 | Instruction::Dload2 | Instruction::Dload3 => {
                let index = short_form_index(opcode, 0x1a);
                stack.push(self.load(line, index, offset, PrimitiveType::DOUBLE))
            }
            Instruction::Aload(index) => {
                stack.push(self.load_reference(line, *index as u16, offset + 1, true))
            }
            Instruction::Aload0 | Instruction::Aload1 | Instruction::Aload2 | Instruction::Aload3 => {
                let index = short_form_index(opcode, 0x1a);
                stack.push(self.load_reference(line, index, offset, true))
            }

            // Array loads
            Instruction::Iaload
            | Instruction::Laload
            | Instruction::Faload
            | Instruction::Daload
            | Instruction::Aaload
            | Instruction::Baload
            | Instruction::Caload
            | Instruction::Saload => {
                let index = stack.pop(offset)?;
                let array = stack.pop(offset)?;
                let fallback = match instruction {
                    Instruction::Iaload => primitive(PrimitiveType::INT),
                    Instruction::Laload => primitive(PrimitiveType::LONG),
                    Instruction::Faload => primitive(PrimitiveType::FLOAT),
                    Instruction::Daload => primitive(PrimitiveType::DOUBLE),
                    Instruction::Baload => primitive(PrimitiveType::BYTE),
                    Instruction::Caload => primitive(PrimitiveType::CHAR),
                    Instruction::Saload => primitive(PrimitiveType::SHORT),
                    _ => Type::Object(TYPE_OBJECT.clone()),
                };
                let ty = self.element_type(&array, fallback);
                stack.push(Rc::new(Expression::ArrayElement {
                    line,
                    ty,
                    array,
                    index,
                }));
            }

            // Stores
            Instruction::Istore(index)
            | Instruction::Lstore(index)
            | Instruction::Fstore(index)
            | Instruction::Dstore(index) => {
                let value = stack.pop(offset)?;
                let variable = self.assignment_binding(*index as u16, offset + 3, &value);
                self.parse_store(statements, stack, line, offset + 3, variable, value)?;
            }
            Instruction::Astore(index) => {
                let value = stack.pop(offset)?;
                let variable = self.assignment_binding(*index as u16, offset + 2, &value);
                self.parse_astore(statements, stack, line, variable, value)?;
            }
            Instruction::Istore0
            | Instruction::Istore1
            | Instruction::Istore2
            | Instruction::Istore3
            | Instruction::Lstore0
            | Instruction::Lstore1
            | Instruction::Lstore2
            | Instruction::Lstore3
            | Instruction::Fstore0
            | Instruction::Fstore1
            | Instruction::Fstore2
            | Instruction::Fstore3
            | Instruction::Dstore0
            | Instruction::Dstore1
            | Instruction::Dstore2
            | Instruction::Dstore3 => {
                let value = stack.pop(offset)?;
                let variable = self.assignment_binding(short_form_index(opcode, 0x3b), offset + 1, &value);
                self.parse_store(statements, stack, line, offset + 1, variable, value)?;
            }
            Instruction::Astore0 | Instruction::Astore1 | Instruction::Astore2 | Instruction::Astore3 => {
                let value = stack.pop(offset)?;
                let variable = self.assignment_binding(short_form_index(opcode, 0x3b), offset + 1, &value);
                self.parse_astore(statements, stack, line, variable, value)?;
            }

            // Array stores
            Instruction::Iastore
            | Instruction::Lastore
            | Instruction::Fastore
            | Instruction::Dastore
            | Instruction::Aastore
            | Instruction::Bastore
            | Instruction::Castore
            | Instruction::Sastore => {
                let value = stack.pop(offset)?;
                let index = stack.pop(offset)?;
                let array = stack.pop(offset)?;
                let ty = match instruction {
                    Instruction::Iastore => self.element_type(&array, primitive(PrimitiveType::INT)),
                    Instruction::Aastore => {
                        let array_type = array.resolved_type(&self.locals);
                        array_type.create_type(array_type.dimension().saturating_sub(1))
                    }
                    Instruction::Lastore => primitive(PrimitiveType::LONG),
                    Instruction::Fastore => primitive(PrimitiveType::FLOAT),
                    Instruction::Dastore => primitive(PrimitiveType::DOUBLE),
                    Instruction::Bastore => primitive(PrimitiveType::BYTE),
                    Instruction::Castore => primitive(PrimitiveType::CHAR),
                    _ => primitive(PrimitiveType::SHORT),
                };
                let element = Rc::new(Expression::ArrayElement {
                    line,
                    ty: ty.clone(),
                    array,
                    index,
                });
                statements.add(Statement::Expression(binary(
                    line,
                    ty,
                    element,
                    BinaryOperator::Assign,
                    value,
                    16,
                )));
            }

            // Stack
            Instruction::Pop => {
                let value = stack.pop(offset)?;
                discard(statements, value);
            }
            Instruction::Pop2 => {
                let v1 = stack.pop(offset)?;
                if self.is_wide(&v1) {
                    discard(statements, v1);
                } else {
                    let v2 = stack.pop(offset)?;
                    discard(statements, v2);
                    discard(statements, v1);
                }
            }
            Instruction::Dup => {
                let v1 = stack.pop(offset)?;
                stack.push(Rc::clone(&v1));
                stack.push(v1);
            }
            Instruction::Dupx1 => {
                let v1 = stack.pop(offset)?;
                let v2 = stack.pop(offset)?;
                push_all(stack, [&v1, &v2, &v1]);
            }
            Instruction::Dupx2 => {
                let v1 = stack.pop(offset)?;
                let v2 = stack.pop(offset)?;
                if self.is_wide(&v2) {
                    push_all(stack, [&v1, &v2, &v1]);
                } else {
                    let v3 = stack.pop(offset)?;
                    push_all(stack, [&v1, &v3, &v2, &v1]);
                }
            }
            Instruction::Dup2 => {
                let v1 = stack.pop(offset)?;
                if self.is_wide(&v1) {
                    push_all(stack, [&v1, &v1]);
                } else {
                    let v2 = stack.pop(offset)?;
                    push_all(stack, [&v2, &v1, &v2, &v1]);
                }
            }
            Instruction::Dup2x1 => {
                let v1 = stack.pop(offset)?;
                let v2 = stack.pop(offset)?;
                if self.is_wide(&v1) {
                    push_all(stack, [&v1, &v2, &v1]);
                } else {
                    let v3 = stack.pop(offset)?;
                    push_all(stack, [&v2, &v1, &v3, &v2, &v1]);
                }
            }
            Instruction::Dup2x2 => {
                let v1 = stack.pop(offset)?;
                let v2 = stack.pop(offset)?;
                if self.is_wide(&v1) {
                    if self.is_wide(&v2) {
                        push_all(stack, [&v1, &v2, &v1]);
                    } else {
                        let v3 = stack.pop(offset)?;
                        push_all(stack, [&v1, &v3, &v2, &v1]);
                    }
                } else {
                    let v3 = stack.pop(offset)?;
                    if self.is_wide(&v3) {
                        push_all(stack, [&v2, &v1, &v3, &v2, &v1]);
                    } else {
                        let v4 = stack.pop(offset)?;
                        push_all(stack, [&v2, &v1, &v4, &v3, &v2, &v1]);
                    }
                }
            }
            Instruction::Swap => {
                let v1 = stack.pop(offset)?;
                let v2 = stack.pop(offset)?;
                push_all(stack, [&v1, &v2]);
            }

            // Arithmetic
            Instruction::Iadd => self.integer_operation(stack, line, offset, BinaryOperator::Add, 6)?,
            Instruction::Isub => self.integer_operation(stack, line, offset, BinaryOperator::Sub, 6)?,
            Instruction::Imul => self.integer_operation(stack, line, offset, BinaryOperator::Mul, 5)?,
            Instruction::Idiv => self.integer_operation(stack, line, offset, BinaryOperator::Div, 5)?,
            Instruction::Irem => self.integer_operation(stack, line, offset, BinaryOperator::Rem, 5)?,
            Instruction::Ishl => self.integer_operation(stack, line, offset, BinaryOperator::Shl, 7)?,
            Instruction::Iushr => self.integer_operation(stack, line, offset, BinaryOperator::Ushr, 7)?,
            Instruction::Ishr => {
                typed_operation(stack, line, offset, PrimitiveType::INT, BinaryOperator::Shr, 7)?
            }
            Instruction::Iand => self.bitwise_operation(stack, line, offset, BinaryOperator::And, 10)?,
            Instruction::Ixor => self.bitwise_operation(stack, line, offset, BinaryOperator::Xor, 11)?,
            Instruction::Ior => self.bitwise_operation(stack, line, offset, BinaryOperator::Or, 12)?,
            Instruction::Ladd | Instruction::Fadd | Instruction::Dadd => {
                typed_operation(stack, line, offset, wide_operand_type(opcode), BinaryOperator::Add, 6)?
            }
            Instruction::Lsub | Instruction::Fsub | Instruction::Dsub => {
                typed_operation(stack, line, offset, wide_operand_type(opcode), BinaryOperator::Sub, 6)?
            }
            Instruction::Lmul | Instruction::Fmul | Instruction::Dmul => {
                typed_operation(stack, line, offset, wide_operand_type(opcode), BinaryOperator::Mul, 5)?
            }
            Instruction::Ldiv | Instruction::Fdiv | Instruction::Ddiv => {
                typed_operation(stack, line, offset, wide_operand_type(opcode), BinaryOperator::Div, 5)?
            }
            Instruction::Lrem | Instruction::Frem | Instruction::Drem => {
                typed_operation(stack, line, offset, wide_operand_type(opcode), BinaryOperator::Rem, 5)?
            }
            Instruction::Lshl => {
                typed_operation(stack, line, offset, PrimitiveType::LONG, BinaryOperator::Shl, 7)?
            }
            Instruction::Lshr => {
                typed_operation(stack, line, offset, PrimitiveType::LONG, BinaryOperator::Shr, 7)?
            }
            Instruction::Lushr => {
                typed_operation(stack, line, offset, PrimitiveType::LONG, BinaryOperator::Ushr, 7)?
            }
            Instruction::Land => {
                typed_operation(stack, line, offset, PrimitiveType::LONG, BinaryOperator::And, 10)?
            }
            Instruction::Lxor => {
                typed_operation(stack, line, offset, PrimitiveType::LONG, BinaryOperator::Xor, 11)?
            }
            Instruction::Lor => {
                typed_operation(stack, line, offset, PrimitiveType::LONG, BinaryOperator::Or, 12)?
            }
            Instruction::Ineg | Instruction::Lneg | Instruction::Fneg | Instruction::Dneg => {
                let value = stack.pop(offset)?;
                stack.push(self.new_pre_arithmetic(line, UnaryOperator::Minus, value));
            }
            Instruction::Iinc { index, value } => {
                let variable = self.locals.get_or_create(
                    *index as u16,
                    offset + 1,
                    &primitive(PrimitiveType::INT),
                );
                self.parse_iinc(statements, stack, line, offset + 1, variable, *value as i32)?;
            }

            // Conversions
            Instruction::I2l => cast(stack, line, offset, PrimitiveType::LONG, false)?,
            Instruction::I2f => cast(stack, line, offset, PrimitiveType::FLOAT, false)?,
            Instruction::I2d => cast(stack, line, offset, PrimitiveType::DOUBLE, false)?,
            Instruction::L2i => cast(stack, line, offset, PrimitiveType::INT, true)?,
            Instruction::L2f => cast(stack, line, offset, PrimitiveType::FLOAT, true)?,
            Instruction::L2d => cast(stack, line, offset, PrimitiveType::DOUBLE, false)?,
            Instruction::F2i => cast(stack, line, offset, PrimitiveType::INT, true)?,
            Instruction::F2l => cast(stack, line, offset, PrimitiveType::LONG, true)?,
            Instruction::F2d => cast(stack, line, offset, PrimitiveType::DOUBLE, false)?,
            Instruction::D2i => cast(stack, line, offset, PrimitiveType::INT, true)?,
            Instruction::D2l => cast(stack, line, offset, PrimitiveType::LONG, true)?,
            Instruction::D2f => cast(stack, line, offset, PrimitiveType::FLOAT, true)?,
            Instruction::I2b => cast(stack, line, offset, PrimitiveType::BYTE, true)?,
            Instruction::I2c => cast(stack, line, offset, PrimitiveType::CHAR, true)?,
            Instruction::I2s => cast(stack, line, offset, PrimitiveType::SHORT, true)?,

            // Comparisons
            Instruction::Lcmp
            | Instruction::Fcmpl
            | Instruction::Fcmpg
            | Instruction::Dcmpl
            | Instruction::Dcmpg => {
                let right = stack.pop(offset)?;
                let left = stack.pop(offset)?;
                stack.push(Rc::new(Expression::Compare { line, left, right }));
            }
            Instruction::Ifeq(_) => {
                self.parse_if(stack, line, offset, inverted, BinaryOperator::Ne, BinaryOperator::Eq, 8)?
            }
            Instruction::Ifne(_) => {
                self.parse_if(stack, line, offset, inverted, BinaryOperator::Eq, BinaryOperator::Ne, 8)?
            }
            Instruction::Iflt(_) => {
                self.parse_if(stack, line, offset, inverted, BinaryOperator::Ge, BinaryOperator::Lt, 7)?
            }
            Instruction::Ifge(_) => {
                self.parse_if(stack, line, offset, inverted, BinaryOperator::Lt, BinaryOperator::Ge, 7)?
            }
            Instruction::Ifgt(_) => {
                self.parse_if(stack, line, offset, inverted, BinaryOperator::Le, BinaryOperator::Gt, 7)?
            }
            Instruction::Ifle(_) => {
                self.parse_if(stack, line, offset, inverted, BinaryOperator::Gt, BinaryOperator::Le, 7)?
            }
            Instruction::IfIcmpeq(_)
            | Instruction::IfIcmpne(_)
            | Instruction::IfAcmpeq(_)
            | Instruction::IfAcmpne(_) => {
                let right = stack.pop(offset)?;
                let left = stack.pop(offset)?;
                let equal = matches!(instruction, Instruction::IfIcmpeq(_) | Instruction::IfAcmpeq(_));
                let operator = if equal == inverted {
                    BinaryOperator::Ne
                } else {
                    BinaryOperator::Eq
                };
                stack.push(self.new_integer_or_boolean_comparison(line, left, operator, right, 9));
            }
            Instruction::IfIcmplt(_)
            | Instruction::IfIcmpge(_)
            | Instruction::IfIcmpgt(_)
            | Instruction::IfIcmple(_) => {
                let right = stack.pop(offset)?;
                let left = stack.pop(offset)?;
                let operator = match instruction {
                    Instruction::IfIcmplt(_) => BinaryOperator::Lt,
                    Instruction::IfIcmpge(_) => BinaryOperator::Ge,
                    Instruction::IfIcmpgt(_) => BinaryOperator::Gt,
                    _ => BinaryOperator::Le,
                };
                let operator = if inverted { operator.negate() } else { operator };
                stack.push(self.new_integer_comparison(line, left, operator, right, 8));
            }
            Instruction::Ifnull(_) | Instruction::Ifnonnull(_) => {
                let value = stack.pop(offset)?;
                let is_null = matches!(instruction, Instruction::Ifnull(_));
                let operator = if is_null == inverted {
                    BinaryOperator::Ne
                } else {
                    BinaryOperator::Eq
                };
                let null = Rc::new(Expression::Null {
                    line: value.line(),
                    ty: value.resolved_type(&self.locals),
                });
                stack.push(binary(line, primitive(PrimitiveType::BOOLEAN), value, operator, null, 9));
                self.duplicate_under_condition(stack, offset)?;
            }

            // Control
            Instruction::Goto(_) | Instruction::Jsr(_) | Instruction::GotoW(_) | Instruction::JsrW(_) => {
                if matches!(instruction, Instruction::Jsr(_) | Instruction::JsrW(_)) {
                    stack.push(Rc::new(Expression::JsrReturnAddress { line }));
                }
            }
            Instruction::Ret(_) | Instruction::RetWide(_) => {}
            Instruction::Tableswitch { low, high, .. } => {
                let condition = stack.pop(offset)?;
                let slots = (*high as i64 - *low as i64 + 2) as usize;
                statements.add(Statement::Switch {
                    condition,
                    blocks: vec![Vec::new(); slots],
                });
            }
            Instruction::Lookupswitch { npairs, .. } => {
                let condition = stack.pop(offset)?;
                statements.add(Statement::Switch {
                    condition,
                    blocks: vec![Vec::new(); *npairs as usize + 1],
                });
            }
            Instruction::Ireturn
            | Instruction::Lreturn
            | Instruction::Freturn
            | Instruction::Dreturn
            | Instruction::Areturn => self.parse_xreturn(statements, stack, line, offset)?,
            Instruction::Return => statements.add(Statement::Return),

            // Fields
            Instruction::Getstatic(index) => self.parse_get_static(stack, line, *index)?,
            Instruction::Putstatic(index) => {
                let value = stack.pop(offset)?;
                let field = self.field_reference(line, *index, None)?;
                self.parse_put(statements, stack, line, offset, field, value)?;
            }
            Instruction::Getfield(index) => {
                let object = stack.pop(offset)?;
                stack.push(self.field_reference(line, *index, Some(object))?);
            }
            Instruction::Putfield(index) => {
                let value = stack.pop(offset)?;
                let object = stack.pop(offset)?;
                let field = self.field_reference(line, *index, Some(object))?;
                self.parse_put(statements, stack, line, offset, field, value)?;
            }

            // Invocations
            Instruction::Invokevirtual(index)
            | Instruction::Invokespecial(index)
            | Instruction::Invokestatic(index)
            | Instruction::Invokeinterface { index, .. } => {
                self.parse_invoke(statements, stack, line, offset, instruction, *index)?
            }
            Instruction::Invokedynamic { index, .. } => {
                self.parse_invoke_dynamic(statements, stack, line, offset, *index)?
            }

            // Objects and arrays
            Instruction::New(index) => {
                let constants = self.constants;
                let internal_name = constants.type_name(*index)?;
                stack.push(self.new_object(line, internal_name));
            }
            Instruction::Newarray(tag) => {
                let size = stack.pop(offset)?;
                let element = primitive::from_newarray_tag(*tag).unwrap_or_else(|| {
                    log::debug!("unknown newarray tag {} at offset {}", tag, offset);
                    PrimitiveType::INT
                });
                stack.push(Rc::new(Expression::NewArray {
                    line,
                    ty: element.create_type(1),
                    dimensions: vec![size],
                }));
            }
            Instruction::Anewarray(index) => {
                let size = stack.pop(offset)?;
                let constants = self.constants;
                let name = constants.type_name(*index)?;
                let ty = if name.starts_with('[') {
                    let element = self.type_maker.make_from_descriptor(name)?;
                    element.create_type(element.dimension() + 1)
                } else {
                    self.type_maker.make_from_internal_type_name(name).create_type(1)
                };
                stack.push(Rc::new(Expression::NewArray {
                    line,
                    ty,
                    dimensions: vec![size],
                }));
            }
            Instruction::Multianewarray { index, dimensions } => {
                let constants = self.constants;
                let ty = self.type_maker.make_from_descriptor(constants.type_name(*index)?)?;
                let mut sizes = Vec::with_capacity(*dimensions as usize);
                for _ in 0..*dimensions {
                    sizes.push(stack.pop(offset)?);
                }
                sizes.reverse();
                stack.push(Rc::new(Expression::NewArray {
                    line,
                    ty,
                    dimensions: sizes,
                }));
            }
            Instruction::Arraylength => {
                let array = stack.pop(offset)?;
                stack.push(Rc::new(Expression::Length { line, array }));
            }
            Instruction::Athrow => {
                let exception = stack.pop(offset)?;
                statements.add(Statement::Throw(exception));
            }
            Instruction::Checkcast(index) => {
                let constants = self.constants;
                let target = self
                    .type_maker
                    .make_from_descriptor_or_internal_type_name(constants.type_name(*index)?)?;
                let value = stack.pop(offset)?;
                let retyped = match &*value {
                    Expression::Cast {
                        line,
                        expression,
                        explicit,
                        ..
                    } => Expression::Cast {
                        line: *line,
                        ty: Type::Object(target),
                        expression: Rc::clone(expression),
                        explicit: *explicit,
                    },
                    _ => Expression::Cast {
                        line: first_line(&value),
                        ty: Type::Object(target),
                        expression: Rc::clone(&value),
                        explicit: true,
                    },
                };
                stack.push(Rc::new(retyped));
            }
            Instruction::Instanceof(index) => {
                let constants = self.constants;
                let instance_type = self.class_constant_type(constants.type_name(*index)?)?;
                let expression = stack.pop(offset)?;
                stack.push(Rc::new(Expression::InstanceOf {
                    line,
                    expression,
                    instance_type,
                }));
            }
            Instruction::Monitorenter => {
                let lock = stack.pop(offset)?;
                statements.add(Statement::MonitorEnter(lock));
            }
            Instruction::Monitorexit => {
                let lock = stack.pop(offset)?;
                statements.add(Statement::MonitorExit(lock));
            }

            // Wide forms
            Instruction::IloadWide(index) => self.parse_iload(statements, stack, line, *index, offset + 7),
            Instruction::LloadWide(index) => {
                stack.push(self.load(line, *index, offset + 3, PrimitiveType::LONG))
            }
            Instruction::FloadWide(index) => {
                stack.push(self.load(line, *index, offset + 3, PrimitiveType::FLOAT))
            }
            Instruction::DloadWide(index) => {
                stack.push(self.load(line, *index, offset + 3, PrimitiveType::DOUBLE))
            }
            Instruction::AloadWide(index) => {
                stack.push(self.load_reference(line, *index, offset + 3, false))
            }
            Instruction::IstoreWide(index)
            | Instruction::LstoreWide(index)
            | Instruction::FstoreWide(index)
            | Instruction::DstoreWide(index) => {
                let value = stack.pop(offset)?;
                let variable = self.assignment_binding(*index, offset + 7, &value);
                let location = Rc::new(Expression::LocalVariable { line, variable });
                statements.add(Statement::Expression(binary(
                    line,
                    self.locals.variable_type(variable),
                    location,
                    BinaryOperator::Assign,
                    value,
                    16,
                )));
            }
            Instruction::AstoreWide(index) => {
                let value = stack.pop(offset)?;
                let variable = self.assignment_binding(*index, offset + 7, &value);
                self.parse_astore(statements, stack, line, variable, value)?;
            }
            Instruction::IincWide { index, value } => {
                let variable = self.locals.get_or_create(*index, offset + 5, &primitive(PrimitiveType::INT));
                self.parse_iinc(statements, stack, line, offset + 5, variable, *value as i32)?;
            }
        }
        Ok(())
    }

    fn is_wide(&self, value: &ExprRef) -> bool {
        value.resolved_type(&self.locals).is_wide()
    }

    fn element_type(&self, array: &ExprRef, fallback: Type) -> Type {
        let array_type = array.resolved_type(&self.locals);
        match array_type.dimension() {
            0 => fallback,
            dimension => array_type.create_type(dimension - 1),
        }
    }

    fn load(&mut self, line: u32, index: u16, offset: usize, hint: PrimitiveType) -> ExprRef {
        let variable = self.locals.get_or_create(index, offset, &primitive(hint));
        Rc::new(Expression::LocalVariable { line, variable })
    }

    /// `this` for slot 0 of an instance method, a variable otherwise.
    fn load_reference(&mut self, line: u32, index: u16, offset: usize, may_be_this: bool) -> ExprRef {
        if may_be_this && index == 0 && !self.method.is_static() {
            let class_type = Type::Object(self.class_type.clone());
            let variable = self.locals.get_or_create(0, offset, &class_type);
            return Rc::new(Expression::This {
                line,
                ty: self.locals.variable_type(variable),
            });
        }
        let variable = self
            .locals
            .get_or_create(index, offset, &Type::Object(TYPE_OBJECT.clone()));
        Rc::new(Expression::LocalVariable { line, variable })
    }

    /// Binding written by a store of `value`.
    fn assignment_binding(&mut self, index: u16, offset: usize, value: &ExprRef) -> VariableId {
        match &**value {
            Expression::Null { ty, .. } => self.locals.in_null_assignment(index, offset, ty),
            Expression::LocalVariable { variable, .. } => {
                self.locals.in_assignment_from_variable(index, offset, *variable)
            }
            other => {
                let ty = other.resolved_type(&self.locals);
                self.locals.in_assignment(index, offset, &ty)
            }
        }
    }

    fn integer_operation(
        &mut self,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        operator: BinaryOperator,
        priority: u8,
    ) -> Result<()> {
        let right = stack.pop(offset)?;
        let left = stack.pop(offset)?;
        stack.push(self.new_integer_binary(line, left, operator, right, priority));
        Ok(())
    }

    fn bitwise_operation(
        &mut self,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        operator: BinaryOperator,
        priority: u8,
    ) -> Result<()> {
        let right = stack.pop(offset)?;
        let left = stack.pop(offset)?;
        stack.push(self.new_integer_or_boolean_binary(line, left, operator, right, priority));
        Ok(())
    }

    /// IFxx against the value on the stack: a compare node, a primitive
    /// tested against zero, or a reference tested against null.
    /// `when_inverted` is used when the block's condition is inverted.
    #[allow(clippy::too_many_arguments)]
    fn parse_if(
        &mut self,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        inverted: bool,
        when_inverted: BinaryOperator,
        operator: BinaryOperator,
        priority: u8,
    ) -> Result<()> {
        let value = stack.pop(offset)?;
        let chosen = if inverted { when_inverted } else { operator };
        let boolean = primitive(PrimitiveType::BOOLEAN);

        if let Expression::Compare { left, right, .. } = &*value {
            stack.push(binary(
                line,
                boolean,
                Rc::clone(left),
                chosen,
                Rc::clone(right),
                priority,
            ));
            return Ok(());
        }

        let condition = match value.resolved_type(&self.locals) {
            Type::Primitive(ty) => {
                let widest = primitive::widest_flag(ty.flags());
                if widest == PrimitiveFlags::BOOLEAN {
                    if inverted ^ (when_inverted == BinaryOperator::Eq) {
                        stack.push(value);
                    } else {
                        stack.push(Rc::new(Expression::PreOperator {
                            line,
                            operator: UnaryOperator::Not,
                            expression: value,
                        }));
                    }
                    return Ok(());
                }
                let zero: ExprRef = if widest == PrimitiveFlags::FLOAT {
                    Rc::new(Expression::FloatConstant { line, value: 0.0 })
                } else if widest == PrimitiveFlags::DOUBLE {
                    Rc::new(Expression::DoubleConstant { line, value: 0.0 })
                } else if widest == PrimitiveFlags::LONG {
                    Rc::new(Expression::LongConstant { line, value: 0 })
                } else {
                    int_constant(line, ty, 0)
                };
                binary(line, boolean, value, chosen, zero, 9)
            }
            other => {
                let null = Rc::new(Expression::Null { line, ty: other });
                binary(line, boolean, value, chosen, null, 9)
            }
        };
        stack.push(condition);
        Ok(())
    }

    /// After IFNULL/IFNONNULL: when the next instruction is POP or ARETURN
    /// and a value sits under the condition, that value is duplicated.
    fn duplicate_under_condition(&self, stack: &mut OperandStack, offset: usize) -> Result<()> {
        if stack.len() <= 1 {
            return Ok(());
        }
        let next = self.method.code.get(offset + 3).copied();
        if next == Some(POP) || next == Some(ARETURN) {
            let condition = stack.pop(offset)?;
            if let Some(under) = stack.peek().cloned() {
                stack.push(under);
            }
            stack.push(condition);
        }
        Ok(())
    }

    fn load_constant(&self, line: u32, index: u16) -> Result<ExprRef> {
        let constants = self.constants;
        let constant = match constants.get(index)? {
            ConstantInfo::Integer(c) => int_constant(line, primitive::from_value(c.value), c.value),
            ConstantInfo::Float(c) => self.float_constant(line, c.value),
            ConstantInfo::Long(c) => self.long_constant(line, c.value),
            ConstantInfo::Double(c) => self.double_constant(line, c.value),
            ConstantInfo::Class(c) => Rc::new(Expression::TypeReferenceDotClass {
                line,
                type_ref: self.class_constant_type(constants.utf8(c.name_index)?)?,
            }),
            ConstantInfo::String(c) => Rc::new(Expression::StringConstant {
                line,
                value: constants.utf8(c.string_index)?.to_string(),
            }),
            other => {
                log::debug!("cannot load a {} constant (index {})", other.kind(), index);
                return Err(ConstantPoolError::UnexpectedTag {
                    index,
                    expected: "loadable",
                }
                .into());
            }
        };
        Ok(constant)
    }

    /// A class constant: internal name, array descriptor or primitive.
    fn class_constant_type(&self, name: &str) -> Result<Type> {
        match self.type_maker.make_from_descriptor_or_internal_type_name(name) {
            Ok(object_type) => Ok(Type::Object(object_type)),
            Err(e) => primitive::from_descriptor(name)
                .map(Type::Primitive)
                .map_err(|_| e.into()),
        }
    }

    fn constant_field(&self, line: u32, owner: &str, name: &str, ty: PrimitiveType) -> ExprRef {
        let object_type = if owner == TYPE_MATH.internal_name {
            TYPE_MATH.clone()
        } else {
            self.type_maker.make_from_internal_type_name(owner)
        };
        log::trace!("literal replaced by {}.{}", owner, name);
        Rc::new(Expression::FieldReference {
            line,
            ty: primitive(ty),
            receiver: Rc::new(Expression::ObjectTypeReference {
                line,
                object_type,
                explicit: true,
            }),
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: ty.descriptor().to_string(),
        })
    }

    fn float_constant(&self, line: u32, value: f32) -> ExprRef {
        if self.options.named_numeric_constants {
            let name = if value == f32::from_bits(1) {
                Some("MIN_VALUE")
            } else if value == f32::MAX {
                Some("MAX_VALUE")
            } else if value == f32::INFINITY {
                Some("POSITIVE_INFINITY")
            } else if value == f32::NEG_INFINITY {
                Some("NEGATIVE_INFINITY")
            } else {
                None
            };
            if let Some(name) = name {
                return self.constant_field(line, "java/lang/Float", name, PrimitiveType::FLOAT);
            }
        }
        Rc::new(Expression::FloatConstant { line, value })
    }

    fn long_constant(&self, line: u32, value: i64) -> ExprRef {
        if self.options.named_numeric_constants {
            if value == i64::MIN {
                return self.constant_field(line, "java/lang/Long", "MIN_VALUE", PrimitiveType::LONG);
            }
            if value == i64::MAX {
                return self.constant_field(line, "java/lang/Long", "MAX_VALUE", PrimitiveType::LONG);
            }
        }
        Rc::new(Expression::LongConstant { line, value })
    }

    fn double_constant(&self, line: u32, value: f64) -> ExprRef {
        if self.options.named_numeric_constants {
            let named = if value == f64::from_bits(1) {
                Some(("java/lang/Double", "MIN_VALUE"))
            } else if value == f64::MAX {
                Some(("java/lang/Double", "MAX_VALUE"))
            } else if value == f64::INFINITY {
                Some(("java/lang/Double", "POSITIVE_INFINITY"))
            } else if value == f64::NEG_INFINITY {
                Some(("java/lang/Double", "NEGATIVE_INFINITY"))
            } else if value == std::f64::consts::E {
                Some(("java/lang/Math", "E"))
            } else if value == std::f64::consts::PI {
                Some(("java/lang/Math", "PI"))
            } else {
                None
            };
            if let Some((owner, name)) = named {
                return self.constant_field(line, owner, name, PrimitiveType::DOUBLE);
            }
        }
        Rc::new(Expression::DoubleConstant { line, value })
    }

    fn parse_get_static(&mut self, stack: &mut OperandStack, line: u32, index: u16) -> Result<()> {
        let constants = self.constants;
        let field = constants.member_ref(index)?;
        if field.name == "TYPE" {
            if let Some(wrapped) = primitive::from_wrapper(field.class_name) {
                stack.push(Rc::new(Expression::TypeReferenceDotClass {
                    line,
                    type_ref: primitive(wrapped),
                }));
                return Ok(());
            }
        }
        stack.push(self.field_reference(line, index, None)?);
        Ok(())
    }

    /// A field reference on `object`, or a static one when `object` is None.
    fn field_reference(&mut self, line: u32, index: u16, object: Option<ExprRef>) -> Result<ExprRef> {
        let constants = self.constants;
        let field = constants.member_ref(index)?;
        let owner = self.type_maker.make_from_internal_type_name(field.class_name);
        let ty = self.type_maker.make_field_type(&owner, field.name, field.descriptor)?;
        let receiver = match object {
            Some(object) => self.field_instance_reference(object, &owner, field.name),
            None => {
                let explicit = field.class_name != self.class.internal_type_name
                    || self.locals.contains_name(field.name);
                Rc::new(Expression::ObjectTypeReference {
                    line,
                    object_type: owner,
                    explicit,
                })
            }
        };
        Ok(Rc::new(Expression::FieldReference {
            line,
            ty,
            receiver,
            owner: field.class_name.to_string(),
            name: field.name.to_string(),
            descriptor: field.descriptor.to_string(),
        }))
    }

    /// Pops the arguments of a call, last first, collapsing array
    /// initializers and folding chained assignments on the way.
    pub(crate) fn parameters(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        offset: usize,
        parameter_types: &[Type],
    ) -> Result<Vec<ExprRef>> {
        let mut parameters = Vec::with_capacity(parameter_types.len());
        for ty in parameter_types.iter().rev() {
            let parameter = stack.pop(offset)?;
            let parameter = self.collapse_array(statements, parameter);
            let parameter = super::idioms::fold_multi_assignment(statements, parameter);
            parameters.push(self.check_types(ty, parameter));
        }
        parameters.reverse();
        Ok(parameters)
    }

    pub(crate) fn collapse_array(&self, statements: &mut Statements, value: ExprRef) -> ExprRef {
        if self.options.collapse_array_initializers && matches!(*value, Expression::NewArray { .. }) {
            array_init::collapse(statements, &value)
        } else {
            value
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_invoke(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        instruction: &Instruction,
        index: u16,
    ) -> Result<()> {
        let constants = self.constants;
        let method = constants.member_ref(index)?;
        let owner = self
            .type_maker
            .make_from_descriptor_or_internal_type_name(method.class_name)?;
        let types = self
            .type_maker
            .make_method_types(&owner, method.name, method.descriptor)?;
        let parameters = self.parameters(statements, stack, offset, &types.parameter_types)?;

        if matches!(instruction, Instruction::Invokestatic(_)) {
            let receiver = Rc::new(Expression::ObjectTypeReference {
                line,
                object_type: owner,
                explicit: true,
            });
            let invocation = method_invocation(line, types.return_type.clone(), receiver, &method, parameters);
            if types.is_void() {
                statements.add(Statement::Expression(invocation));
            } else {
                stack.push(invocation);
            }
            return Ok(());
        }

        let receiver = stack.pop(offset)?;
        if let Some(variable) = receiver.as_local_variable() {
            self.locals.type_on_left(variable, &Type::Object(owner.clone()));
        }

        if types.is_void() {
            if matches!(instruction, Instruction::Invokespecial(_)) && method.name == "<init>" {
                self.parse_constructor_call(statements, stack, line, receiver, owner, &method, parameters);
            } else {
                let receiver = self.method_instance_reference(receiver, &owner, method.name, method.descriptor);
                statements.add(Statement::Expression(method_invocation(
                    line,
                    types.return_type.clone(),
                    receiver,
                    &method,
                    parameters,
                )));
            }
            return Ok(());
        }

        if self.options.fold_string_concatenation
            && method.name == "toString"
            && method.descriptor == "()Ljava/lang/String;"
            && (method.class_name == TYPE_STRING_BUILDER.internal_name
                || method.class_name == TYPE_STRING_BUFFER.internal_name)
        {
            stack.push(string_concat::from_builder_chain(
                receiver,
                line,
                method.class_name,
                &self.locals,
            ));
            return Ok(());
        }

        let receiver = self.method_instance_reference(receiver, &owner, method.name, method.descriptor);
        stack.push(method_invocation(line, types.return_type.clone(), receiver, &method, parameters));
        Ok(())
    }

    /// `<init>` on a fresh `new` completes it; on `this` it is `this(...)` or
    /// `super(...)`.
    #[allow(clippy::too_many_arguments)]
    fn parse_constructor_call(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        receiver: ExprRef,
        owner: ObjectType,
        method: &MemberRef<'_>,
        parameters: Vec<ExprRef>,
    ) {
        if let Expression::New { ty, body, .. } = &*receiver {
            let completed = Rc::new(Expression::New {
                line,
                ty: ty.clone(),
                descriptor: Some(method.descriptor.to_string()),
                parameters,
                body: body.clone(),
            });
            log::trace!("completed new {} with {}", ty, method.descriptor);
            stack.replace(&receiver, &completed);
            return;
        }
        let descriptor = method.descriptor.to_string();
        let invocation = if receiver.resolved_type(&self.locals).descriptor() == owner.descriptor {
            Expression::ConstructorInvocation {
                line,
                object_type: owner,
                descriptor,
                parameters,
            }
        } else {
            Expression::SuperConstructorInvocation {
                line,
                object_type: owner,
                descriptor,
                parameters,
            }
        };
        statements.add(Statement::Expression(Rc::new(invocation)));
    }

    /// NEW. Anonymous classes are typed by their interface or super class.
    fn new_object(&self, line: u32, internal_name: &str) -> ExprRef {
        let object_type = self.type_maker.make_from_internal_type_name(internal_name);
        let (object_type, body) = if object_type.is_anonymous() {
            match self.class.inner_type(internal_name) {
                None => (TYPE_OBJECT.clone(), None),
                Some(inner) => {
                    let body = Some(internal_name.to_string());
                    let base = inner.interfaces.first().or(inner.super_name.as_ref());
                    match base {
                        Some(base) => (self.type_maker.make_from_internal_type_name(base), body),
                        None => (TYPE_OBJECT.clone(), body),
                    }
                }
            }
        } else {
            (object_type, None)
        };
        Rc::new(Expression::New {
            line,
            ty: Type::Object(object_type),
            descriptor: None,
            parameters: Vec::new(),
            body,
        })
    }
}

fn method_invocation(
    line: u32,
    ty: Type,
    receiver: ExprRef,
    method: &MemberRef<'_>,
    parameters: Vec<ExprRef>,
) -> ExprRef {
    Rc::new(Expression::MethodInvocation {
        line,
        ty,
        receiver,
        owner: method.class_name.to_string(),
        name: method.name.to_string(),
        descriptor: method.descriptor.to_string(),
        parameters,
    })
}

/// Slot of a short-form load or store: the opcodes come in runs of four.
fn short_form_index(opcode: u8, first: u8) -> u16 {
    ((opcode - first) % 4) as u16
}

/// Operand type of the long, float and double arithmetic opcodes, which
/// cycle int, long, float, double.
fn wide_operand_type(opcode: u8) -> PrimitiveType {
    match (opcode - 0x60) % 4 {
        1 => PrimitiveType::LONG,
        2 => PrimitiveType::FLOAT,
        3 => PrimitiveType::DOUBLE,
        _ => PrimitiveType::INT,
    }
}

/// A popped value survives as a statement unless reading it has no effect.
fn discard(statements: &mut Statements, value: ExprRef) {
    if !matches!(
        *value,
        Expression::LocalVariable { .. } | Expression::FieldReference { .. }
    ) {
        statements.add(Statement::Expression(value));
    }
}

fn push_all<const N: usize>(stack: &mut OperandStack, values: [&ExprRef; N]) {
    for value in values {
        stack.push(Rc::clone(value));
    }
}

fn typed_operation(
    stack: &mut OperandStack,
    line: u32,
    offset: usize,
    ty: PrimitiveType,
    operator: BinaryOperator,
    priority: u8,
) -> Result<()> {
    let right = stack.pop(offset)?;
    let left = stack.pop(offset)?;
    stack.push(binary(line, primitive(ty), left, operator, right, priority));
    Ok(())
}

fn cast(stack: &mut OperandStack, line: u32, offset: usize, ty: PrimitiveType, explicit: bool) -> Result<()> {
    let expression = stack.pop(offset)?;
    stack.push(Rc::new(Expression::Cast {
        line,
        ty: primitive(ty),
        expression,
        explicit,
    }));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::type_maker::DescriptorTypeMaker;
    use crate::method_info::MethodAccessFlags;

    fn run(method: &Method, constants: &ConstantPool) -> (Statements, OperandStack) {
        let type_maker = DescriptorTypeMaker::new();
        let class = ClassDeclaration::new("a/Foo");
        let mut simulator = StackSimulator::new(&type_maker, constants, &class, method).unwrap();
        let mut statements = Statements::new();
        let mut stack = OperandStack::new();
        let block = BasicBlock::new(0, method.code.len());
        simulator
            .simulate_block(&block, &mut statements, &mut stack)
            .unwrap();
        (statements, stack)
    }

    fn static_method(descriptor: &str, code: Vec<u8>) -> Method {
        Method::new(MethodAccessFlags::STATIC, "m", descriptor, code)
    }

    #[test]
    fn test_short_form_index() {
        assert_eq!(short_form_index(0x1d, 0x1a), 3);
        assert_eq!(short_form_index(0x2a, 0x1a), 0);
        assert_eq!(short_form_index(0x4e, 0x3b), 3);
    }

    #[test]
    fn test_wide_operand_type() {
        assert_eq!(wide_operand_type(0x61), PrimitiveType::LONG);
        assert_eq!(wide_operand_type(0x6e), PrimitiveType::FLOAT);
        assert_eq!(wide_operand_type(0x73), PrimitiveType::DOUBLE);
    }

    #[test]
    fn test_iconst_types() {
        let (_, stack) = run(&static_method("()V", vec![0x02, 0x04, 0x08]), &ConstantPool::default());
        let types: Vec<_> = stack
            .iter()
            .map(|e| match &**e {
                Expression::IntegerConstant { ty, .. } => *ty,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            types,
            vec![
                PrimitiveType::MAYBE_NEGATIVE_BYTE,
                PrimitiveType::MAYBE_BOOLEAN,
                PrimitiveType::MAYBE_BYTE
            ]
        );
    }

    #[test]
    fn test_swap() {
        // iconst_1; iconst_2; swap
        let (_, stack) = run(&static_method("()V", vec![0x04, 0x05, 0x5f]), &ConstantPool::default());
        let values: Vec<_> = stack
            .iter()
            .map(|e| match &**e {
                Expression::IntegerConstant { value, .. } => *value,
                _ => -1,
            })
            .collect();
        assert_eq!(values, vec![2, 1]);
    }

    #[test]
    fn test_named_double_constant() {
        let mut constants = ConstantPool::default();
        let pi = constants.get_or_add_double(std::f64::consts::PI);
        let code = vec![0x14, (pi >> 8) as u8, pi as u8];
        let (_, stack) = run(&static_method("()V", code), &constants);
        assert!(matches!(
            &**stack.peek().unwrap(),
            Expression::FieldReference { owner, name, .. } if owner == "java/lang/Math" && name == "PI"
        ));
    }

    #[test]
    fn test_first_line() {
        let receiver = Rc::new(Expression::LocalVariable { line: 3, variable: 0 });
        let field = Expression::FieldReference {
            line: 5,
            ty: primitive(PrimitiveType::INT),
            receiver,
            owner: "a/Foo".to_string(),
            name: "x".to_string(),
            descriptor: "I".to_string(),
        };
        assert_eq!(first_line(&field), 3);
    }
}
