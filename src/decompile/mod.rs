//! Bytecode to statement-tree reconstruction.
//!
//! [`StackSimulator`] replays the instructions of one basic block against an
//! [`OperandStack`], emitting [`Statement`]s into a [`Statements`] sink and
//! folding compiler idioms back into source forms on the way. The
//! [`scanner`] functions answer the questions control-flow construction asks
//! about a block without simulating it.

pub mod array_init;
pub mod cfg_types;
pub mod declaration;
pub mod descriptor;
pub mod expr;
pub mod idioms;
pub mod invoke_dynamic;
pub mod local_variable;
pub mod operators;
pub mod primitive;
pub mod scanner;
pub mod stack;
pub mod stack_sim;
pub mod string_concat;
pub mod type_maker;
pub mod types;
pub mod util;

pub use self::cfg_types::BasicBlock;
pub use self::declaration::{ClassDeclaration, FieldDeclaration, InnerTypeDeclaration, MethodDeclaration};
pub use self::expr::{BinaryOperator, ExprRef, Expression, LambdaBody, Statement, UnaryOperator};
pub use self::local_variable::{LocalVariable, LocalVariables, VariableId, VariableKind};
pub use self::stack::{OperandStack, Statements};
pub use self::stack_sim::{SimulatorOptions, StackSimulator};
pub use self::type_maker::{DescriptorTypeMaker, TypeMaker};
pub use self::types::{GenericType, ObjectType, PrimitiveFlags, PrimitiveType, Type};
