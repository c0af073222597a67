//! Reconstructs a typed expression and statement tree from JVM method bytecode.
//!
//! The entry point is [`decompile::StackSimulator`], which interprets one basic
//! block at a time against a [`constant_info::ConstantPool`], a
//! [`method_info::Method`] and the enclosing [`decompile::ClassDeclaration`].
//! The scanners in [`decompile::scanner`] share its instruction decoder.

#[macro_use]
extern crate bitflags;

pub mod attribute_info;
pub mod code_attribute;
pub mod constant_info;
pub mod decompile;
pub mod error;
pub mod method_info;

pub use error::{ConstantPoolError, DecompileError, DescriptorError, Result};
