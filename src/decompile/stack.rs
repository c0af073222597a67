//! The operand stack and the per-block statement sink.

use std::rc::Rc;

use crate::error::{DecompileError, Result};

use super::expr::{ExprRef, Statement};

#[derive(Clone, Debug, Default)]
pub struct OperandStack {
    values: Vec<ExprRef>,
}

impl OperandStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: ExprRef) {
        self.values.push(value);
    }

    /// `offset` is only used to report underflow.
    pub fn pop(&mut self, offset: usize) -> Result<ExprRef> {
        self.values.pop().ok_or_else(|| {
            log::debug!("operand stack underflow at offset {}", offset);
            DecompileError::StackUnderflow { offset }
        })
    }

    pub fn peek(&self) -> Option<&ExprRef> {
        self.values.last()
    }

    /// True when `value` is the very node on top.
    pub fn is_top(&self, value: &ExprRef) -> bool {
        self.peek().is_some_and(|top| Rc::ptr_eq(top, value))
    }

    /// Replaces every occurrence of the node `old` with `new`.
    pub fn replace(&mut self, old: &ExprRef, new: &ExprRef) {
        for value in self.values.iter_mut() {
            if Rc::ptr_eq(value, old) {
                *value = Rc::clone(new);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Bottom to top.
    pub fn iter(&self) -> impl Iterator<Item = &ExprRef> {
        self.values.iter()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

/// Statements emitted by one block. Only the tail may be inspected or removed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statements {
    statements: Vec<Statement>,
}

impl Statements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn last(&self) -> Option<&Statement> {
        self.statements.last()
    }

    pub fn remove_last(&mut self) -> Option<Statement> {
        self.statements.pop()
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter()
    }

    pub fn into_vec(self) -> Vec<Statement> {
        self.statements
    }
}

impl From<Statements> for Vec<Statement> {
    fn from(statements: Statements) -> Self {
        statements.statements
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::expr::Expression;

    fn constant(value: i64) -> ExprRef {
        Rc::new(Expression::LongConstant { line: 0, value })
    }

    #[test]
    fn test_pop_underflow() {
        let mut stack = OperandStack::new();
        assert!(matches!(stack.pop(7), Err(DecompileError::StackUnderflow { offset: 7 })));
    }

    #[test]
    fn test_replace_by_identity() {
        let mut stack = OperandStack::new();
        let a = constant(1);
        let twin = constant(1);
        stack.push(Rc::clone(&a));
        stack.push(Rc::clone(&twin));
        stack.push(Rc::clone(&a));
        let b = constant(2);
        stack.replace(&a, &b);
        let values: Vec<_> = stack.iter().cloned().collect();
        assert!(Rc::ptr_eq(&values[0], &b));
        assert!(Rc::ptr_eq(&values[1], &twin));
        assert!(stack.is_top(&b));
    }

    #[test]
    fn test_statements_tail() {
        let mut statements = Statements::new();
        statements.add(Statement::Return);
        statements.add(Statement::Throw(constant(3)));
        assert!(matches!(statements.last(), Some(Statement::Throw(_))));
        assert!(matches!(statements.remove_last(), Some(Statement::Throw(_))));
        assert_eq!(statements.into_vec(), vec![Statement::Return]);
    }
}
