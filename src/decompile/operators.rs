//! Operator expression builders that also feed local variable type
//! constraints.
//!
//! Integer arithmetic, bitwise operators and comparisons each constrain their
//! variable operands differently: arithmetic rules out `boolean`, while the
//! bitwise and equality forms may unify two variables as booleans.

use std::rc::Rc;

use super::expr::{BinaryOperator, ExprRef, Expression, UnaryOperator};
use super::stack_sim::StackSimulator;
use super::types::{PrimitiveType, Type};

pub fn binary(
    line: u32,
    ty: Type,
    left: ExprRef,
    operator: BinaryOperator,
    right: ExprRef,
    priority: u8,
) -> ExprRef {
    Rc::new(Expression::BinaryOperator {
        line,
        ty,
        left,
        operator,
        right,
        priority,
    })
}

fn boolean() -> Type {
    Type::Primitive(PrimitiveType::BOOLEAN)
}

impl StackSimulator<'_> {
    fn narrow_to_integer(&mut self, operands: [&ExprRef; 2]) {
        let maybe_byte = Type::Primitive(PrimitiveType::MAYBE_BYTE);
        for operand in operands {
            if let Some(variable) = operand.as_local_variable() {
                self.locals.type_on_left(variable, &maybe_byte);
            }
        }
    }

    /// `+ - * / % << >>>` on ints.
    pub(crate) fn new_integer_binary(
        &mut self,
        line: u32,
        left: ExprRef,
        operator: BinaryOperator,
        right: ExprRef,
        priority: u8,
    ) -> ExprRef {
        self.narrow_to_integer([&left, &right]);
        binary(line, Type::Primitive(PrimitiveType::INT), left, operator, right, priority)
    }

    /// `< >= > <=` on ints.
    pub(crate) fn new_integer_comparison(
        &mut self,
        line: u32,
        left: ExprRef,
        operator: BinaryOperator,
        right: ExprRef,
        priority: u8,
    ) -> ExprRef {
        self.narrow_to_integer([&left, &right]);
        binary(line, boolean(), left, operator, right, priority)
    }

    /// Links variable operands that may be booleans. Returns true when the
    /// operation is known to be boolean.
    fn unify_boolean_operands(&mut self, left: &ExprRef, right: &ExprRef) -> bool {
        let boolean = boolean();
        match (left.as_local_variable(), right.as_local_variable()) {
            (Some(l), Some(r)) => {
                if !self.locals.is_assignable_from(l, &boolean)
                    && !self.locals.is_assignable_from(r, &boolean)
                {
                    return false;
                }
                self.locals.variable_on_right(l, r);
                self.locals.variable_on_left(r, l);
                self.locals.variable_type(l) == boolean || self.locals.variable_type(r) == boolean
            }
            (Some(l), None) => {
                if right.resolved_type(&self.locals) != boolean {
                    return false;
                }
                self.locals.type_on_right(l, &boolean);
                true
            }
            (None, Some(r)) => {
                if left.resolved_type(&self.locals) != boolean {
                    return false;
                }
                self.locals.type_on_right(r, &boolean);
                true
            }
            (None, None) => false,
        }
    }

    /// `& ^ |`, typed boolean when an operand is.
    pub(crate) fn new_integer_or_boolean_binary(
        &mut self,
        line: u32,
        left: ExprRef,
        operator: BinaryOperator,
        right: ExprRef,
        priority: u8,
    ) -> ExprRef {
        let ty = if self.unify_boolean_operands(&left, &right) {
            boolean()
        } else {
            Type::Primitive(PrimitiveType::INT)
        };
        binary(line, ty, left, operator, right, priority)
    }

    /// `==` and `!=` on ints, booleans or references.
    pub(crate) fn new_integer_or_boolean_comparison(
        &mut self,
        line: u32,
        left: ExprRef,
        operator: BinaryOperator,
        right: ExprRef,
        priority: u8,
    ) -> ExprRef {
        self.unify_boolean_operands(&left, &right);
        binary(line, boolean(), left, operator, right, priority)
    }

    /// A variable stepped by `++`, `--` or negated cannot be a boolean.
    fn reduce_integer_local(&mut self, expression: &ExprRef) {
        if let Some(variable) = expression.as_local_variable() {
            if self.locals.variable_type(variable).is_primitive()
                && self
                    .locals
                    .is_assignable_from(variable, &Type::Primitive(PrimitiveType::MAYBE_BOOLEAN))
            {
                self.locals
                    .type_on_right(variable, &Type::Primitive(PrimitiveType::MAYBE_BYTE));
            }
        }
    }

    pub(crate) fn new_pre_arithmetic(
        &mut self,
        line: u32,
        operator: UnaryOperator,
        expression: ExprRef,
    ) -> ExprRef {
        self.reduce_integer_local(&expression);
        Rc::new(Expression::PreOperator {
            line,
            operator,
            expression,
        })
    }

    pub(crate) fn new_post_arithmetic(
        &mut self,
        line: u32,
        expression: ExprRef,
        operator: UnaryOperator,
    ) -> ExprRef {
        self.reduce_integer_local(&expression);
        Rc::new(Expression::PostOperator {
            line,
            operator,
            expression,
        })
    }
}
