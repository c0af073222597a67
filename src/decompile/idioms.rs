//! Store, load and return idioms: compound assignment, `++`/`--`, chained
//! assignment and synthetic-variable elimination.

use std::rc::Rc;

use crate::error::{DecompileError, Result};

use super::expr::{BinaryOperator, ExprRef, Expression, Statement, UnaryOperator};
use super::local_variable::VariableId;
use super::operators::binary;
use super::stack::{OperandStack, Statements};
use super::stack_sim::StackSimulator;
use super::types::{ObjectType, PrimitiveType, Type, TYPE_CLASS, TYPE_OBJECT};

/// The right-hand side at the end of a chain of `=`. A chain ending in another
/// operator yields that operator node.
pub(crate) fn last_right_expression(expression: &ExprRef) -> &ExprRef {
    let mut current = expression;
    loop {
        match &**current {
            Expression::BinaryOperator {
                operator: BinaryOperator::Assign,
                right,
                ..
            } => {
                if !matches!(**right, Expression::BinaryOperator { .. }) {
                    return right;
                }
                current = right;
            }
            _ => return current,
        }
    }
}

/// A call argument that is the value of the trailing assignment statement
/// becomes that whole assignment: `a = b = 0; f(0)` reads `f(a = b = 0)`.
pub(crate) fn fold_multi_assignment(statements: &mut Statements, parameter: ExprRef) -> ExprRef {
    let folded = match statements.last().and_then(Statement::as_expression) {
        Some(last)
            if matches!(**last, Expression::BinaryOperator { .. })
                && Rc::ptr_eq(last_right_expression(last), &parameter) =>
        {
            Rc::clone(last)
        }
        _ => return parameter,
    };
    statements.remove_last();
    log::trace!("argument folded into chained assignment");
    folded
}

fn local_variable(line: u32, variable: VariableId) -> ExprRef {
    Rc::new(Expression::LocalVariable { line, variable })
}

impl StackSimulator<'_> {
    /// Same binding, or same field name on receivers of the same type.
    pub(crate) fn same_location(&self, a: &Expression, b: &Expression) -> bool {
        match (a, b) {
            (
                Expression::LocalVariable { variable: x, .. },
                Expression::LocalVariable { variable: y, .. },
            ) => x == y,
            (
                Expression::FieldReference {
                    name: n1,
                    receiver: r1,
                    ..
                },
                Expression::FieldReference {
                    name: n2,
                    receiver: r2,
                    ..
                },
            ) => n1 == n2 && r1.resolved_type(&self.locals) == r2.resolved_type(&self.locals),
            _ => false,
        }
    }

    fn type_of(&self, expression: &ExprRef) -> Type {
        expression.resolved_type(&self.locals)
    }

    /// ILOAD. A same-line `++i` statement on the loaded binding turns into
    /// the `++i` value.
    pub(crate) fn parse_iload(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        index: u16,
        offset: usize,
    ) {
        let variable = self
            .locals
            .get_or_create(index, offset, &Type::Primitive(PrimitiveType::INT));
        let pre_increment = match statements.last().and_then(Statement::as_expression) {
            Some(last) => match &**last {
                Expression::PreOperator {
                    line: l,
                    expression,
                    ..
                } if *l == line && expression.as_local_variable() == Some(variable) => {
                    Some(Rc::clone(last))
                }
                _ => None,
            },
            None => None,
        };
        match pre_increment {
            Some(pre) => {
                statements.remove_last();
                log::trace!("line {}: iinc then iload read as pre-increment", line);
                stack.push(pre);
            }
            None => stack.push(local_variable(line, variable)),
        }
    }

    /// Rewrites `x = x OP y` stored back into `x`. Returns false when `value`
    /// is not such an update.
    #[allow(clippy::too_many_arguments)]
    fn fold_self_update(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        offset: usize,
        line: u32,
        location: &ExprRef,
        value: &ExprRef,
    ) -> Result<bool> {
        let Expression::BinaryOperator {
            line: value_line,
            ty,
            left,
            operator,
            right,
            ..
        } = &**value
        else {
            return Ok(false);
        };
        if *value_line != line || !self.same_location(left, location) {
            return Ok(false);
        }

        let folded = match operator {
            BinaryOperator::Assign => Rc::clone(value),
            BinaryOperator::Add | BinaryOperator::Sub
                if right.is_positive_one() || right.is_negative_one() =>
            {
                let increment = (*operator == BinaryOperator::Add) == right.is_positive_one();
                let unary = if increment {
                    UnaryOperator::Increment
                } else {
                    UnaryOperator::Decrement
                };
                let loaded_before = stack
                    .peek()
                    .is_some_and(|top| self.same_location(top, location));
                if loaded_before {
                    stack.pop(offset)?;
                    stack.push(Rc::clone(value));
                    self.new_post_arithmetic(*value_line, Rc::clone(left), unary)
                } else {
                    self.new_pre_arithmetic(*value_line, unary, Rc::clone(left))
                }
            }
            other => match other.compound() {
                Some(compound) => binary(
                    *value_line,
                    ty.clone(),
                    Rc::clone(left),
                    compound,
                    Rc::clone(right),
                    16,
                ),
                None => {
                    return Err(DecompileError::UnexpectedOperator {
                        operator: other.as_str().to_string(),
                    })
                }
            },
        };
        log::trace!("line {}: self update folded", line);

        if stack.is_top(value) {
            stack.replace(value, &folded);
        } else {
            statements.add(Statement::Expression(folded));
        }
        Ok(true)
    }

    /// ISTORE, LSTORE, FSTORE and DSTORE.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn parse_store(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        variable: VariableId,
        value: ExprRef,
    ) -> Result<()> {
        let location = local_variable(line, variable);
        if self.fold_self_update(statements, stack, offset, line, &location, &value)? {
            return Ok(());
        }
        self.create_assignment(statements, stack, line, location, value);
        Ok(())
    }

    /// ASTORE: collapses array initializers and type-checks before assigning.
    pub(crate) fn parse_astore(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        variable: VariableId,
        value: ExprRef,
    ) -> Result<()> {
        let location = local_variable(line, variable);
        let collapsed = self.collapse_array(statements, Rc::clone(&value));
        let variable_type = self.locals.variable_type(variable);
        let checked = self.check_types(&variable_type, collapsed);
        if !Rc::ptr_eq(&checked, &value) {
            stack.replace(&value, &checked);
        }
        self.create_assignment(statements, stack, line, location, checked);
        Ok(())
    }

    /// PUTFIELD and PUTSTATIC.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn parse_put(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        field: ExprRef,
        value: ExprRef,
    ) -> Result<()> {
        let value = self.collapse_array(statements, value);
        if self.fold_self_update(statements, stack, offset, line, &field, &value)? {
            return Ok(());
        }
        self.create_assignment(statements, stack, line, field, value);
        Ok(())
    }

    /// Emits or pushes `left = right`, absorbing the trailing statement when it
    /// is part of the same source expression.
    pub(crate) fn create_assignment(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        left: ExprRef,
        right: ExprRef,
    ) {
        let left_type = self.type_of(&left);

        // The value is still needed: this is an inner assignment.
        if stack.is_top(&right) {
            if let Ok(value) = stack.pop(0) {
                stack.push(binary(line, left_type, left, BinaryOperator::Assign, value, 16));
            }
            return;
        }

        let mut right = self.check_types(&left_type, right);

        if let Some(last) = statements.last().and_then(Statement::as_expression).cloned() {
            match &*last {
                Expression::BinaryOperator {
                    line: last_line,
                    left: last_left,
                    ..
                } => {
                    let chained = Rc::ptr_eq(last_right_expression(&last), &right)
                        || (line > 0 && *last_line == line && self.same_location(last_left, &right));
                    if chained {
                        statements.remove_last();
                        log::trace!("line {}: chained assignment", line);
                        statements.add(Statement::Expression(binary(
                            line,
                            left_type,
                            left,
                            BinaryOperator::Assign,
                            Rc::clone(&last),
                            16,
                        )));
                        return;
                    }
                }
                Expression::PreOperator {
                    line: pre_line,
                    operator,
                    expression,
                } if self.same_location(expression, &right) => {
                    right = self.new_pre_arithmetic(*pre_line, *operator, Rc::clone(expression));
                    statements.remove_last();
                }
                Expression::PostOperator { expression, .. } if Rc::ptr_eq(expression, &right) => {
                    right = Rc::clone(&last);
                    statements.remove_last();
                }
                _ => {}
            }
        }

        statements.add(Statement::Expression(binary(
            line,
            left_type,
            left,
            BinaryOperator::Assign,
            right,
            16,
        )));
    }

    /// IINC and its wide form.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn parse_iinc(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        variable: VariableId,
        count: i32,
    ) -> Result<()> {
        let loaded = stack.peek().is_some_and(|top| {
            top.line() == line && top.as_local_variable() == Some(variable)
        });
        if loaded {
            let operator = match count {
                1 => UnaryOperator::Increment,
                -1 => UnaryOperator::Decrement,
                delta => return Err(DecompileError::UnexpectedIncrement { offset, delta }),
            };
            let loaded = stack.pop(offset)?;
            let post = self.new_post_arithmetic(line, loaded, operator);
            stack.push(post);
            return Ok(());
        }

        let location = local_variable(line, variable);
        let expression = match count {
            1 => self.new_pre_arithmetic(line, UnaryOperator::Increment, location),
            -1 => self.new_pre_arithmetic(line, UnaryOperator::Decrement, location),
            _ => {
                let ty = self.type_of(&location);
                let constant_type = ty.as_primitive().copied().unwrap_or(PrimitiveType::INT);
                let (operator, step) = if count >= 0 {
                    (BinaryOperator::AddAssign, count)
                } else {
                    (BinaryOperator::SubAssign, -count)
                };
                let constant = Rc::new(Expression::IntegerConstant {
                    line,
                    ty: constant_type,
                    value: step,
                });
                binary(line, ty, location, operator, constant, 16)
            }
        };
        statements.add(Statement::Expression(expression));
        Ok(())
    }

    /// IRETURN, LRETURN, FRETURN, DRETURN and ARETURN. `t = rhs; return t;`
    /// becomes `return rhs;` and the binding of `t` is removed.
    pub(crate) fn parse_xreturn(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
    ) -> Result<()> {
        let value = stack.pop(offset)?;
        let value = self.collapse_array(statements, value);
        let line = line.min(value.line());
        let return_type = self.return_type.clone();

        if let Some(variable) = value.as_local_variable() {
            let synthetic = match statements.last().and_then(Statement::as_expression) {
                Some(last) => match &**last {
                    Expression::BinaryOperator {
                        line: last_line,
                        operator: BinaryOperator::Assign,
                        left,
                        right,
                        ..
                    } if line <= *last_line && left.as_local_variable() == Some(variable) => {
                        Some(Rc::clone(right))
                    }
                    _ => None,
                },
                None => None,
            };
            if let Some(assigned) = synthetic {
                statements.remove_last();
                self.locals.remove(variable);
                log::trace!("line {}: synthetic return variable removed", line);
                let expression = self.check_types(&return_type, assigned);
                statements.add(Statement::ReturnExpression { line, expression });
                return Ok(());
            }
        }

        let expression = self.check_types(&return_type, value);
        statements.add(Statement::ReturnExpression { line, expression });
        Ok(())
    }

    /// Feeds variable constraints and adds the casts an assignment of `expression`
    /// to `ty` needs: erasing casts for parameterized values, casts to type
    /// variables.
    pub(crate) fn check_types(&mut self, ty: &Type, expression: ExprRef) -> ExprRef {
        if let Some(variable) = expression.as_local_variable() {
            self.locals.type_on_left(variable, ty);
        }
        if matches!(*expression, Expression::Null { .. }) {
            return expression;
        }
        let expression_type = self.type_of(&expression);
        if expression_type == *ty || *ty == Type::Object(TYPE_OBJECT.clone()) {
            return expression;
        }
        match (ty, &expression_type) {
            (Type::Object(target), Type::Object(source)) => {
                let related = target.internal_name == source.internal_name
                    || self.type_maker.is_assignable(target, source);
                if related
                    && target.internal_name != TYPE_CLASS.internal_name
                    && !source.type_arguments.is_empty()
                {
                    let raw = target.clone().with_type_arguments(Vec::new());
                    return cast_to(Type::Object(raw), expression);
                }
                expression
            }
            (Type::Generic(_), _) => cast_to(ty.clone(), expression),
            _ => expression,
        }
    }

    /// `this` becomes `super` when the class redeclares a field inherited from
    /// `owner`.
    pub(crate) fn field_instance_reference(
        &self,
        expression: ExprRef,
        owner: &ObjectType,
        name: &str,
    ) -> ExprRef {
        match &*expression {
            Expression::This { line, ty }
                if is_other_class(ty, owner) && self.class.has_field(name) =>
            {
                Rc::new(Expression::Super {
                    line: *line,
                    ty: ty.clone(),
                })
            }
            _ => expression,
        }
    }

    pub(crate) fn method_instance_reference(
        &self,
        expression: ExprRef,
        owner: &ObjectType,
        name: &str,
        descriptor: &str,
    ) -> ExprRef {
        match &*expression {
            Expression::This { line, ty }
                if is_other_class(ty, owner) && self.class.has_method(name, descriptor) =>
            {
                Rc::new(Expression::Super {
                    line: *line,
                    ty: ty.clone(),
                })
            }
            _ => expression,
        }
    }
}

fn is_other_class(this_type: &Type, owner: &ObjectType) -> bool {
    this_type
        .as_object()
        .is_some_and(|this| this.internal_name != owner.internal_name)
}

/// Retargets an existing cast instead of nesting a second one.
fn cast_to(ty: Type, expression: ExprRef) -> ExprRef {
    match &*expression {
        Expression::Cast {
            line,
            expression: inner,
            explicit,
            ..
        } => Rc::new(Expression::Cast {
            line: *line,
            ty,
            expression: Rc::clone(inner),
            explicit: *explicit,
        }),
        _ => Rc::new(Expression::Cast {
            line: expression.line(),
            ty,
            expression: Rc::clone(&expression),
            explicit: true,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant_info::ConstantPool;
    use crate::decompile::declaration::{ClassDeclaration, MethodDeclaration};
    use crate::decompile::type_maker::DescriptorTypeMaker;
    use crate::method_info::{Method, MethodAccessFlags};

    fn int_constant(value: i32) -> ExprRef {
        Rc::new(Expression::IntegerConstant {
            line: 1,
            ty: PrimitiveType::INT,
            value,
        })
    }

    #[test]
    fn test_last_right_expression() {
        let value = int_constant(0);
        let inner = binary(
            1,
            Type::Primitive(PrimitiveType::INT),
            local_variable(1, 0),
            BinaryOperator::Assign,
            Rc::clone(&value),
            16,
        );
        let outer = binary(
            1,
            Type::Primitive(PrimitiveType::INT),
            local_variable(1, 1),
            BinaryOperator::Assign,
            Rc::clone(&inner),
            16,
        );
        assert!(Rc::ptr_eq(last_right_expression(&outer), &value));

        let sum = binary(
            1,
            Type::Primitive(PrimitiveType::INT),
            int_constant(1),
            BinaryOperator::Add,
            int_constant(2),
            6,
        );
        assert!(Rc::ptr_eq(last_right_expression(&sum), &sum));
    }

    #[test]
    fn test_fold_multi_assignment() {
        let value = int_constant(7);
        let assignment = binary(
            1,
            Type::Primitive(PrimitiveType::INT),
            local_variable(1, 0),
            BinaryOperator::Assign,
            Rc::clone(&value),
            16,
        );
        let mut statements = Statements::new();
        statements.add(Statement::Expression(Rc::clone(&assignment)));

        let unrelated = fold_multi_assignment(&mut statements, int_constant(7));
        assert!(matches!(*unrelated, Expression::IntegerConstant { .. }));
        assert_eq!(statements.len(), 1);

        let folded = fold_multi_assignment(&mut statements, value);
        assert!(Rc::ptr_eq(&folded, &assignment));
        assert!(statements.is_empty());
    }

    #[test]
    fn test_cast_to_retargets() {
        let inner = local_variable(2, 0);
        let cast = Rc::new(Expression::Cast {
            line: 2,
            ty: Type::Object(TYPE_OBJECT.clone()),
            expression: Rc::clone(&inner),
            explicit: true,
        });
        let target = Type::Object(ObjectType::from_internal_name("java/util/List"));
        let retargeted = cast_to(target.clone(), cast);
        match &*retargeted {
            Expression::Cast { ty, expression, .. } => {
                assert_eq!(*ty, target);
                assert!(Rc::ptr_eq(expression, &inner));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_super_receiver() {
        let type_maker = DescriptorTypeMaker::new();
        let constants = ConstantPool::default();
        let class = ClassDeclaration::new("a/Sub")
            .with_field("size", "I")
            .with_method(MethodDeclaration::new(MethodAccessFlags::PUBLIC, "run", "()V"));
        let method = Method::new(MethodAccessFlags::PUBLIC, "m", "()V", vec![]);
        let simulator = StackSimulator::new(&type_maker, &constants, &class, &method).unwrap();
        let this = Rc::new(Expression::This {
            line: 1,
            ty: Type::Object(ObjectType::from_internal_name("a/Sub")),
        });
        let base = ObjectType::from_internal_name("a/Base");

        let field = simulator.field_instance_reference(Rc::clone(&this), &base, "size");
        assert!(matches!(*field, Expression::Super { .. }));
        let own = simulator.field_instance_reference(Rc::clone(&this), &base, "other");
        assert!(Rc::ptr_eq(&own, &this));
        let call = simulator.method_instance_reference(Rc::clone(&this), &base, "run", "()V");
        assert!(matches!(*call, Expression::Super { .. }));
    }

    #[test]
    fn test_check_types_erases_parameterized_value() {
        let type_maker = DescriptorTypeMaker::new();
        let constants = ConstantPool::default();
        let class = ClassDeclaration::new("a/Foo");
        let method = Method::new(MethodAccessFlags::STATIC, "m", "()V", vec![]);
        let mut simulator = StackSimulator::new(&type_maker, &constants, &class, &method).unwrap();

        let list = ObjectType::from_internal_name("java/util/List");
        let parameterized = list
            .clone()
            .with_type_arguments(vec![Type::Object(ObjectType::from_internal_name("java/lang/String"))]);
        let value = Rc::new(Expression::MethodInvocation {
            line: 4,
            ty: Type::Object(parameterized),
            receiver: local_variable(4, 0),
            owner: "a/Foo".to_string(),
            name: "names".to_string(),
            descriptor: "()Ljava/util/List;".to_string(),
            parameters: Vec::new(),
        });
        let checked = simulator.check_types(&Type::Object(list.clone()), Rc::clone(&value));
        match &*checked {
            Expression::Cast { ty, line, .. } => {
                assert_eq!(*ty, Type::Object(list));
                assert_eq!(*line, 4);
            }
            other => panic!("unexpected {:?}", other),
        }

        let unchanged = simulator.check_types(&Type::Object(TYPE_OBJECT.clone()), Rc::clone(&value));
        assert!(Rc::ptr_eq(&unchanged, &value));
    }
}
