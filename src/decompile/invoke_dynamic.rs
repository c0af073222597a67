//! INVOKEDYNAMIC call sites: string concatenation, lambdas and method
//! references.

use std::rc::Rc;

use crate::error::{ConstantPoolError, DecompileError, Result};

use super::declaration::MethodDeclaration;
use super::descriptor::count_method_parameters;
use super::expr::{ExprRef, Expression, LambdaBody, Statement};
use super::stack::{OperandStack, Statements};
use super::stack_sim::StackSimulator;
use super::string_concat;

/// `x.getClass()` emitted by javac as a null check before a bound method
/// reference.
fn is_null_check(statement: &Statement) -> bool {
    matches!(
        statement.as_expression().map(|e| &**e),
        Some(Expression::MethodInvocation { owner, name, descriptor, .. })
            if owner == "java/lang/Object" && name == "getClass" && descriptor == "()Ljava/lang/Class;"
    )
}

/// The last `count` parameter names; the leading ones are captured values.
fn lambda_parameter_names(method: &MethodDeclaration, count: usize) -> Option<Vec<String>> {
    let names = &method.parameter_names;
    if names.is_empty() || count == 0 {
        return None;
    }
    Some(names[names.len().saturating_sub(count)..].to_vec())
}

fn lambda_body(method: &MethodDeclaration) -> LambdaBody {
    match method.statements.as_slice() {
        [Statement::ReturnExpression { expression, .. }] | [Statement::Expression(expression)] => {
            LambdaBody::Expression(Rc::clone(expression))
        }
        statements => LambdaBody::Statements(statements.to_vec()),
    }
}

impl StackSimulator<'_> {
    pub(crate) fn parse_invoke_dynamic(
        &mut self,
        statements: &mut Statements,
        stack: &mut OperandStack,
        line: u32,
        offset: usize,
        index: u16,
    ) -> Result<()> {
        if statements.last().is_some_and(is_null_check) {
            statements.remove_last();
        }

        let constants = self.constants;
        let class = self.class;
        let call_site = constants.invoke_dynamic(index)?;
        let types = self
            .type_maker
            .make_method_types_from_descriptor(call_site.descriptor)?;
        let arguments = self.parameters(statements, stack, offset, &types.parameter_types)?;

        let bootstrap_index = call_site.bootstrap_method_attr_index;
        let bootstrap = class
            .bootstrap_method(bootstrap_index)
            .ok_or(DecompileError::MissingBootstrapMethod {
                index: bootstrap_index,
            })?;
        let bootstrap_argument = |position: usize| {
            bootstrap
                .bootstrap_arguments
                .get(position)
                .copied()
                .ok_or(ConstantPoolError::BadIndex(0))
        };

        match call_site.name {
            "makeConcatWithConstants" => {
                let recipe = constants.string(bootstrap_argument(0)?)?;
                log::trace!("line {}: concatenation recipe {:?}", line, recipe);
                stack.push(string_concat::from_recipe(line, recipe, &arguments, &self.locals));
                return Ok(());
            }
            "makeConcat" => {
                stack.push(string_concat::from_arguments(line, &arguments, &self.locals));
                return Ok(());
            }
            _ => {}
        }

        let parameter_count = count_method_parameters(constants.method_type(bootstrap_argument(0)?)?);
        let handle = constants.method_handle(bootstrap_argument(1)?)?;

        if self.options.inline_lambdas && handle.class_name == class.internal_type_name {
            if let Some(synthetic) = class.synthetic_method(handle.name, handle.descriptor) {
                log::trace!("line {}: lambda from {}{}", line, handle.name, handle.descriptor);
                stack.push(Rc::new(Expression::Lambda {
                    line,
                    ty: types.return_type,
                    parameter_names: lambda_parameter_names(synthetic, parameter_count),
                    body: lambda_body(synthetic),
                }));
                return Ok(());
            }
        }

        let target_owner = handle.class_name.to_string();
        let reference: ExprRef = match arguments.as_slice() {
            [] => {
                let object_type = self.type_maker.make_from_internal_type_name(handle.class_name);
                if handle.name == "<init>" {
                    Rc::new(Expression::ConstructorReference {
                        line,
                        ty: types.return_type,
                        object_type,
                        descriptor: handle.descriptor.to_string(),
                    })
                } else {
                    Rc::new(Expression::MethodReference {
                        line,
                        ty: types.return_type,
                        expression: Rc::new(Expression::ObjectTypeReference {
                            line,
                            object_type,
                            explicit: true,
                        }),
                        owner: target_owner,
                        name: handle.name.to_string(),
                        descriptor: handle.descriptor.to_string(),
                    })
                }
            }
            [bound] => Rc::new(Expression::MethodReference {
                line,
                ty: types.return_type,
                expression: Rc::clone(bound),
                owner: target_owner,
                name: handle.name.to_string(),
                descriptor: handle.descriptor.to_string(),
            }),
            captured => {
                return Err(DecompileError::UnexpectedCapture {
                    count: captured.len(),
                })
            }
        };
        stack.push(reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method_info::MethodAccessFlags;

    fn synthetic(names: &[&str], statements: Vec<Statement>) -> MethodDeclaration {
        MethodDeclaration::new(
            MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
            "lambda$run$0",
            "(II)I",
        )
        .with_parameter_names(names)
        .with_statements(statements)
    }

    #[test]
    fn test_lambda_parameter_names() {
        let method = synthetic(&["captured", "x"], Vec::new());
        assert_eq!(lambda_parameter_names(&method, 1), Some(vec!["x".to_string()]));
        assert_eq!(lambda_parameter_names(&method, 0), None);
        assert_eq!(lambda_parameter_names(&synthetic(&[], Vec::new()), 2), None);
    }

    #[test]
    fn test_single_statement_body_unwraps() {
        let value = Rc::new(Expression::StringConstant {
            line: 3,
            value: "x".to_string(),
        });
        let method = synthetic(
            &["x"],
            vec![Statement::ReturnExpression {
                line: 3,
                expression: Rc::clone(&value),
            }],
        );
        assert!(matches!(lambda_body(&method), LambdaBody::Expression(e) if Rc::ptr_eq(&e, &value)));

        let method = synthetic(&["x"], vec![Statement::Return, Statement::Return]);
        assert!(matches!(lambda_body(&method), LambdaBody::Statements(s) if s.len() == 2));
    }
}
