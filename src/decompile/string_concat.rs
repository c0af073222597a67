//! String concatenation rebuilt from `StringBuilder`/`StringBuffer` append
//! chains and from the `StringConcatFactory` bootstrap methods.

use std::rc::Rc;

use super::expr::{BinaryOperator, ExprRef, Expression};
use super::local_variable::LocalVariables;
use super::operators::binary;
use super::types::{Type, TYPE_STRING, TYPE_STRING_BUFFER, TYPE_STRING_BUILDER};

/// Placeholder for an argument in a `makeConcatWithConstants` recipe.
const ARGUMENT_TAG: char = '\u{1}';

fn string_type() -> Type {
    Type::Object(TYPE_STRING.clone())
}

fn is_string(expression: &Expression, locals: &LocalVariables) -> bool {
    expression.resolved_type(locals) == string_type()
}

fn string_constant(line: u32, value: impl Into<String>) -> ExprRef {
    Rc::new(Expression::StringConstant {
        line,
        value: value.into(),
    })
}

/// `left + right`. The first operand of a concatenation must be a string, so
/// anything else is prefixed with `""`.
fn append(line: u32, left: Option<ExprRef>, right: ExprRef, locals: &LocalVariables) -> ExprRef {
    match left {
        Some(left) => binary(line, string_type(), left, BinaryOperator::Add, right, 4),
        None if is_string(&right, locals) => right,
        None => binary(
            line,
            string_type(),
            string_constant(line, ""),
            BinaryOperator::Add,
            right,
            4,
        ),
    }
}

fn single_append_argument(expression: &Expression) -> Option<(&ExprRef, &ExprRef, u32)> {
    match expression {
        Expression::MethodInvocation {
            line,
            receiver,
            name,
            parameters,
            ..
        } if name == "append" && parameters.len() == 1 => Some((&parameters[0], receiver, *line)),
        _ => None,
    }
}

fn builder_to_string(line: u32, builder: ExprRef, owner: &str) -> ExprRef {
    Rc::new(Expression::MethodInvocation {
        line,
        ty: string_type(),
        receiver: builder,
        owner: owner.to_string(),
        name: "toString".to_string(),
        descriptor: "()Ljava/lang/String;".to_string(),
        parameters: Vec::new(),
    })
}

/// `new StringBuilder().append(a).append(b).toString()` becomes `a + b`.
/// `builder` is the receiver of `toString`; chains that do not start at a
/// fresh builder stay a `toString()` call.
pub fn from_builder_chain(
    builder: ExprRef,
    line: u32,
    owner: &str,
    locals: &LocalVariables,
) -> ExprRef {
    let Some((last, mut receiver, _)) = single_append_argument(&builder) else {
        return builder_to_string(line, builder, owner);
    };
    let mut concatenation = Rc::clone(last);
    let mut first_is_generic = false;

    while let Some((argument, inner, append_line)) = single_append_argument(receiver) {
        first_is_generic = argument.resolved_type(locals).is_generic();
        concatenation = binary(
            append_line,
            string_type(),
            Rc::clone(argument),
            BinaryOperator::Add,
            concatenation,
            4,
        );
        receiver = inner;
    }

    if let Expression::New { ty, parameters, .. } = &**receiver {
        let descriptor = ty.descriptor();
        if descriptor == TYPE_STRING_BUILDER.descriptor || descriptor == TYPE_STRING_BUFFER.descriptor {
            match parameters.as_slice() {
                [] if !first_is_generic => {
                    log::trace!("line {}: append chain folded", line);
                    return match &*concatenation {
                        Expression::BinaryOperator { .. } => concatenation,
                        _ => append(line, None, concatenation, locals),
                    };
                }
                [initial] if is_string(initial, locals) => {
                    log::trace!("line {}: append chain folded", line);
                    return binary(
                        receiver.line(),
                        string_type(),
                        Rc::clone(initial),
                        BinaryOperator::Add,
                        concatenation,
                        4,
                    );
                }
                _ => {}
            }
        }
    }

    builder_to_string(line, builder, owner)
}

/// `makeConcatWithConstants`: literal recipe text interleaved with the
/// arguments.
pub fn from_recipe(line: u32, recipe: &str, arguments: &[ExprRef], locals: &LocalVariables) -> ExprRef {
    let mut concatenation = None;
    let mut arguments = arguments.iter();
    let mut literal = String::new();

    for c in recipe.chars() {
        if c != ARGUMENT_TAG {
            literal.push(c);
            continue;
        }
        if !literal.is_empty() {
            let text = string_constant(line, std::mem::take(&mut literal));
            concatenation = Some(append(line, concatenation, text, locals));
        }
        if let Some(argument) = arguments.next() {
            concatenation = Some(append(line, concatenation, Rc::clone(argument), locals));
        }
    }
    if !literal.is_empty() {
        let text = string_constant(line, literal);
        concatenation = Some(append(line, concatenation, text, locals));
    }

    concatenation.unwrap_or_else(|| string_constant(line, ""))
}

/// `makeConcat`: the arguments in order.
pub fn from_arguments(line: u32, arguments: &[ExprRef], locals: &LocalVariables) -> ExprRef {
    arguments
        .iter()
        .fold(None, |concatenation, argument| {
            Some(append(line, concatenation, Rc::clone(argument), locals))
        })
        .unwrap_or_else(|| string_constant(line, ""))
}
