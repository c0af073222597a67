//! `new T[n]` followed by constant-index stores into that array, folded into
//! `new T[]{...}`.

use std::collections::BTreeMap;
use std::rc::Rc;

use super::expr::{BinaryOperator, ExprRef, Expression, Statement};
use super::stack::Statements;

/// `arr[i] = v` where `arr` is the very node `array` and `i` a constant.
fn element_store(statement: &Statement, array: &ExprRef) -> Option<(i32, ExprRef)> {
    let assignment = statement.as_expression()?;
    let Expression::BinaryOperator {
        left,
        operator: BinaryOperator::Assign,
        right,
        ..
    } = &**assignment
    else {
        return None;
    };
    match &**left {
        Expression::ArrayElement {
            array: target,
            index,
            ..
        } if Rc::ptr_eq(target, array) => match **index {
            Expression::IntegerConstant { value, .. } if value >= 0 => Some((value, Rc::clone(right))),
            _ => None,
        },
        _ => None,
    }
}

/// The constant length of a one-dimension-at-a-time `new T[n]`.
fn declared_length(dimensions: &[ExprRef]) -> Option<usize> {
    match dimensions.first().map(|d| &**d) {
        Some(Expression::IntegerConstant { value, .. }) if *value > 0 => Some(*value as usize),
        _ => None,
    }
}

/// Collapses the trailing element stores into `new_array`. Returns
/// `new_array` itself, with the statements untouched, unless every index
/// below the constant declared length is stored exactly once.
pub fn collapse(statements: &mut Statements, new_array: &ExprRef) -> ExprRef {
    let Expression::NewArray {
        line,
        ty,
        dimensions,
    } = &**new_array
    else {
        return Rc::clone(new_array);
    };
    let Some(declared) = declared_length(dimensions) else {
        return Rc::clone(new_array);
    };

    let mut removed = Vec::new();
    let mut values = BTreeMap::new();
    let mut complete = true;
    while values.len() < declared {
        let Some((index, value)) = statements.last().and_then(|s| element_store(s, new_array)) else {
            break;
        };
        if index as usize >= declared || values.contains_key(&index) {
            break;
        }
        removed.extend(statements.remove_last());
        let value = if matches!(*value, Expression::NewArray { .. }) {
            let nested = collapse(statements, &value);
            // nested stores left behind sit between this store and the earlier ones
            if Rc::ptr_eq(&nested, &value)
                && statements.last().and_then(|s| element_store(s, &value)).is_some()
            {
                complete = false;
                break;
            }
            nested
        } else {
            value
        };
        values.insert(index, value);
    }

    if !complete || values.len() != declared {
        log::trace!(
            "line {}: {} of {} array elements stored, keeping the stores",
            line,
            values.len(),
            declared
        );
        for statement in removed.into_iter().rev() {
            statements.add(statement);
        }
        return Rc::clone(new_array);
    }
    let values = values.into_values().collect::<Vec<_>>();
    log::trace!("line {}: collapsed array initializer of {} values", line, values.len());

    Rc::new(Expression::NewInitializedArray {
        line: *line,
        ty: ty.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decompile::operators::binary;
    use crate::decompile::types::{PrimitiveType, Type};

    fn int(value: i32) -> ExprRef {
        Rc::new(Expression::IntegerConstant {
            line: 1,
            ty: PrimitiveType::INT,
            value,
        })
    }

    fn store(array: &ExprRef, index: i32, value: ExprRef) -> Statement {
        let element = Rc::new(Expression::ArrayElement {
            line: 1,
            ty: Type::Primitive(PrimitiveType::INT),
            array: Rc::clone(array),
            index: int(index),
        });
        Statement::Expression(binary(
            1,
            Type::Primitive(PrimitiveType::INT),
            element,
            BinaryOperator::Assign,
            value,
            16,
        ))
    }

    fn int_array(size: i32) -> ExprRef {
        Rc::new(Expression::NewArray {
            line: 1,
            ty: PrimitiveType::INT.create_type(1),
            dimensions: vec![int(size)],
        })
    }

    fn values(expression: &ExprRef) -> Vec<i32> {
        match &**expression {
            Expression::NewInitializedArray { values, .. } => values
                .iter()
                .map(|v| match **v {
                    Expression::IntegerConstant { value, .. } => value,
                    _ => -1,
                })
                .collect(),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_collapse_takes_every_index() {
        let array = int_array(3);
        let mut statements = Statements::new();
        statements.add(store(&array, 1, int(5)));
        statements.add(store(&array, 0, int(4)));
        statements.add(store(&array, 2, int(6)));
        let collapsed = collapse(&mut statements, &array);
        assert_eq!(values(&collapsed), vec![4, 5, 6]);
        assert!(statements.is_empty());
    }

    #[test]
    fn test_sparse_stores_are_kept() {
        let array = int_array(3);
        let mut statements = Statements::new();
        statements.add(store(&array, 0, int(4)));
        statements.add(store(&array, 2, int(6)));
        let before = statements.clone();
        let result = collapse(&mut statements, &array);
        assert!(Rc::ptr_eq(&result, &array));
        assert_eq!(statements, before);
    }

    #[test]
    fn test_huge_declared_length_is_kept() {
        let array = int_array(50_000_000);
        let mut statements = Statements::new();
        statements.add(store(&array, 0, int(1)));
        let result = collapse(&mut statements, &array);
        assert!(Rc::ptr_eq(&result, &array));
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_index_past_declared_length_is_kept() {
        let array = int_array(1);
        let mut statements = Statements::new();
        statements.add(store(&array, 40_000_000, int(1)));
        let result = collapse(&mut statements, &array);
        assert!(Rc::ptr_eq(&result, &array));
        assert_eq!(statements.len(), 1);

        let empty = int_array(0);
        statements.add(store(&empty, 0, int(1)));
        assert!(Rc::ptr_eq(&collapse(&mut statements, &empty), &empty));
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_nested_arrays_collapse() {
        let outer = Rc::new(Expression::NewArray {
            line: 1,
            ty: PrimitiveType::INT.create_type(2),
            dimensions: vec![int(1)],
        });
        let inner = int_array(1);
        let mut statements = Statements::new();
        statements.add(store(&inner, 0, int(3)));
        statements.add(store(&outer, 0, Rc::clone(&inner)));
        let collapsed = collapse(&mut statements, &outer);
        match &*collapsed {
            Expression::NewInitializedArray { values: nested, .. } => {
                assert_eq!(values(&nested[0]), vec![3]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(statements.is_empty());
    }

    #[test]
    fn test_collapse_stops_at_other_statements() {
        let array = int_array(1);
        let other = int_array(1);
        let mut statements = Statements::new();
        statements.add(store(&other, 0, int(9)));
        statements.add(store(&array, 0, int(5)));
        let collapsed = collapse(&mut statements, &array);
        assert_eq!(values(&collapsed), vec![5]);
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_nothing_to_collapse() {
        let array = int_array(2);
        let mut statements = Statements::new();
        let result = collapse(&mut statements, &array);
        assert!(Rc::ptr_eq(&result, &array));
    }

    #[test]
    fn test_duplicate_index_stops() {
        let array = int_array(1);
        let mut statements = Statements::new();
        statements.add(store(&array, 0, int(1)));
        statements.add(store(&array, 0, int(2)));
        let collapsed = collapse(&mut statements, &array);
        assert_eq!(values(&collapsed), vec![2]);
        assert_eq!(statements.len(), 1);
    }
}
