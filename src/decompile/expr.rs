use std::fmt;
use std::rc::Rc;

use super::local_variable::{LocalVariables, VariableId};
use super::types::{ObjectType, PrimitiveType, Type, TYPE_CLASS, TYPE_STRING};

/// Expressions are shared between the operand stack and emitted statements;
/// the idiom recognizers compare them with [`Rc::ptr_eq`].
pub type ExprRef = Rc<Expression>;

/// Binary operators, compound assignments included.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Assign,
    Add, Sub, Mul, Div, Rem,
    Shl, Shr, Ushr,
    And, Or, Xor,
    Eq, Ne, Lt, Ge, Gt, Le,
    AddAssign, SubAssign, MulAssign, DivAssign, RemAssign,
    ShlAssign, ShrAssign, UshrAssign,
    AndAssign, XorAssign, OrAssign,
}

impl BinaryOperator {
    /// Java source token for this operator.
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOperator::Assign => "=",
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::Rem => "%",
            BinaryOperator::Shl => "<<",
            BinaryOperator::Shr => ">>",
            BinaryOperator::Ushr => ">>>",
            BinaryOperator::And => "&",
            BinaryOperator::Or => "|",
            BinaryOperator::Xor => "^",
            BinaryOperator::Eq => "==",
            BinaryOperator::Ne => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::AddAssign => "+=",
            BinaryOperator::SubAssign => "-=",
            BinaryOperator::MulAssign => "*=",
            BinaryOperator::DivAssign => "/=",
            BinaryOperator::RemAssign => "%=",
            BinaryOperator::ShlAssign => "<<=",
            BinaryOperator::ShrAssign => ">>=",
            BinaryOperator::UshrAssign => ">>>=",
            BinaryOperator::AndAssign => "&=",
            BinaryOperator::XorAssign => "^=",
            BinaryOperator::OrAssign => "|=",
        }
    }

    /// `x = x OP y` rewritten as `x OP= y`.
    pub fn compound(self) -> Option<BinaryOperator> {
        match self {
            BinaryOperator::Add => Some(BinaryOperator::AddAssign),
            BinaryOperator::Sub => Some(BinaryOperator::SubAssign),
            BinaryOperator::Mul => Some(BinaryOperator::MulAssign),
            BinaryOperator::Div => Some(BinaryOperator::DivAssign),
            BinaryOperator::Rem => Some(BinaryOperator::RemAssign),
            BinaryOperator::Shl => Some(BinaryOperator::ShlAssign),
            BinaryOperator::Shr => Some(BinaryOperator::ShrAssign),
            BinaryOperator::Ushr => Some(BinaryOperator::UshrAssign),
            BinaryOperator::And => Some(BinaryOperator::AndAssign),
            BinaryOperator::Xor => Some(BinaryOperator::XorAssign),
            BinaryOperator::Or => Some(BinaryOperator::OrAssign),
            _ => None,
        }
    }

    /// Returns the negated comparison.
    pub fn negate(self) -> BinaryOperator {
        match self {
            BinaryOperator::Eq => BinaryOperator::Ne,
            BinaryOperator::Ne => BinaryOperator::Eq,
            BinaryOperator::Lt => BinaryOperator::Ge,
            BinaryOperator::Ge => BinaryOperator::Lt,
            BinaryOperator::Gt => BinaryOperator::Le,
            BinaryOperator::Le => BinaryOperator::Gt,
            other => other,
        }
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Increment,
    Decrement,
    Minus,
    Not,
}

impl UnaryOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOperator::Increment => "++",
            UnaryOperator::Decrement => "--",
            UnaryOperator::Minus => "-",
            UnaryOperator::Not => "!",
        }
    }
}

/// Body of an inlined lambda.
#[derive(Clone, Debug, PartialEq)]
pub enum LambdaBody {
    Expression(ExprRef),
    Statements(Vec<Statement>),
}

/// Expression tree node. Every node carries its source line, 0 when unknown.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
    // --- Literals ---
    Null { line: u32, ty: Type },
    IntegerConstant { line: u32, ty: PrimitiveType, value: i32 },
    LongConstant { line: u32, value: i64 },
    FloatConstant { line: u32, value: f32 },
    DoubleConstant { line: u32, value: f64 },
    StringConstant { line: u32, value: String },

    // --- Variables and references ---
    LocalVariable { line: u32, variable: VariableId },
    This { line: u32, ty: Type },
    Super { line: u32, ty: Type },
    ObjectTypeReference { line: u32, object_type: ObjectType, explicit: bool },
    /// `T.class`
    TypeReferenceDotClass { line: u32, type_ref: Type },
    FieldReference {
        line: u32,
        ty: Type,
        receiver: ExprRef,
        owner: String,
        name: String,
        descriptor: String,
    },
    ArrayElement { line: u32, ty: Type, array: ExprRef, index: ExprRef },

    // --- Invocations ---
    MethodInvocation {
        line: u32,
        ty: Type,
        receiver: ExprRef,
        owner: String,
        name: String,
        descriptor: String,
        parameters: Vec<ExprRef>,
    },
    ConstructorInvocation {
        line: u32,
        object_type: ObjectType,
        descriptor: String,
        parameters: Vec<ExprRef>,
    },
    SuperConstructorInvocation {
        line: u32,
        object_type: ObjectType,
        descriptor: String,
        parameters: Vec<ExprRef>,
    },

    // --- Object creation ---
    New {
        line: u32,
        ty: Type,
        descriptor: Option<String>,
        parameters: Vec<ExprRef>,
        /// Internal name of the anonymous class body, if any.
        body: Option<String>,
    },
    NewArray { line: u32, ty: Type, dimensions: Vec<ExprRef> },
    NewInitializedArray { line: u32, ty: Type, values: Vec<ExprRef> },
    Length { line: u32, array: ExprRef },

    // --- Operations ---
    Cast { line: u32, ty: Type, expression: ExprRef, explicit: bool },
    InstanceOf { line: u32, expression: ExprRef, instance_type: Type },
    BinaryOperator {
        line: u32,
        ty: Type,
        left: ExprRef,
        operator: BinaryOperator,
        right: ExprRef,
        priority: u8,
    },
    PreOperator { line: u32, operator: UnaryOperator, expression: ExprRef },
    PostOperator { line: u32, operator: UnaryOperator, expression: ExprRef },
    /// Three-way compare left by LCMP, FCMPx and DCMPx.
    Compare { line: u32, left: ExprRef, right: ExprRef },

    // --- Functional ---
    Lambda {
        line: u32,
        ty: Type,
        parameter_names: Option<Vec<String>>,
        body: LambdaBody,
    },
    MethodReference {
        line: u32,
        ty: Type,
        expression: ExprRef,
        owner: String,
        name: String,
        descriptor: String,
    },
    ConstructorReference { line: u32, ty: Type, object_type: ObjectType, descriptor: String },

    /// Pushed by JSR; never part of the output.
    JsrReturnAddress { line: u32 },
}

impl Expression {
    pub fn line(&self) -> u32 {
        match self {
            Expression::Null { line, .. }
            | Expression::IntegerConstant { line, .. }
            | Expression::LongConstant { line, .. }
            | Expression::FloatConstant { line, .. }
            | Expression::DoubleConstant { line, .. }
            | Expression::StringConstant { line, .. }
            | Expression::LocalVariable { line, .. }
            | Expression::This { line, .. }
            | Expression::Super { line, .. }
            | Expression::ObjectTypeReference { line, .. }
            | Expression::TypeReferenceDotClass { line, .. }
            | Expression::FieldReference { line, .. }
            | Expression::ArrayElement { line, .. }
            | Expression::MethodInvocation { line, .. }
            | Expression::ConstructorInvocation { line, .. }
            | Expression::SuperConstructorInvocation { line, .. }
            | Expression::New { line, .. }
            | Expression::NewArray { line, .. }
            | Expression::NewInitializedArray { line, .. }
            | Expression::Length { line, .. }
            | Expression::Cast { line, .. }
            | Expression::InstanceOf { line, .. }
            | Expression::BinaryOperator { line, .. }
            | Expression::PreOperator { line, .. }
            | Expression::PostOperator { line, .. }
            | Expression::Compare { line, .. }
            | Expression::Lambda { line, .. }
            | Expression::MethodReference { line, .. }
            | Expression::ConstructorReference { line, .. }
            | Expression::JsrReturnAddress { line } => *line,
        }
    }

    /// The static type of this expression. Variable types come from the
    /// bindings' current constraints.
    pub fn resolved_type(&self, locals: &LocalVariables) -> Type {
        match self {
            Expression::Null { ty, .. }
            | Expression::This { ty, .. }
            | Expression::Super { ty, .. }
            | Expression::FieldReference { ty, .. }
            | Expression::ArrayElement { ty, .. }
            | Expression::MethodInvocation { ty, .. }
            | Expression::New { ty, .. }
            | Expression::NewArray { ty, .. }
            | Expression::NewInitializedArray { ty, .. }
            | Expression::Cast { ty, .. }
            | Expression::BinaryOperator { ty, .. }
            | Expression::Lambda { ty, .. }
            | Expression::MethodReference { ty, .. }
            | Expression::ConstructorReference { ty, .. } => ty.clone(),
            Expression::IntegerConstant { ty, .. } => Type::Primitive(*ty),
            Expression::LongConstant { .. } => Type::Primitive(PrimitiveType::LONG),
            Expression::FloatConstant { .. } => Type::Primitive(PrimitiveType::FLOAT),
            Expression::DoubleConstant { .. } => Type::Primitive(PrimitiveType::DOUBLE),
            Expression::StringConstant { .. } => Type::Object(TYPE_STRING.clone()),
            Expression::LocalVariable { variable, .. } => locals.variable_type(*variable),
            Expression::ObjectTypeReference { object_type, .. } => Type::Object(object_type.clone()),
            Expression::TypeReferenceDotClass { type_ref, .. } => {
                Type::Object(TYPE_CLASS.clone().with_type_arguments(vec![type_ref.clone()]))
            }
            Expression::ConstructorInvocation { .. }
            | Expression::SuperConstructorInvocation { .. }
            | Expression::JsrReturnAddress { .. } => Type::Primitive(PrimitiveType::VOID),
            Expression::Length { .. } | Expression::Compare { .. } => {
                Type::Primitive(PrimitiveType::INT)
            }
            Expression::InstanceOf { .. } => Type::Primitive(PrimitiveType::BOOLEAN),
            Expression::PreOperator { expression, .. }
            | Expression::PostOperator { expression, .. } => expression.resolved_type(locals),
        }
    }

    pub fn as_local_variable(&self) -> Option<VariableId> {
        match self {
            Expression::LocalVariable { variable, .. } => Some(*variable),
            _ => None,
        }
    }

    /// A literal `1` of any numeric kind.
    pub fn is_positive_one(&self) -> bool {
        match self {
            Expression::IntegerConstant { value, .. } => *value == 1,
            Expression::LongConstant { value, .. } => *value == 1,
            Expression::FloatConstant { value, .. } => *value == 1.0,
            Expression::DoubleConstant { value, .. } => *value == 1.0,
            _ => false,
        }
    }

    /// A literal `-1` of any numeric kind.
    pub fn is_negative_one(&self) -> bool {
        match self {
            Expression::IntegerConstant { value, .. } => *value == -1,
            Expression::LongConstant { value, .. } => *value == -1,
            Expression::FloatConstant { value, .. } => *value == -1.0,
            Expression::DoubleConstant { value, .. } => *value == -1.0,
            _ => false,
        }
    }
}

/// Statement tree node.
#[derive(Clone, Debug, PartialEq)]
pub enum Statement {
    Expression(ExprRef),
    Return,
    ReturnExpression { line: u32, expression: ExprRef },
    Throw(ExprRef),
    /// `blocks` holds one empty slot per branch target, default included.
    Switch { condition: ExprRef, blocks: Vec<Vec<Statement>> },
    MonitorEnter(ExprRef),
    MonitorExit(ExprRef),
}

impl Statement {
    pub fn as_expression(&self) -> Option<&ExprRef> {
        match self {
            Statement::Expression(e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_operators() {
        assert_eq!(BinaryOperator::Mul.compound(), Some(BinaryOperator::MulAssign));
        assert_eq!(BinaryOperator::Ushr.compound().unwrap().as_str(), ">>>=");
        assert_eq!(BinaryOperator::Eq.compound(), None);
        assert_eq!(BinaryOperator::Assign.compound(), None);
    }

    #[test]
    fn test_negate() {
        assert_eq!(BinaryOperator::Lt.negate(), BinaryOperator::Ge);
        assert_eq!(BinaryOperator::Ne.negate(), BinaryOperator::Eq);
        assert_eq!(BinaryOperator::Add.negate(), BinaryOperator::Add);
    }

    #[test]
    fn test_unit_literals() {
        let one = Expression::LongConstant { line: 0, value: 1 };
        let minus_one = Expression::DoubleConstant { line: 0, value: -1.0 };
        assert!(one.is_positive_one());
        assert!(!one.is_negative_one());
        assert!(minus_one.is_negative_one());
    }

    #[test]
    fn test_dot_class_type() {
        let locals = LocalVariables::new();
        let e = Expression::TypeReferenceDotClass {
            line: 3,
            type_ref: Type::Object(TYPE_STRING.clone()),
        };
        let ty = e.resolved_type(&locals);
        let class = ty.as_object().unwrap();
        assert_eq!(class.internal_name, "java/lang/Class");
        assert_eq!(class.type_arguments, vec![Type::Object(TYPE_STRING.clone())]);
        assert_eq!(e.line(), 3);
    }
}
