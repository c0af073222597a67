#![allow(dead_code)]

use classfile_decompiler::constant_info::ConstantPool;
use classfile_decompiler::decompile::{
    BasicBlock, ClassDeclaration, DescriptorTypeMaker, ExprRef, Expression, LambdaBody,
    LocalVariables, OperandStack, SimulatorOptions, StackSimulator, Statement, Statements,
};
use classfile_decompiler::method_info::{Method, MethodAccessFlags};

/// An opcode followed by a big-endian constant pool index.
pub fn indexed(opcode: u8, index: u16) -> [u8; 3] {
    let [hi, lo] = index.to_be_bytes();
    [opcode, hi, lo]
}

pub fn static_method(descriptor: &str, code: Vec<u8>) -> Method {
    Method::new(MethodAccessFlags::STATIC, "m", descriptor, code)
}

pub fn instance_method(descriptor: &str, code: Vec<u8>) -> Method {
    Method::new(MethodAccessFlags::PUBLIC, "m", descriptor, code)
}

/// What one run over a whole method leaves behind.
pub struct Simulated {
    pub statements: Vec<Statement>,
    pub stack: Vec<ExprRef>,
    pub locals: LocalVariables,
}

impl Simulated {
    pub fn statements(&self) -> Vec<String> {
        self.statements
            .iter()
            .map(|s| render_statement(s, &self.locals))
            .collect()
    }

    pub fn stack(&self) -> Vec<String> {
        self.stack.iter().map(|e| render(e, &self.locals)).collect()
    }
}

pub fn simulate(class: &ClassDeclaration, constants: &ConstantPool, method: &Method) -> Simulated {
    simulate_with(class, constants, method, SimulatorOptions::default())
}

pub fn simulate_with(
    class: &ClassDeclaration,
    constants: &ConstantPool,
    method: &Method,
    options: SimulatorOptions,
) -> Simulated {
    simulate_block(class, constants, method, options, &BasicBlock::new(0, method.code.len()))
}

pub fn simulate_block(
    class: &ClassDeclaration,
    constants: &ConstantPool,
    method: &Method,
    options: SimulatorOptions,
    block: &BasicBlock,
) -> Simulated {
    let type_maker = DescriptorTypeMaker::new();
    let mut simulator = StackSimulator::new(&type_maker, constants, class, method)
        .expect("method signature resolves")
        .with_options(options);
    let mut statements = Statements::new();
    let mut stack = OperandStack::new();
    simulator
        .simulate_block(block, &mut statements, &mut stack)
        .expect("block simulates");
    Simulated {
        statements: statements.into_vec(),
        stack: stack.iter().cloned().collect(),
        locals: simulator.into_locals(),
    }
}

fn priority(expression: &Expression) -> Option<u8> {
    match expression {
        Expression::BinaryOperator { priority, .. } => Some(*priority),
        _ => None,
    }
}

fn operand(expression: &ExprRef, parent: u8, locals: &LocalVariables) -> String {
    match priority(expression) {
        Some(p) if p > parent => format!("({})", render(expression, locals)),
        _ => render(expression, locals),
    }
}

fn list(expressions: &[ExprRef], locals: &LocalVariables) -> String {
    expressions
        .iter()
        .map(|e| render(e, locals))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Java-like text for an expression. Local variables print as `v<slot>`
/// unless they carry a name.
pub fn render(expression: &ExprRef, locals: &LocalVariables) -> String {
    match &**expression {
        Expression::Null { .. } => "null".to_string(),
        Expression::IntegerConstant { value, .. } => value.to_string(),
        Expression::LongConstant { value, .. } => format!("{}L", value),
        Expression::FloatConstant { value, .. } => format!("{}F", value),
        Expression::DoubleConstant { value, .. } => format!("{}D", value),
        Expression::StringConstant { value, .. } => format!("{:?}", value),
        Expression::LocalVariable { variable, .. } => match locals.name(*variable) {
            Some(name) => name.to_string(),
            None => format!("v{}", locals.variable(*variable).index),
        },
        Expression::This { .. } => "this".to_string(),
        Expression::Super { .. } => "super".to_string(),
        Expression::ObjectTypeReference { object_type, .. } => object_type
            .name
            .clone()
            .unwrap_or_else(|| object_type.internal_name.clone()),
        Expression::TypeReferenceDotClass { type_ref, .. } => format!("{}.class", type_ref),
        Expression::FieldReference { receiver, name, .. } => {
            format!("{}.{}", render(receiver, locals), name)
        }
        Expression::ArrayElement { array, index, .. } => {
            format!("{}[{}]", render(array, locals), render(index, locals))
        }
        Expression::MethodInvocation {
            receiver,
            name,
            parameters,
            ..
        } => format!("{}.{}({})", render(receiver, locals), name, list(parameters, locals)),
        Expression::ConstructorInvocation { parameters, .. } => {
            format!("this({})", list(parameters, locals))
        }
        Expression::SuperConstructorInvocation { parameters, .. } => {
            format!("super({})", list(parameters, locals))
        }
        Expression::New { ty, parameters, .. } => format!("new {}({})", ty, list(parameters, locals)),
        Expression::NewArray { ty, dimensions, .. } => {
            format!("new {}[{}]", ty, list(dimensions, locals))
        }
        Expression::NewInitializedArray { ty, values, .. } => {
            format!("new {}{{{}}}", ty, list(values, locals))
        }
        Expression::Length { array, .. } => format!("{}.length", render(array, locals)),
        Expression::Cast { ty, expression, .. } => format!("({}){}", ty, render(expression, locals)),
        Expression::InstanceOf {
            expression,
            instance_type,
            ..
        } => format!("{} instanceof {}", render(expression, locals), instance_type),
        Expression::BinaryOperator {
            left,
            operator,
            right,
            priority,
            ..
        } => format!(
            "{} {} {}",
            operand(left, *priority, locals),
            operator.as_str(),
            operand(right, *priority, locals)
        ),
        Expression::PreOperator {
            operator,
            expression,
            ..
        } => format!("{}{}", operator.as_str(), render(expression, locals)),
        Expression::PostOperator {
            operator,
            expression,
            ..
        } => format!("{}{}", render(expression, locals), operator.as_str()),
        Expression::Compare { left, right, .. } => {
            format!("cmp({}, {})", render(left, locals), render(right, locals))
        }
        Expression::Lambda {
            parameter_names,
            body,
            ..
        } => {
            let names = parameter_names.as_deref().unwrap_or_default().join(", ");
            let body = match body {
                LambdaBody::Expression(e) => render(e, locals),
                LambdaBody::Statements(s) => format!("{{ {} statements }}", s.len()),
            };
            format!("({}) -> {}", names, body)
        }
        Expression::MethodReference {
            expression, name, ..
        } => format!("{}::{}", render(expression, locals), name),
        Expression::ConstructorReference { object_type, .. } => format!(
            "{}::new",
            object_type
                .name
                .clone()
                .unwrap_or_else(|| object_type.internal_name.clone())
        ),
        Expression::JsrReturnAddress { .. } => "<jsr>".to_string(),
    }
}

pub fn render_statement(statement: &Statement, locals: &LocalVariables) -> String {
    match statement {
        Statement::Expression(e) => render(e, locals),
        Statement::Return => "return".to_string(),
        Statement::ReturnExpression { expression, .. } => format!("return {}", render(expression, locals)),
        Statement::Throw(e) => format!("throw {}", render(e, locals)),
        Statement::Switch { condition, blocks } => {
            format!("switch ({}) [{}]", render(condition, locals), blocks.len())
        }
        Statement::MonitorEnter(e) => format!("monitorenter({})", render(e, locals)),
        Statement::MonitorExit(e) => format!("monitorexit({})", render(e, locals)),
    }
}
