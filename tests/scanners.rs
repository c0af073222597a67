mod common;

use classfile_decompiler::constant_info::ConstantPool;
use classfile_decompiler::decompile::scanner::{
    count_method_parameters, eval_stack_depth, exception_local_variable_index, is_assert_condition,
    last_opcode, search_next_opcode,
};
use classfile_decompiler::decompile::BasicBlock;

use common::indexed;

#[test_log::test]
fn test_branches_consume_their_operands() {
    let constants = ConstantPool::default();
    // iload_0; iload_1; if_icmpge +3
    let code = [0x1a, 0x1b, 0xa2, 0x00, 0x03];
    assert_eq!(eval_stack_depth(&constants, &code, &BasicBlock::new(0, 5)).unwrap(), 0);
    // iload_0; ifeq +3
    let code = [0x1a, 0x99, 0x00, 0x03];
    assert_eq!(eval_stack_depth(&constants, &code, &BasicBlock::new(0, 4)).unwrap(), 0);
}

#[test_log::test]
fn test_invoke_dynamic_depth() {
    let mut constants = ConstantPool::default();
    let call_site = constants.get_or_add_invoke_dynamic(0, "makeConcat", "(II)Ljava/lang/String;");
    let [hi, lo] = call_site.to_be_bytes();
    let code = [0x1a, 0x1b, 0xba, hi, lo, 0x00, 0x00];
    assert_eq!(eval_stack_depth(&constants, &code, &BasicBlock::new(0, 7)).unwrap(), 1);
    assert_eq!(eval_stack_depth(&constants, &code, &BasicBlock::new(2, 7)).unwrap(), -1);
}

#[test_log::test]
fn test_multianewarray_depth() {
    let mut constants = ConstantPool::default();
    let matrix = constants.get_or_add_class("[[I");
    // iconst_1; iconst_2; multianewarray [[I 2
    let mut code = vec![0x04, 0x05];
    code.extend_from_slice(&indexed(0xc5, matrix));
    code.push(0x02);
    assert_eq!(
        eval_stack_depth(&constants, &code, &BasicBlock::new(0, code.len())).unwrap(),
        1
    );
}

#[test_log::test]
fn test_category_two_values_count_once() {
    let constants = ConstantPool::default();
    let depth = |code: &[u8]| {
        eval_stack_depth(&constants, code, &BasicBlock::new(0, code.len())).unwrap()
    };
    // dload_0; dup2
    assert_eq!(depth(&[0x26, 0x5c]), 2);
    // iload_0; iload_1; dup2
    assert_eq!(depth(&[0x1a, 0x1b, 0x5c]), 4);
    // dload_0; pop2
    assert_eq!(depth(&[0x26, 0x58]), 0);
    // iload_0; iload_1; pop2
    assert_eq!(depth(&[0x1a, 0x1b, 0x58]), 0);
    // iload_0; dload_1; dup2_x1
    assert_eq!(depth(&[0x1a, 0x27, 0x5d]), 3);
    // lload_0; lconst_1; ladd; dload_2; dup2_x2
    assert_eq!(depth(&[0x1e, 0x0a, 0x61, 0x28, 0x5e]), 3);
    // values from before the block are category 1: pop2
    assert_eq!(depth(&[0x58]), -2);
}

#[test_log::test]
fn test_field_and_call_widths() {
    let mut constants = ConstantPool::default();
    let total = constants.get_or_add_field_ref("a/Foo", "total", "J");
    let next = constants.get_or_add_method_ref("a/Foo", "next", "()D");
    // getstatic total; dup2
    let mut code = indexed(0xb2, total).to_vec();
    code.push(0x5c);
    assert_eq!(eval_stack_depth(&constants, &code, &BasicBlock::new(0, code.len())).unwrap(), 2);
    // invokestatic next; pop2
    let mut code = indexed(0xb8, next).to_vec();
    code.push(0x58);
    assert_eq!(eval_stack_depth(&constants, &code, &BasicBlock::new(0, code.len())).unwrap(), 0);
}

#[test_log::test]
fn test_search_follows_forward_conditional_branch() {
    // 0: ifeq +5; 3: nop; 4: nop; 5: return
    let code = [0x99, 0x00, 0x05, 0x00, 0x00, 0xb1];
    let block = BasicBlock::new(0, 3);
    assert_eq!(search_next_opcode(&code, &block, 10).unwrap(), 0xb1);
    assert_eq!(last_opcode(&code, &block).unwrap(), 0x99);
}

#[test_log::test]
fn test_search_does_not_follow_backward_branch() {
    // 0..3: nop; 3: goto -3; 6: return
    let code = [0x00, 0x00, 0x00, 0xa7, 0xff, 0xfd, 0xb1];
    let block = BasicBlock::new(3, 6);
    assert_eq!(search_next_opcode(&code, &block, 10).unwrap(), 0xb1);
    assert_eq!(search_next_opcode(&code, &block, 5).unwrap(), 0);
}

#[test_log::test]
fn test_exception_slot_of_wide_store() {
    // wide astore 256
    let code = [0xc4, 0x3a, 0x01, 0x00];
    assert_eq!(
        exception_local_variable_index(&code, &BasicBlock::new(0, 4)).unwrap(),
        256
    );
    // pop
    assert_eq!(exception_local_variable_index(&[0x57], &BasicBlock::new(0, 1)).unwrap(), -1);
    assert_eq!(exception_local_variable_index(&[0x57], &BasicBlock::new(0, 0)).unwrap(), -1);
}

#[test_log::test]
fn test_assert_condition_needs_boolean_flag() {
    let mut constants = ConstantPool::default();
    let wrong_type = constants.get_or_add_field_ref("a/Foo", "$assertionsDisabled", "I");
    let flag = constants.get_or_add_field_ref("a/Foo", "$assertionsDisabled", "Z");
    let mut code = indexed(0xb2, wrong_type).to_vec();
    code.extend_from_slice(&indexed(0xb2, flag));
    assert!(!is_assert_condition("a/Foo", &constants, &code, &BasicBlock::new(0, 3)).unwrap());
    assert!(is_assert_condition("a/Foo", &constants, &code, &BasicBlock::new(3, 6)).unwrap());
    assert!(!is_assert_condition("a/Bar", &constants, &code, &BasicBlock::new(3, 6)).unwrap());
}

#[test_log::test]
fn test_count_method_parameters() {
    assert_eq!(count_method_parameters("()V"), 0);
    assert_eq!(count_method_parameters("(IJ[Ljava/lang/String;D)V"), 4);
    assert_eq!(count_method_parameters("([[ILjava/util/Map;)I"), 2);
}

mod proptests {
    use super::*;
    use classfile_decompiler::decompile::util::{byte_size, decode_instruction};
    use classfile_decompiler::decompile::{ClassDeclaration, SimulatorOptions};
    use common::{simulate_block, static_method};
    use proptest::prelude::*;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Kind {
        Int,
        Long,
        Double,
    }

    use Kind::*;

    const OPS: &[&[u8]] = &[
        &[0x02],       // iconst_m1
        &[0x04],       // iconst_1
        &[0x10, 0x2a], // bipush 42
        &[0x1a],       // iload_0
        &[0x1b],       // iload_1
        &[0x1c],       // iload_2
        &[0x1d],       // iload_3
        &[0x0a],       // lconst_1
        &[0x0f],       // dconst_1
        &[0x16, 0x04], // lload 4
        &[0x18, 0x06], // dload 6
        &[0x3b],       // istore_0
        &[0x3e],       // istore_3
        &[0x84, 0x01, 0x01],
        &[0x60], // iadd
        &[0x68], // imul
        &[0x7e], // iand
        &[0x61], // ladd
        &[0x63], // dadd
        &[0x74], // ineg
        &[0x85], // i2l
        &[0x88], // l2i
        &[0x8e], // d2i
        &[0x57], // pop
        &[0x58], // pop2
        &[0x59], // dup
        &[0x5a], // dup_x1
        &[0x5b], // dup_x2
        &[0x5c], // dup2
        &[0x5d], // dup2_x1
        &[0x5e], // dup2_x2
        &[0x5f], // swap
    ];

    /// Pops `take` values and pushes them back in `order`, bottom first,
    /// where 1 names the value that was on top.
    fn shuffle(stack: &mut Vec<Kind>, take: usize, order: &[usize]) {
        let popped: Vec<Kind> = (0..take).filter_map(|_| stack.pop()).collect();
        stack.extend(order.iter().map(|&i| popped[i - 1]));
    }

    /// Applies `op` to a stack of value kinds when it verifies, the way the
    /// JVM sees category-1 and category-2 values.
    fn apply(op: &[u8], stack: &mut Vec<Kind>) -> bool {
        let top: Vec<Kind> = stack.iter().rev().take(4).copied().collect();
        let wide = |i: usize| top.get(i).map(|k| *k != Int);
        let unary = |from: Kind, to: Kind, stack: &mut Vec<Kind>| {
            if top.first() != Some(&from) {
                return false;
            }
            stack.pop();
            stack.push(to);
            true
        };
        let binary = |kind: Kind, stack: &mut Vec<Kind>| {
            if top.len() < 2 || top[0] != kind || top[1] != kind {
                return false;
            }
            stack.truncate(stack.len() - 1);
            true
        };
        match op[0] {
            0x02 | 0x04 | 0x10 | 0x1a..=0x1d => stack.push(Int),
            0x0a | 0x16 => stack.push(Long),
            0x0f | 0x18 => stack.push(Double),
            0x3b | 0x3e | 0x57 if wide(0) == Some(false) => {
                stack.pop();
            }
            0x84 => {}
            0x60 | 0x68 | 0x7e => return binary(Int, stack),
            0x61 => return binary(Long, stack),
            0x63 => return binary(Double, stack),
            0x74 => return unary(Int, Int, stack),
            0x85 => return unary(Int, Long, stack),
            0x88 => return unary(Long, Int, stack),
            0x8e => return unary(Double, Int, stack),
            0x58 => match (wide(0), wide(1)) {
                (Some(true), _) => shuffle(stack, 1, &[]),
                (Some(false), Some(false)) => shuffle(stack, 2, &[]),
                _ => return false,
            },
            0x59 if wide(0) == Some(false) => shuffle(stack, 1, &[1, 1]),
            0x5a if (wide(0), wide(1)) == (Some(false), Some(false)) => shuffle(stack, 2, &[1, 2, 1]),
            0x5b => match (wide(0), wide(1), wide(2)) {
                (Some(false), Some(true), _) => shuffle(stack, 2, &[1, 2, 1]),
                (Some(false), Some(false), Some(false)) => shuffle(stack, 3, &[1, 3, 2, 1]),
                _ => return false,
            },
            0x5c => match (wide(0), wide(1)) {
                (Some(true), _) => shuffle(stack, 1, &[1, 1]),
                (Some(false), Some(false)) => shuffle(stack, 2, &[2, 1, 2, 1]),
                _ => return false,
            },
            0x5d => match (wide(0), wide(1), wide(2)) {
                (Some(true), Some(false), _) => shuffle(stack, 2, &[1, 2, 1]),
                (Some(false), Some(false), Some(false)) => shuffle(stack, 3, &[2, 1, 3, 2, 1]),
                _ => return false,
            },
            0x5e => match (wide(0), wide(1), wide(2), wide(3)) {
                (Some(true), Some(true), _, _) => shuffle(stack, 2, &[1, 2, 1]),
                (Some(true), Some(false), Some(false), _) => shuffle(stack, 3, &[1, 3, 2, 1]),
                (Some(false), Some(false), Some(true), _) => shuffle(stack, 3, &[2, 1, 3, 2, 1]),
                (Some(false), Some(false), Some(false), Some(false)) => {
                    shuffle(stack, 4, &[2, 1, 4, 3, 2, 1])
                }
                _ => return false,
            },
            0x5f if (wide(0), wide(1)) == (Some(false), Some(false)) => shuffle(stack, 2, &[1, 2]),
            _ => return false,
        }
        true
    }

    /// Assembles the choices that verify, skipping the rest.
    fn assemble(choices: &[usize]) -> Vec<u8> {
        let mut stack = Vec::new();
        let mut code = Vec::new();
        for &choice in choices {
            if apply(OPS[choice], &mut stack) {
                code.extend_from_slice(OPS[choice]);
            }
        }
        code
    }

    proptest! {
        /// The scanner's net depth matches what the interpreter leaves behind,
        /// long and double values included.
        #[test]
        fn stack_depth_agrees_with_simulation(
            choices in prop::collection::vec(0..OPS.len(), 0..40)
        ) {
            let code = assemble(&choices);
            let constants = ConstantPool::default();
            let method = static_method("(IIIIJD)V", code.clone());
            let block = BasicBlock::new(0, code.len());
            let depth = eval_stack_depth(&constants, &code, &block).unwrap();
            let run = simulate_block(
                &ClassDeclaration::new("a/Foo"),
                &constants,
                &method,
                SimulatorOptions::default(),
                &block,
            );
            prop_assert_eq!(run.stack.len() as i32, depth);
        }

        /// Decoded lengths agree with the width table for every opcode outside
        /// the switches.
        #[test]
        fn decoded_width_matches_byte_size(
            opcode in any::<u8>().prop_filter("switches", |o| *o != 0xaa && *o != 0xab),
            operands in prop::array::uniform8(any::<u8>()),
            padding in 0usize..4,
        ) {
            let mut code = vec![0x00; padding];
            code.push(opcode);
            code.extend_from_slice(&operands);
            if let Ok(decoded) = decode_instruction(&code, padding) {
                match &decoded.instruction {
                    Some(instruction) => prop_assert_eq!(
                        decoded.length,
                        byte_size(instruction, padding as u32) as usize
                    ),
                    None => prop_assert!(decoded.length == 1 || decoded.length == 4),
                }
            }
        }
    }
}
