//! AST-to-binary lowering (§4.7), the inverse of [`crate::script::lift`].
//! Grounded on `thecl_instr_new`/`th10_compile`'s two-pass label
//! resolution in `thecl10.c`: every label gets a placeholder offset on
//! the first pass, every `o`-typed parameter is backpatched to the real
//! byte delta on the second.

use std::collections::HashMap;

use crate::diagnostic::Diagnostic;
use crate::error::{Error, Result};
use crate::script::ast::{Arg, BinOp, Expr, ModuleAst, Stmt, SubDecl, UnOp};
use crate::script::eclmap::EclMap;
use crate::script::expr_contract;
use crate::script::instr::{Instruction, Item, Module, Param, Sub};
use crate::value::Value;

const INSTR_HEADER_SIZE: u32 = 16;
/// Synthetic opcodes for conditional and unconditional jumps, since the
/// representative format tables don't carry every numbered-family
/// control-flow opcode; a real signature table entry (or an eclmap
/// override) takes precedence whenever one names these ids explicitly.
const OP_JUMP: u16 = 10;
const OP_JUMP_IF: u16 = 11;
const OP_JUMP_UNLESS: u16 = 12;

struct PendingLabelRef {
    sub_index: usize,
    item_index: usize,
    param_index: usize,
    label: String,
}

pub fn lower_module(
    ast: &ModuleAst,
    version: u32,
    eclmap: Option<&EclMap>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Module> {
    if !ast.no_warn {
        validate_sub_calls(ast, diagnostics);
    }

    let mut module = Module::new(version);
    module.anim_names = ast.anim_names.clone();
    module.ecli_names = ast.ecli_names.clone();
    module.include_names = ast.include_names.clone();
    module.no_warn = ast.no_warn;

    let mut pending_refs = Vec::new();
    for (sub_index, sub_decl) in ast.subs.iter().enumerate() {
        let sub = lower_sub(sub_decl, version, eclmap, sub_index, &mut pending_refs, diagnostics)?;
        module.subs.push(sub);
    }

    assign_offsets(&mut module);
    backpatch_labels(&mut module, &pending_refs, diagnostics)?;

    Ok(module)
}

/// §4.7 "Sub-call validation": for every `@name(...)` call, look up `name`
/// in the module's sub table and compare argument count and each
/// argument's type tag against the callee's declared format (derived from
/// its `$`/`%` parameter sigils). Suppressed entirely when `#nowarn` is in
/// effect.
fn validate_sub_calls(ast: &ModuleAst, diagnostics: &mut Vec<Diagnostic>) {
    for sub_decl in &ast.subs {
        for stmt in &sub_decl.body {
            let Stmt::AsyncCall { name, args, .. } = stmt else { continue };
            let Some(callee) = ast.subs.iter().find(|s| &s.name == name) else {
                crate::diagnostic::warn(diagnostics, Diagnostic::UnknownSub { name: name.clone() });
                continue;
            };
            if args.len() != callee.params.len() {
                crate::diagnostic::warn(
                    diagnostics,
                    Diagnostic::Other(format!(
                        "sub '{name}' called with {} argument(s), declared with {}",
                        args.len(),
                        callee.params.len()
                    )),
                );
                continue;
            }
            for (i, (arg, param)) in args.iter().zip(&callee.params).enumerate() {
                let expected = sub_param_type_tag(param);
                let actual = arg_type_tag(arg);
                if expected != '?' && actual != '?' && expected != actual {
                    crate::diagnostic::warn(
                        diagnostics,
                        Diagnostic::Other(format!(
                            "sub '{name}' argument {i}: expected type '{expected}', got '{actual}'"
                        )),
                    );
                }
            }
        }
    }
}

/// `$name` params are integers (`S`), `%name` params are floats (`f`).
fn sub_param_type_tag(param: &str) -> char {
    if param.starts_with('%') {
        'f'
    } else {
        'S'
    }
}

/// Literals and bare variables carry a known static type; everything else
/// (nested expressions, string arguments) is treated as `?` and skipped by
/// the type check rather than guessed at.
fn arg_type_tag(arg: &Arg) -> char {
    match arg {
        Arg::Str(_) => '?',
        Arg::Expr(Expr::Integer(_)) => 'S',
        Arg::Expr(Expr::Float(_)) => 'f',
        Arg::Expr(Expr::Var(name)) => sub_param_type_tag(name),
        Arg::Expr(_) => '?',
    }
}

fn lower_sub(
    sub_decl: &SubDecl,
    version: u32,
    eclmap: Option<&EclMap>,
    sub_index: usize,
    pending_refs: &mut Vec<PendingLabelRef>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<Sub> {
    let mut sub = Sub::new(sub_decl.name.clone());
    sub.forward_declaration = sub_decl.forward_declaration;
    sub.format = Some(sub_decl.params.iter().map(|p| sub_param_type_tag(p)).collect());
    if sub_decl.forward_declaration {
        return Ok(sub);
    }

    let mut current_time: i64 = 0;
    let mut stack_depth: i32 = 0;

    for stmt in &sub_decl.body {
        match stmt {
            Stmt::Label(name) => sub.items.push(Item::Label(name.clone())),
            Stmt::Time(value, relative) => {
                current_time = if *relative { current_time + value } else { *value };
                sub.items.push(Item::Time(current_time as u32));
            }
            Stmt::Rank(mask) => sub.items.push(Item::Rank(parse_rank_mask(mask, diagnostics))),
            Stmt::VarDecl(_) => {
                // purely a front-end declaration; has no binary representation
            }
            Stmt::Return(_) => {}
            Stmt::Call { name, args } => {
                let opcode = resolve_opcode_name(name, eclmap, diagnostics);
                let mut instr = Instruction::new(opcode);
                for arg in args {
                    instr.params.push(lower_arg(arg, version, &mut sub.items, &mut stack_depth));
                }
                sub.items.push(Item::Instr(instr));
            }
            Stmt::AsyncCall { name, args, id } => {
                let opcode = resolve_opcode_name(name, eclmap, diagnostics);
                let mut instr = Instruction::new(opcode);
                for arg in args {
                    instr.params.push(lower_arg(arg, version, &mut sub.items, &mut stack_depth));
                }
                if let Some(id_expr) = id {
                    instr.params.push(lower_expr(id_expr, version, &mut sub.items, &mut stack_depth));
                }
                sub.items.push(Item::Instr(instr));
            }
            Stmt::Goto { label, time } => {
                lower_jump(OP_JUMP, None, label, time, version, &mut sub, sub_index, pending_refs, &mut stack_depth);
            }
            Stmt::If { cond, label, time } => {
                lower_jump(
                    OP_JUMP_IF,
                    Some(cond),
                    label,
                    time,
                    version,
                    &mut sub,
                    sub_index,
                    pending_refs,
                    &mut stack_depth,
                );
            }
            Stmt::Unless { cond, label, time } => {
                lower_jump(
                    OP_JUMP_UNLESS,
                    Some(cond),
                    label,
                    time,
                    version,
                    &mut sub,
                    sub_index,
                    pending_refs,
                    &mut stack_depth,
                );
            }
        }
    }

    Ok(sub)
}

#[allow(clippy::too_many_arguments)]
fn lower_jump(
    opcode: u16,
    cond: Option<&Expr>,
    label: &str,
    time: &Option<Expr>,
    version: u32,
    sub: &mut Sub,
    sub_index: usize,
    pending_refs: &mut Vec<PendingLabelRef>,
    stack_depth: &mut i32,
) {
    let mut instr = Instruction::new(opcode);
    if let Some(cond_expr) = cond {
        instr.params.push(lower_expr(cond_expr, version, &mut sub.items, stack_depth));
    }
    // placeholder offset, backpatched once every sub's instruction offsets are known
    instr.params.push(Param::new('o', Value::S32(0)));
    let time_value = time
        .as_ref()
        .and_then(|e| if let Expr::Integer(v) = e { Some(*v as i32) } else { None })
        .unwrap_or(0);
    instr.params.push(Param::new('t', Value::S32(time_value)));

    let offset_param_index = instr.params.len() - 2;
    sub.items.push(Item::Instr(instr));
    pending_refs.push(PendingLabelRef {
        sub_index,
        item_index: sub.items.len() - 1,
        param_index: offset_param_index,
        label: label.to_string(),
    });
}

fn lower_arg(arg: &Arg, version: u32, items: &mut Vec<Item>, stack_depth: &mut i32) -> Param {
    match arg {
        Arg::Str(s) => Param::new('z', Value::Str(s.clone().into_bytes())),
        Arg::Expr(e) => lower_expr(e, version, items, stack_depth),
    }
}

/// Lowers one expression bottom-up. Leaves (literals, bare variables,
/// raw stack slots) become an immediate [`Param`] with no instruction
/// emitted; anything with an operator emits one instruction per node and
/// returns a [`Param`] referencing its result on the value stack.
fn lower_expr(expr: &Expr, version: u32, items: &mut Vec<Item>, stack_depth: &mut i32) -> Param {
    match expr {
        Expr::Integer(v) => Param::new('S', Value::S32(*v as i32)),
        Expr::Float(v) => Param::new('f', Value::F32(*v as f32)),
        Expr::Str(s) => Param::new('z', Value::Str(s.clone().into_bytes())),
        Expr::Var(name) => Param::new('S', Value::S32(var_slot(name))),
        Expr::StackSlot(inner) => {
            let mut p = lower_expr(inner, version, items, stack_depth);
            p.type_tag = 'S';
            p
        }
        Expr::Unary(UnOp::Neg, inner) => {
            let operand = lower_expr(inner, version, items, stack_depth);
            emit_operator(expr_contract::NEG_OPCODE, vec![operand], version, items, stack_depth)
        }
        Expr::Unary(UnOp::Not | UnOp::BitNot, inner) => {
            // representative contract has no dedicated logical/bitwise-not
            // opcode; fold through as a same-arity passthrough.
            lower_expr(inner, version, items, stack_depth)
        }
        Expr::Binary(op, lhs, rhs) => {
            let lhs_param = lower_expr(lhs, version, items, stack_depth);
            let rhs_param = lower_expr(rhs, version, items, stack_depth);
            match expr_contract::opcode_for_binop(*op) {
                Some(opcode) => emit_operator(opcode, vec![lhs_param, rhs_param], version, items, stack_depth),
                None => lhs_param, // operator not in the representative contract; best-effort passthrough
            }
        }
        Expr::Call(name, args) => {
            let lowered: Vec<Param> = args
                .iter()
                .map(|a| lower_expr(a, version, items, stack_depth))
                .collect();
            match expr_contract::opcode_for_call(name) {
                Some(opcode) => emit_operator(opcode, lowered, version, items, stack_depth),
                None => lowered.into_iter().next().unwrap_or(Param::new('S', Value::S32(0))),
            }
        }
    }
}

fn emit_operator(opcode: u16, operands: Vec<Param>, version: u32, items: &mut Vec<Item>, stack_depth: &mut i32) -> Param {
    let mut instr = Instruction::new(opcode);
    instr.params = operands;
    items.push(Item::Instr(instr));
    *stack_depth += 1;
    // stack-slot immediate encoding (§4.7): pre-v13 uses a flat -1
    // sentinel, v13+ packs the depth so nested results don't collide.
    let value = if version >= 13 { -(*stack_depth) } else { -1 };
    Param {
        type_tag: 'S',
        value: Value::S32(value),
        on_stack: true,
    }
}

/// `$name`/`%name` variables with no declared slot map to a stable but
/// arbitrary negative id, distinguishing them from stack-result
/// references without needing a symbol table at this layer.
fn var_slot(name: &str) -> i32 {
    let hash: u32 = name.bytes().fold(5381u32, |acc, b| acc.wrapping_mul(33).wrapping_add(b as u32));
    -((hash % 4096) as i32) - 10_000
}

/// Resolves a call target's mnemonic to a numeric opcode: a loaded
/// eclmap's `!ins_names` table is consulted first (the real point of
/// eclmap), falling back to stripping a leading non-digit prefix and
/// parsing the remainder (the `ins_5`-style convention used when no map
/// is loaded) only when no mnemonic match exists.
fn resolve_opcode_name(name: &str, eclmap: Option<&EclMap>, diagnostics: &mut Vec<Diagnostic>) -> u16 {
    if let Some(map) = eclmap {
        if let Some(id) = map.ins_id(name) {
            if let Ok(id) = u16::try_from(id) {
                return id;
            }
        }
    }
    let digits: String = name.chars().skip_while(|c| !c.is_ascii_digit()).collect();
    match digits.parse::<u16>() {
        Ok(n) => n,
        Err(_) => {
            crate::diagnostic::warn(diagnostics, Diagnostic::UnknownSub { name: name.to_string() });
            0
        }
    }
}

fn parse_rank_mask(mask: &str, diagnostics: &mut Vec<Diagnostic>) -> u8 {
    if let Some(hex) = mask.strip_prefix("0x") {
        if let Ok(v) = u8::from_str_radix(hex, 16) {
            return v;
        }
    }
    let mut bits = 0u8;
    for c in mask.chars() {
        let bit = match c {
            'e' | 'E' => 0,
            'n' | 'N' => 1,
            'h' | 'H' => 2,
            'l' | 'L' => 3,
            'x' | 'X' => 4,
            _ => {
                crate::diagnostic::warn(
                    diagnostics,
                    Diagnostic::Other(format!("unrecognized rank mask letter '{c}'")),
                );
                continue;
            }
        };
        bits |= 1 << bit;
    }
    bits
}

fn instr_size(instr: &Instruction) -> u32 {
    let mut buf = Vec::new();
    let mut n = 0usize;
    for param in &instr.params {
        n += param.value.to_data(&mut buf);
    }
    INSTR_HEADER_SIZE + n as u32
}

fn assign_offsets(module: &mut Module) {
    for sub in &mut module.subs {
        let mut offset = 0u32;
        for item in &mut sub.items {
            if let Item::Instr(instr) = item {
                instr.offset = offset;
                offset += instr_size(instr);
            }
        }
    }
}

fn backpatch_labels(module: &mut Module, pending: &[PendingLabelRef], diagnostics: &mut Vec<Diagnostic>) -> Result<()> {
    // A label names the offset of the next instruction that follows it,
    // not the one before it; several labels may stack up before one
    // instruction (e.g. a fallthrough target shared by two gotos).
    let label_offsets: Vec<HashMap<String, u32>> = module
        .subs
        .iter()
        .map(|sub| {
            let mut map = HashMap::new();
            let mut pending_names: Vec<&str> = Vec::new();
            for item in &sub.items {
                match item {
                    Item::Label(name) => pending_names.push(name),
                    Item::Instr(i) => {
                        for name in pending_names.drain(..) {
                            map.insert(name.to_string(), i.offset);
                        }
                    }
                    _ => {}
                }
            }
            map
        })
        .collect();

    for reference in pending {
        let Some(&target) = label_offsets[reference.sub_index].get(&reference.label) else {
            crate::diagnostic::warn(
                diagnostics,
                Diagnostic::UnknownSub {
                    name: format!("label '{}'", reference.label),
                },
            );
            continue;
        };

        let sub = &mut module.subs[reference.sub_index];
        let Item::Instr(instr) = &mut sub.items[reference.item_index] else {
            return Err(Error::validation("label backpatch target is not an instruction"));
        };
        let relative = target as i64 - instr.offset as i64;
        instr.params[reference.param_index].value = Value::S32(relative as i32);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::parser::parse;

    #[test]
    fn lowers_a_simple_call_with_a_literal_argument() {
        let ast = parse("void main() { ins_5(42); }").unwrap();
        let mut diags = Vec::new();
        let module = lower_module(&ast, 10, None, &mut diags).unwrap();
        let sub = &module.subs[0];
        let instr = sub.instructions().next().unwrap();
        assert_eq!(instr.opcode, 5);
        assert_eq!(instr.params[0].value, Value::S32(42));
    }

    #[test]
    fn lowers_an_arithmetic_expression_into_a_folded_instruction() {
        let ast = parse("void main() { ins_1(1 + 2); }").unwrap();
        let mut diags = Vec::new();
        let module = lower_module(&ast, 10, None, &mut diags).unwrap();
        let sub = &module.subs[0];
        let instrs: Vec<_> = sub.instructions().collect();
        assert_eq!(instrs[0].opcode, expr_contract::opcode_for_binop(BinOp::Add).unwrap());
        assert_eq!(instrs[1].opcode, 1);
        assert!(instrs[1].params[0].on_stack);
    }

    #[test]
    fn backpatches_a_forward_goto_to_the_right_relative_offset() {
        let ast = parse("void main() { ins_1(1); goto done; done: ins_2(2); }").unwrap();
        let mut diags = Vec::new();
        let module = lower_module(&ast, 10, None, &mut diags).unwrap();
        let sub = &module.subs[0];
        let instrs: Vec<_> = sub.instructions().collect();
        let jump = instrs.iter().find(|i| i.opcode == OP_JUMP).unwrap();
        let offset_param = &jump.params[0];
        assert_eq!(offset_param.value.as_i64().unwrap(), (instrs[2].offset as i64) - (jump.offset as i64));
    }

    #[test]
    fn pre_v13_stack_results_use_a_flat_sentinel() {
        let ast = parse("void main() { ins_1(1 + 2); }").unwrap();
        let mut diags = Vec::new();
        let module = lower_module(&ast, 10, None, &mut diags).unwrap();
        let add = module.subs[0].instructions().nth(1).unwrap();
        assert_eq!(add.params[0].value, Value::S32(-1));
    }

    #[test]
    fn resolves_a_real_mnemonic_through_a_loaded_eclmap() {
        let map = crate::script::eclmap::parse("3 wait").unwrap();
        let ast = parse("void main() { wait(42); }").unwrap();
        let mut diags = Vec::new();
        let module = lower_module(&ast, 10, Some(&map), &mut diags).unwrap();
        let instr = module.subs[0].instructions().next().unwrap();
        assert_eq!(instr.opcode, 3);
        assert!(diags.is_empty());
    }

    #[test]
    fn warns_on_a_call_to_an_undeclared_sub() {
        let ast = parse("void main() { @missing(1); }").unwrap();
        let mut diags = Vec::new();
        lower_module(&ast, 10, None, &mut diags).unwrap();
        assert!(matches!(diags[0], Diagnostic::UnknownSub { ref name } if name == "missing"));
    }

    #[test]
    fn warns_on_a_sub_call_with_the_wrong_argument_count() {
        let ast = parse("void helper($A); void main() { @helper(1, 2); }").unwrap();
        let mut diags = Vec::new();
        lower_module(&ast, 10, None, &mut diags).unwrap();
        assert!(!diags.is_empty());
    }

    #[test]
    fn nowarn_suppresses_sub_call_validation() {
        let ast = parse("#nowarn \"true\"; void main() { @missing(1); }").unwrap();
        let mut diags = Vec::new();
        lower_module(&ast, 10, None, &mut diags).unwrap();
        assert!(diags.is_empty());
    }
}
