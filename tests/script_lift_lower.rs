//! Cross-cutting script round-trip properties (§8): assembling a textual
//! DSL module produces instructions with correctly resolved label
//! offsets, and folding reproduces the expected surface syntax.

use dmtk::script::{assemble, lift};

#[test]
fn labels_referenced_before_their_definition_resolve_to_the_right_offset() {
    let source = "void main() { ins_1(1); goto skip; ins_2(2); skip: ins_3(3); }";
    let mut diagnostics = Vec::new();
    let module = assemble(source, 10, None, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");

    let sub = &module.subs[0];
    let instrs: Vec<_> = sub.instructions().collect();
    let jump = instrs.iter().find(|i| i.opcode == 10).unwrap();
    let target = instrs.iter().find(|i| i.opcode == 3).unwrap();
    let relative = jump.params[0].value.as_i64().unwrap();
    assert_eq!(relative, target.offset as i64 - jump.offset as i64);
}

#[test]
fn labels_referenced_after_their_definition_also_resolve() {
    let source = "void main() { start: ins_1(1); goto start; }";
    let mut diagnostics = Vec::new();
    let module = assemble(source, 10, None, &mut diagnostics).unwrap();
    let sub = &module.subs[0];
    let instrs: Vec<_> = sub.instructions().collect();
    let jump = instrs.iter().find(|i| i.opcode == 10).unwrap();
    let target = instrs.iter().find(|i| i.opcode == 1).unwrap();
    let relative = jump.params[0].value.as_i64().unwrap();
    assert_eq!(relative, target.offset as i64 - jump.offset as i64);
}

#[test]
fn unknown_sub_calls_produce_a_diagnostic_not_an_error() {
    let source = "void main() { not_a_number_opcode(1); }";
    let mut diagnostics = Vec::new();
    let module = assemble(source, 10, None, &mut diagnostics).unwrap();
    assert_eq!(module.subs[0].instructions().count(), 1);
    assert_eq!(diagnostics.len(), 1);
}

#[test]
fn a_nested_arithmetic_expression_lowers_to_one_instruction_per_operator() {
    let source = "void main() { ins_9(1 + 2 * 3); }";
    let mut diagnostics = Vec::new();
    let module = assemble(source, 10, None, &mut diagnostics).unwrap();
    let sub = &module.subs[0];
    let opcodes: Vec<u16> = sub.instructions().map(|i| i.opcode).collect();
    // mul (22), then add (20), then the call itself (9)
    assert_eq!(opcodes, vec![22, 20, 9]);
}

#[test]
fn rendering_a_lowered_module_recovers_recognizable_call_syntax() {
    let source = "void main() { ins_5(7); }";
    let mut diagnostics = Vec::new();
    let module = assemble(source, 10, None, &mut diagnostics).unwrap();
    let text = lift::render(&module, None);
    assert!(text.contains("opcode_5(7)"));
}
