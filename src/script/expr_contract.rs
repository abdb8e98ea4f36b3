//! Expression contract (§4.6 "Expression folding", §4.7 "Expression
//! lowering"), grounded on the binary-operator dispatch in `thecl/expr.c`
//! (`EXPR_*` opcode-to-operator table) generalized into one data table
//! the lifter and lowerer both consult, instead of the original's split
//! between a lift-side table and a parser-side grammar rule per operator.

/// One opcode's entry in the expression contract: how many stack values
/// it consumes, what type it returns, and the text template used to fold
/// it (and its dependencies) into a single expression during lifting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExprEntry {
    pub opcode: u16,
    pub ret_type: char,
    pub stack_arity: u8,
    pub template: &'static str,
    pub no_brackets: bool,
}

/// A representative slice of the expression contract: enough binary,
/// unary and comparison operators to exercise folding end to end.
/// Additional opcodes are looked up the same way; this table only needs
/// to grow as more of a given version's real opcode set is mapped.
const TABLE: &[ExprEntry] = &[
    ExprEntry { opcode: 20, ret_type: 'S', stack_arity: 2, template: "({s0} + {s1})", no_brackets: false },
    ExprEntry { opcode: 21, ret_type: 'S', stack_arity: 2, template: "({s0} - {s1})", no_brackets: false },
    ExprEntry { opcode: 22, ret_type: 'S', stack_arity: 2, template: "({s0} * {s1})", no_brackets: false },
    ExprEntry { opcode: 23, ret_type: 'S', stack_arity: 2, template: "({s0} / {s1})", no_brackets: false },
    ExprEntry { opcode: 24, ret_type: 'S', stack_arity: 2, template: "({s0} % {s1})", no_brackets: false },
    ExprEntry { opcode: 25, ret_type: 'S', stack_arity: 1, template: "-{s0}", no_brackets: true },
    ExprEntry { opcode: 30, ret_type: 'S', stack_arity: 2, template: "({s0} == {s1})", no_brackets: false },
    ExprEntry { opcode: 31, ret_type: 'S', stack_arity: 2, template: "({s0} != {s1})", no_brackets: false },
    ExprEntry { opcode: 32, ret_type: 'S', stack_arity: 2, template: "({s0} < {s1})", no_brackets: false },
    ExprEntry { opcode: 33, ret_type: 'S', stack_arity: 2, template: "({s0} <= {s1})", no_brackets: false },
    ExprEntry { opcode: 34, ret_type: 'S', stack_arity: 2, template: "({s0} > {s1})", no_brackets: false },
    ExprEntry { opcode: 35, ret_type: 'S', stack_arity: 2, template: "({s0} >= {s1})", no_brackets: false },
    ExprEntry { opcode: 40, ret_type: 'S', stack_arity: 2, template: "({s0} && {s1})", no_brackets: false },
    ExprEntry { opcode: 41, ret_type: 'S', stack_arity: 2, template: "({s0} || {s1})", no_brackets: false },
    ExprEntry { opcode: 50, ret_type: 'S', stack_arity: 1, template: "sin({s0})", no_brackets: true },
    ExprEntry { opcode: 51, ret_type: 'S', stack_arity: 1, template: "cos({s0})", no_brackets: true },
    ExprEntry { opcode: 52, ret_type: 'S', stack_arity: 1, template: "sqrt({s0})", no_brackets: true },
];

pub fn lookup(opcode: u16) -> Option<&'static ExprEntry> {
    TABLE.iter().find(|e| e.opcode == opcode)
}

/// The opcode a binary operator lowers to. The inverse of the fold the
/// lifter performs when it sees one of these opcodes on the instruction
/// stream.
pub fn opcode_for_binop(op: crate::script::ast::BinOp) -> Option<u16> {
    use crate::script::ast::BinOp;
    Some(match op {
        BinOp::Add => 20,
        BinOp::Sub => 21,
        BinOp::Mul => 22,
        BinOp::Div => 23,
        BinOp::Mod => 24,
        BinOp::Eq => 30,
        BinOp::Ne => 31,
        BinOp::Lt => 32,
        BinOp::Le => 33,
        BinOp::Gt => 34,
        BinOp::Ge => 35,
        BinOp::And => 40,
        BinOp::Or => 41,
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor | BinOp::Shl | BinOp::Shr => return None,
    })
}

/// The opcode a unary function-style operator lowers to.
pub fn opcode_for_call(name: &str) -> Option<u16> {
    match name {
        "sin" => Some(50),
        "cos" => Some(51),
        "sqrt" => Some(52),
        _ => None,
    }
}

pub const NEG_OPCODE: u16 = 25;

/// Substitutes `s0..sN` (consumed stack operands, as already-folded text)
/// into an entry's template, in the order they were popped.
pub fn render(entry: &ExprEntry, operands: &[String]) -> String {
    let mut out = entry.template.to_string();
    for (i, operand) in operands.iter().enumerate() {
        out = out.replace(&format!("{{s{i}}}"), operand);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_a_binary_template() {
        let entry = lookup(20).unwrap();
        assert_eq!(render(entry, &["1".to_string(), "2".to_string()]), "(1 + 2)");
    }

    #[test]
    fn unary_template_has_no_brackets_flag_set() {
        let entry = lookup(25).unwrap();
        assert!(entry.no_brackets);
        assert_eq!(render(entry, &["5".to_string()]), "-5");
    }

    #[test]
    fn unknown_opcode_has_no_contract_entry() {
        assert!(lookup(9999).is_none());
    }
}
