//! Script engine (§4 "Script core"): the text/binary disassembler and
//! assembler pair for the `thecl`-family instruction format, generalized
//! across the numbered family (v10 and up) and the older pre-v10 family.

pub mod ast;
pub mod eclmap;
pub mod expr_contract;
pub mod format;
pub mod instr;
pub mod lexer;
pub mod lift;
pub mod lower;
pub mod parser;

use crate::diagnostic::Diagnostic;
use crate::error::Result;
use crate::io::Io;

pub use eclmap::EclMap;
pub use format::FormatOverrides;
pub use instr::Module;

/// Disassembles a binary ECL module into its textual DSL form.
///
/// `overrides` comes from an optionally loaded eclmap and takes
/// precedence over the built-in format tables, per §4.5.
pub fn disassemble(io: Io, version: u32, overrides: Option<&FormatOverrides>, diagnostics: &mut Vec<Diagnostic>) -> Result<String> {
    let module = lift::decode_module(io, version, diagnostics)?;
    Ok(lift::render(&module, overrides))
}

/// Assembles the textual DSL into an in-memory [`Module`], ready to be
/// encoded back to binary by a version-specific writer.
///
/// `eclmap`, when given, resolves call mnemonics to opcodes via its
/// `!ins_names` table before falling back to the `ins_<id>` convention.
pub fn assemble(source: &str, version: u32, eclmap: Option<&EclMap>, diagnostics: &mut Vec<Diagnostic>) -> Result<Module> {
    let ast = parser::parse(source)?;
    lower::lower_module(&ast, version, eclmap, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_and_then_folds_the_resulting_module_back_to_text() {
        let mut diags = Vec::new();
        let module = assemble("void main() { ins_5(1, 2); }", 10, None, &mut diags).unwrap();
        let text = lift::render(&module, None);
        assert!(text.contains("opcode_5(1, 2)"));
    }
}
