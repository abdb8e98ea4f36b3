//! Recursive-descent parser (§4.7), replacing `thecl`'s bison grammar with
//! hand-written precedence climbing for expressions and a straight-line
//! statement parser for everything else.

use crate::error::{Error, Result};
use crate::script::ast::{Arg, BinOp, Expr, ModuleAst, Stmt, SubDecl, UnOp};
use crate::script::lexer::{Lexer, SpannedToken, Token};

pub struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

pub fn parse(src: &str) -> Result<ModuleAst> {
    let tokens = Lexer::new(src).tokenize()?;
    Parser { tokens, pos: 0 }.parse_module()
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn line(&self) -> usize {
        self.tokens[self.pos].line
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect_punct(&mut self, c: char) -> Result<()> {
        match self.bump() {
            Token::Punct(p) if p == c => Ok(()),
            other => Err(Error::format(format!(
                "script parser line {}: expected '{c}', got {other:?}",
                self.line()
            ))),
        }
    }

    fn expect_keyword(&mut self, kw: &'static str) -> Result<()> {
        match self.bump() {
            Token::Keyword(k) if k == kw => Ok(()),
            other => Err(Error::format(format!(
                "script parser line {}: expected keyword '{kw}', got {other:?}",
                self.line()
            ))),
        }
    }

    fn expect_ident(&mut self) -> Result<String> {
        match self.bump() {
            Token::Ident(name) => Ok(name),
            other => Err(Error::format(format!(
                "script parser line {}: expected identifier, got {other:?}",
                self.line()
            ))),
        }
    }

    fn at_punct(&self, c: char) -> bool {
        matches!(self.peek(), Token::Punct(p) if *p == c)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Keyword(k) if *k == kw)
    }

    fn parse_module(&mut self) -> Result<ModuleAst> {
        let mut module = ModuleAst::default();
        loop {
            match self.peek().clone() {
                Token::Eof => break,
                Token::Keyword("anim") => {
                    self.bump();
                    self.expect_punct('{')?;
                    while !self.at_punct('}') {
                        if let Token::String(s) = self.bump() {
                            module.anim_names.push(s);
                        }
                        if self.at_punct(',') {
                            self.bump();
                        }
                        self.expect_punct(';').ok();
                    }
                    self.expect_punct('}')?;
                }
                Token::Keyword("ecli") => {
                    self.bump();
                    self.expect_punct('{')?;
                    while !self.at_punct('}') {
                        if let Token::String(s) = self.bump() {
                            module.ecli_names.push(s);
                        }
                        self.expect_punct(';').ok();
                    }
                    self.expect_punct('}')?;
                }
                Token::Ident(ident) if ident == "#include" => {
                    self.bump();
                    match self.bump() {
                        Token::String(s) => module.include_names.push(s),
                        other => {
                            return Err(Error::format(format!(
                                "script parser line {}: expected a string after #include, got {other:?}",
                                self.line()
                            )))
                        }
                    }
                    self.expect_punct(';')?;
                }
                Token::Ident(ident) if ident == "#nowarn" => {
                    self.bump();
                    match self.bump() {
                        Token::String(_) => {}
                        other => {
                            return Err(Error::format(format!(
                                "script parser line {}: expected a string after #nowarn, got {other:?}",
                                self.line()
                            )))
                        }
                    }
                    self.expect_punct(';')?;
                    module.no_warn = true;
                }
                Token::Keyword("void") => {
                    module.subs.push(self.parse_sub()?);
                }
                other => {
                    return Err(Error::format(format!(
                        "script parser line {}: unexpected top-level token {other:?}",
                        self.line()
                    )))
                }
            }
        }
        Ok(module)
    }

    fn parse_sub(&mut self) -> Result<SubDecl> {
        self.expect_keyword("void")?;
        let name = self.expect_ident()?;
        self.expect_punct('(')?;
        let mut params = Vec::new();
        while !self.at_punct(')') {
            if let Token::StackVar(v) = self.bump() {
                params.push(v);
            }
            if self.at_punct(',') {
                self.bump();
            }
        }
        self.expect_punct(')')?;

        if self.at_punct(';') {
            self.bump();
            return Ok(SubDecl {
                name,
                params,
                is_inline: false,
                forward_declaration: true,
                body: Vec::new(),
            });
        }

        self.expect_punct('{')?;
        let mut body = Vec::new();
        while !self.at_punct('}') {
            body.push(self.parse_stmt()?);
        }
        self.expect_punct('}')?;
        Ok(SubDecl {
            name,
            params,
            is_inline: false,
            forward_declaration: false,
            body,
        })
    }

    fn parse_stmt(&mut self) -> Result<Stmt> {
        match self.peek().clone() {
            Token::Keyword("var") => {
                self.bump();
                let mut names = Vec::new();
                loop {
                    if let Token::StackVar(v) = self.bump() {
                        names.push(v);
                    }
                    if self.at_punct(',') {
                        self.bump();
                        continue;
                    }
                    break;
                }
                self.expect_punct(';')?;
                Ok(Stmt::VarDecl(names))
            }
            Token::Keyword("goto") => {
                self.bump();
                let label = self.expect_ident()?;
                let time = if matches!(self.peek(), Token::At) {
                    self.bump();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect_punct(';')?;
                Ok(Stmt::Goto { label, time })
            }
            Token::Keyword("if") => {
                self.bump();
                self.expect_punct('(')?;
                let cond = self.parse_expr()?;
                self.expect_punct(')')?;
                self.expect_keyword("goto")?;
                let label = self.expect_ident()?;
                let time = if matches!(self.peek(), Token::At) {
                    self.bump();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect_punct(';')?;
                Ok(Stmt::If { cond, label, time })
            }
            Token::Keyword("unless") => {
                self.bump();
                self.expect_punct('(')?;
                let cond = self.parse_expr()?;
                self.expect_punct(')')?;
                self.expect_keyword("goto")?;
                let label = self.expect_ident()?;
                let time = if matches!(self.peek(), Token::At) {
                    self.bump();
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect_punct(';')?;
                Ok(Stmt::Unless { cond, label, time })
            }
            Token::Keyword("return") => {
                self.bump();
                let value = if self.at_punct(';') { None } else { Some(self.parse_expr()?) };
                self.expect_punct(';')?;
                Ok(Stmt::Return(value))
            }
            Token::At => {
                self.bump();
                let name = self.expect_ident()?;
                self.expect_punct('(')?;
                let args = self.parse_args()?;
                self.expect_punct(')')?;
                let mut id = None;
                if self.at_keyword_ident("async") {
                    self.bump();
                    if self.at_punct('(') {
                        self.bump();
                        id = Some(self.parse_expr()?);
                        self.expect_punct(')')?;
                    }
                }
                self.expect_punct(';')?;
                Ok(Stmt::AsyncCall { name, args, id })
            }
            Token::Punct('!') => {
                self.bump();
                let mask = self.expect_ident()?;
                Ok(Stmt::Rank(mask))
            }
            Token::Integer(_) | Token::Punct('+') => {
                let relative = self.at_punct('+');
                if relative {
                    self.bump();
                }
                let value = match self.bump() {
                    Token::Integer(v) => v,
                    other => {
                        return Err(Error::format(format!(
                            "script parser line {}: expected a time value, got {other:?}",
                            self.line()
                        )))
                    }
                };
                self.expect_punct(':')?;
                Ok(Stmt::Time(value, relative))
            }
            Token::Ident(name) => {
                // either "Label:" or "name(args);"
                let lookahead = self.pos + 1;
                if matches!(self.tokens[lookahead].token, Token::Punct(':')) {
                    self.bump();
                    self.bump();
                    return Ok(Stmt::Label(name));
                }
                self.bump();
                self.expect_punct('(')?;
                let args = self.parse_args()?;
                self.expect_punct(')')?;
                self.expect_punct(';')?;
                Ok(Stmt::Call { name, args })
            }
            other => Err(Error::format(format!(
                "script parser line {}: unexpected statement start {other:?}",
                self.line()
            ))),
        }
    }

    fn at_keyword_ident(&self, s: &str) -> bool {
        match self.peek() {
            Token::Ident(i) => i.as_str() == s,
            Token::Keyword(k) => *k == s,
            _ => false,
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>> {
        let mut args = Vec::new();
        while !self.at_punct(')') {
            if let Token::String(s) = self.peek().clone() {
                self.bump();
                args.push(Arg::Str(s));
            } else {
                args.push(Arg::Expr(self.parse_expr()?));
            }
            if self.at_punct(',') {
                self.bump();
            }
        }
        Ok(args)
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Token::Arrow2('|', '|')) {
            self.bump();
            let rhs = self.parse_and()?;
            lhs = Expr::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_bitor()?;
        while matches!(self.peek(), Token::Arrow2('&', '&')) {
            self.bump();
            let rhs = self.parse_bitor()?;
            lhs = Expr::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_bitxor()?;
        while self.at_punct('|') {
            self.bump();
            let rhs = self.parse_bitxor()?;
            lhs = Expr::Binary(BinOp::BitOr, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitxor(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_bitand()?;
        while self.at_punct('^') {
            self.bump();
            let rhs = self.parse_bitand()?;
            lhs = Expr::Binary(BinOp::BitXor, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_bitand(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_equality()?;
        while self.at_punct('&') {
            self.bump();
            let rhs = self.parse_equality()?;
            lhs = Expr::Binary(BinOp::BitAnd, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Token::Arrow2('=', '=') => BinOp::Eq,
                Token::Arrow2('!', '=') => BinOp::Ne,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_relational()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.peek() {
                Token::Arrow2('<', '=') => BinOp::Le,
                Token::Arrow2('>', '=') => BinOp::Ge,
                Token::Punct('<') => BinOp::Lt,
                Token::Punct('>') => BinOp::Gt,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_shift()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::Arrow2('<', '<') => BinOp::Shl,
                Token::Arrow2('>', '>') => BinOp::Shr,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_additive()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Punct('+') => BinOp::Add,
                Token::Punct('-') => BinOp::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Punct('*') => BinOp::Mul,
                Token::Punct('/') => BinOp::Div,
                Token::Punct('%') => BinOp::Mod,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Token::Punct('-') => {
                self.bump();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Punct('!') => {
                self.bump();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            Token::Punct('~') => {
                self.bump();
                Ok(Expr::Unary(UnOp::BitNot, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        match self.bump() {
            Token::Integer(v) => Ok(Expr::Integer(v)),
            Token::Float(v) => Ok(Expr::Float(v)),
            Token::String(s) => Ok(Expr::Str(s)),
            Token::StackVar(v) => Ok(Expr::Var(v)),
            Token::Ident(name) if matches!(name.as_str(), "sin" | "cos" | "sqrt") => {
                self.expect_punct('(')?;
                let arg = self.parse_expr()?;
                self.expect_punct(')')?;
                let name: &'static str = match name.as_str() {
                    "sin" => "sin",
                    "cos" => "cos",
                    _ => "sqrt",
                };
                Ok(Expr::Call(name, vec![arg]))
            }
            Token::Punct('(') => {
                let inner = self.parse_expr()?;
                self.expect_punct(')')?;
                Ok(inner)
            }
            Token::Punct('[') => {
                let inner = self.parse_expr()?;
                self.expect_punct(']')?;
                Ok(Expr::StackSlot(Box::new(inner)))
            }
            other => Err(Error::format(format!(
                "script parser line {}: unexpected token in expression {other:?}",
                self.line()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_an_empty_sub() {
        let module = parse("void main() {}").unwrap();
        assert_eq!(module.subs.len(), 1);
        assert_eq!(module.subs[0].name, "main");
        assert!(module.subs[0].body.is_empty());
    }

    #[test]
    fn parses_a_forward_declaration() {
        let module = parse("void helper($A, $B);").unwrap();
        assert!(module.subs[0].forward_declaration);
        assert_eq!(module.subs[0].params, vec!["$A".to_string(), "$B".to_string()]);
    }

    #[test]
    fn parses_labels_time_and_an_instruction_call() {
        let module = parse("void main() { 120: loc_0: ins_5(1, 2); }").unwrap();
        let body = &module.subs[0].body;
        assert!(matches!(body[0], Stmt::Time(120, false)));
        assert!(matches!(&body[1], Stmt::Label(n) if n == "loc_0"));
        assert!(matches!(&body[2], Stmt::Call { ref name, .. } if name == "ins_5"));
    }

    #[test]
    fn parses_a_conditional_goto_with_time() {
        let module = parse("void main() { if ($A == 1) goto done @ 60; }").unwrap();
        match &module.subs[0].body[0] {
            Stmt::If { cond, label, time } => {
                assert_eq!(label, "done");
                assert!(time.is_some());
                assert!(matches!(cond, Expr::Binary(BinOp::Eq, _, _)));
            }
            other => panic!("expected If, got {other:?}"),
        }
    }

    #[test]
    fn respects_arithmetic_precedence() {
        let module = parse("void main() { ins_0(1 + 2 * 3); }").unwrap();
        match &module.subs[0].body[0] {
            Stmt::Call { args, .. } => match &args[0] {
                Arg::Expr(Expr::Binary(BinOp::Add, lhs, rhs)) => {
                    assert!(matches!(**lhs, Expr::Integer(1)));
                    assert!(matches!(**rhs, Expr::Binary(BinOp::Mul, _, _)));
                }
                other => panic!("unexpected arg {other:?}"),
            },
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn parses_an_include_directive() {
        let module = parse("#include \"stage1.ecl\"; void main() {}").unwrap();
        assert_eq!(module.include_names, vec!["stage1.ecl".to_string()]);
    }

    #[test]
    fn parses_nowarn_and_consumes_its_string_argument() {
        let module = parse("#nowarn \"true\"; void main() {}").unwrap();
        assert!(module.no_warn);
        assert_eq!(module.subs.len(), 1);
    }

    #[test]
    fn parses_an_async_sub_call_with_id() {
        let module = parse("void main() { @helper(1, 2) async(3); }").unwrap();
        match &module.subs[0].body[0] {
            Stmt::AsyncCall { name, args, id } => {
                assert_eq!(name, "helper");
                assert_eq!(args.len(), 2);
                assert!(id.is_some());
            }
            other => panic!("expected AsyncCall, got {other:?}"),
        }
    }
}
