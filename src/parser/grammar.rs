//! Contract Grammar
//!
//! Recursive-descent parser for contract blocks:
//!
//! ```text
//! contract  := header post [future]
//! header    := IDENT "(" [IDENT ("," IDENT)*] ")" ":"
//! post      := "Post" pbranch ("\/" pbranch)*
//! pbranch   := "(" guard "," effect ")"
//! future    := "Future" fbranch ("\/" fbranch)*
//! fbranch   := "(" guard "," regex ")"
//! guard     := "TRUE" | cmp | "!" "(" cmp ")"
//! cmp       := IDENT "=" (NUMBER | IDENT)
//! effect    := "𝝐" | "consume" "(" IDENT ")" | IDENT "(" IDENT ")"
//! regex     := concat ("\/" concat)*
//! concat    := repeat ("·" repeat)*
//! repeat    := atom ["^*"]
//! atom      := "𝝐" | "(" regex ")" | ["!"] sym
//! sym       := "_" ["(" IDENT ")"] | IDENT ["(" IDENT ")"]
//! ```
//!
//! Anything outside this grammar is a located `ParseError`.

use crate::contract::types::{
    Contract, EventSym, FutureBranch, FutureExpr, Guard, GuardOperand, PostBranch, PostEffect,
};
use crate::parser::lexer::{tokenize, Token, TokenKind};
use crate::{Error, Result};

/// One contract block extracted from a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractBlock {
    /// Block text, markers stripped
    pub text: String,
    /// 1-based line of the block's first line in the enclosing file
    pub start_line: usize,
}

/// Split contract source text into blocks.
///
/// Sources embed contracts in `/*@ ... @*/` annotation comments (plain
/// `/* ... @*/` also occurs); when such markers are present only annotated
/// comments are taken, everything else is surrounding program text. Bare
/// contract listings without markers are split at `name(params):` header
/// lines.
pub fn split_blocks(text: &str) -> Vec<ContractBlock> {
    if text.contains("@*/") {
        split_annotation_comments(text)
    } else {
        split_at_headers(text)
    }
}

fn line_of(text: &str, byte_offset: usize) -> usize {
    text[..byte_offset].matches('\n').count() + 1
}

fn split_annotation_comments(text: &str) -> Vec<ContractBlock> {
    let mut blocks = Vec::new();
    let mut rest = 0;
    while let Some(open) = text[rest..].find("/*") {
        let open = rest + open;
        let body_start = open + 2;
        let Some(close) = text[body_start..].find("*/") else {
            break;
        };
        let close = body_start + close;
        rest = close + 2;

        // Only comments terminated by `@*/` carry contracts
        if !text[..close].ends_with('@') {
            continue;
        }
        let body = &text[body_start..close - 1];
        let body = body.strip_prefix('@').unwrap_or(body);
        blocks.push(ContractBlock {
            text: body.to_string(),
            start_line: line_of(text, body_start),
        });
    }
    blocks
}

fn is_header_line(line: &str) -> bool {
    let trimmed = line.trim_end();
    let Some(rest) = trimmed.strip_suffix(':') else {
        return false;
    };
    let trimmed = rest.trim_start();
    let mut chars = trimmed.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && trimmed.contains('(')
        && trimmed.ends_with(')')
}

fn split_at_headers(text: &str) -> Vec<ContractBlock> {
    let mut blocks: Vec<ContractBlock> = Vec::new();
    let mut current: Option<ContractBlock> = None;

    for (index, line) in text.lines().enumerate() {
        if is_header_line(line) {
            if let Some(block) = current.take() {
                blocks.push(block);
            }
            current = Some(ContractBlock {
                text: String::new(),
                start_line: index + 1,
            });
        }
        if let Some(block) = current.as_mut() {
            block.text.push_str(line);
            block.text.push('\n');
        } else if !line.trim().is_empty() {
            // Content before any header: let the parser produce a located
            // error instead of dropping it silently
            current = Some(ContractBlock {
                text: format!("{}\n", line),
                start_line: index + 1,
            });
        }
    }
    if let Some(block) = current.take() {
        blocks.push(block);
    }
    blocks
}

/// Parse one contract block
pub fn parse_contract(block: &ContractBlock) -> Result<Contract> {
    let tokens = tokenize(&block.text, block.start_line)?;
    let mut parser = Parser { tokens, pos: 0 };
    parser.contract(&block.text)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: &str) -> Error {
        Error::Parse {
            line: token.line,
            column: token.column,
            message: message.to_string(),
        }
    }

    fn error_here(&self, message: &str) -> Error {
        let token = self.peek().clone();
        self.error_at(
            &token,
            &format!("{}, found {}", message, token.kind.describe()),
        )
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error_here(&format!("expected {}", kind.describe())))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Token)> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                Ok((name, token))
            }
            _ => Err(self.error_here(&format!("expected {}", what))),
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<()> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Ident(name) if name == keyword => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error_here(&format!("expected '{}'", keyword))),
        }
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(name) if name == keyword)
    }

    fn contract(&mut self, source: &str) -> Result<Contract> {
        let (name, _) = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if self.peek().kind != TokenKind::RParen {
            loop {
                let (param, token) = self.expect_ident("parameter name")?;
                if param == "ret" {
                    return Err(self.error_at(&token, "'ret' is reserved for the return value"));
                }
                if params.contains(&param) {
                    return Err(
                        self.error_at(&token, &format!("duplicate parameter '{}'", param))
                    );
                }
                params.push(param);
                if self.peek().kind == TokenKind::Comma {
                    self.advance();
                } else {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen)?;
        self.expect(TokenKind::Colon)?;

        self.expect_keyword("Post")?;
        let mut post = vec![self.post_branch(&params)?];
        while self.peek().kind == TokenKind::Union {
            self.advance();
            post.push(self.post_branch(&params)?);
        }

        let mut future = Vec::new();
        if self.at_keyword("Future") {
            self.advance();
            future.push(self.future_branch(&params)?);
            while self.peek().kind == TokenKind::Union {
                self.advance();
                future.push(self.future_branch(&params)?);
            }
        }

        self.expect(TokenKind::Eof)?;

        Ok(Contract {
            name,
            params,
            post,
            future,
            source: source.trim().to_string(),
        })
    }

    fn post_branch(&mut self, params: &[String]) -> Result<PostBranch> {
        self.expect(TokenKind::LParen)?;
        let guard = self.guard()?;
        self.expect(TokenKind::Comma)?;
        let effect = self.effect(params)?;
        self.expect(TokenKind::RParen)?;
        Ok(PostBranch { guard, effect })
    }

    fn future_branch(&mut self, params: &[String]) -> Result<FutureBranch> {
        let opening = self.peek().clone();
        self.expect(TokenKind::LParen)?;
        let guard = self.guard()?;
        self.expect(TokenKind::Comma)?;
        let mut bindings = Vec::new();
        let expr = self.regex_union(&mut bindings)?;
        self.expect(TokenKind::RParen)?;

        bindings.sort();
        bindings.dedup();
        if bindings.len() > 1 {
            return Err(self.error_at(
                &opening,
                &format!(
                    "future expression must track a single identity, found bindings {}",
                    bindings.join(", ")
                ),
            ));
        }
        let binding = bindings.pop().unwrap_or_else(|| "ret".to_string());
        self.check_binding(&binding, params, &opening)?;

        Ok(FutureBranch {
            guard,
            binding,
            expr,
            dfa: None,
        })
    }

    fn check_binding(&self, binding: &str, params: &[String], token: &Token) -> Result<()> {
        if binding == "ret" || params.iter().any(|p| p == binding) {
            Ok(())
        } else {
            Err(self.error_at(
                token,
                &format!("unknown binding '{}': not a parameter or 'ret'", binding),
            ))
        }
    }

    fn guard(&mut self) -> Result<Guard> {
        match self.peek().kind.clone() {
            TokenKind::Ident(name) if name == "TRUE" => {
                self.advance();
                Ok(Guard::True)
            }
            TokenKind::Bang => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let (var, operand) = self.comparison()?;
                self.expect(TokenKind::RParen)?;
                Ok(Guard::Neq(var, operand))
            }
            _ => {
                let (var, operand) = self.comparison()?;
                Ok(Guard::Eq(var, operand))
            }
        }
    }

    fn comparison(&mut self) -> Result<(String, GuardOperand)> {
        let (var, _) = self.expect_ident("guard variable")?;
        self.expect(TokenKind::Eq)?;
        let token = self.peek().clone();
        let operand = match &token.kind {
            TokenKind::Num(n) => {
                let n = *n;
                self.advance();
                GuardOperand::Int(n)
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                GuardOperand::Param(name)
            }
            _ => return Err(self.error_here("expected integer or parameter after '='")),
        };
        Ok((var, operand))
    }

    fn effect(&mut self, params: &[String]) -> Result<PostEffect> {
        let token = self.peek().clone();
        match &token.kind {
            TokenKind::Epsilon => {
                self.advance();
                Ok(PostEffect::Epsilon)
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                self.expect(TokenKind::LParen)?;
                let (binding, binding_token) = self.expect_ident("effect binding")?;
                self.expect(TokenKind::RParen)?;
                self.check_binding(&binding, params, &binding_token)?;
                if name == "consume" {
                    Ok(PostEffect::Consume { binding })
                } else {
                    Ok(PostEffect::Event { name, binding })
                }
            }
            _ => Err(self.error_here("expected effect (event, consume, or \u{1D750})")),
        }
    }

    fn regex_union(&mut self, bindings: &mut Vec<String>) -> Result<FutureExpr> {
        let mut expr = self.regex_concat(bindings)?;
        while self.peek().kind == TokenKind::Union {
            self.advance();
            let rhs = self.regex_concat(bindings)?;
            expr = FutureExpr::union(expr, rhs);
        }
        Ok(expr)
    }

    fn regex_concat(&mut self, bindings: &mut Vec<String>) -> Result<FutureExpr> {
        let mut expr = self.regex_repeat(bindings)?;
        while self.peek().kind == TokenKind::Seq {
            self.advance();
            let rhs = self.regex_repeat(bindings)?;
            expr = FutureExpr::seq(expr, rhs);
        }
        Ok(expr)
    }

    fn regex_repeat(&mut self, bindings: &mut Vec<String>) -> Result<FutureExpr> {
        let expr = self.regex_atom(bindings)?;
        if self.peek().kind == TokenKind::Star {
            self.advance();
            Ok(FutureExpr::star(expr))
        } else {
            Ok(expr)
        }
    }

    fn regex_atom(&mut self, bindings: &mut Vec<String>) -> Result<FutureExpr> {
        match self.peek().kind.clone() {
            TokenKind::Epsilon => {
                self.advance();
                Ok(FutureExpr::Epsilon)
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.regex_union(bindings)?;
                self.expect(TokenKind::RParen)?;
                Ok(expr)
            }
            TokenKind::Bang => {
                self.advance();
                let sym = self.regex_sym(bindings)?;
                Ok(FutureExpr::Complement(sym))
            }
            _ => {
                let sym = self.regex_sym(bindings)?;
                Ok(FutureExpr::Event(sym))
            }
        }
    }

    fn regex_sym(&mut self, bindings: &mut Vec<String>) -> Result<EventSym> {
        let token = self.peek().clone();
        let sym = match &token.kind {
            TokenKind::Underscore => {
                self.advance();
                EventSym::Any
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                EventSym::Named(name)
            }
            _ => return Err(self.error_here("expected event name or '_'")),
        };
        if self.peek().kind == TokenKind::LParen {
            self.advance();
            let (binding, _) = self.expect_ident("event binding")?;
            self.expect(TokenKind::RParen)?;
            bindings.push(binding);
        }
        Ok(sym)
    }
}
