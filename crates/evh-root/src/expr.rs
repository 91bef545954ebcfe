//! Expression engine for variables and selections over tree branches.
//!
//! Supports arithmetic (+, -, *, /), comparisons (==, !=, <, <=, >, >=),
//! boolean operators (&&, ||, !) and the functions abs, sqrt, log, log10,
//! exp, pow, min, max. Identifiers may contain `.` so that branch members
//! such as `Primary.x` or `Sampler1.kineticEnergy` are single variables.
//! Booleans evaluate to 1.0 / 0.0.

use crate::error::{Result, RootError};

// ── AST ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Node {
    Const(f64),
    Var(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(Op, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Log10,
    Exp,
    Pow,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        Some(match name {
            "abs" | "fabs" => (Func::Abs, 1),
            "sqrt" => (Func::Sqrt, 1),
            "log" => (Func::Log, 1),
            "log10" => (Func::Log10, 1),
            "exp" => (Func::Exp, 1),
            "pow" => (Func::Pow, 2),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            _ => return None,
        })
    }
}

// ── Compiled expression ────────────────────────────────────────

/// A compiled expression ready for evaluation.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    root: Node,
    /// Branch names referenced by this expression (ordered by first occurrence).
    pub required_branches: Vec<String>,
}

impl CompiledExpr {
    /// Parse and compile an expression string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(RootError::Expression("empty expression".into()));
        }
        let mut parser = Parser { tokens: &tokens, pos: 0, branches: Vec::new() };
        let root = parser.or_expr()?;
        if let Some(tok) = parser.tokens.get(parser.pos) {
            return Err(RootError::Expression(format!(
                "unexpected token {tok:?} in '{input}'"
            )));
        }
        Ok(CompiledExpr { root, required_branches: parser.branches })
    }

    /// Evaluate for one row; `values` follows the order of `required_branches`.
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        eval(&self.root, values)
    }

    /// Whether the expression references no branch at all.
    pub fn is_constant(&self) -> bool {
        self.required_branches.is_empty()
    }
}

// ── Evaluation ─────────────────────────────────────────────────

fn truth(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn eval(node: &Node, vals: &[f64]) -> f64 {
    match node {
        Node::Const(c) => *c,
        Node::Var(i) => vals[*i],
        Node::Neg(a) => -eval(a, vals),
        Node::Not(a) => truth(eval(a, vals) == 0.0),
        Node::Binary(op, a, b) => {
            let lhs = eval(a, vals);
            // short-circuit the boolean connectives
            match op {
                Op::And if lhs == 0.0 => return 0.0,
                Op::Or if lhs != 0.0 => return 1.0,
                _ => {}
            }
            let rhs = eval(b, vals);
            match op {
                Op::Add => lhs + rhs,
                Op::Sub => lhs - rhs,
                Op::Mul => lhs * rhs,
                Op::Div => lhs / rhs,
                Op::Eq => truth(lhs == rhs),
                Op::Ne => truth(lhs != rhs),
                Op::Lt => truth(lhs < rhs),
                Op::Le => truth(lhs <= rhs),
                Op::Gt => truth(lhs > rhs),
                Op::Ge => truth(lhs >= rhs),
                Op::And | Op::Or => truth(rhs != 0.0),
            }
        }
        Node::Call(f, args) => {
            let a = eval(&args[0], vals);
            match f {
                Func::Abs => a.abs(),
                Func::Sqrt => a.sqrt(),
                Func::Log => a.ln(),
                Func::Log10 => a.log10(),
                Func::Exp => a.exp(),
                Func::Pow => a.powf(eval(&args[1], vals)),
                Func::Min => a.min(eval(&args[1], vals)),
                Func::Max => a.max(eval(&args[1], vals)),
            }
        }
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Op(Op),
    Minus,
    Not,
    LParen,
    RParen,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let two = bytes.get(i..i + 2);
        let pair = match two {
            Some(b"&&") => Some(Op::And),
            Some(b"||") => Some(Op::Or),
            Some(b"==") => Some(Op::Eq),
            Some(b"!=") => Some(Op::Ne),
            Some(b"<=") => Some(Op::Le),
            Some(b">=") => Some(Op::Ge),
            _ => None,
        };
        if let Some(op) = pair {
            tokens.push(Token::Op(op));
            i += 2;
            continue;
        }

        let single = match c {
            b'+' => Some(Token::Op(Op::Add)),
            b'-' => Some(Token::Minus),
            b'*' => Some(Token::Op(Op::Mul)),
            b'/' => Some(Token::Op(Op::Div)),
            b'<' => Some(Token::Op(Op::Lt)),
            b'>' => Some(Token::Op(Op::Gt)),
            b'!' => Some(Token::Not),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b',' => Some(Token::Comma),
            _ => None,
        };
        if let Some(tok) = single {
            tokens.push(tok);
            i += 1;
            continue;
        }

        let start = i;
        if c.is_ascii_digit() || c == b'.' {
            while i < bytes.len() {
                let d = bytes[i];
                let exp_sign = (d == b'+' || d == b'-')
                    && i > start
                    && matches!(bytes[i - 1], b'e' | b'E');
                if d.is_ascii_digit() || d == b'.' || d == b'e' || d == b'E' || exp_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            let text = &input[start..i];
            let n: f64 = text
                .parse()
                .map_err(|_| RootError::Expression(format!("invalid number '{text}'")))?;
            tokens.push(Token::Num(n));
        } else if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'.')
            {
                i += 1;
            }
            tokens.push(Token::Ident(input[start..i].to_string()));
        } else {
            return Err(RootError::Expression(format!(
                "unexpected character '{}' in '{input}'",
                c as char
            )));
        }
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    branches: Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn eat_op(&mut self, ops: &[Op]) -> Option<Op> {
        if let Some(Token::Op(op)) = self.peek()
            && ops.contains(op)
        {
            let op = *op;
            self.pos += 1;
            return Some(op);
        }
        None
    }

    fn variable(&mut self, name: String) -> usize {
        match self.branches.iter().position(|b| *b == name) {
            Some(i) => i,
            None => {
                self.branches.push(name);
                self.branches.len() - 1
            }
        }
    }

    fn or_expr(&mut self) -> Result<Node> {
        let mut lhs = self.and_expr()?;
        while self.eat_op(&[Op::Or]).is_some() {
            let rhs = self.and_expr()?;
            lhs = Node::Binary(Op::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Node> {
        let mut lhs = self.cmp_expr()?;
        while self.eat_op(&[Op::And]).is_some() {
            let rhs = self.cmp_expr()?;
            lhs = Node::Binary(Op::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn cmp_expr(&mut self) -> Result<Node> {
        let mut lhs = self.add_expr()?;
        while let Some(op) = self.eat_op(&[Op::Eq, Op::Ne, Op::Lt, Op::Le, Op::Gt, Op::Ge]) {
            let rhs = self.add_expr()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Node> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(Op::Add)) => Op::Add,
                Some(Token::Minus) => Op::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.mul_expr()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Node> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.eat_op(&[Op::Mul, Op::Div]) {
            let rhs = self.unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Node> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Node::Not(Box::new(self.unary()?)))
            }
            Some(Token::Op(Op::Add)) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<Node> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(Node::Const(n)),
            Some(Token::LParen) => {
                let inner = self.or_expr()?;
                match self.bump() {
                    Some(Token::RParen) => Ok(inner),
                    other => Err(RootError::Expression(format!("expected ')', got {other:?}"))),
                }
            }
            Some(Token::Ident(name)) if matches!(self.peek(), Some(Token::LParen)) => {
                self.pos += 1;
                let (func, arity) = Func::lookup(&name).ok_or_else(|| {
                    RootError::Expression(format!("unknown function '{name}'"))
                })?;
                let mut args = vec![self.or_expr()?];
                while matches!(self.peek(), Some(Token::Comma)) {
                    self.pos += 1;
                    args.push(self.or_expr()?);
                }
                if !matches!(self.bump(), Some(Token::RParen)) {
                    return Err(RootError::Expression(format!("unclosed call to '{name}'")));
                }
                if args.len() != arity {
                    return Err(RootError::Expression(format!(
                        "'{name}' takes {arity} argument(s), got {}",
                        args.len()
                    )));
                }
                Ok(Node::Call(func, args))
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Node::Const(1.0)),
                "false" => Ok(Node::Const(0.0)),
                _ => Ok(Node::Var(self.variable(name))),
            },
            other => Err(RootError::Expression(format!(
                "expected number, identifier or '(', got {other:?}"
            ))),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
