use logos::{Lexer, Logos};
use thiserror::Error;

#[derive(Logos, Debug, Clone, Copy, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[regex(r"[0-9]+(\.[0-9]*)?", number)]
    #[regex(r"\.[0-9]+", number)]
    Number(f64),
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*")]
    Ident,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("^")]
    Caret,
    #[token("!")]
    Bang,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("|")]
    Pipe,
}

// The exponent is consumed by hand so that `2e` still lexes as `2` followed
// by the constant `e`.
fn number(lex: &mut Lexer<Token>) -> Option<f64> {
    let rest = lex.remainder().as_bytes();
    if matches!(rest.first(), Some(b'e' | b'E')) {
        let sign = usize::from(matches!(rest.get(1), Some(b'+' | b'-')));
        let digits = rest[1 + sign..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 {
            lex.bump(1 + sign + digits);
        }
    }
    lex.slice().parse().ok()
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("empty expression")]
    Empty,
    #[error("invalid character '{found}' at position {position}")]
    InvalidToken { found: String, position: usize },
    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },
    #[error("unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
    #[error("undefined symbol '{name}' at position {position}")]
    UnknownIdentifier { name: String, position: usize },
    #[error("undefined function '{name}' at position {position}")]
    UnknownFunction { name: String, position: usize },
    #[error("function '{name}' at position {position} must be called with parentheses")]
    MissingCall { name: String, position: usize },
    #[error("function '{name}' expects {expected} argument(s), got {got}")]
    Arity {
        name: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("expression nests deeper than {limit} levels at position {position}")]
    TooDeep { limit: usize, position: usize },
    #[error("expression has more than {limit} terms")]
    TooLarge { limit: usize },
}

/// Nesting limit across parentheses, `|..|`, calls, signs and exponents.
pub const MAX_DEPTH: usize = 64;
/// Limit on the number of nodes in one compiled expression.
pub const MAX_NODES: usize = 1024;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("result is not a finite real number at (x = {x}, z = {z}): {value}")]
    NonFinite { x: f64, z: f64, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    X,
    Z,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Asinh,
    Acosh,
    Atanh,
    Exp,
    Log,
    Log10,
    Log2,
    Sqrt,
    Cbrt,
    Abs,
    Sign,
    Floor,
    Ceil,
    Round,
    Min,
    Max,
    Pow,
    Atan2,
    Hypot,
    Mod,
}

enum Arity {
    One,
    Two,
    OneOrTwo,
    AtLeastOne,
}

impl Func {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "sin" => Self::Sin,
            "cos" => Self::Cos,
            "tan" => Self::Tan,
            "asin" => Self::Asin,
            "acos" => Self::Acos,
            "atan" => Self::Atan,
            "sinh" => Self::Sinh,
            "cosh" => Self::Cosh,
            "tanh" => Self::Tanh,
            "asinh" => Self::Asinh,
            "acosh" => Self::Acosh,
            "atanh" => Self::Atanh,
            "exp" => Self::Exp,
            "log" | "ln" => Self::Log,
            "log10" => Self::Log10,
            "log2" => Self::Log2,
            "sqrt" => Self::Sqrt,
            "cbrt" => Self::Cbrt,
            "abs" => Self::Abs,
            "sign" => Self::Sign,
            "floor" => Self::Floor,
            "ceil" => Self::Ceil,
            "round" => Self::Round,
            "min" => Self::Min,
            "max" => Self::Max,
            "pow" => Self::Pow,
            "atan2" => Self::Atan2,
            "hypot" => Self::Hypot,
            "mod" => Self::Mod,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Asin => "asin",
            Self::Acos => "acos",
            Self::Atan => "atan",
            Self::Sinh => "sinh",
            Self::Cosh => "cosh",
            Self::Tanh => "tanh",
            Self::Asinh => "asinh",
            Self::Acosh => "acosh",
            Self::Atanh => "atanh",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Log10 => "log10",
            Self::Log2 => "log2",
            Self::Sqrt => "sqrt",
            Self::Cbrt => "cbrt",
            Self::Abs => "abs",
            Self::Sign => "sign",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
            Self::Round => "round",
            Self::Min => "min",
            Self::Max => "max",
            Self::Pow => "pow",
            Self::Atan2 => "atan2",
            Self::Hypot => "hypot",
            Self::Mod => "mod",
        }
    }

    fn arity(self) -> Arity {
        match self {
            Self::Log => Arity::OneOrTwo,
            Self::Pow | Self::Atan2 | Self::Mod => Arity::Two,
            Self::Min | Self::Max | Self::Hypot => Arity::AtLeastOne,
            _ => Arity::One,
        }
    }

    fn check_arity(self, got: usize) -> Result<(), CompileError> {
        let (ok, expected) = match self.arity() {
            Arity::One => (got == 1, "1"),
            Arity::Two => (got == 2, "2"),
            Arity::OneOrTwo => ((1..=2).contains(&got), "1 or 2"),
            Arity::AtLeastOne => (got >= 1, "at least 1"),
        };
        if ok {
            Ok(())
        } else {
            Err(CompileError::Arity {
                name: self.name(),
                expected,
                got,
            })
        }
    }

    fn apply(self, args: &[f64]) -> f64 {
        let a = args[0];
        match self {
            Self::Sin => a.sin(),
            Self::Cos => a.cos(),
            Self::Tan => a.tan(),
            Self::Asin => a.asin(),
            Self::Acos => a.acos(),
            Self::Atan => a.atan(),
            Self::Sinh => a.sinh(),
            Self::Cosh => a.cosh(),
            Self::Tanh => a.tanh(),
            Self::Asinh => a.asinh(),
            Self::Acosh => a.acosh(),
            Self::Atanh => a.atanh(),
            Self::Exp => a.exp(),
            Self::Log => match args.get(1) {
                Some(base) => a.ln() / base.ln(),
                None => a.ln(),
            },
            Self::Log10 => a.log10(),
            Self::Log2 => a.log2(),
            Self::Sqrt => a.sqrt(),
            Self::Cbrt => a.cbrt(),
            Self::Abs => a.abs(),
            Self::Sign => {
                if a == 0.0 {
                    0.0
                } else {
                    a.signum()
                }
            }
            Self::Floor => a.floor(),
            Self::Ceil => a.ceil(),
            Self::Round => a.round(),
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Pow => a.powf(args[1]),
            Self::Atan2 => a.atan2(args[1]),
            Self::Hypot => args.iter().map(|v| v * v).sum::<f64>().sqrt(),
            Self::Mod => floored_mod(a, args[1]),
        }
    }
}

fn floored_mod(a: f64, b: f64) -> f64 {
    if b == 0.0 {
        return a;
    }
    a - b * (a / b).floor()
}

fn factorial(n: f64) -> f64 {
    if n < 0.0 || n.fract() != 0.0 {
        return f64::NAN;
    }
    if n > 170.0 {
        return f64::INFINITY;
    }
    (1..=n as u32).fold(1.0, |acc, k| acc * k as f64)
}

fn constant(name: &str) -> Option<f64> {
    match name {
        "pi" | "PI" => Some(std::f64::consts::PI),
        "e" | "E" => Some(std::f64::consts::E),
        "tau" => Some(std::f64::consts::TAU),
        "phi" => Some(1.618_033_988_749_895),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Num(f64),
    Var(Var),
    Neg(Box<Node>),
    Factorial(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

impl Node {
    fn eval(&self, x: f64, z: f64) -> f64 {
        match self {
            Node::Num(v) => *v,
            Node::Var(Var::X) => x,
            Node::Var(Var::Z) => z,
            Node::Neg(inner) => -inner.eval(x, z),
            Node::Factorial(inner) => factorial(inner.eval(x, z)),
            Node::Binary(op, lhs, rhs) => {
                let a = lhs.eval(x, z);
                let b = rhs.eval(x, z);
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Mod => floored_mod(a, b),
                    BinOp::Pow => a.powf(b),
                }
            }
            Node::Call(func, args) => {
                let values: Vec<f64> = args.iter().map(|arg| arg.eval(x, z)).collect();
                func.apply(&values)
            }
        }
    }
}

struct TokenInfo {
    token: Token,
    lexeme: String,
    position: usize,
}

fn tokenize(input: &str) -> Result<Vec<TokenInfo>, CompileError> {
    let mut lex = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(result) = lex.next() {
        let position = lex.span().start;
        match result {
            Ok(token) => tokens.push(TokenInfo {
                token,
                lexeme: lex.slice().to_string(),
                position,
            }),
            Err(()) => {
                return Err(CompileError::InvalidToken {
                    found: lex.slice().to_string(),
                    position,
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<TokenInfo>,
    pos: usize,
    depth: usize,
    nodes: usize,
}

impl Parser {
    fn new(tokens: Vec<TokenInfo>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            nodes: 0,
        }
    }

    // Every node goes through here, which bounds both the tree size and the
    // recursion depth of `Node::eval` and of the drop glue.
    fn node(&mut self, node: Node) -> Result<Node, CompileError> {
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            return Err(CompileError::TooLarge { limit: MAX_NODES });
        }
        Ok(node)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn consume(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &'static str) -> CompileError {
        match self.tokens.get(self.pos) {
            Some(info) => CompileError::UnexpectedToken {
                found: info.lexeme.clone(),
                position: info.position,
            },
            None => CompileError::UnexpectedEnd { expected },
        }
    }

    fn expect(&mut self, token: &Token, expected: &'static str) -> Result<(), CompileError> {
        if self.consume(token) {
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn parse_sum(&mut self) -> Result<Node, CompileError> {
        let mut lhs = self.parse_product()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_product()?;
            lhs = self.node(Node::Binary(op, Box::new(lhs), Box::new(rhs)))?;
        }
    }

    fn parse_product(&mut self) -> Result<Node, CompileError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Mod,
                // implicit multiplication: `2x`, `3(x + 1)`, `x cos(z)`
                Some(Token::Ident | Token::LParen) => {
                    let rhs = self.parse_unary()?;
                    lhs = self.node(Node::Binary(BinOp::Mul, Box::new(lhs), Box::new(rhs)))?;
                    continue;
                }
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = self.node(Node::Binary(op, Box::new(lhs), Box::new(rhs)))?;
        }
    }

    // Every recursive path (groups, calls, signs, exponents) re-enters here.
    fn parse_unary(&mut self) -> Result<Node, CompileError> {
        if self.depth >= MAX_DEPTH {
            let position = self
                .tokens
                .get(self.pos)
                .or(self.tokens.last())
                .map_or(0, |info| info.position);
            return Err(CompileError::TooDeep {
                limit: MAX_DEPTH,
                position,
            });
        }
        self.depth += 1;
        let node = self.parse_signed();
        self.depth -= 1;
        node
    }

    fn parse_signed(&mut self) -> Result<Node, CompileError> {
        if self.consume(&Token::Minus) {
            let inner = self.parse_unary()?;
            return self.node(Node::Neg(Box::new(inner)));
        }
        if self.consume(&Token::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> Result<Node, CompileError> {
        let base = self.parse_postfix()?;
        if self.consume(&Token::Caret) {
            let exponent = self.parse_unary()?;
            return self.node(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Node, CompileError> {
        let mut node = self.parse_primary()?;
        while self.consume(&Token::Bang) {
            node = self.node(Node::Factorial(Box::new(node)))?;
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Node, CompileError> {
        let Some(info) = self.tokens.get(self.pos) else {
            return Err(CompileError::UnexpectedEnd {
                expected: "a number, variable or '('",
            });
        };
        let (token, position) = (info.token, info.position);
        match token {
            Token::Number(value) => {
                self.pos += 1;
                self.node(Node::Num(value))
            }
            Token::Ident => {
                let name = self.tokens[self.pos].lexeme.clone();
                self.pos += 1;
                if self.peek() == Some(&Token::LParen) {
                    return self.parse_call(name, position);
                }
                match name.as_str() {
                    "x" => self.node(Node::Var(Var::X)),
                    "z" => self.node(Node::Var(Var::Z)),
                    _ => {
                        if let Some(value) = constant(&name) {
                            self.node(Node::Num(value))
                        } else if Func::from_name(&name).is_some() {
                            Err(CompileError::MissingCall { name, position })
                        } else {
                            Err(CompileError::UnknownIdentifier { name, position })
                        }
                    }
                }
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_sum()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Pipe => {
                self.pos += 1;
                let inner = self.parse_sum()?;
                self.expect(&Token::Pipe, "'|'")?;
                self.node(Node::Call(Func::Abs, vec![inner]))
            }
            _ => Err(self.unexpected("a number, variable or '('")),
        }
    }

    fn parse_call(&mut self, name: String, position: usize) -> Result<Node, CompileError> {
        let func =
            Func::from_name(&name).ok_or(CompileError::UnknownFunction { name, position })?;
        self.expect(&Token::LParen, "'('")?;

        let mut args = Vec::new();
        if !self.consume(&Token::RParen) {
            loop {
                args.push(self.parse_sum()?);
                if self.consume(&Token::Comma) {
                    continue;
                }
                self.expect(&Token::RParen, "',' or ')'")?;
                break;
            }
        }

        func.check_arity(args.len())?;
        self.node(Node::Call(func, args))
    }
}

/// A formula compiled once and evaluated at every grid point.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    root: Node,
}

impl Expression {
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn evaluate(&self, x: f64, z: f64) -> Result<f64, EvalError> {
        let value = self.root.eval(x, z);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite { x, z, value })
        }
    }
}

/// Compiles an infix formula over `x` and `z`.
pub fn compile(formula: &str) -> Result<Expression, CompileError> {
    let tokens = tokenize(formula)?;
    if tokens.is_empty() {
        return Err(CompileError::Empty);
    }

    let mut parser = Parser::new(tokens);
    let root = parser.parse_sum()?;
    if parser.peek().is_some() {
        // a dangling `)` or a second expression after a complete one
        let expected = if parser.peek() == Some(&Token::RParen) {
            "end of expression"
        } else {
            "an operator"
        };
        return Err(parser.unexpected(expected));
    }

    Ok(Expression {
        source: formula.to_string(),
        root,
    })
}
