use crate::error::{Result, ToolError};
use crate::table::Value;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Sym(&'static str),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Token::Int(i) => write!(f, "{}", i),
            Token::Float(x) => write!(f, "{}", x),
            Token::Str(s) => write!(f, "{:?}", s),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Sym(s) => write!(f, "{}", s),
        }
    }
}

// longest first so that `//` wins over `/`
const SYMBOLS: [&str; 19] = [
    "//", "==", "!=", "<=", ">=", "<", ">", "+", "-", "*", "/", "%", "&", "|", "~", "(", ")",
    ",", "!",
];

fn invalid<S: Into<String>>(msg: S) -> ToolError {
    ToolError::InvalidExpression(msg.into())
}

fn tokenize(src: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit()
            || (c == '.' && chars.get(i + 1).map_or(false, |d| d.is_ascii_digit()))
        {
            let start = i;
            let mut is_float = false;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '_') {
                i += 1;
            }
            if i < chars.len() && chars[i] == '.' {
                is_float = true;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    is_float = true;
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().filter(|&&c| c != '_').collect();
            let token = if is_float {
                Token::Float(
                    text.parse()
                        .map_err(|_| invalid(format!("bad number '{}'", text)))?,
                )
            } else {
                Token::Int(
                    text.parse()
                        .map_err(|_| invalid(format!("bad number '{}'", text)))?,
                )
            };
            tokens.push(token);
        } else if c == '\'' || c == '"' {
            let quote = c;
            let mut s = String::new();
            i += 1;
            loop {
                match chars.get(i) {
                    None => return Err(invalid(format!("unterminated string in: {}", src))),
                    Some(&'\\') => {
                        let escaped = chars
                            .get(i + 1)
                            .ok_or_else(|| invalid(format!("unterminated string in: {}", src)))?;
                        s.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            other => *other,
                        });
                        i += 2;
                    }
                    Some(&ch) if ch == quote => {
                        i += 1;
                        break;
                    }
                    Some(&ch) => {
                        s.push(ch);
                        i += 1;
                    }
                }
            }
            tokens.push(Token::Str(s));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            let mut name: String = chars[start..i].iter().collect();
            // module qualified functions like `np.where`
            if (name == "np" || name == "numpy") && chars.get(i) == Some(&'.') {
                let start = i + 1;
                i = start;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                name = chars[start..i].iter().collect();
                if name.is_empty() {
                    return Err(invalid(format!("dangling '.' in: {}", src)));
                }
            }
            tokens.push(Token::Ident(name));
        } else {
            let rest: String = chars[i..chars.len().min(i + 2)].iter().collect();
            let sym = SYMBOLS
                .iter()
                .find(|s| rest.starts_with(*s))
                .ok_or_else(|| invalid(format!("unexpected character '{}' in: {}", c, src)))?;
            i += sym.chars().count();
            tokens.push(Token::Sym(sym));
        }
    }
    Ok(tokens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    /// logical `not`
    Not,
    /// `~`: logical on booleans, bitwise on integers
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    FloorDiv,
    Mod,
    Add,
    Sub,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    fn from_symbol(sym: &str) -> Option<BinaryOp> {
        let op = match sym {
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "//" => BinaryOp::FloorDiv,
            "%" => BinaryOp::Mod,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "&" | "and" => BinaryOp::And,
            "|" | "or" => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }
}

/// Built-in functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Abs,
    Min,
    Max,
    Len,
    Where,
    Int,
    Float,
    Str,
    Bool,
    Match,
    StartsWith,
    EndsWith,
    Contains,
}

impl Func {
    /// Accepted `(min, max)` argument counts.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Func::Min | Func::Max => (1, usize::MAX),
            Func::Where => (3, 3),
            Func::Match | Func::StartsWith | Func::EndsWith | Func::Contains => (2, 2),
            _ => (1, 1),
        }
    }
}

impl FromStr for Func {
    type Err = ToolError;
    fn from_str(name: &str) -> Result<Func> {
        let func = match name {
            "abs" | "absolute" => Func::Abs,
            "min" | "minimum" => Func::Min,
            "max" | "maximum" => Func::Max,
            "len" => Func::Len,
            "where" => Func::Where,
            "int" => Func::Int,
            "float" => Func::Float,
            "str" => Func::Str,
            "bool" => Func::Bool,
            "match" => Func::Match,
            "startswith" => Func::StartsWith,
            "endswith" => Func::EndsWith,
            "contains" => Func::Contains,
            _ => return Err(invalid(format!("unknown function '{}'", name))),
        };
        Ok(func)
    }
}

/// Parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(Func, Vec<Expr>),
}

impl Expr {
    /// Column names referenced by the expression, in order of appearance.
    /// # Example
    /// ```
    /// use rnadnatools::expr::parse;
    /// let expr = parse("where(dna_end - dna_start > 14, readID, 'short')").unwrap();
    /// assert_eq!(expr.identifiers(), vec!["dna_end", "dna_start", "readID"]);
    /// ```
    pub fn identifiers(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Literal(_) => {}
            Expr::Column(name) => {
                if !out.contains(&name.as_str()) {
                    out.push(name)
                }
            }
            Expr::Unary(_, e) => e.collect_identifiers(out),
            Expr::Binary(_, l, r) => {
                l.collect_identifiers(out);
                r.collect_identifiers(out);
            }
            Expr::Call(_, args) => args.iter().for_each(|a| a.collect_identifiers(out)),
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    src: &'a str,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn error(&self, what: &str) -> ToolError {
        match self.tokens.get(self.pos) {
            Some(t) => invalid(format!("{} near '{}' in: {}", what, t, self.src)),
            None => invalid(format!("{} at the end of: {}", what, self.src)),
        }
    }

    fn at_sym(&self, sym: &str) -> bool {
        matches!(self.peek(), Some(Token::Sym(s)) if *s == sym)
    }

    fn at_keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(s)) if s == word)
    }

    fn expect_sym(&mut self, sym: &str) -> Result<()> {
        if self.at_sym(sym) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", sym)))
        }
    }

    fn or_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.and_expr()?;
        while self.at_sym("|") || self.at_keyword("or") {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(BinaryOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut lhs = self.not_expr()?;
        while self.at_sym("&") || self.at_keyword("and") {
            self.pos += 1;
            let rhs = self.not_expr()?;
            lhs = Expr::Binary(BinaryOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr> {
        if self.at_keyword("not") {
            self.pos += 1;
            let inner = self.not_expr()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        let op = match self.peek() {
            Some(Token::Sym(s)) => BinaryOp::from_symbol(s).filter(|op| op.is_comparison()),
            _ => None,
        };
        match op {
            Some(op) => {
                self.pos += 1;
                let rhs = self.additive()?;
                Ok(Expr::Binary(op, Box::new(lhs), Box::new(rhs)))
            }
            None => Ok(lhs),
        }
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while self.at_sym("+") || self.at_sym("-") {
            let op = if self.at_sym("+") {
                BinaryOp::Add
            } else {
                BinaryOp::Sub
            };
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Sym(s)) if matches!(*s, "*" | "/" | "//" | "%") => {
                    BinaryOp::from_symbol(s)
                }
                _ => None,
            };
            match op {
                Some(op) => {
                    self.pos += 1;
                    let rhs = self.unary()?;
                    lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
                }
                None => return Ok(lhs),
            }
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.at_sym("-") {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(match inner {
                Expr::Literal(Value::Int(i)) => Expr::Literal(Value::Int(-i)),
                Expr::Literal(Value::Float(x)) => Expr::Literal(Value::Float(-x)),
                other => Expr::Unary(UnaryOp::Neg, Box::new(other)),
            });
        }
        if self.at_sym("+") {
            self.pos += 1;
            return self.unary();
        }
        if self.at_sym("~") || self.at_sym("!") {
            self.pos += 1;
            let inner = self.unary()?;
            return Ok(Expr::Unary(UnaryOp::Invert, Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float(x))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Sym("(")) => {
                let inner = self.or_expr()?;
                self.expect_sym(")")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "True" => Ok(Expr::Literal(Value::Bool(true))),
                "False" => Ok(Expr::Literal(Value::Bool(false))),
                "and" | "or" | "not" => {
                    self.pos -= 1;
                    Err(self.error("unexpected keyword"))
                }
                _ if self.at_sym("(") => {
                    let func: Func = name.parse()?;
                    self.pos += 1;
                    let args = self.arguments()?;
                    let (lo, hi) = func.arity();
                    if args.len() < lo || args.len() > hi {
                        return Err(invalid(format!(
                            "{}() takes {} arguments, got {} in: {}",
                            name,
                            if lo == hi {
                                lo.to_string()
                            } else {
                                format!("at least {}", lo)
                            },
                            args.len(),
                            self.src
                        )));
                    }
                    Ok(Expr::Call(func, args))
                }
                _ => Ok(Expr::Column(name)),
            },
            _ => {
                self.pos -= 1;
                Err(self.error("expected a value"))
            }
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.at_sym(")") {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.or_expr()?);
            if self.at_sym(",") {
                self.pos += 1;
            } else {
                self.expect_sym(")")?;
                return Ok(args);
            }
        }
    }
}

/// Parse an expression of the restricted column language.
/// # Example
/// ```
/// use rnadnatools::expr::{parse, BinaryOp, Expr};
/// use rnadnatools::table::Value;
/// let expr = parse("dna_end - dna_start > 14").unwrap();
/// assert!(matches!(expr, Expr::Binary(BinaryOp::Gt, _, _)));
/// assert_eq!(parse("-3").unwrap(), Expr::Literal(Value::Int(-3)));
/// assert!(parse("__import__('os')").is_err());
/// ```
pub fn parse(src: &str) -> Result<Expr> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(invalid("empty expression"));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        src,
    };
    let expr = parser.or_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error("unexpected token"));
    }
    Ok(expr)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.to_string()))
    }

    fn lit(v: Value) -> Box<Expr> {
        Box::new(Expr::Literal(v))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Add,
                col("a"),
                Box::new(Expr::Binary(BinaryOp::Mul, col("b"), lit(Value::Int(2))))
            )
        );
        let expr = parse("a > 1 & b < 2 | not c").unwrap();
        assert!(matches!(expr, Expr::Binary(BinaryOp::Or, _, _)));
        if let Expr::Binary(_, lhs, rhs) = expr {
            assert!(matches!(*lhs, Expr::Binary(BinaryOp::And, _, _)));
            assert!(matches!(*rhs, Expr::Unary(UnaryOp::Not, _)));
        }
    }

    #[test]
    fn test_literals() {
        assert_eq!(parse("1e3").unwrap(), Expr::Literal(Value::Float(1000.0)));
        assert_eq!(parse("1_000").unwrap(), Expr::Literal(Value::Int(1000)));
        assert_eq!(
            parse("'GA\\'TC'").unwrap(),
            Expr::Literal(Value::Str("GA'TC".into()))
        );
        assert_eq!(parse("True").unwrap(), Expr::Literal(Value::Bool(true)));
    }

    #[test]
    fn test_calls() {
        let expr = parse("np.where(x // 2 == 0, 'even', 'odd')").unwrap();
        assert!(matches!(expr, Expr::Call(Func::Where, ref args) if args.len() == 3));
        assert_eq!(expr.identifiers(), vec!["x"]);
        assert!(parse("where(x, 1)").is_err());
        assert!(parse("exec('rm')").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        for src in ["", "a +", "(a", "a b", "lambda: 1", "a[0]", "x.y", "a < b < c"] {
            assert!(
                matches!(parse(src), Err(ToolError::InvalidExpression(_))),
                "accepted {}",
                src
            );
        }
    }
}
