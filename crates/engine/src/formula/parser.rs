// Formula parser - converts formula text into an AST.
// Supports: numbers (exponent form included), strings, TRUE/FALSE, cell
// refs (A1, $A$1), ranges
// (A1:B5), functions (SUM(...)), arithmetic, comparison operators,
// concatenation (&), exponentiation (^) and postfix percent (%).
//
// Formula text carries no leading '='. Parse failure is reported to the
// caller; the sheet stores it as an #ERROR! cell, never as a call failure.

use crate::geom::MAX_SIZE;
use crate::names;

/// A single cell reference inside a formula.
///
/// Coordinates are absolute sheet positions; `x_abs`/`y_abs` record the `$`
/// anchoring that controls copy/fill adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub x: u32,
    pub y: u32,
    pub x_abs: bool,
    pub y_abs: bool,
}

impl CellRef {
    pub fn new(x: u32, y: u32) -> Self {
        Self {
            x,
            y,
            x_abs: false,
            y_abs: false,
        }
    }
}

/// A rectangular range reference (`A1:B5`).
///
/// Corners are normalized per axis at construction, so `start` is always
/// the top-left endpoint; `$` flags travel with their coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeRef {
    pub start: CellRef,
    pub end: CellRef,
}

impl RangeRef {
    pub fn new(mut start: CellRef, mut end: CellRef) -> Self {
        if start.x > end.x {
            std::mem::swap(&mut start.x, &mut end.x);
            std::mem::swap(&mut start.x_abs, &mut end.x_abs);
        }
        if start.y > end.y {
            std::mem::swap(&mut start.y, &mut end.y);
            std::mem::swap(&mut start.y_abs, &mut end.y_abs);
        }
        Self { start, end }
    }

    pub fn left(&self) -> u32 {
        self.start.x
    }

    pub fn top(&self) -> u32 {
        self.start.y
    }

    pub fn right(&self) -> u32 {
        self.end.x
    }

    pub fn bottom(&self) -> u32 {
        self.end.y
    }

    pub fn width(&self) -> u32 {
        self.end.x - self.start.x + 1
    }

    pub fn height(&self) -> u32 {
        self.end.y - self.start.y + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Boolean(bool),
    Cell(CellRef),
    Range(RangeRef),
    /// A reference destroyed by a structural edit; evaluates to #REF!.
    RefError,
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Negate(Box<Expr>),
    Percent(Box<Expr>),
    BinaryOp {
        op: Op,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Omitted function argument (the trailing slot in `IF(a,b,)`).
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

impl Op {
    fn symbol(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::Pow => "^",
            Op::Concat => "&",
            Op::Lt => "<",
            Op::Gt => ">",
            Op::Eq => "=",
            Op::LtEq => "<=",
            Op::GtEq => ">=",
            Op::NotEq => "<>",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Op::Lt | Op::Gt | Op::Eq | Op::LtEq | Op::GtEq | Op::NotEq => 1,
            Op::Concat => 2,
            Op::Add | Op::Sub => 3,
            Op::Mul | Op::Div => 4,
            Op::Pow => 5,
        }
    }
}

/// Parse formula text into an AST.
pub fn parse(formula: &str) -> Result<Expr, String> {
    let tokens = tokenize(formula.trim())?;
    if tokens.is_empty() {
        return Err("empty formula".to_string());
    }
    let (expr, pos) = parse_comparison(&tokens, 0)?;
    if pos != tokens.len() {
        return Err(format!("unexpected trailing input at token {}", pos));
    }
    Ok(expr)
}

#[derive(Debug, Clone)]
enum Token {
    Number(f64),
    StringLit(String),
    CellRef(CellRef),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Percent,
    Ampersand,
    LParen,
    RParen,
    Colon,
    Comma,
    Lt,
    Gt,
    Eq,
    LtEq,
    GtEq,
    NotEq,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' => {
                chars.next();
            }
            '+' => {
                tokens.push(Token::Plus);
                chars.next();
            }
            '-' => {
                tokens.push(Token::Minus);
                chars.next();
            }
            '*' => {
                tokens.push(Token::Star);
                chars.next();
            }
            '/' => {
                tokens.push(Token::Slash);
                chars.next();
            }
            '^' => {
                tokens.push(Token::Caret);
                chars.next();
            }
            '%' => {
                tokens.push(Token::Percent);
                chars.next();
            }
            '&' => {
                tokens.push(Token::Ampersand);
                chars.next();
            }
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            ':' => {
                tokens.push(Token::Colon);
                chars.next();
            }
            ',' => {
                tokens.push(Token::Comma);
                chars.next();
            }
            '<' => {
                chars.next();
                match chars.peek() {
                    Some('=') => {
                        tokens.push(Token::LtEq);
                        chars.next();
                    }
                    Some('>') => {
                        tokens.push(Token::NotEq);
                        chars.next();
                    }
                    _ => tokens.push(Token::Lt),
                }
            }
            '>' => {
                chars.next();
                if chars.peek() == Some(&'=') {
                    tokens.push(Token::GtEq);
                    chars.next();
                } else {
                    tokens.push(Token::Gt);
                }
            }
            '=' => {
                tokens.push(Token::Eq);
                chars.next();
            }
            '"' => {
                // String literal; "" inside is an escaped quote
                chars.next();
                let mut s = String::new();
                loop {
                    match chars.next() {
                        Some('"') => {
                            if chars.peek() == Some(&'"') {
                                chars.next();
                                s.push('"');
                            } else {
                                break;
                            }
                        }
                        Some(ch) => s.push(ch),
                        None => return Err("unterminated string literal".to_string()),
                    }
                }
                tokens.push(Token::StringLit(s));
            }
            'A'..='Z' | 'a'..='z' | '$' => {
                // Cell reference (A1, $A$1), TRUE/FALSE, or a function name
                let mut ident = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }

                let upper = ident.to_uppercase();
                if upper == "TRUE" || upper == "FALSE" {
                    tokens.push(Token::Ident(upper));
                } else if let Some(r) = try_parse_cell_ref(&upper) {
                    tokens.push(Token::CellRef(r));
                } else if ident.contains('$') {
                    return Err(format!("invalid cell reference: {}", ident));
                } else {
                    tokens.push(Token::Ident(upper));
                }
            }
            '0'..='9' | '.' => {
                let mut num_str = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        num_str.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                // Optional exponent: [eE][+-]?digits. A bare marker with no
                // digits is left alone for the identifier path to reject.
                if let Some(&(m @ ('e' | 'E'))) = chars.peek() {
                    let mut ahead = chars.clone();
                    ahead.next();
                    let mut tail = String::new();
                    if let Some(&(s @ ('+' | '-'))) = ahead.peek() {
                        tail.push(s);
                        ahead.next();
                    }
                    let mut has_digits = false;
                    while let Some(&d) = ahead.peek() {
                        if d.is_ascii_digit() {
                            tail.push(d);
                            ahead.next();
                            has_digits = true;
                        } else {
                            break;
                        }
                    }
                    if has_digits {
                        num_str.push(m);
                        num_str.push_str(&tail);
                        chars = ahead;
                    }
                }
                let num: f64 = num_str
                    .parse()
                    .map_err(|_| format!("invalid number: {}", num_str))?;
                tokens.push(Token::Number(num));
            }
            _ => return Err(format!("unexpected character: {}", c)),
        }
    }

    Ok(tokens)
}

/// Try to read `s` as a cell reference with optional `$` markers.
///
/// Rejects names outside the addressable sheet, so `CRXP1` falls through to
/// the identifier path (and ultimately a parse error or unknown function).
fn try_parse_cell_ref(s: &str) -> Option<CellRef> {
    let mut chars = s.chars().peekable();

    let x_abs = chars.peek() == Some(&'$');
    if x_abs {
        chars.next();
    }

    let mut col_str = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_uppercase() {
            col_str.push(c);
            chars.next();
        } else {
            break;
        }
    }

    let y_abs = chars.peek() == Some(&'$');
    if y_abs {
        chars.next();
    }

    let row_str: String = chars.collect();
    let x = names::parse_column(&col_str)?;
    let y = names::parse_row(&row_str)?;
    debug_assert!(x < MAX_SIZE.width && y < MAX_SIZE.height);
    Some(CellRef { x, y, x_abs, y_abs })
}

// Lowest precedence: comparison operators
fn parse_comparison(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_concat(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Lt => Op::Lt,
            Token::Gt => Op::Gt,
            Token::Eq => Op::Eq,
            Token::LtEq => Op::LtEq,
            Token::GtEq => Op::GtEq,
            Token::NotEq => Op::NotEq,
            _ => break,
        };
        let (right, new_pos) = parse_concat(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_concat(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_add_sub(tokens, pos)?;

    while pos < tokens.len() {
        if !matches!(&tokens[pos], Token::Ampersand) {
            break;
        }
        let (right, new_pos) = parse_add_sub(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op: Op::Concat,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_add_sub(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_mul_div(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Plus => Op::Add,
            Token::Minus => Op::Sub,
            _ => break,
        };
        let (right, new_pos) = parse_mul_div(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

fn parse_mul_div(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut left, mut pos) = parse_power(tokens, pos)?;

    while pos < tokens.len() {
        let op = match &tokens[pos] {
            Token::Star => Op::Mul,
            Token::Slash => Op::Div,
            _ => break,
        };
        let (right, new_pos) = parse_power(tokens, pos + 1)?;
        left = Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        };
        pos = new_pos;
    }

    Ok((left, pos))
}

// Exponentiation (^) - right-associative
fn parse_power(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (base, pos) = parse_percent(tokens, pos)?;

    if pos < tokens.len() {
        if let Token::Caret = &tokens[pos] {
            let (exponent, new_pos) = parse_power(tokens, pos + 1)?;
            return Ok((
                Expr::BinaryOp {
                    op: Op::Pow,
                    left: Box::new(base),
                    right: Box::new(exponent),
                },
                new_pos,
            ));
        }
    }

    Ok((base, pos))
}

// Postfix percent (%)
fn parse_percent(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    let (mut expr, mut pos) = parse_primary(tokens, pos)?;

    while pos < tokens.len() {
        if let Token::Percent = &tokens[pos] {
            expr = Expr::Percent(Box::new(expr));
            pos += 1;
        } else {
            break;
        }
    }

    Ok((expr, pos))
}

fn parse_primary(tokens: &[Token], pos: usize) -> Result<(Expr, usize), String> {
    if pos >= tokens.len() {
        return Err("unexpected end of expression".to_string());
    }

    match &tokens[pos] {
        Token::Number(n) => Ok((Expr::Number(*n), pos + 1)),
        Token::StringLit(s) => Ok((Expr::Text(s.clone()), pos + 1)),
        Token::CellRef(start) => {
            // A colon after a reference makes it a range (A1:B5)
            if let Some(Token::Colon) = tokens.get(pos + 1) {
                return match tokens.get(pos + 2) {
                    Some(Token::CellRef(end)) => {
                        Ok((Expr::Range(RangeRef::new(*start, *end)), pos + 3))
                    }
                    _ => Err("expected cell reference after ':'".to_string()),
                };
            }
            Ok((Expr::Cell(*start), pos + 1))
        }
        Token::Ident(name) => {
            if name == "TRUE" {
                return Ok((Expr::Boolean(true), pos + 1));
            }
            if name == "FALSE" {
                return Ok((Expr::Boolean(false), pos + 1));
            }
            match tokens.get(pos + 1) {
                Some(Token::LParen) => {
                    let (args, new_pos) = parse_function_args(tokens, pos + 2)?;
                    Ok((
                        Expr::Function {
                            name: name.clone(),
                            args,
                        },
                        new_pos,
                    ))
                }
                _ => Err(format!("unexpected identifier: {}", name)),
            }
        }
        Token::LParen => {
            let (expr, pos) = parse_comparison(tokens, pos + 1)?;
            match tokens.get(pos) {
                Some(Token::RParen) => Ok((expr, pos + 1)),
                _ => Err("missing closing parenthesis".to_string()),
            }
        }
        // Unary plus is a no-op
        Token::Plus => parse_primary(tokens, pos + 1),
        Token::Minus => {
            let (expr, pos) = parse_primary(tokens, pos + 1)?;
            Ok((Expr::Negate(Box::new(expr)), pos))
        }
        _ => Err(format!("unexpected token at position {}", pos)),
    }
}

fn parse_function_args(tokens: &[Token], mut pos: usize) -> Result<(Vec<Expr>, usize), String> {
    let mut args = Vec::new();

    // Empty call: NAME()
    if let Some(Token::RParen) = tokens.get(pos) {
        return Ok((args, pos + 1));
    }

    loop {
        // Omitted argument: separator follows immediately
        if matches!(tokens.get(pos), Some(Token::Comma | Token::RParen)) {
            args.push(Expr::Empty);
        } else {
            let (arg, new_pos) = parse_comparison(tokens, pos)?;
            args.push(arg);
            pos = new_pos;
        }

        match tokens.get(pos) {
            Some(Token::RParen) => return Ok((args, pos + 1)),
            Some(Token::Comma) => pos += 1,
            _ => return Err("missing closing parenthesis in function call".to_string()),
        }
    }
}

// =============================================================================
// Formula printing - canonical text reconstructed from the AST
// =============================================================================

/// Format an expression as canonical formula text.
///
/// Binary operators get single surrounding spaces (`A16 + 3`); parentheses
/// are re-inserted only where precedence requires them.
pub fn format_expr(expr: &Expr) -> String {
    match expr {
        Expr::Empty => String::new(),
        Expr::Number(n) => format_number(*n),
        Expr::Text(s) => format!("\"{}\"", s.replace('"', "\"\"")),
        Expr::Boolean(b) => {
            if *b {
                "TRUE".to_string()
            } else {
                "FALSE".to_string()
            }
        }
        Expr::RefError => "#REF!".to_string(),
        Expr::Cell(r) => format_cell_ref(r),
        Expr::Range(r) => format!("{}:{}", format_cell_ref(&r.start), format_cell_ref(&r.end)),
        Expr::Function { name, args } => {
            let args_str: Vec<String> = args.iter().map(format_expr).collect();
            format!("{}({})", name, args_str.join(", "))
        }
        Expr::Negate(inner) => format!("-{}", format_operand(inner, 6)),
        Expr::Percent(inner) => format!("{}%", format_operand(inner, 7)),
        Expr::BinaryOp { op, left, right } => {
            let prec = op.precedence();
            let left_str = match op {
                // ^ is right-associative, so an equal-precedence left child
                // needs parentheses to round-trip
                Op::Pow => format_operand_strict(left, prec),
                _ => format_operand(left, prec),
            };
            let right_str = match op {
                Op::Sub | Op::Div => format_operand_strict(right, prec),
                _ => format_operand(right, prec),
            };
            format!("{} {} {}", left_str, op.symbol(), right_str)
        }
    }
}

/// Parenthesize when the child binds looser than the parent.
fn format_operand(expr: &Expr, parent_prec: u8) -> String {
    if expr_precedence(expr) < parent_prec {
        format!("({})", format_expr(expr))
    } else {
        format_expr(expr)
    }
}

/// Parenthesize when the child binds looser than or equal to the parent.
fn format_operand_strict(expr: &Expr, parent_prec: u8) -> String {
    if expr_precedence(expr) <= parent_prec {
        format!("({})", format_expr(expr))
    } else {
        format_expr(expr)
    }
}

fn expr_precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::BinaryOp { op, .. } => op.precedence(),
        Expr::Negate(_) => 6,
        Expr::Percent(_) => 7,
        _ => 8,
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn format_cell_ref(r: &CellRef) -> String {
    let col = names::index_to_column(r.x).unwrap_or_else(|_| "#REF!".to_string());
    let row = u64::from(r.y) + 1;
    match (r.x_abs, r.y_abs) {
        (false, false) => format!("{}{}", col, row),
        (true, false) => format!("${}{}", col, row),
        (false, true) => format!("{}${}", col, row),
        (true, true) => format!("${}${}", col, row),
    }
}
