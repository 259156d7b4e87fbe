//! Tokenizer and recursive descent parser for A1-style formulas

use crate::types::CellRef;
use calamine::CellErrorType;

/// Last row and column an A1 reference may name (1-based)
const MAX_ROWS: u32 = 1_048_576;
const MAX_COLS: u32 = 16_384;

/// Binary operators, from the loosest binding to the tightest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

/// Parsed formula
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(CellErrorType),
    /// Single cell on the bound sheet
    Reference(CellRef),
    /// Rectangle on the bound sheet, corners as written
    Range { start: CellRef, end: CellRef },
    /// Reference that cannot be resolved on the bound sheet: another sheet,
    /// another workbook or a defined name
    External(String),
    /// Omitted function argument, as in `IF(A1,,1)`
    Missing,
    Negate(Box<Expr>),
    Percent(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Error(CellErrorType),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Amp,
    Percent,
    Colon,
    Comma,
    LParen,
    RParen,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Parse formula text, with or without its leading `=`.
///
/// Returns `None` for text outside the supported grammar:
///
/// ```text
/// expr    := concat (("=" | "<>" | "<" | "<=" | ">" | ">=") concat)*
/// concat  := sum ("&" sum)*
/// sum     := product (("+" | "-") product)*
/// product := power (("*" | "/") power)*
/// power   := unary ("^" unary)*
/// unary   := ("-" | "+") unary | postfix
/// postfix := primary "%"*
/// primary := NUMBER | STRING | ERROR | reference | call | "(" expr ")"
/// ```
pub fn parse_formula(text: &str) -> Option<Expr> {
    let text = text.trim();
    let text = text.strip_prefix('=').unwrap_or(text);
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return None;
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.peek().is_some() {
        return None;
    }

    Some(expr)
}

/// Parse an A1 cell reference such as `B2` or `$AA$10`
pub fn parse_cell_ref(text: &str) -> Option<CellRef> {
    let s = text.strip_prefix('$').unwrap_or(text);
    let letters = s.bytes().take_while(u8::is_ascii_alphabetic).count();
    if letters == 0 || letters > 3 {
        return None;
    }

    let (col_part, rest) = s.split_at(letters);
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let row: u32 = rest.parse().ok()?;
    let col = col_part.bytes().fold(0u32, |acc, b| {
        acc * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1
    });
    if row == 0 || row > MAX_ROWS || col > MAX_COLS {
        return None;
    }

    Some(CellRef::new(row - 1, col - 1))
}

fn parse_error_code(code: &str) -> Option<CellErrorType> {
    let error = match code.to_ascii_uppercase().as_str() {
        "#NULL!" => CellErrorType::Null,
        "#DIV/0!" => CellErrorType::Div0,
        "#VALUE!" => CellErrorType::Value,
        "#REF!" => CellErrorType::Ref,
        "#NAME?" => CellErrorType::Name,
        "#NUM!" => CellErrorType::Num,
        "#N/A" => CellErrorType::NA,
        "#GETTING_DATA" => CellErrorType::GettingData,
        _ => return None,
    };
    Some(error)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '$' | '!')
}

fn tokenize(input: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.peek().copied() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match ch {
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next()? {
                        '"' if chars.peek() == Some(&'"') => {
                            chars.next();
                            text.push('"');
                        }
                        '"' => break,
                        c => text.push(c),
                    }
                }
                Token::Text(text)
            }
            // quoted sheet name: 'My Sheet'!A1
            '\'' => {
                chars.next();
                let mut ident = String::from("'");
                loop {
                    match chars.next()? {
                        '\'' if chars.peek() == Some(&'\'') => {
                            chars.next();
                            ident.push_str("''");
                        }
                        '\'' => break,
                        c => ident.push(c),
                    }
                }
                ident.push('\'');
                if chars.next()? != '!' {
                    return None;
                }
                ident.push('!');
                while let Some(c) = chars.peek().copied().filter(|&c| is_ident_char(c)) {
                    ident.push(c);
                    chars.next();
                }
                Token::Ident(ident)
            }
            '#' => {
                let mut code = String::new();
                while let Some(c) = chars
                    .peek()
                    .copied()
                    .filter(|&c| (c == '#' && code.is_empty()) || c.is_alphanumeric() || matches!(c, '/' | '_'))
                {
                    code.push(c);
                    chars.next();
                }
                if let Some(c) = chars.peek().copied().filter(|&c| matches!(c, '!' | '?')) {
                    code.push(c);
                    chars.next();
                }
                Token::Error(parse_error_code(&code)?)
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut number = String::new();
                while let Some(c) = chars.peek().copied().filter(|c| c.is_ascii_digit() || *c == '.') {
                    number.push(c);
                    chars.next();
                }
                if let Some(e) = chars.peek().copied().filter(|c| matches!(c, 'e' | 'E')) {
                    number.push(e);
                    chars.next();
                    if let Some(sign) = chars.peek().copied().filter(|c| matches!(c, '+' | '-')) {
                        number.push(sign);
                        chars.next();
                    }
                    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
                        number.push(c);
                        chars.next();
                    }
                }
                Token::Number(number.parse().ok()?)
            }
            c if is_ident_char(c) => {
                let mut ident = String::new();
                while let Some(c) = chars.peek().copied().filter(|&c| is_ident_char(c)) {
                    ident.push(c);
                    chars.next();
                }
                Token::Ident(ident)
            }
            _ => {
                chars.next();
                match ch {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' => Token::Star,
                    '/' => Token::Slash,
                    '^' => Token::Caret,
                    '&' => Token::Amp,
                    '%' => Token::Percent,
                    ':' => Token::Colon,
                    ',' => Token::Comma,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '=' => Token::Eq,
                    '<' => match chars.peek().copied() {
                        Some('=') => {
                            chars.next();
                            Token::Le
                        }
                        Some('>') => {
                            chars.next();
                            Token::Ne
                        }
                        _ => Token::Lt,
                    },
                    '>' => match chars.peek().copied() {
                        Some('=') => {
                            chars.next();
                            Token::Ge
                        }
                        _ => Token::Gt,
                    },
                    _ => return None,
                }
            }
        };
        tokens.push(token);
    }

    Some(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Left-associative chain of `operand`s joined by operators that `op_for` maps
    fn chain(
        &mut self,
        op_for: fn(&Token) -> Option<BinaryOp>,
        operand: fn(&mut Self) -> Option<Expr>,
    ) -> Option<Expr> {
        let mut node = operand(self)?;
        while let Some(op) = self.peek().and_then(op_for) {
            self.next();
            let rhs = operand(self)?;
            node = Expr::Binary {
                op,
                left: Box::new(node),
                right: Box::new(rhs),
            };
        }
        Some(node)
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        self.chain(
            |t| match t {
                Token::Eq => Some(BinaryOp::Eq),
                Token::Ne => Some(BinaryOp::Ne),
                Token::Lt => Some(BinaryOp::Lt),
                Token::Le => Some(BinaryOp::Le),
                Token::Gt => Some(BinaryOp::Gt),
                Token::Ge => Some(BinaryOp::Ge),
                _ => None,
            },
            Self::parse_concat,
        )
    }

    fn parse_concat(&mut self) -> Option<Expr> {
        self.chain(
            |t| matches!(t, Token::Amp).then_some(BinaryOp::Concat),
            Self::parse_sum,
        )
    }

    fn parse_sum(&mut self) -> Option<Expr> {
        self.chain(
            |t| match t {
                Token::Plus => Some(BinaryOp::Add),
                Token::Minus => Some(BinaryOp::Sub),
                _ => None,
            },
            Self::parse_product,
        )
    }

    fn parse_product(&mut self) -> Option<Expr> {
        self.chain(
            |t| match t {
                Token::Star => Some(BinaryOp::Mul),
                Token::Slash => Some(BinaryOp::Div),
                _ => None,
            },
            Self::parse_power,
        )
    }

    fn parse_power(&mut self) -> Option<Expr> {
        self.chain(
            |t| matches!(t, Token::Caret).then_some(BinaryOp::Pow),
            Self::parse_unary,
        )
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                self.next();
                Some(Expr::Negate(Box::new(self.parse_unary()?)))
            }
            Some(Token::Plus) => {
                self.next();
                self.parse_unary()
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut node = self.parse_primary()?;
        while matches!(self.peek(), Some(Token::Percent)) {
            self.next();
            node = Expr::Percent(Box::new(node));
        }
        Some(node)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.next()? {
            Token::Number(n) => Some(Expr::Number(n)),
            Token::Text(s) => Some(Expr::Text(s)),
            Token::Error(e) => Some(Expr::Error(e)),
            Token::LParen => {
                let expr = self.parse_expr()?;
                match self.next()? {
                    Token::RParen => Some(expr),
                    _ => None,
                }
            }
            Token::Ident(ident) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.next();
                    return self.parse_call(&ident);
                }
                Some(self.parse_reference(ident))
            }
            _ => None,
        }
    }

    fn parse_call(&mut self, ident: &str) -> Option<Expr> {
        let upper = ident.to_ascii_uppercase();
        // functions newer than the file format carry a prefix
        let name = upper
            .strip_prefix("_XLFN.")
            .or_else(|| upper.strip_prefix("_XLWS."))
            .unwrap_or(&upper)
            .to_string();

        let mut args = Vec::new();
        if matches!(self.peek(), Some(Token::RParen)) {
            self.next();
            return Some(Expr::Call { name, args });
        }

        loop {
            let arg = match self.peek()? {
                Token::Comma | Token::RParen => Expr::Missing,
                _ => self.parse_expr()?,
            };
            args.push(arg);
            match self.next()? {
                Token::Comma => continue,
                Token::RParen => break,
                _ => return None,
            }
        }

        Some(Expr::Call { name, args })
    }

    fn parse_reference(&mut self, ident: String) -> Expr {
        if !ident.contains('!') {
            match ident.to_ascii_uppercase().as_str() {
                "TRUE" => return Expr::Bool(true),
                "FALSE" => return Expr::Bool(false),
                _ => {}
            }
        }

        let mut text = ident;
        let mut end = None;
        if matches!(self.peek(), Some(Token::Colon)) {
            if let Some(Token::Ident(second)) = self.tokens.get(self.pos + 1).cloned() {
                self.pos += 2;
                end = parse_cell_ref(&second);
                text = format!("{}:{}", text, second);
                if end.is_none() {
                    return Expr::External(text);
                }
            }
        }

        if text.contains('!') {
            return Expr::External(text);
        }

        let (first, _) = text.split_once(':').unwrap_or((text.as_str(), ""));
        match (parse_cell_ref(first), end) {
            (Some(start), Some(end)) => Expr::Range { start, end },
            (Some(cell), None) => Expr::Reference(cell),
            _ => Expr::External(text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[test]
    fn test_cell_refs() {
        assert_eq!(parse_cell_ref("A1"), Some(CellRef::new(0, 0)));
        assert_eq!(parse_cell_ref("$B$2"), Some(CellRef::new(1, 1)));
        assert_eq!(parse_cell_ref("aa10"), Some(CellRef::new(9, 26)));
        assert_eq!(parse_cell_ref("XFD1048576"), Some(CellRef::new(1_048_575, 16_383)));
        assert_eq!(parse_cell_ref("XFE1"), None);
        assert_eq!(parse_cell_ref("A0"), None);
        assert_eq!(parse_cell_ref("Total"), None);
        assert_eq!(parse_cell_ref("A1B"), None);
    }

    #[test]
    fn test_leading_equals_is_optional() {
        assert_eq!(parse_formula("=2+3"), parse_formula("2+3"));
        assert_eq!(
            parse_formula("2+3"),
            Some(binary(BinaryOp::Add, Expr::Number(2.0), Expr::Number(3.0)))
        );
    }

    #[test]
    fn test_comparison_binds_loosest() {
        assert_eq!(
            parse_formula("1=1"),
            Some(binary(BinaryOp::Eq, Expr::Number(1.0), Expr::Number(1.0)))
        );
        assert_eq!(
            parse_formula("A1+1>=B1*2"),
            Some(binary(
                BinaryOp::Ge,
                binary(BinaryOp::Add, Expr::Reference(CellRef::new(0, 0)), Expr::Number(1.0)),
                binary(BinaryOp::Mul, Expr::Reference(CellRef::new(0, 1)), Expr::Number(2.0)),
            ))
        );
    }

    #[test]
    fn test_negation_binds_tighter_than_power() {
        assert_eq!(
            parse_formula("-2^2"),
            Some(binary(
                BinaryOp::Pow,
                Expr::Negate(Box::new(Expr::Number(2.0))),
                Expr::Number(2.0)
            ))
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(
            parse_formula(r#""say ""hi""""#),
            Some(Expr::Text(r#"say "hi""#.to_string()))
        );
        assert_eq!(parse_formula("TRUE"), Some(Expr::Bool(true)));
        assert_eq!(parse_formula("#DIV/0!"), Some(Expr::Error(CellErrorType::Div0)));
        assert_eq!(parse_formula("#N/A"), Some(Expr::Error(CellErrorType::NA)));
        assert_eq!(parse_formula("1.5E3"), Some(Expr::Number(1500.0)));
        assert_eq!(
            parse_formula("50%"),
            Some(Expr::Percent(Box::new(Expr::Number(50.0))))
        );
    }

    #[test]
    fn test_calls_and_ranges() {
        assert_eq!(
            parse_formula("sum(A1:B3, 4)"),
            Some(Expr::Call {
                name: "SUM".to_string(),
                args: vec![
                    Expr::Range {
                        start: CellRef::new(0, 0),
                        end: CellRef::new(2, 1),
                    },
                    Expr::Number(4.0),
                ],
            })
        );
        assert_eq!(
            parse_formula("IF(A1,,1)"),
            Some(Expr::Call {
                name: "IF".to_string(),
                args: vec![
                    Expr::Reference(CellRef::new(0, 0)),
                    Expr::Missing,
                    Expr::Number(1.0),
                ],
            })
        );
        assert_eq!(
            parse_formula("_xlfn.CONCAT(A1)"),
            Some(Expr::Call {
                name: "CONCAT".to_string(),
                args: vec![Expr::Reference(CellRef::new(0, 0))],
            })
        );
        assert_eq!(
            parse_formula("TRUE()"),
            Some(Expr::Call {
                name: "TRUE".to_string(),
                args: vec![],
            })
        );
    }

    #[test]
    fn test_unresolvable_references() {
        assert_eq!(
            parse_formula("Sheet2!A1"),
            Some(Expr::External("Sheet2!A1".to_string()))
        );
        assert_eq!(
            parse_formula("'My Sheet'!A1:B2"),
            Some(Expr::External("'My Sheet'!A1:B2".to_string()))
        );
        assert_eq!(parse_formula("A:A"), Some(Expr::External("A:A".to_string())));
        assert_eq!(
            parse_formula("TaxRate*2"),
            Some(binary(
                BinaryOp::Mul,
                Expr::External("TaxRate".to_string()),
                Expr::Number(2.0)
            ))
        );
    }

    #[test]
    fn test_rejects_malformed_text() {
        assert_eq!(parse_formula(""), None);
        assert_eq!(parse_formula("1+"), None);
        assert_eq!(parse_formula("(1"), None);
        assert_eq!(parse_formula("\"open"), None);
        assert_eq!(parse_formula("SUM(1;2)"), None);
        assert_eq!(parse_formula("#BOGUS!"), None);
    }
}
