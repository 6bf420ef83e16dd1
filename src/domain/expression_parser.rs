//! Condition language parser.
//!
//! Recursive descent parser for the infix form of a strategy, e.g.
//! `current-price > sma(9) && !(rsi(14) >= 70)`. Produces the same
//! [`Expression`] tree as the JSON form.
//!
//! Grammar:
//!
//! ```text
//! condition  := or_expr | ""
//! or_expr    := and_expr ( "||" or_expr )?
//! and_expr   := unary ( "&&" and_expr )?
//! unary      := "!" "(" or_expr ")" | "(" or_expr ")" | comparison
//! comparison := operand ( "=" | "!=" | "<" | "<=" | ">" | ">=" ) operand
//! operand    := "current-price" | number | sma(n) | ema(n) | rsi(n)
//!             | bollinger(n) | bollinger(n, mult)
//! ```
//!
//! `&&` binds tighter than `||`; both associate to the right.

use crate::domain::error::ParseError;
use crate::domain::expression::{CompareOp, Expression, Operand};
use crate::domain::indicator::{DEFAULT_BOLLINGER_STDDEV_X100, IndicatorId, checked_stddev_mult};

/// Deepest nesting of groups and `&&`/`||` chains accepted.
const MAX_DEPTH: usize = 256;

struct Parser<'a> {
    input: &'a str,
    /// Byte offset into `input`.
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    /// Character offset of the byte offset `byte`, for error positions.
    fn char_position(&self, byte: usize) -> usize {
        self.input[..byte].chars().count()
    }

    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("condition nested deeper than {} levels", MAX_DEPTH)));
        }
        Ok(())
    }

    fn remaining(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            position: self.char_position(self.pos),
        }
    }

    fn found(&self) -> String {
        let word: String = self
            .remaining()
            .chars()
            .take_while(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if !word.is_empty() {
            word
        } else {
            self.peek()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "end of input".to_string())
        }
    }

    fn expect_char(&mut self, expected: char) -> Result<(), ParseError> {
        self.skip_whitespace();
        match self.peek() {
            Some(ch) if ch == expected => {
                self.advance();
                Ok(())
            }
            _ => Err(self.error(format!("expected '{}', found '{}'", expected, self.found()))),
        }
    }

    fn consume_exact(&mut self, s: &str) -> bool {
        if self.remaining().starts_with(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let mut has_dot = false;
        let mut digits = 0;

        if self.peek() == Some('-') {
            self.advance();
        }

        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                digits += 1;
                self.advance();
            } else if ch == '.' && !has_dot {
                has_dot = true;
                self.advance();
            } else {
                break;
            }
        }

        if digits == 0 {
            return Err(ParseError {
                message: "expected number".to_string(),
                position: self.char_position(start),
            });
        }

        let text = &self.input[start..self.pos];
        text.parse::<f64>().map_err(|_| ParseError {
            message: format!("invalid number: {}", text),
            position: self.char_position(start),
        })
    }

    fn parse_period(&mut self) -> Result<usize, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        match text.parse::<usize>() {
            Ok(period) if period > 0 => Ok(period),
            _ => Err(ParseError {
                message: "expected a positive integer period".to_string(),
                position: self.char_position(start),
            }),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, ParseError> {
        self.skip_whitespace();

        if self
            .peek()
            .is_some_and(|ch| ch.is_ascii_digit() || ch == '-' || ch == '.')
        {
            return Ok(Operand::Literal(self.parse_number()?));
        }

        if self.consume_exact("current-price") {
            return Ok(Operand::CurrentPrice);
        }

        let id = if self.consume_exact("sma(") {
            IndicatorId::Sma(self.parse_period()?)
        } else if self.consume_exact("ema(") {
            IndicatorId::Ema(self.parse_period()?)
        } else if self.consume_exact("rsi(") {
            IndicatorId::Rsi(self.parse_period()?)
        } else if self.consume_exact("bollinger(") {
            let period = self.parse_period()?;
            self.skip_whitespace();
            let stddev_mult_x100 = if self.peek() == Some(',') {
                self.advance();
                let start = self.pos;
                let mult = self.parse_number()?;
                checked_stddev_mult(mult).map_err(|reason| ParseError {
                    message: format!("bollinger {}", reason),
                    position: self.char_position(start),
                })?
            } else {
                DEFAULT_BOLLINGER_STDDEV_X100
            };
            IndicatorId::Bollinger {
                period,
                stddev_mult_x100,
            }
        } else {
            return Err(self.error(format!(
                "expected operand (current-price, number, sma(n), ema(n), rsi(n)), found '{}'",
                self.found()
            )));
        };

        self.expect_char(')')?;
        Ok(Operand::Indicator(id))
    }

    /// Returns the operator and whether the comparison is negated (`!=`).
    fn parse_operator(&mut self) -> Result<(CompareOp, bool), ParseError> {
        self.skip_whitespace();
        // Two-character operators first so `<=` is not read as `<`.
        let table = [
            ("<=", CompareOp::LEq, false),
            (">=", CompareOp::GEq, false),
            ("!=", CompareOp::Eq, true),
            ("=", CompareOp::Eq, false),
            ("<", CompareOp::Lt, false),
            (">", CompareOp::Gt, false),
        ];
        for (token, op, negated) in table {
            if self.consume_exact(token) {
                return Ok((op, negated));
            }
        }
        Err(self.error(format!(
            "expected comparison operator, found '{}'",
            self.found()
        )))
    }

    fn parse_comparison(&mut self) -> Result<Expression, ParseError> {
        let left = self.parse_operand()?;
        let (op, negated) = self.parse_operator()?;
        let right = self.parse_operand()?;

        let cmp = Expression::compare(op, left, right);
        Ok(if negated { Expression::negate(cmp) } else { cmp })
    }

    fn parse_unary(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();

        if self.remaining().starts_with('!') && !self.remaining().starts_with("!=") {
            self.advance();
            self.expect_char('(')?;
            let inner = self.parse_or()?;
            self.expect_char(')')?;
            return Ok(Expression::negate(inner));
        }

        if self.peek() == Some('(') {
            self.advance();
            let inner = self.parse_or()?;
            self.expect_char(')')?;
            return Ok(inner);
        }

        self.parse_comparison()
    }

    fn parse_and(&mut self) -> Result<Expression, ParseError> {
        self.descend()?;
        let left = self.parse_unary()?;
        self.skip_whitespace();
        let expr = if self.consume_exact("&&") {
            Expression::and(left, self.parse_and()?)
        } else {
            left
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse_or(&mut self) -> Result<Expression, ParseError> {
        self.descend()?;
        let left = self.parse_and()?;
        self.skip_whitespace();
        let expr = if self.consume_exact("||") {
            Expression::or(left, self.parse_or()?)
        } else {
            left
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn parse(&mut self) -> Result<Expression, ParseError> {
        self.skip_whitespace();
        if self.remaining().is_empty() {
            return Ok(Expression::Always);
        }

        let expr = self.parse_or()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            return Err(self.error(format!(
                "unexpected input after condition: '{}'",
                self.remaining()
            )));
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expression, ParseError> {
    let mut parser = Parser::new(input);
    parser.parse()
}
