//! Roll-formula evaluation.
//!
//! Source entries embed a small arithmetic/dice micro-language in damage
//! and roll tags: literals, one level of parenthetical grouping, an
//! optional dice term (`NdM`), `ceil`/`floor`, and contextual variable
//! placeholders (`@item.level`, `@item.rank`, `@actor.level`,
//! `@item.badge.value`). Authored text is frequently sloppy — unbalanced
//! parens, trailing `#comment` or `|damage-type` annotations — so every
//! step here strips rather than rejects, and evaluation failures return
//! the best-effort partially-substituted string instead of an error.

use tome_graph::DocumentNode;
use tracing::debug;

/// Evaluate a formula in the context of `doc`.
///
/// Pure except for reading `doc.level`. Never fails: malformed input
/// comes back partially substituted.
#[must_use]
pub fn evaluate(doc: &DocumentNode, formula: &str) -> String {
    let mut text = formula.trim().to_owned();

    // One layer of unbalanced leading paren, then one fully-wrapping pair.
    if text.matches('(').count() != text.matches(')').count() && text.starts_with('(') {
        text.remove(0);
    }
    text = strip_wrapping(&text, '(', ')');

    text = substitute_variables(&text, doc.level.unwrap_or(1));

    // Trailing comments and damage-type annotations are not arithmetic.
    if let Some(pos) = text.find(['#', '|']) {
        text.truncate(pos);
    }
    let text = strip_wrapping(text.trim(), '{', '}');

    if !text.contains(['d', 'D']) {
        match arith::eval(&text) {
            Ok(value) => format_number(value),
            Err(err) => {
                debug!(formula = text, error = %err, "arithmetic evaluation failed");
                text
            }
        }
    } else {
        rewrite_dice(&text)
    }
}

/// Replace contextual variable placeholders, bare and parenthesized.
fn substitute_variables(text: &str, level: i64) -> String {
    let level = level.to_string();
    let mut out = text.to_owned();
    for pattern in ["(@item.level)", "@item.level", "(@item.rank)", "@item.rank"] {
        out = out.replace(pattern, &level);
    }
    // Actor level and badge value are written against generic feat text;
    // the established convention reads both as 1.
    for pattern in [
        "(@actor.level)",
        "@actor.level",
        "(@item.badge.value)",
        "@item.badge.value",
    ] {
        out = out.replace(pattern, "1");
    }
    out
}

/// Strip exactly one wrapping `open`..`close` pair, if the pair that opens
/// at the first character closes at the last.
fn strip_wrapping(text: &str, open: char, close: char) -> String {
    if !(text.starts_with(open) && text.ends_with(close)) {
        return text.to_owned();
    }
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                if i == text.len() - close.len_utf8() {
                    return text[open.len_utf8()..i].to_owned();
                }
                return text.to_owned();
            }
        }
    }
    text.to_owned()
}

/// Rewrite a dice formula as `<evaluatedCount>d<dieSize><tail>`.
///
/// Only the count sub-expression is evaluated; the die size and any
/// trailing arithmetic pass through untouched, so `2d6+4` stays `2d6+4`
/// while `(3+1)d6` becomes `4d6`.
fn rewrite_dice(text: &str) -> String {
    let Some(idx) = text.find(['d', 'D']) else {
        return text.to_owned();
    };
    let count = text[..idx].trim();
    let rest = &text[idx + 1..];

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (size, tail) = rest.split_at(digits_end);
    if size.is_empty() {
        // Not actually a dice term ("2 damage"); leave it alone.
        return text.to_owned();
    }

    let count = if count.is_empty() {
        "1".to_owned()
    } else if count.chars().all(|c| c.is_ascii_digit()) {
        // Literal numeric token, left untouched.
        count.to_owned()
    } else {
        match arith::eval(count) {
            Ok(value) => format_number(value),
            Err(err) => {
                debug!(count, error = %err, "dice count evaluation failed");
                count.to_owned()
            }
        }
    };

    format!("{count}d{size}{tail}")
}

/// Print a result the way authored formulas spell numbers: integers bare,
/// everything else with its fractional part.
fn format_number(value: f64) -> String {
    if value.is_finite() && (value - value.round()).abs() < 1e-9 {
        #[allow(clippy::cast_possible_truncation)]
        let rounded = value.round() as i64;
        rounded.to_string()
    } else {
        value.to_string()
    }
}

/// Plain arithmetic sub-evaluator: `+ - * /`, unary minus, parentheses,
/// and the `ceil`/`floor` functions.
mod arith {
    use std::fmt;

    /// Arithmetic parse/evaluation error.
    #[derive(Debug, PartialEq, Eq)]
    pub enum ArithError {
        /// Unexpected character at the given byte offset.
        UnexpectedChar(usize),
        /// Input ended mid-expression.
        UnexpectedEnd,
        /// Unknown function name.
        UnknownFunction(String),
    }

    impl fmt::Display for ArithError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                Self::UnexpectedChar(at) => write!(f, "unexpected character at offset {at}"),
                Self::UnexpectedEnd => write!(f, "unexpected end of expression"),
                Self::UnknownFunction(name) => write!(f, "unknown function '{name}'"),
            }
        }
    }

    /// Evaluate an arithmetic expression.
    pub fn eval(input: &str) -> Result<f64, ArithError> {
        let mut parser = Parser {
            bytes: input.as_bytes(),
            pos: 0,
        };
        let value = parser.expr()?;
        parser.skip_ws();
        if parser.pos != parser.bytes.len() {
            return Err(ArithError::UnexpectedChar(parser.pos));
        }
        Ok(value)
    }

    struct Parser<'a> {
        bytes: &'a [u8],
        pos: usize,
    }

    impl Parser<'_> {
        fn skip_ws(&mut self) {
            while self.bytes.get(self.pos).is_some_and(u8::is_ascii_whitespace) {
                self.pos += 1;
            }
        }

        fn peek(&mut self) -> Option<u8> {
            self.skip_ws();
            self.bytes.get(self.pos).copied()
        }

        fn expr(&mut self) -> Result<f64, ArithError> {
            let mut value = self.term()?;
            while let Some(op @ (b'+' | b'-')) = self.peek() {
                self.pos += 1;
                let rhs = self.term()?;
                if op == b'+' {
                    value += rhs;
                } else {
                    value -= rhs;
                }
            }
            Ok(value)
        }

        fn term(&mut self) -> Result<f64, ArithError> {
            let mut value = self.factor()?;
            while let Some(op @ (b'*' | b'/')) = self.peek() {
                self.pos += 1;
                let rhs = self.factor()?;
                if op == b'*' {
                    value *= rhs;
                } else {
                    value /= rhs;
                }
            }
            Ok(value)
        }

        fn factor(&mut self) -> Result<f64, ArithError> {
            match self.peek() {
                Some(b'-') => {
                    self.pos += 1;
                    Ok(-self.factor()?)
                }
                Some(b'(') => {
                    self.pos += 1;
                    let value = self.expr()?;
                    self.expect(b')')?;
                    Ok(value)
                }
                Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
                Some(c) if c.is_ascii_alphabetic() => self.function(),
                Some(_) => Err(ArithError::UnexpectedChar(self.pos)),
                None => Err(ArithError::UnexpectedEnd),
            }
        }

        fn number(&mut self) -> Result<f64, ArithError> {
            let start = self.pos;
            while self
                .bytes
                .get(self.pos)
                .is_some_and(|c| c.is_ascii_digit() || *c == b'.')
            {
                self.pos += 1;
            }
            std::str::from_utf8(&self.bytes[start..self.pos])
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(ArithError::UnexpectedChar(start))
        }

        fn function(&mut self) -> Result<f64, ArithError> {
            let start = self.pos;
            while self
                .bytes
                .get(self.pos)
                .is_some_and(u8::is_ascii_alphabetic)
            {
                self.pos += 1;
            }
            let name = std::str::from_utf8(&self.bytes[start..self.pos])
                .map_err(|_| ArithError::UnexpectedChar(start))?;
            self.expect(b'(')?;
            let value = self.expr()?;
            self.expect(b')')?;
            match name {
                "ceil" => Ok(value.ceil()),
                "floor" => Ok(value.floor()),
                _ => Err(ArithError::UnknownFunction(name.to_owned())),
            }
        }

        fn expect(&mut self, expected: u8) -> Result<(), ArithError> {
            if self.peek() == Some(expected) {
                self.pos += 1;
                Ok(())
            } else if self.pos >= self.bytes.len() {
                Err(ArithError::UnexpectedEnd)
            } else {
                Err(ArithError::UnexpectedChar(self.pos))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tome_graph::{DocumentKind, DocumentNode};

    fn item(level: i64) -> DocumentNode {
        let mut node = DocumentNode::new("Item.test", "Test", DocumentKind::Item);
        node.level = Some(level);
        node
    }

    #[test]
    fn plain_arithmetic_with_item_level() {
        assert_eq!(evaluate(&item(5), "(@item.level)+2"), "7");
        assert_eq!(evaluate(&item(5), "@item.level+2"), "7");
        assert_eq!(evaluate(&item(4), "@item.rank*2"), "8");
    }

    #[test]
    fn actor_level_and_badge_read_as_one() {
        assert_eq!(evaluate(&item(9), "@actor.level+1"), "2");
        assert_eq!(evaluate(&item(9), "(@item.badge.value)"), "1");
    }

    #[test]
    fn missing_level_defaults_to_one() {
        let node = DocumentNode::new("Item.x", "X", DocumentKind::Item);
        assert_eq!(evaluate(&node, "@item.level+1"), "2");
    }

    #[test]
    fn dice_count_is_evaluated_die_size_passes_through() {
        assert_eq!(evaluate(&item(3), "(@item.level)d6"), "3d6");
        assert_eq!(evaluate(&item(3), "(@item.level+1)d10"), "4d10");
    }

    #[test]
    fn literal_dice_terms_are_untouched() {
        assert_eq!(evaluate(&item(1), "2d6+4"), "2d6+4");
        assert_eq!(evaluate(&item(1), "1d4"), "1d4");
    }

    #[test]
    fn empty_count_defaults_to_one() {
        assert_eq!(evaluate(&item(1), "d20"), "1d20");
    }

    #[test]
    fn ceil_and_floor() {
        assert_eq!(evaluate(&item(5), "ceil(@item.level/2)"), "3");
        assert_eq!(evaluate(&item(5), "floor(@item.level/2)"), "2");
        assert_eq!(evaluate(&item(5), "floor((@item.level+1)/2)d6"), "3d6");
    }

    #[test]
    fn unbalanced_leading_paren_is_stripped() {
        assert_eq!(evaluate(&item(1), "(2d6+4"), "2d6+4");
        assert_eq!(evaluate(&item(1), "((1+2)"), "3");
    }

    #[test]
    fn fully_wrapped_parens_are_stripped_once() {
        assert_eq!(evaluate(&item(1), "(2d6+4)"), "2d6+4");
        // Not actually wrapping; both sides stay.
        assert_eq!(evaluate(&item(1), "(1)+(2)"), "3");
    }

    #[test]
    fn trailing_annotations_are_truncated() {
        assert_eq!(evaluate(&item(1), "1d4 #minutes"), "1d4");
        assert_eq!(evaluate(&item(1), "1d6|fire"), "1d6");
    }

    #[test]
    fn wrapping_braces_are_stripped() {
        assert_eq!(evaluate(&item(1), "{2+2}"), "4");
    }

    #[test]
    fn unparseable_input_comes_back_substituted() {
        assert_eq!(evaluate(&item(5), "@item.level splash"), "5 splash");
        assert_eq!(evaluate(&item(1), "2 damage"), "2 damage");
    }

    #[test]
    fn fractional_results_keep_their_fraction() {
        assert_eq!(evaluate(&item(1), "5/2"), "2.5");
    }

    #[test]
    fn arith_rejects_garbage() {
        assert!(arith::eval("1 +").is_err());
        assert!(arith::eval("sqrt(4)").is_err());
        assert!(arith::eval("(1").is_err());
    }
}
