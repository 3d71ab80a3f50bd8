//! Format code parsing: sections, conditions and section classification
//!
//! A format code has up to four `;` separated sections. Without conditions
//! they apply to positive numbers, negative numbers, zero and text. A section
//! may carry a bracketed condition (`[>=100]`) and a color (`[Red]`); colors
//! do not affect the rendered text.

use super::date::{self, DateSection};
use super::number;
use crate::error::{Result, XlsxStreamError};

/// Comparison attached to a conditional section
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Condition {
    op: Comparison,
    threshold: f64,
}

impl Condition {
    fn parse(content: &str) -> Option<Self> {
        let (op, rest) = if let Some(r) = content.strip_prefix("<=") {
            (Comparison::Le, r)
        } else if let Some(r) = content.strip_prefix(">=") {
            (Comparison::Ge, r)
        } else if let Some(r) = content.strip_prefix("<>") {
            (Comparison::Ne, r)
        } else if let Some(r) = content.strip_prefix('<') {
            (Comparison::Lt, r)
        } else if let Some(r) = content.strip_prefix('>') {
            (Comparison::Gt, r)
        } else if let Some(r) = content.strip_prefix('=') {
            (Comparison::Eq, r)
        } else {
            return None;
        };
        let threshold = rest.trim().parse::<f64>().ok()?;
        Some(Condition { op, threshold })
    }

    fn matches(&self, value: f64) -> bool {
        match self.op {
            Comparison::Lt => value < self.threshold,
            Comparison::Le => value <= self.threshold,
            Comparison::Gt => value > self.threshold,
            Comparison::Ge => value >= self.threshold,
            Comparison::Eq => value == self.threshold,
            Comparison::Ne => value != self.threshold,
        }
    }

    /// Conditions selecting negative values render them without a sign
    fn selects_negatives(&self) -> bool {
        matches!(self.op, Comparison::Lt | Comparison::Le) && self.threshold <= 0.0
    }
}

/// Lexical unit of a number or text section
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Literal(String),
    /// `0`, `#` or `?`
    Placeholder(char),
    /// `1`-`9`, literal except in fraction denominators
    FixedDigit(char),
    DecimalPoint,
    Comma,
    Percent,
    Exponent { upper: bool, plus: bool },
    Slash,
    /// `@`
    Text,
    General,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SectionBody {
    Number(Vec<Token>),
    Date(DateSection),
    Text(Vec<Token>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Section {
    condition: Option<Condition>,
    body: SectionBody,
}

/// Parsed format code
#[derive(Debug, Clone, PartialEq)]
pub struct FormatPattern {
    sections: Vec<Section>,
}

impl FormatPattern {
    /// Parse a format code
    ///
    /// Fails with [`XlsxStreamError::InvalidFormatPattern`] for unterminated
    /// quotes or brackets, malformed conditions and more than four sections.
    pub fn parse(code: &str) -> Result<Self> {
        let invalid = |why: &str| XlsxStreamError::InvalidFormatPattern(format!("{}: '{}'", why, code));

        let raw_sections = split_sections(code).ok_or_else(|| invalid("unterminated quote or bracket"))?;
        if raw_sections.len() > 4 {
            return Err(invalid("more than four sections"));
        }

        let mut sections = Vec::with_capacity(raw_sections.len());
        for raw in raw_sections {
            let condition = match leading_condition(raw) {
                Some(content) => Some(Condition::parse(content).ok_or_else(|| invalid("malformed condition"))?),
                None => None,
            };
            let body = match classify(raw) {
                Kind::Date => SectionBody::Date(date::tokenize(raw)),
                Kind::Text => SectionBody::Text(tokenize(raw)),
                Kind::Number => SectionBody::Number(tokenize(raw)),
            };
            sections.push(Section { condition, body });
        }

        Ok(FormatPattern { sections })
    }

    /// Pattern equivalent to the `General` code
    pub fn general() -> Self {
        FormatPattern {
            sections: vec![Section {
                condition: None,
                body: SectionBody::Number(vec![Token::General]),
            }],
        }
    }

    /// Whether any section renders dates or times
    pub fn is_date(&self) -> bool {
        self.sections
            .iter()
            .any(|s| matches!(s.body, SectionBody::Date(_)))
    }

    fn numeric_sections(&self) -> &[Section] {
        let n = self.sections.len();
        if n == 4 {
            &self.sections[..3]
        } else if n == 1 && matches!(self.sections[0].body, SectionBody::Text(_)) {
            &[]
        } else {
            &self.sections
        }
    }

    fn text_section(&self) -> Option<&Section> {
        match self.sections.len() {
            4 => self.sections.get(3),
            _ => self
                .sections
                .iter()
                .find(|s| matches!(s.body, SectionBody::Text(_))),
        }
    }

    /// Pick the section for a number and whether a minus sign is added
    fn select(&self, value: f64) -> Option<(&Section, bool)> {
        let numeric = self.numeric_sections();
        let negative = value < 0.0;

        if numeric.iter().any(|s| s.condition.is_some()) {
            for section in numeric {
                if let Some(cond) = &section.condition {
                    if cond.matches(value) {
                        return Some((section, negative && !cond.selects_negatives()));
                    }
                }
            }
            return numeric
                .iter()
                .find(|s| s.condition.is_none())
                .map(|s| (s, negative));
        }

        match numeric.len() {
            0 => None,
            1 => Some((&numeric[0], negative)),
            2 if negative => Some((&numeric[1], false)),
            2 => Some((&numeric[0], false)),
            _ if negative => Some((&numeric[1], false)),
            _ if value == 0.0 => Some((&numeric[2], false)),
            _ => Some((&numeric[0], false)),
        }
    }

    /// Render a number
    pub fn format_number(&self, value: f64) -> String {
        let Some((section, sign)) = self.select(value) else {
            return number::format_general(value);
        };

        let magnitude = value.abs();
        let rendered = match &section.body {
            SectionBody::Number(tokens) => number::render(tokens, magnitude),
            SectionBody::Text(tokens) => render_text(tokens, &number::format_general(magnitude)),
            SectionBody::Date(date_section) => {
                // dates ignore the section sign rules
                return match date::render(date_section, value) {
                    Some(text) => text,
                    None => number::format_general(value),
                };
            }
        };

        if sign && has_nonzero_digit(&rendered) {
            format!("-{}", rendered)
        } else {
            rendered
        }
    }

    /// Render text; without a text section the text is returned unchanged
    pub fn format_text(&self, text: &str) -> String {
        match self.text_section() {
            Some(Section {
                body: SectionBody::Text(tokens),
                ..
            }) => render_text(tokens, text),
            _ => text.to_string(),
        }
    }
}

fn has_nonzero_digit(s: &str) -> bool {
    s.bytes().any(|b| (b'1'..=b'9').contains(&b))
}

/// Split a code on `;` outside quotes, escapes and brackets
///
/// Returns `None` for an unterminated quote or bracket.
fn split_sections(code: &str) -> Option<Vec<&str>> {
    let mut sections = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_bracket = false;
    let mut escape = false;

    for (idx, ch) in code.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if in_quotes {
            if ch == '"' {
                in_quotes = false;
            }
            continue;
        }
        if in_bracket {
            if ch == ']' {
                in_bracket = false;
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            '[' => in_bracket = true,
            '\\' | '_' | '*' => escape = true,
            ';' => {
                sections.push(&code[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }

    if in_quotes || in_bracket {
        return None;
    }
    sections.push(&code[start..]);
    Some(sections)
}

/// Content of the first bracket that holds a comparison, if any
fn leading_condition(section: &str) -> Option<&str> {
    let mut rest = section.trim_start();
    while let Some(after) = rest.strip_prefix('[') {
        let end = after.find(']')?;
        let content = &after[..end];
        if content.starts_with(['<', '>', '=']) {
            return Some(content);
        }
        rest = &after[end + 1..];
    }
    None
}

enum Kind {
    Number,
    Date,
    Text,
}

/// Decide how a section renders by looking at its unquoted characters
fn classify(section: &str) -> Kind {
    let mut chars = section.chars().peekable();
    let mut has_text = false;
    let mut has_date = false;

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let mut content = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    content.push(c);
                }
                if date::is_elapsed_bracket(&content) {
                    has_date = true;
                }
            }
            '@' => has_text = true,
            'g' | 'G' => {
                let rest: String = chars.clone().take(6).collect();
                if rest.eq_ignore_ascii_case("eneral") {
                    return Kind::Number;
                }
            }
            'y' | 'Y' | 'm' | 'M' | 'd' | 'D' | 'h' | 'H' | 's' | 'S' => has_date = true,
            'a' | 'A' => {
                let rest: String = chars.clone().take(4).collect();
                if rest.eq_ignore_ascii_case("m/pm") || rest.get(..2).is_some_and(|r| r.eq_ignore_ascii_case("/p")) {
                    has_date = true;
                }
            }
            _ => {}
        }
    }

    if has_date {
        Kind::Date
    } else if has_text {
        Kind::Text
    } else {
        Kind::Number
    }
}

/// Currency symbol of a `[$€-407]` style bracket
pub(crate) fn currency_symbol(content: &str) -> Option<&str> {
    let after = content.strip_prefix('$')?;
    let symbol = after.split_once('-').map(|(s, _)| s).unwrap_or(after);
    (!symbol.is_empty()).then_some(symbol)
}

/// Tokenize a number or text section
pub(crate) fn tokenize(section: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = section.chars().peekable();

    while let Some(ch) = chars.next() {
        let token = match ch {
            '"' => {
                let mut lit = String::new();
                for c in chars.by_ref() {
                    if c == '"' {
                        break;
                    }
                    lit.push(c);
                }
                Token::Literal(lit)
            }
            '\\' => match chars.next() {
                Some(c) => Token::Literal(c.to_string()),
                None => continue,
            },
            '_' => {
                chars.next();
                Token::Literal(" ".to_string())
            }
            '*' => {
                chars.next();
                continue;
            }
            '[' => {
                let mut content = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    content.push(c);
                }
                match currency_symbol(&content) {
                    Some(symbol) => Token::Literal(symbol.to_string()),
                    None => continue,
                }
            }
            '0' | '#' | '?' => Token::Placeholder(ch),
            '1'..='9' => Token::FixedDigit(ch),
            '.' => Token::DecimalPoint,
            ',' => Token::Comma,
            '%' => Token::Percent,
            '/' => Token::Slash,
            '@' => Token::Text,
            'E' | 'e' => match chars.peek() {
                Some('+') | Some('-') => {
                    let plus = chars.next() == Some('+');
                    Token::Exponent {
                        upper: ch == 'E',
                        plus,
                    }
                }
                _ => Token::Literal(ch.to_string()),
            },
            'G' | 'g' => {
                let rest: String = chars.clone().take(6).collect();
                if rest.eq_ignore_ascii_case("eneral") {
                    for _ in 0..6 {
                        chars.next();
                    }
                    Token::General
                } else {
                    Token::Literal(ch.to_string())
                }
            }
            other => Token::Literal(other.to_string()),
        };
        tokens.push(token);
    }

    tokens
}

/// Render a token outside the digit span as plain text
pub(crate) fn literal_text(token: &Token) -> String {
    match token {
        Token::Literal(s) => s.clone(),
        Token::Placeholder(c) | Token::FixedDigit(c) => c.to_string(),
        Token::DecimalPoint => ".".to_string(),
        Token::Comma => ",".to_string(),
        Token::Percent => "%".to_string(),
        Token::Exponent { upper, plus } => {
            format!("{}{}", if *upper { 'E' } else { 'e' }, if *plus { '+' } else { '-' })
        }
        Token::Slash => "/".to_string(),
        Token::Text | Token::General => String::new(),
    }
}

fn render_text(tokens: &[Token], text: &str) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text | Token::General => out.push_str(text),
            other => out.push_str(&literal_text(other)),
        }
    }
    out
}
