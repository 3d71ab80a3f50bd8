//! Number rendering for fixed, scientific and fraction sections

use super::pattern::{literal_text, Token};

/// Slot of a digit template: a placeholder or literal text between digits
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Digit(char),
    Lit(String),
}

fn slots(tokens: &[Token]) -> Vec<Slot> {
    tokens
        .iter()
        .filter(|t| !matches!(t, Token::Comma))
        .map(|t| match t {
            Token::Placeholder(c) => Slot::Digit(*c),
            other => Slot::Lit(literal_text(other)),
        })
        .collect()
}

fn digit_count(slots: &[Slot]) -> usize {
    slots.iter().filter(|s| matches!(s, Slot::Digit(_))).count()
}

/// Render `value` (already non-negative) with a number section
pub(crate) fn render(tokens: &[Token], value: f64) -> String {
    if !value.is_finite() {
        return format_general(value);
    }

    let percent = tokens.iter().filter(|t| **t == Token::Percent).count();
    let mut v = value;
    for _ in 0..percent {
        v *= 100.0;
    }

    if tokens.contains(&Token::General) {
        return tokens
            .iter()
            .map(|t| match t {
                Token::General => format_general(v),
                other => literal_text(other),
            })
            .collect();
    }

    let Some((start, end)) = digit_span(tokens) else {
        return tokens.iter().map(literal_text).collect();
    };

    let prefix: String = tokens[..start].iter().map(literal_text).collect();
    let suffix: String = tokens[end + 1..].iter().map(literal_text).collect();
    let span = &tokens[start..=end];

    let body = if let Some(slash) = span.iter().position(|t| *t == Token::Slash) {
        render_fraction(&span[..slash], &span[slash + 1..], v)
    } else if let Some(e) = span
        .iter()
        .position(|t| matches!(t, Token::Exponent { .. }))
    {
        render_scientific(&span[..e], &span[e..], v)
    } else {
        render_fixed(span, v)
    };

    format!("{}{}{}", prefix, body, suffix)
}

/// First and last token of the digit area, including trailing scale commas
fn digit_span(tokens: &[Token]) -> Option<(usize, usize)> {
    let slash = tokens.iter().position(|t| *t == Token::Slash);
    let start = tokens
        .iter()
        .position(|t| matches!(t, Token::Placeholder(_) | Token::DecimalPoint))?;
    let mut end = tokens.iter().enumerate().rev().find_map(|(i, t)| {
        let in_denominator = slash.is_some_and(|s| i > s);
        match t {
            Token::Placeholder(_) => Some(i),
            Token::FixedDigit(_) if in_denominator => Some(i),
            _ => None,
        }
    })?;
    if end < start {
        return None;
    }
    while matches!(tokens.get(end + 1), Some(Token::Comma)) {
        end += 1;
    }
    Some((start, end))
}

/// Split into integer and fraction parts and count scaling commas
///
/// Commas directly after the last integer placeholder, or at the very end,
/// divide by a thousand each; commas between integer placeholders group.
fn split_fixed(span: &[Token]) -> (Vec<Slot>, Option<Vec<Slot>>, bool, usize) {
    let point = span.iter().position(|t| *t == Token::DecimalPoint);
    let (int_tokens, frac_tokens) = match point {
        Some(p) => (&span[..p], Some(&span[p + 1..])),
        None => (span, None),
    };

    let last_int_digit = int_tokens
        .iter()
        .rposition(|t| matches!(t, Token::Placeholder(_)));
    let mut grouping = false;
    let mut scale = 0;
    for (i, t) in int_tokens.iter().enumerate() {
        if *t == Token::Comma {
            match last_int_digit {
                Some(last) if i < last => grouping = true,
                _ => scale += 1,
            }
        }
    }
    if let Some(frac) = frac_tokens {
        scale += frac
            .iter()
            .rev()
            .take_while(|t| **t == Token::Comma)
            .count();
    }

    (slots(int_tokens), frac_tokens.map(slots), grouping, scale)
}

fn render_fixed(span: &[Token], value: f64) -> String {
    let (int_slots, frac_slots, grouping, scale) = split_fixed(span);
    let mut v = value;
    for _ in 0..scale {
        v /= 1000.0;
    }
    fixed_digits(v, &int_slots, frac_slots.as_deref(), grouping)
}

fn fixed_digits(v: f64, int_slots: &[Slot], frac_slots: Option<&[Slot]>, grouping: bool) -> String {
    let max_frac = frac_slots.map(digit_count).unwrap_or(0);
    let rounded = round_half_away(v, max_frac);
    let text = format!("{:.*}", max_frac, rounded);
    let (int_str, frac_str) = text.split_once('.').unwrap_or((text.as_str(), ""));
    let int_digits = if int_str == "0" { "" } else { int_str };

    let mut out = fill_integer(int_digits, int_slots, grouping);
    if let Some(frac) = frac_slots {
        out.push('.');
        out.push_str(&fill_fraction(frac_str, frac));
    }
    out
}

/// Place integer digits right to left into the template
///
/// Surplus digits go in front of the leftmost placeholder. Missing digits
/// become `0` for `0`, a space for `?` and nothing for `#`.
fn fill_integer(digits: &str, template: &[Slot], grouping: bool) -> String {
    let first_digit = template.iter().position(|s| matches!(s, Slot::Digit(_)));
    let mut pending: Vec<char> = digits.chars().collect();
    let mut out: Vec<char> = Vec::with_capacity(template.len() + pending.len());
    let mut emitted = 0usize;

    let mut push_digit = |out: &mut Vec<char>, d: char| {
        if grouping && emitted > 0 && emitted % 3 == 0 {
            out.push(',');
        }
        out.push(d);
        emitted += 1;
    };

    for (i, slot) in template.iter().enumerate().rev() {
        match slot {
            Slot::Digit(p) => {
                match pending.pop() {
                    Some(d) => push_digit(&mut out, d),
                    None if *p == '0' => push_digit(&mut out, '0'),
                    None if *p == '?' => out.push(' '),
                    None => {}
                }
                if Some(i) == first_digit {
                    while let Some(d) = pending.pop() {
                        push_digit(&mut out, d);
                    }
                }
            }
            Slot::Lit(s) => out.extend(s.chars().rev()),
        }
    }
    while let Some(d) = pending.pop() {
        push_digit(&mut out, d);
    }

    out.into_iter().rev().collect()
}

/// Place fraction digits left to right, dropping optional trailing zeros
fn fill_fraction(digits: &str, template: &[Slot]) -> String {
    let digits: Vec<char> = digits.chars().collect();
    let kinds: Vec<char> = template
        .iter()
        .filter_map(|s| match s {
            Slot::Digit(c) => Some(*c),
            Slot::Lit(_) => None,
        })
        .collect();

    let mut keep = digits.len().min(kinds.len());
    while keep > 0 && digits[keep - 1] == '0' && kinds[keep - 1] != '0' {
        keep -= 1;
    }

    let mut out = String::new();
    let mut idx = 0;
    for slot in template {
        match slot {
            Slot::Digit(p) => {
                if idx < keep {
                    out.push(digits[idx]);
                } else if *p == '?' {
                    out.push(' ');
                }
                idx += 1;
            }
            Slot::Lit(s) => out.push_str(s),
        }
    }
    out
}

fn render_scientific(mantissa: &[Token], exponent: &[Token], value: f64) -> String {
    let (int_slots, frac_slots, _, _) = split_fixed(mantissa);
    let max_frac = frac_slots.as_deref().map(digit_count).unwrap_or(0);
    let int_width = digit_count(&int_slots).max(1) as i32;
    let engineering = int_width > 1 && int_slots.contains(&Slot::Digit('#'));

    let (upper, plus) = match exponent.first() {
        Some(Token::Exponent { upper, plus }) => (*upper, *plus),
        _ => (true, true),
    };
    let exp_width = exponent
        .iter()
        .filter(|t| matches!(t, Token::Placeholder(_)))
        .count();

    let (mut exp, mut mantissa_value) = (0i32, 0.0);
    if value != 0.0 {
        let magnitude = value.log10().floor() as i32;
        exp = if engineering {
            magnitude.div_euclid(int_width) * int_width
        } else {
            magnitude - (int_width - 1)
        };
        mantissa_value = round_half_away(value / 10f64.powi(exp), max_frac);

        let step = if engineering { int_width } else { 1 };
        if mantissa_value >= 10f64.powi(int_width) {
            exp += step;
            mantissa_value = round_half_away(value / 10f64.powi(exp), max_frac);
        }
    }

    let mantissa_text = fixed_digits(mantissa_value, &int_slots, frac_slots.as_deref(), false);
    let sign = if exp < 0 {
        "-"
    } else if plus {
        "+"
    } else {
        ""
    };
    format!(
        "{}{}{}{:0width$}",
        mantissa_text,
        if upper { 'E' } else { 'e' },
        sign,
        exp.unsigned_abs(),
        width = exp_width
    )
}

fn render_fraction(left: &[Token], right: &[Token], value: f64) -> String {
    // numerator is the trailing run of placeholders left of the slash
    let num_start = left
        .iter()
        .rposition(|t| !matches!(t, Token::Placeholder(_)))
        .map(|i| i + 1)
        .unwrap_or(0);
    let whole_tokens = &left[..num_start];
    let numerator_slots = slots(&left[num_start..]);
    let mixed = whole_tokens
        .iter()
        .any(|t| matches!(t, Token::Placeholder(_)));

    let fixed_denominator: Option<u64> = {
        let digits: String = right
            .iter()
            .map_while(|t| match t {
                Token::FixedDigit(c) => Some(*c),
                Token::Placeholder('0') => Some('0'),
                _ => None,
            })
            .collect();
        if digits.starts_with(|c: char| c != '0') {
            digits.parse().ok()
        } else {
            None
        }
    };
    let den_width = right
        .iter()
        .filter(|t| matches!(t, Token::Placeholder(_)))
        .count()
        .clamp(1, 4);
    let pad_denominator = right.contains(&Token::Placeholder('?'));

    let (mut whole, frac) = if mixed {
        (value.trunc(), value.fract())
    } else {
        (0.0, value)
    };

    let (mut num, den) = match fixed_denominator {
        Some(d) => ((frac * d as f64).round() as u64, d),
        None => best_rational(frac, 10u64.pow(den_width as u32) - 1),
    };
    if mixed && num == den {
        whole += 1.0;
        num = 0;
    }

    let den_text = {
        let mut s = den.to_string();
        if pad_denominator && fixed_denominator.is_none() {
            while s.len() < den_width {
                s.push(' ');
            }
        }
        s
    };

    if !mixed {
        let num_text = fill_integer(&num.to_string(), &numerator_slots, false);
        return format!("{}/{}", num_text, den_text);
    }

    // split the whole template into its digits and the separator after them
    let whole_slots = slots(whole_tokens);
    let sep_at = whole_slots
        .iter()
        .rposition(|s| matches!(s, Slot::Digit(_)))
        .map(|i| i + 1)
        .unwrap_or(0);
    let separator: String = whole_slots[sep_at..]
        .iter()
        .map(|s| match s {
            Slot::Lit(l) => l.as_str(),
            Slot::Digit(_) => "",
        })
        .collect();

    let whole_digits = format!("{:.0}", whole);
    if num == 0 {
        let whole_text = fill_integer(&whole_digits, &whole_slots[..sep_at], false);
        let width = separator.len() + numerator_slots.len() + 1 + den_text.len();
        return format!("{}{}", whole_text, " ".repeat(width));
    }

    let whole_digits = if whole == 0.0 { "" } else { whole_digits.as_str() };
    let whole_text = fill_integer(whole_digits, &whole_slots[..sep_at], false);
    let num_text = fill_integer(&num.to_string(), &numerator_slots, false);
    format!("{}{}{}/{}", whole_text, separator, num_text, den_text)
}

/// Closest fraction with a denominator no larger than `max_den`
fn best_rational(value: f64, max_den: u64) -> (u64, u64) {
    let mut best = (value.round() as u64, 1u64);
    let mut best_err = (value - best.0 as f64).abs();
    for den in 2..=max_den.max(1) {
        let num = (value * den as f64).round();
        let err = (value - num / den as f64).abs();
        if err < best_err - f64::EPSILON {
            best = (num as u64, den);
            best_err = err;
            if err == 0.0 {
                break;
            }
        }
    }
    best
}

fn round_half_away(value: f64, decimals: usize) -> f64 {
    if decimals == 0 {
        return value.round();
    }
    let factor = 10f64.powi(decimals as i32);
    let scaled = value * factor;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / factor
}

/// `General` rendering: about ten significant digits within eleven
/// characters, scientific notation for very large or very small magnitudes
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if !value.is_finite() {
        return value.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e11 {
        let mut buf = itoa::Buffer::new();
        return buf.format(value as i64).to_string();
    }

    let magnitude = value.abs().log10().floor() as i32;
    match magnitude {
        -4..=-1 => general_fixed(value, 9),
        0..=9 => {
            let width = if value < 0.0 { 12 } else { 11 };
            let wide = general_fixed(value, 12);
            if wide.len() <= width {
                wide
            } else {
                general_fixed(value, (9 - magnitude) as usize)
            }
        }
        10 => general_fixed(value, 0),
        _ => general_exponential(value, magnitude),
    }
}

fn general_fixed(value: f64, decimals: usize) -> String {
    let text = format!("{:.*}", decimals, round_half_away(value, decimals));
    trim_fraction(&text).to_string()
}

fn general_exponential(value: f64, magnitude: i32) -> String {
    let mut exp = magnitude;
    let mut mantissa = round_half_away(value / 10f64.powi(exp), 5);
    if mantissa.abs() >= 10.0 {
        exp += 1;
        mantissa = round_half_away(value / 10f64.powi(exp), 5);
    }
    let mantissa_text = format!("{:.5}", mantissa);
    format!(
        "{}E{}{:02}",
        trim_fraction(&mantissa_text),
        if exp < 0 { '-' } else { '+' },
        exp.unsigned_abs()
    )
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::super::pattern::tokenize;
    use super::*;

    fn fmt(code: &str, value: f64) -> String {
        render(&tokenize(code), value)
    }

    #[test]
    fn test_fixed() {
        assert_eq!(fmt("0", 2.5), "3");
        assert_eq!(fmt("0.00", 1.236), "1.24");
        assert_eq!(fmt("#,##0", 1234567.0), "1,234,567");
        assert_eq!(fmt("#,##0.00", 1234.567), "1,234.57");
        assert_eq!(fmt("000", 7.0), "007");
        assert_eq!(fmt("#.##", 0.5), ".5");
        assert_eq!(fmt("0.0#", 2.0), "2.0");
        assert_eq!(fmt("#", 0.0), "");
        assert_eq!(fmt("?.??", 1.5), "1.5 ");
    }

    #[test]
    fn test_percent_and_scaling() {
        assert_eq!(fmt("0%", 0.256), "26%");
        assert_eq!(fmt("0.00%", 0.0125), "1.25%");
        assert_eq!(fmt("#,##0,", 1234567.0), "1,235");
        assert_eq!(fmt("0.0,,\"M\"", 2_500_000.0), "2.5M");
    }

    #[test]
    fn test_interleaved_literals() {
        assert_eq!(fmt("000-00-0000", 123456789.0), "123-45-6789");
        assert_eq!(fmt("\"$\"#,##0.00", 5.0), "$5.00");
    }

    #[test]
    fn test_scientific() {
        assert_eq!(fmt("0.00E+00", 12345.0), "1.23E+04");
        assert_eq!(fmt("0.00E+00", 0.00012), "1.20E-04");
        assert_eq!(fmt("##0.0E+0", 12345.0), "12.3E+3");
        assert_eq!(fmt("0.00E+00", 0.0), "0.00E+00");
        assert_eq!(fmt("0.0E+00", 9.99), "1.0E+01");
    }

    #[test]
    fn test_fractions() {
        assert_eq!(fmt("# ?/?", 1.5), "1 1/2");
        assert_eq!(fmt("# ??/??", 3.14159), "3 14/99");
        assert_eq!(fmt("# ??/??", 0.5), "  1/2 ");
        assert_eq!(fmt("# ?/?", 2.0), "2    ");
        assert_eq!(fmt("?/?", 0.75), "3/4");
        assert_eq!(fmt("# ?/100", 1.25), "1 25/100");
    }

    #[test]
    fn test_general() {
        assert_eq!(format_general(0.0), "0");
        assert_eq!(format_general(42.0), "42");
        assert_eq!(format_general(0.1 + 0.2), "0.3");
        assert_eq!(format_general(1.0 / 3.0), "0.333333333");
        assert_eq!(format_general(12.3456789012), "12.3456789");
        assert_eq!(format_general(123456789012.0), "1.23457E+11");
        assert_eq!(format_general(0.00001234), "1.234E-05");
        assert_eq!(format_general(-2.5), "-2.5");
    }
}
