//! Date and time sections
//!
//! Serial numbers count days from 1899-12-31 with the 1900 leap-year quirk:
//! serial 60 is the nonexistent 1900-02-29 and serial 0 renders as
//! 1900-01-00. The fractional part is the time of day.

use super::pattern::currency_symbol;
use chrono::{Datelike, Days, NaiveDate};

/// Largest serial with a four-digit year (9999-12-31)
const MAX_SERIAL: f64 = 2_958_466.0;

const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Weekday names indexed by `serial % 7`
const WEEKDAYS: [&str; 7] = [
    "Saturday",
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ElapsedUnit {
    Hours,
    Minutes,
    Seconds,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DateToken {
    Literal(String),
    Year(usize),
    Month(usize),
    Day(usize),
    Hour(usize),
    Minute(usize),
    Second(usize),
    /// Digits after the decimal point of the seconds
    SubSecond(usize),
    Elapsed(ElapsedUnit, usize),
    /// `AM/PM`
    AmPm,
    /// `A/P`, keeping the case written in the code
    AP { lower: bool },
    /// `m` run not yet known to be a month or a minute
    MonthOrMinute(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateSection {
    tokens: Vec<DateToken>,
    twelve_hour: bool,
    subsecond_digits: usize,
}

/// Whether a bracket holds an elapsed-time unit like `h`, `mm` or `ss`
pub(crate) fn is_elapsed_bracket(content: &str) -> bool {
    elapsed_unit(content).is_some()
}

fn elapsed_unit(content: &str) -> Option<ElapsedUnit> {
    let first = content.chars().next()?.to_ascii_lowercase();
    if !content.chars().all(|c| c.to_ascii_lowercase() == first) {
        return None;
    }
    match first {
        'h' => Some(ElapsedUnit::Hours),
        'm' => Some(ElapsedUnit::Minutes),
        's' => Some(ElapsedUnit::Seconds),
        _ => None,
    }
}

fn run_length(first: char, chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> usize {
    let mut n = 1;
    while chars
        .peek()
        .is_some_and(|c| c.eq_ignore_ascii_case(&first))
    {
        chars.next();
        n += 1;
    }
    n
}

fn starts_with_ignore_case(chars: &std::iter::Peekable<std::str::Chars<'_>>, text: &str) -> bool {
    let ahead: String = chars.clone().take(text.len()).collect();
    ahead.eq_ignore_ascii_case(text)
}

/// Tokenize a date or time section
pub(crate) fn tokenize(section: &str) -> DateSection {
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
                DateToken::Literal(lit)
            }
            '\\' => match chars.next() {
                Some(c) => DateToken::Literal(c.to_string()),
                None => continue,
            },
            '_' => {
                chars.next();
                DateToken::Literal(" ".to_string())
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
                if let Some(unit) = elapsed_unit(&content) {
                    DateToken::Elapsed(unit, content.len())
                } else if let Some(symbol) = currency_symbol(&content) {
                    DateToken::Literal(symbol.to_string())
                } else {
                    continue;
                }
            }
            'y' | 'Y' => DateToken::Year(run_length(ch, &mut chars)),
            'm' | 'M' => DateToken::MonthOrMinute(run_length(ch, &mut chars)),
            'd' | 'D' => DateToken::Day(run_length(ch, &mut chars)),
            'h' | 'H' => DateToken::Hour(run_length(ch, &mut chars)),
            's' | 'S' => DateToken::Second(run_length(ch, &mut chars)),
            'a' | 'A' if starts_with_ignore_case(&chars, "m/pm") => {
                for _ in 0..4 {
                    chars.next();
                }
                DateToken::AmPm
            }
            'a' | 'A' if starts_with_ignore_case(&chars, "/p") => {
                for _ in 0..2 {
                    chars.next();
                }
                DateToken::AP {
                    lower: ch == 'a',
                }
            }
            '.' if follows_seconds(&tokens) && chars.peek() == Some(&'0') => {
                let mut n = 0;
                while chars.peek() == Some(&'0') {
                    chars.next();
                    n += 1;
                }
                DateToken::SubSecond(n)
            }
            other => DateToken::Literal(other.to_string()),
        };
        tokens.push(token);
    }

    resolve_minutes(&mut tokens);

    let twelve_hour = tokens
        .iter()
        .any(|t| matches!(t, DateToken::AmPm | DateToken::AP { .. }));
    let subsecond_digits = tokens
        .iter()
        .filter_map(|t| match t {
            DateToken::SubSecond(n) => Some((*n).min(3)),
            _ => None,
        })
        .max()
        .unwrap_or(0);

    DateSection {
        tokens,
        twelve_hour,
        subsecond_digits,
    }
}

fn follows_seconds(tokens: &[DateToken]) -> bool {
    matches!(
        tokens.last(),
        Some(DateToken::Second(_)) | Some(DateToken::Elapsed(ElapsedUnit::Seconds, _))
    )
}

/// An `m` run is a minute when an hour precedes it or a second follows it
fn resolve_minutes(tokens: &mut [DateToken]) {
    let is_field = |t: &DateToken| !matches!(t, DateToken::Literal(_));

    for i in 0..tokens.len() {
        let DateToken::MonthOrMinute(n) = tokens[i] else {
            continue;
        };
        let after_hour = tokens[..i].iter().rev().find(|t| is_field(t)).is_some_and(|t| {
            matches!(
                t,
                DateToken::Hour(_) | DateToken::Elapsed(ElapsedUnit::Hours, _)
            )
        });
        let before_second = tokens[i + 1..].iter().find(|t| is_field(t)).is_some_and(|t| {
            matches!(
                t,
                DateToken::Second(_) | DateToken::Elapsed(ElapsedUnit::Seconds, _)
            )
        });
        tokens[i] = if after_hour || before_second {
            DateToken::Minute(n)
        } else {
            DateToken::Month(n)
        };
    }
}

/// Calendar and clock fields of a serial
struct Moment {
    year: i32,
    month: u32,
    day: u32,
    weekday: usize,
    hour: u32,
    minute: u32,
    second: u32,
    subsecond: u32,
    days: i64,
}

fn civil_date(days: i64) -> Option<(i32, u32, u32)> {
    match days {
        0 => Some((1900, 1, 0)),
        60 => Some((1900, 2, 29)),
        _ => {
            let base = if days < 60 {
                NaiveDate::from_ymd_opt(1899, 12, 31)?
            } else {
                NaiveDate::from_ymd_opt(1899, 12, 30)?
            };
            let date = base.checked_add_days(Days::new(days as u64))?;
            Some((date.year(), date.month(), date.day()))
        }
    }
}

fn moment(serial: f64, subsecond_digits: usize) -> Option<Moment> {
    if !(0.0..MAX_SERIAL).contains(&serial) {
        return None;
    }
    let scale = 10i64.pow(subsecond_digits as u32);
    let per_day = 86_400 * scale;

    let mut days = serial.floor() as i64;
    let mut units = ((serial - days as f64) * per_day as f64).round() as i64;
    if units >= per_day {
        days += 1;
        units -= per_day;
    }

    let (year, month, day) = civil_date(days)?;
    let seconds = units / scale;
    Some(Moment {
        year,
        month,
        day,
        weekday: days.rem_euclid(7) as usize,
        hour: (seconds / 3600) as u32,
        minute: (seconds / 60 % 60) as u32,
        second: (seconds % 60) as u32,
        subsecond: (units % scale) as u32,
        days,
    })
}

fn padded(value: i64, width: usize) -> String {
    format!("{:0width$}", value, width = width)
}

/// Render a serial; `None` when it has no calendar date
pub(crate) fn render(section: &DateSection, serial: f64) -> Option<String> {
    let m = moment(serial, section.subsecond_digits)?;
    let mut out = String::new();

    for token in &section.tokens {
        match token {
            DateToken::Literal(s) => out.push_str(s),
            DateToken::Year(n) if *n <= 2 => out.push_str(&padded((m.year % 100) as i64, 2)),
            DateToken::Year(_) => out.push_str(&padded(m.year as i64, 4)),
            DateToken::Month(n) => {
                let name = MONTHS[(m.month as usize + 11) % 12];
                match n {
                    1 => out.push_str(&m.month.to_string()),
                    2 => out.push_str(&padded(m.month as i64, 2)),
                    3 => out.push_str(&name[..3]),
                    5 => out.push_str(&name[..1]),
                    _ => out.push_str(name),
                }
            }
            DateToken::Day(n) => match n {
                1 => out.push_str(&m.day.to_string()),
                2 => out.push_str(&padded(m.day as i64, 2)),
                3 => out.push_str(&WEEKDAYS[m.weekday][..3]),
                _ => out.push_str(WEEKDAYS[m.weekday]),
            },
            DateToken::Hour(n) => {
                let hour = if section.twelve_hour {
                    match m.hour % 12 {
                        0 => 12,
                        h => h,
                    }
                } else {
                    m.hour
                };
                out.push_str(&padded(hour as i64, (*n).min(2)));
            }
            DateToken::Minute(n) => out.push_str(&padded(m.minute as i64, (*n).min(2))),
            DateToken::Second(n) => out.push_str(&padded(m.second as i64, (*n).min(2))),
            DateToken::SubSecond(n) => {
                let digits = padded(m.subsecond as i64, section.subsecond_digits);
                out.push('.');
                out.push_str(&digits[..(*n).min(digits.len())]);
            }
            DateToken::Elapsed(unit, width) => {
                let hours = m.days * 24 + m.hour as i64;
                let value = match unit {
                    ElapsedUnit::Hours => hours,
                    ElapsedUnit::Minutes => hours * 60 + m.minute as i64,
                    ElapsedUnit::Seconds => (hours * 60 + m.minute as i64) * 60 + m.second as i64,
                };
                out.push_str(&padded(value, *width));
            }
            DateToken::AmPm => out.push_str(if m.hour < 12 { "AM" } else { "PM" }),
            DateToken::AP { lower } => {
                let text = if m.hour < 12 { "A" } else { "P" };
                if *lower {
                    out.push_str(&text.to_ascii_lowercase());
                } else {
                    out.push_str(text);
                }
            }
            DateToken::MonthOrMinute(_) => {}
        }
    }

    Some(out)
}
