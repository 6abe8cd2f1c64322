//! Printf-style formatting of locale strings
//!
//! A directive is `%[flags][[index]][width][.precision]verb`:
//!
//! - flags: `-` (left-align), `+` (always sign), ` ` (space for sign),
//!   `0` (zero padding for numbers), `#` (`0x` prefix for `%x`)
//! - `[n]` selects the n-th value (1-based); following directives continue
//!   with value n+1, so translators can reorder arguments
//! - verbs: `s`, `v`, `q`, `d`, `f`, `g`, `x`, `X`, `t` and the `%%` escape
//!
//! Problems are reported inline instead of failing the render: a verb
//! without a value gives `%!s(MISSING)`, an out-of-range index
//! `%!s(BADINDEX)`, a value of the wrong kind `%!d(value)`. Surplus values
//! are ignored.

use minijinja::value::{Value, ValueKind};
use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Default, Clone, Copy)]
struct Directive {
    minus: bool,
    plus: bool,
    space: bool,
    zero: bool,
    sharp: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

pub fn sprintf(format: &str, values: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut arg = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut directive = Directive::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '-' => directive.minus = true,
                '+' => directive.plus = true,
                ' ' => directive.space = true,
                '0' => directive.zero = true,
                '#' => directive.sharp = true,
                _ => break,
            }
            chars.next();
        }

        let mut bad_index = false;
        if chars.peek() == Some(&'[') {
            chars.next();
            match read_index(&mut chars) {
                Some(n) if (1..=values.len()).contains(&n) => arg = n - 1,
                _ => bad_index = true,
            }
        }

        directive.width = read_number(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            directive.precision = Some(read_number(&mut chars).unwrap_or(0));
        }

        let verb = match chars.next() {
            Some(verb) => verb,
            None => {
                out.push_str("%!(NOVERB)");
                break;
            }
        };

        if verb == '%' {
            out.push('%');
            continue;
        }
        if bad_index {
            out.push_str(&format!("%!{}(BADINDEX)", verb));
            continue;
        }

        match values.get(arg) {
            Some(value) => {
                out.push_str(&format_value(verb, &directive, value));
                arg += 1;
            }
            None => out.push_str(&format!("%!{}(MISSING)", verb)),
        }
    }

    out
}

fn read_number(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&d) = chars.peek() {
        if !d.is_ascii_digit() {
            break;
        }
        digits.push(d);
        chars.next();
    }
    digits.parse().ok()
}

// Digits up to the closing bracket, which is consumed.
fn read_index(chars: &mut Peekable<Chars<'_>>) -> Option<usize> {
    let index = read_number(chars);
    if chars.peek() == Some(&']') {
        chars.next();
        index
    } else {
        None
    }
}

fn format_value(verb: char, directive: &Directive, value: &Value) -> String {
    match verb {
        's' | 'v' => {
            let text = value.to_string();
            let text = match directive.precision {
                Some(max) => text.chars().take(max).collect(),
                None => text,
            };
            pad(text, directive)
        }
        'q' => pad(format!("{:?}", value.to_string()), directive),
        'd' => match i64::try_from(value.clone()) {
            Ok(n) => {
                let mut digits = n.unsigned_abs().to_string();
                if let Some(min) = directive.precision {
                    if digits.len() < min {
                        digits = format!("{}{}", "0".repeat(min - digits.len()), digits);
                    }
                }
                pad_number(sign(n < 0, directive), digits, directive)
            }
            Err(_) => bad_kind(verb, value),
        },
        'f' | 'g' => match f64::try_from(value.clone()) {
            Ok(n) => {
                let digits = match (verb, directive.precision) {
                    ('f', precision) => format!("{:.*}", precision.unwrap_or(6), n.abs()),
                    (_, Some(precision)) => format!("{:.*}", precision, n.abs()),
                    (_, None) => n.abs().to_string(),
                };
                pad_number(sign(n < 0.0, directive), digits, directive)
            }
            Err(_) => bad_kind(verb, value),
        },
        'x' | 'X' => {
            let hex = match value.kind() {
                ValueKind::Number => match i64::try_from(value.clone()) {
                    Ok(n) => {
                        let prefix = if directive.sharp { "0x" } else { "" };
                        let digits = format!("{}{:x}", prefix, n.unsigned_abs());
                        return pad_number(sign(n < 0, directive), case(verb, digits), directive);
                    }
                    Err(_) => return bad_kind(verb, value),
                },
                _ => value
                    .to_string()
                    .bytes()
                    .map(|b| format!("{:02x}", b))
                    .collect::<String>(),
            };
            pad(case(verb, hex), directive)
        }
        't' if value.kind() == ValueKind::Bool => pad(value.is_true().to_string(), directive),
        _ => bad_kind(verb, value),
    }
}

fn case(verb: char, text: String) -> String {
    if verb == 'X' {
        text.to_uppercase()
    } else {
        text
    }
}

fn bad_kind(verb: char, value: &Value) -> String {
    format!("%!{}({})", verb, value)
}

fn sign(negative: bool, directive: &Directive) -> &'static str {
    if negative {
        "-"
    } else if directive.plus {
        "+"
    } else if directive.space {
        " "
    } else {
        ""
    }
}

fn pad(text: String, directive: &Directive) -> String {
    let len = text.chars().count();
    match directive.width {
        Some(width) if width > len => {
            let fill = " ".repeat(width - len);
            if directive.minus {
                text + &fill
            } else {
                fill + &text
            }
        }
        _ => text,
    }
}

// Zero padding goes between the sign and the digits.
fn pad_number(sign: &str, digits: String, directive: &Directive) -> String {
    if directive.zero && !directive.minus {
        if let Some(width) = directive.width {
            let len = sign.len() + digits.chars().count();
            if width > len {
                return format!("{}{}{}", sign, "0".repeat(width - len), digits);
            }
        }
    }
    pad(format!("{}{}", sign, digits), directive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(items: &[Value]) -> Vec<Value> {
        items.to_vec()
    }

    #[test]
    fn test_sequential_verbs() {
        let rendered = sprintf(
            "%d new messages (%.1f%%)",
            &values(&[Value::from(3), Value::from(12.345)]),
        );
        assert_eq!(rendered, "3 new messages (12.3%)");
    }

    #[test]
    fn test_explicit_indexes_reorder_values() {
        let args = values(&[Value::from("Bob"), Value::from("Hello")]);
        assert_eq!(sprintf("%[2]s, %[1]s!", &args), "Hello, Bob!");
        assert_eq!(sprintf("%[2]s %s", &args), "Hello %!s(MISSING)");
        assert_eq!(sprintf("%[1]s and %s", &args), "Bob and Hello");
    }

    #[test]
    fn test_width_and_flags() {
        let args = values(&[Value::from(7), Value::from("ab")]);
        assert_eq!(sprintf("[%5d] [%-4s]", &args), "[    7] [ab  ]");
        assert_eq!(sprintf("[%05d] [%4s]", &args), "[00007] [  ab]");
        assert_eq!(sprintf("%+d", &[Value::from(7)]), "+7");
        assert_eq!(sprintf("%06.2f", &[Value::from(-3.14159)]), "-03.14");
    }

    #[test]
    fn test_string_precision_truncates() {
        assert_eq!(sprintf("%.3s", &[Value::from("abcdef")]), "abc");
    }

    #[test]
    fn test_hex() {
        let args = values(&[Value::from(255), Value::from(255), Value::from(255)]);
        assert_eq!(sprintf("%x %X %#x", &args), "ff FF 0xff");
        assert_eq!(sprintf("%x", &[Value::from("hi")]), "6869");
    }

    #[test]
    fn test_problems_are_reported_inline() {
        assert_eq!(sprintf("Hi %s and %s", &[Value::from("Ann")]), "Hi Ann and %!s(MISSING)");
        assert_eq!(sprintf("%[3]s", &[Value::from("Ann")]), "%!s(BADINDEX)");
        assert_eq!(sprintf("%d", &[Value::from("Ann")]), "%!d(Ann)");
        assert_eq!(sprintf("100%", &[]), "100%!(NOVERB)");
    }
}
