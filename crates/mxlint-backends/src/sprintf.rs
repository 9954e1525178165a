//! Go-compatible `sprintf` for Rego policies.
//!
//! Registered on every Rego engine as an extension, which regorus resolves
//! ahead of its own builtin. Flags, width and precision are read between `%`
//! and the verb, as in Go's `fmt`.

use regorus::Value;

/// Regorus extension entry point: `sprintf(format, [args...])`.
pub(crate) fn sprintf_extension(params: Vec<Value>) -> anyhow::Result<Value> {
    let format = match params.first() {
        Some(Value::String(s)) => s.clone(),
        _ => anyhow::bail!("sprintf: format must be a string"),
    };
    let args = match params.get(1) {
        Some(Value::Array(items)) => items.as_ref().clone(),
        _ => anyhow::bail!("sprintf: arguments must be an array"),
    };
    Ok(Value::from(go_sprintf(&format, &args)))
}

#[derive(Debug, Default)]
struct Directive {
    plus: bool,
    space: bool,
    minus: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

/// Format `args` according to the Go verbs in `format`.
///
/// Verbs with no argument left render as `%!v(MISSING)`; surplus arguments
/// are appended as `%!(EXTRA ...)`.
pub fn go_sprintf(format: &str, args: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    let mut next_arg = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut directive = Directive::default();
        while let Some(&flag) = chars.peek() {
            match flag {
                '+' => directive.plus = true,
                ' ' => directive.space = true,
                '-' => directive.minus = true,
                '0' => directive.zero = true,
                '#' => {}
                _ => break,
            }
            chars.next();
        }
        directive.width = read_number(&mut chars);
        if chars.peek() == Some(&'.') {
            chars.next();
            directive.precision = Some(read_number(&mut chars).unwrap_or(0));
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };
        let Some(arg) = args.get(next_arg) else {
            out.push_str(&format!("%!{verb}(MISSING)"));
            continue;
        };
        next_arg += 1;
        out.push_str(&pad(&directive, format_verb(verb, &directive, arg), is_numeric(arg)));
    }

    if next_arg < args.len() {
        let extra: Vec<String> = args[next_arg..].iter().map(display).collect();
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    out
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut value: Option<usize> = None;
    while let Some(digit) = chars.peek().and_then(|c| c.to_digit(10)) {
        chars.next();
        value = Some(value.unwrap_or(0) * 10 + digit as usize);
    }
    value
}

fn format_verb(verb: char, directive: &Directive, arg: &Value) -> String {
    match (verb, arg) {
        ('s' | 'v', _) => display(arg),
        ('d', Value::Number(_)) => match arg.as_i64() {
            Ok(n) => signed(directive, n < 0, n.unsigned_abs().to_string()),
            Err(_) => display(arg),
        },
        ('f' | 'F', Value::Number(_)) => {
            let n = float(arg);
            let digits = format!("{:.*}", directive.precision.unwrap_or(6), n.abs());
            signed(directive, n < 0.0, digits)
        }
        ('e', Value::Number(_)) => {
            let n = float(arg);
            signed(directive, n < 0.0, go_exponent(n.abs(), directive.precision.unwrap_or(6)))
        }
        ('g' | 'G', Value::Number(_)) => display(arg),
        ('x', Value::Number(_)) => match arg.as_i64() {
            Ok(n) => signed(directive, n < 0, format!("{:x}", n.unsigned_abs())),
            Err(_) => display(arg),
        },
        ('X', Value::Number(_)) => match arg.as_i64() {
            Ok(n) => signed(directive, n < 0, format!("{:X}", n.unsigned_abs())),
            Err(_) => display(arg),
        },
        ('x', Value::String(s)) => hex::encode(s.as_bytes()),
        ('b', Value::Number(_)) => match arg.as_i64() {
            Ok(n) => signed(directive, n < 0, format!("{:b}", n.unsigned_abs())),
            Err(_) => display(arg),
        },
        ('o', Value::Number(_)) => match arg.as_i64() {
            Ok(n) => signed(directive, n < 0, format!("{:o}", n.unsigned_abs())),
            Err(_) => display(arg),
        },
        ('t', Value::Bool(b)) => b.to_string(),
        ('q', Value::String(s)) => {
            serde_json::to_string(s.as_ref()).unwrap_or_else(|_| format!("\"{s}\""))
        }
        (verb, arg) => format!("%!{verb}({})", display(arg)),
    }
}

/// Text of a value as Go's `%v` prints it: strings raw, everything else as
/// JSON.
fn display(arg: &Value) -> String {
    match arg {
        Value::String(s) => s.to_string(),
        Value::Undefined => "<undefined>".to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

fn float(arg: &Value) -> f64 {
    arg.as_f64()
        .ok()
        .or_else(|| serde_json::to_string(arg).ok().and_then(|s| s.parse().ok()))
        .unwrap_or(f64::NAN)
}

fn go_exponent(n: f64, precision: usize) -> String {
    let text = format!("{:.*e}", precision, n);
    match text.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(d) => ('-', d),
                None => ('+', exp),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

fn signed(directive: &Directive, negative: bool, digits: String) -> String {
    let sign = if negative {
        "-"
    } else if directive.plus {
        "+"
    } else if directive.space {
        " "
    } else {
        ""
    };
    format!("{sign}{digits}")
}

fn is_numeric(arg: &Value) -> bool {
    matches!(arg, Value::Number(_))
}

fn pad(directive: &Directive, text: String, numeric: bool) -> String {
    let Some(width) = directive.width else {
        return text;
    };
    let len = text.chars().count();
    if len >= width {
        return text;
    }
    let fill = width - len;
    if directive.minus {
        format!("{text}{}", " ".repeat(fill))
    } else if directive.zero && numeric {
        let (sign, digits) = match text.chars().next() {
            Some(c @ ('-' | '+' | ' ')) => (c.to_string(), &text[1..]),
            _ => (String::new(), text.as_str()),
        };
        format!("{sign}{}{digits}", "0".repeat(fill))
    } else {
        format!("{}{text}", " ".repeat(fill))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(json: &str) -> Vec<Value> {
        match Value::from_json_str(json).unwrap() {
            Value::Array(items) => items.as_ref().clone(),
            other => vec![other],
        }
    }

    #[test]
    fn verb_followed_by_space_keeps_the_space() {
        assert_eq!(
            go_sprintf("There are %d persistable entities, the maximum is %d", &args("[4, 3]")),
            "There are 4 persistable entities, the maximum is 3"
        );
    }

    #[test]
    fn flags_precede_the_verb() {
        assert_eq!(go_sprintf("[%+d]", &args("[5]")), "[+5]");
        assert_eq!(go_sprintf("[% d]", &args("[5]")), "[ 5]");
        assert_eq!(go_sprintf("[%05d]", &args("[-42]")), "[-0042]");
        assert_eq!(go_sprintf("[%-4d]", &args("[7]")), "[7   ]");
        assert_eq!(go_sprintf("[%4s]", &args("[\"ab\"]")), "[  ab]");
    }

    #[test]
    fn strings_floats_and_values() {
        assert_eq!(
            go_sprintf("%s in %v", &args("[\"Entity\", {\"a\": 1}]")),
            "Entity in {\"a\":1}"
        );
        assert_eq!(go_sprintf("%.2f", &args("[3.14159]")), "3.14");
        assert_eq!(go_sprintf("%f", &args("[0.5]")), "0.500000");
        assert_eq!(go_sprintf("%t", &args("[true]")), "true");
        assert_eq!(go_sprintf("%q", &args("[\"a\\\"b\"]")), "\"a\\\"b\"");
        assert_eq!(go_sprintf("%x", &args("[255]")), "ff");
        assert_eq!(go_sprintf("100%%", &[]), "100%");
    }

    #[test]
    fn argument_count_mismatches_are_visible() {
        assert_eq!(go_sprintf("%d and %d", &args("[1]")), "1 and %!d(MISSING)");
        assert_eq!(go_sprintf("%d", &args("[1, 2]")), "1%!(EXTRA 2)");
        assert_eq!(go_sprintf("%d", &args("[\"x\"]")), "%!d(x)");
    }

    #[test]
    fn extension_rejects_non_array_arguments() {
        let err = sprintf_extension(vec![Value::from("%d"), Value::from(1i64)]).unwrap_err();
        assert!(err.to_string().contains("array"));
    }
}
