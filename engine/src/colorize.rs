use once_cell::sync::Lazy;
use regex_lite::Captures;
use regex_lite::Regex;

// Raw ANSI codes rather than a styling layer so the colors survive the
// clipping pipeline unchanged.
const ANSI_RESET: &str = "\x1b[0m";
const ANSI_CYAN: &str = "\x1b[36m";
const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_MAGENTA: &str = "\x1b[35m";
const ANSI_GRAY: &str = "\x1b[90m";
const ANSI_WHITE: &str = "\x1b[37m";

fn compile_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid regex literal {pattern}: {err}"))
}

static JSON_KEY_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r#""([^"]+)"(\s*:)"#));
static JSON_STRING_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r#""(?:[^"\\]|\\.)*""#));
static JSON_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| compile_regex(r":\s*(-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?)"));
static JSON_BOOL_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r":\s*(true|false)"));
static JSON_NULL_RE: Lazy<Regex> = Lazy::new(|| compile_regex(r":\s*(null)"));

/// Syntax-highlight one line of pretty-printed JSON.
///
/// Brackets are replaced in a single pass first; the escape sequences
/// themselves contain `[`, so later passes must not see uncolored brackets.
/// Key coloring puts the escape codes inside the quotes so the string-value
/// regex can detect already-colored spans and skip them.
pub fn colorize_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            '{' | '}' | '[' | ']' => {
                result.push_str(ANSI_WHITE);
                result.push(c);
                result.push_str(ANSI_RESET);
            }
            _ => result.push(c),
        }
    }

    let result = JSON_KEY_RE.replace_all(&result, |caps: &Captures<'_>| {
        format!("\"{ANSI_CYAN}{}{ANSI_RESET}\"{}", &caps[1], &caps[2])
    });

    let result = JSON_STRING_RE.replace_all(&result, |caps: &Captures<'_>| {
        let m = &caps[0];
        if m.contains("\x1b[") {
            m.to_string()
        } else {
            format!("{ANSI_GREEN}{m}{ANSI_RESET}")
        }
    });

    let result = JSON_NUMBER_RE.replace_all(&result, |caps: &Captures<'_>| {
        format!(": {ANSI_YELLOW}{}{ANSI_RESET}", &caps[1])
    });

    let result = JSON_BOOL_RE.replace_all(&result, |caps: &Captures<'_>| {
        format!(": {ANSI_MAGENTA}{}{ANSI_RESET}", &caps[1])
    });

    let result = JSON_NULL_RE.replace_all(&result, |caps: &Captures<'_>| {
        format!(": {ANSI_GRAY}{}{ANSI_RESET}", &caps[1])
    });

    result.into_owned()
}
