//! Directive-based string validation used at SQL bind sites.
//!
//! A directive set looks like `is:int|maxval:100`. When an `is:` directive
//! is present it decides the outcome by itself; otherwise the remaining
//! checks are ANDed. Length and value bounds are strict (`>` / `<`), which
//! excludes the boundary on purpose. An unparsable directive is an error,
//! and bind helpers treat errors as invalid (fail closed).

use anyhow::{Result, bail};

pub fn is_valid(directives: &str, value: &str) -> Result<bool> {
    let mut pairs: Vec<(&str, &str)> = Vec::new();
    for directive in directives.split('|') {
        let directive = directive.trim();
        if directive.is_empty() {
            continue;
        }
        match directive.split_once(':') {
            Some((key, arg)) => pairs.push((key, arg)),
            None => bail!("invalid directive '{directive}', expected key:value"),
        }
    }

    if let Some((_, arg)) = pairs.iter().find(|(k, _)| *k == "is") {
        return match *arg {
            "int" => Ok(is_int(value)),
            "float" => Ok(is_float(value)),
            other => bail!("unknown is: directive '{other}'"),
        };
    }

    let mut valid = true;
    for (key, arg) in pairs {
        match key {
            "minlen" => {
                let len = parse_directive_int(key, arg)?;
                valid &= value.len() as i64 > len;
            }
            "maxlen" => {
                let len = parse_directive_int(key, arg)?;
                valid &= (value.len() as i64) < len;
            }
            "minval" => {
                let bound = parse_directive_int(key, arg)?;
                valid &= is_int(value) && value.parse::<i64>().is_ok_and(|v| v > bound);
            }
            "maxval" => {
                let bound = parse_directive_int(key, arg)?;
                valid &= is_int(value) && value.parse::<i64>().is_ok_and(|v| v < bound);
            }
            "chrng" => {
                let (lo, hi) = parse_char_range(arg)?;
                valid &= value.bytes().all(|b| b >= lo && b <= hi);
            }
            "chpool" => {
                valid &= value.chars().all(|c| arg.contains(c));
            }
            other => bail!("unknown directive '{other}'"),
        }
    }
    Ok(valid)
}

/// Bind-site helper: `None` (SQL NULL) for a missing, empty, or invalid
/// value; the string otherwise.
pub fn checked(directives: &str, value: Option<&str>) -> Option<String> {
    let value = value?;
    if value.is_empty() {
        return None;
    }
    match is_valid(directives, value) {
        Ok(true) => Some(value.to_string()),
        _ => None,
    }
}

pub fn checked_i32(directives: &str, value: Option<&str>) -> Option<i32> {
    checked(directives, value).and_then(|v| v.parse().ok())
}

pub fn checked_i64(directives: &str, value: Option<&str>) -> Option<i64> {
    checked(directives, value).and_then(|v| v.parse().ok())
}

pub fn checked_f64(directives: &str, value: Option<&str>) -> Option<f64> {
    checked(directives, value).and_then(|v| {
        // The wire format allows a trailing 'f' on floats.
        v.strip_suffix('f').unwrap_or(&v).parse().ok()
    })
}

fn parse_directive_int(key: &str, arg: &str) -> Result<i64> {
    if !is_int(arg) {
        bail!("{key}: '{arg}' is not a number");
    }
    Ok(arg.parse()?)
}

fn parse_char_range(arg: &str) -> Result<(u8, u8)> {
    let Some((lo, hi)) = arg.split_once('-') else {
        bail!("chrng: invalid format, should be <int>-<int>");
    };
    if lo.is_empty() || !lo.bytes().all(|b| b.is_ascii_digit()) {
        bail!("chrng: missing min value");
    }
    if hi.is_empty() || !hi.bytes().all(|b| b.is_ascii_digit()) {
        bail!("chrng: missing max value");
    }
    let lo: u8 = lo.parse()?;
    let hi: u8 = hi.parse()?;
    if lo >= hi {
        bail!("chrng: min must be less than max");
    }
    Ok((lo, hi))
}

fn is_int(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn is_float(value: &str) -> bool {
    let body = value
        .strip_prefix('-')
        .or_else(|| value.strip_prefix('+'))
        .unwrap_or(value);
    if body.is_empty() {
        return false;
    }
    let mut seen_decimal = false;
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '.' if !seen_decimal => seen_decimal = true,
            '0'..='9' => {}
            // A single trailing 'f' is accepted after a decimal point.
            'f' if seen_decimal && chars.peek().is_none() => {}
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_directive() {
        assert!(is_valid("is:int", "42").unwrap());
        assert!(is_valid("is:int", "-7").unwrap());
        assert!(!is_valid("is:int", "4.2").unwrap());
        assert!(!is_valid("is:int", "").unwrap());
        assert!(!is_valid("is:int", "12a").unwrap());
    }

    #[test]
    fn float_directive() {
        assert!(is_valid("is:float", "3.14").unwrap());
        assert!(is_valid("is:float", "-0.5").unwrap());
        assert!(is_valid("is:float", "+7").unwrap());
        assert!(is_valid("is:float", "2.5f").unwrap());
        assert!(!is_valid("is:float", "2f").unwrap());
        assert!(!is_valid("is:float", "1.2.3").unwrap());
        assert!(!is_valid("is:float", "-").unwrap());
    }

    #[test]
    fn length_bounds_are_strict() {
        assert!(is_valid("minlen:3", "abcd").unwrap());
        assert!(!is_valid("minlen:3", "abc").unwrap());
        assert!(is_valid("maxlen:3", "ab").unwrap());
        assert!(!is_valid("maxlen:3", "abc").unwrap());
    }

    #[test]
    fn value_bounds_are_strict_and_require_int() {
        assert!(is_valid("maxval:100", "99").unwrap());
        assert!(!is_valid("maxval:100", "100").unwrap());
        assert!(!is_valid("maxval:100", "abc").unwrap());
        assert!(is_valid("minval:0", "1").unwrap());
        assert!(!is_valid("minval:0", "0").unwrap());
    }

    #[test]
    fn is_directive_decides_alone() {
        // `is:` short-circuits the other checks; humidity uses
        // `is:int|maxval:100` and only the int check applies.
        assert!(is_valid("is:int|maxval:100", "150").unwrap());
    }

    #[test]
    fn char_range_and_pool() {
        assert!(is_valid("chrng:48-57", "0123").unwrap());
        assert!(!is_valid("chrng:48-57", "12a").unwrap());
        assert!(is_valid("chpool:ABC", "CAB").unwrap());
        assert!(!is_valid("chpool:ABC", "CAD").unwrap());
    }

    #[test]
    fn bad_directives_error() {
        assert!(is_valid("chrng:9", "x").is_err());
        assert!(is_valid("chrng:57-48", "x").is_err());
        assert!(is_valid("minlen:abc", "x").is_err());
        assert!(is_valid("bogus:1", "x").is_err());
        assert!(is_valid("is:hex", "ff").is_err());
    }

    #[test]
    fn checked_binds_null_for_empty_or_invalid() {
        assert_eq!(checked("is:int", None), None);
        assert_eq!(checked("is:int", Some("")), None);
        assert_eq!(checked("is:int", Some("abc")), None);
        assert_eq!(checked("is:int", Some("42")), Some("42".to_string()));
        // Fail closed on a broken directive set.
        assert_eq!(checked("chrng:9", Some("42")), None);
    }

    #[test]
    fn checked_numeric_parses() {
        assert_eq!(checked_i32("is:int", Some("271")), Some(271));
        assert_eq!(checked_f64("is:float", Some("12.5f")), Some(12.5));
        assert_eq!(checked_i64("is:int", Some("9000000000")), Some(9_000_000_000));
    }
}
