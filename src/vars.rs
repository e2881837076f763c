//! Compact key-value envelope used for cache records and the message
//! notification payload.
//!
//! The wire form is `key=value` pairs joined by `|`. Values are escaped so
//! records can be stacked one per line inside a single cache entry:
//! `\` -> `\\`, `|` -> `\|`, newline -> `\n`.

/// Order-preserving field map.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    fields: Vec<(String, String)>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &str, value: &str) -> &mut Self {
        self.fields.push((key.to_string(), value.to_string()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// True when every comma-separated key is present.
    pub fn has_all(&self, keys: &str) -> bool {
        keys.split(',').all(|k| self.get(k.trim()).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push('|');
            }
            out.push_str(key);
            out.push('=');
            out.push_str(&escape(value));
        }
        out
    }

    /// Parse an encoded record. Malformed segments (no `=`) are skipped.
    pub fn decode(encoded: &str) -> Self {
        let mut vars = Vars::new();
        for segment in split_unescaped(encoded) {
            if let Some(eq) = segment.find('=') {
                let key = &segment[..eq];
                let value = unescape(&segment[eq + 1..]);
                vars.fields.push((key.to_string(), value));
            }
        }
        vars
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Split on `|` separators that are not preceded by a backslash.
fn split_unescaped(encoded: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in encoded.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => {
                current.push(c);
                escaped = true;
            }
            '|' => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_fields_and_order() {
        let mut vars = Vars::new();
        vars.add("sr", "N0CALL")
            .add("ct", "1700000000")
            .add("cm", "climbing | fast\nline two");
        let decoded = Vars::decode(&vars.encode());
        assert_eq!(decoded.get("sr"), Some("N0CALL"));
        assert_eq!(decoded.get("ct"), Some("1700000000"));
        assert_eq!(decoded.get("cm"), Some("climbing | fast\nline two"));
    }

    #[test]
    fn has_all_requires_every_key() {
        let decoded = Vars::decode("sr=N0CALL|ct=1700000000");
        assert!(decoded.has_all("sr,ct"));
        assert!(!decoded.has_all("sr,ct,cm"));
    }

    #[test]
    fn malformed_segments_are_skipped() {
        let decoded = Vars::decode("sr=N0CALL|garbage|ct=1");
        assert_eq!(decoded.get("sr"), Some("N0CALL"));
        assert_eq!(decoded.get("ct"), Some("1"));
        assert_eq!(decoded.get("garbage"), None);
    }

    #[test]
    fn encoded_record_stays_on_one_line() {
        let mut vars = Vars::new();
        vars.add("cm", "two\nlines");
        assert!(!vars.encode().contains('\n'));
    }
}
