//! `/control` commands: query string shape and the `var` dispatch table.

use crate::error::CommandError;

/// Longest `var` or `val` accepted, matching the firmware's 32-byte buffers.
pub const MAX_PARAM_LEN: usize = 31;

/// One parsed `/control?var=..&val=..` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    FrameSize(i32),
    Quality(i32),
    /// `flash` and `flashoff` both just set the duty.
    Flash(i32),
    Speed(i32),
    NoStop(i32),
    Car(i32),
}

impl Command {
    /// Parse a raw query string. Anything that is not a well-formed
    /// `var`/`val` pair is a [`CommandError::RequestShape`].
    pub fn from_query(query: Option<&str>) -> Result<Self, CommandError> {
        let query = match query {
            Some(q) if !q.is_empty() => q,
            _ => return Err(CommandError::RequestShape("missing query string")),
        };

        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
            .map_err(|_| CommandError::RequestShape("malformed query string"))?;

        let var = lookup(&pairs, "var")?;
        let val = lookup(&pairs, "val")?;
        Self::parse(var, val)
    }

    /// Dispatch on `var`, exact and case-sensitive.
    pub fn parse(var: &str, val: &str) -> Result<Self, CommandError> {
        let val = atoi(val);
        let cmd = match var {
            "framesize" => Command::FrameSize(val),
            "quality" => Command::Quality(val),
            "flash" | "flashoff" => Command::Flash(val),
            "speed" => Command::Speed(val),
            "nostop" => Command::NoStop(val),
            "car" => Command::Car(val),
            other => return Err(CommandError::Unrecognized(other.to_string())),
        };
        Ok(cmd)
    }
}

fn lookup<'a>(pairs: &'a [(String, String)], key: &'static str) -> Result<&'a str, CommandError> {
    let value = pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .ok_or(CommandError::RequestShape("missing var or val"))?;
    if value.len() > MAX_PARAM_LEN {
        return Err(CommandError::RequestShape("parameter too long"));
    }
    Ok(value)
}

/// Lenient integer parse: optional whitespace and sign, then leading digits.
/// Anything unparseable is 0; overflow saturates.
pub fn atoi(s: &str) -> i32 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let mut n: i64 = 0;
    for b in digits.bytes().take_while(u8::is_ascii_digit) {
        n = (n * 10 + i64::from(b - b'0')).min(i64::from(i32::MAX) + 1);
    }
    let n = if negative { -n } else { n };
    n.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atoi_matches_c() {
        assert_eq!(atoi("42"), 42);
        assert_eq!(atoi("  -7"), -7);
        assert_eq!(atoi("+5"), 5);
        assert_eq!(atoi("12abc"), 12);
        assert_eq!(atoi("abc"), 0);
        assert_eq!(atoi(""), 0);
        assert_eq!(atoi("-"), 0);
        assert_eq!(atoi("99999999999"), i32::MAX);
        assert_eq!(atoi("-99999999999"), i32::MIN);
    }

    #[test]
    fn parses_known_vars() {
        assert_eq!(Command::from_query(Some("var=car&val=1")).unwrap(), Command::Car(1));
        assert_eq!(Command::from_query(Some("val=300&var=speed")).unwrap(), Command::Speed(300));
        assert_eq!(Command::from_query(Some("var=flashoff&val=0")).unwrap(), Command::Flash(0));
        assert_eq!(Command::from_query(Some("var=flash&val=x")).unwrap(), Command::Flash(0));
        assert_eq!(Command::from_query(Some("var=framesize&val=8")).unwrap(), Command::FrameSize(8));
        assert_eq!(Command::from_query(Some("var=quality&val=10")).unwrap(), Command::Quality(10));
        assert_eq!(Command::from_query(Some("var=nostop&val=1")).unwrap(), Command::NoStop(1));
    }

    #[test]
    fn shape_errors() {
        for query in [None, Some(""), Some("var=car"), Some("val=1"), Some("foo=bar")] {
            let err = Command::from_query(query).unwrap_err();
            assert!(matches!(err, CommandError::RequestShape(_)), "{query:?}");
        }
        let long = format!("var=car&val={}", "1".repeat(MAX_PARAM_LEN + 1));
        assert!(matches!(
            Command::from_query(Some(&long)),
            Err(CommandError::RequestShape(_))
        ));
    }

    #[test]
    fn unknown_var_is_not_a_shape_error() {
        let err = Command::from_query(Some("var=bogus&val=1")).unwrap_err();
        assert!(matches!(err, CommandError::Unrecognized(ref v) if v == "bogus"));
        let err = Command::from_query(Some("var=Car&val=1")).unwrap_err();
        assert!(matches!(err, CommandError::Unrecognized(_)));
    }
}
