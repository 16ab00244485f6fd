use std::fmt;

use serde::Serialize;

/// Iranian mobile number in canonical `+989XXXXXXXXX` form.
///
/// The only way to build one is [`PhoneNumber::parse`], so every value held
/// by the rest of the crate is already normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid phone number format")]
pub struct InvalidPhoneNumber;

/// Subscriber part length (after the country code)
const SUBSCRIBER_LEN: usize = 10;

impl PhoneNumber {
    /// Normalize any of the common local representations.
    ///
    /// Accepted: `09XXXXXXXXX`, `9XXXXXXXXX`, `989XXXXXXXXX`, `+989XXXXXXXXX`,
    /// `00989XXXXXXXXX`. Persian and Arabic-Indic digits are accepted, as are
    /// spaces, dashes and parentheses between digits.
    pub fn parse(input: &str) -> Result<Self, InvalidPhoneNumber> {
        let cleaned: String = input
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '\u{200c}'))
            .map(to_ascii_digit)
            .collect();

        let subscriber = if let Some(rest) = cleaned.strip_prefix("+98") {
            rest
        } else if let Some(rest) = cleaned.strip_prefix("0098") {
            rest
        } else if cleaned.len() == SUBSCRIBER_LEN + 2 && cleaned.starts_with("98") {
            &cleaned[2..]
        } else if cleaned.len() == SUBSCRIBER_LEN + 1 && cleaned.starts_with('0') {
            &cleaned[1..]
        } else {
            cleaned.as_str()
        };

        let valid = subscriber.len() == SUBSCRIBER_LEN
            && subscriber.starts_with('9')
            && subscriber.bytes().all(|b| b.is_ascii_digit());

        if !valid {
            return Err(InvalidPhoneNumber);
        }

        Ok(Self(format!("+98{}", subscriber)))
    }

    /// Canonical E.164 form, e.g. `+989123456789`.
    pub fn as_e164(&self) -> &str {
        &self.0
    }

    /// Digits only, e.g. `989123456789`.
    pub fn digits(&self) -> &str {
        &self.0[1..]
    }

    /// National trunk form expected by local SMS gateways, e.g. `09123456789`.
    pub fn local_format(&self) -> String {
        format!("0{}", &self.0[3..])
    }

    /// Log-safe form, e.g. `+98912***6789`.
    pub fn masked(&self) -> String {
        format!("{}***{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map Persian (U+06F0..) and Arabic-Indic (U+0660..) digits to ASCII.
pub(crate) fn to_ascii_digit(c: char) -> char {
    match c {
        '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
        '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
        _ => c,
    }
}
