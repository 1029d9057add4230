//! ISUPPORT `CASEMAPPING`-driven case folding.
//!
//! RFC 1459 defines IRC casefolding over the ASCII range plus three extra
//! characters reserved for channel-name punctuation (`{}|^` are the lowercase
//! counterparts of `[]\~`). Servers advertise which variant they use via the
//! `CASEMAPPING` ISUPPORT token; this module keys all folding off that value
//! rather than assuming one variant network-wide.

use std::fmt;

/// Case-mapping variant as advertised by ISUPPORT `CASEMAPPING`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CaseMapping {
    /// `ascii`: only `A-Z` <-> `a-z` fold.
    Ascii,
    /// `rfc1459`: ASCII plus `[]\~` <-> `{}|^`.
    #[default]
    Rfc1459,
    /// `rfc1459-strict`: ASCII plus `[]\` <-> `{}|` (no `~`/`^` fold).
    Rfc1459Strict,
}

impl CaseMapping {
    /// Parse the value of an ISUPPORT `CASEMAPPING` token, defaulting to
    /// [`CaseMapping::Rfc1459`] for unrecognized values per the ISUPPORT spec.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "ascii" => Self::Ascii,
            "rfc1459-strict" => Self::Rfc1459Strict,
            _ => Self::Rfc1459,
        }
    }

    #[must_use]
    fn fold_char(self, c: char) -> char {
        match (self, c) {
            (Self::Ascii, 'A'..='Z') => c.to_ascii_lowercase(),
            (Self::Rfc1459, '[') | (Self::Rfc1459Strict, '[') => '{',
            (Self::Rfc1459, ']') | (Self::Rfc1459Strict, ']') => '}',
            (Self::Rfc1459, '\\') | (Self::Rfc1459Strict, '\\') => '|',
            (Self::Rfc1459, '~') => '^',
            (Self::Rfc1459 | Self::Rfc1459Strict, 'A'..='Z') => c.to_ascii_lowercase(),
            _ => c,
        }
    }

    /// Fold a string to its canonical lowercase form under this mapping.
    #[must_use]
    pub fn to_lower(self, s: &str) -> String {
        s.chars().map(|c| self.fold_char(c)).collect()
    }

    /// Compare two strings for equality under this mapping.
    #[must_use]
    pub fn eq(self, a: &str, b: &str) -> bool {
        let mut ai = a.chars();
        let mut bi = b.chars();
        loop {
            match (ai.next(), bi.next()) {
                (Some(ca), Some(cb)) => {
                    if self.fold_char(ca) != self.fold_char(cb) {
                        return false;
                    }
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl fmt::Display for CaseMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ascii => "ascii",
            Self::Rfc1459 => "rfc1459",
            Self::Rfc1459Strict => "rfc1459-strict",
        })
    }
}

/// Fold under the default ([`CaseMapping::Rfc1459`]) mapping.
///
/// Kept for call sites that don't yet have a negotiated network mapping on
/// hand; once connected, prefer `NetworkInfo::casemap().to_lower(..)`.
#[must_use]
pub fn irc_to_lower(s: &str) -> String {
    CaseMapping::default().to_lower(s)
}

/// Compare under the default ([`CaseMapping::Rfc1459`]) mapping.
#[must_use]
pub fn irc_eq(a: &str, b: &str) -> bool {
    CaseMapping::default().eq(a, b)
}
