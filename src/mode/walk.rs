//! The MODE listener's mode-walk algorithm (spec §4.6, scenario 5 in §8.2).

use crate::error::ModeParseError;
use crate::isupport::{ChanModes, PrefixSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sign {
    Plus,
    Minus,
}

/// One effect of walking a channel MODE string against the network's
/// negotiated `PREFIX`/`CHANMODES`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelModeEffect {
    /// A status-prefix mode (type in `PREFIX`'s mode list) applied to a
    /// member: e.g. `+o nick`.
    Prefix { sign: Sign, letter: char, nick: String },
    /// A type-A (list) mode: consumes an argument but is not itself stored
    /// as channel state (ban/except/invex lists are out of scope per spec).
    List { sign: Sign, letter: char, arg: String },
    /// A type-B mode: always takes an argument, sets (on `+`) or clears
    /// (on `-`) a channel mode parameter.
    Set { sign: Sign, letter: char, arg: String },
    /// A type-C mode: takes an argument only when adding.
    SetOptional {
        sign: Sign,
        letter: char,
        arg: Option<String>,
    },
    /// A type-D mode: boolean, takes no argument.
    Flag { sign: Sign, letter: char },
}

/// Walk a user MODE string (`+iw`, no arguments) into `(sign, letter)` pairs.
pub fn walk_user_modes(modestring: &str) -> Vec<(Sign, char)> {
    let mut sign = Sign::Plus;
    let mut out = Vec::new();
    for c in modestring.chars() {
        match c {
            '+' => sign = Sign::Plus,
            '-' => sign = Sign::Minus,
            letter => out.push((sign, letter)),
        }
    }
    out
}

/// Walk a channel MODE string against the network's `PREFIX` and
/// `CHANMODES` classification, consuming arguments left-to-right exactly as
/// spec §4.6 describes:
/// - prefix modes (in `PREFIX`'s mode list) always take an argument (a nick).
/// - type A (list) modes always take an argument, never stored.
/// - type B modes always take an argument.
/// - type C modes take an argument only when adding (`+`).
/// - type D modes take no argument.
pub fn walk_channel_modes(
    modestring: &str,
    args: &[String],
    chanmodes: &ChanModes<'_>,
    prefix: &PrefixSpec<'_>,
) -> Result<Vec<ChannelModeEffect>, ModeParseError> {
    let mut sign = Sign::Plus;
    let mut out = Vec::new();
    let mut args = args.iter();

    for c in modestring.chars() {
        match c {
            '+' => sign = Sign::Plus,
            '-' => sign = Sign::Minus,
            letter => {
                if let Some(idx) = prefix.modes.find(letter) {
                    let nick = args.next().ok_or(ModeParseError::MissingModeModifier)?;
                    let symbol = prefix
                        .prefixes
                        .chars()
                        .nth(idx)
                        .unwrap_or(letter);
                    let _ = symbol;
                    out.push(ChannelModeEffect::Prefix {
                        sign,
                        letter,
                        nick: nick.clone(),
                    });
                } else if chanmodes.a.contains(letter) {
                    let arg = args.next().ok_or(ModeParseError::MissingModeModifier)?;
                    out.push(ChannelModeEffect::List {
                        sign,
                        letter,
                        arg: arg.clone(),
                    });
                } else if chanmodes.b.contains(letter) {
                    let arg = args.next().ok_or(ModeParseError::MissingModeModifier)?;
                    out.push(ChannelModeEffect::Set {
                        sign,
                        letter,
                        arg: arg.clone(),
                    });
                } else if chanmodes.c.contains(letter) {
                    let arg = if sign == Sign::Plus {
                        Some(args.next().ok_or(ModeParseError::MissingModeModifier)?.clone())
                    } else {
                        None
                    };
                    out.push(ChannelModeEffect::SetOptional { sign, letter, arg });
                } else {
                    // Type D (or unknown, treated as D): no argument.
                    out.push(ChannelModeEffect::Flag { sign, letter });
                }
            }
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chanmodes() -> ChanModes<'static> {
        ChanModes {
            a: "b",
            b: "k",
            c: "l",
            d: "imnpst",
        }
    }

    fn prefix() -> PrefixSpec<'static> {
        PrefixSpec {
            modes: "ov",
            prefixes: "@+",
        }
    }

    #[test]
    fn scenario_5_mode_walk() {
        // :srv MODE #c +iobl a d!*@* 5
        let args: Vec<String> = vec!["a".into(), "d!*@*".into(), "5".into()];
        let effects = walk_channel_modes("+iobl", &args, &chanmodes(), &prefix()).unwrap();
        assert_eq!(
            effects,
            vec![
                ChannelModeEffect::Flag {
                    sign: Sign::Plus,
                    letter: 'i'
                },
                ChannelModeEffect::Prefix {
                    sign: Sign::Plus,
                    letter: 'o',
                    nick: "a".into()
                },
                ChannelModeEffect::List {
                    sign: Sign::Plus,
                    letter: 'b',
                    arg: "d!*@*".into()
                },
                ChannelModeEffect::SetOptional {
                    sign: Sign::Plus,
                    letter: 'l',
                    arg: Some("5".into())
                },
            ]
        );
    }

    #[test]
    fn scenario_5_continued_k_minus_o() {
        // :srv MODE #c +k-o pw a
        let args: Vec<String> = vec!["pw".into(), "a".into()];
        let effects = walk_channel_modes("+k-o", &args, &chanmodes(), &prefix()).unwrap();
        assert_eq!(
            effects,
            vec![
                ChannelModeEffect::Set {
                    sign: Sign::Plus,
                    letter: 'k',
                    arg: "pw".into()
                },
                ChannelModeEffect::Prefix {
                    sign: Sign::Minus,
                    letter: 'o',
                    nick: "a".into()
                },
            ]
        );
    }

    #[test]
    fn c_mode_minus_takes_no_arg() {
        let args: Vec<String> = vec![];
        let effects = walk_channel_modes("-l", &args, &chanmodes(), &prefix()).unwrap();
        assert_eq!(
            effects,
            vec![ChannelModeEffect::SetOptional {
                sign: Sign::Minus,
                letter: 'l',
                arg: None
            }]
        );
    }
}
