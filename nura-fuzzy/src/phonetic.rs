//! Locale-aware phonetic keys.
//!
//! Keys are Double Metaphone primary codes computed per token. For Spanish
//! locales the folded text is first rewritten so that letters Spanish speakers
//! pronounce alike collapse before encoding (`v`/`b`, `ll`/`y`, silent `h`,
//! soft `c`/`z`/`s`, `qu`/`k`).

use rphonetic::{DoubleMetaphone, Encoder};

use crate::similarity::fold_token;

/// Build the phonetic key of `text` for `locale` (a BCP-47 tag such as `es-CR`).
///
/// Multi-token input yields one code per token joined by a single space.
/// Tokens that encode to nothing (digits, punctuation) are dropped.
pub fn phonetic_key(text: &str, locale: &str) -> String {
    let encoder = DoubleMetaphone::default();
    let spanish = is_spanish(locale);
    text.split_whitespace()
        .map(fold_token)
        .filter(|t| !t.is_empty())
        .map(|t| if spanish { spanish_orthography(&t) } else { t })
        .map(|t| encoder.encode(&t))
        .filter(|code| !code.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_spanish(locale: &str) -> bool {
    locale
        .split(['-', '_'])
        .next()
        .is_some_and(|base| base.eq_ignore_ascii_case("es"))
}

/// Rewrite folded Spanish spelling into a phonetically flatter form.
fn spanish_orthography(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let mut out = String::with_capacity(token.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match (c, next) {
            ('l', Some('l')) => {
                out.push('y');
                i += 2;
                continue;
            }
            ('q', Some('u')) => {
                out.push('k');
                i += 2;
                continue;
            }
            ('c', Some('e' | 'i')) | ('z', _) => out.push('s'),
            ('c', Some('h')) => {
                out.push_str("ch");
                i += 2;
                continue;
            }
            ('h', _) => {}
            ('v', _) => out.push('b'),
            _ => out.push(c),
        }
        i += 1;
    }
    out
}
