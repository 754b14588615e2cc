//! Unique 8.3 name derivation from long names.
//!
//! Any Unicode input maps deterministically onto the legal 8.3 character
//! set: the name is split at the last dot, uppercased, skip characters
//! (dot and space) are removed and every other illegal character becomes
//! `_`. If the result is over-long, was changed by tidying, or collides
//! with a name already present in the directory, a `~n` numeric tail is
//! appended until a free name is found.

use alloc::collections::BTreeSet;
use alloc::format;
use alloc::string::String;

use crate::error::{FatError, Result};
use super::short::ShortName;

/// Characters legal in a stored 8.3 name, from the DOS manual:
/// `A-Z 0-9 _ ^ $ ~ ! # % & - { } ( ) @ ' \``.
fn valid_char(c: char) -> bool {
    matches!(c,
        'A'..='Z' | '0'..='9'
        | '_' | '^' | '$' | '~' | '!' | '#' | '%' | '&'
        | '-' | '{' | '}' | '(' | ')' | '@' | '\'' | '`')
}

/// Dot and space are removed outright rather than replaced.
fn is_skip_char(c: char) -> bool {
    c == '.' || c == ' '
}

/// Uppercases, drops skip characters, and maps illegal characters to `_`.
fn tidy(part: &str) -> String {
    let mut result = String::with_capacity(part.len());
    for c in part.chars() {
        let c = c.to_ascii_uppercase();
        if is_skip_char(c) {
            continue;
        }
        if valid_char(c) {
            result.push(c);
        } else {
            result.push('_');
        }
    }
    result
}

/// A part is clean when tidying would leave it untouched.
fn is_clean(part: &str) -> bool {
    part.chars()
        .map(|c| c.to_ascii_uppercase())
        .all(|c| !is_skip_char(c) && valid_char(c))
}

fn join(base: &str, ext: &str) -> String {
    if ext.is_empty() {
        String::from(base)
    } else {
        format!("{base}.{ext}")
    }
}

/// Derives legal, directory-unique 8.3 names from long names.
///
/// The used-name set is a frozen snapshot of the uppercase `NAME.EXT`
/// forms already taken in the containing directory; the generator never
/// mutates it and never returns a member of it.
pub struct ShortNameGenerator<'a> {
    used: &'a BTreeSet<String>,
}

impl<'a> ShortNameGenerator<'a> {
    pub fn new(used: &'a BTreeSet<String>) -> Self {
        ShortNameGenerator { used }
    }

    /// Generates a short name for `long_name`.
    pub fn generate(&self, long_name: &str) -> Result<ShortName> {
        let (name_part, ext_part) = match long_name.rfind('.') {
            Some(dot) => (&long_name[..dot], &long_name[dot + 1..]),
            None => (long_name, ""),
        };

        // A tilde suffix is forced as soon as tidying would change the
        // name portion, even if the tidied form happens to be free.
        let force_suffix = !is_clean(name_part);
        let base = tidy(name_part);
        let mut ext = tidy(ext_part);
        ext.truncate(3);

        if !force_suffix && base.len() <= 8 && !self.used.contains(&join(&base, &ext)) {
            return ShortName::new(&base, &ext);
        }

        for i in 1..99_999u32 {
            let tail = format!("~{i}");
            let prefix = &base[..base.len().min(8 - tail.len())];
            let stem = format!("{prefix}{tail}");
            if !self.used.contains(&join(&stem, &ext)) {
                return ShortName::new(&stem, &ext);
            }
        }

        Err(FatError::ShortNameExhausted)
    }
}
