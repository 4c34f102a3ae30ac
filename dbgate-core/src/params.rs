//! Named parameters for raw SQL
//!
//! Raw SQL is written with `:name` placeholders. Before execution they are
//! rewritten into the driver's positional form and bound in order. Quoted
//! text, comments and Postgres `::` casts pass through untouched.

use crate::dialect::DbKind;
use crate::error::{DataError, Result};
use crate::statement::Statement;
use crate::value::Value;

/// Ordered parameter name → value map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier value of the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let name = name.strip_prefix(':').map(str::to_owned).unwrap_or(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Builder form of `insert`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

fn is_ident_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '_'
}

/// Rewrite `:name` placeholders and bind their values.
///
/// `None` and an empty map both mean "no parameters". A placeholder used
/// twice is bound twice. Every placeholder needs a value and every value
/// needs a placeholder.
pub(crate) fn bind_named(kind: DbKind, sql: &str, params: Option<&Params>) -> Result<Statement> {
    let empty = Params::new();
    let params = params.unwrap_or(&empty);
    let mut used = vec![false; params.len()];
    let mut stmt = Statement::new(kind);

    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        if let Some((end, _)) = opaque_run(kind, &chars, i) {
            out.extend(&chars[i..end]);
            i = end;
            continue;
        }
        let ch = chars[i];
        match ch {
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' if chars.get(i + 1).copied().is_some_and(is_ident_start) => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && is_ident_char(chars[end]) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().collect();
                let position = params
                    .entries
                    .iter()
                    .position(|(n, _)| *n == name)
                    .ok_or_else(|| DataError::MissingParameter { name: name.clone() })?;
                used[position] = true;

                stmt.push(&out);
                out.clear();
                stmt.push_bind(params.entries[position].1.clone(), None);
                i = end;
            }
            _ => {
                out.push(ch);
                i += 1;
            }
        }
    }
    stmt.push(&out);

    if let Some(position) = used.iter().position(|u| !u) {
        return Err(DataError::UnusedParameter {
            name: params.entries[position].0.clone(),
        });
    }
    Ok(stmt)
}

/// `sql` without its final `;`, if that `;` is the last character of code.
/// Semicolons inside literals or followed only by comments are handled like
/// the database would read them.
pub(crate) fn strip_terminator(kind: DbKind, sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut last_code = None;
    let mut i = 0;
    while i < chars.len() {
        match opaque_run(kind, &chars, i) {
            Some((end, true)) => i = end,
            Some((end, false)) => {
                last_code = Some(end - 1);
                i = end;
            }
            None => {
                if !chars[i].is_whitespace() {
                    last_code = Some(i);
                }
                i += 1;
            }
        }
    }
    match last_code {
        Some(pos) if chars[pos] == ';' => chars[..pos].iter().chain(&chars[pos + 1..]).collect(),
        _ => sql.to_owned(),
    }
}

/// Literal or comment starting at `i`: the index just past it and whether it
/// is a comment. `None` for ordinary SQL text.
fn opaque_run(kind: DbKind, chars: &[char], i: usize) -> Option<(usize, bool)> {
    match chars[i] {
        quote @ ('\'' | '"' | '`') => {
            let backslash = kind == DbKind::MySql && quote != '`';
            Some((quoted_end(chars, i, quote, backslash), false))
        }
        '-' if chars.get(i + 1) == Some(&'-') => {
            let end = chars[i..]
                .iter()
                .position(|&c| c == '\n')
                .map_or(chars.len(), |p| i + p);
            Some((end, true))
        }
        '/' if chars.get(i + 1) == Some(&'*') => {
            let end = find_seq(chars, i + 2, &['*', '/']).map_or(chars.len(), |p| p + 2);
            Some((end, true))
        }
        '$' if kind == DbKind::Postgres => dollar_quoted_end(chars, i).map(|end| (end, false)),
        _ => None,
    }
}

/// Index just past a quoted run starting at `start`; a doubled quote is an
/// escape, and so is a backslash when `backslash` is set (MySQL strings).
fn quoted_end(chars: &[char], start: usize, quote: char, backslash: bool) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        if backslash && chars[i] == '\\' {
            i += 2;
            continue;
        }
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

fn find_seq(chars: &[char], from: usize, seq: &[char]) -> Option<usize> {
    if from > chars.len() {
        return None;
    }
    chars[from..]
        .windows(seq.len())
        .position(|w| w == seq)
        .map(|p| from + p)
}

/// End of a Postgres `$tag$ … $tag$` string, or `None` if `$` does not open one.
fn dollar_quoted_end(chars: &[char], start: usize) -> Option<usize> {
    let mut tag_end = start + 1;
    while tag_end < chars.len() && is_ident_char(chars[tag_end]) {
        tag_end += 1;
    }
    if chars.get(tag_end) != Some(&'$') {
        return None;
    }
    // `$1` is a positional parameter, not a tag
    if chars[start + 1..tag_end].first().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    let tag = &chars[start..=tag_end];
    find_seq(chars, tag_end + 1, tag).map(|p| p + tag.len()).or(Some(chars.len()))
}
