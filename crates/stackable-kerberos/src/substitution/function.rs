//! Post-processing functions that can be applied to a resolved variable, for example
//! `${clusterHostInfo/zookeeper_hosts|each(%s:2181, \,, \,)}`.
use regex::Regex;
use snafu::{OptionExt, ResultExt, Snafu};

use super::Lookup;

type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("function {function} expects {expected} arguments, got {actual}"))]
    ArgumentCount {
        function: Function,
        expected: usize,
        actual: usize,
    },

    #[snafu(display("function {function} was given an invalid regular expression {pattern:?}"))]
    InvalidRegex {
        source: regex::Error,
        function: Function,
        pattern: String,
    },
}

/// All functions known to the substitutor.
///
/// The string form (`toLower`, `principalPrimary`, ...) is the name used inside placeholders.
#[derive(
    Clone,
    Copy,
    Debug,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[strum(serialize_all = "camelCase")]
pub enum Function {
    /// `each(pattern, joinDelimiter, splitPattern)`: splits the value at every match of
    /// `splitPattern`, replaces `%s` in `pattern` with each piece and joins the results.
    Each,

    /// `toLower()`
    ToLower,

    /// `replace(regex, replacement)`: replaces all matches, `$1` style group references are
    /// supported in the replacement.
    Replace,

    /// `append(group/name, delimiter, uniqueOnly)`: appends the value to the list stored in
    /// another variable.
    Append,

    /// `principalPrimary()`: `nn/host@REALM` becomes `nn`.
    PrincipalPrimary,

    /// `stripPort()`: `host:1234` becomes `host`. A value without a numeric port is kept.
    StripPort,
}

impl Function {
    /// Applies the function to `value`. `args` are already split and trimmed.
    pub fn apply(self, value: &str, args: &[String], lookup: &Lookup) -> Result<String> {
        match self {
            Self::Each => {
                let [pattern, join_delimiter, split_pattern] = self.expect_args::<3>(args)?;
                let splitter = self.compile(split_pattern)?;

                let mut pieces = splitter.split(value).collect::<Vec<_>>();
                while pieces.last().is_some_and(|piece| piece.is_empty()) {
                    pieces.pop();
                }

                Ok(pieces
                    .into_iter()
                    .map(|piece| pattern.replace("%s", piece))
                    .collect::<Vec<_>>()
                    .join(join_delimiter.as_str()))
            }
            Self::ToLower => Ok(value.to_lowercase()),
            Self::Replace => {
                let [pattern, replacement] = self.expect_args::<2>(args)?;
                let regex = self.compile(pattern)?;
                Ok(regex.replace_all(value, replacement.as_str()).into_owned())
            }
            Self::Append => {
                let [variable, delimiter, unique_only] = self.expect_args::<3>(args)?;
                let (group, name) = variable.split_once('/').unwrap_or(("", variable));
                let existing = lookup
                    .get(group)
                    .and_then(|variables| variables.get(name))
                    .map_or("", String::as_str);

                let mut items: Vec<&str> = Vec::new();
                let candidates = existing
                    .split(delimiter.as_str())
                    .chain(value.split(delimiter.as_str()));
                for item in candidates {
                    let item = item.trim();
                    if item.is_empty() {
                        continue;
                    }
                    if unique_only.eq_ignore_ascii_case("true") && items.contains(&item) {
                        continue;
                    }
                    items.push(item);
                }
                Ok(items.join(delimiter.as_str()))
            }
            Self::PrincipalPrimary => Ok(value
                .split(['/', '@'])
                .next()
                .unwrap_or_default()
                .to_owned()),
            Self::StripPort => Ok(strip_port(value.trim()).to_owned()),
        }
    }

    fn expect_args<const N: usize>(self, args: &[String]) -> Result<&[String; N]> {
        args.try_into().ok().context(ArgumentCountSnafu {
            function: self,
            expected: N,
            actual: args.len(),
        })
    }

    fn compile(self, pattern: &str) -> Result<Regex> {
        Regex::new(pattern).context(InvalidRegexSnafu {
            function: self,
            pattern,
        })
    }
}

fn strip_port(address: &str) -> &str {
    match address.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            host
        }
        _ => address,
    }
}

/// Splits a raw argument list at every comma that isn't escaped as `\,`, unescapes `\,` and
/// trims each argument. Other backslashes are kept, so regular expressions pass through.
pub(super) fn parse_arguments(raw: &str) -> Vec<String> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut args = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => args.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    args.push(current);

    args.into_iter().map(|arg| arg.trim().to_owned()).collect()
}
