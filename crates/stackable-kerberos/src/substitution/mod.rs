//! Expansion of `${[group/]name[|function(args)]}` placeholders.
//!
//! Values are looked up in a two-level map (group, then name). Placeholders without a group use
//! the empty group `""`. Substitution is repeated until a pass doesn't replace anything, so
//! values may contain placeholders themselves:
//!
//! ```
//! use std::collections::BTreeMap;
//!
//! use stackable_kerberos::substitution::{Lookup, VariableSubstitutor};
//!
//! let lookup = Lookup::from([
//!     ("".to_owned(), BTreeMap::from([("realm".to_owned(), "${kerberos-env/realm}".to_owned())])),
//!     ("kerberos-env".to_owned(), BTreeMap::from([("realm".to_owned(), "EXAMPLE.COM".to_owned())])),
//! ]);
//!
//! let principal = VariableSubstitutor::default()
//!     .substitute("nn/_HOST@${realm}", &lookup)
//!     .unwrap();
//! assert_eq!(principal, "nn/_HOST@EXAMPLE.COM");
//! ```
use std::{
    collections::{BTreeMap, BTreeSet},
    str::FromStr,
    sync::LazyLock,
};

use regex::{Captures, Regex};
use snafu::Snafu;
use strum::IntoEnumIterator;
use tracing::{debug, trace, warn};

pub use self::function::Function;

mod function;

/// The upper bound of substitution passes. A template that still changes after this many passes
/// is considered to contain a circular reference.
pub const MAX_PASSES: usize = 1000;

/// Variable values by group and name.
pub type Lookup = BTreeMap<String, BTreeMap<String, String>>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display(
        "substitution of {template:?} did not settle after {MAX_PASSES} passes, the variables likely reference each other"
    ))]
    CircularReference { template: String },
}

static PLACEHOLDER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?:([\w\-.]+)/)?([\w\-./]+)(?:\s*\|\s*(.+?))?\}")
        .expect("failed to compile placeholder regex")
});

static FUNCTION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\w+)\s*\((.*)\)\s*$").expect("failed to compile function call regex")
});

/// Expands placeholders in templates.
///
/// Only the functions in the registry can be called from placeholders. A call to any other
/// function leaves the resolved value as it is.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VariableSubstitutor {
    functions: BTreeSet<Function>,
}

impl Default for VariableSubstitutor {
    /// A substitutor with every known [`Function`] enabled.
    fn default() -> Self {
        Self::new(Function::iter())
    }
}

impl VariableSubstitutor {
    pub fn new(functions: impl IntoIterator<Item = Function>) -> Self {
        Self {
            functions: functions.into_iter().collect(),
        }
    }

    /// A substitutor which doesn't support any function.
    pub fn without_functions() -> Self {
        Self::new([])
    }

    pub fn functions(&self) -> &BTreeSet<Function> {
        &self.functions
    }

    /// Replaces every resolvable placeholder in `template`.
    ///
    /// Placeholders referring to unknown variables are left untouched. Resolved values are
    /// inserted literally, but any placeholders they contain are expanded by the next pass.
    pub fn substitute(&self, template: &str, lookup: &Lookup) -> Result<String> {
        let mut current = template.to_owned();

        for pass in 1..=MAX_PASSES {
            let (next, replaced) = self.substitute_once(&current, lookup);
            if replaced == 0 {
                trace!(pass, "substitution settled");
                return Ok(next);
            }
            current = next;
        }

        CircularReferenceSnafu { template }.fail()
    }

    /// Applies [`Self::substitute`] to every value of `properties`.
    pub fn substitute_all(
        &self,
        properties: &BTreeMap<String, String>,
        lookup: &Lookup,
    ) -> Result<BTreeMap<String, String>> {
        properties
            .iter()
            .map(|(name, value)| Ok((name.clone(), self.substitute(value, lookup)?)))
            .collect()
    }

    /// A single pass over `input`, returning the result and the number of replacements.
    fn substitute_once(&self, input: &str, lookup: &Lookup) -> (String, usize) {
        let mut output = String::with_capacity(input.len());
        let mut copied_until = 0;
        let mut replaced = 0;

        for captures in PLACEHOLDER_REGEX.captures_iter(input) {
            let Some(value) = self.resolve(&captures, lookup) else {
                continue;
            };
            let Some(placeholder) = captures.get(0) else {
                continue;
            };

            output.push_str(&input[copied_until..placeholder.start()]);
            output.push_str(&value);
            copied_until = placeholder.end();
            replaced += 1;
        }

        output.push_str(&input[copied_until..]);
        (output, replaced)
    }

    fn resolve(&self, captures: &Captures<'_>, lookup: &Lookup) -> Option<String> {
        let group = captures.get(1).map_or("", |m| m.as_str());
        let name = captures.get(2)?.as_str();

        let Some(value) = lookup.get(group).and_then(|variables| variables.get(name)) else {
            trace!(group, name, "variable is not defined, leaving placeholder as is");
            return None;
        };

        Some(match captures.get(3) {
            Some(call) => self.call(call.as_str(), value, lookup),
            None => value.clone(),
        })
    }

    /// Applies the function `call` (`name(args)`) to `value`. Any problem with the call is
    /// logged and the value is returned unchanged.
    fn call(&self, call: &str, value: &str, lookup: &Lookup) -> String {
        let Some(parts) = FUNCTION_REGEX.captures(call) else {
            debug!(call, "not a function call, value is used unmodified");
            return value.to_owned();
        };
        let (name, raw_args) = (
            parts.get(1).map_or("", |m| m.as_str()),
            parts.get(2).map_or("", |m| m.as_str()),
        );

        let function = match Function::from_str(name) {
            Ok(function) if self.functions.contains(&function) => function,
            Ok(_) => {
                debug!(function = name, "function is not enabled, value is used unmodified");
                return value.to_owned();
            }
            Err(_) => {
                debug!(function = name, "unknown function, value is used unmodified");
                return value.to_owned();
            }
        };

        let args = function::parse_arguments(raw_args);
        match function.apply(value, &args, lookup) {
            Ok(result) => result,
            Err(error) => {
                warn!(%error, "failed to apply function, value is used unmodified");
                value.to_owned()
            }
        }
    }
}
