use std::{fmt::Display, ops::Deref, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};
use snafu::{Snafu, ensure};

// Kerberos itself allows almost anything in a realm name. Restrict it to the characters used in
// (upper-case) DNS names, since the realm ends up in regular expressions and config files.
const KERBEROS_REALM_NAME_FMT: &str = "[-.a-zA-Z0-9]+";

static KERBEROS_REALM_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{KERBEROS_REALM_NAME_FMT}$"))
        .expect("failed to compile Kerberos realm name regex")
});

#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum Error {
    #[snafu(display(
        "invalid Kerberos realm name {value:?}, it must only contain alphanumeric characters, '-', and '.' (e.g. 'EXAMPLE.COM')"
    ))]
    InvalidRealmName { value: String },
}

/// A validated Kerberos realm name.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct KerberosRealmName(String);

impl FromStr for KerberosRealmName {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(value.to_owned())
    }
}

impl TryFrom<String> for KerberosRealmName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ensure!(
            KERBEROS_REALM_NAME_REGEX.is_match(&value),
            InvalidRealmNameSnafu { value }
        );
        Ok(Self(value))
    }
}

impl From<KerberosRealmName> for String {
    fn from(value: KerberosRealmName) -> Self {
        value.0
    }
}

impl Display for KerberosRealmName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for KerberosRealmName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
