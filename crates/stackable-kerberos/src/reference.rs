use std::{fmt::Display, str::FromStr};

use snafu::{Snafu, ensure};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type for identity reference parsing and resolution.
#[derive(Debug, Eq, PartialEq, Snafu)]
pub enum Error {
    /// Indicates that the path has more segments than `/[service/[component/]]identity`.
    #[snafu(display(
        "malformed identity reference {path:?}, expected /[service/[component/]]identity"
    ))]
    MalformedPath { path: String },

    #[snafu(display("identity reference {path:?} is not absolute"))]
    NotAbsolute { path: String },

    #[snafu(display("identity reference {path:?} contains an empty segment"))]
    EmptySegment { path: String },
}

impl Error {
    /// Only a path with too many segments is invalid, any other unusable path simply doesn't
    /// point at an identity.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::MalformedPath { .. })
    }
}

/// An absolute identity path: `/identity`, `/service/identity` or
/// `/service/component/identity`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IdentityPath {
    pub service: Option<String>,
    pub component: Option<String>,
    pub identity: String,
}

impl FromStr for IdentityPath {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let malformed = || MalformedPathSnafu { path: input };

        let Some(relative) = input.strip_prefix('/') else {
            return NotAbsoluteSnafu { path: input }.fail();
        };

        let segments = relative.split('/').collect::<Vec<_>>();
        ensure!(segments.len() <= 3, malformed());
        ensure!(
            segments.iter().all(|s| !s.is_empty()),
            EmptySegmentSnafu { path: input }
        );

        // Segments are interpreted right to left: the last one is always the identity.
        let path = match segments[..] {
            [identity] => Self {
                service: None,
                component: None,
                identity: identity.to_owned(),
            },
            [service, identity] => Self {
                service: Some(service.to_owned()),
                component: None,
                identity: identity.to_owned(),
            },
            [service, component, identity] => Self {
                service: Some(service.to_owned()),
                component: Some(component.to_owned()),
                identity: identity.to_owned(),
            },
            _ => return malformed().fail(),
        };

        Ok(path)
    }
}

impl Display for IdentityPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for segment in [&self.service, &self.component].into_iter().flatten() {
            write!(f, "/{segment}")?;
        }
        write!(f, "/{}", self.identity)
    }
}
