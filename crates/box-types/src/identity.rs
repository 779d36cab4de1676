//! Box identity
//!
//! Identities are small integers handed out from `[1, replicas]`. Parsing is
//! lenient about range (anything that is a decimal integer is an identity) so
//! that boxes left over after a scale-down are still recognised.

use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Integer identity carried by a managed box
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(i64);

impl Identity {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Identities from `1` to `upper` inclusive, ascending
    pub fn range(upper: u32) -> impl Iterator<Item = Identity> {
        (1..=i64::from(upper)).map(Identity)
    }

    /// Whether this identity lies within `[1, upper]`
    pub fn is_within(self, upper: u32) -> bool {
        self.0 >= 1 && self.0 <= i64::from(upper)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(Identity)
            .map_err(|_| TypeError::InvalidIdentity(s.to_string()))
    }
}
