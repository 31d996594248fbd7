//! Session identity for challenge workflow instances.
//!
//! A session is addressed by the composite `(user, module, challenge)` key.
//! The key is always reconstructible from a caller's request; there are no
//! engine-issued session tokens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Composite identity of one challenge workflow instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: i64,
    pub module_number: u32,
    pub challenge_number: u32,
}

impl SessionKey {
    pub fn new(user_id: i64, module_number: u32, challenge_number: u32) -> Self {
        Self {
            user_id,
            module_number,
            challenge_number,
        }
    }
}

/// Renders as `user_{user}_m{module}_c{challenge}`.
impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user_{}_m{}_c{}",
            self.user_id, self.module_number, self.challenge_number
        )
    }
}

/// Error parsing a session key from its display form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid session key '{0}': expected user_<id>_m<module>_c<challenge>")]
pub struct ParseSessionKeyError(pub String);

impl FromStr for SessionKey {
    type Err = ParseSessionKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSessionKeyError(s.to_string());

        let rest = s.strip_prefix("user_").ok_or_else(err)?;
        let (user, rest) = rest.split_once("_m").ok_or_else(err)?;
        let (module, challenge) = rest.split_once("_c").ok_or_else(err)?;

        Ok(Self {
            user_id: user.parse().map_err(|_| err())?,
            module_number: module.parse().map_err(|_| err())?,
            challenge_number: challenge.parse().map_err(|_| err())?,
        })
    }
}
