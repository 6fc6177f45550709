use std::fmt;
use std::net::IpAddr;

use ipnet::IpNet;

use crate::error::TargetError;

/// A validated scan target: a single IPv4/IPv6 address or a CIDR network.
///
/// The original spelling is kept so that what the user typed is what gets
/// passed to the scanner and written to the last-target file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    /// Parse and validate a target. The string must be the literal itself;
    /// callers reading user input or files trim it first.
    ///
    /// Networks are parsed non-strictly: `192.168.1.17/24` is accepted even
    /// though host bits are set.
    pub fn parse(s: &str) -> Result<Self, TargetError> {
        if s.trim().is_empty() {
            return Err(TargetError::Empty);
        }
        if s.contains('/') {
            s.parse::<IpNet>()
                .map_err(|_| TargetError::InvalidNetwork(s.to_string()))?;
        } else {
            s.parse::<IpAddr>()
                .map_err(|_| TargetError::InvalidAddress(s.to_string()))?;
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// True iff `s` is a single IP address or a CIDR network (host bits allowed).
pub fn validate_target(s: &str) -> bool {
    Target::parse(s).is_ok()
}
