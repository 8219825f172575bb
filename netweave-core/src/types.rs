//! Core type definitions with strong typing and validation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::{Error, Result};

/// Record identifier: 12 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    /// Length of generated IDs
    pub const LENGTH: usize = 12;

    /// Generate a fresh random ID from a UUID v4
    #[must_use]
    pub fn generate() -> Self {
        let uuid = uuid::Uuid::new_v4();
        Self(hex::encode(&uuid.as_bytes()[..Self::LENGTH / 2]))
    }

    /// Wrap an existing ID read back from storage or user input
    ///
    /// # Errors
    /// Returns error if the ID is empty or not lowercase hex
    pub fn parse(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
            return Err(Error::invalid(format!("'{id}' is not a valid resource id")));
        }
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 characters, as shown in listings
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(Self::LENGTH)]
    }

    /// Whether `prefix` is a non-empty prefix of this ID
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        !prefix.is_empty() && self.0.starts_with(prefix)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ResourceId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<ResourceId> for String {
    fn from(id: ResourceId) -> Self {
        id.0
    }
}

/// Name of a namespace, container or topology node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceName(String);

impl ResourceName {
    /// Maximum length for resource names
    pub const MAX_LENGTH: usize = 64;

    /// Create a new `ResourceName` with validation
    ///
    /// # Errors
    /// Returns error if the name is empty, too long, or contains invalid characters
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<()> {
        let Some(first) = name.chars().next() else {
            return Err(Error::invalid("Name cannot be empty"));
        };

        if name.len() > Self::MAX_LENGTH {
            return Err(Error::invalid(format!(
                "Name '{name}' too long (max {} chars)",
                Self::MAX_LENGTH
            )));
        }

        if !first.is_ascii_alphanumeric() {
            return Err(Error::invalid(format!(
                "Name '{name}' must start with an alphanumeric character"
            )));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::invalid(format!(
                "Name '{name}' can only contain alphanumeric, dash, and underscore"
            )));
        }

        Ok(())
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ResourceName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for ResourceName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<ResourceName> for String {
    fn from(name: ResourceName) -> Self {
        name.0
    }
}

/// Linux network interface name (`IFNAMSIZ` minus the terminating NUL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(try_from = "String", into = "String")]
pub struct IfName(String);

impl IfName {
    /// Maximum interface name length accepted by the kernel
    pub const MAX_LENGTH: usize = 15;

    /// Create a new `IfName` with validation
    ///
    /// # Errors
    /// Returns error if the name would be rejected by the kernel
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();

        if name.is_empty() || name.len() > Self::MAX_LENGTH {
            return Err(Error::invalid(format!(
                "Interface name '{name}' must be 1-{} bytes",
                Self::MAX_LENGTH
            )));
        }

        if name == "." || name == ".." {
            return Err(Error::invalid(format!("Interface name '{name}' is reserved")));
        }

        if name
            .chars()
            .any(|c| c == '/' || c == ':' || c.is_whitespace() || c.is_control())
        {
            return Err(Error::invalid(format!(
                "Interface name '{name}' contains an invalid character"
            )));
        }

        Ok(Self(name))
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IfName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for IfName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for IfName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<IfName> for String {
    fn from(name: IfName) -> Self {
        name.0
    }
}

impl AsRef<str> for IfName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Interface address in CIDR notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cidr {
    addr: IpAddr,
    prefix_len: u8,
}

impl Cidr {
    /// Create from address and prefix length
    ///
    /// # Errors
    /// Returns error if the prefix is longer than the address family allows
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self> {
        let max = match addr {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };

        if prefix_len > max {
            return Err(Error::invalid(format!(
                "Prefix length {prefix_len} exceeds {max} for {addr}"
            )));
        }

        Ok(Self { addr, prefix_len })
    }

    /// Host address
    #[must_use]
    pub const fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length
    #[must_use]
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl FromStr for Cidr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| Error::invalid(format!("Address '{s}' must be in CIDR format")))?;

        let addr: IpAddr = addr
            .parse()
            .map_err(|e| Error::invalid(format!("Invalid IP address '{addr}': {e}")))?;

        let prefix_len: u8 = prefix
            .parse()
            .map_err(|e| Error::invalid(format!("Invalid prefix length '{prefix}': {e}")))?;

        Self::new(addr, prefix_len)
    }
}

impl TryFrom<String> for Cidr {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Cidr> for String {
    fn from(cidr: Cidr) -> Self {
        cidr.to_string()
    }
}
