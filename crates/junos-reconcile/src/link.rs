//! Device transport seam.
//!
//! The engine drives a device through [`DeviceLink`]; SSH/NETCONF framing
//! lives behind it. A [`Connector`] opens links and is the only thing the
//! coordinator needs to reach a device.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a device link.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// The transport failed or could not be established.
    #[error("transport error: {0}")]
    Transport(String),

    /// The device answered an RPC with an error.
    #[error("{0}")]
    Rpc(String),
}

/// Network location of a device.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceTarget {
    /// Hostname or address.
    pub host: String,
    /// NETCONF port.
    pub port: u16,
}

impl DeviceTarget {
    /// Default NETCONF-over-SSH port.
    pub const DEFAULT_PORT: u16 = 830;

    /// Creates a target on the default port.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: Self::DEFAULT_PORT,
        }
    }

    /// Overrides the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

impl fmt::Display for DeviceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How the session authenticates.
#[derive(Clone, PartialEq, Eq)]
pub enum Authentication {
    /// Password authentication.
    Password(String),
    /// Private key file, optionally protected by a passphrase.
    PrivateKey {
        /// Path to the key file.
        path: PathBuf,
        /// Key passphrase.
        passphrase: Option<String>,
    },
}

/// Login credentials, opaque to the engine.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Login name.
    pub username: String,
    /// Authentication material.
    pub auth: Authentication,
}

impl Credentials {
    /// Creates password credentials.
    pub fn password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            auth: Authentication::Password(password.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match &self.auth {
            Authentication::Password(_) => "password",
            Authentication::PrivateKey { .. } => "private-key",
        };
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("auth", &method)
            .finish()
    }
}

/// One live, authenticated connection to a device.
///
/// Implementations map device `<rpc-error>` replies to [`LinkError::Rpc`]
/// with the device message verbatim.
#[async_trait]
pub trait DeviceLink: Send {
    /// Sends a raw RPC and returns the reply body.
    async fn rpc(&mut self, request: &str) -> Result<String, LinkError>;

    /// Runs a CLI command and returns its text output.
    async fn command(&mut self, command: &str) -> Result<String, LinkError>;

    /// Takes the exclusive candidate configuration lock.
    async fn lock(&mut self) -> Result<(), LinkError>;

    /// Releases the candidate configuration lock.
    async fn unlock(&mut self) -> Result<(), LinkError>;

    /// Loads `set`/`delete` statements into the candidate configuration.
    async fn load_set(&mut self, lines: &[String]) -> Result<(), LinkError>;

    /// Drops every pending candidate change.
    async fn discard_changes(&mut self) -> Result<(), LinkError>;

    /// Activates the candidate configuration.
    ///
    /// `confirm_minutes` requests a confirmed commit that reverts unless
    /// confirmed within that many minutes. Returns device warnings.
    async fn commit(
        &mut self,
        confirm_minutes: Option<u16>,
        log_message: &str,
    ) -> Result<Vec<String>, LinkError>;

    /// Validates the candidate configuration; confirms a pending
    /// confirmed commit.
    async fn commit_check(&mut self) -> Result<(), LinkError>;

    /// Tears down the transport.
    async fn close(&mut self) -> Result<(), LinkError>;
}

/// Opens device links.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes one authenticated link to `target`.
    async fn connect(
        &self,
        target: &DeviceTarget,
        credentials: &Credentials,
    ) -> Result<Box<dyn DeviceLink>, LinkError>;
}
