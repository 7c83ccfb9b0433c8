//! Remote server identities and credential selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_io_timeout() -> u64 {
    30
}

fn default_keepalive_interval() -> u32 {
    15
}

fn millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

/// A remote host referenced by name from transfer units
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    /// Name used by units to reference this server
    pub name: String,
    /// Host name or address
    #[serde(alias = "ip")]
    pub host: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Login user
    pub user: String,
    /// Password, used only when no key is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Private key file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    /// Certificate signed for the private key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    /// TCP connect and handshake timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// Longest a single session call may block once connected, in seconds
    #[serde(default = "default_io_timeout")]
    pub io_timeout: u64,
    /// Seconds between SSH keepalive messages, 0 disables them
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u32,
}

/// The single credential strategy chosen for a server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Private key presented together with its certificate
    KeyWithCert {
        /// Private key file
        key_file: PathBuf,
        /// Certificate file
        cert_file: PathBuf,
    },
    /// Private key only
    Key {
        /// Private key file
        key_file: PathBuf,
    },
    /// Password authentication
    Password {
        /// The password
        password: String,
    },
}

impl ServerIdentity {
    /// Create an identity with password authentication on the default port
    pub fn with_password(
        name: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            host: host.into(),
            port: default_port(),
            user: user.into(),
            password: Some(password.into()),
            key_file: None,
            cert_file: None,
            connect_timeout: default_connect_timeout(),
            io_timeout: default_io_timeout(),
            keepalive_interval: default_keepalive_interval(),
        }
    }

    /// Pick the credential strategy: cert+key, then key, then password.
    ///
    /// Empty strings count as absent. A certificate without a key is ignored.
    pub fn credentials(&self) -> Option<Credentials> {
        let key_file = self.key_file.clone().filter(|p| !p.as_os_str().is_empty());
        let cert_file = self.cert_file.clone().filter(|p| !p.as_os_str().is_empty());
        let password = self.password.clone().filter(|p| !p.is_empty());

        match (key_file, cert_file, password) {
            (Some(key_file), Some(cert_file), _) => Some(Credentials::KeyWithCert {
                key_file,
                cert_file,
            }),
            (Some(key_file), None, _) => Some(Credentials::Key { key_file }),
            (None, _, Some(password)) => Some(Credentials::Password { password }),
            (None, _, None) => None,
        }
    }

    /// `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connect timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout.max(1))
    }

    /// Connect timeout in milliseconds, saturating at `u32::MAX`
    pub fn connect_timeout_millis(&self) -> u32 {
        millis(self.connect_timeout())
    }

    /// Per-call session timeout in milliseconds, never zero.
    ///
    /// A zero timeout would let a call on a stalled peer block forever.
    pub fn io_timeout_millis(&self) -> u32 {
        millis(Duration::from_secs(self.io_timeout.max(1)))
    }
}

impl fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerIdentity")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("key_file", &self.key_file)
            .field("cert_file", &self.cert_file)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .field("keepalive_interval", &self.keepalive_interval)
            .finish()
    }
}
