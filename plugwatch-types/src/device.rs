//! Connection parameters for a single monitored device.

use alloc::format;
use alloc::string::String;
use core::fmt;
use core::time::Duration;

/// Default polling interval when neither the device nor the global
/// configuration provides one.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Default fetch timeout when neither the device nor the global
/// configuration provides one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity and connection parameters for one device.
///
/// Values of this type are fully resolved: interval and timeout already
/// carry the inherited global defaults. They are built once at startup and
/// shared read-only by the collection tasks.
///
/// # Example
///
/// ```rust
/// use plugwatch_types::DeviceConfig;
/// use std::time::Duration;
///
/// let device = DeviceConfig::new("kitchen", "10.0.0.5")
///     .with_credentials("admin", "secret")
///     .with_interval(Duration::from_secs(30))
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(device.status_url(), "http://10.0.0.5/status");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Unique device name, used as the `name` metric label.
    pub name: String,
    /// Host (and optional port) of the device.
    pub address: String,
    /// Use `https` instead of `http`.
    pub secure: bool,
    /// Basic-auth credentials, attached only when present.
    pub credentials: Option<Credentials>,
    /// Time between two polls of this device.
    pub interval: Duration,
    /// Upper bound for one status fetch.
    pub timeout: Duration,
}

impl DeviceConfig {
    /// Create a plain-HTTP device with default interval and timeout.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            secure: false,
            credentials: None,
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Switch the transport to TLS.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Attach basic-auth credentials.
    ///
    /// An empty username clears the credentials again.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Credentials::new(username, password);
        self
    }

    /// Set the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// URL scheme for this device.
    pub fn scheme(&self) -> &'static str {
        if self.secure {
            "https"
        } else {
            "http"
        }
    }

    /// Full URL of the status endpoint.
    pub fn status_url(&self) -> String {
        format!("{}://{}/status", self.scheme(), self.address)
    }
}

/// Basic-auth credentials for a device.
///
/// The `Debug` output never contains the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Build credentials, returning `None` when the username is empty.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Option<Self> {
        let username = username.into();
        if username.is_empty() {
            return None;
        }
        Some(Self {
            username,
            password: password.into(),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
