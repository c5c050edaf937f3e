//! Transport knobs carried with each request.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Request timeout: one overall limit, or separate connect/read limits.
///
/// Deserializes from either a number of seconds (`timeout = 30`) or a
/// table (`timeout = { connect = 5.05, read = 25 }`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Timeout {
    Total(#[serde(deserialize_with = "de_seconds")] Duration),
    Split {
        #[serde(deserialize_with = "de_seconds")]
        connect: Duration,
        #[serde(deserialize_with = "de_seconds")]
        read: Duration,
    },
}

impl Timeout {
    /// Limit applied to establishing the TCP/TLS connection.
    pub fn connect(&self) -> Duration {
        match self {
            Timeout::Total(total) => *total,
            Timeout::Split { connect, .. } => *connect,
        }
    }

    /// Limit applied to the whole request once it is sent.
    pub fn read(&self) -> Duration {
        match self {
            Timeout::Total(total) => *total,
            Timeout::Split { read, .. } => *read,
        }
    }
}

fn de_seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let secs = f64::deserialize(deserializer)?;
    Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
}

/// User agent, proxies, timeout and TLS verification for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConnection {
    user_agent: Option<String>,
    proxy: Option<BTreeMap<String, String>>,
    timeout: Option<Timeout>,
    verify: bool,
}

impl Default for RequestConnection {
    fn default() -> Self {
        RequestConnection {
            user_agent: None,
            proxy: None,
            timeout: None,
            verify: true,
        }
    }
}

impl RequestConnection {
    pub fn new(
        user_agent: Option<String>,
        proxy: Option<BTreeMap<String, String>>,
        timeout: Option<Timeout>,
        verify: bool,
    ) -> Self {
        RequestConnection {
            user_agent,
            proxy,
            timeout,
            verify,
        }
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Scheme → proxy URL map (`https`, `http`, or `all`).
    pub fn proxy(&self) -> Option<&BTreeMap<String, String>> {
        self.proxy.as_ref()
    }

    pub fn timeout(&self) -> Option<Timeout> {
        self.timeout
    }

    pub fn verify(&self) -> bool {
        self.verify
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        timeout: Timeout,
    }

    #[test]
    fn timeout_deserializes_from_seconds() {
        let w: Wrapper = toml::from_str("timeout = 30").unwrap();
        assert_eq!(w.timeout, Timeout::Total(Duration::from_secs(30)));
        assert_eq!(w.timeout.connect(), Duration::from_secs(30));
    }

    #[test]
    fn timeout_deserializes_from_table() {
        let w: Wrapper = toml::from_str("timeout = { connect = 5.5, read = 25 }").unwrap();
        assert_eq!(w.timeout.connect(), Duration::from_millis(5500));
        assert_eq!(w.timeout.read(), Duration::from_secs(25));
    }

    #[test]
    fn connection_verifies_tls_by_default() {
        let c = RequestConnection::default();
        assert!(c.verify());
        assert!(c.user_agent().is_none());
        assert!(c.proxy().is_none());
        assert!(c.timeout().is_none());
    }
}
