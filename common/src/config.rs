use std::{env, fmt, path::PathBuf, str::FromStr};

use thiserror::Error;

/// Address used when none is given
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:9779";

/// Leading token of a serialized ticket
pub const TICKET_MAGIC: &str = "N4DTKV2";

const TICKETS_DIR_ENV: &str = "N4D_TICKETS_DIR";
const DEFAULT_TICKETS_DIR: &str = "/run/n4d/tickets";

const MASTER_KEY_ENV: &str = "N4D_MASTER_KEY";
const DEFAULT_MASTER_KEY: &str = "/etc/n4d/key";

/// Directory holding one key file per user
pub fn tickets_dir() -> PathBuf {
    env::var(TICKETS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TICKETS_DIR))
}

/// Location of the master key file
pub fn master_key_path() -> PathBuf {
    env::var(MASTER_KEY_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_MASTER_KEY))
}

/// Errors raised while parsing a server address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address {0:?} has no scheme")]
    MissingScheme(String),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("address {0:?} has no host")]
    MissingHost(String),

    #[error("invalid port in address {0:?}")]
    InvalidPort(String),
}

/// URL scheme of a server address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// A parsed `scheme://host[:port][/path]` server address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub scheme: Scheme,
    /// Host name or IP address, without IPv6 brackets
    pub host:   String,
    pub port:   u16,
    /// Request path, always starting with `/`
    pub path:   String,
}

impl ServerAddress {
    /// `host:port` form suitable for `TcpStream::connect`
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for ServerAddress {
    type Err = AddressError;

    fn from_str(address: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = address
            .split_once("://")
            .ok_or_else(|| AddressError::MissingScheme(address.to_string()))?;

        let scheme = match scheme.to_ascii_lowercase().as_str() {
            "https" => Scheme::Https,
            "http" => Scheme::Http,
            other => return Err(AddressError::UnsupportedScheme(other.to_string())),
        };

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };

        // credentials embedded in the address are not supported
        let authority = authority.rsplit('@').next().unwrap_or(authority);

        let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
            let (host, tail) = bracketed
                .split_once(']')
                .ok_or_else(|| AddressError::MissingHost(address.to_string()))?;
            (host, tail.strip_prefix(':'))
        } else {
            match authority.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (authority, None),
            }
        };

        if host.is_empty() {
            return Err(AddressError::MissingHost(address.to_string()));
        }

        let port = match port {
            Some(port) => port
                .parse()
                .map_err(|_| AddressError::InvalidPort(address.to_string()))?,
            None => scheme.default_port(),
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

impl fmt::Display for ServerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scheme = match self.scheme {
            Scheme::Http => "http",
            Scheme::Https => "https",
        };
        write!(f, "{}://{}{}", scheme, self.authority(), self.path)
    }
}
