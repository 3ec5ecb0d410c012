use std::fmt;

use n4d_common::Value;

use crate::key::Key;

/// Authentication mode of a [`Credential`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Anonymous,
    Password,
    Key,
    MasterKey,
}

/// Authentication data sent along with every class call
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Credential {
    /// No authentication
    #[default]
    Anonymous,
    /// User name and password
    Password {
        user:     String,
        password: String,
    },
    /// User name and that user's key
    Key {
        user: String,
        key:  Key,
    },
    /// The machine-wide master key
    MasterKey(Key),
}

impl Credential {
    /// Creates a credential from whatever is available.
    ///
    /// * user + key gives a key credential, even if a password is also given
    /// * user + password gives a password credential
    /// * a key alone gives a master key credential
    /// * anything else is anonymous
    ///
    /// Empty strings and empty keys count as absent.
    pub fn new(user: Option<&str>, password: Option<&str>, key: Option<Key>) -> Self {
        let user = user.filter(|user| !user.is_empty());
        let password = password.filter(|password| !password.is_empty());
        let key = key.filter(|key| !key.is_empty());

        match (user, password, key) {
            (Some(user), _, Some(key)) => Self::Key {
                user: user.to_string(),
                key,
            },
            (Some(user), Some(password), None) => Self::Password {
                user:     user.to_string(),
                password: password.to_string(),
            },
            (None, _, Some(key)) => Self::MasterKey(key),
            _ => Self::Anonymous,
        }
    }

    pub fn password<U: Into<String>, P: Into<String>>(user: U, password: P) -> Self {
        Self::Password {
            user:     user.into(),
            password: password.into(),
        }
    }

    pub fn key<U: Into<String>>(user: U, key: Key) -> Self {
        Self::Key {
            user: user.into(),
            key,
        }
    }

    pub fn master_key(key: Key) -> Self {
        Self::MasterKey(key)
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            Self::Anonymous => AuthMode::Anonymous,
            Self::Password { .. } => AuthMode::Password,
            Self::Key { .. } => AuthMode::Key,
            Self::MasterKey(_) => AuthMode::MasterKey,
        }
    }

    /// User name for password and key credentials
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Password { user, .. } | Self::Key { user, .. } => Some(user.as_str()),
            Self::Anonymous | Self::MasterKey(_) => None,
        }
    }

    /// Key for key and master key credentials
    pub fn key_value(&self) -> Option<&Key> {
        match self {
            Self::Key { key, .. } | Self::MasterKey(key) => Some(key),
            Self::Anonymous | Self::Password { .. } => None,
        }
    }

    /// Wire form of the credential: an empty string when anonymous, a
    /// `[user, secret]` pair for password and key credentials and the bare
    /// key for the master key
    pub fn encode(&self) -> Value {
        match self {
            Self::Anonymous => Value::String(String::new()),
            Self::Password { user, password } => Value::from(vec![user.as_str(), password.as_str()]),
            Self::Key { user, key } => Value::from(vec![user.as_str(), key.as_str()]),
            Self::MasterKey(key) => Value::from(key.as_str()),
        }
    }

    /// Who this credential authenticates, without secrets
    pub fn summary(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::Password { user, .. } | Self::Key { user, .. } => format!("user {user}"),
            Self::MasterKey(_) => "master key".to_string(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Password { user, .. } => f
                .debug_struct("Password")
                .field("user", user)
                .field("password", &"<redacted>")
                .finish(),
            Self::Key { user, key } => f
                .debug_struct("Key")
                .field("user", user)
                .field("key", key)
                .finish(),
            Self::MasterKey(key) => f.debug_tuple("MasterKey").field(key).finish(),
        }
    }
}
