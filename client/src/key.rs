use std::{
    fmt,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use n4d_common::config;
use tracing::debug;

/// Length of a well-formed key
pub const KEY_LENGTH: usize = 50;

/// An n4d authentication key.
///
/// A key is only usable when it is exactly [`KEY_LENGTH`] ASCII alphanumeric
/// characters; anything else is carried around but reported as invalid by
/// [`Key::valid`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Key {
    value: String,
}

impl Key {
    /// Builds a key from a string or raw bytes, trimming surrounding
    /// whitespace. Bytes that are not UTF-8 give an empty key.
    pub fn parse(raw: impl AsRef<[u8]>) -> Self {
        match std::str::from_utf8(raw.as_ref()) {
            Ok(text) => Self {
                value: text.trim().to_string(),
            },
            Err(_) => Self::default(),
        }
    }

    /// True if the key has the proper format (50 alphanumeric characters)
    pub fn valid(&self) -> bool {
        self.value.len() == KEY_LENGTH && self.value.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Key of `user` from the default key store, or an empty key if it is
    /// missing or unreadable
    pub fn load_user_key(user: &str) -> Self {
        KeyStore::new().user_key(user)
    }

    /// Master key from the default key store, or an empty key if it is
    /// missing or unreadable
    pub fn load_master_key() -> Self {
        KeyStore::new().master_key()
    }
}

// keys are secrets, never print them
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.valid() {
            "valid"
        } else if self.is_empty() {
            "empty"
        } else {
            "malformed"
        };
        write!(f, "Key(<{state}>)")
    }
}

impl From<&str> for Key {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl From<String> for Key {
    fn from(raw: String) -> Self {
        Self::parse(raw)
    }
}

/// Filesystem locations of n4d keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyStore {
    /// Directory with one key file per user
    pub tickets_dir:     PathBuf,
    /// Master key file
    pub master_key_path: PathBuf,
}

impl KeyStore {
    /// Creates a key store at the default locations, honouring the
    /// `N4D_TICKETS_DIR` and `N4D_MASTER_KEY` overrides
    pub fn new() -> Self {
        Self {
            tickets_dir:     config::tickets_dir(),
            master_key_path: config::master_key_path(),
        }
    }

    /// Set the per-user key directory
    pub fn with_tickets_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.tickets_dir = dir.into();
        self
    }

    /// Set the master key file
    pub fn with_master_key_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.master_key_path = path.into();
        self
    }

    /// Path of the key file for `user`, if `user` is a plain file name
    pub fn user_key_path(&self, user: &str) -> Option<PathBuf> {
        if user.is_empty() || user == "." || user == ".." || user.contains(['/', '\0']) {
            return None;
        }
        Some(self.tickets_dir.join(user))
    }

    /// Reads the key of `user`, `None` if it cannot be read
    pub fn read_user_key(&self, user: &str) -> Option<Key> {
        self.user_key_path(user)
            .and_then(|path| read_key_file(&path))
    }

    /// Reads the master key, `None` if it cannot be read
    pub fn read_master_key(&self) -> Option<Key> {
        read_key_file(&self.master_key_path)
    }

    /// Key of `user`, empty if it cannot be read
    pub fn user_key(&self, user: &str) -> Key {
        self.read_user_key(user).unwrap_or_default()
    }

    /// Master key, empty if it cannot be read
    pub fn master_key(&self) -> Key {
        self.read_master_key().unwrap_or_default()
    }
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads the first line of a key file
fn read_key_file(path: &Path) -> Option<Key> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) => {
            debug!("No key at {:?}: {}", path, e);
            return None;
        }
    };

    let mut line = Vec::new();
    match BufReader::new(file).read_until(b'\n', &mut line) {
        Ok(_) => Some(Key::parse(line)),
        Err(e) => {
            debug!("Failed to read key from {:?}: {}", path, e);
            None
        }
    }
}
