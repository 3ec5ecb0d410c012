use std::{fmt, sync::Arc, time::Duration};

use n4d_common::{Value, DEFAULT_ADDRESS};
use tracing::{info, warn};

use crate::{
    call::{self, Call, Proxy},
    credential::{AuthMode, Credential},
    error::RpcError,
    key::{Key, KeyStore},
    ticket::Ticket,
    transport::{TlsTransport, Transport, DEFAULT_TIMEOUT},
};

/// Configuration for an n4d client
#[derive(Clone)]
pub struct ClientConfig {
    /// Server address, `https://host:port`
    pub address:   String,
    pub user:      Option<String>,
    pub password:  Option<String>,
    pub key:       Option<Key>,
    /// When valid, replaces address and credential
    pub ticket:    Option<Ticket>,
    /// Transport timeout
    pub timeout:   Duration,
    /// Where issued keys are looked up
    pub key_store: KeyStore,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address:   DEFAULT_ADDRESS.to_string(),
            user:      None,
            password:  None,
            key:       None,
            ticket:    None,
            timeout:   DEFAULT_TIMEOUT,
            key_store: KeyStore::new(),
        }
    }
}

impl ClientConfig {
    /// Creates a client configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server address
    pub fn with_address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = address.into();
        self
    }

    /// Set the user name
    pub fn with_user<S: Into<String>>(mut self, user: S) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Set the password
    pub fn with_password<S: Into<String>>(mut self, password: S) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the key, a user key if a user is also set, the master key otherwise
    pub fn with_key(mut self, key: Key) -> Self {
        self.key = Some(key);
        self
    }

    /// Use a ticket instead of address and credential
    pub fn with_ticket(mut self, ticket: Ticket) -> Self {
        self.ticket = Some(ticket);
        self
    }

    /// Set the transport timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the key store
    pub fn with_key_store(mut self, key_store: KeyStore) -> Self {
        self.key_store = key_store;
        self
    }

    /// Address and credential this configuration resolves to
    fn resolve(self) -> (String, Credential, KeyStore) {
        match self.ticket {
            Some(ticket) if ticket.valid() => {
                let (address, credential) = ticket.into_parts();
                (address, credential, self.key_store)
            }
            ticket => {
                if ticket.is_some() {
                    warn!("Ignoring ticket without a valid key");
                }
                let credential = Credential::new(
                    self.user.as_deref(),
                    self.password.as_deref(),
                    self.key,
                );
                (self.address, credential, self.key_store)
            }
        }
    }
}

/// Performs n4d calls.
///
/// A client owns one server address and one credential. Every call opens a
/// fresh connection, so a client may be shared between threads.
pub struct Client {
    address:    String,
    credential: Credential,
    key_store:  KeyStore,
    transport:  Arc<dyn Transport>,
}

impl Client {
    /// Creates a client that talks XML-RPC over TLS
    pub fn new(config: ClientConfig) -> Self {
        let transport = Arc::new(TlsTransport::new(config.timeout));
        Self::with_transport(config, transport)
    }

    /// Creates an anonymous client for the default address
    pub fn with_defaults() -> Self {
        Self::new(ClientConfig::default())
    }

    /// Creates a client from a ticket; an invalid ticket gives an anonymous
    /// client for the default address
    pub fn from_ticket(ticket: Ticket) -> Self {
        Self::new(ClientConfig::default().with_ticket(ticket))
    }

    /// Creates a client over a custom transport
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let (address, credential, key_store) = config.resolve();
        Self {
            address,
            credential,
            key_store,
            transport,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Calls `method`, on `class` when given, as a control method otherwise
    pub fn call_method(
        &self,
        class: Option<&str>,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let call = match class {
            Some(class) => Call::class_method(class, method),
            None => Call::control(method),
        };
        self.invoke(&call, args)
    }

    /// Proxy for the remote class `class`
    pub fn proxy<'a>(&'a self, class: &'a str) -> Proxy<'a> {
        Proxy::new(self, class)
    }

    pub(crate) fn invoke(&self, call: &Call, args: Vec<Value>) -> Result<Value, RpcError> {
        call::invoke(
            self.transport.as_ref(),
            &self.address,
            &self.credential,
            call,
            args,
        )
    }

    fn control(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.invoke(&Call::control(method), args)
    }

    /// Asks the server to issue a key for the credential's user.
    ///
    /// The server stores the key on the local machine, where it is read back
    /// from. If it cannot be read, the returned ticket holds an empty key and
    /// is not [`valid`](Ticket::valid).
    pub fn create_ticket(&self) -> Result<Ticket, RpcError> {
        let user = match &self.credential {
            Credential::Password { user, .. } | Credential::Key { user, .. } => user,
            _ => {
                return Err(RpcError::InvalidCredential(
                    "expected password or key credential".to_string(),
                ))
            }
        };

        self.control("create_ticket", vec![Value::from(user.as_str())])?;

        let key = match self.key_store.read_user_key(user) {
            Some(key) => key,
            None => {
                warn!("Ticket for {} created but its key could not be read", user);
                Key::default()
            }
        };
        info!("Created ticket for {}", user);

        Ok(Ticket::from_parts(
            self.address.clone(),
            Credential::key(user.as_str(), key),
        ))
    }

    /// Asks the server for a key for the credential's user without storing
    /// it anywhere. Needs a password credential.
    pub fn get_ticket(&self) -> Result<Ticket, RpcError> {
        let Credential::Password { user, password } = &self.credential else {
            return Err(RpcError::InvalidCredential(
                "expected password credential".to_string(),
            ));
        };

        let value = self.control(
            "get_ticket",
            vec![Value::from(user.as_str()), Value::from(password.as_str())],
        )?;
        let key = value.as_str().map(Key::parse).unwrap_or_default();
        info!("Got ticket for {}", user);

        Ok(Ticket::from_parts(
            self.address.clone(),
            Credential::key(user.as_str(), key),
        ))
    }

    /// Checks the credential against the server
    pub fn validate_user(&self) -> Result<Value, RpcError> {
        let args = match &self.credential {
            Credential::Password { user, password } => {
                vec![Value::from(user.as_str()), Value::from(password.as_str())]
            }
            Credential::Key { user, key } => {
                vec![Value::from(user.as_str()), Value::from(key.as_str())]
            }
            _ => {
                return Err(RpcError::InvalidCredential(
                    "expected password or key credential".to_string(),
                ))
            }
        };
        self.control("validate_user", args)
    }

    /// Lists the methods registered on the server
    pub fn get_methods(&self) -> Result<Value, RpcError> {
        self.control("get_methods", vec![])
    }

    /// Reads a variable, with its metadata when `info` is set
    pub fn get_variable(&self, name: &str, info: bool) -> Result<Value, RpcError> {
        self.control("get_variable", vec![Value::from(name), Value::from(info)])
    }

    /// Writes a variable. Needs a credential allowed to do so.
    pub fn set_variable(
        &self,
        name: &str,
        value: Value,
        extra_info: Option<Value>,
    ) -> Result<Value, RpcError> {
        self.control(
            "set_variable",
            vec![
                self.credential.encode(),
                Value::from(name),
                value,
                Value::from(extra_info),
            ],
        )
    }

    /// Removes a variable. Needs a credential allowed to do so.
    pub fn delete_variable(&self, name: &str) -> Result<Value, RpcError> {
        self.control(
            "delete_variable",
            vec![self.credential.encode(), Value::from(name)],
        )
    }

    /// Reads all variables, with metadata when `full_info` is set
    pub fn get_variables(&self, full_info: bool) -> Result<Value, RpcError> {
        self.control("get_variables", vec![Value::from(full_info)])
    }

    /// Server version
    pub fn version(&self) -> Result<Value, RpcError> {
        self.control("version", vec![])
    }

    /// Authentication mode of the client's credential
    pub fn auth_mode(&self) -> AuthMode {
        self.credential.mode()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("address", &self.address)
            .field("credential", &self.credential)
            .finish_non_exhaustive()
    }
}
