//! Remote call descriptors and the call state machine.
//!
//! A [`Proxy`] names a remote class. Binding a method to it yields a
//! [`Call`], an immutable descriptor built fresh for every invocation.
//! [`invoke`] sends the call, validates the reply envelope and maps its
//! status onto a value or an [`RpcError`].

use n4d_common::{status, ResponseEnvelope, Value};
use tracing::{debug, warn};

use crate::{client::Client, credential::Credential, error::RpcError, transport::Transport};

/// One remote method, either a control method or a method of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    class:  Option<String>,
    method: String,
}

impl Call {
    /// A control method, called without class or credential
    pub fn control<M: Into<String>>(method: M) -> Self {
        Self {
            class:  None,
            method: method.into(),
        }
    }

    /// `method` of the remote class `class`
    pub fn class_method<C: Into<String>, M: Into<String>>(class: C, method: M) -> Self {
        Self {
            class:  Some(class.into()),
            method: method.into(),
        }
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Wire parameters: class calls are prefixed with the encoded credential
    /// and the class name, control calls pass `args` unchanged
    pub fn params(&self, credential: &Credential, args: Vec<Value>) -> Vec<Value> {
        match &self.class {
            None => args,
            Some(class) => {
                let mut params = Vec::with_capacity(args.len() + 2);
                params.push(credential.encode());
                params.push(Value::from(class.as_str()));
                params.extend(args);
                params
            }
        }
    }

    /// Maps a validated envelope onto the call outcome
    pub fn resolve(
        &self,
        credential: &Credential,
        envelope: ResponseEnvelope,
    ) -> Result<Value, RpcError> {
        let class = self.class.clone();
        let method = self.method.clone();

        match envelope.status {
            status::CALL_SUCCESSFUL => Ok(envelope.ret),
            status::CALL_FAILED => Err(RpcError::CallFailed {
                class,
                method,
                error_code: envelope.error_code.unwrap_or(status::CALL_FAILED),
                msg: envelope.msg,
                traceback: envelope.traceback,
            }),
            status::UNHANDLED_ERROR => Err(RpcError::UnhandledError {
                class,
                method,
                traceback: envelope.traceback.unwrap_or_default(),
            }),
            status::INVALID_ARGUMENTS => Err(RpcError::InvalidArguments { class, method }),
            status::INVALID_RESPONSE => Err(RpcError::InvalidMethodResponse { class, method }),
            status::AUTHENTICATION_ERROR => Err(RpcError::AuthenticationFailed {
                credential: credential.summary(),
            }),
            status::USER_NOT_ALLOWED => Err(RpcError::UserNotAllowed {
                user: credential.user().map(str::to_string),
                class,
                method,
            }),
            status::UNKNOWN_METHOD => Err(RpcError::UnknownMethod { class, method }),
            status::UNKNOWN_CLASS => Err(RpcError::UnknownClass { class }),
            other => Err(RpcError::UnknownCode {
                class,
                method,
                status: other,
            }),
        }
    }
}

/// Performs one call against the server at `address`
pub fn invoke(
    transport: &dyn Transport,
    address: &str,
    credential: &Credential,
    call: &Call,
    args: Vec<Value>,
) -> Result<Value, RpcError> {
    let params = call.params(credential, args);
    debug!(
        "Calling {}::{}() on {} with {} parameters",
        call.class().unwrap_or("<control>"),
        call.method(),
        address,
        params.len()
    );

    let raw = transport
        .call(address, call.method(), &params)
        .map_err(|e| {
            warn!("Call to {} failed: {:#}", address, e);
            RpcError::ServerError(format!("{e:#}"))
        })?;

    let envelope = ResponseEnvelope::validate(&raw).ok_or_else(|| {
        warn!("Malformed reply from {}: {}", address, reply_shape(&raw));
        RpcError::InvalidServerResponse {
            address: address.to_string(),
        }
    })?;

    debug!("{}() returned status {}", call.method(), envelope.status);
    call.resolve(credential, envelope)
}

/// Type and member names of a reply, never its values: a ticket reply
/// carries a key
fn reply_shape(raw: &Value) -> String {
    match raw.as_struct() {
        Some(members) => {
            let names: Vec<&str> = members.keys().map(String::as_str).collect();
            format!("struct {{{}}}", names.join(", "))
        }
        None => raw.type_name().to_string(),
    }
}

/// A remote class, ready to have methods called on it
#[derive(Clone, Copy)]
pub struct Proxy<'a> {
    client: &'a Client,
    class:  &'a str,
}

impl<'a> Proxy<'a> {
    pub(crate) fn new(client: &'a Client, class: &'a str) -> Self {
        Self { client, class }
    }

    pub fn class(&self) -> &str {
        self.class
    }

    /// Binds `method` to this class without calling it
    pub fn bind(&self, method: &str) -> Call {
        Call::class_method(self.class, method)
    }

    /// Calls `method` on this class with the client's credential
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        self.client.invoke(&self.bind(method), args)
    }
}
