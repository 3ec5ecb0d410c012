//! Error types for n4d calls.
//!
//! Transport faults are collapsed into [`RpcError::ServerError`], replies
//! that fail structural validation into [`RpcError::InvalidServerResponse`],
//! and every status code the daemon can report has its own variant.
//! [`RpcError::InvalidCredential`] is raised locally before any I/O.

use thiserror::Error;

/// Renders `Class::method` for class calls and `method` for control calls
fn qualified(class: &Option<String>, method: &str) -> String {
    match class {
        Some(class) => format!("{class}::{method}"),
        None => method.to_string(),
    }
}

fn class_name(class: &Option<String>) -> &str {
    class.as_deref().unwrap_or("<none>")
}

fn or_anonymous(user: &Option<String>) -> &str {
    user.as_deref().unwrap_or("anonymous")
}

/// Errors returned by n4d calls
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    /// The call never produced a reply: connection, TLS, HTTP or XML failure
    #[error("server error: {0}")]
    ServerError(String),

    /// The reply did not have the shape of an n4d envelope
    #[error("invalid response from server {address}")]
    InvalidServerResponse {
        /// Address of the server that sent the reply
        address: String,
    },

    /// The method reported a failure. `traceback` is set when the failure
    /// wraps an unhandled exception.
    #[error("{}() returned error code {error_code}: {msg}", qualified(.class, .method))]
    CallFailed {
        class:      Option<String>,
        method:     String,
        error_code: i64,
        msg:        String,
        traceback:  Option<String>,
    },

    /// The method raised an exception the daemon did not handle
    #[error("unhandled error from {}():\n\n{traceback}", qualified(.class, .method))]
    UnhandledError {
        class:     Option<String>,
        method:    String,
        traceback: String,
    },

    #[error("invalid number of arguments for {}()", qualified(.class, .method))]
    InvalidArguments {
        class:  Option<String>,
        method: String,
    },

    #[error("invalid response from {}()", qualified(.class, .method))]
    InvalidMethodResponse {
        class:  Option<String>,
        method: String,
    },

    /// The daemon rejected the credential
    #[error("authentication failed for {credential}")]
    AuthenticationFailed {
        /// Summary of the rejected credential, without secrets
        credential: String,
    },

    #[error(
        "{} not allowed to {}()",
        or_anonymous(.user),
        qualified(.class, .method)
    )]
    UserNotAllowed {
        user:   Option<String>,
        class:  Option<String>,
        method: String,
    },

    #[error("Method {}() not found", qualified(.class, .method))]
    UnknownMethod {
        class:  Option<String>,
        method: String,
    },

    #[error("Class {} not found", class_name(.class))]
    UnknownClass { class: Option<String> },

    /// The reply carried a status code this client does not know
    #[error("{}() returned an unknown status code {status}", qualified(.class, .method))]
    UnknownCode {
        class:  Option<String>,
        method: String,
        status: i64,
    },

    /// The operation needs a different kind of credential
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let error = RpcError::UnknownMethod {
            class:  Some("Foo".to_string()),
            method: "bar".to_string(),
        };
        assert_eq!(error.to_string(), "Method Foo::bar() not found");

        let error = RpcError::CallFailed {
            class:      None,
            method:     "get_variable".to_string(),
            error_code: 7,
            msg:        "boom".to_string(),
            traceback:  None,
        };
        assert_eq!(
            error.to_string(),
            "get_variable() returned error code 7: boom"
        );

        let error = RpcError::UserNotAllowed {
            user:   None,
            class:  Some("Foo".to_string()),
            method: "bar".to_string(),
        };
        assert_eq!(error.to_string(), "anonymous not allowed to Foo::bar()");

        let error = RpcError::UnknownClass {
            class: Some("Foo".to_string()),
        };
        assert_eq!(error.to_string(), "Class Foo not found");
    }
}
