//! The n4d reply envelope.
//!
//! Every reply from the daemon is a struct carrying a status code, a message
//! and a return value, plus extra diagnostics on failure. Nothing in a reply
//! is trusted until [`ResponseEnvelope::validate`] has accepted it.

use crate::value::Value;

/// Status codes reported in the `status` member of a reply
pub mod status {
    /// The call completed
    pub const CALL_SUCCESSFUL: i64 = 0;
    /// The method reported an application-level failure
    pub const CALL_FAILED: i64 = -1;
    /// The method raised an uncaught exception
    pub const UNHANDLED_ERROR: i64 = -2;
    /// Argument count or types did not match the method
    pub const INVALID_ARGUMENTS: i64 = -3;
    /// The daemon could not format the method's reply
    pub const INVALID_RESPONSE: i64 = -5;
    /// The credential was rejected
    pub const AUTHENTICATION_ERROR: i64 = -10;
    /// The authenticated user may not call this method
    pub const USER_NOT_ALLOWED: i64 = -20;
    /// No such method
    pub const UNKNOWN_METHOD: i64 = -30;
    /// No such class
    pub const UNKNOWN_CLASS: i64 = -40;
}

/// A structurally valid reply
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub status:     i64,
    pub msg:        String,
    /// The `return` member, present even on failure
    pub ret:        Value,
    /// Present when `status` is [`status::CALL_FAILED`]
    pub error_code: Option<i64>,
    /// Present when the reply describes an unhandled server error
    pub traceback:  Option<String>,
}

impl ResponseEnvelope {
    /// Checks the shape of a raw reply.
    ///
    /// `status` (int), `msg` (string) and `return` (any) are always required.
    /// A `CALL_FAILED` status also requires an integer `error_code`, and a
    /// `traceback` string is required whenever either the status or that
    /// error code is `UNHANDLED_ERROR`. Returns `None` if anything is missing
    /// or mistyped.
    pub fn validate(raw: &Value) -> Option<Self> {
        let members = raw.as_struct()?;

        let status = members.get("status")?.as_i64()?;
        let msg = members.get("msg")?.as_str()?.to_string();
        let ret = members.get("return")?.clone();

        let error_code = if status == status::CALL_FAILED {
            Some(members.get("error_code")?.as_i64()?)
        } else {
            members.get("error_code").and_then(Value::as_i64)
        };

        let unhandled = status == status::UNHANDLED_ERROR
            || (status == status::CALL_FAILED && error_code == Some(status::UNHANDLED_ERROR));
        let traceback = if unhandled {
            Some(members.get("traceback")?.as_str()?.to_string())
        } else {
            members
                .get("traceback")
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        Some(Self {
            status,
            msg,
            ret,
            error_code,
            traceback,
        })
    }

    /// True when `status` is [`status::CALL_SUCCESSFUL`]
    pub fn is_success(&self) -> bool {
        self.status == status::CALL_SUCCESSFUL
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn reply(members: &[(&str, Value)]) -> Value {
        Value::Struct(
            members
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_success_envelope() {
        let raw = reply(&[
            ("status", Value::from(0)),
            ("msg", Value::from("ok")),
            ("return", Value::from(42)),
        ]);
        let envelope = ResponseEnvelope::validate(&raw).unwrap();

        assert!(envelope.is_success());
        assert_eq!(envelope.ret, Value::Int(42));
        assert_eq!(envelope.error_code, None);
    }

    #[test]
    fn test_nil_return_is_present() {
        let raw = reply(&[
            ("status", Value::from(0)),
            ("msg", Value::from("")),
            ("return", Value::Nil),
        ]);
        assert!(ResponseEnvelope::validate(&raw).is_some());
    }

    #[test]
    fn test_missing_return_rejected() {
        let raw = reply(&[("status", Value::from(0)), ("msg", Value::from("ok"))]);
        assert!(ResponseEnvelope::validate(&raw).is_none());
    }

    #[test]
    fn test_mistyped_fields_rejected() {
        let raw = reply(&[
            ("status", Value::from("0")),
            ("msg", Value::from("ok")),
            ("return", Value::Nil),
        ]);
        assert!(ResponseEnvelope::validate(&raw).is_none());

        let raw = reply(&[
            ("status", Value::from(0)),
            ("msg", Value::from(1)),
            ("return", Value::Nil),
        ]);
        assert!(ResponseEnvelope::validate(&raw).is_none());

        assert!(ResponseEnvelope::validate(&Value::from(vec![0])).is_none());
    }

    #[test]
    fn test_call_failed_requires_error_code() {
        let raw = reply(&[
            ("status", Value::from(-1)),
            ("msg", Value::from("boom")),
            ("return", Value::Nil),
        ]);
        assert!(ResponseEnvelope::validate(&raw).is_none());

        let raw = reply(&[
            ("status", Value::from(-1)),
            ("msg", Value::from("boom")),
            ("return", Value::Nil),
            ("error_code", Value::from(7)),
        ]);
        assert_eq!(
            ResponseEnvelope::validate(&raw).unwrap().error_code,
            Some(7)
        );
    }

    #[test]
    fn test_unhandled_error_requires_traceback() {
        let raw = reply(&[
            ("status", Value::from(-2)),
            ("msg", Value::from("")),
            ("return", Value::Nil),
        ]);
        assert!(ResponseEnvelope::validate(&raw).is_none());

        let raw = reply(&[
            ("status", Value::from(-1)),
            ("msg", Value::from("")),
            ("return", Value::Nil),
            ("error_code", Value::from(-2)),
        ]);
        assert!(ResponseEnvelope::validate(&raw).is_none());

        let raw = reply(&[
            ("status", Value::from(-2)),
            ("msg", Value::from("")),
            ("return", Value::Nil),
            ("traceback", Value::from("Traceback (most recent call last)")),
        ]);
        assert_eq!(
            ResponseEnvelope::validate(&raw).unwrap().traceback.as_deref(),
            Some("Traceback (most recent call last)")
        );
    }

    #[test]
    fn test_error_code_kept_on_other_statuses() {
        let raw = reply(&[
            ("status", Value::from(-30)),
            ("msg", Value::from("ok")),
            ("return", Value::Nil),
            ("error_code", Value::from(-30)),
        ]);
        let envelope = ResponseEnvelope::validate(&raw).unwrap();
        assert_eq!(envelope.status, status::UNKNOWN_METHOD);
        assert_eq!(envelope.error_code, Some(-30));
    }
}
