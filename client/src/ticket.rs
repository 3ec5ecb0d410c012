use std::{fmt, str::FromStr};

use n4d_common::{DEFAULT_ADDRESS, TICKET_MAGIC};
use thiserror::Error;

use crate::{credential::Credential, key::Key};

/// Reasons a ticket string is rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketParseError {
    #[error("expected 4 fields in ticket, found {0}")]
    FieldCount(usize),

    #[error("unknown ticket format {0:?}")]
    BadMagic(String),
}

/// A server address paired with a key credential.
///
/// Tickets travel as text (`N4DTKV2 <address> <user> <key>`) so that a key
/// obtained once can be handed to another process. Construction never fails;
/// use [`Ticket::valid`] before trusting one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    address:    String,
    credential: Credential,
}

impl Ticket {
    pub fn from_parts<A: Into<String>>(address: A, credential: Credential) -> Self {
        Self {
            address: address.into(),
            credential,
        }
    }

    /// Parses a ticket string, falling back to the default (invalid) ticket
    /// when it is not recognised
    pub fn from_string(ticket: &str) -> Self {
        ticket.parse().unwrap_or_default()
    }

    /// True if the ticket holds a key credential with a well-formed key
    pub fn valid(&self) -> bool {
        matches!(&self.credential, Credential::Key { key, .. } if key.valid())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn into_parts(self) -> (String, Credential) {
        (self.address, self.credential)
    }
}

impl Default for Ticket {
    fn default() -> Self {
        Self {
            address:    DEFAULT_ADDRESS.to_string(),
            credential: Credential::Anonymous,
        }
    }
}

impl FromStr for Ticket {
    type Err = TicketParseError;

    fn from_str(ticket: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = ticket.split_whitespace().collect();
        let [magic, address, user, key] = fields.as_slice() else {
            return Err(TicketParseError::FieldCount(fields.len()));
        };

        if *magic != TICKET_MAGIC {
            return Err(TicketParseError::BadMagic(magic.to_string()));
        }

        Ok(Self::from_parts(*address, Credential::key(*user, Key::parse(key))))
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = self.credential.user().unwrap_or_default();
        let key = self
            .credential
            .key_value()
            .map(Key::as_str)
            .unwrap_or_default();
        write!(f, "{} {} {} {}", TICKET_MAGIC, self.address, user, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMN";

    #[test]
    fn test_parse_ticket() {
        let ticket = Ticket::from_string(&format!("N4DTKV2 https://server:9779 alice {KEY}"));

        assert!(ticket.valid());
        assert_eq!(ticket.address(), "https://server:9779");
        assert_eq!(ticket.credential().user(), Some("alice"));
        assert_eq!(
            ticket.credential().key_value().map(Key::as_str),
            Some(KEY)
        );
    }

    #[test]
    fn test_round_trip() {
        let ticket = Ticket::from_parts(
            "https://127.0.0.1:9779",
            Credential::key("alice", Key::parse(KEY)),
        );
        assert!(ticket.valid());

        let text = ticket.to_string();
        assert_eq!(text, format!("N4DTKV2 https://127.0.0.1:9779 alice {KEY}"));
        assert_eq!(Ticket::from_string(&text), ticket);
    }

    #[test]
    fn test_trailing_newline_accepted() {
        let ticket = Ticket::from_string(&format!("N4DTKV2 https://server:9779 alice {KEY}\n"));
        assert!(ticket.valid());
    }

    #[test]
    fn test_unrecognised_strings_degrade() {
        for text in [
            "",
            "N4DTKV2 https://server:9779 alice",
            "N4DTKV1 https://server:9779 alice key",
            "N4DTKV2 https://server:9779 alice key extra",
        ] {
            let ticket = Ticket::from_string(text);
            assert_eq!(ticket, Ticket::default(), "{text:?}");
            assert!(!ticket.valid());
        }
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "N4DTKV2 a b".parse::<Ticket>(),
            Err(TicketParseError::FieldCount(3))
        );
        assert_eq!(
            "TICKET a b c".parse::<Ticket>(),
            Err(TicketParseError::BadMagic("TICKET".to_string()))
        );
    }

    #[test]
    fn test_malformed_key_is_not_valid() {
        let ticket = Ticket::from_string("N4DTKV2 https://server:9779 alice short");
        assert_ne!(ticket, Ticket::default());
        assert!(!ticket.valid());
    }

    #[test]
    fn test_password_credential_is_not_valid() {
        let ticket = Ticket::from_parts("https://server", Credential::password("a", "b"));
        assert!(!ticket.valid());
    }
}
