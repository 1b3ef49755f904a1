//! Terminal conditions that end a connection.
//!
//! The `Display` text of each variant is exactly what the client receives in
//! its force-disconnect notice.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DisconnectReason {
    #[error("No auth information given.")]
    AuthTimeout,
    #[error("No given auth token.")]
    MissingToken,
    #[error("Wrong auth informations.")]
    WrongCredentials,
    #[error("Server not ready.")]
    ServerNotReady,
    #[error("Cant find character.")]
    CharacterNotFound,
}
