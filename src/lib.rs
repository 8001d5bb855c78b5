//! # Owlivion Autodiscover
//!
//! Exchange Autodiscover (SOAP) client for Owlivion Mail.
//!
//! Given a mailbox identity (SMTP address or domain), resolves the
//! server-provided settings needed to connect a client to its mail service:
//! EWS endpoints, protocol connections, alternate mailboxes, and so on.
//! Responses carry one of four outcomes (success, error, redirect to another
//! address, redirect to another endpoint); the [`resolver`] module follows
//! redirects with a bounded hop count and loop detection.

pub mod provider;
pub mod request;
pub mod resolver;
pub mod response;
pub mod settings;
pub mod transport;
pub mod values;

mod xml;

// Re-export commonly used types
pub use provider::{DomainData, EndpointData, MailboxData, Provider, SettingCatalog};
pub use request::{GetDomainSettingsRequest, GetUserSettingsRequest};
pub use resolver::{RedirectPolicy, SettingsResolver};
pub use response::{
    DomainResponse, DomainResponseCollection, ErrorCode, Outcome, SettingError, UserResponse,
    UserResponseCollection,
};
pub use settings::{DomainSettingName, SettingKind, UserSettingName};
pub use transport::{HttpTransport, Transport, TransportError};
pub use values::{
    AlternateMailbox, DocumentSharingLocation, ProtocolConnection, SettingValue, WebClientUrl,
};

/// Result type alias for autodiscover operations
pub type AutodiscoverResult<T> = Result<T, AutodiscoverError>;

/// Unified error type for autodiscover operations
#[derive(Debug, thiserror::Error)]
pub enum AutodiscoverError {
    #[error("No settings requested")]
    NoSettingsRequested,

    #[error("No mailboxes or domains to query")]
    NoIdentities,

    #[error("Blank identity in request")]
    BlankIdentity,

    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("Request cancelled")]
    Cancelled,

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// The server sent a payload this client cannot interpret, e.g. an
    /// unrecognized setting type tag. Indicates a client/server version skew
    /// and aborts processing of the whole response.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Server returned no response entries")]
    EmptyResponse,

    #[error("Redirect target is not a valid URL: {0}")]
    InvalidRedirectUrl(String),

    #[error("Redirect loop detected at {0}")]
    RedirectLoop(String),

    #[error("Redirect hop limit of {0} exceeded")]
    MaxHopsExceeded(usize),
}
