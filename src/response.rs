//! Response envelopes and batch collections.
//!
//! Each queried identity gets one envelope with a four-way outcome; a batch
//! response carries the envelopes in request order. The server may throttle
//! and return fewer envelopes than identities requested, so subjects are
//! always attached back by position, never by matching content.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::provider::{MailboxData, Provider};
use crate::settings::{DomainSettingName, UserSettingName};
use crate::values::{self, SettingValue};
use crate::xml;
use crate::{AutodiscoverError, AutodiscoverResult};

/// Error codes carried on the wire, at both collection and envelope level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NoError,
    RedirectAddress,
    RedirectUrl,
    InvalidUser,
    InvalidRequest,
    InvalidSetting,
    SettingIsNotAvailable,
    ServerBusy,
    InvalidDomain,
    NotFederated,
    InternalServerError,
    /// A code this client does not know; preserved verbatim.
    Other(String),
}

impl ErrorCode {
    pub fn from_wire(s: &str) -> Self {
        match s {
            "NoError" => ErrorCode::NoError,
            "RedirectAddress" => ErrorCode::RedirectAddress,
            "RedirectUrl" => ErrorCode::RedirectUrl,
            "InvalidUser" => ErrorCode::InvalidUser,
            "InvalidRequest" => ErrorCode::InvalidRequest,
            "InvalidSetting" => ErrorCode::InvalidSetting,
            "SettingIsNotAvailable" => ErrorCode::SettingIsNotAvailable,
            "ServerBusy" => ErrorCode::ServerBusy,
            "InvalidDomain" => ErrorCode::InvalidDomain,
            "NotFederated" => ErrorCode::NotFederated,
            "InternalServerError" => ErrorCode::InternalServerError,
            other => ErrorCode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ErrorCode::NoError => "NoError",
            ErrorCode::RedirectAddress => "RedirectAddress",
            ErrorCode::RedirectUrl => "RedirectUrl",
            ErrorCode::InvalidUser => "InvalidUser",
            ErrorCode::InvalidRequest => "InvalidRequest",
            ErrorCode::InvalidSetting => "InvalidSetting",
            ErrorCode::SettingIsNotAvailable => "SettingIsNotAvailable",
            ErrorCode::ServerBusy => "ServerBusy",
            ErrorCode::InvalidDomain => "InvalidDomain",
            ErrorCode::NotFederated => "NotFederated",
            ErrorCode::InternalServerError => "InternalServerError",
            ErrorCode::Other(code) => code,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-setting failure inside an otherwise usable envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingError {
    pub setting_name: String,
    pub error_code: ErrorCode,
    pub message: String,
}

/// The four-way disposition of one envelope. Handled exhaustively at every
/// consumption site; redirect targets are non-empty by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success,
    Error { code: ErrorCode, message: String },
    RedirectAddress { target: String },
    RedirectUrl { target: String },
}

impl Outcome {
    fn from_wire(
        code: ErrorCode,
        message: String,
        redirect_target: Option<String>,
    ) -> AutodiscoverResult<Self> {
        match code {
            ErrorCode::NoError => Ok(Outcome::Success),
            ErrorCode::RedirectAddress => Ok(Outcome::RedirectAddress {
                target: require_target(redirect_target, "RedirectAddress")?,
            }),
            ErrorCode::RedirectUrl => Ok(Outcome::RedirectUrl {
                target: require_target(redirect_target, "RedirectUrl")?,
            }),
            code => Ok(Outcome::Error { code, message }),
        }
    }
}

fn require_target(target: Option<String>, outcome: &str) -> AutodiscoverResult<String> {
    match target {
        Some(target) if !target.trim().is_empty() => Ok(target),
        _ => Err(AutodiscoverError::ProtocolViolation(format!(
            "{outcome} outcome without a redirect target"
        ))),
    }
}

/// Settings resolved for one queried mailbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    subject: Option<String>,
    pub outcome: Outcome,
    pub settings: BTreeMap<UserSettingName, SettingValue>,
    pub setting_errors: Vec<SettingError>,
}

impl UserResponse {
    /// Builds a Success envelope from a provider's merge of raw mailbox
    /// data, the way the serving side embeds merge output in responses.
    pub fn from_provider(
        provider: &Provider,
        requested: &[UserSettingName],
        data: &MailboxData,
    ) -> Self {
        let (settings, setting_errors) = provider.convert(requested, data);
        UserResponse {
            subject: None,
            outcome: Outcome::Success,
            settings,
            setting_errors,
        }
    }

    /// The identity this envelope answers, attached by batch post-processing.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The redirect target, for the two redirect outcomes.
    pub fn redirect_target(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::RedirectAddress { target } | Outcome::RedirectUrl { target } => Some(target),
            _ => None,
        }
    }

    pub fn setting(&self, name: UserSettingName) -> Option<&SettingValue> {
        self.settings.get(&name)
    }
}

/// Settings resolved for one queried domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResponse {
    subject: Option<String>,
    pub outcome: Outcome,
    pub settings: BTreeMap<DomainSettingName, SettingValue>,
    pub setting_errors: Vec<SettingError>,
}

impl DomainResponse {
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::RedirectAddress { target } | Outcome::RedirectUrl { target } => Some(target),
            _ => None,
        }
    }

    pub fn setting(&self, name: DomainSettingName) -> Option<&SettingValue> {
        self.settings.get(&name)
    }
}

/// Batch of user envelopes, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponseCollection {
    pub error_code: ErrorCode,
    pub error_message: String,
    responses: Vec<UserResponse>,
}

impl UserResponseCollection {
    pub fn responses(&self) -> &[UserResponse] {
        &self.responses
    }

    pub fn into_responses(self) -> Vec<UserResponse> {
        self.responses
    }

    /// Pairs envelopes back up with the identities that produced them,
    /// strictly by position. A throttled server truncates the tail of the
    /// list, it never reorders it, so the first `min(M, N)` envelopes get
    /// subjects and any truncated identities simply have no envelope.
    pub(crate) fn attach_subjects(&mut self, identities: &[String]) {
        if self.responses.len() < identities.len() {
            log::warn!(
                "server returned {} responses for {} identities (throttled?)",
                self.responses.len(),
                identities.len()
            );
        }
        for (response, identity) in self.responses.iter_mut().zip(identities) {
            response.subject = Some(identity.clone());
        }
    }
}

/// Batch of domain envelopes, in request order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainResponseCollection {
    pub error_code: ErrorCode,
    pub error_message: String,
    responses: Vec<DomainResponse>,
}

impl DomainResponseCollection {
    pub fn responses(&self) -> &[DomainResponse] {
        &self.responses
    }

    pub fn into_responses(self) -> Vec<DomainResponse> {
        self.responses
    }

    pub(crate) fn attach_subjects(&mut self, domains: &[String]) {
        if self.responses.len() < domains.len() {
            log::warn!(
                "server returned {} responses for {} domains (throttled?)",
                self.responses.len(),
                domains.len()
            );
        }
        for (response, domain) in self.responses.iter_mut().zip(domains) {
            response.subject = Some(domain.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

pub(crate) fn parse_user_response_collection(
    body: &str,
) -> AutodiscoverResult<UserResponseCollection> {
    let mut reader = Reader::from_reader(body.as_bytes());
    reader.trim_text(true);

    let mut collection = UserResponseCollection {
        error_code: ErrorCode::NoError,
        error_message: String::new(),
        responses: Vec::new(),
    };

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"Response" => {
                parse_user_collection_body(&mut reader, &mut collection)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(collection)
}

fn parse_user_collection_body(
    reader: &mut Reader<&[u8]>,
    collection: &mut UserResponseCollection,
) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ErrorCode" => {
                    collection.error_code =
                        ErrorCode::from_wire(&xml::read_text(reader, b"ErrorCode")?);
                }
                b"ErrorMessage" => {
                    collection.error_message = xml::read_text(reader, b"ErrorMessage")?;
                }
                b"UserResponses" => parse_user_responses(reader, &mut collection.responses)?,
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"Response" => return Ok(()),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_user_responses(
    reader: &mut Reader<&[u8]>,
    responses: &mut Vec<UserResponse>,
) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"UserResponse" => responses.push(parse_user_response(reader)?),
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"UserResponses" => return Ok(()),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_user_response(reader: &mut Reader<&[u8]>) -> AutodiscoverResult<UserResponse> {
    let mut error_code = ErrorCode::NoError;
    let mut error_message = String::new();
    let mut redirect_target = None;
    let mut settings = BTreeMap::new();
    let mut setting_errors = Vec::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ErrorCode" => {
                    error_code = ErrorCode::from_wire(&xml::read_text(reader, b"ErrorCode")?);
                }
                b"ErrorMessage" => error_message = xml::read_text(reader, b"ErrorMessage")?,
                b"RedirectTarget" => {
                    redirect_target = Some(xml::read_text(reader, b"RedirectTarget")?);
                }
                b"UserSettingErrors" => {
                    parse_setting_errors(reader, b"UserSettingErrors", &mut setting_errors)?;
                }
                b"UserSettings" => {
                    parse_user_settings(reader, &mut settings)?;
                }
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"UserResponse" => break,
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }

    Ok(UserResponse {
        subject: None,
        outcome: Outcome::from_wire(error_code, error_message, redirect_target)?,
        settings,
        setting_errors,
    })
}

fn parse_user_settings(
    reader: &mut Reader<&[u8]>,
    settings: &mut BTreeMap<UserSettingName, SettingValue>,
) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"UserSetting" {
                    let start = e.to_owned();
                    if let Some((name, value)) = values::read_user_setting(reader, &start)? {
                        settings.insert(name, value);
                    }
                } else {
                    xml::skip_element(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"UserSettings" => return Ok(()),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_setting_errors(
    reader: &mut Reader<&[u8]>,
    end: &[u8],
    errors: &mut Vec<SettingError>,
) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let item = e.local_name().as_ref().to_vec();
                if item == b"UserSettingError" || item == b"DomainSettingError" {
                    errors.push(parse_setting_error(reader, &item)?);
                } else {
                    xml::skip_element(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == end => return Ok(()),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_setting_error(
    reader: &mut Reader<&[u8]>,
    end: &[u8],
) -> AutodiscoverResult<SettingError> {
    let mut error = SettingError {
        setting_name: String::new(),
        error_code: ErrorCode::NoError,
        message: String::new(),
    };

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ErrorCode" => {
                    error.error_code = ErrorCode::from_wire(&xml::read_text(reader, b"ErrorCode")?);
                }
                b"ErrorMessage" => error.message = xml::read_text(reader, b"ErrorMessage")?,
                b"SettingName" => error.setting_name = xml::read_text(reader, b"SettingName")?,
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == end => return Ok(error),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

pub(crate) fn parse_domain_response_collection(
    body: &str,
) -> AutodiscoverResult<DomainResponseCollection> {
    let mut reader = Reader::from_reader(body.as_bytes());
    reader.trim_text(true);

    let mut collection = DomainResponseCollection {
        error_code: ErrorCode::NoError,
        error_message: String::new(),
        responses: Vec::new(),
    };

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"Response" => {
                parse_domain_collection_body(&mut reader, &mut collection)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(collection)
}

fn parse_domain_collection_body(
    reader: &mut Reader<&[u8]>,
    collection: &mut DomainResponseCollection,
) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ErrorCode" => {
                    collection.error_code =
                        ErrorCode::from_wire(&xml::read_text(reader, b"ErrorCode")?);
                }
                b"ErrorMessage" => {
                    collection.error_message = xml::read_text(reader, b"ErrorMessage")?;
                }
                b"DomainResponses" => parse_domain_responses(reader, &mut collection.responses)?,
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"Response" => return Ok(()),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_domain_responses(
    reader: &mut Reader<&[u8]>,
    responses: &mut Vec<DomainResponse>,
) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"DomainResponse" => responses.push(parse_domain_response(reader)?),
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"DomainResponses" => return Ok(()),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_domain_response(reader: &mut Reader<&[u8]>) -> AutodiscoverResult<DomainResponse> {
    let mut error_code = ErrorCode::NoError;
    let mut error_message = String::new();
    let mut redirect_target = None;
    let mut settings = BTreeMap::new();
    let mut setting_errors = Vec::new();

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ErrorCode" => {
                    error_code = ErrorCode::from_wire(&xml::read_text(reader, b"ErrorCode")?);
                }
                b"ErrorMessage" => error_message = xml::read_text(reader, b"ErrorMessage")?,
                b"RedirectTarget" => {
                    redirect_target = Some(xml::read_text(reader, b"RedirectTarget")?);
                }
                b"DomainSettingErrors" => {
                    parse_setting_errors(reader, b"DomainSettingErrors", &mut setting_errors)?;
                }
                b"DomainSettings" => parse_domain_settings(reader, &mut settings)?,
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"DomainResponse" => break,
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }

    Ok(DomainResponse {
        subject: None,
        outcome: Outcome::from_wire(error_code, error_message, redirect_target)?,
        settings,
        setting_errors,
    })
}

fn parse_domain_settings(
    reader: &mut Reader<&[u8]>,
    settings: &mut BTreeMap<DomainSettingName, SettingValue>,
) -> AutodiscoverResult<()> {
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"DomainSetting" {
                    let start = e.to_owned();
                    if let Some((name, value)) = values::read_domain_setting(reader, &start)? {
                        settings.insert(name, value);
                    }
                } else {
                    xml::skip_element(reader)?;
                }
            }
            Event::End(e) if e.local_name().as_ref() == b"DomainSettings" => return Ok(()),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}
