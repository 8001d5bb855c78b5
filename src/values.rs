//! Typed setting values and their wire form.
//!
//! Every setting entry on the wire carries an explicit type attribute that
//! selects exactly one value shape. An unrecognized type tag means the server
//! speaks a newer protocol revision than this client and aborts the whole
//! response; an unrecognized setting *name* under a known tag is server noise
//! and only drops that one entry.

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};

use crate::settings::{DomainSettingName, UserSettingName};
use crate::xml;
use crate::{AutodiscoverError, AutodiscoverResult};

pub(crate) const STRING_SETTING: &str = "StringSetting";
pub(crate) const INTEGER_SETTING: &str = "IntegerSetting";
pub(crate) const BOOLEAN_SETTING: &str = "BooleanSetting";
pub(crate) const WEB_CLIENT_URL_COLLECTION: &str = "WebClientUrlCollectionSetting";
pub(crate) const PROTOCOL_CONNECTION_COLLECTION: &str = "ProtocolConnectionCollectionSetting";
pub(crate) const ALTERNATE_MAILBOX_COLLECTION: &str = "AlternateMailboxCollectionSetting";
pub(crate) const DOCUMENT_SHARING_COLLECTION: &str = "DocumentSharingLocationCollectionSetting";
pub(crate) const DOMAIN_STRING_SETTING: &str = "DomainStringSetting";

/// A web client (OWA) URL entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebClientUrl {
    pub url: String,
}

/// One POP3/IMAP4/SMTP connection advertised by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConnection {
    pub encryption_method: String,
    pub hostname: String,
    pub port: i32,
}

/// An additional mailbox (archive, shared, delegate) tied to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateMailbox {
    pub mailbox_type: String,
    pub display_name: String,
    pub legacy_dn: String,
    pub server: String,
    pub smtp_address: Option<String>,
}

/// A document sharing location (team site) available to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSharingLocation {
    pub service_url: String,
    pub location_url: String,
    pub display_name: String,
    pub supported_file_extensions: Vec<String>,
    pub external_access_allowed: bool,
    pub anonymous_access_allowed: bool,
    pub can_modify_permissions: bool,
    pub is_default: bool,
}

/// A setting value, discriminated by the wire type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SettingValue {
    String(String),
    Integer(i32),
    Boolean(bool),
    WebClientUrls(Vec<WebClientUrl>),
    ProtocolConnections(Vec<ProtocolConnection>),
    AlternateMailboxes(Vec<AlternateMailbox>),
    DocumentSharingLocations(Vec<DocumentSharingLocation>),
}

impl SettingValue {
    /// The wire type tag that selects this variant.
    pub fn wire_type(&self) -> &'static str {
        match self {
            SettingValue::String(_) => STRING_SETTING,
            SettingValue::Integer(_) => INTEGER_SETTING,
            SettingValue::Boolean(_) => BOOLEAN_SETTING,
            SettingValue::WebClientUrls(_) => WEB_CLIENT_URL_COLLECTION,
            SettingValue::ProtocolConnections(_) => PROTOCOL_CONNECTION_COLLECTION,
            SettingValue::AlternateMailboxes(_) => ALTERNATE_MAILBOX_COLLECTION,
            SettingValue::DocumentSharingLocations(_) => DOCUMENT_SHARING_COLLECTION,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Reads one `<UserSetting>` element; the start tag has just been consumed.
///
/// Returns `Ok(None)` when the entry names an identifier outside the
/// registry; the entry is dropped and parsing continues with its siblings.
pub(crate) fn read_user_setting(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
) -> AutodiscoverResult<Option<(UserSettingName, SettingValue)>> {
    let tag = xml::type_attr(start).ok_or_else(|| {
        AutodiscoverError::ProtocolViolation("UserSetting without a type attribute".to_string())
    })?;

    let mut name_token = String::new();
    let mut scalar = None;
    let mut value = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Name" => name_token = xml::read_text(reader, b"Name")?,
                b"Value" => scalar = Some(xml::read_text(reader, b"Value")?),
                b"WebClientUrls" => {
                    value = Some(SettingValue::WebClientUrls(read_web_client_urls(reader)?));
                }
                b"ProtocolConnections" => {
                    value = Some(SettingValue::ProtocolConnections(read_protocol_connections(
                        reader,
                    )?));
                }
                b"AlternateMailboxes" => {
                    value = Some(SettingValue::AlternateMailboxes(read_alternate_mailboxes(
                        reader,
                    )?));
                }
                b"DocumentSharingLocations" => {
                    value = Some(SettingValue::DocumentSharingLocations(
                        read_document_sharing_locations(reader)?,
                    ));
                }
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"UserSetting" => break,
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }

    let value = decode_tagged_value(&tag, scalar, value)?;

    match name_token.parse::<UserSettingName>() {
        Ok(name) => Ok(Some((name, value))),
        Err(_) => {
            // Servers occasionally emit identifiers newer than this registry;
            // dropping the one entry keeps the rest of the response usable.
            log::debug!("dropping setting with unknown name: {}", name_token);
            Ok(None)
        }
    }
}

/// Reads one `<DomainSetting>` element; the start tag has just been consumed.
///
/// Unknown domain-setting names get the same tolerate-and-drop treatment as
/// unknown user-setting names.
pub(crate) fn read_domain_setting(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart,
) -> AutodiscoverResult<Option<(DomainSettingName, SettingValue)>> {
    let tag = xml::type_attr(start).ok_or_else(|| {
        AutodiscoverError::ProtocolViolation("DomainSetting without a type attribute".to_string())
    })?;
    if tag != DOMAIN_STRING_SETTING {
        log::error!("unrecognized domain setting type: {}", tag);
        return Err(AutodiscoverError::ProtocolViolation(format!(
            "unrecognized domain setting type: {tag}"
        )));
    }

    let mut name_token = String::new();
    let mut scalar = None;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"Name" => name_token = xml::read_text(reader, b"Name")?,
                b"Value" => scalar = Some(xml::read_text(reader, b"Value")?),
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"DomainSetting" => break,
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }

    let value = SettingValue::String(scalar.unwrap_or_default());

    match name_token.parse::<DomainSettingName>() {
        Ok(name) => Ok(Some((name, value))),
        Err(_) => {
            log::debug!("dropping domain setting with unknown name: {}", name_token);
            Ok(None)
        }
    }
}

fn decode_tagged_value(
    tag: &str,
    scalar: Option<String>,
    collection: Option<SettingValue>,
) -> AutodiscoverResult<SettingValue> {
    match tag {
        STRING_SETTING => Ok(SettingValue::String(scalar.unwrap_or_default())),
        INTEGER_SETTING => {
            let raw = scalar.unwrap_or_default();
            let parsed = raw.trim().parse::<i32>().map_err(|_| {
                AutodiscoverError::ProtocolViolation(format!("invalid integer value: {raw:?}"))
            })?;
            Ok(SettingValue::Integer(parsed))
        }
        BOOLEAN_SETTING => {
            let raw = scalar.unwrap_or_default();
            match raw.trim() {
                "true" | "1" => Ok(SettingValue::Boolean(true)),
                "false" | "0" => Ok(SettingValue::Boolean(false)),
                other => Err(AutodiscoverError::ProtocolViolation(format!(
                    "invalid boolean value: {other:?}"
                ))),
            }
        }
        WEB_CLIENT_URL_COLLECTION => {
            Ok(collection.unwrap_or(SettingValue::WebClientUrls(Vec::new())))
        }
        PROTOCOL_CONNECTION_COLLECTION => {
            Ok(collection.unwrap_or(SettingValue::ProtocolConnections(Vec::new())))
        }
        ALTERNATE_MAILBOX_COLLECTION => {
            Ok(collection.unwrap_or(SettingValue::AlternateMailboxes(Vec::new())))
        }
        DOCUMENT_SHARING_COLLECTION => {
            Ok(collection.unwrap_or(SettingValue::DocumentSharingLocations(Vec::new())))
        }
        other => {
            // A tag outside the closed set means the server speaks a revision
            // this client does not; guessing here would corrupt settings.
            log::error!("unrecognized setting type: {}", other);
            Err(AutodiscoverError::ProtocolViolation(format!(
                "unrecognized setting type: {other}"
            )))
        }
    }
}

fn read_web_client_urls(reader: &mut Reader<&[u8]>) -> AutodiscoverResult<Vec<WebClientUrl>> {
    let mut urls = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"WebClientUrl" => {
                    let mut url = String::new();
                    let mut inner = Vec::new();
                    loop {
                        match reader.read_event_into(&mut inner)? {
                            Event::Start(e) => match e.local_name().as_ref() {
                                b"Url" => url = xml::read_text(reader, b"Url")?,
                                _ => xml::skip_element(reader)?,
                            },
                            Event::End(e) if e.local_name().as_ref() == b"WebClientUrl" => break,
                            Event::Eof => return Err(xml::truncated()),
                            _ => {}
                        }
                        inner.clear();
                    }
                    urls.push(WebClientUrl { url });
                }
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"WebClientUrls" => return Ok(urls),
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn read_protocol_connections(
    reader: &mut Reader<&[u8]>,
) -> AutodiscoverResult<Vec<ProtocolConnection>> {
    let mut connections = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ProtocolConnection" => {
                    let mut encryption_method = String::new();
                    let mut hostname = String::new();
                    let mut port = 0i32;
                    let mut inner = Vec::new();
                    loop {
                        match reader.read_event_into(&mut inner)? {
                            Event::Start(e) => match e.local_name().as_ref() {
                                b"EncryptionMethod" => {
                                    encryption_method =
                                        xml::read_text(reader, b"EncryptionMethod")?;
                                }
                                b"Hostname" => hostname = xml::read_text(reader, b"Hostname")?,
                                b"Port" => {
                                    let raw = xml::read_text(reader, b"Port")?;
                                    port = raw.trim().parse::<i32>().map_err(|_| {
                                        AutodiscoverError::ProtocolViolation(format!(
                                            "invalid port value: {raw:?}"
                                        ))
                                    })?;
                                }
                                _ => xml::skip_element(reader)?,
                            },
                            Event::End(e)
                                if e.local_name().as_ref() == b"ProtocolConnection" =>
                            {
                                break
                            }
                            Event::Eof => return Err(xml::truncated()),
                            _ => {}
                        }
                        inner.clear();
                    }
                    connections.push(ProtocolConnection {
                        encryption_method,
                        hostname,
                        port,
                    });
                }
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"ProtocolConnections" => {
                return Ok(connections)
            }
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn read_alternate_mailboxes(
    reader: &mut Reader<&[u8]>,
) -> AutodiscoverResult<Vec<AlternateMailbox>> {
    let mut mailboxes = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"AlternateMailbox" => {
                    let mut mailbox = AlternateMailbox {
                        mailbox_type: String::new(),
                        display_name: String::new(),
                        legacy_dn: String::new(),
                        server: String::new(),
                        smtp_address: None,
                    };
                    let mut inner = Vec::new();
                    loop {
                        match reader.read_event_into(&mut inner)? {
                            Event::Start(e) => match e.local_name().as_ref() {
                                b"Type" => mailbox.mailbox_type = xml::read_text(reader, b"Type")?,
                                b"DisplayName" => {
                                    mailbox.display_name = xml::read_text(reader, b"DisplayName")?;
                                }
                                b"LegacyDN" => {
                                    mailbox.legacy_dn = xml::read_text(reader, b"LegacyDN")?;
                                }
                                b"Server" => mailbox.server = xml::read_text(reader, b"Server")?,
                                b"SmtpAddress" => {
                                    mailbox.smtp_address =
                                        Some(xml::read_text(reader, b"SmtpAddress")?);
                                }
                                _ => xml::skip_element(reader)?,
                            },
                            Event::End(e) if e.local_name().as_ref() == b"AlternateMailbox" => {
                                break
                            }
                            Event::Eof => return Err(xml::truncated()),
                            _ => {}
                        }
                        inner.clear();
                    }
                    mailboxes.push(mailbox);
                }
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"AlternateMailboxes" => {
                return Ok(mailboxes)
            }
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn read_document_sharing_locations(
    reader: &mut Reader<&[u8]>,
) -> AutodiscoverResult<Vec<DocumentSharingLocation>> {
    let mut locations = Vec::new();
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"DocumentSharingLocation" => {
                    locations.push(read_document_sharing_location(reader)?);
                }
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"DocumentSharingLocations" => {
                return Ok(locations)
            }
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn read_document_sharing_location(
    reader: &mut Reader<&[u8]>,
) -> AutodiscoverResult<DocumentSharingLocation> {
    let mut location = DocumentSharingLocation {
        service_url: String::new(),
        location_url: String::new(),
        display_name: String::new(),
        supported_file_extensions: Vec::new(),
        external_access_allowed: false,
        anonymous_access_allowed: false,
        can_modify_permissions: false,
        is_default: false,
    };

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"ServiceUrl" => location.service_url = xml::read_text(reader, b"ServiceUrl")?,
                b"LocationUrl" => location.location_url = xml::read_text(reader, b"LocationUrl")?,
                b"DisplayName" => location.display_name = xml::read_text(reader, b"DisplayName")?,
                b"SupportedFileExtensions" => {
                    let mut inner = Vec::new();
                    loop {
                        match reader.read_event_into(&mut inner)? {
                            Event::Start(e) => match e.local_name().as_ref() {
                                b"FileExtension" => location
                                    .supported_file_extensions
                                    .push(xml::read_text(reader, b"FileExtension")?),
                                _ => xml::skip_element(reader)?,
                            },
                            Event::End(e)
                                if e.local_name().as_ref() == b"SupportedFileExtensions" =>
                            {
                                break
                            }
                            Event::Eof => return Err(xml::truncated()),
                            _ => {}
                        }
                        inner.clear();
                    }
                }
                b"ExternalAccessAllowed" => {
                    location.external_access_allowed =
                        read_bool(reader, b"ExternalAccessAllowed")?;
                }
                b"AnonymousAccessAllowed" => {
                    location.anonymous_access_allowed =
                        read_bool(reader, b"AnonymousAccessAllowed")?;
                }
                b"CanModifyPermissions" => {
                    location.can_modify_permissions = read_bool(reader, b"CanModifyPermissions")?;
                }
                b"IsDefault" => location.is_default = read_bool(reader, b"IsDefault")?,
                _ => xml::skip_element(reader)?,
            },
            Event::End(e) if e.local_name().as_ref() == b"DocumentSharingLocation" => {
                return Ok(location)
            }
            Event::Eof => return Err(xml::truncated()),
            _ => {}
        }
        buf.clear();
    }
}

fn read_bool(reader: &mut Reader<&[u8]>, end: &[u8]) -> AutodiscoverResult<bool> {
    let raw = xml::read_text(reader, end)?;
    match raw.trim() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(AutodiscoverError::ProtocolViolation(format!(
            "invalid boolean value: {other:?}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Writes one `<UserSetting>` element with its type attribute and payload.
pub(crate) fn write_user_setting(
    writer: &mut Writer<Vec<u8>>,
    name: UserSettingName,
    value: &SettingValue,
) -> Result<(), quick_xml::Error> {
    let start =
        BytesStart::new("UserSetting").with_attributes([("i:type", value.wire_type())]);
    writer.write_event(Event::Start(start))?;
    xml::write_text_element(writer, "Name", name.as_str())?;

    match value {
        SettingValue::String(s) => xml::write_text_element(writer, "Value", s)?,
        SettingValue::Integer(i) => xml::write_text_element(writer, "Value", &i.to_string())?,
        SettingValue::Boolean(b) => {
            xml::write_text_element(writer, "Value", if *b { "true" } else { "false" })?;
        }
        SettingValue::WebClientUrls(urls) => {
            writer.write_event(Event::Start(BytesStart::new("WebClientUrls")))?;
            for entry in urls {
                writer.write_event(Event::Start(BytesStart::new("WebClientUrl")))?;
                xml::write_text_element(writer, "Url", &entry.url)?;
                writer.write_event(Event::End(BytesEnd::new("WebClientUrl")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("WebClientUrls")))?;
        }
        SettingValue::ProtocolConnections(connections) => {
            writer.write_event(Event::Start(BytesStart::new("ProtocolConnections")))?;
            for conn in connections {
                writer.write_event(Event::Start(BytesStart::new("ProtocolConnection")))?;
                xml::write_text_element(writer, "EncryptionMethod", &conn.encryption_method)?;
                xml::write_text_element(writer, "Hostname", &conn.hostname)?;
                xml::write_text_element(writer, "Port", &conn.port.to_string())?;
                writer.write_event(Event::End(BytesEnd::new("ProtocolConnection")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("ProtocolConnections")))?;
        }
        SettingValue::AlternateMailboxes(mailboxes) => {
            writer.write_event(Event::Start(BytesStart::new("AlternateMailboxes")))?;
            for mailbox in mailboxes {
                writer.write_event(Event::Start(BytesStart::new("AlternateMailbox")))?;
                xml::write_text_element(writer, "Type", &mailbox.mailbox_type)?;
                xml::write_text_element(writer, "DisplayName", &mailbox.display_name)?;
                xml::write_text_element(writer, "LegacyDN", &mailbox.legacy_dn)?;
                xml::write_text_element(writer, "Server", &mailbox.server)?;
                if let Some(smtp) = &mailbox.smtp_address {
                    xml::write_text_element(writer, "SmtpAddress", smtp)?;
                }
                writer.write_event(Event::End(BytesEnd::new("AlternateMailbox")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("AlternateMailboxes")))?;
        }
        SettingValue::DocumentSharingLocations(locations) => {
            writer.write_event(Event::Start(BytesStart::new("DocumentSharingLocations")))?;
            for loc in locations {
                writer.write_event(Event::Start(BytesStart::new("DocumentSharingLocation")))?;
                xml::write_text_element(writer, "ServiceUrl", &loc.service_url)?;
                xml::write_text_element(writer, "LocationUrl", &loc.location_url)?;
                xml::write_text_element(writer, "DisplayName", &loc.display_name)?;
                writer.write_event(Event::Start(BytesStart::new("SupportedFileExtensions")))?;
                for ext in &loc.supported_file_extensions {
                    xml::write_text_element(writer, "FileExtension", ext)?;
                }
                writer.write_event(Event::End(BytesEnd::new("SupportedFileExtensions")))?;
                write_bool(writer, "ExternalAccessAllowed", loc.external_access_allowed)?;
                write_bool(writer, "AnonymousAccessAllowed", loc.anonymous_access_allowed)?;
                write_bool(writer, "CanModifyPermissions", loc.can_modify_permissions)?;
                write_bool(writer, "IsDefault", loc.is_default)?;
                writer.write_event(Event::End(BytesEnd::new("DocumentSharingLocation")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("DocumentSharingLocations")))?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("UserSetting")))
}

/// Writes one `<DomainSetting>` element. Domain settings carry only the
/// string shape on the wire.
pub(crate) fn write_domain_setting(
    writer: &mut Writer<Vec<u8>>,
    name: DomainSettingName,
    value: &SettingValue,
) -> Result<(), quick_xml::Error> {
    let start =
        BytesStart::new("DomainSetting").with_attributes([("i:type", DOMAIN_STRING_SETTING)]);
    writer.write_event(Event::Start(start))?;
    xml::write_text_element(writer, "Name", name.as_str())?;
    let text = match value {
        SettingValue::String(s) => s.clone(),
        SettingValue::Integer(i) => i.to_string(),
        SettingValue::Boolean(b) => b.to_string(),
        _ => String::new(),
    };
    xml::write_text_element(writer, "Value", &text)?;
    writer.write_event(Event::End(BytesEnd::new("DomainSetting")))
}

fn write_bool(
    writer: &mut Writer<Vec<u8>>,
    name: &str,
    value: bool,
) -> Result<(), quick_xml::Error> {
    xml::write_text_element(writer, name, if value { "true" } else { "false" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn parse_settings_fragment(
        xml_text: &str,
    ) -> AutodiscoverResult<BTreeMap<UserSettingName, SettingValue>> {
        let mut reader = Reader::from_reader(xml_text.as_bytes());
        reader.trim_text(true);
        let mut settings = BTreeMap::new();
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"UserSetting" => {
                    let start = e.to_owned();
                    if let Some((name, value)) = read_user_setting(&mut reader, &start)? {
                        settings.insert(name, value);
                    }
                }
                Event::Eof => return Ok(settings),
                _ => {}
            }
            buf.clear();
        }
    }

    fn encode_settings_fragment(settings: &BTreeMap<UserSettingName, SettingValue>) -> String {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Start(BytesStart::new("UserSettings")))
            .unwrap();
        for (name, value) in settings {
            write_user_setting(&mut writer, *name, value).unwrap();
        }
        writer
            .write_event(Event::End(BytesEnd::new("UserSettings")))
            .unwrap();
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn decodes_scalar_settings() {
        let xml_text = r#"
            <UserSettings>
              <UserSetting i:type="StringSetting">
                <Name>InternalEwsUrl</Name>
                <Value>https://mail.example.com/EWS/Exchange.asmx</Value>
              </UserSetting>
              <UserSetting i:type="IntegerSetting">
                <Name>AutodiscoverTtl</Name>
                <Value>24</Value>
              </UserSetting>
              <UserSetting i:type="BooleanSetting">
                <Name>CrossOrganizationSharingEnabled</Name>
                <Value>true</Value>
              </UserSetting>
            </UserSettings>"#;

        let settings = parse_settings_fragment(xml_text).unwrap();
        assert_eq!(
            settings.get(&UserSettingName::InternalEwsUrl),
            Some(&SettingValue::String(
                "https://mail.example.com/EWS/Exchange.asmx".to_string()
            ))
        );
        assert_eq!(
            settings.get(&UserSettingName::AutodiscoverTtl),
            Some(&SettingValue::Integer(24))
        );
        assert_eq!(
            settings.get(&UserSettingName::CrossOrganizationSharingEnabled),
            Some(&SettingValue::Boolean(true))
        );
    }

    #[test]
    fn unknown_type_tag_is_fatal() {
        let xml_text = r#"
            <UserSettings>
              <UserSetting i:type="QuantumSetting">
                <Name>InternalEwsUrl</Name>
                <Value>whatever</Value>
              </UserSetting>
            </UserSettings>"#;

        let err = parse_settings_fragment(xml_text).unwrap_err();
        assert!(matches!(err, AutodiscoverError::ProtocolViolation(_)));
    }

    #[test]
    fn unknown_setting_name_is_dropped_but_siblings_survive() {
        let xml_text = r#"
            <UserSettings>
              <UserSetting i:type="StringSetting">
                <Name>SomeFutureSetting</Name>
                <Value>ignored</Value>
              </UserSetting>
              <UserSetting i:type="StringSetting">
                <Name>ExternalEwsUrl</Name>
                <Value>https://mail.example.com/ews</Value>
              </UserSetting>
            </UserSettings>"#;

        let settings = parse_settings_fragment(xml_text).unwrap();
        assert_eq!(settings.len(), 1);
        assert!(settings.contains_key(&UserSettingName::ExternalEwsUrl));
    }

    #[test]
    fn unknown_sibling_elements_are_skipped() {
        let xml_text = r#"
            <UserSettings>
              <UserSetting i:type="StringSetting">
                <Name>UserDisplayName</Name>
                <FutureField><Nested>x</Nested></FutureField>
                <Value>Jane Doe</Value>
              </UserSetting>
            </UserSettings>"#;

        let settings = parse_settings_fragment(xml_text).unwrap();
        assert_eq!(
            settings.get(&UserSettingName::UserDisplayName),
            Some(&SettingValue::String("Jane Doe".to_string()))
        );
    }

    #[test]
    fn mixed_variant_round_trip() {
        let mut settings = BTreeMap::new();
        settings.insert(
            UserSettingName::InternalEwsUrl,
            SettingValue::String("https://mail.example.com/EWS/Exchange.asmx".to_string()),
        );
        settings.insert(
            UserSettingName::InternalWebClientUrls,
            SettingValue::WebClientUrls(vec![
                WebClientUrl {
                    url: "https://mail.example.com/owa".to_string(),
                },
                WebClientUrl {
                    url: "https://backup.example.com/owa".to_string(),
                },
            ]),
        );
        settings.insert(
            UserSettingName::InternalImap4Connections,
            SettingValue::ProtocolConnections(vec![ProtocolConnection {
                encryption_method: "SSL".to_string(),
                hostname: "imap.example.com".to_string(),
                port: 993,
            }]),
        );
        settings.insert(
            UserSettingName::AlternateMailboxes,
            SettingValue::AlternateMailboxes(vec![AlternateMailbox {
                mailbox_type: "Archive".to_string(),
                display_name: "Online Archive - Jane".to_string(),
                legacy_dn: "/o=Example/ou=First/cn=Recipients/cn=jane-archive".to_string(),
                server: "mail.example.com".to_string(),
                smtp_address: Some("jane.archive@example.com".to_string()),
            }]),
        );
        settings.insert(
            UserSettingName::DocumentSharingLocations,
            SettingValue::DocumentSharingLocations(vec![DocumentSharingLocation {
                service_url: "https://sharepoint.example.com/_vti_bin/".to_string(),
                location_url: "https://sharepoint.example.com/personal/jane".to_string(),
                display_name: "Jane's Site".to_string(),
                supported_file_extensions: vec!["docx".to_string(), "xlsx".to_string()],
                external_access_allowed: true,
                anonymous_access_allowed: false,
                can_modify_permissions: true,
                is_default: true,
            }]),
        );

        let encoded = encode_settings_fragment(&settings);
        let decoded = parse_settings_fragment(&encoded).unwrap();
        assert_eq!(decoded, settings);
    }

    #[test]
    fn domain_setting_round_trip() {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Start(BytesStart::new("DomainSettings")))
            .unwrap();
        write_domain_setting(
            &mut writer,
            DomainSettingName::ExternalEwsUrl,
            &SettingValue::String("https://mail.example.com/ews".to_string()),
        )
        .unwrap();
        writer
            .write_event(Event::End(BytesEnd::new("DomainSettings")))
            .unwrap();
        let xml_text = String::from_utf8(writer.into_inner()).unwrap();

        let mut reader = Reader::from_reader(xml_text.as_bytes());
        reader.trim_text(true);
        let mut decoded = None;
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) if e.local_name().as_ref() == b"DomainSetting" => {
                    let start = e.to_owned();
                    decoded = read_domain_setting(&mut reader, &start).unwrap();
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        assert_eq!(
            decoded,
            Some((
                DomainSettingName::ExternalEwsUrl,
                SettingValue::String("https://mail.example.com/ews".to_string())
            ))
        );
    }

    #[test]
    fn malformed_integer_is_a_protocol_violation() {
        let xml_text = r#"
            <UserSettings>
              <UserSetting i:type="IntegerSetting">
                <Name>AutodiscoverTtl</Name>
                <Value>soon</Value>
              </UserSetting>
            </UserSettings>"#;

        assert!(matches!(
            parse_settings_fragment(xml_text),
            Err(AutodiscoverError::ProtocolViolation(_))
        ));
    }
}
