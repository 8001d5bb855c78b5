//! Request building and execution.
//!
//! Requests are validated before any network activity, serialized into the
//! SOAP body the discovery endpoint expects, executed in exactly one round
//! trip, and the parsed batch is post-processed to attach the queried
//! identities back onto the envelopes by position.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::response::{
    self, DomainResponseCollection, UserResponseCollection,
};
use crate::settings::{DomainSettingName, UserSettingName};
use crate::transport::Transport;
use crate::xml;
use crate::{AutodiscoverError, AutodiscoverResult};

pub(crate) const AUTODISCOVER_NS_URI: &str =
    "http://schemas.microsoft.com/exchange/2010/Autodiscover";
const SOAP_NS_URI: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const ADDRESSING_NS_URI: &str = "http://www.w3.org/2005/08/addressing";
const XSI_NS_URI: &str = "http://www.w3.org/2001/XMLSchema-instance";

const GET_USER_SETTINGS_ACTION: &str =
    "http://schemas.microsoft.com/exchange/2010/Autodiscover/Autodiscover/GetUserSettings";
const GET_DOMAIN_SETTINGS_ACTION: &str =
    "http://schemas.microsoft.com/exchange/2010/Autodiscover/Autodiscover/GetDomainSettings";

const REQUESTED_SERVER_VERSION: &str = "Exchange2013";

/// A batched per-user settings query.
#[derive(Debug, Clone)]
pub struct GetUserSettingsRequest {
    mailboxes: Vec<String>,
    settings: Vec<UserSettingName>,
}

impl GetUserSettingsRequest {
    pub fn new(
        mailboxes: Vec<String>,
        settings: Vec<UserSettingName>,
    ) -> AutodiscoverResult<Self> {
        validate(&mailboxes, settings.is_empty())?;
        Ok(Self {
            mailboxes,
            settings,
        })
    }

    pub fn mailboxes(&self) -> &[String] {
        &self.mailboxes
    }

    pub fn settings(&self) -> &[UserSettingName] {
        &self.settings
    }

    /// Serializes the SOAP request body for the given endpoint.
    pub fn to_soap(&self, endpoint: &Url) -> AutodiscoverResult<Vec<u8>> {
        soap_envelope(endpoint, GET_USER_SETTINGS_ACTION, |writer| {
            writer.write_event(Event::Start(BytesStart::new(
                "a:GetUserSettingsRequestMessage",
            )))?;
            writer.write_event(Event::Start(BytesStart::new("a:Request")))?;

            writer.write_event(Event::Start(BytesStart::new("a:Users")))?;
            for mailbox in &self.mailboxes {
                writer.write_event(Event::Start(BytesStart::new("a:User")))?;
                xml::write_text_element(writer, "a:Mailbox", mailbox)?;
                writer.write_event(Event::End(BytesEnd::new("a:User")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("a:Users")))?;

            writer.write_event(Event::Start(BytesStart::new("a:RequestedSettings")))?;
            for setting in &self.settings {
                xml::write_text_element(writer, "a:Setting", setting.as_str())?;
            }
            writer.write_event(Event::End(BytesEnd::new("a:RequestedSettings")))?;

            writer.write_event(Event::End(BytesEnd::new("a:Request")))?;
            writer.write_event(Event::End(BytesEnd::new("a:GetUserSettingsRequestMessage")))
        })
    }

    /// Performs one round trip and returns the post-processed batch.
    ///
    /// Cancelling the token abandons the in-flight request; no partial
    /// envelope is returned.
    pub async fn execute(
        &self,
        transport: &dyn Transport,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> AutodiscoverResult<UserResponseCollection> {
        let body = self.to_soap(endpoint)?;
        log::debug!(
            "GetUserSettings for {} mailbox(es) against {}",
            self.mailboxes.len(),
            endpoint
        );

        let response_body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AutodiscoverError::Cancelled),
            result = transport.send(endpoint, GET_USER_SETTINGS_ACTION, body) => result?,
        };

        let mut collection = response::parse_user_response_collection(&response_body)?;
        collection.attach_subjects(&self.mailboxes);
        Ok(collection)
    }
}

/// A batched per-domain settings query.
#[derive(Debug, Clone)]
pub struct GetDomainSettingsRequest {
    domains: Vec<String>,
    settings: Vec<DomainSettingName>,
}

impl GetDomainSettingsRequest {
    pub fn new(
        domains: Vec<String>,
        settings: Vec<DomainSettingName>,
    ) -> AutodiscoverResult<Self> {
        validate(&domains, settings.is_empty())?;
        Ok(Self { domains, settings })
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn settings(&self) -> &[DomainSettingName] {
        &self.settings
    }

    pub fn to_soap(&self, endpoint: &Url) -> AutodiscoverResult<Vec<u8>> {
        soap_envelope(endpoint, GET_DOMAIN_SETTINGS_ACTION, |writer| {
            writer.write_event(Event::Start(BytesStart::new(
                "a:GetDomainSettingsRequestMessage",
            )))?;
            writer.write_event(Event::Start(BytesStart::new("a:Request")))?;

            writer.write_event(Event::Start(BytesStart::new("a:Domains")))?;
            for domain in &self.domains {
                xml::write_text_element(writer, "a:Domain", domain)?;
            }
            writer.write_event(Event::End(BytesEnd::new("a:Domains")))?;

            writer.write_event(Event::Start(BytesStart::new("a:RequestedSettings")))?;
            for setting in &self.settings {
                xml::write_text_element(writer, "a:Setting", setting.as_str())?;
            }
            writer.write_event(Event::End(BytesEnd::new("a:RequestedSettings")))?;

            writer.write_event(Event::End(BytesEnd::new("a:Request")))?;
            writer.write_event(Event::End(BytesEnd::new(
                "a:GetDomainSettingsRequestMessage",
            )))
        })
    }

    pub async fn execute(
        &self,
        transport: &dyn Transport,
        endpoint: &Url,
        cancel: &CancellationToken,
    ) -> AutodiscoverResult<DomainResponseCollection> {
        let body = self.to_soap(endpoint)?;
        log::debug!(
            "GetDomainSettings for {} domain(s) against {}",
            self.domains.len(),
            endpoint
        );

        let response_body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AutodiscoverError::Cancelled),
            result = transport.send(endpoint, GET_DOMAIN_SETTINGS_ACTION, body) => result?,
        };

        let mut collection = response::parse_domain_response_collection(&response_body)?;
        collection.attach_subjects(&self.domains);
        Ok(collection)
    }
}

fn validate(identities: &[String], no_settings: bool) -> AutodiscoverResult<()> {
    if no_settings {
        return Err(AutodiscoverError::NoSettingsRequested);
    }
    if identities.is_empty() {
        return Err(AutodiscoverError::NoIdentities);
    }
    if identities.iter().any(|identity| identity.trim().is_empty()) {
        return Err(AutodiscoverError::BlankIdentity);
    }
    Ok(())
}

fn soap_envelope<F>(endpoint: &Url, action: &str, write_body: F) -> AutodiscoverResult<Vec<u8>>
where
    F: FnOnce(&mut Writer<Vec<u8>>) -> Result<(), quick_xml::Error>,
{
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("soap:Envelope").with_attributes([
        ("xmlns:soap", SOAP_NS_URI),
        ("xmlns:a", AUTODISCOVER_NS_URI),
        ("xmlns:wsa", ADDRESSING_NS_URI),
        ("xmlns:i", XSI_NS_URI),
    ])))?;

    writer.write_event(Event::Start(BytesStart::new("soap:Header")))?;
    xml::write_text_element(&mut writer, "a:RequestedServerVersion", REQUESTED_SERVER_VERSION)?;
    xml::write_text_element(&mut writer, "wsa:Action", action)?;
    xml::write_text_element(&mut writer, "wsa:To", endpoint.as_str())?;
    writer.write_event(Event::End(BytesEnd::new("soap:Header")))?;

    writer.write_event(Event::Start(BytesStart::new("soap:Body")))?;
    write_body(&mut writer)?;
    writer.write_event(Event::End(BytesEnd::new("soap:Body")))?;
    writer.write_event(Event::End(BytesEnd::new("soap:Envelope")))?;

    Ok(writer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint() -> Url {
        Url::parse("https://autodiscover.example.com/autodiscover/autodiscover.svc").unwrap()
    }

    #[test]
    fn rejects_empty_settings() {
        let result = GetUserSettingsRequest::new(vec!["jane@example.com".to_string()], vec![]);
        assert!(matches!(result, Err(AutodiscoverError::NoSettingsRequested)));
    }

    #[test]
    fn rejects_empty_identity_list() {
        let result =
            GetUserSettingsRequest::new(vec![], vec![UserSettingName::InternalEwsUrl]);
        assert!(matches!(result, Err(AutodiscoverError::NoIdentities)));
    }

    #[test]
    fn rejects_blank_identity() {
        let result = GetUserSettingsRequest::new(
            vec!["jane@example.com".to_string(), "   ".to_string()],
            vec![UserSettingName::InternalEwsUrl],
        );
        assert!(matches!(result, Err(AutodiscoverError::BlankIdentity)));

        let result = GetDomainSettingsRequest::new(
            vec!["".to_string()],
            vec![DomainSettingName::ExternalEwsUrl],
        );
        assert!(matches!(result, Err(AutodiscoverError::BlankIdentity)));
    }

    #[test]
    fn user_request_body_carries_mailboxes_and_settings() {
        let request = GetUserSettingsRequest::new(
            vec!["jane@example.com".to_string(), "joe@example.com".to_string()],
            vec![
                UserSettingName::InternalEwsUrl,
                UserSettingName::ExternalEwsUrl,
            ],
        )
        .unwrap();

        let body = String::from_utf8(request.to_soap(&endpoint()).unwrap()).unwrap();
        assert!(body.contains("<a:GetUserSettingsRequestMessage>"));
        assert!(body.contains("<a:Mailbox>jane@example.com</a:Mailbox>"));
        assert!(body.contains("<a:Mailbox>joe@example.com</a:Mailbox>"));
        assert!(body.contains("<a:Setting>InternalEwsUrl</a:Setting>"));
        assert!(body.contains("<a:Setting>ExternalEwsUrl</a:Setting>"));
        assert!(body.contains(
            "<wsa:To>https://autodiscover.example.com/autodiscover/autodiscover.svc</wsa:To>"
        ));
    }

    #[test]
    fn domain_request_body_carries_domains() {
        let request = GetDomainSettingsRequest::new(
            vec!["example.com".to_string()],
            vec![DomainSettingName::ExternalEwsUrl],
        )
        .unwrap();

        let body = String::from_utf8(request.to_soap(&endpoint()).unwrap()).unwrap();
        assert!(body.contains("<a:GetDomainSettingsRequestMessage>"));
        assert!(body.contains("<a:Domain>example.com</a:Domain>"));
        assert!(body.contains("<a:Setting>ExternalEwsUrl</a:Setting>"));
    }

    #[tokio::test]
    async fn execute_parses_settings_and_attaches_subject() {
        use crate::response::Outcome;
        use crate::transport::HttpTransport;
        use crate::values::SettingValue;
        use mockito::Server;

        let response_body = r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <GetUserSettingsResponseMessage xmlns="http://schemas.microsoft.com/exchange/2010/Autodiscover">
      <Response>
        <ErrorCode>NoError</ErrorCode>
        <UserResponses>
          <UserResponse>
            <ErrorCode>NoError</ErrorCode>
            <ErrorMessage>No error.</ErrorMessage>
            <UserSettingErrors>
              <UserSettingError>
                <ErrorCode>InvalidSetting</ErrorCode>
                <ErrorMessage>The requested setting is invalid.</ErrorMessage>
                <SettingName>MobileMailboxPolicy</SettingName>
              </UserSettingError>
            </UserSettingErrors>
            <UserSettings>
              <UserSetting i:type="StringSetting" xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
                <Name>InternalEwsUrl</Name>
                <Value>https://mail.example.com/EWS/Exchange.asmx</Value>
              </UserSetting>
              <UserSetting i:type="StringSetting" xmlns:i="http://www.w3.org/2001/XMLSchema-instance">
                <Name>ExternalEwsUrl</Name>
                <Value>https://mail.example.com/ews</Value>
              </UserSetting>
            </UserSettings>
          </UserResponse>
        </UserResponses>
      </Response>
    </GetUserSettingsResponseMessage>
  </s:Body>
</s:Envelope>"#;

        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/autodiscover/autodiscover.svc")
            .with_status(200)
            .with_header("content-type", "text/xml; charset=utf-8")
            .with_body(response_body)
            .create_async()
            .await;

        let endpoint =
            Url::parse(&format!("{}/autodiscover/autodiscover.svc", server.url())).unwrap();
        let transport = HttpTransport::new().unwrap();
        let request = GetUserSettingsRequest::new(
            vec!["a@example.com".to_string()],
            vec![
                UserSettingName::InternalEwsUrl,
                UserSettingName::ExternalEwsUrl,
                UserSettingName::MobileMailboxPolicy,
            ],
        )
        .unwrap();

        let collection = request
            .execute(&transport, &endpoint, &CancellationToken::new())
            .await
            .unwrap();

        let response = &collection.responses()[0];
        assert_eq!(response.subject(), Some("a@example.com"));
        assert_eq!(response.outcome, Outcome::Success);
        assert_eq!(
            response.setting(UserSettingName::InternalEwsUrl),
            Some(&SettingValue::String(
                "https://mail.example.com/EWS/Exchange.asmx".to_string()
            ))
        );
        assert_eq!(
            response.setting(UserSettingName::ExternalEwsUrl),
            Some(&SettingValue::String("https://mail.example.com/ews".to_string()))
        );
        assert_eq!(response.setting_errors.len(), 1);
        assert_eq!(response.setting_errors[0].setting_name, "MobileMailboxPolicy");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn cancelled_token_aborts_before_any_envelope() {
        use crate::transport::{Transport, TransportError};
        use async_trait::async_trait;

        struct NeverTransport;

        #[async_trait]
        impl Transport for NeverTransport {
            async fn send(
                &self,
                _endpoint: &Url,
                _soap_action: &str,
                _body: Vec<u8>,
            ) -> Result<String, TransportError> {
                std::future::pending().await
            }
        }

        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = GetUserSettingsRequest::new(
            vec!["a@example.com".to_string()],
            vec![UserSettingName::InternalEwsUrl],
        )
        .unwrap();

        let err = request
            .execute(&NeverTransport, &endpoint(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AutodiscoverError::Cancelled));
    }
}
