//! Provider merge engine.
//!
//! A provider (e.g. "Outlook") is a fixed feature set assembled from
//! sub-catalogs, each owning a closed set of setting identifiers and knowing
//! how to pull their values out of the raw per-user data. The union of the
//! catalog sets is computed once per provider instance and cached; requested
//! identifiers outside the union are reported as per-setting errors, never
//! silently dropped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::response::{ErrorCode, SettingError};
use crate::settings::{DomainSettingName, UserSettingName};
use crate::values::{
    AlternateMailbox, DocumentSharingLocation, ProtocolConnection, SettingValue, WebClientUrl,
};

/// Raw per-user data a provider draws setting values from.
///
/// `None`/empty fields simply produce no entry in the settings map; that is
/// distinct from a requested-but-unsupported setting, which produces an
/// error entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxData {
    pub display_name: Option<String>,
    pub legacy_dn: Option<String>,
    pub deployment_id: Option<String>,
    pub autodiscover_ttl: Option<i32>,
    pub cross_organization_sharing_enabled: Option<bool>,
    pub ews_supported_schemas: Option<String>,
    pub external_ews_version: Option<String>,
    pub cas_version: Option<String>,
    pub mailbox_dn: Option<String>,
    pub public_folder_server: Option<String>,
    pub active_directory_server: Option<String>,
    pub grouping_information: Option<String>,
    pub internal: EndpointData,
    pub external: EndpointData,
    pub alternate_mailboxes: Vec<AlternateMailbox>,
    pub document_sharing_locations: Vec<DocumentSharingLocation>,
}

/// One side (internal or external) of the user's endpoint topology.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointData {
    pub mailbox_server: Option<String>,
    pub mailbox_server_requires_ssl: Option<bool>,
    pub rpc_client_server: Option<String>,
    pub ecp_url: Option<String>,
    pub ews_url: Option<String>,
    pub oab_url: Option<String>,
    pub um_url: Option<String>,
    pub exclusive_connect: Option<bool>,
    pub web_client_urls: Vec<WebClientUrl>,
    pub pop3_connections: Vec<ProtocolConnection>,
    pub imap4_connections: Vec<ProtocolConnection>,
    pub smtp_connections: Vec<ProtocolConnection>,
}

/// Raw per-domain data for domain-level queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainData {
    pub external_ews_url: Option<String>,
    pub external_ews_version: Option<String>,
}

/// A sub-provider: a closed set of identifiers plus the lookup for each.
pub trait SettingCatalog: Send + Sync {
    /// Catalog name, for diagnostics.
    fn name(&self) -> &'static str;

    /// The closed set of identifiers this catalog can supply.
    fn supported(&self) -> &'static [UserSettingName];

    /// Looks up one setting. `None` means the data source has no value.
    fn get(&self, name: UserSettingName, data: &MailboxData) -> Option<SettingValue>;
}

/// A service provider: a named assembly of setting catalogs.
pub struct Provider {
    name: String,
    catalogs: Vec<Box<dyn SettingCatalog>>,
    supported: OnceLock<BTreeSet<UserSettingName>>,
}

impl Provider {
    pub fn new(name: impl Into<String>, catalogs: Vec<Box<dyn SettingCatalog>>) -> Self {
        Self {
            name: name.into(),
            catalogs,
            supported: OnceLock::new(),
        }
    }

    /// The standard "Outlook" assembly: user identity, endpoint topology,
    /// protocol connections, alternate mailboxes and document sharing.
    pub fn outlook() -> Self {
        Self::new(
            "Outlook",
            vec![
                Box::new(UserCatalog),
                Box::new(MailboxCatalog),
                Box::new(ProtocolCatalog),
                Box::new(AlternateMailboxCatalog),
                Box::new(DocumentSharingCatalog),
            ],
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Union of the catalog sets, computed once and cached. Safe for
    /// concurrent first-time access; immutable afterwards.
    pub fn supported(&self) -> &BTreeSet<UserSettingName> {
        self.supported.get_or_init(|| {
            self.catalogs
                .iter()
                .flat_map(|catalog| catalog.supported().iter().copied())
                .collect()
        })
    }

    pub fn supports(&self, name: UserSettingName) -> bool {
        self.supported().contains(&name)
    }

    /// Converts raw mailbox data into the response's settings map, reporting
    /// every requested-but-unsupported identifier as a setting error. The
    /// error list follows the request order.
    pub fn convert(
        &self,
        requested: &[UserSettingName],
        data: &MailboxData,
    ) -> (BTreeMap<UserSettingName, SettingValue>, Vec<SettingError>) {
        let mut settings = BTreeMap::new();
        let mut errors = Vec::new();

        for &name in requested {
            if self.supports(name) {
                if let Some(value) = self.lookup(name, data) {
                    settings.insert(name, value);
                }
            } else {
                errors.push(SettingError {
                    setting_name: name.to_string(),
                    error_code: ErrorCode::InvalidSetting,
                    message: format!(
                        "The setting {} is not supported by the {} provider.",
                        name, self.name
                    ),
                });
            }
        }

        (settings, errors)
    }

    /// Converts raw domain data for a domain-level query.
    pub fn convert_domain(
        &self,
        requested: &[DomainSettingName],
        data: &DomainData,
    ) -> (BTreeMap<DomainSettingName, SettingValue>, Vec<SettingError>) {
        let mut settings = BTreeMap::new();
        let errors = Vec::new();

        for &name in requested {
            let value = match name {
                DomainSettingName::ExternalEwsUrl => data.external_ews_url.clone(),
                DomainSettingName::ExternalEwsVersion => data.external_ews_version.clone(),
            };
            if let Some(value) = value {
                settings.insert(name, SettingValue::String(value));
            }
        }

        (settings, errors)
    }

    fn lookup(&self, name: UserSettingName, data: &MailboxData) -> Option<SettingValue> {
        self.catalogs
            .iter()
            .find(|catalog| catalog.supported().contains(&name))
            .and_then(|catalog| catalog.get(name, data))
    }
}

/// User identity settings.
struct UserCatalog;

impl SettingCatalog for UserCatalog {
    fn name(&self) -> &'static str {
        "user"
    }

    fn supported(&self) -> &'static [UserSettingName] {
        &[
            UserSettingName::UserDisplayName,
            UserSettingName::UserDN,
            UserSettingName::UserDeploymentId,
            UserSettingName::AutodiscoverTtl,
            UserSettingName::CrossOrganizationSharingEnabled,
        ]
    }

    fn get(&self, name: UserSettingName, data: &MailboxData) -> Option<SettingValue> {
        match name {
            UserSettingName::UserDisplayName => {
                data.display_name.clone().map(SettingValue::String)
            }
            UserSettingName::UserDN => data.legacy_dn.clone().map(SettingValue::String),
            UserSettingName::UserDeploymentId => {
                data.deployment_id.clone().map(SettingValue::String)
            }
            UserSettingName::AutodiscoverTtl => {
                data.autodiscover_ttl.map(SettingValue::Integer)
            }
            UserSettingName::CrossOrganizationSharingEnabled => data
                .cross_organization_sharing_enabled
                .map(SettingValue::Boolean),
            _ => None,
        }
    }
}

/// Mailbox endpoint topology: servers, service URLs, web client URLs.
struct MailboxCatalog;

impl SettingCatalog for MailboxCatalog {
    fn name(&self) -> &'static str {
        "mailbox"
    }

    fn supported(&self) -> &'static [UserSettingName] {
        &[
            UserSettingName::InternalMailboxServer,
            UserSettingName::InternalRpcClientServer,
            UserSettingName::InternalEcpUrl,
            UserSettingName::InternalEwsUrl,
            UserSettingName::InternalOABUrl,
            UserSettingName::InternalUMUrl,
            UserSettingName::InternalWebClientUrls,
            UserSettingName::InternalServerExclusiveConnect,
            UserSettingName::ExternalMailboxServer,
            UserSettingName::ExternalMailboxServerRequiresSSL,
            UserSettingName::ExternalEcpUrl,
            UserSettingName::ExternalEwsUrl,
            UserSettingName::ExternalOABUrl,
            UserSettingName::ExternalUMUrl,
            UserSettingName::ExternalWebClientUrls,
            UserSettingName::ExternalServerExclusiveConnect,
            UserSettingName::EwsSupportedSchemas,
            UserSettingName::ExternalEwsVersion,
            UserSettingName::CasVersion,
            UserSettingName::MailboxDN,
            UserSettingName::PublicFolderServer,
            UserSettingName::ActiveDirectoryServer,
            UserSettingName::GroupingInformation,
        ]
    }

    fn get(&self, name: UserSettingName, data: &MailboxData) -> Option<SettingValue> {
        let string = |value: &Option<String>| value.clone().map(SettingValue::String);
        match name {
            UserSettingName::InternalMailboxServer => string(&data.internal.mailbox_server),
            UserSettingName::InternalRpcClientServer => string(&data.internal.rpc_client_server),
            UserSettingName::InternalEcpUrl => string(&data.internal.ecp_url),
            UserSettingName::InternalEwsUrl => string(&data.internal.ews_url),
            UserSettingName::InternalOABUrl => string(&data.internal.oab_url),
            UserSettingName::InternalUMUrl => string(&data.internal.um_url),
            UserSettingName::InternalWebClientUrls => {
                non_empty(&data.internal.web_client_urls).map(SettingValue::WebClientUrls)
            }
            UserSettingName::InternalServerExclusiveConnect => {
                data.internal.exclusive_connect.map(SettingValue::Boolean)
            }
            UserSettingName::ExternalMailboxServer => string(&data.external.mailbox_server),
            UserSettingName::ExternalMailboxServerRequiresSSL => data
                .external
                .mailbox_server_requires_ssl
                .map(SettingValue::Boolean),
            UserSettingName::ExternalEcpUrl => string(&data.external.ecp_url),
            UserSettingName::ExternalEwsUrl => string(&data.external.ews_url),
            UserSettingName::ExternalOABUrl => string(&data.external.oab_url),
            UserSettingName::ExternalUMUrl => string(&data.external.um_url),
            UserSettingName::ExternalWebClientUrls => {
                non_empty(&data.external.web_client_urls).map(SettingValue::WebClientUrls)
            }
            UserSettingName::ExternalServerExclusiveConnect => {
                data.external.exclusive_connect.map(SettingValue::Boolean)
            }
            UserSettingName::EwsSupportedSchemas => string(&data.ews_supported_schemas),
            UserSettingName::ExternalEwsVersion => string(&data.external_ews_version),
            UserSettingName::CasVersion => string(&data.cas_version),
            UserSettingName::MailboxDN => string(&data.mailbox_dn),
            UserSettingName::PublicFolderServer => string(&data.public_folder_server),
            UserSettingName::ActiveDirectoryServer => string(&data.active_directory_server),
            UserSettingName::GroupingInformation => string(&data.grouping_information),
            _ => None,
        }
    }
}

/// POP3/IMAP4/SMTP connection lists.
struct ProtocolCatalog;

impl SettingCatalog for ProtocolCatalog {
    fn name(&self) -> &'static str {
        "protocol"
    }

    fn supported(&self) -> &'static [UserSettingName] {
        &[
            UserSettingName::InternalPop3Connections,
            UserSettingName::InternalImap4Connections,
            UserSettingName::InternalSmtpConnections,
            UserSettingName::ExternalPop3Connections,
            UserSettingName::ExternalImap4Connections,
            UserSettingName::ExternalSmtpConnections,
        ]
    }

    fn get(&self, name: UserSettingName, data: &MailboxData) -> Option<SettingValue> {
        let connections = match name {
            UserSettingName::InternalPop3Connections => &data.internal.pop3_connections,
            UserSettingName::InternalImap4Connections => &data.internal.imap4_connections,
            UserSettingName::InternalSmtpConnections => &data.internal.smtp_connections,
            UserSettingName::ExternalPop3Connections => &data.external.pop3_connections,
            UserSettingName::ExternalImap4Connections => &data.external.imap4_connections,
            UserSettingName::ExternalSmtpConnections => &data.external.smtp_connections,
            _ => return None,
        };
        non_empty(connections).map(SettingValue::ProtocolConnections)
    }
}

/// Alternate (archive/shared) mailboxes.
struct AlternateMailboxCatalog;

impl SettingCatalog for AlternateMailboxCatalog {
    fn name(&self) -> &'static str {
        "alternate-mailboxes"
    }

    fn supported(&self) -> &'static [UserSettingName] {
        &[UserSettingName::AlternateMailboxes]
    }

    fn get(&self, name: UserSettingName, data: &MailboxData) -> Option<SettingValue> {
        match name {
            UserSettingName::AlternateMailboxes => {
                non_empty(&data.alternate_mailboxes).map(SettingValue::AlternateMailboxes)
            }
            _ => None,
        }
    }
}

/// Document sharing locations.
struct DocumentSharingCatalog;

impl SettingCatalog for DocumentSharingCatalog {
    fn name(&self) -> &'static str {
        "document-sharing"
    }

    fn supported(&self) -> &'static [UserSettingName] {
        &[UserSettingName::DocumentSharingLocations]
    }

    fn get(&self, name: UserSettingName, data: &MailboxData) -> Option<SettingValue> {
        match name {
            UserSettingName::DocumentSharingLocations => non_empty(
                &data.document_sharing_locations,
            )
            .map(SettingValue::DocumentSharingLocations),
            _ => None,
        }
    }
}

fn non_empty<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_data() -> MailboxData {
        MailboxData {
            display_name: Some("Jane Doe".to_string()),
            internal: EndpointData {
                ews_url: Some("https://mail.example.com/EWS/Exchange.asmx".to_string()),
                ..Default::default()
            },
            external: EndpointData {
                ews_url: Some("https://mail.example.com/ews".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn supported_set_is_union_of_catalogs() {
        let provider = Provider::outlook();
        assert!(provider.supports(UserSettingName::UserDisplayName));
        assert!(provider.supports(UserSettingName::InternalEwsUrl));
        assert!(provider.supports(UserSettingName::ExternalSmtpConnections));
        assert!(provider.supports(UserSettingName::AlternateMailboxes));
        assert!(provider.supports(UserSettingName::DocumentSharingLocations));
        // In the registry, but no catalog supplies them.
        assert!(!provider.supports(UserSettingName::MobileMailboxPolicy));
        assert!(!provider.supports(UserSettingName::SiteMailboxCreationURL));
    }

    #[test]
    fn supported_set_is_computed_once() {
        let provider = Provider::outlook();
        let first = provider.supported() as *const _;
        let second = provider.supported() as *const _;
        assert_eq!(first, second);
    }

    #[test]
    fn convert_splits_supported_and_unsupported() {
        let provider = Provider::outlook();
        let requested = [
            UserSettingName::InternalEwsUrl,
            UserSettingName::ExternalEwsUrl,
            UserSettingName::MobileMailboxPolicy,
        ];

        let (settings, errors) = provider.convert(&requested, &sample_data());

        assert_eq!(settings.len(), 2);
        assert!(settings.contains_key(&UserSettingName::InternalEwsUrl));
        assert!(settings.contains_key(&UserSettingName::ExternalEwsUrl));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].setting_name, "MobileMailboxPolicy");
        assert_eq!(errors[0].error_code, ErrorCode::InvalidSetting);
    }

    #[test]
    fn error_list_preserves_request_order() {
        let provider = Provider::outlook();
        let requested = [
            UserSettingName::SiteMailboxCreationURL,
            UserSettingName::InternalEwsUrl,
            UserSettingName::MobileMailboxPolicy,
        ];

        let (_, errors) = provider.convert(&requested, &sample_data());

        let names: Vec<_> = errors.iter().map(|e| e.setting_name.as_str()).collect();
        assert_eq!(names, ["SiteMailboxCreationURL", "MobileMailboxPolicy"]);
    }

    #[test]
    fn missing_data_yields_absent_key_not_error() {
        let provider = Provider::outlook();
        let requested = [UserSettingName::PublicFolderServer];

        let (settings, errors) = provider.convert(&requested, &MailboxData::default());

        assert!(settings.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn alternate_provider_assembly_changes_support() {
        let provider = Provider::new("minimal", vec![Box::new(UserCatalog)]);
        assert!(provider.supports(UserSettingName::UserDisplayName));
        assert!(!provider.supports(UserSettingName::InternalEwsUrl));

        let (settings, errors) =
            provider.convert(&[UserSettingName::InternalEwsUrl], &sample_data());
        assert!(settings.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn convert_domain_reads_domain_data() {
        let provider = Provider::outlook();
        let data = DomainData {
            external_ews_url: Some("https://mail.example.com/ews".to_string()),
            external_ews_version: None,
        };

        let (settings, errors) = provider.convert_domain(
            &[
                DomainSettingName::ExternalEwsUrl,
                DomainSettingName::ExternalEwsVersion,
            ],
            &data,
        );

        assert_eq!(settings.len(), 1);
        assert_eq!(
            settings.get(&DomainSettingName::ExternalEwsUrl),
            Some(&SettingValue::String("https://mail.example.com/ews".to_string()))
        );
        assert!(errors.is_empty());
    }
}
