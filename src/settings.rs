//! Setting name registries.
//!
//! The discovery protocol exposes two closed namespaces of setting
//! identifiers: one for per-user queries, one for per-domain queries. Wire
//! names are the variant names verbatim. The registry deliberately carries a
//! few names no standard provider supplies (`MobileMailboxPolicy`,
//! `SiteMailboxCreationURL`) so that requested-but-unsupported settings can
//! be exercised with real identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The shape of a setting's value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingKind {
    String,
    Integer,
    Boolean,
    WebClientUrlList,
    ProtocolConnectionList,
    AlternateMailboxList,
    DocumentSharingLocationList,
}

/// A setting name is not part of the registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown setting name: {0}")]
pub struct UnknownSettingName(pub String);

/// Per-user setting identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UserSettingName {
    UserDisplayName,
    UserDN,
    UserDeploymentId,
    InternalMailboxServer,
    InternalRpcClientServer,
    InternalEcpUrl,
    InternalEwsUrl,
    InternalOABUrl,
    InternalUMUrl,
    InternalWebClientUrls,
    ExternalMailboxServer,
    ExternalMailboxServerRequiresSSL,
    ExternalEcpUrl,
    ExternalEwsUrl,
    ExternalOABUrl,
    ExternalUMUrl,
    ExternalWebClientUrls,
    EwsSupportedSchemas,
    ExternalEwsVersion,
    CasVersion,
    MailboxDN,
    PublicFolderServer,
    ActiveDirectoryServer,
    GroupingInformation,
    CrossOrganizationSharingEnabled,
    InternalServerExclusiveConnect,
    ExternalServerExclusiveConnect,
    AutodiscoverTtl,
    InternalPop3Connections,
    InternalImap4Connections,
    InternalSmtpConnections,
    ExternalPop3Connections,
    ExternalImap4Connections,
    ExternalSmtpConnections,
    AlternateMailboxes,
    DocumentSharingLocations,
    MobileMailboxPolicy,
    SiteMailboxCreationURL,
}

impl UserSettingName {
    /// Every identifier in the per-user namespace.
    pub const ALL: &'static [UserSettingName] = &[
        UserSettingName::UserDisplayName,
        UserSettingName::UserDN,
        UserSettingName::UserDeploymentId,
        UserSettingName::InternalMailboxServer,
        UserSettingName::InternalRpcClientServer,
        UserSettingName::InternalEcpUrl,
        UserSettingName::InternalEwsUrl,
        UserSettingName::InternalOABUrl,
        UserSettingName::InternalUMUrl,
        UserSettingName::InternalWebClientUrls,
        UserSettingName::ExternalMailboxServer,
        UserSettingName::ExternalMailboxServerRequiresSSL,
        UserSettingName::ExternalEcpUrl,
        UserSettingName::ExternalEwsUrl,
        UserSettingName::ExternalOABUrl,
        UserSettingName::ExternalUMUrl,
        UserSettingName::ExternalWebClientUrls,
        UserSettingName::EwsSupportedSchemas,
        UserSettingName::ExternalEwsVersion,
        UserSettingName::CasVersion,
        UserSettingName::MailboxDN,
        UserSettingName::PublicFolderServer,
        UserSettingName::ActiveDirectoryServer,
        UserSettingName::GroupingInformation,
        UserSettingName::CrossOrganizationSharingEnabled,
        UserSettingName::InternalServerExclusiveConnect,
        UserSettingName::ExternalServerExclusiveConnect,
        UserSettingName::AutodiscoverTtl,
        UserSettingName::InternalPop3Connections,
        UserSettingName::InternalImap4Connections,
        UserSettingName::InternalSmtpConnections,
        UserSettingName::ExternalPop3Connections,
        UserSettingName::ExternalImap4Connections,
        UserSettingName::ExternalSmtpConnections,
        UserSettingName::AlternateMailboxes,
        UserSettingName::DocumentSharingLocations,
        UserSettingName::MobileMailboxPolicy,
        UserSettingName::SiteMailboxCreationURL,
    ];

    /// The wire token for this identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            UserSettingName::UserDisplayName => "UserDisplayName",
            UserSettingName::UserDN => "UserDN",
            UserSettingName::UserDeploymentId => "UserDeploymentId",
            UserSettingName::InternalMailboxServer => "InternalMailboxServer",
            UserSettingName::InternalRpcClientServer => "InternalRpcClientServer",
            UserSettingName::InternalEcpUrl => "InternalEcpUrl",
            UserSettingName::InternalEwsUrl => "InternalEwsUrl",
            UserSettingName::InternalOABUrl => "InternalOABUrl",
            UserSettingName::InternalUMUrl => "InternalUMUrl",
            UserSettingName::InternalWebClientUrls => "InternalWebClientUrls",
            UserSettingName::ExternalMailboxServer => "ExternalMailboxServer",
            UserSettingName::ExternalMailboxServerRequiresSSL => "ExternalMailboxServerRequiresSSL",
            UserSettingName::ExternalEcpUrl => "ExternalEcpUrl",
            UserSettingName::ExternalEwsUrl => "ExternalEwsUrl",
            UserSettingName::ExternalOABUrl => "ExternalOABUrl",
            UserSettingName::ExternalUMUrl => "ExternalUMUrl",
            UserSettingName::ExternalWebClientUrls => "ExternalWebClientUrls",
            UserSettingName::EwsSupportedSchemas => "EwsSupportedSchemas",
            UserSettingName::ExternalEwsVersion => "ExternalEwsVersion",
            UserSettingName::CasVersion => "CasVersion",
            UserSettingName::MailboxDN => "MailboxDN",
            UserSettingName::PublicFolderServer => "PublicFolderServer",
            UserSettingName::ActiveDirectoryServer => "ActiveDirectoryServer",
            UserSettingName::GroupingInformation => "GroupingInformation",
            UserSettingName::CrossOrganizationSharingEnabled => "CrossOrganizationSharingEnabled",
            UserSettingName::InternalServerExclusiveConnect => "InternalServerExclusiveConnect",
            UserSettingName::ExternalServerExclusiveConnect => "ExternalServerExclusiveConnect",
            UserSettingName::AutodiscoverTtl => "AutodiscoverTtl",
            UserSettingName::InternalPop3Connections => "InternalPop3Connections",
            UserSettingName::InternalImap4Connections => "InternalImap4Connections",
            UserSettingName::InternalSmtpConnections => "InternalSmtpConnections",
            UserSettingName::ExternalPop3Connections => "ExternalPop3Connections",
            UserSettingName::ExternalImap4Connections => "ExternalImap4Connections",
            UserSettingName::ExternalSmtpConnections => "ExternalSmtpConnections",
            UserSettingName::AlternateMailboxes => "AlternateMailboxes",
            UserSettingName::DocumentSharingLocations => "DocumentSharingLocations",
            UserSettingName::MobileMailboxPolicy => "MobileMailboxPolicy",
            UserSettingName::SiteMailboxCreationURL => "SiteMailboxCreationURL",
        }
    }

    /// The value shape this identifier carries.
    pub fn kind(&self) -> SettingKind {
        match self {
            UserSettingName::CrossOrganizationSharingEnabled
            | UserSettingName::ExternalMailboxServerRequiresSSL
            | UserSettingName::InternalServerExclusiveConnect
            | UserSettingName::ExternalServerExclusiveConnect => SettingKind::Boolean,
            UserSettingName::AutodiscoverTtl => SettingKind::Integer,
            UserSettingName::InternalWebClientUrls | UserSettingName::ExternalWebClientUrls => {
                SettingKind::WebClientUrlList
            }
            UserSettingName::InternalPop3Connections
            | UserSettingName::InternalImap4Connections
            | UserSettingName::InternalSmtpConnections
            | UserSettingName::ExternalPop3Connections
            | UserSettingName::ExternalImap4Connections
            | UserSettingName::ExternalSmtpConnections => SettingKind::ProtocolConnectionList,
            UserSettingName::AlternateMailboxes => SettingKind::AlternateMailboxList,
            UserSettingName::DocumentSharingLocations => SettingKind::DocumentSharingLocationList,
            _ => SettingKind::String,
        }
    }
}

impl fmt::Display for UserSettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserSettingName {
    type Err = UnknownSettingName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownSettingName(s.to_string()))
    }
}

/// Per-domain setting identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DomainSettingName {
    ExternalEwsUrl,
    ExternalEwsVersion,
}

impl DomainSettingName {
    /// Every identifier in the per-domain namespace.
    pub const ALL: &'static [DomainSettingName] = &[
        DomainSettingName::ExternalEwsUrl,
        DomainSettingName::ExternalEwsVersion,
    ];

    /// The wire token for this identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainSettingName::ExternalEwsUrl => "ExternalEwsUrl",
            DomainSettingName::ExternalEwsVersion => "ExternalEwsVersion",
        }
    }

    /// Domain settings are always plain strings on the wire.
    pub fn kind(&self) -> SettingKind {
        SettingKind::String
    }
}

impl fmt::Display for DomainSettingName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainSettingName {
    type Err = UnknownSettingName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownSettingName(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tokens_round_trip() {
        for name in UserSettingName::ALL {
            assert_eq!(name.as_str().parse::<UserSettingName>(), Ok(*name));
        }
        for name in DomainSettingName::ALL {
            assert_eq!(name.as_str().parse::<DomainSettingName>(), Ok(*name));
        }
    }

    #[test]
    fn tokens_are_unique_within_namespace() {
        let mut seen = std::collections::HashSet::new();
        for name in UserSettingName::ALL {
            assert!(seen.insert(name.as_str()), "duplicate token {}", name);
        }
    }

    #[test]
    fn unknown_token_is_rejected() {
        let err = "BogusSetting".parse::<UserSettingName>().unwrap_err();
        assert_eq!(err, UnknownSettingName("BogusSetting".to_string()));
        assert!("InternalEwsUrl".parse::<DomainSettingName>().is_err());
    }
}
