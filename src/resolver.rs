//! Redirect resolution loop.
//!
//! A discovery response may point at a different mailbox address or a
//! different endpoint. The resolver re-issues the request for each hop,
//! sequentially, under a caller-supplied hop bound and with detection of
//! already-visited endpoint/address pairs. Hitting either limit is a
//! failure, never a silent truncation.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::request::{GetDomainSettingsRequest, GetUserSettingsRequest};
use crate::response::{DomainResponse, Outcome, UserResponse};
use crate::settings::{DomainSettingName, UserSettingName};
use crate::transport::Transport;
use crate::{AutodiscoverError, AutodiscoverResult};

/// Bounds for the redirect loop.
#[derive(Debug, Clone, Copy)]
pub struct RedirectPolicy {
    pub max_hops: usize,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self { max_hops: 10 }
    }
}

/// Follows discovery redirects until a terminal envelope is reached.
pub struct SettingsResolver {
    transport: Arc<dyn Transport>,
    policy: RedirectPolicy,
}

impl SettingsResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_policy(transport, RedirectPolicy::default())
    }

    pub fn with_policy(transport: Arc<dyn Transport>, policy: RedirectPolicy) -> Self {
        Self { transport, policy }
    }

    /// Discovery endpoints conventionally tried for a mail domain, most
    /// specific first.
    pub fn candidate_endpoints(domain: &str) -> Vec<Url> {
        [
            format!("https://autodiscover.{domain}/autodiscover/autodiscover.svc"),
            format!("https://{domain}/autodiscover/autodiscover.svc"),
        ]
        .iter()
        .filter_map(|candidate| Url::parse(candidate).ok())
        .collect()
    }

    /// Resolves settings for one mailbox, following redirects.
    ///
    /// Success and Error envelopes are both terminal: protocol-level errors
    /// are data for the caller to branch on, not control flow here.
    pub async fn resolve_user_settings(
        &self,
        endpoint: Url,
        mailbox: &str,
        settings: &[UserSettingName],
        cancel: &CancellationToken,
    ) -> AutodiscoverResult<UserResponse> {
        let mut endpoint = endpoint;
        let mut mailbox = mailbox.to_string();
        let mut visited = HashSet::new();
        visited.insert(visit_key(&endpoint, &mailbox));

        for hop in 0..self.policy.max_hops {
            let request =
                GetUserSettingsRequest::new(vec![mailbox.clone()], settings.to_vec())?;
            let collection = request
                .execute(self.transport.as_ref(), &endpoint, cancel)
                .await?;
            let response = collection
                .into_responses()
                .into_iter()
                .next()
                .ok_or(AutodiscoverError::EmptyResponse)?;

            match &response.outcome {
                Outcome::Success | Outcome::Error { .. } => return Ok(response),
                Outcome::RedirectAddress { target } => {
                    log::debug!("hop {hop}: redirected to address {target}");
                    mailbox = target.clone();
                }
                Outcome::RedirectUrl { target } => {
                    log::debug!("hop {hop}: redirected to endpoint {target}");
                    endpoint = Url::parse(target)
                        .map_err(|_| AutodiscoverError::InvalidRedirectUrl(target.clone()))?;
                }
            }

            let key = visit_key(&endpoint, &mailbox);
            if !visited.insert(key.clone()) {
                return Err(AutodiscoverError::RedirectLoop(key));
            }
        }

        Err(AutodiscoverError::MaxHopsExceeded(self.policy.max_hops))
    }

    /// Resolves settings for one domain, following endpoint redirects.
    pub async fn resolve_domain_settings(
        &self,
        endpoint: Url,
        domain: &str,
        settings: &[DomainSettingName],
        cancel: &CancellationToken,
    ) -> AutodiscoverResult<DomainResponse> {
        let mut endpoint = endpoint;
        let mut visited = HashSet::new();
        visited.insert(endpoint.to_string());

        for hop in 0..self.policy.max_hops {
            let request =
                GetDomainSettingsRequest::new(vec![domain.to_string()], settings.to_vec())?;
            let collection = request
                .execute(self.transport.as_ref(), &endpoint, cancel)
                .await?;
            let response = collection
                .into_responses()
                .into_iter()
                .next()
                .ok_or(AutodiscoverError::EmptyResponse)?;

            match &response.outcome {
                Outcome::Success | Outcome::Error { .. } => return Ok(response),
                Outcome::RedirectAddress { target } => {
                    // A domain query has no address to substitute; surface
                    // the envelope and let the caller decide.
                    log::warn!("domain query redirected to address {target}");
                    return Ok(response);
                }
                Outcome::RedirectUrl { target } => {
                    log::debug!("hop {hop}: redirected to endpoint {target}");
                    endpoint = Url::parse(target)
                        .map_err(|_| AutodiscoverError::InvalidRedirectUrl(target.clone()))?;
                }
            }

            if !visited.insert(endpoint.to_string()) {
                return Err(AutodiscoverError::RedirectLoop(endpoint.to_string()));
            }
        }

        Err(AutodiscoverError::MaxHopsExceeded(self.policy.max_hops))
    }
}

fn visit_key(endpoint: &Url, mailbox: &str) -> String {
    format!("{}|{}", endpoint, mailbox.to_ascii_lowercase())
}
