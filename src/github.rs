use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, ACCEPT, LINK};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::{CloneProtocol, Config};
use crate::error::GitHubError;

/// A repository to mirror: its name and the URL to clone it from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub name: String,
    pub clone_url: String,
}

/// Fields we read from the `/users/{owner}/orgs` listing
#[derive(Debug, Deserialize)]
struct ApiOrganization {
    login: String,
}

/// Fields we read from the `/repos` and `/starred` listings
#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    git_url: Option<String>,
    clone_url: Option<String>,
    ssh_url: Option<String>,
}

impl ApiRepository {
    fn into_ref(self, protocol: CloneProtocol) -> Result<RepositoryRef, GitHubError> {
        let preferred = match protocol {
            CloneProtocol::Git => self.git_url.clone(),
            CloneProtocol::Https => self.clone_url,
            CloneProtocol::Ssh => self.ssh_url,
        };

        match preferred.or(self.git_url) {
            Some(clone_url) => Ok(RepositoryRef {
                name: self.name,
                clone_url,
            }),
            None => Err(GitHubError::MissingCloneUrl { name: self.name }),
        }
    }
}

/// Unauthenticated client for the GitHub REST API
#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    per_page: u8,
    protocol: CloneProtocol,
}

impl GitHubClient {
    /// Create a new client from configuration
    pub fn new(config: &Config) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .user_agent(config.github.user_agent.as_str())
            .build()
            .map_err(GitHubError::Client)?;

        Ok(Self {
            http,
            api_url: config.github.api_url.trim_end_matches('/').to_string(),
            per_page: config.per_page(),
            protocol: config.github.clone_protocol,
        })
    }

    /// List the organization logins a user belongs to
    pub async fn organizations(&self, user: &str) -> Result<Vec<String>, GitHubError> {
        debug!("Fetching organizations for user: {}", user);

        let url = format!("{}/users/{}/orgs?per_page={}", self.api_url, user, self.per_page);
        let orgs: Vec<ApiOrganization> = self.paginate::<ApiOrganization>(url).try_collect().await?;

        Ok(orgs.into_iter().map(|org| org.login).collect())
    }

    /// Lazily list an owner's repositories, then its starred ones if asked
    ///
    /// Each call returns a fresh stream starting from the first page. A page
    /// that fails to load ends its listing after yielding the error.
    pub fn repositories<'a>(
        &'a self,
        owner: &'a str,
        include_starred: bool,
    ) -> impl Stream<Item = Result<RepositoryRef, GitHubError>> + 'a {
        let owned = self.paginate::<ApiRepository>(format!(
            "{}/users/{}/repos?per_page={}",
            self.api_url, owner, self.per_page
        ));

        let starred = include_starred.then(|| {
            self.paginate::<ApiRepository>(format!(
                "{}/users/{}/starred?per_page={}",
                self.api_url, owner, self.per_page
            ))
        });

        let protocol = self.protocol;
        owned
            .chain(stream::iter(starred).flatten())
            .map(move |item| item.and_then(|repo| repo.into_ref(protocol)))
    }

    /// Follow `Link: rel="next"` headers from `url` until exhausted
    fn paginate<'a, T>(&'a self, url: String) -> impl Stream<Item = Result<T, GitHubError>> + 'a
    where
        T: DeserializeOwned + 'a,
    {
        stream::try_unfold(Some(url), move |next| async move {
            let Some(url) = next else {
                return Ok::<_, GitHubError>(None);
            };

            let (items, next) = self.fetch_page::<T>(&url).await?;
            let page = stream::iter(items.into_iter().map(Ok::<T, GitHubError>));
            Ok::<_, GitHubError>(Some((page, next)))
        })
        .try_flatten()
    }

    /// Fetch a single page, returning its items and the next page URL
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<(Vec<T>, Option<String>), GitHubError> {
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|source| GitHubError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            if is_rate_limited(status, response.headers()) {
                return Err(GitHubError::RateLimited {
                    url: url.to_string(),
                    reset: rate_limit_reset(response.headers()),
                });
            }
            return Err(GitHubError::Status {
                url: url.to_string(),
                status,
            });
        }

        let next = next_link(response.headers());
        let body = response.bytes().await.map_err(|source| GitHubError::Http {
            url: url.to_string(),
            source,
        })?;

        let items = serde_json::from_slice(&body).map_err(|source| GitHubError::Decode {
            url: url.to_string(),
            source,
        })?;

        Ok((items, next))
    }
}

/// Extract the `rel="next"` target from a `Link` header
fn next_link(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;

    link.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });

        if is_next {
            target
                .strip_prefix('<')
                .and_then(|t| t.strip_suffix('>'))
                .map(str::to_string)
        } else {
            None
        }
    })
}

fn is_rate_limited(status: StatusCode, headers: &HeaderMap) -> bool {
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    exhausted && (status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS)
}

fn rate_limit_reset(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let epoch: i64 = headers
        .get("x-ratelimit-reset")?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()?;

    Utc.timestamp_opt(epoch, 0).single()
}
