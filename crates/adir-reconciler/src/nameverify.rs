//! The name-verification task: checks the symbolic name on a record
//! against either a DNS TXT record or a well-known JWKS-style document at
//! the name's authority host, matching the published keys against the
//! record's own attached signatures, and caching the verdict with a TTL
//! so a fresh record is never re-fetched before `expires_at`.

use std::sync::Arc;
use std::time::Duration;

use adir_core::VerificationStatus;
use adir_db::SearchDb;
use async_trait::async_trait;
use chrono::Utc;
use data_encoding::BASE64;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::supervisor::{Task, TaskCtx};

const TXT_PREFIX: &str = "_dir_nsys";

/// A record awaiting (re-)verification: its `host/path` name and the raw
/// public-key bytes of every signature it carries, gathered by whatever
/// enumerates signed records due for a check. Verification succeeds if
/// any one of these keys matches a key the authority publishes.
pub struct VerificationCandidate {
    pub cid: String,
    pub name: String,
    pub signature_keys: Vec<Vec<u8>>,
}

#[async_trait]
pub trait CandidateSource: Send + Sync {
    /// Every candidate whose cached verdict (if any) has expired.
    async fn due_candidates(&self) -> Result<Vec<VerificationCandidate>, ReconcileError>;
}

pub struct NameVerifyTask<S: CandidateSource + 'static> {
    db: Arc<dyn SearchDb>,
    source: Arc<S>,
    resolver: TokioAsyncResolver,
    http: reqwest::Client,
    allow_insecure: bool,
    interval: Duration,
    ttl: Duration,
    record_timeout: Duration,
    enabled: bool,
}

impl<S: CandidateSource + 'static> NameVerifyTask<S> {
    /// `ttl` is how long a verdict is cached before it's re-checked;
    /// `record_timeout` bounds each individual record's DNS/HTTP round
    /// trip; `enabled` mirrors the `Enabled` config key — a disabled
    /// task is never scheduled by the supervisor.
    pub fn new(
        db: Arc<dyn SearchDb>,
        source: Arc<S>,
        allow_insecure: bool,
        interval: Duration,
        ttl: Duration,
        record_timeout: Duration,
        enabled: bool,
    ) -> Self {
        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
        Self {
            db,
            source,
            resolver,
            http: reqwest::Client::new(),
            allow_insecure,
            interval,
            ttl,
            record_timeout,
            enabled,
        }
    }

    async fn verify_one(&self, candidate: &VerificationCandidate) -> VerificationStatus {
        let Some(host) = candidate.name.split('/').next().filter(|h| !h.is_empty()) else {
            return VerificationStatus::Failed;
        };
        if candidate.signature_keys.is_empty() {
            return VerificationStatus::Failed;
        }

        let timed = tokio::time::timeout(self.record_timeout, self.verify_against_host(host, candidate)).await;
        match timed {
            Ok(status) => status,
            Err(_) => {
                warn!(name = %candidate.name, "name verification timed out");
                VerificationStatus::Failed
            }
        }
    }

    async fn verify_against_host(&self, host: &str, candidate: &VerificationCandidate) -> VerificationStatus {
        let mut published = self.fetch_dns_keys(host).await;
        published.extend(self.fetch_well_known_keys(host).await);

        let matched = candidate
            .signature_keys
            .iter()
            .any(|key| published.iter().any(|p| p == key));

        if matched {
            VerificationStatus::Verified
        } else {
            VerificationStatus::Failed
        }
    }

    /// Candidate public keys published at `_dir_nsys.<host>` TXT records,
    /// each shaped `schema=v1; k=<type>; p=<base64-encoded-key>`.
    async fn fetch_dns_keys(&self, host: &str) -> Vec<Vec<u8>> {
        let fqdn = format!("{TXT_PREFIX}.{host}");
        let lookup = match self.resolver.txt_lookup(&fqdn).await {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!(host, error = %e, "no TXT record found");
                return Vec::new();
            }
        };
        lookup
            .iter()
            .filter_map(|txt| parse_txt_record(&txt.to_string()))
            .filter_map(|parsed| BASE64.decode(parsed.payload.as_bytes()).ok())
            .collect()
    }

    /// Candidate public keys from a JWKS-like well-known document: a JSON
    /// object carrying a `keys` array of `{"k": "<base64>"}` entries.
    async fn fetch_well_known_keys(&self, host: &str) -> Vec<Vec<u8>> {
        let scheme = if self.allow_insecure { "http" } else { "https" };
        let url = format!("{scheme}://{host}/.well-known/agent-directory.json");
        let response = match self.http.get(&url).send().await {
            Ok(r) if r.status().is_success() => r,
            _ => return Vec::new(),
        };
        let body: serde_json::Value = match response.json().await {
            Ok(v) => v,
            Err(_) => return Vec::new(),
        };
        body.get("keys")
            .and_then(|v| v.as_array())
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.get("k").and_then(|v| v.as_str()))
                    .filter_map(|s| BASE64.decode(s.as_bytes()).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct ParsedTxt {
    schema: String,
    #[allow(dead_code)]
    key_type: String,
    payload: String,
}

/// Parse `schema=v1; k=<type>; p=<base64>` TXT record content.
fn parse_txt_record(raw: &str) -> Option<ParsedTxt> {
    let mut schema = None;
    let mut key_type = None;
    let mut payload = None;
    for part in raw.split(';') {
        let part = part.trim();
        let (key, value) = part.split_once('=')?;
        match key.trim() {
            "schema" => schema = Some(value.trim().to_string()),
            "k" => key_type = Some(value.trim().to_string()),
            "p" => payload = Some(value.trim().to_string()),
            _ => {}
        }
    }
    let schema = schema?;
    if schema != "v1" {
        return None;
    }
    Some(ParsedTxt { schema, key_type: key_type?, payload: payload? })
}

#[async_trait]
impl<S: CandidateSource + 'static> Task for NameVerifyTask<S> {
    fn name(&self) -> &str {
        "name-verification"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn run(&self, ctx: &TaskCtx) -> Result<(), ReconcileError> {
        let candidates = self.source.due_candidates().await?;
        for candidate in candidates {
            if ctx.cancellation.is_cancelled() {
                return Ok(());
            }
            let status = self.verify_one(&candidate).await;
            let now = Utc::now();
            let expires_at = now + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::hours(1));
            self.db
                .upsert_name_verification(&candidate.cid, &candidate.name, status, now, expires_at)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_txt_record() {
        let parsed = parse_txt_record("schema=v1; k=ed25519; p=AQIDBA==").unwrap();
        assert_eq!(parsed.schema, "v1");
        assert_eq!(parsed.key_type, "ed25519");
        assert_eq!(BASE64.decode(parsed.payload.as_bytes()).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn rejects_malformed_txt_record() {
        assert!(parse_txt_record("not-a-valid-record").is_none());
    }

    #[test]
    fn rejects_unsupported_schema_version() {
        assert!(parse_txt_record("schema=v2; k=ed25519; p=AQIDBA==").is_none());
    }
}
