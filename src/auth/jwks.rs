//! Signing keys of the Supabase project, cached by `kid`.

use anyhow::{Context, Result};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::Claims;

/// Minimum spacing between two JWKS fetches. Unknown `kid`s would otherwise
/// trigger a fetch per request.
const REFETCH_COOLDOWN: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

struct Entry {
    key: DecodingKey,
    fetched_at: Instant,
}

#[derive(Default)]
struct KeyStore {
    keys: HashMap<String, Entry>,
    last_fetch: Option<Instant>,
}

/// Verifies Supabase access tokens (RS256) against the project's JWKS.
#[derive(Clone)]
pub struct JwksCache {
    http: Client,
    store: Arc<RwLock<KeyStore>>,
    jwks_url: String,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwksCache {
    pub fn new(
        http: Client,
        jwks_url: impl Into<String>,
        issuer: impl Into<String>,
        audience: impl Into<String>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            http,
            store: Arc::new(RwLock::new(KeyStore::default())),
            jwks_url: jwks_url.into(),
            issuer: issuer.into(),
            audience: audience.into(),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    /// Check signature, issuer, audience and expiry. Returns the claims.
    pub async fn verify_token(&self, token: &str) -> Result<Claims> {
        let header = decode_header(token).context("Invalid JWT header")?;
        let kid = header.kid.context("JWT missing kid header")?;
        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.validate_nbf = true;

        let data = decode::<Claims>(token, &key, &validation).context("JWT validation failed")?;
        Ok(data.claims)
    }

    fn cached(&self, kid: &str) -> Option<DecodingKey> {
        self.store
            .read()
            .keys
            .get(kid)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.key.clone())
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey> {
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }

        self.refresh().await?;
        self.cached(kid)
            .with_context(|| format!("Signing key {} not found in JWKS", kid))
    }

    async fn refresh(&self) -> Result<()> {
        let recently_fetched = self
            .store
            .read()
            .last_fetch
            .is_some_and(|at| at.elapsed() < REFETCH_COOLDOWN);
        if recently_fetched {
            return Ok(());
        }

        debug!(url = %self.jwks_url, "Fetching JWKS");
        let response = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .context("Failed to fetch JWKS")?;
        if !response.status().is_success() {
            anyhow::bail!("JWKS fetch failed with status: {}", response.status());
        }
        let set: JwkSet = response.json().await.context("Failed to parse JWKS")?;

        let now = Instant::now();
        let keys = decoding_keys(set);
        let mut store = self.store.write();
        store.last_fetch = Some(now);
        for (kid, key) in keys {
            store.keys.insert(kid, Entry { key, fetched_at: now });
        }

        info!(keys = store.keys.len(), "JWKS cache refreshed");
        Ok(())
    }

    /// Fetch keys ahead of the first request.
    pub async fn warm_cache(&self) -> Result<()> {
        self.refresh().await
    }
}

/// RSA keys of a key set. Other key types and malformed keys are skipped.
fn decoding_keys(set: JwkSet) -> Vec<(String, DecodingKey)> {
    set.keys
        .into_iter()
        .filter(|jwk| jwk.kty == "RSA")
        .filter_map(|jwk| {
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                warn!(kid = %jwk.kid, "RSA key without modulus or exponent");
                return None;
            };
            match DecodingKey::from_rsa_components(n, e) {
                Ok(key) => Some((jwk.kid, key)),
                Err(err) => {
                    warn!(kid = %jwk.kid, error = %err, "Unusable JWK");
                    None
                }
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_rsa_keys_are_kept() {
        let set: JwkSet = serde_json::from_value(json!({"keys": [
            {"kid": "rsa", "kty": "RSA", "alg": "RS256", "n": "sXchDaQebHnPiGvyDOAT4saGEUetSyo9MKLOoWFsueri23bOdgWp4Dy1WlUzewbgBHod5pcM9H95GQRV3JDXboIRROSBigeC5yjU1hGzHHyXss8UDprecbAYxknTcQkhslANGRUZmdTOQ5qTRsLAt6BTYuyvVRdhS8exSZEy_c4gs_7svlJJQ4H9_NxsiIoLwAEk7-Q3UXERGYw_75IDrGA84-lA_-Ct4eTlXHBIY2EaV7t7LjJaynVJCpkv4LKjTTAumiGUIuQhrNhZLuF_RJLqHpM2kgWFLU7-VTdL1VbC2tejvcI2BlMkEpk1BzBZI0KQB0GaDWFLN-aEAw3vRw", "e": "AQAB"},
            {"kid": "ec", "kty": "EC", "crv": "P-256", "x": "a", "y": "b"},
            {"kid": "broken", "kty": "RSA"}
        ]}))
        .unwrap();

        let keys = decoding_keys(set);
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].0, "rsa");
    }

    #[tokio::test]
    async fn malformed_token_is_rejected_before_fetching() {
        let cache = JwksCache::new(Client::new(), "http://127.0.0.1:9/jwks", "iss", "aud", 60);
        let err = cache.verify_token("not-a-jwt").await.unwrap_err();
        assert!(err.to_string().contains("Invalid JWT header"));
    }
}
