//! Capability tokens for the object service gateway
//!
//! Every proxied request carries a short-lived HS256 token naming the request
//! it authorizes. The default claim set is fixed; a connection may instead
//! configure a [`ClaimTemplate`] list that renders each claim from a literal,
//! a request attribute, a prefixed object path or a timestamp. Templated
//! tokens still carry `iat`, `nbf` and `exp`, which a template cannot override.

use crate::Result;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Token lifetime in seconds
pub const TOKEN_TTL_SECS: i64 = 300;

/// Region tag carried in every default token
pub const REGION_TAG: &str = "ny";

/// The request a token is minted for
#[derive(Clone, Copy, Debug)]
pub struct TokenRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub bucket: &'a str,
    pub key: &'a str,
    /// Request path as built by the connection, host suffix included
    pub path: &'a str,
}

/// Default claim set
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyClaims {
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
    pub method: String,
    pub iss: String,
    pub host: String,
    pub path: String,
    pub region: String,
}

impl ProxyClaims {
    /// Claims for a request issued at `now` (unix seconds)
    pub fn new(request: &TokenRequest<'_>, client_id: &str, now: i64) -> Self {
        Self {
            iat: now,
            nbf: now,
            exp: now + TOKEN_TTL_SECS,
            method: request.method.to_string(),
            iss: client_id.to_string(),
            host: request.host.to_string(),
            path: request.path.to_string(),
            region: REGION_TAG.to_string(),
        }
    }
}

/// Request attribute a templated claim can copy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestAttribute {
    Method,
    Host,
    Bucket,
    Key,
}

/// Where a templated claim takes its value from
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "arg", rename_all = "snake_case")]
pub enum ClaimSource {
    /// A literal value
    Value(Value),
    /// An attribute of the request
    Request(RequestAttribute),
    /// `prefix/bucket/key`
    Path(String),
    /// Issue time plus an offset in seconds
    Timestamp(i64),
}

/// One claim of a configured token template
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimTemplate {
    pub claim: String,
    pub source: ClaimSource,
}

impl ClaimTemplate {
    pub fn new(claim: impl Into<String>, source: ClaimSource) -> Self {
        Self {
            claim: claim.into(),
            source,
        }
    }

    fn render(&self, request: &TokenRequest<'_>, now: i64) -> Value {
        match &self.source {
            ClaimSource::Value(value) => value.clone(),
            ClaimSource::Request(attribute) => Value::from(match attribute {
                RequestAttribute::Method => request.method,
                RequestAttribute::Host => request.host,
                RequestAttribute::Bucket => request.bucket,
                RequestAttribute::Key => request.key,
            }),
            ClaimSource::Path(prefix) => {
                Value::from(format!("{}/{}/{}", prefix, request.bucket, request.key))
            }
            ClaimSource::Timestamp(offset) => Value::from(now + offset),
        }
    }
}

/// Render a claim template into a JSON object
pub fn render_claims(
    templates: &[ClaimTemplate],
    request: &TokenRequest<'_>,
    now: i64,
) -> Map<String, Value> {
    templates
        .iter()
        .map(|template| (template.claim.clone(), template.render(request, now)))
        .collect()
}

/// Sign any claim set with HS256
pub fn sign<T: Serialize>(claims: &T, secret: &str) -> Result<String> {
    let token = encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

/// Mint a token for a request, using the template when one is configured
pub fn create_jwt(
    request: &TokenRequest<'_>,
    client_id: &str,
    client_secret: &str,
    template: Option<&[ClaimTemplate]>,
    now: i64,
) -> Result<String> {
    match template {
        Some(templates) => {
            let mut claims = render_claims(templates, request, now);
            claims.insert("iat".to_string(), Value::from(now));
            claims.insert("nbf".to_string(), Value::from(now));
            claims.insert("exp".to_string(), Value::from(now + TOKEN_TTL_SECS));
            sign(&claims, client_secret)
        }
        None => sign(&ProxyClaims::new(request, client_id, now), client_secret),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
    use serde_json::json;

    const REQUEST: TokenRequest<'static> = TokenRequest {
        method: "PUT",
        host: "s3.store.com",
        bucket: "bucket",
        key: "key",
        path: "/test/bucket/key",
    };

    fn decode_claims(token: &str, secret: &str) -> Value {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();
        decode::<Value>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
            .unwrap()
            .claims
    }

    #[test]
    fn test_default_claims() {
        let token = create_jwt(&REQUEST, "abc", "abcd", None, 1_000).unwrap();
        let claims: ProxyClaims = serde_json::from_value(decode_claims(&token, "abcd")).unwrap();
        assert_eq!(
            claims,
            ProxyClaims {
                iat: 1_000,
                nbf: 1_000,
                exp: 1_300,
                method: "PUT".to_string(),
                iss: "abc".to_string(),
                host: "s3.store.com".to_string(),
                path: "/test/bucket/key".to_string(),
                region: "ny".to_string(),
            }
        );
    }

    #[test]
    fn test_wrong_secret_does_not_verify() {
        let token = create_jwt(&REQUEST, "abc", "abcd", None, 1_000).unwrap();
        let validation = Validation::new(Algorithm::HS256);
        assert!(decode::<Value>(&token, &DecodingKey::from_secret(b"other"), &validation).is_err());
    }

    #[test]
    fn test_template_value_and_request() {
        let templates = vec![
            ClaimTemplate::new("test", ClaimSource::Value(json!("return_this"))),
            ClaimTemplate::new("test_method", ClaimSource::Request(RequestAttribute::Method)),
        ];
        assert_eq!(
            Value::Object(render_claims(&templates, &REQUEST, 0)),
            json!({"test": "return_this", "test_method": "PUT"})
        );
    }

    #[test]
    fn test_template_path_and_timestamp() {
        let templates = vec![
            ClaimTemplate::new("test_path", ClaimSource::Path("/test".to_string())),
            ClaimTemplate::new("now", ClaimSource::Timestamp(0)),
            ClaimTemplate::new("later", ClaimSource::Timestamp(50)),
        ];
        assert_eq!(
            Value::Object(render_claims(&templates, &REQUEST, 123_456)),
            json!({"test_path": "/test/bucket/key", "now": 123_456, "later": 123_506})
        );
    }

    #[test]
    fn test_template_replaces_request_claims() {
        let templates = vec![ClaimTemplate::new("sub", ClaimSource::Value(json!("svc")))];
        let token = create_jwt(&REQUEST, "abc", "abcd", Some(&templates), 1).unwrap();
        assert_eq!(
            decode_claims(&token, "abcd"),
            json!({"sub": "svc", "iat": 1, "nbf": 1, "exp": 301})
        );
    }

    #[test]
    fn test_templated_token_expires() {
        let templates = vec![
            ClaimTemplate::new("m", ClaimSource::Request(RequestAttribute::Method)),
            ClaimTemplate::new("exp", ClaimSource::Timestamp(86_400)),
        ];
        let token = create_jwt(&REQUEST, "abc", "abcd", Some(&templates), 1_000).unwrap();
        let claims = decode_claims(&token, "abcd");
        assert_eq!(claims["m"], "PUT");
        assert_eq!(claims["exp"], 1_300);
        assert_eq!(claims["iat"], 1_000);

        // Expired by the time it is checked
        let validation = Validation::new(Algorithm::HS256);
        assert!(decode::<Value>(&token, &DecodingKey::from_secret(b"abcd"), &validation).is_err());
    }

    #[test]
    fn test_template_deserializes() {
        let raw = r#"[
            {"claim": "m", "source": {"kind": "request", "arg": "method"}},
            {"claim": "t", "source": {"kind": "timestamp", "arg": 60}}
        ]"#;
        let templates: Vec<ClaimTemplate> = serde_json::from_str(raw).unwrap();
        assert_eq!(templates[0].source, ClaimSource::Request(RequestAttribute::Method));
        assert_eq!(templates[1].source, ClaimSource::Timestamp(60));
    }
}
