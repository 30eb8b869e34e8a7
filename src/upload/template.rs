//! Shareable URL construction from user-defined templates

use serde::{Deserialize, Serialize};

use crate::storage::config::BucketEndpointConfig;
use crate::storage::s3::endpoint::{aws_uri_encode, encode_key, Endpoint};

/// A template resolved for one key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedUrl {
    pub label: String,
    pub url: String,
}

/// Resolves `template` for `key`
///
/// Tokens are replaced literally:
/// - `${BUCKET}`, `${REGION}`, `${SCHEME}`, `${ENDPOINT}`: configuration values as-is
/// - `${PATH}`: the encoded key
/// - `${KEY}`, `${BASENAME}`: the encoded last key segment, or `basename_override`
///
/// Falls back to the object's own URL when there is no template or it
/// resolves to nothing.
pub fn resolve(
    template: Option<&str>,
    key: &str,
    config: &BucketEndpointConfig,
    basename_override: Option<&str>,
) -> String {
    let Some(template) = template else {
        return fallback_url(key, config);
    };

    let raw_basename = basename_override.unwrap_or_else(|| key.rsplit('/').next().unwrap_or(key));
    let basename = aws_uri_encode(raw_basename);

    let resolved = substitute_tokens(template, |token| match token {
        "BUCKET" => Some(config.bucket.clone()),
        "REGION" => Some(config.region.clone()),
        "SCHEME" => Some(config.uri_scheme.clone()),
        "ENDPOINT" => Some(config.endpoint.clone()),
        "PATH" => Some(encode_key(key)),
        "BASENAME" | "KEY" => Some(basename.clone()),
        _ => None,
    });

    let resolved = resolved.trim();
    if resolved.is_empty() {
        fallback_url(key, config)
    } else {
        resolved.to_string()
    }
}

/// URL for `key` using the configuration's default template
pub fn build_url(key: &str, config: &BucketEndpointConfig, template: Option<&str>) -> String {
    let template = template.or_else(|| config.default_template().map(|t| t.template.as_str()));
    resolve(template, key, config, None)
}

/// Every non-blank configured template, resolved, in configured order
pub fn resolve_all(key: &str, config: &BucketEndpointConfig) -> Vec<ResolvedUrl> {
    config
        .url_templates
        .iter()
        .filter(|t| !t.is_blank())
        .map(|t| ResolvedUrl {
            label: t.label.clone(),
            url: resolve(Some(&t.template), key, config, None),
        })
        .collect()
}

/// Replaces each `${name}` in `template` with `value(name)` in one left to
/// right pass
///
/// Substituted text is never scanned again. Names `value` does not know, and
/// a `${` without a closing brace, stay as written.
pub(crate) fn substitute_tokens(
    template: &str,
    mut value: impl FnMut(&str) -> Option<String>,
) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let name = &after[..end];
        match value(name) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(&rest[start..start + 2 + end + 1]),
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

/// `{endpoint}/{encodedKey}`
fn fallback_url(key: &str, config: &BucketEndpointConfig) -> String {
    match Endpoint::resolve(config) {
        Ok(endpoint) => endpoint.object_url(key),
        Err(e) => {
            log::warn!("Falling back to the raw endpoint for '{}': {}", key, e);
            format!("{}/{}", config.trimmed_endpoint(), encode_key(key))
        }
    }
}
