//! Storage key naming for uploads

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::config::BucketEndpointConfig;
use crate::upload::template::substitute_tokens;
use crate::utils::crypto::{md5_hex, sha256_hex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// Seconds since the epoch
    #[default]
    Unix,
    /// `2024-05-01T09-30-00Z`, colons swapped for dashes
    Iso8601,
    /// `20240501093000`
    Compact,
    /// `2024-05-01`
    DateOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Md5,
}

impl HashAlgorithm {
    pub fn digest(self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha256 => sha256_hex(bytes),
            HashAlgorithm::Md5 => md5_hex(bytes),
        }
    }
}

/// How an uploaded file's basename is chosen
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenamePolicy {
    #[default]
    Original,
    DateTime {
        #[serde(default)]
        format: DateFormat,
    },
    Hash {
        #[serde(default)]
        algorithm: HashAlgorithm,
    },
    /// Tokens: `${original} ${basename} ${ext} ${year} ${month} ${day}
    /// ${hour} ${minute} ${second} ${timestamp} ${hash} ${uuid}`
    Custom {
        template: String,
        #[serde(default)]
        algorithm: HashAlgorithm,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOutcome {
    pub basename: String,
    /// Set whenever the content was hashed to build the name
    pub content_hash: Option<String>,
}

/// Splits `photo.png` into `("photo", ".png")`; dotfiles have no extension
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < filename.len() => filename.split_at(idx),
        _ => (filename, ""),
    }
}

/// Computes the storage basename for `filename` at instant `now`
pub fn compute_key(
    filename: &str,
    file_bytes: &[u8],
    policy: &RenamePolicy,
    now: DateTime<Utc>,
) -> RenameOutcome {
    let (stem, ext) = split_extension(filename);

    match policy {
        RenamePolicy::Original => RenameOutcome {
            basename: filename.to_string(),
            content_hash: None,
        },
        RenamePolicy::DateTime { format } => RenameOutcome {
            basename: format!("{}{}", format_date(*format, now), ext),
            content_hash: None,
        },
        RenamePolicy::Hash { algorithm } => {
            let hash = algorithm.digest(file_bytes);
            RenameOutcome {
                basename: format!("{}{}", hash, ext),
                content_hash: Some(hash),
            }
        }
        RenamePolicy::Custom {
            template,
            algorithm,
        } => {
            let content_hash = template
                .contains("${hash}")
                .then(|| algorithm.digest(file_bytes));
            let basename = render_custom(template, filename, stem, ext, content_hash.as_deref(), now);
            if basename.trim().is_empty() {
                log::warn!("Rename template '{}' produced an empty name, keeping '{}'", template, filename);
                RenameOutcome {
                    basename: filename.to_string(),
                    content_hash,
                }
            } else {
                RenameOutcome {
                    basename,
                    content_hash,
                }
            }
        }
    }
}

/// Full object key: the configuration's normalized prefix plus `basename`
pub fn storage_key(config: &BucketEndpointConfig, basename: &str) -> String {
    format!("{}{}", config.normalized_prefix(), basename)
}

fn format_date(format: DateFormat, now: DateTime<Utc>) -> String {
    match format {
        DateFormat::Unix => now.timestamp().to_string(),
        DateFormat::Iso8601 => now.to_rfc3339_opts(SecondsFormat::Secs, true).replace(':', "-"),
        DateFormat::Compact => now.format("%Y%m%d%H%M%S").to_string(),
        DateFormat::DateOnly => now.format("%Y-%m-%d").to_string(),
    }
}

fn render_custom(
    template: &str,
    original: &str,
    stem: &str,
    ext: &str,
    hash: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let mut id: Option<String> = None;
    substitute_tokens(template, |token| {
        let value = match token {
            "original" => original.to_string(),
            "basename" => stem.to_string(),
            "ext" => ext.to_string(),
            "year" => now.format("%Y").to_string(),
            "month" => now.format("%m").to_string(),
            "day" => now.format("%d").to_string(),
            "hour" => now.format("%H").to_string(),
            "minute" => now.format("%M").to_string(),
            "second" => now.format("%S").to_string(),
            "timestamp" => now.timestamp().to_string(),
            "hash" => hash?.to_string(),
            // one id per name, however often it appears
            "uuid" => id
                .get_or_insert_with(|| uuid::Uuid::new_v4().simple().to_string()[..8].to_string())
                .clone(),
            _ => return None,
        };
        Some(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 7).unwrap()
    }

    #[test]
    fn original_keeps_the_name() {
        let outcome = compute_key("my photo.png", b"x", &RenamePolicy::Original, fixed_now());
        assert_eq!(outcome.basename, "my photo.png");
        assert_eq!(outcome.content_hash, None);
    }

    #[test]
    fn date_formats() {
        let cases = [
            (DateFormat::Unix, "1714555807.png"),
            (DateFormat::Iso8601, "2024-05-01T09-30-07Z.png"),
            (DateFormat::Compact, "20240501093007.png"),
            (DateFormat::DateOnly, "2024-05-01.png"),
        ];
        for (format, expected) in cases {
            let outcome = compute_key("shot.png", b"", &RenamePolicy::DateTime { format }, fixed_now());
            assert_eq!(outcome.basename, expected, "{:?}", format);
        }
    }

    #[test]
    fn sha256_of_empty_content() {
        let policy = RenamePolicy::Hash {
            algorithm: HashAlgorithm::Sha256,
        };
        let outcome = compute_key("photo.png", b"", &policy, fixed_now());
        assert_eq!(
            outcome.basename,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855.png"
        );
        assert_eq!(
            outcome.content_hash.as_deref(),
            Some("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
    }

    #[test]
    fn md5_hash_without_extension() {
        let policy = RenamePolicy::Hash {
            algorithm: HashAlgorithm::Md5,
        };
        let outcome = compute_key("Makefile", b"", &policy, fixed_now());
        assert_eq!(outcome.basename, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn custom_template_is_deterministic_for_a_fixed_clock() {
        let policy = RenamePolicy::Custom {
            template: "${basename}-${timestamp}${ext}".to_string(),
            algorithm: HashAlgorithm::Sha256,
        };
        let first = compute_key("report.final.pdf", b"data", &policy, fixed_now());
        let second = compute_key("report.final.pdf", b"data", &policy, fixed_now());
        assert_eq!(first.basename, "report.final-1714555807.pdf");
        assert_eq!(first, second);
        assert_eq!(first.content_hash, None);
    }

    #[test]
    fn custom_template_expands_every_token() {
        let policy = RenamePolicy::Custom {
            template: "${year}/${month}/${day}/${hour}${minute}${second}-${original}-${hash}".to_string(),
            algorithm: HashAlgorithm::Md5,
        };
        let outcome = compute_key("a.txt", b"", &policy, fixed_now());
        assert_eq!(
            outcome.basename,
            "2024/05/01/093007-a.txt-d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(outcome.content_hash.as_deref(), Some("d41d8cd98f00b204e9800998ecf8427e"));
    }

    #[test]
    fn uuid_token_is_eight_fresh_hex_chars() {
        let policy = RenamePolicy::Custom {
            template: "${uuid}${ext}".to_string(),
            algorithm: HashAlgorithm::default(),
        };
        let a = compute_key("x.gif", b"", &policy, fixed_now()).basename;
        let b = compute_key("x.gif", b"", &policy, fixed_now()).basename;
        assert_eq!(a.len(), 12);
        assert!(a[..8].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(a.ends_with(".gif"));
        assert_ne!(a, b);
    }

    #[test]
    fn token_text_in_a_filename_is_not_expanded() {
        let policy = RenamePolicy::Custom {
            template: "${original}-${hash}".to_string(),
            algorithm: HashAlgorithm::Md5,
        };
        let outcome = compute_key("${uuid}.txt", b"", &policy, fixed_now());
        assert_eq!(outcome.basename, "${uuid}.txt-d41d8cd98f00b204e9800998ecf8427e");

        let policy = RenamePolicy::Custom {
            template: "${original}".to_string(),
            algorithm: HashAlgorithm::Sha256,
        };
        let outcome = compute_key("${hash}.txt", b"", &policy, fixed_now());
        assert_eq!(outcome.basename, "${hash}.txt");
        assert_eq!(outcome.content_hash, None);
    }

    #[test]
    fn empty_custom_result_falls_back_to_original() {
        let policy = RenamePolicy::Custom {
            template: "  ".to_string(),
            algorithm: HashAlgorithm::default(),
        };
        assert_eq!(compute_key("keep.me", b"", &policy, fixed_now()).basename, "keep.me");
    }

    #[test]
    fn splits_extensions() {
        assert_eq!(split_extension("photo.png"), ("photo", ".png"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension(".env"), (".env", ""));
        assert_eq!(split_extension("trailing."), ("trailing.", ""));
        assert_eq!(split_extension("plain"), ("plain", ""));
    }

    #[test]
    fn key_gets_the_normalized_prefix() {
        let config = BucketEndpointConfig::default().with_key_prefix("uploads//");
        assert_eq!(storage_key(&config, "a.png"), "uploads/a.png");
        let config = BucketEndpointConfig::default();
        assert_eq!(storage_key(&config, "a.png"), "a.png");
    }

    #[test]
    fn policy_deserializes_from_tagged_json() {
        let policy: RenamePolicy =
            serde_json::from_str(r#"{"type":"date_time","format":"compact"}"#).unwrap();
        assert_eq!(
            policy,
            RenamePolicy::DateTime {
                format: DateFormat::Compact
            }
        );
        let policy: RenamePolicy = serde_json::from_str(r#"{"type":"hash"}"#).unwrap();
        assert_eq!(
            policy,
            RenamePolicy::Hash {
                algorithm: HashAlgorithm::Sha256
            }
        );
    }
}
