//! URL validator
//!
//! Accepts https, s3 and file URLs. s3 URLs are checked for existence through
//! the object-storage collaborator; https URLs are probed; file URLs pass
//! unconditionally.

use std::sync::LazyLock;

use regex::Regex;

use crate::lookup::{FetchFault, ObjectStore, UrlProbe};
use crate::validation::{FailureCollector, FailureLevel, Param, ValidationFailure};

static S3_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^s3://([^/]+)/(.+)$").unwrap());

/// Scheme of a URL, e.g. `Some("s3")` for `s3://bucket/key`.
///
/// Parsed up to the first `:`, so slash-poor forms like `https:/x` keep
/// their scheme and reach the https probe instead of being rejected here.
pub fn url_scheme(url: &str) -> Option<&str> {
    let (scheme, _) = url.split_once(':')?;
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        Some(scheme)
    } else {
        None
    }
}

/// Split an `s3://bucket/key` URI into bucket and key.
pub fn parse_s3_uri(s3_url: &str) -> Option<(&str, &str)> {
    let captures = S3_URI_RE.captures(s3_url)?;
    Some((captures.get(1)?.as_str(), captures.get(2)?.as_str()))
}

pub struct UrlValidator;

impl UrlValidator {
    pub async fn validate(
        url: &Param,
        objects: &dyn ObjectStore,
        probe: &dyn UrlProbe,
    ) -> Vec<ValidationFailure> {
        let mut failures = FailureCollector::new("Url");
        let Some(value) = url.as_str() else {
            return failures.into_failures();
        };

        match url_scheme(value) {
            Some("s3") => Self::validate_s3_uri(value, objects, &mut failures).await,
            Some("https") => match probe.open(value).await {
                Ok(()) => {}
                Err(FetchFault::Status { code, reason }) => failures.add(
                    format!(
                        "The url '{value}' causes an HTTP error, the error code is \
                         '{code}', the error reason is '{reason}'"
                    ),
                    FailureLevel::Warning,
                    &[],
                ),
                Err(FetchFault::Connection { reason }) => failures.add(
                    format!(
                        "The url '{value}' causes a connection error, the error reason \
                         is '{reason}'"
                    ),
                    FailureLevel::Warning,
                    &[],
                ),
                Err(FetchFault::Malformed) => failures.add(
                    format!("The value '{value}' is not a valid URL"),
                    FailureLevel::Error,
                    &[url],
                ),
            },
            Some("file") => {}
            _ => failures.add(
                format!(
                    "The value '{value}' is not a valid URL, choose URL with 'https', \
                     's3' or 'file' prefix."
                ),
                FailureLevel::Error,
                &[url],
            ),
        }
        failures.into_failures()
    }

    async fn validate_s3_uri(
        s3_url: &str,
        objects: &dyn ObjectStore,
        failures: &mut FailureCollector,
    ) {
        let Some((bucket, key)) = parse_s3_uri(s3_url) else {
            failures.add(
                format!("s3 url '{s3_url}' is invalid."),
                FailureLevel::Error,
                &[],
            );
            return;
        };

        if objects.head_object(bucket, key).await.is_err() {
            failures.add(
                "The S3 object does not exist or you do not have access to it.\n\
                 Please make sure the cluster nodes have access to it.",
                FailureLevel::Error,
                &[],
            );
        }
    }
}
