//! HTTPS URL probe

use async_trait::async_trait;
use stratus_core::lookup::{FetchFault, UrlProbe};

/// URL probe backed by an HTTP GET
#[derive(Default)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UrlProbe for HttpProbe {
    async fn open(&self, url: &str) -> Result<(), FetchFault> {
        let parsed = reqwest::Url::parse(url).map_err(|_| FetchFault::Malformed)?;

        tracing::debug!(%parsed, "probing url");
        match self.client.get(parsed).send().await {
            Ok(response) => {
                let status = response.status();
                if status.as_u16() >= 400 {
                    Err(FetchFault::Status {
                        code: status.as_u16(),
                        reason: status
                            .canonical_reason()
                            .unwrap_or("unknown")
                            .to_string(),
                    })
                } else {
                    Ok(())
                }
            }
            Err(err) => Err(FetchFault::Connection {
                reason: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unparsable_url_is_malformed() {
        let probe = HttpProbe::new();
        let result = probe.open("https://bad url with spaces").await;
        assert!(matches!(result, Err(FetchFault::Malformed)));
    }
}
