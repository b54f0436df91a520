use core::{future::Future, time::Duration};
use std::sync::LazyLock;

use regex::Regex;
use reqwest::{Client, header::REFERER};

pub const DEFAULT_BASE_URL: &str = "https://guide-orientation.rnu.tn/ar/dynamique";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

// bac-category prefix + numeric sub-code
static RAMZ_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{2,6}$").unwrap());

#[must_use]
pub fn valid_ramz_id(id: &str) -> bool {
    RAMZ_ID.is_match(id)
}

/// Outcome of one auxiliary-endpoint fetch. Nothing here is fatal to a
/// run: the orchestrator treats `Empty` and `Transient` alike as "no
/// scores this attempt" and carries the record forward unmodified.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Raw payload text, still to be parsed.
    Payload(String),
    /// The endpoint answered but had nothing for this record.
    Empty,
    /// Network/timeout/status failure, with a reason for the log line.
    Transient(String),
}

/// Seam between the orchestrator and the network, so end-to-end runs are
/// testable against a canned source.
pub trait ScoreSource {
    fn fetch_values(&self, ramz_id: &str) -> impl Future<Output = FetchOutcome>;
}

/// HTTP client for the session-gated score endpoint.
///
/// The live site only answers `values.php` for sessions that already
/// loaded the record's detail page, so each fetch is a two-step: GET
/// `filiere.php?id=<ramz_id>` to fill the cookie jar, then GET
/// `values.php?id=<ramz_id>` with the detail page as referer.
pub struct ScoreClient {
    client: Client,
    base_url: String,
}

impl ScoreClient {
    pub fn new(base_url: &str) -> reqwest::Result<Self> {
        let client = Client::builder()
            .cookie_store(true)
            .connect_timeout(const { Duration::from_secs(8) })
            .timeout(const { Duration::from_secs(30) })
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }
}

impl ScoreSource for ScoreClient {
    async fn fetch_values(&self, ramz_id: &str) -> FetchOutcome {
        if !valid_ramz_id(ramz_id) {
            return FetchOutcome::Transient(format!("malformed ramz id {ramz_id:?}"));
        }

        let detail_url = format!("{}/filiere.php?id={ramz_id}", self.base_url);
        match self.client.get(&detail_url).send().await {
            Ok(resp) if resp.status().is_success() => {
                // body is irrelevant, the navigation only seeds the session
            }
            Ok(resp) => {
                return FetchOutcome::Transient(format!(
                    "detail page status {}",
                    resp.status()
                ));
            }
            Err(e) => return FetchOutcome::Transient(format!("detail page: {e}")),
        }

        let values_url = format!("{}/values.php?id={ramz_id}", self.base_url);
        let resp = match self
            .client
            .get(&values_url)
            .header(REFERER, &detail_url)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return FetchOutcome::Transient(format!("values: {e}")),
        };
        if !resp.status().is_success() {
            return FetchOutcome::Transient(format!("values status {}", resp.status()));
        }

        match resp.text().await {
            Ok(body) if body.trim().is_empty() => FetchOutcome::Empty,
            Ok(body) => FetchOutcome::Payload(body),
            Err(e) => FetchOutcome::Transient(format!("values body: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramz_id_shape() {
        assert!(valid_ramz_id("10123"));
        assert!(valid_ramz_id("30"));
        assert!(!valid_ramz_id(""));
        assert!(!valid_ramz_id("1"));
        assert!(!valid_ramz_id("10123456"));
        assert!(!valid_ramz_id("10a23"));
        assert!(!valid_ramz_id(" 10123"));
    }
}
