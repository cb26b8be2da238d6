//! Client for the external text-classification service.
//!
//! Two endpoints share the same authentication scheme (`x-app-key` and
//! `x-super-team` headers): one returns language + sentiment for a
//! transcript, the other returns tag occurrence counts.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::error::HelplineResult;

/// Language + sentiment verdict for a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub language: String,
    pub sentiment: String,
}

/// One tag with its occurrence count in the classified transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagOccurrence {
    pub tag: String,
    pub occurrences: u32,
}

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TagResponse {
    tags: Vec<TagOccurrence>,
}

#[derive(Clone)]
pub struct ClassifierClient {
    http: Client,
    sentiment_url: String,
    tag_url: String,
    app_key: String,
    super_team: String,
    tag_min_occurrences: u32,
}

impl ClassifierClient {
    pub fn new(config: &ClassifierConfig) -> HelplineResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            sentiment_url: config.sentiment_url.clone(),
            tag_url: config.tag_url.clone(),
            app_key: config.app_key.clone(),
            super_team: config.super_team.clone(),
            tag_min_occurrences: config.tag_min_occurrences,
        })
    }

    /// Classify a transcript's language and overall sentiment.
    pub async fn classify(&self, text: &str) -> HelplineResult<Classification> {
        debug!(chars = text.len(), "requesting language/sentiment classification");

        let response = self
            .http
            .post(&self.sentiment_url)
            .header("x-app-key", &self.app_key)
            .header("x-super-team", &self.super_team)
            .json(&ClassifyRequest { text })
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<Classification>().await?)
    }

    /// Classify a transcript into tags, keeping only those whose occurrence
    /// count clears the configured threshold. The result may be empty; the
    /// caller stores it either way so the session is not re-classified.
    pub async fn tag(&self, text: &str) -> HelplineResult<Vec<String>> {
        debug!(chars = text.len(), "requesting tag classification");

        let response = self
            .http
            .post(&self.tag_url)
            .header("x-app-key", &self.app_key)
            .header("x-super-team", &self.super_team)
            .json(&ClassifyRequest { text })
            .send()
            .await?
            .error_for_status()?;

        let parsed: TagResponse = response.json().await?;
        Ok(parsed
            .tags
            .into_iter()
            .filter(|t| t.occurrences > self.tag_min_occurrences)
            .map(|t| t.tag)
            .collect())
    }
}
