//! services/bot/src/adapters/dictionary.rs
//!
//! HTTP adapter for a dictionaryapi.dev-compatible service. It implements the
//! `DictionaryService` port from the core crate.

use async_trait::async_trait;
use lexicon_core::{DictionaryService, PortError, PortResult, Sense};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

//=========================================================================================
// Response Payload
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ApiEntry {
    #[serde(default)]
    meanings: Vec<ApiMeaning>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMeaning {
    #[serde(default)]
    part_of_speech: String,
    #[serde(default)]
    definitions: Vec<ApiDefinition>,
}

#[derive(Debug, Deserialize)]
struct ApiDefinition {
    definition: String,
}

/// Flattens every definition of every meaning into senses numbered from zero,
/// in the order the service returned them.
fn flatten_senses(entries: Vec<ApiEntry>) -> Vec<Sense> {
    entries
        .into_iter()
        .flat_map(|entry| entry.meanings)
        .flat_map(|meaning| {
            let part_of_speech = meaning.part_of_speech;
            meaning
                .definitions
                .into_iter()
                .map(move |d| (part_of_speech.clone(), d.definition))
        })
        .enumerate()
        .map(|(index, (part_of_speech, definition))| Sense {
            index,
            part_of_speech,
            definition,
        })
        .collect()
}

//=========================================================================================
// The Adapter
//=========================================================================================

#[derive(Clone)]
pub struct HttpDictionaryAdapter {
    client: Client,
    base_url: Url,
}

impl HttpDictionaryAdapter {
    pub fn new(base_url: &str) -> Result<Self, crate::error::BotError> {
        let base_url = Url::parse(base_url).map_err(|e| {
            crate::error::BotError::Internal(format!("Invalid dictionary URL '{}': {}", base_url, e))
        })?;
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, base_url })
    }

    fn word_url(&self, word: &str) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(word);
        Ok(url)
    }
}

#[async_trait]
impl DictionaryService for HttpDictionaryAdapter {
    async fn fetch_definitions(&self, word: &str) -> PortResult<Vec<Sense>> {
        let url = self.word_url(word)?;
        debug!("Fetching definitions from {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(PortError::NotFound(format!("No definitions for '{}'", word)))
            }
            status if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                return Err(PortError::Unavailable(format!(
                    "Dictionary responded with {}",
                    status
                )))
            }
            status if !status.is_success() => {
                return Err(PortError::Unexpected(format!(
                    "Dictionary responded with {}",
                    status
                )))
            }
            _ => {}
        }

        let entries: Vec<ApiEntry> = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed dictionary response: {}", e)))?;
        Ok(flatten_senses(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLE: &str = r#"[
        {
            "word": "apple",
            "phonetics": [],
            "meanings": [
                {
                    "partOfSpeech": "noun",
                    "definitions": [
                        { "definition": "A common, round fruit.", "synonyms": [] },
                        { "definition": "A tree of the genus Malus." }
                    ]
                },
                {
                    "partOfSpeech": "verb",
                    "definitions": [{ "definition": "To pick apples." }]
                }
            ]
        },
        {
            "word": "apple",
            "meanings": [
                {
                    "partOfSpeech": "noun",
                    "definitions": [{ "definition": "The fruit of any tree." }]
                }
            ]
        }
    ]"#;

    #[test]
    fn senses_are_numbered_across_entries() {
        let entries: Vec<ApiEntry> = serde_json::from_str(APPLE).unwrap();
        let senses = flatten_senses(entries);

        assert_eq!(senses.len(), 4);
        assert_eq!(
            senses.iter().map(|s| s.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
        assert_eq!(senses[1].part_of_speech, "noun");
        assert_eq!(senses[1].definition, "A tree of the genus Malus.");
        assert_eq!(senses[2].part_of_speech, "verb");
        assert_eq!(senses[3].definition, "The fruit of any tree.");
    }

    #[test]
    fn entries_without_meanings_yield_nothing() {
        let entries: Vec<ApiEntry> = serde_json::from_str(r#"[{ "word": "xyzzy" }]"#).unwrap();
        assert!(flatten_senses(entries).is_empty());
    }

    #[test]
    fn words_are_escaped_into_the_path() {
        let adapter =
            HttpDictionaryAdapter::new("https://api.dictionaryapi.dev/api/v2/entries/en/").unwrap();
        let url = adapter.word_url("ice cream").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.dictionaryapi.dev/api/v2/entries/en/ice%20cream"
        );
    }
}
