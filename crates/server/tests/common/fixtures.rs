//! Test fixtures: tokens, hashes, and a recording publisher.

use async_trait::async_trait;
use quotagate_core::{ContentHash, Identifier, Level, token};
use quotagate_server::publish::{ContentAddress, ContentPublisher, PublishError};
use std::sync::Mutex;

/// Token for `identifier` at `level`.
#[allow(dead_code)]
pub fn token_for(level: u16, identifier: Identifier) -> String {
    token::encode(Level::new(level), &ContentHash::of_identifier(identifier))
}

/// Hex hash of `identifier`.
#[allow(dead_code)]
pub fn hash_of(identifier: Identifier) -> String {
    ContentHash::of_identifier(identifier).to_hex()
}

/// Publisher that records what it was asked to publish.
#[allow(dead_code)]
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<String>>,
}

#[async_trait]
impl ContentPublisher for RecordingPublisher {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, content: &str) -> Result<ContentAddress, PublishError> {
        self.published.lock().unwrap().push(content.to_string());
        Ok(ContentAddress::new(format!("cid-{content}")))
    }
}
