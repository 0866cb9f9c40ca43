//! Webhook payload decoding
//!
//! Each platform posts its own JSON shape. Decoding reduces a body to a
//! [`ChangeEvent`], or to a reason for ignoring the delivery.

pub mod bitbucket;
pub mod github;
pub mod gitlab;

use thiserror::Error;

use broadcaster_core::domain::ChangeEvent;

use crate::service::Platform;

/// Largest accepted webhook body
pub const MAX_BODY_BYTES: usize = 1 << 20;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{platform}: failed to parse request body: {source}")]
    Malformed {
        platform: Platform,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}: repository not specified in JSON body")]
    MissingRepository(Platform),
}

/// Result of decoding one delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Event(ChangeEvent),
    /// Valid delivery that must not trigger anything
    Ignored(String),
}

/// Decode a webhook body sent by `platform`.
pub fn decode(platform: Platform, body: &[u8]) -> Result<Decoded, IngestError> {
    let malformed = |source| IngestError::Malformed { platform, source };

    match platform {
        Platform::GitHub => serde_json::from_slice::<github::PushEvent>(body)
            .map_err(malformed)?
            .into_decoded(),
        Platform::GitLab => serde_json::from_slice::<gitlab::PushEvent>(body)
            .map_err(malformed)?
            .into_decoded(),
        Platform::Bitbucket => serde_json::from_slice::<bitbucket::Payload>(body)
            .map_err(malformed)?
            .into_decoded(),
    }
}
