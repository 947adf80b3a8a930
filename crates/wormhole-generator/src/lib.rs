use serde::Serialize;
use thiserror::Error;
use wormhole_core::ShortCodeBase58;
use wormhole_snowflake::{Clock, Snowflake};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GeneratorError {
    /// The clock did not catch up within the configured bound. Retrying later
    /// may succeed.
    #[error("id generator is temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("id generator failed: {0}")]
    Failed(String),
}

impl From<wormhole_snowflake::Error> for GeneratorError {
    fn from(error: wormhole_snowflake::Error) -> Self {
        match error {
            wormhole_snowflake::Error::ClockWaitExceeded { .. } => {
                Self::Unavailable(error.to_string())
            }
            other => Self::Failed(other.to_string()),
        }
    }
}

/// A freshly allocated identifier together with its short code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedCode {
    pub id: u64,
    pub short_code: ShortCodeBase58,
}

impl From<u64> for GeneratedCode {
    fn from(id: u64) -> Self {
        Self {
            id,
            short_code: ShortCodeBase58::from_id(id),
        }
    }
}

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage and
/// must never hand out the same identifier twice.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> Result<GeneratedCode, GeneratorError>;
}

impl<C: Clock + 'static> Generator for Snowflake<C> {
    fn generate(&self) -> Result<GeneratedCode, GeneratorError> {
        let id = self.next_id()?;
        Ok(GeneratedCode::from(id.as_u64()))
    }
}
