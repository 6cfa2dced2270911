use thiserror::Error;

/// Setup and caller mistakes. Hitting a wall, biting the tail or filling
/// the trash are game states, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("invalid configuration: {0}")]
    Configuration(String),
    #[error("invalid call: {0}")]
    InvalidCall(String),
}

pub type Result<T> = std::result::Result<T, GameError>;
