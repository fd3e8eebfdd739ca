use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error("invalid tracker config: {0}")]
    InvalidConfig(String),

    #[error("frame {got} delivered after frame {last}; frames must strictly increase")]
    FrameOutOfOrder { last: u64, got: u64 },

    #[error("innovation covariance is singular")]
    SingularInnovation,
}
