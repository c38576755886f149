use crate::service::InitPhase;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("service already started (phase {0:?})")]
    AlreadyStarted(InitPhase),
    #[error("neither protection nor annotation is enabled")]
    Disabled,
    #[error("service is not initialized (phase {0:?})")]
    NotInitialized(InitPhase),
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),
}
