use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WidgetError {
    #[error("ChatKit: Target element not found: {0}")]
    TargetNotFound(String),
}
