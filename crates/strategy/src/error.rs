#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyError {
    #[error("invalid strategy parameter {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("strategy computation failed: {0}")]
    Failed(String),
}
