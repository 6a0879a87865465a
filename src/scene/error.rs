#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    NotInitialized,
    MonthMismatch { loaded: String, requested: String },
}

impl std::fmt::Display for SceneError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneError::NotInitialized => {
                write!(f, "month scene not initialized: send index-month-reset first")
            }
            SceneError::MonthMismatch { loaded, requested } => {
                write!(f, "patch for month {requested} does not match loaded month {loaded}")
            }
        }
    }
}

impl std::error::Error for SceneError {}
