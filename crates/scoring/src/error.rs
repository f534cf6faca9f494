#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to {operation} {path}: {source}")]
    Output {
        operation: &'static str,
        path: String,
        source: std::io::Error,
    },
}

impl Error {
    pub fn output(operation: &'static str, path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Output {
            operation,
            path: path.display().to_string(),
            source,
        }
    }
}
