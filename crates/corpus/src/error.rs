use disfl_annotation::MarkupError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("{path}:{line}: expected 6 tab-separated fields, got {found}")]
    FieldCount {
        path: String,
        line: usize,
        found: usize,
    },
    #[error("{path}:{line}: malformed interval id {id:?}")]
    IntervalId {
        path: String,
        line: usize,
        id: String,
    },
    #[error("{path}:{line}: invalid timing {value:?}")]
    Timing {
        path: String,
        line: usize,
        value: String,
    },
    #[error("{path}:{line}: {source}")]
    Markup {
        path: String,
        line: usize,
        source: MarkupError,
    },
    #[error("{path}:{line}: malformed update header {header:?}")]
    UpdateHeader {
        path: String,
        line: usize,
        header: String,
    },
    #[error("{path}:{line}: row before the first update header")]
    RowOutsideUpdate { path: String, line: usize },
}
