use thiserror::Error;

#[derive(Error, Debug)]
pub enum VitalsError {
    #[error("Data not loaded: {0}")]
    NotLoaded(String),

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("File not found: {0}")]
    MissingFile(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("{0}")]
    General(String),
}

#[cfg(feature = "python")]
impl From<VitalsError> for pyo3::PyErr {
    fn from(err: VitalsError) -> pyo3::PyErr {
        match err {
            VitalsError::InvalidData(_) => pyo3::exceptions::PyValueError::new_err(err.to_string()),
            _ => pyo3::exceptions::PyRuntimeError::new_err(err.to_string()),
        }
    }
}
