use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Failed to open raster: {0}")]
    OpenFailure(String),
    #[error("Reprojected footprint is empty")]
    EmptyFootprint,
    #[error("Projection error: {0}")]
    Projection(String),
    #[error("Invariant violation: {0}")]
    Invariant(String),
    #[error("Runtime error: {0}")]
    Runtime(String),
    #[error("I/O error")]
    IOError(#[from] std::io::Error),
    #[error("Tiff error")]
    TiffError(#[from] tiff::TiffError),
}

impl From<proj4rs::errors::Error> for Error {
    fn from(err: proj4rs::errors::Error) -> Self {
        Error::Projection(err.to_string())
    }
}
