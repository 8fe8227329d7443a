use thiserror::Error;

/// DedupeError enumerates the recoverable failures of the pipeline.
#[derive(Error, Debug)]
pub enum DedupeError {
    //A bad invocation, e.g. an input path that does not exist
    #[error("{0}")]
    UsageError(String),

    //Could not open or read a file on disk
    #[error("{0}")]
    FileError(String),

    //The image library couldn't decode the file as an image
    #[error("{0}")]
    DecodeFail(String),
}
