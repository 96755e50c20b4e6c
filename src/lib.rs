pub mod app;
pub mod cli;
pub mod clock;
pub mod config;
pub mod display;
pub mod extrapolate;
pub mod query;
pub mod snapshot;

pub use query::QueryError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    InvalidArgs(String),
    Io(std::io::Error),
    Parse(String),
    Query(QueryError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidArgs(msg) => write!(f, "invalid arguments: {msg}"),
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Parse(msg) => write!(f, "parse error: {msg}"),
            Error::Query(err) => write!(f, "query error: {err}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}

impl From<QueryError> for Error {
    fn from(value: QueryError) -> Self {
        Error::Query(value)
    }
}
