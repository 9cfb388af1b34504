use snafu::Snafu;

/// The abstract error kinds from the transport's error handling design.
///
/// `ConfigError` and `IllegalArgument` are raised at call time and surface
/// immediately to the caller. `DecodeError` is converted to an HTTP 400 at
/// the dispatcher boundary. `HttpOperationFailed` carries the URL, status
/// code and status message back to the outbound caller. `Cancelled` and
/// `InternalError` cover the remaining failure paths.
#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("configuration error: {message}"))]
    ConfigError { message: String },

    #[snafu(display("decode error: {message}"))]
    DecodeError { message: String },

    #[snafu(display("illegal argument: {message}"))]
    IllegalArgument { message: String },

    #[snafu(display(
        "HTTP operation failed because {reason} (url={url}, status={status:?})"
    ))]
    HttpOperationFailed {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[snafu(display("operation cancelled: {message}"))]
    Cancelled { message: String },

    #[snafu(display("internal error: {message}"))]
    InternalError { message: String },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Error {
        Error::ConfigError {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Error {
        Error::DecodeError {
            message: message.into(),
        }
    }

    pub fn illegal_argument(message: impl Into<String>) -> Error {
        Error::IllegalArgument {
            message: message.into(),
        }
    }

    pub fn http_operation_failed(
        url: impl Into<String>,
        status: Option<u16>,
        reason: impl Into<String>,
    ) -> Error {
        Error::HttpOperationFailed {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }
}

/// Result type alias used throughout the crate, mirroring the shape of a
/// protocol-binding SDK's `message::Result`.
pub type Result<T> = std::result::Result<T, Error>;
