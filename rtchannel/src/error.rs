use thiserror::Error;

/// Transport-level failures.
///
/// These never describe callback failures: those are logged and swallowed at
/// the trigger site, and reach the application only through `on_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("channel is closed")]
    ChannelClosed,

    #[error("channel is not connected to a peer")]
    NotConnected,

    #[error("message of {size} bytes exceeds the maximum of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        let kind = match err {
            Error::ChannelClosed => std::io::ErrorKind::BrokenPipe,
            Error::NotConnected => std::io::ErrorKind::NotConnected,
            Error::MessageTooLarge { .. } => std::io::ErrorKind::InvalidInput,
        };
        std::io::Error::new(kind, err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
