use core::fmt;

/// Errors returned by the ESB engine's public control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The engine has not been initialized (or has been disabled) and the operation requires it.
    NotInitialized,

    /// The operation requires the engine to be in the `Idle` state, but it is busy with an
    /// in-flight transaction.
    Busy,

    /// A supplied argument was out of range (bad pipe index, zero length, bad config value, ...).
    InvalidArgument,

    /// A payload exceeds `MAX_PAYLOAD`, or (in `Esb` mode) the configured fixed payload length.
    MessageTooLarge,

    /// The TX FIFO (or, for a secondary role, the ACK-payload registry) is full.
    QueueFull,

    /// The RX FIFO (or TX FIFO, for `pop_tx`) is empty.
    QueueEmpty,

    /// No radio peripheral is bound to the engine.
    NoDevice,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::NotInitialized => "engine not initialized",
            Error::Busy => "engine busy (not idle)",
            Error::InvalidArgument => "invalid argument",
            Error::MessageTooLarge => "payload too large",
            Error::QueueFull => "queue full",
            Error::QueueEmpty => "queue empty",
            Error::NoDevice => "no radio device bound",
        })
    }
}
