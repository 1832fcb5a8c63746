use thiserror::Error;

/// Construction-time errors. Returned synchronously from the fallible
/// constructors in [`crate::signal::SignalPool`] and [`crate::simulator::Simulator`];
/// no partial device is ever exposed when one of these is returned.
///
/// Contract violations (reading the NULL signal, writing a sealed pool on an
/// unregistered layer, scheduling a wake-up in the past, two writers racing
/// the same layer) are programmer errors and `panic!` instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("signal pool exhausted: at most {max} signals may be created")]
    SignalPoolExhausted { max: usize },

    #[error("too many chips registered: at most {max} chips may share a dependency mask")]
    TooManyChips { max: usize },

    #[error("duplicate signal name: {0:?}")]
    DuplicateSignalName(String),

    #[error("invalid layer assignment: layer {layer} was already claimed")]
    InvalidLayerAssignment { layer: u8 },

    #[error("unknown signal name: {0:?}")]
    UnknownSignalName(String),
}

pub type Result<T> = std::result::Result<T, Error>;
