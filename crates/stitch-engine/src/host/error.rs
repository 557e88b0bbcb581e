use thiserror::Error;

/// Failures surfaced by the host bridge and the worker protocol.
///
/// Every variant is terminal for the request that produced it; `Initialization`
/// is additionally terminal for the worker that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The compute module could not be instantiated. Never retried.
    #[error("compute module failed to initialize: {0}")]
    Initialization(String),

    /// Linear memory could not grow to cover the module's request.
    #[error("linear memory cannot grow to {requested} bytes (limit {limit} bytes)")]
    Allocation { requested: usize, limit: usize },

    /// Pitch/row arithmetic would step outside linear memory or the image.
    ///
    /// Indicates a broken invariant between host and module, not a user error.
    #[error("buffer marshalling out of range: {0}")]
    MarshalMismatch(String),

    /// A second overlap request was issued while one is still in flight.
    #[error("an overlap request is already in flight")]
    ProtocolViolation,

    #[error("image must be non-empty, got {width}x{height}")]
    EmptyImage { width: u32, height: u32 },

    #[error("pixel data is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    InvalidImage {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    /// The compute module panicked mid-request. The worker keeps answering,
    /// but only with this error.
    #[error("compute module faulted: {0}")]
    ModuleFault(String),

    /// The worker thread went away without sending a terminal message.
    #[error("stitch worker stopped before replying")]
    WorkerGone,
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
