pub mod errors;
pub mod retry;
pub mod shutdown;

pub use errors::{DomainError, InfraError};
pub use retry::{persist_with_retry, retry_with_backoff, with_timeout, RetryConfig};
pub use shutdown::{listen_for_shutdown_signals, ShutdownSignal};
