/// Recommended error type for drivers built on the runner. Compatible with every fallible API in
/// this crate so `?` propagates cleanly.
pub type SquallResult<T> = anyhow::Result<T>;
