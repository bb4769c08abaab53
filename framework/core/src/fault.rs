/// Return this error to mark a failure as an unrecoverable run fault.
///
/// A run fault means the run cannot produce any further useful work, but it must not take the rest
/// of the session down with it. The run executor catches this error at the outermost boundary of
/// each run task, records a failed `operations` sample and converts it into an ordinary per-run
/// error result. Check for it with `err.is::<RunFaultError>()`.
#[derive(derive_more::Error, derive_more::Display, Debug)]
#[display("Unrecoverable run fault: {msg}")]
pub struct RunFaultError {
    msg: String,
}

impl RunFaultError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for RunFaultError {
    fn default() -> Self {
        Self {
            msg: "run task cannot continue".to_string(),
        }
    }
}
