mod fault;
mod shutdown;

pub mod prelude {
    pub use crate::fault::RunFaultError;
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle};
}
