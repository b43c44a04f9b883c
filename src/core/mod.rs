pub mod artifacts;
pub mod logging;
pub mod notify;
pub mod queue;
pub mod voice;
