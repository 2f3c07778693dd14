pub(crate) mod frame_task;
pub mod manifest;
pub mod options;
pub mod pool;
pub mod progress;
pub(crate) mod recovery;
pub mod run;
pub(crate) mod session_init;
pub mod sink;
