pub mod argv;
pub mod channel_adapter;
pub mod resource;
pub mod supervisor;

pub use channel_adapter::{default_gate, run_in_process, StdioChannel};
pub use supervisor::{run, RealSleeper, Sleeper, WorkerChannel};
