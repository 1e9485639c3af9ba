pub mod channel_transport;
pub mod process_transport;
pub mod transport;
pub mod wire;

pub use channel_transport::{ChannelTransport, WorkerFn};
pub use process_transport::{ProcessTransport, WorkerLauncher};
pub use transport::{Slot, Transport, TransportError};
pub use wire::{read_frame, write_frame, Greeting, ToMaster, ToWorker, Work};
