//! Worker slot entry point: one long-lived process per slot, speaking the
//! length-prefixed wire protocol on stdin/stdout, spawned locally or over
//! `ssh` by the master's `ProcessTransport`.

use pbala_worker::{default_gate, RealSleeper, StdioChannel};

fn main() {
    let mut channel = StdioChannel::new(std::io::stdin(), std::io::stdout());
    let gate = default_gate();
    pbala_worker::run(&mut channel, &gate, &RealSleeper);
}
