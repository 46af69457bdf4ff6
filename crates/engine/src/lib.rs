pub mod alpaca;
pub mod executor;
pub mod shutdown;
pub mod stream;

pub use alpaca::AlpacaClient;
pub use executor::OrderExecutor;
pub use shutdown::{Shutdown, ShutdownHandle};
pub use stream::{CycleOutcome, Stage, StatusReport, StreamLoop, StreamSummary};
