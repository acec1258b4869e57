mod client;
mod control;
mod diff;
mod error;
mod logger;
mod naming;
mod protocol;
mod session;
mod snapshot;
mod types;

pub use client::{PduClient, PduClientBuilder};
pub use error::{Error, Result};
pub use logger::MessageLogMode;
pub use naming::{Field, Target};
pub use session::DEFAULT_SESSION_TTL;
pub use types::*;
