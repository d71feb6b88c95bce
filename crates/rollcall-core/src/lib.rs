pub mod clock;
pub mod constants;
pub mod error;
pub mod types;

pub use clock::{CivilClock, Clock, FixedClock};
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
