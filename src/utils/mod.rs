pub mod client_addr;
pub mod clock;
pub mod error_handling;

pub use client_addr::{extract_client_addr, parse_client_ip};
pub use clock::{Clock, FixedClock, SystemClock};
pub use error_handling::with_backend_timeout;
