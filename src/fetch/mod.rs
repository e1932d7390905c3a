pub mod driver;
pub mod report;
pub mod transport;
pub mod types;

pub use driver::time_get;
pub use report::{canonical_header_name, transfer_size, Report};
pub use transport::{HyperTransport, Transport};
pub use types::*;
