pub mod attachment;
pub mod sla;
pub mod ticket;
pub mod timeline;

pub use attachment::*;
pub use sla::*;
pub use ticket::*;
pub use timeline::*;
