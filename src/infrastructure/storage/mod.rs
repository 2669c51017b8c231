pub mod local;

pub use local::LocalAttachmentStore;
