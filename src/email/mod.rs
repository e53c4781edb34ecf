pub mod common;
pub mod transport;

// Re-export commonly used items
pub use common::{extract_sender_name, MailThread, RawMessage};
pub use transport::{MailDelivery, MailQuery};
