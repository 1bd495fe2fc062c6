pub mod dlq;
pub mod envelope;
pub mod stream;

pub use dlq::{DeadLetterEntry, send_to_dlq};
pub use envelope::TaskEnvelope;
pub use stream::{BrokerError, Delivery, StreamClient};
