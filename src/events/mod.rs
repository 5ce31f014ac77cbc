//! Task event stream fan-out

pub mod broadcaster;

pub use broadcaster::{EventBroadcaster, ResumeMode, StoredEvent, Subscription};
