pub mod config;
pub mod errors;
pub mod event;
pub mod hub;
pub mod ids;
pub mod mailbox;
pub mod registry;
pub mod sweeper;

pub use config::HubConfig;
pub use errors::HubError;
pub use event::Event;
pub use hub::{EventHub, PollOutcome};
pub use ids::ClientId;
pub use mailbox::{DepositError, Mailbox, Received};
pub use registry::ClientRegistry;
pub use sweeper::{start_sweeper, SweepReport};
