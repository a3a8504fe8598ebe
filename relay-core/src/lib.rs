pub mod admin;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod ipc;
pub mod legacy;
pub mod models;
pub mod store;
pub mod uploads;

pub use admin::{AdminCredentials, AdminError};
pub use config::RelayConfig;
pub use delivery::{
    create_sender, HttpSender, MessageSender, OutboundMessage, SendError, SendOutcome,
    SimulatedSender,
};
pub use error::{ControlError, RelayError};
pub use models::{LogEntry, NewSession, Session, SessionStatus, SessionView, StatusReport};
pub use store::SessionStore;
pub use uploads::UploadStore;
