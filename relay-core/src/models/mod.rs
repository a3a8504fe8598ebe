pub mod log;
pub mod session;

pub use log::LogEntry;
pub use session::{
    interval_duration, mask_credential, NewSession, Session, SessionStatus, SessionView, StatusReport,
};
