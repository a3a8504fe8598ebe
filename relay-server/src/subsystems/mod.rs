pub mod coordinator;
pub mod worker;
