pub mod access;
pub mod clearance;
pub mod credential;
pub mod error;
pub mod events;
pub mod policy;
pub mod sealer;
pub mod server;
pub mod verify;
