//! Outbound HTTP collaborators: the delivery gateway client and the feedback
//! callback dispatcher.

pub mod error;
pub mod feedback;
pub mod gateway;
