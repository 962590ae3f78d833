//! External collaborators and the callback reconciler

pub mod provider;
pub mod reconciler;
pub mod storage;
pub mod titler;
