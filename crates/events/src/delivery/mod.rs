//! External delivery channels for user notifications.

pub mod email;
