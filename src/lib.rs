//! escape-roomba - Discord bot that spins 🧵 reactions off into thread channels

pub mod application;
pub mod domain;
pub mod infrastructure;
