//! Domain layer - Core objects with no gateway-client dependencies
//!
//! This layer contains:
//! - Entities: Guild, Channel, User, Message and reaction snapshots
//! - Traits: The ChatPlatform seam implemented by adapters

pub mod entities;
pub mod traits;
