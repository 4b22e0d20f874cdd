//! External service integrations.

pub mod queries {
    pub use crate::queries::*;
}

pub mod whatsapp_gateway {
    pub use crate::whatsapp_gateway::*;
}
