// Domain-layer modules and shared errors/models
pub mod period {
    pub use crate::period::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod report_builder {
    pub use crate::report_builder::*;
}

pub mod recipients {
    pub use crate::recipients::*;
}

pub mod errors {
    pub use crate::errors::*;
}
