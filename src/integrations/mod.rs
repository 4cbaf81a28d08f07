//! External service integrations.

pub mod salesforce {
    pub use crate::salesforce::*;
}

pub mod debounce {
    pub use crate::debounce::*;
}

pub mod smartlead {
    pub use crate::smartlead::*;
}

pub mod sheets {
    pub use crate::sheets::*;
}
