pub mod adapters;
pub mod app;
pub use app::{AppOptions, run};

pub mod config;
pub mod error;
pub mod model;
pub mod notify;
pub mod poller;
pub mod reconcile;
pub mod state;
pub mod termination;
pub mod utils;

// Platform abstraction layer
pub mod platform;

// Console front-end
pub mod ui {
    pub mod console;
    pub mod prompt;
}

// Re-export platform-specific implementations through unified interface
pub mod process {
    pub mod kill {
        pub use crate::platform::current::kill::*;
    }
    pub mod ports {
        pub use crate::platform::current::ports::*;
    }
}

#[cfg(test)]
mod testing;
