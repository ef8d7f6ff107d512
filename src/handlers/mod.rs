mod events;
mod handler;
mod timeout_handler;

pub use events::*;
pub use handler::*;
pub use timeout_handler::*;
