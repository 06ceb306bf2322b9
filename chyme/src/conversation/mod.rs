mod listener;
mod manager;

pub use listener::*;
pub use manager::*;
