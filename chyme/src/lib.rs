pub mod conversation;
pub mod directory;
pub mod error;
pub mod realtime;
pub mod transport;
pub mod unread;
pub mod voice;
