pub mod app;
pub mod download;
pub mod evict;
pub mod rebuild;
pub mod verify;

pub use app::App;
