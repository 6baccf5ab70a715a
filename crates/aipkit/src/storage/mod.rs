pub mod filesystem;
pub mod quarantine;

pub use quarantine::ErrorRouter;
