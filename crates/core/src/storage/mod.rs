pub mod format;
pub mod memory;
pub mod traits;
