pub mod decoder;
pub mod loader;
pub mod resample;
pub mod windows;

pub use loader::{ClipLoader, DecodingLoader};
pub use windows::{ClipWindow, WindowPolicy};
