//! Plain data shared by every layer of the crate.

pub mod capture;
pub mod exit_code;
pub mod outcome;
pub mod tool;
pub mod version;

pub use capture::*;
pub use exit_code::*;
pub use outcome::*;
pub use tool::*;
pub use version::*;
