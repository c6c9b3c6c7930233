pub mod error;
pub mod id;
pub mod key;

pub use error::*;
pub use id::*;
pub use key::*;
