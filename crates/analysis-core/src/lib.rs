pub mod clock;
pub mod error;
pub mod traits;
pub mod types;

pub use clock::*;
pub use error::*;
pub use traits::*;
pub use types::*;
