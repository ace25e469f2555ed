pub mod complaint;
pub mod error;
pub mod feature_flags;
pub mod requests;
pub mod user;

pub use complaint::*;
pub use error::*;
pub use feature_flags::*;
pub use requests::*;
pub use user::*;
