//! Type definitions

pub mod call;
pub mod campaign;
pub mod company;
pub mod import;
pub mod lead;
pub mod messages;
pub mod user;

pub use call::*;
pub use campaign::*;
pub use company::*;
pub use import::*;
pub use lead::*;
pub use messages::*;
pub use user::*;
