pub mod cla;
pub mod directory;
pub mod user;

pub use cla::*;
pub use directory::*;
pub use user::*;
