//! The object model: tracks, objects, and their metadata extensions.

mod extension;
mod object;
mod time;
mod track;

pub use extension::*;
pub use object::*;
pub use time::*;
pub use track::*;
