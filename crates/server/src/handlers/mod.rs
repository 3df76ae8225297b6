//! HTTP request handlers.

pub mod health;
pub mod lookup;
pub mod verify;

pub use health::*;
pub use lookup::*;
pub use verify::*;
