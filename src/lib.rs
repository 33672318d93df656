#![doc = include_str!("../README.md")]

mod error;
pub mod kdtree;
mod r#type;

pub use error::{KdTreeError, Result};
pub use r#type::CoordNum;

#[cfg(test)]
pub(crate) mod test;
