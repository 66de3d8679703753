//! Human-readable rendering of finished trees.

pub mod label_space;

pub use self::label_space::{substitute, LabelSpace};
