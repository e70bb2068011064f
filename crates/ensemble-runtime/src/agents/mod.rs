//! Agent implementations built on the executor loop

pub mod react;

pub use react::ReactAgent;
