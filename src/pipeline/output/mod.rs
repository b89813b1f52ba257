pub mod writer;

pub use writer::{PersistenceError, ResultWriter};
