pub mod filesystem;

pub use filesystem::{ByteSource, DocumentStore};
