pub mod file;
pub mod mime;
pub mod walk;

pub use file::{EntryKind, FileDescriptor};
pub use mime::{resolver_for, ExtensionGuess, FileCommand, MimeResolver};
