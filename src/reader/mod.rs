pub mod autosave;
pub mod session;
pub mod store;

pub use session::{ReaderSession, SessionState};
pub use store::{LocalFsProgressStore, ProgressStore};
