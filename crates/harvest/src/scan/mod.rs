pub mod item;
pub mod pool;
pub mod scanner;

pub use item::{ArchiveOrigin, ItemKind, ScanItem};
pub use pool::{describe_all, ExtractionPool, FileJob};
pub use scanner::{ScanSummary, Scanner};
