//! Filesystem side of the catalog: walking, filtering, file info, tag inference.

mod file_info;
mod filter;
mod tags;
mod walk;

pub use file_info::{hash_file, read_file_info, FileInfo};
pub use filter::{file_extension, EligibilityFilter, SkipReason};
pub use tags::TagRules;
pub use walk::{walk_files, PruneRules, WalkItem};
