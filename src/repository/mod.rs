mod git_log;
mod git_store;
mod materialize;
mod memory;
mod oracle;
mod port;
mod tree_walk;

pub use git_log::{read_commit_log, GitLogOracle};
pub use git_store::GitObjectStore;
pub use materialize::{discard_dir, empty_dir, ArchiveFormat, ScratchSpace, TreeMaterializer};
pub use memory::{CommitBuilder, MemoryRepository};
pub use oracle::{CommitLogQuery, CommitOracle};
pub use port::ObjectStore;
