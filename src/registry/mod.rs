pub mod blacklist;
pub mod exploits;
pub mod sanctions;

pub use blacklist::{BlacklistRegistry, MatchSeverity};
pub use exploits::{ExploitFilter, KnownExploit};
