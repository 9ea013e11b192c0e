mod format;
mod globs;

pub use format::{format_author_date, parse_date_bound, DateBound};
pub use globs::{GlobCache, GlobMatcher};
