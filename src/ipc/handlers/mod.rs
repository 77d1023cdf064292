pub mod backup;
pub mod core;
pub mod drafts;
pub mod results;
