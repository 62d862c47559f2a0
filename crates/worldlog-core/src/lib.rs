// ABOUTME: Core data model for worldlog, independent of storage and runtime.
// ABOUTME: Provides entry/tag types, built-in action ids, and per-action formatting.

pub mod actions;
pub mod entry;
pub mod format;

pub use actions::ActionRegistry;
pub use entry::{Entry, EntryHeader, EntryId, Tags};
pub use format::{FormatterTable, template_formatter};
