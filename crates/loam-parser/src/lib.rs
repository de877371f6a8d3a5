//! Reading, writing and normalizing org-style note files.
//!
//! The reader parses a single file into a [`loam_core::Note`] while
//! preserving enough verbatim structure that serializing an unmodified
//! note reproduces the input byte-for-byte. The writer is the only
//! component that puts note bytes on disk, and it always goes through a
//! temp-file-and-rename so a crash never leaves a half-written note.

pub mod normalize;
pub mod reader;
pub mod timestamps;
pub mod writer;

pub use normalize::{format_issues, normalize, title_from_path};
pub use reader::{extract_links, parse_note, read_note};
pub use timestamps::{format_org_timestamp, parse_org_timestamp};
pub use writer::{serialize, write_note};
