#![deny(missing_docs)]
#![doc = "XML parameter templates: load a simulator parameter file, overwrite leaf fields by slash-separated path and serialize the result without disturbing anything else in the document."]

/// Parsed template documents and field overwrites.
pub mod document;
/// Slash-separated field addresses.
pub mod path;

pub use document::Template;
pub use path::FieldPath;
