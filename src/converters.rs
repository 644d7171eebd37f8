//! Built-in format converters.
//!
//! Each submodule pairs a tokenizing reader for one tool's native log format
//! with the normalizer that maps its records into the common model. They all
//! run the same shape of pipeline: validate-and-tokenize, normalize each
//! record (interning logical locations as they appear), then emit the run
//! through the [`LogWriter`](crate::writer::LogWriter) protocol.

pub mod android_studio;
pub mod fortify;
pub mod fxcop;
