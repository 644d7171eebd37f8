#![doc = include_str!("../README.md")]

pub mod converters;
pub mod error;
pub mod locations;
pub mod model;
pub mod registry;
pub mod writer;
pub mod xml;

pub use error::{Error, FormatError, ProtocolViolation, ResolutionError, Result};
pub use model::ConversionRun;
pub use registry::{Converter, ConverterFactory, ConverterRegistry};
pub use writer::{JsonWriter, LogWriter, ObjectWriter};
