//! Converter resolution and the end-to-end conversion driver.
//!
//! Converters are found by tool name through a chain of registries: a
//! caller-supplied registry (the plugin surface) is consulted first and
//! forwards to the built-in one. Registries are built once at startup and
//! only read afterwards, so sharing one across concurrent conversions is
//! fine; the writers and location tables a conversion uses are not.

use crate::error::{Error, ResolutionError};
use crate::writer::LogWriter;
use std::collections::BTreeMap;
use std::io::BufRead;

/// A format-specific reader + normalizer pair, driven start to finish by
/// [`ConverterRegistry::convert`].
pub trait Converter {
    /// The tool whose logs this converter understands, as recorded in the
    /// output log's tool metadata.
    fn tool_name(&self) -> &'static str;

    /// Parses `input`, normalizes every diagnostic it contains and emits the
    /// whole run through `output`. Errors from any stage propagate unwrapped;
    /// there is no partial output on failure beyond what a streaming writer
    /// already flushed.
    fn convert(&mut self, input: &mut dyn BufRead, output: &mut dyn LogWriter)
        -> Result<(), Error>;
}

/// Converters must be default-constructible; the registry stores factories,
/// not instances, so every conversion gets a fresh converter.
pub type ConverterFactory = fn() -> Box<dyn Converter>;

/// Tool-name → converter factory table with an optional fallback registry,
/// forming a chain of responsibility.
pub struct ConverterRegistry {
    factories: BTreeMap<String, ConverterFactory>,
    next: Option<Box<ConverterRegistry>>,
}

impl ConverterRegistry {
    /// An empty registry with no fallback.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            next: None,
        }
    }

    /// The built-in converter table.
    pub fn builtin() -> Self {
        let mut registry = Self::new();

        // the table is under our control, collisions here are a bug
        registry
            .register(crate::converters::fxcop::TOOL_NAME, || {
                Box::new(crate::converters::fxcop::FxCopConverter::new())
            })
            .unwrap();
        registry
            .register(crate::converters::fortify::TOOL_NAME, || {
                Box::new(crate::converters::fortify::FortifyConverter::new())
            })
            .unwrap();
        registry
            .register(crate::converters::android_studio::TOOL_NAME, || {
                Box::new(crate::converters::android_studio::AndroidStudioConverter::new())
            })
            .unwrap();

        registry
    }

    /// Registers a converter factory for `tool`. Registering the same tool
    /// twice in one registry is a [`ResolutionError::DuplicateTool`];
    /// shadowing a tool of a *fallback* registry is how plugins override
    /// built-ins and is fine.
    pub fn register(
        &mut self,
        tool: impl Into<String>,
        factory: ConverterFactory,
    ) -> Result<(), ResolutionError> {
        let tool = tool.into();

        if self.factories.contains_key(&tool) {
            return Err(ResolutionError::DuplicateTool { tool });
        }

        self.factories.insert(tool, factory);
        Ok(())
    }

    /// Appends `next` to the end of this registry's chain.
    pub fn with_fallback(mut self, next: ConverterRegistry) -> Self {
        let mut link = &mut self.next;
        while let Some(existing) = link {
            link = &mut existing.next;
        }
        *link = Some(Box::new(next));
        self
    }

    /// Resolves `tool` along the chain, instantiating a fresh converter.
    pub fn create(&self, tool: &str) -> Result<Box<dyn Converter>, ResolutionError> {
        let mut link = Some(self);

        while let Some(registry) = link {
            if let Some(factory) = registry.factories.get(tool) {
                return Ok(factory());
            }
            link = registry.next.as_deref();
        }

        Err(ResolutionError::UnknownTool {
            tool: tool.to_owned(),
        })
    }

    /// Resolves `tool` and runs the conversion end to end.
    pub fn convert(
        &self,
        tool: &str,
        input: &mut dyn BufRead,
        output: &mut dyn LogWriter,
    ) -> Result<(), Error> {
        let mut converter = self.create(tool)?;
        log::debug!("converting a {tool} log");
        converter.convert(input, output)
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
