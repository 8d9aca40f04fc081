//! blockbridge core types: property values and sets, base names, block query strings
//! and the target-edition block representation.

#![forbid(unsafe_code)]

pub mod name;
pub mod parse;
pub mod props;
pub mod target;

pub use name::{BaseName, BlockQuery};
pub use props::{ComparedOutput, PropertySet, PropertyValue};
pub use target::{TargetBlock, TargetValue};

/// Historical per-base-name numeric discriminator.
pub type LegacyValue = u16;

/// Errors raised by the core parsers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("malformed property data {input:?}: {reason}")]
    MalformedPropertyData { input: String, reason: String },
}

impl Error {
    pub(crate) fn malformed(input: &str, reason: impl Into<String>) -> Self {
        Error::MalformedPropertyData { input: input.to_string(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use super::{
        BaseName, BlockQuery, ComparedOutput, Error, LegacyValue, PropertySet, PropertyValue,
        TargetBlock, TargetValue,
    };
}
