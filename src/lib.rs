//! duotone: a dual-format object codec core. One decoding engine reads
//! either the textual or the binary wire grammar, dispatches field
//! names through precomputed 64-bit hashes, and resolves dynamic
//! subtype declarations against a registration-time allowlist.

pub mod bind;
pub mod cursor;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod options;
pub mod registry;
pub mod utils;

pub use bind::{
    AnyInstance, Field, FieldAccessor, Instance, Subtype, TypeBinding, TypeBindingBuilder,
};
pub use cursor::{
    BinaryCursor, BinaryTokenWriter, SavePoint, TextCursor, TokenCursor, WireFormat,
};
pub use decode::{AutoTypeFilter, DecodeContext};
pub use error::{DecodeError, DecodeErrorKind};
pub use options::DecodeOptions;
pub use registry::CodecRegistry;

pub type Result<T> = std::result::Result<T, DecodeError>;

/// Decode one value from textual input as the registered type
/// `type_name`. `Ok(None)` means the payload was an explicit null.
pub fn from_str(
    registry: &CodecRegistry,
    input: &str,
    type_name: &str,
    options: DecodeOptions,
) -> Result<Option<Instance>> {
    let mut cursor = TextCursor::new(input);
    registry.decode(&mut cursor, type_name, options)
}

/// Decode one value from binary input as the registered type
/// `type_name`.
pub fn from_slice(
    registry: &CodecRegistry,
    input: &[u8],
    type_name: &str,
    options: DecodeOptions,
) -> Result<Option<Instance>> {
    let mut cursor = BinaryCursor::new(input);
    registry.decode(&mut cursor, type_name, options)
}

/// Typed convenience over [`from_str`]: downcasts the decoded instance.
pub fn from_str_as<T: 'static>(
    registry: &CodecRegistry,
    input: &str,
    type_name: &str,
    options: DecodeOptions,
) -> Result<Option<T>> {
    downcast(from_str(registry, input, type_name, options)?)
}

/// Typed convenience over [`from_slice`].
pub fn from_slice_as<T: 'static>(
    registry: &CodecRegistry,
    input: &[u8],
    type_name: &str,
    options: DecodeOptions,
) -> Result<Option<T>> {
    downcast(from_slice(registry, input, type_name, options)?)
}

fn downcast<T: 'static>(instance: Option<Instance>) -> Result<Option<T>> {
    match instance {
        None => Ok(None),
        Some(instance) => instance
            .downcast::<T>()
            .map(|boxed| Some(*boxed))
            .map_err(|_| {
                DecodeError::unsupported("decoded instance has an unexpected concrete type", 0)
            }),
    }
}
