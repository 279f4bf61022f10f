//! The object decoder core: drives a token cursor and a field dispatch
//! table to materialize one typed instance, resolving dynamic subtype
//! declarations along the way.

pub(crate) mod auto_type;
mod binary;
mod object;

use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;

use crate::bind::{Instance, TypeBinding};
use crate::cursor::TokenCursor;
use crate::error::DecodeError;
use crate::options::DecodeOptions;
use crate::registry::CodecRegistry;
use crate::Result;

pub(crate) use binary::decode_binary_object;
pub(crate) use object::decode_object;

/// Caller-supplied resolution hook, consulted before any other
/// auto-type machinery. Configuring one also enables registry
/// resolution, exactly like the support-auto-type flag.
pub trait AutoTypeFilter: Send + Sync {
    fn by_hash(
        &self,
        type_hash: u64,
        expected: &TypeBinding,
        options: DecodeOptions,
    ) -> Option<Arc<TypeBinding>>;

    /// Fallback for names the hash form could not match.
    fn by_name(
        &self,
        _name: &str,
        _expected: &TypeBinding,
        _options: DecodeOptions,
    ) -> Option<Arc<TypeBinding>> {
        None
    }
}

pub struct DecodeContext<'a> {
    pub registry: &'a CodecRegistry,
    pub options: DecodeOptions,
    pub filter: Option<&'a dyn AutoTypeFilter>,
    /// Name of the field whose value is being decoded, when decoding
    /// was entered on behalf of an enclosing object. Diagnostics only;
    /// a redirect passes it through to the resolved decoder unchanged.
    pub field_name: Option<&'a str>,
}

/// Field values decoded before any instance could be allocated.
/// Replace-on-equal-hash, original encounter position kept.
#[derive(Default)]
pub(crate) struct PendingFields {
    entries: SmallVec<[(u64, Value); 8]>,
}

impl PendingFields {
    pub(crate) fn push(&mut self, hash: u64, value: Value) {
        if let Some(entry) = self.entries.iter_mut().find(|(stored, _)| *stored == hash) {
            entry.1 = value;
        } else {
            self.entries.push((hash, value));
        }
    }
}

/// Shared completion path: allocate if still missing, drain pending
/// values in encounter order, run the build transform, validate.
pub(crate) fn finish_object(
    binding: &TypeBinding,
    object: Option<Instance>,
    pending: Option<PendingFields>,
    offset: usize,
) -> Result<Instance> {
    let mut object = object.or_else(|| binding.create_instance()).ok_or_else(|| {
        DecodeError::unsupported(
            format!("cannot create instance of {}", binding.name()),
            offset,
        )
    })?;
    if let Some(pending) = pending {
        for (hash, value) in pending.entries {
            if let Some(accessor) = binding.fields().lookup(hash) {
                accessor.apply(object.as_mut(), value, offset)?;
            }
        }
    }
    if let Some(build) = binding.build_fn() {
        object = build(object);
    }
    if let Some(schema) = binding.schema() {
        schema(object.as_ref()).map_err(|message| DecodeError::schema(message, offset))?;
    }
    Ok(object)
}

/// String payload for an object-typed decode: only enum values can
/// satisfy it, either on the binding itself or among its allowlisted
/// subtypes.
pub(crate) fn decode_enum_string(
    binding: &TypeBinding,
    cursor: &mut dyn TokenCursor,
) -> Result<Option<Instance>> {
    let offset = cursor.offset();
    let hash = cursor
        .read_value_hash()?
        .ok_or_else(|| DecodeError::malformed("expected string", offset))?;
    if let Some(instance) = binding.enum_value(hash) {
        return Ok(Some(instance));
    }
    for subtype in binding.subtypes() {
        if let Some(instance) = subtype.binding.enum_value(hash) {
            return Ok(Some(instance));
        }
    }
    Err(DecodeError::unsupported(
        format!("not support input {}", cursor.last_string()),
        offset,
    ))
}

/// Array shortcut: positions map to fields in declaration order.
pub(crate) fn decode_array_mapping(
    binding: &TypeBinding,
    cursor: &mut dyn TokenCursor,
) -> Result<Option<Instance>> {
    let offset = cursor.offset();
    if !cursor.next_if_array_start() {
        return Err(DecodeError::malformed("expected array", offset));
    }
    let mut object = binding.create_instance().ok_or_else(|| {
        DecodeError::unsupported(
            format!("cannot create instance of {}", binding.name()),
            offset,
        )
    })?;
    for accessor in binding.fields().in_order() {
        if cursor.next_if_array_end() {
            return Err(DecodeError::malformed(
                "array shortcut ended before all fields",
                cursor.offset(),
            ));
        }
        accessor.read_into(cursor, object.as_mut())?;
    }
    if !cursor.next_if_array_end() {
        return Err(DecodeError::malformed(
            "array shortcut has extra elements",
            cursor.offset(),
        ));
    }
    finish_object(binding, Some(object), None, cursor.offset()).map(Some)
}

pub(crate) fn number_text(number: &serde_json::Number) -> String {
    if let Some(value) = number.as_i64() {
        itoa::Buffer::new().format(value).to_string()
    } else if let Some(value) = number.as_u64() {
        itoa::Buffer::new().format(value).to_string()
    } else {
        number.to_string()
    }
}
