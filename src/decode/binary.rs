use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;

use crate::bind::{Instance, TypeBinding};
use crate::cursor::TokenCursor;
use crate::error::DecodeError;
use crate::utils::{hash64_str, NO_FIELD_HASH};
use crate::Result;

use super::auto_type::{self, Resolution};
use super::{
    decode_array_mapping, decode_enum_string, finish_object, number_text, DecodeContext,
    PendingFields,
};

/// Binary-format object decode. Same responsibilities as the text
/// variant, but the binary stream has no lookahead tokenization, so a
/// type redirect always restores the save point and replays the whole
/// object under the resolved type.
pub(crate) fn decode_binary_object(
    binding: &Arc<TypeBinding>,
    cursor: &mut dyn TokenCursor,
    context: &DecodeContext<'_>,
) -> Result<Option<Instance>> {
    if cursor.next_if_null() {
        return Ok(None);
    }
    if !binding.serializable() {
        return Err(DecodeError::not_serializable(binding.name(), cursor.offset()));
    }
    if cursor.is_string() {
        return decode_enum_string(binding.as_ref(), cursor);
    }

    let save = cursor.mark();

    if cursor.is_array_start() {
        if context.options.array_to_object {
            return decode_array_mapping(binding.as_ref(), cursor);
        }
        return Err(DecodeError::malformed(
            "expect object, found array",
            cursor.offset(),
        ));
    }
    if !cursor.next_if_object_start() {
        return Err(DecodeError::malformed("expect object", cursor.offset()));
    }

    let auto_type_allowed = context.options.support_auto_type
        || binding.auto_type_opt_in()
        || context.filter.is_some();

    let mut object: Option<Instance> = None;
    let mut pending: Option<PendingFields> = None;

    loop {
        if cursor.next_if_object_end() {
            if object.is_none() {
                object = binding.create_instance();
            }
            break;
        }

        let hash = cursor.next_field_name_hash()?;
        if hash == NO_FIELD_HASH {
            continue;
        }

        if (hash == binding.type_key_hash() || binding.default_subtype().is_some())
            && auto_type_allowed
        {
            let offset = cursor.offset();
            let mut type_name = SmolStr::default();
            let type_hash = match cursor.read_value_hash()? {
                Some(found) => {
                    type_name = SmolStr::new(cursor.last_string());
                    found
                }
                None if cursor.is_number() => match cursor.read_any()? {
                    Value::Number(number) => {
                        let text = number_text(&number);
                        let found = hash64_str(&text);
                        type_name = SmolStr::new(text);
                        found
                    }
                    _ => {
                        return Err(DecodeError::malformed(
                            "expected type discriminator",
                            offset,
                        ))
                    }
                },
                // Restore-always semantics make positioning moot; an
                // unreadable discriminator can still fall back to the
                // default subtype.
                None => NO_FIELD_HASH,
            };

            match auto_type::resolve(binding, type_hash, &type_name, context, offset)? {
                Resolution::SelfSame => continue,
                Resolution::Redirect(target) => {
                    cursor.restore(save);
                    tracing::trace!(
                        from = binding.name(),
                        to = target.name(),
                        "type redirect, replaying object"
                    );
                    return decode_binary_object(&target, cursor, context);
                }
            }
        }

        let mut accessor = binding.fields().lookup(hash).map(Arc::clone);
        if accessor.is_none() && context.options.smart_match {
            accessor = binding
                .fields()
                .lookup_lcase(cursor.lcase_hash())
                .map(Arc::clone);
        }

        if object.is_none() {
            object = binding.create_instance();
        }

        match accessor {
            None => {
                let name = SmolStr::new(cursor.last_string());
                let value = cursor.read_any()?;
                if let (Some(object), Some(sink)) = (object.as_mut(), binding.extras()) {
                    sink(object.as_mut(), &name, value);
                }
            }
            Some(accessor) => match object.as_mut() {
                Some(object) => accessor.read_into(cursor, object.as_mut())?,
                None => {
                    let value = accessor.read_value(cursor)?;
                    pending
                        .get_or_insert_with(PendingFields::default)
                        .push(hash, value);
                }
            },
        }
    }

    finish_object(binding.as_ref(), object, pending, cursor.offset()).map(Some)
}
