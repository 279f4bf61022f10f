use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;

use crate::bind::{Instance, TypeBinding};
use crate::cursor::{SavePoint, TokenCursor};
use crate::error::DecodeError;
use crate::utils::{hash64_str, HASH_TYPE_KEY, NO_FIELD_HASH};
use crate::Result;

use super::auto_type::{self, Resolution};
use super::{
    decode_array_mapping, decode_enum_string, finish_object, number_text, DecodeContext,
    PendingFields,
};

/// Text-format object decode. The save point taken before the field
/// loop backs the backtracking type redirect: a declaration surfacing
/// after other fields forces a replay of the whole object under the
/// resolved type's own dispatch table.
pub(crate) fn decode_object(
    binding: &Arc<TypeBinding>,
    cursor: &mut dyn TokenCursor,
    context: &DecodeContext<'_>,
) -> Result<Option<Instance>> {
    if cursor.next_if_null() {
        cursor.next_if_comma();
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
            let object = decode_array_mapping(binding.as_ref(), cursor)?;
            cursor.next_if_comma();
            return Ok(object);
        }
        return Err(DecodeError::malformed(
            "expect object, found array",
            cursor.offset(),
        ));
    }

    if !cursor.next_if_object_start() {
        // Legacy writers emitted bare booleans for absent objects;
        // consume and yield nothing.
        if cursor.is_bool() {
            cursor.read_bool()?;
            return Ok(None);
        }
        // A redirect that consumed a leading type key delegates here
        // mid-object; anything else is malformed.
        if !cursor.is_field_boundary() {
            return Err(DecodeError::malformed("expect object", cursor.offset()));
        }
    }

    let auto_type_allowed = context.options.support_auto_type
        || binding.auto_type_opt_in()
        || context.filter.is_some();

    let mut object: Option<Instance> = None;
    let mut pending: Option<PendingFields> = None;

    for index in 0.. {
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
            match redirect(binding, cursor, context, save, index, hash)? {
                RedirectOutcome::Continue => continue,
                RedirectOutcome::Done(result) => return Ok(result),
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

    let object = finish_object(binding.as_ref(), object, pending, cursor.offset())?;
    cursor.next_if_comma();
    Ok(Some(object))
}

enum RedirectOutcome {
    /// Declaration restated the current type; keep looping.
    Continue,
    Done(Option<Instance>),
}

fn redirect(
    binding: &Arc<TypeBinding>,
    cursor: &mut dyn TokenCursor,
    context: &DecodeContext<'_>,
    save: SavePoint,
    index: usize,
    hash: u64,
) -> Result<RedirectOutcome> {
    let offset = cursor.offset();

    let mut type_number: Option<serde_json::Number> = None;
    let mut consumed = true;
    let type_hash = match cursor.read_value_hash()? {
        Some(found) => found,
        None if cursor.is_number() => match cursor.read_any()? {
            Value::Number(number) => {
                let text = number_text(&number);
                let found = hash64_str(&text);
                type_number = Some(number);
                found
            }
            _ => {
                return Err(DecodeError::malformed(
                    "expected type discriminator",
                    offset,
                ))
            }
        },
        None => {
            consumed = false;
            NO_FIELD_HASH
        }
    };
    let type_name: SmolStr = match &type_number {
        Some(number) => SmolStr::new(number_text(number)),
        None if consumed => SmolStr::new(cursor.last_string()),
        None => SmolStr::default(),
    };

    match auto_type::resolve(binding, type_hash, &type_name, context, offset)? {
        Resolution::SelfSame => Ok(RedirectOutcome::Continue),
        Resolution::Redirect(target) => {
            // Types may keep the discriminator as an ordinary field:
            // an accessor under the redirect hash or the type-key name
            // gets the raw value fed back after delegation.
            let retained = target
                .fields()
                .lookup(hash)
                .or_else(|| {
                    if hash != HASH_TYPE_KEY {
                        target.fields().get(binding.type_key())
                    } else {
                        None
                    }
                })
                .map(Arc::clone);

            if index != 0 || retained.is_some() || !consumed {
                cursor.restore(save);
                tracing::trace!(
                    from = binding.name(),
                    to = target.name(),
                    "type redirect, replaying object"
                );
            } else {
                tracing::trace!(
                    from = binding.name(),
                    to = target.name(),
                    "type redirect, delegating remainder"
                );
            }

            let Some(mut decoded) = decode_object(&target, cursor, context)? else {
                return Ok(RedirectOutcome::Done(None));
            };
            if let Some(accessor) = retained {
                let raw = match type_number {
                    Some(number) => Value::Number(number),
                    None => Value::String(type_name.to_string()),
                };
                accessor.apply(decoded.as_mut(), raw, cursor.offset())?;
            }
            Ok(RedirectOutcome::Done(Some(decoded)))
        }
    }
}
