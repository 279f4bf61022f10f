use std::sync::Arc;

use crate::bind::TypeBinding;
use crate::error::DecodeError;
use crate::Result;

use super::DecodeContext;

pub(crate) enum Resolution {
    /// The payload restated the type already being decoded.
    SelfSame,
    Redirect(Arc<TypeBinding>),
}

/// Resolve a wire-supplied type identifier to a concrete binding, or
/// refuse. Precedence: caller filter (hash, then literal name), the
/// declared type's own allowlist, the process registry (gated by the
/// support-auto-type flag or a configured filter), then the declared
/// type's default subtype.
pub(crate) fn resolve(
    expected: &Arc<TypeBinding>,
    type_hash: u64,
    type_name: &str,
    context: &DecodeContext<'_>,
    offset: usize,
) -> Result<Resolution> {
    if type_hash == expected.type_hash() {
        return Ok(Resolution::SelfSame);
    }

    if let Some(filter) = context.filter {
        let found = filter
            .by_hash(type_hash, expected, context.options)
            .or_else(|| filter.by_name(type_name, expected, context.options));
        if let Some(found) = found {
            tracing::trace!(type_name, "auto type resolved by filter");
            return Ok(finish(expected, found));
        }
    }

    if let Some(subtype) = expected.subtype_by_hash(type_hash) {
        return Ok(finish(expected, subtype));
    }

    // The security boundary: arbitrary registry types only when the
    // caller opted in.
    let registry_enabled = context.options.support_auto_type || context.filter.is_some();
    if registry_enabled {
        if let Some(found) = context.registry.resolve_by_hash(type_hash) {
            tracing::trace!(type_name, "auto type resolved from registry");
            return Ok(finish(expected, found));
        }
    }

    if let Some(default) = expected.default_subtype() {
        return Ok(finish(expected, Arc::clone(default)));
    }

    if registry_enabled {
        tracing::debug!(type_name, expected = expected.name(), "auto type unresolved");
        Err(DecodeError::auto_type_unresolved(type_name, offset))
    } else {
        tracing::debug!(type_name, expected = expected.name(), "auto type rejected");
        Err(DecodeError::auto_type_rejected(type_name, offset))
    }
}

fn finish(expected: &Arc<TypeBinding>, found: Arc<TypeBinding>) -> Resolution {
    if Arc::ptr_eq(expected, &found) {
        Resolution::SelfSame
    } else {
        Resolution::Redirect(found)
    }
}
