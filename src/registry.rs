use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;

use crate::bind::{Instance, TypeBinding};
use crate::cursor::{TokenCursor, WireFormat};
use crate::decode::{decode_binary_object, decode_object, AutoTypeFilter, DecodeContext};
use crate::error::DecodeError;
use crate::options::DecodeOptions;
use crate::utils::hash64_str;
use crate::Result;

/// Process-wide auto-type registry: type-name hash to binding.
///
/// Reads are lock-free snapshot loads so unlimited concurrent decode
/// calls never block; registration clones the map under a mutex and
/// publishes a fresh snapshot.
pub struct CodecRegistry {
    bindings: ArcSwap<HashMap<u64, Arc<TypeBinding>>>,
    write_lock: Mutex<()>,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            bindings: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn register(&self, binding: TypeBinding) -> Arc<TypeBinding> {
        let binding = Arc::new(binding);
        self.publish(Arc::clone(&binding));
        binding
    }

    /// Publish a binding under its type-name hash, replacing any
    /// previous snapshot entry. Used both for first registration and
    /// for republishing the result of an `append_subtype`.
    pub fn publish(&self, binding: Arc<TypeBinding>) {
        let _guard = self.write_lock.lock().expect("registry write lock");
        let mut next = (*self.bindings.load_full()).clone();
        next.insert(binding.type_hash(), binding);
        self.bindings.store(Arc::new(next));
    }

    pub fn resolve_by_hash(&self, hash: u64) -> Option<Arc<TypeBinding>> {
        self.bindings.load().get(&hash).map(Arc::clone)
    }

    pub fn resolve_by_name(&self, name: &str) -> Option<Arc<TypeBinding>> {
        self.resolve_by_hash(hash64_str(name))
    }

    /// Decode one value as the registered type `type_name`. Returns
    /// `Ok(None)` for an explicit wire null.
    pub fn decode(
        &self,
        cursor: &mut dyn TokenCursor,
        type_name: &str,
        options: DecodeOptions,
    ) -> Result<Option<Instance>> {
        self.decode_inner(cursor, type_name, None, options, None)
    }

    /// Like [`CodecRegistry::decode`], tagging errors with the name of
    /// the enclosing field the value belongs to.
    pub fn decode_field(
        &self,
        cursor: &mut dyn TokenCursor,
        type_name: &str,
        field_name: &str,
        options: DecodeOptions,
    ) -> Result<Option<Instance>> {
        self.decode_inner(cursor, type_name, Some(field_name), options, None)
    }

    pub fn decode_with_filter(
        &self,
        cursor: &mut dyn TokenCursor,
        type_name: &str,
        options: DecodeOptions,
        filter: &dyn AutoTypeFilter,
    ) -> Result<Option<Instance>> {
        self.decode_inner(cursor, type_name, None, options, Some(filter))
    }

    fn decode_inner(
        &self,
        cursor: &mut dyn TokenCursor,
        type_name: &str,
        field_name: Option<&str>,
        options: DecodeOptions,
        filter: Option<&dyn AutoTypeFilter>,
    ) -> Result<Option<Instance>> {
        let binding = self.resolve_by_name(type_name).ok_or_else(|| {
            let message = match field_name {
                Some(field) => format!("type {type_name} of field {field} is not registered"),
                None => format!("type {type_name} is not registered"),
            };
            DecodeError::unsupported(message, cursor.offset())
        })?;
        let context = DecodeContext {
            registry: self,
            options,
            filter,
            field_name,
        };
        match cursor.format() {
            WireFormat::Text => decode_object(&binding, cursor, &context),
            WireFormat::Binary => decode_binary_object(&binding, cursor, &context),
        }
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("types", &self.bindings.load().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    fn test_register_and_resolve() {
        let registry = CodecRegistry::new();
        let binding = registry.register(TypeBinding::builder("Widget").build());
        assert!(Arc::ptr_eq(
            &registry.resolve_by_name("Widget").unwrap(),
            &binding
        ));
        assert!(registry.resolve_by_name("Gadget").is_none());
    }

    #[rstest::rstest]
    fn test_publish_replaces_snapshot() {
        let registry = CodecRegistry::new();
        let widget = registry.register(TypeBinding::builder("Widget").build());
        let gadget = registry.register(TypeBinding::builder("Gadget").build());
        let extended = widget.append_subtype(gadget, None);
        registry.publish(Arc::clone(&extended));

        let resolved = registry.resolve_by_name("Widget").unwrap();
        assert!(Arc::ptr_eq(&resolved, &extended));
        assert_eq!(resolved.subtypes().len(), 1);
    }

    #[rstest::rstest]
    fn test_snapshot_reads_survive_concurrent_registration() {
        let registry = Arc::new(CodecRegistry::new());
        registry.register(TypeBinding::builder("Widget").build());

        let reader = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    assert!(registry.resolve_by_name("Widget").is_some());
                }
            })
        };
        for index in 0..100 {
            registry.register(TypeBinding::builder(&format!("Type{index}")).build());
        }
        reader.join().expect("reader thread");
    }
}
