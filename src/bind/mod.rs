//! Declared type bindings: everything the decoder knows about one
//! static type, fixed at registration time.

pub(crate) mod field;

use std::sync::Arc;

use serde_json::Value;
use smallvec::SmallVec;
use smol_str::SmolStr;

use crate::dispatch::FieldTable;
use crate::utils::{hash64_str, TYPE_KEY};

pub use field::{AnyInstance, Field, FieldAccessor, Instance};

pub type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;
pub type ExtrasSink = Arc<dyn Fn(&mut AnyInstance, &str, Value) + Send + Sync>;
pub type BuildFn = Arc<dyn Fn(Instance) -> Instance + Send + Sync>;
pub type SchemaFn = Arc<dyn Fn(&AnyInstance) -> std::result::Result<(), String> + Send + Sync>;

/// One allowlisted subtype entry. The set is fixed at registration;
/// [`TypeBinding::append_subtype`] extends it by producing a fresh
/// binding snapshot, never by mutating this one.
#[derive(Clone)]
pub struct Subtype {
    pub name: SmolStr,
    pub hash: u64,
    pub binding: Arc<TypeBinding>,
}

#[derive(Clone)]
struct EnumVariant {
    name: SmolStr,
    hash: u64,
    make: Factory,
}

#[derive(Clone)]
pub struct TypeBinding {
    name: SmolStr,
    type_hash: u64,
    type_key: SmolStr,
    type_key_hash: u64,
    serializable: bool,
    factory: Option<Factory>,
    fields: FieldTable,
    subtypes: SmallVec<[Subtype; 4]>,
    default_subtype: Option<Arc<TypeBinding>>,
    variants: Vec<EnumVariant>,
    extras: Option<ExtrasSink>,
    build: Option<BuildFn>,
    schema: Option<SchemaFn>,
}

impl TypeBinding {
    pub fn builder(name: &str) -> TypeBindingBuilder {
        TypeBindingBuilder {
            name: SmolStr::new(name),
            type_key: SmolStr::new(TYPE_KEY),
            serializable: true,
            factory: None,
            fields: Vec::new(),
            subtypes: SmallVec::new(),
            default_subtype: None,
            variants: Vec::new(),
            extras: None,
            build: None,
            schema: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_hash(&self) -> u64 {
        self.type_hash
    }

    pub fn type_key(&self) -> &str {
        &self.type_key
    }

    pub fn type_key_hash(&self) -> u64 {
        self.type_key_hash
    }

    pub fn serializable(&self) -> bool {
        self.serializable
    }

    pub fn fields(&self) -> &FieldTable {
        &self.fields
    }

    pub fn subtypes(&self) -> &[Subtype] {
        &self.subtypes
    }

    pub fn default_subtype(&self) -> Option<&Arc<TypeBinding>> {
        self.default_subtype.as_ref()
    }

    /// Registering subtypes (or a default) is an opt-in to dynamic
    /// resolution among them, independent of the caller's flag.
    pub fn auto_type_opt_in(&self) -> bool {
        !self.subtypes.is_empty() || self.default_subtype.is_some()
    }

    pub fn is_enum(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn create_instance(&self) -> Option<Instance> {
        self.factory.as_ref().map(|factory| factory())
    }

    pub fn subtype_by_hash(&self, hash: u64) -> Option<Arc<TypeBinding>> {
        self.subtypes
            .iter()
            .find(|subtype| subtype.hash == hash)
            .map(|subtype| Arc::clone(&subtype.binding))
    }

    /// Enum-typed bindings: variant instance for a string value hash.
    pub fn enum_value(&self, hash: u64) -> Option<Instance> {
        self.variants
            .iter()
            .find(|variant| variant.hash == hash)
            .map(|variant| (variant.make)())
    }

    pub fn variant_name(&self, hash: u64) -> Option<&str> {
        self.variants
            .iter()
            .find(|variant| variant.hash == hash)
            .map(|variant| variant.name.as_str())
    }

    pub(crate) fn extras(&self) -> Option<&ExtrasSink> {
        self.extras.as_ref()
    }

    pub(crate) fn build_fn(&self) -> Option<&BuildFn> {
        self.build.as_ref()
    }

    pub(crate) fn schema(&self) -> Option<&SchemaFn> {
        self.schema.as_ref()
    }

    /// Pure copy-on-append: returns a binding whose allowlist also
    /// carries `subtype`, or `self` unchanged when the entry is already
    /// present (checked by identity). In-flight readers of the original
    /// snapshot are unaffected.
    pub fn append_subtype(
        self: &Arc<Self>,
        subtype: Arc<TypeBinding>,
        name: Option<&str>,
    ) -> Arc<TypeBinding> {
        for existing in &self.subtypes {
            if Arc::ptr_eq(&existing.binding, &subtype) {
                return Arc::clone(self);
            }
        }
        let name = name
            .map(SmolStr::new)
            .unwrap_or_else(|| subtype.name.clone());
        let mut next = TypeBinding::clone(self);
        next.subtypes.push(Subtype {
            hash: hash64_str(&name),
            name,
            binding: subtype,
        });
        Arc::new(next)
    }
}

impl std::fmt::Debug for TypeBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeBinding")
            .field("name", &self.name)
            .field("type_key", &self.type_key)
            .field("fields", &self.fields.len())
            .field("subtypes", &self.subtypes.len())
            .finish()
    }
}

pub struct TypeBindingBuilder {
    name: SmolStr,
    type_key: SmolStr,
    serializable: bool,
    factory: Option<Factory>,
    fields: Vec<Arc<dyn FieldAccessor>>,
    subtypes: SmallVec<[Subtype; 4]>,
    default_subtype: Option<Arc<TypeBinding>>,
    variants: Vec<EnumVariant>,
    extras: Option<ExtrasSink>,
    build: Option<BuildFn>,
    schema: Option<SchemaFn>,
}

impl TypeBindingBuilder {
    pub fn with_type_key(mut self, type_key: &str) -> Self {
        self.type_key = SmolStr::new(type_key);
        self
    }

    pub fn with_serializable(mut self, serializable: bool) -> Self {
        self.serializable = serializable;
        self
    }

    pub fn with_factory(
        mut self,
        factory: impl Fn() -> Instance + Send + Sync + 'static,
    ) -> Self {
        self.factory = Some(Arc::new(factory));
        self
    }

    pub fn with_field(mut self, field: impl FieldAccessor + 'static) -> Self {
        self.fields.push(Arc::new(field));
        self
    }

    pub fn with_subtype(self, binding: Arc<TypeBinding>) -> Self {
        let name = binding.name.clone();
        self.with_subtype_named(&name, binding)
    }

    pub fn with_subtype_named(mut self, name: &str, binding: Arc<TypeBinding>) -> Self {
        if !self
            .subtypes
            .iter()
            .any(|subtype| Arc::ptr_eq(&subtype.binding, &binding))
        {
            self.subtypes.push(Subtype {
                name: SmolStr::new(name),
                hash: hash64_str(name),
                binding,
            });
        }
        self
    }

    pub fn with_default_subtype(mut self, binding: Arc<TypeBinding>) -> Self {
        self.default_subtype = Some(binding);
        self
    }

    pub fn with_variant(
        mut self,
        name: &str,
        make: impl Fn() -> Instance + Send + Sync + 'static,
    ) -> Self {
        self.variants.push(EnumVariant {
            name: SmolStr::new(name),
            hash: hash64_str(name),
            make: Arc::new(make),
        });
        self
    }

    pub fn with_extras(
        mut self,
        sink: impl Fn(&mut AnyInstance, &str, Value) + Send + Sync + 'static,
    ) -> Self {
        self.extras = Some(Arc::new(sink));
        self
    }

    pub fn with_build(
        mut self,
        build: impl Fn(Instance) -> Instance + Send + Sync + 'static,
    ) -> Self {
        self.build = Some(Arc::new(build));
        self
    }

    pub fn with_schema(
        mut self,
        schema: impl Fn(&AnyInstance) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    pub fn build(self) -> TypeBinding {
        TypeBinding {
            type_hash: hash64_str(&self.name),
            type_key_hash: hash64_str(&self.type_key),
            name: self.name,
            type_key: self.type_key,
            serializable: self.serializable,
            factory: self.factory,
            fields: FieldTable::new(self.fields),
            subtypes: self.subtypes,
            default_subtype: self.default_subtype,
            variants: self.variants,
            extras: self.extras,
            build: self.build,
            schema: self.schema,
        }
    }
}
