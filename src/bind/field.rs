use std::any::Any;

use serde_json::Value;
use smol_str::SmolStr;

use crate::cursor::TokenCursor;
use crate::error::DecodeError;
use crate::utils::{hash64_lcase, hash64_str};
use crate::Result;

/// Unsized view of a decoded object instance.
pub type AnyInstance = dyn Any + Send + Sync;

/// A decoded, type-erased object instance.
pub type Instance = Box<AnyInstance>;

/// One field of a declared type: parses a value from the cursor and
/// assigns it, or applies an already-parsed value (deferred
/// application and discriminator feeding use the latter).
pub trait FieldAccessor: Send + Sync {
    fn name(&self) -> &str;
    fn hash(&self) -> u64;
    fn lcase_hash(&self) -> u64;

    fn read_value(&self, cursor: &mut dyn TokenCursor) -> Result<Value> {
        cursor.read_any()
    }

    fn read_into(&self, cursor: &mut dyn TokenCursor, target: &mut AnyInstance) -> Result<()> {
        let offset = cursor.offset();
        let value = self.read_value(cursor)?;
        self.apply(target, value, offset)
    }

    fn apply(&self, target: &mut AnyInstance, value: Value, offset: usize) -> Result<()>;
}

type Setter<T> = Box<dyn Fn(&mut T, Value) -> std::result::Result<(), String> + Send + Sync>;

/// Typed accessor applying values through a setter closure.
pub struct Field<T> {
    name: SmolStr,
    hash: u64,
    lcase: u64,
    set: Setter<T>,
}

impl<T: 'static> Field<T> {
    pub fn new(
        name: &str,
        set: impl Fn(&mut T, Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: SmolStr::new(name),
            hash: hash64_str(name),
            lcase: hash64_lcase(name),
            set: Box::new(set),
        }
    }

    pub fn string(name: &str, set: impl Fn(&mut T, String) + Send + Sync + 'static) -> Self {
        Self::new(name, move |target, value| match value {
            Value::String(text) => {
                set(target, text);
                Ok(())
            }
            other => Err(format!("expected string, found {other}")),
        })
    }

    pub fn i64(name: &str, set: impl Fn(&mut T, i64) + Send + Sync + 'static) -> Self {
        Self::new(name, move |target, value| {
            let number = value
                .as_i64()
                .ok_or_else(|| format!("expected integer, found {value}"))?;
            set(target, number);
            Ok(())
        })
    }

    pub fn f64(name: &str, set: impl Fn(&mut T, f64) + Send + Sync + 'static) -> Self {
        Self::new(name, move |target, value| {
            let number = value
                .as_f64()
                .ok_or_else(|| format!("expected number, found {value}"))?;
            set(target, number);
            Ok(())
        })
    }

    pub fn bool(name: &str, set: impl Fn(&mut T, bool) + Send + Sync + 'static) -> Self {
        Self::new(name, move |target, value| match value {
            Value::Bool(flag) => {
                set(target, flag);
                Ok(())
            }
            other => Err(format!("expected boolean, found {other}")),
        })
    }
}

impl<T: 'static> FieldAccessor for Field<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn hash(&self) -> u64 {
        self.hash
    }

    fn lcase_hash(&self) -> u64 {
        self.lcase
    }

    fn apply(&self, target: &mut AnyInstance, value: Value, offset: usize) -> Result<()> {
        let target = target.downcast_mut::<T>().ok_or_else(|| {
            DecodeError::unsupported(
                format!("field {} applied to unexpected instance type", self.name),
                offset,
            )
        })?;
        (self.set)(target, value)
            .map_err(|message| DecodeError::unsupported(format!("{}: {message}", self.name), offset))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Point {
        x: i64,
        label: String,
    }

    #[rstest::rstest]
    fn test_apply_typed_value() {
        let field = Field::<Point>::i64("x", |point, value| point.x = value);
        let mut point = Point::default();
        field.apply(&mut point, json!(7), 0).unwrap();
        assert_eq!(point.x, 7);
    }

    #[rstest::rstest]
    fn test_apply_rejects_mismatched_value() {
        let field = Field::<Point>::i64("x", |point, value| point.x = value);
        let mut point = Point::default();
        let err = field.apply(&mut point, json!("seven"), 12).unwrap_err();
        assert_eq!(err.offset, 12);
    }

    #[rstest::rstest]
    fn test_apply_rejects_wrong_instance_type() {
        let field = Field::<Point>::string("label", |point, value| point.label = value);
        let mut not_a_point = 0u32;
        assert!(field.apply(&mut not_a_point, json!("a"), 0).is_err());
    }
}
