//! Named, typed, validated values used to assemble transactions.
//!
//! A [`Properties`] group owns its values in slots; [`Property<T>`] is a
//! typed handle to one slot, so the owning object reads its fields back
//! without string lookups while callers set them by name.

use crate::error::{Error, Result};
use crate::keys::PrivateKey;
use num_bigint::BigInt;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int32,
    String,
    BigInt,
    BinaryData,
    PrivateKey,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ValueType::Int32 => "int32",
            ValueType::String => "string",
            ValueType::BigInt => "BigInt",
            ValueType::BinaryData => "BinaryData",
            ValueType::PrivateKey => "PrivateKey",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int32(i32),
    String(String),
    BigInt(BigInt),
    BinaryData(Vec<u8>),
    PrivateKey(PrivateKey),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Int32(_) => ValueType::Int32,
            Value::String(_) => ValueType::String,
            Value::BigInt(_) => ValueType::BigInt,
            Value::BinaryData(_) => ValueType::BinaryData,
            Value::PrivateKey(_) => ValueType::PrivateKey,
        }
    }
}

/// Rust types that can live in a property slot.
pub trait PropertyValue: Clone + 'static {
    const VALUE_TYPE: ValueType;

    fn from_value(value: &Value) -> Option<&Self>;
    fn into_value(self) -> Value;
}

macro_rules! impl_property_value {
    ($ty:ty, $variant:ident) => {
        impl PropertyValue for $ty {
            const VALUE_TYPE: ValueType = ValueType::$variant;

            fn from_value(value: &Value) -> Option<&Self> {
                match value {
                    Value::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

impl_property_value!(i32, Int32);
impl_property_value!(String, String);
impl_property_value!(BigInt, BigInt);
impl_property_value!(Vec<u8>, BinaryData);
impl_property_value!(PrivateKey, PrivateKey);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTrait {
    Required,
    Optional,
}

/// Checks a candidate value; may read sibling properties of the same group.
pub type Predicate<T> = Box<dyn Fn(&T, &Properties) -> Result<()>>;

type ErasedPredicate = Box<dyn Fn(&Value, &Properties) -> Result<()>>;

struct Binder {
    name: String,
    value_type: ValueType,
    property_trait: PropertyTrait,
    value: Option<Value>,
    default: Option<Value>,
    predicate: Option<ErasedPredicate>,
}

impl Binder {
    fn current(&self) -> Option<&Value> {
        self.value.as_ref().or(self.default.as_ref())
    }
}

/// Typed handle to a slot of a [`Properties`] group.
pub struct Property<T> {
    slot: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Property<T> {}

impl<T> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Property").field("slot", &self.slot).finish()
    }
}

pub struct Properties {
    name: String,
    slots: Vec<Option<Binder>>,
    index: HashMap<String, usize>,
    dirty: Cell<bool>,
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Properties")
            .field("name", &self.name)
            .field("properties", &self.get_property_spec())
            .field("dirty", &self.dirty.get())
            .finish()
    }
}

impl Properties {
    pub fn new(name: impl Into<String>) -> Self {
        Properties {
            name: name.into(),
            slots: Vec::new(),
            index: HashMap::new(),
            dirty: Cell::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::property(&self.name, message)
    }

    /// Registers a new property; names are unique within a group.
    pub fn bind<T: PropertyValue>(
        &mut self,
        name: &str,
        property_trait: PropertyTrait,
        predicate: Option<Predicate<T>>,
    ) -> Result<Property<T>> {
        self.bind_slot(name, None, property_trait, predicate)
    }

    /// Like [`Properties::bind`], with a value reported until one is set.
    /// The default does not count as set for validation.
    pub fn bind_with_default<T: PropertyValue>(
        &mut self,
        name: &str,
        default: T,
        property_trait: PropertyTrait,
        predicate: Option<Predicate<T>>,
    ) -> Result<Property<T>> {
        self.bind_slot(name, Some(default.into_value()), property_trait, predicate)
    }

    fn bind_slot<T: PropertyValue>(
        &mut self,
        name: &str,
        default: Option<Value>,
        property_trait: PropertyTrait,
        predicate: Option<Predicate<T>>,
    ) -> Result<Property<T>> {
        if self.index.contains_key(name) {
            return Err(self.error(format!(
                "Property with name \"{}\" already exists.",
                name
            )));
        }

        let predicate = predicate.map(|predicate| -> ErasedPredicate {
            Box::new(move |value: &Value, properties: &Properties| match T::from_value(value) {
                Some(value) => predicate(value, properties),
                None => Err(Error::Internal(format!(
                    "predicate expected {}, got {}",
                    T::VALUE_TYPE,
                    value.value_type()
                ))),
            })
        });

        let slot = self.slots.len();
        self.slots.push(Some(Binder {
            name: name.to_string(),
            value_type: T::VALUE_TYPE,
            property_trait,
            value: None,
            default,
            predicate,
        }));
        self.index.insert(name.to_string(), slot);
        self.dirty.set(true);

        Ok(Property {
            slot,
            _marker: PhantomData,
        })
    }

    /// Removes a property; its handle stops resolving. Returns whether it existed.
    pub fn unbind(&mut self, name: &str) -> bool {
        match self.index.remove(name) {
            Some(slot) => {
                self.slots[slot] = None;
                self.dirty.set(true);
                true
            }
            None => false,
        }
    }

    fn lookup(&self, name: &str) -> Result<usize> {
        self.index.get(name).copied().ok_or_else(|| {
            self.error(format!("Property with name \"{}\" does not exists.", name))
        })
    }

    fn binder(&self, slot: usize) -> Option<&Binder> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    fn binders(&self) -> impl Iterator<Item = &Binder> {
        self.slots.iter().flatten()
    }

    fn checked_slot(&self, name: &str, value_type: ValueType) -> Result<usize> {
        let slot = self.lookup(name)?;
        let binder = self
            .binder(slot)
            .ok_or_else(|| Error::Internal(format!("property \"{}\" has no slot", name)))?;
        if binder.value_type != value_type {
            return Err(self.error(format!(
                "Invalid value type \"{}\" for property \"{}\" expected {}",
                value_type, name, binder.value_type
            )));
        }
        Ok(slot)
    }

    /// Type-checks and validates `value`, then stores it.
    /// On failure the previous value is left untouched.
    pub fn set_value<T: PropertyValue>(&mut self, name: &str, value: T) -> Result<()> {
        let slot = self.checked_slot(name, T::VALUE_TYPE)?;
        let value = value.into_value();

        if let Some(binder) = self.binder(slot) {
            if let Some(predicate) = &binder.predicate {
                predicate(&value, self).map_err(|cause| {
                    self.error(format!(
                        "Failed to set value of property \"{}\": {}",
                        name, cause
                    ))
                })?;
            }
        }

        self.store(slot, Some(value));
        Ok(())
    }

    /// Stores a computed value without running the predicate or marking the group dirty.
    pub(crate) fn force_value<T: PropertyValue>(&mut self, property: Property<T>, value: T) {
        if let Some(Some(binder)) = self.slots.get_mut(property.slot) {
            binder.value = Some(value.into_value());
        }
    }

    pub fn reset_value(&mut self, name: &str) -> Result<()> {
        let slot = self.lookup(name)?;
        self.store(slot, None);
        Ok(())
    }

    fn store(&mut self, slot: usize, value: Option<Value>) {
        if let Some(Some(binder)) = self.slots.get_mut(slot) {
            binder.value = value;
        }
        self.dirty.set(true);
    }

    /// Current value (explicit or default) by name.
    pub fn get_value<T: PropertyValue>(&self, name: &str) -> Result<Option<&T>> {
        let slot = self.checked_slot(name, T::VALUE_TYPE)?;
        Ok(self
            .binder(slot)
            .and_then(Binder::current)
            .and_then(T::from_value))
    }

    /// Current value (explicit or default) through a handle.
    pub fn get<T: PropertyValue>(&self, property: Property<T>) -> Option<&T> {
        self.binder(property.slot)
            .and_then(Binder::current)
            .and_then(T::from_value)
    }

    /// Like [`Properties::get`], for values that validation already guaranteed.
    pub fn require<T: PropertyValue>(&self, property: Property<T>) -> Result<&T> {
        self.get(property).ok_or_else(|| {
            let name = self
                .binder(property.slot)
                .map(|binder| binder.name.as_str())
                .unwrap_or("<unbound>");
            Error::Internal(format!(
                "{}: property \"{}\" is not set",
                self.name, name
            ))
        })
    }

    /// Whether a value was explicitly set; defaults don't count.
    pub fn is_set<T>(&self, property: Property<T>) -> bool {
        self.binder(property.slot)
            .map_or(false, |binder| binder.value.is_some())
    }

    /// Returns whether every required property is set, with the names of
    /// those that are not. Clears the dirty flag on success.
    pub fn validate(&self) -> (bool, Vec<String>) {
        let missing: Vec<String> = self
            .binders()
            .filter(|binder| {
                binder.property_trait == PropertyTrait::Required && binder.value.is_none()
            })
            .map(|binder| binder.name.clone())
            .collect();

        let valid = missing.is_empty();
        self.dirty.set(!valid);
        (valid, missing)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    pub(crate) fn set_dirty(&self) {
        self.dirty.set(true);
    }

    /// One `name : type mandatory|optional` line per property, in binding order.
    pub fn get_property_spec(&self) -> Vec<String> {
        self.binders()
            .map(|binder| {
                format!(
                    "{} : {} {}",
                    binder.name,
                    binder.value_type,
                    match binder.property_trait {
                        PropertyTrait::Required => "mandatory",
                        PropertyTrait::Optional => "optional",
                    }
                )
            })
            .collect()
    }
}
