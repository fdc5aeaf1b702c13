// SPDX-License-Identifier: MIT

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{Extensible, ExtensionShape};
use crate::result::Result;

/// A list of extensible records sharing one extension shape.
///
/// Elements added after [`Collection::register_extensions`] get the shape
/// bound on the way in. Encodes as a plain array.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    shape: Option<Arc<ExtensionShape>>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: vec![],
            shape: None,
        }
    }
}

impl<T> Collection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T: Extensible + Default> Collection<T> {
    /// Appends `item`, binding the collection's shape if `item` has none.
    pub fn add(&mut self, mut item: T) -> Result<&mut Self> {
        if let Some(shape) = &self.shape {
            if !item.extensions().is_registered() {
                item.register_extensions(Arc::clone(shape))?;
            }
        }

        self.items.push(item);
        Ok(self)
    }

    /// Binds `shape` to every element, present and future.
    ///
    /// The shape is first tried on a fresh `T`, so a shape that collides with
    /// the element's own keys is refused before anything changes.
    pub fn register_extensions(&mut self, shape: Arc<ExtensionShape>) -> Result<()> {
        T::default().register_extensions(Arc::clone(&shape))?;

        for item in self.items.iter_mut() {
            item.register_extensions(Arc::clone(&shape))?;
        }

        self.shape = Some(shape);
        Ok(())
    }

    pub fn shape(&self) -> Option<&Arc<ExtensionShape>> {
        self.shape.as_ref()
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items, shape: None }
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<T>>())
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T> std::ops::Index<usize> for Collection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> std::ops::IndexMut<usize> for Collection<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.items[index]
    }
}

impl<T: PartialEq> PartialEq for Collection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Serialize> Serialize for Collection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Collection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{Key, MapKey},
        extensions::{ExtensionValue, Extensions, FieldKind},
    };

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Item {
        name: String,
        extensions: Extensions,
    }

    impl Extensible for Item {
        const NAME: &'static str = "item";
        const KEYS: &'static [Key] = &[Key::new(0, "name")];

        fn extensions(&self) -> &Extensions {
            &self.extensions
        }

        fn extensions_mut(&mut self) -> &mut Extensions {
            &mut self.extensions
        }
    }

    fn shape() -> Arc<ExtensionShape> {
        Arc::new(
            ExtensionShape::builder("address")
                .field("address", "address", -1, FieldKind::Text)
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_add_binds_shape() {
        let mut items = Collection::<Item>::new();
        items.register_extensions(shape()).unwrap();
        items.add(Item::default()).unwrap();

        items[0].extensions.set("address", "here").unwrap();

        assert_eq!(items[0].extensions.get_string("address").unwrap(), "here");
    }

    #[test]
    fn test_register_hoists_existing() {
        let mut item = Item::default();
        item.extensions
            .accept(MapKey::Int(-1), ExtensionValue::from("there"))
            .unwrap();

        let mut items = Collection::from(vec![item]);
        items.register_extensions(shape()).unwrap();

        assert_eq!(items[0].extensions.get_string("address").unwrap(), "there");
    }

    #[test]
    fn test_register_rejects_reserved_key() {
        let bad = ExtensionShape::builder("bad")
            .field("name", "name", 0, FieldKind::Text)
            .build()
            .unwrap();

        let mut items = Collection::<Item>::new();

        assert!(items.register_extensions(Arc::new(bad)).is_err());
        assert!(items.shape().is_none());
    }
}
