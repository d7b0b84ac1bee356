//! Declarative helpers for implementing the object traits

/// Implement [`GravEnum`](crate::GravEnum) for a fieldless enum
///
/// Ordinals follow declaration order. Add `by_name = true` to write
/// constant names instead of ordinals.
///
/// ```
/// use grav_core::{grav_enum, GravEnum};
///
/// #[derive(Debug, PartialEq)]
/// enum Rarity {
///     Common,
///     Rare,
/// }
/// grav_enum!(Rarity, "demo.Rarity", [Common, Rare]);
///
/// assert_eq!(Rarity::Rare.ordinal(), 1);
/// assert_eq!(Rarity::from_name("Common"), Some(Rarity::Common));
/// ```
#[macro_export]
macro_rules! grav_enum {
    ($ty:ty, $name:expr, [$($variant:ident),+ $(,)?]) => {
        $crate::grav_enum!($ty, $name, by_name = false, [$($variant),+]);
    };
    ($ty:ty, $name:expr, by_name = $by_name:expr, [$($variant:ident),+ $(,)?]) => {
        impl $crate::GravEnum for $ty {
            const TYPE_NAME: &'static str = $name;
            const BY_NAME: bool = $by_name;

            #[allow(unused_assignments)]
            fn ordinal(&self) -> i32 {
                let mut ordinal = 0;
                $(
                    if matches!(self, Self::$variant) {
                        return ordinal;
                    }
                    ordinal += 1;
                )+
                ordinal
            }

            fn name(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)+
                }
            }

            #[allow(unused_assignments)]
            fn from_ordinal(ordinal: i32) -> Option<Self> {
                let mut current = 0;
                $(
                    if current == ordinal {
                        return Some(Self::$variant);
                    }
                    current += 1;
                )+
                None
            }

            fn from_name(name: &str) -> Option<Self> {
                match name {
                    $(stringify!($variant) => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

/// Make a [`MetaSerializable`](crate::MetaSerializable) type a
/// [`GravObject`](crate::GravObject) whose payload is its meta
#[macro_export]
macro_rules! meta_object {
    ($ty:ty, $name:expr) => {
        impl $crate::GravObject for $ty {
            const TYPE_NAME: &'static str = $name;

            fn serialize(&self, out: &mut $crate::GravSerializer) -> $crate::Result<()> {
                let meta = $crate::MetaSerializable::to_meta(self);
                $crate::GravObject::serialize(&meta, out)
            }

            fn deserialize(
                input: &mut $crate::GravSerializer,
                args: &[$crate::Value],
            ) -> $crate::Result<Self> {
                let meta = <$crate::Meta as $crate::GravObject>::deserialize(input, args)?;
                <$ty as $crate::MetaSerializable>::from_meta(meta, args)
            }
        }
    };
}

/// Make a [`JsonMetaSerializable`](crate::JsonMetaSerializable) type a
/// [`GravObject`](crate::GravObject) whose payload is its tree
#[macro_export]
macro_rules! json_meta_object {
    ($ty:ty, $name:expr) => {
        impl $crate::GravObject for $ty {
            const TYPE_NAME: &'static str = $name;

            fn serialize(&self, out: &mut $crate::GravSerializer) -> $crate::Result<()> {
                let meta = $crate::JsonMetaSerializable::to_json_meta(self);
                $crate::GravObject::serialize(&meta, out)
            }

            fn deserialize(
                input: &mut $crate::GravSerializer,
                args: &[$crate::Value],
            ) -> $crate::Result<Self> {
                let meta = <$crate::JsonMeta as $crate::GravObject>::deserialize(input, args)?;
                <$ty as $crate::JsonMetaSerializable>::from_json_meta(meta, args)
            }
        }
    };
}
