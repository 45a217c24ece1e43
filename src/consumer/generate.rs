/// Structured value generation from a `FuzzInput`
use super::input::{ConsumeError, FuzzInput};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// A type that can be built deterministically from fuzz bytes.
pub trait Generate: Sized {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError>;

    /// Overwrite `self` in place. Records override this to fill field by
    /// field, so a partial population keeps what it managed to produce.
    fn fill(&mut self, input: &mut FuzzInput<'_>) -> Result<(), ConsumeError> {
        *self = Self::generate(input)?;
        Ok(())
    }
}

/// Implement [`Generate`] for a record by filling the listed fields in order.
///
/// The record must implement `Default`; fields not reached before the input
/// runs out keep their previous values.
#[macro_export]
macro_rules! generate_record {
    ($record:ty { $($field:ident),* $(,)? }) => {
        impl $crate::consumer::Generate for $record {
            fn generate(
                input: &mut $crate::consumer::FuzzInput<'_>,
            ) -> ::std::result::Result<Self, $crate::consumer::ConsumeError> {
                let mut value = <Self as ::std::default::Default>::default();
                $crate::consumer::Generate::fill(&mut value, input)?;
                Ok(value)
            }

            fn fill(
                &mut self,
                input: &mut $crate::consumer::FuzzInput<'_>,
            ) -> ::std::result::Result<(), $crate::consumer::ConsumeError> {
                input.descend(|input| {
                    $( $crate::consumer::Generate::fill(&mut self.$field, input)?; )*
                    Ok(())
                })
            }
        }
    };
}

/// Implement [`Generate`] for a fieldless enum by reducing one byte modulo
/// the number of variants.
#[macro_export]
macro_rules! generate_choice {
    ($choice:ty { $($variant:path),+ $(,)? }) => {
        impl $crate::consumer::Generate for $choice {
            fn generate(
                input: &mut $crate::consumer::FuzzInput<'_>,
            ) -> ::std::result::Result<Self, $crate::consumer::ConsumeError> {
                const VARIANTS: &[$choice] = &[$($variant),+];
                let index = input.get_u8()? as usize % VARIANTS.len();
                Ok(VARIANTS[index])
            }
        }
    };
}

impl Generate for bool {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        input.get_bool()
    }
}

impl Generate for u8 {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        input.get_u8()
    }
}

impl Generate for u16 {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        input.get_u16()
    }
}

impl Generate for u32 {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        input.get_u32()
    }
}

impl Generate for u64 {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        input.get_u64()
    }
}

impl Generate for i32 {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        Ok(input.get_u32()? as i32)
    }
}

impl Generate for i64 {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        Ok(input.get_u64()? as i64)
    }
}

impl Generate for String {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        input.get_string()
    }
}

impl Generate for PathBuf {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        Ok(PathBuf::from(input.get_string()?))
    }
}

impl<T: Generate> Generate for Option<T> {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        if input.get_bool()? {
            Ok(Some(T::generate(input)?))
        } else {
            Ok(None)
        }
    }
}

impl<T: Generate> Generate for Vec<T> {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        let mut items = Vec::new();
        items.fill(input)?;
        Ok(items)
    }

    fn fill(&mut self, input: &mut FuzzInput<'_>) -> Result<(), ConsumeError> {
        self.clear();
        let len = input.get_sequence_len()?;
        for _ in 0..len {
            self.push(T::generate(input)?);
        }
        Ok(())
    }
}

impl<K: Generate + Ord, V: Generate> Generate for BTreeMap<K, V> {
    fn generate(input: &mut FuzzInput<'_>) -> Result<Self, ConsumeError> {
        let mut map = BTreeMap::new();
        map.fill(input)?;
        Ok(map)
    }

    fn fill(&mut self, input: &mut FuzzInput<'_>) -> Result<(), ConsumeError> {
        self.clear();
        let len = input.get_sequence_len()?;
        for _ in 0..len {
            let key = K::generate(input)?;
            let value = V::generate(input)?;
            self.insert(key, value);
        }
        Ok(())
    }
}
