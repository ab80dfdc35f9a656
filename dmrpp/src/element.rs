use serde::{Deserialize, Serialize};

/// The byte order of the elements of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByteOrder {
    /// Little endian.
    #[default]
    LittleEndian,
    /// Big endian.
    BigEndian,
}

/// A fixed size array element that can be decoded from bytes.
pub trait Element: Sized + Copy + Send + Sync {
    /// The size of the element in bytes.
    const SIZE: usize;

    /// Decode an element from exactly [`SIZE`](Element::SIZE) bytes.
    ///
    /// Returns [`None`] if `bytes` has the wrong length.
    fn from_bytes(bytes: &[u8], byte_order: ByteOrder) -> Option<Self>;
}

macro_rules! impl_element {
    ($($t:ty),*) => {
        $(
            impl Element for $t {
                const SIZE: usize = size_of::<$t>();

                fn from_bytes(bytes: &[u8], byte_order: ByteOrder) -> Option<Self> {
                    let bytes: [u8; size_of::<$t>()] = bytes.try_into().ok()?;
                    Some(match byte_order {
                        ByteOrder::LittleEndian => <$t>::from_le_bytes(bytes),
                        ByteOrder::BigEndian => <$t>::from_be_bytes(bytes),
                    })
                }
            }
        )*
    };
}

impl_element!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Convert the bytes of consecutive elements into elements.
///
/// Returns [`None`] if the length of `bytes` is not a multiple of the element size.
#[must_use]
pub fn elements_from_bytes<T: Element>(bytes: &[u8], byte_order: ByteOrder) -> Option<Vec<T>> {
    if bytes.len() % T::SIZE != 0 {
        return None;
    }
    bytes
        .chunks_exact(T::SIZE)
        .map(|element| T::from_bytes(element, byte_order))
        .collect()
}
