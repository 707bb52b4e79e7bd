//! A cheaply-cloneable, possibly-borrowed byte buffer used as both keys and
//! values across [`crate::db::Database`] implementations.

use core::fmt;
use core::ops::Deref;

#[derive(Clone)]
pub enum Slice<'a> {
    Borrowed(&'a [u8]),
    Owned(Box<[u8]>),
}

impl<'a> Slice<'a> {
    #[must_use]
    pub fn into_boxed(self) -> Box<[u8]> {
        match self {
            Slice::Borrowed(bytes) => bytes.into(),
            Slice::Owned(bytes) => bytes,
        }
    }

    #[must_use]
    pub fn into_owned(self) -> Slice<'static> {
        Slice::Owned(self.into_boxed())
    }
}

impl Deref for Slice<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Slice::Borrowed(bytes) => bytes,
            Slice::Owned(bytes) => bytes,
        }
    }
}

impl AsRef<[u8]> for Slice<'_> {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

impl PartialEq for Slice<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.as_ref() == other.as_ref()
    }
}
impl Eq for Slice<'_> {}

impl fmt::Debug for Slice<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Slice").field(&hex::encode(self.as_ref())).finish()
    }
}



impl<'a> From<&'a [u8]> for Slice<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Slice::Borrowed(bytes)
    }
}

impl From<Vec<u8>> for Slice<'static> {
    fn from(bytes: Vec<u8>) -> Self {
        Slice::Owned(bytes.into_boxed_slice())
    }
}

impl From<Box<[u8]>> for Slice<'static> {
    fn from(bytes: Box<[u8]>) -> Self {
        Slice::Owned(bytes)
    }
}
