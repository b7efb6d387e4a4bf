use crate::codec::ValueCodec;
use crate::common::CanonicalKey;
use crate::errors::KvsResult;
use crate::store::BackendProvider;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

// Providers define how a backend walks its entries. The iterator types below
// wrap any provider behind the standard `Iterator` interface.

/// Trait for implementing key iteration over a backend.
///
/// Providers are forward-only: once a key is yielded it is never revisited
/// and the walk cannot be restarted.
pub trait KeyIteratorProvider {
    /// Get the next key
    fn next_key(&mut self) -> Option<KvsResult<CanonicalKey>>;
}

/// Trait for implementing raw value iteration over a backend.
pub trait ValueIteratorProvider {
    /// Get the next encoded value
    fn next_value(&mut self) -> Option<KvsResult<Vec<u8>>>;
}

/// Trait for implementing raw entry iteration over a backend.
pub trait EntryIteratorProvider {
    /// Get the next (key, encoded value) pair
    fn next_entry(&mut self) -> Option<KvsResult<(CanonicalKey, Vec<u8>)>>;
}

/// Lazy, forward-only sequence of canonical keys.
///
/// The iterator borrows the backend it walks. Mutating the store while an
/// iteration is in progress gives an unspecified result.
pub struct KeyIterator<'a> {
    provider: Box<dyn KeyIteratorProvider + 'a>,
}

impl<'a> KeyIterator<'a> {
    pub fn new<T: KeyIteratorProvider + 'a>(provider: T) -> Self {
        KeyIterator {
            provider: Box::new(provider),
        }
    }

    /// Wraps a plain iterator of keys.
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: Iterator<Item = KvsResult<CanonicalKey>> + 'a,
    {
        KeyIterator::new(IteratorProvider(iter))
    }
}

impl Iterator for KeyIterator<'_> {
    type Item = KvsResult<CanonicalKey>;

    fn next(&mut self) -> Option<Self::Item> {
        self.provider.next_key()
    }
}

/// Lazy, forward-only sequence of encoded values.
pub struct ValueIterator<'a> {
    provider: Box<dyn ValueIteratorProvider + 'a>,
}

impl<'a> ValueIterator<'a> {
    pub fn new<T: ValueIteratorProvider + 'a>(provider: T) -> Self {
        ValueIterator {
            provider: Box::new(provider),
        }
    }

    /// Wraps a plain iterator of encoded values.
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: Iterator<Item = KvsResult<Vec<u8>>> + 'a,
    {
        ValueIterator::new(IteratorProvider(iter))
    }
}

impl Iterator for ValueIterator<'_> {
    type Item = KvsResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.provider.next_value()
    }
}

/// Lazy, forward-only sequence of (key, encoded value) pairs.
pub struct EntryIterator<'a> {
    provider: Box<dyn EntryIteratorProvider + 'a>,
}

impl<'a> EntryIterator<'a> {
    pub fn new<T: EntryIteratorProvider + 'a>(provider: T) -> Self {
        EntryIterator {
            provider: Box::new(provider),
        }
    }

    /// Wraps a plain iterator of entries.
    pub fn from_iter<I>(iter: I) -> Self
    where
        I: Iterator<Item = KvsResult<(CanonicalKey, Vec<u8>)>> + 'a,
    {
        EntryIterator::new(IteratorProvider(iter))
    }
}

impl Iterator for EntryIterator<'_> {
    type Item = KvsResult<(CanonicalKey, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.provider.next_entry()
    }
}

/// Adapts a native backend iterator into a provider.
struct IteratorProvider<I>(I);

impl<I: Iterator<Item = KvsResult<CanonicalKey>>> KeyIteratorProvider for IteratorProvider<I> {
    fn next_key(&mut self) -> Option<KvsResult<CanonicalKey>> {
        self.0.next()
    }
}

impl<I: Iterator<Item = KvsResult<Vec<u8>>>> ValueIteratorProvider for IteratorProvider<I> {
    fn next_value(&mut self) -> Option<KvsResult<Vec<u8>>> {
        self.0.next()
    }
}

impl<I> EntryIteratorProvider for IteratorProvider<I>
where
    I: Iterator<Item = KvsResult<(CanonicalKey, Vec<u8>)>>,
{
    fn next_entry(&mut self) -> Option<KvsResult<(CanonicalKey, Vec<u8>)>> {
        self.0.next()
    }
}

/// Value provider for backends without native value iteration.
///
/// Walks the backend's keys and fetches each value. Keys whose value has
/// vanished or is empty are skipped.
pub struct FetchingValueProvider<'a, B: BackendProvider + ?Sized> {
    backend: &'a B,
    keys: KeyIterator<'a>,
}

impl<'a, B: BackendProvider + ?Sized> FetchingValueProvider<'a, B> {
    pub fn new(backend: &'a B, keys: KeyIterator<'a>) -> Self {
        FetchingValueProvider { backend, keys }
    }
}

impl<B: BackendProvider + ?Sized> ValueIteratorProvider for FetchingValueProvider<'_, B> {
    fn next_value(&mut self) -> Option<KvsResult<Vec<u8>>> {
        fetch_next(self.backend, &mut self.keys).map(|entry| entry.map(|(_, value)| value))
    }
}

/// Entry provider for backends without native entry iteration.
pub struct FetchingEntryProvider<'a, B: BackendProvider + ?Sized> {
    backend: &'a B,
    keys: KeyIterator<'a>,
}

impl<'a, B: BackendProvider + ?Sized> FetchingEntryProvider<'a, B> {
    pub fn new(backend: &'a B, keys: KeyIterator<'a>) -> Self {
        FetchingEntryProvider { backend, keys }
    }
}

impl<B: BackendProvider + ?Sized> EntryIteratorProvider for FetchingEntryProvider<'_, B> {
    fn next_entry(&mut self) -> Option<KvsResult<(CanonicalKey, Vec<u8>)>> {
        fetch_next(self.backend, &mut self.keys)
    }
}

fn fetch_next<B: BackendProvider + ?Sized>(
    backend: &B,
    keys: &mut KeyIterator<'_>,
) -> Option<KvsResult<(CanonicalKey, Vec<u8>)>> {
    for key in keys.by_ref() {
        let key = match key {
            Ok(key) => key,
            Err(err) => return Some(Err(err)),
        };

        match backend.get(&key) {
            Ok(Some(value)) if !value.is_empty() => return Some(Ok((key, value))),
            Ok(_) => continue,
            Err(err) => return Some(Err(err)),
        }
    }
    None
}

/// Decoded values of a store, in backend order.
///
/// Each element is decoded individually; a decoding failure is yielded as an
/// error for that element only. Empty stored values count as absent and are
/// skipped.
pub struct Values<'a, V> {
    inner: ValueIterator<'a>,
    codec: &'a ValueCodec,
    _marker: PhantomData<fn() -> V>,
}

impl<'a, V> Values<'a, V> {
    pub(crate) fn new(inner: ValueIterator<'a>, codec: &'a ValueCodec) -> Self {
        Values {
            inner,
            codec,
            _marker: PhantomData,
        }
    }
}

impl<V: DeserializeOwned> Iterator for Values<'_, V> {
    type Item = KvsResult<V>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(bytes) if bytes.is_empty() => continue,
                Ok(bytes) => return Some(self.codec.loads(&bytes)),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// Decoded (key, value) pairs of a store, in backend order.
pub struct Items<'a, V> {
    inner: EntryIterator<'a>,
    codec: &'a ValueCodec,
    _marker: PhantomData<fn() -> V>,
}

impl<'a, V> Items<'a, V> {
    pub(crate) fn new(inner: EntryIterator<'a>, codec: &'a ValueCodec) -> Self {
        Items {
            inner,
            codec,
            _marker: PhantomData,
        }
    }
}

impl<V: DeserializeOwned> Iterator for Items<'_, V> {
    type Item = KvsResult<(CanonicalKey, V)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok((_, bytes)) if bytes.is_empty() => continue,
                Ok((key, bytes)) => return Some(self.codec.loads(&bytes).map(|value| (key, value))),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}
