use rand::{self, Rng};
use ring::{aead, digest};
use serde::{Serialize, de::DeserializeOwned};
use std::{
    marker::PhantomData,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Length of the nonce appended to sealed values.
const NONCE_LEN: usize = 12;

/// Encrypt and sign a value.
///
/// The secret may be of any length, the actual AES-256 key is its SHA-256
/// digest.
pub fn seal<T>(secret: &[u8], value: T) -> Result<Vec<u8>, SealingError>
where
    T: Serialize,
{
    let mut data = Vec::new();
    value.serialize(&mut rmps::Serializer::new(&mut data))
        .map_err(SealingError::Serialization)?;
    data.extend_from_slice(&[0; aead::MAX_TAG_LEN]);

    let key = aead::SealingKey::new(&aead::AES_256_GCM, &derive_key(secret))?;

    let nonce: [u8; NONCE_LEN] = rand::thread_rng().gen();

    aead::seal_in_place(&key, &nonce, &[], &mut data, aead::MAX_TAG_LEN)?;

    data.extend_from_slice(&nonce);

    Ok(data)
}

/// Decode and verify a value.
pub fn unseal<T>(secret: &[u8], data: &mut [u8]) -> Result<T, UnsealingError>
where
    T: DeserializeOwned,
{
    if data.len() < NONCE_LEN {
        return Err(UnsealingError::TooShort);
    }

    let key = aead::OpeningKey::new(&aead::AES_256_GCM, &derive_key(secret))?;

    let index = data.len() - NONCE_LEN;
    let (ciphertext, nonce) = data.split_at_mut(index);

    let decrypted = aead::open_in_place(&key, nonce, &[], 0, ciphertext)?;

    T::deserialize(&mut rmps::Deserializer::from_slice(&decrypted))
        .map_err(UnsealingError::Serialization)
}

fn derive_key(secret: &[u8]) -> Vec<u8> {
    digest::digest(&digest::SHA256, secret).as_ref().to_vec()
}

#[derive(Debug, Fail)]
pub enum SealingError {
    #[fail(display = "could not serialize: {}", _0)]
    Serialization(#[cause] rmps::encode::Error),
    #[fail(display = "could not encrypt: {}", _0)]
    Crypto(#[cause] ring::error::Unspecified),
}

impl_from! { for SealingError ;
    ring::error::Unspecified => |e| SealingError::Crypto(e),
}

#[derive(Debug, Fail)]
pub enum UnsealingError {
    #[fail(display = "could not deserialize: {}", _0)]
    Serialization(#[cause] rmps::decode::Error),
    #[fail(display = "could not decode: {}", _0)]
    Crypto(#[cause] ring::error::Unspecified),
    #[fail(display = "not enough data to unseal")]
    TooShort,
}

impl_from! { for UnsealingError ;
    ring::error::Unspecified => |e| UnsealingError::Crypto(e),
}

/// A cell holding a value that is initialised at most once, and then lives
/// until the end of the program.
pub struct SingleInit<T> {
    cell: AtomicUsize,
    _type: PhantomData<T>,
}

impl<T> SingleInit<T> {
    /// Create a new uninitialized atomic cell.
    pub const fn uninit() -> Self {
        SingleInit {
            cell: AtomicUsize::new(0),
            _type: PhantomData,
        }
    }
}

impl<T> SingleInit<T>
where
    T: Sync,
    Self: 'static,
{
    /// Get stored value, or `None` if it hasn't been initialized yet.
    pub fn get(&self) -> Option<&'static T> {
        let ptr = self.cell.load(Ordering::Acquire);

        if ptr != 0 {
            Some(unsafe { &*(ptr as *const T) })
        } else {
            None
        }
    }

    /// Same as [`SingleInit::get`] except that the value is initialised if
    /// necessary, and initialisation can fail.
    ///
    /// If initialisation function fails, the value will be unchanged and
    /// another thread (or the same thread) can safely attempt to initialise it
    /// again.
    pub fn get_or_try_init<E, F>(&self, init: F) -> Result<&'static T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        // Place the new value on heap and prevent its destructor from running.
        let value = Box::leak(Box::new(init()?)) as *mut T;

        match self.cell.compare_exchange(
            0, value as usize, Ordering::AcqRel, Ordering::Acquire,
        ) {
            Ok(_) => Ok(unsafe { &*value }),
            Err(old) => {
                // Another thread won the race.
                std::mem::drop(unsafe { Box::from_raw(value) });
                Ok(unsafe { &*(old as *const T) })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_value_can_be_unsealed() {
        let secret = b"Make sure to set your own secret key!";
        let mut sealed = seal(secret, (42i32, "flash")).unwrap();
        let value: (i32, String) = unseal(secret, &mut sealed).unwrap();
        assert_eq!(value, (42, "flash".to_string()));
    }

    #[test]
    fn unsealing_with_wrong_secret_fails() {
        let mut sealed = seal(b"first secret", 7i32).unwrap();
        match unseal::<i32>(b"second secret", &mut sealed) {
            Err(UnsealingError::Crypto(_)) => (),
            other => panic!("expected crypto error, got {:?}", other),
        }
    }

    #[test]
    fn unsealing_short_input_fails() {
        let mut data = vec![0u8; 4];
        match unseal::<i32>(b"secret", &mut data) {
            Err(UnsealingError::TooShort) => (),
            other => panic!("expected TooShort, got {:?}", other),
        }
    }

    #[test]
    fn single_init_runs_once() {
        static CELL: SingleInit<u32> = SingleInit::uninit();

        assert!(CELL.get().is_none());
        let first = CELL.get_or_try_init::<(), _>(|| Ok(1)).unwrap();
        let second = CELL.get_or_try_init::<(), _>(|| Ok(2)).unwrap();
        assert_eq!(*first, 1);
        assert_eq!(*second, 1);
    }

    #[test]
    fn single_init_failure_leaves_cell_empty() {
        static CELL: SingleInit<u32> = SingleInit::uninit();

        assert!(CELL.get_or_try_init(|| Err("nope")).is_err());
        assert_eq!(*CELL.get_or_try_init::<(), _>(|| Ok(3)).unwrap(), 3);
    }
}
