//! DataLocker trait - capability to lock data to the element

use zeroize::Zeroizing;

use crate::error::HsmResult;
use crate::model::{KeyDomain, LockedObject};

/// Capability to encrypt and sign data under an element key
pub trait DataLocker {
    /// Encrypt and sign `plaintext` with a fresh salt and nonce
    fn lock(&mut self, plaintext: &[u8], domain: KeyDomain) -> HsmResult<LockedObject>;

    /// Verify and decrypt an object locked for `domain`
    ///
    /// # Errors
    ///
    /// `SignatureInvalid` when the signature does not verify under the
    /// domain key, `DecryptionFailed` when the ciphertext does not decrypt.
    fn unlock(&mut self, object: &LockedObject, domain: KeyDomain)
        -> HsmResult<Zeroizing<Vec<u8>>>;
}
