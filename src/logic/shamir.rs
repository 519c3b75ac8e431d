//! Threshold secret sharing over GF(256)
//!
//! A secret is split by fixing a polynomial through `threshold` points: the
//! secret at x = 255, a digest of it at x = 254, and random values at
//! x = 0..threshold-2. Shares are the polynomial evaluated at x = 0..count.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::slip39::ShareError;

const SECRET_INDEX: u8 = 255;
const DIGEST_INDEX: u8 = 254;
const DIGEST_LEN: usize = 4;

/// One point of the sharing polynomial, evaluated byte-wise
#[derive(Clone, PartialEq, Eq)]
pub struct SharePoint {
    pub x: u8,
    pub value: Zeroizing<Vec<u8>>,
}

impl SharePoint {
    pub fn new(x: u8, value: &[u8]) -> Self {
        Self {
            x,
            value: Zeroizing::new(value.to_vec()),
        }
    }
}

/// Multiplication modulo the AES polynomial x^8 + x^4 + x^3 + x + 1
fn gf256_mul(a: u8, b: u8) -> u8 {
    let mut result = 0u8;
    let mut a = a;
    let mut b = b;
    while b != 0 {
        if b & 1 != 0 {
            result ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    result
}

/// a^254 is the inverse of a for a != 0
fn gf256_inv(a: u8) -> u8 {
    let mut result = 1u8;
    let mut base = a;
    let mut exponent = 254u8;
    while exponent != 0 {
        if exponent & 1 != 0 {
            result = gf256_mul(result, base);
        }
        base = gf256_mul(base, base);
        exponent >>= 1;
    }
    result
}

/// Evaluate at `x` the polynomial passing through `points`
fn interpolate(points: &[SharePoint], x: u8) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    let first = points.first().ok_or(ShareError::InsufficientShares {
        needed: 1,
        have: 0,
    })?;
    let len = first.value.len();
    if points.iter().any(|p| p.value.len() != len) {
        return Err(ShareError::InconsistentLength);
    }
    for (i, p) in points.iter().enumerate() {
        if points[..i].iter().any(|q| q.x == p.x) {
            return Err(ShareError::DuplicateIndex { index: p.x });
        }
    }
    if let Some(known) = points.iter().find(|p| p.x == x) {
        return Ok(known.value.clone());
    }

    let mut result = Zeroizing::new(vec![0u8; len]);
    for (i, p) in points.iter().enumerate() {
        // Lagrange basis polynomial of p evaluated at x
        let mut basis = 1u8;
        for (j, q) in points.iter().enumerate() {
            if i != j {
                basis = gf256_mul(basis, gf256_mul(x ^ q.x, gf256_inv(p.x ^ q.x)));
            }
        }
        for (out, byte) in result.iter_mut().zip(p.value.iter()) {
            *out ^= gf256_mul(basis, *byte);
        }
    }
    Ok(result)
}

fn digest(random_part: &[u8], secret: &[u8]) -> Result<[u8; DIGEST_LEN], ShareError> {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(random_part).map_err(|_| ShareError::DigestMismatch)?;
    mac.update(secret);
    let full = mac.finalize().into_bytes();
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&full[..DIGEST_LEN]);
    Ok(out)
}

/// Split `secret` into `count` shares, any `threshold` of which recover it
pub fn split_secret(threshold: u8, count: u8, secret: &[u8]) -> Result<Vec<SharePoint>, ShareError> {
    if threshold == 0 || threshold > count {
        return Err(ShareError::InsufficientShares {
            needed: threshold,
            have: count,
        });
    }
    if threshold == 1 {
        return Ok((0..count).map(|x| SharePoint::new(x, secret)).collect());
    }
    if secret.len() < DIGEST_LEN {
        return Err(ShareError::SecretLength { len: secret.len() });
    }

    let mut rng = rand::rng();
    let random_count = threshold - 2;
    let mut base: Vec<SharePoint> = (0..random_count)
        .map(|x| {
            let mut value = Zeroizing::new(vec![0u8; secret.len()]);
            rng.fill_bytes(&mut value);
            SharePoint { x, value }
        })
        .collect();

    let mut random_part = Zeroizing::new(vec![0u8; secret.len() - DIGEST_LEN]);
    rng.fill_bytes(&mut random_part);
    let mut digest_value = Zeroizing::new(digest(&random_part, secret)?.to_vec());
    digest_value.extend_from_slice(&random_part);
    base.push(SharePoint {
        x: DIGEST_INDEX,
        value: digest_value,
    });
    base.push(SharePoint::new(SECRET_INDEX, secret));

    let mut shares: Vec<SharePoint> = base[..random_count as usize].to_vec();
    for x in random_count..count {
        shares.push(SharePoint {
            x,
            value: interpolate(&base, x)?,
        });
    }
    Ok(shares)
}

/// Recover a secret from at least `threshold` shares, checking its digest
pub fn recover_secret(
    threshold: u8,
    shares: &[SharePoint],
) -> Result<Zeroizing<Vec<u8>>, ShareError> {
    if shares.len() < threshold as usize || threshold == 0 {
        return Err(ShareError::InsufficientShares {
            needed: threshold,
            have: shares.len() as u8,
        });
    }
    let shares = &shares[..threshold as usize];
    if threshold == 1 {
        return Ok(shares[0].value.clone());
    }

    let secret = interpolate(shares, SECRET_INDEX)?;
    let digest_value = interpolate(shares, DIGEST_INDEX)?;
    if digest(&digest_value[DIGEST_LEN..], &secret)? != digest_value[..DIGEST_LEN] {
        return Err(ShareError::DigestMismatch);
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"sixteen byte key";

    #[test]
    fn test_field_inverse() {
        for a in 1..=255u8 {
            assert_eq!(gf256_mul(a, gf256_inv(a)), 1, "inverse of {a}");
        }
    }

    #[test]
    fn test_field_known_product() {
        // FIPS-197 section 4.2
        assert_eq!(gf256_mul(0x57, 0x83), 0xc1);
    }

    #[test]
    fn test_any_threshold_subset_recovers() {
        let shares = split_secret(3, 5, SECRET).unwrap();
        assert_eq!(shares.len(), 5);

        for subset in [[0, 1, 2], [4, 2, 0], [1, 3, 4]] {
            let picked: Vec<SharePoint> = subset.iter().map(|&i| shares[i].clone()).collect();
            assert_eq!(recover_secret(3, &picked).unwrap().as_slice(), SECRET);
        }
    }

    #[test]
    fn test_threshold_one_copies_secret() {
        let shares = split_secret(1, 1, SECRET).unwrap();
        assert_eq!(shares[0].value.as_slice(), SECRET);
    }

    #[test]
    fn test_too_few_shares() {
        let shares = split_secret(2, 3, SECRET).unwrap();
        assert!(matches!(
            recover_secret(2, &shares[..1]),
            Err(ShareError::InsufficientShares { needed: 2, have: 1 })
        ));
    }

    #[test]
    fn test_corrupted_share_fails_digest() {
        let mut shares = split_secret(2, 2, SECRET).unwrap();
        shares[1].value[0] ^= 0x01;
        assert!(matches!(
            recover_secret(2, &shares),
            Err(ShareError::DigestMismatch)
        ));
    }

    #[test]
    fn test_duplicate_points_rejected() {
        let shares = split_secret(2, 2, SECRET).unwrap();
        let twice = vec![shares[0].clone(), shares[0].clone()];
        assert!(matches!(
            recover_secret(2, &twice),
            Err(ShareError::DuplicateIndex { index: 0 })
        ));
    }
}
