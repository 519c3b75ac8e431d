use hkdf::Hkdf;
use pbkdf2::pbkdf2_hmac;
use sha2::{Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::{CryptoError, HsmResult};
use crate::model::{KdfKind, KdfParams};

/// Stretch `secret` according to validated `params`
pub fn derive(params: &KdfParams, secret: &[u8]) -> HsmResult<Zeroizing<Vec<u8>>> {
    params.validate()?;
    let mut out = Zeroizing::new(vec![0u8; params.output_len]);
    let expanded = match params.kind {
        KdfKind::HkdfSha256 => Hkdf::<Sha256>::new(Some(params.salt.as_slice()), secret)
            .expand(&params.info, out.as_mut_slice())
            .map_err(|e| e.to_string()),
        KdfKind::HkdfSha512 => Hkdf::<Sha512>::new(Some(params.salt.as_slice()), secret)
            .expand(&params.info, out.as_mut_slice())
            .map_err(|e| e.to_string()),
        KdfKind::Pbkdf2Sha256 => {
            pbkdf2_hmac::<Sha256>(secret, &params.salt, params.iterations, out.as_mut_slice());
            Ok(())
        }
        KdfKind::Pbkdf2Sha512 => {
            pbkdf2_hmac::<Sha512>(secret, &params.salt, params.iterations, out.as_mut_slice());
            Ok(())
        }
    };
    expanded.map_err(|reason| CryptoError::ParameterOutOfRange { reason })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HsmError;

    #[test]
    fn test_rfc5869_case_1() {
        let ikm = [0x0bu8; 22];
        let salt = hex::decode("000102030405060708090a0b0c").unwrap();
        let info = hex::decode("f0f1f2f3f4f5f6f7f8f9").unwrap();
        let params = KdfParams::hkdf(KdfKind::HkdfSha256, &salt, &info, 42);

        let okm = derive(&params, &ikm).unwrap();
        assert_eq!(
            hex::encode(okm.as_slice()),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn test_output_has_requested_length() {
        for kind in [
            KdfKind::HkdfSha256,
            KdfKind::HkdfSha512,
            KdfKind::Pbkdf2Sha256,
            KdfKind::Pbkdf2Sha512,
        ] {
            let params = KdfParams {
                kind,
                salt: b"salt".to_vec(),
                info: b"info".to_vec(),
                iterations: 2,
                output_len: 77,
            };
            assert_eq!(derive(&params, b"secret").unwrap().len(), 77, "{kind}");
        }
    }

    #[test]
    fn test_pbkdf2_ignores_info() {
        let mut params = KdfParams::pbkdf2(KdfKind::Pbkdf2Sha256, b"salt", 3, 32);
        let plain = derive(&params, b"secret").unwrap();
        params.info = b"ignored".to_vec();
        assert_eq!(derive(&params, b"secret").unwrap(), plain);
    }

    #[test]
    fn test_invalid_params_rejected_before_work() {
        let params = KdfParams::hkdf(KdfKind::HkdfSha256, &[0u8; 129], b"", 32);
        assert!(matches!(
            derive(&params, b"secret").unwrap_err(),
            HsmError::Domain(_)
        ));
    }
}
