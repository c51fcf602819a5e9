//! Salted one-way password storage (PBKDF2-HMAC-SHA256).
//!
//! Encoded form: `pbkdf2_sha256$<iterations>$<salt b64>$<hash b64>`.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::CryptoError;

pub const ALGORITHM: &str = "pbkdf2_sha256";
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str, iterations: u32) -> Result<String, CryptoError> {
    if iterations == 0 {
        return Err(CryptoError::InvalidIterations);
    }
    let salt = generate_salt();
    let hash = derive(password, &salt, iterations);
    Ok(format!(
        "{ALGORITHM}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash.as_slice()),
    ))
}

/// Check `password` against an encoded hash. Comparison is constant-time.
pub fn verify_password(password: &str, encoded: &str) -> Result<bool, CryptoError> {
    let mut parts = encoded.splitn(4, '$');
    let (Some(algorithm), Some(iterations), Some(salt), Some(expected)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(CryptoError::MalformedHash);
    };

    if algorithm != ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(algorithm.to_string()));
    }
    let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
    if iterations == 0 {
        return Err(CryptoError::InvalidIterations);
    }
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| CryptoError::MalformedHash)?;
    let expected = STANDARD_NO_PAD
        .decode(expected)
        .map_err(|_| CryptoError::MalformedHash)?;
    if expected.len() != HASH_LENGTH {
        return Err(CryptoError::MalformedHash);
    }

    let actual = derive(password, &salt, iterations);
    Ok(actual.as_slice().ct_eq(&expected).into())
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; HASH_LENGTH]> {
    let mut out = Zeroizing::new([0u8; HASH_LENGTH]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, out.as_mut());
    out
}

/// Generate a cryptographically random salt
pub fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}
