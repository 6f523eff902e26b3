//! Operator password hashes: PBKDF2-HMAC-SHA256 with a random salt, stored
//! as `pbkdf2:sha256:<iterations>$<salt>$<hash>`.
//!
//! Hashing at the default cost takes noticeable CPU time; run it on a
//! blocking thread.

use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;

const METHOD: &str = "pbkdf2:sha256";
pub const DEFAULT_ITERATIONS: u32 = 600_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

pub fn hash_password(password: &str) -> String {
    hash_with_iterations(password, DEFAULT_ITERATIONS)
}

pub fn hash_with_iterations(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = to_hex(&salt);
    let hash = derive(password, &salt, iterations);
    format!("{}:{}${}${}", METHOD, iterations, salt, to_hex(&hash))
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.splitn(3, '$');
    let (Some(method), Some(salt), Some(expected)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let Some(iterations) = method
        .strip_prefix(METHOD)
        .and_then(|rest| rest.strip_prefix(':'))
        .and_then(|n| n.parse::<u32>().ok())
        .filter(|n| *n > 0)
    else {
        return false;
    };

    let hash = to_hex(&derive(password, salt, iterations));
    constant_time_eq(hash.as_bytes(), expected.as_bytes())
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; HASH_LEN] {
    let mut out = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_round_trip() {
        let stored = hash_with_iterations("s3cret", 1_000);
        assert!(stored.starts_with("pbkdf2:sha256:1000$"));
        assert!(verify_password("s3cret", &stored));
        assert!(!verify_password("s3cret ", &stored));
        assert!(!verify_password("", &stored));
    }

    #[test]
    fn test_default_cost_is_recorded() {
        let stored = hash_password("s3cret");
        assert!(stored.starts_with(&format!("pbkdf2:sha256:{}$", DEFAULT_ITERATIONS)));
        assert!(verify_password("s3cret", &stored));
    }

    #[test]
    fn test_known_vector() {
        // RFC 7914 section 11, first 32 bytes
        let hash = derive("passwd", "salt", 1);
        assert_eq!(
            to_hex(&hash),
            "55ac046e56e3089fec1691c22544b605f94185216dde0465e68b9d57c20dacbc"
        );
    }

    #[test]
    fn test_iterations_come_from_the_stored_hash() {
        let stored = hash_with_iterations("s3cret", 1_000);
        let tampered = stored.replacen(":1000$", ":1001$", 1);
        assert!(!verify_password("s3cret", &tampered));
    }

    #[test]
    fn test_salt_differs_per_hash() {
        assert_ne!(
            hash_with_iterations("same", 1_000),
            hash_with_iterations("same", 1_000)
        );
    }

    #[test]
    fn test_malformed_hash_never_verifies() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "md5$aa$bb"));
        assert!(!verify_password("x", "pbkdf2:sha256$aa$bb"));
        assert!(!verify_password("x", "pbkdf2:sha256:0$aa$bb"));
        assert!(!verify_password("x", "pbkdf2:sha256:1000$only-salt"));
        // One salted SHA-256 round is not accepted
        assert!(!verify_password("x", "sha256$aa$bb"));
    }
}
