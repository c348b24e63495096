//! The `auth` builtin module: password hashing and verification.
//!
//! PBKDF2-HMAC-SHA256 with a random 16-byte salt, encoded as
//! `pbkdf2$<iterations>$<salt-b64>$<digest-b64>`. Verification recomputes
//! the digest with the stored parameters and compares in constant time.

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{
    error::{RunResult, RuntimeError},
    value::{bool_value, error_value, str_value, Value, ValueRef},
};

use super::{module_of, NativeFn};

const ITERATIONS: u32 = 60_000;
const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;

pub(crate) fn module() -> ValueRef {
    module_of("auth", &[("hash", NativeFn::AuthHash), ("verify", NativeFn::AuthVerify)])
}

fn str_arg<'a>(args: &'a [ValueRef], idx: usize, func: &str, what: &str) -> RunResult<&'a str> {
    match args[idx].as_ref() {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::new(format!(
            "auth.{func}() {what} must be a String, got {}",
            other.type_name()
        ))),
    }
}

/// `auth.hash(password) -> String`
pub fn hash(args: &[ValueRef]) -> RunResult<ValueRef> {
    if args.len() != 1 {
        return Err(RuntimeError::new(format!(
            "auth.hash() takes exactly 1 argument, got {}",
            args.len()
        )));
    }
    let password = str_arg(args, 0, "hash", "password")?;

    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, ITERATIONS, &mut digest);

    Ok(str_value(format!(
        "pbkdf2${ITERATIONS}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    )))
}

/// `auth.verify(password, hashed) -> Boolean | Error`
pub fn verify(args: &[ValueRef]) -> RunResult<ValueRef> {
    if args.len() != 2 {
        return Err(RuntimeError::new(format!(
            "auth.verify() takes exactly 2 arguments, got {}",
            args.len()
        )));
    }
    let password = str_arg(args, 0, "verify", "password")?;
    let hashed = str_arg(args, 1, "verify", "hash")?;

    let mut parts = hashed.split('$');
    let (scheme, iterations, salt, digest) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(iterations), Some(salt), Some(digest)) => (scheme, iterations, salt, digest),
        _ => return Ok(error_value("auth.verify: malformed hash")),
    };
    if scheme != "pbkdf2" {
        return Ok(error_value(format!("auth.verify: unknown scheme `{scheme}`")));
    }
    let Ok(iterations) = iterations.parse::<u32>() else {
        return Ok(error_value("auth.verify: malformed iteration count"));
    };
    let (Ok(salt), Ok(expected)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(digest)) else {
        return Ok(error_value("auth.verify: malformed hash encoding"));
    };

    let mut digest = vec![0u8; expected.len().max(1)];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut digest);
    Ok(bool_value(digest.ct_eq(&expected).into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify() {
        let hashed = hash(&[str_value("hunter2")]).unwrap();
        let ok = verify(&[str_value("hunter2"), hashed.clone()]).unwrap();
        assert!(matches!(ok.as_ref(), Value::Bool(true)));
        let bad = verify(&[str_value("hunter3"), hashed]).unwrap();
        assert!(matches!(bad.as_ref(), Value::Bool(false)));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash(&[str_value("pw")]).unwrap();
        let b = hash(&[str_value("pw")]).unwrap();
        assert!(!crate::value::values_equal(&a, &b));
    }

    #[test]
    fn test_malformed_hash_is_error_value() {
        let result = verify(&[str_value("pw"), str_value("not-a-hash")]).unwrap();
        assert!(matches!(result.as_ref(), Value::Error(_)));
    }
}
