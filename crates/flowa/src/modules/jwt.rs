//! The `jwt` builtin module: HS256 sign and verify.
//!
//! Tokens are standard three-part JWTs, base64url without padding, signed
//! with HMAC-SHA256 using the `JWT_SECRET` environment variable. A missing
//! secret or a bad token surfaces as an Error value.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{
    error::{RunResult, RuntimeError},
    modules::json,
    value::{error_value, str_value, Value, ValueRef},
};

use super::{module_of, NativeFn};

type HmacSha256 = Hmac<Sha256>;

const HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;

pub(crate) fn module() -> ValueRef {
    module_of("jwt", &[("sign", NativeFn::JwtSign), ("verify", NativeFn::JwtVerify)])
}

fn secret() -> Option<Vec<u8>> {
    std::env::var("JWT_SECRET").ok().map(String::into_bytes)
}

fn mac(secret: &[u8], message: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// `jwt.sign(claims_map) -> String | Error`
pub fn sign(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [claims] = args else {
        return Err(RuntimeError::new(format!(
            "jwt.sign() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    if !matches!(claims.as_ref(), Value::Map(_)) {
        return Err(RuntimeError::new(format!(
            "jwt.sign() claims must be a Map, got {}",
            claims.type_name()
        )));
    }
    let Some(secret) = secret() else {
        return Ok(error_value("jwt.sign: JWT_SECRET is not set"));
    };

    let payload = json::encode(std::slice::from_ref(claims))?;
    let Value::Str(payload) = payload.as_ref() else {
        // json.encode returned an Error value (unencodable claim).
        return Ok(payload);
    };

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(HEADER),
        URL_SAFE_NO_PAD.encode(payload)
    );
    let signature = URL_SAFE_NO_PAD.encode(mac(&secret, &signing_input));
    Ok(str_value(format!("{signing_input}.{signature}")))
}

/// `jwt.verify(token) -> Map | Error`
pub fn verify(args: &[ValueRef]) -> RunResult<ValueRef> {
    let [token] = args else {
        return Err(RuntimeError::new(format!(
            "jwt.verify() takes exactly 1 argument, got {}",
            args.len()
        )));
    };
    let Value::Str(token) = token.as_ref() else {
        return Err(RuntimeError::new(format!(
            "jwt.verify() token must be a String, got {}",
            token.type_name()
        )));
    };
    let Some(secret) = secret() else {
        return Ok(error_value("jwt.verify: JWT_SECRET is not set"));
    };

    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Ok(error_value("jwt.verify: malformed token"));
    };

    let signing_input_len = header.len() + 1 + payload.len();
    let signing_input = &token[..signing_input_len];
    let expected = mac(&secret, signing_input);
    let Ok(provided) = URL_SAFE_NO_PAD.decode(signature) else {
        return Ok(error_value("jwt.verify: malformed signature"));
    };
    if !bool::from(provided.ct_eq(&expected)) {
        return Ok(error_value("jwt.verify: signature mismatch"));
    }

    let Ok(payload) = URL_SAFE_NO_PAD.decode(payload) else {
        return Ok(error_value("jwt.verify: malformed payload"));
    };
    let Ok(payload) = String::from_utf8(payload) else {
        return Ok(error_value("jwt.verify: payload is not UTF-8"));
    };
    json::decode(&[str_value(payload)])
}
