use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use time::OffsetDateTime;

use crate::error::{ClientError, ClientResult};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    user_id: Option<serde_json::Value>,
    exp: Option<i64>,
}

/// Extracts the `user_id` claim from an HS256 token issued by the backend.
///
/// With a secret the signature and expiry are checked; without one the payload
/// is only decoded, which is enough for a client that forwards the token to the
/// backend anyway.
pub fn decode_user_id(token: &str, secret: Option<&[u8]>) -> ClientResult<u64> {
    let (signing_input, signature) = token.rsplit_once('.').ok_or_else(invalid)?;
    let (header, payload) = signing_input.split_once('.').ok_or_else(invalid)?;
    if payload.contains('.') {
        return Err(invalid());
    }

    let header: Header = decode_segment(header)?;
    if header.alg != "HS256" {
        return Err(invalid());
    }

    if let Some(secret) = secret {
        let signature = URL_SAFE_NO_PAD.decode(signature).map_err(|_| invalid())?;
        let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| invalid())?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&signature).map_err(|_| invalid())?;
    }

    let claims: Claims = decode_segment(payload)?;
    if secret.is_some() {
        if let Some(exp) = claims.exp {
            if exp <= OffsetDateTime::now_utc().unix_timestamp() {
                return Err(ClientError::Auth("Token expired".into()));
            }
        }
    }
    claims
        .user_id
        .as_ref()
        .and_then(claim_as_u64)
        .ok_or_else(invalid)
}

fn claim_as_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        serde_json::Value::String(raw) => raw.parse().ok(),
        _ => None,
    }
}

fn decode_segment<T: for<'de> Deserialize<'de>>(segment: &str) -> ClientResult<T> {
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|_| invalid())?;
    serde_json::from_slice(&bytes).map_err(|_| invalid())
}

fn invalid() -> ClientError {
    ClientError::Auth("Invalid token".into())
}

#[cfg(test)]
pub(crate) fn sign_for_tests(claims: &serde_json::Value, secret: &[u8]) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{header}.{payload}");
    let mut mac = HmacSha256::new_from_slice(secret).expect("hmac accepts any key length");
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{signing_input}.{signature}")
}
