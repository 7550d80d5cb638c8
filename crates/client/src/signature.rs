//! Challenge-response signatures for login and write operations.
//!
//! All digests are lowercase hex HMAC-SHA1. Argument order for
//! [`hmac_sha1_hex`] is `(message, key)`.

use hmac::{Hmac, Mac};
use rand::Rng;
use sha1::Sha1;

use crate::params::Params;

type HmacSha1 = Hmac<Sha1>;

/// Maximum length of the `rand_num` token.
pub const RANDOM_NUMBER_DIGITS: usize = 12;

/// Signed login material: POST as `rand_num`, `url`, `signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSignature {
    pub rand_num: String,
    pub signature: String,
}

/// Signed write material added to an update's own parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSignature {
    pub rand_num: String,
    /// Comma-joined parameter names, in the order their values were signed.
    pub param_order: String,
    pub signature: String,
}

pub fn hmac_sha1_hex(message: &str, key: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Draw the `rand_num` token from the thread RNG.
pub fn generate_random_number() -> String {
    generate_random_number_with(&mut rand::thread_rng())
}

pub fn generate_random_number_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let digits: Vec<u8> = (0..RANDOM_NUMBER_DIGITS)
        .map(|_| rng.gen_range(0..10u8))
        .collect();
    digits_to_token(digits)
}

/// Render drawn digits. Leading zeros are dropped rather than printed, so
/// the token may be shorter than the number of draws (or empty). The server
/// has only ever seen tokens of this shape.
fn digits_to_token(digits: impl IntoIterator<Item = u8>) -> String {
    let mut token = String::with_capacity(RANDOM_NUMBER_DIGITS);
    for digit in digits {
        if digit != 0 || !token.is_empty() {
            token.push(char::from(b'0' + digit));
        }
    }
    token
}

pub fn login_signature(password: &str, username: &str, url: &str) -> LoginSignature {
    login_signature_with_rand(password, username, url, generate_random_number())
}

/// `HMAC(url, key=HMAC(rand, key=HMAC(username, key=password)))`
pub fn login_signature_with_rand(
    password: &str,
    username: &str,
    url: &str,
    rand_num: String,
) -> LoginSignature {
    let pwd_uname_hash = hmac_sha1_hex(username, password);
    let rand_hash = hmac_sha1_hex(&rand_num, &pwd_uname_hash);
    let signature = hmac_sha1_hex(url, &rand_hash);
    LoginSignature { rand_num, signature }
}

pub fn write_signature(write_token: &str, url: &str, params: &Params) -> WriteSignature {
    write_signature_with_rand(write_token, url, params, generate_random_number())
}

/// Sign `url + rand_num + value1 + value2 + ...` with the write token.
pub fn write_signature_with_rand(
    write_token: &str,
    url: &str,
    params: &Params,
    rand_num: String,
) -> WriteSignature {
    let mut for_signature = format!("{}{}", url, rand_num);
    let mut names_in_order = Vec::with_capacity(params.len());
    for (name, value) in params.iter() {
        names_in_order.push(name);
        if let Some(value) = value {
            for_signature.push_str(value);
        }
    }

    WriteSignature {
        signature: hmac_sha1_hex(&for_signature, write_token),
        param_order: names_in_order.join(","),
        rand_num,
    }
}

/// Caller parameters followed by the signing fields, ready to POST.
pub fn signed_write_params(params: &Params, url: &str, signed: &WriteSignature) -> Params {
    let mut for_post = params.clone();
    for_post.insert("rand_num", signed.rand_num.clone());
    for_post.insert("url", url);
    for_post.insert("param_order", signed.param_order.clone());
    for_post.insert("signature", signed.signature.clone());
    for_post
}
