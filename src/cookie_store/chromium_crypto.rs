//! Decryption of Chromium `encrypted_value` cookie columns.
//!
//! Chromium prefixes every encrypted value with a version tag:
//! - Linux `v10`: AES-128-CBC, key derived from the fixed password `peanuts`
//! - Linux `v11`: AES-128-CBC, key derived from the Safe Storage password
//!   kept in the desktop keyring
//! - macOS `v10`: AES-128-CBC, key derived from the "Safe Storage" Keychain
//!   password (1003 PBKDF2 rounds)
//! - Windows `v10`/`v11`: AES-256-GCM, key stored DPAPI-protected in the
//!   profile's `Local State` file
//!
//! Newer databases prepend the SHA-256 of the cookie's host to the
//! plaintext; it is stripped when present.

use std::env;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use aes::cipher::{BlockDecryptMut, KeyIvInit, block_padding::Pkcs7};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use super::Browser;

/// Overrides the Safe Storage password looked up in the keyring.
pub const SAFE_STORAGE_ENV: &str = "LEETCODE_AUTH_SAFE_STORAGE";

type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type HmacSha1 = hmac::Hmac<sha1::Sha1>;

const CBC_SALT: &[u8] = b"saltysalt";
const CBC_IV: [u8; 16] = [b' '; 16];
const LINUX_V10_PASSWORD: &[u8] = b"peanuts";
const LINUX_ROUNDS: u32 = 1;
const MACOS_ROUNDS: u32 = 1003;

const GCM_NONCE_LEN: usize = 12;
const GCM_TAG_LEN: usize = 16;
const DPAPI_PREFIX: &[u8] = b"DPAPI";

/// Errors decrypting a single cookie value or loading a key.
#[derive(Debug, Error)]
pub(crate) enum DecryptError {
    /// The value is shorter than its version tag and framing require.
    #[error("encrypted cookie value is truncated")]
    Truncated,

    /// The version tag is not one this platform knows how to decrypt.
    #[error("unsupported encrypted cookie version '{0}'")]
    UnsupportedVersion(String),

    /// No key is available for the value's version.
    #[error("no decryption key available for {0} cookies")]
    MissingKey(&'static str),

    /// The cipher rejected the key or the ciphertext.
    #[error("cookie value failed to decrypt")]
    Cipher,

    /// The decrypted bytes are not UTF-8.
    #[error("decrypted cookie value is not UTF-8")]
    NotUtf8,

    /// The browser key could not be recovered from `Local State`.
    #[error("browser key unavailable: {0}")]
    KeyUnavailable(String),
}

/// Keys for one Chromium-family browser's encrypted cookie values.
#[derive(Clone, PartialEq, Eq)]
pub(crate) enum ChromiumKeys {
    /// AES-128-CBC keys (Linux, macOS).
    Cbc {
        v10: Option<[u8; 16]>,
        v11: Option<[u8; 16]>,
    },
    /// AES-256-GCM key (Windows).
    Gcm(Option<Vec<u8>>),
}

impl Default for ChromiumKeys {
    fn default() -> Self {
        Self::Cbc {
            v10: None,
            v11: None,
        }
    }
}

impl fmt::Debug for ChromiumKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cbc { v10, v11 } => f
                .debug_struct("Cbc")
                .field("v10", &v10.is_some())
                .field("v11", &v11.is_some())
                .finish(),
            Self::Gcm(key) => f.debug_tuple("Gcm").field(&key.is_some()).finish(),
        }
    }
}

impl ChromiumKeys {
    /// Loads the keys `browser` uses on this platform.
    ///
    /// `user_data` is the browser's user-data directory (parent of the
    /// profiles). Missing keys are logged; values needing them are skipped.
    /// May block on the OS keyring.
    pub(crate) fn load(browser: &Browser, user_data: &Path) -> Self {
        if cfg!(target_os = "windows") {
            let key = load_local_state_key(user_data)
                .inspect_err(|error| debug!(browser = %browser, error = %error, "no cookie key"))
                .ok();
            Self::Gcm(key)
        } else if cfg!(target_os = "macos") {
            let key = safe_storage_password(browser)
                .and_then(|password| derive_cbc_key(password.as_bytes(), MACOS_ROUNDS));
            Self::Cbc { v10: key, v11: key }
        } else {
            Self::Cbc {
                v10: derive_cbc_key(LINUX_V10_PASSWORD, LINUX_ROUNDS),
                v11: safe_storage_password(browser)
                    .and_then(|password| derive_cbc_key(password.as_bytes(), LINUX_ROUNDS)),
            }
        }
    }

    /// Decrypts an `encrypted_value` stored for `host_key`.
    ///
    /// # Errors
    ///
    /// Returns [`DecryptError`] when the value cannot be decrypted with the
    /// loaded keys.
    pub(crate) fn decrypt(&self, host_key: &str, encrypted: &[u8]) -> Result<String, DecryptError> {
        let (version, payload) = encrypted.split_at_checked(3).ok_or(DecryptError::Truncated)?;
        let plaintext = match (self, version) {
            (Self::Cbc { v10, .. }, b"v10") => {
                cbc_decrypt(v10.as_ref().ok_or(DecryptError::MissingKey("v10"))?, payload)?
            }
            (Self::Cbc { v11, .. }, b"v11") => {
                cbc_decrypt(v11.as_ref().ok_or(DecryptError::MissingKey("v11"))?, payload)?
            }
            (Self::Gcm(key), b"v10" | b"v11") => {
                gcm_decrypt(key.as_deref().ok_or(DecryptError::MissingKey("v10"))?, payload)?
            }
            _ => {
                return Err(DecryptError::UnsupportedVersion(
                    String::from_utf8_lossy(version).into_owned(),
                ));
            }
        };

        String::from_utf8(strip_host_digest(host_key, &plaintext).to_vec())
            .map_err(|_| DecryptError::NotUtf8)
    }
}

fn derive_cbc_key(password: &[u8], rounds: u32) -> Option<[u8; 16]> {
    pbkdf2::pbkdf2_array::<HmacSha1, 16>(password, CBC_SALT, rounds).ok()
}

fn cbc_decrypt(key: &[u8; 16], payload: &[u8]) -> Result<Vec<u8>, DecryptError> {
    Aes128CbcDec::new_from_slices(key, &CBC_IV)
        .map_err(|_| DecryptError::Cipher)?
        .decrypt_padded_vec_mut::<Pkcs7>(payload)
        .map_err(|_| DecryptError::Cipher)
}

fn gcm_decrypt(key: &[u8], payload: &[u8]) -> Result<Vec<u8>, DecryptError> {
    if payload.len() < GCM_NONCE_LEN + GCM_TAG_LEN {
        return Err(DecryptError::Truncated);
    }
    let (nonce, ciphertext) = payload.split_at(GCM_NONCE_LEN);
    Aes256Gcm::new_from_slice(key)
        .map_err(|_| DecryptError::Cipher)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| DecryptError::Cipher)
}

fn strip_host_digest<'a>(host_key: &str, plaintext: &'a [u8]) -> &'a [u8] {
    let digest = Sha256::digest(host_key.as_bytes());
    plaintext.strip_prefix(digest.as_slice()).unwrap_or(plaintext)
}

/// Safe Storage password from [`SAFE_STORAGE_ENV`] or the OS keyring.
fn safe_storage_password(browser: &Browser) -> Option<String> {
    if let Some(from_env) = env::var_os(SAFE_STORAGE_ENV) {
        let password = from_env.to_string_lossy().trim().to_string();
        if !password.is_empty() {
            return Some(password);
        }
    }

    let (service, account) = keychain_names(browser)?;
    let entry = catch_unwind(|| keyring::Entry::new(service, account))
        .ok()?
        .ok()?;
    match catch_unwind(AssertUnwindSafe(|| entry.get_password())) {
        Ok(Ok(password)) if !password.is_empty() => Some(password),
        _ => {
            debug!(browser = %browser, service, "safe storage password not in keyring");
            None
        }
    }
}

fn keychain_names(browser: &Browser) -> Option<(&'static str, &'static str)> {
    match browser {
        Browser::Chrome => Some(("Chrome Safe Storage", "Chrome")),
        Browser::Edge => Some(("Microsoft Edge Safe Storage", "Microsoft Edge")),
        Browser::Chromium => Some(("Chromium Safe Storage", "Chromium")),
        Browser::Firefox | Browser::CookieFile(_) => None,
    }
}

fn load_local_state_key(user_data: &Path) -> Result<Vec<u8>, DecryptError> {
    let raw = std::fs::read_to_string(user_data.join("Local State"))
        .map_err(|error| DecryptError::KeyUnavailable(error.to_string()))?;
    let protected = local_state_encrypted_key(&raw)?;
    dpapi_unprotect(&protected)
}

/// Extracts the DPAPI-protected key blob from a `Local State` document.
fn local_state_encrypted_key(raw: &str) -> Result<Vec<u8>, DecryptError> {
    let json: serde_json::Value = serde_json::from_str(raw)
        .map_err(|error| DecryptError::KeyUnavailable(format!("Local State: {error}")))?;
    let encoded = json
        .pointer("/os_crypt/encrypted_key")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| DecryptError::KeyUnavailable("os_crypt.encrypted_key missing".into()))?;
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|error| DecryptError::KeyUnavailable(format!("encrypted_key: {error}")))?;
    decoded
        .strip_prefix(DPAPI_PREFIX)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| DecryptError::KeyUnavailable("encrypted_key lacks DPAPI prefix".into()))
}

#[cfg(windows)]
fn dpapi_unprotect(protected: &[u8]) -> Result<Vec<u8>, DecryptError> {
    use windows::Win32::Security::Cryptography::{
        CRYPT_INTEGER_BLOB, CRYPTPROTECT_UI_FORBIDDEN, CryptUnprotectData,
    };

    #[link(name = "kernel32")]
    unsafe extern "system" {
        fn LocalFree(mem: *mut std::ffi::c_void) -> *mut std::ffi::c_void;
    }

    let len = u32::try_from(protected.len())
        .map_err(|_| DecryptError::KeyUnavailable("key blob too large".into()))?;
    let input = CRYPT_INTEGER_BLOB {
        cbData: len,
        pbData: protected.as_ptr().cast_mut(),
    };
    let mut output = CRYPT_INTEGER_BLOB::default();

    // SAFETY: `input` points at `protected`, which outlives the call; the
    // output buffer is allocated by the system and released with LocalFree.
    unsafe {
        CryptUnprotectData(
            &input,
            None,
            None,
            None,
            None,
            CRYPTPROTECT_UI_FORBIDDEN,
            &mut output,
        )
        .map_err(|error| DecryptError::KeyUnavailable(format!("DPAPI: {error}")))?;
        if output.pbData.is_null() {
            return Err(DecryptError::KeyUnavailable("DPAPI returned no data".into()));
        }
        let key = std::slice::from_raw_parts(output.pbData, output.cbData as usize).to_vec();
        LocalFree(output.pbData.cast());
        Ok(key)
    }
}

#[cfg(not(windows))]
fn dpapi_unprotect(_protected: &[u8]) -> Result<Vec<u8>, DecryptError> {
    Err(DecryptError::KeyUnavailable(
        "DPAPI is only available on Windows".into(),
    ))
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Encryption helpers mirroring what Chromium writes.

    use aes::cipher::{BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
    use aes_gcm::aead::{Aead, KeyInit};
    use aes_gcm::{Aes256Gcm, Nonce};

    use super::{CBC_IV, LINUX_ROUNDS, LINUX_V10_PASSWORD, derive_cbc_key};

    type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

    pub(crate) fn linux_v10_key() -> [u8; 16] {
        derive_cbc_key(LINUX_V10_PASSWORD, LINUX_ROUNDS).unwrap()
    }

    pub(crate) fn cbc_encrypt(version: &[u8], key: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
        let mut out = version.to_vec();
        out.extend(
            Aes128CbcEnc::new_from_slices(key, &CBC_IV)
                .unwrap()
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        );
        out
    }

    pub(crate) fn gcm_encrypt(key: &[u8], nonce: &[u8; 12], plaintext: &[u8]) -> Vec<u8> {
        let mut out = b"v10".to_vec();
        out.extend_from_slice(nonce);
        out.extend(
            Aes256Gcm::new_from_slice(key)
                .unwrap()
                .encrypt(Nonce::from_slice(nonce), plaintext)
                .unwrap(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{cbc_encrypt, gcm_encrypt, linux_v10_key};
    use super::*;

    fn linux_keys() -> ChromiumKeys {
        ChromiumKeys::Cbc {
            v10: Some(linux_v10_key()),
            v11: None,
        }
    }

    #[test]
    fn test_linux_v10_key_matches_known_derivation() {
        // PBKDF2-HMAC-SHA1("peanuts", "saltysalt", 1), first 16 bytes.
        assert_eq!(
            linux_v10_key(),
            [
                0xfd, 0x62, 0x1f, 0xe5, 0xa2, 0xb4, 0x02, 0x53, 0x9d, 0xfa, 0x14, 0x7c, 0xa9,
                0x27, 0x27, 0x78
            ]
        );
    }

    #[test]
    fn test_decrypt_cbc_v10_value() {
        let encrypted = cbc_encrypt(b"v10", &linux_v10_key(), b"csrf-from-chrome");
        assert_eq!(
            linux_keys().decrypt(".leetcode.com", &encrypted).unwrap(),
            "csrf-from-chrome"
        );
    }

    #[test]
    fn test_decrypt_strips_host_digest_prefix() {
        let mut plaintext = Sha256::digest(b".leetcode.com").to_vec();
        plaintext.extend_from_slice(b"session-value");
        let encrypted = cbc_encrypt(b"v10", &linux_v10_key(), &plaintext);

        assert_eq!(
            linux_keys().decrypt(".leetcode.com", &encrypted).unwrap(),
            "session-value"
        );
    }

    #[test]
    fn test_decrypt_v11_without_keyring_password_is_missing_key() {
        let encrypted = cbc_encrypt(b"v11", &linux_v10_key(), b"value");
        let err = linux_keys().decrypt(".leetcode.com", &encrypted).unwrap_err();
        assert!(matches!(err, DecryptError::MissingKey("v11")));
    }

    #[test]
    fn test_decrypt_v11_with_safe_storage_key() {
        let key = derive_cbc_key(b"from-keyring", LINUX_ROUNDS).unwrap();
        let keys = ChromiumKeys::Cbc {
            v10: None,
            v11: Some(key),
        };
        let encrypted = cbc_encrypt(b"v11", &key, b"v11-value");
        assert_eq!(keys.decrypt(".leetcode.com", &encrypted).unwrap(), "v11-value");
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let other = derive_cbc_key(b"not-peanuts", LINUX_ROUNDS).unwrap();
        let encrypted = cbc_encrypt(b"v10", &other, b"value that spans two blocks!!");
        assert!(linux_keys().decrypt(".leetcode.com", &encrypted).is_err());
    }

    #[test]
    fn test_decrypt_gcm_value() {
        let key = [7_u8; 32];
        let keys = ChromiumKeys::Gcm(Some(key.to_vec()));
        let encrypted = gcm_encrypt(&key, &[1; 12], b"windows-session");
        assert_eq!(
            keys.decrypt(".leetcode.com", &encrypted).unwrap(),
            "windows-session"
        );

        let mut tampered = encrypted.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;
        assert!(matches!(
            keys.decrypt(".leetcode.com", &tampered),
            Err(DecryptError::Cipher)
        ));
    }

    #[test]
    fn test_decrypt_rejects_short_and_unknown_values() {
        assert!(matches!(
            linux_keys().decrypt("h", b"v1"),
            Err(DecryptError::Truncated)
        ));
        assert!(matches!(
            linux_keys().decrypt("h", b"v20abcdef"),
            Err(DecryptError::UnsupportedVersion(v)) if v == "v20"
        ));
        assert!(matches!(
            ChromiumKeys::Gcm(Some(vec![0; 32])).decrypt("h", b"v10short"),
            Err(DecryptError::Truncated)
        ));
    }

    #[test]
    fn test_local_state_key_extraction() {
        let blob = STANDARD.encode(b"DPAPIprotected-bytes");
        let raw = format!(r#"{{"os_crypt":{{"encrypted_key":"{blob}"}}}}"#);
        assert_eq!(local_state_encrypted_key(&raw).unwrap(), b"protected-bytes");

        let no_prefix = format!(
            r#"{{"os_crypt":{{"encrypted_key":"{}"}}}}"#,
            STANDARD.encode(b"plain")
        );
        assert!(local_state_encrypted_key(&no_prefix).is_err());
        assert!(local_state_encrypted_key("{}").is_err());
        assert!(local_state_encrypted_key("not json").is_err());
    }

    #[test]
    fn test_debug_hides_key_material() {
        let debug = format!("{:?}", linux_keys());
        assert_eq!(debug, "Cbc { v10: true, v11: false }");
    }
}
