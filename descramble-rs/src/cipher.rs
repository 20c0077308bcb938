//! Key-data decryption.
//!
//! The reader ships per-page keys as a base64 blob XOR-ed with a key built
//! from the gallery's `key_hash` and the session cookie.

use crate::error::{DescrambleError, Result};
use crate::models::KeyArray;
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Session ids with a dedicated suffix. Extend when the reader introduces
/// another pinned id.
const KNOWN_SESSION_EXTRAS: &[(&str, &str)] = &[(
    "13fafbe11a72969c2464696efd553940f6a45c1c4801b19c3445e033f38b0e7e",
    "b3d90ea3cc794be5e74013880c4519aae1b8fbe3108f2bbe60c5dc3f6e807ff1",
)];

/// Suffix for every other session id.
const DEFAULT_EXTRA: &str = "0a10f3bd42587ad70fc96886d8e5e7b3614ce69529b238a1c690cb9b51d4868f";

/// Build the XOR key for a gallery: `session_id + key_hash + extra`.
pub fn derive_key(key_hash: &str, session_id: &str) -> Result<String> {
    if session_id.is_empty() {
        return Err(DescrambleError::KeyDerivation(
            "missing session id".to_string(),
        ));
    }
    if key_hash.is_empty() {
        return Err(DescrambleError::KeyDerivation("empty key hash".to_string()));
    }

    let extra = KNOWN_SESSION_EXTRAS
        .iter()
        .find(|(id, _)| *id == session_id)
        .map(|(_, extra)| *extra)
        .unwrap_or(DEFAULT_EXTRA);

    Ok(format!("{}{}{}", session_id, key_hash, extra))
}

/// XOR `data` against `key` repeated to its length. Applying it twice with
/// the same key gives back the input.
pub fn xor_decrypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Decrypted key table: page index → raw key values.
///
/// Values are kept raw so that one bad page does not poison the gallery;
/// validation happens per page in [`KeyTable::key_for`].
#[derive(Debug, Clone, Default)]
pub struct KeyTable {
    entries: BTreeMap<String, Vec<Value>>,
}

impl KeyTable {
    /// Parse the decrypted JSON object `{ "1": [..], "2": [..] }`.
    pub fn from_json(text: &str) -> Result<Self> {
        let entries: BTreeMap<String, Vec<Value>> = serde_json::from_str(text)
            .map_err(|e| DescrambleError::KeyDerivation(format!("key table is not valid JSON: {}", e)))?;
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Typed key for `page`. `Ok(None)` means the page is not scrambled.
    pub fn key_for(&self, page: &str) -> Result<Option<KeyArray>> {
        let Some(values) = self.entries.get(page) else {
            return Ok(None);
        };
        if values.is_empty() {
            return Ok(None);
        }

        let ints = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                v.as_i64().ok_or_else(|| {
                    DescrambleError::MalformedKey(format!(
                        "page {}: element {} is not an integer: {}",
                        page, i, v
                    ))
                })
            })
            .collect::<Result<Vec<i64>>>()?;

        KeyArray::try_from(ints)
            .map(Some)
            .map_err(|e| match e {
                DescrambleError::MalformedKey(msg) => {
                    DescrambleError::MalformedKey(format!("page {}: {}", page, msg))
                }
                other => other,
            })
    }
}

/// Full pipeline for the reader payload: base64 → XOR → UTF-8 → JSON.
pub fn decrypt_key_table(key_hash: &str, key_data: &str, session_id: &str) -> Result<KeyTable> {
    let key = derive_key(key_hash, session_id)?;
    let ciphertext = general_purpose::STANDARD
        .decode(key_data.trim())
        .map_err(|e| DescrambleError::KeyDerivation(format!("key data is not base64: {}", e)))?;

    let plaintext = xor_decrypt(key.as_bytes(), &ciphertext);
    let text = String::from_utf8(plaintext).map_err(|e| {
        warn!("Decrypted key data is not UTF-8, session id is likely wrong");
        DescrambleError::KeyDerivation(format!("decrypted key data is not UTF-8: {}", e))
    })?;

    let table = KeyTable::from_json(&text)?;
    debug!("Decrypted keys for {} pages", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REFERENCE_ZID: &str = "13fafbe11a72969c2464696efd553940f6a45c1c4801b19c3445e033f38b0e7e";

    #[test]
    fn test_derive_key_reference_session() {
        let key = derive_key("abc", REFERENCE_ZID).unwrap();
        assert_eq!(
            key,
            format!(
                "{}abcb3d90ea3cc794be5e74013880c4519aae1b8fbe3108f2bbe60c5dc3f6e807ff1",
                REFERENCE_ZID
            )
        );
    }

    #[test]
    fn test_derive_key_other_session() {
        let key = derive_key("hash", "zid").unwrap();
        assert_eq!(
            key,
            "zidhash0a10f3bd42587ad70fc96886d8e5e7b3614ce69529b238a1c690cb9b51d4868f"
        );
    }

    #[test]
    fn test_derive_key_rejects_empty_inputs() {
        assert!(matches!(derive_key("hash", ""), Err(DescrambleError::KeyDerivation(_))));
        assert!(matches!(derive_key("", "zid"), Err(DescrambleError::KeyDerivation(_))));
    }

    #[test]
    fn test_xor_is_self_inverse() {
        let key = b"k3y";
        let cases: [&[u8]; 4] = [b"a", b"hello world", &[0, 255, 128, 7, 9], &[0xAA; 300]];
        for plaintext in cases {
            let once = xor_decrypt(key, plaintext);
            assert_eq!(once.len(), plaintext.len());
            assert_eq!(xor_decrypt(key, &once), plaintext);
        }
    }

    #[test]
    fn test_xor_cycles_key() {
        assert_eq!(xor_decrypt(&[1, 2], &[0, 0, 0, 0, 0]), vec![1, 2, 1, 2, 1]);
    }

    #[test]
    fn test_decrypt_key_table_round_trip() {
        let zid = "session-cookie";
        let key_hash = "deadbeef";
        let plaintext = r#"{"1":[10,20,30,40],"2":[],"3":[1,2]}"#;

        let key = derive_key(key_hash, zid).unwrap();
        let blob = general_purpose::STANDARD.encode(xor_decrypt(key.as_bytes(), plaintext.as_bytes()));

        let table = decrypt_key_table(key_hash, &blob, zid).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            table.key_for("1").unwrap().unwrap().as_slice(),
            &[10, 20, 30, 40]
        );
        assert!(table.key_for("2").unwrap().is_none());
        assert!(table.key_for("99").unwrap().is_none());
        assert!(matches!(table.key_for("3"), Err(DescrambleError::MalformedKey(_))));
    }

    #[test]
    fn test_wrong_session_is_key_derivation_error() {
        let plaintext = r#"{"1":[10,20,30,40]}"#;
        let key = derive_key("hash", "right").unwrap();
        let blob = general_purpose::STANDARD.encode(xor_decrypt(key.as_bytes(), plaintext.as_bytes()));

        let result = decrypt_key_table("hash", &blob, "wrong-session-id-entirely");
        assert!(matches!(result, Err(DescrambleError::KeyDerivation(_))));
    }

    #[test]
    fn test_non_integer_key_values() {
        let table = KeyTable::from_json(r#"{"1":[1,"x",3,4]}"#).unwrap();
        assert!(matches!(table.key_for("1"), Err(DescrambleError::MalformedKey(_))));
    }
}
