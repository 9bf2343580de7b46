//! Encoded subtitle payloads.
//!
//! Some subtitle references carry their script as base64 `iv`/`data` pairs
//! instead of a link. The data is AES-256-CBC encrypted with a key derived
//! from the numeric subtitle id and the plaintext is zlib compressed.

use std::io::Read;

use aes::Aes256;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use flate2::read::ZlibDecoder;
use serde::Deserialize;
use sha1::{Digest, Sha1};

use crate::error::{Result, SubtitleError};

type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// `floor(2^25 * sqrt(6.9))`
const KEY_SEED: u64 = 88_140_282;

/// Decrypt and inflate an inline payload into script XML.
pub fn decode_payload(id: &str, iv: &str, data: &str) -> Result<String> {
    let numeric_id: u64 = id
        .trim()
        .parse()
        .map_err(|_| SubtitleError::decode(id, "subtitle id is not numeric"))?;

    let iv = decode_base64(iv).map_err(|e| SubtitleError::decode(id, e))?;
    let iv: [u8; 16] = iv
        .as_slice()
        .try_into()
        .map_err(|_| SubtitleError::decode(id, format!("iv must be 16 bytes, got {}", iv.len())))?;
    let data = decode_base64(data).map_err(|e| SubtitleError::decode(id, e))?;

    let key = derive_key(numeric_id);
    let compressed = Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&data)
        .map_err(|_| SubtitleError::decode(id, "decryption failed"))?;

    let mut script = String::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_string(&mut script)
        .map_err(|e| SubtitleError::decode(id, format!("inflate failed: {e}")))?;

    Ok(script)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Envelope {
    #[serde(rename = "@id")]
    id: String,
    iv: Option<String>,
    data: Option<String>,
}

/// Turn a fetched subtitle document into script XML.
///
/// The document is either a `<subtitle_script>` already or an encoded
/// `<subtitle id=".."><iv/><data/></subtitle>` envelope.
pub fn decode_document(body: &str, fallback_id: &str) -> Result<String> {
    let envelope: Envelope = quick_xml::de::from_str(body)
        .map_err(|e| SubtitleError::unavailable(format!("invalid subtitle document: {e}")))?;

    match (envelope.iv, envelope.data) {
        (Some(iv), Some(data)) => {
            let id = if envelope.id.is_empty() {
                fallback_id
            } else {
                envelope.id.as_str()
            };
            decode_payload(id, &iv, &data)
        }
        _ => Ok(body.to_string()),
    }
}

/// 32-byte AES key for a subtitle id: SHA-1 of a fixed prefix and a mixed
/// form of the id, zero padded.
pub fn derive_key(id: u64) -> [u8; 32] {
    let mixed_seed = (KEY_SEED ^ id) << 5;
    let folded = id ^ KEY_SEED;
    let mixed = folded ^ (folded >> 3) ^ mixed_seed;

    let mut hasher = Sha1::new();
    hasher.update(key_prefix());
    hasher.update(mixed.to_string().as_bytes());
    let digest = hasher.finalize();

    let mut key = [0u8; 32];
    key[..digest.len()].copy_from_slice(&digest);
    key
}

/// Twenty printable bytes from a Fibonacci-style sequence seeded with 1, 2.
fn key_prefix() -> [u8; 20] {
    let mut prefix = [0u8; 20];
    let (mut a, mut b) = (1u64, 2u64);
    for byte in prefix.iter_mut() {
        let next = a + b;
        *byte = (next % 97 + 33) as u8;
        a = b;
        b = next;
    }
    prefix
}

fn decode_base64(value: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let compact: String = value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use cbc::cipher::BlockEncryptMut;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    type Aes256CbcEnc = cbc::Encryptor<Aes256>;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Produce the `(iv, data)` pair a server would send for `plain`.
    pub(crate) fn encode_payload(id: u64, plain: &str) -> (String, String) {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(plain.as_bytes()).unwrap();
        let compressed = encoder.finish().unwrap();

        let iv = [7u8; 16];
        let key = derive_key(id);
        let data = Aes256CbcEnc::new(&key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(&compressed);

        (STANDARD.encode(iv), STANDARD.encode(data))
    }

    #[test]
    fn test_key_seed() {
        let seed = ((1u64 << 25) as f64 * 6.9f64.sqrt()).floor() as u64;
        assert_eq!(seed, KEY_SEED);
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(&key_prefix(), b"$&).6CXzPHw=2N_+isZK");
    }

    #[test]
    fn test_derive_key_known_vectors() {
        let key = derive_key(1);
        assert_eq!(hex(&key[..20]), "7ff499fec4192ba322db1c28ea57108c6e20aed1");
        assert_eq!(&key[20..], &[0u8; 12]);

        let key = derive_key(123_456);
        assert_eq!(hex(&key[..20]), "ff4b6cbf94b24c036affc71faa8031c7bd819327");
    }

    #[test]
    fn test_decode_payload() {
        let plain = r#"<subtitle_script title="x" lang_code="enUS"/>"#;
        let (iv, data) = encode_payload(123_456, plain);

        assert_eq!(decode_payload("123456", &iv, &data).unwrap(), plain);
    }

    #[test]
    fn test_decode_payload_tolerates_wrapped_base64() {
        let plain = "line one\nline two";
        let (iv, data) = encode_payload(42, plain);
        let wrapped: String = data
            .as_bytes()
            .chunks(8)
            .map(|c| std::str::from_utf8(c).unwrap())
            .collect::<Vec<_>>()
            .join("\n  ");

        assert_eq!(decode_payload("42", &iv, &wrapped).unwrap(), plain);
    }

    #[test]
    fn test_decode_payload_wrong_id_fails() {
        let (iv, data) = encode_payload(42, "secret");
        let err = decode_payload("43", &iv, &data).unwrap_err();
        assert!(matches!(err, SubtitleError::Decode { .. }));
    }

    #[test]
    fn test_decode_payload_bad_inputs() {
        assert!(matches!(
            decode_payload("abc", "AAAA", "AAAA"),
            Err(SubtitleError::Decode { .. })
        ));
        assert!(matches!(
            decode_payload("1", "not base64!", "AAAA"),
            Err(SubtitleError::Decode { .. })
        ));
        // valid base64, wrong iv length
        assert!(matches!(
            decode_payload("1", "AAAA", "AAAA"),
            Err(SubtitleError::Decode { .. })
        ));
    }

    #[test]
    fn test_decode_document_passthrough_and_envelope() {
        let plain = r#"<subtitle_script title="x" lang_code="enUS"/>"#;
        assert_eq!(decode_document(plain, "1").unwrap(), plain);

        let (iv, data) = encode_payload(77, plain);
        let envelope = format!(r#"<subtitle id="77"><iv>{iv}</iv><data>{data}</data></subtitle>"#);
        assert_eq!(decode_document(&envelope, "0").unwrap(), plain);

        let anonymous = format!(r#"<subtitle><iv>{iv}</iv><data>{data}</data></subtitle>"#);
        assert_eq!(decode_document(&anonymous, "77").unwrap(), plain);
    }
}
