//! Encrypted catalog client
//!
//! The provider's search API only accepts an encrypted, signed envelope:
//! JSON request → AES-128-CBC → base64, wrapped with an integrity tag
//! `md5(md5(app_key) + key + ciphertext)`, base64-encoded again and posted as a
//! single `data` form field next to a random nonce. The answer maps an
//! industry id (IMDB) onto the provider's own media id and "box type".

use aes::cipher::{block_padding::Pkcs7, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::error::ResolveError;
use crate::models::MediaType;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;

const APP_KEY: &str = "moviebox";
const CIPHER_KEY: &str = "123d6cedf626dy54";
const CIPHER_IV: &str = "wEiphTn!wEiphTn!";
const APP_ID: &str = "com.tdo.showbox";
const APP_VERSION: &str = "11.5";
const APP_VERSION_CODE: &str = "129";
const ENVELOPE_TTL_HOURS: i64 = 12;

/// Plaintext request envelope
#[derive(Debug, Serialize)]
pub struct SearchEnvelope {
    pub childmode: &'static str,
    pub app_version: &'static str,
    pub appid: &'static str,
    pub module: &'static str,
    pub channel: &'static str,
    pub lang: &'static str,
    pub expired_date: String,
    pub platform: &'static str,
    pub keyword: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub page: &'static str,
    pub pagelimit: &'static str,
}

impl SearchEnvelope {
    pub fn new(external_id: &str, media_type: MediaType, now: DateTime<Utc>) -> Self {
        let expires = now + ChronoDuration::hours(ENVELOPE_TTL_HOURS);
        Self {
            childmode: "0",
            app_version: APP_VERSION,
            appid: APP_ID,
            module: "Search5",
            channel: "Website",
            lang: "en",
            expired_date: expires.timestamp().to_string(),
            platform: "android",
            keyword: external_id.to_string(),
            kind: media_type.as_str(),
            page: "1",
            pagelimit: "20",
        }
    }
}

/// Signed outer body, base64-encoded into the `data` field
#[derive(Debug, Serialize, Deserialize)]
struct SealedBody {
    app_key: String,
    verify: String,
    encrypt_data: String,
}

/// Form fields actually posted
#[derive(Debug, Clone)]
pub struct SealedRequest {
    pub data: String,
    pub nonce: String,
}

fn md5_hex(input: &str) -> String {
    hex::encode(Md5::digest(input.as_bytes()))
}

/// Encrypt plaintext under the fixed key/IV, base64 output
pub fn encrypt(plaintext: &str) -> String {
    let cipher = Aes128CbcEnc::new(CIPHER_KEY.as_bytes().into(), CIPHER_IV.as_bytes().into());
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());
    STANDARD.encode(ciphertext)
}

/// Integrity tag over the base64 ciphertext
pub fn integrity_tag(ciphertext: &str) -> String {
    md5_hex(&format!("{}{}{}", md5_hex(APP_KEY), CIPHER_KEY, ciphertext))
}

/// Serialize, encrypt and sign an envelope
pub fn seal<T: Serialize>(envelope: &T) -> Result<SealedRequest, ResolveError> {
    let plaintext = serde_json::to_string(envelope)?;
    let encrypt_data = encrypt(&plaintext);
    let body = SealedBody {
        app_key: md5_hex(APP_KEY),
        verify: integrity_tag(&encrypt_data),
        encrypt_data,
    };
    let data = STANDARD.encode(serde_json::to_vec(&body)?);
    Ok(SealedRequest {
        data,
        nonce: uuid::Uuid::new_v4().simple().to_string(),
    })
}

/// Provider-side identity of a title
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMedia {
    pub id: u64,
    pub box_type: u8,
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<CatalogItem>,
}

#[derive(Debug, Deserialize)]
struct CatalogItem {
    id: u64,
    box_type: u8,
    #[serde(default)]
    imdb_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

/// Client for the encrypted search endpoint
#[derive(Clone)]
pub struct CatalogClient {
    base_url: String,
    client: reqwest::Client,
}

impl CatalogClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Resolve an industry id to the provider's media id
    pub async fn find(
        &self,
        external_id: &str,
        media_type: MediaType,
    ) -> Result<ProviderMedia, ResolveError> {
        let envelope = SearchEnvelope::new(external_id, media_type, Utc::now());
        let sealed = seal(&envelope)?;

        let response = self
            .client
            .post(&self.base_url)
            .header("User-Agent", "okhttp/3.2.0")
            .form(&[
                ("data", sealed.data.as_str()),
                ("appid", "27"),
                ("platform", "android"),
                ("version", APP_VERSION_CODE),
                ("medium", "Website"),
                ("token", sealed.nonce.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::from_status(status, "catalog search"));
        }

        let body = response.text().await?;
        let parsed: CatalogResponse = serde_json::from_str(&body)?;
        if parsed.code != 1 {
            return Err(ResolveError::NotFound(
                parsed.msg.unwrap_or_else(|| format!("catalog code {}", parsed.code)),
            ));
        }

        debug!(external_id, results = parsed.data.len(), "catalog search answered");
        pick_match(parsed.data, external_id)
            .ok_or_else(|| ResolveError::NotFound(format!("{} not in provider catalog", external_id)))
    }
}

/// First ranked entry carrying the requested id; the top entry otherwise
fn pick_match(items: Vec<CatalogItem>, external_id: &str) -> Option<ProviderMedia> {
    let carries_ids = items.iter().any(|i| i.imdb_id.is_some());
    items
        .into_iter()
        .find(|item| {
            !carries_ids
                || item
                    .imdb_id
                    .as_deref()
                    .is_some_and(|id| id.eq_ignore_ascii_case(external_id))
        })
        .map(|item| ProviderMedia {
            id: item.id,
            box_type: item.box_type,
            title: item.title,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes::cipher::BlockDecryptMut;
    use chrono::TimeZone;

    type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

    fn decrypt(b64: &str) -> String {
        let bytes = STANDARD.decode(b64).unwrap();
        let plain = Aes128CbcDec::new(CIPHER_KEY.as_bytes().into(), CIPHER_IV.as_bytes().into())
            .decrypt_padded_vec_mut::<Pkcs7>(&bytes)
            .unwrap();
        String::from_utf8(plain).unwrap()
    }

    #[test]
    fn test_envelope_expires_twelve_hours_later() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let envelope = SearchEnvelope::new("tt0133093", MediaType::Movie, now);
        assert_eq!(envelope.expired_date, (now.timestamp() + 12 * 3600).to_string());
        assert_eq!(envelope.kind, "movie");
    }

    #[test]
    fn test_sealed_request_is_signed_and_decryptable() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let envelope = SearchEnvelope::new("tt0903747", MediaType::Tv, now);
        let sealed = seal(&envelope).unwrap();

        let outer: SealedBody =
            serde_json::from_slice(&STANDARD.decode(&sealed.data).unwrap()).unwrap();
        assert_eq!(outer.app_key, md5_hex(APP_KEY));
        assert_eq!(outer.verify, integrity_tag(&outer.encrypt_data));
        assert_eq!(outer.verify.len(), 32);

        let inner: serde_json::Value = serde_json::from_str(&decrypt(&outer.encrypt_data)).unwrap();
        assert_eq!(inner["keyword"], "tt0903747");
        assert_eq!(inner["type"], "tv");
        assert_eq!(inner["module"], "Search5");
    }

    #[test]
    fn test_nonce_is_random_per_request() {
        let envelope = SearchEnvelope::new("tt1", MediaType::Movie, Utc::now());
        let a = seal(&envelope).unwrap();
        let b = seal(&envelope).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_eq!(a.nonce.len(), 32);
    }

    #[test]
    fn test_pick_match_prefers_matching_external_id() {
        let items = vec![
            CatalogItem { id: 1, box_type: 1, imdb_id: Some("tt999".into()), title: None },
            CatalogItem { id: 2, box_type: 1, imdb_id: Some("TT0133093".into()), title: None },
        ];
        assert_eq!(pick_match(items, "tt0133093").unwrap().id, 2);
    }

    #[test]
    fn test_pick_match_without_ids_takes_top_rank() {
        let items = vec![
            CatalogItem { id: 7, box_type: 2, imdb_id: None, title: Some("Show".into()) },
            CatalogItem { id: 8, box_type: 2, imdb_id: None, title: None },
        ];
        let media = pick_match(items, "tt1").unwrap();
        assert_eq!(media.id, 7);
        assert_eq!(media.box_type, 2);
    }

    #[test]
    fn test_pick_match_no_hit() {
        let items = vec![CatalogItem { id: 1, box_type: 1, imdb_id: Some("tt5".into()), title: None }];
        assert!(pick_match(items, "tt6").is_none());
    }
}
