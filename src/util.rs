//! Small helpers shared by the package and merge layers.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Get a time-based seed value used to build collision-resistant identifiers.
#[cfg(not(target_arch = "wasm32"))]
pub fn time_seed_nanos() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(12345)
}

#[cfg(target_arch = "wasm32")]
pub fn time_seed_nanos() -> u64 {
    12345
}

static DECLARED_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(<\?xml[^>]*?\bencoding\s*=\s*)["'][^"']*["']"#)
        .expect("valid declaration regex")
});

/// Decode a package part to a string.
///
/// Parts are UTF-8, with or without a BOM, or UTF-16 behind a BOM. Valid
/// UTF-8 is returned borrowed. UTF-16 text is decoded and its XML
/// declaration relabelled as UTF-8, since everything written back out is
/// UTF-8. Malformed input in either encoding is an error.
pub fn decode_text(bytes: &[u8]) -> Result<Cow<'_, str>> {
    match encoding_rs::Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) if encoding != encoding_rs::UTF_8 => {
            let text = encoding
                .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
                .ok_or(Error::Encoding(encoding.name()))?;
            let relabelled = DECLARED_ENCODING.replace(&text, r#"${1}"UTF-8""#);
            Ok(Cow::Owned(relabelled.into_owned()))
        }
        Some((_, bom_len)) => Ok(Cow::Borrowed(std::str::from_utf8(&bytes[bom_len..])?)),
        None => Ok(Cow::Borrowed(std::str::from_utf8(bytes)?)),
    }
}
