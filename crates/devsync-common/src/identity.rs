//! Content-addressed identity for device entries
//!
//! Two SHA-1 digests, both rendered in lowercase base32hex with `-` padding:
//!
//! - `id` = digest of `type`, the string form of `value`, and `deviceTime`
//! - `_id` = digest of `id` and `groupId`
//!
//! Re-ingesting the same reading for the same group always yields the same
//! `_id`, which turns persistence into an upsert. The same reading in two
//! groups yields two different keys.

use std::sync::LazyLock;

use data_encoding::{Encoding, Specification};
use serde_json::Value;
use sha1::{Digest, Sha1};

use crate::error::{CommonError, Result};
use crate::types::Entry;

/// Base32hex alphabet used for stored identifiers
pub const BASE32HEX_SYMBOLS: &str = "0123456789abcdefghijklmnopqrstuv";

/// Padding character used in place of `=`
pub const BASE32HEX_PADDING: char = '-';

static BASE32HEX: LazyLock<Encoding> = LazyLock::new(|| {
    let mut spec = Specification::new();
    spec.symbols.push_str(BASE32HEX_SYMBOLS);
    spec.padding = Some(BASE32HEX_PADDING);
    #[allow(clippy::expect_used)]
    let encoding = spec.encoding().expect("static base32hex specification");
    encoding
});

/// Encode bytes as lowercase base32hex with `-` padding
pub fn encode_base32hex(bytes: &[u8]) -> String {
    BASE32HEX.encode(bytes)
}

fn digest<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha1::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    encode_base32hex(&hasher.finalize())
}

/// Content identity of a reading, independent of who owns it
pub fn content_id(kind: &str, value: Option<&Value>, device_time: &str) -> String {
    let value = js_string(value);
    digest([kind, value.as_str(), device_time])
}

/// Storage key of a reading owned by `group_id`
pub fn storage_id(id: &str, group_id: &str) -> String {
    digest([id, group_id])
}

/// Assign `id` and `_id` to an entry in place.
///
/// Entries that already carry `_id` are left untouched. Entries that carry an
/// `id` keep it and only get a storage key. `deviceTime` and `groupId` must be
/// set before calling this; the entry is not modified when either is missing.
pub fn assign_identity(entry: &mut Entry) -> Result<()> {
    if entry.storage_id.is_some() {
        return Ok(());
    }

    let Some(group_id) = entry.group_id.as_deref() else {
        return Err(CommonError::MissingGroupId {
            kind: entry.kind.clone(),
        });
    };

    let id = match entry.id.as_deref() {
        Some(id) => id.to_string(),
        None => {
            let Some(device_time) = entry.device_time.as_deref() else {
                return Err(CommonError::MissingDeviceTime {
                    kind: entry.kind.clone(),
                });
            };
            content_id(&entry.kind, entry.value.as_ref(), device_time)
        },
    };

    entry.storage_id = Some(storage_id(&id, group_id));
    entry.id = Some(id);
    Ok(())
}

/// String form of a value following JavaScript `String(value)`, which keeps
/// identifiers stable against entries already in the store.
pub fn js_string(value: Option<&Value>) -> String {
    match value {
        None => "undefined".to_string(),
        Some(Value::Null) => "null".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                n.as_f64().map(js_number).unwrap_or_else(|| n.to_string())
            }
        },
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => js_string(Some(other)),
            })
            .collect::<Vec<_>>()
            .join(","),
        Some(Value::Object(_)) => "[object Object]".to_string(),
    }
}

/// JavaScript `Number.prototype.toString()`: shortest round-trip digits,
/// exponent form outside `[1e-6, 1e21)` with an explicit `+` on positive exponents.
fn js_number(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }

    let magnitude = f.abs();
    if (1e-6..1e21).contains(&magnitude) {
        // Display drops the trailing ".0" of integral floats, as JS does
        return f.to_string();
    }

    let exponent = format!("{:e}", f);
    match exponent.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => exponent,
    }
}
