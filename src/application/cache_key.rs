//! Cache keys for rendered artifacts.
//!
//! A key covers everything that changes the output: composition, kind, codec
//! and the input props. Props are normalized (object keys sorted at every
//! depth) before hashing so key order in the request body does not matter.

use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};

use crate::domain::composition::{Codec, CompositionKind};

const CACHE_KEY_HEX_LEN: usize = 16;

pub fn cache_key(
    composition_id: &str,
    kind: CompositionKind,
    codec: Option<Codec>,
    input_props: &Map<String, Value>,
) -> String {
    let payload = json!({
        "compositionId": composition_id,
        "kind": kind.as_str(),
        "codec": codec.map(Codec::as_str),
        "inputProps": normalize(&Value::Object(input_props.clone())),
    });

    let digest = Sha256::digest(payload.to_string().as_bytes());
    let mut key = hex::encode(digest);
    key.truncate(CACHE_KEY_HEX_LEN);
    key
}

fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|left, right| left.0.cmp(right.0));
            let mut sorted = Map::new();
            for (key, inner) in entries {
                sorted.insert(key.clone(), normalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        other => other.clone(),
    }
}
