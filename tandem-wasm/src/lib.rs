//! WebAssembly bindings for Tandem remote signing.
//!
//! Gives the signing and initiating pages the WebAuthn codec (base64url
//! wire JSON to `ArrayBuffer`-shaped options and back) and the relay
//! session state machine, without any network code in the module.

mod convert;
mod session;

use js_sys::{Object, Reflect, Uint8Array};
use serde_json::Value;
use tandem_core::codec::{self, encode_credential as encode_wire, Challenge, WireChallenge};
use tandem_core::CeremonyKind;
use wasm_bindgen::prelude::*;

pub use session::WasmRemoteSession;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get the library version.
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn parse_challenge(challenge_id: &str, wire_json: &str) -> Result<(WireChallenge, Challenge), String> {
    let wire: WireChallenge =
        serde_json::from_str(wire_json).map_err(|e| format!("Failed to parse challenge: {e}"))?;
    let challenge = Challenge::from_wire(challenge_id, &wire).map_err(|e| e.to_string())?;
    Ok((wire, challenge))
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), JsValue> {
    Reflect::set(target, &JsValue::from_str(key), value).map(|_| ())
}

/// Decode the body of `GET /api/v1/challenge/{id}`.
///
/// Returns `{id, type, publicKey, app, signData?, expire?}` where
/// `publicKey` can be handed straight to `navigator.credentials.create` or
/// `.get` and `signData.data` is a `Uint8Array`.
#[wasm_bindgen]
pub fn decode_challenge(challenge_id: &str, wire_json: &str) -> Result<JsValue, JsValue> {
    let (wire, challenge) = parse_challenge(challenge_id, wire_json).map_err(|e| JsValue::from_str(&e))?;

    let out = Object::new();
    set(&out, "id", &JsValue::from_str(&challenge.id))?;
    set(&out, "type", &JsValue::from_str(challenge.kind().as_str()))?;
    set(&out, "publicKey", &convert::options_to_js(&wire.public_key, &challenge.options)?)?;

    let app = serde_json::to_value(&challenge.app).unwrap_or(Value::Null);
    set(&out, "app", &convert::to_js(&app)?)?;

    if let Some(sign_data) = &challenge.sign_data {
        let data = Object::new();
        set(&data, "text", &JsValue::from_str(&sign_data.text))?;
        if let Some(bytes) = &sign_data.data {
            set(&data, "data", &Uint8Array::from(bytes.as_slice()))?;
        }
        set(&out, "signData", &data)?;
    }
    if let Some(expire) = wire.expire {
        set(&out, "expire", &JsValue::from_f64(expire as f64))?;
    }
    Ok(out.into())
}

/// Encode the result of `navigator.credentials.create` or `.get` as wire JSON.
///
/// `kind` is the ceremony the credential came from (`webauthn.create` or
/// `webauthn.get`).
#[wasm_bindgen]
pub fn encode_credential(credential: JsValue, kind: &str) -> Result<String, JsValue> {
    let kind: CeremonyKind = kind.parse().map_err(|e: codec::DecodeError| JsValue::from_str(&e.to_string()))?;
    let native = convert::credential_from_js(&credential, kind)?;
    serde_json::to_string(&encode_wire(&native)).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Encode bytes as unpadded base64url.
#[wasm_bindgen]
pub fn to_base64url(bytes: &[u8]) -> String {
    codec::encode_b64url(bytes)
}

/// Decode base64url text, padded or not.
#[wasm_bindgen]
pub fn from_base64url(text: &str) -> Result<Vec<u8>, JsValue> {
    codec::decode_b64url("value", text).map_err(|e| JsValue::from_str(&e.to_string()))
}
