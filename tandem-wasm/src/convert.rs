//! Conversions between WebAuthn JS objects and the codec's native types.
//!
//! The browser API speaks `ArrayBuffer`; the codec speaks `Vec<u8>`. Only
//! the binary members are touched, everything else passes through JSON.

use js_sys::{Array, Function, Reflect, Uint8Array, JSON};
use serde_json::Value;
use tandem_core::codec::{
    AssertionCredential, AssertionResponse, AttestationResponse, AuthenticatorAttachment,
    CeremonyOptions, CredentialDescriptor, RegistrationCredential,
};
use tandem_core::{CeremonyKind, Credential};
use wasm_bindgen::{JsCast, JsValue};

fn key(name: &str) -> JsValue {
    JsValue::from_str(name)
}

fn get(target: &JsValue, name: &str) -> Option<JsValue> {
    Reflect::get(target, &key(name))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

fn get_string(target: &JsValue, name: &str) -> Option<String> {
    get(target, name).and_then(|v| v.as_string())
}

/// Copies an `ArrayBuffer` or typed array member out of JS memory.
fn get_bytes(target: &JsValue, name: &str) -> Option<Vec<u8>> {
    get(target, name).map(|v| Uint8Array::new(&v).to_vec())
}

/// Reads `name` as a property, or calls `getName()` when only the method exists
/// (as on a live `PublicKeyCredential`).
fn get_or_call(target: &JsValue, name: &str, method: &str) -> Option<JsValue> {
    get(target, name).or_else(|| {
        get(target, method)
            .and_then(|f| f.dyn_into::<Function>().ok())
            .and_then(|f| f.call0(target).ok())
            .filter(|v| !v.is_undefined() && !v.is_null())
    })
}

fn set_bytes(target: &JsValue, name: &str, bytes: &[u8]) -> Result<(), JsValue> {
    Reflect::set(target, &key(name), &Uint8Array::from(bytes)).map(|_| ())
}

pub(crate) fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    JSON::parse(&value.to_string())
}

fn to_value(value: &JsValue) -> Option<Value> {
    JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .and_then(|s| serde_json::from_str(&s).ok())
}

fn set_descriptor_ids(list: Option<JsValue>, descriptors: &[CredentialDescriptor]) -> Result<(), JsValue> {
    if let Some(list) = list {
        let list = Array::from(&list);
        for (i, descriptor) in descriptors.iter().enumerate() {
            set_bytes(&list.get(i as u32), "id", &descriptor.id)?;
        }
    }
    Ok(())
}

/// Builds the `publicKey` argument for `navigator.credentials.create/get`:
/// the wire options with every binary member replaced by a `Uint8Array`.
pub(crate) fn options_to_js(wire: &Value, options: &CeremonyOptions) -> Result<JsValue, JsValue> {
    let public_key = to_js(wire)?;
    match options {
        CeremonyOptions::Create(o) => {
            set_bytes(&public_key, "challenge", &o.challenge)?;
            if let (Some(user), Some(target)) = (&o.user, get(&public_key, "user")) {
                set_bytes(&target, "id", &user.id)?;
            }
            if let Some(list) = &o.exclude_credentials {
                set_descriptor_ids(get(&public_key, "excludeCredentials"), list)?;
            }
        }
        CeremonyOptions::Get(o) => {
            set_bytes(&public_key, "challenge", &o.challenge)?;
            if let Some(list) = &o.allow_credentials {
                set_descriptor_ids(get(&public_key, "allowCredentials"), list)?;
            }
        }
    }
    Ok(public_key)
}

fn attachment(target: &JsValue) -> Option<AuthenticatorAttachment> {
    get_string(target, "authenticatorAttachment")
        .and_then(|s| serde_json::from_value(Value::String(s)).ok())
}

fn transports(response: &JsValue) -> Option<Vec<String>> {
    let list = get_or_call(response, "transports", "getTransports")?;
    Some(Array::from(&list).iter().filter_map(|v| v.as_string()).collect())
}

/// Reads a `PublicKeyCredential` (or a plain object of the same shape).
pub(crate) fn credential_from_js(credential: &JsValue, kind: CeremonyKind) -> Result<Credential, JsValue> {
    let response = get(credential, "response")
        .ok_or_else(|| JsValue::from_str("credential has no response"))?;

    let id = get_string(credential, "id");
    let raw_id = get_bytes(credential, "rawId");
    let type_ = get_string(credential, "type");
    let authenticator_attachment = attachment(credential);
    let client_extension_results =
        get_or_call(credential, "clientExtensionResults", "getClientExtensionResults")
            .and_then(|v| to_value(&v));

    Ok(match kind {
        CeremonyKind::Create => Credential::Registration(RegistrationCredential {
            id,
            raw_id,
            type_,
            authenticator_attachment,
            response: AttestationResponse {
                client_data_json: get_bytes(&response, "clientDataJSON"),
                attestation_object: get_bytes(&response, "attestationObject"),
                transports: transports(&response),
            },
            client_extension_results,
        }),
        CeremonyKind::Get => Credential::Assertion(AssertionCredential {
            id,
            raw_id,
            type_,
            authenticator_attachment,
            response: AssertionResponse {
                client_data_json: get_bytes(&response, "clientDataJSON"),
                authenticator_data: get_bytes(&response, "authenticatorData"),
                signature: get_bytes(&response, "signature"),
                user_handle: get_bytes(&response, "userHandle"),
            },
            client_extension_results,
        }),
    })
}
