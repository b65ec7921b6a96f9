//! Login handshake
//!
//! Turns a [`LoginPacket`] into a [`LoginDecision`]: reject the protocol
//! version, kick the player, or hand the identity chain to a
//! [`LoginVerifier`](crate::host::LoginVerifier). Verification itself runs off
//! the tick thread; its [`LoginOutcome`] comes back through the interface's
//! event channel.
//!
//! # Chain format
//!
//! ```text
//! {"chain": ["<jwt>", "<jwt>", ...]}
//! jwt = base64url(header) "." base64url(claims) "." base64url(signature)
//! ```
//!
//! Exactly one link of the chain carries `extraData` with the player's display
//! name, identity UUID and XUID.

use crate::host::LoginVerifier;
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use protobridge_core::{BridgeError, ConnectionId, Result};
use protobridge_protocol::packets::play_status::{LOGIN_FAILED_CLIENT, LOGIN_FAILED_SERVER};
use protobridge_protocol::packets::LoginPacket;
use protobridge_protocol::CURRENT_PROTOCOL;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Disconnect reasons shown to the client
pub mod reasons {
    pub const INVALID_NAME: &str = "disconnectionScreen.invalidName";
    pub const SERVER_FULL: &str = "disconnectionScreen.serverFull";
    pub const NOT_AUTHENTICATED: &str = "disconnectionScreen.notAuthenticated";
}

/// The `extraData` claims of the identity chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthenticationData {
    #[serde(rename = "displayName")]
    pub display_name: String,
    pub identity: String,
    #[serde(rename = "XUID")]
    pub xuid: String,
    #[serde(rename = "titleId", default)]
    pub title_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChainData {
    chain: Vec<String>,
}

/// Who is logging in, as far as the chain claims
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerInfo {
    pub username: String,
    pub uuid: Uuid,
    /// Present for Xbox Live accounts
    pub xuid: Option<String>,
    /// Client data claims (skin, language, device)
    pub client_data: Value,
    pub protocol: u32,
}

impl PlayerInfo {
    pub fn language_code(&self) -> Option<&str> {
        self.client_data.get("LanguageCode").and_then(Value::as_str)
    }
}

/// Work handed to a [`LoginVerifier`]
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub connection: ConnectionId,
    pub chain: Vec<String>,
    pub client_data_jwt: String,
    pub auth_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub authenticated: bool,
    pub error: Option<String>,
}

impl LoginOutcome {
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
            error: None,
        }
    }

    pub fn unauthenticated() -> Self {
        Self {
            authenticated: false,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            error: Some(error.into()),
        }
    }

    /// Disconnect reason, if the login must not proceed
    pub fn rejection(&self, auth_required: bool) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(error.clone());
        }
        if auth_required && !self.authenticated {
            return Some(reasons::NOT_AUTHENTICATED.to_string());
        }
        None
    }
}

/// What to do with a login packet
#[derive(Debug, Clone, PartialEq)]
pub enum LoginDecision {
    /// Unsupported protocol: send this play status, then close without a
    /// disconnect screen
    Rejected { status: i32, reason: String },
    /// Close with a disconnect screen
    Kicked(String),
    /// Verify the chain before creating the player
    Verify {
        protocol: u32,
        info: PlayerInfo,
        chain: Vec<String>,
        client_data_jwt: String,
    },
}

pub fn is_compatible_protocol(protocol: i32, legacy_protocols: &[u32]) -> bool {
    u32::try_from(protocol).is_ok_and(|protocol| protocol == CURRENT_PROTOCOL || legacy_protocols.contains(&protocol))
}

/// Play status for an unsupported protocol version
pub fn incompatible_status(protocol: i32) -> i32 {
    if i64::from(protocol) < i64::from(CURRENT_PROTOCOL) {
        LOGIN_FAILED_CLIENT
    } else {
        LOGIN_FAILED_SERVER
    }
}

/// Validate a login packet up to the point where the chain must be verified
///
/// Errors are bad packets: a chain or client data that cannot be parsed, a
/// duplicated or missing `extraData`, or an identity that is not a UUID.
pub fn process_login(packet: &LoginPacket, legacy_protocols: &[u32]) -> Result<LoginDecision> {
    if !is_compatible_protocol(packet.protocol, legacy_protocols) {
        return Ok(LoginDecision::Rejected {
            status: incompatible_status(packet.protocol),
            reason: format!("Incompatible protocol version {}", packet.protocol),
        });
    }

    let chain = parse_chain(&packet.chain_data_json)?;
    let auth = fetch_auth_data(&chain)?;
    if !is_valid_username(&auth.display_name) {
        return Ok(LoginDecision::Kicked(reasons::INVALID_NAME.to_string()));
    }
    let client_data = parse_client_data(&packet.client_data_jwt)?;
    let uuid = Uuid::parse_str(&auth.identity)
        .map_err(|_| BridgeError::InvalidData(format!("Invalid login UUID {:?}", auth.identity)))?;

    let info = PlayerInfo {
        username: auth.display_name,
        uuid,
        xuid: (!auth.xuid.is_empty()).then_some(auth.xuid),
        client_data,
        protocol: packet.protocol as u32,
    };
    Ok(LoginDecision::Verify {
        protocol: info.protocol,
        info,
        chain,
        client_data_jwt: packet.client_data_jwt.clone(),
    })
}

pub fn parse_chain(json: &str) -> Result<Vec<String>> {
    let data: ChainData =
        serde_json::from_str(json).map_err(|e| BridgeError::InvalidData(format!("Invalid chain data: {}", e)))?;
    Ok(data.chain)
}

/// Claims of a compact JWT, without checking its signature
pub fn decode_jwt_claims(jwt: &str) -> Result<Value> {
    let mut parts = jwt.split('.');
    let (Some(_header), Some(claims), Some(_signature), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(BridgeError::InvalidData("Wrong number of JWT parts".into()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(claims.trim_end_matches('='))
        .map_err(|e| BridgeError::InvalidData(format!("Invalid JWT payload encoding: {}", e)))?;
    let claims: Value =
        serde_json::from_slice(&bytes).map_err(|e| BridgeError::InvalidData(format!("Invalid JWT payload: {}", e)))?;
    if !claims.is_object() {
        return Err(BridgeError::InvalidData("JWT payload is not an object".into()));
    }
    Ok(claims)
}

/// The single `extraData` claim set of the chain
pub fn fetch_auth_data(chain: &[String]) -> Result<AuthenticationData> {
    let mut found = None;
    for jwt in chain {
        let mut claims = decode_jwt_claims(jwt)?;
        let Some(extra) = claims.get_mut("extraData").map(Value::take) else {
            continue;
        };
        if found.is_some() {
            return Err(BridgeError::InvalidData("Found 'extraData' more than once in chainData".into()));
        }
        if !extra.is_object() {
            return Err(BridgeError::InvalidData("'extraData' key should be an object".into()));
        }
        let data: AuthenticationData =
            serde_json::from_value(extra).map_err(|e| BridgeError::InvalidData(format!("Invalid extraData: {}", e)))?;
        found = Some(data);
    }
    found.ok_or_else(|| BridgeError::InvalidData("'extraData' not found in chain data".into()))
}

pub fn parse_client_data(jwt: &str) -> Result<Value> {
    let mut claims = decode_jwt_claims(jwt)?;
    if let Some(map) = claims.as_object_mut() {
        map.entry("IsEditorMode").or_insert(Value::Bool(false));
    }
    Ok(claims)
}

/// 1 to 16 of `[a-zA-Z0-9_ ]`, no leading or trailing space, not a reserved
/// console name
pub fn is_valid_username(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower == "rcon" || lower == "console" {
        return false;
    }
    (1..=16).contains(&name.len())
        && !name.starts_with(' ')
        && !name.ends_with(' ')
        && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b' ')
}

/// Verifier for servers without Xbox Live signing keys
///
/// Every link must decode and must not be expired. No signature is checked,
/// so logins are never reported as authenticated.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineVerifier;

#[async_trait]
impl LoginVerifier for OfflineVerifier {
    async fn verify(&self, request: VerificationRequest) -> Result<LoginOutcome> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default();
        for jwt in request.chain.iter().chain(std::iter::once(&request.client_data_jwt)) {
            let claims = match decode_jwt_claims(jwt) {
                Ok(claims) => claims,
                Err(e) => return Ok(LoginOutcome::failed(e.to_string())),
            };
            if let Some(exp) = claims.get("exp").and_then(Value::as_i64) {
                if exp < now {
                    return Ok(LoginOutcome::failed("Identity chain expired"));
                }
            }
        }
        Ok(LoginOutcome::unauthenticated())
    }
}

/// Run a verifier and fold its error into the outcome
pub async fn run_verification(verifier: Arc<dyn LoginVerifier>, request: VerificationRequest) -> LoginOutcome {
    let connection = request.connection;
    match verifier.verify(request).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!("Login verification for session {} failed: {}", connection, e);
            LoginOutcome::failed(e.to_string())
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use serde_json::json;

    pub fn jwt(claims: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"ES384"}"#);
        let body = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.c2ln", header, body)
    }

    pub fn chain_for(name: &str, identity: &str) -> String {
        let identity_link = jwt(&json!({
            "extraData": {"displayName": name, "identity": identity, "XUID": "2535400000000001"},
            "identityPublicKey": "key",
        }));
        let root = jwt(&json!({"certificateAuthority": true}));
        json!({ "chain": [root, identity_link] }).to_string()
    }

    pub fn login(protocol: i32, name: &str) -> LoginPacket {
        LoginPacket {
            protocol,
            chain_data_json: chain_for(name, "a3a3c9a4-2f44-4b1e-9a6c-1d3f3c2e8b11"),
            client_data_jwt: jwt(&json!({"LanguageCode": "en_US", "SkinId": "Standard_Custom"})),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use protobridge_protocol::LEGACY_PROTOCOL;
    use serde_json::json;

    const LEGACY: &[u32] = &[LEGACY_PROTOCOL];

    #[test]
    fn test_supported_versions() {
        assert!(is_compatible_protocol(CURRENT_PROTOCOL as i32, LEGACY));
        assert!(is_compatible_protocol(LEGACY_PROTOCOL as i32, LEGACY));
        assert!(!is_compatible_protocol(LEGACY_PROTOCOL as i32, &[]));
        assert!(!is_compatible_protocol(-1, LEGACY));
    }

    #[test]
    fn test_older_and_newer_clients_get_different_statuses() {
        match process_login(&login(500, "Alex"), LEGACY).unwrap() {
            LoginDecision::Rejected { status, .. } => assert_eq!(status, LOGIN_FAILED_CLIENT),
            other => panic!("unexpected decision {:?}", other),
        }
        match process_login(&login(600, "Alex"), LEGACY).unwrap() {
            LoginDecision::Rejected { status, .. } => assert_eq!(status, LOGIN_FAILED_SERVER),
            other => panic!("unexpected decision {:?}", other),
        }
    }

    #[test]
    fn test_legacy_login_goes_to_verification() {
        let decision = process_login(&login(LEGACY_PROTOCOL as i32, "Alex"), LEGACY).unwrap();
        let LoginDecision::Verify { protocol, info, chain, .. } = decision else {
            panic!("expected verification");
        };
        assert_eq!(protocol, LEGACY_PROTOCOL);
        assert_eq!(info.username, "Alex");
        assert_eq!(info.xuid.as_deref(), Some("2535400000000001"));
        assert_eq!(info.language_code(), Some("en_US"));
        assert_eq!(info.client_data["IsEditorMode"], json!(false));
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_invalid_username_is_kicked() {
        let decision = process_login(&login(CURRENT_PROTOCOL as i32, " spaced"), LEGACY).unwrap();
        assert_eq!(decision, LoginDecision::Kicked(reasons::INVALID_NAME.to_string()));
    }

    #[test]
    fn test_invalid_identity_is_bad_packet() {
        let mut packet = login(CURRENT_PROTOCOL as i32, "Alex");
        packet.chain_data_json = chain_for("Alex", "not-a-uuid");
        let err = process_login(&packet, LEGACY).unwrap_err();
        assert!(err.is_bad_packet());
    }

    #[test]
    fn test_duplicate_extra_data() {
        let link = jwt(&json!({"extraData": {"displayName": "A", "identity": "x", "XUID": ""}}));
        let err = fetch_auth_data(&[link.clone(), link]).unwrap_err();
        assert!(err.to_string().contains("more than once"));
        assert!(fetch_auth_data(&[]).is_err());
    }

    #[test]
    fn test_jwt_parts() {
        assert!(decode_jwt_claims("only.two").is_err());
        assert!(decode_jwt_claims("a.!!!.c").is_err());
        let claims = decode_jwt_claims(&jwt(&json!({"a": 1}))).unwrap();
        assert_eq!(claims["a"], json!(1));
    }

    #[test]
    fn test_usernames() {
        assert!(is_valid_username("Steve_01"));
        assert!(is_valid_username("Two Words"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("seventeen_chars__"));
        assert!(!is_valid_username("trailing "));
        assert!(!is_valid_username("CONSOLE"));
        assert!(!is_valid_username("dash-name"));
    }

    #[test]
    fn test_outcome_rejection() {
        assert_eq!(LoginOutcome::unauthenticated().rejection(false), None);
        assert_eq!(
            LoginOutcome::unauthenticated().rejection(true).as_deref(),
            Some(reasons::NOT_AUTHENTICATED)
        );
        assert_eq!(LoginOutcome::failed("bad").rejection(false).as_deref(), Some("bad"));
    }

    #[tokio::test]
    async fn test_offline_verifier() {
        let packet = login(CURRENT_PROTOCOL as i32, "Alex");
        let request = VerificationRequest {
            connection: ConnectionId::new(4),
            chain: parse_chain(&packet.chain_data_json).unwrap(),
            client_data_jwt: packet.client_data_jwt,
            auth_required: false,
        };
        let outcome = run_verification(Arc::new(OfflineVerifier), request.clone()).await;
        assert_eq!(outcome, LoginOutcome::unauthenticated());

        let expired = VerificationRequest {
            chain: vec![jwt(&json!({"exp": 1}))],
            ..request
        };
        assert!(run_verification(Arc::new(OfflineVerifier), expired).await.error.is_some());
    }
}
