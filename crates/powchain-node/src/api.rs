use crate::{
    constants::{ADD_DATA_DEFAULT, MINE_PLACEHOLDER_DATA, MSG_BLOCK_MINED, MSG_BLOCK_WITH_DATA_MINED},
    error::ApiError,
    state::{AppState, ValidationReport},
};
use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use powchain_core::Block;
use powchain_wallet::{verify_signature, Network, Wallet};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Serialize)]
pub struct Health {
    status: &'static str,
}

#[derive(Serialize)]
pub struct MessageOut {
    message: &'static str,
}

#[derive(Deserialize, Default)]
pub struct AddDataIn {
    data: Option<Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WalletNewQuery {
    include_private: Option<String>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WalletOut {
    #[serde(skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    network: Network,
    public_key_compressed_hex: String,
    #[serde(rename = "addressP2PKH")]
    address_p2pkh: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_key_hex: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct SignIn {
    message: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOut {
    signature_hex: String,
    public_key_compressed_hex: String,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VerifyIn {
    message: Option<String>,
    signature_hex: Option<String>,
    public_key_hex: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyOut {
    valid: bool,
}

fn is_blank(body: &Bytes) -> bool {
    body.iter().all(u8::is_ascii_whitespace)
}

/// Parse a JSON body. An empty body counts as `{}`; anything unparseable is a 400.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if is_blank(body) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::MalformedRequest(e.to_string()))
}

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn get_chain(State(state): State<AppState>) -> Json<Vec<Block>> {
    Json(state.snapshot().await)
}

pub async fn validate_chain(State(state): State<AppState>) -> Json<ValidationReport> {
    Json(state.validation().await)
}

pub async fn mine(State(state): State<AppState>) -> Result<Json<MessageOut>, ApiError> {
    state.append(Value::from(MINE_PLACEHOLDER_DATA)).await?;
    Ok(Json(MessageOut {
        message: MSG_BLOCK_MINED,
    }))
}

pub async fn add_data(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<MessageOut>, ApiError> {
    if is_blank(&body) {
        return Err(ApiError::MalformedRequest("request body is required".into()));
    }
    let input: AddDataIn = parse_body(&body)?;
    // `"data": null` deserializes to None as well.
    let data = input.data.unwrap_or_else(|| Value::from(ADD_DATA_DEFAULT));
    state.append(data).await?;
    Ok(Json(MessageOut {
        message: MSG_BLOCK_WITH_DATA_MINED,
    }))
}

/// Always succeeds: a missing or malformed body just means "no label, mainnet".
pub async fn wallet_new(
    State(state): State<AppState>,
    Query(query): Query<WalletNewQuery>,
    body: Bytes,
) -> Json<WalletOut> {
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let label = body
        .get("label")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned);
    let network = match body.get("network").and_then(Value::as_str) {
        Some("testnet") => Network::Testnet,
        _ => Network::Mainnet,
    };
    let include_private = query.include_private.as_deref() == Some("1");

    let wallet = Wallet::generate(label, network);
    let out = WalletOut {
        label: wallet.label.clone(),
        network: wallet.network,
        public_key_compressed_hex: wallet.public_key_compressed_hex(),
        address_p2pkh: wallet.address_p2pkh(),
        private_key_hex: include_private.then(|| wallet.private_key_hex()),
    };
    info!(address = %out.address_p2pkh, %network, "wallet created");
    state.install_wallet(wallet).await;
    Json(out)
}

pub async fn wallet_sign(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SignOut>, ApiError> {
    let wallet = state.wallet().await.ok_or(ApiError::WalletNotInitialized)?;
    let input: SignIn = parse_body(&body)?;
    let message = input
        .message
        .ok_or_else(|| ApiError::MalformedRequest("`message` is required".into()))?;
    Ok(Json(SignOut {
        signature_hex: wallet.sign(&message),
        public_key_compressed_hex: wallet.public_key_compressed_hex(),
    }))
}

pub async fn wallet_verify(body: Bytes) -> Result<Json<VerifyOut>, ApiError> {
    let input: VerifyIn =
        parse_body(&body).map_err(|e| ApiError::VerificationInput(e.to_string()))?;
    let missing = |field: &str| ApiError::VerificationInput(format!("`{field}` is required"));
    let message = input.message.ok_or_else(|| missing("message"))?;
    let signature_hex = input.signature_hex.ok_or_else(|| missing("signatureHex"))?;
    let public_key_hex = input.public_key_hex.ok_or_else(|| missing("publicKeyHex"))?;

    let valid = verify_signature(&message, &signature_hex, &public_key_hex)?;
    Ok(Json(VerifyOut { valid }))
}
