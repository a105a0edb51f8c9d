use async_trait::async_trait;
use freshcut_core::carrier::{
    CarrierClient, CarrierError, CarrierToken, ShipmentPaymentMode, ShipmentReceipt, ShipmentRequest,
};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde_json::{json, Number, Value};
use std::time::Duration;

use crate::app_config::CarrierConfig;

/// Thin adapter over a Shiprocket-style REST API: a login call that returns a bearer
/// token and an ad-hoc order creation call.
pub struct HttpCarrierClient {
    http: reqwest::Client,
    name: String,
    base_url: String,
    email: String,
    password: String,
}

impl HttpCarrierClient {
    pub fn new(config: &CarrierConfig) -> Result<Self, CarrierError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| CarrierError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            password: config.password.clone(),
        })
    }
}

fn transport(e: reqwest::Error) -> CarrierError {
    CarrierError::Transport(e.to_string())
}

/// Map a non-success HTTP status onto the carrier error taxonomy
fn status_error(status: StatusCode, body: &Value) -> CarrierError {
    let message = body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CarrierError::Unauthorized,
        s if s.is_server_error() => CarrierError::Transport(message),
        _ => CarrierError::Rejected(message),
    }
}

/// Check the status before trusting the body. Error pages from proxies are often HTML,
/// so a failed call is classified by its status even when the body is not JSON.
pub(crate) fn read_body(status: StatusCode, text: &str) -> Result<Value, CarrierError> {
    if !status.is_success() {
        let body = serde_json::from_str(text).unwrap_or(Value::Null);
        return Err(status_error(status, &body));
    }
    serde_json::from_str(text).map_err(|e| CarrierError::InvalidResponse(e.to_string()))
}

/// The carrier expects plain JSON numbers for amounts and dimensions
fn amount(value: Decimal) -> Value {
    value.normalize()
        .to_string()
        .parse::<Number>()
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub(crate) fn shipment_payload(request: &ShipmentRequest) -> Value {
    let consignee = &request.consignee;
    let items: Vec<Value> = request.items.iter()
        .map(|line| json!({
            "name": line.name,
            "sku": line.sku,
            "units": line.units,
            "selling_price": amount(line.selling_price),
        }))
        .collect();

    json!({
        "order_id": request.order_reference,
        "order_date": request.order_date.format("%Y-%m-%d %H:%M").to_string(),
        "pickup_location": request.pickup_location,
        "billing_customer_name": consignee.name,
        "billing_last_name": "",
        "billing_address": consignee.address,
        "billing_address_2": consignee.landmark.clone().unwrap_or_default(),
        "billing_city": consignee.city,
        "billing_pincode": consignee.pincode,
        "billing_state": consignee.state.clone().unwrap_or_default(),
        "billing_country": "India",
        "billing_email": consignee.email.clone().unwrap_or_default(),
        "billing_phone": consignee.phone,
        "shipping_is_billing": true,
        "order_items": items,
        "payment_method": match request.payment_mode {
            ShipmentPaymentMode::Cod => "COD",
            ShipmentPaymentMode::Prepaid => "Prepaid",
        },
        "sub_total": amount(request.sub_total),
        "length": amount(request.package.length_cm),
        "breadth": amount(request.package.breadth_cm),
        "height": amount(request.package.height_cm),
        "weight": amount(request.package.weight_kg),
    })
}

/// The AWB is often assigned later; until then the carrier's shipment id identifies it
pub(crate) fn parse_receipt(carrier_name: &str, body: Value) -> Result<ShipmentReceipt, CarrierError> {
    let awb = body.get("awb_code")
        .and_then(Value::as_str)
        .filter(|awb| !awb.is_empty())
        .map(str::to_string)
        .or_else(|| body.get("shipment_id").map(|id| match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
        .filter(|awb| !awb.is_empty() && awb != "null")
        .ok_or_else(|| CarrierError::InvalidResponse("no awb_code or shipment_id in response".to_string()))?;

    Ok(ShipmentReceipt {
        awb_number: awb,
        carrier_name: body.get("courier_name")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .unwrap_or(carrier_name)
            .to_string(),
        label_url: body.get("label_url").and_then(Value::as_str).map(str::to_string),
        tracking_payload: body,
    })
}

#[async_trait]
impl CarrierClient for HttpCarrierClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.email.is_empty() && !self.password.is_empty()
    }

    async fn login(&self) -> Result<CarrierToken, CarrierError> {
        if !self.is_configured() {
            return Err(CarrierError::NotConfigured);
        }

        let response = self.http
            .post(format!("{}/auth/login", self.base_url))
            .json(&json!({ "email": self.email, "password": self.password }))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        let body = read_body(status, &text)?;

        body.get("token")
            .and_then(Value::as_str)
            .map(|token| CarrierToken { value: token.to_string(), expires_at: None })
            .ok_or_else(|| CarrierError::InvalidResponse("login response carried no token".to_string()))
    }

    async fn create_shipment(&self, token: &str, request: &ShipmentRequest) -> Result<ShipmentReceipt, CarrierError> {
        let response = self.http
            .post(format!("{}/orders/create/adhoc", self.base_url))
            .bearer_auth(token)
            .json(&shipment_payload(request))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let text = response.text().await.map_err(transport)?;
        let body = read_body(status, &text)?;

        parse_receipt(&self.name, body)
    }
}
