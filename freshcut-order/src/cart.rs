use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{NewCustomer, PaymentMethod, ShippingAddress};

/// Maximum number of lines in one checkout
pub const MAX_CART_LINES: usize = 50;
/// Maximum units per line
pub const MAX_QUANTITY: i64 = 9999;

const MAX_NAME_LEN: usize = 120;
const MAX_CUT_TYPE_LEN: usize = 64;
const MAX_ADDRESS_LEN: usize = 500;

/// A cart line as submitted by the client. Carries no price on purpose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i64,
    /// Preparation the customer asked for, e.g. "curry cut" or "boneless"
    pub cut_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerPayload {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: String,
    pub landmark: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub pincode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub customer: CustomerPayload,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    /// Informational only; the server always recomputes the total
    pub total_amount: Option<Decimal>,
}

/// Who is checking out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutIdentity {
    /// Customer is found or created from the payload's phone number
    Guest,
    /// Customer id bound by a verified session token
    Session(Uuid),
}

/// Cart line after validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedLine {
    /// 1-based position in the submitted cart, used in error messages
    pub position: usize,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
    pub cut_type: Option<String>,
}

/// Checkout input with every field checked and normalised
#[derive(Debug, Clone)]
pub struct ValidatedCheckout {
    pub lines: Vec<ValidatedLine>,
    pub contact: NewCustomer,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub client_total: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart has {0} lines; at most 50 are allowed")]
    TooManyLines(usize),

    #[error("Item {position}: quantity must be a whole number between 1 and 9999, got {quantity}")]
    InvalidQuantity { position: usize, quantity: i64 },

    #[error("Item {position}: cut type is too long")]
    InvalidCutType { position: usize },

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: &'static str },
}

fn invalid(field: &'static str, reason: &'static str) -> ValidationError {
    ValidationError::InvalidField { field, reason }
}

fn trimmed_optional(value: &Option<String>) -> Option<String> {
    value.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(value: &str, field: &'static str, max_len: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if value.chars().count() > max_len {
        return Err(invalid(field, "is too long"));
    }
    Ok(value.to_string())
}

/// Normalise an Indian mobile number to its 10 significant digits.
/// Accepts an optional `+91`, `91` or `0` prefix; spaces, dashes and brackets are ignored.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let digits = cleaned.strip_prefix('+').unwrap_or(&cleaned);
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let national = match digits.len() {
        10 => digits,
        11 if digits.starts_with('0') => &digits[1..],
        12 if digits.starts_with("91") => &digits[2..],
        _ => return None,
    };

    match national.chars().next() {
        Some('6'..='9') => Some(national.to_string()),
        _ => None,
    }
}

/// Six digits, first digit non-zero
pub fn is_valid_pincode(pincode: &str) -> bool {
    pincode.len() == 6
        && pincode.chars().all(|c| c.is_ascii_digit())
        && !pincode.starts_with('0')
}

/// Cheap syntactic check; deliverability is the mailer's concern
pub fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !email.chars().any(char::is_whitespace)
        && email.matches('@').count() == 1
}

impl CheckoutRequest {
    /// Validate everything that can be checked without touching the store
    pub fn validate(&self) -> Result<ValidatedCheckout, ValidationError> {
        if self.items.is_empty() {
            return Err(ValidationError::EmptyCart);
        }
        if self.items.len() > MAX_CART_LINES {
            return Err(ValidationError::TooManyLines(self.items.len()));
        }

        let mut lines = Vec::with_capacity(self.items.len());
        for (index, item) in self.items.iter().enumerate() {
            let position = index + 1;
            if item.quantity <= 0 || item.quantity > MAX_QUANTITY {
                return Err(ValidationError::InvalidQuantity { position, quantity: item.quantity });
            }
            let cut_type = trimmed_optional(&item.cut_type);
            if cut_type.as_ref().is_some_and(|c| c.chars().count() > MAX_CUT_TYPE_LEN) {
                return Err(ValidationError::InvalidCutType { position });
            }
            lines.push(ValidatedLine {
                position,
                product_id: item.product_id,
                variant_id: item.variant_id,
                // Bounded by MAX_QUANTITY above
                quantity: item.quantity as i32,
                cut_type,
            });
        }

        let customer = &self.customer;
        let name = required(&customer.name, "name", MAX_NAME_LEN)?;
        let phone = normalize_phone(&customer.phone)
            .ok_or_else(|| invalid("phone", "must be a valid 10-digit mobile number"))?;
        let email = trimmed_optional(&customer.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !is_plausible_email(email) {
                return Err(invalid("email", "is not a valid email address"));
            }
        }
        let address = required(&customer.address, "address", MAX_ADDRESS_LEN)?;
        let city = required(&customer.city, "city", MAX_NAME_LEN)?;
        let pincode = customer.pincode.trim().to_string();
        if !is_valid_pincode(&pincode) {
            return Err(invalid("pincode", "must be a 6-digit postal code"));
        }

        let shipping_address = ShippingAddress {
            recipient_name: name.clone(),
            phone: phone.clone(),
            email: email.clone(),
            address,
            landmark: trimmed_optional(&customer.landmark),
            city,
            state: trimmed_optional(&customer.state),
            pincode,
        };

        Ok(ValidatedCheckout {
            lines,
            contact: NewCustomer { name, phone, email },
            shipping_address,
            payment_method: self.payment_method,
            client_total: self.total_amount,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CustomerPayload {
        CustomerPayload {
            name: "  Asha Rao ".to_string(),
            phone: "+91 98765-43210".to_string(),
            email: Some("Asha@Example.com".to_string()),
            address: "12 MG Road".to_string(),
            landmark: Some("   ".to_string()),
            city: "Bengaluru".to_string(),
            state: Some("Karnataka".to_string()),
            pincode: "560001".to_string(),
        }
    }

    fn request(items: Vec<CartItem>) -> CheckoutRequest {
        CheckoutRequest {
            items,
            customer: payload(),
            payment_method: PaymentMethod::Cod,
            total_amount: None,
        }
    }

    fn item(quantity: i64) -> CartItem {
        CartItem {
            product_id: Uuid::new_v4(),
            variant_id: Uuid::new_v4(),
            quantity,
            cut_type: Some(" curry cut ".to_string()),
        }
    }

    #[test]
    fn test_phone_normalisation() {
        assert_eq!(normalize_phone("9876543210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("+91 98765 43210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("919876543210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("09876543210").as_deref(), Some("9876543210"));
        assert_eq!(normalize_phone("(987) 654-3210").as_deref(), Some("9876543210"));
        assert!(normalize_phone("1234567890").is_none());
        assert!(normalize_phone("98765").is_none());
        assert!(normalize_phone("98765abcde").is_none());
    }

    #[test]
    fn test_pincode_and_email_rules() {
        assert!(is_valid_pincode("560001"));
        assert!(!is_valid_pincode("056000"));
        assert!(!is_valid_pincode("5600"));
        assert!(is_plausible_email("a@b.in"));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("a b@c.in"));
        assert!(!is_plausible_email("@c.in"));
    }

    #[test]
    fn test_valid_request_is_normalised() {
        let validated = request(vec![item(2)]).validate().unwrap();

        assert_eq!(validated.contact.name, "Asha Rao");
        assert_eq!(validated.contact.phone, "9876543210");
        assert_eq!(validated.contact.email.as_deref(), Some("asha@example.com"));
        assert_eq!(validated.shipping_address.landmark, None);
        assert_eq!(validated.lines[0].position, 1);
        assert_eq!(validated.lines[0].quantity, 2);
        assert_eq!(validated.lines[0].cut_type.as_deref(), Some("curry cut"));
    }

    #[test]
    fn test_empty_cart_rejected() {
        assert_eq!(request(vec![]).validate().unwrap_err(), ValidationError::EmptyCart);
    }

    #[test]
    fn test_quantity_bounds() {
        let err = request(vec![item(1), item(0)]).validate().unwrap_err();
        assert_eq!(err, ValidationError::InvalidQuantity { position: 2, quantity: 0 });

        let err = request(vec![item(-3)]).validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidQuantity { position: 1, .. }));

        let err = request(vec![item(MAX_QUANTITY + 1)]).validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidQuantity { .. }));
    }

    #[test]
    fn test_missing_address_fields_rejected() {
        let mut req = request(vec![item(1)]);
        req.customer.city = "   ".to_string();
        assert_eq!(req.validate().unwrap_err(), invalid("city", "must not be empty"));

        let mut req = request(vec![item(1)]);
        req.customer.pincode = "ABC123".to_string();
        assert!(matches!(req.validate().unwrap_err(), ValidationError::InvalidField { field: "pincode", .. }));

        let mut req = request(vec![item(1)]);
        req.customer.phone = "12345".to_string();
        assert!(matches!(req.validate().unwrap_err(), ValidationError::InvalidField { field: "phone", .. }));
    }

    #[test]
    fn test_quantity_must_be_integer_on_the_wire() {
        let json = r#"{"product_id":"6f1c2f9e-2b1a-4c51-9a39-0d8e7b9c1a11","variant_id":"6f1c2f9e-2b1a-4c51-9a39-0d8e7b9c1a12","quantity":1.5}"#;
        assert!(serde_json::from_str::<CartItem>(json).is_err());
    }
}
