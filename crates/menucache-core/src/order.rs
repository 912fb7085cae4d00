//! Order composition and the WhatsApp hand-off.
//!
//! An `OrderDraft` is built from a menu item, edited through small event
//! methods (quantity up/down, table number, instructions) and finally turned
//! into a `wa.me` deep link. Validation never touches the network.

use thiserror::Error;
use url::{form_urlencoded, Url};

use crate::config::ConfigError;
use crate::models::MenuItem;
use crate::utils::format_price;

const WHATSAPP_BASE_URL: &str = "https://wa.me/";

/// Upper bound for the quantity stepper
pub const MAX_QUANTITY: u32 = 99;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Please enter your table number to proceed with the order")]
    MissingTableNumber,

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build WhatsApp link: {0}")]
    Link(#[from] url::ParseError),
}

/// A validated WhatsApp destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDestination {
    phone: String,
}

impl OrderDestination {
    pub(crate) fn new(phone: String) -> Self {
        Self { phone }
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// `https://wa.me/<phone>?text=<percent-encoded message>`
    pub fn deep_link(&self, message: &str) -> Result<Url, url::ParseError> {
        let mut link = Url::parse(WHATSAPP_BASE_URL)?.join(&self.phone)?;
        link.set_query(Some(&format!("text={}", encode_component(message))));
        Ok(link)
    }
}

/// Percent-encode a query value, with spaces as `%20` rather than `+`.
fn encode_component(value: &str) -> String {
    // byte_serialize escapes a literal '+', so any '+' left is a space
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Ready-to-open order hand-off.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSubmission {
    pub message: String,
    pub deep_link: Url,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub item_name: String,
    pub unit_price: f64,
    quantity: u32,
    pub table_number: String,
    pub instructions: String,
}

impl OrderDraft {
    pub fn new(item: &MenuItem) -> Self {
        Self {
            item_name: item.name.clone(),
            unit_price: item.price,
            quantity: 1,
            table_number: String::new(),
            instructions: String::new(),
        }
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn increment(&mut self) {
        self.quantity = (self.quantity + 1).min(MAX_QUANTITY);
    }

    pub fn decrement(&mut self) {
        if self.quantity > 1 {
            self.quantity -= 1;
        }
    }

    /// Set the quantity from free text; anything unparseable becomes 1.
    pub fn set_quantity_text(&mut self, text: &str) {
        self.quantity = text
            .trim()
            .parse::<u32>()
            .unwrap_or(1)
            .clamp(1, MAX_QUANTITY);
    }

    pub fn total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        if self.table_number.trim().is_empty() {
            return Err(OrderError::MissingTableNumber);
        }
        Ok(())
    }

    /// Validate the draft and build the WhatsApp hand-off.
    ///
    /// The table number is checked before the destination so the visitor
    /// can fix their own input first.
    pub fn submit(
        &self,
        destination: Result<&OrderDestination, &ConfigError>,
        restaurant_name: &str,
    ) -> Result<OrderSubmission, OrderError> {
        self.validate()?;
        let destination = destination.map_err(|e| OrderError::Config(e.clone()))?;

        let message = format_order_message(self, restaurant_name);
        let deep_link = destination.deep_link(&message)?;
        Ok(OrderSubmission { message, deep_link })
    }
}

/// Plain-text order summary sent through WhatsApp.
pub fn format_order_message(draft: &OrderDraft, restaurant_name: &str) -> String {
    let mut message = format!("Order from {}\n\n", restaurant_name);
    message.push_str(&format!("Product: {}\n", draft.item_name));
    message.push_str(&format!("Quantity: {}\n", draft.quantity()));
    message.push_str(&format!("Price per item: {}\n", format_price(draft.unit_price)));
    message.push_str(&format!("Total: {}\n", format_price(draft.total())));
    message.push_str(&format!("Table Number: {}\n", draft.table_number.trim()));

    let instructions = draft.instructions.trim();
    if !instructions.is_empty() {
        message.push_str(&format!("Special Instructions: {}\n", instructions));
    }

    message.push_str("\nPlease confirm this order. Thank you!");
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> OrderDraft {
        OrderDraft::new(&MenuItem {
            name: "Masala Dosa".to_string(),
            price: 80.0,
            ..Default::default()
        })
    }

    fn destination() -> OrderDestination {
        OrderDestination::new("919812345678".to_string())
    }

    #[test]
    fn test_quantity_never_drops_below_one() {
        let mut order = draft();
        order.decrement();
        assert_eq!(order.quantity(), 1);
        order.increment();
        order.increment();
        assert_eq!(order.quantity(), 3);
        assert_eq!(order.total(), 240.0);
    }

    #[test]
    fn test_quantity_text_falls_back_to_one() {
        let mut order = draft();
        order.set_quantity_text("4");
        assert_eq!(order.quantity(), 4);
        order.set_quantity_text("abc");
        assert_eq!(order.quantity(), 1);
        order.set_quantity_text("0");
        assert_eq!(order.quantity(), 1);
        order.set_quantity_text("1000");
        assert_eq!(order.quantity(), MAX_QUANTITY);
    }

    #[test]
    fn test_missing_table_number_blocks_submission() {
        let order = draft();
        let dest = destination();
        assert_eq!(
            order.submit(Ok(&dest), "Bytes & Spicy"),
            Err(OrderError::MissingTableNumber)
        );
    }

    #[test]
    fn test_unconfigured_destination_blocks_submission() {
        let mut order = draft();
        order.table_number = "7".to_string();
        let err = ConfigError::PlaceholderPhone;
        assert_eq!(
            order.submit(Err(&err), "Bytes & Spicy"),
            Err(OrderError::Config(ConfigError::PlaceholderPhone))
        );
    }

    #[test]
    fn test_submission_builds_deep_link() {
        let mut order = draft();
        order.table_number = " 12 ".to_string();
        order.instructions = "Less spicy".to_string();
        order.increment();

        let dest = destination();
        let submission = order.submit(Ok(&dest), "Bytes & Spicy").expect("valid order");

        assert!(submission.message.contains("Product: Masala Dosa"));
        assert!(submission.message.contains("Quantity: 2"));
        assert!(submission.message.contains("Total: ₹160"));
        assert!(submission.message.contains("Table Number: 12"));
        assert!(submission.message.contains("Special Instructions: Less spicy"));

        let link = submission.deep_link;
        assert_eq!(link.host_str(), Some("wa.me"));
        assert_eq!(link.path(), "/919812345678");
        let text: Vec<(String, String)> = link.query_pairs().into_owned().collect();
        assert_eq!(text, vec![("text".to_string(), submission.message.clone())]);
    }

    #[test]
    fn test_deep_link_percent_encodes_spaces() {
        let link = destination().deep_link("Order from Bytes & Spicy\nTotal: ₹160 + tip").unwrap();
        let query = link.query().unwrap();
        assert!(query.starts_with("text=Order%20from%20Bytes%20%26%20Spicy%0ATotal"));
        assert!(query.contains("%E2%82%B9160%20%2B%20tip"));
        assert!(!query.contains('+'));
    }

    #[test]
    fn test_message_omits_empty_instructions() {
        let mut order = draft();
        order.table_number = "3".to_string();
        let message = format_order_message(&order, "Bytes & Spicy");
        assert!(message.starts_with("Order from Bytes & Spicy\n\n"));
        assert!(!message.contains("Special Instructions"));
    }
}
