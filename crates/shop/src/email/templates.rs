//! Askama views for transactional email.
//!
//! Views take pre-formatted strings so templates stay free of logic.

use askama::Template;

use buildmart_core::{DeliveryMethod, Money, OrderStatus};

use crate::models::{Conversation, Message, Order, OrderDetail, User};

/// A rendered email ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[derive(Template)]
#[template(path = "email/welcome.html")]
struct WelcomeHtml<'a> {
    name: &'a str,
    shop_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/welcome.txt")]
struct WelcomeText<'a> {
    name: &'a str,
    shop_url: &'a str,
}

struct LineView {
    name: String,
    sku: String,
    quantity: i32,
    unit_price: String,
    line_total: String,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    view: &'a OrderView,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    view: &'a OrderView,
}

/// Fields shared by both order confirmation templates.
struct OrderView {
    order_number: String,
    customer_name: String,
    lines: Vec<LineView>,
    subtotal: String,
    delivery_fee: String,
    discount: Option<String>,
    total: String,
    delivery_method: &'static str,
    address: Option<String>,
    payment_method: String,
    order_url: String,
}

impl std::ops::Deref for OrderConfirmationHtml<'_> {
    type Target = OrderView;

    fn deref(&self) -> &OrderView {
        self.view
    }
}

impl std::ops::Deref for OrderConfirmationText<'_> {
    type Target = OrderView;

    fn deref(&self) -> &OrderView {
        self.view
    }
}

#[derive(Template)]
#[template(path = "email/order_status.html")]
struct OrderStatusHtml<'a> {
    order_number: &'a str,
    customer_name: &'a str,
    status: &'a str,
    message: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_status.txt")]
struct OrderStatusText<'a> {
    order_number: &'a str,
    customer_name: &'a str,
    status: &'a str,
    message: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/support_reply.html")]
struct SupportReplyHtml<'a> {
    customer_name: &'a str,
    staff_name: &'a str,
    subject: &'a str,
    body: &'a str,
    conversation_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/support_reply.txt")]
struct SupportReplyText<'a> {
    customer_name: &'a str,
    staff_name: &'a str,
    subject: &'a str,
    body: &'a str,
    conversation_url: &'a str,
}

/// `cash_on_delivery` -> `Cash on delivery`.
fn humanize(value: &str) -> String {
    let spaced = value.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn money(amount: Money) -> String {
    amount.display()
}

fn status_message(status: OrderStatus, delivery: DeliveryMethod) -> &'static str {
    match (status, delivery) {
        (OrderStatus::Pending, _) => "Your order is waiting to be confirmed.",
        (OrderStatus::Confirmed, _) => "Your order has been confirmed and will be prepared soon.",
        (OrderStatus::Processing, _) => "We're picking and preparing your materials.",
        (OrderStatus::Shipped, DeliveryMethod::Delivery) => "Your order is on its way to site.",
        (OrderStatus::Shipped, DeliveryMethod::Pickup) => {
            "Your order is ready to collect from the yard."
        }
        (OrderStatus::Delivered, DeliveryMethod::Delivery) => "Your order has been delivered.",
        (OrderStatus::Delivered, DeliveryMethod::Pickup) => "Your order has been collected.",
        (OrderStatus::Cancelled, _) => {
            "Your order has been cancelled. If you didn't expect this, reply to our support chat."
        }
    }
}

/// # Errors
///
/// Returns `askama::Error` if a template fails to render.
pub fn welcome(user: &User, shop_url: &str) -> Result<RenderedEmail, askama::Error> {
    Ok(RenderedEmail {
        subject: "Welcome to BuildMart".to_owned(),
        html: WelcomeHtml {
            name: &user.name,
            shop_url,
        }
        .render()?,
        text: WelcomeText {
            name: &user.name,
            shop_url,
        }
        .render()?,
    })
}

/// # Errors
///
/// Returns `askama::Error` if a template fails to render.
pub fn order_confirmation(
    detail: &OrderDetail,
    shop_url: &str,
) -> Result<RenderedEmail, askama::Error> {
    let order = &detail.order;
    let view = OrderView {
        order_number: order.order_number.clone(),
        customer_name: order.customer_name.clone(),
        lines: detail
            .items
            .iter()
            .map(|item| LineView {
                name: item.product_name.clone(),
                sku: item.product_sku.clone(),
                quantity: item.quantity,
                unit_price: money(item.unit_price),
                line_total: money(item.line_total),
            })
            .collect(),
        subtotal: money(order.totals.subtotal),
        delivery_fee: money(order.totals.delivery_fee),
        discount: (!order.totals.discount.is_zero()).then(|| money(order.totals.discount)),
        total: money(order.totals.total),
        delivery_method: match order.delivery_method {
            DeliveryMethod::Delivery => "Delivery",
            DeliveryMethod::Pickup => "Pickup from yard",
        },
        address: order.shipping_address.as_ref().map(|a| a.one_line()),
        payment_method: humanize(order.payment_method.as_str()),
        order_url: order_url(shop_url, &order.order_number),
    };

    Ok(RenderedEmail {
        subject: format!("Order {} received", order.order_number),
        html: OrderConfirmationHtml { view: &view }.render()?,
        text: OrderConfirmationText { view: &view }.render()?,
    })
}

/// # Errors
///
/// Returns `askama::Error` if a template fails to render.
pub fn order_status_update(order: &Order, shop_url: &str) -> Result<RenderedEmail, askama::Error> {
    let status = humanize(order.status.as_str()).to_lowercase();
    let message = status_message(order.status, order.delivery_method);
    let order_url = order_url(shop_url, &order.order_number);

    Ok(RenderedEmail {
        subject: format!("Order {} is now {status}", order.order_number),
        html: OrderStatusHtml {
            order_number: &order.order_number,
            customer_name: &order.customer_name,
            status: &status,
            message,
            order_url: &order_url,
        }
        .render()?,
        text: OrderStatusText {
            order_number: &order.order_number,
            customer_name: &order.customer_name,
            status: &status,
            message,
            order_url: &order_url,
        }
        .render()?,
    })
}

/// # Errors
///
/// Returns `askama::Error` if a template fails to render.
pub fn support_reply(
    conversation: &Conversation,
    message: &Message,
    shop_url: &str,
) -> Result<RenderedEmail, askama::Error> {
    let conversation_url = format!(
        "{}/account/support/{}",
        shop_url.trim_end_matches('/'),
        conversation.id
    );

    Ok(RenderedEmail {
        subject: format!("New reply: {}", conversation.subject),
        html: SupportReplyHtml {
            customer_name: &conversation.customer_name,
            staff_name: &message.sender_name,
            subject: &conversation.subject,
            body: &message.body,
            conversation_url: &conversation_url,
        }
        .render()?,
        text: SupportReplyText {
            customer_name: &conversation.customer_name,
            staff_name: &message.sender_name,
            subject: &conversation.subject,
            body: &message.body,
            conversation_url: &conversation_url,
        }
        .render()?,
    })
}

fn order_url(shop_url: &str, order_number: &str) -> String {
    format!("{}/account/orders/{order_number}", shop_url.trim_end_matches('/'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;

    use buildmart_core::{
        ConversationId, ConversationStatus, DeliveryPolicy, Email, MessageId, OrderId,
        OrderItemId, OrderLine, OrderTotals, PaymentMethod, PaymentStatus, ProductId, SenderRole,
        UserId, UserRole,
    };

    use super::*;
    use crate::models::{OrderItem, ShippingAddress};

    const SHOP: &str = "https://shop.buildmart.example/";

    fn order_detail(discount_cents: i64) -> OrderDetail {
        let lines = [
            OrderLine {
                unit_price: Money::from_cents(1_299),
                quantity: 10,
            },
            OrderLine {
                unit_price: Money::from_cents(4_550),
                quantity: 2,
            },
        ];
        let totals = OrderTotals::compute(
            &lines,
            DeliveryMethod::Delivery,
            &DeliveryPolicy::default(),
            Money::from_cents(discount_cents),
        )
        .unwrap();

        let order = Order {
            id: OrderId::new(1),
            order_number: "BM-20260314-4K7Q2Z".to_owned(),
            user_id: None,
            customer_name: "Dana <Builder>".to_owned(),
            customer_email: Email::parse("dana@example.com").unwrap(),
            customer_phone: None,
            delivery_method: DeliveryMethod::Delivery,
            shipping_address: Some(ShippingAddress {
                line1: "12 Quarry Rd".to_owned(),
                line2: None,
                city: "Springfield".to_owned(),
                region: None,
                postal_code: None,
            }),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: PaymentMethod::CashOnDelivery,
            totals,
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let items = vec![
            OrderItem {
                id: OrderItemId::new(1),
                order_id: order.id,
                product_id: ProductId::new(1),
                product_name: "Portland Cement 50kg".to_owned(),
                product_sku: "CEM-50".to_owned(),
                unit_price: lines[0].unit_price,
                quantity: 10,
                line_total: lines[0].line_total(),
            },
            OrderItem {
                id: OrderItemId::new(2),
                order_id: order.id,
                product_id: ProductId::new(2),
                product_name: "Rebar 12mm x 6m".to_owned(),
                product_sku: "REB-12".to_owned(),
                unit_price: lines[1].unit_price,
                quantity: 2,
                line_total: lines[1].line_total(),
            },
        ];
        OrderDetail { order, items }
    }

    #[test]
    fn test_humanize() {
        assert_eq!(humanize("cash_on_delivery"), "Cash on delivery");
        assert_eq!(humanize("card"), "Card");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn test_order_confirmation_renders_lines_and_totals() {
        let email = order_confirmation(&order_detail(0), SHOP).unwrap();

        assert_eq!(email.subject, "Order BM-20260314-4K7Q2Z received");
        for part in [&email.text, &email.html] {
            assert!(part.contains("Portland Cement 50kg"));
            assert!(part.contains("$129.90"));
            assert!(part.contains("$91.00"));
            assert!(part.contains("$220.90"));
            assert!(part.contains("$25.00"));
            assert!(part.contains("$245.90"));
            assert!(part.contains("12 Quarry Rd, Springfield"));
            assert!(part.contains("https://shop.buildmart.example/account/orders/BM-20260314-4K7Q2Z"));
            assert!(!part.contains("Discount"));
        }
        assert!(email.text.contains("10 x Portland Cement 50kg (CEM-50) @ $12.99 = $129.90"));
        assert!(email.text.contains("Cash on delivery"));
    }

    #[test]
    fn test_order_confirmation_shows_discount() {
        let email = order_confirmation(&order_detail(1_000), SHOP).unwrap();
        assert!(email.text.contains("Discount: -$10.00"));
        assert!(email.text.contains("Total:    $235.90"));
        assert!(email.html.contains("-$10.00"));
    }

    #[test]
    fn test_html_is_escaped_text_is_not() {
        let email = order_confirmation(&order_detail(0), SHOP).unwrap();
        assert!(email.html.contains("Dana &#60;Builder&#62;") || email.html.contains("Dana &lt;Builder&gt;"));
        assert!(email.text.contains("Dana <Builder>"));
    }

    #[test]
    fn test_order_status_update() {
        let mut order = order_detail(0).order;
        order.status = OrderStatus::Shipped;
        let email = order_status_update(&order, SHOP).unwrap();
        assert_eq!(email.subject, "Order BM-20260314-4K7Q2Z is now shipped");
        assert!(email.text.contains("on its way"));

        order.delivery_method = DeliveryMethod::Pickup;
        let email = order_status_update(&order, SHOP).unwrap();
        assert!(email.text.contains("ready to collect"));
    }

    #[test]
    fn test_welcome_and_support_reply() {
        let user = User {
            id: UserId::new(5),
            email: Email::parse("sam@example.com").unwrap(),
            name: "Sam".to_owned(),
            phone: None,
            role: UserRole::Customer,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let email = welcome(&user, SHOP).unwrap();
        assert!(email.text.contains("Welcome, Sam!"));

        let conversation = Conversation {
            id: ConversationId::new(9),
            customer_id: user.id,
            customer_name: "Sam".to_owned(),
            subject: "Sand delivery".to_owned(),
            status: ConversationStatus::Open,
            last_message_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let message = Message {
            id: MessageId::new(1),
            conversation_id: conversation.id,
            sender_id: UserId::new(1),
            sender_role: SenderRole::Staff,
            sender_name: "Alex".to_owned(),
            body: "We can deliver Tuesday morning.".to_owned(),
            read_at: None,
            created_at: Utc::now(),
        };
        let email = support_reply(&conversation, &message, SHOP).unwrap();
        assert_eq!(email.subject, "New reply: Sand delivery");
        assert!(email.text.contains("Alex replied"));
        assert!(email.text.contains("/account/support/9"));
    }
}
