use std::env;

use crate::model::{Order, OrderItem};
use crate::types::PrizeType;

/// Fire-and-forget order notifications to a configured list of Telegram chats.
/// Send failures are logged and never surfaced to the ordering customer.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot_token: String,
    chat_ids: Vec<String>,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Build the notifier from `TELEGRAM_BOT_TOKEN` and `CHAT_IDS`.
    /// Returns `None` when either is absent so the rest of the service runs
    /// without notifications.
    pub fn from_env() -> Option<Self> {
        let bot_token = env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat_ids: Vec<String> = env::var("CHAT_IDS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if chat_ids.is_empty() {
            return None;
        }

        Some(Self {
            bot_token,
            chat_ids,
            client: reqwest::Client::new(),
        })
    }

    pub async fn send_order(&self, order: &Order, items: &[OrderItem]) {
        let text = order_message(order, items);
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        for chat_id in &self.chat_ids {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            });

            match self.client.post(&url).json(&body).send().await {
                Ok(res) if !res.status().is_success() => {
                    eprintln!(
                        "telegram notify for chat {} returned status {}",
                        chat_id,
                        res.status()
                    );
                }
                Err(e) => eprintln!("telegram notify for chat {} failed: {}", chat_id, e),
                Ok(_) => {}
            }
        }
    }
}

fn esc(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn money(minor: i64) -> String {
    format!("{}.{:02}", minor / 100, (minor % 100).abs())
}

fn order_message(order: &Order, items: &[OrderItem]) -> String {
    let mut message = String::new();
    message.push_str("\u{1F6D2} <b>New order</b>\n");
    message.push_str(&format!("\u{1F464} Name: <b>{}</b>\n", esc(&order.name)));
    message.push_str(&format!("\u{1F4DE} Phone: <b>{}</b>\n", esc(&order.phone)));
    if let Some(email) = &order.email {
        message.push_str(&format!("\u{1F4E7} Email: <b>{}</b>\n", esc(email)));
    }
    if let Some(city) = &order.city {
        message.push_str(&format!("\u{1F3D9} City: <b>{}</b>\n", esc(city)));
    }
    if let Some(address) = &order.address {
        message.push_str(&format!("\u{1F3E1} Address: <b>{}</b>\n", esc(address)));
    }
    let notes = order.notes.as_deref().unwrap_or("-");
    message.push_str(&format!("\u{1F4DD} Notes: {}\n", esc(notes)));

    if let Some(coupon_code) = &order.coupon_code {
        let terms = match (order.prize_type, order.prize_value) {
            (Some(PrizeType::Percent), Some(v)) => format!("{}%", v),
            (Some(PrizeType::Amount), Some(v)) => money(v as i64),
            _ => "\u{2014}".to_string(),
        };
        message.push_str(&format!(
            "\u{1F3F7} Coupon: <b>{}</b> ({})\n",
            esc(coupon_code),
            esc(&terms)
        ));
        message.push_str(&format!(
            "\u{1F53B} Discount: <b>{}</b>\n",
            money(order.discount_amount)
        ));
    }

    message.push_str("\n\u{1F4E6} Items:\n");
    for item in items {
        let line_total = item.price * i64::from(item.quantity);
        let dosage = item
            .product_dosage
            .as_deref()
            .map(|d| format!(" {}", esc(d)))
            .unwrap_or_default();
        message.push_str(&format!(
            "\u{2022} {}{} \u{2014} <b>{} pcs</b> \u{00D7} {} = <b>{}</b>\n",
            esc(&item.product_name),
            dosage,
            item.quantity,
            money(item.price),
            money(line_total)
        ));
    }

    message.push_str(&format!(
        "\n\u{1F4B3} Payment: <b>{}</b>\n",
        esc(&order.payment_method)
    ));
    message.push_str(&format!(
        "\u{1F9EE} Subtotal: <b>{}</b>\n",
        money(order.subtotal)
    ));
    if order.coupon_code.is_some() {
        message.push_str(&format!(
            "\u{1F53B} Coupon discount: <b>{}</b>\n",
            money(order.discount_amount)
        ));
    }
    message.push_str(&format!(
        "\u{1F4B5} Total due: <b>{}</b>\n",
        money(order.total_amount)
    ));
    message.push_str(&format!("\n#order_{}", esc(&order.id)));

    message
}
