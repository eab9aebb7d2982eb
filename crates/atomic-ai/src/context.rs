//! Caller-supplied banking snapshot and its prompt rendering.
//!
//! The core banking backend sends the customer's accounts and recent
//! transactions with every chat request. Nothing here is stored; the block
//! produced by [`render_context`] is injected as a system message.

use serde::{Deserialize, Deserializer};

const DEFAULT_CURRENCY: &str = "USD";

/// Snapshot of a customer's banking data. All fields are optional on the wire.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserContext {
    pub user_name: Option<String>,
    #[serde(deserialize_with = "null_as_empty")]
    pub accounts: Vec<Account>,
    #[serde(deserialize_with = "null_as_empty")]
    pub recent_transactions: Vec<Transaction>,
}

/// Callers serialize empty collections as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Account {
    pub account_number: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub balance: Option<f64>,
    pub currency: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transaction {
    pub date: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub description: Option<String>,
    pub balance_after: Option<f64>,
}

/// Mask an account number down to its last four characters.
///
/// Numbers shorter than four characters are kept whole after the mask.
pub fn mask_account_number(number: &str) -> String {
    let chars: Vec<char> = number.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("***{tail}")
}

/// Render the context block injected into the chat prompt.
pub fn render_context(ctx: &UserContext) -> String {
    let mut parts = Vec::new();

    let name = ctx.user_name.as_deref().unwrap_or("Customer");
    parts.push(format!("Customer: {name}"));

    if !ctx.accounts.is_empty() {
        parts.push("\nAccounts:".to_string());
        for acc in &ctx.accounts {
            parts.push(format!(
                "  - {} ({}): {:.2} {} [Status: {}]",
                acc.kind.as_deref().unwrap_or("Account"),
                mask_account_number(acc.account_number.as_deref().unwrap_or_default()),
                acc.balance.unwrap_or(0.0),
                acc.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
                acc.status.as_deref().unwrap_or("Active"),
            ));
        }
    }

    if !ctx.recent_transactions.is_empty() {
        parts.push(format!(
            "\nRecent Transactions (last {}):",
            ctx.recent_transactions.len()
        ));
        for tx in &ctx.recent_transactions {
            parts.push(format!(
                "  - [{}] {}: {:+.2} {} - {} (Balance after: {:.2})",
                tx.date.as_deref().unwrap_or_default(),
                tx.kind.as_deref().unwrap_or_default(),
                tx.amount.unwrap_or(0.0),
                tx.currency.as_deref().unwrap_or(DEFAULT_CURRENCY),
                tx.description.as_deref().unwrap_or("N/A"),
                tx.balance_after.unwrap_or(0.0),
            ));
        }
    }

    parts.join("\n")
}
