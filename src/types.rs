//! Core types shared across the IRO client.
//!
//! The backend serializes most monetary quantities as decimal strings, so the
//! wire structs keep them as `String` and expose typed accessors.

use serde::{Deserialize, Serialize};

/// A Solana address in base58 form.
pub type Address = String;

/// Number of lamports in one SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Minimum purchase applied when an IRO does not specify one.
pub const DEFAULT_MIN_PURCHASE_SOL: f64 = 0.1;

/// Convert a SOL amount to lamports, rounding to the nearest lamport.
pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as u64
}

/// Convert lamports back to SOL.
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

/// Parse a backend decimal string. Returns `None` for empty or non-finite input.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let parsed = value.trim().parse::<f64>().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Lifecycle status of an offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IroStatus {
    Scheduled,
    Live,
    Completed,
    Failed,
}

impl IroStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IroStatus::Scheduled => "SCHEDULED",
            IroStatus::Live => "LIVE",
            IroStatus::Completed => "COMPLETED",
            IroStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for IroStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(IroStatus::Scheduled),
            "LIVE" => Ok(IroStatus::Live),
            "COMPLETED" => Ok(IroStatus::Completed),
            "FAILED" => Ok(IroStatus::Failed),
            other => Err(format!("unknown IRO status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorProfile {
    pub display_name: String,
    pub sector: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCreator {
    pub profile_pic_url: Option<String>,
    pub creator_profile: Option<CreatorProfile>,
}

/// The creator token sold through an offering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorToken {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub mint_address: Address,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub telegram_url: Option<String>,
    #[serde(default)]
    pub discord_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub user: TokenCreator,
}

/// An Initial Return Offering as returned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Iro {
    pub id: String,
    pub token_id: String,
    pub start_time: String,
    pub end_time: String,
    /// Maximum SOL the offering accepts
    pub hard_cap: String,
    pub soft_cap: String,
    pub tokens_for_sale: String,
    /// Price of one token in SOL
    pub token_price: String,
    /// SOL raised so far
    #[serde(default)]
    pub total_raised: String,
    #[serde(default)]
    pub tokens_sold: String,
    /// Vesting period in seconds
    pub vesting_period: u64,
    /// Cliff period in seconds
    pub cliff_period: u64,
    #[serde(default)]
    pub min_purchase: Option<String>,
    #[serde(default)]
    pub max_purchase: Option<String>,
    pub status: IroStatus,
    pub token: CreatorToken,
}

impl Iro {
    /// Share of the hard cap raised so far, in percent.
    pub fn progress_percent(&self) -> f64 {
        let hard_cap = parse_decimal(&self.hard_cap).unwrap_or(0.0);
        let raised = parse_decimal(&self.total_raised).unwrap_or(0.0);
        if hard_cap > 0.0 {
            raised / hard_cap * 100.0
        } else {
            0.0
        }
    }

    /// Tokens a purchase of `amount_sol` would buy at the listed price.
    pub fn estimated_tokens(&self, amount_sol: f64) -> f64 {
        match parse_decimal(&self.token_price) {
            Some(price) if price > 0.0 => amount_sol / price,
            _ => 0.0,
        }
    }

    /// Minimum purchase in SOL, falling back to [`DEFAULT_MIN_PURCHASE_SOL`].
    pub fn min_purchase_sol(&self) -> f64 {
        self.min_purchase
            .as_deref()
            .and_then(parse_decimal)
            .unwrap_or(DEFAULT_MIN_PURCHASE_SOL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

/// One page of the offering list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IroPage {
    pub data: Vec<Iro>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantUser {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub profile_pic_url: Option<String>,
    pub wallet_address: Option<Address>,
}

/// A ranked buyer of an offering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IroParticipant {
    pub user_id: String,
    #[serde(rename = "totalAmountSOL")]
    pub total_amount_sol: f64,
    pub total_token_quantity: f64,
    pub user: Option<ParticipantUser>,
}

impl IroParticipant {
    /// Best available display name for the participant.
    pub fn display_name(&self) -> String {
        let Some(user) = &self.user else {
            return "Anonymous".to_string();
        };
        if let Some(name) = &user.display_name {
            return name.clone();
        }
        match (&user.first_name, &user.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            _ => user
                .wallet_address
                .as_deref()
                .map(short_address)
                .unwrap_or_else(|| "Anonymous".to_string()),
        }
    }
}

/// `AbCd...WxYz` form of an address for display.
pub fn short_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 8 {
        return address.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioToken {
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub logo_url: Option<String>,
    pub mint_address: Option<Address>,
}

/// A holding in the user's portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub id: String,
    pub user_id: String,
    pub token_id: String,
    pub iro_id: Option<String>,
    pub total_amount: f64,
    pub unlocked_amount: f64,
    pub claimed_amount: f64,
    pub is_claimable: bool,
    pub token: PortfolioToken,
    pub current_price: f64,
    pub current_value: f64,
}

/// State of a creator onboarding application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplicationState {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
    #[serde(default)]
    pub handle: Option<String>,
}

/// A creator onboarding application as seen by admins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorApplication {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub contact_number: String,
    pub email_address: String,
    pub state: ApplicationState,
    pub created_at: String,
    pub socials: Vec<SocialLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationPage {
    pub data: Vec<CreatorApplication>,
    #[serde(default)]
    pub meta: serde_json::Value,
}
