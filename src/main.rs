//! Command line client for creator-token IROs.
//!
//! Read-only commands talk to the backend directly. Purchases, claims and
//! reconciliation need an access token (`IRO_ACCESS_TOKEN`); purchases also
//! need a keypair file to sign with.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn, Level};

use iro_client::api::{HttpBackend, IroBackend, ListParams};
use iro_client::cache::ViewCache;
use iro_client::chain::activity::DEFAULT_ACTIVITY_LIMIT;
use iro_client::chain::{recent_activity, KeypairWallet, SolanaRpc};
use iro_client::config::{ClientBuilder, ClientConfig, Cluster};
use iro_client::error::ClientError;
use iro_client::onboarding::{submit_application, OnboardingApplication};
use iro_client::purchase::{PurchaseOrchestrator, SqliteJournal};
use iro_client::session::{AuthSession, StaticSession};
use iro_client::types::{lamports_to_sol, short_address};
use iro_client::vesting::VestingClaimClient;

#[derive(Parser)]
#[command(name = "iro-client")]
#[command(about = "Browse, buy and claim creator-token IROs")]
struct Cli {
    /// Backend base URL, including the /api prefix
    #[arg(long, env = "IRO_API_URL", global = true)]
    api_url: Option<String>,

    /// Solana RPC endpoint; defaults to the cluster's public endpoint
    #[arg(long, env = "IRO_RPC_URL", global = true)]
    rpc_url: Option<String>,

    /// mainnet or devnet
    #[arg(long, env = "IRO_CLUSTER", global = true)]
    cluster: Option<Cluster>,

    /// Path to the keypair JSON file used to sign purchases
    #[arg(long, env = "IRO_KEYPAIR", global = true)]
    keypair: Option<String>,

    /// Bearer token for authenticated calls
    #[arg(long, env = "IRO_ACCESS_TOKEN", global = true, hide_env_values = true)]
    token: Option<String>,

    /// SQLite file for the confirmation journal
    #[arg(long, env = "IRO_JOURNAL_PATH", global = true)]
    journal: Option<String>,

    /// Print debug logs
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// List offerings
    List {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
        /// SCHEDULED, LIVE, COMPLETED or FAILED
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one offering
    Show { iro_id: String },
    /// Top buyers of an offering
    Participants { iro_id: String },
    /// Buy tokens with SOL
    Buy {
        iro_id: String,
        /// Amount in SOL
        #[arg(long)]
        amount: String,
    },
    /// Re-send confirmation for a purchase that was broadcast but not acknowledged
    Retry {
        idempotency_key: String,
        /// Broadcast signature, for purchases whose signature was never journaled
        #[arg(long)]
        signature: Option<String>,
    },
    /// Retry every unacknowledged purchase made by this wallet
    Reconcile,
    /// Vesting allocations
    Investments,
    /// Claim unlocked tokens from one offering
    Claim { iro_id: String },
    /// Claim unlocked tokens from every offering
    ClaimAll,
    /// Holdings with current value
    Portfolio,
    /// Recent SOL movements of a wallet
    Activity {
        /// Defaults to the keypair's address
        address: Option<String>,
        #[arg(long, default_value_t = DEFAULT_ACTIVITY_LIMIT)]
        limit: usize,
    },
    /// Creator applications (admin)
    Applications {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        limit: u32,
        #[arg(long)]
        status: Option<String>,
    },
    /// Approve a creator application (admin)
    Approve {
        application_id: String,
        #[arg(long)]
        sector: String,
    },
    /// Check an onboarding application JSON file against the form rules
    ValidateOnboarding { file: String },
    /// Submit an onboarding application JSON file
    Apply { file: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .init();

    let config = build_config(&cli);
    let backend: Arc<dyn IroBackend> = Arc::new(HttpBackend::from_config(&config)?);
    let cache = ViewCache::new(&config);
    let rpc = SolanaRpc::new(config.rpc_url());

    let wallet = match &cli.keypair {
        Some(path) => Some(
            KeypairWallet::from_file(path, rpc.client())
                .with_context(|| format!("Failed to load keypair {}", path))?,
        ),
        None => None,
    };
    let session = StaticSession::new(
        cli.token.clone(),
        wallet.iter().map(KeypairWallet::handle).collect(),
    );

    match cli.action {
        Action::List {
            page,
            limit,
            status,
        } => {
            let mut params = ListParams {
                page,
                limit,
                ..Default::default()
            };
            if let Some(status) = status {
                params = params.with_status(status);
            }
            let page = backend.list_iros(&params).await.map_err(user_error)?;
            for iro in &page.data {
                println!(
                    "{}  {:<10} {:<8} {:>6.1}%  price {} SOL",
                    iro.id,
                    iro.token.symbol,
                    iro.status.as_str(),
                    iro.progress_percent(),
                    iro.token_price
                );
            }
            println!(
                "page {} of {} ({} offerings)",
                page.meta.page, page.meta.total_pages, page.meta.total
            );
        }
        Action::Show { iro_id } => {
            let iro = backend.get_iro(&iro_id).await.map_err(user_error)?;
            println!("{} ({})", iro.token.name, iro.token.symbol);
            println!("status:      {}", iro.status.as_str());
            println!("raised:      {} / {} SOL ({:.1}%)", iro.total_raised, iro.hard_cap, iro.progress_percent());
            println!("price:       {} SOL", iro.token_price);
            println!("min buy:     {} SOL", iro.min_purchase_sol());
            println!("window:      {} .. {}", iro.start_time, iro.end_time);
        }
        Action::Participants { iro_id } => {
            let participants = backend.participants(&iro_id).await.map_err(user_error)?;
            for (rank, p) in participants.iter().enumerate() {
                println!(
                    "{:>3}. {:<24} {:>12.4} SOL {:>16.2} tokens",
                    rank + 1,
                    p.display_name(),
                    p.total_amount_sol,
                    p.total_token_quantity
                );
            }
        }
        Action::Buy { iro_id, amount } => {
            let wallet = wallet.ok_or_else(|| anyhow!("--keypair is required to buy"))?;
            let orchestrator = orchestrator(&config, backend.clone(), rpc, wallet, cache).await?;
            let iro = backend.get_iro(&iro_id).await.map_err(user_error)?;
            let outcome = orchestrator
                .purchase(&iro, &amount, &session)
                .await
                .map_err(user_error)?;
            info!(
                "Bought ~{:.4} {} for {} SOL",
                outcome.intent.estimated_tokens(),
                iro.token.symbol,
                outcome.intent.amount_sol
            );
            println!("signature: {}", outcome.submission.signature);
            println!("status:    {}", outcome.result.status);
            println!("credited:  {} tokens", outcome.result.tokens_credited);
        }
        Action::Retry {
            idempotency_key,
            signature,
        } => {
            let wallet = wallet.ok_or_else(|| anyhow!("--keypair is required to retry"))?;
            let orchestrator = orchestrator(&config, backend, rpc, wallet, cache).await?;
            let result = match signature {
                Some(signature) => {
                    orchestrator
                        .retry_confirmation_with_signature(&idempotency_key, &signature, &session)
                        .await
                }
                None => orchestrator.retry_confirmation(&idempotency_key, &session).await,
            }
            .map_err(user_error)?;
            println!("status: {}, credited {} tokens", result.status, result.tokens_credited);
        }
        Action::Reconcile => {
            let wallet = wallet.ok_or_else(|| anyhow!("--keypair is required to reconcile"))?;
            let orchestrator = orchestrator(&config, backend, rpc, wallet, cache).await?;
            let report = orchestrator
                .reconcile_pending(&session)
                .await
                .map_err(user_error)?;
            for key in &report.confirmed {
                println!("confirmed {}", key);
            }
            for (key, reason) in &report.still_pending {
                println!("pending   {}: {}", key, reason);
            }
            if report.confirmed.is_empty() && report.still_pending.is_empty() {
                println!("nothing to reconcile");
            }
        }
        Action::Investments => {
            let client = VestingClaimClient::new(backend, cache);
            let records = client.investments(&session).await.map_err(user_error)?;
            let now = Utc::now().timestamp_millis();
            for r in &records {
                println!(
                    "{:<10} total {:>14} claimable {:>14} locked {:>14}  {:>5.1}%  {}",
                    r.token.symbol,
                    r.total_amount,
                    r.claimable_amount,
                    r.locked_amount,
                    r.progress_percent(),
                    r.time_left(now)
                );
            }
        }
        Action::Claim { iro_id } => {
            let client = VestingClaimClient::new(backend, cache);
            let outcome = client.claim(&iro_id, &session).await.map_err(user_error)?;
            println!(
                "claimed {} (remaining {}) in {}",
                outcome.result.amount_claimed, outcome.result.remaining, outcome.result.tx_signature
            );
        }
        Action::ClaimAll => {
            let client = VestingClaimClient::new(backend, cache);
            let report = client.claim_all(&session).await.map_err(user_error)?;
            for (iro_id, result) in &report.claimed {
                println!("{}: claimed {} in {}", iro_id, result.amount_claimed, result.tx_signature);
            }
            for (iro_id, reason) in &report.failed {
                println!("{}: failed: {}", iro_id, reason);
            }
            println!("{} allocations had nothing to claim", report.skipped);
        }
        Action::Portfolio => {
            let token = session.access_token().await.ok_or_else(|| user_error(ClientError::NotAuthenticated))?;
            let items = backend.portfolio(&token).await.map_err(user_error)?;
            let total: f64 = items.iter().map(|i| i.current_value).sum();
            for item in &items {
                println!(
                    "{:<10} {:>16.2} tokens  {:>12.4} SOL",
                    item.token.symbol, item.total_amount, item.current_value
                );
            }
            println!("total value: {:.4} SOL", total);
        }
        Action::Activity { address, limit } => {
            let address = address
                .or_else(|| session.wallet().map(|w| w.address))
                .ok_or_else(|| anyhow!("pass an address or --keypair"))?;
            let balance = rpc.client().get_balance(&address.parse()?).await?;
            let activity = recent_activity(&rpc.client(), &address, limit)
                .await
                .map_err(user_error)?;
            println!("{} balance {:.4} SOL", short_address(&address), lamports_to_sol(balance));
            for entry in &activity.transactions {
                println!(
                    "{:+.6} SOL  {}{}",
                    entry.amount_sol,
                    short_address(&entry.signature),
                    if entry.failed { "  (failed)" } else { "" }
                );
            }
            println!(
                "income {:.4} SOL, spending {:.4} SOL",
                activity.income_sol, activity.spending_sol
            );
        }
        Action::Applications {
            page,
            limit,
            status,
        } => {
            let token = session.access_token().await.ok_or_else(|| user_error(ClientError::NotAuthenticated))?;
            let mut params = ListParams {
                page,
                limit,
                ..Default::default()
            };
            if let Some(status) = status {
                params = params.with_status(status);
            }
            let page = backend
                .list_applications(&token, &params)
                .await
                .map_err(user_error)?;
            for app in &page.data {
                println!("{}  {:<24} {:?}  {}", app.id, app.name, app.state, app.email_address);
            }
        }
        Action::Approve {
            application_id,
            sector,
        } => {
            let token = session.access_token().await.ok_or_else(|| user_error(ClientError::NotAuthenticated))?;
            backend
                .approve_application(&token, &application_id, &sector)
                .await
                .map_err(user_error)?;
            println!("approved {}", application_id);
        }
        Action::ValidateOnboarding { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file))?;
            let application: OnboardingApplication =
                serde_json::from_str(&raw).context("Failed to parse onboarding application")?;
            let errors = application.validate();
            if errors.is_empty() {
                println!("application is valid");
            } else {
                for error in &errors {
                    println!("{}: {}", error.field, error.message);
                }
                return Err(anyhow!("{} field(s) failed validation", errors.len()));
            }
        }
        Action::Apply { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file))?;
            let application: OnboardingApplication =
                serde_json::from_str(&raw).context("Failed to parse onboarding application")?;
            let submitted = submit_application(backend.as_ref(), &application, &session)
                .await
                .map_err(user_error)?;
            println!("submitted application {} ({:?})", submitted.id, submitted.state);
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> ClientConfig {
    let mut builder = ClientBuilder::from_env();
    if let Some(url) = &cli.api_url {
        builder = builder.with_api_url(url);
    }
    if let Some(cluster) = cli.cluster {
        builder = builder.with_cluster(cluster);
    }
    if let Some(url) = &cli.rpc_url {
        builder = builder.with_rpc_url(url);
    }
    if let Some(path) = &cli.journal {
        builder = builder.with_journal_path(path);
    }
    builder.build()
}

async fn orchestrator(
    config: &ClientConfig,
    backend: Arc<dyn IroBackend>,
    rpc: SolanaRpc,
    wallet: KeypairWallet,
    cache: ViewCache,
) -> Result<PurchaseOrchestrator> {
    let journal = SqliteJournal::open(&config.journal_path).await?;
    Ok(PurchaseOrchestrator::new(
        backend,
        Arc::new(rpc),
        Arc::new(wallet),
        Arc::new(journal),
        cache,
        config.clone(),
    ))
}

/// Turn a client error into the message shown to the user.
fn user_error(err: ClientError) -> anyhow::Error {
    if let ClientError::ConfirmationPending {
        idempotency_key,
        signature,
        ..
    } = &err
    {
        warn!(
            "Funds were sent in {} but the purchase is not confirmed yet. Run `iro-client retry {} --signature {}`.",
            signature, idempotency_key, signature
        );
    }
    anyhow!(err.user_message())
}
