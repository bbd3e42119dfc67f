use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::*;
use payment_reconciler::{db_types::OrderId, status_objects::StatusQuery};
use storefront_server::data_objects::PaymentStatusResponse;
use url::Url;

mod client;
mod poller;

use crate::{
    client::CheckoutClient,
    poller::{ConfirmationPoller, PollOutcome, PollState, PollerConfig},
};

#[derive(Parser, Debug)]
#[command(version = "0.1.0", about = "Check on storefront payments from the command line")]
pub struct Arguments {
    /// The payment server's base URL
    #[arg(short, long, default_value = "http://127.0.0.1:8370")]
    server: Url,
    /// HTTP timeout for each request to the payment server, in seconds
    #[arg(short, long, default_value = "10")]
    timeout: u64,
    /// Print the server's status answer as JSON
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "health", about = "Check that the payment server is up")]
    Health,
    #[clap(name = "status", about = "Ask once for the confirmation status of a payment")]
    Status(PaymentParams),
    #[clap(name = "watch", about = "Poll until a payment is confirmed, or the attempts run out")]
    Watch(WatchParams),
}

#[derive(Debug, Args)]
#[group(required = true, multiple = false)]
pub struct PaymentParams {
    /// The payment processor's charge reference, e.g. chrg_test_5x1...
    #[arg(short = 'r', long = "reference")]
    reference: Option<String>,
    /// The storefront's order id
    #[arg(short = 'o', long = "order")]
    order_id: Option<String>,
}

impl PaymentParams {
    fn query(&self) -> Result<StatusQuery> {
        match (&self.reference, &self.order_id) {
            (Some(r), _) => Ok(StatusQuery::Reference(r.clone())),
            (None, Some(id)) => Ok(StatusQuery::OrderId(OrderId::from(id.as_str()))),
            (None, None) => Err(anyhow!("Provide either a payment reference or an order id")),
        }
    }
}

#[derive(Debug, Args)]
pub struct WatchParams {
    #[command(flatten)]
    payment: PaymentParams,
    /// Seconds between status checks
    #[arg(short = 'i', long = "interval", default_value = "3")]
    interval: u64,
    /// How many times to check before giving up
    #[arg(short = 'm', long = "max-attempts", default_value = "40")]
    max_attempts: u32,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let result = match run(cli).await {
        Ok(msg) => {
            println!("{msg}");
            0
        },
        Err(e) => {
            eprintln!("Error: {e}");
            1
        },
    };
    std::process::exit(result);
}

async fn run(cli: Arguments) -> Result<String> {
    let client = CheckoutClient::new(cli.server, Duration::from_secs(cli.timeout))?;
    match cli.command {
        Command::Health => client.health().await,
        Command::Status(params) => {
            let query = params.query()?;
            let response = client.payment_status(&query).await?;
            render_status(&query, &response, cli.json)
        },
        Command::Watch(params) => watch_payment(client, params, cli.json).await,
    }
}

async fn watch_payment(client: CheckoutClient, params: WatchParams, json: bool) -> Result<String> {
    let query = params.payment.query()?;
    let config = PollerConfig { interval: Duration::from_secs(params.interval), max_attempts: params.max_attempts };
    if config.max_attempts == 0 {
        return Err(anyhow!("max-attempts must be at least 1"));
    }
    info!("⏱️ Watching {query:?} on {}", client.server());
    let poller = ConfirmationPoller::new(client, config);
    let handle = poller.start(query.clone());
    let mut states = handle.subscribe();

    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_style(
        ProgressStyle::with_template("{spinner:5} {msg} [{elapsed}]")?
            .tick_strings(&["🕛 ", "🕐 ", "🕑 ", "🕒 ", "🕓 ", "🕔 ", "🕕 ", "🕖 ", "🕗 ", "🕘 ", "🕙 ", "🕚 "]),
    );
    pb.set_message("Waiting for the payment to be confirmed...");
    loop {
        tokio::select! {
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                if let PollState::Polling { attempts } = state {
                    let max = poller.config().max_attempts;
                    pb.set_message(format!("Waiting for the payment to be confirmed (check {attempts}/{max})"));
                }
                if state.is_terminal() {
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("⏱️ Interrupted. Stopping the poller");
                handle.cancel();
            },
        }
    }
    let outcome = handle.wait().await;
    debug!("⏱️ Poller finished after {} checks. Confirmed: {}", outcome.attempts(), outcome.is_confirmed());
    let message = match &outcome {
        PollOutcome::Confirmed { response, .. } => {
            pb.finish_with_message("Confirmed!");
            render_status(&query, response, json)?
        },
        PollOutcome::Exhausted { attempts } => {
            pb.finish_with_message("Still pending");
            format!(
                "No confirmation after {attempts} checks. The payment is still pending, check back later. Late \
                 confirmations are still applied to the order."
            )
        },
        PollOutcome::Cancelled { attempts } => {
            pb.abandon_with_message("Cancelled");
            format!("Stopped watching after {attempts} checks")
        },
    };
    Ok(message)
}

fn render_status(query: &StatusQuery, response: &PaymentStatusResponse, json: bool) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(response)?)
    } else {
        Ok(describe_status(query, response))
    }
}

fn describe_status(query: &StatusQuery, response: &PaymentStatusResponse) -> String {
    let subject = match query {
        StatusQuery::Reference(r) => format!("Payment {r}"),
        StatusQuery::OrderId(id) => format!("Order {id}"),
    };
    match &response.order {
        Some(order) => format!(
            "{subject}: {} (order {}, {}, according to {:?})",
            response.status, order.order_number, order.total_price, response.source
        ),
        None => format!("{subject}: {} (according to {:?})", response.status, response.source),
    }
}
