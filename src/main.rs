mod config;
mod data;
mod form;
mod lifecycle;
mod monitoring;
mod render;
mod storage;

use anyhow::{Context, Result};
use std::io::Stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use config::{Config, EnvConfig};
use data::cache::GeocodeCache;
use data::geocoder::{Geocoder, NominatimGeocoder};
use data::order_api::{HttpOrderApi, OrderApi};
use data::simulator::SimulatedOrderApi;
use data::types::{OrderId, OrderSummary};
use form::validation::FormInput;
use lifecycle::session::{OrderSession, SessionCommand, SessionOutcome};
use render::screen::Screen;
use render::terminal::TerminalScreen;
use storage::persistence::{self, ClientStore};
use storage::types::UserRecord;

const HELP: &str = "Команды:
  from <адрес>, to <адрес>         адреса отправления и назначения
  from-full <адрес>, to-full <адрес>
  comment <текст>, passengers <n>
  price <320 ₽>, distance <6,4 км>, time <15 минут>
  order                            создать заказ
  pick <n>                         выбрать водителя из списка
  history, status <номер заказа>, help, quit";

#[derive(Debug, PartialEq)]
enum Input {
    Session(SessionCommand),
    History,
    Status(OrderId),
    Help,
    Quit,
    Blank,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let text = rest.to_string();

    let command = match word {
        "" => return Input::Blank,
        "history" => return Input::History,
        "help" => return Input::Help,
        "quit" | "exit" => return Input::Quit,
        "status" if !rest.is_empty() => return Input::Status(OrderId::from(rest)),
        "from" => SessionCommand::SetPickup(text),
        "from-full" => SessionCommand::SetPickupFull(text),
        "to" => SessionCommand::SetDropoff(text),
        "to-full" => SessionCommand::SetDropoffFull(text),
        "comment" => SessionCommand::SetComment(text),
        "price" => SessionCommand::SetPrice(text),
        "distance" => SessionCommand::SetDistance(text),
        "time" => SessionCommand::SetDuration(text),
        "order" => SessionCommand::Submit,
        "passengers" => match rest.parse::<u32>() {
            Ok(n) if n >= 1 => SessionCommand::SetPassengers(n),
            _ => return Input::Unknown(line.to_string()),
        },
        "pick" => match rest.parse::<usize>() {
            Ok(n) if n >= 1 => SessionCommand::SelectBid(n - 1),
            _ => return Input::Unknown(line.to_string()),
        },
        _ => return Input::Unknown(line.to_string()),
    };

    Input::Session(command)
}

fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

struct Console<'a> {
    screen: TerminalScreen<Stdout>,
    store: &'a ClientStore,
    api: Arc<dyn OrderApi>,
}

impl Console<'_> {
    fn show_history(&mut self) {
        match self.store.history() {
            Ok(history) => self.screen.print_history(&history),
            Err(e) => tracing::warn!("Failed to read order history: {:#}", e),
        }
    }

    /// Runs on its own task so a slow backend never holds up the session.
    fn spawn_status(&self, order_id: OrderId) -> JoinHandle<()> {
        let api = self.api.clone();
        tokio::spawn(async move {
            let line = status_line(api.as_ref(), &order_id).await;
            TerminalScreen::stdout().print_line(&line);
        })
    }
}

async fn status_line(api: &dyn OrderApi, order_id: &OrderId) -> String {
    match api.get_order(order_id).await {
        Ok(order) => format_order(&order),
        Err(e) => format!("Не удалось получить заказ #{}: {}", order_id, e),
    }
}

fn format_order(order: &OrderSummary) -> String {
    let driver = order
        .driver_id
        .map(|id| format!(", водитель #{}", id))
        .unwrap_or_default();
    format!(
        "Заказ #{}: {} ({} → {}){}",
        order.id, order.status, order.pickup_address, order.dropoff_address, driver
    )
}

/// Feed stdin into one session until it reaches a final screen. Returns
/// `Closed` when the rider quits or stdin ends.
async fn drive_session<S: Screen>(
    mut session: OrderSession<S>,
    lines: &mut mpsc::Receiver<String>,
    console: &mut Console<'_>,
) -> SessionOutcome {
    let (tx, mut rx) = mpsc::channel(32);
    let mut commands = Some(tx);

    let run = session.run(&mut rx);
    tokio::pin!(run);

    loop {
        tokio::select! {
            outcome = &mut run => return outcome,
            line = lines.recv(), if commands.is_some() => match line.as_deref().map(parse_input) {
                // Dropping the sender lets the session wind down on its own.
                None | Some(Input::Quit) => commands = None,
                Some(Input::Session(command)) => {
                    if let Some(tx) = &commands {
                        if let Err(e) = tx.try_send(command) {
                            tracing::warn!("Command dropped: {}", e);
                        }
                    }
                }
                Some(Input::History) => console.show_history(),
                Some(Input::Status(order_id)) => {
                    console.spawn_status(order_id);
                }
                Some(Input::Help) => console.screen.print_line(HELP),
                Some(Input::Blank) => {}
                Some(Input::Unknown(line)) => {
                    console.screen.print_line(&format!("Неизвестная команда: {} (help)", line))
                }
            },
        }
    }
}

/// After a final screen: Enter starts over, `quit` or end of input stops.
async fn wait_for_restart(lines: &mut mpsc::Receiver<String>, console: &mut Console<'_>) -> bool {
    while let Some(line) = lines.recv().await {
        match parse_input(&line) {
            Input::Blank => return true,
            Input::Quit => return false,
            Input::History => console.show_history(),
            Input::Status(order_id) => {
                if let Err(e) = console.spawn_status(order_id).await {
                    tracing::warn!("Order status lookup failed: {}", e);
                }
            }
            _ => console.screen.print_line("Нажмите Enter, чтобы начать новый заказ"),
        }
    }
    false
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_config = EnvConfig::load()?;
    let mut config = Config::load_or_default("config.toml")?;
    config.apply_env(&env_config);

    monitoring::logger::init_tracing(&config.monitoring.log_level)?;

    tracing::info!("🚕 Taxi order client starting...");
    tracing::info!("Dry run mode: {}", config.system.dry_run);

    tracing::info!("Opening client store: {}", config.system.database_path);
    let store = ClientStore::new(&config.system.database_path, config.history.max_entries)?;

    match env_config.client_id {
        Some(id) => {
            store.save_user(&UserRecord {
                id,
                first_name: env_config.client_name.clone(),
                username: None,
            })?;
            tracing::info!("Signed in as client {}", id);
        }
        None => tracing::warn!("TAXI_CLIENT_ID is not set; orders require a saved user"),
    }

    let api: Arc<dyn OrderApi> = if config.system.dry_run {
        Arc::new(SimulatedOrderApi::new(config.simulator.clone()))
    } else {
        let api = HttpOrderApi::new(&config.api).context("Failed to build order API client")?;
        tracing::info!("Order API: {}", api.base_url());
        Arc::new(api)
    };

    let live_order = persistence::recover_from_restart(&store, api.as_ref()).await?;

    let cache = Arc::new(GeocodeCache::new(Duration::from_secs(config.geocoder.cache_ttl_secs)));
    let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimGeocoder::new(&config.geocoder, cache));

    let mut lines = spawn_stdin_reader();
    let mut console = Console {
        screen: TerminalScreen::stdout(),
        store: &store,
        api: api.clone(),
    };
    console.screen.print_line(HELP);
    if let Some(order) = &live_order {
        console.screen.print_line(&format!("Активный заказ: {}", format_order(order)));
    }

    loop {
        let session_store = ClientStore::new(&config.system.database_path, config.history.max_entries)
            .context("Failed to open client store for session")?;
        let session = OrderSession::new(
            api.clone(),
            geocoder.clone(),
            session_store,
            config.lifecycle.clone(),
            config.form.clone(),
            FormInput::default(),
            TerminalScreen::stdout(),
        );

        match drive_session(session, &mut lines, &mut console).await {
            SessionOutcome::Accepted(details) => {
                tracing::info!("Order {} accepted by {}", details.order_id, details.driver_name);
            }
            SessionOutcome::Cancelled(order_id) => {
                tracing::info!("Order {} cancelled", order_id);
            }
            SessionOutcome::Closed => break,
        }

        if !wait_for_restart(&mut lines, &mut console).await {
            break;
        }
    }

    tracing::info!("Shutting down...");
    Ok(())
}
