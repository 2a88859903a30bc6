use chrono::{Local, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use crate::config::{FormConfig, LifecycleConfig};
use crate::data::geocoder::Geocoder;
use crate::data::order_api::{ApiError, OrderApi};
use crate::data::types::{Bid, Coordinates, CreateOrderRequest, OrderDetails, OrderDraft, OrderId, Scalar};
use crate::form::controller::run_form_controller;
use crate::form::validation::{FormInput, FormStatus};
use crate::lifecycle::countdown::{Countdown, Tick};
use crate::lifecycle::poller::{BidPoller, PollEvent};
use crate::lifecycle::state::{LifecycleEvent, LifecycleState, TransitionError};
use crate::render::screen::Screen;
use crate::render::views::{accepted_view, cancelled_view, AcceptedSummary, BidBoard, BidModalView};
use crate::storage::persistence::ClientStore;
use crate::storage::types::{ActiveOrder, DraftSnapshot, HistoryEntry};

const CANCEL_REASON_TIMEOUT: &str = "timeout";

/// Rider actions, in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SetPickup(String),
    SetPickupFull(String),
    SetDropoff(String),
    SetDropoffFull(String),
    SetComment(String),
    SetPassengers(u32),
    SetPrice(String),
    SetDistance(String),
    SetDuration(String),
    Submit,
    /// Zero-based position in the driver list currently on screen.
    SelectBid(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Accepted(OrderDetails),
    Cancelled(OrderId),
    /// The rider went away before the order finished.
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("submission is disabled until both addresses are filled in")]
    NotReady,

    #[error("Пожалуйста, авторизуйтесь для создания заказа")]
    NotAuthorized,

    #[error("Пожалуйста, заполните оба адреса для заказа такси")]
    MissingAddress,

    #[error("Ошибка при создании заказа: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Ошибка локального хранилища: {0:#}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Pickup,
    Dropoff,
}

#[derive(Debug)]
struct Resolution {
    side: Side,
    text: String,
    coords: Option<Coordinates>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowExit {
    Finished,
    Closed,
}

/// What was on screen when the order went out.
struct SubmittedOrder {
    draft: OrderDraft,
    price_display: String,
    distance_display: String,
}

/// One order attempt, from typing addresses to a final screen. Owns every
/// piece of mutable state the flow needs and is driven from a single task.
pub struct OrderSession<S: Screen> {
    api: Arc<dyn OrderApi>,
    geocoder: Arc<dyn Geocoder>,
    store: ClientStore,
    config: LifecycleConfig,
    screen: S,
    state: LifecycleState,
    inputs: watch::Sender<FormInput>,
    status: watch::Receiver<FormStatus>,
    form_task: JoinHandle<()>,
    pickup_coords: Option<Coordinates>,
    dropoff_coords: Option<Coordinates>,
    pickup_lookup: Option<JoinHandle<()>>,
    dropoff_lookup: Option<JoinHandle<()>>,
    resolved_tx: mpsc::UnboundedSender<Resolution>,
    resolved_rx: mpsc::UnboundedReceiver<Resolution>,
    submitted: Option<SubmittedOrder>,
    modal_open: bool,
}

impl<S: Screen> OrderSession<S> {
    /// Must be called inside a tokio runtime: the form controller starts here.
    pub fn new(
        api: Arc<dyn OrderApi>,
        geocoder: Arc<dyn Geocoder>,
        store: ClientStore,
        config: LifecycleConfig,
        form: FormConfig,
        initial: FormInput,
        screen: S,
    ) -> Self {
        let (inputs, input_rx) = watch::channel(initial);
        let (status_tx, status) = watch::channel(FormStatus::default());
        let form_task = tokio::spawn(run_form_controller(form, input_rx, status_tx));
        let (resolved_tx, resolved_rx) = mpsc::unbounded_channel();

        Self {
            api,
            geocoder,
            store,
            config,
            screen,
            state: LifecycleState::CollectingAddresses,
            inputs,
            status,
            form_task,
            pickup_coords: None,
            dropoff_coords: None,
            pickup_lookup: None,
            dropoff_lookup: None,
            resolved_tx,
            resolved_rx,
            submitted: None,
            modal_open: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &LifecycleState {
        &self.state
    }

    #[cfg(test)]
    pub fn store(&self) -> &ClientStore {
        &self.store
    }

    pub fn input(&self) -> FormInput {
        self.inputs.borrow().clone()
    }

    /// Drive the session until the order reaches a final screen or the
    /// command stream ends.
    pub async fn run(&mut self, commands: &mut mpsc::Receiver<SessionCommand>) -> SessionOutcome {
        // Pre-filled fields get resolved right away.
        self.lookup(Side::Pickup);
        self.lookup(Side::Dropoff);

        loop {
            match &self.state {
                LifecycleState::Accepted { details } => {
                    return SessionOutcome::Accepted(details.clone());
                }
                LifecycleState::Cancelled { order_id } => {
                    return SessionOutcome::Cancelled(order_id.clone());
                }
                LifecycleState::AwaitingBids { order_id } => {
                    let order_id = order_id.clone();
                    if self.bid_window(order_id, commands).await == WindowExit::Closed {
                        return SessionOutcome::Closed;
                    }
                    continue;
                }
                _ => {}
            }

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command).await,
                    None => return SessionOutcome::Closed,
                },
                Some(resolution) = self.resolved_rx.recv() => self.apply_resolution(resolution),
                Ok(()) = self.status.changed() => self.sync_form(),
            }
        }
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SetPickup(text) => {
                self.inputs.send_modify(|form| form.pickup = text);
                self.address_changed(Side::Pickup);
            }
            SessionCommand::SetPickupFull(text) => {
                self.inputs.send_modify(|form| form.pickup_full = text);
                self.address_changed(Side::Pickup);
            }
            SessionCommand::SetDropoff(text) => {
                self.inputs.send_modify(|form| form.dropoff = text);
                self.address_changed(Side::Dropoff);
            }
            SessionCommand::SetDropoffFull(text) => {
                self.inputs.send_modify(|form| form.dropoff_full = text);
                self.address_changed(Side::Dropoff);
            }
            SessionCommand::SetComment(text) => self.inputs.send_modify(|form| form.comment = text),
            SessionCommand::SetPassengers(n) => self.inputs.send_modify(|form| form.passengers = n),
            SessionCommand::SetPrice(text) => self.inputs.send_modify(|form| form.price_display = text),
            SessionCommand::SetDistance(text) => {
                self.inputs.send_modify(|form| form.distance_display = text)
            }
            SessionCommand::SetDuration(text) => {
                self.inputs.send_modify(|form| form.duration_display = text)
            }
            SessionCommand::Submit => match self.submit().await {
                Ok(order_id) => info!("Order {} created, waiting for drivers", order_id),
                Err(SubmitError::NotReady) => {
                    debug!("Submit ignored in state {}", self.state);
                    let status = self.status.borrow().clone();
                    self.screen.form_status(&status);
                }
                Err(e) => {
                    warn!("Order submission failed: {}", e);
                    self.screen.alert(&e.to_string());
                }
            },
            SessionCommand::SelectBid(_) => debug!("No driver list on screen, selection ignored"),
        }
    }

    fn sync_form(&mut self) {
        let status = self.status.borrow_and_update().clone();
        self.screen.form_status(&status);

        let event = if status.submit_enabled {
            LifecycleEvent::AddressesValid
        } else {
            LifecycleEvent::AddressesInvalid
        };
        if let Err(e) = self.transition(event) {
            debug!("Form update not applied: {}", e);
        }
    }

    fn transition(&mut self, event: LifecycleEvent) -> Result<(), TransitionError> {
        let next = self.state.apply(event)?;
        if next.name() != self.state.name() {
            info!("Order lifecycle: {} -> {}", self.state, next);
        }
        self.state = next;
        Ok(())
    }

    fn side_text(&self, side: Side) -> String {
        let input = self.inputs.borrow();
        match side {
            Side::Pickup => input.pickup_text().to_string(),
            Side::Dropoff => input.dropoff_text().to_string(),
        }
    }

    fn coords(&self, side: Side) -> Option<Coordinates> {
        match side {
            Side::Pickup => self.pickup_coords,
            Side::Dropoff => self.dropoff_coords,
        }
    }

    fn set_coords(&mut self, side: Side, coords: Option<Coordinates>) {
        match side {
            Side::Pickup => self.pickup_coords = coords,
            Side::Dropoff => self.dropoff_coords = coords,
        }
    }

    /// Coordinates belong to the text they were resolved from; a new text
    /// starts unknown until its own lookup lands.
    fn address_changed(&mut self, side: Side) {
        self.set_coords(side, None);
        self.lookup(side);
    }

    fn lookup(&mut self, side: Side) {
        let text = self.side_text(side);
        if text.is_empty() || self.coords(side).is_some() {
            return;
        }

        let geocoder = self.geocoder.clone();
        let resolved = self.resolved_tx.clone();
        let task = tokio::spawn(async move {
            let coords = geocoder.resolve(&text).await;
            let _ = resolved.send(Resolution { side, text, coords });
        });

        let previous = match side {
            Side::Pickup => self.pickup_lookup.replace(task),
            Side::Dropoff => self.dropoff_lookup.replace(task),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn apply_resolution(&mut self, resolution: Resolution) {
        if resolution.text != self.side_text(resolution.side) {
            debug!("Discarding coordinates for outdated address {:?}", resolution.text);
            return;
        }
        info!(
            "{:?} coordinates updated: {:?}",
            resolution.side, resolution.coords
        );
        self.set_coords(resolution.side, resolution.coords);
    }

    fn drain_resolutions(&mut self) {
        while let Ok(resolution) = self.resolved_rx.try_recv() {
            self.apply_resolution(resolution);
        }
    }

    /// Owned future so the session itself is never borrowed across the lookup.
    fn resolve_missing(
        &self,
        side: Side,
        text: String,
    ) -> impl Future<Output = Option<Coordinates>> + Send + 'static {
        let known = self.coords(side);
        let geocoder = self.geocoder.clone();
        async move {
            match known {
                Some(coords) => Some(coords),
                None => geocoder.resolve(&text).await,
            }
        }
    }

    async fn submit(&mut self) -> Result<OrderId, SubmitError> {
        self.drain_resolutions();
        if self.state != LifecycleState::Ready {
            return Err(SubmitError::NotReady);
        }

        let user = self.store.user()?.ok_or(SubmitError::NotAuthorized)?;
        let input = self.input();
        let mut draft = input.to_draft();

        // Saved whatever happens next, so an interrupted submission can be recovered.
        let snapshot = DraftSnapshot::from_draft(&draft, Utc::now());
        if let Err(e) = self.store.save_last_draft(&snapshot) {
            warn!("Failed to save draft snapshot: {:#}", e);
        }

        if draft.pickup.text.is_empty() || draft.dropoff.text.is_empty() {
            return Err(SubmitError::MissingAddress);
        }

        self.transition(LifecycleEvent::SubmitRequested)?;

        let pickup = self.resolve_missing(Side::Pickup, draft.pickup.text.clone());
        let dropoff = self.resolve_missing(Side::Dropoff, draft.dropoff.text.clone());
        let (pickup, dropoff) = futures::join!(pickup, dropoff);
        self.pickup_coords = pickup;
        self.dropoff_coords = dropoff;
        draft.pickup.coords = pickup;
        draft.dropoff.coords = dropoff;

        let request = CreateOrderRequest::from_draft(user.id, &draft);
        self.screen.loader(Some("Создание заказа..."));
        let result = self.api.create_order(&request).await;
        self.screen.loader(None);

        let order_id = match result {
            Ok(order_id) => order_id,
            Err(e) => {
                self.transition(LifecycleEvent::SubmitFailed)?;
                return Err(e.into());
            }
        };

        self.transition(LifecycleEvent::OrderCreated(order_id.clone()))?;

        let active = ActiveOrder::new(order_id.clone(), &draft, Utc::now());
        if let Err(e) = self.store.save_active_order(&active) {
            warn!("Failed to save active order {}: {:#}", order_id, e);
        }

        self.submitted = Some(SubmittedOrder {
            draft,
            price_display: input.price_display,
            distance_display: input.distance_display,
        });
        Ok(order_id)
    }

    fn open_modal(&mut self) -> bool {
        if self.modal_open {
            warn!("Driver selection is already open");
            return false;
        }
        self.modal_open = true;
        true
    }

    fn close_modal(&mut self, poller: &BidPoller) {
        if !self.modal_open {
            return;
        }
        self.modal_open = false;
        poller.stop();
        self.screen.close_modal();
    }

    async fn bid_window(
        &mut self,
        order_id: OrderId,
        commands: &mut mpsc::Receiver<SessionCommand>,
    ) -> WindowExit {
        if !self.open_modal() {
            return WindowExit::Closed;
        }

        let mut countdown = Countdown::new(self.config.bid_window_secs);
        let mut bids: Vec<Bid> = Vec::new();
        let mut view = BidModalView {
            order_id: order_id.to_string(),
            timer: countdown.display(),
            board: BidBoard::Waiting,
        };
        self.screen.bid_modal(&view);

        let (events_tx, mut events) = mpsc::channel(8);
        let poller = BidPoller::spawn(
            self.api.clone(),
            order_id.clone(),
            self.config.poll_interval(),
            self.config.poll_retry(),
            events_tx,
        );

        let second = Duration::from_secs(1);
        let mut ticker = time::interval_at(Instant::now() + second, second);

        loop {
            tokio::select! {
                _ = ticker.tick() => match countdown.tick() {
                    Tick::Running(display) => {
                        self.screen.countdown(countdown.remaining(), &display);
                        view.timer = display;
                    }
                    Tick::Expired => {
                        self.screen.countdown(countdown.remaining(), &countdown.display());
                        self.close_modal(&poller);
                        self.expire(&order_id).await;
                        return WindowExit::Finished;
                    }
                    Tick::Finished => return WindowExit::Finished,
                },
                Some(event) = events.recv() => match event {
                    PollEvent::Bids(list) if list.is_empty() => {}
                    PollEvent::Bids(list) => {
                        view.board = BidBoard::from_bids(&list);
                        bids = list;
                        self.screen.bid_modal(&view);
                    }
                    PollEvent::Failed(_) => {
                        bids.clear();
                        view.board = BidBoard::PollError;
                        self.screen.bid_modal(&view);
                    }
                },
                command = commands.recv() => match command {
                    Some(SessionCommand::SelectBid(index)) => {
                        let Some(bid) = bids.get(index).cloned() else {
                            self.screen.alert("Такого водителя нет в списке");
                            continue;
                        };
                        if let Some(details) = self.accept(&order_id, &bid).await {
                            self.close_modal(&poller);
                            self.finish_accepted(details);
                            return WindowExit::Finished;
                        }
                    }
                    Some(other) => debug!("Ignoring {:?} while waiting for drivers", other),
                    None => {
                        self.close_modal(&poller);
                        return WindowExit::Closed;
                    }
                },
            }
        }
    }

    async fn accept(&mut self, order_id: &OrderId, bid: &Bid) -> Option<OrderDetails> {
        info!("Accepting driver {} for order {}", bid.driver_id, order_id);
        self.screen.loader(Some("Подтверждение выбора..."));
        let result = self.api.accept_bid(order_id, bid.driver_id).await;
        self.screen.loader(None);

        match result {
            Ok(details) => Some(details.unwrap_or_else(|| details_from_bid(order_id, bid))),
            Err(e) => {
                warn!("Failed to accept driver {}: {}", bid.driver_id, e);
                self.screen.alert(&format!("Ошибка при выборе водителя: {}", e));
                None
            }
        }
    }

    fn finish_accepted(&mut self, details: OrderDetails) {
        if let Err(e) = self.transition(LifecycleEvent::BidAccepted(details.clone())) {
            warn!("Accepted order not applied: {}", e);
            return;
        }

        let (from, to, price, distance) = match &self.submitted {
            Some(order) => (
                order.draft.pickup.text.clone(),
                order.draft.dropoff.text.clone(),
                display_or(&order.price_display, || format!("{} ₽", order.draft.estimate.price)),
                display_or(&order.distance_display, || {
                    format!("{} км", order.draft.estimate.distance_km)
                }),
            ),
            None => {
                let input = self.input();
                (
                    input.pickup_text().to_string(),
                    input.dropoff_text().to_string(),
                    input.price_display.clone(),
                    input.distance_display.clone(),
                )
            }
        };

        let entry = HistoryEntry {
            id: format!("order_{}", Utc::now().timestamp_millis()),
            date: Local::now().format("%d.%m.%Y, %H:%M").to_string(),
            from,
            to,
            price: price.clone(),
            distance: distance.replace(" км", ""),
            status: "completed".to_string(),
            driver: details.driver_name.clone(),
            order_id: details.order_id.clone(),
        };
        match self.store.push_history(entry) {
            Ok(len) => debug!("Order history now has {} entries", len),
            Err(e) => warn!("Failed to save order {} to history: {:#}", details.order_id, e),
        }

        let summary = AcceptedSummary::new(&details, &price, &distance);
        self.screen.result(&accepted_view(&summary));
    }

    async fn expire(&mut self, order_id: &OrderId) {
        if let Err(e) = self.transition(LifecycleEvent::WindowExpired) {
            debug!("Expiry ignored: {}", e);
            return;
        }
        info!("No driver chosen for order {} in time, cancelling", order_id);

        if self.config.cancel_on_expiry {
            if let Err(e) = self.api.cancel_order(order_id, CANCEL_REASON_TIMEOUT).await {
                warn!("Failed to cancel order {} on the server: {}", order_id, e);
            }
        }
        if let Err(e) = self.store.clear_active_order() {
            warn!("Failed to clear active order: {:#}", e);
        }

        self.screen.result(&cancelled_view());
    }
}

impl<S: Screen> Drop for OrderSession<S> {
    fn drop(&mut self) {
        self.form_task.abort();
        for lookup in [self.pickup_lookup.take(), self.dropoff_lookup.take()].into_iter().flatten() {
            lookup.abort();
        }
    }
}

/// Stand-in when the backend accepts without echoing order details.
fn details_from_bid(order_id: &OrderId, bid: &Bid) -> OrderDetails {
    OrderDetails {
        driver_name: bid
            .driver_name
            .clone()
            .unwrap_or_else(|| format!("Водитель #{}", bid.driver_id)),
        estimated_arrival: Scalar::Text(format!("{} мин", bid.arrival_minutes)),
        price: None,
        order_id: order_id.clone(),
    }
}

fn display_or(display: &str, fallback: impl FnOnce() -> String) -> String {
    if display.trim().is_empty() {
        fallback()
    } else {
        display.to_string()
    }
}
