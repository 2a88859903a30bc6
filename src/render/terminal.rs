use std::io::{self, Write};
use tracing::warn;
use crate::form::validation::{FormStatus, Tone};
use crate::render::screen::Screen;
use crate::render::views::{
    BidBoard, BidModalView, DriverCard, ResultKind, ResultView, POLL_ERROR_NOTICE,
    WAITING_FOR_DRIVERS,
};
use crate::storage::types::HistoryEntry;

/// Plain-text rendering onto any writer (stdout in the binary).
pub struct TerminalScreen<W: Write + Send> {
    out: W,
}

impl TerminalScreen<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> TerminalScreen<W> {
    #[cfg(test)]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn print_history(&mut self, history: &[HistoryEntry]) {
        let text = format_history(history);
        self.write(&text);
    }

    pub fn print_line(&mut self, line: &str) {
        self.write(&format!("{}\n", line));
    }

    fn write(&mut self, text: &str) {
        if let Err(e) = self.out.write_all(text.as_bytes()).and_then(|_| self.out.flush()) {
            warn!("Failed to write to terminal: {}", e);
        }
    }
}

impl<W: Write + Send> Screen for TerminalScreen<W> {
    fn form_status(&mut self, status: &FormStatus) {
        let mut text = String::new();
        if let Some(message) = &status.message {
            let marker = match message.tone {
                Tone::Success => "✔",
                Tone::Error => "✖",
            };
            text.push_str(&format!("{} {}\n", marker, message.text));
        }
        text.push_str(if status.submit_enabled {
            "[ЗАКАЗАТЬ] доступно: введите `order`\n"
        } else {
            "[ЗАКАЗАТЬ] недоступно\n"
        });
        self.write(&text);
    }

    fn loader(&mut self, text: Option<&str>) {
        if let Some(text) = text {
            self.write(&format!("… {}\n", text));
        }
    }

    fn alert(&mut self, message: &str) {
        self.write(&format!("⚠ {}\n", message));
    }

    fn bid_modal(&mut self, view: &BidModalView) {
        let text = format_bid_modal(view);
        self.write(&text);
    }

    fn countdown(&mut self, remaining_secs: u32, display: &str) {
        if remaining_secs % 30 == 0 || remaining_secs <= 10 {
            self.write(&format!("⏱ {}\n", display));
        }
    }

    fn close_modal(&mut self) {
        self.write("Окно выбора водителя закрыто\n");
    }

    fn result(&mut self, view: &ResultView) {
        let text = format_result(view);
        self.write(&text);
    }
}

pub fn format_bid_modal(view: &BidModalView) -> String {
    let mut text = format!(
        "\n=== Заказ #{} · выбор водителя · {} ===\n",
        view.order_id, view.timer
    );

    match &view.board {
        BidBoard::Waiting => text.push_str(&format!("  {}\n", WAITING_FOR_DRIVERS)),
        BidBoard::PollError => text.push_str(&format!("  ⚠ {}\n", POLL_ERROR_NOTICE)),
        BidBoard::Drivers(cards) => {
            for (index, card) in cards.iter().enumerate() {
                text.push_str(&format_card(index + 1, card));
            }
            text.push_str("  Выбрать: `pick <номер>`\n");
        }
    }

    text
}

fn format_card(number: usize, card: &DriverCard) -> String {
    let mut line = format!(
        "  [{}] ({}) {} | {} | {}",
        number, card.initial, card.name, card.car, card.arrival
    );
    for badge in &card.badges {
        line.push_str(" | ");
        line.push_str(badge);
    }
    line.push('\n');
    line
}

pub fn format_result(view: &ResultView) -> String {
    let icon = match view.kind {
        ResultKind::Accepted => "✔",
        ResultKind::Cancelled => "✖",
    };

    let mut text = format!("\n{} {}\n{}\n", icon, view.title, view.message);
    for (label, value) in &view.fields {
        text.push_str(&format!("  {}: {}\n", label, value));
    }
    text.push_str(&format!("\n[{}] нажмите Enter\n", view.action));
    text
}

pub fn format_history(history: &[HistoryEntry]) -> String {
    if history.is_empty() {
        return "История заказов пуста\n".to_string();
    }

    history
        .iter()
        .map(|entry| {
            format!(
                "{}  #{}  {} → {}  {}  {} км  {}\n",
                entry.date, entry.order_id, entry.from, entry.to, entry.price, entry.distance,
                entry.driver
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::mock::sample_bid;
    use crate::render::views::cancelled_view;

    #[test]
    fn test_bid_modal_lists_drivers() {
        let view = BidModalView {
            order_id: "42".to_string(),
            timer: "01:58".to_string(),
            board: BidBoard::from_bids(&[sample_bid()]),
        };
        let text = format_bid_modal(&view);

        assert!(text.contains("Заказ #42"));
        assert!(text.contains("01:58"));
        assert!(text.contains("[1] (I) Ivan | Toyota • A123 | Прибытие: 4 мин"));
    }

    #[test]
    fn test_terminal_screen_writes_result() {
        let mut screen = TerminalScreen::new(Vec::new());
        screen.result(&cancelled_view());
        screen.countdown(45, "00:45");
        screen.countdown(5, "00:05");

        let out = String::from_utf8(screen.into_inner()).unwrap();
        assert!(out.contains("✖ Заказ отменен"));
        assert!(out.contains("[СОЗДАТЬ НОВЫЙ ЗАКАЗ]"));
        assert!(!out.contains("00:45"));
        assert!(out.contains("00:05"));
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(format_history(&[]), "История заказов пуста\n");
    }
}
