use crate::form::validation::FormStatus;
use crate::render::views::{BidModalView, ResultView};

/// Everything the order flow shows the rider. Implementations only display;
/// none of these calls feeds back into the lifecycle.
pub trait Screen: Send {
    fn form_status(&mut self, status: &FormStatus);

    /// `None` hides the loader.
    fn loader(&mut self, text: Option<&str>);

    /// Blocking, user-facing error.
    fn alert(&mut self, message: &str);

    fn bid_modal(&mut self, view: &BidModalView);

    fn countdown(&mut self, remaining_secs: u32, display: &str);

    fn close_modal(&mut self);

    /// Replace the whole screen with a final view.
    fn result(&mut self, view: &ResultView);
}
