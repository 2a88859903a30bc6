use tokio::sync::watch;
use tokio::time::{self, Instant};
use tracing::debug;
use crate::config::FormConfig;
use crate::form::validation::{evaluate, FormInput, FormStatus};

/// Keep `status` in sync with `inputs`: once shortly after start, after
/// every burst of input changes settles, and on a fixed heartbeat.
/// Returns when the input side is dropped or nobody watches the status.
pub async fn run_form_controller(
    config: FormConfig,
    mut inputs: watch::Receiver<FormInput>,
    status: watch::Sender<FormStatus>,
) {
    time::sleep(config.initial_check()).await;
    publish(&inputs, &status);

    let mut heartbeat = time::interval_at(
        Instant::now() + config.heartbeat(),
        config.heartbeat(),
    );
    let mut pending: Option<Instant> = None;

    loop {
        if status.is_closed() {
            break;
        }

        tokio::select! {
            changed = inputs.changed() => {
                if changed.is_err() {
                    break;
                }
                pending = Some(Instant::now() + config.debounce());
            }
            _ = time::sleep_until(pending.unwrap_or_else(Instant::now)), if pending.is_some() => {
                pending = None;
                publish(&inputs, &status);
            }
            _ = heartbeat.tick() => {
                publish(&inputs, &status);
            }
        }
    }

    debug!("Form controller stopped");
}

fn publish(inputs: &watch::Receiver<FormInput>, status: &watch::Sender<FormStatus>) {
    let next = evaluate(&inputs.borrow());
    status.send_if_modified(|current| {
        if *current == next {
            return false;
        }
        debug!(enabled = next.submit_enabled, "Form status changed");
        *current = next;
        true
    });
}
