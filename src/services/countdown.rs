use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Safe,
    Warn,
    Danger,
}

/// Time remaining until a due date, as shown next to each assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    pub millis_left: i64,
    pub days_left: i64,
    pub urgency: Urgency,
    pub label: String,
}

impl Countdown {
    pub fn between(due: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let millis_left = (due - now).num_milliseconds();
        let days_left = ceil_div(millis_left, MILLIS_PER_DAY);

        let urgency = if days_left < 0 {
            Urgency::Danger
        } else if days_left <= 3 {
            Urgency::Warn
        } else {
            Urgency::Safe
        };

        let label = if millis_left < 0 {
            "Overdue".to_string()
        } else if days_left > 1 {
            format!("{} days left", days_left)
        } else if millis_left < MILLIS_PER_DAY {
            let hours = millis_left / (60 * 60 * 1000);
            let minutes = (millis_left % (60 * 60 * 1000)) / (60 * 1000);
            let seconds = (millis_left % (60 * 1000)) / 1000;
            format!("{}h {}m {}s left", hours, minutes, seconds)
        } else {
            "Due today".to_string()
        };

        Self {
            millis_left,
            days_left,
            urgency,
            label,
        }
    }

    pub fn is_overdue(&self) -> bool {
        self.millis_left < 0
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    let quotient = value / divisor;
    if value % divisor > 0 { quotient + 1 } else { quotient }
}

/// Periodic callback owned by a view. Dropping the ticker aborts its task.
pub struct CountdownTicker<F> {
    period: Duration,
    make_tick: F,
    handle: Option<JoinHandle<()>>,
}

impl<F, Fut> CountdownTicker<F>
where
    F: Fn() -> Fut + Clone + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    pub fn start(period: Duration, make_tick: F) -> Self {
        let mut ticker = Self {
            period,
            make_tick,
            handle: None,
        };
        ticker.restart();
        ticker
    }

    pub fn restart(&mut self) {
        self.stop();

        let period = self.period;
        let make_tick = self.make_tick.clone();
        debug!("starting countdown ticker (period: {:?})", period);

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately; skip it so the first
            // callback lands one period after start.
            interval.tick().await;
            loop {
                interval.tick().await;
                make_tick().await;
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl<F> Drop for CountdownTicker<F> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
