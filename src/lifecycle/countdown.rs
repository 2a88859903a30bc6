/// Seconds left in the bid window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Countdown {
    remaining: u32,
    expired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Running(String),
    /// Reported exactly once, on the tick that reaches zero.
    Expired,
    Finished,
}

impl Countdown {
    pub fn new(seconds: u32) -> Self {
        Self {
            remaining: seconds,
            expired: false,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn display(&self) -> String {
        format!("{:02}:{:02}", self.remaining / 60, self.remaining % 60)
    }

    pub fn tick(&mut self) -> Tick {
        if self.expired {
            return Tick::Finished;
        }

        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            Tick::Expired
        } else {
            Tick::Running(self.display())
        }
    }
}
