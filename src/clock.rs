use crate::protocol::Side;

/// Lazy two-sided countdown clock. No wall-clock timer runs anywhere;
/// elapsed time folds into the active side only when state is read or
/// mutated, so timeout is observed rather than triggered. All operations
/// take an explicit `now_ms` (epoch milliseconds), which keeps tests
/// deterministic and the clock free of any ambient time source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChessClock {
    white_ms: i64,
    black_ms: i64,
    active_side: Option<Side>,
    last_tick_at: Option<i64>,
}

impl ChessClock {
    /// A stopped clock with the given per-side budget.
    pub fn new(budget_ms: i64) -> Self {
        Self {
            white_ms: budget_ms,
            black_ms: budget_ms,
            active_side: None,
            last_tick_at: None,
        }
    }

    /// Arm the clock at game start: white to move, ticking from `now_ms`.
    pub fn start(&mut self, now_ms: i64) {
        self.active_side = Some(Side::White);
        self.last_tick_at = Some(now_ms);
    }

    /// Fold elapsed time into the active side, flooring at zero. Idempotent
    /// for repeated calls with non-decreasing `now_ms`; a clock skew that
    /// moves `now_ms` backwards folds zero.
    pub fn sample(&mut self, now_ms: i64) {
        let (Some(side), Some(last)) = (self.active_side, self.last_tick_at) else {
            return;
        };
        let elapsed = (now_ms - last).max(0);
        let counter = match side {
            Side::White => &mut self.white_ms,
            Side::Black => &mut self.black_ms,
        };
        *counter = (*counter - elapsed).max(0);
        self.last_tick_at = Some(now_ms);
    }

    /// Fold elapsed time, then hand the clock to the other side. Applied
    /// atomically with a successful move.
    pub fn switch(&mut self, now_ms: i64) {
        self.sample(now_ms);
        if let Some(side) = self.active_side {
            self.active_side = Some(side.opposite());
        }
    }

    /// Stop the clock permanently; no further sampling mutates it.
    pub fn freeze(&mut self) {
        self.active_side = None;
        self.last_tick_at = None;
    }

    pub fn remaining(&self, side: Side) -> i64 {
        match side {
            Side::White => self.white_ms,
            Side::Black => self.black_ms,
        }
    }

    pub fn active_side(&self) -> Option<Side> {
        self.active_side
    }

    /// The side whose budget is exhausted, white checked first (matching the
    /// termination precedence).
    pub fn expired_side(&self) -> Option<Side> {
        if self.white_ms <= 0 {
            Some(Side::White)
        } else if self.black_ms <= 0 {
            Some(Side::Black)
        } else {
            None
        }
    }
}
