use crate::models::coin::Coin;
use crate::models::edit::CoinEdit;

/// Parse a numeric form input. Anything that is not a finite number counts as 0.
pub fn parse_amount(input: &str) -> f64 {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// How an edit applies to a coin, decided by whether it already has a target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditKind {
    /// No target yet: set the initial holding, and the target when it is positive.
    Initialize { target: Option<f64>, holding: f64 },
    /// Target already set: add to the holding.
    TopUp { delta: f64 },
    /// No target and no target input: leave the coin as is.
    Unchanged,
}

/// Applies savings-target edits to coins. Pure; persistence is the caller's job.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditService;

impl EditService {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, coin: &Coin, edit: &CoinEdit) -> EditKind {
        if coin.has_target() {
            return EditKind::TopUp {
                delta: parse_amount(&edit.amount),
            };
        }
        if !edit.supplies_target() {
            return EditKind::Unchanged;
        }
        let target = parse_amount(&edit.target);
        EditKind::Initialize {
            target: (target > 0.0).then_some(target),
            holding: parse_amount(&edit.amount),
        }
    }

    /// Return the coin as it should look after the edit.
    ///
    /// The first edit replaces progress with the supplied holding; later edits
    /// are additive. A first edit whose target is not positive still saves the
    /// holding but leaves the coin without a target. The target never changes
    /// once set. Holdings floor at 0, but may exceed the target.
    pub fn apply(&self, coin: &Coin, edit: &CoinEdit) -> Coin {
        let mut updated = coin.clone();
        match self.classify(coin, edit) {
            EditKind::Initialize { target, holding } => {
                updated.progress = Some(holding.max(0.0));
                if target.is_some() {
                    updated.desired_highest_number = target;
                }
            }
            EditKind::TopUp { delta } => {
                updated.progress = Some((coin.progress_or_zero() + delta).max(0.0));
            }
            EditKind::Unchanged => {}
        }
        updated
    }
}
