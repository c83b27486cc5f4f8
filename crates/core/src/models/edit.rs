/// Raw numeric inputs from the edit form, exactly as typed.
///
/// Parsing happens in `services::edit_service`; anything that does not parse
/// counts as 0.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinEdit {
    /// Target holding. Only read when the coin has no target yet.
    pub target: String,

    /// Initial holding (first edit) or top-up delta (later edits).
    pub amount: String,
}

impl CoinEdit {
    /// First-time setup: a target plus the holding already saved.
    pub fn initial(target: impl Into<String>, holding: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            amount: holding.into(),
        }
    }

    /// Add `delta` to the current holding.
    pub fn top_up(delta: impl Into<String>) -> Self {
        Self {
            target: String::new(),
            amount: delta.into(),
        }
    }

    /// Whether the user typed anything into the target field.
    pub fn supplies_target(&self) -> bool {
        !self.target.trim().is_empty()
    }
}
