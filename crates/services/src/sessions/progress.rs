/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total_items: usize,
    pub current_index: usize,
    pub answered_requirements: usize,
    pub total_requirements: usize,
    pub remaining_seconds: u32,
    pub is_submitted: bool,
}

impl SessionProgress {
    /// Requirements that still have no recorded answer.
    #[must_use]
    pub fn unanswered_requirements(&self) -> usize {
        self.total_requirements
            .saturating_sub(self.answered_requirements)
    }
}
