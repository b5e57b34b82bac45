/// Threshold test applied to an indicator value, optionally against the
/// value on the preceding row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Condition {
    Above(f64),
    Below(f64),
    CrossAbove(f64),
    CrossBelow(f64),
}

impl Condition {
    /// Whether this condition needs the previous row's value to be evaluated.
    pub fn is_edge(&self) -> bool {
        matches!(self, Self::CrossAbove(_) | Self::CrossBelow(_))
    }
}

/// Evaluate `condition` against the current (and optionally previous) value.
///
/// Comparisons are strict. Cross conditions fire only on the row where the
/// value moves through the threshold and never without a previous value.
pub fn is_triggered(condition: &Condition, current: f64, previous: Option<f64>) -> bool {
    match condition {
        Condition::Above(threshold) => current > *threshold,
        Condition::Below(threshold) => current < *threshold,
        Condition::CrossAbove(threshold) => {
            previous.is_some_and(|prev| prev <= *threshold) && current > *threshold
        }
        Condition::CrossBelow(threshold) => {
            previous.is_some_and(|prev| prev >= *threshold) && current < *threshold
        }
    }
}
