//! Helpers for printing lists of items inside of diagnostic messages.
use std::fmt;

/// Displays a list of items as an English enumeration, each item wrapped in
/// backticks: `a`, `a` or `b`, `a`, `b` or `c`.
pub struct SequenceDisplay<'a, T> {
    items: &'a [T],
    conjunction: &'static str,
}

impl<'a, T> SequenceDisplay<'a, T> {
    /// The items are alternatives of one another.
    pub fn either(items: &'a [T]) -> Self {
        Self { items, conjunction: "or" }
    }

    /// The items are all required.
    pub fn all(items: &'a [T]) -> Self {
        Self { items, conjunction: "and" }
    }
}

impl<T: fmt::Display> fmt::Display for SequenceDisplay<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.items {
            [] => Ok(()),
            [only] => write!(f, "`{only}`"),
            [init @ .., last] => {
                for (index, item) in init.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "`{item}`")?;
                }
                write!(f, " {} `{last}`", self.conjunction)
            }
        }
    }
}
