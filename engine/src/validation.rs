//! Accumulated validation results.
//!
//! A `Validation<T>` is either the parsed value or a non-empty, ordered list
//! of human readable messages. It is a plain `Result`, so `?`, `map` and
//! iterator collection all work as usual; the only extra guarantee lives in
//! `ValidationErrors`, which cannot be built empty.

use std::fmt;

/// Either a valid value or every problem found while producing it.
pub type Validation<T> = Result<T, ValidationErrors>;

/// Ordered, non-empty list of validation messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    /// A list holding exactly one message.
    pub fn single(message: impl Into<String>) -> Self {
        ValidationErrors(vec![message.into()])
    }

    /// Append every message of `other` after the ones already held.
    pub fn merge(mut self, other: ValidationErrors) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Suffix every message with the body row it came from.
    pub fn on_row(self, row_number: usize) -> Self {
        ValidationErrors(
            self.0
                .into_iter()
                .map(|message| format!("{}, on Row number {}", message, row_number))
                .collect(),
        )
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no message is held. False for any constructed value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_messages(self) -> Vec<String> {
        self.0
    }
}

/// Combine two independent checks, keeping the errors of both.
///
/// Errors from `a` come first.
pub fn zip<A, B>(a: Validation<A>, b: Validation<B>) -> Validation<(A, B)> {
    match (a, b) {
        (Ok(a), Ok(b)) => Ok((a, b)),
        (Err(errors), Ok(_)) | (Ok(_), Err(errors)) => Err(errors),
        (Err(first), Err(second)) => Err(first.merge(second)),
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("; "))
    }
}
