use std::fmt;

/// # Unsubscribe
///
/// Handle returned by every `subscribe`/`on_*` call. Calling
/// [`Unsubscribe::unsubscribe`] removes the registration synchronously, before
/// the next notification cycle.
///
/// Dropping the handle does **not** unsubscribe: registrations live until
/// they are explicitly removed or their owner is destroyed.
pub struct Unsubscribe {
    remove: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    pub(crate) fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// A handle that removes nothing. Returned when a registration was refused.
    pub fn noop() -> Self {
        Self { remove: None }
    }

    /// Removes the registration.
    pub fn unsubscribe(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("active", &self.remove.is_some())
            .finish()
    }
}
