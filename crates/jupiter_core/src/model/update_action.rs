//! Two-variant partial-update intent.

/// Either change a field to a value or leave it alone.
///
/// Keeps "set to `None`" distinct from "not touched" for optional fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum UpdateAction<T> {
    #[default]
    DoNotUpdate,
    ChangeTo(T),
}

impl<T> UpdateAction<T> {
    pub fn change_to(value: T) -> Self {
        Self::ChangeTo(value)
    }

    pub fn should_change(&self) -> bool {
        matches!(self, Self::ChangeTo(_))
    }

    /// Returns the new value, or `current` when untouched.
    pub fn or_else(self, current: T) -> T {
        match self {
            Self::DoNotUpdate => current,
            Self::ChangeTo(value) => value,
        }
    }

    pub fn as_ref(&self) -> UpdateAction<&T> {
        match self {
            Self::DoNotUpdate => UpdateAction::DoNotUpdate,
            Self::ChangeTo(value) => UpdateAction::ChangeTo(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> UpdateAction<U> {
        match self {
            Self::DoNotUpdate => UpdateAction::DoNotUpdate,
            Self::ChangeTo(value) => UpdateAction::ChangeTo(f(value)),
        }
    }
}

impl<T: PartialEq> UpdateAction<T> {
    /// Whether applying this action would produce a value different from `current`.
    pub fn differs_from(&self, current: &T) -> bool {
        match self {
            Self::DoNotUpdate => false,
            Self::ChangeTo(value) => value != current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::UpdateAction;

    #[test]
    fn leave_alone_keeps_current_value() {
        let action: UpdateAction<Option<u32>> = UpdateAction::default();
        assert!(!action.should_change());
        assert_eq!(action.or_else(Some(3)), Some(3));
    }

    #[test]
    fn change_to_none_is_distinct_from_leave_alone() {
        let action = UpdateAction::change_to(None::<u32>);
        assert!(action.should_change());
        assert!(action.differs_from(&Some(3)));
        assert_eq!(action.or_else(Some(3)), None);
    }
}
