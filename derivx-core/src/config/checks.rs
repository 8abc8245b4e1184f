use crate::error::ValidationError;

/// Accumulates invariant violations in the order they are checked.
#[derive(Debug, Default)]
pub(crate) struct Checks {
    errors: Vec<ValidationError>,
}

impl Checks {
    pub fn fail(&mut self, field: &'static str, reason: impl Into<String>) {
        self.errors.push(ValidationError::new(field, reason));
    }

    pub fn require(&mut self, ok: bool, field: &'static str, reason: impl FnOnce() -> String) {
        if !ok {
            self.fail(field, reason());
        }
    }

    /// Finite check; returns whether the value may be compared further.
    pub fn finite(&mut self, field: &'static str, value: f64) -> bool {
        let ok = value.is_finite();
        self.require(ok, field, || format!("must be finite, got {value}"));
        ok
    }

    pub fn non_negative(&mut self, field: &'static str, value: f64) {
        if self.finite(field, value) {
            self.require(value >= 0.0, field, || format!("must be >= 0, got {value}"));
        }
    }

    pub fn positive(&mut self, field: &'static str, value: f64) {
        if self.finite(field, value) {
            self.require(value > 0.0, field, || format!("must be > 0, got {value}"));
        }
    }

    /// Strictly ascending sequence of day/step indices.
    pub fn ascending(&mut self, field: &'static str, values: &[u32]) {
        if let Some(i) = values.windows(2).position(|w| w[0] >= w[1]) {
            self.fail(
                field,
                format!(
                    "must be strictly ascending, entry {} ({}) follows {}",
                    i + 1,
                    values[i + 1],
                    values[i]
                ),
            );
        }
    }

    pub fn into_vec(self) -> Vec<ValidationError> {
        self.errors
    }
}
