use serde::{Serialize, Deserialize, Serializer};
use std::fmt;

/// Wrapper for customer contact data (phone, email) that keeps the raw value out of
/// `Debug`/`Display` output. Only the last two characters survive, which is enough to
/// correlate log lines with a support ticket.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Masked<T>(pub T);

fn write_masked(raw: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 4 {
        return write!(f, "********");
    }
    let tail: String = chars[chars.len() - 2..].iter().collect();
    write!(f, "********{}", tail)
}

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_masked(&self.0.to_string(), f)
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_masked(&self.0.to_string(), f)
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // Downstream consumers (SMS, email workers) need the real value; masking
        // applies to formatting only.
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}
