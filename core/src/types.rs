//! Shared primitive types used across the holder service.

use serde::{Deserialize, Serialize};

/// Opaque, immutable holder identifier (UUID v4 text).
pub type HolderId = String;

/// Storage format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format for created/updated timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The enumerated policy statuses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PolicyStatus {
    Activo,
    Suspendido,
    Vencido,
    Cancelado,
    Pendiente,
    Inactivo,
}

impl PolicyStatus {
    pub const ALL: [PolicyStatus; 6] = [
        Self::Activo,
        Self::Suspendido,
        Self::Vencido,
        Self::Cancelado,
        Self::Pendiente,
        Self::Inactivo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activo => "Activo",
            Self::Suspendido => "Suspendido",
            Self::Vencido => "Vencido",
            Self::Cancelado => "Cancelado",
            Self::Pendiente => "Pendiente",
            Self::Inactivo => "Inactivo",
        }
    }

    /// Exact, case-sensitive parse; the stored values are capitalised Spanish.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

/// Gender buckets reported by the demographics aggregate.
/// Any other stored value is counted in neither bucket.
pub const GENDER_FEMALE: &str = "Femenino";
pub const GENDER_MALE: &str = "Masculino";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_label() {
        for status in PolicyStatus::ALL {
            assert_eq!(PolicyStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PolicyStatus::parse("activo"), None);
        assert_eq!(PolicyStatus::parse(""), None);
    }
}
