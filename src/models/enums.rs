use crate::db::DatabaseError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The string form is also the JSON representation.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

str_enum!(Gender {
    Male => "M",
    Female => "F",
    Other => "O",
});

str_enum!(VisitType {
    Consultation => "consultation",
    Emergency => "emergency",
    FollowUp => "follow_up",
    Hospitalization => "hospitalization",
});

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl AppointmentStatus {
    /// Intended lifecycle: scheduled → in_progress → completed, with
    /// cancelled reachable from scheduled or in_progress.
    ///
    /// Status writes do not consult this; any value may be stored.
    pub fn can_transition_to(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;
        matches!(
            (self, next),
            (Scheduled, InProgress)
                | (InProgress, Completed)
                | (Scheduled, Cancelled)
                | (InProgress, Cancelled)
        )
    }
}

impl Default for AppointmentStatus {
    fn default() -> Self {
        AppointmentStatus::Scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn visit_type_round_trip() {
        for (variant, s) in [
            (VisitType::Consultation, "consultation"),
            (VisitType::Emergency, "emergency"),
            (VisitType::FollowUp, "follow_up"),
            (VisitType::Hospitalization, "hospitalization"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(VisitType::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn gender_uses_single_letter_codes() {
        assert_eq!(Gender::Female.as_str(), "F");
        assert_eq!(Gender::from_str("O").unwrap(), Gender::Other);
    }

    #[test]
    fn status_serializes_as_snake_case() {
        let json = serde_json::to_string(&AppointmentStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let parsed: AppointmentStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, AppointmentStatus::Cancelled);
    }

    #[test]
    fn unknown_value_fails_to_deserialize() {
        assert!(serde_json::from_str::<VisitType>("\"checkup\"").is_err());
    }

    #[test]
    fn intended_transitions() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));
        assert!(Scheduled.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Scheduled));
        assert!(!Cancelled.can_transition_to(InProgress));
        assert_eq!(AppointmentStatus::default(), Scheduled);
    }

    #[test]
    fn invalid_enum_returns_error() {
        assert!(VisitType::from_str("invalid").is_err());
        assert!(AppointmentStatus::from_str("").is_err());
        assert!(Gender::from_str("m").is_err());
    }
}
