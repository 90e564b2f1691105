use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Declares a fieldless enum stored as a snake_case string column.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::Validation(format!(
                        concat!("invalid ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

string_enum! {
    pub enum Role {
        Admin => "admin",
        Lifter => "lifter",
    }
}

string_enum! {
    /// Capacity pool a lifter books against. Pools never borrow from each other.
    pub enum ExperienceLevel {
        Experienced => "experienced",
        Inexperienced => "inexperienced",
    }
}

string_enum! {
    pub enum AccountStatus {
        Active => "active",
        Frozen => "frozen",
    }
}

string_enum! {
    pub enum SlotStatus {
        Open => "open",
        Closed => "closed",
        Canceled => "canceled",
    }
}

string_enum! {
    /// Lifecycle of a booking. `Booked` is the only state with outgoing transitions.
    pub enum BookingStatus {
        Booked => "booked",
        CanceledByLifter => "canceled_by_lifter",
        CanceledByAdmin => "canceled_by_admin",
        NoShow => "no_show",
        Attended => "attended",
    }
}

impl BookingStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Booked)
    }

    /// Returns true if `self -> next` is a permitted transition.
    #[must_use]
    pub const fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(self, BookingStatus::Booked) && !matches!(next, BookingStatus::Booked)
    }
}
