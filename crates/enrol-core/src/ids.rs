//! Strongly typed identifiers
//!
//! Every table in the target system and in Connect is keyed by plain integers.
//! Wrapping them keeps a course id from being passed where a user id belongs.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw integer value
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Course in the target system
    CourseId
);
id_type!(
    /// User account in the target system
    UserId
);
id_type!(
    /// Role definition in the target system
    RoleId
);
id_type!(
    /// Enrol instance (one configured Connect link on a course)
    InstanceId
);
id_type!(
    /// User record in Connect
    ExternalUserId
);
id_type!(
    /// Course identifier in Connect
    ///
    /// `CourseKey(0)` marks a default instance, which selects every Connect
    /// course attached to the instance's course.
    CourseKey
);

impl CourseKey {
    /// The default/wildcard key
    pub const DEFAULT: CourseKey = CourseKey(0);

    /// Whether this is the default/wildcard key
    pub fn is_default(self) -> bool {
        self.0 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&CourseId(42)).unwrap();
        assert_eq!(json, "42");

        let id: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(id, UserId(7));
    }

    #[test]
    fn default_course_key() {
        assert!(CourseKey::DEFAULT.is_default());
        assert!(!CourseKey(12).is_default());
    }
}
