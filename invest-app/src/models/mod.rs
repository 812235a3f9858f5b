//! Domain records and their enumerated states
//!
//! Every enum maps to the lowercase string stored in its `CHECK`-constrained
//! column and used on the wire.

/// Declare a string-backed enum with `as_str`, `FromStr` and `Display`
///
/// Defined ahead of the submodules so they see it in textual scope.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $($(#[$vmeta])* #[serde(rename = $value)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $value),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = invest_common::Error;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($value => Ok($name::$variant),)+
                    other => Err(invest_common::Error::InvalidInput(format!(
                        concat!("Unknown ", stringify!($name), ": {}"),
                        other
                    ))),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod approval;
pub mod document;
pub mod job;
pub mod notification;
pub mod request;
pub mod task;
pub mod template;
pub mod user;

pub use approval::{Approval, ApprovalStage, Decision};
pub use document::{AnalysisStatus, Document};
pub use job::{BackgroundJob, JobStatus, JobStep};
pub use notification::Notification;
pub use request::{InvestmentRequest, RequestStatus, RiskLevel};
pub use task::{Task, TaskStatus, TaskType};
pub use template::Template;
pub use user::{Role, User};
