//! Read-only dashboards over reference tables and staged files.

mod imaging;
mod trial;

pub use imaging::{Diagnosis, ImagingView};
pub use trial::{TrialDashboard, TrialOptions, TrialSection, ALL_EVENT_TYPES, RACE_PARAMETER};
