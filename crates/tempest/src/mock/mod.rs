//! Deterministic in-process driver.
//!
//! Serves a fixed [`MockSite`] instead of a real browser so the run
//! controller, locators and assertions can be exercised without Chromium.
//! Failures are injected with [`MockFaults`]; [`MockStats`] records every
//! call in order for lifecycle assertions.

mod driver;
mod site;

pub use driver::{MockDriver, MockFaults, MockStats};
pub use site::{ClickEffect, MockElement, MockPageSpec, MockSite};
