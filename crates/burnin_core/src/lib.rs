//! Burn-in counting and tier advancement
//!
//! Each device writes one file per completed unit into its inbox. A scan
//! enumerates every inbox once, splits the sorted modification times at the
//! previous scan's start with a binary search, adds the new units to the
//! device's count and raises an approval request once the count reaches the
//! threshold for the next tier. The tier only changes when a person resolves
//! that request.
//!
//! # Usage
//!
//! ```rust,ignore
//! use burnin_core::{ApprovalService, Config, Decision, Scanner};
//!
//! let config = Config::load("config.json".as_ref())?;
//! let report = Scanner::from_config(config.clone())?.run_scan()?;
//!
//! let service = ApprovalService::new(&config);
//! for request in service.list_pending()? {
//!     service.resolve(&request.id, Decision::Approve, "alice")?;
//! }
//! ```

pub mod approval;
pub mod collector;
pub mod config;
pub mod cutoff;
pub mod device;
pub mod engine;
mod error;
pub mod filter;
pub mod lock;
pub mod notifier;
pub mod report;
pub mod scanner;
pub mod service;
pub mod store;
pub mod tier;
pub mod workflow;

pub use approval::{ApprovalRecords, ApprovalRequest, Decision, RequestStatus};
pub use collector::{collect_timestamps, FileStamp, InboxListing, InboxStatus};
pub use config::{Config, DeviceConfig, RunMode};
pub use cutoff::{count, count_window, CutoffCounts, WindowCounts};
pub use device::{DeviceApprovalStatus, DeviceState, ScanState};
pub use engine::{Advancement, AdvancementEngine, Hold};
pub use error::{BurninError, Result};
pub use filter::FileFilter;
pub use notifier::{notifier_for, LogNotifier, Notifier, OutboundNotification, OutboxNotifier};
pub use report::{DeviceProgress, DeviceScanResult, DeviceSummary, ScanReport, StatusSnapshot};
pub use scanner::Scanner;
pub use service::ApprovalService;
pub use store::{JsonStore, StorePaths};
pub use tier::{Tier, TierLadder, TierRequirements, TierStep};
pub use workflow::{ApprovalWorkflow, BulkFailure, BulkOutcome, WorkflowSettings};

pub use burnin_ids::ApprovalId;
