//! Queues: settings, construction, ordering disciplines, distribution,
//! flow control and depth alerts.

pub mod distributor;
pub mod factory;
pub mod flow_limit;
pub mod messages;
pub mod observer;
#[allow(clippy::module_inception)]
pub mod queue;
pub mod registry;
pub mod settings;
pub mod threshold;

pub use distributor::{DistributorKind, MessageDistributor, MessageGroupManager};
pub use factory::QueueFactory;
pub use flow_limit::{FlowDefaults, QueueFlowLimit};
pub use messages::{ContainerKind, MessageContainer};
pub use observer::QueueObserver;
pub use queue::{Queue, QueueKind};
pub use registry::QueueRegistry;
pub use settings::{QueueSettings, SettingsError};
pub use threshold::ThresholdAlerts;
