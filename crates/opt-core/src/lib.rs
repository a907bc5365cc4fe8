pub mod cancellation;
pub mod config;
pub mod event;
pub mod event_bus;
pub mod objective;
pub mod space;

pub use cancellation::CancellationRegistry;
pub use config::{EngineConfig, SamplerChoice};
pub use event::SessionEvent;
pub use event_bus::EventBus;
pub use objective::{Evaluation, MetricTransform, ObjectiveBuilder};
pub use space::{ConstraintHook, Space, SpaceError};
