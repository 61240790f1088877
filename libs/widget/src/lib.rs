#![forbid(unsafe_code)]

pub mod config;
pub mod dom;
pub mod error;
pub mod global;
pub mod memory;
pub mod scheduler;
pub mod style;
pub mod widget;

pub use config::{Position, UnknownPosition, WidgetConfig};
pub use dom::{HostPage, NodeId, PageEvent, ReadyState, SharedPage};
pub use error::WidgetError;
pub use memory::{MemoryNode, MemoryPage};
pub use scheduler::{ManualScheduler, ScheduledTask, Scheduler, SharedScheduler, TokioScheduler};
pub use style::{CLOSE_ANIMATION, render_stylesheet};
pub use widget::{MountState, Widget, WidgetHandle, generate_instance_id};
