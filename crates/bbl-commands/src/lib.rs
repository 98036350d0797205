pub mod command;
pub mod destroy;
pub mod env_id;
pub mod error;
pub mod interrupt;
pub mod lb_args;
pub mod lbs;
pub mod leftovers;
pub mod managers;
pub mod patch;
pub mod plan;
pub mod printers;
pub mod prompt;
pub mod rotate;
pub mod ssh;
pub mod up;

pub use command::{run, Command};
pub use destroy::{Destroy, DestroyArgs};
pub use error::CommandError;
pub use interrupt::Interrupt;
pub use lb_args::{LbArgs, LbArgsHandler};
pub use lbs::{CreateLbs, DeleteLbs, DeleteLbsArgs, Lbs, LbsArgs};
pub use leftovers::{CleanupLeftovers, LeftoversArgs};
pub use managers::Managers;
pub use plan::{Plan, PlanArgs, PlanConfig};
pub use printers::{Field, Print, PrintEnv, ShellType};
pub use prompt::{FixedAnswer, Output, Prompter};
pub use rotate::{Rotate, RotateCa};
pub use ssh::{Ssh, SshArgs};
pub use up::Up;
