pub mod command_runner;
pub mod known_hosts;

pub use command_runner::{CommandRunner, CommandRunnerError, ExecutionConfig, ExecutionOutput};
