use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::output::ThrusterCommand;

pub mod esc;
pub use esc::EscBank;

/// Destination for thruster commands.
pub trait CommandSink {
    /// Publish one command for all thrusters.
    fn publish(&mut self, command: &ThrusterCommand);
}

impl<T> CommandSink for &mut T
where
    T: CommandSink + ?Sized,
{
    fn publish(&mut self, command: &ThrusterCommand) {
        (&mut **self).publish(command)
    }
}

/// Records every command, mostly for tests.
impl CommandSink for Vec<ThrusterCommand> {
    fn publish(&mut self, command: &ThrusterCommand) {
        self.push(*command);
    }
}

impl CommandSink for UnboundedSender<ThrusterCommand> {
    fn publish(&mut self, command: &ThrusterCommand) {
        if self.send(*command).is_err() {
            debug!("command receiver dropped");
        }
    }
}
