//! Reactive event loop around a [`ThrustEngine`].

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::allocator::Twist;
use crate::engine::ThrustEngine;
use crate::hal::CommandSink;
use crate::motor_matrix::{Parameter, ParameterResult};

/// Input to the node.
#[derive(Debug)]
pub enum Event {
    Twist(Twist),
    /// Parameter batch, answered on `reply`
    Parameters {
        parameters: Vec<Parameter>,
        reply: oneshot::Sender<ParameterResult>,
    },
    Shutdown,
}

/// What the node did before it stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub twists: u64,
    pub failures: u64,
    pub parameter_updates: u64,
}

/// Process events one at a time until `Shutdown` arrives or every sender is
/// dropped, then shut the engine down.
pub async fn run<S>(mut engine: ThrustEngine<S>, mut events: mpsc::Receiver<Event>) -> Summary
where
    S: CommandSink,
{
    let mut summary = Summary::default();

    while let Some(event) = events.recv().await {
        match event {
            Event::Twist(twist) => {
                summary.twists += 1;
                if engine.process_twist(&twist).is_err() {
                    summary.failures += 1;
                }
            }
            Event::Parameters { parameters, reply } => {
                summary.parameter_updates += 1;
                let result = engine.set_parameters(&parameters);
                if reply.send(result).is_err() {
                    debug!("parameter reply dropped");
                }
            }
            Event::Shutdown => break,
        }
    }

    info!(
        twists = summary.twists,
        failures = summary.failures,
        parameter_updates = summary.parameter_updates,
        "node stopped"
    );
    engine.shutdown();
    summary
}
