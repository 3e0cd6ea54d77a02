use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use buildpipe::errors::Result;
use buildpipe::graph::{ExecEvent, RunnerBackend};
use buildpipe::registry::TaskName;
use tokio::sync::mpsc;

/// A fake runner backend that:
/// - records which tasks were "run"
/// - immediately reports a successful completion for each dispatched task,
///   except for names listed as failing.
pub struct FakeRunner {
    events_tx: mpsc::Sender<ExecEvent>,
    dispatched: Arc<Mutex<Vec<TaskName>>>,
    failing: Vec<TaskName>,
}

impl FakeRunner {
    pub fn new(
        events_tx: mpsc::Sender<ExecEvent>,
        dispatched: Arc<Mutex<Vec<TaskName>>>,
    ) -> Self {
        Self {
            events_tx,
            dispatched,
            failing: Vec::new(),
        }
    }

    /// Make the given task report failure instead of success.
    pub fn failing(mut self, task: &str) -> Self {
        self.failing.push(task.to_string());
        self
    }
}

impl RunnerBackend for FakeRunner {
    fn dispatch(
        &mut self,
        tasks: Vec<TaskName>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.events_tx.clone();
        let dispatched = Arc::clone(&self.dispatched);
        let failing = self.failing.clone();

        Box::pin(async move {
            for task in tasks {
                {
                    let mut guard = dispatched.lock().unwrap();
                    guard.push(task.clone());
                }

                let result = if failing.contains(&task) {
                    Err(buildpipe::BuildpipeError::TaskFailed {
                        task: task.clone(),
                        source: anyhow::anyhow!("injected failure"),
                    })
                } else {
                    Ok(())
                };

                tx.send(ExecEvent::TaskFinished { task, result })
                    .await
                    .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}
