use metrics::gauge;
use tokio::sync::mpsc;

/// Unbounded stage-to-stage queue whose depth is exported as
/// `pipeline_queue_depth{stage}`.
pub fn monitored<T>(stage: &'static str) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    gauge!("pipeline_queue_depth", "stage" => stage).set(0.0);
    (QueueSender { tx, stage }, QueueReceiver { rx, stage })
}

pub struct QueueSender<T> {
    tx: mpsc::UnboundedSender<T>,
    stage: &'static str,
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            stage: self.stage,
        }
    }
}

impl<T> QueueSender<T> {
    pub fn send(&self, item: T) -> Result<(), mpsc::error::SendError<T>> {
        self.tx.send(item)?;
        gauge!("pipeline_queue_depth", "stage" => self.stage).increment(1.0);
        Ok(())
    }
}

pub struct QueueReceiver<T> {
    rx: mpsc::UnboundedReceiver<T>,
    stage: &'static str,
}

impl<T> QueueReceiver<T> {
    pub async fn recv(&mut self) -> Option<T> {
        let item = self.rx.recv().await?;
        gauge!("pipeline_queue_depth", "stage" => self.stage).decrement(1.0);
        Some(item)
    }
}
