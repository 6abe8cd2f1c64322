//! Bounded in-process queue of send requests

use crate::error::{Result, TemplgridError};
use crate::sender::request::EmailRequest;
use tokio::sync::mpsc;
use tracing::debug;

/// Producer side of the send queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EmailQueue {
    tx: mpsc::Sender<EmailRequest>,
}

impl EmailQueue {
    /// Create a queue holding at most `capacity` pending requests.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<EmailRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Enqueue without waiting; a full queue is reported to the caller.
    pub fn push(&self, request: EmailRequest) -> Result<()> {
        let name = request.template_name.clone();
        self.tx.try_send(request).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TemplgridError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => TemplgridError::QueueClosed,
        })?;
        debug!("Email {} queued", name);
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::request::SendGridMail;

    fn request(name: &str) -> EmailRequest {
        EmailRequest {
            template_name: name.to_string(),
            locale: String::new(),
            email_parameters: serde_json::Value::Null,
            send_grid_parameters: SendGridMail::default(),
        }
    }

    #[tokio::test]
    async fn test_push_until_full() {
        let (queue, mut rx) = EmailQueue::bounded(1);

        queue.push(request("A")).unwrap();
        assert!(matches!(queue.push(request("B")), Err(TemplgridError::QueueFull)));

        assert_eq!(rx.recv().await.unwrap().template_name, "A");
    }

    #[tokio::test]
    async fn test_push_after_close() {
        let (queue, rx) = EmailQueue::bounded(4);
        drop(rx);

        assert!(queue.is_closed());
        assert!(matches!(queue.push(request("A")), Err(TemplgridError::QueueClosed)));
    }
}
