//! Delivery of queued requests through the SendGrid mail/send endpoint

use crate::error::{Result, TemplgridError};
use crate::sender::request::{EmailRequest, SendGridMail};
use crate::templates::TemplateRegistry;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &SendGridMail) -> Result<()>;
}

/// SendGrid v3 mail/send client
pub struct SendGridMailer {
    host: String,
    api_key: String,
    client: reqwest::Client,
}

impl SendGridMailer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            host: crate::sync::sendgrid::DEFAULT_HOST.to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MailSender for SendGridMailer {
    async fn send(&self, mail: &SendGridMail) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/v3/mail/send", self.host))
            .bearer_auth(&self.api_key)
            .json(mail)
            .send()
            .await?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(TemplgridError::RemoteCall {
                status: status.as_u16(),
                body,
            });
        }

        debug!("SendGrid accepted mail with status {}", status);
        Ok(())
    }
}

/// Renders queued requests and hands them to a [`MailSender`].
pub struct SendWorker {
    registry: Arc<TemplateRegistry>,
    mailer: Arc<dyn MailSender>,
    sandbox: bool,
}

impl SendWorker {
    pub fn new(registry: Arc<TemplateRegistry>, mailer: Arc<dyn MailSender>, sandbox: bool) -> Self {
        Self {
            registry,
            mailer,
            sandbox,
        }
    }

    /// Build and send one request.
    pub async fn process(&self, request: EmailRequest) -> Result<()> {
        let rendered = self.registry.build(
            &request.template_name,
            &request.locale,
            &request.email_parameters,
        )?;
        debug!(
            "Email {} for locale '{}' built, subject: {}",
            request.template_name, request.locale, rendered.subject
        );

        let mut mail = request.send_grid_parameters;
        mail.set_rendered(rendered.subject, rendered.html);
        mail.set_sandbox(self.sandbox);

        self.mailer.send(&mail).await
    }

    /// Drain the queue until it is closed or `cancel` fires.
    ///
    /// On cancellation, requests already queued are still delivered.
    pub async fn run(self, mut rx: mpsc::Receiver<EmailRequest>, cancel: CancellationToken) {
        info!("Send worker started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    rx.close();
                    break;
                }
                request = rx.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
            }
        }

        while let Some(request) = rx.recv().await {
            self.handle(request).await;
        }

        info!("Send worker stopped");
    }

    async fn handle(&self, request: EmailRequest) {
        let name = request.template_name.clone();
        match self.process(request).await {
            Ok(()) => info!("Email {} sent", name),
            Err(e) => error!("Failed to send email {}: {}", name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::queue::EmailQueue;
    use parking_lot::Mutex;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<SendGridMail>>,
    }

    #[async_trait]
    impl MailSender for RecordingSender {
        async fn send(&self, mail: &SendGridMail) -> Result<()> {
            self.sent.lock().push(mail.clone());
            Ok(())
        }
    }

    fn registry() -> Arc<TemplateRegistry> {
        let registry = TemplateRegistry::new();
        registry.register(
            "Welcome",
            "{% block subject %}Hi {{ name }}{% endblock %}{% block email_body %}<p>Hello {{ name }}</p>{% endblock %}",
        );
        Arc::new(registry)
    }

    fn request(name: &str) -> EmailRequest {
        serde_json::from_value(json!({
            "template_name": name,
            "email_parameters": {"name": "Bob"},
            "send_grid_parameters": {
                "from": {"email": "noreply@example.com"},
                "personalizations": [{"to": [{"email": "bob@example.com"}]}]
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_mailer_posts_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .and(header("authorization", "Bearer SG.key"))
            .and(body_partial_json(json!({
                "subject": "Hi Bob",
                "content": [{"type": "text/html", "value": "<p>Hello Bob</p>"}],
                "mail_settings": {"sandbox_mode": {"enable": true}}
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = Arc::new(SendGridMailer::new("SG.key").with_host(server.uri()));
        let worker = SendWorker::new(registry(), mailer, true);

        worker.process(request("Welcome")).await.unwrap();
    }

    #[tokio::test]
    async fn test_mailer_reports_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v3/mail/send"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad from"))
            .mount(&server)
            .await;

        let mailer = SendGridMailer::new("SG.key").with_host(server.uri());
        let err = mailer.send(&SendGridMail::default()).await.unwrap_err();

        assert!(matches!(err, TemplgridError::RemoteCall { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_worker_continues_after_failure() {
        let sender = Arc::new(RecordingSender::default());
        let worker = SendWorker::new(registry(), sender.clone(), false);
        let (queue, rx) = EmailQueue::bounded(8);

        queue.push(request("Missing")).unwrap();
        queue.push(request("Welcome")).unwrap();
        drop(queue);

        worker.run(rx, CancellationToken::new()).await;

        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject.as_deref(), Some("Hi Bob"));
    }

    #[tokio::test]
    async fn test_worker_drains_on_cancel() {
        let sender = Arc::new(RecordingSender::default());
        let worker = SendWorker::new(registry(), sender.clone(), false);
        let (queue, rx) = EmailQueue::bounded(8);
        let cancel = CancellationToken::new();

        queue.push(request("Welcome")).unwrap();
        cancel.cancel();

        worker.run(rx, cancel).await;

        assert_eq!(sender.sent.lock().len(), 1);
        assert!(queue.is_closed());
    }
}
