//! Transactional send pipeline
//!
//! ```text
//! POST /email -> validate -> [EmailQueue] -> SendWorker -> registry build -> SendGrid
//! ```

pub mod mailer;
pub mod queue;
pub mod request;

pub use mailer::{MailSender, SendGridMailer, SendWorker};
pub use queue::EmailQueue;
pub use request::{EmailRequest, SendGridMail, MAX_PERSONALIZATIONS};
