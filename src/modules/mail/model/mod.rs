// mail/model
use crate::core::config::MailConfig;
use crate::core::operator::Operator;
use chrono::Local;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::{Message, SmtpTransport, Transport};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address {address}: {source}")]
    Address {
        address: String,
        #[source]
        source: lettre::address::AddressError,
    },

    #[error("mail has no recipients")]
    NoRecipients,

    #[error("failed to build mail: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("failed to send mail: {0}")]
    Send(#[from] lettre::transport::smtp::Error),
}

fn parse_mailboxes(addresses: &[String]) -> Result<Vec<Mailbox>, MailError> {
    addresses
        .iter()
        .map(|address| {
            address.parse().map_err(|source| MailError::Address {
                address: address.clone(),
                source,
            })
        })
        .collect()
}

/// A plain-text mail handed to an SMTP server without authentication,
/// usually the local mail transfer agent.
pub struct Mail {
    operator: Arc<dyn Operator>,
    sender: Mailbox,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    bcc: Vec<Mailbox>,
    subject: String,
    parts: Vec<String>,
}

impl Mail {
    /// The subject defaults to the crate name; the current time is always
    /// appended to it.
    pub fn new(
        operator: Arc<dyn Operator>,
        to: &[String],
        sender: &str,
        subject: Option<&str>,
        cc: &[String],
        bcc: &[String],
    ) -> Result<Self, MailError> {
        let sender_box: Mailbox = sender.parse().map_err(|source| MailError::Address {
            address: sender.to_string(),
            source,
        })?;
        let to_boxes = parse_mailboxes(to)?;
        let cc_boxes = parse_mailboxes(cc)?;
        let bcc_boxes = parse_mailboxes(bcc)?;

        if to_boxes.is_empty() && cc_boxes.is_empty() && bcc_boxes.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let subject = format!(
            "{} - {}",
            subject.filter(|s| !s.is_empty()).unwrap_or(env!("CARGO_PKG_NAME")),
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        operator.log(
            "mail tool startup done",
            Some(json!({
                "to": to,
                "cc": cc,
                "bcc": bcc,
                "sender": sender,
                "subject": subject,
            })),
            false,
            false,
        );

        Ok(Self {
            operator,
            sender: sender_box,
            to: to_boxes,
            cc: cc_boxes,
            bcc: bcc_boxes,
            subject,
            parts: Vec::new(),
        })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// All recipients: to, then cc, then bcc.
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|m| m.email.to_string())
            .collect()
    }

    /// Adds a plain-text part. Empty text is ignored.
    pub fn add_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.operator
            .log("add text to mail", Some(json!({ "len": text.len() })), false, true);
        self.parts.push(text.to_string());
    }

    /// Adds `value` pretty-printed as a plain-text part.
    pub fn add_value(&mut self, value: &serde_json::Value) {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        };
        self.add_text(&text);
    }

    fn build(&self) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.sender.clone())
            .subject(self.subject.clone())
            .user_agent(USER_AGENT.to_string());
        for mailbox in &self.to {
            builder = builder.to(mailbox.clone());
        }
        for mailbox in &self.cc {
            builder = builder.cc(mailbox.clone());
        }
        for mailbox in &self.bcc {
            builder = builder.bcc(mailbox.clone());
        }

        let message = match self.parts.split_first() {
            None => builder.body(String::new())?,
            Some((first, rest)) => {
                let mut multipart = MultiPart::mixed().singlepart(SinglePart::plain(first.clone()));
                for part in rest {
                    multipart = multipart.singlepart(SinglePart::plain(part.clone()));
                }
                builder.multipart(multipart)?
            }
        };
        Ok(message)
    }

    /// The formatted message as it would go over the wire.
    pub fn text(&self) -> Result<String, MailError> {
        let message = self.build()?;
        Ok(String::from_utf8_lossy(&message.formatted()).into_owned())
    }

    pub fn send(&self, config: &MailConfig) -> Result<(), MailError> {
        let meta = json!({
            "sender": self.sender.to_string(),
            "recipients": self.recipients(),
            "server": format!("{}:{}", config.smtp_host, config.smtp_port),
        });

        let message = self.build()?;
        let mailer = SmtpTransport::builder_dangerous(&config.smtp_host)
            .port(config.smtp_port)
            .build();

        match mailer.send(&message) {
            Ok(response) => {
                let mut meta = meta;
                meta["result"] = json!(format!("{:?}", response.code()));
                self.operator.log("mail sent", Some(meta), false, true);
                Ok(())
            }
            Err(e) => {
                let mut meta = meta;
                meta["exception"] = json!(e.to_string());
                self.operator.log("error sending mail", Some(meta), true, true);
                Err(MailError::Send(e))
            }
        }
    }
}
