use std::fs::File;
use std::io::Read;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use resync_core::config::EmailConfig;
use resync_core::{Notifier, OutputLogger, ResyncConfig, Stat, StatStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{NotifyError, Result};
use crate::render;

type Transport = AsyncSmtpTransport<Tokio1Executor>;

struct Mailer {
    email: EmailConfig,
    transport: Transport,
}

/// SMTP [`Notifier`]. Does nothing when email is not configured or
/// retention is disabled (there is nothing to report on).
pub struct EmailNotifier {
    mailer: Option<Mailer>,
    store: Arc<dyn StatStore>,
    logger: Arc<dyn OutputLogger>,
    send_lock: Mutex<()>,
}

impl EmailNotifier {
    pub fn new(
        config: &ResyncConfig,
        store: Arc<dyn StatStore>,
        logger: Arc<dyn OutputLogger>,
    ) -> Result<Self> {
        let mailer = match &config.email {
            Some(email) if config.retention_enabled() => Some(Mailer {
                transport: build_transport(email)?,
                email: email.clone(),
            }),
            _ => None,
        };

        Ok(Self {
            mailer,
            store,
            logger,
            send_lock: Mutex::new(()),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Failure/complete mail for one run, with its captured output attached.
    pub async fn compose_run(&self, email: &EmailConfig, stat: &Stat) -> Result<Message> {
        let mut parts = MultiPart::mixed().singlepart(SinglePart::html(render::run_body(stat)));

        let logger = self.logger.clone();
        let job = stat.name.clone();
        let captures = tokio::task::spawn_blocking(move || {
            [
                ("stdout.log", read_all(logger.stdout(&job))),
                ("stderr.log", read_all(logger.stderr(&job))),
            ]
        })
        .await?;

        for (file_name, capture) in captures {
            match capture {
                Ok(bytes) => {
                    parts = parts.singlepart(
                        Attachment::new(file_name.to_string()).body(bytes, ContentType::TEXT_PLAIN),
                    );
                }
                Err(e) => warn!(job = %stat.name, file = file_name, error = %e, "skipping attachment"),
            }
        }

        envelope(email, &render::run_subject(stat))?
            .multipart(parts)
            .map_err(NotifyError::from)
    }

    /// History report of every stored run with the zipped logs attached.
    pub async fn compose_history(&self, email: &EmailConfig) -> Result<Message> {
        let history = self.store.list()?;
        if history.values().all(Vec::is_empty) {
            return Err(NotifyError::EmptyHistory);
        }

        let template = match &email.history_template {
            Some(path) => Some(tokio::fs::read_to_string(path).await.map_err(|source| {
                NotifyError::Template {
                    path: path.display().to_string(),
                    source,
                }
            })?),
            None => None,
        };

        let generated = Local::now().format("%Y-%m-%d %H:%M:%S %Z").to_string();
        let body = render::history_page(
            &render::history_tables(&history),
            template.as_deref(),
            &generated,
        );

        let mut parts = MultiPart::mixed().singlepart(SinglePart::html(body));
        let logger = self.logger.clone();
        match tokio::task::spawn_blocking(move || logger.export()).await? {
            Ok(zip) => {
                let content_type = ContentType::parse("application/zip")
                    .map_err(|e| NotifyError::ContentType(e.to_string()))?;
                parts = parts.singlepart(Attachment::new("logs.zip".to_string()).body(zip, content_type));
            }
            Err(e) => warn!(error = %e, "skipping logs.zip attachment"),
        }

        envelope(email, &email.history_subject)?
            .multipart(parts)
            .map_err(NotifyError::from)
    }

    async fn send(&self, transport: &Transport, message: Message) -> Result<()> {
        let _guard = self.send_lock.lock().await;
        transport.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, stat: &Stat) -> resync_core::Result<()> {
        let Some(mailer) = &self.mailer else {
            return Ok(());
        };
        let message = self.compose_run(&mailer.email, stat).await?;
        self.send(&mailer.transport, message).await?;
        info!(job = %stat.name, success = stat.success, "run notification sent");
        Ok(())
    }

    async fn notify_history(&self) -> resync_core::Result<()> {
        let Some(mailer) = &self.mailer else {
            return Ok(());
        };
        let message = self.compose_history(&mailer.email).await?;
        self.send(&mailer.transport, message).await?;
        info!("history notification sent");
        Ok(())
    }
}

fn read_all(file: resync_core::Result<File>) -> resync_core::Result<Vec<u8>> {
    let mut file = file?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn build_transport(email: &EmailConfig) -> Result<Transport> {
    let tls = || {
        TlsParameters::builder(email.host.clone())
            .dangerous_accept_invalid_certs(email.insecure_skip_verify)
            .build()
    };

    let mut builder = Transport::builder_dangerous(email.host.as_str()).port(email.port);
    if email.starttls {
        builder = builder.tls(Tls::Required(tls()?));
    } else if email.ssl {
        builder = builder.tls(Tls::Wrapper(tls()?));
    }
    if let Some(user) = &email.user {
        builder = builder.credentials(Credentials::new(
            user.clone(),
            email.pass.clone().unwrap_or_default(),
        ));
    }

    debug!(host = %email.host, port = email.port, starttls = email.starttls, ssl = email.ssl, "smtp transport ready");
    Ok(builder.build())
}

fn envelope(email: &EmailConfig, subject: &str) -> Result<lettre::message::MessageBuilder> {
    let mut builder = Message::builder()
        .from(email.from.parse::<Mailbox>()?)
        .subject(subject);
    for to in &email.to {
        builder = builder.to(to.parse::<Mailbox>()?);
    }
    Ok(builder)
}
