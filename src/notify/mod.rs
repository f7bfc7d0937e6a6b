//! Best-effort email notifications
//!
//! Confirmation and receipt emails are fire-and-forget: callers spawn the
//! send and log failures. A notifier error never changes the outcome of
//! the booking or payment operation that triggered it.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::config::Config;

/// Details for a booking confirmation email
#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub booking_id: Uuid,
    pub room_number: String,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub total_amount: Decimal,
    pub currency: String,
}

/// Details for a payment receipt email
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub amount: Decimal,
    pub currency: String,
    pub transaction_reference: String,
    pub booking_id: Option<Uuid>,
}

/// SMTP notifier. Disabled (all sends become debug-logged no-ops) when
/// SMTP settings are absent from the environment.
#[derive(Clone)]
pub struct EmailNotifier {
    transport: Option<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl EmailNotifier {
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = match &config.smtp {
            Some(smtp) => {
                let credentials =
                    Credentials::new(smtp.username.clone(), smtp.password.clone());
                let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
                    .context("Invalid SMTP relay host")?
                    .port(smtp.port)
                    .credentials(credentials)
                    .build();
                Some(transport)
            }
            None => {
                tracing::warn!("SMTP not configured, email notifications are disabled");
                None
            }
        };

        Ok(Self {
            transport,
            from: config.email_from.clone(),
        })
    }

    pub async fn send_booking_confirmation(
        &self,
        to: &str,
        details: &BookingConfirmation,
    ) -> Result<()> {
        let body = format!(
            "Your booking for room {} has been received.\n\n\
             Booking ID: {}\n\
             Check-in: {}\n\
             Check-out: {}\n\
             Total amount: {} {}\n\n\
             The booking is pending until payment is completed.",
            details.room_number,
            details.booking_id,
            details.check_in_date,
            details.check_out_date,
            details.total_amount,
            details.currency,
        );

        self.send(to, "Booking confirmation", body).await
    }

    pub async fn send_payment_receipt(&self, to: &str, details: &PaymentReceipt) -> Result<()> {
        let booking_line = details
            .booking_id
            .map(|id| format!("Booking: {}\n", id))
            .unwrap_or_default();

        let body = format!(
            "We received your payment of {} {}.\n\n\
             Reference: {}\n\
             {}\n\
             Thank you.",
            details.amount, details.currency, details.transaction_reference, booking_line,
        );

        self.send(to, "Payment receipt", body).await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let Some(transport) = &self.transport else {
            tracing::debug!(to, subject, "Email disabled, skipping send");
            return Ok(());
        };

        let message = Message::builder()
            .from(self.from.parse().context("Invalid sender address")?)
            .to(to.parse().context("Invalid recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .context("Failed to build email message")?;

        transport
            .send(message)
            .await
            .context("SMTP send failed")?;

        tracing::info!(to, subject, "Email sent");
        Ok(())
    }
}
