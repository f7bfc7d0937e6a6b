//! Payment service layer - gateway integration and settlement
//!
//! Settlement is a single shared routine used by both the verify callback
//! and the webhook. Completion is a compare-and-set on the pending status,
//! so whichever path arrives second becomes a no-op and the booking
//! balance is applied exactly once.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};
use crate::error::{ApiError, ApiResult};
use crate::models::Pagination;
use crate::notify::{EmailNotifier, PaymentReceipt};
use crate::payment::gateway::{
    to_minor_units, InitializeParams, PaystackClient, WebhookEvent,
};
use crate::payment::model::{
    apply_payment, BalanceResponse, InitializePaymentRequest, InitializePaymentResponse, Payment,
    PaymentHistoryItem, PaymentHistoryQuery, PaymentHistoryResponse, PaymentStatus, PaymentSummary,
    SettlementOutcome,
};

/// Generates a gateway transaction reference: `PAY_<millis>_<7 random
/// uppercase alphanumerics>`.
pub fn generate_payment_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(|c| (c as char).to_ascii_uppercase())
        .collect();
    format!("PAY_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Payment service for gateway calls, settlement and reporting
#[derive(Clone)]
pub struct PaymentService {
    db_pool: PgPool,
    gateway: PaystackClient,
    notifier: EmailNotifier,
    api_base_url: String,
    currency: String,
}

impl PaymentService {
    pub fn new(
        db_pool: PgPool,
        gateway: PaystackClient,
        notifier: EmailNotifier,
        api_base_url: String,
        currency: String,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            notifier,
            api_base_url,
            currency,
        }
    }

    /// Webhook signature check, delegated to the gateway client
    pub fn verify_webhook_signature(&self, body: &[u8], signature: &str) -> bool {
        self.gateway.verify_webhook_signature(body, signature)
    }

    /// Create a pending payment record and initialize the gateway
    /// transaction, returning the hosted payment link.
    pub async fn initialize_payment(
        &self,
        user_id: Uuid,
        request: InitializePaymentRequest,
    ) -> ApiResult<InitializePaymentResponse> {
        if request.amount <= Decimal::ZERO {
            return Err(ApiError::Validation(
                "Amount must be greater than 0".to_string(),
            ));
        }

        let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

        if let Some(booking_id) = request.booking_id {
            let owned = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM bookings WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL)",
            )
            .bind(booking_id)
            .bind(user_id)
            .fetch_one(&self.db_pool)
            .await?;

            if !owned {
                return Err(ApiError::NotFound("Booking not found".to_string()));
            }
        }

        let amount_minor = to_minor_units(request.amount)
            .ok_or_else(|| ApiError::Validation("Amount is out of range".to_string()))?;

        let reference = generate_payment_reference();
        let now = Utc::now();

        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, user_id, booking_id, amount, currency, payment_method,
                payment_type, reference_id, transaction_reference, status,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(request.booking_id)
        .bind(request.amount)
        .bind(&self.currency)
        .bind(&request.payment_method)
        .bind(request.payment_type)
        .bind(&request.reference)
        .bind(&reference)
        .bind(PaymentStatus::Pending)
        .bind(now)
        .fetch_one(&self.db_pool)
        .await?;

        let params = InitializeParams {
            email,
            amount_minor,
            reference: reference.clone(),
            callback_url: format!("{}/payments/verify", self.api_base_url),
            metadata: serde_json::json!({
                "paymentId": payment.id,
                "userId": user_id,
                "paymentType": request.payment_type,
            }),
        };

        let initialized = self
            .gateway
            .initialize_transaction(params)
            .await
            .map_err(|e| ApiError::Gateway(e.to_string()))?;

        // The gateway echoes the reference we supplied; store the
        // canonical one in case it ever differs.
        if initialized.reference != reference {
            sqlx::query(
                "UPDATE payments SET transaction_reference = $2, updated_at = $3 WHERE id = $1",
            )
            .bind(payment.id)
            .bind(&initialized.reference)
            .bind(Utc::now())
            .execute(&self.db_pool)
            .await?;
        }

        tracing::info!(
            payment_id = %payment.id,
            reference = %initialized.reference,
            amount = %payment.amount,
            "Payment initialized"
        );

        Ok(InitializePaymentResponse {
            payment_id: payment.id,
            amount: payment.amount,
            currency: payment.currency,
            status: payment.status,
            payment_link: initialized.authorization_url,
            reference: initialized.reference,
        })
    }

    /// Confirm a transaction with the gateway and settle the local
    /// payment. Idempotent: re-verifying a completed payment reports
    /// success without touching the booking balance again.
    pub async fn verify_payment(&self, reference: &str) -> ApiResult<(Payment, bool)> {
        let response = self
            .gateway
            .verify_transaction(reference)
            .await
            .map_err(|e| ApiError::Gateway(e.to_string()))?;

        let verified = response
            .data
            .filter(|_| response.status)
            .filter(|data| data.is_success());
        if verified.is_none() {
            return Err(ApiError::Validation(
                "Payment verification failed".to_string(),
            ));
        }

        match self.settle_payment(reference).await? {
            SettlementOutcome::Applied(payment) => Ok((payment, true)),
            SettlementOutcome::AlreadySettled => {
                let payment = sqlx::query_as::<_, Payment>(
                    "SELECT * FROM payments WHERE transaction_reference = $1",
                )
                .bind(reference)
                .fetch_optional(&self.db_pool)
                .await?
                .ok_or_else(|| ApiError::NotFound("Payment record not found".to_string()))?;
                Ok((payment, false))
            }
            SettlementOutcome::Failed => Err(ApiError::Conflict(
                "Payment has already failed and cannot be verified".to_string(),
            )),
        }
    }

    /// Shared settlement routine. Completes the payment and applies it to
    /// the linked booking balance in one transaction, gated by a
    /// compare-and-set on the pending status.
    pub async fn settle_payment(&self, reference: &str) -> ApiResult<SettlementOutcome> {
        let mut tx = self.db_pool.begin().await?;

        // CAS: only one caller can move pending -> completed
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = 'completed', completed_at = $2, updated_at = $2
            WHERE transaction_reference = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(reference)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(payment) = payment else {
            let status = sqlx::query_scalar::<_, PaymentStatus>(
                "SELECT status FROM payments WHERE transaction_reference = $1",
            )
            .bind(reference)
            .fetch_optional(&mut *tx)
            .await?;
            tx.commit().await?;

            return match status {
                None => Err(ApiError::NotFound("Payment record not found".to_string())),
                Some(PaymentStatus::Failed) => Ok(SettlementOutcome::Failed),
                Some(_) => Ok(SettlementOutcome::AlreadySettled),
            };
        };

        if let Some(booking_id) = payment.booking_id {
            let booking = sqlx::query_as::<_, Booking>(
                "SELECT * FROM bookings WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            )
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await?;

            match booking {
                Some(booking) if !booking.status.is_terminal() => {
                    let update = apply_payment(
                        booking.total_amount,
                        booking.amount_paid,
                        payment.amount,
                    );

                    // Settlement activates any non-terminal booking once
                    // the balance reaches zero; this is the payment-driven
                    // transition, distinct from the admin transition graph.
                    let next_status = if update.settled {
                        BookingStatus::Active
                    } else {
                        booking.status
                    };

                    sqlx::query(
                        r#"
                        UPDATE bookings
                        SET amount_paid = $2, outstanding_balance = $3, status = $4,
                            updated_at = $5
                        WHERE id = $1
                        "#,
                    )
                    .bind(booking_id)
                    .bind(update.amount_paid)
                    .bind(update.outstanding_balance)
                    .bind(next_status)
                    .bind(Utc::now())
                    .execute(&mut *tx)
                    .await?;

                    tracing::info!(
                        booking_id = %booking_id,
                        payment_id = %payment.id,
                        amount_paid = %update.amount_paid,
                        outstanding = %update.outstanding_balance,
                        "Payment applied to booking balance"
                    );
                }
                Some(booking) => {
                    tracing::warn!(
                        booking_id = %booking_id,
                        status = booking.status.as_str(),
                        "Payment settled against a terminal booking; balance left unchanged"
                    );
                }
                None => {
                    tracing::warn!(
                        booking_id = %booking_id,
                        payment_id = %payment.id,
                        "Payment references a missing booking"
                    );
                }
            }
        }

        tx.commit().await?;

        tracing::info!(
            payment_id = %payment.id,
            reference = %payment.transaction_reference,
            "Payment completed"
        );

        self.spawn_receipt_email(&payment).await;

        Ok(SettlementOutcome::Applied(payment))
    }

    /// Apply a signature-verified, parsed gateway event. Unmatched
    /// `charge.success` events are dead-lettered for manual review.
    pub async fn handle_webhook_event(&self, event: WebhookEvent) -> ApiResult<()> {
        let reference = event.data.reference.clone();

        match event.event.as_str() {
            "charge.success" => {
                let known = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM payments WHERE transaction_reference = $1)",
                )
                .bind(&reference)
                .fetch_one(&self.db_pool)
                .await?;

                if !known {
                    tracing::warn!(reference = %reference, "Webhook for unknown payment, dead-lettering");
                    self.record_unmatched_event(&event, "payment not found")
                        .await?;
                    return Ok(());
                }

                match self.settle_payment(&reference).await? {
                    SettlementOutcome::Applied(payment) => {
                        tracing::info!(
                            payment_id = %payment.id,
                            reference = %reference,
                            "Payment settled via webhook"
                        );
                    }
                    SettlementOutcome::AlreadySettled => {
                        tracing::info!(reference = %reference, "Webhook for already settled payment, no-op");
                    }
                    SettlementOutcome::Failed => {
                        tracing::warn!(
                            reference = %reference,
                            "Success webhook for a payment already marked failed, no-op"
                        );
                    }
                }
            }
            "charge.failed" => {
                let updated = sqlx::query(
                    r#"
                    UPDATE payments
                    SET status = 'failed', updated_at = $2
                    WHERE transaction_reference = $1 AND status = 'pending'
                    "#,
                )
                .bind(&reference)
                .bind(Utc::now())
                .execute(&self.db_pool)
                .await?;

                if updated.rows_affected() == 0 {
                    tracing::info!(reference = %reference, "Failure webhook for non-pending payment, no-op");
                } else {
                    tracing::info!(reference = %reference, "Payment marked failed via webhook");
                }
            }
            other => {
                tracing::info!(event = other, "Ignoring unhandled webhook event");
            }
        }

        Ok(())
    }

    /// Dead-letter table for gateway events that cannot be applied
    async fn record_unmatched_event(&self, event: &WebhookEvent, reason: &str) -> ApiResult<()> {
        let payload = serde_json::json!({
            "event": event.event,
            "reference": event.data.reference,
            "amount": event.data.amount,
            "currency": event.data.currency,
            "status": event.data.status,
            "gateway_response": event.data.gateway_response,
            "customer": event.data.customer,
            "metadata": event.data.metadata,
        });

        sqlx::query(
            r#"
            INSERT INTO gateway_webhook_events (id, event_type, reference, payload, reason, received_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.event)
        .bind(&event.data.reference)
        .bind(&payload)
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.db_pool)
        .await?;

        Ok(())
    }

    /// Payment history with filters, summary totals and pagination
    pub async fn payment_history(
        &self,
        user_id: Uuid,
        query: PaymentHistoryQuery,
    ) -> ApiResult<PaymentHistoryResponse> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = 20i64;
        let offset = (page - 1) * limit;

        let mut list_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM payments WHERE user_id = ");
        list_builder.push_bind(user_id);
        if let Some(status) = query.status {
            list_builder.push(" AND status = ");
            list_builder.push_bind(status);
        }
        if let Some(start) = query.start_date {
            list_builder.push(" AND created_at >= ");
            list_builder.push_bind(start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
        }
        if let Some(end) = query.end_date {
            list_builder.push(" AND created_at < ");
            list_builder.push_bind(
                end.succ_opt()
                    .unwrap_or(end)
                    .and_hms_opt(0, 0, 0)
                    .unwrap_or_default()
                    .and_utc(),
            );
        }
        list_builder.push(" ORDER BY created_at DESC LIMIT ");
        list_builder.push_bind(limit);
        list_builder.push(" OFFSET ");
        list_builder.push_bind(offset);

        let payments = list_builder
            .build_query_as::<Payment>()
            .fetch_all(&self.db_pool)
            .await?;

        let mut count_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT COUNT(*) FROM payments WHERE user_id = ");
        count_builder.push_bind(user_id);
        if let Some(status) = query.status {
            count_builder.push(" AND status = ");
            count_builder.push_bind(status);
        }
        if let Some(start) = query.start_date {
            count_builder.push(" AND created_at >= ");
            count_builder.push_bind(start.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc());
        }
        if let Some(end) = query.end_date {
            count_builder.push(" AND created_at < ");
            count_builder.push_bind(
                end.succ_opt()
                    .unwrap_or(end)
                    .and_hms_opt(0, 0, 0)
                    .unwrap_or_default()
                    .and_utc(),
            );
        }

        let total = count_builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.db_pool)
            .await?;

        let total_paid = sqlx::query_scalar::<_, Option<Decimal>>(
            "SELECT SUM(amount) FROM payments WHERE user_id = $1 AND status = 'completed'",
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?
        .unwrap_or(Decimal::ZERO);

        let outstanding_balance = sqlx::query_scalar::<_, Option<Decimal>>(
            r#"
            SELECT SUM(outstanding_balance) FROM bookings
            WHERE user_id = $1 AND deleted_at IS NULL
              AND status IN ('approved', 'active')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?
        .unwrap_or(Decimal::ZERO);

        Ok(PaymentHistoryResponse {
            payments: payments.into_iter().map(PaymentHistoryItem::from).collect(),
            summary: PaymentSummary {
                total_paid,
                outstanding_balance,
            },
            pagination: Pagination::new(page, limit, total),
        })
    }

    /// Aggregate balance over the user's chargeable bookings
    pub async fn get_balance(&self, user_id: Uuid) -> ApiResult<BalanceResponse> {
        let (total_owed, amount_paid, outstanding_balance) = sqlx::query_as::<
            _,
            (Option<Decimal>, Option<Decimal>, Option<Decimal>),
        >(
            r#"
            SELECT SUM(total_amount), SUM(amount_paid), SUM(outstanding_balance)
            FROM bookings
            WHERE user_id = $1 AND deleted_at IS NULL
              AND status IN ('approved', 'active')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        let last_payment_date = sqlx::query_scalar::<_, Option<chrono::DateTime<Utc>>>(
            r#"
            SELECT MAX(completed_at) FROM payments
            WHERE user_id = $1 AND status = 'completed'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db_pool)
        .await?;

        Ok(BalanceResponse {
            outstanding_balance: outstanding_balance.unwrap_or(Decimal::ZERO),
            total_owed: total_owed.unwrap_or(Decimal::ZERO),
            amount_paid: amount_paid.unwrap_or(Decimal::ZERO),
            last_payment_date,
            next_payment_due: None,
        })
    }

    /// Fire-and-forget payment receipt email
    async fn spawn_receipt_email(&self, payment: &Payment) {
        let email = match sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
            .bind(payment.user_id)
            .fetch_optional(&self.db_pool)
            .await
        {
            Ok(Some(email)) => email,
            Ok(None) => {
                tracing::warn!(user_id = %payment.user_id, "No user email for payment receipt");
                return;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to look up email for payment receipt");
                return;
            }
        };

        let details = PaymentReceipt {
            amount: payment.amount,
            currency: payment.currency.clone(),
            transaction_reference: payment.transaction_reference.clone(),
            booking_id: payment.booking_id,
        };

        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_payment_receipt(&email, &details).await {
                tracing::warn!(error = %e, "Failed to send payment receipt email");
            }
        });
    }
}
