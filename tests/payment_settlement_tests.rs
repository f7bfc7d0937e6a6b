//! Settlement and webhook idempotency tests against a real database

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use hostelhub_server::config::{Config, Environment};
    use hostelhub_server::notify::EmailNotifier;
    use hostelhub_server::payment::{
        generate_payment_reference, PaymentService, PaystackClient, SettlementOutcome,
        WebhookData, WebhookEvent,
    };

    /// Helper to create a test database pool with migrations applied
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/hostelhub_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn test_config() -> Config {
        Config {
            database_url: String::new(),
            environment: Environment::Development,
            port: 0,
            db_max_connections: 1,
            api_base_url: "http://localhost:3000/api".to_string(),
            paystack_base_url: "https://api.paystack.co".to_string(),
            paystack_secret_key: "sk_test_x".to_string(),
            paystack_webhook_secret: Some("whsec_test".to_string()),
            currency: "GHS".to_string(),
            smtp: None,
            email_from: "noreply@hostelhub.local".to_string(),
            cors_allowed_origins: None,
            log_level: "info".to_string(),
            jwt_secret: "test-secret".to_string(),
        }
    }

    fn payment_service(pool: &PgPool) -> PaymentService {
        let config = test_config();
        let gateway = PaystackClient::new(
            config.paystack_base_url.clone(),
            config.paystack_secret_key.clone(),
            config.paystack_webhook_secret.clone(),
        );
        let notifier = EmailNotifier::from_config(&config).unwrap();
        PaymentService::new(
            pool.clone(),
            gateway,
            notifier,
            config.api_base_url,
            config.currency,
        )
    }

    async fn seed_user(pool: &PgPool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, email, first_name, last_name, role) VALUES ($1, $2, 'Test', 'Student', 'student')",
        )
        .bind(id)
        .bind(format!("student-{}@example.com", id))
        .execute(pool)
        .await
        .expect("Failed to seed user");
        id
    }

    async fn seed_room(pool: &PgPool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO rooms (id, room_number, room_type, capacity, current_occupancy, price_per_month, status)
            VALUES ($1, $2, 'single', 1, 0, 500, 'available')
            "#,
        )
        .bind(id)
        .bind(format!("R-{}", &id.to_string()[..8]))
        .execute(pool)
        .await
        .expect("Failed to seed room");
        id
    }

    async fn seed_booking(pool: &PgPool, user_id: Uuid, total: Decimal, status: &str) -> Uuid {
        let room_id = seed_room(pool).await;
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, user_id, room_id, check_in_date, check_out_date, duration_months,
                total_amount, amount_paid, outstanding_balance, status
            )
            VALUES ($1, $2, $3, '2030-02-01', '2030-05-01', 3, $4, 0, $4, $5::booking_status)
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(room_id)
        .bind(total)
        .bind(status)
        .execute(pool)
        .await
        .expect("Failed to seed booking");
        id
    }

    async fn seed_pending_payment(
        pool: &PgPool,
        user_id: Uuid,
        booking_id: Option<Uuid>,
        amount: Decimal,
    ) -> String {
        let reference = generate_payment_reference();
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, user_id, booking_id, amount, currency, payment_method,
                payment_type, transaction_reference, status
            )
            VALUES ($1, $2, $3, $4, 'GHS', 'paystack', 'room_booking', $5, 'pending')
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(booking_id)
        .bind(amount)
        .bind(&reference)
        .execute(pool)
        .await
        .expect("Failed to seed payment");
        reference
    }

    async fn booking_state(pool: &PgPool, id: Uuid) -> (Decimal, Decimal, String) {
        sqlx::query_as::<_, (Decimal, Decimal, String)>(
            "SELECT amount_paid, outstanding_balance, status::text FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_one(pool)
        .await
        .expect("Booking should exist")
    }

    fn success_event(reference: &str) -> WebhookEvent {
        WebhookEvent {
            event: "charge.success".to_string(),
            data: WebhookData {
                reference: reference.to_string(),
                amount: Some(150000),
                currency: Some("GHS".to_string()),
                status: Some("success".to_string()),
                gateway_response: None,
                customer: None,
                metadata: None,
            },
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settlement_applies_booking_balance_once() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let booking_id = seed_booking(&pool, user_id, dec!(1500), "approved").await;
        let reference = seed_pending_payment(&pool, user_id, Some(booking_id), dec!(1500)).await;

        let outcome = service.settle_payment(&reference).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Applied(_)));

        let (paid, outstanding, status) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(1500));
        assert_eq!(outstanding, dec!(0));
        assert_eq!(status, "active");

        // Settling the same reference again must not double-apply
        let outcome = service.settle_payment(&reference).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::AlreadySettled));

        let (paid, outstanding, _) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(1500));
        assert_eq!(outstanding, dec!(0));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_full_payment_activates_pending_booking() {
        // The primary lifecycle: book (pending), then pay in full.
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let booking_id = seed_booking(&pool, user_id, dec!(1500), "pending").await;
        let reference = seed_pending_payment(&pool, user_id, Some(booking_id), dec!(1500)).await;

        let outcome = service.settle_payment(&reference).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Applied(_)));

        let (paid, outstanding, status) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(1500));
        assert_eq!(outstanding, dec!(0));
        assert_eq!(
            status, "active",
            "A non-terminal booking must activate when the balance reaches zero"
        );
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settlement_never_touches_terminal_booking() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let booking_id = seed_booking(&pool, user_id, dec!(1500), "cancelled").await;
        let reference = seed_pending_payment(&pool, user_id, Some(booking_id), dec!(1500)).await;

        service.settle_payment(&reference).await.unwrap();

        let (paid, outstanding, status) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(0));
        assert_eq!(outstanding, dec!(1500));
        assert_eq!(status, "cancelled");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_partial_payment_keeps_booking_approved() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let booking_id = seed_booking(&pool, user_id, dec!(1500), "approved").await;
        let reference = seed_pending_payment(&pool, user_id, Some(booking_id), dec!(500)).await;

        service.settle_payment(&reference).await.unwrap();

        let (paid, outstanding, status) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(500));
        assert_eq!(outstanding, dec!(1000));
        assert_eq!(status, "approved");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_settlement_single_winner() {
        let pool = setup_test_db().await;
        let user_id = seed_user(&pool).await;
        let booking_id = seed_booking(&pool, user_id, dec!(1500), "approved").await;
        let reference = seed_pending_payment(&pool, user_id, Some(booking_id), dec!(1500)).await;

        let service_a = payment_service(&pool);
        let service_b = payment_service(&pool);
        let ref_a = reference.clone();
        let ref_b = reference.clone();

        let (outcome_a, outcome_b) = tokio::join!(
            service_a.settle_payment(&ref_a),
            service_b.settle_payment(&ref_b),
        );

        let applied = [outcome_a.unwrap(), outcome_b.unwrap()]
            .into_iter()
            .filter(|o| matches!(o, SettlementOutcome::Applied(_)))
            .count();
        assert_eq!(applied, 1, "Exactly one settlement path should win");

        let (paid, _, _) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(1500), "The balance must be applied exactly once");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_webhook_settles_pending_payment() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let booking_id = seed_booking(&pool, user_id, dec!(1500), "approved").await;
        let reference = seed_pending_payment(&pool, user_id, Some(booking_id), dec!(1500)).await;

        service
            .handle_webhook_event(success_event(&reference))
            .await
            .unwrap();

        let (paid, _, status) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(1500));
        assert_eq!(status, "active");

        // A redelivered event is acknowledged without re-applying
        service
            .handle_webhook_event(success_event(&reference))
            .await
            .unwrap();
        let (paid, _, _) = booking_state(&pool, booking_id).await;
        assert_eq!(paid, dec!(1500));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_webhook_for_unknown_reference_is_dead_lettered() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let reference = format!("PAY_{}_UNKNOWN", Utc::now().timestamp_millis());

        service
            .handle_webhook_event(success_event(&reference))
            .await
            .unwrap();

        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM gateway_webhook_events WHERE reference = $1",
        )
        .bind(&reference)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_failure_webhook_only_affects_pending() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let reference = seed_pending_payment(&pool, user_id, None, dec!(100)).await;

        let failed_event = WebhookEvent {
            event: "charge.failed".to_string(),
            data: WebhookData {
                reference: reference.clone(),
                amount: Some(10000),
                currency: Some("GHS".to_string()),
                status: Some("failed".to_string()),
                gateway_response: Some("Declined".to_string()),
                customer: None,
                metadata: None,
            },
        };

        service.handle_webhook_event(failed_event).await.unwrap();

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status::text FROM payments WHERE transaction_reference = $1",
        )
        .bind(&reference)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "failed");

        // A completed payment is never demoted by a late failure event
        let settled_ref = seed_pending_payment(&pool, user_id, None, dec!(50)).await;
        service.settle_payment(&settled_ref).await.unwrap();

        let late_failure = WebhookEvent {
            event: "charge.failed".to_string(),
            data: WebhookData {
                reference: settled_ref.clone(),
                amount: Some(5000),
                currency: Some("GHS".to_string()),
                status: Some("failed".to_string()),
                gateway_response: None,
                customer: None,
                metadata: None,
            },
        };
        service.handle_webhook_event(late_failure).await.unwrap();

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status::text FROM payments WHERE transaction_reference = $1",
        )
        .bind(&settled_ref)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "completed");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_settling_a_failed_payment_reports_failure() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let reference = seed_pending_payment(&pool, user_id, None, dec!(100)).await;

        let failed_event = WebhookEvent {
            event: "charge.failed".to_string(),
            data: WebhookData {
                reference: reference.clone(),
                amount: Some(10000),
                currency: Some("GHS".to_string()),
                status: Some("failed".to_string()),
                gateway_response: Some("Declined".to_string()),
                customer: None,
                metadata: None,
            },
        };
        service.handle_webhook_event(failed_event).await.unwrap();

        // A later settlement attempt must not report success
        let outcome = service.settle_payment(&reference).await.unwrap();
        assert!(matches!(outcome, SettlementOutcome::Failed));

        let status = sqlx::query_scalar::<_, String>(
            "SELECT status::text FROM payments WHERE transaction_reference = $1",
        )
        .bind(&reference)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(status, "failed");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_payment_history_summary() {
        let pool = setup_test_db().await;
        let service = payment_service(&pool);
        let user_id = seed_user(&pool).await;
        let booking_id = seed_booking(&pool, user_id, dec!(1500), "approved").await;

        let first = seed_pending_payment(&pool, user_id, Some(booking_id), dec!(500)).await;
        service.settle_payment(&first).await.unwrap();
        // A pending payment does not count toward the paid total
        seed_pending_payment(&pool, user_id, Some(booking_id), dec!(300)).await;

        let history = service
            .payment_history(user_id, Default::default())
            .await
            .unwrap();

        assert_eq!(history.payments.len(), 2);
        assert_eq!(history.summary.total_paid, dec!(500));
        assert_eq!(history.summary.outstanding_balance, dec!(1000));

        let balance = service.get_balance(user_id).await.unwrap();
        assert_eq!(balance.total_owed, dec!(1500));
        assert_eq!(balance.amount_paid, dec!(500));
        assert_eq!(balance.outstanding_balance, dec!(1000));
        assert!(balance.last_payment_date.is_some());
    }
}
