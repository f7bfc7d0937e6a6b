//! Booking lifecycle tests against a real database

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use sqlx::PgPool;
    use uuid::Uuid;

    use hostelhub_server::booking::{
        BookingService, BookingStatus, CreateBookingRequest, UpdateBookingStatusRequest,
    };
    use hostelhub_server::config::{Config, Environment};
    use hostelhub_server::error::ApiError;
    use hostelhub_server::middleware::AuthenticatedUser;
    use hostelhub_server::models::UserRole;
    use hostelhub_server::notify::EmailNotifier;
    use hostelhub_server::shuttle::{BookShuttleRequest, ShuttleService};

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
            paystack_webhook_secret: None,
            currency: "GHS".to_string(),
            smtp: None,
            email_from: "noreply@hostelhub.local".to_string(),
            cors_allowed_origins: None,
            log_level: "info".to_string(),
            jwt_secret: "test-secret".to_string(),
        }
    }

    fn booking_service(pool: &PgPool) -> BookingService {
        let notifier = EmailNotifier::from_config(&test_config()).unwrap();
        BookingService::new(pool.clone(), notifier, "GHS".to_string())
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

    async fn seed_route(pool: &PgPool, total_seats: i32) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO shuttle_routes (
                id, route_from, route_to, departure_time, arrival_time,
                price_per_seat, total_seats, status
            )
            VALUES ($1, 'Campus', 'Town', '08:00', '08:45', 10, $2, 'active')
            "#,
        )
        .bind(id)
        .bind(total_seats)
        .execute(pool)
        .await
        .expect("Failed to seed route");
        id
    }

    fn dates(offset_days: i64, months: i64) -> (NaiveDate, NaiveDate) {
        let check_in = Utc::now().date_naive() + Duration::days(offset_days);
        let check_out = check_in + Duration::days(months * 30);
        (check_in, check_out)
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_create_booking_computes_price() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let user_id = seed_user(&pool).await;
        let room_id = seed_room(&pool).await;

        let check_in = NaiveDate::from_ymd_opt(2030, 2, 1).unwrap();
        let check_out = NaiveDate::from_ymd_opt(2030, 5, 1).unwrap();

        let booking = service
            .create_booking(
                user_id,
                CreateBookingRequest {
                    room_id,
                    check_in_date: check_in,
                    check_out_date: check_out,
                    notes: None,
                },
            )
            .await
            .expect("Booking should succeed");

        assert_eq!(booking.duration, 3);
        assert_eq!(booking.total_amount, dec!(1500));
        assert_eq!(booking.amount_paid, dec!(0));
        assert_eq!(booking.outstanding_balance, dec!(1500));
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_overlapping_booking_rejected() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let room_id = seed_room(&pool).await;
        let first_user = seed_user(&pool).await;
        let second_user = seed_user(&pool).await;

        let (check_in, check_out) = dates(30, 3);

        service
            .create_booking(
                first_user,
                CreateBookingRequest {
                    room_id,
                    check_in_date: check_in,
                    check_out_date: check_out,
                    notes: None,
                },
            )
            .await
            .expect("First booking should succeed");

        // Second request overlaps the middle of the held interval
        let result = service
            .create_booking(
                second_user,
                CreateBookingRequest {
                    room_id,
                    check_in_date: check_in + Duration::days(10),
                    check_out_date: check_out + Duration::days(10),
                    notes: None,
                },
            )
            .await;

        assert!(matches!(result, Err(ApiError::Conflict(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_bookings_serialize_on_room_lock() {
        let pool = setup_test_db().await;
        let room_id = seed_room(&pool).await;
        let first_user = seed_user(&pool).await;
        let second_user = seed_user(&pool).await;

        let (check_in, check_out) = dates(60, 2);

        let service_a = booking_service(&pool);
        let service_b = booking_service(&pool);

        let request = |user| {
            (
                user,
                CreateBookingRequest {
                    room_id,
                    check_in_date: check_in,
                    check_out_date: check_out,
                    notes: None,
                },
            )
        };

        let (user_a, req_a) = request(first_user);
        let (user_b, req_b) = request(second_user);

        let (result_a, result_b) = tokio::join!(
            service_a.create_booking(user_a, req_a),
            service_b.create_booking(user_b, req_b),
        );

        let successes = [&result_a, &result_b]
            .iter()
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(successes, 1, "Exactly one booking should win the room");
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_status_transition_rejects_shortcuts() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let user_id = seed_user(&pool).await;
        let room_id = seed_room(&pool).await;

        let (check_in, check_out) = dates(90, 2);
        let booking = service
            .create_booking(
                user_id,
                CreateBookingRequest {
                    room_id,
                    check_in_date: check_in,
                    check_out_date: check_out,
                    notes: None,
                },
            )
            .await
            .unwrap();

        // pending -> completed is not a legal transition
        let result = service
            .update_booking_status(
                booking.id,
                UpdateBookingStatusRequest {
                    status: BookingStatus::Completed,
                    notes: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ApiError::Validation(_))));

        // pending -> approved is
        let updated = service
            .update_booking_status(
                booking.id,
                UpdateBookingStatusRequest {
                    status: BookingStatus::Approved,
                    notes: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.status, BookingStatus::Approved);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancel_requires_ownership() {
        let pool = setup_test_db().await;
        let service = booking_service(&pool);
        let owner = seed_user(&pool).await;
        let stranger = seed_user(&pool).await;
        let room_id = seed_room(&pool).await;

        let (check_in, check_out) = dates(120, 1);
        let booking = service
            .create_booking(
                owner,
                CreateBookingRequest {
                    room_id,
                    check_in_date: check_in,
                    check_out_date: check_out,
                    notes: None,
                },
            )
            .await
            .unwrap();

        let actor = AuthenticatedUser {
            user_id: stranger,
            role: UserRole::Student,
        };
        let result = service.cancel_booking(&actor, booking.id).await;
        assert!(matches!(result, Err(ApiError::Forbidden(_))));

        // An admin may cancel on behalf of the student
        let admin = AuthenticatedUser {
            user_id: stranger,
            role: UserRole::Admin,
        };
        let refund = service.cancel_booking(&admin, booking.id).await.unwrap();
        assert_eq!(refund.refund_amount, dec!(0));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_shuttle_capacity_enforced() {
        let pool = setup_test_db().await;
        let service = ShuttleService::new(pool.clone());
        let user_id = seed_user(&pool).await;
        let route_id = seed_route(&pool, 20).await;
        let date = Utc::now().date_naive() + Duration::days(7);

        service
            .book_shuttle(
                user_id,
                BookShuttleRequest {
                    route_id,
                    date,
                    seats: 18,
                },
            )
            .await
            .expect("18 of 20 seats should book");

        // 3 more would oversell
        let result = service
            .book_shuttle(
                user_id,
                BookShuttleRequest {
                    route_id,
                    date,
                    seats: 3,
                },
            )
            .await;
        assert!(matches!(result, Err(ApiError::Conflict(_))));

        // 2 exactly fills the vehicle
        let booking = service
            .book_shuttle(
                user_id,
                BookShuttleRequest {
                    route_id,
                    date,
                    seats: 2,
                },
            )
            .await
            .expect("Remaining 2 seats should book");
        assert_eq!(booking.total_price, dec!(20));
        assert!(booking.qr_code.is_some());
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancelled_shuttle_booking_releases_seats() {
        let pool = setup_test_db().await;
        let service = ShuttleService::new(pool.clone());
        let user_id = seed_user(&pool).await;
        let route_id = seed_route(&pool, 10).await;
        let date = Utc::now().date_naive() + Duration::days(14);

        let booking = service
            .book_shuttle(
                user_id,
                BookShuttleRequest {
                    route_id,
                    date,
                    seats: 10,
                },
            )
            .await
            .unwrap();

        let full = service
            .book_shuttle(
                user_id,
                BookShuttleRequest {
                    route_id,
                    date,
                    seats: 1,
                },
            )
            .await;
        assert!(matches!(full, Err(ApiError::Conflict(_))));

        service
            .cancel_booking(user_id, booking.booking_id)
            .await
            .unwrap();

        // The cancelled seats are bookable again
        service
            .book_shuttle(
                user_id,
                BookShuttleRequest {
                    route_id,
                    date,
                    seats: 1,
                },
            )
            .await
            .expect("Seats should be free after cancellation");
    }
}
