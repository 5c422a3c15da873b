#[cfg(test)]
mod tests {
    use crate::api::auth::AuthResponse;
    use crate::auth::{OtpPurpose, Role, User};
    use crate::config::LoginOtpPolicy;
    use crate::test::utils::test_data::{
        STANDARD_PASSWORD, TestDataBuilder, create_standard_test_data,
    };
    use crate::test::utils::test_utils::{
        json_body, login_test_user, post_json, put_json, setup_test_client,
        setup_test_client_with_config, test_config,
    };
    use crate::validation::ValidationResponse;
    use rocket::http::{Cookie, Status};
    use serde_json::{Value, json};

    fn signup_body(email: &str) -> Value {
        json!({
            "email": email,
            "password": "hunter22",
            "confirm_password": "hunter22",
            "name": "Fresh Student",
            "course": "Maths"
        })
    }

    #[rocket::async_test]
    async fn test_health() {
        let app = setup_test_client(create_standard_test_data().await).await;
        let response = app.client.get("/api/health").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "OK");
    }

    #[rocket::async_test]
    async fn test_signup_verifies_and_logs_in() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = post_json(&app, "/api/signup", signup_body("new@example.com")).await;
        assert_eq!(response.status(), Status::Ok);
        let body: AuthResponse = json_body(response).await;
        assert!(body.success);
        assert!(body.otp_required);

        let sent = app.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].purpose, OtpPurpose::Registration);

        let response = post_json(&app, "/api/verify-otp", json!({ "otp": sent[0].code })).await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.success, "{:?}", body.error);
        let user = body.user.unwrap();
        assert_eq!(user.email, "new@example.com");
        assert_eq!(user.role, Role::User);
        assert_eq!(user.course, "Maths");

        let response = app.client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let me: User = json_body(response).await;
        assert_eq!(me.email, "new@example.com");
    }

    #[rocket::async_test]
    async fn test_signup_defaults() {
        let app = setup_test_client(create_standard_test_data().await).await;

        post_json(
            &app,
            "/api/signup",
            json!({
                "email": "plain@example.com",
                "password": "pw",
                "confirm_password": "pw"
            }),
        )
        .await;
        let code = app.mailer.last_code_for("plain@example.com").unwrap();
        let response = post_json(&app, "/api/verify-otp", json!({ "otp": code })).await;
        let body: AuthResponse = json_body(response).await;

        let user = body.user.unwrap();
        assert_eq!(user.name, "New Student");
        assert_eq!(user.age, Some(18));
        assert_eq!(user.course, "General");
    }

    #[rocket::async_test]
    async fn test_signup_rejects_existing_email() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = post_json(&app, "/api/signup", signup_body("student@example.com")).await;
        assert_eq!(response.status(), Status::Conflict);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(
            body.first_error("email"),
            Some("User with this email already exists")
        );
        assert!(app.mailer.sent().is_empty());
    }

    #[rocket::async_test]
    async fn test_signup_validation() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = post_json(
            &app,
            "/api/signup",
            json!({
                "email": "not-an-email",
                "password": "a",
                "confirm_password": "b"
            }),
        )
        .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse = json_body(response).await;
        assert!(body.errors.contains_key("email"));
        assert!(body.errors.contains_key("confirm_password"));

        let mut bad_pin = signup_body("pin@example.com");
        bad_pin["security_pin"] = json!("12");
        bad_pin["confirm_security_pin"] = json!("12");
        let response = post_json(&app, "/api/signup", bad_pin).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(
            body.first_error("security_pin"),
            Some("Security PIN must be 4-6 digits")
        );
    }

    #[rocket::async_test]
    async fn test_wrong_otp_reports_failure() {
        let app = setup_test_client(create_standard_test_data().await).await;

        post_json(&app, "/api/signup", signup_body("new@example.com")).await;
        let code = app.mailer.last_code_for("new@example.com").unwrap();
        let wrong = if code == "111111" { "222222" } else { "111111" };

        let response = post_json(&app, "/api/verify-otp", json!({ "otp": wrong })).await;
        assert_eq!(response.status(), Status::Ok);
        let body: AuthResponse = json_body(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Invalid OTP"));

        let response = post_json(&app, "/api/verify-otp", json!({ "otp": code })).await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.success);
    }

    #[rocket::async_test]
    async fn test_verify_without_challenge() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = post_json(&app, "/api/verify-otp", json!({ "otp": "123456" })).await;
        let body: AuthResponse = json_body(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Session expired or invalid"));
    }

    #[rocket::async_test]
    async fn test_login_outcomes() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = post_json(
            &app,
            "/api/login",
            json!({ "email": "ghost@example.com", "password": "x" }),
        )
        .await;
        let body: AuthResponse = json_body(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Email not registered"));

        let response = post_json(
            &app,
            "/api/login",
            json!({ "email": "student@example.com", "password": "wrong" }),
        )
        .await;
        let body: AuthResponse = json_body(response).await;
        assert!(!body.success);
        assert_eq!(body.error.as_deref(), Some("Incorrect password"));

        let response = post_json(
            &app,
            "/api/login",
            json!({ "email": "student@example.com", "password": STANDARD_PASSWORD }),
        )
        .await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.success);
        assert!(!body.otp_required);
        assert_eq!(body.user.unwrap().email, "student@example.com");
    }

    #[rocket::async_test]
    async fn test_admin_login_requires_otp() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = post_json(
            &app,
            "/api/login",
            json!({ "email": "admin@example.com", "password": STANDARD_PASSWORD }),
        )
        .await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.success);
        assert!(body.otp_required);
        assert!(body.user.is_none());

        let response = app.client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);

        let code = app.mailer.last_code_for("admin@example.com").unwrap();
        let response = post_json(&app, "/api/verify-otp", json!({ "otp": code })).await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.success);
        assert_eq!(body.user.unwrap().role, Role::Admin);

        let response = app.client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[rocket::async_test]
    async fn test_login_otp_policy_always() {
        let data = create_standard_test_data().await;
        let mut config = test_config(&data);
        config.login_otp = LoginOtpPolicy::Always;
        let app = setup_test_client_with_config(data, config).await;

        let response = post_json(
            &app,
            "/api/login",
            json!({ "email": "student@example.com", "password": STANDARD_PASSWORD }),
        )
        .await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.otp_required);
        assert_eq!(app.mailer.sent()[0].purpose, OtpPurpose::Login);
    }

    #[rocket::async_test]
    async fn test_auth_required_apis() {
        let app = setup_test_client(create_standard_test_data().await).await;

        for endpoint in [
            "/api/me",
            "/api/notes",
            "/api/habits",
            "/api/goals",
            "/api/time",
            "/api/pdfs",
            "/api/admin/users",
        ] {
            let response = app.client.get(endpoint).dispatch().await;
            assert_eq!(
                response.status(),
                Status::Unauthorized,
                "Endpoint {} did not require authentication",
                endpoint
            );
            let body: Value = json_body(response).await;
            assert_eq!(body["error"], "Unauthorized");
        }
    }

    #[rocket::async_test]
    async fn test_forged_session_token_is_rejected() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = app
            .client
            .get("/api/me")
            .private_cookie(Cookie::build(("session_token", "fake_token")).build())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_logout_ends_session() {
        let app = setup_test_client(create_standard_test_data().await).await;
        login_test_user(&app, "student@example.com", STANDARD_PASSWORD).await;

        let response = app.client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = app.client.post("/api/logout").dispatch().await;
        let body: Value = json_body(response).await;
        assert_eq!(body["success"], true);

        let response = app.client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[rocket::async_test]
    async fn test_update_profile() {
        let app = setup_test_client(create_standard_test_data().await).await;
        login_test_user(&app, "student@example.com", STANDARD_PASSWORD).await;

        let response = put_json(
            &app,
            "/api/profile",
            json!({ "name": "Updated", "age": 25, "course": "Biology" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let user: User = json_body(response).await;
        assert_eq!(user.name, "Updated");
        assert_eq!(user.age, Some(25));
        assert_eq!(user.course, "Biology");

        let response = put_json(&app, "/api/profile", json!({ "name": "", "course": "" })).await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
    }

    #[rocket::async_test]
    async fn test_change_password() {
        let app = setup_test_client(create_standard_test_data().await).await;
        login_test_user(&app, "student@example.com", STANDARD_PASSWORD).await;

        let response = post_json(
            &app,
            "/api/change-password",
            json!({
                "current_password": "wrong",
                "new_password": "newpass",
                "confirm_password": "newpass"
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Unauthorized);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(
            body.first_error("current_password"),
            Some("Current password is incorrect")
        );

        let response = post_json(
            &app,
            "/api/change-password",
            json!({
                "current_password": STANDARD_PASSWORD,
                "new_password": "newpass",
                "confirm_password": "newpass"
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);

        app.client.post("/api/logout").dispatch().await;
        login_test_user(&app, "student@example.com", "newpass").await;
    }

    #[rocket::async_test]
    async fn test_password_reset_flow() {
        let app = setup_test_client(create_standard_test_data().await).await;

        let response = post_json(
            &app,
            "/api/password/forgot",
            json!({ "email": "ghost@example.com" }),
        )
        .await;
        assert_eq!(response.status(), Status::NotFound);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(body.first_error("email"), Some("Email not found"));

        let response = post_json(
            &app,
            "/api/password/forgot",
            json!({ "email": "student@example.com" }),
        )
        .await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.otp_required);

        let sent = app.mailer.sent();
        assert_eq!(sent[0].purpose, OtpPurpose::PasswordReset);

        let response = post_json(&app, "/api/verify-otp", json!({ "otp": sent[0].code })).await;
        let body: AuthResponse = json_body(response).await;
        assert!(!body.success, "a reset code must not log the user in");

        let response = post_json(
            &app,
            "/api/password/reset",
            json!({
                "otp": sent[0].code,
                "new_password": "resetpw",
                "confirm_password": "resetpw"
            }),
        )
        .await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.success, "{:?}", body.error);

        login_test_user(&app, "student@example.com", "resetpw").await;
    }

    #[rocket::async_test]
    async fn test_deleted_user_session_is_rejected() {
        let data = TestDataBuilder::new()
            .user("student@example.com")
            .build()
            .await
            .unwrap();
        let app = setup_test_client(data).await;
        login_test_user(&app, "student@example.com", STANDARD_PASSWORD).await;

        let stores = app.stores();
        let id = app.user_id("student@example.com");
        crate::db::users::delete_user(&stores.users, id).await.unwrap();

        let response = app.client.get("/api/me").dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }
}
