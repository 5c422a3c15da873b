#[cfg(test)]
mod tests {
    use crate::api::auth::AuthResponse;
    use crate::auth::{OtpPurpose, Role, User};
    use crate::db::users::find_by_email;
    use crate::test::utils::test_data::{STANDARD_PASSWORD, create_standard_test_data};
    use crate::test::utils::test_utils::{
        TestApp, json_body, login_test_user, post_json, put_json, setup_test_client,
    };
    use crate::validation::ValidationResponse;
    use rocket::http::Status;
    use serde_json::json;

    async fn admin_app() -> TestApp {
        let app = setup_test_client(create_standard_test_data().await).await;
        login_test_user(&app, "admin@example.com", STANDARD_PASSWORD).await;
        app
    }

    #[rocket::async_test]
    async fn test_non_admin_is_forbidden() {
        let app = setup_test_client(create_standard_test_data().await).await;
        login_test_user(&app, "student@example.com", STANDARD_PASSWORD).await;

        let response = app.client.get("/api/admin/users").dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let id = app.user_id("other@example.com");
        let response = app
            .client
            .delete(format!("/api/admin/users/{}", id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Forbidden);

        let response = app.client.get("/api/admin/activity").dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[rocket::async_test]
    async fn test_list_and_get_users() {
        let app = admin_app().await;

        let response = app.client.get("/api/admin/users").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let users: Vec<User> = json_body(response).await;
        assert_eq!(users.len(), 3);

        let id = app.user_id("student@example.com");
        let response = app
            .client
            .get(format!("/api/admin/users/{}", id))
            .dispatch()
            .await;
        let user: User = json_body(response).await;
        assert_eq!(user.email, "student@example.com");

        let response = app.client.get("/api/admin/users/999").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[rocket::async_test]
    async fn test_create_user_waits_for_otp() {
        let app = admin_app().await;

        let response = post_json(
            &app,
            "/api/admin/users",
            json!({
                "email": "created@example.com",
                "password": "createdpw",
                "name": "Created",
                "role": "admin",
                "course": "Ignored",
                "widget_permissions": ["notes", "pdfs"]
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let body: AuthResponse = json_body(response).await;
        assert!(body.otp_required);

        let stores = app.stores();
        assert!(
            find_by_email(&stores.users, "created@example.com")
                .await
                .unwrap()
                .is_none()
        );

        let mail = app.mailer.sent().pop().unwrap();
        assert_eq!(mail.to, "created@example.com");
        assert_eq!(mail.purpose, OtpPurpose::AccountCreation);

        let response = post_json(&app, "/api/verify-otp", json!({ "otp": mail.code })).await;
        let body: AuthResponse = json_body(response).await;
        assert!(body.success, "{:?}", body.error);
        let created = body.user.unwrap();
        assert_eq!(created.role, Role::Admin);
        assert_eq!(created.course, "Administration");
        assert_eq!(created.widget_permissions, vec!["notes", "pdfs"]);

        // the administrator stays signed in as themselves
        let response = app.client.get("/api/me").dispatch().await;
        let me: User = json_body(response).await;
        assert_eq!(me.email, "admin@example.com");
    }

    #[rocket::async_test]
    async fn test_create_user_rejections() {
        let app = admin_app().await;

        let response = post_json(
            &app,
            "/api/admin/users",
            json!({
                "email": "student@example.com",
                "password": "pw",
                "name": "Dup"
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Conflict);

        let response = post_json(
            &app,
            "/api/admin/users",
            json!({
                "email": "new@example.com",
                "password": "pw",
                "name": "New",
                "role": "superuser"
            }),
        )
        .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(body.first_error("role"), Some("Unknown role"));

        let response = post_json(
            &app,
            "/api/admin/users",
            json!({
                "email": "new@example.com",
                "password": "pw",
                "name": "New",
                "widget_permissions": ["games"]
            }),
        )
        .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(
            body.first_error("widget_permissions"),
            Some("Unknown widget: games")
        );
    }

    #[rocket::async_test]
    async fn test_update_user() {
        let app = admin_app().await;
        let id = app.user_id("student@example.com");

        let response = put_json(
            &app,
            &format!("/api/admin/users/{}", id),
            json!({
                "email": "student@example.com",
                "name": "Private Student",
                "password": "",
                "age": 40,
                "course": "",
                "role": "private",
                "widget_permissions": ["habits"]
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let user: User = json_body(response).await;
        assert_eq!(user.role, Role::Private);
        assert_eq!(user.course, "General");
        assert_eq!(user.age, Some(40));
        assert_eq!(user.widget_permissions, vec!["habits"]);

        let response = put_json(
            &app,
            &format!("/api/admin/users/{}", id),
            json!({
                "email": "other@example.com",
                "name": "Clash",
                "role": "user"
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Conflict);

        app.client.post("/api/logout").dispatch().await;
        login_test_user(&app, "student@example.com", STANDARD_PASSWORD).await;
    }

    #[rocket::async_test]
    async fn test_delete_user_rules() {
        let app = admin_app().await;

        let own = app.user_id("admin@example.com");
        let response = app
            .client
            .delete(format!("/api/admin/users/{}", own))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(
            body.first_error("user"),
            Some("You cannot delete your own account")
        );

        let response = app.client.delete("/api/admin/users/999").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body: ValidationResponse = json_body(response).await;
        assert_eq!(body.first_error("resource"), Some("User not found"));

        let id = app.user_id("other@example.com");
        let response = app
            .client
            .delete(format!("/api/admin/users/{}", id))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = app.client.get("/api/admin/users").dispatch().await;
        let users: Vec<User> = json_body(response).await;
        assert!(users.iter().all(|u| u.email != "other@example.com"));
    }
}
