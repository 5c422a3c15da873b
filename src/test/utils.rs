#[cfg(test)]
pub mod test_data {
    use crate::auth::{NewAccount, Role, hash_secret};
    use crate::db::Stores;
    use crate::db::users::create_user;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::Once;
    use tempfile::TempDir;
    use tracing_subscriber::EnvFilter;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub struct TestUser {
        pub email: String,
        pub name: String,
        pub role: Role,
        pub password: String,
        pub pin: Option<String>,
        pub widgets: Vec<String>,
    }

    #[derive(Default)]
    pub struct TestDataBuilder {
        users: Vec<TestUser>,
    }

    impl TestDataBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        fn push(mut self, email: &str, role: Role) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                name: email.split('@').next().unwrap_or(email).to_string(),
                role,
                password: STANDARD_PASSWORD.to_string(),
                pin: None,
                widgets: Vec::new(),
            });
            self
        }

        pub fn user(self, email: &str) -> Self {
            self.push(email, Role::User)
        }

        pub fn private_user(self, email: &str) -> Self {
            self.push(email, Role::Private)
        }

        pub fn admin(self, email: &str) -> Self {
            self.push(email, Role::Admin)
        }

        pub fn user_with_pin(mut self, email: &str, pin: &str) -> Self {
            self = self.push(email, Role::User);
            if let Some(user) = self.users.last_mut() {
                user.pin = Some(pin.to_string());
            }
            self
        }

        pub fn user_with_widgets(mut self, email: &str, widgets: &[&str]) -> Self {
            self = self.push(email, Role::User);
            if let Some(user) = self.users.last_mut() {
                user.widgets = widgets.iter().map(|w| w.to_string()).collect();
            }
            self
        }

        pub async fn build(self) -> Result<TestData, AppError> {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter(EnvFilter::new("debug"))
                    .with_test_writer()
                    .try_init();
            });

            let dir = TempDir::new()?;
            let stores = Stores::open(dir.path());
            let mut user_id_map = HashMap::new();

            for user in self.users {
                let security_pin_hash = match &user.pin {
                    Some(pin) => Some(hash_secret(pin)?),
                    None => None,
                };

                let created = create_user(
                    &stores.users,
                    NewAccount {
                        email: user.email.clone(),
                        password_hash: hash_secret(&user.password)?,
                        name: user.name,
                        age: Some(20),
                        course: "General".to_string(),
                        role: user.role,
                        widget_permissions: user.widgets,
                        security_pin_hash,
                    },
                )
                .await?;

                user_id_map.insert(user.email, created.id);
            }

            Ok(TestData {
                dir,
                stores,
                user_id_map,
            })
        }
    }

    pub struct TestData {
        pub dir: TempDir,
        pub stores: Stores,
        pub user_id_map: HashMap<String, i64>,
    }

    impl TestData {
        pub fn user_id(&self, email: &str) -> Option<i64> {
            self.user_id_map.get(email).copied()
        }

        /// A second handle onto the same data directory.
        pub fn reopen(&self) -> Stores {
            Stores::open(self.dir.path())
        }
    }

    pub async fn create_standard_test_data() -> TestData {
        TestDataBuilder::new()
            .user("student@example.com")
            .user("other@example.com")
            .admin("admin@example.com")
            .build()
            .await
            .expect("Failed to build test data")
    }
}

#[cfg(test)]
pub mod test_utils {
    use super::test_data::TestData;
    use crate::auth::{OtpPurpose, SessionStore};
    use crate::config::AppConfig;
    use crate::db::Stores;
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::mailer::Mailer;
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::{Client, LocalResponse};
    use serde::de::DeserializeOwned;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    #[derive(Debug, Clone)]
    pub struct SentMail {
        pub to: String,
        pub code: String,
        pub purpose: OtpPurpose,
    }

    /// Keeps every code it is asked to send.
    #[derive(Clone, Default)]
    pub struct MemoryMailer {
        sent: Arc<Mutex<Vec<SentMail>>>,
    }

    impl MemoryMailer {
        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }

        pub fn last_code_for(&self, to: &str) -> Option<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|mail| mail.to == to)
                .map(|mail| mail.code.clone())
        }
    }

    #[rocket::async_trait]
    impl Mailer for MemoryMailer {
        async fn send_otp(&self, to: &str, code: &str, purpose: OtpPurpose) -> Result<(), AppError> {
            self.sent.lock().unwrap().push(SentMail {
                to: to.to_string(),
                code: code.to_string(),
                purpose,
            });
            Ok(())
        }
    }

    pub struct TestApp {
        pub client: Client,
        pub mailer: MemoryMailer,
        pub user_id_map: HashMap<String, i64>,
        pub data_dir: TempDir,
    }

    impl TestApp {
        pub fn user_id(&self, email: &str) -> i64 {
            self.user_id_map[email]
        }

        /// A second handle onto the data directory the server uses.
        pub fn stores(&self) -> Stores {
            Stores::open(self.data_dir.path())
        }
    }

    pub fn test_config(data: &TestData) -> AppConfig {
        AppConfig {
            data_dir: data.dir.path().to_path_buf(),
            mail_log: data.dir.path().join("logs").join("otp_emails.log"),
            ..AppConfig::default()
        }
    }

    pub async fn setup_test_client(data: TestData) -> TestApp {
        let config = test_config(&data);
        setup_test_client_with_config(data, config).await
    }

    pub async fn setup_test_client_with_config(data: TestData, config: AppConfig) -> TestApp {
        let TestData {
            dir,
            stores,
            user_id_map,
        } = data;

        let mailer = MemoryMailer::default();
        let sessions = SessionStore::new(config.session_idle());
        let rocket = init_rocket(config, stores, sessions, Box::new(mailer.clone()));

        let client = Client::tracked(rocket)
            .await
            .expect("Failed to create test client");

        TestApp {
            client,
            mailer,
            user_id_map,
            data_dir: dir,
        }
    }

    pub async fn json_body<T: DeserializeOwned>(response: LocalResponse<'_>) -> T {
        let body = response.into_string().await.expect("Response has no body");
        serde_json::from_str(&body).unwrap_or_else(|e| panic!("Bad JSON body {}: {}", body, e))
    }

    pub async fn post_json<'a>(app: &'a TestApp, uri: &str, body: Value) -> LocalResponse<'a> {
        app.client
            .post(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    pub async fn put_json<'a>(app: &'a TestApp, uri: &str, body: Value) -> LocalResponse<'a> {
        app.client
            .put(uri.to_string())
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    /// Logs in through the API, completing the emailed code step when the
    /// login policy asks for one. The tracked client keeps the session cookie.
    pub async fn login_test_user(app: &TestApp, email: &str, password: &str) {
        let response = post_json(
            app,
            "/api/login",
            json!({ "email": email, "password": password }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = json_body(response).await;
        assert_eq!(body["success"], true, "Login failed: {}", body);

        if body["otp_required"] == true {
            let code = app.mailer.last_code_for(email).expect("No code was sent");
            let response = post_json(app, "/api/verify-otp", json!({ "otp": code })).await;
            let body: Value = json_body(response).await;
            assert_eq!(body["success"], true, "OTP verification failed: {}", body);
        }
    }
}
