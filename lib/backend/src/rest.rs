//! Record stores and role lookup over the hosted REST endpoints.
//!
//! Rows are filtered with `column=eq.value` and ordered with `order=id.desc`.
//! Writes ask for the affected rows back so a missing id shows up as an empty
//! array. Every successful write is announced on the client's change hub.

use crate::client::BackendClient;
use crate::error::BackendError;
use async_trait::async_trait;
use gymdesk_access::{LookupError, Role, RoleDirectory};
use gymdesk_core::{StudentId, UserId};
use gymdesk_roster::{
    Account, AccountChanges, AccountStore, ChangeFeed, ChangeKind, ChangeNotice, StoreError,
    Student, StudentFields, StudentFilter, StudentStore, Subscription, Table,
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

const RETURN_ROWS: (&str, &str) = ("Prefer", "return=representation");

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: Option<String>,
}

#[derive(Debug, Serialize)]
struct NewStudent<'a> {
    #[serde(flatten)]
    fields: &'a StudentFields,
    professor_id: Option<&'a UserId>,
}

fn store_error(err: BackendError) -> StoreError {
    if err.is_client_error() {
        StoreError::Rejected {
            reason: err.message().to_string(),
        }
    } else {
        StoreError::Unavailable {
            reason: err.to_string(),
        }
    }
}

fn eq(value: impl std::fmt::Display) -> String {
    format!("eq.{value}")
}

/// Takes the single row a keyed write or read returned.
fn single<T>(rows: Vec<T>, entity: &'static str, id: String) -> Result<T, StoreError> {
    rows.into_iter()
        .next()
        .ok_or(StoreError::NotFound { entity, id })
}

impl BackendClient {
    fn announce(&self, table: Table, kind: ChangeKind) {
        self.inner.changes.publish(ChangeNotice::new(table, kind));
    }
}

#[async_trait]
impl RoleDirectory for BackendClient {
    #[instrument(skip(self), fields(user_id = %id))]
    async fn role_of(&self, id: &UserId) -> Result<Option<Role>, LookupError> {
        let request = self
            .rest(Method::GET, Table::Accounts.as_str())
            .await
            .query(&[("select", "role".to_string()), ("id", eq(id))]);

        let rows: Vec<RoleRow> = self.fetch(request).await.map_err(|err| match err {
            BackendError::Decode { details } => LookupError::Decode { reason: details },
            other => LookupError::Query {
                reason: other.to_string(),
            },
        })?;

        let Some(raw) = rows.into_iter().next().and_then(|row| row.role) else {
            debug!("no role row");
            return Ok(None);
        };
        match raw.parse::<Role>() {
            Ok(role) => Ok(Some(role)),
            Err(unknown) => {
                warn!(error = %unknown, "unrecognised role, treating as absent");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl StudentStore for BackendClient {
    #[instrument(skip(self))]
    async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, StoreError> {
        let mut query = vec![("select", "*".to_string()), ("order", "id.desc".to_string())];
        if let StudentFilter::Instructor(id) = filter {
            query.push(("professor_id", eq(id)));
        }
        let request = self
            .rest(Method::GET, Table::Students.as_str())
            .await
            .query(&query);
        self.fetch(request).await.map_err(store_error)
    }

    #[instrument(skip(self))]
    async fn get_student(&self, id: StudentId) -> Result<Student, StoreError> {
        let request = self
            .rest(Method::GET, Table::Students.as_str())
            .await
            .query(&[("select", "*".to_string()), ("id", eq(id))]);
        let rows = self.fetch(request).await.map_err(store_error)?;
        single(rows, "student", id.to_string())
    }

    #[instrument(skip_all)]
    async fn insert_student(
        &self,
        fields: StudentFields,
        instructor_id: Option<UserId>,
    ) -> Result<Student, StoreError> {
        let body = NewStudent {
            fields: &fields,
            professor_id: instructor_id.as_ref(),
        };
        let request = self
            .rest(Method::POST, Table::Students.as_str())
            .await
            .header(RETURN_ROWS.0, RETURN_ROWS.1)
            .json(&body);
        let rows = self.fetch(request).await.map_err(store_error)?;
        let student = single(rows, "student", "new".to_string())?;
        self.announce(Table::Students, ChangeKind::Insert);
        Ok(student)
    }

    #[instrument(skip(self, fields))]
    async fn update_student(
        &self,
        id: StudentId,
        fields: StudentFields,
    ) -> Result<Student, StoreError> {
        let request = self
            .rest(Method::PATCH, Table::Students.as_str())
            .await
            .query(&[("id", eq(id))])
            .header(RETURN_ROWS.0, RETURN_ROWS.1)
            .json(&fields);
        let rows = self.fetch(request).await.map_err(store_error)?;
        let student = single(rows, "student", id.to_string())?;
        self.announce(Table::Students, ChangeKind::Update);
        Ok(student)
    }

    #[instrument(skip(self))]
    async fn delete_student(&self, id: StudentId) -> Result<(), StoreError> {
        let request = self
            .rest(Method::DELETE, Table::Students.as_str())
            .await
            .query(&[("id", eq(id))])
            .header(RETURN_ROWS.0, RETURN_ROWS.1);
        let rows: Vec<Student> = self.fetch(request).await.map_err(store_error)?;
        single(rows, "student", id.to_string())?;
        self.announce(Table::Students, ChangeKind::Delete);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for BackendClient {
    #[instrument(skip(self))]
    async fn list_accounts(&self) -> Result<Vec<Account>, StoreError> {
        let request = self
            .rest(Method::GET, Table::Accounts.as_str())
            .await
            .query(&[("select", "*"), ("order", "id.desc")]);
        self.fetch(request).await.map_err(store_error)
    }

    #[instrument(skip(self))]
    async fn get_account(&self, id: &UserId) -> Result<Account, StoreError> {
        let request = self
            .rest(Method::GET, Table::Accounts.as_str())
            .await
            .query(&[("select", "*".to_string()), ("id", eq(id))]);
        let rows = self.fetch(request).await.map_err(store_error)?;
        single(rows, "account", id.to_string())
    }

    #[instrument(skip_all, fields(account_id = %account.id))]
    async fn insert_account(&self, account: Account) -> Result<Account, StoreError> {
        let request = self
            .rest(Method::POST, Table::Accounts.as_str())
            .await
            .header(RETURN_ROWS.0, RETURN_ROWS.1)
            .json(&account);
        let rows = self.fetch(request).await.map_err(store_error)?;
        let account = single(rows, "account", account.id.to_string())?;
        self.announce(Table::Accounts, ChangeKind::Insert);
        Ok(account)
    }

    #[instrument(skip(self, changes))]
    async fn update_account(
        &self,
        id: &UserId,
        changes: AccountChanges,
    ) -> Result<Account, StoreError> {
        let request = self
            .rest(Method::PATCH, Table::Accounts.as_str())
            .await
            .query(&[("id", eq(id))])
            .header(RETURN_ROWS.0, RETURN_ROWS.1)
            .json(&changes);
        let rows = self.fetch(request).await.map_err(store_error)?;
        let account = single(rows, "account", id.to_string())?;
        self.announce(Table::Accounts, ChangeKind::Update);
        Ok(account)
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, id: &UserId) -> Result<(), StoreError> {
        let request = self
            .rest(Method::DELETE, Table::Accounts.as_str())
            .await
            .query(&[("id", eq(id))])
            .header(RETURN_ROWS.0, RETURN_ROWS.1);
        let rows: Vec<Account> = self.fetch(request).await.map_err(store_error)?;
        single(rows, "account", id.to_string())?;
        self.announce(Table::Accounts, ChangeKind::Delete);
        Ok(())
    }
}

impl ChangeFeed for BackendClient {
    fn subscribe(&self, table: Table) -> Subscription {
        self.inner.changes.subscribe(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;
    use chrono::NaiveDate;
    use gymdesk_roster::Plan;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> BackendClient {
        BackendClient::new(BackendConfig::new(server.uri(), "anon-key")).expect("client")
    }

    fn student_row(id: i64, professor: Option<&str>) -> serde_json::Value {
        json!({
            "id": id,
            "nome": "Carla",
            "email": "carla@mail.test",
            "telefone": null,
            "foto": null,
            "modalidade": "Muay Thai",
            "plano": "Mensal",
            "data_inicio": "2025-03-05",
            "professor_id": professor,
        })
    }

    fn fields() -> StudentFields {
        StudentFields {
            name: "Carla".to_string(),
            email: Some("carla@mail.test".to_string()),
            phone: None,
            photo: None,
            modality: "Muay Thai".to_string(),
            plan: Plan::Monthly,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 5).expect("date"),
        }
    }

    #[tokio::test]
    async fn role_of_reads_role_column() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/usuarios"))
            .and(query_param("id", "eq.u-admin"))
            .and(query_param("select", "role"))
            .and(header("authorization", "Bearer anon-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"role": "master"}])))
            .mount(&server)
            .await;

        let role = client(&server)
            .role_of(&UserId::from("u-admin"))
            .await
            .expect("lookup");
        assert_eq!(role, Some(Role::Administrator));
    }

    #[tokio::test]
    async fn role_of_without_row_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/usuarios"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let role = client(&server)
            .role_of(&UserId::from("u-new"))
            .await
            .expect("lookup");
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn unrecognised_role_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/usuarios"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"role": "coach"}])))
            .mount(&server)
            .await;

        let role = client(&server)
            .role_of(&UserId::from("u-1"))
            .await
            .expect("lookup");
        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn role_query_failure_is_a_lookup_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/usuarios"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
            .mount(&server)
            .await;

        let err = client(&server)
            .role_of(&UserId::from("u-1"))
            .await
            .expect_err("failure");
        assert!(matches!(err, LookupError::Query { .. }));
    }

    #[tokio::test]
    async fn instructor_listing_filters_by_professor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/alunos"))
            .and(query_param("professor_id", "eq.u-prof"))
            .and(query_param("order", "id.desc"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([student_row(2, Some("u-prof"))])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let students = client(&server)
            .list_students(&StudentFilter::Instructor(UserId::from("u-prof")))
            .await
            .expect("list");
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].instructor_id, Some(UserId::from("u-prof")));
    }

    #[tokio::test]
    async fn insert_student_sends_row_and_announces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/alunos"))
            .and(header("prefer", "return=representation"))
            .and(body_partial_json(json!({
                "nome": "Carla",
                "data_inicio": "2025-03-05",
                "professor_id": "u-prof",
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!([student_row(7, Some("u-prof"))])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let mut feed = client.subscribe(Table::Students);
        let student = client
            .insert_student(fields(), Some(UserId::from("u-prof")))
            .await
            .expect("insert");
        assert_eq!(student.id, StudentId::new(7));
        assert_eq!(
            feed.next().await,
            Some(ChangeNotice::new(Table::Students, ChangeKind::Insert))
        );
    }

    #[tokio::test]
    async fn deleting_a_missing_student_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/alunos"))
            .and(query_param("id", "eq.41"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = client(&server)
            .delete_student(StudentId::new(41))
            .await
            .expect_err("missing");
        assert_eq!(
            err,
            StoreError::NotFound {
                entity: "student",
                id: "41".to_string()
            }
        );
    }

    #[tokio::test]
    async fn rejected_write_keeps_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/usuarios"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint",
            })))
            .mount(&server)
            .await;

        let account = Account {
            id: UserId::from("u-1"),
            name: "Bia".to_string(),
            email: "bia@gym.test".to_string(),
            phone: None,
            role: Role::Instructor,
        };
        let err = client(&server)
            .insert_account(account)
            .await
            .expect_err("conflict");
        assert_eq!(
            err,
            StoreError::Rejected {
                reason: "duplicate key value violates unique constraint".to_string()
            }
        );
    }

    #[tokio::test]
    async fn accounts_list_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/usuarios"))
            .and(query_param("order", "id.desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "u-2", "nome": "Bia", "email": "bia@gym.test", "telefone": null, "role": "professor"},
                {"id": "u-1", "nome": "Rafa", "email": "rafa@gym.test", "telefone": "119", "role": "master"},
            ])))
            .mount(&server)
            .await;

        let accounts = client(&server).list_accounts().await.expect("list");
        assert_eq!(accounts[0].role, Role::Instructor);
        assert_eq!(accounts[1].phone.as_deref(), Some("119"));
    }
}
