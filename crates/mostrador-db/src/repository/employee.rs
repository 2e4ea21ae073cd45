//! # Employee Repository
//!
//! Staff records. Users may link to an employee.

use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::shared::clean;
use mostrador_core::validation::{validate_email, validate_name, validate_optional_text};
use mostrador_core::Employee;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeInput {
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl EmployeeInput {
    fn validate(&self) -> DbResult<()> {
        validate_name(&self.name)?;
        validate_optional_text("position", self.position.as_deref(), 100)?;
        validate_optional_text("phone", self.phone.as_deref(), 30)?;
        validate_email(clean(self.email.as_deref()).as_deref())?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct EmployeeRepository {
    pool: SqlitePool,
}

impl EmployeeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EmployeeRepository { pool }
    }

    pub async fn create(&self, input: &EmployeeInput) -> DbResult<Employee> {
        input.validate()?;

        let now = Utc::now();
        let employee = Employee {
            id: Uuid::new_v4().to_string(),
            name: input.name.trim().to_string(),
            position: clean(input.position.as_deref()),
            phone: clean(input.phone.as_deref()),
            email: clean(input.email.as_deref()),
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO employees (id, name, position, phone, email, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&employee.id)
        .bind(&employee.name)
        .bind(&employee.position)
        .bind(&employee.phone)
        .bind(&employee.email)
        .bind(employee.is_active)
        .bind(employee.created_at)
        .bind(employee.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(employee)
    }

    pub async fn update(&self, id: &str, input: &EmployeeInput) -> DbResult<Employee> {
        input.validate()?;

        let result = sqlx::query(
            r#"
            UPDATE employees
            SET name = ?2, position = ?3, phone = ?4, email = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(input.name.trim())
        .bind(clean(input.position.as_deref()))
        .bind(clean(input.phone.as_deref()))
        .bind(clean(input.email.as_deref()))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Employee", id));
        }
        self.get(id).await
    }

    pub async fn get(&self, id: &str) -> DbResult<Employee> {
        sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DbError::not_found("Employee", id))
    }

    pub async fn list(&self, include_inactive: bool) -> DbResult<Vec<Employee>> {
        let employees = sqlx::query_as::<_, Employee>(
            "SELECT * FROM employees WHERE (?1 OR is_active = 1) ORDER BY name",
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;
        Ok(employees)
    }

    pub async fn deactivate(&self, id: &str) -> DbResult<Employee> {
        let result =
            sqlx::query("UPDATE employees SET is_active = 0, updated_at = ?2 WHERE id = ?1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Employee", id));
        }
        self.get(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    #[tokio::test]
    async fn test_employee_crud() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.employees();

        let e = repo
            .create(&EmployeeInput {
                name: "Rosa Méndez".into(),
                position: Some("Cajera".into()),
                phone: None,
                email: Some("rosa@tienda.mx".into()),
            })
            .await
            .unwrap();

        let updated = repo
            .update(
                &e.id,
                &EmployeeInput {
                    name: "Rosa Méndez".into(),
                    position: Some("Encargada".into()),
                    phone: Some("".into()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.position.as_deref(), Some("Encargada"));
        assert_eq!(updated.phone, None);

        repo.deactivate(&e.id).await.unwrap();
        assert!(repo.list(false).await.unwrap().is_empty());
        assert_eq!(repo.list(true).await.unwrap().len(), 1);
    }
}
