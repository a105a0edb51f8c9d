use async_trait::async_trait;
use freshcut_core::{StoreError, StoreResult};
use freshcut_order::models::{Customer, CustomerRole, NewCustomer};
use freshcut_order::CustomerRepository;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::backend;

pub struct PgCustomerRepository {
    pool: PgPool,
}

impl PgCustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    id: Uuid,
    name: String,
    phone: String,
    email: Option<String>,
    role: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let role: CustomerRole = row.role.parse().map_err(|e: freshcut_order::models::ParseEnumError| {
            StoreError::Backend(e.to_string())
        })?;
        Ok(Customer {
            id: row.id,
            name: row.name,
            phone: row.phone,
            email: row.email,
            role,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CustomerRepository for PgCustomerRepository {
    async fn find_or_create(&self, contact: &NewCustomer) -> StoreResult<Customer> {
        // Updating on conflict makes RETURNING yield the existing row, so two racing
        // first orders from one phone get the same customer. The latest checkout's name
        // wins; an omitted email keeps the stored one.
        let row: CustomerRow = sqlx::query_as(
            r#"
            INSERT INTO customers (id, name, phone, email, role)
            VALUES ($1, $2, $3, $4, 'customer')
            ON CONFLICT (phone) DO UPDATE
                SET name = EXCLUDED.name, email = COALESCE(EXCLUDED.email, customers.email)
            RETURNING id, name, phone, email, role, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&contact.name)
        .bind(&contact.phone)
        .bind(&contact.email)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;

        row.try_into()
    }

    async fn get_customer(&self, id: Uuid) -> StoreResult<Option<Customer>> {
        let row: Option<CustomerRow> = sqlx::query_as(
            "SELECT id, name, phone, email, role, created_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Customer::try_from).transpose()
    }
}
