//--------------------------------------------------------------------------------------------------
// STRUCTS
//--------------------------------------------------------------------------------------------------
// | Name                | Description                                             | Key Methods    |
// |---------------------|---------------------------------------------------------|----------------|
// | PostgresStorage      | Production store backed by `sqlx::PgPool`                | begin          |
// | PostgresTransaction  | A real BEGIN/COMMIT/ROLLBACK scope, advisory-locked      | commit         |
//--------------------------------------------------------------------------------------------------
//
// Schema (logical, per spec.md §6):
//   order_events(event_id PK, order_id, user_id, order_status, is_final,
//                 updated_at, created_at, is_in_order), index on order_id.
//   orders(order_id PK, user_id, order_status, is_final, updated_at, created_at).
//
// The advisory lock convention (FNV-1a hash of order_id fed to
// pg_advisory_xact_lock) is carried over verbatim from the Go reference
// implementation this spec was distilled from.

use std::hash::Hasher;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};

use crate::domain::models::{Order, OrderEvent, OrderStatus};

use super::error::StorageError;
use super::traits::{Storage, StorageTransaction};

fn fnv1a_32(s: &str) -> i32 {
    struct Fnv1a32(u32);
    impl Hasher for Fnv1a32 {
        fn finish(&self) -> u64 {
            self.0 as u64
        }
        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 ^= b as u32;
                self.0 = self.0.wrapping_mul(0x0100_0193);
            }
        }
    }
    let mut hasher = Fnv1a32(0x811c_9dc5);
    hasher.write(s.as_bytes());
    hasher.0 as i32
}

fn status_to_db(status: OrderStatus) -> &'static str {
    use OrderStatus::*;
    match status {
        Initial => "initial",
        CoolOrderCreated => "cool_order_created",
        SbuVerificationPending => "sbu_verification_pending",
        ConfirmedByMayor => "confirmed_by_mayor",
        ChangedMyMind => "changed_my_mind",
        Failed => "failed",
        Chinazes => "chinazes",
        GiveMyMoneyBack => "give_my_money_back",
    }
}

fn status_from_db(s: &str) -> Result<OrderStatus, StorageError> {
    use OrderStatus::*;
    Ok(match s {
        "initial" => Initial,
        "cool_order_created" => CoolOrderCreated,
        "sbu_verification_pending" => SbuVerificationPending,
        "confirmed_by_mayor" => ConfirmedByMayor,
        "changed_my_mind" => ChangedMyMind,
        "failed" => Failed,
        "chinazes" => Chinazes,
        "give_my_money_back" => GiveMyMoneyBack,
        other => return Err(StorageError::Query(format!("unknown order_status: {other}"))),
    })
}

fn event_from_row(row: &sqlx::postgres::PgRow) -> Result<OrderEvent, StorageError> {
    Ok(OrderEvent {
        event_id: row.try_get("event_id")?,
        order_id: row.try_get("order_id")?,
        user_id: row.try_get("user_id")?,
        order_status: status_from_db(row.try_get::<String, _>("order_status")?.as_str())?,
        is_final: row.try_get("is_final")?,
        updated_at: row.try_get("updated_at")?,
        created_at: row.try_get("created_at")?,
        in_order: row.try_get("is_in_order")?,
    })
}

/// Production storage backend.
pub struct PostgresStorage {
    pool: PgPool,
}

impl PostgresStorage {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    async fn begin(&self) -> Result<Box<dyn StorageTransaction>, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTransaction { tx: Some(tx) }))
    }

    async fn get_orders(&self) -> Result<Vec<Order>, StorageError> {
        let rows = sqlx::query(
            "SELECT order_id, user_id, order_status, is_final, updated_at, created_at FROM orders",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Order {
                    order_id: row.try_get("order_id")?,
                    user_id: row.try_get("user_id")?,
                    order_status: status_from_db(row.try_get::<String, _>("order_status")?.as_str())?,
                    is_final: row.try_get("is_final")?,
                    updated_at: row.try_get("updated_at")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }
}

pub struct PostgresTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresTransaction {
    fn conn(&mut self) -> &mut Transaction<'static, Postgres> {
        self.tx.as_mut().expect("transaction already consumed")
    }
}

#[async_trait]
impl StorageTransaction for PostgresTransaction {
    async fn acquire_lock(&mut self, order_id: &str) -> Result<(), StorageError> {
        let key = fnv1a_32(order_id);
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(key)
            .execute(self.conn())
            .await
            .map_err(|e| StorageError::Lock(e.to_string()))?;
        Ok(())
    }

    async fn exists_event(&mut self, event_id: &str) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM order_events WHERE event_id = $1)")
            .bind(event_id)
            .fetch_one(self.conn())
            .await?;
        Ok(row.try_get(0)?)
    }

    async fn exists_final_in_order(&mut self, order_id: &str) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM order_events WHERE order_id = $1 AND is_final = TRUE AND is_in_order = TRUE)",
        )
        .bind(order_id)
        .fetch_one(self.conn())
        .await?;
        Ok(row.try_get(0)?)
    }

    async fn exists_event_with_status(
        &mut self,
        order_id: &str,
        status: OrderStatus,
    ) -> Result<bool, StorageError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM order_events WHERE order_id = $1 AND order_status = $2)",
        )
        .bind(order_id)
        .bind(status_to_db(status))
        .fetch_one(self.conn())
        .await?;
        Ok(row.try_get(0)?)
    }

    async fn get_events(&mut self, order_id: &str) -> Result<Vec<OrderEvent>, StorageError> {
        let rows = sqlx::query(
            "SELECT event_id, order_id, user_id, order_status, is_final, updated_at, created_at, is_in_order \
             FROM order_events WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_all(self.conn())
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn upsert_events(&mut self, events: &[OrderEvent]) -> Result<(), StorageError> {
        for event in events {
            sqlx::query(
                "INSERT INTO order_events \
                 (event_id, order_id, user_id, order_status, is_final, updated_at, created_at, is_in_order) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (event_id) DO UPDATE SET is_in_order = EXCLUDED.is_in_order",
            )
            .bind(&event.event_id)
            .bind(&event.order_id)
            .bind(&event.user_id)
            .bind(status_to_db(event.order_status))
            .bind(event.is_final)
            .bind(event.updated_at)
            .bind(event.created_at)
            .bind(event.in_order)
            .execute(self.conn())
            .await?;
        }
        Ok(())
    }

    async fn update_event_final(&mut self, event_id: &str) -> Result<(), StorageError> {
        sqlx::query("UPDATE order_events SET is_final = TRUE WHERE event_id = $1")
            .bind(event_id)
            .execute(self.conn())
            .await?;
        Ok(())
    }

    async fn upsert_order(&mut self, order: Order) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO orders (order_id, user_id, order_status, is_final, updated_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (order_id) DO UPDATE SET \
             order_status = EXCLUDED.order_status, is_final = EXCLUDED.is_final, \
             updated_at = EXCLUDED.updated_at, created_at = EXCLUDED.created_at",
        )
        .bind(&order.order_id)
        .bind(&order.user_id)
        .bind(status_to_db(order.order_status))
        .bind(order.is_final)
        .bind(order.updated_at)
        .bind(order.created_at)
        .execute(self.conn())
        .await?;
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> Result<(), StorageError> {
        let tx = self.tx.take().expect("transaction already consumed");
        tx.commit().await.map_err(|e| StorageError::Transaction(e.to_string()))
    }
}
