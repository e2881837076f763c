//! Lookups and inserts for the singleton entity tables (callsigns, object
//! names, destinations, digis, locators, packets, paths, statuses).
//!
//! Inserts use `ON CONFLICT DO NOTHING ... RETURNING id`; a `None` result
//! means a concurrent writer won the race and the caller should re-read.
//! Normalization happens at this boundary: callsigns, destinations, and
//! digis are upper-cased, object names trimmed.

use anyhow::Result;
use chrono::Utc;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Text};
use uuid::Uuid;

use crate::db::PgPool;
use crate::schema::{
    callsign, destination, digis, maidenhead, object_name, packet, path, statuses,
};

/// Row returned by the `get_icon_by_symbols` SQL function.
#[derive(QueryableByName, Debug, Clone)]
pub struct IconRow {
    #[diesel(sql_type = BigInt)]
    pub id: i64,
    #[diesel(sql_type = Text)]
    pub path: String,
    #[diesel(sql_type = Text)]
    pub image: String,
    #[diesel(sql_type = Text)]
    pub icon: String,
    #[diesel(sql_type = Text)]
    pub direction: String,
}

#[derive(Clone)]
pub struct EntityRepository {
    pool: PgPool,
}

impl EntityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_callsign_id(&self, source: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let source = source.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = callsign::table
                .filter(callsign::source.eq(&source))
                .select(callsign::id)
                .first::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn insert_callsign(&self, source: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let source = source.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = diesel::insert_into(callsign::table)
                .values(callsign::source.eq(&source))
                .on_conflict_do_nothing()
                .returning(callsign::id)
                .get_result::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn get_object_name_id(&self, name: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let name = name.trim().to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = object_name::table
                .filter(object_name::name.eq(&name))
                .select(object_name::id)
                .first::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn insert_object_name(&self, name: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let name = name.trim().to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = diesel::insert_into(object_name::table)
                .values(object_name::name.eq(&name))
                .on_conflict_do_nothing()
                .returning(object_name::id)
                .get_result::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn get_destination_id(&self, name: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let name = name.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = destination::table
                .filter(destination::name.eq(&name))
                .select(destination::id)
                .first::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn insert_destination(&self, name: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let name = name.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = diesel::insert_into(destination::table)
                .values(destination::name.eq(&name))
                .on_conflict_do_nothing()
                .returning(destination::id)
                .get_result::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn get_digi_id(&self, name: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let name = name.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = digis::table
                .filter(digis::name.eq(&name))
                .select(digis::id)
                .first::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn insert_digi(&self, name: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let name = name.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = diesel::insert_into(digis::table)
                .values(digis::name.eq(&name))
                .on_conflict_do_nothing()
                .returning(digis::id)
                .get_result::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn get_maidenhead_id(&self, locator: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let locator = locator.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = maidenhead::table
                .filter(maidenhead::locator.eq(&locator))
                .select(maidenhead::id)
                .first::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    pub async fn insert_maidenhead(&self, locator: &str) -> Result<Option<i64>> {
        let pool = self.pool.clone();
        let locator = locator.to_uppercase();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = diesel::insert_into(maidenhead::table)
                .values(maidenhead::locator.eq(&locator))
                .on_conflict_do_nothing()
                .returning(maidenhead::id)
                .get_result::<i64>(&mut conn)
                .optional()?;
            Ok::<Option<i64>, anyhow::Error>(id)
        })
        .await?
    }

    /// Create a packet row with a database-assigned id.
    pub async fn insert_packet(&self, callsign_id: i64) -> Result<Uuid> {
        let pool = self.pool.clone();
        let now = Utc::now().timestamp();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let id = diesel::insert_into(packet::table)
                .values((packet::callsign_id.eq(callsign_id), packet::create_ts.eq(now)))
                .returning(packet::id)
                .get_result::<Uuid>(&mut conn)?;
            Ok::<Uuid, anyhow::Error>(id)
        })
        .await?
    }

    /// Create a packet row under a caller-supplied UUID.
    pub async fn insert_packet_with_id(&self, id: Uuid, callsign_id: i64) -> Result<()> {
        let pool = self.pool.clone();
        let now = Utc::now().timestamp();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(packet::table)
                .values((
                    packet::id.eq(id),
                    packet::callsign_id.eq(callsign_id),
                    packet::create_ts.eq(now),
                ))
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    pub async fn insert_path(&self, packet_id: Uuid, body: &str) -> Result<()> {
        let pool = self.pool.clone();
        let body = body.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(path::table)
                .values((
                    path::packet_id.eq(packet_id),
                    path::body.eq(&body),
                    path::create_ts.eq(Utc::now().timestamp()),
                ))
                .on_conflict_do_nothing()
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    pub async fn insert_status(&self, packet_id: Uuid, body: &str) -> Result<()> {
        let pool = self.pool.clone();
        let body = body.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            diesel::insert_into(statuses::table)
                .values((
                    statuses::packet_id.eq(packet_id),
                    statuses::body.eq(&body),
                    statuses::create_ts.eq(Utc::now().timestamp()),
                ))
                .on_conflict_do_nothing()
                .execute(&mut conn)?;
            Ok::<(), anyhow::Error>(())
        })
        .await?
    }

    /// Resolve an icon descriptor for a symbol pair at a given course.
    pub async fn get_icon_by_symbols(
        &self,
        symbol_table: &str,
        symbol_code: &str,
        course: i32,
    ) -> Result<Option<IconRow>> {
        let pool = self.pool.clone();
        let symbol_table = symbol_table.to_string();
        let symbol_code = symbol_code.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            let rows: Vec<IconRow> = diesel::sql_query(
                "SELECT id, path, image, icon, direction \
                 FROM get_icon_by_symbols($1, $2, $3)",
            )
            .bind::<Text, _>(&symbol_table)
            .bind::<Text, _>(&symbol_code)
            .bind::<Integer, _>(course)
            .load(&mut conn)?;
            Ok::<Option<IconRow>, anyhow::Error>(rows.into_iter().next())
        })
        .await?
    }
}
