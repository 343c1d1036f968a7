use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{join_label_types, parse_location_type, split_label_types},
    models::{Location, LocationType},
};
use crate::error::{Error, Result};
use crate::scan::rules::allowed_label_types;

pub(super) fn location_exists(conn: &Connection, location_id: &str) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM locations WHERE location_id = ?1",
            params![location_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn row_to_location(row: &Row) -> Result<Location> {
    let type_name = parse_location_type(&row.get::<_, String>("type_name")?)?;
    let allowed: String = row.get("allowed_item_types")?;
    Ok(Location {
        location_id: row.get("location_id")?,
        type_name,
        allowed_item_types: split_label_types(&allowed)?,
    })
}

impl Database {
    /// Register a physical location. The set of item types it accepts is
    /// derived from the location type and stored denormalized.
    pub async fn create_location(
        &self,
        location_id: &str,
        type_name: LocationType,
    ) -> Result<Location> {
        let location_id = location_id.to_string();
        self.execute(move |conn| {
            if location_exists(conn, &location_id)? {
                return Err(Error::Conflict(format!(
                    "location {location_id} already exists"
                )));
            }

            let allowed = allowed_label_types(type_name);
            conn.execute(
                "INSERT INTO locations (location_id, type_name, allowed_item_types)
                 VALUES (?1, ?2, ?3)",
                params![location_id, type_name.as_str(), join_label_types(&allowed)],
            )?;

            Ok(Location {
                location_id,
                type_name,
                allowed_item_types: allowed,
            })
        })
        .await
    }

    pub async fn get_location(&self, location_id: &str) -> Result<Location> {
        let location_id = location_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT location_id, type_name, allowed_item_types
                 FROM locations WHERE location_id = ?1",
            )?;
            let mut rows = stmt.query(params![location_id])?;
            match rows.next()? {
                Some(row) => row_to_location(row),
                None => Err(Error::NotFound(format!("location {location_id}"))),
            }
        })
        .await
    }

    pub async fn list_locations(&self) -> Result<Vec<Location>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT location_id, type_name, allowed_item_types
                 FROM locations ORDER BY location_id ASC",
            )?;
            let mut rows = stmt.query([])?;
            let mut locations = Vec::new();
            while let Some(row) = rows.next()? {
                locations.push(row_to_location(row)?);
            }
            Ok(locations)
        })
        .await
    }

    /// Delete a location. Refused while any label still points at it, so the
    /// registry never holds dangling location references.
    pub async fn delete_location(&self, location_id: &str) -> Result<()> {
        let location_id = location_id.to_string();
        self.execute(move |conn| {
            if !location_exists(conn, &location_id)? {
                return Err(Error::NotFound(format!("location {location_id}")));
            }

            let occupied: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM labels WHERE location_id = ?1 LIMIT 1",
                    params![location_id],
                    |row| row.get(0),
                )
                .optional()?;
            if occupied.is_some() {
                return Err(Error::Conflict(format!(
                    "items are still assigned to location {location_id}"
                )));
            }

            conn.execute(
                "DELETE FROM locations WHERE location_id = ?1",
                params![location_id],
            )?;
            Ok(())
        })
        .await
    }
}
