//! Duplicate screening resolution.
//!
//! Imports have left some screenings (`jadwal`) duplicated: same studio,
//! same date, same start time. The lowest id among such siblings is the
//! canonical one.

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use super::SchemaError;

/// A screening row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schedule {
    pub id: i64,
    pub film_id: i64,
    pub studio_id: i64,
    pub date: String,
    pub start_time: String,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalSchedule {
    pub canonical_id: i64,
    /// Every screening in the same slot, ascending, the canonical one included.
    pub sibling_ids: Vec<i64>,
    /// The screening that was asked for.
    pub schedule: Schedule,
}

/// Resolve the canonical screening for `schedule_id`, `None` if it does not exist.
pub fn canonical_schedule(
    conn: &Connection,
    schedule_id: i64,
) -> Result<Option<CanonicalSchedule>, SchemaError> {
    let schedule = conn
        .query_row(
            "SELECT jadwal_id, film_id, studio_id, tanggal, jam_mulai, harga FROM jadwal WHERE jadwal_id = ?1",
            params![schedule_id],
            |row| {
                Ok(Schedule {
                    id: row.get(0)?,
                    film_id: row.get(1)?,
                    studio_id: row.get(2)?,
                    date: row.get(3)?,
                    start_time: row.get(4)?,
                    price: row.get(5)?,
                })
            },
        )
        .optional()?;

    let Some(schedule) = schedule else {
        return Ok(None);
    };

    let mut stmt = conn.prepare(
        "SELECT jadwal_id FROM jadwal WHERE studio_id = ?1 AND tanggal = ?2 AND jam_mulai = ?3 ORDER BY jadwal_id",
    )?;
    let sibling_ids = stmt
        .query_map(
            params![schedule.studio_id, schedule.date, schedule.start_time],
            |row| row.get::<_, i64>(0),
        )?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let Some(&canonical_id) = sibling_ids.iter().min() else {
        return Ok(None);
    };

    Ok(Some(CanonicalSchedule {
        canonical_id,
        sibling_ids,
        schedule,
    }))
}
