//! Generic entity repository over the `entities` and `entity_events` tables.
//!
//! # Responsibility
//! - Provide create/save/load/find/remove for every entity kind.
//! - Keep payloads as JSON and expose typed access through [`EntityKind`].
//!
//! # Invariants
//! - `create` requires a live parent of the declared parent kind, and at
//!   most one trunk per parent.
//! - `save` is optimistic: the stored version must equal the incoming one.
//!   Staged events are renumbered consecutively above it.
//! - A live entity never sits under an archived parent, and an archived
//!   entity never keeps live children.
//! - Result lists are ordered by `ref_id`.

use crate::context::EventSource;
use crate::model::entity::{
    ArchivalReason, Entity, EntityEvent, EntityId, EntityKind, EntityRole, EntityTag, EventKind,
    NOT_PERSISTED_REF_ID,
};
use crate::repo::{cascade, StoreError, StoreResult};
use jiff::Timestamp;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;

const ENTITY_SELECT_SQL: &str = "SELECT
    ref_id,
    tag,
    parent_ref_id,
    version,
    archived,
    created_time,
    last_modified_time,
    archived_time,
    archival_reason,
    payload
FROM entities";

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z_][a-z0-9_]*$").expect("valid field name regex"));

/// Equality filter over one top-level payload field.
///
/// The entity matches when the field equals any of `values`. An empty
/// `values` list matches nothing; a JSON `null` value matches a missing or
/// null field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: &'static str,
    pub values: Vec<Value>,
}

impl FieldFilter {
    pub fn new(field: &'static str, values: Vec<Value>) -> Self {
        Self { field, values }
    }

    /// Builds a filter from serializable values.
    pub fn of<T: Serialize>(field: &'static str, values: &[T]) -> StoreResult<Self> {
        let values = values
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { field, values })
    }

    pub fn ref_ids(field: &'static str, ref_ids: &[EntityId]) -> Self {
        Self {
            field,
            values: ref_ids.iter().map(|id| Value::from(*id)).collect(),
        }
    }
}

/// Typed repository contract for one entity kind.
pub trait EntityRepository<T: EntityKind> {
    /// Assigns `ref_id` and persists version 1 with its `Created` event.
    fn create(&self, entity: Entity<T>) -> StoreResult<Entity<T>>;
    /// Persists staged changes; a no-op when nothing is staged.
    fn save(&self, entity: Entity<T>) -> StoreResult<Entity<T>>;
    fn load_by_id(&self, ref_id: EntityId, allow_archived: bool) -> StoreResult<Entity<T>>;
    fn load_optional(&self, ref_id: EntityId, allow_archived: bool) -> StoreResult<Option<Entity<T>>>;
    /// The unique live trunk under `parent_ref_id`.
    fn load_by_parent(&self, parent_ref_id: EntityId) -> StoreResult<Entity<T>>;
    fn find_all(
        &self,
        parent_ref_id: EntityId,
        allow_archived: bool,
        filter_ref_ids: Option<&[EntityId]>,
    ) -> StoreResult<Vec<Entity<T>>>;
    /// Like `find_all`, with payload field filters; `None` parent means any.
    fn find_all_generic(
        &self,
        parent_ref_id: Option<EntityId>,
        allow_archived: bool,
        filters: &[FieldFilter],
    ) -> StoreResult<Vec<Entity<T>>>;
    /// Persisted event history, oldest first.
    fn load_events(&self, ref_id: EntityId) -> StoreResult<Vec<EntityEvent>>;
    /// Hard delete with cascading over owned entities.
    fn remove(&self, ref_id: EntityId) -> StoreResult<Entity<T>>;
}

/// Untyped access to one tag, used by the cascade engine and typed repos.
pub struct RawEntityRepository<'conn> {
    conn: &'conn Connection,
    tag: EntityTag,
}

impl<'conn> RawEntityRepository<'conn> {
    pub fn new(conn: &'conn Connection, tag: EntityTag) -> Self {
        Self { conn, tag }
    }

    pub fn tag(&self) -> EntityTag {
        self.tag
    }

    pub fn create(&self, mut entity: Entity<Value>) -> StoreResult<Entity<Value>> {
        if entity.ref_id != NOT_PERSISTED_REF_ID {
            return Err(StoreError::InvalidData(format!(
                "{} {} is already persisted",
                self.tag, entity.ref_id
            )));
        }
        self.check_parent_for_create(entity.parent_ref_id)?;

        for (offset, event) in entity.events.iter_mut().enumerate() {
            event.version = 1 + offset as i64;
        }
        if let Some(last) = entity.events.last() {
            entity.last_modified_time = last.timestamp;
        }
        entity.version = entity.events.len().max(1) as i64;

        self.conn.execute(
            "INSERT INTO entities (
                tag,
                parent_ref_id,
                version,
                archived,
                created_time,
                last_modified_time,
                archived_time,
                archival_reason,
                payload
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                self.tag.as_str(),
                entity.parent_ref_id,
                entity.version,
                bool_to_int(entity.archived),
                entity.created_time.to_string(),
                entity.last_modified_time.to_string(),
                entity.archived_time.map(|time| time.to_string()),
                entity.archival_reason.map(ArchivalReason::as_str),
                serde_json::to_string(&entity.data)?,
            ],
        )?;
        entity.ref_id = self.conn.last_insert_rowid();

        for event in &entity.events {
            insert_event(self.conn, entity.ref_id, event)?;
        }
        Ok(entity)
    }

    pub fn save(&self, mut entity: Entity<Value>) -> StoreResult<Entity<Value>> {
        let stored = self.load_by_id(entity.ref_id, true)?;
        if stored.version != entity.version {
            return Err(StoreError::StaleEntity {
                tag: self.tag,
                ref_id: entity.ref_id,
                expected: entity.version,
                actual: stored.version,
            });
        }

        let base_version = entity.version;
        let mut staged: Vec<EntityEvent> = entity
            .events
            .iter()
            .filter(|event| event.version > base_version)
            .cloned()
            .collect();
        if staged.is_empty() {
            return Ok(entity);
        }
        for (offset, event) in staged.iter_mut().enumerate() {
            event.version = base_version + 1 + offset as i64;
        }

        if stored.archived && !entity.archived {
            self.check_parent_live(entity.parent_ref_id)?;
        }
        if entity.archived {
            self.check_no_live_children(entity.ref_id)?;
        }

        let new_version = base_version + staged.len() as i64;
        if let Some(last) = staged.last() {
            entity.last_modified_time = last.timestamp;
        }

        let changed = self.conn.execute(
            "UPDATE entities
             SET
                version = ?1,
                archived = ?2,
                last_modified_time = ?3,
                archived_time = ?4,
                archival_reason = ?5,
                payload = ?6
             WHERE ref_id = ?7 AND tag = ?8 AND version = ?9;",
            params![
                new_version,
                bool_to_int(entity.archived),
                entity.last_modified_time.to_string(),
                entity.archived_time.map(|time| time.to_string()),
                entity.archival_reason.map(ArchivalReason::as_str),
                serde_json::to_string(&entity.data)?,
                entity.ref_id,
                self.tag.as_str(),
                base_version,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::StaleEntity {
                tag: self.tag,
                ref_id: entity.ref_id,
                expected: base_version,
                actual: self.load_by_id(entity.ref_id, true)?.version,
            });
        }

        for event in &staged {
            insert_event(self.conn, entity.ref_id, event)?;
        }
        entity.events.retain(|event| event.version <= base_version);
        entity.events.extend(staged);
        entity.version = new_version;
        Ok(entity)
    }

    pub fn load_optional(
        &self,
        ref_id: EntityId,
        allow_archived: bool,
    ) -> StoreResult<Option<Entity<Value>>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{ENTITY_SELECT_SQL}
             WHERE ref_id = ?1 AND tag = ?2
               AND (?3 = 1 OR archived = 0);"
        ))?;
        let mut rows = stmt.query(params![ref_id, self.tag.as_str(), bool_to_int(allow_archived)])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_entity_row(row)?)),
            None => Ok(None),
        }
    }

    pub fn load_by_id(&self, ref_id: EntityId, allow_archived: bool) -> StoreResult<Entity<Value>> {
        self.load_optional(ref_id, allow_archived)?
            .ok_or(StoreError::NotFound {
                tag: self.tag,
                ref_id,
            })
    }

    pub fn load_by_parent(&self, parent_ref_id: EntityId) -> StoreResult<Entity<Value>> {
        let mut found = self.find_all_generic(Some(parent_ref_id), false, &[])?;
        match found.len() {
            0 => Err(StoreError::NotFound {
                tag: self.tag,
                ref_id: parent_ref_id,
            }),
            1 => Ok(found.remove(0)),
            count => Err(StoreError::InvalidData(format!(
                "{count} live {} rows under parent {parent_ref_id}",
                self.tag
            ))),
        }
    }

    pub fn find_all(
        &self,
        parent_ref_id: EntityId,
        allow_archived: bool,
        filter_ref_ids: Option<&[EntityId]>,
    ) -> StoreResult<Vec<Entity<Value>>> {
        let mut sql = format!("{ENTITY_SELECT_SQL} WHERE tag = ? AND parent_ref_id = ?");
        let mut bind_values = vec![
            SqlValue::Text(self.tag.as_str().to_string()),
            SqlValue::Integer(parent_ref_id),
        ];
        if !allow_archived {
            sql.push_str(" AND archived = 0");
        }
        if let Some(ref_ids) = filter_ref_ids {
            if ref_ids.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND ref_id IN ({})", placeholders(ref_ids.len())));
            bind_values.extend(ref_ids.iter().map(|id| SqlValue::Integer(*id)));
        }
        sql.push_str(" ORDER BY ref_id ASC");
        self.query(&sql, bind_values)
    }

    pub fn find_all_generic(
        &self,
        parent_ref_id: Option<EntityId>,
        allow_archived: bool,
        filters: &[FieldFilter],
    ) -> StoreResult<Vec<Entity<Value>>> {
        let mut sql = format!("{ENTITY_SELECT_SQL} WHERE tag = ?");
        let mut bind_values = vec![SqlValue::Text(self.tag.as_str().to_string())];
        if let Some(parent_ref_id) = parent_ref_id {
            sql.push_str(" AND parent_ref_id = ?");
            bind_values.push(SqlValue::Integer(parent_ref_id));
        }
        if !allow_archived {
            sql.push_str(" AND archived = 0");
        }
        for filter in filters {
            if filter.values.is_empty() {
                return Ok(Vec::new());
            }
            if !FIELD_NAME_RE.is_match(filter.field) {
                return Err(StoreError::InvalidData(format!(
                    "invalid filter field `{}`",
                    filter.field
                )));
            }
            let column = format!("json_extract(payload, '$.{}')", filter.field);
            let mut clauses = Vec::new();
            let non_null: Vec<SqlValue> = filter
                .values
                .iter()
                .filter_map(json_to_sql)
                .collect();
            if !non_null.is_empty() {
                clauses.push(format!("{column} IN ({})", placeholders(non_null.len())));
                bind_values.extend(non_null);
            }
            if filter.values.iter().any(Value::is_null) {
                clauses.push(format!("{column} IS NULL"));
            }
            sql.push_str(&format!(" AND ({})", clauses.join(" OR ")));
        }
        sql.push_str(" ORDER BY ref_id ASC");
        self.query(&sql, bind_values)
    }

    pub fn load_events(&self, ref_id: EntityId) -> StoreResult<Vec<EntityEvent>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT version, source, timestamp, kind, data
             FROM entity_events
             WHERE entity_ref_id = ?1
             ORDER BY version ASC;",
        )?;
        let mut rows = stmt.query([ref_id])?;
        let mut events = Vec::new();
        while let Some(row) = rows.next()? {
            events.push(parse_event_row(row)?);
        }
        Ok(events)
    }

    /// Deletes one row and its events; owned entities must be gone already.
    pub fn delete_row(&self, ref_id: EntityId) -> StoreResult<Entity<Value>> {
        let entity = self.load_by_id(ref_id, true)?;
        self.conn.execute(
            "DELETE FROM entities WHERE ref_id = ?1 AND tag = ?2;",
            params![ref_id, self.tag.as_str()],
        )?;
        Ok(entity)
    }

    fn query(&self, sql: &str, bind_values: Vec<SqlValue>) -> StoreResult<Vec<Entity<Value>>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }

    fn check_parent_for_create(&self, parent_ref_id: Option<EntityId>) -> StoreResult<()> {
        match (self.tag.parent_tag(), parent_ref_id) {
            (None, None) => Ok(()),
            (None, Some(parent)) => Err(StoreError::InvalidData(format!(
                "{} is a root but got parent {parent}",
                self.tag
            ))),
            (Some(parent_tag), None) => Err(StoreError::InvalidData(format!(
                "{} requires a {parent_tag} parent",
                self.tag
            ))),
            (Some(parent_tag), Some(parent)) => {
                let parent_live = self
                    .conn
                    .query_row(
                        "SELECT archived FROM entities WHERE ref_id = ?1 AND tag = ?2;",
                        params![parent, parent_tag.as_str()],
                        |row| row.get::<_, i64>(0),
                    )
                    .optional()?
                    .is_some_and(|archived| archived == 0);
                if !parent_live {
                    return Err(StoreError::ParentNotLive {
                        tag: self.tag,
                        parent_ref_id: parent,
                    });
                }
                if self.tag.role() == EntityRole::Trunk {
                    let existing: i64 = self.conn.query_row(
                        "SELECT COUNT(*) FROM entities WHERE tag = ?1 AND parent_ref_id = ?2;",
                        params![self.tag.as_str(), parent],
                        |row| row.get(0),
                    )?;
                    if existing > 0 {
                        return Err(StoreError::AlreadyExists {
                            tag: self.tag,
                            parent_ref_id: Some(parent),
                        });
                    }
                }
                Ok(())
            }
        }
    }

    fn check_parent_live(&self, parent_ref_id: Option<EntityId>) -> StoreResult<()> {
        let Some(parent) = parent_ref_id else {
            return Ok(());
        };
        let archived = self
            .conn
            .query_row(
                "SELECT archived FROM entities WHERE ref_id = ?1;",
                [parent],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if archived == Some(0) {
            Ok(())
        } else {
            Err(StoreError::ParentNotLive {
                tag: self.tag,
                parent_ref_id: parent,
            })
        }
    }

    fn check_no_live_children(&self, ref_id: EntityId) -> StoreResult<()> {
        let child = self
            .conn
            .query_row(
                "SELECT tag, ref_id FROM entities
                 WHERE parent_ref_id = ?1 AND archived = 0
                 ORDER BY ref_id ASC LIMIT 1;",
                [ref_id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;
        match child {
            None => Ok(()),
            Some((child_tag, child_ref_id)) => Err(StoreError::StillReferenced {
                tag: self.tag,
                ref_id,
                referrer_tag: parse_tag(&child_tag)?,
                referrer_ref_id: child_ref_id,
            }),
        }
    }
}

/// Typed repository for payload `T`.
pub struct SqliteEntityRepository<'conn, T> {
    raw: RawEntityRepository<'conn>,
    _payload: PhantomData<T>,
}

impl<'conn, T: EntityKind> SqliteEntityRepository<'conn, T> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            raw: RawEntityRepository::new(conn, T::TAG),
            _payload: PhantomData,
        }
    }
}

impl<T: EntityKind> EntityRepository<T> for SqliteEntityRepository<'_, T> {
    fn create(&self, entity: Entity<T>) -> StoreResult<Entity<T>> {
        let raw = self.raw.create(to_raw(entity)?)?;
        from_raw(raw)
    }

    fn save(&self, entity: Entity<T>) -> StoreResult<Entity<T>> {
        let raw = self.raw.save(to_raw(entity)?)?;
        from_raw(raw)
    }

    fn load_by_id(&self, ref_id: EntityId, allow_archived: bool) -> StoreResult<Entity<T>> {
        from_raw(self.raw.load_by_id(ref_id, allow_archived)?)
    }

    fn load_optional(&self, ref_id: EntityId, allow_archived: bool) -> StoreResult<Option<Entity<T>>> {
        self.raw
            .load_optional(ref_id, allow_archived)?
            .map(from_raw)
            .transpose()
    }

    fn load_by_parent(&self, parent_ref_id: EntityId) -> StoreResult<Entity<T>> {
        from_raw(self.raw.load_by_parent(parent_ref_id)?)
    }

    fn find_all(
        &self,
        parent_ref_id: EntityId,
        allow_archived: bool,
        filter_ref_ids: Option<&[EntityId]>,
    ) -> StoreResult<Vec<Entity<T>>> {
        self.raw
            .find_all(parent_ref_id, allow_archived, filter_ref_ids)?
            .into_iter()
            .map(from_raw)
            .collect()
    }

    fn find_all_generic(
        &self,
        parent_ref_id: Option<EntityId>,
        allow_archived: bool,
        filters: &[FieldFilter],
    ) -> StoreResult<Vec<Entity<T>>> {
        self.raw
            .find_all_generic(parent_ref_id, allow_archived, filters)?
            .into_iter()
            .map(from_raw)
            .collect()
    }

    fn load_events(&self, ref_id: EntityId) -> StoreResult<Vec<EntityEvent>> {
        self.raw.load_events(ref_id)
    }

    fn remove(&self, ref_id: EntityId) -> StoreResult<Entity<T>> {
        let outcome = cascade::remove_cascade(self.raw.conn, T::TAG, ref_id)?;
        match outcome.root {
            Some(root) => from_raw(root),
            None => Err(StoreError::NotFound {
                tag: T::TAG,
                ref_id,
            }),
        }
    }
}

fn to_raw<T: EntityKind>(entity: Entity<T>) -> StoreResult<Entity<Value>> {
    entity.try_map_data(serde_json::to_value).map_err(StoreError::from)
}

fn from_raw<T: EntityKind>(entity: Entity<Value>) -> StoreResult<Entity<T>> {
    let ref_id = entity.ref_id;
    entity.try_map_data(serde_json::from_value).map_err(|err| {
        StoreError::InvalidData(format!("{} {ref_id} payload does not decode: {err}", T::TAG))
    })
}

fn insert_event(conn: &Connection, ref_id: EntityId, event: &EntityEvent) -> StoreResult<()> {
    conn.execute(
        "INSERT INTO entity_events (entity_ref_id, version, source, timestamp, kind, data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
        params![
            ref_id,
            event.version,
            event.source.as_str(),
            event.timestamp.to_string(),
            event.kind.as_str(),
            serde_json::to_string(&event.data)?,
        ],
    )?;
    Ok(())
}

fn parse_entity_row(row: &Row<'_>) -> StoreResult<Entity<Value>> {
    let archived = match row.get::<_, i64>("archived")? {
        0 => false,
        1 => true,
        other => {
            return Err(StoreError::InvalidData(format!(
                "invalid archived value `{other}` in entities.archived"
            )));
        }
    };
    let archival_reason = match row.get::<_, Option<String>>("archival_reason")? {
        Some(value) => Some(ArchivalReason::parse(&value).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "invalid archival reason `{value}` in entities.archival_reason"
            ))
        })?),
        None => None,
    };
    let archived_time = match row.get::<_, Option<String>>("archived_time")? {
        Some(value) => Some(parse_timestamp(&value, "archived_time")?),
        None => None,
    };
    let payload_text: String = row.get("payload")?;
    let tag_text: String = row.get("tag")?;
    parse_tag(&tag_text)?;

    Ok(Entity {
        ref_id: row.get("ref_id")?,
        parent_ref_id: row.get("parent_ref_id")?,
        version: row.get("version")?,
        created_time: parse_timestamp(&row.get::<_, String>("created_time")?, "created_time")?,
        last_modified_time: parse_timestamp(
            &row.get::<_, String>("last_modified_time")?,
            "last_modified_time",
        )?,
        archived,
        archived_time,
        archival_reason,
        events: Vec::new(),
        data: serde_json::from_str(&payload_text)?,
    })
}

fn parse_event_row(row: &Row<'_>) -> StoreResult<EntityEvent> {
    let source_text: String = row.get("source")?;
    let kind_text: String = row.get("kind")?;
    let data_text: String = row.get("data")?;
    Ok(EntityEvent {
        source: EventSource::parse(&source_text).ok_or_else(|| {
            StoreError::InvalidData(format!("invalid event source `{source_text}`"))
        })?,
        timestamp: parse_timestamp(&row.get::<_, String>("timestamp")?, "timestamp")?,
        version: row.get("version")?,
        kind: EventKind::parse(&kind_text)
            .ok_or_else(|| StoreError::InvalidData(format!("invalid event kind `{kind_text}`")))?,
        data: serde_json::from_str(&data_text)?,
    })
}

fn parse_tag(value: &str) -> StoreResult<EntityTag> {
    EntityTag::parse(value)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid entity tag `{value}`")))
}

fn parse_timestamp(value: &str, column: &str) -> StoreResult<Timestamp> {
    value.parse::<Timestamp>().map_err(|err| {
        StoreError::InvalidData(format!("invalid timestamp `{value}` in {column}: {err}"))
    })
}

fn json_to_sql(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(SqlValue::Integer(bool_to_int(*flag))),
        Value::Number(number) => Some(match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or_default()),
        }),
        Value::String(text) => Some(SqlValue::Text(text.clone())),
        other => Some(SqlValue::Text(other.to_string())),
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
