//! Generic archiver and remover driven by the ownership link registry.
//!
//! # Responsibility
//! - Archive an entity together with everything it owns or contains.
//! - Hard-delete an entity and its owned entities.
//! - Refuse both while referrers declared by `RefsMany` links exist.
//!
//! # Invariants
//! - Children are archived or deleted before their owner, so no archived
//!   owner ever has live children.
//! - Cascaded children get `ArchivalReason::Cascading`; only the root gets
//!   the caller's reason.
//! - `RefsMany` checks apply to the root only: referrers inside the same
//!   cascade disappear with it.
//!
//! # See also
//! - `model::links`

use crate::context::DomainContext;
use crate::model::entity::{ArchivalReason, Entity, EntityId, EntitySummary, EntityTag};
use crate::model::links::{is_completed_payload, links_for, CascadeScope, LinkKey, OwnershipLink};
use crate::repo::entity_repo::{FieldFilter, RawEntityRepository};
use crate::repo::{StoreError, StoreResult};
use log::debug;
use rusqlite::Connection;
use serde_json::Value;

/// Entities touched by one cascade, root first.
#[derive(Debug, Clone, Default)]
pub struct CascadeOutcome {
    /// The root after the operation, `None` when it was already archived.
    pub root: Option<Entity<Value>>,
    pub affected: Vec<EntitySummary>,
}

impl CascadeOutcome {
    /// Cascaded entities, without the root.
    pub fn cascaded(&self) -> &[EntitySummary] {
        match self.affected.split_first() {
            Some((_, rest)) if self.root.is_some() => rest,
            _ => &self.affected,
        }
    }
}

/// Archives `ref_id` and everything it owns or contains in scope.
///
/// Archiving an already archived entity is a no-op.
pub fn archive_cascade(
    conn: &Connection,
    tag: EntityTag,
    ref_id: EntityId,
    reason: ArchivalReason,
    ctx: &DomainContext,
) -> StoreResult<CascadeOutcome> {
    let repo = RawEntityRepository::new(conn, tag);
    let root = repo.load_by_id(ref_id, true)?;
    if root.archived {
        return Ok(CascadeOutcome::default());
    }
    check_no_referrers(conn, tag, ref_id, false)?;

    let mut cascaded = Vec::new();
    archive_children(conn, tag, ref_id, ctx, &mut cascaded)?;
    let root = repo.save(root.mark_archived(reason, ctx))?;
    debug!(
        "event=entity_archive module=repo status=ok tag={} ref_id={} reason={} cascaded={}",
        tag,
        ref_id,
        reason.as_str(),
        cascaded.len()
    );

    let mut affected = vec![raw_summary(tag, &root)];
    affected.extend(cascaded);
    Ok(CascadeOutcome {
        root: Some(root),
        affected,
    })
}

/// Deletes `ref_id` and everything it owns or contains, archived or not.
pub fn remove_cascade(conn: &Connection, tag: EntityTag, ref_id: EntityId) -> StoreResult<CascadeOutcome> {
    let repo = RawEntityRepository::new(conn, tag);
    repo.load_by_id(ref_id, true)?;
    check_no_referrers(conn, tag, ref_id, true)?;

    let mut removed = Vec::new();
    remove_children(conn, tag, ref_id, &mut removed)?;
    let root = repo.delete_row(ref_id)?;
    debug!(
        "event=entity_remove module=repo status=ok tag={} ref_id={} cascaded={}",
        tag,
        ref_id,
        removed.len()
    );

    let mut affected = vec![raw_summary(tag, &root)];
    affected.extend(removed);
    Ok(CascadeOutcome {
        root: Some(root),
        affected,
    })
}

/// Fails with `StillReferenced` when a live `RefsMany` referrer exists.
pub fn check_safe_to_archive(conn: &Connection, tag: EntityTag, ref_id: EntityId) -> StoreResult<()> {
    check_no_referrers(conn, tag, ref_id, false)
}

fn archive_children(
    conn: &Connection,
    tag: EntityTag,
    ref_id: EntityId,
    ctx: &DomainContext,
    out: &mut Vec<EntitySummary>,
) -> StoreResult<()> {
    for link in links_for(tag) {
        let scope = match link {
            OwnershipLink::OwnsOne { .. } | OwnershipLink::OwnsMany { .. } => CascadeScope::All,
            OwnershipLink::ContainsMany { scope, .. } => *scope,
            OwnershipLink::RefsMany { .. } => continue,
        };
        let child_tag = link.tag();
        let child_repo = RawEntityRepository::new(conn, child_tag);
        for child in linked(&child_repo, link.key(), ref_id, false)? {
            if scope == CascadeScope::InFlight && is_completed_payload(child_tag, &child.data) {
                continue;
            }
            archive_children(conn, child_tag, child.ref_id, ctx, out)?;
            let child = child_repo.save(child.mark_archived(ArchivalReason::Cascading, ctx))?;
            out.push(raw_summary(child_tag, &child));
        }
    }
    Ok(())
}

fn remove_children(
    conn: &Connection,
    tag: EntityTag,
    ref_id: EntityId,
    out: &mut Vec<EntitySummary>,
) -> StoreResult<()> {
    for link in links_for(tag) {
        if matches!(link, OwnershipLink::RefsMany { .. }) {
            continue;
        }
        let child_tag = link.tag();
        let child_repo = RawEntityRepository::new(conn, child_tag);
        for child in linked(&child_repo, link.key(), ref_id, true)? {
            remove_children(conn, child_tag, child.ref_id, out)?;
            let removed = child_repo.delete_row(child.ref_id)?;
            out.push(raw_summary(child_tag, &removed));
        }
    }
    Ok(())
}

fn check_no_referrers(
    conn: &Connection,
    tag: EntityTag,
    ref_id: EntityId,
    include_archived: bool,
) -> StoreResult<()> {
    for link in links_for(tag) {
        let OwnershipLink::RefsMany { tag: referrer_tag, key } = link else {
            continue;
        };
        let repo = RawEntityRepository::new(conn, *referrer_tag);
        if let Some(referrer) = linked(&repo, *key, ref_id, include_archived)?.first() {
            return Err(StoreError::StillReferenced {
                tag,
                ref_id,
                referrer_tag: *referrer_tag,
                referrer_ref_id: referrer.ref_id,
            });
        }
    }
    Ok(())
}

fn linked(
    repo: &RawEntityRepository<'_>,
    key: LinkKey,
    owner_ref_id: EntityId,
    allow_archived: bool,
) -> StoreResult<Vec<Entity<Value>>> {
    match key {
        LinkKey::Parent => repo.find_all(owner_ref_id, allow_archived, None),
        LinkKey::Field(field) => repo.find_all_generic(
            None,
            allow_archived,
            &[FieldFilter::ref_ids(field, &[owner_ref_id])],
        ),
    }
}

/// Summary of an untyped entity; the snippet is its `name` when present.
pub fn raw_summary(tag: EntityTag, entity: &Entity<Value>) -> EntitySummary {
    let snippet = entity
        .data
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{tag} {}", entity.ref_id));
    EntitySummary {
        entity_tag: tag,
        ref_id: entity.ref_id,
        snippet,
    }
}
