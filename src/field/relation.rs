//! One-to-many / many-to-one relations.
//!
//! The many-to-one side is a plain pointer slot in the child. The one-to-many
//! side, in the target, owns a chain of relation nodes naming every child
//! that currently points at it. Only the many-to-one side is writable;
//! assigning it keeps both sides consistent.

use eyre::Result;
use tracing::warn;

use super::{Field, FieldKind, RawField};
use crate::config::{FIRST_RECORD_ADDRESS, PTR_SIZE};
use crate::error::StoreError;
use crate::nd::Nd;
use crate::storage::{Address, Store};

pub const RELATION_NODE_SIZE: u64 = 24;

const COUNT_OFFSET: u32 = PTR_SIZE as u32;
const NODE_NEXT: u32 = 8;
const NODE_BACKREF: u32 = 16;
const NODE_RESERVED: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RelationNode {
    address: Address,
    child: Address,
    next: Address,
    backref: u32,
}

fn read_node(store: &Store, address: Address) -> Result<RelationNode> {
    Ok(RelationNode {
        address,
        child: store.read_address(address)?,
        next: store.read_address(address.offset(NODE_NEXT))?,
        backref: store.read_u32(address.offset(NODE_BACKREF))?,
    })
}

/// Nodes of the list at `list_slot`, most recently linked first.
fn nodes(store: &Store, list_slot: Address) -> Result<Vec<RelationNode>> {
    let count = store.read_u32(list_slot.offset(COUNT_OFFSET))? as u64;
    let max_nodes =
        store.end_of_space().saturating_sub(FIRST_RECORD_ADDRESS) / RELATION_NODE_SIZE;
    if count > max_nodes {
        return Err(StoreError::CorruptFormat(format!(
            "relation list at {} claims {} nodes, more than the store can hold",
            list_slot, count
        ))
        .into());
    }
    let count = count as usize;
    let mut current = store.read_address(list_slot)?;
    let mut out = Vec::with_capacity(count);

    while !current.is_null() {
        if out.len() == count {
            return Err(StoreError::CorruptFormat(format!(
                "relation list at {} is longer than its count {}",
                list_slot, count
            ))
            .into());
        }
        let node = read_node(store, current)?;
        current = node.next;
        out.push(node);
    }

    if out.len() != count {
        return Err(StoreError::CorruptFormat(format!(
            "relation list at {} has {} nodes but count {}",
            list_slot,
            out.len(),
            count
        ))
        .into());
    }

    Ok(out)
}

fn link(store: &mut Store, list_slot: Address, child: Address, backref: u32) -> Result<()> {
    let head = store.read_address(list_slot)?;
    let count = store.read_u32(list_slot.offset(COUNT_OFFSET))?;
    let count = count.checked_add(1).ok_or_else(|| {
        StoreError::CorruptFormat(format!("relation list at {} is full", list_slot))
    })?;

    let node = store.allocate(RELATION_NODE_SIZE)?;
    store.write_address(node, child)?;
    store.write_address(node.offset(NODE_NEXT), head)?;
    store.write_u32(node.offset(NODE_BACKREF), backref)?;
    store.write_u32(node.offset(NODE_RESERVED), 0)?;

    store.write_address(list_slot, node)?;
    store.write_u32(list_slot.offset(COUNT_OFFSET), count)
}

fn unlink(store: &mut Store, list_slot: Address, child: Address, backref: u32) -> Result<bool> {
    let nodes = nodes(store, list_slot)?;
    let Some(pos) = nodes
        .iter()
        .position(|n| n.child == child && n.backref == backref)
    else {
        return Ok(false);
    };

    let node = nodes[pos];
    match pos {
        0 => store.write_address(list_slot, node.next)?,
        _ => store.write_address(nodes[pos - 1].address.offset(NODE_NEXT), node.next)?,
    }
    store.write_u32(list_slot.offset(COUNT_OFFSET), (nodes.len() - 1) as u32)?;
    store.free(node.address, RELATION_NODE_SIZE)?;

    Ok(true)
}

/// The owning side of a relation: every child whose many-to-one field points
/// at this record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOneToMany {
    raw: RawField,
}

impl FieldOneToMany {
    pub(crate) fn new(raw: RawField) -> Self {
        Self { raw }
    }

    pub fn len(&self, nd: &Nd, record: Address) -> Result<u32> {
        nd.store()
            .read_u32(self.raw.slot(record).offset(COUNT_OFFSET))
    }

    pub fn is_empty(&self, nd: &Nd, record: Address) -> Result<bool> {
        self.len(nd, record).map(|len| len == 0)
    }

    /// Children in the order they were linked.
    pub fn targets(&self, nd: &Nd, record: Address) -> Result<Vec<Address>> {
        targets(nd.store(), self.raw.slot(record))
    }

    pub fn get(&self, nd: &Nd, record: Address, index: usize) -> Result<Option<Address>> {
        Ok(self.targets(nd, record)?.get(index).copied())
    }
}

impl Field for FieldOneToMany {
    fn raw(&self) -> &RawField {
        &self.raw
    }

    fn kind(&self) -> FieldKind {
        FieldKind::OneToMany
    }
}

pub(super) fn targets(store: &Store, list_slot: Address) -> Result<Vec<Address>> {
    Ok(nodes(store, list_slot)?
        .into_iter()
        .rev()
        .map(|node| node.child)
        .collect())
}

/// Clears every child's back-pointer and frees the relation nodes.
pub(super) fn destroy_list(store: &mut Store, list_slot: Address) -> Result<()> {
    for node in nodes(store, list_slot)? {
        store.write_address(node.child.offset(node.backref), Address::NULL)?;
        store.free(node.address, RELATION_NODE_SIZE)?;
    }
    store.write_address(list_slot, Address::NULL)?;
    store.write_u32(list_slot.offset(COUNT_OFFSET), 0)
}

/// The child side of a relation: a pointer to the owner, mirrored in the
/// owner's [`FieldOneToMany`] list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldManyToOne {
    raw: RawField,
    inverse_offset: u32,
}

impl FieldManyToOne {
    pub(crate) fn new(raw: RawField, inverse_offset: u32) -> Self {
        Self {
            raw,
            inverse_offset,
        }
    }

    pub fn get(&self, nd: &Nd, record: Address) -> Result<Address> {
        nd.store().read_address(self.raw.slot(record))
    }

    pub fn follow(&self, nd: &Nd, record: Address) -> Result<Option<Address>> {
        self.get(nd, record).map(Address::non_null)
    }

    /// Points `record` at `target` (or detaches it, for null), moving it from
    /// the old owner's list to the new one.
    pub fn put(&self, nd: &mut Nd, record: Address, target: Address) -> Result<()> {
        let mut store = nd.store_mut().bracket(&self.raw.put_tag);
        assign(
            &mut store,
            record,
            self.raw.offset,
            self.inverse_offset,
            target,
        )
    }

    /// Offset of the matching one-to-many slot in target records.
    pub fn inverse_offset(&self) -> u32 {
        self.inverse_offset
    }
}

impl Field for FieldManyToOne {
    fn raw(&self) -> &RawField {
        &self.raw
    }

    fn kind(&self) -> FieldKind {
        FieldKind::ManyToOne {
            inverse_offset: self.inverse_offset,
        }
    }
}

pub(super) fn assign(
    store: &mut Store,
    record: Address,
    offset: u32,
    inverse_offset: u32,
    target: Address,
) -> Result<()> {
    let slot = record.offset(offset);
    let old = store.read_address(slot)?;
    if old == target {
        return Ok(());
    }

    if !target.is_null() {
        link(store, target.offset(inverse_offset), record, offset)?;
    }
    store.write_address(slot, target)?;
    if !old.is_null() {
        detach(store, old, record, offset, inverse_offset)?;
    }

    Ok(())
}

/// Removes `record` from its current owner's list without touching its slot.
pub(super) fn destroy_link(
    store: &mut Store,
    record: Address,
    offset: u32,
    inverse_offset: u32,
) -> Result<()> {
    let owner = store.read_address(record.offset(offset))?;
    if owner.is_null() {
        return Ok(());
    }
    detach(store, owner, record, offset, inverse_offset)
}

fn detach(
    store: &mut Store,
    owner: Address,
    record: Address,
    offset: u32,
    inverse_offset: u32,
) -> Result<()> {
    if !unlink(store, owner.offset(inverse_offset), record, offset)? {
        warn!(
            owner = %owner,
            child = %record,
            "child missing from its owner's relation list"
        );
    }
    Ok(())
}
