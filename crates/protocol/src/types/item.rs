//! Item stacks
//!
//! Items travel by numeric network id, which is resolved through the item type
//! dictionary of the serializer context. Encoding therefore needs the context of
//! the connection the bytes are meant for.

use crate::codecs::*;
use crate::context::{SerializerContext, AIR_ITEM};
use bytes::{Buf, BytesMut};
use protobridge_core::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ItemStack {
    pub id: String,
    pub count: u16,
    pub meta: u32,
    pub block_runtime_id: i32,
    /// Item NBT and can-place/can-destroy lists, carried as-is
    pub raw_extra_data: Vec<u8>,
}

impl ItemStack {
    pub fn new(id: impl Into<String>, count: u16, meta: u32) -> Self {
        Self {
            id: id.into(),
            count,
            meta,
            block_runtime_id: 0,
            raw_extra_data: Vec::new(),
        }
    }

    pub fn air() -> Self {
        Self::new(AIR_ITEM, 0, 0)
    }

    pub fn is_air(&self) -> bool {
        self.id == AIR_ITEM
    }
}

impl Default for ItemStack {
    fn default() -> Self {
        Self::air()
    }
}

/// Item stack with its server-side stack id (0 = none)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemStackWrapper {
    pub stack_id: i32,
    pub stack: ItemStack,
}

impl ItemStackWrapper {
    pub fn new(stack_id: i32, stack: ItemStack) -> Self {
        Self { stack_id, stack }
    }

    /// Write the wrapper
    ///
    /// # Format
    /// ```text
    /// {VARINT network id}                       air stops here
    /// {LSHORT count}{UVARINT meta}
    /// {BOOL has stack id}[{VARINT stack id}]
    /// {VARINT block runtime id}{STRING extra data}
    /// ```
    pub fn write(&self, buf: &mut BytesMut, context: &SerializerContext) -> Result<()> {
        let stack = &self.stack;
        let network_id = context.item_dictionary().to_numeric(&stack.id)?;
        if network_id == 0 {
            write_varint(buf, 0);
            return Ok(());
        }
        write_varint(buf, network_id as i32);
        write_i16_le(buf, stack.count as i16);
        write_uvarint(buf, stack.meta);
        write_bool(buf, self.stack_id != 0);
        if self.stack_id != 0 {
            write_varint(buf, self.stack_id);
        }
        write_varint(buf, stack.block_runtime_id);
        write_bytes(buf, &stack.raw_extra_data);
        Ok(())
    }

    pub fn read<B: Buf>(buf: &mut B, context: &SerializerContext) -> Result<Self> {
        let network_id = read_varint(buf)?;
        if network_id == 0 {
            return Ok(Self::default());
        }
        let network_id = i16::try_from(network_id)
            .map_err(|_| BridgeError::InvalidData(format!("Item network id {} out of range", network_id)))?;
        let id = context.item_dictionary().from_numeric(network_id)?.to_string();
        let count = read_i16_le(buf)? as u16;
        let meta = read_uvarint(buf)?;
        let stack_id = if read_bool(buf)? { read_varint(buf)? } else { 0 };
        let block_runtime_id = read_varint(buf)?;
        let raw_extra_data = read_bytes(buf)?;
        Ok(Self {
            stack_id,
            stack: ItemStack {
                id,
                count,
                meta,
                block_runtime_id,
                raw_extra_data,
            },
        })
    }
}
