//! Actor sub-structures shared by spawn and update packets

use crate::codecs::*;
use crate::nbt::CacheableNbt;
use bytes::{Buf, BytesMut};
use protobridge_core::{BlockPosition, BridgeError, Result, Vector3};
use std::collections::BTreeMap;

/// Actor metadata keyed by metadata property id, in key order
pub type EntityMetadata = BTreeMap<u32, MetadataProperty>;

/// One typed metadata value
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataProperty {
    Byte(i8),
    Short(i16),
    Int(i32),
    Float(f32),
    String(String),
    Compound(CacheableNbt),
    BlockPos(BlockPosition),
    Long(i64),
    Vec3(Vector3),
}

impl MetadataProperty {
    pub fn type_id(&self) -> u32 {
        match self {
            Self::Byte(_) => 0,
            Self::Short(_) => 1,
            Self::Int(_) => 2,
            Self::Float(_) => 3,
            Self::String(_) => 4,
            Self::Compound(_) => 5,
            Self::BlockPos(_) => 6,
            Self::Long(_) => 7,
            Self::Vec3(_) => 8,
        }
    }

    fn write_value(&self, buf: &mut BytesMut) {
        match self {
            Self::Byte(v) => write_u8(buf, *v as u8),
            Self::Short(v) => write_i16_le(buf, *v),
            Self::Int(v) => write_varint(buf, *v),
            Self::Float(v) => write_f32_le(buf, *v),
            Self::String(v) => write_string(buf, v),
            Self::Compound(v) => v.write(buf),
            Self::BlockPos(v) => {
                write_varint(buf, v.x);
                write_varint(buf, v.y);
                write_varint(buf, v.z);
            }
            Self::Long(v) => write_varlong(buf, *v),
            Self::Vec3(v) => write_vec3(buf, *v),
        }
    }

    fn read_value<B: Buf>(type_id: u32, buf: &mut B) -> Result<Self> {
        Ok(match type_id {
            0 => Self::Byte(read_u8(buf)? as i8),
            1 => Self::Short(read_i16_le(buf)?),
            2 => Self::Int(read_varint(buf)?),
            3 => Self::Float(read_f32_le(buf)?),
            4 => Self::String(read_string(buf)?),
            5 => Self::Compound(CacheableNbt::read(buf)?),
            6 => Self::BlockPos(BlockPosition::new(read_varint(buf)?, read_varint(buf)?, read_varint(buf)?)),
            7 => Self::Long(read_varlong(buf)?),
            8 => Self::Vec3(read_vec3(buf)?),
            other => {
                return Err(BridgeError::InvalidData(format!("Unknown metadata type {}", other)));
            }
        })
    }
}

pub fn write_entity_metadata(buf: &mut BytesMut, metadata: &EntityMetadata) {
    write_uvarint(buf, metadata.len() as u32);
    for (key, value) in metadata {
        write_uvarint(buf, *key);
        write_uvarint(buf, value.type_id());
        value.write_value(buf);
    }
}

pub fn read_entity_metadata<B: Buf>(buf: &mut B) -> Result<EntityMetadata> {
    let count = read_count(buf, 3)?;
    let mut metadata = EntityMetadata::new();
    for _ in 0..count {
        let key = read_uvarint(buf)?;
        let type_id = read_uvarint(buf)?;
        metadata.insert(key, MetadataProperty::read_value(type_id, buf)?);
    }
    Ok(metadata)
}

/// Modifier applied on top of an attribute's base value
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeModifier {
    pub id: String,
    pub name: String,
    pub amount: f32,
    pub operation: i32,
    pub operand: i32,
    pub serializable: bool,
}

/// Actor attribute (health, movement speed, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub id: String,
    pub min: f32,
    pub max: f32,
    pub current: f32,
    pub default: f32,
    pub modifiers: Vec<AttributeModifier>,
}

impl Attribute {
    pub fn new(id: impl Into<String>, min: f32, max: f32, current: f32, default: f32) -> Self {
        Self {
            id: id.into(),
            min,
            max,
            current,
            default,
            modifiers: Vec::new(),
        }
    }
}

/// Write the short attribute form used by actor spawn packets
///
/// # Format
/// ```text
/// {UVARINT count}[{STRING id}{F32 min}{F32 current}{F32 max}]*
/// ```
pub fn write_spawn_attributes(buf: &mut BytesMut, attributes: &[Attribute]) {
    write_uvarint(buf, attributes.len() as u32);
    for attribute in attributes {
        write_string(buf, &attribute.id);
        write_f32_le(buf, attribute.min);
        write_f32_le(buf, attribute.current);
        write_f32_le(buf, attribute.max);
    }
}

/// Read the short attribute form. The spawn form has no default value, it is
/// taken from the current value.
pub fn read_spawn_attributes<B: Buf>(buf: &mut B) -> Result<Vec<Attribute>> {
    let count = read_count(buf, 13)?;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let id = read_string(buf)?;
        let min = read_f32_le(buf)?;
        let current = read_f32_le(buf)?;
        let max = read_f32_le(buf)?;
        attributes.push(Attribute::new(id, min, max, current, current));
    }
    Ok(attributes)
}

/// Write the full attribute form used by the attribute update packet
pub fn write_update_attributes(buf: &mut BytesMut, attributes: &[Attribute]) {
    write_uvarint(buf, attributes.len() as u32);
    for attribute in attributes {
        write_f32_le(buf, attribute.min);
        write_f32_le(buf, attribute.max);
        write_f32_le(buf, attribute.current);
        write_f32_le(buf, attribute.default);
        write_string(buf, &attribute.id);
        write_uvarint(buf, attribute.modifiers.len() as u32);
        for modifier in &attribute.modifiers {
            write_string(buf, &modifier.id);
            write_string(buf, &modifier.name);
            write_f32_le(buf, modifier.amount);
            write_i32_le(buf, modifier.operation);
            write_i32_le(buf, modifier.operand);
            write_bool(buf, modifier.serializable);
        }
    }
}

pub fn read_update_attributes<B: Buf>(buf: &mut B) -> Result<Vec<Attribute>> {
    let count = read_count(buf, 18)?;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let min = read_f32_le(buf)?;
        let max = read_f32_le(buf)?;
        let current = read_f32_le(buf)?;
        let default = read_f32_le(buf)?;
        let id = read_string(buf)?;
        let modifier_count = read_count(buf, 15)?;
        let mut modifiers = Vec::with_capacity(modifier_count);
        for _ in 0..modifier_count {
            modifiers.push(AttributeModifier {
                id: read_string(buf)?,
                name: read_string(buf)?,
                amount: read_f32_le(buf)?,
                operation: read_i32_le(buf)?,
                operand: read_i32_le(buf)?,
                serializable: read_bool(buf)?,
            });
        }
        attributes.push(Attribute {
            id,
            min,
            max,
            current,
            default,
            modifiers,
        });
    }
    Ok(attributes)
}

/// Link between two actors (riding)
#[derive(Debug, Clone, PartialEq)]
pub struct EntityLink {
    pub from_actor_unique_id: i64,
    pub to_actor_unique_id: i64,
    pub link_type: u8,
    pub immediate: bool,
    pub caused_by_rider: bool,
}

impl BinarySerializable for EntityLink {
    fn write(&self, buf: &mut BytesMut) {
        write_actor_unique_id(buf, self.from_actor_unique_id);
        write_actor_unique_id(buf, self.to_actor_unique_id);
        write_u8(buf, self.link_type);
        write_bool(buf, self.immediate);
        write_bool(buf, self.caused_by_rider);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            from_actor_unique_id: read_actor_unique_id(buf)?,
            to_actor_unique_id: read_actor_unique_id(buf)?,
            link_type: read_u8(buf)?,
            immediate: read_bool(buf)?,
            caused_by_rider: read_bool(buf)?,
        })
    }
}

pub fn write_entity_links(buf: &mut BytesMut, links: &[EntityLink]) {
    write_uvarint(buf, links.len() as u32);
    for link in links {
        link.write(buf);
    }
}

pub fn read_entity_links<B: Buf>(buf: &mut B) -> Result<Vec<EntityLink>> {
    let count = read_count(buf, 5)?;
    let mut links = Vec::with_capacity(count);
    for _ in 0..count {
        links.push(EntityLink::read(buf)?);
    }
    Ok(links)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_preserves_every_type() {
        let mut metadata = EntityMetadata::new();
        metadata.insert(0, MetadataProperty::Long(0x1_0000_0000));
        metadata.insert(4, MetadataProperty::String("Zombie".into()));
        metadata.insert(38, MetadataProperty::Float(0.6));
        metadata.insert(7, MetadataProperty::Short(300));
        metadata.insert(9, MetadataProperty::Compound(CacheableNbt::empty_compound()));
        metadata.insert(17, MetadataProperty::BlockPos(BlockPosition::new(1, -2, 3)));
        metadata.insert(57, MetadataProperty::Vec3(Vector3::new(0.5, 1.0, 0.5)));

        let mut buf = BytesMut::new();
        write_entity_metadata(&mut buf, &metadata);
        assert_eq!(read_entity_metadata(&mut buf).unwrap(), metadata);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_spawn_attribute_default_comes_from_current() {
        let attributes = vec![Attribute::new("minecraft:health", 0.0, 20.0, 14.0, 20.0)];
        let mut buf = BytesMut::new();
        write_spawn_attributes(&mut buf, &attributes);

        let decoded = read_spawn_attributes(&mut buf).unwrap();
        assert_eq!(decoded[0].current, 14.0);
        assert_eq!(decoded[0].default, 14.0);
        assert_eq!(decoded[0].max, 20.0);
    }

    #[test]
    fn test_update_attributes_with_modifiers() {
        let mut speed = Attribute::new("minecraft:movement", 0.0, 3.4e38, 0.1, 0.1);
        speed.modifiers.push(AttributeModifier {
            id: "91AEAA56-376B-4498-935B-2F7F68070635".into(),
            name: "Sprinting speed boost".into(),
            amount: 0.3,
            operation: 2,
            operand: 2,
            serializable: false,
        });
        let mut buf = BytesMut::new();
        write_update_attributes(&mut buf, &[speed.clone()]);
        assert_eq!(read_update_attributes(&mut buf).unwrap(), vec![speed]);
    }
}
