//! Legacy start game

use crate::codecs::BinarySerializable;
use crate::packets::StartGamePacket;
use crate::types::{LevelOptions, LevelSettings, WorldSettings};
use bytes::{Buf, BytesMut};
use protobridge_core::Result;

/// Level settings without the editor mode flag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegacyLevelSettings {
    pub world: WorldSettings,
    pub options: LevelOptions,
}

impl From<&LevelSettings> for LegacyLevelSettings {
    fn from(settings: &LevelSettings) -> Self {
        Self {
            world: settings.world.clone(),
            options: settings.options.clone(),
        }
    }
}

impl BinarySerializable for LegacyLevelSettings {
    fn write(&self, buf: &mut BytesMut) {
        self.world.write(buf);
        self.options.write(buf);
    }

    fn read<B: Buf>(buf: &mut B) -> Result<Self> {
        Ok(Self {
            world: WorldSettings::read(buf)?,
            options: LevelOptions::read(buf)?,
        })
    }
}

pub type LegacyStartGamePacket = StartGamePacket<LegacyLevelSettings>;
