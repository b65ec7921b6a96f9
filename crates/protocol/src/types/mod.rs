//! Packet sub-structures shared by canonical and legacy packets

pub mod abilities;
pub mod entity;
pub mod item;
pub mod level;

pub use abilities::{AbilitiesData, AbilitiesLayer, CommandPermissions, PlayerPermissions};
pub use entity::{Attribute, AttributeModifier, EntityLink, EntityMetadata, MetadataProperty};
pub use item::{ItemStack, ItemStackWrapper};
pub use level::{
    BlockPaletteEntry, EducationUriResource, Experiments, GameRule, GameRuleValue, LevelOptions, LevelSettings,
    PlayerMovementSettings, SpawnSettings, WorldSettings,
};
