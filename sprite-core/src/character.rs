//! Character descriptors for concept and pose generation.
//!
//! Every attribute is either one of a fixed list of presets or a
//! free-form override typed by the operator.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const GENDERS: &[&str] = &["Male", "Female"];
pub const RACES: &[&str] = &["Human", "Dwarf", "Elf", "Orc", "Beastkin", "Slime"];
pub const CLASSES: &[&str] = &["Warrior", "Rogue", "Paladin", "Archer", "Monk", "Cleric"];
pub const ARMORS: &[&str] = &["Plate", "Leather", "Robes", "Chainmail", "Rags"];
pub const WEAPONS: &[&str] = &[
    "Sword",
    "Axe",
    "Bow",
    "Staff",
    "Dagger",
    "War Hammer",
    "Spear",
    "Crossbow",
];

/// Weapons whose attack poses aim and fire instead of swinging.
pub const RANGED_WEAPONS: &[&str] = &["Bow", "Crossbow"];

/// Which attribute of the character a selection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Gender,
    Race,
    Class,
    Armor,
    Weapon,
}

impl Attribute {
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::Gender => "Gender",
            Attribute::Race => "Race",
            Attribute::Class => "Class",
            Attribute::Armor => "Armor",
            Attribute::Weapon => "Weapon",
        }
    }

    /// The preset values offered for this attribute.
    pub fn presets(&self) -> &'static [&'static str] {
        match self {
            Attribute::Gender => GENDERS,
            Attribute::Race => RACES,
            Attribute::Class => CLASSES,
            Attribute::Armor => ARMORS,
            Attribute::Weapon => WEAPONS,
        }
    }

    pub fn all() -> &'static [Attribute] {
        &[
            Attribute::Gender,
            Attribute::Race,
            Attribute::Class,
            Attribute::Armor,
            Attribute::Weapon,
        ]
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A preset choice or a free-form override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selection {
    Preset(String),
    Custom(String),
}

impl Selection {
    /// Interpret operator input for `attribute`.
    ///
    /// Input matching a preset (ignoring case) selects that preset with its
    /// canonical spelling; anything else becomes an override. Blank input
    /// yields `None`.
    pub fn parse(attribute: Attribute, input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let preset = attribute
            .presets()
            .iter()
            .find(|preset| preset.eq_ignore_ascii_case(input));

        Some(match preset {
            Some(preset) => Selection::Preset((*preset).to_string()),
            None => Selection::Custom(input.to_string()),
        })
    }

    pub fn value(&self) -> &str {
        match self {
            Selection::Preset(value) | Selection::Custom(value) => value,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, Selection::Custom(_))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value())
    }
}

/// Melee weapons swing; ranged weapons draw and fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponCategory {
    Melee,
    Ranged,
}

impl WeaponCategory {
    pub fn of(weapon: &str) -> Self {
        let weapon = weapon.trim();
        if RANGED_WEAPONS
            .iter()
            .any(|ranged| ranged.eq_ignore_ascii_case(weapon))
        {
            WeaponCategory::Ranged
        } else {
            WeaponCategory::Melee
        }
    }
}

/// The attributes of the character being drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSpec {
    pub gender: Selection,
    pub race: Selection,
    pub class: Selection,
    pub armor: Selection,
    pub weapon: Selection,
}

impl Default for CharacterSpec {
    fn default() -> Self {
        Self {
            gender: Selection::Preset("Male".to_string()),
            race: Selection::Preset("Human".to_string()),
            class: Selection::Preset("Warrior".to_string()),
            armor: Selection::Preset("Plate".to_string()),
            weapon: Selection::Preset("Sword".to_string()),
        }
    }
}

impl CharacterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace one attribute.
    pub fn set(&mut self, attribute: Attribute, selection: Selection) {
        *self.slot_mut(attribute) = selection;
    }

    /// Builder form of [`CharacterSpec::set`] that parses raw input.
    ///
    /// Blank input leaves the attribute unchanged.
    pub fn with(mut self, attribute: Attribute, input: &str) -> Self {
        if let Some(selection) = Selection::parse(attribute, input) {
            self.set(attribute, selection);
        }
        self
    }

    pub fn get(&self, attribute: Attribute) -> &Selection {
        match attribute {
            Attribute::Gender => &self.gender,
            Attribute::Race => &self.race,
            Attribute::Class => &self.class,
            Attribute::Armor => &self.armor,
            Attribute::Weapon => &self.weapon,
        }
    }

    fn slot_mut(&mut self, attribute: Attribute) -> &mut Selection {
        match attribute {
            Attribute::Gender => &mut self.gender,
            Attribute::Race => &mut self.race,
            Attribute::Class => &mut self.class,
            Attribute::Armor => &mut self.armor,
            Attribute::Weapon => &mut self.weapon,
        }
    }

    pub fn weapon_category(&self) -> WeaponCategory {
        WeaponCategory::of(self.weapon.value())
    }

    /// One-line description used in prompts, e.g. "A Human Warrior wearing
    /// Plate armor and holding a Sword".
    pub fn describe(&self) -> String {
        format!(
            "A {} {} {} wearing {} armor and holding a {}",
            self.gender.value().to_lowercase(),
            self.race,
            self.class,
            self.armor,
            self.weapon
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = CharacterSpec::default();
        assert_eq!(spec.gender.value(), "Male");
        assert_eq!(spec.race.value(), "Human");
        assert_eq!(spec.class.value(), "Warrior");
        assert_eq!(spec.armor.value(), "Plate");
        assert_eq!(spec.weapon.value(), "Sword");
        assert_eq!(spec.weapon_category(), WeaponCategory::Melee);
    }

    #[test]
    fn test_parse_preset_is_canonicalised() {
        let selection = Selection::parse(Attribute::Weapon, "  war hammer ").unwrap();
        assert_eq!(selection, Selection::Preset("War Hammer".to_string()));
        assert!(!selection.is_custom());
    }

    #[test]
    fn test_parse_custom_override() {
        let selection = Selection::parse(Attribute::Race, "Lizardfolk").unwrap();
        assert_eq!(selection, Selection::Custom("Lizardfolk".to_string()));
        assert!(selection.is_custom());
    }

    #[test]
    fn test_parse_blank() {
        assert!(Selection::parse(Attribute::Armor, "   ").is_none());
    }

    #[test]
    fn test_with_ignores_blank_input() {
        let spec = CharacterSpec::new().with(Attribute::Class, "");
        assert_eq!(spec.class.value(), "Warrior");
    }

    #[test]
    fn test_weapon_category() {
        assert_eq!(WeaponCategory::of("Bow"), WeaponCategory::Ranged);
        assert_eq!(WeaponCategory::of("crossbow"), WeaponCategory::Ranged);
        assert_eq!(WeaponCategory::of("Longbow"), WeaponCategory::Melee);
        for weapon in WEAPONS {
            let expected = if RANGED_WEAPONS.contains(weapon) {
                WeaponCategory::Ranged
            } else {
                WeaponCategory::Melee
            };
            assert_eq!(WeaponCategory::of(weapon), expected, "{weapon}");
        }
    }

    #[test]
    fn test_custom_weapon_drives_category() {
        let spec = CharacterSpec::new().with(Attribute::Weapon, "CROSSBOW");
        assert_eq!(spec.weapon, Selection::Preset("Crossbow".to_string()));
        assert_eq!(spec.weapon_category(), WeaponCategory::Ranged);
    }

    #[test]
    fn test_describe() {
        let spec = CharacterSpec::new()
            .with(Attribute::Gender, "Female")
            .with(Attribute::Race, "Elf")
            .with(Attribute::Class, "Archer")
            .with(Attribute::Armor, "Leather")
            .with(Attribute::Weapon, "Bow");
        assert_eq!(
            spec.describe(),
            "A female Elf Archer wearing Leather armor and holding a Bow"
        );
    }

    #[test]
    fn test_every_attribute_has_presets() {
        for attribute in Attribute::all() {
            assert!(!attribute.presets().is_empty(), "{attribute}");
        }
    }
}
